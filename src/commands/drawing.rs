use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use standboard::client::BoardClient;
use standboard::config::ServerConfig;
use standboard::drawing::DrawTrigger;
use standboard::engine::Engine;

use super::report;

/// Serve requests and run the daily drawing trigger until Ctrl-C
pub async fn run(engine: Engine, server: &ServerConfig) -> Result<()> {
    let addr = server.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    let trigger = Arc::new(
        DrawTrigger::from_settings(engine.clone()).map_err(|e| anyhow::anyhow!(e))?,
    );
    let handle = tokio::spawn({
        let trigger = trigger.clone();
        async move { trigger.run().await }
    });

    println!("Stand board listening on http://{addr}");
    println!("Press Ctrl-C to stop.");

    let served = standboard::server::serve(listener, engine.clone(), async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to wait for Ctrl-C"),
        }
    })
    .await;

    trigger.stop();
    engine.shutdown().await;
    handle.await.context("Drawing trigger task failed")?;
    served.context("Server error")?;

    println!("Stand board stopped.");
    Ok(())
}

/// Toggle drawing entry
pub async fn enter(client: &BoardClient, user: &str) -> Result<()> {
    if let Some(toggle) = report(client.toggle_entry(user).await)? {
        if toggle.entered {
            println!("{} is entered in the next drawing", toggle.user.display_name());
        } else {
            println!("{} left the next drawing", toggle.user.display_name());
        }
    }
    Ok(())
}

/// Skip the current turn
pub async fn skip(client: &BoardClient, user: &str) -> Result<()> {
    if report(client.skip_turn(user).await)?.is_some() {
        println!("Turn passed");
    }
    Ok(())
}

/// Print drawing status for a member
pub async fn status(client: &BoardClient, user: &str) -> Result<()> {
    let Some(status) = report(client.current_status(user).await)? else {
        return Ok(());
    };

    println!("Drawing Status");
    println!("==============");
    println!("Phase: {}", status.phase);
    println!("Entered for next drawing: {}", status.entered);
    if status.is_running {
        println!(
            "Current turn: {}",
            status.current_index.map_or("-".to_string(), |i| (i + 1).to_string())
        );
        println!(
            "Your position: {}",
            status.position.map_or("not drawn".to_string(), |p| (p + 1).to_string())
        );
        if let Some(secs) = status.seconds_remaining {
            println!("Seconds left in turn: {secs}");
        }
    }

    if let Some(order) = report(client.last_order().await)?.flatten() {
        let state = match (&order.finished_at, order.turn_holder()) {
            (Some(_), _) => "finished".to_string(),
            (None, Some(holder)) => format!("turn with {}", holder.display_name()),
            (None, None) => "not started".to_string(),
        };
        println!(
            "\nLast drawing {} at {} ({state})",
            order.draw_id,
            order.created_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
        );
        for (i, user) in order.order.iter().enumerate() {
            println!("  {:>2}. {}", i + 1, user.display_name());
        }
    }
    Ok(())
}

/// Start a drawing on the service and follow it until it finishes
pub async fn draw(client: &BoardClient) -> Result<()> {
    let Some(started) = report(client.start_lottery().await)? else {
        return Ok(());
    };
    let Some(summary) = started else {
        println!("Drawing did not start (already running or storage unavailable)");
        return Ok(());
    };

    println!("Drawing {} started", summary.draw_id);
    println!("Cleared {} stand(s)", summary.evicted);
    if summary.order.is_empty() {
        println!("Nobody entered.");
        return Ok(());
    }
    for (i, user) in summary.order.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, user.display_name());
    }

    loop {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                let health = client.health().await?;
                if !health.drawing {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Stopped following; the drawing continues on the service");
                return Ok(());
            }
        }
    }

    println!("Drawing finished");
    Ok(())
}
