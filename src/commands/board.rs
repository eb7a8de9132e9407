use anyhow::Result;

use standboard::client::BoardClient;
use standboard::occupancy::Direction;

use super::report;

/// Print the current board
pub async fn board(client: &BoardClient, json: bool) -> Result<()> {
    let Some(entries) = report(client.board().await)? else {
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("Stand Board");
    println!("===========");
    if entries.is_empty() {
        println!("Nobody is signed in.");
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{:<6} {:<28} since {}",
            entry.location.as_str(),
            entry.label(),
            entry
                .since
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
        );
    }
    println!("\n{} stand(s) occupied", entries.len());
    Ok(())
}

/// Sign in or out of a stand
pub async fn check(
    client: &BoardClient,
    location: &str,
    user: &str,
    guest: Option<&str>,
) -> Result<()> {
    if let Some(outcome) = report(client.attempt_check(location, user, guest).await)? {
        let verb = match outcome.direction {
            Direction::CheckIn => "signed in at",
            Direction::CheckOut => "signed out of",
        };
        println!(
            "{} {verb} {}",
            outcome.user.display_name(),
            outcome.location
        );
    }
    Ok(())
}

/// Record an adjacency edge
pub async fn border(client: &BoardClient, a: &str, b: &str) -> Result<()> {
    if let Some(edge) = report(client.add_adjacency(a, b).await)? {
        println!("{} now borders {}", edge.a, edge.b);
    }
    Ok(())
}

/// Create or update a member
pub async fn member(
    client: &BoardClient,
    user: &str,
    contact: Option<&str>,
    priority: bool,
) -> Result<()> {
    if let Some(member) = report(client.upsert_member(user, contact, priority).await)? {
        println!(
            "Saved {} (priority pass: {})",
            member.user.display_name(),
            if member.priority { "yes" } else { "no" }
        );
    }
    Ok(())
}
