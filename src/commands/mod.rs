pub mod board;
pub mod drawing;

// Re-export command functions for convenience
pub use board::{board, border, check, member};
pub use drawing::{draw, enter, run, skip, status};

use standboard::error::Error;

/// Print a rejection for the member, or pass faults through
fn report<T>(result: standboard::error::Result<T>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(Error::Rejected(reason)) => {
            println!("Rejected ({}): {reason}", reason.code());
            Ok(None)
        }
        Err(Error::Http(e)) if e.is_connect() => Err(anyhow::anyhow!(
            "Cannot reach the stand board service ({e}). Is `standboard run` running?"
        )),
        Err(e) => Err(e.into()),
    }
}
