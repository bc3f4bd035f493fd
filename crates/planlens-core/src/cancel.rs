//! Cooperative cancellation
//!
//! Cancellation is checked once at the boundary of each pass. Nothing is
//! mutated before the check, so an aborted pass leaves no partial state.

use crate::{PlanError, Result};

pub use tokio_util::sync::CancellationToken;

/// Returns `Err(PlanError::Cancelled)` if the token has been cancelled
pub fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        tracing::debug!("operation cancelled before start");
        return Err(PlanError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_token_passes() {
        let token = CancellationToken::new();
        assert!(ensure_not_cancelled(&token).is_ok());
    }

    #[test]
    fn test_cancelled_token_fails() {
        let token = CancellationToken::new();
        token.cancel();
        let err = ensure_not_cancelled(&token).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_child_token_follows_parent() {
        let parent = CancellationToken::new();
        let child = parent.child_token();
        parent.cancel();
        assert!(ensure_not_cancelled(&child).is_err());
    }
}
