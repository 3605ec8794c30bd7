//! Per-operation context: cancellation and an overall deadline.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation and deadline for one resource operation.
///
/// Cloning shares the cancellation token.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    /// Cancelled when the caller gives up on the operation.
    pub cancel: CancellationToken,
    /// Wall-clock bound on the whole operation.
    pub deadline: Option<Instant>,
}

impl OpContext {
    /// A context without deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context sharing `cancel`.
    #[must_use]
    pub const fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Sets the deadline to `timeout` from now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Returns true once the operation has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The earlier of this context's deadline and `now + timeout`.
    #[must_use]
    pub fn effective_deadline(&self, timeout: Duration) -> Instant {
        let local = Instant::now() + timeout;
        self.deadline.map_or(local, |d| d.min(local))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shorter_deadline_wins() {
        let ctx = OpContext::new().with_timeout(Duration::from_secs(5));
        let effective = ctx.effective_deadline(Duration::from_secs(600));
        assert!(effective <= Instant::now() + Duration::from_secs(5));

        let unbounded = OpContext::new().effective_deadline(Duration::from_secs(1));
        assert!(unbounded <= Instant::now() + Duration::from_secs(1));
    }

    #[test]
    fn test_clone_shares_cancellation() {
        let ctx = OpContext::new();
        let clone = ctx.clone();
        ctx.cancel.cancel();
        assert!(clone.is_cancelled());
    }
}
