//! Kind-specific recovery delays.
//!
//! Recovery here only waits and says "go ahead". What "again" means
//! (reconnect, re-detect) is up to the caller.

use std::time::Duration;

use super::{ClassifiedError, ErrorKind};

/// Wait before reporting a network failure as recoverable.
pub const NETWORK_RECOVERY_DELAY: Duration = Duration::from_secs(2);

/// Wait before reporting a timeout as recoverable.
pub const TIMEOUT_RECOVERY_DELAY: Duration = Duration::from_secs(1);

/// Backoff table applied by [`RecoveryPolicy::attempt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPolicy {
    pub network_delay: Duration,
    pub timeout_delay: Duration,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            network_delay: NETWORK_RECOVERY_DELAY,
            timeout_delay: TIMEOUT_RECOVERY_DELAY,
        }
    }
}

impl RecoveryPolicy {
    /// Decide whether the caller may retry after `error`, sleeping first
    /// when the kind calls for it.
    pub async fn attempt(&self, error: &ClassifiedError) -> bool {
        if !error.recoverable {
            tracing::warn!(kind = %error.kind, "Error is not recoverable");
            return false;
        }

        tracing::debug!(kind = %error.kind, "Attempting recovery");

        match error.kind {
            ErrorKind::Network => {
                tokio::time::sleep(self.network_delay).await;
                true
            }
            ErrorKind::Timeout => {
                tokio::time::sleep(self.timeout_delay).await;
                true
            }
            // The session has to be re-established; nothing to wait for.
            ErrorKind::ProcessExit => true,
            _ => false,
        }
    }
}

/// [`RecoveryPolicy::attempt`] with the default delays.
pub async fn attempt_recovery(error: &ClassifiedError) -> bool {
    RecoveryPolicy::default().attempt(error).await
}
