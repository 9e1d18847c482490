//! Shard lifecycle configuration.

use std::time::Duration;

/// Configuration for shard lifecycle operations.
#[derive(Debug, Clone)]
pub struct ShardConfig {
    /// How often shutdown re-checks for in-flight operations.
    pub shutdown_check_interval: Duration,

    /// How long shutdown waits for in-flight operations to finish.
    pub shutdown_timeout: Duration,

    /// Upper bound for unregistering all cycle callbacks during shutdown.
    pub callback_unregister_timeout: Duration,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            shutdown_check_interval: Duration::from_millis(50),
            shutdown_timeout: Duration::from_secs(30),
            callback_unregister_timeout: Duration::from_secs(10),
        }
    }
}

impl ShardConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the quiescence polling interval.
    #[must_use]
    pub const fn shutdown_check_interval(mut self, interval: Duration) -> Self {
        self.shutdown_check_interval = interval;
        self
    }

    /// Sets the quiescence timeout.
    #[must_use]
    pub const fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets the callback unregistration timeout.
    #[must_use]
    pub const fn callback_unregister_timeout(mut self, timeout: Duration) -> Self {
        self.callback_unregister_timeout = timeout;
        self
    }
}
