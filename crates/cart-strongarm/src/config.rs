//! Bridge configuration.

use std::time::Duration;

/// How long the stepper waits for the producer before declaring a stall.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a [`StrongArmCart`](crate::StrongArmCart).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BridgeConfig {
    /// Upper bound on a single producer turn. `None` waits forever, which
    /// turns a producer that never yields into a silent hang.
    pub stall_timeout: Option<Duration>,

    /// Name given to the producer thread.
    pub thread_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            stall_timeout: Some(DEFAULT_STALL_TIMEOUT),
            thread_name: "strongarm-producer".to_string(),
        }
    }
}

impl BridgeConfig {
    #[must_use]
    pub fn with_stall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stall_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}
