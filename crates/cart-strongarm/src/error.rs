//! Bridge error taxonomy.

use std::time::Duration;

use thiserror::Error;

/// Everything that can go wrong between the producer and the stepper.
///
/// Capacity, stall and producer-exit errors end the session for this
/// cartridge; [`InvalidAddress`](BridgeError::InvalidAddress) and
/// [`ContractViolation`](BridgeError::ContractViolation) are reported to the
/// immediate caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The producer emitted past the end of the synthetic image.
    #[error("synthetic image full: cannot append beyond {capacity} bytes")]
    CapacityExceeded { capacity: usize },

    /// The producer did not yield back within the configured bound.
    #[error("producer did not yield within {0:?}")]
    StallDetected(Duration),

    /// An API was used outside the context that owns it.
    #[error("contract violation: {0}")]
    ContractViolation(&'static str),

    /// A patch targeted an address outside the cartridge image.
    #[error("address ${0:04X} is outside the cartridge image")]
    InvalidAddress(u16),

    /// A snapshot could not be restored.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// The producer returned instead of yielding forever.
    #[error("producer exited")]
    ProducerExited,

    /// The producer panicked.
    #[error("producer panicked: {0}")]
    ProducerPanicked(String),

    /// The stepper side went away; the producer should unwind.
    #[error("bridge shut down")]
    Shutdown,

    /// The producer thread could not be started.
    #[error("failed to spawn producer thread: {0}")]
    Spawn(String),
}

impl BridgeError {
    /// Errors that end the emulation session for this cartridge.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::InvalidAddress(_) | Self::ContractViolation(_) | Self::InvalidSnapshot(_))
    }
}
