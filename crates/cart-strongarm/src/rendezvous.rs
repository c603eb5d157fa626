//! Strict two-party handoff between the stepper and the producer.
//!
//! The two contexts pass a baton (the [`Workspace`](crate::Workspace)) over
//! a pair of zero-capacity channels. Only the holder of the baton runs; the
//! other side is blocked in `recv`. Because the baton is moved, not shared,
//! the alternation is enforced by ownership: neither side can touch the
//! image while the other one holds it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, SendTimeoutError, Sender};

use crate::error::BridgeError;

/// Which side currently holds the baton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffState {
    /// Before the stepper primes the producer, or after either side left.
    Idle,
    ProducerRunning,
    StepperRunning,
}

impl HandoffState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::ProducerRunning,
            2 => Self::StepperRunning,
            _ => Self::Idle,
        }
    }

    const fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::ProducerRunning => 1,
            Self::StepperRunning => 2,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ProducerRunning => "producer",
            Self::StepperRunning => "stepper",
        }
    }
}

/// Shared, lock-free view of the handoff state for observers.
#[derive(Debug, Clone)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(HandoffState::Idle.as_u8())))
    }

    #[must_use]
    pub fn get(&self) -> HandoffState {
        HandoffState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: HandoffState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

/// Messages from the producer to the stepper.
enum Handback<T> {
    /// The producer parked itself; the stepper must run until `target`.
    Yield { baton: T, target: u16 },
    /// The producer is gone and will not yield again.
    Exit(BridgeError),
}

/// Create the two ends of a rendezvous.
///
/// `stall_timeout` bounds how long the stepper waits for a yield.
#[must_use]
pub fn rendezvous<T>(stall_timeout: Option<Duration>) -> (StepperSide<T>, ProducerSide<T>) {
    let (to_producer, from_stepper) = channel::bounded(0);
    let (to_stepper, from_producer) = channel::bounded(0);
    let state = StateCell::new();
    (
        StepperSide {
            to_producer,
            from_producer,
            state: state.clone(),
            stall_timeout,
        },
        ProducerSide {
            to_stepper,
            from_stepper,
            state,
        },
    )
}

/// The stepper's end.
#[derive(Debug)]
pub struct StepperSide<T> {
    to_producer: Sender<T>,
    from_producer: Receiver<Handback<T>>,
    state: StateCell,
    stall_timeout: Option<Duration>,
}

impl<T> StepperSide<T> {
    /// Hand the baton to the producer and block until it yields it back.
    ///
    /// Returns the baton and the address the producer wants the CPU to reach
    /// next.
    pub fn run_producer_until_next_yield(&mut self, baton: T) -> Result<(T, u16), BridgeError> {
        self.state.set(HandoffState::ProducerRunning);

        let sent = match self.stall_timeout {
            Some(timeout) => self.to_producer.send_timeout(baton, timeout).map_err(|err| match err {
                SendTimeoutError::Timeout(_) => BridgeError::StallDetected(timeout),
                SendTimeoutError::Disconnected(_) => BridgeError::ProducerExited,
            }),
            None => self.to_producer.send(baton).map_err(|_| BridgeError::ProducerExited),
        };
        if let Err(err) = sent {
            self.state.set(HandoffState::Idle);
            return Err(err);
        }

        let reply = match self.stall_timeout {
            Some(timeout) => self.from_producer.recv_timeout(timeout).map_err(|err| match err {
                RecvTimeoutError::Timeout => BridgeError::StallDetected(timeout),
                RecvTimeoutError::Disconnected => BridgeError::ProducerExited,
            }),
            None => self.from_producer.recv().map_err(|_| BridgeError::ProducerExited),
        };

        match reply {
            Ok(Handback::Yield { baton, target }) => Ok((baton, target)),
            Ok(Handback::Exit(err)) | Err(err) => {
                // A stalled producer still owns the baton; leave the state
                // saying so.
                if !matches!(err, BridgeError::StallDetected(_)) {
                    self.state.set(HandoffState::Idle);
                }
                Err(err)
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> HandoffState {
        self.state.get()
    }

    #[must_use]
    pub fn state_cell(&self) -> StateCell {
        self.state.clone()
    }
}

/// The producer's end.
#[derive(Debug)]
pub struct ProducerSide<T> {
    to_stepper: Sender<Handback<T>>,
    from_stepper: Receiver<T>,
    state: StateCell,
}

impl<T> ProducerSide<T> {
    /// Block until the stepper primes the producer for the first time.
    pub fn wait_for_start(&self) -> Result<T, BridgeError> {
        self.from_stepper.recv().map_err(|_| BridgeError::Shutdown)
    }

    /// Hand the baton to the stepper, asking it to run until `target`, and
    /// block until it comes back.
    ///
    /// Returns [`BridgeError::Shutdown`] if the stepper side was dropped;
    /// producer logic should propagate it and return.
    pub fn yield_until_stepper_catches_up(&self, baton: T, target: u16) -> Result<T, BridgeError> {
        self.state.set(HandoffState::StepperRunning);
        self.to_stepper
            .send(Handback::Yield { baton, target })
            .map_err(|_| BridgeError::Shutdown)?;
        self.from_stepper.recv().map_err(|_| BridgeError::Shutdown)
    }

    /// Tell the stepper the producer is finished.
    ///
    /// Blocks until the stepper picks the message up or drops its end.
    pub fn exit(self, reason: BridgeError) {
        self.state.set(HandoffState::Idle);
        if self.to_stepper.send(Handback::Exit(reason)).is_err() {
            log::debug!("producer exit not delivered: stepper already gone");
        }
    }

    #[must_use]
    pub fn state(&self) -> HandoffState {
        self.state.get()
    }
}
