//! The cartridge: bus adapter and owner of the producer thread.

use std::any::Any;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use emu_core::{ADDRESS_MASK, Device, DeviceId, Observable, System, Value};

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::image::{IMAGE_BASE, IMAGE_MASK, SyntheticImage, Workspace};
use crate::rendezvous::{HandoffState, StateCell, StepperSide, rendezvous};
use crate::snapshot::BridgeSnapshot;
use crate::synth::{Baton, Producer, Vcs, run_producer};

/// Where a 13-bit address goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Tia,
    Riot,
    Image,
}

/// Standard 2600 decode: A12 selects the cartridge, A7 picks RIOT over TIA.
fn route(address: u16) -> Route {
    match address & 0x1080 {
        0x0000 => Route::Tia,
        0x0080 => Route::Riot,
        _ => Route::Image,
    }
}

/// A cartridge whose ROM is written, instruction by instruction, by native
/// code running on its own thread.
///
/// The cartridge owns the whole 8 KiB bus. Chip accesses are forwarded to
/// `tia` and `riot`; accesses to `$1000-$1FFF` are served from the synthetic
/// image. Writes are subject to bus-stuffing: if the next predicted write
/// was keyed on the address the CPU last read, its value replaces the one
/// the CPU drove.
pub struct StrongArmCart {
    config: BridgeConfig,
    tia: Box<dyn Device>,
    riot: Box<dyn Device>,
    producer: Arc<Producer>,

    /// The image, while the stepper holds it.
    work: Option<Baton>,
    stepper: Option<StepperSide<Baton>>,
    state: Option<StateCell>,
    thread: Option<JoinHandle<()>>,

    /// Where the CPU must be for the next handoff. `None` until primed.
    target: Option<u16>,
    last_read_address: u16,
    failure: Option<BridgeError>,
    handoffs: u64,
}

impl std::fmt::Debug for StrongArmCart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrongArmCart")
            .field("target", &self.target)
            .field("handoff", &self.handoff_state())
            .field("handoffs", &self.handoffs)
            .field("failure", &self.failure)
            .finish_non_exhaustive()
    }
}

impl StrongArmCart {
    /// Build the cartridge and start its producer thread.
    ///
    /// The producer stays parked until the first [`sync`](Self::sync) or
    /// [`ensure_started`](Self::ensure_started).
    pub fn new<F>(
        config: BridgeConfig,
        tia: Box<dyn Device>,
        riot: Box<dyn Device>,
        producer: F,
    ) -> Result<Self, BridgeError>
    where
        F: Fn(&mut Vcs) -> Result<(), BridgeError> + Send + Sync + 'static,
    {
        let mut cart = Self {
            config,
            tia,
            riot,
            producer: Arc::new(producer),
            work: Some(Box::new(Workspace::new())),
            stepper: None,
            state: None,
            thread: None,
            target: None,
            last_read_address: 0,
            failure: None,
            handoffs: 0,
        };
        cart.spawn_producer()?;
        Ok(cart)
    }

    /// Claim the whole bus for the cartridge attached as `id`.
    pub fn install(system: &mut System, id: DeviceId) {
        system.install_page_access(0x0000, ADDRESS_MASK + 1, id);
    }

    fn spawn_producer(&mut self) -> Result<(), BridgeError> {
        let (stepper, side) = rendezvous(self.config.stall_timeout);
        let logic = Arc::clone(&self.producer);
        let handle = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || run_producer(side, logic.as_ref()))
            .map_err(|err| BridgeError::Spawn(err.to_string()))?;

        self.state = Some(stepper.state_cell());
        self.stepper = Some(stepper);
        self.thread = Some(handle);
        Ok(())
    }

    /// Disconnect the producer and reclaim its thread.
    fn shutdown(&mut self) {
        drop(self.stepper.take());
        let Some(handle) = self.thread.take() else {
            return;
        };

        // Dropping the stepper end wakes a producer parked in the
        // rendezvous. A stalled one is still running its own code and may
        // never look at the channel again.
        let stalled = matches!(self.failure, Some(BridgeError::StallDetected(_)));
        if stalled && !handle.is_finished() {
            log::warn!(
                "detaching stalled producer thread '{}'",
                self.config.thread_name
            );
            return;
        }
        if handle.join().is_err() {
            log::warn!("producer thread '{}' panicked", self.config.thread_name);
        }
    }

    /// Run the producer once if it has never run.
    pub fn ensure_started(&mut self) -> Result<(), BridgeError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if self.target.is_none() {
            self.handoff()?;
        }
        Ok(())
    }

    /// Called by the stepper after every retired instruction, with the
    /// program counter the instruction left behind.
    ///
    /// Returns true if the producer ran.
    pub fn sync(&mut self, pc: u16) -> Result<bool, BridgeError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        match self.target {
            Some(target) if (pc ^ target) & ADDRESS_MASK != 0 => Ok(false),
            _ => {
                self.handoff()?;
                Ok(true)
            }
        }
    }

    fn handoff(&mut self) -> Result<(), BridgeError> {
        let result = self.run_producer_turn();
        if let Err(err) = &result {
            log::error!("strongarm bridge failed: {err}");
            self.failure = Some(err.clone());
        }
        result
    }

    fn run_producer_turn(&mut self) -> Result<(), BridgeError> {
        let stepper = self.stepper.as_mut().ok_or(BridgeError::Shutdown)?;
        let mut work = self
            .work
            .take()
            .ok_or(BridgeError::ContractViolation("stepper does not hold the image"))?;

        let discarded = work.writes.begin_batch();
        if discarded > 0 {
            log::debug!("discarding {discarded} unconsumed predicted writes");
        }
        if let Some(target) = self.target {
            work.image.seek(target & IMAGE_MASK);
        }

        let (work, target) = stepper.run_producer_until_next_yield(work)?;
        log::debug!(
            "producer yielded at image ${:03X}, {} writes predicted, running to ${target:04X}",
            work.image.next_index(),
            work.writes.pending()
        );
        self.work = Some(work);
        self.target = Some(target);
        self.handoffs += 1;
        Ok(())
    }

    /// Capture the image for a save state.
    pub fn save(&self) -> Result<BridgeSnapshot, BridgeError> {
        let work = self
            .work
            .as_deref()
            .ok_or(BridgeError::ContractViolation("save while the producer holds the image"))?;
        Ok(BridgeSnapshot::capture(&work.image, self.target))
    }

    /// Restore a save state and restart the producer from the beginning.
    ///
    /// Producer progress is native state and is not part of the snapshot.
    /// The restored target is kept, so the restarted producer first runs
    /// when the CPU reaches it and writes its first burst there.
    pub fn load(&mut self, snapshot: &BridgeSnapshot) -> Result<(), BridgeError> {
        let image = snapshot.restore()?;
        self.shutdown();
        self.work = Some(Box::new(Workspace {
            image,
            ..Workspace::default()
        }));
        self.target = snapshot.target;
        self.failure = None;
        self.spawn_producer()
    }

    /// The image, unless the producer currently holds it.
    #[must_use]
    pub fn image(&self) -> Option<&SyntheticImage> {
        self.work.as_deref().map(|work| &work.image)
    }

    #[must_use]
    pub fn handoff_state(&self) -> HandoffState {
        self.state.as_ref().map_or(HandoffState::Idle, StateCell::get)
    }

    /// Address the CPU must reach for the next handoff.
    #[must_use]
    pub fn target(&self) -> Option<u16> {
        self.target
    }

    /// Completed producer turns since the last reset.
    #[must_use]
    pub fn handoffs(&self) -> u64 {
        self.handoffs
    }

    /// The error that stopped the bridge, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&BridgeError> {
        self.failure.as_ref()
    }

    #[must_use]
    pub fn last_read_address(&self) -> u16 {
        self.last_read_address
    }

    #[must_use]
    pub fn tia(&self) -> &dyn Device {
        self.tia.as_ref()
    }

    #[must_use]
    pub fn riot(&self) -> &dyn Device {
        self.riot.as_ref()
    }
}

impl Device for StrongArmCart {
    fn name(&self) -> &str {
        "StrongARM"
    }

    fn reset(&mut self) {
        self.shutdown();
        self.tia.reset();
        self.riot.reset();
        self.work = Some(Box::new(Workspace::new()));
        self.target = None;
        self.last_read_address = 0;
        self.failure = None;
        self.handoffs = 0;
        if let Err(err) = self.spawn_producer() {
            log::error!("strongarm bridge failed: {err}");
            self.failure = Some(err);
        }
    }

    fn peek(&mut self, address: u16) -> u8 {
        let address = address & ADDRESS_MASK;
        self.last_read_address = address;
        let value = match route(address) {
            Route::Tia => self.tia.peek(address),
            Route::Riot => self.riot.peek(address),
            Route::Image => self.work.as_deref().map_or(0, |work| work.image.read(address)),
        };
        if let Some(work) = self.work.as_deref_mut() {
            work.last_read_value = value;
        }
        value
    }

    fn poke(&mut self, address: u16, value: u8) -> bool {
        let address = address & ADDRESS_MASK;
        let last_read = self.last_read_address;
        let value = match self.work.as_deref_mut().and_then(|work| work.writes.consume(last_read)) {
            Some(stuffed) => {
                log::trace!("stuffing ${stuffed:02X} over ${value:02X} at ${address:04X}");
                stuffed
            }
            None => value,
        };
        match route(address) {
            Route::Tia => self.tia.poke(address, value),
            Route::Riot => self.riot.poke(address, value),
            Route::Image => false,
        }
    }

    fn patch(&mut self, address: u16, value: u8) -> bool {
        let address = address & ADDRESS_MASK;
        if address & IMAGE_BASE == 0 {
            log::debug!("{}", BridgeError::InvalidAddress(address));
            return false;
        }
        match self.work.as_deref_mut() {
            Some(work) => {
                work.image.set(address, value);
                true
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for StrongArmCart {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Observable for StrongArmCart {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "handoff" => Some(self.handoff_state().name().into()),
            "target" => self.target.map(Value::from),
            "image.next" => self.image().map(|image| Value::U64(image.next_index() as u64)),
            "stuff.pending" => self
                .work
                .as_deref()
                .map(|work| Value::U64(work.writes.pending() as u64)),
            "last_read" => Some(self.last_read_address.into()),
            "handoffs" => Some(self.handoffs.into()),
            "failed" => Some(self.failure.is_some().into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "handoff",
            "target",
            "image.next",
            "stuff.pending",
            "last_read",
            "handoffs",
            "failed",
        ]
    }
}
