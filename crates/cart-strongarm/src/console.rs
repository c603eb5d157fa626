//! Stepper driver: a 6507 on a 13-bit bus with the bridge cartridge.

use emu_core::{Cpu, DeviceId, DispatchResult, DispatchStatus, Observable, System, Value};
use mos_6502::Mos6502;

use crate::cart::StrongArmCart;
use crate::error::BridgeError;

/// The stepper context.
///
/// Owns the CPU and the bus the cartridge is installed on, and pumps the
/// bridge after every instruction.
#[derive(Debug)]
pub struct Console {
    cpu: Mos6502,
    system: System,
    cart: DeviceId,
    last_error: Option<BridgeError>,
}

impl Console {
    /// Install `cart` and reset the CPU through its reset vector.
    #[must_use]
    pub fn new(cart: StrongArmCart) -> Self {
        let mut system = System::new();
        let id = system.attach(Box::new(cart));
        StrongArmCart::install(&mut system, id);

        let mut cpu = Mos6502::new();
        cpu.reset(&mut system);

        Self {
            cpu,
            system,
            cart: id,
            last_error: None,
        }
    }

    /// Reset every device, then the CPU. The producer starts over.
    pub fn reset(&mut self) {
        self.system.reset();
        self.cpu.reset(&mut self.system);
        self.last_error = None;
    }

    /// Execute one instruction and give the bridge a chance to hand off.
    ///
    /// Bridge failures turn the step into [`DispatchStatus::Fatal`]; the
    /// cause is kept in [`last_error`](Self::last_error).
    pub fn step_once(&mut self) -> DispatchResult {
        if let Err(err) = self.bridge().and_then(StrongArmCart::ensure_started) {
            return self.fail(err, 0);
        }

        let result = self.cpu.step(&mut self.system);
        if result.status() != DispatchStatus::Ok {
            return result;
        }

        let pc = self.cpu.pc();
        match self.bridge().and_then(|cart| cart.sync(pc)) {
            Ok(_) => result,
            Err(err) => self.fail(err, result.cycles()),
        }
    }

    /// Step until at least `cycle_budget` cycles have run, or a step traps
    /// or fails. The returned result carries the cycles actually run.
    pub fn run(&mut self, cycle_budget: u64) -> DispatchResult {
        let mut cycles = 0;
        while cycles < cycle_budget {
            let result = self.step_once();
            cycles += result.cycles();
            match result.status() {
                DispatchStatus::Ok => {}
                DispatchStatus::Trap => {
                    return DispatchResult::trap(
                        cycles,
                        result.message(),
                        result.address(),
                        result.was_read_trap(),
                    );
                }
                DispatchStatus::Fatal | DispatchStatus::Invalid => {
                    return DispatchResult::fatal(cycles);
                }
            }
        }
        DispatchResult::ok(cycles)
    }

    fn fail(&mut self, err: BridgeError, cycles: u64) -> DispatchResult {
        self.last_error = Some(err);
        DispatchResult::fatal(cycles)
    }

    fn bridge(&mut self) -> Result<&mut StrongArmCart, BridgeError> {
        self.cart_mut()
            .ok_or(BridgeError::ContractViolation("cartridge slot holds another device"))
    }

    /// The installed cartridge.
    #[must_use]
    pub fn cart(&self) -> Option<&StrongArmCart> {
        self.system.downcast_ref::<StrongArmCart>(self.cart)
    }

    /// The installed cartridge, for save states and patching.
    pub fn cart_mut(&mut self) -> Option<&mut StrongArmCart> {
        self.system.downcast_mut::<StrongArmCart>(self.cart)
    }

    #[must_use]
    pub fn cpu(&self) -> &Mos6502 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Mos6502 {
        &mut self.cpu
    }

    pub fn system_mut(&mut self) -> &mut System {
        &mut self.system
    }

    /// Why the last failing step failed.
    #[must_use]
    pub fn last_error(&self) -> Option<&BridgeError> {
        self.last_error.as_ref()
    }
}

impl Observable for Console {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("cpu.") {
            self.cpu.query(rest)
        } else if let Some(rest) = path.strip_prefix("cart.") {
            self.cart()?.query(rest)
        } else {
            None
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["cpu.<6502_paths>", "cart.<bridge_paths>"]
    }
}
