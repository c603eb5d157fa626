//! Instruction synthesizer: the producer's view of the bridge.
//!
//! Producer logic receives a [`Vcs`] and calls one method per 6502
//! instruction it wants the console to execute. Plain emitters append bytes
//! and return immediately. Control-transfer emitters (`jmp`, `jsr`,
//! `read_abs`, `end_overblank`) hand the image to the stepper and block until
//! the CPU has executed up to the transfer.

use std::panic::{self, AssertUnwindSafe};

use crate::error::BridgeError;
use crate::image::{IMAGE_BASE, IMAGE_SIZE, Workspace};
use crate::rendezvous::ProducerSide;

/// Image byte the overblank kernel polls; bit 7 set keeps the CPU parked.
const OVERBLANK_FLAG: u16 = 0x0FFF;

/// RAM address of the overblank kernel.
const OVERBLANK_KERNEL: u16 = 0x0080;

/// What travels over the rendezvous.
pub(crate) type Baton = Box<Workspace>;

/// Producer logic run on the producer thread.
///
/// It is expected to loop forever, yielding through control-transfer
/// primitives. Returning `Ok(())` ends the session; returning
/// [`BridgeError::Shutdown`] (as propagated from a primitive) is the normal
/// way to unwind when the cartridge is reset or dropped.
pub type Producer = dyn Fn(&mut Vcs) -> Result<(), BridgeError> + Send + Sync;

mod opcode {
    pub const LDA_IMM: u8 = 0xA9;
    pub const LDX_IMM: u8 = 0xA2;
    pub const LDY_IMM: u8 = 0xA0;
    pub const LDA_ABS: u8 = 0xAD;
    pub const STA_ZP: u8 = 0x85;
    pub const STX_ZP: u8 = 0x86;
    pub const STY_ZP: u8 = 0x84;
    pub const STA_ABS: u8 = 0x8D;
    pub const TXS: u8 = 0x9A;
    pub const NOP: u8 = 0xEA;
    pub const JMP_ABS: u8 = 0x4C;
    pub const JSR: u8 = 0x20;
}

/// Handle through which producer logic emits instructions.
pub struct Vcs {
    work: Option<Baton>,
    side: ProducerSide<Baton>,
}

impl std::fmt::Debug for Vcs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vcs")
            .field("holds_image", &self.work.is_some())
            .field("state", &self.side.state())
            .finish()
    }
}

impl Vcs {
    fn work(&mut self) -> Result<&mut Workspace, BridgeError> {
        self.work
            .as_deref_mut()
            .ok_or(BridgeError::ContractViolation("synthesizer used outside the producer's turn"))
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<(), BridgeError> {
        let image = &mut self.work()?.image;
        for &byte in bytes {
            image.append(byte)?;
        }
        Ok(())
    }

    /// Seal the predicted writes and park until the CPU reaches `target`.
    fn yield_to(&mut self, target: u16) -> Result<(), BridgeError> {
        let mut work = self
            .work
            .take()
            .ok_or(BridgeError::ContractViolation("yield without holding the image"))?;
        work.writes.seal();
        self.work = Some(self.side.yield_until_stepper_catches_up(work, target)?);
        Ok(())
    }

    /// Image offset the next emitted byte lands at.
    pub fn next_index(&mut self) -> Result<usize, BridgeError> {
        Ok(self.work()?.image.next_index())
    }

    /// `LDA #value`
    pub fn lda_imm(&mut self, value: u8) -> Result<(), BridgeError> {
        self.emit(&[opcode::LDA_IMM, value])
    }

    /// `LDX #value`
    pub fn ldx_imm(&mut self, value: u8) -> Result<(), BridgeError> {
        self.emit(&[opcode::LDX_IMM, value])
    }

    /// `LDY #value`
    pub fn ldy_imm(&mut self, value: u8) -> Result<(), BridgeError> {
        self.emit(&[opcode::LDY_IMM, value])
    }

    /// `STA zp`
    pub fn sta_zp(&mut self, zp: u8) -> Result<(), BridgeError> {
        self.emit(&[opcode::STA_ZP, zp])
    }

    /// `STX zp`
    pub fn stx_zp(&mut self, zp: u8) -> Result<(), BridgeError> {
        self.emit(&[opcode::STX_ZP, zp])
    }

    /// `STY zp`
    pub fn sty_zp(&mut self, zp: u8) -> Result<(), BridgeError> {
        self.emit(&[opcode::STY_ZP, zp])
    }

    /// `STA $00zp`: the absolute form, one cycle slower than `sta_zp`.
    pub fn sta_abs(&mut self, zp: u8) -> Result<(), BridgeError> {
        self.emit(&[opcode::STA_ABS, zp, 0x00])
    }

    pub fn txs(&mut self) -> Result<(), BridgeError> {
        self.emit(&[opcode::TXS])
    }

    pub fn nop(&mut self) -> Result<(), BridgeError> {
        self.emit(&[opcode::NOP])
    }

    /// `count` NOPs, two cycles each.
    pub fn nop_n(&mut self, count: usize) -> Result<(), BridgeError> {
        for _ in 0..count {
            self.nop()?;
        }
        Ok(())
    }

    /// `STA zp` whose write carries `value` regardless of A.
    ///
    /// The predicted write is keyed on the address of the operand byte, the
    /// last thing the CPU reads before it stores.
    pub fn write_zp(&mut self, zp: u8, value: u8) -> Result<(), BridgeError> {
        let work = self.work()?;
        work.image.append(opcode::STA_ZP)?;
        let operand = work.image.append(zp)?;
        work.writes.record(IMAGE_BASE | operand, value);
        Ok(())
    }

    /// `LDA #value; STA zp`
    pub fn write_zp_imm(&mut self, zp: u8, value: u8) -> Result<(), BridgeError> {
        self.emit(&[opcode::LDA_IMM, value, opcode::STA_ZP, zp])
    }

    /// `JMP target`, then wait for the CPU to land there.
    pub fn jmp(&mut self, target: u16) -> Result<(), BridgeError> {
        let [lo, hi] = target.to_le_bytes();
        self.emit(&[opcode::JMP_ABS, lo, hi])?;
        self.yield_to(target)
    }

    /// `JMP $1000`: restart the CPU at the top of the image.
    pub fn jmp_start(&mut self) -> Result<(), BridgeError> {
        self.jmp(IMAGE_BASE)
    }

    /// `JSR target`, then wait for the CPU to enter the subroutine.
    pub fn jsr(&mut self, target: u16) -> Result<(), BridgeError> {
        let [lo, hi] = target.to_le_bytes();
        self.emit(&[opcode::JSR, lo, hi])?;
        self.yield_to(target)
    }

    /// `LDA address`, then wait for it to execute and return the value the
    /// CPU loaded.
    ///
    /// The CPU resumes right after the load, so the instruction must not
    /// end on the last image byte.
    pub fn read_abs(&mut self, address: u16) -> Result<u8, BridgeError> {
        let [lo, hi] = address.to_le_bytes();
        self.emit(&[opcode::LDA_ABS, lo, hi])?;
        let resume = self.work()?.image.next_index();
        // The CPU falls through to `resume`, which must still be in the image.
        if resume >= IMAGE_SIZE {
            return Err(BridgeError::CapacityExceeded { capacity: IMAGE_SIZE });
        }
        self.yield_to(IMAGE_BASE | resume as u16)?;
        Ok(self.work()?.last_read_value)
    }

    /// Park the CPU in the RAM kernel at `$0080` until
    /// [`end_overblank`](Self::end_overblank).
    ///
    /// The kernel (`BIT $1FFF; BMI *-3; JMP $1000`) must already be in RAM.
    pub fn start_overblank(&mut self) -> Result<(), BridgeError> {
        let work = self.work()?;
        work.image.set(OVERBLANK_FLAG, 0xFF);
        let [lo, hi] = OVERBLANK_KERNEL.to_le_bytes();
        self.emit(&[opcode::JMP_ABS, lo, hi])
    }

    /// Release the overblank kernel and wait for the CPU to come back to
    /// `$1000`.
    pub fn end_overblank(&mut self) -> Result<(), BridgeError> {
        self.work()?.image.set(OVERBLANK_FLAG, 0x00);
        self.yield_to(IMAGE_BASE)
    }

    /// Value the cartridge last put on the data bus.
    pub fn last_read_value(&mut self) -> Result<u8, BridgeError> {
        Ok(self.work()?.last_read_value)
    }
}

/// Producer thread body.
///
/// Waits to be primed, runs `logic`, and reports how it ended.
pub(crate) fn run_producer(side: ProducerSide<Baton>, logic: &Producer) {
    let work = match side.wait_for_start() {
        Ok(work) => work,
        Err(_) => {
            log::debug!("producer shut down before it was primed");
            return;
        }
    };

    let mut vcs = Vcs { work: Some(work), side };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| logic(&mut vcs)));

    let reason = match outcome {
        Ok(Ok(())) => BridgeError::ProducerExited,
        Ok(Err(BridgeError::Shutdown)) => {
            log::debug!("producer unwound after shutdown");
            return;
        }
        Ok(Err(err)) => err,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            BridgeError::ProducerPanicked(message)
        }
    };

    log::debug!("producer finished: {reason}");
    vcs.side.exit(reason);
}
