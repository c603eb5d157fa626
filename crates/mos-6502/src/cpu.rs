//! 6502 instruction dispatch.

use emu_core::{Bus, Cpu, DispatchResult, Observable, Value};

use crate::flags::{C, D, I, N, V, Z};
use crate::Registers;

/// Address of the reset vector.
pub const RESET_VECTOR: u16 = 0xFFFC;

/// The MOS 6502 (and its 13-address-line sibling, the 6507).
#[derive(Debug)]
pub struct Mos6502 {
    /// CPU registers.
    pub regs: Registers,

    /// Bus cycles consumed by the instruction in flight.
    step_cycles: u64,

    /// Total cycles executed.
    total_cycles: u64,
}

impl Default for Mos6502 {
    fn default() -> Self {
        Self::new()
    }
}

impl Mos6502 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            step_cycles: 0,
            total_cycles: 0,
        }
    }

    // ========================================================================
    // Bus access. One access, one cycle.
    // ========================================================================

    fn read<B: Bus>(&mut self, bus: &mut B, addr: u16) -> u8 {
        self.step_cycles += 1;
        bus.read(addr)
    }

    fn write<B: Bus>(&mut self, bus: &mut B, addr: u16, value: u8) {
        self.step_cycles += 1;
        bus.write(addr, value);
    }

    fn fetch<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = self.read(bus, self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn fetch_word<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch(bus);
        let hi = self.fetch(bus);
        u16::from_le_bytes([lo, hi])
    }

    /// Second cycle of a single-byte instruction: read the next byte and
    /// throw it away.
    fn dummy_read<B: Bus>(&mut self, bus: &mut B) {
        let _ = self.read(bus, self.regs.pc);
    }

    fn push<B: Bus>(&mut self, bus: &mut B, value: u8) {
        let addr = self.regs.push();
        self.write(bus, addr, value);
    }

    fn pull<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let addr = self.regs.pop();
        self.read(bus, addr)
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Execute the instruction whose opcode has just been fetched.
    ///
    /// Returns false if the opcode is not implemented.
    fn execute<B: Bus>(&mut self, bus: &mut B, opcode: u8) -> bool {
        match opcode {
            // Loads
            0xA9 => self.imm(bus, Self::do_lda),
            0xA5 => self.zp_read(bus, Self::do_lda),
            0xAD => self.abs_read(bus, Self::do_lda),
            0xA2 => self.imm(bus, Self::do_ldx),
            0xA6 => self.zp_read(bus, Self::do_ldx),
            0xAE => self.abs_read(bus, Self::do_ldx),
            0xA0 => self.imm(bus, Self::do_ldy),
            0xA4 => self.zp_read(bus, Self::do_ldy),
            0xAC => self.abs_read(bus, Self::do_ldy),

            // Stores
            0x85 => self.zp_write(bus, self.regs.a),
            0x86 => self.zp_write(bus, self.regs.x),
            0x84 => self.zp_write(bus, self.regs.y),
            0x8D => self.abs_write(bus, self.regs.a),
            0x8E => self.abs_write(bus, self.regs.x),
            0x8C => self.abs_write(bus, self.regs.y),

            // BIT
            0x24 => self.zp_read(bus, Self::do_bit),
            0x2C => self.abs_read(bus, Self::do_bit),

            // Control flow
            0x4C => self.op_jmp_abs(bus),
            0x20 => self.op_jsr(bus),
            0x60 => self.op_rts(bus),
            0x10 => self.op_branch(bus, !self.regs.p.is_set(N)),
            0x30 => self.op_branch(bus, self.regs.p.is_set(N)),
            0x50 => self.op_branch(bus, !self.regs.p.is_set(V)),
            0x70 => self.op_branch(bus, self.regs.p.is_set(V)),
            0x90 => self.op_branch(bus, !self.regs.p.is_set(C)),
            0xB0 => self.op_branch(bus, self.regs.p.is_set(C)),
            0xD0 => self.op_branch(bus, !self.regs.p.is_set(Z)),
            0xF0 => self.op_branch(bus, self.regs.p.is_set(Z)),

            // Stack
            0x48 => {
                self.dummy_read(bus);
                self.push(bus, self.regs.a);
            }
            0x68 => {
                self.dummy_read(bus);
                let _ = self.read(bus, self.regs.stack_addr());
                self.regs.a = self.pull(bus);
                self.regs.p.update_nz(self.regs.a);
            }

            // Implied
            0xEA => self.dummy_read(bus),
            0x9A => self.implied(bus, |cpu| cpu.regs.s = cpu.regs.x),
            0xBA => self.implied(bus, |cpu| {
                cpu.regs.x = cpu.regs.s;
                cpu.regs.p.update_nz(cpu.regs.x);
            }),
            0xAA => self.implied(bus, |cpu| {
                cpu.regs.x = cpu.regs.a;
                cpu.regs.p.update_nz(cpu.regs.x);
            }),
            0x8A => self.implied(bus, |cpu| {
                cpu.regs.a = cpu.regs.x;
                cpu.regs.p.update_nz(cpu.regs.a);
            }),
            0xA8 => self.implied(bus, |cpu| {
                cpu.regs.y = cpu.regs.a;
                cpu.regs.p.update_nz(cpu.regs.y);
            }),
            0x98 => self.implied(bus, |cpu| {
                cpu.regs.a = cpu.regs.y;
                cpu.regs.p.update_nz(cpu.regs.a);
            }),
            0xE8 => self.implied(bus, |cpu| {
                cpu.regs.x = cpu.regs.x.wrapping_add(1);
                cpu.regs.p.update_nz(cpu.regs.x);
            }),
            0xC8 => self.implied(bus, |cpu| {
                cpu.regs.y = cpu.regs.y.wrapping_add(1);
                cpu.regs.p.update_nz(cpu.regs.y);
            }),
            0xCA => self.implied(bus, |cpu| {
                cpu.regs.x = cpu.regs.x.wrapping_sub(1);
                cpu.regs.p.update_nz(cpu.regs.x);
            }),
            0x88 => self.implied(bus, |cpu| {
                cpu.regs.y = cpu.regs.y.wrapping_sub(1);
                cpu.regs.p.update_nz(cpu.regs.y);
            }),

            // Flags
            0x18 => self.implied(bus, |cpu| cpu.regs.p.set_if(C, false)),
            0x38 => self.implied(bus, |cpu| cpu.regs.p.set_if(C, true)),
            0x58 => self.implied(bus, |cpu| cpu.regs.p.set_if(I, false)),
            0x78 => self.implied(bus, |cpu| cpu.regs.p.set_if(I, true)),
            0xD8 => self.implied(bus, |cpu| cpu.regs.p.set_if(D, false)),
            0xF8 => self.implied(bus, |cpu| cpu.regs.p.set_if(D, true)),

            _ => return false,
        }
        true
    }

    // ========================================================================
    // Addressing modes
    // ========================================================================

    fn imm<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8)) {
        let value = self.fetch(bus);
        op(self, value);
    }

    fn zp_read<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8)) {
        let addr = u16::from(self.fetch(bus));
        let value = self.read(bus, addr);
        op(self, value);
    }

    fn abs_read<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8)) {
        let addr = self.fetch_word(bus);
        let value = self.read(bus, addr);
        op(self, value);
    }

    fn zp_write<B: Bus>(&mut self, bus: &mut B, value: u8) {
        let addr = u16::from(self.fetch(bus));
        self.write(bus, addr, value);
    }

    fn abs_write<B: Bus>(&mut self, bus: &mut B, value: u8) {
        let addr = self.fetch_word(bus);
        self.write(bus, addr, value);
    }

    fn implied<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self)) {
        self.dummy_read(bus);
        op(self);
    }

    // ========================================================================
    // Operations
    // ========================================================================

    fn do_lda(&mut self, value: u8) {
        self.regs.a = value;
        self.regs.p.update_nz(value);
    }

    fn do_ldx(&mut self, value: u8) {
        self.regs.x = value;
        self.regs.p.update_nz(value);
    }

    fn do_ldy(&mut self, value: u8) {
        self.regs.y = value;
        self.regs.p.update_nz(value);
    }

    fn do_bit(&mut self, value: u8) {
        self.regs.p.set_if(Z, self.regs.a & value == 0);
        self.regs.p.set_if(N, value & 0x80 != 0);
        self.regs.p.set_if(V, value & 0x40 != 0);
    }

    fn op_jmp_abs<B: Bus>(&mut self, bus: &mut B) {
        self.regs.pc = self.fetch_word(bus);
    }

    fn op_jsr<B: Bus>(&mut self, bus: &mut B) {
        let lo = self.fetch(bus);
        // Internal cycle: the stack is read while the CPU holds the low byte.
        let _ = self.read(bus, self.regs.stack_addr());
        // The pushed return address points at the high operand byte.
        self.push(bus, (self.regs.pc >> 8) as u8);
        self.push(bus, self.regs.pc as u8);
        let hi = self.read(bus, self.regs.pc);
        self.regs.pc = u16::from_le_bytes([lo, hi]);
    }

    fn op_rts<B: Bus>(&mut self, bus: &mut B) {
        self.dummy_read(bus);
        let _ = self.read(bus, self.regs.stack_addr());
        let lo = self.pull(bus);
        let hi = self.pull(bus);
        let addr = u16::from_le_bytes([lo, hi]);
        let _ = self.read(bus, addr);
        self.regs.pc = addr.wrapping_add(1);
    }

    fn op_branch<B: Bus>(&mut self, bus: &mut B, taken: bool) {
        let offset = self.fetch(bus) as i8;
        if !taken {
            return;
        }
        self.dummy_read(bus);
        let target = self.regs.pc.wrapping_add_signed(i16::from(offset));
        if (target ^ self.regs.pc) & 0xFF00 != 0 {
            // Page crossed: the CPU first reads from the unfixed address.
            let _ = self.read(bus, (self.regs.pc & 0xFF00) | (target & 0x00FF));
        }
        self.regs.pc = target;
    }
}

// ============================================================================
// Trait implementations
// ============================================================================

impl Cpu for Mos6502 {
    type Registers = Registers;

    fn step<B: Bus>(&mut self, bus: &mut B) -> DispatchResult {
        self.step_cycles = 0;
        let opcode_addr = self.regs.pc;
        let opcode = self.fetch(bus);

        let implemented = self.execute(bus, opcode);
        self.total_cycles += self.step_cycles;

        if implemented {
            DispatchResult::ok(self.step_cycles)
        } else {
            // Leave PC on the opcode so a debugger resumes at the offender.
            self.regs.pc = opcode_addr;
            log::debug!("unsupported opcode ${opcode:02X} at ${opcode_addr:04X}");
            DispatchResult::trap(
                self.step_cycles,
                format!("unsupported opcode ${opcode:02X}"),
                opcode_addr,
                true,
            )
        }
    }

    fn reset<B: Bus>(&mut self, bus: &mut B) {
        self.regs = Registers::new();
        self.step_cycles = 0;
        let lo = self.read(bus, RESET_VECTOR);
        let hi = self.read(bus, RESET_VECTOR.wrapping_add(1));
        self.regs.pc = u16::from_le_bytes([lo, hi]);
        self.total_cycles += self.step_cycles;
        self.step_cycles = 0;
    }

    fn pc(&self) -> u16 {
        self.regs.pc
    }

    fn registers(&self) -> Self::Registers {
        self.regs
    }

    fn cycles(&self) -> u64 {
        self.total_cycles
    }
}

impl Observable for Mos6502 {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "pc" => Some(self.regs.pc.into()),
            "a" => Some(self.regs.a.into()),
            "x" => Some(self.regs.x.into()),
            "y" => Some(self.regs.y.into()),
            "s" | "sp" => Some(self.regs.s.into()),
            "p" | "status" => Some(self.regs.p.0.into()),
            "flags.c" => Some(self.regs.p.is_set(C).into()),
            "flags.z" => Some(self.regs.p.is_set(Z).into()),
            "flags.i" => Some(self.regs.p.is_set(I).into()),
            "flags.d" => Some(self.regs.p.is_set(D).into()),
            "flags.v" => Some(self.regs.p.is_set(V).into()),
            "flags.n" => Some(self.regs.p.is_set(N).into()),
            "cycles" => Some(self.total_cycles.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "pc", "a", "x", "y", "s", "p", "flags.c", "flags.z", "flags.i", "flags.d", "flags.v",
            "flags.n", "cycles",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::{DispatchStatus, SimpleBus};

    /// Records every bus access in order.
    struct TraceBus {
        inner: SimpleBus,
        log: Vec<(char, u16)>,
    }

    impl Bus for TraceBus {
        fn read(&mut self, address: u16) -> u8 {
            self.log.push(('r', address));
            self.inner.read(address)
        }

        fn write(&mut self, address: u16, value: u8) {
            self.log.push(('w', address));
            self.inner.write(address, value);
        }
    }

    #[test]
    fn sta_zp_reads_operand_before_writing() {
        let mut bus = TraceBus {
            inner: SimpleBus::new(),
            log: Vec::new(),
        };
        bus.inner.load(0x1000, &[0x85, 0x09]);
        let mut cpu = Mos6502::new();
        cpu.regs.pc = 0x1000;

        let result = cpu.step(&mut bus);

        assert_eq!(result.cycles(), 3);
        assert_eq!(bus.log, vec![('r', 0x1000), ('r', 0x1001), ('w', 0x0009)]);
    }

    #[test]
    fn jsr_pushes_address_of_high_operand_byte() {
        let mut bus = SimpleBus::new();
        bus.load(0x1000, &[0x20, 0x34, 0x12]);
        let mut cpu = Mos6502::new();
        cpu.regs.pc = 0x1000;
        cpu.regs.s = 0xFF;

        let result = cpu.step(&mut bus);

        assert_eq!(result.cycles(), 6);
        assert_eq!(cpu.regs.pc, 0x1234);
        assert_eq!(bus.peek(0x01FF), 0x10);
        assert_eq!(bus.peek(0x01FE), 0x02);
    }

    #[test]
    fn unsupported_opcode_traps_without_advancing() {
        let mut bus = SimpleBus::new();
        bus.load(0x1000, &[0x02]);
        let mut cpu = Mos6502::new();
        cpu.regs.pc = 0x1000;

        let result = cpu.step(&mut bus);

        assert_eq!(result.status(), DispatchStatus::Trap);
        assert_eq!(result.address(), 0x1000);
        assert_eq!(result.message(), "unsupported opcode $02");
        assert_eq!(result.cycles(), 1);
        assert_eq!(cpu.regs.pc, 0x1000);
    }

    #[test]
    fn reset_loads_vector() {
        let mut bus = SimpleBus::new();
        bus.load(RESET_VECTOR, &[0x00, 0xF0]);
        let mut cpu = Mos6502::new();
        cpu.regs.a = 0x55;

        cpu.reset(&mut bus);

        assert_eq!(cpu.pc(), 0xF000);
        assert_eq!(cpu.regs.a, 0);
        assert_eq!(cpu.regs.s, 0xFD);
    }
}
