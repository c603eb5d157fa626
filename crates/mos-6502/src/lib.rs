//! MOS 6502/6507 dispatch core.
//!
//! Each `step()` executes one whole instruction. Every bus access, including
//! the NMOS dummy reads, is counted as one cycle, so the sequence of reads
//! and writes the bus sees is the one real hardware produces: an instruction
//! always reads its opcode and operands before it performs the write it
//! encodes.
//!
//! Only the instruction subset needed to run synthesized cartridge code and
//! small RAM kernels is implemented. Anything else stops the step with a
//! trap instead of guessing.

mod cpu;
pub mod flags;
mod registers;

pub use cpu::{Mos6502, RESET_VECTOR};
pub use flags::Status;
pub use registers::Registers;
