//! CPU core trait.

use crate::{Bus, DispatchResult};

/// A CPU core driven one instruction at a time.
///
/// The bus is passed in, not owned, so the machine that owns the CPU can
/// also hand the same bus to other components between steps.
pub trait Cpu {
    /// The type used for register inspection.
    type Registers;

    /// Execute one instruction and report the outcome.
    ///
    /// The returned result is always finalized: `ok`, `trap` or `fatal`,
    /// carrying the number of cycles the step consumed.
    fn step<B: Bus>(&mut self, bus: &mut B) -> DispatchResult;

    /// Reset the CPU, loading the program counter from the reset vector.
    fn reset<B: Bus>(&mut self, bus: &mut B);

    /// Returns the current program counter.
    fn pc(&self) -> u16;

    /// Returns a snapshot of all registers for inspection.
    fn registers(&self) -> Self::Registers;

    /// Total cycles executed since construction.
    fn cycles(&self) -> u64;
}
