//! Bus devices: chips and cartridges that answer for part of the address space.

use std::any::Any;

/// A device that can be installed into a [`System`](crate::System) page table.
///
/// `peek` and `poke` are the bus-side contract: they are called with the
/// 13-bit address the CPU put on the bus, and may have side effects (a chip
/// register read can clear a latch, a cartridge read can switch banks).
pub trait Device {
    /// Short name for diagnostics.
    fn name(&self) -> &str;

    /// Reset to power-on state.
    fn reset(&mut self);

    /// Read the byte at `address`.
    fn peek(&mut self, address: u16) -> u8;

    /// Write `value` at `address`.
    ///
    /// Returns true if the write changed the device's address space (for
    /// example, RAM or a bank switch); false for writes that were absorbed.
    fn poke(&mut self, address: u16, value: u8) -> bool;

    /// Overwrite a byte of the device's backing store without bus side
    /// effects (debugger patches, state restore).
    ///
    /// Returns false if the address is not backed by this device.
    fn patch(&mut self, _address: u16, _value: u8) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
