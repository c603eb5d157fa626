//! Core traits and types for cycle-accurate 8-bit emulation.
//!
//! A CPU steps one instruction at a time over a [`Bus`]. Every bus access is
//! one CPU cycle, and each step reports what happened through a
//! [`DispatchResult`].

mod bus;
mod cpu;
mod device;
mod dispatch;
mod observable;
mod system;

pub use bus::{Bus, SimpleBus};
pub use cpu::Cpu;
pub use device::Device;
pub use dispatch::{DispatchResult, DispatchStatus};
pub use observable::{Observable, Value};
pub use system::{ADDRESS_MASK, DeviceId, PAGE_COUNT, PAGE_SIZE, System};
