//! Bus-stuffing cartridge bridge.
//!
//! A "StrongARM" cartridge does not hold a program. Native producer logic
//! writes 6502 instructions into a 4 KiB [`SyntheticImage`] just ahead of the
//! CPU, then parks until the CPU has executed them. Values the producer
//! already knows are delivered by bus-stuffing: a predicted write replaces
//! whatever value the CPU drives for the store it keys on.
//!
//! The producer runs on its own thread, but the two sides strictly
//! alternate: the image moves between them over a zero-capacity channel, so
//! only one side can touch it at a time.
//!
//! ```no_run
//! use cart_strongarm::{BridgeConfig, Console, StrongArmCart};
//! # use emu_core::Device;
//! # fn chips() -> (Box<dyn Device>, Box<dyn Device>) { unimplemented!() }
//!
//! let (tia, riot) = chips();
//! let cart = StrongArmCart::new(BridgeConfig::default(), tia, riot, |vcs| loop {
//!     vcs.write_zp(0x09, 0x1E)?; // COLUBK
//!     vcs.jmp_start()?;
//! })?;
//! let mut console = Console::new(cart);
//! let result = console.run(76 * 262);
//! # Ok::<(), cart_strongarm::BridgeError>(())
//! ```

mod cart;
mod config;
mod console;
mod error;
mod image;
mod rendezvous;
mod snapshot;
mod stuffing;
mod synth;

pub use cart::StrongArmCart;
pub use config::{BridgeConfig, DEFAULT_STALL_TIMEOUT};
pub use console::Console;
pub use error::BridgeError;
pub use image::{IMAGE_BASE, IMAGE_MASK, IMAGE_SIZE, SyntheticImage, Workspace};
pub use rendezvous::{HandoffState, ProducerSide, StateCell, StepperSide, rendezvous};
pub use snapshot::BridgeSnapshot;
pub use stuffing::{PredictedWrite, PredictedWrites};
pub use synth::{Producer, Vcs};
