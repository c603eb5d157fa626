//! Shared fixtures: stand-in chips and cartridge builders.

#![allow(dead_code)]

use std::any::Any;
use std::time::Duration;

use cart_strongarm::{BridgeConfig, BridgeError, Console, StrongArmCart, Vcs};
use emu_core::Device;

/// A chip that remembers every byte written to it and logs each write.
pub struct MockChip {
    name: &'static str,
    memory: Box<[u8; 0x2000]>,
    writes: Vec<(u16, u8)>,
    resets: usize,
}

impl MockChip {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            memory: Box::new([0; 0x2000]),
            writes: Vec::new(),
            resets: 0,
        }
    }

    pub fn with_byte(mut self, address: u16, value: u8) -> Self {
        self.memory[usize::from(address & 0x1FFF)] = value;
        self
    }

    pub fn byte(&self, address: u16) -> u8 {
        self.memory[usize::from(address & 0x1FFF)]
    }

    pub fn writes(&self) -> &[(u16, u8)] {
        &self.writes
    }

    pub fn resets(&self) -> usize {
        self.resets
    }
}

impl Device for MockChip {
    fn name(&self) -> &str {
        self.name
    }

    fn reset(&mut self) {
        self.resets += 1;
        self.writes.clear();
    }

    fn peek(&mut self, address: u16) -> u8 {
        self.byte(address)
    }

    fn poke(&mut self, address: u16, value: u8) -> bool {
        self.memory[usize::from(address & 0x1FFF)] = value;
        self.writes.push((address, value));
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub fn config() -> BridgeConfig {
    BridgeConfig::default()
        .with_stall_timeout(Some(Duration::from_secs(5)))
        .with_thread_name("test-producer")
}

pub fn cart<F>(producer: F) -> StrongArmCart
where
    F: Fn(&mut Vcs) -> Result<(), BridgeError> + Send + Sync + 'static,
{
    cart_with_riot(MockChip::new("RIOT"), producer)
}

pub fn cart_with_riot<F>(riot: MockChip, producer: F) -> StrongArmCart
where
    F: Fn(&mut Vcs) -> Result<(), BridgeError> + Send + Sync + 'static,
{
    StrongArmCart::new(config(), Box::new(MockChip::new("TIA")), Box::new(riot), producer)
        .expect("producer thread starts")
}

pub fn console<F>(producer: F) -> Console
where
    F: Fn(&mut Vcs) -> Result<(), BridgeError> + Send + Sync + 'static,
{
    Console::new(cart(producer))
}

pub fn riot(cart: &StrongArmCart) -> &MockChip {
    cart.riot().as_any().downcast_ref().expect("RIOT is a MockChip")
}

pub fn tia(cart: &StrongArmCart) -> &MockChip {
    cart.tia().as_any().downcast_ref().expect("TIA is a MockChip")
}

/// Step until the bridge has completed `handoffs` producer turns.
pub fn run_to_handoff(console: &mut Console, handoffs: u64) {
    for _ in 0..10_000 {
        let cart = console.cart().expect("cartridge installed");
        if cart.handoffs() >= handoffs {
            return;
        }
        let result = console.step_once();
        assert!(result.is_success(), "step failed: {result} ({:?})", console.last_error());
    }
    panic!("bridge never reached {handoffs} handoffs");
}
