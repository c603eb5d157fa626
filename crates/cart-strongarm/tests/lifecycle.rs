//! Failure propagation, shutdown and save states.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use cart_strongarm::{BridgeError, BridgeSnapshot, Console, HandoffState, IMAGE_SIZE, StrongArmCart};
use emu_core::{DispatchStatus, Observable, Value};
use common::MockChip;

#[test]
fn producer_that_never_yields_is_a_stall() {
    let timeout = Duration::from_millis(100);
    let cart = StrongArmCart::new(
        common::config().with_stall_timeout(Some(timeout)),
        Box::new(MockChip::new("TIA")),
        Box::new(MockChip::new("RIOT")),
        |vcs| {
            thread::sleep(Duration::from_millis(500));
            vcs.jmp_start()
        },
    )
    .unwrap();
    let mut console = Console::new(cart);

    let result = console.step_once();

    assert_eq!(result.status(), DispatchStatus::Fatal);
    assert_eq!(console.last_error(), Some(&BridgeError::StallDetected(timeout)));
    let cart = console.cart().unwrap();
    assert_eq!(cart.handoff_state(), HandoffState::ProducerRunning);
    assert_eq!(cart.query("failed"), Some(Value::Bool(true)));

    // Dropping must not wait for the stalled producer.
    let started = Instant::now();
    drop(console);
    assert!(started.elapsed() < Duration::from_millis(400));
}

#[test]
fn producer_returning_ends_the_session() {
    let mut console = common::console(|vcs| {
        vcs.nop()?;
        Ok(())
    });

    let result = console.step_once();
    assert_eq!(result.status(), DispatchStatus::Fatal);
    assert_eq!(result.cycles(), 0);
    assert_eq!(console.last_error(), Some(&BridgeError::ProducerExited));

    // The failure sticks until reset.
    assert_eq!(console.step_once().status(), DispatchStatus::Fatal);
    assert_eq!(console.run(100).status(), DispatchStatus::Fatal);
}

#[test]
fn producer_error_is_reported_verbatim() {
    let mut cart = common::cart(|_| Err(BridgeError::ContractViolation("producer gave up")));
    assert_eq!(
        cart.ensure_started(),
        Err(BridgeError::ContractViolation("producer gave up"))
    );
}

#[test]
fn producer_panic_is_caught() {
    let mut console = common::console(|vcs| {
        vcs.nop()?;
        panic!("synthesis bug");
    });

    let result = console.step_once();

    assert_eq!(result.status(), DispatchStatus::Fatal);
    assert_eq!(
        console.last_error(),
        Some(&BridgeError::ProducerPanicked("synthesis bug".to_string()))
    );
}

#[test]
fn failure_midway_is_fatal_and_keeps_the_cycles() {
    let mut console = common::console(|vcs| {
        vcs.nop()?;
        vcs.jmp_start()?;
        Ok(())
    });

    // Priming turn, then NOP, then JMP hands off to a producer that quits.
    assert_eq!(console.step_once().status(), DispatchStatus::Ok);
    let result = console.step_once();

    assert_eq!(result.status(), DispatchStatus::Fatal);
    assert_eq!(result.cycles(), 3);
    assert_eq!(console.last_error(), Some(&BridgeError::ProducerExited));
}

#[test]
fn reset_recovers_from_a_failed_session() {
    let mut console = common::console(|vcs| {
        vcs.nop()?;
        vcs.jmp_start()?;
        Ok(())
    });
    console.run(100);
    assert!(console.last_error().is_some());

    console.reset();

    assert!(console.last_error().is_none());
    assert!(console.cart().unwrap().failure().is_none());
    assert_eq!(console.step_once().status(), DispatchStatus::Ok);
}

#[test]
fn dropping_a_parked_bridge_joins_the_producer() {
    let mut console = common::console(|vcs| loop {
        vcs.nop()?;
        vcs.jmp_start()?;
    });
    common::run_to_handoff(&mut console, 2);
    drop(console);
}

#[test]
fn dropping_before_priming_is_clean() {
    let cart = common::cart(|vcs| loop {
        vcs.jmp_start()?;
    });
    assert_eq!(cart.handoff_state(), HandoffState::Idle);
    drop(cart);
}

#[test]
fn save_and_load_restart_the_producer() {
    let mut cart = common::cart(|vcs| {
        vcs.lda_imm(0x11)?;
        loop {
            vcs.jmp_start()?;
        }
    });
    cart.ensure_started().unwrap();
    assert!(cart.sync(0x1000).unwrap());

    let snapshot = cart.save().unwrap();
    assert_eq!(snapshot.image.len(), IMAGE_SIZE);
    assert_eq!(snapshot.next_index, 3);
    assert_eq!(snapshot.target, Some(0x1000));
    assert_eq!(&snapshot.image[..3], &[0x4C, 0x00, 0x10]);

    cart.load(&snapshot).unwrap();
    assert_eq!(cart.target(), Some(0x1000));
    assert_eq!(cart.image().unwrap().next_index(), 3);

    // The restarted producer waits for the CPU to reach the restored
    // target, then writes its first burst there.
    cart.ensure_started().unwrap();
    assert_eq!(cart.image().unwrap().next_index(), 3);
    assert!(cart.sync(0x1000).unwrap());
    let image = cart.image().unwrap();
    assert_eq!(&image.as_bytes()[..5], &[0xA9, 0x11, 0x4C, 0x00, 0x10]);
}

#[test]
fn loaded_console_executes_the_restarted_producer() {
    let starts = Arc::new(AtomicU8::new(0));
    let counter = Arc::clone(&starts);
    let mut console = common::console(move |vcs| {
        let start = counter.fetch_add(1, Ordering::SeqCst) + 1;
        vcs.write_zp_imm(0x81, start)?;
        for pass in 1..=u8::MAX {
            vcs.write_zp_imm(0x80, pass)?;
            vcs.jmp_start()?;
        }
        Ok(())
    });
    common::run_to_handoff(&mut console, 2);
    assert_eq!(common::riot(console.cart().unwrap()).byte(0x81), 1);

    let cart = console.cart_mut().unwrap();
    let snapshot = cart.save().unwrap();
    cart.load(&snapshot).unwrap();
    let loaded_at = cart.handoffs();

    // The CPU finishes the restored burst, lands on $1000 and runs the
    // restarted producer's first burst from there.
    common::run_to_handoff(&mut console, loaded_at + 2);

    let cart = console.cart().unwrap();
    assert!(console.last_error().is_none());
    assert_eq!(starts.load(Ordering::SeqCst), 2);
    assert_eq!(common::riot(cart).byte(0x81), 2);
    assert_eq!(common::riot(cart).byte(0x80), 1);
}

#[test]
fn load_rejects_a_malformed_snapshot() {
    let mut cart = common::cart(|vcs| loop {
        vcs.jmp_start()?;
    });
    cart.ensure_started().unwrap();

    let short = BridgeSnapshot {
        image: vec![0; 16],
        next_index: 0,
        target: None,
    };
    assert!(matches!(cart.load(&short), Err(BridgeError::InvalidSnapshot(_))));

    // A rejected load leaves the running bridge alone.
    assert_eq!(cart.target(), Some(0x1000));
    assert!(cart.sync(0x1000).unwrap());
}
