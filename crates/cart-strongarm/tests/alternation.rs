//! Property tests: random bursts run to completion with strict alternation
//! and every store landing the value the producer intended.

mod common;

use std::collections::HashMap;

use cart_strongarm::{BridgeError, HandoffState, Vcs};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Lda(u8),
    Ldx(u8),
    Ldy(u8),
    Sta(u8),
    Stx(u8),
    Sty(u8),
    Write(u8, u8),
    WriteImm(u8, u8),
    Nop(u8),
}

impl Op {
    fn emit(self, vcs: &mut Vcs) -> Result<(), BridgeError> {
        match self {
            Op::Lda(v) => vcs.lda_imm(v),
            Op::Ldx(v) => vcs.ldx_imm(v),
            Op::Ldy(v) => vcs.ldy_imm(v),
            Op::Sta(zp) => vcs.sta_zp(zp),
            Op::Stx(zp) => vcs.stx_zp(zp),
            Op::Sty(zp) => vcs.sty_zp(zp),
            Op::Write(zp, v) => vcs.write_zp(zp, v),
            Op::WriteImm(zp, v) => vcs.write_zp_imm(zp, v),
            Op::Nop(n) => vcs.nop_n(usize::from(n)),
        }
    }
}

/// RIOT RAM only, so stores never reach the TIA or the stack.
fn zp() -> impl Strategy<Value = u8> {
    0x80u8..=0xEF
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<u8>().prop_map(Op::Lda),
        any::<u8>().prop_map(Op::Ldx),
        any::<u8>().prop_map(Op::Ldy),
        zp().prop_map(Op::Sta),
        zp().prop_map(Op::Stx),
        zp().prop_map(Op::Sty),
        (zp(), any::<u8>()).prop_map(|(zp, v)| Op::Write(zp, v)),
        (zp(), any::<u8>()).prop_map(|(zp, v)| Op::WriteImm(zp, v)),
        (0u8..4).prop_map(Op::Nop),
    ]
}

/// What RAM holds after running `ops` `passes` times from power-on.
fn model(ops: &[Op], passes: usize) -> HashMap<u8, u8> {
    let (mut a, mut x, mut y) = (0u8, 0u8, 0u8);
    let mut ram = HashMap::new();
    for _ in 0..passes {
        for &op in ops {
            match op {
                Op::Lda(v) => a = v,
                Op::Ldx(v) => x = v,
                Op::Ldy(v) => y = v,
                Op::Sta(zp) => {
                    ram.insert(zp, a);
                }
                Op::Stx(zp) => {
                    ram.insert(zp, x);
                }
                Op::Sty(zp) => {
                    ram.insert(zp, y);
                }
                Op::Write(zp, v) => {
                    ram.insert(zp, v);
                }
                Op::WriteImm(zp, v) => {
                    a = v;
                    ram.insert(zp, v);
                }
                Op::Nop(_) => {}
            }
        }
    }
    ram
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn bursts_execute_as_synthesized(ops in prop::collection::vec(op(), 1..40)) {
        let burst = ops.clone();
        let mut console = common::console(move |vcs| loop {
            for &op in &burst {
                op.emit(vcs)?;
            }
            vcs.jmp_start()?;
        });

        // Priming turn plus two complete passes.
        common::run_to_handoff(&mut console, 3);

        let cart = console.cart().expect("cartridge installed");
        prop_assert_eq!(cart.handoff_state(), HandoffState::StepperRunning);
        prop_assert!(cart.failure().is_none());

        let riot = common::riot(cart);
        for (zp, value) in model(&ops, 2) {
            prop_assert_eq!(riot.byte(u16::from(zp)), value, "RAM ${:02X}", zp);
        }
    }

    #[test]
    fn stepper_only_sees_its_own_turn(turns in 1u64..12) {
        let mut console = common::console(|vcs| loop {
            vcs.nop()?;
            vcs.jmp_start()?;
        });

        for turn in 1..=turns {
            common::run_to_handoff(&mut console, turn);
            let cart = console.cart().expect("cartridge installed");
            prop_assert_eq!(cart.handoff_state(), HandoffState::StepperRunning);
            prop_assert!(cart.image().is_some(), "stepper holds the image between turns");
        }
    }
}
