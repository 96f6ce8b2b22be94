use std::sync::{Arc, Mutex};
use std::time::Duration;

use proptest::prelude::*;

use quantizer::{CatchUp, ManualClock, OverflowPolicy, Quantizer, QuantizerConfig, UpdateOutcome};

#[derive(Clone, Debug)]
enum Op {
    Push,
    Advance(u64),
    Update,
    ForcedFire,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Push),
        3 => (0u64..40).prop_map(Op::Advance),
        4 => Just(Op::Update),
        1 => Just(Op::ForcedFire),
    ]
}

fn overflow_policy() -> impl Strategy<Value = OverflowPolicy> {
    prop_oneof![
        Just(OverflowPolicy::Unbounded),
        (2usize..6).prop_map(|max_len| OverflowPolicy::DropOldest { max_len }),
        (2usize..6).prop_map(|max_len| OverflowPolicy::DropNewest { max_len }),
    ]
}

fn catch_up_mode() -> impl Strategy<Value = CatchUp> {
    prop_oneof![Just(CatchUp::Skip), Just(CatchUp::Burst)]
}

proptest! {
    #[test]
    fn counters_and_emissions_stay_consistent(
        ops in prop::collection::vec(op(), 0..200),
        overflow in overflow_policy(),
        catch_up in catch_up_mode(),
    ) {
        let cfg = QuantizerConfig { overflow, catch_up, ..Default::default() };
        let clock = ManualClock::new();
        let mut q = Quantizer::with_clock(cfg, clock.clone()).unwrap();

        let emitted = Arc::new(Mutex::new(Vec::<Option<u32>>::new()));
        let sink = emitted.clone();
        q.on_emit(move |v| sink.lock().unwrap().push(v));

        let mut next_id = 0u32;

        for op in ops {
            let before = q.counters();

            match op {
                Op::Push => {
                    q.push(next_id);
                    next_id += 1;
                }
                Op::Advance(ms) => clock.advance(Duration::from_millis(ms)),
                Op::Update => {
                    let was_warm = q.is_warm();
                    let outcome = q.update();
                    let after = q.counters();

                    if !was_warm {
                        prop_assert_eq!(outcome, UpdateOutcome::Cold);
                        prop_assert_eq!(before, after);
                    }
                    let fired = u64::from(outcome.fired());
                    prop_assert_eq!(after.total_emit_opportunities, before.total_emit_opportunities + fired);
                }
                Op::ForcedFire => {
                    prop_assert!(q.process_fire().fired());
                }
            }

            let c = q.counters();
            prop_assert!(c.missed_emit_opportunities <= c.total_emit_opportunities);
            prop_assert_eq!(c.missed_emit_opportunities + c.emitted_states, c.total_emit_opportunities);
            prop_assert!((0.0..=100.0).contains(&q.missed_emit_percentage()));
            prop_assert!(q.average_occupancy() >= 0.0);
            if let Some(max_len) = overflow.max_len() {
                prop_assert!(q.buffered_len() <= max_len);
            }
        }

        let emitted = emitted.lock().unwrap();
        let c = q.counters();
        prop_assert_eq!(emitted.len() as u64, c.total_emit_opportunities);

        let states: Vec<u32> = emitted.iter().flatten().copied().collect();
        prop_assert_eq!(states.len() as u64, c.emitted_states);
        // arrival order is preserved
        prop_assert!(states.windows(2).all(|w| w[0] < w[1]));

        prop_assert_eq!(
            u64::from(next_id),
            c.emitted_states + c.dropped_states + q.buffered_len() as u64
        );
        if overflow == OverflowPolicy::Unbounded {
            prop_assert_eq!(states, (0..c.emitted_states as u32).collect::<Vec<_>>());
        }
    }
}
