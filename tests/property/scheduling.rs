//! Properties of the decomposer, the batch planner and the state machine.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use strata::hierarchy::{SubUnitDraft, Unit, UnitOutline};
use strata::plan::{decompose, plan_batches};
use strata::scheduler::{BatchStateMachine, PipelineState};
use strata::types::UnitKey;

fn hierarchy(sizes: &[usize]) -> Vec<Unit> {
    sizes
        .iter()
        .enumerate()
        .map(|(m, &n)| {
            Unit::from_drafts(
                m,
                &UnitOutline::new(format!("u{m}"), ""),
                (0..n).map(|s| SubUnitDraft::new(format!("s{s}"), "")),
            )
        })
        .collect()
}

fn sizes_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..7, 0..9)
}

proptest! {
    #[test]
    fn batches_cover_every_sub_unit_exactly_once(sizes in sizes_strategy(), k in 1usize..6) {
        let units = hierarchy(&sizes);
        let plan = plan_batches(decompose(&units), k).unwrap();

        let expected: HashSet<UnitKey> = sizes
            .iter()
            .enumerate()
            .flat_map(|(m, &n)| (0..n).map(move |s| UnitKey::new(m, s)))
            .collect();
        let planned: Vec<UnitKey> = plan.ordered_keys().collect();
        let unique: HashSet<UnitKey> = planned.iter().copied().collect();

        prop_assert_eq!(planned.len(), unique.len());
        prop_assert_eq!(unique, expected);
        prop_assert!(plan.batches.iter().all(|b| !b.is_empty() && b.len() <= k));
        let n = plan.total_items();
        prop_assert_eq!(plan.len(), n.div_ceil(k));
    }

    #[test]
    fn positions_within_a_unit_increase_with_sub_id(sizes in sizes_strategy(), k in 1usize..6) {
        let units = hierarchy(&sizes);
        let plan = plan_batches(decompose(&units), k).unwrap();

        let mut last_sub: HashMap<usize, usize> = HashMap::new();
        for key in plan.ordered_keys() {
            if let Some(prev) = last_sub.insert(key.module_id, key.sub_id) {
                prop_assert!(key.sub_id > prev);
            }
        }
    }

    #[test]
    fn first_sub_units_lead_the_ordering(sizes in sizes_strategy(), k in 1usize..6) {
        let units = hierarchy(&sizes);
        let plan = plan_batches(decompose(&units), k).unwrap();
        let non_empty: Vec<usize> = sizes
            .iter()
            .enumerate()
            .filter(|&(_, &n)| n > 0)
            .map(|(m, _)| m)
            .collect();

        let leading: Vec<UnitKey> = plan.ordered_keys().take(non_empty.len()).collect();
        let expected: Vec<UnitKey> = non_empty.iter().map(|&m| UnitKey::new(m, 0)).collect();
        prop_assert_eq!(leading, expected);
    }

    #[test]
    fn planning_is_deterministic(sizes in sizes_strategy(), k in 1usize..6) {
        let units = hierarchy(&sizes);
        let a = plan_batches(decompose(&units), k).unwrap();
        let b = plan_batches(decompose(&units), k).unwrap();
        prop_assert_eq!(a.fingerprint(), b.fingerprint());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn state_machine_runs_one_cycle_per_batch(sizes in sizes_strategy(), k in 1usize..6) {
        let units = hierarchy(&sizes);
        let plan = plan_batches(decompose(&units), k).unwrap();
        let n = plan.total_items();
        prop_assume!(n > 0);

        let mut state = PipelineState::new(plan);
        let mut machine = BatchStateMachine::new();
        let mut cycles = 0;
        while !machine.is_terminal() {
            cycles += 1;
            machine.advance(&mut state);
            prop_assert!(cycles <= n);
        }
        prop_assert_eq!(cycles, n.div_ceil(k));
    }
}
