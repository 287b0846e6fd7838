//! Property-based tests for the state machine
//!
//! Drives whole turns with arbitrary router decisions and checks that every
//! turn terminates within the topology's bound.

use super::*;
use proptest::prelude::*;

fn arb_topology() -> impl Strategy<Value = Topology> {
    prop_oneof![
        Just(Topology::SinglePass),
        (0usize..8).prop_map(|max_cycles| Topology::Chained { max_cycles }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        any::<bool>().prop_map(|needs_operations| Event::Routed { needs_operations }),
        Just(Event::Executed),
        Just(Event::Generated),
    ]
}

fn arb_phase() -> impl Strategy<Value = TurnPhase> {
    prop_oneof![
        (0usize..8).prop_map(|cycle| TurnPhase::Routing { cycle }),
        (0usize..8).prop_map(|cycle| TurnPhase::Executing { cycle }),
        any::<bool>().prop_map(|step_cap_reached| TurnPhase::Generating { step_cap_reached }),
        Just(TurnPhase::Done),
    ]
}

fn execution_bound(topology: Topology) -> usize {
    match topology {
        Topology::SinglePass => 1,
        Topology::Chained { max_cycles } => max_cycles.max(1),
    }
}

/// Run a turn where the router answers from `decisions` (then `false`).
/// Returns executions performed and whether the cap cut the chain.
fn drive(topology: Topology, decisions: &[bool]) -> (usize, bool) {
    let mut phase = TurnPhase::initial();
    let mut effect = Effect::RequestRoute;
    let mut decisions = decisions.iter().copied();
    let mut executions = 0;
    let mut capped = false;

    for _ in 0..64 {
        let event = match effect {
            Effect::RequestRoute => Event::Routed {
                needs_operations: decisions.next().unwrap_or(false),
            },
            Effect::ExecuteOperations => {
                executions += 1;
                Event::Executed
            }
            Effect::RequestGeneration => {
                if let TurnPhase::Generating { step_cap_reached } = phase {
                    capped = step_cap_reached;
                }
                Event::Generated
            }
            Effect::Complete => return (executions, capped),
        };
        let result = transition(phase, event, topology).unwrap();
        phase = result.next;
        effect = result.effect;
    }
    panic!("turn did not terminate");
}

proptest! {
    #[test]
    fn turn_always_terminates_within_bound(
        topology in arb_topology(),
        decisions in proptest::collection::vec(any::<bool>(), 0..12),
    ) {
        let (executions, capped) = drive(topology, &decisions);
        prop_assert!(executions <= execution_bound(topology));
        if capped {
            prop_assert_eq!(executions, execution_bound(topology));
        }
    }

    #[test]
    fn router_that_never_stops_hits_cap(max_cycles in 1usize..8) {
        let topology = Topology::Chained { max_cycles };
        let (executions, capped) = drive(topology, &[true; 16]);
        prop_assert_eq!(executions, max_cycles);
        prop_assert!(capped);
    }

    #[test]
    fn done_is_terminal(event in arb_event(), topology in arb_topology()) {
        prop_assert!(transition(TurnPhase::Done, event, topology).is_err());
    }

    #[test]
    fn transition_is_deterministic(
        phase in arb_phase(),
        event in arb_event(),
        topology in arb_topology(),
    ) {
        prop_assert_eq!(
            transition(phase, event, topology),
            transition(phase, event, topology)
        );
    }

    #[test]
    fn only_generation_completes(
        phase in arb_phase(),
        event in arb_event(),
        topology in arb_topology(),
    ) {
        if let Ok(result) = transition(phase, event, topology) {
            if result.next == TurnPhase::Done {
                prop_assert!(
                    matches!(phase, TurnPhase::Generating { .. }),
                    "reached Done from {:?}",
                    phase
                );
                prop_assert_eq!(event, Event::Generated);
            }
        }
    }
}
