//! Loop iteration state machine
//!
//! A pure reducer: [`step`] takes the current [`LoopState`] and one
//! [`LoopInput`] and returns the next state together with at most one
//! emission. Nothing here logs or touches the host.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use flow_core::{NodeEvent, NodeResult};

/// Where the loop stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    /// No items seeded yet
    Empty,
    /// Items seeded, some not yet emitted
    Iterating,
    /// Every item emitted, waiting for the confirming advance
    Exhausted,
    /// Finished signal emitted
    Done,
}

/// Progress of one loop run.
///
/// Invariants: `current_index <= items.len()`, and `is_complete` implies
/// `current_index == items.len()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopState {
    items: Vec<Value>,
    current_index: usize,
    is_complete: bool,
}

impl LoopState {
    /// Zero state of a freshly started instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Next unread position
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn phase(&self) -> LoopPhase {
        if self.is_complete {
            LoopPhase::Done
        } else if self.items.is_empty() {
            LoopPhase::Empty
        } else if self.current_index < self.items.len() {
            LoopPhase::Iterating
        } else {
            LoopPhase::Exhausted
        }
    }
}

/// The parts of an event the loop reacts to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopInput {
    /// A signal arrived on `next`, whatever its value
    pub advance: bool,
    /// `items` from the resolved configuration, when it is an array
    pub seed: Option<Vec<Value>>,
}

impl LoopInput {
    pub fn advance() -> Self {
        Self {
            advance: true,
            seed: None,
        }
    }

    pub fn seed(items: Vec<Value>) -> Self {
        Self {
            advance: false,
            seed: Some(items),
        }
    }

    /// Read the advance signal and seed items out of a host event
    pub fn from_event(event: &NodeEvent) -> Self {
        Self {
            advance: event.has_input("next"),
            seed: event
                .config
                .get("items")
                .and_then(Value::as_array)
                .cloned(),
        }
    }
}

/// Output produced by one step
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEmission {
    Item { item: Value, index: usize },
    Finished,
}

impl LoopEmission {
    /// Tagged output routed by the host
    pub fn to_result(&self) -> NodeResult {
        match self {
            LoopEmission::Item { item, index } => NodeResult::new()
                .with_output("item", item.clone())
                .with_output("index", *index),
            LoopEmission::Finished => NodeResult::new().with_output("finished", true),
        }
    }
}

/// Why a step produced nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    /// Advance arrived before any items were seeded
    AdvanceWithoutItems,
    /// Advance arrived after the finished signal
    AlreadyComplete,
    /// Items are already stored for this run
    AlreadySeeded,
    /// Nothing to act on yet
    AwaitingItems,
}

/// Result of one step
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Emitted(LoopEmission),
    Ignored(Ignored),
}

/// Apply one input to the loop state.
///
/// An advance takes precedence over seed items carried by the same event.
pub fn step(mut state: LoopState, input: &LoopInput) -> (LoopState, StepOutcome) {
    if input.advance {
        return match state.phase() {
            LoopPhase::Done => (state, StepOutcome::Ignored(Ignored::AlreadyComplete)),
            LoopPhase::Empty => (state, StepOutcome::Ignored(Ignored::AdvanceWithoutItems)),
            LoopPhase::Exhausted => {
                state.is_complete = true;
                (state, StepOutcome::Emitted(LoopEmission::Finished))
            }
            LoopPhase::Iterating => {
                let index = state.current_index;
                let item = state.items[index].clone();
                state.current_index += 1;
                (state, StepOutcome::Emitted(LoopEmission::Item { item, index }))
            }
        };
    }

    if state.phase() != LoopPhase::Empty {
        return (state, StepOutcome::Ignored(Ignored::AlreadySeeded));
    }

    let Some(items) = input.seed.as_ref() else {
        return (state, StepOutcome::Ignored(Ignored::AwaitingItems));
    };

    state.items = items.clone();
    match state.items.first().cloned() {
        None => {
            state.is_complete = true;
            (state, StepOutcome::Emitted(LoopEmission::Finished))
        }
        // A single item still waits for one confirming advance
        Some(item) => {
            state.current_index = 1;
            (state, StepOutcome::Emitted(LoopEmission::Item { item, index: 0 }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(state: LoopState, input: LoopInput) -> (LoopState, Option<LoopEmission>) {
        let (state, outcome) = step(state, &input);
        match outcome {
            StepOutcome::Emitted(e) => (state, Some(e)),
            StepOutcome::Ignored(_) => (state, None),
        }
    }

    fn item(value: Value, index: usize) -> Option<LoopEmission> {
        Some(LoopEmission::Item { item: value, index })
    }

    #[test]
    fn test_two_items_then_finished() {
        let (s, e) = run(LoopState::new(), LoopInput::seed(vec![json!("A"), json!("B")]));
        assert_eq!(e, item(json!("A"), 0));
        assert_eq!(s.phase(), LoopPhase::Iterating);

        let (s, e) = run(s, LoopInput::advance());
        assert_eq!(e, item(json!("B"), 1));
        assert_eq!(s.phase(), LoopPhase::Exhausted);
        assert!(!s.is_complete());

        let (s, e) = run(s, LoopInput::advance());
        assert_eq!(e, Some(LoopEmission::Finished));
        assert_eq!(s.phase(), LoopPhase::Done);
        assert_eq!(s.current_index(), 2);
    }

    #[test]
    fn test_empty_seed_finishes_immediately() {
        let (s, e) = run(LoopState::new(), LoopInput::seed(vec![]));
        assert_eq!(e, Some(LoopEmission::Finished));
        assert!(s.is_complete());

        let (s2, e) = run(s.clone(), LoopInput::advance());
        assert_eq!(e, None);
        assert_eq!(s2, s);
    }

    #[test]
    fn test_single_item_needs_confirming_advance() {
        let (s, e) = run(LoopState::new(), LoopInput::seed(vec![json!("X")]));
        assert_eq!(e, item(json!("X"), 0));
        assert_eq!(s.phase(), LoopPhase::Exhausted);
        assert!(!s.is_complete());

        let (s, e) = run(s, LoopInput::advance());
        assert_eq!(e, Some(LoopEmission::Finished));
        assert!(s.is_complete());
    }

    #[test]
    fn test_advance_before_seed_is_ignored() {
        let (s, outcome) = step(LoopState::new(), &LoopInput::advance());
        assert_eq!(outcome, StepOutcome::Ignored(Ignored::AdvanceWithoutItems));
        assert_eq!(s, LoopState::new());
    }

    #[test]
    fn test_advance_wins_over_seed_in_same_event() {
        let input = LoopInput {
            advance: true,
            seed: Some(vec![json!(1)]),
        };
        let (s, outcome) = step(LoopState::new(), &input);
        assert_eq!(outcome, StepOutcome::Ignored(Ignored::AdvanceWithoutItems));
        assert!(s.items().is_empty());
    }

    #[test]
    fn test_reseed_is_ignored() {
        let (s, _) = run(LoopState::new(), LoopInput::seed(vec![json!(1), json!(2), json!(3)]));
        let (s, outcome) = step(s, &LoopInput::seed(vec![json!("other")]));
        assert_eq!(outcome, StepOutcome::Ignored(Ignored::AlreadySeeded));
        assert_eq!(s.items(), &[json!(1), json!(2), json!(3)]);
        assert_eq!(s.current_index(), 1);
    }

    #[test]
    fn test_reseed_after_empty_run_is_ignored() {
        let (s, _) = run(LoopState::new(), LoopInput::seed(vec![]));
        let (s, outcome) = step(s, &LoopInput::seed(vec![json!("late")]));
        assert_eq!(outcome, StepOutcome::Ignored(Ignored::AlreadySeeded));
        assert!(s.items().is_empty());
    }

    #[test]
    fn test_no_signal_no_items_waits() {
        let (s, outcome) = step(LoopState::new(), &LoopInput::default());
        assert_eq!(outcome, StepOutcome::Ignored(Ignored::AwaitingItems));
        assert_eq!(s.phase(), LoopPhase::Empty);
    }

    #[test]
    fn test_finished_only_once() {
        let (mut s, _) = run(LoopState::new(), LoopInput::seed(vec![json!(1)]));
        let mut finished = 0;
        for _ in 0..5 {
            let (next, e) = run(s, LoopInput::advance());
            if e == Some(LoopEmission::Finished) {
                finished += 1;
            }
            s = next;
        }
        assert_eq!(finished, 1);
    }

    #[test]
    fn test_index_is_monotonic_and_bounded() {
        let items: Vec<Value> = (0..7).map(|i| json!({ "n": i })).collect();
        let (mut s, _) = run(LoopState::new(), LoopInput::seed(items.clone()));
        let mut last = s.current_index();
        let mut seen = vec![0];

        for _ in 0..12 {
            let (next, e) = run(s, LoopInput::advance());
            assert!(next.current_index() >= last);
            assert!(next.current_index() <= items.len());
            if let Some(LoopEmission::Item { item, index }) = e {
                assert_eq!(item, items[index]);
                seen.push(index);
            }
            last = next.current_index();
            s = next;
        }
        assert_eq!(seen, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_input_from_event() {
        let event = NodeEvent::new("SIGNAL")
            .with_input("next", Value::Null)
            .with_config(json!({ "items": [1, 2] }));
        let input = LoopInput::from_event(&event);
        assert!(input.advance);
        assert_eq!(input.seed, Some(vec![json!(1), json!(2)]));

        let not_array = NodeEvent::new("SPAWN").with_config(json!({ "items": "nope" }));
        assert_eq!(LoopInput::from_event(&not_array), LoopInput::default());
    }

    #[test]
    fn test_emission_wire_shape() {
        let item = LoopEmission::Item {
            item: json!("A"),
            index: 0,
        };
        assert_eq!(item.to_result().to_value(), json!({"__outputs": {"item": "A", "index": 0}}));
        assert_eq!(
            LoopEmission::Finished.to_result().to_value(),
            json!({"__outputs": {"finished": true}})
        );
    }
}
