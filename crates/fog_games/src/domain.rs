//! The abstract domain interface: a factored-observation game exposed as a
//! root outcome distribution over immutable world states.
//!
//! A domain is a value; states are immutable and shared by every tree node
//! that references them. Each transition yields an [`Outcome`]: the next
//! state, one private observation per player, one public observation, and
//! per-turn reward increments.

use std::{any::Any, fmt::Debug, rc::Rc};

use crate::{hashing::HashValue, ActionId, ObservationId, Player, NO_ACTION_ID, NO_OBSERVATION_ID};

/// A domain-defined action. Carries a dense identifier (0..N-1 within the
/// current choice point) and a human-readable label; domain-specific data
/// lives behind the trait.
pub trait Action: Debug {
    fn id(&self) -> ActionId;
    fn label(&self) -> String {
        self.id().to_string()
    }
}

/// A domain-defined observation, identified the same way as actions.
pub trait Observation: Debug {
    fn id(&self) -> ObservationId;
    fn label(&self) -> String {
        self.id().to_string()
    }
}

/// Sentinel action for players who do not act this turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAction;

impl Action for NoAction {
    fn id(&self) -> ActionId {
        NO_ACTION_ID
    }
    fn label(&self) -> String {
        "no-action".to_string()
    }
}

/// Sentinel observation for players who observe nothing this turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObservation;

impl Observation for NoObservation {
    fn id(&self) -> ObservationId {
        NO_OBSERVATION_ID
    }
    fn label(&self) -> String {
        "no-observation".to_string()
    }
}

/// An immutable world state.
pub trait State: Debug {
    /// Players who act in this state. Empty for terminal states and for
    /// "no-op between rounds" states whose transition is driven by chance.
    fn acting_players(&self) -> Vec<Player>;

    /// Must agree with `available_actions(player).len()`; provided
    /// separately so callers can size buffers without materializing actions.
    fn count_available_actions(&self, player: Player) -> usize;

    fn available_actions(&self, player: Player) -> Vec<Rc<dyn Action>>;

    /// Fetch a single action without materializing the full list.
    fn action_by_id(&self, player: Player, id: ActionId) -> Rc<dyn Action> {
        let actions = self.available_actions(player);
        match actions.into_iter().nth(id as usize) {
            Some(action) => action,
            None => unreachable!("action id {} out of range", id),
        }
    }

    /// Apply a joint action vector indexed by player; non-acting players
    /// get the domain's no-action sentinel. Pure: the same inputs produce
    /// the same distribution every time.
    fn perform_actions(&self, actions: &[Rc<dyn Action>]) -> OutcomeDistribution;

    fn is_terminal(&self) -> bool;

    /// Value hash of the state, for interning and debugging. Node identity
    /// does not depend on it.
    fn value_hash(&self) -> HashValue;

    fn as_any(&self) -> &dyn Any;

    /// Value equality; implementations typically downcast via `as_any`.
    fn value_eq(&self, other: &dyn State) -> bool;

    fn description(&self) -> String {
        format!("{:?}", self)
    }
}

/// One atom of a transition distribution.
#[derive(Clone)]
pub struct Outcome {
    pub state: Rc<dyn State>,
    /// Private observation per player.
    pub observations: [Rc<dyn Observation>; 2],
    pub public_observation: Rc<dyn Observation>,
    /// Per-turn reward increments, not cumulative.
    pub rewards: [f64; 2],
}

impl Outcome {
    pub fn new(
        state: Rc<dyn State>,
        observations: [Rc<dyn Observation>; 2],
        public_observation: Rc<dyn Observation>,
        rewards: [f64; 2],
    ) -> Self {
        Self {
            state,
            observations,
            public_observation,
            rewards,
        }
    }
}

impl Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outcome")
            .field("state", &self.state.description())
            .field("observations", &[self.observations[0].id(), self.observations[1].id()])
            .field("public_observation", &self.public_observation.id())
            .field("rewards", &self.rewards)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct OutcomeEntry {
    pub outcome: Outcome,
    pub prob: f64,
}

impl OutcomeEntry {
    /// A deterministic entry with probability one.
    pub fn new(outcome: Outcome) -> Self {
        Self { outcome, prob: 1.0 }
    }

    pub fn with_prob(outcome: Outcome, prob: f64) -> Self {
        Self { outcome, prob }
    }
}

pub type OutcomeDistribution = Vec<OutcomeEntry>;

/// Domain contract check: probabilities of a distribution sum to one.
pub fn is_normalized(distribution: &OutcomeDistribution) -> bool {
    let total: f64 = distribution.iter().map(|e| e.prob).sum();
    approx::relative_eq!(total, 1.0, epsilon = 1e-9)
}

/// A factored-observation game. Immutable once constructed and safely
/// shareable by reference; all tree construction goes through
/// [`root_outcome_distribution`](Domain::root_outcome_distribution) and the
/// states it yields.
pub trait Domain {
    fn root_outcome_distribution(&self) -> OutcomeDistribution;

    /// Bound on the number of state transitions from the root.
    fn max_state_depth(&self) -> usize;

    fn num_players(&self) -> usize {
        2
    }

    fn is_zero_sum(&self) -> bool {
        true
    }

    /// Absolute upper bound on any player's cumulative utility.
    fn max_abs_utility(&self) -> f64;

    fn no_action(&self) -> Rc<dyn Action> {
        Rc::new(NoAction)
    }

    fn no_observation(&self) -> Rc<dyn Observation> {
        Rc::new(NoObservation)
    }

    fn info(&self) -> String;
}
