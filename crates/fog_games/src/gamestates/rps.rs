//! One-shot rock-paper-scissors, the canonical simultaneous-move fixture
//! for the resolving-gadget tests.

use std::{any::Any, rc::Rc};

use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

use crate::{
    domain::{Action, Domain, NoObservation, Observation, Outcome, OutcomeDistribution, OutcomeEntry, State},
    hashing::{self, HashValue},
    ActionId, ObservationId, Player,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum RpsAction {
    Rock,
    Paper,
    Scissors,
}

impl RpsAction {
    /// +1 when `self` beats `other`, -1 when it loses, 0 on a tie.
    fn score_against(self, other: RpsAction) -> f64 {
        match (self as i32 - other as i32 + 3) % 3 {
            0 => 0.0,
            1 => 1.0,
            _ => -1.0,
        }
    }
}

impl Action for RpsAction {
    fn id(&self) -> ActionId {
        *self as ActionId
    }

    fn label(&self) -> String {
        format!("{:?}", self)
    }
}

/// Both moves become public once the round resolves.
#[derive(Debug, Clone, Copy)]
struct RevealObservation {
    moves: [RpsAction; 2],
}

impl Observation for RevealObservation {
    fn id(&self) -> ObservationId {
        self.moves[0] as ObservationId * 3 + self.moves[1] as ObservationId
    }

    fn label(&self) -> String {
        format!("{:?} vs {:?}", self.moves[0], self.moves[1])
    }
}

pub struct RpsDomain;

impl RpsDomain {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}

impl Domain for RpsDomain {
    fn root_outcome_distribution(&self) -> OutcomeDistribution {
        vec![OutcomeEntry::new(Outcome::new(
            Rc::new(RpsState { resolved: false }),
            [Rc::new(NoObservation), Rc::new(NoObservation)],
            Rc::new(NoObservation),
            [0.0, 0.0],
        ))]
    }

    fn max_state_depth(&self) -> usize {
        2
    }

    fn max_abs_utility(&self) -> f64 {
        1.0
    }

    fn info(&self) -> String {
        "Rock-paper-scissors".to_string()
    }
}

#[derive(Debug, Clone, Copy)]
struct RpsState {
    resolved: bool,
}

impl State for RpsState {
    fn acting_players(&self) -> Vec<Player> {
        if self.resolved {
            vec![]
        } else {
            vec![0, 1]
        }
    }

    fn count_available_actions(&self, _player: Player) -> usize {
        3
    }

    fn available_actions(&self, _player: Player) -> Vec<Rc<dyn Action>> {
        vec![
            Rc::new(RpsAction::Rock),
            Rc::new(RpsAction::Paper),
            Rc::new(RpsAction::Scissors),
        ]
    }

    fn perform_actions(&self, actions: &[Rc<dyn Action>]) -> OutcomeDistribution {
        let moves = [
            RpsAction::from_u32(actions[0].id()).unwrap(),
            RpsAction::from_u32(actions[1].id()).unwrap(),
        ];
        let score = moves[0].score_against(moves[1]);
        let reveal = Rc::new(RevealObservation { moves });
        vec![OutcomeEntry::new(Outcome::new(
            Rc::new(RpsState { resolved: true }),
            [reveal.clone(), reveal.clone()],
            reveal,
            [score, -score],
        ))]
    }

    fn is_terminal(&self) -> bool {
        self.resolved
    }

    fn value_hash(&self) -> HashValue {
        hashing::hash_ids(hashing::TREE_SEED, &[self.resolved as u32])
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn value_eq(&self, other: &dyn State) -> bool {
        other
            .as_any()
            .downcast_ref::<RpsState>()
            .map(|o| o.resolved == self.resolved)
            .unwrap_or(false)
    }
}
