//! Matching pennies in two flavors: alternating moves, where the second
//! player privately observes the first move before acting, and
//! simultaneous moves, where both players commit in the same round.

use std::{any::Any, rc::Rc};

use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

use crate::{
    domain::{Action, Domain, NoObservation, Observation, Outcome, OutcomeDistribution, OutcomeEntry, State},
    hashing::{self, HashValue},
    ActionId, ObservationId, Player,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum MpAction {
    Heads,
    Tails,
}

impl Action for MpAction {
    fn id(&self) -> ActionId {
        *self as ActionId
    }

    fn label(&self) -> String {
        format!("{:?}", self)
    }
}

/// Private observation of the first player's move, delivered to the second
/// player in the alternating variant.
#[derive(Debug, Clone, Copy)]
struct MoveObservation(MpAction);

impl Observation for MoveObservation {
    fn id(&self) -> ObservationId {
        self.0 as ObservationId
    }

    fn label(&self) -> String {
        format!("{:?}", self.0)
    }
}

/// Public result announcement once both pennies are on the table.
#[derive(Debug, Clone, Copy)]
struct ResultObservation {
    winner: Player,
}

impl Observation for ResultObservation {
    fn id(&self) -> ObservationId {
        self.winner as ObservationId
    }

    fn label(&self) -> String {
        format!("Pl{} wins", self.winner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    AlternatingMoves,
    SimultaneousMoves,
}

pub struct MatchingPenniesDomain {
    variant: Variant,
}

impl MatchingPenniesDomain {
    pub fn new(variant: Variant) -> Self {
        Self { variant }
    }
}

impl Domain for MatchingPenniesDomain {
    fn root_outcome_distribution(&self) -> OutcomeDistribution {
        let state = Rc::new(MpState {
            variant: self.variant,
            first_move: None,
        });
        vec![OutcomeEntry::new(Outcome::new(
            state,
            [Rc::new(NoObservation), Rc::new(NoObservation)],
            Rc::new(NoObservation),
            [0.0, 0.0],
        ))]
    }

    fn max_state_depth(&self) -> usize {
        match self.variant {
            Variant::AlternatingMoves => 3,
            Variant::SimultaneousMoves => 2,
        }
    }

    fn max_abs_utility(&self) -> f64 {
        1.0
    }

    fn info(&self) -> String {
        format!("Matching pennies ({:?})", self.variant)
    }
}

#[derive(Debug, Clone)]
struct MpState {
    variant: Variant,
    /// In the alternating variant, the move the first player already made.
    first_move: Option<MpAction>,
}

impl MpState {
    fn payoff(first: MpAction, second: MpAction) -> [f64; 2] {
        if first == second {
            [1.0, -1.0]
        } else {
            [-1.0, 1.0]
        }
    }

    fn terminal_outcome(&self, first: MpAction, second: MpAction) -> OutcomeDistribution {
        let rewards = Self::payoff(first, second);
        let winner = if rewards[0] > 0.0 { 0 } else { 1 };
        let result = Rc::new(ResultObservation { winner });
        vec![OutcomeEntry::new(Outcome::new(
            Rc::new(MpTerminalState),
            [result.clone(), result.clone()],
            result,
            rewards,
        ))]
    }
}

impl State for MpState {
    fn acting_players(&self) -> Vec<Player> {
        match (self.variant, self.first_move) {
            (Variant::SimultaneousMoves, _) => vec![0, 1],
            (Variant::AlternatingMoves, None) => vec![0],
            (Variant::AlternatingMoves, Some(_)) => vec![1],
        }
    }

    fn count_available_actions(&self, _player: Player) -> usize {
        2
    }

    fn available_actions(&self, _player: Player) -> Vec<Rc<dyn Action>> {
        vec![Rc::new(MpAction::Heads), Rc::new(MpAction::Tails)]
    }

    fn perform_actions(&self, actions: &[Rc<dyn Action>]) -> OutcomeDistribution {
        match (self.variant, self.first_move) {
            (Variant::SimultaneousMoves, _) => {
                let first = MpAction::from_u32(actions[0].id()).unwrap();
                let second = MpAction::from_u32(actions[1].id()).unwrap();
                self.terminal_outcome(first, second)
            }
            (Variant::AlternatingMoves, None) => {
                let first = MpAction::from_u32(actions[0].id()).unwrap();
                let state = Rc::new(MpState {
                    variant: self.variant,
                    first_move: Some(first),
                });
                vec![OutcomeEntry::new(Outcome::new(
                    state,
                    [
                        Rc::new(NoObservation) as Rc<dyn Observation>,
                        Rc::new(MoveObservation(first)),
                    ],
                    Rc::new(NoObservation),
                    [0.0, 0.0],
                ))]
            }
            (Variant::AlternatingMoves, Some(first)) => {
                let second = MpAction::from_u32(actions[1].id()).unwrap();
                self.terminal_outcome(first, second)
            }
        }
    }

    fn is_terminal(&self) -> bool {
        false
    }

    fn value_hash(&self) -> HashValue {
        hashing::hash_ids(
            hashing::TREE_SEED,
            &[
                self.variant as u32,
                self.first_move.map(|m| m as u32 + 1).unwrap_or(0),
            ],
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn value_eq(&self, other: &dyn State) -> bool {
        other
            .as_any()
            .downcast_ref::<MpState>()
            .map(|o| o.variant == self.variant && o.first_move == self.first_move)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy)]
struct MpTerminalState;

impl State for MpTerminalState {
    fn acting_players(&self) -> Vec<Player> {
        vec![]
    }

    fn count_available_actions(&self, _player: Player) -> usize {
        0
    }

    fn available_actions(&self, _player: Player) -> Vec<Rc<dyn Action>> {
        vec![]
    }

    fn perform_actions(&self, _actions: &[Rc<dyn Action>]) -> OutcomeDistribution {
        unreachable!("terminal state")
    }

    fn is_terminal(&self) -> bool {
        true
    }

    fn value_hash(&self) -> HashValue {
        hashing::hash_ids(hashing::TREE_SEED, &[u32::MAX - 1])
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn value_eq(&self, other: &dyn State) -> bool {
        other.as_any().downcast_ref::<MpTerminalState>().is_some()
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;
    use crate::{
        cache::InfosetCache,
        efg::{EfgNode, NodeKind},
    };

    #[test]
    fn test_alternating_tree_shape_and_utilities() {
        let mut cache = InfosetCache::new(Rc::new(MatchingPenniesDomain::new(
            Variant::AlternatingMoves,
        )));
        cache.build_tree();

        let nodes = cache.nodes();
        assert_eq!(nodes.len(), 7);
        let terminals = nodes
            .iter()
            .filter(|n| n.kind() == NodeKind::Terminal)
            .collect_vec();
        assert_eq!(terminals.len(), 4);
        assert!(terminals.iter().all(|n| n.depth() == 2));

        let mut utilities = terminals.iter().map(|n| n.utilities()).collect_vec();
        utilities.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(
            utilities,
            vec![[-1.0, 1.0], [-1.0, 1.0], [1.0, -1.0], [1.0, -1.0]]
        );
    }

    #[test]
    fn test_second_player_observes_move_only_when_alternating() {
        let alternating = EfgNode::root(Rc::new(MatchingPenniesDomain::new(
            Variant::AlternatingMoves,
        )));
        let a = alternating.perform_action(&alternating.action_by_id(0));
        let b = alternating.perform_action(&alternating.action_by_id(1));
        assert_ne!(a.aoh_infoset(1), b.aoh_infoset(1));

        let simultaneous = EfgNode::root(Rc::new(MatchingPenniesDomain::new(
            Variant::SimultaneousMoves,
        )));
        let a = simultaneous.perform_action(&simultaneous.action_by_id(0));
        let b = simultaneous.perform_action(&simultaneous.action_by_id(1));
        assert_eq!(a.aoh_infoset(1), b.aoh_infoset(1));
    }
}
