//! Liar's Dice LD({d0, d1}, faces): a dice-bidding game. Each player rolls
//! their dice in secret; players then alternate raising the bid (a
//! quantity of one face among all dice in play) until someone calls liar.
//! Every bid is public; the only hidden information is the chance roll at
//! the root.

use std::{any::Any, rc::Rc};

use itertools::Itertools;

use crate::{
    constraints::{BudgetKind, BudgetMeter, ConstrainingDomain, Constraint, ConstraintsMap, NodeEmitter},
    domain::{Action, Domain, NoObservation, Observation, Outcome, OutcomeDistribution, OutcomeEntry, State},
    efg::{EdgeId, EfgNode},
    hashing::{self, HashValue},
    istate::Aoh,
    ActionId, ObservationId, Player, NO_ACTION_ID, NO_OBSERVATION_ID,
};

/// A bid on the outcome of all dice in play; the highest bid value is the
/// liar call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LdAction {
    id: ActionId,
    value: usize,
    max_bid: usize,
}

impl LdAction {
    pub fn value(&self) -> usize {
        self.value
    }

    pub fn is_liar_call(&self) -> bool {
        self.value == self.max_bid
    }
}

impl Action for LdAction {
    fn id(&self) -> ActionId {
        self.id
    }

    fn label(&self) -> String {
        if self.is_liar_call() {
            "Liar!".to_string()
        } else {
            format!("Bid {}", self.value)
        }
    }
}

/// Observation of either a private roll or a public bid. Roll ids are odd,
/// bid ids even, so the two kinds never collide.
#[derive(Debug, Clone)]
enum LdObservation {
    Rolls { rolls: Vec<usize>, faces: usize },
    Bid { value: usize },
}

impl Observation for LdObservation {
    fn id(&self) -> ObservationId {
        match self {
            LdObservation::Rolls { rolls, faces } => {
                let mut id = 0u32;
                let mut jump = 1u32;
                for &roll in rolls {
                    id += roll as u32 * jump;
                    jump *= *faces as u32;
                }
                1 + (id << 1)
            }
            LdObservation::Bid { value } => (*value as u32) << 1,
        }
    }

    fn label(&self) -> String {
        match self {
            LdObservation::Rolls { rolls, .. } => format!("rolled {:?}", rolls),
            LdObservation::Bid { value } => format!("bid {}", value),
        }
    }
}

pub struct LiarsDiceDomain {
    players_dice: [usize; 2],
    faces: usize,
    max_bid: usize,
}

impl LiarsDiceDomain {
    pub fn new(players_dice: [usize; 2], faces: usize) -> Self {
        let sum_dice = players_dice[0] + players_dice[1];
        assert!(sum_dice >= 1);
        assert!(faces >= 2);
        Self {
            players_dice,
            faces,
            max_bid: sum_dice * faces + 1,
        }
    }

    pub fn player_dice(&self, player: Player) -> usize {
        self.players_dice[player]
    }

    pub fn faces(&self) -> usize {
        self.faces
    }

    /// Bid values run 1..max_bid; the value max_bid is the liar call.
    pub fn max_bid(&self) -> usize {
        self.max_bid
    }

    /// All distinct sorted rolls of `dice` dice, descending within a roll.
    fn enumerate_rolls(&self, dice: usize) -> Vec<Vec<usize>> {
        let mut rolls = vec![];
        let mut current = vec![];
        self.roll_backtrack(dice, self.faces - 1, &mut current, &mut rolls);
        rolls
    }

    fn roll_backtrack(
        &self,
        remaining: usize,
        limit: usize,
        current: &mut Vec<usize>,
        out: &mut Vec<Vec<usize>>,
    ) {
        if remaining == 0 {
            out.push(current.clone());
            return;
        }
        for face in (0..=limit).rev() {
            current.push(face);
            self.roll_backtrack(remaining - 1, face, current, out);
            current.pop();
        }
    }
}

/// Number of distinct orderings in which the dice can produce the given
/// (sorted) roll.
fn roll_combinations(rolls: &[usize]) -> f64 {
    let mut remaining = rolls.len();
    let mut combinations = 1.0;
    for (_, group) in &rolls.iter().group_by(|&&f| f) {
        let streak = group.count();
        combinations *= binomial(remaining, streak);
        remaining -= streak;
    }
    combinations
}

fn binomial(n: usize, k: usize) -> f64 {
    let mut result = 1.0;
    for i in 0..k {
        result *= (n - i) as f64 / (i + 1) as f64;
    }
    result
}

impl Domain for LiarsDiceDomain {
    fn root_outcome_distribution(&self) -> OutcomeDistribution {
        let base = 1.0 / (self.faces as f64).powi((self.players_dice[0] + self.players_dice[1]) as i32);
        let mut outcomes = OutcomeDistribution::new();
        for roll0 in self.enumerate_rolls(self.players_dice[0]) {
            for roll1 in self.enumerate_rolls(self.players_dice[1]) {
                let prob = base * roll_combinations(&roll0) * roll_combinations(&roll1);
                let obs = [&roll0, &roll1].map(|rolls| -> Rc<dyn Observation> {
                    if rolls.is_empty() {
                        Rc::new(NoObservation)
                    } else {
                        Rc::new(LdObservation::Rolls {
                            rolls: rolls.clone(),
                            faces: self.faces,
                        })
                    }
                });
                let state = Rc::new(LdState {
                    current_bid: 0,
                    current_player: 0,
                    rolls: [roll0.clone(), roll1.clone()],
                    faces: self.faces,
                    max_bid: self.max_bid,
                });
                outcomes.push(OutcomeEntry::with_prob(
                    Outcome::new(state, obs, Rc::new(NoObservation), [0.0, 0.0]),
                    prob,
                ));
            }
        }
        outcomes
    }

    fn max_state_depth(&self) -> usize {
        (self.players_dice[0] + self.players_dice[1]) * self.faces + 2
    }

    fn max_abs_utility(&self) -> f64 {
        1.0
    }

    fn info(&self) -> String {
        format!(
            "Liars Dice, player dice {:?}, {} faces",
            self.players_dice, self.faces
        )
    }
}

#[derive(Debug, Clone)]
struct LdState {
    current_bid: usize,
    current_player: Player,
    rolls: [Vec<usize>; 2],
    faces: usize,
    max_bid: usize,
}

impl LdState {
    /// Whether the challenged bid fails to hold on the actual rolls.
    fn is_liar_call_successful(&self) -> bool {
        let desired_face = (self.current_bid - 1) % self.faces;
        let desired_amount = 1 + (self.current_bid - 1) / self.faces;
        let actual = self
            .rolls
            .iter()
            .flatten()
            .filter(|&&f| f == desired_face)
            .count();
        actual < desired_amount
    }

    fn bid_value(&self, id: ActionId) -> usize {
        if self.current_bid == 0 {
            id as usize + 1
        } else {
            self.current_bid + 1 + id as usize
        }
    }
}

impl State for LdState {
    fn acting_players(&self) -> Vec<Player> {
        if self.is_terminal() {
            vec![]
        } else {
            vec![self.current_player]
        }
    }

    fn count_available_actions(&self, player: Player) -> usize {
        if player != self.current_player {
            return 0;
        }
        if self.current_bid == 0 {
            // the opening move cannot call liar
            self.max_bid - 1
        } else {
            self.max_bid - self.current_bid
        }
    }

    fn available_actions(&self, player: Player) -> Vec<Rc<dyn Action>> {
        (0..self.count_available_actions(player))
            .map(|id| {
                Rc::new(LdAction {
                    id: id as ActionId,
                    value: self.bid_value(id as ActionId),
                    max_bid: self.max_bid,
                }) as Rc<dyn Action>
            })
            .collect()
    }

    fn perform_actions(&self, actions: &[Rc<dyn Action>]) -> OutcomeDistribution {
        let new_bid = self.bid_value(actions[self.current_player].id());
        let state = Rc::new(LdState {
            current_bid: new_bid,
            current_player: 1 - self.current_player,
            rolls: self.rolls.clone(),
            faces: self.faces,
            max_bid: self.max_bid,
        });
        let mut rewards = [0.0, 0.0];
        if state.is_terminal() {
            let caller_wins = self.is_liar_call_successful();
            let caller = self.current_player;
            let winner = if caller_wins { caller } else { 1 - caller };
            rewards[winner] = 1.0;
            rewards[1 - winner] = -1.0;
        }
        let bid: Rc<dyn Observation> = Rc::new(LdObservation::Bid { value: new_bid });
        vec![OutcomeEntry::new(Outcome::new(
            state,
            [bid.clone(), bid.clone()],
            bid,
            rewards,
        ))]
    }

    fn is_terminal(&self) -> bool {
        self.current_bid == self.max_bid
    }

    fn value_hash(&self) -> HashValue {
        let mut ids = vec![
            self.current_bid as u32,
            self.current_player as u32,
        ];
        for rolls in &self.rolls {
            ids.push(u32::MAX);
            ids.extend(rolls.iter().map(|&f| f as u32));
        }
        hashing::hash_ids(hashing::TREE_SEED, &ids)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn value_eq(&self, other: &dyn State) -> bool {
        other
            .as_any()
            .downcast_ref::<LdState>()
            .map(|o| {
                o.current_bid == self.current_bid
                    && o.current_player == self.current_player
                    && o.rolls == self.rolls
            })
            .unwrap_or(false)
    }
}

/// The target player's own roll, extracted from the chance edge of their
/// information set.
#[derive(Debug, Clone)]
struct OwnRollConstraint {
    observation: ObservationId,
}

impl Constraint for OwnRollConstraint {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ConstrainingDomain for LiarsDiceDomain {
    fn update_constraints(
        &self,
        infoset: &Aoh,
        start_index: &mut i64,
        constraints: &mut ConstraintsMap,
    ) -> bool {
        // nothing beyond the root roll is ever hidden; bids are public
        if *start_index < 1 {
            if let Some(first) = infoset.history().first() {
                constraints.insert(
                    0,
                    Box::new(OwnRollConstraint {
                        observation: first.observation,
                    }),
                );
            }
        }
        *start_index = infoset.len() as i64;
        true
    }

    fn generate_nodes(
        self: Rc<Self>,
        infoset: &Aoh,
        constraints: &ConstraintsMap,
        budget_kind: BudgetKind,
        budget: usize,
        emit: &mut NodeEmitter,
    ) {
        let own_roll = constraints
            .get(&0)
            .and_then(|c| c.as_any().downcast_ref::<OwnRollConstraint>())
            .map(|c| c.observation);
        let player = infoset.player();

        let root = EfgNode::root(self.clone() as Rc<dyn Domain>);
        let mut meter = BudgetMeter::new(budget_kind, budget);
        let outcome_count = root.count_available_actions();
        for edge in 0..outcome_count {
            if !meter.has_room() {
                return;
            }
            let mut node = root.perform_action(&root.action_by_id(edge as EdgeId));
            let rolled = node.ao_ids(player)[0].observation;
            if own_roll.map(|obs| obs != rolled).unwrap_or(false) {
                continue;
            }

            // replay the public bid sequence recorded in the infoset
            let mut current_bid = 0usize;
            for pair in &infoset.history()[1..] {
                let id = if pair.action != NO_ACTION_ID {
                    pair.action
                } else {
                    debug_assert_ne!(pair.observation, NO_OBSERVATION_ID);
                    let value = (pair.observation >> 1) as usize;
                    if current_bid == 0 {
                        (value - 1) as ActionId
                    } else {
                        (value - current_bid - 1) as ActionId
                    }
                };
                node = node.perform_action(&node.action_by_id(id));
                current_bid = (node.ao_ids(player).last().unwrap().observation >> 1) as usize;
            }

            let keep_going = emit(node);
            if !keep_going || !meter.consume() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        cache::InfosetCache,
        stats::{calculate_domain_statistics, DomainStatistics},
    };

    #[test]
    fn test_root_distribution_probabilities() {
        let domain = LiarsDiceDomain::new([2, 0], 2);
        let outcomes = domain.root_outcome_distribution();
        // two 2-faced dice: double faces at 1/4 each, the mixed roll at 1/2
        assert_eq!(outcomes.len(), 3);
        let total: f64 = outcomes.iter().map(|e| e.prob).sum();
        assert_relative_eq!(total, 1.0);
        let mixed = outcomes.iter().filter(|e| e.prob == 0.5).count();
        assert_eq!(mixed, 1);
    }

    #[test]
    fn test_liar_call_resolution() {
        // player 0 rolled two zeros and opens with "one die shows zero"
        let state = LdState {
            current_bid: 1,
            current_player: 1,
            rolls: [vec![0, 0], vec![]],
            faces: 2,
            max_bid: 5,
        };
        // the bid holds, so calling liar now would fail
        assert!(!state.is_liar_call_successful());

        let state = LdState {
            current_bid: 2,
            current_player: 1,
            rolls: [vec![0, 0], vec![]],
            faces: 2,
            max_bid: 5,
        };
        // "one die shows one" does not hold
        assert!(state.is_liar_call_successful());
    }

    #[test]
    fn test_small_game_statistics() {
        let stats = calculate_domain_statistics(Rc::new(LiarsDiceDomain::new([1, 0], 2)));
        assert_eq!(
            stats,
            DomainStatistics {
                max_efg_depth: 4,
                max_state_depth: 4,
                num_nodes: 15,
                num_terminals: 6,
                num_histories: [4, 4],
                num_infosets: [4, 2],
                num_sequences: [7, 4],
                num_public_states: 8,
            }
        );
    }

    #[test]
    fn test_reference_game_statistics() {
        let stats = calculate_domain_statistics(Rc::new(LiarsDiceDomain::new([2, 0], 2)));
        assert_eq!(
            stats,
            DomainStatistics {
                max_efg_depth: 6,
                max_state_depth: 6,
                num_nodes: 94,
                num_terminals: 45,
                num_histories: [24, 24],
                num_infosets: [24, 8],
                num_sequences: [46, 16],
                num_public_states: 32,
            }
        );
    }

    #[test]
    fn test_generated_nodes_match_cache() {
        let domain = Rc::new(LiarsDiceDomain::new([2, 0], 2));
        let mut cache = InfosetCache::new(domain.clone());
        cache.build_tree();

        // the roller's infoset pins the world to a single history
        let root = cache.root().clone();
        let first = cache.child(&root, 1);
        let roller_infoset = cache.infoset_for(&first);
        assert_eq!(cache.nodes_in(&roller_infoset).len(), 1);

        // the blind bidder's infoset spans all three rolls
        let second = cache.child(&first, 0);
        let blind_infoset = cache.infoset_for(&second);
        let expected = cache.nodes_in(&blind_infoset);
        assert_eq!(expected.len(), 3);

        let mut constraints = ConstraintsMap::default();
        let mut index = 0i64;
        assert!(domain.update_constraints(&blind_infoset, &mut index, &mut constraints));
        assert_eq!(index, blind_infoset.len() as i64);

        let mut generated = vec![];
        domain.clone().generate_nodes(
            &blind_infoset,
            &constraints,
            BudgetKind::Nodes,
            expected.len() + 1,
            &mut |node| {
                generated.push(node);
                true
            },
        );
        assert_eq!(generated.len(), 3);
        for node in &generated {
            assert!(expected.iter().any(|e| e == node));
        }

        // a tighter budget yields a strict subset
        let mut capped = vec![];
        domain
            .clone()
            .generate_nodes(&blind_infoset, &constraints, BudgetKind::Nodes, 2, &mut |node| {
                capped.push(node);
                true
            });
        assert_eq!(capped.len(), 2);
    }
}
