//! Goofspiel with incomplete observations, IIGS(n): prizes 1..n are
//! auctioned in fixed ascending order; each round both players secretly
//! bid one card from their hand 1..n and the higher card takes the prize.
//! Players observe only win / draw / loss, never the opponent's card, and
//! the round result is also the public observation.

use std::{any::Any, rc::Rc};

use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

use crate::{
    constraints::{BudgetKind, BudgetMeter, ConstrainingDomain, Constraint, ConstraintsMap, NodeEmitter},
    domain::{Action, Domain, NoObservation, Observation, Outcome, OutcomeDistribution, OutcomeEntry, State},
    efg::{EdgeId, EfgNode},
    hashing::{self, HashValue},
    istate::Aoh,
    ActionId, ObservationId, Player, NO_ACTION_ID, NO_OBSERVATION_ID,
};

/// Cards are 1-based; a hand is a bitmask with bit `card - 1` set.
pub type CardSet = u32;

pub fn full_hand(num_cards: usize) -> CardSet {
    (1 << num_cards) - 1
}

fn card_at(hand: CardSet, index: usize) -> u32 {
    let mut remaining = hand;
    for _ in 0..index {
        remaining &= remaining - 1;
    }
    debug_assert_ne!(remaining, 0, "card index out of range");
    remaining.trailing_zeros() + 1
}

fn index_of(hand: CardSet, card: u32) -> usize {
    debug_assert!(hand & (1 << (card - 1)) != 0, "card not in hand");
    (hand & ((1 << (card - 1)) - 1)).count_ones() as usize
}

fn without(hand: CardSet, card: u32) -> CardSet {
    hand & !(1 << (card - 1))
}

#[derive(Debug, Clone, Copy)]
pub struct GoofspielAction {
    id: ActionId,
    card: u32,
}

impl GoofspielAction {
    pub fn card(&self) -> u32 {
        self.card
    }
}

impl Action for GoofspielAction {
    fn id(&self) -> ActionId {
        self.id
    }

    fn label(&self) -> String {
        format!("Play {}", self.card)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum RoundResult {
    Pl0Win,
    Draw,
    Pl0Loss,
}

impl RoundResult {
    fn of(card0: u32, card1: u32) -> Self {
        match card0.cmp(&card1) {
            std::cmp::Ordering::Greater => RoundResult::Pl0Win,
            std::cmp::Ordering::Equal => RoundResult::Draw,
            std::cmp::Ordering::Less => RoundResult::Pl0Loss,
        }
    }

    /// Whether the result is possible when player 0 plays `card0` and
    /// player 1 plays `card1`.
    fn admits(self, card0: u32, card1: u32) -> bool {
        RoundResult::of(card0, card1) == self
    }
}

#[derive(Debug, Clone, Copy)]
struct ResultObservation(RoundResult);

impl Observation for ResultObservation {
    fn id(&self) -> ObservationId {
        self.0 as ObservationId
    }

    fn label(&self) -> String {
        format!("{:?}", self.0)
    }
}

pub struct GoofspielDomain {
    num_cards: usize,
}

impl GoofspielDomain {
    /// Incomplete-observation Goofspiel over `num_cards` cards with the
    /// fixed natural prize order.
    pub fn iigs(num_cards: usize) -> Self {
        assert!((1..=13).contains(&num_cards));
        Self { num_cards }
    }

    pub fn num_cards(&self) -> usize {
        self.num_cards
    }
}

impl Domain for GoofspielDomain {
    fn root_outcome_distribution(&self) -> OutcomeDistribution {
        let state = Rc::new(GoofspielState {
            num_cards: self.num_cards,
            round: 0,
            hands: [full_hand(self.num_cards); 2],
        });
        vec![OutcomeEntry::new(Outcome::new(
            state,
            [Rc::new(NoObservation), Rc::new(NoObservation)],
            Rc::new(NoObservation),
            [0.0, 0.0],
        ))]
    }

    fn max_state_depth(&self) -> usize {
        self.num_cards + 1
    }

    fn max_abs_utility(&self) -> f64 {
        (self.num_cards * (self.num_cards + 1) / 2) as f64
    }

    fn info(&self) -> String {
        format!("IIGS({})", self.num_cards)
    }
}

#[derive(Debug, Clone)]
struct GoofspielState {
    num_cards: usize,
    round: usize,
    hands: [CardSet; 2],
}

impl GoofspielState {
    fn prize(&self) -> u32 {
        self.round as u32 + 1
    }
}

impl State for GoofspielState {
    fn acting_players(&self) -> Vec<Player> {
        if self.is_terminal() {
            vec![]
        } else {
            vec![0, 1]
        }
    }

    fn count_available_actions(&self, player: Player) -> usize {
        self.hands[player].count_ones() as usize
    }

    fn available_actions(&self, player: Player) -> Vec<Rc<dyn Action>> {
        (0..self.count_available_actions(player))
            .map(|id| {
                Rc::new(GoofspielAction {
                    id: id as ActionId,
                    card: card_at(self.hands[player], id),
                }) as Rc<dyn Action>
            })
            .collect()
    }

    fn perform_actions(&self, actions: &[Rc<dyn Action>]) -> OutcomeDistribution {
        let cards = [
            card_at(self.hands[0], actions[0].id() as usize),
            card_at(self.hands[1], actions[1].id() as usize),
        ];
        let result = RoundResult::of(cards[0], cards[1]);
        let prize = self.prize() as f64;
        let rewards = match result {
            RoundResult::Pl0Win => [prize, -prize],
            RoundResult::Draw => [0.0, 0.0],
            RoundResult::Pl0Loss => [-prize, prize],
        };
        let state = Rc::new(GoofspielState {
            num_cards: self.num_cards,
            round: self.round + 1,
            hands: [
                without(self.hands[0], cards[0]),
                without(self.hands[1], cards[1]),
            ],
        });
        let observation = Rc::new(ResultObservation(result));
        vec![OutcomeEntry::new(Outcome::new(
            state,
            [observation.clone(), observation.clone()],
            observation,
            rewards,
        ))]
    }

    fn is_terminal(&self) -> bool {
        self.round == self.num_cards
    }

    fn value_hash(&self) -> HashValue {
        hashing::hash_ids(
            hashing::TREE_SEED,
            &[self.round as u32, self.hands[0], self.hands[1]],
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn value_eq(&self, other: &dyn State) -> bool {
        other
            .as_any()
            .downcast_ref::<GoofspielState>()
            .map(|o| {
                o.num_cards == self.num_cards && o.round == self.round && o.hands == self.hands
            })
            .unwrap_or(false)
    }
}

/// One completed round as the target player experienced it.
#[derive(Debug, Clone)]
struct RoundConstraint {
    own_card: u32,
    result: RoundResult,
}

impl Constraint for RoundConstraint {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// What the target player's information set reveals: completed-round
/// constraints plus, mid-round, the card they have already committed.
struct ParsedInfoset {
    constraints: Vec<RoundConstraint>,
    pending_own_card: Option<u32>,
    /// Whether the infoset ends on an edge where the opponent has moved
    /// and the target player is to act.
    opponent_moved_unobserved: bool,
}

fn parse_infoset(infoset: &Aoh, num_cards: usize) -> ParsedInfoset {
    let mut hand = full_hand(num_cards);
    let mut constraints = vec![];
    let mut pending: Option<u32> = None;

    for pair in infoset.history() {
        if pair.action != NO_ACTION_ID {
            pending = Some(card_at(hand, pair.action as usize));
        }
        if pair.observation != NO_OBSERVATION_ID {
            let result = RoundResult::from_u32(pair.observation).unwrap();
            let own_card = pending.take().expect("result without a committed card");
            hand = without(hand, own_card);
            constraints.push(RoundConstraint { own_card, result });
        }
    }

    // a trailing quiet pair means the opponent committed a card this
    // player cannot see (player 1 waiting on player 0's hidden move)
    let opponent_moved_unobserved = matches!(
        infoset.history().last(),
        Some(p) if p.action == NO_ACTION_ID && p.observation == NO_OBSERVATION_ID
    );

    ParsedInfoset {
        constraints,
        pending_own_card: pending,
        opponent_moved_unobserved,
    }
}

impl ConstrainingDomain for GoofspielDomain {
    fn update_constraints(
        &self,
        infoset: &Aoh,
        start_index: &mut i64,
        constraints: &mut ConstraintsMap,
    ) -> bool {
        // re-parse from the start; rounds already present are overwritten
        // with identical values
        let parsed = parse_infoset(infoset, self.num_cards);
        for (round, constraint) in parsed.constraints.into_iter().enumerate() {
            constraints.insert(round, Box::new(constraint));
        }
        *start_index = infoset.len() as i64;

        // realizable iff some assignment of distinct opponent cards
        // satisfies every completed round
        let rounds = round_constraints(constraints);
        let mut opponent_hand = full_hand(self.num_cards);
        satisfiable_recursive(infoset.player(), &rounds, 0, &mut opponent_hand)
    }

    fn generate_nodes(
        self: Rc<Self>,
        infoset: &Aoh,
        constraints: &ConstraintsMap,
        budget_kind: BudgetKind,
        budget: usize,
        emit: &mut NodeEmitter,
    ) {
        let player = infoset.player();
        let parsed = parse_infoset(infoset, self.num_cards);
        let rounds = round_constraints(constraints);
        debug_assert_eq!(rounds.len(), parsed.constraints.len());

        let root = EfgNode::root(self.clone() as Rc<dyn Domain>);
        let mut meter = BudgetMeter::new(budget_kind, budget);
        let mut opponent_hand = full_hand(self.num_cards);
        let mut own_hand = full_hand(self.num_cards);

        generate_recursive(
            player,
            &rounds,
            &parsed,
            0,
            root,
            &mut own_hand,
            &mut opponent_hand,
            &mut meter,
            emit,
        );
    }
}

fn round_constraints(constraints: &ConstraintsMap) -> Vec<RoundConstraint> {
    let mut rounds = vec![];
    for round in 0..constraints.len() {
        match constraints
            .get(&round)
            .and_then(|c| c.as_any().downcast_ref::<RoundConstraint>())
        {
            Some(constraint) => rounds.push(constraint.clone()),
            None => break,
        }
    }
    rounds
}

fn satisfiable_recursive(
    player: Player,
    rounds: &[RoundConstraint],
    index: usize,
    opponent_hand: &mut CardSet,
) -> bool {
    if index == rounds.len() {
        return true;
    }
    let constraint = &rounds[index];
    for i in 0..opponent_hand.count_ones() as usize {
        let opp = card_at(*opponent_hand, i);
        let (card0, card1) = if player == 0 {
            (constraint.own_card, opp)
        } else {
            (opp, constraint.own_card)
        };
        if !constraint.result.admits(card0, card1) {
            continue;
        }
        *opponent_hand = without(*opponent_hand, opp);
        let found = satisfiable_recursive(player, rounds, index + 1, opponent_hand);
        *opponent_hand |= 1 << (opp - 1);
        if found {
            return true;
        }
    }
    false
}

#[allow(clippy::too_many_arguments)]
fn generate_recursive(
    player: Player,
    rounds: &[RoundConstraint],
    parsed: &ParsedInfoset,
    index: usize,
    node: Rc<EfgNode>,
    own_hand: &mut CardSet,
    opponent_hand: &mut CardSet,
    meter: &mut BudgetMeter,
    emit: &mut NodeEmitter,
) -> bool {
    if index == rounds.len() {
        return emit_tail(player, parsed, node, *own_hand, *opponent_hand, meter, emit);
    }

    let constraint = &rounds[index];
    let own = constraint.own_card;
    for i in 0..opponent_hand.count_ones() as usize {
        let opp = card_at(*opponent_hand, i);
        let (card0, card1) = if player == 0 { (own, opp) } else { (opp, own) };
        if !constraint.result.admits(card0, card1) {
            continue;
        }

        let (hand0, hand1) = if player == 0 {
            (*own_hand, *opponent_hand)
        } else {
            (*opponent_hand, *own_hand)
        };
        let first = node.perform_action(&node.action_by_id(index_of(hand0, card0) as EdgeId));
        let second = first.perform_action(&first.action_by_id(index_of(hand1, card1) as EdgeId));

        *own_hand = without(*own_hand, own);
        *opponent_hand = without(*opponent_hand, opp);
        let keep_going = generate_recursive(
            player,
            rounds,
            parsed,
            index + 1,
            second,
            own_hand,
            opponent_hand,
            meter,
            emit,
        );
        *own_hand |= 1 << (own - 1);
        *opponent_hand |= 1 << (opp - 1);
        if !keep_going {
            return false;
        }
    }
    true
}

/// Emit the nodes at the end of the replay: either the node itself, or the
/// mid-round extensions when the infoset sits inside a round.
fn emit_tail(
    player: Player,
    parsed: &ParsedInfoset,
    node: Rc<EfgNode>,
    own_hand: CardSet,
    opponent_hand: CardSet,
    meter: &mut BudgetMeter,
    emit: &mut NodeEmitter,
) -> bool {
    if parsed.opponent_moved_unobserved {
        // player 1 to act: player 0 may have committed any card still in
        // their hand
        debug_assert_eq!(player, 1);
        for i in 0..opponent_hand.count_ones() as usize {
            if !meter.has_room() {
                return false;
            }
            let child = node.perform_action(&node.action_by_id(i as EdgeId));
            if !emit(child) || !meter.consume() {
                return false;
            }
        }
        return true;
    }

    if let Some(own_card) = parsed.pending_own_card {
        // the target player committed a card and the round is unresolved
        debug_assert_eq!(player, 0);
        if !meter.has_room() {
            return false;
        }
        let child = node.perform_action(&node.action_by_id(index_of(own_hand, own_card) as EdgeId));
        return emit(child) && meter.consume();
    }

    if !meter.has_room() {
        return false;
    }
    emit(node) && meter.consume()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PublicStateCache;

    #[test]
    fn test_hand_helpers() {
        let hand = full_hand(4);
        assert_eq!(hand, 0b1111);
        assert_eq!(card_at(hand, 0), 1);
        assert_eq!(card_at(hand, 3), 4);
        let smaller = without(hand, 2);
        assert_eq!(card_at(smaller, 1), 3);
        assert_eq!(index_of(smaller, 3), 1);
        assert_eq!(index_of(smaller, 4), 2);
    }

    #[test]
    fn test_round_resolution() {
        assert_eq!(RoundResult::of(3, 1), RoundResult::Pl0Win);
        assert_eq!(RoundResult::of(2, 2), RoundResult::Draw);
        assert_eq!(RoundResult::of(1, 3), RoundResult::Pl0Loss);
    }

    #[test]
    fn test_public_state_counts() {
        for (cards, expected) in [(2, 11), (3, 39)] {
            let mut cache = PublicStateCache::new(Rc::new(GoofspielDomain::iigs(cards)));
            cache.build_tree();
            assert_eq!(cache.count_public_states(), expected, "IIGS({})", cards);
        }
    }

    #[test]
    fn test_rewards_are_zero_sum() {
        let domain = GoofspielDomain::iigs(3);
        let root = EfgNode::root(Rc::new(domain) as Rc<dyn Domain>);
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.kind() == crate::efg::NodeKind::Terminal {
                let u = node.utilities();
                assert_eq!(u[0] + u[1], 0.0);
                continue;
            }
            for e in 0..node.count_available_actions() {
                stack.push(node.perform_action(&node.action_by_id(e as EdgeId)));
            }
        }
    }
}
