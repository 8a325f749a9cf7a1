//! A one-card poker: each player is dealt a jack or a queen, the first
//! player folds or bets, the second folds or calls. Calling compares cards
//! for three chips; folding concedes one. Small enough to check every
//! number by hand, and the smallest domain here with a genuine chance
//! root.

use std::{any::Any, rc::Rc};

use crate::{
    domain::{Action, Domain, Observation, Outcome, OutcomeDistribution, OutcomeEntry, State},
    hashing::{self, HashValue},
    ActionId, ObservationId, Player,
};

const CARD_JACK: usize = 0;
const CARD_QUEEN: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PokerAction {
    Fold,
    /// The first player's bet and the second player's call share the
    /// raising slot.
    Raise,
}

impl Action for PokerAction {
    fn id(&self) -> ActionId {
        *self as ActionId
    }

    fn label(&self) -> String {
        match self {
            PokerAction::Fold => "Fold".to_string(),
            PokerAction::Raise => "Bet".to_string(),
        }
    }
}

/// A dealt card or a betting-round announcement. Cards use ids 0 and 1,
/// announcements 2 and 3.
#[derive(Debug, Clone, Copy)]
enum PokerObservation {
    Card(usize),
    Folded,
    Raised,
}

impl Observation for PokerObservation {
    fn id(&self) -> ObservationId {
        match self {
            PokerObservation::Card(card) => *card as ObservationId,
            PokerObservation::Folded => 2,
            PokerObservation::Raised => 3,
        }
    }

    fn label(&self) -> String {
        match self {
            PokerObservation::Card(CARD_JACK) => "J".to_string(),
            PokerObservation::Card(_) => "Q".to_string(),
            PokerObservation::Folded => "fold".to_string(),
            PokerObservation::Raised => "bet".to_string(),
        }
    }
}

pub struct SimplePokerDomain;

impl SimplePokerDomain {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}

impl Domain for SimplePokerDomain {
    fn root_outcome_distribution(&self) -> OutcomeDistribution {
        // two jacks and one queen per player's half of the deck: matched
        // cards are half as likely as mixed ones
        let mut outcomes = OutcomeDistribution::new();
        for first in [CARD_JACK, CARD_QUEEN] {
            for second in [CARD_JACK, CARD_QUEEN] {
                let prob = if first == second { 1.0 / 6.0 } else { 1.0 / 3.0 };
                let state = Rc::new(PokerState {
                    cards: [first, second],
                    acting: Some(0),
                });
                outcomes.push(OutcomeEntry::with_prob(
                    Outcome::new(
                        state,
                        [
                            Rc::new(PokerObservation::Card(first)),
                            Rc::new(PokerObservation::Card(second)),
                        ],
                        Rc::new(crate::domain::NoObservation),
                        [0.0, 0.0],
                    ),
                    prob,
                ));
            }
        }
        outcomes
    }

    fn max_state_depth(&self) -> usize {
        3
    }

    fn max_abs_utility(&self) -> f64 {
        3.0
    }

    fn info(&self) -> String {
        "Simple poker".to_string()
    }
}

#[derive(Debug, Clone)]
struct PokerState {
    cards: [usize; 2],
    /// `None` once the hand is over.
    acting: Option<Player>,
}

impl State for PokerState {
    fn acting_players(&self) -> Vec<Player> {
        self.acting.into_iter().collect()
    }

    fn count_available_actions(&self, player: Player) -> usize {
        if self.acting == Some(player) {
            2
        } else {
            0
        }
    }

    fn available_actions(&self, player: Player) -> Vec<Rc<dyn Action>> {
        if self.acting != Some(player) {
            return vec![];
        }
        vec![Rc::new(PokerAction::Fold), Rc::new(PokerAction::Raise)]
    }

    fn perform_actions(&self, actions: &[Rc<dyn Action>]) -> OutcomeDistribution {
        let player = self.acting.expect("hand already over");
        let folded = actions[player].id() == PokerAction::Fold.id();

        let (next, observation, rewards) = if folded {
            let sign = if player == 0 { 1.0 } else { -1.0 };
            (None, PokerObservation::Folded, [-sign, sign])
        } else if player == 0 {
            (Some(1), PokerObservation::Raised, [0.0, 0.0])
        } else {
            // showdown
            let value = match self.cards[0].cmp(&self.cards[1]) {
                std::cmp::Ordering::Greater => 3.0,
                std::cmp::Ordering::Equal => 0.0,
                std::cmp::Ordering::Less => -3.0,
            };
            (None, PokerObservation::Raised, [value, -value])
        };

        let state = Rc::new(PokerState {
            cards: self.cards,
            acting: next,
        });
        let observation: Rc<dyn Observation> = Rc::new(observation);
        vec![OutcomeEntry::new(Outcome::new(
            state,
            [observation.clone(), observation.clone()],
            observation,
            rewards,
        ))]
    }

    fn is_terminal(&self) -> bool {
        self.acting.is_none()
    }

    fn value_hash(&self) -> HashValue {
        hashing::hash_ids(
            hashing::TREE_SEED,
            &[
                self.cards[0] as u32,
                self.cards[1] as u32,
                self.acting.map(|p| p as u32 + 1).unwrap_or(0),
            ],
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn value_eq(&self, other: &dyn State) -> bool {
        other
            .as_any()
            .downcast_ref::<PokerState>()
            .map(|o| o.cards == self.cards && o.acting == self.acting)
            .unwrap_or(false)
    }
}
