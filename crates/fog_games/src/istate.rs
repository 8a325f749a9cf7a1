//! Identity keys: action-observation histories, public states, and action
//! sequences.
//!
//! All three are value types. Equality is structural and the hash is
//! derived from the raw identifier sequence with a fixed seed, so identity
//! is byte-precise and stable across process runs. These keys are the only
//! values algorithms serialize when communicating positions externally.

use std::{
    cmp::Ordering,
    fmt::{Debug, Formatter},
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

use crate::{
    hashing::{self, HashValue, AOH_SEED, PUBLIC_STATE_SEED, SEQUENCE_SEED},
    ActionId, ObservationId, Player, NO_ACTION_ID, NO_OBSERVATION_ID,
};

/// What one player experienced on one tree edge: the action they took (the
/// no-action id on turns they were not acting) and the observation they
/// received.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionObservationIds {
    pub action: ActionId,
    pub observation: ObservationId,
}

impl ActionObservationIds {
    pub fn new(action: ActionId, observation: ObservationId) -> Self {
        Self {
            action,
            observation,
        }
    }

    /// Neither an action nor an observation on this edge.
    pub fn none() -> Self {
        Self {
            action: NO_ACTION_ID,
            observation: NO_OBSERVATION_ID,
        }
    }
}

impl Debug for ActionObservationIds {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let a: &dyn Debug = if self.action == NO_ACTION_ID {
            &"∅"
        } else {
            &self.action
        };
        let o: &dyn Debug = if self.observation == NO_OBSERVATION_ID {
            &"∅"
        } else {
            &self.observation
        };
        write!(f, "({:?},{:?})", a, o)
    }
}

/// Action-observation history: the information-set key.
///
/// Two nodes belong to the same information set of `player` exactly when
/// their `Aoh` for that player is equal. The key is well-defined for every
/// player at every node; when computed for a player who is not acting it is
/// called an augmented information set.
#[derive(Clone, Serialize, Deserialize)]
pub struct Aoh {
    player: Player,
    initial_observation: ObservationId,
    history: Vec<ActionObservationIds>,
    hash: HashValue,
}

impl Aoh {
    pub fn new(
        player: Player,
        initial_observation: ObservationId,
        history: Vec<ActionObservationIds>,
    ) -> Self {
        let mut ids = Vec::with_capacity(2 + 2 * history.len());
        ids.push(player as u32);
        ids.push(initial_observation);
        for pair in &history {
            ids.push(pair.action);
            ids.push(pair.observation);
        }
        let hash = hashing::hash_ids(AOH_SEED, &ids);
        Self {
            player,
            initial_observation,
            history,
            hash,
        }
    }

    pub fn player(&self) -> Player {
        self.player
    }

    pub fn initial_observation(&self) -> ObservationId {
        self.initial_observation
    }

    pub fn history(&self) -> &[ActionObservationIds] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn hash_value(&self) -> HashValue {
        self.hash
    }
}

impl PartialEq for Aoh {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.player == other.player
            && self.initial_observation == other.initial_observation
            && self.history == other.history
    }
}

impl Eq for Aoh {}

impl Hash for Aoh {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl Debug for Aoh {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Aoh(pl{} init:{} {:?})", self.player, self.initial_observation, self.history)
    }
}

/// Public-state key: the sequence of public observation ids from the root.
///
/// Public states are partially ordered by the strict-prefix relation on
/// their histories.
#[derive(Clone, Serialize, Deserialize)]
pub struct PublicState {
    history: Vec<ObservationId>,
    hash: HashValue,
}

impl PublicState {
    pub fn new(history: Vec<ObservationId>) -> Self {
        let hash = hashing::hash_ids(PUBLIC_STATE_SEED, &history);
        Self { history, hash }
    }

    pub fn history(&self) -> &[ObservationId] {
        &self.history
    }

    pub fn depth(&self) -> usize {
        self.history.len()
    }

    pub fn hash_value(&self) -> HashValue {
        self.hash
    }

    /// Whether `self` is a strict ancestor of `other` in the public tree.
    pub fn is_ancestor_of(&self, other: &PublicState) -> bool {
        self.history.len() < other.history.len()
            && other.history[..self.history.len()] == self.history[..]
    }
}

impl PartialEq for PublicState {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.history == other.history
    }
}

impl Eq for PublicState {}

impl Hash for PublicState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl PartialOrd for PublicState {
    /// Strict partial order: `a < b` when `a`'s history is a strict prefix
    /// of `b`'s. Unrelated public states are incomparable.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            Some(Ordering::Equal)
        } else if self.is_ancestor_of(other) {
            Some(Ordering::Less)
        } else if other.is_ancestor_of(self) {
            Some(Ordering::Greater)
        } else {
            None
        }
    }
}

impl Debug for PublicState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicState{:?}", self.history)
    }
}

/// The subsequence of a player's own actions, each paired with the
/// information set at which it was chosen. Equality is structural and
/// ignores which node produced the sequence.
#[derive(Clone, Serialize, Deserialize)]
pub struct ActionSequence {
    player: Player,
    sequence: Vec<(Aoh, ActionId)>,
    hash: HashValue,
}

impl ActionSequence {
    pub fn new(player: Player, sequence: Vec<(Aoh, ActionId)>) -> Self {
        let hash = hashing::hash_u64s(
            SEQUENCE_SEED,
            std::iter::once(player as u64).chain(
                sequence
                    .iter()
                    .flat_map(|(aoh, action)| [aoh.hash_value(), *action as u64]),
            ),
        );
        Self {
            player,
            sequence,
            hash,
        }
    }

    pub fn player(&self) -> Player {
        self.player
    }

    pub fn sequence(&self) -> &[(Aoh, ActionId)] {
        &self.sequence
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn hash_value(&self) -> HashValue {
        self.hash
    }
}

impl PartialEq for ActionSequence {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.player == other.player
            && self.sequence.len() == other.sequence.len()
            && self
                .sequence
                .iter()
                .zip(other.sequence.iter())
                .all(|(a, b)| a.0 == b.0 && a.1 == b.1)
    }
}

impl Eq for ActionSequence {}

impl Hash for ActionSequence {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl Debug for ActionSequence {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ActionSequence(pl{}, len {})", self.player, self.sequence.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: ActionId, o: ObservationId) -> ActionObservationIds {
        ActionObservationIds::new(a, o)
    }

    #[test]
    fn test_aoh_equality_ignores_nothing() {
        let a = Aoh::new(0, 3, vec![pair(1, 2), pair(NO_ACTION_ID, 7)]);
        let b = Aoh::new(0, 3, vec![pair(1, 2), pair(NO_ACTION_ID, 7)]);
        let c = Aoh::new(1, 3, vec![pair(1, 2), pair(NO_ACTION_ID, 7)]);
        let d = Aoh::new(0, 4, vec![pair(1, 2), pair(NO_ACTION_ID, 7)]);
        assert_eq!(a, b);
        assert_eq!(a.hash_value(), b.hash_value());
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_aoh_distinguishes_action_from_observation() {
        // the same raw ids distributed differently between the action and
        // observation slot must not collide
        let a = Aoh::new(0, NO_OBSERVATION_ID, vec![pair(1, 2)]);
        let b = Aoh::new(0, NO_OBSERVATION_ID, vec![pair(2, 1)]);
        assert_ne!(a, b);
        assert_ne!(a.hash_value(), b.hash_value());
    }

    #[test]
    fn test_public_state_prefix_order() {
        let root = PublicState::new(vec![]);
        let a = PublicState::new(vec![1]);
        let ab = PublicState::new(vec![1, 2]);
        let b = PublicState::new(vec![2]);

        assert!(root < a);
        assert!(a < ab);
        assert!(root < ab);
        assert!(ab > root);
        assert_eq!(a.partial_cmp(&b), None);
        assert_eq!(a.partial_cmp(&a.clone()), Some(Ordering::Equal));
        assert_eq!(a.depth(), 1);
        assert_eq!(ab.depth(), 2);
    }

    #[test]
    fn test_action_sequence_equality() {
        let i = Aoh::new(0, 1, vec![]);
        let j = Aoh::new(0, 2, vec![]);
        let a = ActionSequence::new(0, vec![(i.clone(), 0), (j.clone(), 1)]);
        let b = ActionSequence::new(0, vec![(i.clone(), 0), (j.clone(), 1)]);
        let c = ActionSequence::new(0, vec![(i.clone(), 0), (j.clone(), 2)]);
        let d = ActionSequence::new(0, vec![(j, 0), (i, 1)]);
        assert_eq!(a, b);
        assert_eq!(a.hash_value(), b.hash_value());
        assert_ne!(a, c);
        assert_ne!(a, d);
    }
}
