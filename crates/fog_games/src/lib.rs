//! Representation of two-player zero-sum imperfect-information games with
//! factored observations: domains, the lazy extensive-form tree over them,
//! the information-set / public-state lattice and the caches that memoize
//! all of it, plus the gadget construction used by subgame resolving.

pub mod cache;
pub mod constraints;
pub mod domain;
pub mod efg;
pub mod gadget;
pub mod gamestates;
pub mod hashing;
pub mod istate;
pub mod stats;

pub use crate::{
    cache::{EfgTreeCache, InfosetCache, PublicStateCache},
    domain::{Action, Domain, Observation, Outcome, OutcomeDistribution, OutcomeEntry, State},
    efg::{EfgNode, NodeKind, Specialization},
    istate::{ActionObservationIds, ActionSequence, Aoh, PublicState},
};

/// Players are indexed 0 and 1; both are fixed for the zero-sum core.
pub type Player = usize;

pub type ActionId = u32;
pub type ObservationId = u32;

/// Identifier of the sentinel "this player did not act this turn".
pub const NO_ACTION_ID: ActionId = ActionId::MAX;
/// Identifier of the sentinel "this player observed nothing this turn".
pub const NO_OBSERVATION_ID: ObservationId = ObservationId::MAX;

pub fn opponent(player: Player) -> Player {
    1 - player
}

#[cfg(test)]
mod tests {
    use super::opponent;

    #[test]
    fn test_opponent() {
        assert_eq!(opponent(0), 1);
        assert_eq!(opponent(1), 0);
    }
}
