//! The gadget game used at the root of a subgame resolving call.
//!
//! Given a summary of a public state — its topmost histories, their reach
//! probabilities, and their expected utilities — the gadget builds a small
//! three-level tree: a chance root picking among the histories, one
//! decision node per history where the resolving player's opponent chooses
//! to follow into the real subtree or terminate, and terminals carrying
//! counterfactual-value baselines. Under unsafe resolving the gadget
//! collapses and the chance root leads straight into the real subtrees.

use std::rc::Rc;

use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::{
    domain::{Action, Domain},
    efg::{EdgeId, EfgNode},
    istate::{Aoh, PublicState},
    opponent, ActionId, Player,
};

pub const GADGET_FOLLOW: ActionId = 0;
pub const GADGET_TERMINATE: ActionId = 1;

/// Follow / Terminate decision of the gadget's viewing player.
#[derive(Debug, Clone, Copy)]
pub struct GadgetAction {
    id: ActionId,
}

impl GadgetAction {
    pub fn new(id: ActionId) -> Self {
        Self { id }
    }
}

impl Action for GadgetAction {
    fn id(&self) -> ActionId {
        self.id
    }

    fn label(&self) -> String {
        match self.id {
            GADGET_FOLLOW => "Follow".to_string(),
            GADGET_TERMINATE => "Terminate".to_string(),
            _ => unreachable!("no such gadget action"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GadgetVariant {
    SafeResolving,
    UnsafeResolving,
    MaxMargin,
}

/// Everything the gadget needs to know about the public state it roots:
/// the topmost histories of the state, per-history reach probabilities
/// `[player 0, player 1, chance]`, and expected utilities for player 0.
pub struct PublicStateSummary {
    pub public_state: PublicState,
    pub nodes: Vec<Rc<EfgNode>>,
    pub reach_probs: Vec<[f64; 3]>,
    pub expected_utilities: Vec<f64>,
}

impl PublicStateSummary {
    pub fn new(
        public_state: PublicState,
        nodes: Vec<Rc<EfgNode>>,
        reach_probs: Vec<[f64; 3]>,
        expected_utilities: Vec<f64>,
    ) -> Self {
        assert!(!nodes.is_empty(), "a public state has at least one history");
        assert_eq!(nodes.len(), reach_probs.len());
        assert_eq!(nodes.len(), expected_utilities.len());
        debug_assert!(nodes
            .iter()
            .all(|n| n.public_observation_ids() == public_state.history()));
        Self {
            public_state,
            nodes,
            reach_probs,
            expected_utilities,
        }
    }
}

pub struct GadgetGame {
    summary: PublicStateSummary,
    resolving_player: Player,
    viewing_player: Player,
    target_infoset: Option<Aoh>,
    variant: GadgetVariant,
    /// Σ over the public state's histories of the resolving player's reach
    /// times the chance reach.
    public_state_reach: f64,
    /// Counterfactual-value baselines per history, for player 0. The
    /// resolver multiplies by `public_state_reach` when it reads a
    /// terminal; the gadget does not pre-multiply.
    cfv_values: Vec<f64>,
}

impl GadgetGame {
    pub fn new(
        summary: PublicStateSummary,
        resolving_player: Player,
        target_infoset: Option<Aoh>,
        variant: GadgetVariant,
    ) -> Rc<Self> {
        let public_state_reach = compute_public_state_reach(&summary, variant, resolving_player);
        let cfv_values = compute_terminate_cfv_values(&summary, resolving_player);
        Rc::new(Self {
            summary,
            resolving_player,
            viewing_player: opponent(resolving_player),
            target_infoset,
            variant,
            public_state_reach,
            cfv_values,
        })
    }

    pub fn summary(&self) -> &PublicStateSummary {
        &self.summary
    }

    pub fn resolving_player(&self) -> Player {
        self.resolving_player
    }

    /// The player deciding Follow / Terminate after the chance root.
    pub fn viewing_player(&self) -> Player {
        self.viewing_player
    }

    pub fn target_infoset(&self) -> Option<&Aoh> {
        self.target_infoset.as_ref()
    }

    pub fn variant(&self) -> GadgetVariant {
        self.variant
    }

    pub fn public_state_reach(&self) -> f64 {
        self.public_state_reach
    }

    pub fn cfv_value(&self, edge: EdgeId) -> f64 {
        self.cfv_values[edge as usize]
    }

    pub fn chance_prob(&self, edge: EdgeId) -> f64 {
        let reach = &self.summary.reach_probs[edge as usize];
        match self.variant {
            GadgetVariant::SafeResolving => {
                reach[self.resolving_player] * reach[2] / self.public_state_reach
            }
            GadgetVariant::UnsafeResolving => {
                reach[0] * reach[1] * reach[2] / self.public_state_reach
            }
            GadgetVariant::MaxMargin => unimplemented!("max-margin gadget"),
        }
    }

    /// The chance root of the gadget tree.
    pub fn root(self: &Rc<Self>) -> Rc<EfgNode> {
        let domain = self.summary.nodes[0].domain().clone();
        EfgNode::gadget_root(domain, self.clone())
    }
}

fn compute_public_state_reach(
    summary: &PublicStateSummary,
    variant: GadgetVariant,
    resolving_player: Player,
) -> f64 {
    match variant {
        GadgetVariant::SafeResolving => summary
            .reach_probs
            .iter()
            .map(|r| r[resolving_player] * r[2])
            .sum(),
        GadgetVariant::UnsafeResolving => {
            summary.reach_probs.iter().map(|r| r[0] * r[1] * r[2]).sum()
        }
        GadgetVariant::MaxMargin => unimplemented!("max-margin gadget"),
    }
}

/// Group the histories by the viewing player's augmented information set
/// and average their expected utilities, weighted by the resolving
/// player's and chance's reach. Every history of a group gets the group's
/// value.
fn compute_terminate_cfv_values(summary: &PublicStateSummary, resolving_player: Player) -> Vec<f64> {
    let viewing_player = opponent(resolving_player);
    let infosets = summary
        .nodes
        .iter()
        .map(|n| n.aoh_infoset(viewing_player))
        .collect_vec();

    let mut infoset_utilities: FxHashMap<&Aoh, f64> = FxHashMap::default();
    let mut infoset_reaches: FxHashMap<&Aoh, f64> = FxHashMap::default();
    for (i, aoh) in infosets.iter().enumerate() {
        let reach = summary.reach_probs[i][resolving_player] * summary.reach_probs[i][2];
        *infoset_utilities.entry(aoh).or_default() += reach * summary.expected_utilities[i];
        *infoset_reaches.entry(aoh).or_default() += reach;
    }

    infosets
        .iter()
        .map(|aoh| infoset_utilities[aoh] / infoset_reaches[aoh])
        .collect()
}

/// Build a gadget for the public state the summary describes and return
/// its chance root.
pub fn build_gadget(
    summary: PublicStateSummary,
    resolving_player: Player,
    target_infoset: Option<Aoh>,
    variant: GadgetVariant,
) -> Rc<EfgNode> {
    GadgetGame::new(summary, resolving_player, target_infoset, variant).root()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        efg::{NodeKind, Specialization},
        gamestates::rps::RpsDomain,
    };

    fn rps_summary(domain: &Rc<dyn Domain>) -> PublicStateSummary {
        let root = EfgNode::root(domain.clone());
        let nodes = (0..3)
            .map(|i| root.perform_action(&root.action_by_id(i)))
            .collect_vec();
        let public_state = nodes[0].public_state();
        PublicStateSummary::new(
            public_state,
            nodes,
            vec![[0.2, 1.0, 1.0], [0.3, 1.0, 1.0], [0.5, 1.0, 1.0]],
            vec![1.0, 2.0, 3.0],
        )
    }

    #[test]
    fn test_safe_resolving_chance_probs() {
        let domain: Rc<dyn Domain> = Rc::new(RpsDomain::new());
        let game = GadgetGame::new(rps_summary(&domain), 0, None, GadgetVariant::SafeResolving);
        assert_relative_eq!(game.public_state_reach(), 1.0);
        assert_relative_eq!(game.chance_prob(0), 0.2);
        assert_relative_eq!(game.chance_prob(1), 0.3);
        assert_relative_eq!(game.chance_prob(2), 0.5);
    }

    #[test]
    fn test_cfv_values_group_by_viewing_infoset() {
        let domain: Rc<dyn Domain> = Rc::new(RpsDomain::new());

        // resolving for player 0: the viewer (player 1) saw nothing, so
        // all three histories share one group
        let pl0 = GadgetGame::new(rps_summary(&domain), 0, None, GadgetVariant::SafeResolving);
        for i in 0..3 {
            assert_relative_eq!(pl0.cfv_value(i), 2.3);
        }

        // resolving for player 1: the viewer (player 0) knows their own
        // move, so each history keeps its own value
        let pl1 = GadgetGame::new(rps_summary(&domain), 1, None, GadgetVariant::SafeResolving);
        assert_relative_eq!(pl1.cfv_value(0), 1.0);
        assert_relative_eq!(pl1.cfv_value(1), 2.0);
        assert_relative_eq!(pl1.cfv_value(2), 3.0);
        for i in 0..3 {
            assert_relative_eq!(pl1.chance_prob(i), 1.0 / 3.0);
        }
    }

    #[test]
    fn test_gadget_tree_shape() {
        let domain: Rc<dyn Domain> = Rc::new(RpsDomain::new());
        let game = GadgetGame::new(rps_summary(&domain), 0, None, GadgetVariant::SafeResolving);
        let root = game.root();

        assert_eq!(root.kind(), NodeKind::Chance);
        assert_eq!(root.specialization(), Specialization::Gadget);
        assert_eq!(root.count_available_actions(), 3);

        let inner = root.perform_action(&root.action_by_id(1));
        assert_eq!(inner.kind(), NodeKind::Player);
        assert_eq!(inner.specialization(), Specialization::Gadget);
        assert_eq!(inner.current_player(), Some(1));
        assert_eq!(inner.count_available_actions(), 2);

        let followed = inner.perform_action(&inner.action_by_id(GADGET_FOLLOW));
        assert_eq!(followed.specialization(), Specialization::Ordinary);
        assert_eq!(followed, game.summary().nodes[1]);

        let terminated = inner.perform_action(&inner.action_by_id(GADGET_TERMINATE));
        assert_eq!(terminated.kind(), NodeKind::Terminal);
        assert_eq!(terminated.specialization(), Specialization::Gadget);
        assert_eq!(terminated.utilities(), [2.3, -2.3]);
    }

    #[test]
    fn test_unsafe_resolving_collapses() {
        let domain: Rc<dyn Domain> = Rc::new(RpsDomain::new());
        let game = GadgetGame::new(rps_summary(&domain), 0, None, GadgetVariant::UnsafeResolving);
        let root = game.root();
        let child = root.perform_action(&root.action_by_id(2));
        assert_eq!(child, game.summary().nodes[2]);
        assert_eq!(child.specialization(), Specialization::Ordinary);
    }

    #[test]
    fn test_gadget_nodes_do_not_collide_with_ordinary_nodes() {
        let domain: Rc<dyn Domain> = Rc::new(RpsDomain::new());
        let ordinary_root = EfgNode::root(domain.clone());
        let game = GadgetGame::new(rps_summary(&domain), 0, None, GadgetVariant::SafeResolving);
        let gadget_root = game.root();
        // equal histories, different specializations
        assert_eq!(ordinary_root.history(), gadget_root.history());
        assert_ne!(ordinary_root.as_ref(), gadget_root.as_ref());
        assert_ne!(ordinary_root.hash_value(), gadget_root.hash_value());
    }

    #[test]
    #[should_panic]
    fn test_max_margin_is_unimplemented() {
        let domain: Rc<dyn Domain> = Rc::new(RpsDomain::new());
        let _ = GadgetGame::new(rps_summary(&domain), 0, None, GadgetVariant::MaxMargin);
    }
}
