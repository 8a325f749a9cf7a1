//! The extensive-form game node: a lazy unfolding of a domain into an
//! explicit tree of chance, player, and terminal nodes.
//!
//! Node identity is the history of edge ids from the root; the hash is
//! derived from that history with a fixed seed, so equality and hashing are
//! stable across process runs and across caches. Parent pointers are
//! non-owning in spirit: the cache is the retention root, nodes hold `Rc`
//! back-links that never form a cycle.
//!
//! Simultaneous-move rounds are played out sequentially in ascending player
//! order. Intermediate edges inside a round carry no observations; the real
//! observations arrive on the edge that completes the round and advances
//! the state. Every stochastic branching is an explicit chance node.

use std::{
    cell::OnceCell,
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
    rc::Rc,
};

use crate::{
    domain::{is_normalized, Action, Domain, OutcomeDistribution},
    gadget::{GadgetAction, GadgetGame, GadgetVariant, GADGET_FOLLOW, GADGET_TERMINATE},
    hashing::{self, HashValue, GADGET_SEED, TREE_SEED},
    istate::{ActionObservationIds, ActionSequence, Aoh, PublicState},
    ActionId, ObservationId, Player, State, NO_ACTION_ID, NO_OBSERVATION_ID,
};

pub type EdgeId = u32;

/// The three kinds of EFG nodes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NodeKind {
    Chance,
    Player,
    Terminal,
}

/// Distinguishes ordinary game nodes from gadget-game nodes. Equality and
/// hashing of nodes take the specialization into account, so the two kinds
/// never collide in a cache.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Specialization {
    #[default]
    Ordinary,
    Gadget,
}

/// A chance action: an index into an outcome distribution together with its
/// probability.
#[derive(Debug, Clone, Copy)]
pub struct ChanceAction {
    id: EdgeId,
    prob: f64,
}

impl ChanceAction {
    pub fn new(id: EdgeId, prob: f64) -> Self {
        Self { id, prob }
    }

    pub fn prob(&self) -> f64 {
        self.prob
    }
}

impl Action for ChanceAction {
    fn id(&self) -> ActionId {
        self.id
    }
}

/// Per-edge record of what happened between a node and its parent.
#[derive(Clone, Debug)]
struct EdgeRecord {
    /// What each player did and saw on this edge.
    ao_ids: [ActionObservationIds; 2],
    public_observation: ObservationId,
    /// Reward increments delivered on this edge.
    rewards: [f64; 2],
    /// Chance probability of this edge; 1.0 for player moves.
    chance_prob: f64,
}

impl EdgeRecord {
    fn quiet(actor: Option<(Player, ActionId)>) -> Self {
        let mut ao_ids = [ActionObservationIds::none(), ActionObservationIds::none()];
        if let Some((player, action)) = actor {
            ao_ids[player].action = action;
        }
        Self {
            ao_ids,
            public_observation: NO_OBSERVATION_ID,
            rewards: [0.0, 0.0],
            chance_prob: 1.0,
        }
    }
}

/// Observations and rewards delivered by the root outcome when the root
/// distribution has a single atom and collapses into a direct node.
#[derive(Clone, Debug)]
struct InitialObservations {
    observations: [ObservationId; 2],
    rewards: [f64; 2],
}

/// Progress of the sequential play-out of one simultaneous-move round.
#[derive(Clone)]
struct Round {
    /// The round's acting players in canonical (ascending) order.
    players: Vec<Player>,
    /// Index into `players` of the player acting at this node.
    index: usize,
    /// Actions already chosen by `players[..index]`.
    chosen: Vec<Rc<dyn Action>>,
}

enum NodeBody {
    Chance {
        /// The state whose transition produced the distribution; `None` at
        /// the root, where the domain itself is the source.
        state: Option<Rc<dyn State>>,
        state_depth: usize,
        outcomes: OutcomeDistribution,
    },
    Player {
        state: Rc<dyn State>,
        state_depth: usize,
        round: Round,
    },
    Terminal {
        utilities: [f64; 2],
        state_depth: usize,
    },
    GadgetChance {
        game: Rc<GadgetGame>,
    },
    GadgetPlayer {
        game: Rc<GadgetGame>,
        underlying: Rc<EfgNode>,
    },
    GadgetTerminal {
        utilities: [f64; 2],
    },
}

pub struct EfgNode {
    domain: Rc<dyn Domain>,
    parent: Option<Rc<EfgNode>>,
    incoming_edge: Option<EdgeId>,
    history: Vec<EdgeId>,
    hash: HashValue,
    body: NodeBody,
    edge: Option<EdgeRecord>,
    initial: Option<InitialObservations>,
    ao_memo: [OnceCell<Vec<ActionObservationIds>>; 2],
    public_obs_memo: OnceCell<Vec<ObservationId>>,
    rewards_memo: OnceCell<[f64; 2]>,
    chance_reach_memo: OnceCell<f64>,
}

impl EfgNode {
    /// Unfold the root of the domain. A root distribution with more than
    /// one atom becomes an explicit chance node; a single atom is
    /// materialized directly, with its observations recorded as the
    /// initial observations.
    pub fn root(domain: Rc<dyn Domain>) -> Rc<EfgNode> {
        let outcomes = domain.root_outcome_distribution();
        debug_assert!(
            is_normalized(&outcomes),
            "root distribution of {} is not normalized",
            domain.info()
        );
        assert!(!outcomes.is_empty(), "empty root distribution");

        if outcomes.len() > 1 {
            return Self::build(
                domain,
                None,
                None,
                NodeBody::Chance {
                    state: None,
                    state_depth: 0,
                    outcomes,
                },
                None,
                None,
            );
        }

        let entry = outcomes.into_iter().next().unwrap();
        materialize(&domain, None, None, None, entry.outcome, entry.prob, 1)
    }

    fn build(
        domain: Rc<dyn Domain>,
        parent: Option<Rc<EfgNode>>,
        incoming_edge: Option<EdgeId>,
        body: NodeBody,
        edge: Option<EdgeRecord>,
        initial: Option<InitialObservations>,
    ) -> Rc<EfgNode> {
        debug_assert_eq!(parent.is_some(), incoming_edge.is_some());
        let history = match (&parent, incoming_edge) {
            (Some(p), Some(e)) => {
                let mut h = p.history.clone();
                h.push(e);
                h
            }
            _ => vec![],
        };
        let seed = match body {
            NodeBody::GadgetChance { .. }
            | NodeBody::GadgetPlayer { .. }
            | NodeBody::GadgetTerminal { .. } => GADGET_SEED,
            _ => TREE_SEED,
        };
        let hash = hashing::hash_ids(seed, &history);
        Rc::new(EfgNode {
            domain,
            parent,
            incoming_edge,
            history,
            hash,
            body,
            edge,
            initial,
            ao_memo: [OnceCell::new(), OnceCell::new()],
            public_obs_memo: OnceCell::new(),
            rewards_memo: OnceCell::new(),
            chance_reach_memo: OnceCell::new(),
        })
    }

    pub fn kind(&self) -> NodeKind {
        match &self.body {
            NodeBody::Chance { .. } | NodeBody::GadgetChance { .. } => NodeKind::Chance,
            NodeBody::Player { .. } | NodeBody::GadgetPlayer { .. } => NodeKind::Player,
            NodeBody::Terminal { .. } | NodeBody::GadgetTerminal { .. } => NodeKind::Terminal,
        }
    }

    pub fn specialization(&self) -> Specialization {
        match &self.body {
            NodeBody::GadgetChance { .. }
            | NodeBody::GadgetPlayer { .. }
            | NodeBody::GadgetTerminal { .. } => Specialization::Gadget,
            _ => Specialization::Ordinary,
        }
    }

    pub fn domain(&self) -> &Rc<dyn Domain> {
        &self.domain
    }

    pub fn parent(&self) -> Option<&Rc<EfgNode>> {
        self.parent.as_ref()
    }

    pub fn incoming_edge(&self) -> Option<EdgeId> {
        self.incoming_edge
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn history(&self) -> &[EdgeId] {
        &self.history
    }

    pub fn depth(&self) -> usize {
        self.history.len()
    }

    pub fn hash_value(&self) -> HashValue {
        self.hash
    }

    /// Number of state transitions from the root to this node's state.
    pub fn state_depth(&self) -> usize {
        match &self.body {
            NodeBody::Chance { state_depth, .. }
            | NodeBody::Player { state_depth, .. }
            | NodeBody::Terminal { state_depth, .. } => *state_depth,
            _ => unreachable!("gadget nodes have no state depth"),
        }
    }

    pub fn state(&self) -> Option<&Rc<dyn State>> {
        match &self.body {
            NodeBody::Chance { state, .. } => state.as_ref(),
            NodeBody::Player { state, .. } => Some(state),
            _ => None,
        }
    }

    /// The acting player; `None` for chance and terminal nodes.
    pub fn current_player(&self) -> Option<Player> {
        match &self.body {
            NodeBody::Player { round, .. } => Some(round.players[round.index]),
            NodeBody::GadgetPlayer { game, .. } => Some(game.viewing_player()),
            _ => None,
        }
    }

    pub fn count_available_actions(&self) -> usize {
        match &self.body {
            NodeBody::Chance { outcomes, .. } => outcomes.len(),
            NodeBody::Player { state, round, .. } => {
                state.count_available_actions(round.players[round.index])
            }
            NodeBody::Terminal { .. } | NodeBody::GadgetTerminal { .. } => 0,
            NodeBody::GadgetChance { game } => game.summary().nodes.len(),
            NodeBody::GadgetPlayer { .. } => 2,
        }
    }

    pub fn available_actions(&self) -> Vec<Rc<dyn Action>> {
        match &self.body {
            NodeBody::Chance { outcomes, .. } => outcomes
                .iter()
                .enumerate()
                .map(|(i, e)| Rc::new(ChanceAction::new(i as EdgeId, e.prob)) as Rc<dyn Action>)
                .collect(),
            NodeBody::Player { state, round, .. } => {
                state.available_actions(round.players[round.index])
            }
            NodeBody::GadgetChance { game } => (0..game.summary().nodes.len())
                .map(|i| {
                    Rc::new(ChanceAction::new(i as EdgeId, game.chance_prob(i as EdgeId)))
                        as Rc<dyn Action>
                })
                .collect(),
            NodeBody::GadgetPlayer { .. } => vec![
                Rc::new(GadgetAction::new(GADGET_FOLLOW)) as Rc<dyn Action>,
                Rc::new(GadgetAction::new(GADGET_TERMINATE)) as Rc<dyn Action>,
            ],
            NodeBody::Terminal { .. } | NodeBody::GadgetTerminal { .. } => {
                unreachable!("terminal nodes have no actions")
            }
        }
    }

    pub fn action_by_id(&self, edge: EdgeId) -> Rc<dyn Action> {
        match &self.body {
            NodeBody::Chance { outcomes, .. } => {
                Rc::new(ChanceAction::new(edge, outcomes[edge as usize].prob))
            }
            NodeBody::Player { state, round, .. } => {
                state.action_by_id(round.players[round.index], edge)
            }
            NodeBody::GadgetChance { game } => {
                Rc::new(ChanceAction::new(edge, game.chance_prob(edge)))
            }
            NodeBody::GadgetPlayer { .. } => Rc::new(GadgetAction::new(edge)),
            NodeBody::Terminal { .. } | NodeBody::GadgetTerminal { .. } => {
                unreachable!("terminal nodes have no actions")
            }
        }
    }

    /// Probability of the given chance edge. Only defined for chance nodes.
    pub fn chance_prob(&self, edge: EdgeId) -> f64 {
        match &self.body {
            NodeBody::Chance { outcomes, .. } => outcomes[edge as usize].prob,
            NodeBody::GadgetChance { game } => game.chance_prob(edge),
            _ => unreachable!("not a chance node"),
        }
    }

    /// All chance-edge probabilities. Only defined for chance nodes.
    pub fn chance_probs(&self) -> Vec<f64> {
        match &self.body {
            NodeBody::Chance { outcomes, .. } => outcomes.iter().map(|e| e.prob).collect(),
            NodeBody::GadgetChance { game } => (0..game.summary().nodes.len())
                .map(|i| game.chance_prob(i as EdgeId))
                .collect(),
            _ => unreachable!("not a chance node"),
        }
    }

    /// Final cumulative utilities. Only defined for terminal nodes.
    pub fn utilities(&self) -> [f64; 2] {
        match &self.body {
            NodeBody::Terminal { utilities, .. } | NodeBody::GadgetTerminal { utilities } => {
                *utilities
            }
            _ => unreachable!("not a terminal node"),
        }
    }

    /// Reward increments on the edge from the parent.
    pub fn edge_rewards(&self) -> [f64; 2] {
        match &self.edge {
            Some(e) => e.rewards,
            None => self
                .initial
                .as_ref()
                .map(|i| i.rewards)
                .unwrap_or([0.0, 0.0]),
        }
    }

    /// Cumulative rewards from the root up to and including the incoming
    /// edge.
    pub fn cumulative_rewards(&self) -> [f64; 2] {
        assert_eq!(
            self.specialization(),
            Specialization::Ordinary,
            "gadget nodes do not accumulate rewards"
        );
        *self.rewards_memo.get_or_init(|| {
            let base = match &self.parent {
                Some(p) => p.cumulative_rewards(),
                None => [0.0, 0.0],
            };
            let edge = self.edge_rewards();
            [base[0] + edge[0], base[1] + edge[1]]
        })
    }

    /// Product of chance probabilities along the path from the root.
    pub fn chance_reach(&self) -> f64 {
        *self.chance_reach_memo.get_or_init(|| {
            let base = match &self.parent {
                Some(p) => p.chance_reach(),
                None => 1.0,
            };
            base * self.edge.as_ref().map(|e| e.chance_prob).unwrap_or(1.0)
        })
    }

    /// The player's action-observation record, one entry per ancestor edge.
    pub fn ao_ids(&self, player: Player) -> &[ActionObservationIds] {
        if let NodeBody::GadgetPlayer { game, underlying } = &self.body {
            return underlying.ao_ids(game.viewing_player());
        }
        assert_eq!(
            self.specialization(),
            Specialization::Ordinary,
            "action-observation histories are not defined for this gadget node"
        );
        self.ao_memo[player].get_or_init(|| {
            let mut ids = match &self.parent {
                Some(p) => p.ao_ids(player).to_vec(),
                None => vec![],
            };
            if let Some(edge) = &self.edge {
                ids.push(edge.ao_ids[player]);
            }
            ids
        })
    }

    /// The observation the player received from the root outcome; the
    /// no-observation id unless the root distribution collapsed.
    pub fn initial_observation(&self, player: Player) -> ObservationId {
        match &self.parent {
            Some(p) => p.initial_observation(player),
            None => self
                .initial
                .as_ref()
                .map(|i| i.observations[player])
                .unwrap_or(NO_OBSERVATION_ID),
        }
    }

    /// The (augmented) information set of the given player at this node.
    /// A gadget decision defines only the viewing player's information
    /// set, which coincides with the underlying node's; it is returned
    /// whichever player is asked for.
    pub fn aoh_infoset(&self, player: Player) -> Aoh {
        if let NodeBody::GadgetPlayer { game, underlying } = &self.body {
            return underlying.aoh_infoset(game.viewing_player());
        }
        Aoh::new(
            player,
            self.initial_observation(player),
            self.ao_ids(player).to_vec(),
        )
    }

    /// The information set of the acting player. Only defined for player
    /// nodes.
    pub fn current_infoset(&self) -> Aoh {
        let player = match self.current_player() {
            Some(p) => p,
            None => unreachable!("infoset of the acting player needs an acting player"),
        };
        self.aoh_infoset(player)
    }

    /// Public observation ids along the path from the root, one entry per
    /// ancestor edge.
    pub fn public_observation_ids(&self) -> &[ObservationId] {
        assert_eq!(
            self.specialization(),
            Specialization::Ordinary,
            "public states are not defined for gadget nodes"
        );
        self.public_obs_memo.get_or_init(|| {
            let mut ids = match &self.parent {
                Some(p) => p.public_observation_ids().to_vec(),
                None => vec![],
            };
            if let Some(edge) = &self.edge {
                ids.push(edge.public_observation);
            }
            ids
        })
    }

    pub fn public_state(&self) -> PublicState {
        PublicState::new(self.public_observation_ids().to_vec())
    }

    /// The player's own actions from the root, each paired with the
    /// information set at which it was chosen.
    pub fn action_sequence(&self, player: Player) -> ActionSequence {
        let mut pairs = vec![];
        self.collect_action_pairs(player, &mut pairs);
        ActionSequence::new(player, pairs)
    }

    fn collect_action_pairs(&self, player: Player, pairs: &mut Vec<(Aoh, ActionId)>) {
        if let (Some(parent), Some(edge)) = (&self.parent, self.incoming_edge) {
            parent.collect_action_pairs(player, pairs);
            if parent.current_player() == Some(player) {
                pairs.push((parent.aoh_infoset(player), edge));
            }
        }
    }

    /// Follow one edge, creating the child node. Chance nodes take an index
    /// into their distribution, player nodes the acting player's action.
    /// Traversing past a terminal is a programmer error.
    pub fn perform_action(self: &Rc<Self>, action: &Rc<dyn Action>) -> Rc<EfgNode> {
        let edge = action.id();
        match &self.body {
            NodeBody::Chance {
                outcomes,
                state_depth,
                ..
            } => {
                assert!(
                    (edge as usize) < outcomes.len(),
                    "chance edge {} out of range",
                    edge
                );
                let entry = &outcomes[edge as usize];
                materialize(
                    &self.domain,
                    Some(self),
                    Some(edge),
                    None,
                    entry.outcome.clone(),
                    entry.prob,
                    state_depth + 1,
                )
            }
            NodeBody::Player {
                state,
                state_depth,
                round,
            } => {
                let player = round.players[round.index];
                assert!(
                    (edge as usize) < state.count_available_actions(player),
                    "action id {} out of range for player {}",
                    edge,
                    player
                );
                if round.index + 1 < round.players.len() {
                    // more players act in this round; emit an intermediate
                    // node over the same state
                    let mut chosen = round.chosen.clone();
                    chosen.push(action.clone());
                    Self::build(
                        self.domain.clone(),
                        Some(self.clone()),
                        Some(edge),
                        NodeBody::Player {
                            state: state.clone(),
                            state_depth: *state_depth,
                            round: Round {
                                players: round.players.clone(),
                                index: round.index + 1,
                                chosen,
                            },
                        },
                        Some(EdgeRecord::quiet(Some((player, edge)))),
                        None,
                    )
                } else {
                    let mut joint: Vec<Rc<dyn Action>> =
                        vec![self.domain.no_action(), self.domain.no_action()];
                    for (i, p) in round.players.iter().enumerate() {
                        joint[*p] = if i < round.index {
                            round.chosen[i].clone()
                        } else {
                            action.clone()
                        };
                    }
                    let distribution = state.perform_actions(&joint);
                    debug_assert!(
                        is_normalized(&distribution),
                        "transition distribution is not normalized"
                    );
                    if distribution.len() == 1 {
                        let entry = distribution.into_iter().next().unwrap();
                        materialize(
                            &self.domain,
                            Some(self),
                            Some(edge),
                            Some((player, edge)),
                            entry.outcome,
                            entry.prob,
                            state_depth + 1,
                        )
                    } else {
                        // stochastic transition: insert an explicit chance
                        // node before resolving the outcome
                        Self::build(
                            self.domain.clone(),
                            Some(self.clone()),
                            Some(edge),
                            NodeBody::Chance {
                                state: Some(state.clone()),
                                state_depth: *state_depth,
                                outcomes: distribution,
                            },
                            Some(EdgeRecord::quiet(Some((player, edge)))),
                            None,
                        )
                    }
                }
            }
            NodeBody::GadgetChance { game } => {
                let underlying = &game.summary().nodes[edge as usize];
                match game.variant() {
                    GadgetVariant::SafeResolving => Self::build(
                        self.domain.clone(),
                        Some(self.clone()),
                        Some(edge),
                        NodeBody::GadgetPlayer {
                            game: game.clone(),
                            underlying: underlying.clone(),
                        },
                        None,
                        None,
                    ),
                    GadgetVariant::UnsafeResolving => underlying.clone(),
                    GadgetVariant::MaxMargin => unimplemented!("max-margin gadget"),
                }
            }
            NodeBody::GadgetPlayer { game, underlying } => match edge {
                GADGET_FOLLOW => underlying.clone(),
                GADGET_TERMINATE => {
                    let v = game.cfv_value(self.history[0]);
                    Self::build(
                        self.domain.clone(),
                        Some(self.clone()),
                        Some(edge),
                        NodeBody::GadgetTerminal {
                            utilities: [v, -v],
                        },
                        None,
                        None,
                    )
                }
                _ => unreachable!("gadget decision has exactly two actions"),
            },
            NodeBody::Terminal { .. } | NodeBody::GadgetTerminal { .. } => {
                unreachable!("cannot traverse past a terminal node")
            }
        }
    }

    /// Entry point for the gadget factory: the chance root of a gadget
    /// game.
    pub(crate) fn gadget_root(domain: Rc<dyn Domain>, game: Rc<GadgetGame>) -> Rc<EfgNode> {
        Self::build(domain, None, None, NodeBody::GadgetChance { game }, None, None)
    }

    /// The underlying game node a gadget decision wraps, if any.
    pub fn underlying_node(&self) -> Option<&Rc<EfgNode>> {
        match &self.body {
            NodeBody::GadgetPlayer { underlying, .. } => Some(underlying),
            _ => None,
        }
    }

    /// Draw one outgoing edge at random: probability-weighted on chance
    /// nodes, uniform on player nodes. Only defined for non-terminal
    /// nodes.
    pub fn sample_edge(&self, rng: &mut impl rand::Rng) -> EdgeId {
        match self.kind() {
            NodeKind::Chance => {
                let mut remaining = rng.gen::<f64>();
                let count = self.count_available_actions();
                for edge in 0..count {
                    remaining -= self.chance_prob(edge as EdgeId);
                    if remaining <= 0.0 {
                        return edge as EdgeId;
                    }
                }
                count as EdgeId - 1
            }
            NodeKind::Player => rng.gen_range(0..self.count_available_actions()) as EdgeId,
            NodeKind::Terminal => unreachable!("terminal nodes have no edges"),
        }
    }
}

/// Resolve one outcome into a node, advancing deterministically through
/// no-op states. Rewards along a collapsed advance add up; a later real
/// observation supersedes an earlier one, an earlier real observation
/// survives a later no-observation.
fn materialize(
    domain: &Rc<dyn Domain>,
    parent: Option<&Rc<EfgNode>>,
    incoming_edge: Option<EdgeId>,
    actor: Option<(Player, ActionId)>,
    outcome: crate::domain::Outcome,
    prob: f64,
    state_depth: usize,
) -> Rc<EfgNode> {
    let mut rewards = outcome.rewards;
    let mut observations = [outcome.observations[0].id(), outcome.observations[1].id()];
    let mut public_observation = outcome.public_observation.id();
    let mut state = outcome.state;
    let mut depth = state_depth;

    let body = loop {
        if state.is_terminal() || depth >= domain.max_state_depth() {
            let base = parent.map(|p| p.cumulative_rewards()).unwrap_or([0.0, 0.0]);
            break NodeBody::Terminal {
                utilities: [base[0] + rewards[0], base[1] + rewards[1]],
                state_depth: depth,
            };
        }

        let mut acting = state.acting_players();
        if !acting.is_empty() {
            acting.sort_unstable();
            break NodeBody::Player {
                state,
                state_depth: depth,
                round: Round {
                    players: acting,
                    index: 0,
                    chosen: vec![],
                },
            };
        }

        // no-op state: stochastic transitions become explicit chance
        // nodes, deterministic ones advance in place
        let joint = [domain.no_action(), domain.no_action()];
        let distribution = state.perform_actions(&joint);
        debug_assert!(
            is_normalized(&distribution),
            "transition distribution is not normalized"
        );
        if distribution.len() > 1 {
            break NodeBody::Chance {
                state: Some(state),
                state_depth: depth,
                outcomes: distribution,
            };
        }
        let entry = distribution.into_iter().next().unwrap();
        rewards[0] += entry.outcome.rewards[0];
        rewards[1] += entry.outcome.rewards[1];
        for p in 0..2 {
            let next = entry.outcome.observations[p].id();
            if next != NO_OBSERVATION_ID {
                observations[p] = next;
            }
        }
        let next_public = entry.outcome.public_observation.id();
        if next_public != NO_OBSERVATION_ID {
            public_observation = next_public;
        }
        state = entry.outcome.state;
        depth += 1;
    };

    let (edge, initial) = match parent {
        Some(_) => {
            let mut ao_ids = [
                ActionObservationIds::new(NO_ACTION_ID, observations[0]),
                ActionObservationIds::new(NO_ACTION_ID, observations[1]),
            ];
            if let Some((player, action)) = actor {
                ao_ids[player].action = action;
            }
            (
                Some(EdgeRecord {
                    ao_ids,
                    public_observation,
                    rewards,
                    chance_prob: prob,
                }),
                None,
            )
        }
        None => (
            None,
            Some(InitialObservations {
                observations,
                rewards,
            }),
        ),
    };

    EfgNode::build(
        domain.clone(),
        parent.cloned(),
        incoming_edge,
        body,
        edge,
        initial,
    )
}

impl PartialEq for EfgNode {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.specialization() == other.specialization()
            && self.kind() == other.kind()
            && self.history == other.history
    }
}

impl Eq for EfgNode {}

impl Hash for EfgNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl Display for EfgNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "∅")?;
        for edge in &self.history {
            write!(f, ",{}", edge)?;
        }
        Ok(())
    }
}

impl Debug for EfgNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EfgNode({}, {:?}, {:?})",
            self,
            self.kind(),
            self.specialization()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamestates::matching_pennies::{MatchingPenniesDomain, Variant};

    fn alternating_root() -> Rc<EfgNode> {
        EfgNode::root(Rc::new(MatchingPenniesDomain::new(Variant::AlternatingMoves)))
    }

    #[test]
    fn test_root_collapses_single_atom_distribution() {
        let root = alternating_root();
        assert_eq!(root.kind(), NodeKind::Player);
        assert!(root.is_root());
        assert_eq!(root.depth(), 0);
        assert_eq!(root.current_player(), Some(0));
        assert_eq!(root.count_available_actions(), 2);
    }

    #[test]
    fn test_history_identity() {
        let root = alternating_root();
        let a = root.perform_action(&root.action_by_id(0));
        let b = root.perform_action(&root.action_by_id(0));
        let c = root.perform_action(&root.action_by_id(1));
        assert_eq!(a, b);
        assert_eq!(a.hash_value(), b.hash_value());
        assert_ne!(a, c);
        assert_eq!(a.history(), &[0]);
        assert_eq!(c.history(), &[1]);
        assert_eq!(a.depth(), 1);
        assert_eq!(a.parent().unwrap().as_ref(), root.as_ref());
        assert_eq!(a.incoming_edge(), Some(0));
    }

    #[test]
    fn test_terminal_utilities_accumulate() {
        let root = alternating_root();
        let mid = root.perform_action(&root.action_by_id(0));
        let leaf = mid.perform_action(&mid.action_by_id(0));
        assert_eq!(leaf.kind(), NodeKind::Terminal);
        // matching pennies: same picks, first player wins
        assert_eq!(leaf.utilities(), [1.0, -1.0]);
        assert_eq!(leaf.cumulative_rewards(), leaf.utilities());
        assert_eq!(leaf.chance_reach(), 1.0);
    }

    #[test]
    fn test_ao_ids_per_edge() {
        let root = alternating_root();
        let mid = root.perform_action(&root.action_by_id(1));
        // the first player acted and saw nothing
        assert_eq!(
            mid.ao_ids(0),
            &[ActionObservationIds::new(1, NO_OBSERVATION_ID)]
        );
        // the second player privately observed the move
        assert_eq!(mid.ao_ids(1)[0].action, NO_ACTION_ID);
        assert_ne!(mid.ao_ids(1)[0].observation, NO_OBSERVATION_ID);
        assert_eq!(root.ao_ids(0), &[] as &[ActionObservationIds]);
    }

    #[test]
    #[should_panic]
    fn test_traversing_past_terminal_panics() {
        let root = alternating_root();
        let mid = root.perform_action(&root.action_by_id(0));
        let leaf = mid.perform_action(&mid.action_by_id(0));
        let _ = leaf.perform_action(&mid.action_by_id(0));
    }

    #[test]
    #[should_panic]
    fn test_chance_probs_on_player_node_panics() {
        let root = alternating_root();
        let _ = root.chance_probs();
    }

    #[test]
    fn test_random_playouts_stay_within_bounds() {
        use rand::{rngs::StdRng, SeedableRng};

        use crate::gamestates::liars_dice::LiarsDiceDomain;

        let domain: Rc<dyn Domain> = Rc::new(LiarsDiceDomain::new([2, 0], 2));
        let mut rng: StdRng = SeedableRng::seed_from_u64(17);
        for _ in 0..50 {
            let mut node = EfgNode::root(domain.clone());
            while node.kind() != NodeKind::Terminal {
                let edge = node.sample_edge(&mut rng);
                node = node.perform_action(&node.action_by_id(edge));
            }
            assert!(node.state_depth() <= domain.max_state_depth());
            assert!(node.utilities()[0].abs() <= domain.max_abs_utility());
        }
    }
}
