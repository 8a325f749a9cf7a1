//! Whole-game statistics over a fully built cache. The test suites assert
//! entire structs against known-good values.

use std::rc::Rc;

use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::{
    cache::{InfosetCache, PublicStateCache},
    domain::Domain,
    efg::NodeKind,
    istate::ActionSequence,
};

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DomainStatistics {
    pub max_efg_depth: usize,
    pub max_state_depth: usize,
    pub num_nodes: usize,
    pub num_terminals: usize,
    /// Player-node counts per acting player.
    pub num_histories: [usize; 2],
    /// Ordinary (non-augmented) information sets per player.
    pub num_infosets: [usize; 2],
    /// Distinct action sequences per player, the empty sequence included.
    pub num_sequences: [usize; 2],
    pub num_public_states: usize,
}

/// Build the domain's full tree and measure it.
pub fn calculate_domain_statistics(domain: Rc<dyn Domain>) -> DomainStatistics {
    let mut infosets = InfosetCache::new(domain.clone());
    infosets.build_tree();
    let mut public_states = PublicStateCache::new(domain);
    public_states.build_tree();

    let mut stats = DomainStatistics {
        num_public_states: public_states.count_public_states(),
        ..DomainStatistics::default()
    };

    let mut sequences: [FxHashSet<ActionSequence>; 2] =
        [FxHashSet::default(), FxHashSet::default()];
    for node in infosets.nodes() {
        stats.num_nodes += 1;
        stats.max_efg_depth = stats.max_efg_depth.max(node.depth());
        stats.max_state_depth = stats.max_state_depth.max(node.state_depth());
        match node.kind() {
            NodeKind::Terminal => stats.num_terminals += 1,
            NodeKind::Player => {
                let player = node.current_player().unwrap();
                stats.num_histories[player] += 1;
            }
            NodeKind::Chance => {}
        }
        for player in 0..2 {
            sequences[player].insert(node.action_sequence(player));
        }
    }
    stats.num_sequences = [sequences[0].len(), sequences[1].len()];

    infosets.for_each_infoset(|aoh, nodes| {
        // ordinary infosets only: the key's player must actually act there
        let acted = nodes
            .first()
            .map(|n| n.kind() == NodeKind::Player && n.current_player() == Some(aoh.player()))
            .unwrap_or(false);
        if acted {
            stats.num_infosets[aoh.player()] += 1;
        }
    });

    stats
}
