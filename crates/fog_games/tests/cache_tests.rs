//! Invariants of the infoset and public-state caches over fully built
//! trees.

use std::rc::Rc;

use fog_games::{
    cache::{InfosetCache, PublicStateCache},
    gamestates::{
        goofspiel::GoofspielDomain,
        liars_dice::LiarsDiceDomain,
        matching_pennies::{MatchingPenniesDomain, Variant},
        simple_poker::SimplePokerDomain,
    },
    Domain, NodeKind,
};
use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};

fn partition_domains() -> Vec<Rc<dyn Domain>> {
    vec![
        Rc::new(MatchingPenniesDomain::new(Variant::AlternatingMoves)),
        Rc::new(MatchingPenniesDomain::new(Variant::SimultaneousMoves)),
        Rc::new(LiarsDiceDomain::new([2, 0], 2)),
        Rc::new(GoofspielDomain::iigs(3)),
        Rc::new(SimplePokerDomain::new()),
    ]
}

#[test]
fn test_infosets_partition_player_nodes() {
    for domain in partition_domains() {
        let mut cache = InfosetCache::new(domain.clone());
        cache.build_tree();

        for player in 0..2 {
            let acted_by = cache
                .nodes()
                .into_iter()
                .filter(|n| n.current_player() == Some(player))
                .collect_vec();

            // every acting node is listed in exactly the infoset matching
            // its own key, and those infosets are disjoint
            let mut seen = FxHashSet::default();
            cache.for_each_infoset(|aoh, nodes| {
                if aoh.player() != player {
                    return;
                }
                for node in nodes {
                    if node.current_player() == Some(player) {
                        assert_eq!(node.aoh_infoset(player), **aoh);
                        assert!(seen.insert(node.clone()), "node in two infosets");
                    }
                }
            });
            assert_eq!(seen.len(), acted_by.len(), "{}", domain.info());
        }
    }
}

#[test]
fn test_nodes_in_returns_whole_infoset() {
    let domain: Rc<dyn Domain> = Rc::new(LiarsDiceDomain::new([2, 0], 2));
    let mut cache = InfosetCache::new(domain);
    cache.build_tree();

    for node in cache.nodes() {
        if node.kind() != NodeKind::Player {
            continue;
        }
        let infoset = cache.infoset_for(&node);
        let members = cache.nodes_in(&infoset);
        assert!(members.iter().any(|m| m == &node));
        for member in &members {
            assert_eq!(member.aoh_infoset(infoset.player()), *infoset);
        }
    }
}

#[test]
fn test_augmented_infosets_refine_public_states() {
    for domain in partition_domains() {
        let mut cache = PublicStateCache::new(domain.clone());
        cache.build_tree();

        cache.for_each_public_state(|public_state, nodes| {
            for player in 0..2 {
                let infosets = cache.infosets_in_for_player(public_state, player);
                // the infosets of the public state cover its nodes exactly
                let mut covered = FxHashSet::default();
                for infoset in &infosets {
                    for node in nodes.iter() {
                        if node.aoh_infoset(player) == **infoset {
                            assert!(
                                covered.insert(node.clone()),
                                "two infosets of one player share a node"
                            );
                        }
                    }
                }
                assert_eq!(covered.len(), nodes.len(), "{}", domain.info());
            }
        });
    }
}

#[test]
fn test_every_infoset_sits_inside_one_public_state() {
    for domain in partition_domains() {
        let mut infosets = InfosetCache::new(domain.clone());
        infosets.build_tree();

        infosets.for_each_infoset(|_aoh, nodes| {
            let reference = nodes[0].public_state();
            for node in nodes {
                assert_eq!(node.public_state(), reference, "{}", domain.info());
            }
        });
    }
}

#[test]
fn test_goofspiel_public_state_counts() {
    for (cards, expected) in [(2, 11), (3, 39), (4, 131)] {
        let mut cache = PublicStateCache::new(Rc::new(GoofspielDomain::iigs(cards)));
        cache.build_tree();
        assert_eq!(cache.count_public_states(), expected, "IIGS({})", cards);
    }
}

#[test]
fn test_public_state_parenthood() {
    let mut cache = PublicStateCache::new(Rc::new(GoofspielDomain::iigs(2)));
    cache.build_tree();

    let root = cache.root_public_state();
    assert_eq!(root.depth(), 0);

    let mut total_children = 0;
    cache.for_each_public_state(|public_state, _| {
        if public_state.depth() > 0 {
            assert!(root.is_ancestor_of(public_state));
        }
        total_children += cache.public_state_children(public_state).len();
    });
    // every non-root public state is someone's child
    assert_eq!(total_children, cache.count_public_states() - 1);
}

#[test]
fn test_infoset_to_public_state_mapping() {
    let mut cache = PublicStateCache::new(Rc::new(LiarsDiceDomain::new([1, 0], 2)));
    cache.build_tree();

    for node in cache.nodes() {
        let node_ps = cache.public_state_for(&node);
        for player in 0..2 {
            let aoh = node.aoh_infoset(player);
            assert_eq!(cache.public_state_for_infoset(&aoh), node_ps);
        }
    }
}

#[test]
fn test_node_to_public_state_is_total_on_built_cache() {
    let mut cache = PublicStateCache::new(Rc::new(GoofspielDomain::iigs(2)));
    cache.build_tree();

    let mut by_state: FxHashMap<Vec<u32>, usize> = FxHashMap::default();
    for node in cache.nodes() {
        let ps = cache.public_state_for(&node);
        *by_state.entry(ps.history().to_vec()).or_default() += 1;
        assert!(cache
            .nodes_in_public_state(&ps)
            .iter()
            .any(|n| n == &node));
    }
    assert_eq!(by_state.len(), cache.count_public_states());
    assert_eq!(by_state.values().sum::<usize>(), cache.node_count());
}

#[test]
fn test_clear_then_rebuild_reaches_identical_sizes() {
    let mut cache = PublicStateCache::new(Rc::new(GoofspielDomain::iigs(3)));
    cache.build_tree();
    let nodes_before = cache.node_count();
    let states_before = cache.count_public_states();

    cache.clear();
    assert_eq!(cache.node_count(), 1);
    assert_eq!(cache.count_public_states(), 1);
    assert!(!cache.is_fully_built());

    cache.build_tree();
    assert_eq!(cache.node_count(), nodes_before);
    assert_eq!(cache.count_public_states(), states_before);
}
