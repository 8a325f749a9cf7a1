//! Caches that memoize tree expansion and the derived index structures.
//!
//! [`EfgTreeCache`] owns every node it has ever materialized and maps each
//! one to its (lazily filled) child slots. Derived caches register node
//! callbacks at construction time and populate their own maps whenever the
//! tree cache creates a node; [`InfosetCache`] maintains the bipartite
//! node/infoset maps, [`PublicStateCache`] the public-state maps.
//!
//! Each cache instance is a single-threaded owner. Independent caches over
//! the same domain never share nodes.

use std::{
    cell::{Ref, RefCell},
    ops::{Deref, DerefMut},
    rc::Rc,
};

use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    domain::Domain,
    efg::{EdgeId, EfgNode, NodeKind, Specialization},
    istate::{Aoh, PublicState},
    Player,
};

/// Child slots of one node, indexed by edge id; `None` until requested.
pub type ChildSlots = Vec<Option<Rc<EfgNode>>>;

type NodeCallback = Box<dyn FnMut(&Rc<EfgNode>)>;

/// Memoizes the EFG tree of one domain.
pub struct EfgTreeCache {
    domain: Rc<dyn Domain>,
    root: Rc<EfgNode>,
    children: FxHashMap<Rc<EfgNode>, ChildSlots>,
    callbacks: Vec<NodeCallback>,
    fully_built: bool,
}

impl EfgTreeCache {
    pub fn new(domain: Rc<dyn Domain>) -> Self {
        let root = EfgNode::root(domain.clone());
        let mut cache = Self {
            domain,
            root: root.clone(),
            children: FxHashMap::default(),
            callbacks: vec![],
            fully_built: false,
        };
        cache.register_node(&root);
        cache
    }

    /// Build a gadget-rooted cache; resolving algorithms expand the gadget
    /// like any other tree.
    pub fn with_root(domain: Rc<dyn Domain>, root: Rc<EfgNode>) -> Self {
        let mut cache = Self {
            domain,
            root: root.clone(),
            children: FxHashMap::default(),
            callbacks: vec![],
            fully_built: false,
        };
        cache.register_node(&root);
        cache
    }

    /// Register a node-creation observer. Derived caches call this at
    /// construction; the callback fires once per newly created node.
    pub fn add_callback(&mut self, callback: NodeCallback) {
        self.callbacks.push(callback);
    }

    pub fn domain(&self) -> &Rc<dyn Domain> {
        &self.domain
    }

    pub fn root(&self) -> &Rc<EfgNode> {
        &self.root
    }

    pub fn has_node(&self, node: &Rc<EfgNode>) -> bool {
        self.children.contains_key(node)
    }

    pub fn has_child(&self, node: &Rc<EfgNode>, edge: EdgeId) -> bool {
        self.children
            .get(node)
            .and_then(|slots| slots.get(edge as usize))
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    pub fn has_any_children(&self, node: &Rc<EfgNode>) -> bool {
        self.children
            .get(node)
            .map(|slots| slots.iter().any(|slot| slot.is_some()))
            .unwrap_or(false)
    }

    pub fn has_all_children(&self, node: &Rc<EfgNode>) -> bool {
        self.children
            .get(node)
            .map(|slots| slots.iter().all(|slot| slot.is_some()))
            .unwrap_or(false)
    }

    /// The child after following `edge`, materializing it on first use.
    pub fn child(&mut self, node: &Rc<EfgNode>, edge: EdgeId) -> Rc<EfgNode> {
        let slots = self.slots_of(node);
        assert!(
            (edge as usize) < slots.len(),
            "edge {} out of range at {}",
            edge,
            node
        );
        if let Some(child) = &slots[edge as usize] {
            return child.clone();
        }

        let action = node.action_by_id(edge);
        let child = node.perform_action(&action);
        self.register_node(&child);
        self.children.get_mut(node).unwrap()[edge as usize] = Some(child.clone());
        child
    }

    /// All children of the node, materializing the missing ones.
    pub fn children(&mut self, node: &Rc<EfgNode>) -> Vec<Rc<EfgNode>> {
        let count = self.slots_of(node).len();
        (0..count).map(|e| self.child(node, e as EdgeId)).collect()
    }

    /// Snapshot of every node known to the cache.
    pub fn nodes(&self) -> Vec<Rc<EfgNode>> {
        self.children.keys().cloned().collect()
    }

    pub fn node_count(&self) -> usize {
        self.children.len()
    }

    /// DFS-fill the whole reachable tree.
    pub fn build_tree(&mut self) {
        debug!("building full tree for {}", self.domain.info());
        let root = self.root.clone();
        self.expand_recursive(&root, None);
        self.fully_built = true;
        debug!("built {} nodes", self.node_count());
    }

    /// DFS-fill the tree up to the EFG-depth bound. Records whether the
    /// entire reachable tree was walked.
    pub fn build_tree_to_depth(&mut self, max_depth: usize) {
        debug!(
            "building tree to depth {} for {}",
            max_depth,
            self.domain.info()
        );
        let root = self.root.clone();
        self.fully_built = self.expand_recursive(&root, Some(max_depth));
    }

    fn expand_recursive(&mut self, node: &Rc<EfgNode>, max_depth: Option<usize>) -> bool {
        if node.kind() == NodeKind::Terminal {
            return true;
        }
        if let Some(bound) = max_depth {
            if node.depth() >= bound {
                return false;
            }
        }
        let count = node.count_available_actions();
        let mut entire = true;
        for edge in 0..count {
            let child = self.child(node, edge as EdgeId);
            entire = self.expand_recursive(&child, max_depth) && entire;
        }
        entire
    }

    /// Whether a previous build walked the entire reachable tree.
    pub fn is_fully_built(&self) -> bool {
        self.fully_built
    }

    /// Drop all memoized tree data, keeping the root entry.
    pub fn clear(&mut self) {
        self.children.clear();
        self.fully_built = false;
        let root = self.root.clone();
        self.register_node(&root);
    }

    fn register_node(&mut self, node: &Rc<EfgNode>) {
        let slots = match node.kind() {
            NodeKind::Terminal => vec![],
            _ => vec![None; node.count_available_actions()],
        };
        let inserted = match self.children.entry(node.clone()) {
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(slots);
                true
            }
            std::collections::hash_map::Entry::Occupied(_) => false,
        };
        if inserted {
            for callback in self.callbacks.iter_mut() {
                callback(node);
            }
        }
    }

    fn slots_of(&mut self, node: &Rc<EfgNode>) -> &ChildSlots {
        if !self.children.contains_key(node) {
            // nodes constructed outside the cache are admitted only if
            // they are this cache's root; anything else is a node from a
            // different cache
            assert!(
                node.as_ref() == self.root.as_ref(),
                "node {} does not belong to this cache",
                node
            );
            let root = self.root.clone();
            self.register_node(&root);
        }
        self.children.get(node).unwrap()
    }
}

/// Call the function at every node of the cached tree, including leaves,
/// expanding lazily as the walk proceeds.
pub fn tree_walk(cache: &mut EfgTreeCache, mut callback: impl FnMut(&Rc<EfgNode>)) {
    let root = cache.root().clone();
    walk_recursive(cache, &root, &mut callback, None);
}

/// Depth-bounded variant; returns whether the entire tree was walked.
pub fn tree_walk_to_depth(
    cache: &mut EfgTreeCache,
    max_depth: usize,
    mut callback: impl FnMut(&Rc<EfgNode>),
) -> bool {
    let root = cache.root().clone();
    walk_recursive(cache, &root, &mut callback, Some(max_depth))
}

fn walk_recursive(
    cache: &mut EfgTreeCache,
    node: &Rc<EfgNode>,
    callback: &mut impl FnMut(&Rc<EfgNode>),
    max_depth: Option<usize>,
) -> bool {
    callback(node);
    if node.kind() == NodeKind::Terminal {
        return true;
    }
    if let Some(bound) = max_depth {
        if node.depth() >= bound {
            return false;
        }
    }
    let mut entire = true;
    for edge in 0..node.count_available_actions() {
        let child = cache.child(node, edge as EdgeId);
        entire = walk_recursive(cache, &child, callback, max_depth) && entire;
    }
    entire
}

/// Read-only view of a behavioral strategy, keyed by information set.
/// Implemented by solver data structures; the core only fixes the
/// interface.
pub trait StrategyCache {
    /// Probability per action at the information set, dense by action id;
    /// `None` when the strategy does not cover it.
    fn strategy_for(&self, infoset: &Aoh) -> Option<Vec<f64>>;
}

#[derive(Default)]
struct InfosetMaps {
    node_infosets: FxHashMap<Rc<EfgNode>, [Rc<Aoh>; 2]>,
    infoset_nodes: FxHashMap<Rc<Aoh>, Vec<Rc<EfgNode>>>,
}

/// Tree cache plus the bipartite (augmented) infoset maps.
///
/// On every node creation both augmented information sets, one per player,
/// are constructed and indexed. On a fully built cache, `nodes_in`
/// contains every node whose key equals the queried one.
pub struct InfosetCache {
    tree: EfgTreeCache,
    maps: Rc<RefCell<InfosetMaps>>,
}

impl InfosetCache {
    pub fn new(domain: Rc<dyn Domain>) -> Self {
        Self::over(EfgTreeCache::new(domain))
    }

    /// Attach infoset indexing to an existing (fresh) tree cache.
    pub fn over(mut tree: EfgTreeCache) -> Self {
        let maps = Rc::new(RefCell::new(InfosetMaps::default()));
        let hook = maps.clone();
        tree.add_callback(Box::new(move |node| {
            Self::index_node(&hook, node);
        }));
        let root = tree.root().clone();
        Self::index_node(&maps, &root);
        Self { tree, maps }
    }

    fn index_node(maps: &Rc<RefCell<InfosetMaps>>, node: &Rc<EfgNode>) {
        // action-observation histories are undefined for the gadget chance
        // root and gadget terminals
        if node.specialization() == Specialization::Gadget && node.kind() != NodeKind::Player {
            return;
        }
        let mut maps = maps.borrow_mut();

        // a gadget decision defines only the viewing player's information
        // set; both slots share it
        if node.specialization() == Specialization::Gadget {
            let interned = Self::intern(&mut maps, node.current_infoset());
            maps.infoset_nodes
                .entry(interned.clone())
                .or_default()
                .push(node.clone());
            maps.node_infosets
                .insert(node.clone(), [interned.clone(), interned]);
            return;
        }

        let mut per_player: Vec<Rc<Aoh>> = Vec::with_capacity(2);
        for player in 0..2 {
            let interned = Self::intern(&mut maps, node.aoh_infoset(player));
            maps.infoset_nodes
                .entry(interned.clone())
                .or_default()
                .push(node.clone());
            per_player.push(interned);
        }
        let pair = [per_player[0].clone(), per_player[1].clone()];
        maps.node_infosets.insert(node.clone(), pair);
    }

    fn intern(maps: &mut InfosetMaps, aoh: Aoh) -> Rc<Aoh> {
        match maps.infoset_nodes.get_key_value(&aoh) {
            Some((existing, _)) => existing.clone(),
            None => Rc::new(aoh),
        }
    }

    /// The acting player's information set for the node. Undefined for
    /// chance and terminal nodes.
    pub fn infoset_for(&self, node: &Rc<EfgNode>) -> Rc<Aoh> {
        let player = match node.current_player() {
            Some(p) => p,
            None => unreachable!("only player nodes have an acting-player infoset"),
        };
        self.aug_infoset_for(node, player)
    }

    /// The augmented information set of the given player for the node.
    pub fn aug_infoset_for(&self, node: &Rc<EfgNode>, player: Player) -> Rc<Aoh> {
        self.maps.borrow().node_infosets[node][player].clone()
    }

    pub fn has_infoset(&self, aoh: &Aoh) -> bool {
        self.maps.borrow().infoset_nodes.contains_key(aoh)
    }

    /// Every cached node whose key for `aoh.player()` equals `aoh`.
    pub fn nodes_in(&self, aoh: &Aoh) -> Vec<Rc<EfgNode>> {
        self.maps
            .borrow()
            .infoset_nodes
            .get(aoh)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of distinct augmented information sets.
    pub fn count_infosets(&self) -> usize {
        self.maps.borrow().infoset_nodes.len()
    }

    pub fn for_each_infoset(&self, mut f: impl FnMut(&Rc<Aoh>, &[Rc<EfgNode>])) {
        for (aoh, nodes) in self.maps.borrow().infoset_nodes.iter() {
            f(aoh, nodes);
        }
    }

    pub fn clear(&mut self) {
        self.maps.borrow_mut().node_infosets.clear();
        self.maps.borrow_mut().infoset_nodes.clear();
        self.tree.clear();
    }
}

impl Deref for InfosetCache {
    type Target = EfgTreeCache;

    fn deref(&self) -> &Self::Target {
        &self.tree
    }
}

impl DerefMut for InfosetCache {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tree
    }
}

#[derive(Default)]
struct PublicStateMaps {
    node_public_state: FxHashMap<Rc<EfgNode>, Rc<PublicState>>,
    public_state_nodes: FxHashMap<Rc<PublicState>, FxHashSet<Rc<EfgNode>>>,
    infoset_public_state: FxHashMap<Rc<Aoh>, Rc<PublicState>>,
    public_state_infosets: FxHashMap<Rc<PublicState>, FxHashSet<Rc<Aoh>>>,
}

/// Tree cache plus public states and their information sets.
pub struct PublicStateCache {
    tree: EfgTreeCache,
    maps: Rc<RefCell<PublicStateMaps>>,
}

impl PublicStateCache {
    pub fn new(domain: Rc<dyn Domain>) -> Self {
        Self::over(EfgTreeCache::new(domain))
    }

    pub fn over(mut tree: EfgTreeCache) -> Self {
        let maps = Rc::new(RefCell::new(PublicStateMaps::default()));
        let hook = maps.clone();
        tree.add_callback(Box::new(move |node| {
            Self::index_node(&hook, node);
        }));
        let root = tree.root().clone();
        Self::index_node(&maps, &root);
        Self { tree, maps }
    }

    fn index_node(maps: &Rc<RefCell<PublicStateMaps>>, node: &Rc<EfgNode>) {
        // gadget nodes have no public state
        if node.specialization() == Specialization::Gadget {
            return;
        }
        let mut maps = maps.borrow_mut();
        let public_state = node.public_state();
        let interned = match maps.public_state_nodes.get_key_value(&public_state) {
            Some((existing, _)) => existing.clone(),
            None => Rc::new(public_state),
        };

        maps.node_public_state
            .insert(node.clone(), interned.clone());
        maps.public_state_nodes
            .entry(interned.clone())
            .or_default()
            .insert(node.clone());

        for player in 0..2 {
            let aoh = Rc::new(node.aoh_infoset(player));
            maps.infoset_public_state
                .insert(aoh.clone(), interned.clone());
            maps.public_state_infosets
                .entry(interned.clone())
                .or_default()
                .insert(aoh);
        }
    }

    pub fn has_public_state(&self, public_state: &PublicState) -> bool {
        self.maps
            .borrow()
            .public_state_nodes
            .contains_key(public_state)
    }

    pub fn public_state_for(&self, node: &Rc<EfgNode>) -> Rc<PublicState> {
        self.maps.borrow().node_public_state[node].clone()
    }

    pub fn public_state_for_infoset(&self, aoh: &Aoh) -> Rc<PublicState> {
        self.maps.borrow().infoset_public_state[aoh].clone()
    }

    pub fn nodes_in_public_state(&self, public_state: &PublicState) -> Vec<Rc<EfgNode>> {
        self.maps
            .borrow()
            .public_state_nodes
            .get(public_state)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All (augmented) information sets intersecting the public state.
    pub fn infosets_in(&self, public_state: &PublicState) -> Vec<Rc<Aoh>> {
        self.maps
            .borrow()
            .public_state_infosets
            .get(public_state)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The given player's information sets within the public state.
    pub fn infosets_in_for_player(
        &self,
        public_state: &PublicState,
        player: Player,
    ) -> Vec<Rc<Aoh>> {
        self.infosets_in(public_state)
            .into_iter()
            .filter(|aoh| aoh.player() == player)
            .collect()
    }

    pub fn root_public_state(&self) -> Rc<PublicState> {
        self.public_state_for(self.tree.root())
    }

    pub fn count_public_states(&self) -> usize {
        self.maps.borrow().public_state_nodes.len()
    }

    pub fn for_each_public_state(&self, mut f: impl FnMut(&Rc<PublicState>, &FxHashSet<Rc<EfgNode>>)) {
        for (public_state, nodes) in self.maps.borrow().public_state_nodes.iter() {
            f(public_state, nodes);
        }
    }

    fn maps(&self) -> Ref<'_, PublicStateMaps> {
        self.maps.borrow()
    }

    /// Children of a public state in the public tree, ordered by history.
    /// Needs a fully built cache.
    pub fn public_state_children(&self, parent: &PublicState) -> Vec<Rc<PublicState>> {
        assert!(self.is_fully_built(), "public tree needs a fully built cache");
        let mut children: Vec<Rc<PublicState>> = self
            .maps()
            .public_state_nodes
            .keys()
            .filter(|ps| ps.depth() == parent.depth() + 1 && parent.is_ancestor_of(ps))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.history().cmp(b.history()));
        children
    }

    pub fn is_terminal_public_state(&self, public_state: &PublicState) -> bool {
        self.public_state_children(public_state).is_empty()
    }

    pub fn clear(&mut self) {
        {
            let mut maps = self.maps.borrow_mut();
            maps.node_public_state.clear();
            maps.public_state_nodes.clear();
            maps.infoset_public_state.clear();
            maps.public_state_infosets.clear();
        }
        self.tree.clear();
    }
}

impl Deref for PublicStateCache {
    type Target = EfgTreeCache;

    fn deref(&self) -> &Self::Target {
        &self.tree
    }
}

impl DerefMut for PublicStateCache {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamestates::matching_pennies::{MatchingPenniesDomain, Variant};

    fn alternating() -> Rc<dyn Domain> {
        Rc::new(MatchingPenniesDomain::new(Variant::AlternatingMoves))
    }

    #[test]
    fn test_cache_fills_lazily() {
        let mut cache = EfgTreeCache::new(alternating());
        let root = cache.root().clone();
        assert!(cache.has_node(&root));
        assert!(!cache.has_any_children(&root));
        assert!(!cache.has_all_children(&root));

        cache.child(&root, 0);
        assert!(cache.has_child(&root, 0));
        assert!(!cache.has_child(&root, 1));
        assert!(cache.has_any_children(&root));
        assert!(!cache.has_all_children(&root));

        cache.child(&root, 1);
        assert!(cache.has_all_children(&root));
    }

    #[test]
    fn test_child_is_memoized() {
        let mut cache = EfgTreeCache::new(alternating());
        let root = cache.root().clone();
        let a = cache.child(&root, 0);
        let b = cache.child(&root, 0);
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_equal_foreign_root_is_admitted() {
        let domain = alternating();
        let mut cache = EfgTreeCache::new(domain.clone());
        let foreign_root = EfgNode::root(domain);
        let child = cache.child(&foreign_root, 1);
        assert_eq!(child.history(), &[1]);
    }

    #[test]
    #[should_panic]
    fn test_foreign_inner_node_is_rejected() {
        let domain = alternating();
        let mut cache = EfgTreeCache::new(domain.clone());
        let foreign_root = EfgNode::root(domain);
        let foreign_child = foreign_root.perform_action(&foreign_root.action_by_id(0));
        // never materialized through this cache
        cache.children(&foreign_child);
    }

    #[test]
    fn test_build_tree_counts() {
        let mut cache = EfgTreeCache::new(alternating());
        cache.build_tree();
        assert!(cache.is_fully_built());
        assert_eq!(cache.node_count(), 7);
    }

    #[test]
    fn test_build_to_depth_bound() {
        let mut cache = EfgTreeCache::new(alternating());
        cache.build_tree_to_depth(1);
        assert!(!cache.is_fully_built());
        assert_eq!(cache.node_count(), 3);

        cache.build_tree_to_depth(2);
        assert!(cache.is_fully_built());
        assert_eq!(cache.node_count(), 7);
    }

    #[test]
    fn test_clear_restores_root() {
        let mut cache = InfosetCache::new(alternating());
        cache.build_tree();
        assert_eq!(cache.node_count(), 7);
        let infosets_before = cache.count_infosets();

        cache.clear();
        assert_eq!(cache.node_count(), 1);
        assert!(cache.has_node(&cache.root().clone()));
        assert!(cache.count_infosets() < infosets_before);

        cache.build_tree();
        assert_eq!(cache.node_count(), 7);
        assert_eq!(cache.count_infosets(), infosets_before);
    }

    #[test]
    fn test_infoset_cache_counts_ordinary_infosets() {
        let mut cache = InfosetCache::new(alternating());
        cache.build_tree();

        let root = cache.root().clone();
        let infoset = cache.infoset_for(&root);
        assert_eq!(infoset.player(), 0);
        assert_eq!(cache.nodes_in(&infoset), vec![root.clone()]);

        // both second-player decision nodes sit in distinct infosets
        let a = cache.child(&root, 0);
        let b = cache.child(&root, 1);
        assert_ne!(cache.infoset_for(&a), cache.infoset_for(&b));
    }

    #[test]
    fn test_public_state_cache_matching_pennies() {
        for variant in [Variant::AlternatingMoves, Variant::SimultaneousMoves] {
            let mut cache = PublicStateCache::new(Rc::new(MatchingPenniesDomain::new(variant)));
            cache.build_tree();
            assert_eq!(cache.count_public_states(), 4, "{:?}", variant);

            let root_ps = cache.root_public_state();
            assert_eq!(root_ps.depth(), 0);
            assert!(!cache.is_terminal_public_state(&root_ps));
        }
    }
}
