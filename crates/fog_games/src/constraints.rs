//! Optional interface for domains that can enumerate world histories
//! consistent with an information set, used by determinized search and
//! subgame resolving.

use std::{any::Any, fmt::Debug, rc::Rc, time::Instant};

use dyn_clone::DynClone;
use rustc_hash::FxHashMap;

use crate::{efg::EfgNode, istate::Aoh};

/// Domain-specific constraint attached to one position of the revealed
/// history. Domains downcast their own entries via `as_any`.
pub trait Constraint: Debug + DynClone {
    fn as_any(&self) -> &dyn Any;
}

dyn_clone::clone_trait_object!(Constraint);

/// Accumulated constraints, keyed by the position they were derived from.
pub type ConstraintsMap = FxHashMap<usize, Box<dyn Constraint>>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BudgetKind {
    /// Cap on the number of emitted nodes.
    Nodes,
    /// Cap in wall-clock milliseconds.
    Time,
}

/// Tracks consumption of a generation budget.
pub struct BudgetMeter {
    kind: BudgetKind,
    budget: usize,
    used: usize,
    started: Instant,
}

impl BudgetMeter {
    pub fn new(kind: BudgetKind, budget: usize) -> Self {
        Self {
            kind,
            budget,
            used: 0,
            started: Instant::now(),
        }
    }

    /// Account for one emitted node; returns whether the budget still has
    /// room for more.
    pub fn consume(&mut self) -> bool {
        self.used += 1;
        match self.kind {
            BudgetKind::Nodes => self.used < self.budget,
            BudgetKind::Time => (self.started.elapsed().as_millis() as usize) < self.budget,
        }
    }

    /// Whether a node may still be emitted at all.
    pub fn has_room(&self) -> bool {
        match self.kind {
            BudgetKind::Nodes => self.used < self.budget,
            BudgetKind::Time => (self.started.elapsed().as_millis() as usize) < self.budget,
        }
    }

    pub fn used(&self) -> usize {
        self.used
    }
}

/// Callback receiving generated nodes; returning `false` stops the
/// enumeration early.
pub type NodeEmitter<'a> = dyn FnMut(Rc<EfgNode>) -> bool + 'a;

/// A domain able to enumerate the world histories consistent with an
/// information set under a budget.
///
/// With `BudgetKind::Nodes` and a budget of at least the information set's
/// size, every node of the set is emitted exactly once; under a smaller
/// budget the emitted set is an arbitrary subset. Emitted nodes are equal
/// to the canonical nodes of the underlying tree.
pub trait ConstrainingDomain: crate::domain::Domain {
    /// Domain-specific prepopulation of the constraints map.
    fn initialize_enumerative_constraints(&self, _constraints: &mut ConstraintsMap) {}

    /// Fold the information set into the constraints, starting at
    /// `start_index`; the index is advanced so subsequent calls extend the
    /// work instead of repeating it. Returns whether the information set
    /// is still realizable.
    fn update_constraints(
        &self,
        infoset: &Aoh,
        start_index: &mut i64,
        constraints: &mut ConstraintsMap,
    ) -> bool;

    /// Produce the nodes of the information set, in any order, within the
    /// budget.
    fn generate_nodes(
        self: Rc<Self>,
        infoset: &Aoh,
        constraints: &ConstraintsMap,
        budget_kind: BudgetKind,
        budget: usize,
        emit: &mut NodeEmitter,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_budget_is_a_hard_cap() {
        let mut meter = BudgetMeter::new(BudgetKind::Nodes, 2);
        assert!(meter.has_room());
        assert!(meter.consume());
        assert!(meter.has_room());
        assert!(!meter.consume());
        assert!(!meter.has_room());
        assert_eq!(meter.used(), 2);
    }

    #[test]
    fn test_time_budget_expires() {
        let mut meter = BudgetMeter::new(BudgetKind::Time, 0);
        assert!(!meter.has_room());
        assert!(!meter.consume());
    }
}
