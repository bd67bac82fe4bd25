//! Atoms: the unit of observation
//!
//! An atom carries no data. A container that owns some value embeds an atom
//! and calls [`Atom::report_observed`] on every read and
//! [`Atom::report_changed`] on every effective write.

use crate::graph::Graph;
use std::fmt;

/// Unique identifier of an atom within a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AtomId(pub u64);

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "atom#{}", self.0)
    }
}

/// Handle to an atom registered in a [`Graph`]
///
/// Cloning an atom gives another handle to the same identity.
#[derive(Clone)]
pub struct Atom {
    graph: Graph,
    id: AtomId,
}

impl Atom {
    pub fn new(graph: &Graph) -> Self {
        Self {
            graph: graph.clone(),
            id: graph.next_atom_id(),
        }
    }

    pub fn id(&self) -> AtomId {
        self.id
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Record a read of this atom in the innermost tracking frame
    pub fn report_observed(&self) {
        self.graph.report_observed(self.id);
    }

    /// Record a write of this atom and schedule dependent reactions
    pub fn report_changed(&self) {
        self.graph.report_changed(self.id);
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_ids_are_unique() {
        let graph = Graph::new();
        let a = Atom::new(&graph);
        let b = Atom::new(&graph);

        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn test_atom_observation_is_tracked() {
        let graph = Graph::new();
        let atom = Atom::new(&graph);

        let ((), deps) = graph.track(|| atom.report_observed());
        assert!(deps.contains(&atom.id()));

        let ((), deps) = graph.track(|| graph.untracked(|| atom.report_observed()));
        assert!(deps.is_empty());
    }
}
