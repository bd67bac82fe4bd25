//! Reaction handles

use crate::graph::{Graph, GraphState};
use std::cell::RefCell;
use std::fmt;
use std::rc::Weak;

/// Unique identifier of a reaction within a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReactionId(pub u64);

/// Disposer returned by [`Graph::reaction`]
///
/// Dropping the disposer does not stop the reaction; call
/// [`ReactionDisposer::dispose`] for that.
#[must_use = "a reaction keeps running until it is disposed"]
pub struct ReactionDisposer {
    graph: Weak<RefCell<GraphState>>,
    id: ReactionId,
}

impl ReactionDisposer {
    pub(crate) fn new(graph: Weak<RefCell<GraphState>>, id: ReactionId) -> Self {
        Self { graph, id }
    }

    pub fn id(&self) -> ReactionId {
        self.id
    }

    /// Whether the reaction is still registered
    pub fn is_active(&self) -> bool {
        Graph::from_weak(&self.graph)
            .map(|graph| graph.has_reaction(self.id))
            .unwrap_or(false)
    }

    /// Stop the reaction. Returns false if it was already gone.
    pub fn dispose(self) -> bool {
        match Graph::from_weak(&self.graph) {
            Some(graph) => {
                tracing::trace!(reaction = self.id.0, "Reaction disposed");
                graph.remove_reaction(self.id)
            }
            None => false,
        }
    }
}

impl fmt::Debug for ReactionDisposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionDisposer")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Atom;

    #[test]
    fn test_disposer_reports_activity() {
        let graph = Graph::new();
        let atom = Atom::new(&graph);

        let disposer = graph.reaction(move || atom.report_observed(), |_| {}, |_, _| true);
        assert!(disposer.is_active());

        let id = disposer.id();
        assert!(disposer.dispose());
        assert!(!graph.has_reaction(id));
    }

    #[test]
    fn test_disposer_outlives_graph() {
        let graph = Graph::new();
        let disposer = graph.reaction(|| 0, |_: &i32| {}, |a, b| a == b);
        drop(graph);

        assert!(!disposer.is_active());
        assert!(!disposer.dispose());
    }
}
