//! The observable graph
//!
//! The graph keeps the bookkeeping that ties atoms to reactions: the stack
//! of tracking frames, the dependency set of every reaction, the queue of
//! reactions waiting to run, the transaction depth and the settle hooks.
//!
//! All callbacks (computations, change handlers, hooks) are invoked with no
//! borrow of the graph state held, so they are free to read and write other
//! atoms, open transactions, or create and dispose reactions.

use crate::atom::AtomId;
use crate::error::{ReactiveError, ReactiveResult};
use crate::reaction::{ReactionDisposer, ReactionId};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

/// Maximum number of flush rounds before a reaction cycle is reported
pub const DEFAULT_MAX_ROUNDS: usize = 100;

/// Number of effective writes observed by a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Revision(pub u64);

impl Revision {
    pub const ZERO: Revision = Revision(0);

    pub fn next(self) -> Revision {
        Revision(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

pub(crate) type Runner = Rc<dyn Fn()>;

struct ReactionSlot {
    deps: HashSet<AtomId>,
    runner: Runner,
}

pub(crate) struct GraphState {
    next_atom: u64,
    next_reaction: u64,
    revision: Revision,

    /// `None` frames come from `untracked` and swallow observations
    tracking: Vec<Option<HashSet<AtomId>>>,

    /// Ordered by creation so flushes are deterministic
    reactions: BTreeMap<ReactionId, ReactionSlot>,
    pending: Vec<ReactionId>,

    batch_depth: usize,
    running: bool,
    settle_hooks: Vec<Box<dyn FnOnce()>>,

    strict: bool,
    max_rounds: usize,
}

/// Handle to an observable graph
///
/// Cloning a `Graph` gives another handle to the same graph.
#[derive(Clone)]
pub struct Graph {
    inner: Rc<RefCell<GraphState>>,
}

impl Graph {
    /// Create a new graph
    pub fn new() -> Self {
        Self::with_max_rounds(DEFAULT_MAX_ROUNDS)
    }

    /// Create a graph that gives up flushing after `max_rounds` rounds
    pub fn with_max_rounds(max_rounds: usize) -> Self {
        Graph {
            inner: Rc::new(RefCell::new(GraphState {
                next_atom: 1,
                next_reaction: 1,
                revision: Revision::ZERO,
                tracking: Vec::new(),
                reactions: BTreeMap::new(),
                pending: Vec::new(),
                batch_depth: 0,
                running: false,
                settle_hooks: Vec::new(),
                strict: false,
                max_rounds: max_rounds.max(1),
            })),
        }
    }

    pub(crate) fn from_weak(weak: &Weak<RefCell<GraphState>>) -> Option<Self> {
        weak.upgrade().map(|inner| Graph { inner })
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<GraphState>> {
        Rc::downgrade(&self.inner)
    }

    /// Whether two handles point at the same graph
    pub fn ptr_eq(&self, other: &Graph) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn next_atom_id(&self) -> AtomId {
        let mut state = self.inner.borrow_mut();
        let id = AtomId(state.next_atom);
        state.next_atom += 1;
        id
    }

    /// Current revision; bumps on every reported change
    pub fn revision(&self) -> Revision {
        self.inner.borrow().revision
    }

    /// Turn strict mode on or off, returning the previous setting
    pub fn set_strict(&self, strict: bool) -> bool {
        std::mem::replace(&mut self.inner.borrow_mut().strict, strict)
    }

    pub fn is_strict(&self) -> bool {
        self.inner.borrow().strict
    }

    /// Whether a transaction is currently open
    pub fn in_transaction(&self) -> bool {
        self.inner.borrow().batch_depth > 0
    }

    /// Whether reactions are currently being flushed
    pub fn is_running_reactions(&self) -> bool {
        self.inner.borrow().running
    }

    /// Number of live reactions
    pub fn reaction_count(&self) -> usize {
        self.inner.borrow().reactions.len()
    }

    /// Record a read of `atom` in the innermost tracking frame
    pub fn report_observed(&self, atom: AtomId) {
        let mut state = self.inner.borrow_mut();
        if let Some(Some(frame)) = state.tracking.last_mut() {
            frame.insert(atom);
        }
    }

    /// Record a write of `atom`; dependent reactions run now, or when the
    /// outermost transaction ends
    pub fn report_changed(&self, atom: AtomId) {
        let idle = {
            let mut state = self.inner.borrow_mut();
            state.revision = state.revision.next();

            if state.strict && state.batch_depth == 0 && !state.running {
                tracing::warn!(%atom, "Observable state modified outside of a transaction");
            }

            let GraphState {
                reactions, pending, ..
            } = &mut *state;
            for (id, slot) in reactions.iter() {
                if slot.deps.contains(&atom) && !pending.contains(id) {
                    pending.push(*id);
                }
            }

            state.batch_depth == 0
        };

        if idle {
            self.flush_or_log();
        }
    }

    /// Run `f` while recording every atom it observes
    pub fn track<R>(&self, f: impl FnOnce() -> R) -> (R, HashSet<AtomId>) {
        self.inner.borrow_mut().tracking.push(Some(HashSet::new()));
        let guard = FrameGuard { graph: self };
        let result = f();
        drop(guard);
        (result, self.take_last_frame())
    }

    /// Run `f` without recording any observation
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.borrow_mut().tracking.push(None);
        let guard = FrameGuard { graph: self };
        let result = f();
        drop(guard);
        self.take_last_frame();
        result
    }

    fn take_last_frame(&self) -> HashSet<AtomId> {
        self.inner
            .borrow_mut()
            .tracking
            .pop()
            .flatten()
            .unwrap_or_default()
    }

    /// Run `f` as one atomic batch
    ///
    /// Reactions scheduled by writes inside `f` run once, after the outermost
    /// transaction returns. Transactions nest.
    pub fn transaction<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.borrow_mut().batch_depth += 1;
        let guard = BatchGuard { graph: self };
        let result = f();
        drop(guard);

        if !self.in_transaction() {
            self.flush_or_log();
        }
        result
    }

    /// Run `hook` once, after the reactions currently in flight have settled
    ///
    /// When no transaction is open and no flush is running the hook runs
    /// immediately.
    pub fn on_reactions_settled(&self, hook: impl FnOnce() + 'static) {
        let deferred = {
            let mut state = self.inner.borrow_mut();
            if state.batch_depth > 0 || state.running {
                state.settle_hooks.push(Box::new(hook));
                None
            } else {
                Some(hook)
            }
        };

        if let Some(hook) = deferred {
            hook();
        }
    }

    /// Create a reaction
    ///
    /// `compute` runs immediately to establish the baseline and its
    /// dependencies; `on_change` is not called for the baseline. Afterwards,
    /// whenever a dependency changes, `compute` re-runs and `on_change` is
    /// called with the new value if `equals(previous, new)` is false.
    pub fn reaction<T, C, H, E>(&self, compute: C, on_change: H, equals: E) -> ReactionDisposer
    where
        T: Clone + 'static,
        C: Fn() -> T + 'static,
        H: Fn(&T) + 'static,
        E: Fn(&T, &T) -> bool + 'static,
    {
        let id = {
            let mut state = self.inner.borrow_mut();
            let id = ReactionId(state.next_reaction);
            state.next_reaction += 1;
            id
        };

        let (baseline, deps) = self.track(&compute);
        let last = RefCell::new(baseline);
        let weak = self.downgrade();

        let runner: Runner = Rc::new(move || {
            let Some(graph) = Graph::from_weak(&weak) else {
                return;
            };
            if !graph.has_reaction(id) {
                return;
            }

            let (value, deps) = graph.track(&compute);
            graph.set_deps(id, deps);

            let changed = !equals(&*last.borrow(), &value);
            if changed {
                *last.borrow_mut() = value.clone();
                on_change(&value);
            }
        });

        self.inner
            .borrow_mut()
            .reactions
            .insert(id, ReactionSlot { deps, runner });

        tracing::trace!(reaction = id.0, "Reaction created");
        ReactionDisposer::new(self.downgrade(), id)
    }

    /// Whether the reaction `id` is still registered
    pub fn has_reaction(&self, id: ReactionId) -> bool {
        self.inner.borrow().reactions.contains_key(&id)
    }

    fn set_deps(&self, id: ReactionId, deps: HashSet<AtomId>) {
        if let Some(slot) = self.inner.borrow_mut().reactions.get_mut(&id) {
            slot.deps = deps;
        }
    }

    pub(crate) fn remove_reaction(&self, id: ReactionId) -> bool {
        let mut state = self.inner.borrow_mut();
        state.pending.retain(|pending| *pending != id);
        state.reactions.remove(&id).is_some()
    }

    /// Run every pending reaction, then the settle hooks
    ///
    /// Does nothing inside a transaction or while a flush is already running;
    /// the outer flush picks up whatever was scheduled.
    pub fn flush(&self) -> ReactiveResult<()> {
        let max_rounds = {
            let mut state = self.inner.borrow_mut();
            if state.running || state.batch_depth > 0 {
                return Ok(());
            }
            state.running = true;
            state.max_rounds
        };

        let outcome = {
            let _running = RunningGuard { graph: self };
            let mut rounds = 0;
            loop {
                let batch: Vec<Runner> = {
                    let mut state = self.inner.borrow_mut();
                    let ids = std::mem::take(&mut state.pending);
                    ids.iter()
                        .filter_map(|id| state.reactions.get(id).map(|slot| slot.runner.clone()))
                        .collect()
                };
                if batch.is_empty() {
                    break Ok(());
                }

                rounds += 1;
                if rounds > max_rounds {
                    self.inner.borrow_mut().pending.clear();
                    break Err(ReactiveError::ReactionCycle { rounds: max_rounds });
                }

                for runner in batch {
                    runner();
                }
            }
        };

        let hooks = std::mem::take(&mut self.inner.borrow_mut().settle_hooks);
        for hook in hooks {
            hook();
        }

        outcome
    }

    fn flush_or_log(&self) {
        if let Err(err) = self.flush() {
            tracing::error!(error = %err, "Reaction flush aborted");
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("Graph")
            .field("revision", &state.revision)
            .field("reactions", &state.reactions.len())
            .field("pending", &state.pending.len())
            .field("batch_depth", &state.batch_depth)
            .field("running", &state.running)
            .field("strict", &state.strict)
            .finish()
    }
}

struct FrameGuard<'a> {
    graph: &'a Graph,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.graph.inner.borrow_mut().tracking.pop();
        }
    }
}

struct BatchGuard<'a> {
    graph: &'a Graph,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.graph.inner.borrow_mut();
        state.batch_depth = state.batch_depth.saturating_sub(1);
    }
}

struct RunningGuard<'a> {
    graph: &'a Graph,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.graph.inner.borrow_mut().running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Atom;
    use std::cell::Cell;

    fn counter(graph: &Graph) -> (Atom, Rc<Cell<i32>>) {
        (Atom::new(graph), Rc::new(Cell::new(0)))
    }

    #[test]
    fn test_revision_bumps_on_change() {
        let graph = Graph::new();
        let atom = Atom::new(&graph);

        assert_eq!(graph.revision(), Revision::ZERO);
        atom.report_changed();
        atom.report_changed();
        assert_eq!(graph.revision(), Revision(2));
        assert_eq!(Revision(2).to_string(), "r2");
    }

    #[test]
    fn test_reaction_skips_baseline() {
        let graph = Graph::new();
        let (atom, value) = counter(&graph);
        let calls = Rc::new(Cell::new(0));

        let _disposer = {
            let (atom, value, calls) = (atom.clone(), value.clone(), calls.clone());
            graph.reaction(
                move || {
                    atom.report_observed();
                    value.get()
                },
                move |_| calls.set(calls.get() + 1),
                |a, b| a == b,
            )
        };

        assert_eq!(calls.get(), 0);
        value.set(1);
        atom.report_changed();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_equal_values_do_not_notify() {
        let graph = Graph::new();
        let (atom, value) = counter(&graph);
        let calls = Rc::new(Cell::new(0));

        let _disposer = {
            let (atom, value, calls) = (atom.clone(), value.clone(), calls.clone());
            graph.reaction(
                move || {
                    atom.report_observed();
                    value.get()
                },
                move |_| calls.set(calls.get() + 1),
                |a, b| a == b,
            )
        };

        atom.report_changed();
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_transaction_batches_notifications() {
        let graph = Graph::new();
        let (atom, value) = counter(&graph);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let _disposer = {
            let (atom, value, seen) = (atom.clone(), value.clone(), seen.clone());
            graph.reaction(
                move || {
                    atom.report_observed();
                    value.get()
                },
                move |v| seen.borrow_mut().push(*v),
                |a, b| a == b,
            )
        };

        graph.transaction(|| {
            for i in 1..=5 {
                value.set(i);
                atom.report_changed();
            }
            graph.transaction(|| {
                value.set(6);
                atom.report_changed();
            });
            assert!(seen.borrow().is_empty());
        });

        assert_eq!(*seen.borrow(), vec![6]);
    }

    #[test]
    fn test_settle_hook_runs_after_reactions() {
        let graph = Graph::new();
        let (atom, value) = counter(&graph);
        let log = Rc::new(RefCell::new(Vec::new()));

        let _disposer = {
            let (atom, value, log) = (atom.clone(), value.clone(), log.clone());
            graph.reaction(
                move || {
                    atom.report_observed();
                    value.get()
                },
                move |_| log.borrow_mut().push("reaction"),
                |a, b| a == b,
            )
        };

        graph.transaction(|| {
            value.set(1);
            atom.report_changed();
            let log = log.clone();
            graph.on_reactions_settled(move || log.borrow_mut().push("settled"));
        });

        assert_eq!(*log.borrow(), vec!["reaction", "settled"]);
    }

    #[test]
    fn test_settle_hook_runs_immediately_when_idle() {
        let graph = Graph::new();
        let fired = Rc::new(Cell::new(false));

        let flag = fired.clone();
        graph.on_reactions_settled(move || flag.set(true));
        assert!(fired.get());
    }

    #[test]
    fn test_disposed_reaction_stops() {
        let graph = Graph::new();
        let (atom, value) = counter(&graph);
        let calls = Rc::new(Cell::new(0));

        let disposer = {
            let (atom, value, calls) = (atom.clone(), value.clone(), calls.clone());
            graph.reaction(
                move || {
                    atom.report_observed();
                    value.get()
                },
                move |_| calls.set(calls.get() + 1),
                |a, b| a == b,
            )
        };
        assert_eq!(graph.reaction_count(), 1);

        disposer.dispose();
        assert_eq!(graph.reaction_count(), 0);

        value.set(3);
        atom.report_changed();
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_reaction_cycle_is_reported() {
        let graph = Graph::with_max_rounds(3);
        let (atom, value) = counter(&graph);

        let _disposer = {
            let (atom, value) = (atom.clone(), value.clone());
            let (write_atom, write_value) = (atom.clone(), value.clone());
            graph.reaction(
                move || {
                    atom.report_observed();
                    value.get()
                },
                move |v| {
                    write_value.set(v + 1);
                    write_atom.report_changed();
                },
                |a, b| a == b,
            )
        };

        graph.transaction(|| {
            value.set(1);
            atom.report_changed();
        });

        // The flush gave up instead of looping forever.
        assert!(!graph.is_running_reactions());
        assert!(value.get() > 1);
    }

    #[test]
    fn test_strict_toggle_returns_previous() {
        let graph = Graph::new();
        assert!(!graph.set_strict(true));
        assert!(graph.is_strict());
        assert!(graph.set_strict(false));
    }
}
