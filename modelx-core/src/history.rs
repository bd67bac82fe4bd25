//! Undo/redo over snapshots
//!
//! A [`SnapshotHistory`] listens to an injector's snapshots and keeps a
//! bounded list of them. Undo and redo re-apply a recorded snapshot
//! through the patch path, so they are atomic and listeners see one
//! notification per step.

use crate::injector::Injector;
use crate::snapshot::{apply_snapshot, get_snapshot, on_snapshot};
use modelx_reactive::ReactionDisposer;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

struct HistoryState {
    entries: VecDeque<Value>,
    cursor: usize,
    capacity: usize,
    /// Set while undo/redo applies a snapshot, so it is not recorded again
    replaying: bool,
}

impl HistoryState {
    fn record(&mut self, snapshot: &Value) {
        if self.replaying {
            return;
        }
        self.entries.truncate(self.cursor + 1);
        self.entries.push_back(snapshot.clone());
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
    }
}

/// Bounded snapshot history of one injector
///
/// Recording stops when the history is dropped.
pub struct SnapshotHistory {
    injector: Injector,
    state: Rc<RefCell<HistoryState>>,
    disposer: Option<ReactionDisposer>,
}

impl SnapshotHistory {
    /// Start recording, with the current snapshot as the first entry
    pub fn attach(injector: &Injector, capacity: usize) -> Self {
        let baseline = injector.graph().untracked(|| get_snapshot(injector));
        let state = Rc::new(RefCell::new(HistoryState {
            entries: VecDeque::from([baseline]),
            cursor: 0,
            capacity: capacity.max(1),
            replaying: false,
        }));

        let recorder = state.clone();
        let disposer = on_snapshot(
            move |snapshot| recorder.borrow_mut().record(snapshot),
            injector,
        );

        SnapshotHistory {
            injector: injector.clone(),
            state,
            disposer: Some(disposer),
        }
    }

    pub fn can_undo(&self) -> bool {
        self.state.borrow().cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        let state = self.state.borrow();
        state.cursor + 1 < state.entries.len()
    }

    /// Step back one snapshot; false when there is nothing to undo
    pub fn undo(&self) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.replay(|cursor| cursor - 1);
        true
    }

    /// Step forward one snapshot; false when there is nothing to redo
    pub fn redo(&self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.replay(|cursor| cursor + 1);
        true
    }

    fn replay(&self, step: impl FnOnce(usize) -> usize) {
        let target = {
            let mut state = self.state.borrow_mut();
            state.cursor = step(state.cursor);
            state.replaying = true;
            state.entries[state.cursor].clone()
        };
        apply_snapshot(&target, &self.injector);
        self.state.borrow_mut().replaying = false;
    }

    /// The snapshot at the cursor
    pub fn current(&self) -> Option<Value> {
        let state = self.state.borrow();
        state.entries.get(state.cursor).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.state.borrow().capacity
    }

    /// Stop recording; dropping the history does the same
    pub fn detach(self) {}
}

impl Drop for SnapshotHistory {
    fn drop(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer.dispose();
        }
    }
}
