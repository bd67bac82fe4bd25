//! Snapshot phase tracking
//!
//! An injector is `Patching` from the start of a merge-patch until the
//! reactions that patch triggered have settled. Snapshot listeners hold
//! their notifications back while patching and receive them on the way
//! back to `Done`.

use std::cell::{Cell, RefCell};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SnapshotPhase {
    /// A patch is being merged; listeners are held back
    Patching,

    #[default]
    Done,
}

impl fmt::Display for SnapshotPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotPhase::Patching => write!(f, "patching"),
            SnapshotPhase::Done => write!(f, "done"),
        }
    }
}

type Deferred = Box<dyn FnOnce()>;

/// Phase of one injector plus the notifications waiting for `Done`
#[derive(Default)]
pub(crate) struct PhaseGate {
    /// Patches begun and not yet settled; nested patches keep the gate shut
    active: Cell<usize>,
    deferred: RefCell<Vec<Deferred>>,
}

impl PhaseGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SnapshotPhase {
        if self.active.get() > 0 {
            SnapshotPhase::Patching
        } else {
            SnapshotPhase::Done
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase() == SnapshotPhase::Done
    }

    pub fn begin(&self) {
        let active = self.active.get() + 1;
        self.active.set(active);
        tracing::debug!(active, "Snapshot phase: patching");
    }

    /// Close one patch; the last one to close delivers what was deferred
    pub fn finish(&self) {
        let active = self.active.get().saturating_sub(1);
        self.active.set(active);
        if active > 0 {
            return;
        }

        tracing::debug!("Snapshot phase: done");
        // Deliveries may start new patches; stop as soon as one is open.
        while self.is_done() {
            let batch = std::mem::take(&mut *self.deferred.borrow_mut());
            if batch.is_empty() {
                break;
            }
            for deliver in batch {
                deliver();
            }
        }
    }

    /// Run `deliver` now if the phase is `Done`, otherwise once it is
    pub fn defer(&self, deliver: impl FnOnce() + 'static) {
        if self.is_done() {
            deliver();
        } else {
            self.deferred.borrow_mut().push(Box::new(deliver));
        }
    }
}

impl fmt::Debug for PhaseGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseGate")
            .field("phase", &self.phase())
            .field("deferred", &self.deferred.borrow().len())
            .finish()
    }
}
