//! Snapshot listeners

use crate::injector::Injector;
use crate::snapshot::serialize::{get_model_snapshot, get_snapshot};
use modelx_reactive::{ReactionDisposer, ReactionId};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Call `on_change` with the full snapshot whenever it changes
///
/// Not called for the current state. Changes made by a snapshot patch are
/// delivered once, with the merged state, after the patch has settled.
pub fn on_snapshot(
    on_change: impl Fn(&Value) + 'static,
    injector: &Injector,
) -> ReactionDisposer {
    subscribe(injector, on_change, get_snapshot)
}

/// Like [`on_snapshot`], restricted to the model named `name`
pub fn on_model_snapshot(
    name: impl Into<String>,
    on_change: impl Fn(&Value) + 'static,
    injector: &Injector,
) -> ReactionDisposer {
    let name = name.into();
    subscribe(injector, on_change, move |injector| {
        get_model_snapshot(&name, injector)
    })
}

fn subscribe<F, S>(injector: &Injector, on_change: F, select: S) -> ReactionDisposer
where
    F: Fn(&Value) + 'static,
    S: Fn(&Injector) -> Value + 'static,
{
    let on_change = Rc::new(on_change);
    let held: Rc<RefCell<Option<Value>>> = Rc::new(RefCell::new(None));
    let reaction: Rc<Cell<Option<ReactionId>>> = Rc::new(Cell::new(None));

    let compute = {
        let weak = injector.downgrade();
        move || match weak.upgrade() {
            Some(injector) => select(&injector),
            None => Value::Null,
        }
    };

    let deliver = {
        let weak = injector.downgrade();
        let reaction = reaction.clone();
        move |value: &Value| {
            let Some(injector) = weak.upgrade() else {
                return;
            };
            let gate = injector.gate();
            if gate.is_done() {
                on_change(value);
                return;
            }

            // Keep only the latest value; one delivery is queued per patch.
            let queued = held.borrow_mut().replace(value.clone()).is_some();
            if queued {
                return;
            }
            let (held, on_change, reaction) = (held.clone(), on_change.clone(), reaction.clone());
            let graph = injector.graph().clone();
            gate.defer(move || {
                let Some(value) = held.borrow_mut().take() else {
                    return;
                };
                let active = reaction.get().is_some_and(|id| graph.has_reaction(id));
                if active {
                    on_change(&value);
                }
            });
        }
    };

    let disposer = injector.graph().reaction(compute, deliver, |a, b| a == b);
    reaction.set(Some(disposer.id()));
    disposer
}
