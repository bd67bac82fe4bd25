//! Modelx Reactive - the observable graph behind modelx state
//!
//! This crate provides the small reactive substrate that modelx models live
//! in. It is deliberately minimal: containers own their data and only
//! report *observation* and *change* to the graph through an [`Atom`].
//!
//! ## Key Features
//!
//! - **Dependency Tracking**: reads performed while a reaction computes are
//!   recorded as that reaction's dependencies
//! - **Transactions**: writes inside [`Graph::transaction`] are batched and
//!   reactions run once, when the outermost transaction ends
//! - **Reactions**: [`Graph::reaction`] re-runs a computation when one of its
//!   dependencies changes and calls back only when the result differs under
//!   a caller supplied equality
//! - **Settle hooks**: [`Graph::on_reactions_settled`] runs a one-shot hook
//!   after the current flush of reactions has drained
//! - **Strict mode**: writes outside a transaction are reported
//!
//! # Example
//!
//! ```rust
//! use modelx_reactive::{Atom, Graph};
//! use std::cell::{Cell, RefCell};
//! use std::rc::Rc;
//!
//! let graph = Graph::new();
//! let atom = Atom::new(&graph);
//! let value = Rc::new(Cell::new(1));
//! let seen = Rc::new(RefCell::new(Vec::new()));
//!
//! let disposer = {
//!     let (atom, value, seen) = (atom.clone(), value.clone(), seen.clone());
//!     graph.reaction(
//!         move || {
//!             atom.report_observed();
//!             value.get()
//!         },
//!         move |v: &i32| seen.borrow_mut().push(*v),
//!         |a, b| a == b,
//!     )
//! };
//!
//! graph.transaction(|| {
//!     value.set(2);
//!     atom.report_changed();
//!     value.set(3);
//!     atom.report_changed();
//! });
//!
//! assert_eq!(*seen.borrow(), vec![3]);
//! disposer.dispose();
//! ```

pub mod atom;
pub mod error;
pub mod graph;
pub mod reaction;

pub use atom::{Atom, AtomId};
pub use error::{ReactiveError, ReactiveResult};
pub use graph::{Graph, Revision, DEFAULT_MAX_ROUNDS};
pub use reaction::{ReactionDisposer, ReactionId};
