//! The snapshot engine
//!
//! Turns the live state of an injector into plain `serde_json::Value`
//! trees and back:
//!
//! - [`get_snapshot`] / [`get_model_snapshot`] serialize
//! - [`patch_snapshot`] / [`apply_snapshot`] merge plain data back in one
//!   transaction
//! - [`on_snapshot`] / [`on_model_snapshot`] notify on change, never in
//!   the middle of a patch
//!
//! Snapshots are detached copies; nothing in them refers back to live
//! state.

mod diff;
pub(crate) mod patch;
pub(crate) mod phase;
pub mod persist;
mod serialize;
mod subscribe;

pub use diff::{diff_snapshots, ChangeKind, SnapshotChange};
pub use patch::{apply_snapshot, patch_snapshot};
pub use phase::SnapshotPhase;
pub use serialize::{clone_plain, get_model_snapshot, get_snapshot, walk};
pub use subscribe::{on_model_snapshot, on_snapshot};
