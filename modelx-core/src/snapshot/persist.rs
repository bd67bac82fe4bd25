//! Saving and restoring snapshots as JSON
//!
//! A saved snapshot can be applied to a freshly built injector once its
//! models have been resolved, which is how server-rendered state is
//! hydrated on the client.

use crate::error::PersistResult;
use crate::injector::Injector;
use crate::snapshot::patch::apply_snapshot;
use crate::snapshot::serialize::{get_model_snapshot, get_snapshot};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;

/// Serialize the snapshot of `injector` as pretty-printed JSON
pub fn to_json_string(injector: &Injector) -> PersistResult<String> {
    Ok(serde_json::to_string_pretty(&get_snapshot(injector))?)
}

/// Parse `json` and apply it to `injector`
pub fn from_json_str(json: &str, injector: &Injector) -> PersistResult<()> {
    let snapshot: Value = serde_json::from_str(json)?;
    apply_snapshot(&snapshot, injector);
    Ok(())
}

pub fn save_snapshot<P: AsRef<Path>>(path: P, injector: &Injector) -> PersistResult<()> {
    let path = path.as_ref();
    let json = to_json_string(injector)?;
    std::fs::write(path, json)?;
    tracing::debug!(path = %path.display(), "Snapshot saved");
    Ok(())
}

pub fn load_snapshot<P: AsRef<Path>>(path: P, injector: &Injector) -> PersistResult<()> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    from_json_str(&contents, injector)?;
    tracing::debug!(path = %path.display(), "Snapshot loaded");
    Ok(())
}

/// Decode the snapshot of model `name` into a typed value
///
/// Returns `None` when no model has that name.
pub fn read_model<T: DeserializeOwned>(name: &str, injector: &Injector) -> PersistResult<Option<T>> {
    match get_model_snapshot(name, injector) {
        Value::Null => Ok(None),
        snapshot => Ok(Some(serde_json::from_value(snapshot)?)),
    }
}
