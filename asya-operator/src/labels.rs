//! Reserved-prefix validation and propagation for labels copied from an
//! `AsyncActor` onto its owned children.

use std::collections::BTreeMap;

use asya_core::reserved::reserved_label_prefix_violation;

use crate::error::{OperatorError, OperatorResult};

/// Rejects the first user label that uses a reserved prefix without being
/// the one carved-out exception.
pub fn validate_user_labels(labels: &BTreeMap<String, String>) -> OperatorResult<()> {
    for key in labels.keys() {
        if let Some(prefix) = reserved_label_prefix_violation(key) {
            return Err(OperatorError::reserved_label_prefix(key.clone(), prefix));
        }
    }
    Ok(())
}

/// Merges user labels with the operator-managed set, letting the managed
/// set win on any key collision (the managed set only ever contains
/// reserved-prefix keys, so this never clobbers a plain user label).
pub fn propagate_labels(
    user_labels: &BTreeMap<String, String>,
    managed_labels: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = user_labels.clone();
    merged.extend(managed_labels.clone());
    merged
}
