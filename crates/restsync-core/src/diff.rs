//! Drift between the local and remote versions of a resource

use restsync_resource::{LogicalPath, PatchOperation, Resource, diff, similarity};
use restsync_secrets::{collect_placeholders, normalize_for_diff};
use serde::Serialize;

use restsync_metadata::ResourceRecord;

use crate::Result;
use crate::transform::PayloadEngine;

/// Patch turning the remote body into the local (desired) one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffReport {
    pub path: LogicalPath,
    pub patch: Vec<PatchOperation>,
    /// 1.0 for identical bodies
    pub similarity: f64,
}

impl DiffReport {
    /// True when the remote already matches the local body.
    pub fn is_clean(&self) -> bool {
        self.patch.is_empty()
    }
}

/// Compare two bodies under a record's comparison rules.
///
/// Both sides go through the `compare` transform, then every secret
/// attribute is replaced by a placeholder. Placeholder literals found in
/// the local body are reused for the remote side, so a stored
/// `{{secret "db"}}` against a fetched plaintext value is not drift.
pub fn compare_resources(
    path: &LogicalPath,
    record: &ResourceRecord,
    payload: &dyn PayloadEngine,
    remote: &Resource,
    local: &Resource,
) -> Result<DiffReport> {
    let remote = payload.apply(remote, &record.compare)?;
    let local = payload.apply(local, &record.compare)?;

    let secrets = record.secret_attributes();
    let overrides = collect_placeholders(&local, secrets)?;
    let remote = normalize_for_diff(&remote, secrets, &overrides)?;
    let local = normalize_for_diff(&local, secrets, &overrides)?;

    let patch = diff(remote.value(), local.value());
    let report = DiffReport {
        path: path.clone(),
        similarity: similarity(remote.value(), local.value()),
        patch,
    };
    tracing::debug!(path = %path, changes = report.patch.len(), "Compared resource");
    Ok(report)
}
