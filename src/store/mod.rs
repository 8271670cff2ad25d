//! File-backed stores, one per entity family.
//!
//! Layout under a shared `base_dir`:
//! ```text
//! companies/<TICKER>.json                       latest only
//! assessments/<entity>.json                     latest
//! assessment_history/<entity>/<ts>.json         append-only
//! theses/<thesis_id>.json
//! thesis_history/<thesis_id>/<ts>.json
//! kg_edges/<edge_id>.json
//! kg_edge_history/<edge_id>/<ts>.json
//! write_events/<entity_id>/<stage>/<event_id>.json
//! ```
//! plus flat or per-entity directories for the satellite stores (quarter
//! events, catalysts, observer cycles, macro regime, top-down levers,
//! structural profiles, credit trajectories, capital markets, countries,
//! sector templates).
//!
//! Save paths share one contract: build the payload without validating,
//! deep-merge the caller's patch, validate the merged result once, then write
//! history before latest. Latest files are staged to a temp file and renamed
//! so readers never observe a torn write. History files are keyed by the
//! payload timestamp; re-saving the same `(entity, ts)` overwrites that one
//! file and nothing else.

pub mod assessment;
pub mod catalyst_event;
pub mod company;
pub mod country_ambassador;
pub mod country_relationship;
pub mod credit_trajectory;
pub mod global_capital_markets;
pub mod kg_edge;
pub mod macro_regime;
pub mod observer_cycle;
pub mod quarter_event;
pub mod sector_template;
pub mod structural_profile;
pub mod thesis;
pub mod top_down_levers;

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::builders::{build_write_event_envelope, EnvelopeParams};
use crate::error::{Error, Result};
use crate::logging::{log_store_write, log_write_event};

// =============================================================================
// Path hygiene
// =============================================================================

/// Escape an ID for use as a single file or directory name.
///
/// `/` and `\` become `_`, `:` becomes `-`, surrounding whitespace is
/// trimmed. The mapping is lossy; canonical IDs live inside the payloads,
/// never in the paths.
pub fn safe_segment(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            ':' => '-',
            other => other,
        })
        .collect()
}

// =============================================================================
// JSON file I/O
// =============================================================================

/// Serialize `payload` as pretty two-space-indented JSON and write it via a
/// temp file rename in the same directory.
pub fn write_json_atomic(path: &Path, payload: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let body = serde_json::to_string_pretty(payload).map_err(|e| Error::json(path, e))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body.as_bytes()).map_err(|e| Error::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Read and parse a JSON file. Missing files surface as [`Error::Io`]; use
/// [`read_entity_json`] where a missing file means "entity never saved".
pub fn read_json(path: &Path) -> Result<Value> {
    let body = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_str(&body).map_err(|e| Error::json(path, e))
}

/// Like [`read_json`] but a missing file maps to [`Error::EntityNotFound`]
/// carrying the entity ID instead of the path.
pub fn read_entity_json(path: &Path, entity_id: &str) -> Result<Value> {
    if !path.exists() {
        return Err(Error::EntityNotFound(entity_id.to_string()));
    }
    read_json(path)
}

/// Sorted stems of the `*.json` files directly under `dir`. A missing
/// directory is an empty listing, not an error.
pub fn list_json_stems(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut stems = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                stems.push(stem.to_string());
            }
        }
    }
    stems.sort();
    Ok(stems)
}

/// `sha256:<hex>` over the compact JSON encoding of `payload`.
pub fn payload_sha256(payload: &Value) -> String {
    let body = serde_json::to_string(payload).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

// =============================================================================
// Write-event persistence
// =============================================================================

/// Build a write-event envelope and persist it under
/// `write_events/<entity_id>/<stage>/<event_id>.json` (segments escaped).
///
/// Stamps `provenance.source_hashes` with the payload hash when the caller
/// left it empty, so every event carries verifiable provenance.
pub fn persist_write_event(
    write_events_dir: &Path,
    mut params: EnvelopeParams,
    validate: bool,
) -> Result<PathBuf> {
    if params.source_hashes.is_empty() {
        params.source_hashes = vec![payload_sha256(&params.payload_data)];
    }
    let envelope = build_write_event_envelope(&params, validate)?;

    let path = write_events_dir
        .join(safe_segment(&params.entity_id))
        .join(&params.stage)
        .join(format!("{}.json", safe_segment(&params.event_id)));
    write_json_atomic(&path, &envelope)?;
    log_write_event(&params.entity_id, &params.stage, &params.event_id);
    Ok(path)
}

/// Write history first, then latest, logging the latest write. History is
/// keyed by `ts` so identical timestamps overwrite in place.
pub(crate) fn write_latest_and_history(
    latest_path: &Path,
    history_dir: &Path,
    ts: &str,
    entity_kind: &str,
    entity_id: &str,
    payload: &Value,
) -> Result<()> {
    let history_path = history_dir.join(format!("{}.json", safe_segment(ts)));
    write_json_atomic(&history_path, payload)?;
    write_json_atomic(latest_path, payload)?;
    log_store_write(entity_kind, entity_id, latest_path);
    Ok(())
}
