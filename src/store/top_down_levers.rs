//! Top-down lever snapshot store.
//!
//! One snapshot per timestamp at `top_down_levers/<safe snapshot_id>.json`,
//! snapshot_id `top_down/<ts>`. Legacy nested lever shapes are promoted to
//! canonical `active_levers[]` entries on save, and a snapshot saved with no
//! `cascade_implications` gets them pre-seeded from the lever-only rule
//! table.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::constants::PAYLOAD_VERSION;
use crate::error::{Error, Result};
use crate::logging::log_store_write;
use crate::merge::deep_merge;
use crate::schema_validate::validate_current;
use crate::store::macro_regime::normalize_regime_state;
use crate::store::{list_json_stems, read_entity_json, read_json, safe_segment, write_json_atomic};
use crate::timefmt;
use crate::top_down::{evaluate_macro_cascade_rules, promote_legacy_levers};

#[derive(Debug, Clone)]
pub struct TopDownSnapshotParams {
    pub snapshot_id: Option<String>,
    pub as_of: String,
    pub regime_ref: String,
    pub regime_state: String,
    /// Canonical `active_levers[]` array or the legacy nested object shape.
    pub active_levers: Value,
    pub cascade_implications: Vec<Value>,
    pub sector_posture: Vec<Value>,
    pub conviction_state: Option<Value>,
    pub linked_refs: Option<Value>,
    pub generated_by: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub snapshot_payload_patch: Option<Value>,
    pub validate: bool,
}

impl TopDownSnapshotParams {
    pub fn new(as_of: &str, regime_ref: &str, regime_state: &str) -> Self {
        Self {
            snapshot_id: None,
            as_of: as_of.to_string(),
            regime_ref: regime_ref.to_string(),
            regime_state: regime_state.to_string(),
            active_levers: json!([]),
            cascade_implications: Vec::new(),
            sector_posture: Vec::new(),
            conviction_state: None,
            linked_refs: None,
            generated_by: "aion_equities.top_down_levers_store".into(),
            created_at: None,
            updated_at: None,
            snapshot_payload_patch: None,
            validate: true,
        }
    }
}

pub fn build_top_down_snapshot_payload(
    params: &TopDownSnapshotParams,
    validate: bool,
) -> Result<Value> {
    let as_of = timefmt::iso_z(&params.as_of)?;
    let snapshot_id = match &params.snapshot_id {
        Some(id) => id.clone(),
        None => format!("top_down/{as_of}"),
    };
    let created_at = timefmt::iso_z_or_now(params.created_at.as_deref())?;
    let updated_at = match &params.updated_at {
        Some(v) => timefmt::iso_z(v)?,
        None => created_at.clone(),
    };

    let active_levers = promote_legacy_levers(&params.active_levers);
    let cascade_implications = if params.cascade_implications.is_empty() {
        evaluate_macro_cascade_rules(&active_levers)
    } else {
        params.cascade_implications.clone()
    };

    let mut payload = json!({
        "snapshot_id": snapshot_id,
        "as_of": as_of,
        "regime_ref": params.regime_ref,
        "regime_state": normalize_regime_state(&params.regime_state),
        "version": PAYLOAD_VERSION,
        "active_levers": active_levers,
        "cascade_implications": cascade_implications,
        "sector_posture": params.sector_posture,
        "conviction_state": params.conviction_state.clone().unwrap_or_else(|| json!({})),
        "audit": {
            "created_at": created_at,
            "updated_at": updated_at,
            "created_by": params.generated_by,
        },
    });
    if let Some(refs) = &params.linked_refs {
        payload["linked_refs"] = refs.clone();
    }
    if let Some(patch) = &params.snapshot_payload_patch {
        payload = deep_merge(&payload, patch);
    }

    if validate {
        validate_current("top_down_levers_snapshot", &payload)?;
    }
    Ok(payload)
}

pub struct TopDownLeversStore {
    snapshots_dir: PathBuf,
}

impl TopDownLeversStore {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            snapshots_dir: base_dir.join("top_down_levers"),
        }
    }

    fn snapshot_path(&self, snapshot_id: &str) -> PathBuf {
        self.snapshots_dir
            .join(format!("{}.json", safe_segment(snapshot_id)))
    }

    pub fn save_snapshot(&self, params: &TopDownSnapshotParams) -> Result<Value> {
        let payload = build_top_down_snapshot_payload(params, params.validate)?;
        let snapshot_id = payload["snapshot_id"].as_str().unwrap_or_default();
        let path = self.snapshot_path(snapshot_id);
        write_json_atomic(&path, &payload)?;
        log_store_write("top_down_snapshot", snapshot_id, &path);
        Ok(payload)
    }

    pub fn load_snapshot_by_id(&self, snapshot_id: &str, validate: bool) -> Result<Value> {
        let payload = read_entity_json(&self.snapshot_path(snapshot_id), snapshot_id)?;
        if validate {
            validate_current("top_down_levers_snapshot", &payload)?;
        }
        Ok(payload)
    }

    /// Snapshot with the lexically greatest filename. Filenames embed the
    /// timestamp, so this is the newest one.
    pub fn load_latest_snapshot(&self, validate: bool) -> Result<Value> {
        let stems = list_json_stems(&self.snapshots_dir)?;
        let last = stems
            .last()
            .ok_or_else(|| Error::EntityNotFound("top_down/latest".into()))?;
        let payload = read_json(&self.snapshots_dir.join(format!("{last}.json")))?;
        if validate {
            validate_current("top_down_levers_snapshot", &payload)?;
        }
        Ok(payload)
    }

    pub fn snapshot_exists(&self, snapshot_id: &str) -> bool {
        self.snapshot_path(snapshot_id).exists()
    }

    pub fn list_snapshots(&self) -> Result<Vec<String>> {
        list_json_stems(&self.snapshots_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_derives_id_and_preseeds_cascades() {
        let dir = tempfile::tempdir().unwrap();
        let store = TopDownLeversStore::new(dir.path());
        let mut params =
            TopDownSnapshotParams::new("2026-02-22T22:00:00Z", "macro/regime/2026-02-22", "risk_off");
        params.active_levers = json!({
            "fx": {"usd_jpy": {"direction": "down"}},
            "credit": {"spreads": {"direction": "widening"}},
            "commodities": {"gold": {"direction": "up"}},
        });
        let payload = store.save_snapshot(&params).unwrap();

        assert_eq!(payload["snapshot_id"], "top_down/2026-02-22T22:00:00Z");
        assert_eq!(payload["regime_state"], "risk_off");
        let levers = payload["active_levers"].as_array().unwrap();
        assert!(levers.iter().any(|l| l["lever"] == "yen"));
        let rule_ids: Vec<&str> = payload["cascade_implications"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["rule_id"].as_str().unwrap())
            .collect();
        assert!(rule_ids.contains(&"credit_stress"));
        assert!(rule_ids.contains(&"gold_defensive"));
    }

    #[test]
    fn test_explicit_cascades_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = TopDownLeversStore::new(dir.path());
        let mut params =
            TopDownSnapshotParams::new("2026-02-22T22:00:00Z", "macro/regime/2026-02-22", "transition");
        params.active_levers = json!([{"lever": "gold", "direction": "up"}]);
        params.cascade_implications = vec![json!({
            "rule_id": "manual",
            "summary": "hand-written implication",
            "effect_direction": "headwind",
        })];
        let payload = store.save_snapshot(&params).unwrap();
        let cascades = payload["cascade_implications"].as_array().unwrap();
        assert_eq!(cascades.len(), 1);
        assert_eq!(cascades[0]["rule_id"], "manual");
    }

    #[test]
    fn test_load_by_id_and_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = TopDownLeversStore::new(dir.path());
        for ts in ["2026-02-21T08:00:00Z", "2026-02-22T22:00:00Z"] {
            let params = TopDownSnapshotParams::new(ts, "macro/regime/2026-02-22", "transition");
            store.save_snapshot(&params).unwrap();
        }

        let by_id = store
            .load_snapshot_by_id("top_down/2026-02-21T08:00:00Z", true)
            .unwrap();
        assert_eq!(by_id["as_of"], "2026-02-21T08:00:00Z");

        let latest = store.load_latest_snapshot(true).unwrap();
        assert_eq!(latest["as_of"], "2026-02-22T22:00:00Z");
        assert_eq!(store.list_snapshots().unwrap().len(), 2);
    }

    #[test]
    fn test_latest_on_empty_store_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = TopDownLeversStore::new(dir.path());
        assert!(matches!(
            store.load_latest_snapshot(true).unwrap_err(),
            Error::EntityNotFound(_)
        ));
        assert!(!store.snapshot_exists("top_down/2026-02-22T22:00:00Z"));
    }
}
