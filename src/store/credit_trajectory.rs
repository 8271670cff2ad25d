//! Credit trajectory store.
//!
//! Official and shadow rating views per entity per date:
//! ```text
//! credit_trajectory/company_AHT.L/2026-02-22.json
//! ```

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::constants::PAYLOAD_VERSION;
use crate::error::Result;
use crate::logging::log_store_write;
use crate::merge::deep_merge;
use crate::schema_validate::validate_current;
use crate::store::{list_json_stems, read_entity_json, safe_segment, write_json_atomic};
use crate::timefmt;

#[derive(Debug, Clone)]
pub struct CreditTrajectoryParams {
    pub entity_ref: String,
    pub entity_type: String,
    pub as_of_date: String,
    pub generated_by: String,
    pub official_rating_patch: Option<Value>,
    pub shadow_rating_patch: Option<Value>,
    pub trajectory_patch: Option<Value>,
    pub signals_patch: Option<Value>,
    pub linked_refs_patch: Option<Value>,
    pub payload_patch: Option<Value>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub validate: bool,
}

impl CreditTrajectoryParams {
    pub fn new(entity_ref: &str, entity_type: &str, as_of_date: &str) -> Self {
        Self {
            entity_ref: entity_ref.to_string(),
            entity_type: entity_type.to_string(),
            as_of_date: as_of_date.to_string(),
            generated_by: "aion_equities.credit_trajectory_store".into(),
            official_rating_patch: None,
            shadow_rating_patch: None,
            trajectory_patch: None,
            signals_patch: None,
            linked_refs_patch: None,
            payload_patch: None,
            created_at: None,
            updated_at: None,
            validate: true,
        }
    }
}

pub fn build_credit_trajectory_payload(
    params: &CreditTrajectoryParams,
    validate: bool,
) -> Result<Value> {
    let as_of_date = timefmt::date_str(&params.as_of_date)?;
    let created_at = timefmt::iso_z_or_now(params.created_at.as_deref())?;
    let updated_at = match &params.updated_at {
        Some(v) => timefmt::iso_z(v)?,
        None => created_at.clone(),
    };

    let mut payload = json!({
        "credit_trajectory_id": format!("{}/credit/{as_of_date}", params.entity_ref),
        "entity_ref": params.entity_ref,
        "entity_type": params.entity_type,
        "as_of_date": as_of_date,
        "version": PAYLOAD_VERSION,
        "official_rating": {
            "composite": "NR",
            "outlook": "unknown",
        },
        "shadow_rating": {
            "composite": "NR",
            "confidence": 0.0,
            "direction": "unknown",
            "notes": "",
        },
        "trajectory": {
            "state": "unknown",
            "downgrade_risk": 0.0,
            "upgrade_potential": 0.0,
            "watch_window_days": 0,
            "notes": "",
        },
        "signals": {
            "leverage_signal": "unknown",
            "coverage_signal": "unknown",
            "liquidity_signal": "unknown",
            "spread_signal": "unknown",
            "refinancing_signal": "unknown",
        },
        "audit": {
            "created_at": created_at,
            "updated_at": updated_at,
            "created_by": params.generated_by,
        },
    });

    if let Some(patch) = &params.official_rating_patch {
        payload["official_rating"] = deep_merge(&payload["official_rating"], patch);
    }
    if let Some(patch) = &params.shadow_rating_patch {
        payload["shadow_rating"] = deep_merge(&payload["shadow_rating"], patch);
    }
    if let Some(patch) = &params.trajectory_patch {
        payload["trajectory"] = deep_merge(&payload["trajectory"], patch);
    }
    if let Some(patch) = &params.signals_patch {
        payload["signals"] = deep_merge(&payload["signals"], patch);
    }
    if let Some(refs) = &params.linked_refs_patch {
        payload["linked_refs"] = refs.clone();
    }
    if let Some(patch) = &params.payload_patch {
        payload = deep_merge(&payload, patch);
    }

    if validate {
        validate_current("credit_trajectory", &payload)?;
    }
    Ok(payload)
}

pub struct CreditTrajectoryStore {
    trajectories_dir: PathBuf,
}

impl CreditTrajectoryStore {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            trajectories_dir: base_dir.join("credit_trajectory"),
        }
    }

    pub fn storage_path(&self, entity_ref: &str, as_of_date: &str) -> Result<PathBuf> {
        let ds = timefmt::date_str(as_of_date)?;
        Ok(self
            .trajectories_dir
            .join(safe_segment(entity_ref))
            .join(format!("{}.json", safe_segment(&ds))))
    }

    pub fn save_credit_trajectory(&self, params: &CreditTrajectoryParams) -> Result<Value> {
        let payload = build_credit_trajectory_payload(params, params.validate)?;
        let entity_ref = payload["entity_ref"].as_str().unwrap_or_default();
        let as_of_date = payload["as_of_date"].as_str().unwrap_or_default();
        let trajectory_id = payload["credit_trajectory_id"].as_str().unwrap_or_default();
        let path = self.storage_path(entity_ref, as_of_date)?;
        write_json_atomic(&path, &payload)?;
        log_store_write("credit_trajectory", trajectory_id, &path);
        Ok(payload)
    }

    pub fn load_credit_trajectory(
        &self,
        entity_ref: &str,
        as_of_date: &str,
        validate: bool,
    ) -> Result<Value> {
        let path = self.storage_path(entity_ref, as_of_date)?;
        let entity_id = format!("{entity_ref}/credit/{}", timefmt::date_str(as_of_date)?);
        let payload = read_entity_json(&path, &entity_id)?;
        if validate {
            validate_current("credit_trajectory", &payload)?;
        }
        Ok(payload)
    }

    pub fn credit_trajectory_exists(&self, entity_ref: &str, as_of_date: &str) -> bool {
        self.storage_path(entity_ref, as_of_date)
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    pub fn list_credit_trajectories(&self, entity_ref: &str) -> Result<Vec<String>> {
        list_json_stems(&self.trajectories_dir.join(safe_segment(entity_ref)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_defaults_and_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = CreditTrajectoryStore::new(dir.path());
        let params = CreditTrajectoryParams::new("company/AHT.L", "company", "2026-02-22");
        let payload = store.save_credit_trajectory(&params).unwrap();

        assert_eq!(payload["credit_trajectory_id"], "company/AHT.L/credit/2026-02-22");
        assert_eq!(payload["official_rating"]["composite"], "NR");
        assert_eq!(payload["trajectory"]["watch_window_days"], 0);
        assert_eq!(payload["signals"]["refinancing_signal"], "unknown");
        assert!(store.credit_trajectory_exists("company/AHT.L", "2026-02-22"));
    }

    #[test]
    fn test_block_patches_and_timestamp_date() {
        let dir = tempfile::tempdir().unwrap();
        let store = CreditTrajectoryStore::new(dir.path());
        let mut params = CreditTrajectoryParams::new("company/AHT.L", "company", "2026-02-22T22:00:00Z");
        params.shadow_rating_patch = Some(json!({
            "composite": "BBB-",
            "confidence": 60.0,
            "direction": "deteriorating",
        }));
        params.signals_patch = Some(json!({"spread_signal": "widening"}));
        params.linked_refs_patch = Some(json!({"assessment_refs": []}));
        let payload = store.save_credit_trajectory(&params).unwrap();

        assert_eq!(payload["as_of_date"], "2026-02-22");
        assert_eq!(payload["shadow_rating"]["composite"], "BBB-");
        assert_eq!(payload["shadow_rating"]["notes"], "");
        assert_eq!(payload["signals"]["spread_signal"], "widening");
        assert_eq!(payload["signals"]["leverage_signal"], "unknown");

        let loaded = store
            .load_credit_trajectory("company/AHT.L", "2026-02-22", true)
            .unwrap();
        assert_eq!(loaded, payload);
    }

    #[test]
    fn test_listing_per_entity() {
        let dir = tempfile::tempdir().unwrap();
        let store = CreditTrajectoryStore::new(dir.path());
        for d in ["2026-02-22", "2026-01-15"] {
            let params = CreditTrajectoryParams::new("company/AHT.L", "company", d);
            store.save_credit_trajectory(&params).unwrap();
        }
        assert_eq!(
            store.list_credit_trajectories("company/AHT.L").unwrap(),
            vec!["2026-01-15", "2026-02-22"]
        );
        assert!(store.list_credit_trajectories("company/MSFT").unwrap().is_empty());
    }
}
