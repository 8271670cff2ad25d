//! Company structural profile store.
//!
//! One profile per company per date:
//! ```text
//! company_structural_profiles/company_AHT.L/2026-02-22.json
//! ```
//!
//! Older feeds wrote cost ratios under `*_pct` names. Those are folded onto
//! the canonical names on ingress, and again after the payload patch, so
//! only canonical names ever reach the validator or disk.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::constants::PAYLOAD_VERSION;
use crate::error::Result;
use crate::logging::log_store_write;
use crate::merge::deep_merge;
use crate::schema_validate::validate_current;
use crate::store::{list_json_stems, read_entity_json, safe_segment, write_json_atomic};
use crate::timefmt;

const LEGACY_RATIO_KEYS: &[(&str, &str)] = &[
    ("labour_cost_ratio_pct", "labour_cost_ratio"),
    ("energy_cost_ratio_pct", "energy_cost_ratio"),
    ("debt_service_ratio_pct", "debt_service_ratio"),
    ("fixed_cost_ratio_pct", "fixed_cost_ratio"),
    ("variable_cost_ratio_pct", "variable_cost_ratio"),
];

/// Rename `*_pct` cost ratio keys onto canonical names (canonical wins when
/// both are present) and drop the legacy keys.
fn normalize_cost_structure(cost_structure: &Value) -> Value {
    let Some(map) = cost_structure.as_object() else {
        return cost_structure.clone();
    };
    let mut out = map.clone();
    for (legacy, canonical) in LEGACY_RATIO_KEYS {
        if let Some(v) = out.remove(*legacy) {
            if !out.contains_key(*canonical) {
                out.insert(canonical.to_string(), v);
            }
        }
    }
    Value::Object(out)
}

#[derive(Debug, Clone)]
pub struct StructuralProfileParams {
    pub company_ref: String,
    pub as_of_date: String,
    pub generated_by: String,
    pub cost_structure_patch: Option<Value>,
    pub geographic_exposure_patch: Option<Value>,
    pub capital_allocation_patch: Option<Value>,
    pub management_signals_patch: Option<Value>,
    pub competitive_position_patch: Option<Value>,
    pub linked_refs_patch: Option<Value>,
    pub payload_patch: Option<Value>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub validate: bool,
}

impl StructuralProfileParams {
    pub fn new(company_ref: &str, as_of_date: &str) -> Self {
        Self {
            company_ref: company_ref.to_string(),
            as_of_date: as_of_date.to_string(),
            generated_by: "aion_equities.company_structural_profile_store".into(),
            cost_structure_patch: None,
            geographic_exposure_patch: None,
            capital_allocation_patch: None,
            management_signals_patch: None,
            competitive_position_patch: None,
            linked_refs_patch: None,
            payload_patch: None,
            created_at: None,
            updated_at: None,
            validate: true,
        }
    }
}

pub fn build_structural_profile_payload(
    params: &StructuralProfileParams,
    validate: bool,
) -> Result<Value> {
    let as_of_date = timefmt::date_str(&params.as_of_date)?;
    let created_at = timefmt::iso_z_or_now(params.created_at.as_deref())?;
    let updated_at = match &params.updated_at {
        Some(v) => timefmt::iso_z(v)?,
        None => created_at.clone(),
    };

    let mut payload = json!({
        "company_profile_id": format!("{}/profile/{as_of_date}", params.company_ref),
        "company_ref": params.company_ref,
        "as_of_date": as_of_date,
        "version": PAYLOAD_VERSION,
        "cost_structure": {
            "labour_cost_ratio": 0.0,
            "energy_cost_ratio": 0.0,
            "debt_service_ratio": 0.0,
            "fixed_cost_ratio": 0.0,
            "variable_cost_ratio": 0.0,
            "commodity_input_exposure": [],
            "cost_notes": "",
        },
        "geographic_exposure": {
            "revenue_regions": [],
            "cost_regions": [],
            "fx_sensitivity_notes": "",
        },
        "capital_allocation": {
            "allocation_quality": "unknown",
            "acquisition_intensity": "none",
            "buyback_policy": "unknown",
            "dividend_policy": "unknown",
            "recent_acquisitions": [],
            "capital_allocation_notes": "",
        },
        "management_signals": {
            "guidance_credibility": "unknown",
            "key_hire_signal": "unknown",
            "departure_risk": "unknown",
            "notable_hires": [],
            "notable_departures": [],
            "management_notes": "",
        },
        "competitive_position": {
            "market_share_trend": "unknown",
            "pricing_power": "unknown",
            "competitive_pressure": "unknown",
            "main_competitors": [],
            "market_share_notes": "",
        },
        "audit": {
            "created_at": created_at,
            "updated_at": updated_at,
            "created_by": params.generated_by,
        },
    });

    if let Some(patch) = &params.cost_structure_patch {
        payload["cost_structure"] =
            deep_merge(&payload["cost_structure"], &normalize_cost_structure(patch));
    }
    if let Some(patch) = &params.geographic_exposure_patch {
        payload["geographic_exposure"] = deep_merge(&payload["geographic_exposure"], patch);
    }
    if let Some(patch) = &params.capital_allocation_patch {
        payload["capital_allocation"] = deep_merge(&payload["capital_allocation"], patch);
    }
    if let Some(patch) = &params.management_signals_patch {
        payload["management_signals"] = deep_merge(&payload["management_signals"], patch);
    }
    if let Some(patch) = &params.competitive_position_patch {
        payload["competitive_position"] = deep_merge(&payload["competitive_position"], patch);
    }
    if let Some(refs) = &params.linked_refs_patch {
        payload["linked_refs"] = refs.clone();
    }
    if let Some(patch) = &params.payload_patch {
        payload = deep_merge(&payload, patch);
        // the patch may have reintroduced legacy ratio names
        payload["cost_structure"] = normalize_cost_structure(&payload["cost_structure"]);
    }

    if validate {
        validate_current("company_structural_profile", &payload)?;
    }
    Ok(payload)
}

pub struct StructuralProfileStore {
    profiles_dir: PathBuf,
}

impl StructuralProfileStore {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            profiles_dir: base_dir.join("company_structural_profiles"),
        }
    }

    pub fn storage_path(&self, company_ref: &str, as_of_date: &str) -> Result<PathBuf> {
        let ds = timefmt::date_str(as_of_date)?;
        Ok(self
            .profiles_dir
            .join(safe_segment(company_ref))
            .join(format!("{}.json", safe_segment(&ds))))
    }

    pub fn save_structural_profile(&self, params: &StructuralProfileParams) -> Result<Value> {
        let payload = build_structural_profile_payload(params, params.validate)?;
        let company_ref = payload["company_ref"].as_str().unwrap_or_default();
        let as_of_date = payload["as_of_date"].as_str().unwrap_or_default();
        let profile_id = payload["company_profile_id"].as_str().unwrap_or_default();
        let path = self.storage_path(company_ref, as_of_date)?;
        write_json_atomic(&path, &payload)?;
        log_store_write("structural_profile", profile_id, &path);
        Ok(payload)
    }

    pub fn load_structural_profile(
        &self,
        company_ref: &str,
        as_of_date: &str,
        validate: bool,
    ) -> Result<Value> {
        let path = self.storage_path(company_ref, as_of_date)?;
        let entity_id = format!("{company_ref}/profile/{}", timefmt::date_str(as_of_date)?);
        let payload = read_entity_json(&path, &entity_id)?;
        if validate {
            validate_current("company_structural_profile", &payload)?;
        }
        Ok(payload)
    }

    pub fn structural_profile_exists(&self, company_ref: &str, as_of_date: &str) -> bool {
        self.storage_path(company_ref, as_of_date)
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    pub fn list_profiles(&self, company_ref: &str) -> Result<Vec<String>> {
        list_json_stems(&self.profiles_dir.join(safe_segment(company_ref)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_defaults_and_profile_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = StructuralProfileStore::new(dir.path());
        let params = StructuralProfileParams::new("company/AHT.L", "2026-02-22");
        let payload = store.save_structural_profile(&params).unwrap();

        assert_eq!(payload["company_profile_id"], "company/AHT.L/profile/2026-02-22");
        assert_eq!(payload["cost_structure"]["labour_cost_ratio"], 0.0);
        assert_eq!(payload["capital_allocation"]["acquisition_intensity"], "none");
        assert!(store.structural_profile_exists("company/AHT.L", "2026-02-22"));
        assert_eq!(store.list_profiles("company/AHT.L").unwrap(), vec!["2026-02-22"]);
    }

    #[test]
    fn test_legacy_pct_ratios_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let store = StructuralProfileStore::new(dir.path());
        let mut params = StructuralProfileParams::new("company/AHT.L", "2026-02-22");
        params.cost_structure_patch = Some(json!({
            "labour_cost_ratio_pct": 28.0,
            "energy_cost_ratio": 6.0,
        }));
        let payload = store.save_structural_profile(&params).unwrap();

        let cs = &payload["cost_structure"];
        assert_eq!(cs["labour_cost_ratio"], 28.0);
        assert_eq!(cs["energy_cost_ratio"], 6.0);
        assert!(cs.get("labour_cost_ratio_pct").is_none());
    }

    #[test]
    fn test_canonical_name_wins_over_legacy() {
        let mut params = StructuralProfileParams::new("company/AHT.L", "2026-02-22");
        params.cost_structure_patch = Some(json!({
            "debt_service_ratio_pct": 99.0,
            "debt_service_ratio": 12.0,
        }));
        let payload = build_structural_profile_payload(&params, true).unwrap();
        assert_eq!(payload["cost_structure"]["debt_service_ratio"], 12.0);
        assert!(payload["cost_structure"].get("debt_service_ratio_pct").is_none());
    }

    #[test]
    fn test_payload_patch_renormalized() {
        let mut params = StructuralProfileParams::new("company/AHT.L", "2026-02-22");
        params.payload_patch = Some(json!({
            "cost_structure": {"fixed_cost_ratio_pct": 60.0},
            "linked_refs": {"quarter_event_refs": ["company/AHT.L/quarter/2026-Q1"]},
        }));
        let payload = build_structural_profile_payload(&params, true).unwrap();
        assert_eq!(payload["cost_structure"]["fixed_cost_ratio"], 60.0);
        assert!(payload["cost_structure"].get("fixed_cost_ratio_pct").is_none());
        assert_eq!(
            payload["linked_refs"]["quarter_event_refs"][0],
            "company/AHT.L/quarter/2026-Q1"
        );
    }

    #[test]
    fn test_block_patches_merge() {
        let dir = tempfile::tempdir().unwrap();
        let store = StructuralProfileStore::new(dir.path());
        let mut params = StructuralProfileParams::new("company/AHT.L", "2026-02-22T10:00:00Z");
        params.capital_allocation_patch = Some(json!({
            "allocation_quality": "disciplined",
            "acquisition_intensity": "high",
        }));
        params.competitive_position_patch = Some(json!({"pricing_power": "strong"}));
        let payload = store.save_structural_profile(&params).unwrap();

        assert_eq!(payload["as_of_date"], "2026-02-22");
        assert_eq!(payload["capital_allocation"]["allocation_quality"], "disciplined");
        assert_eq!(payload["capital_allocation"]["buyback_policy"], "unknown");
        assert_eq!(payload["competitive_position"]["pricing_power"], "strong");

        let loaded = store
            .load_structural_profile("company/AHT.L", "2026-02-22", true)
            .unwrap();
        assert_eq!(loaded, payload);
    }
}
