//! Sector template store.
//!
//! One template per sector, carrying assessment defaults and macro
//! sensitivity hints for companies filed under that sector:
//! ```text
//! sector_templates/sector_energy.json
//! sector_templates/sector_industrial_equipment_rental.json
//! ```

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::constants::PAYLOAD_VERSION;
use crate::error::Result;
use crate::logging::log_store_write;
use crate::merge::deep_merge;
use crate::schema_validate::validate_current;
use crate::store::company::normalize_sector_ref;
use crate::store::{list_json_stems, read_entity_json, safe_segment, write_json_atomic};
use crate::timefmt;

#[derive(Debug, Clone)]
pub struct SectorTemplateParams {
    pub sector_name: String,
    pub as_of_date: String,
    /// Explicit `sector/...` ref; derived from `sector_name` when unset.
    pub sector_ref: Option<String>,
    pub generated_by: String,
    pub confidence_tier: String,
    pub acs_band: String,
    pub sector_confidence_tier: String,
    pub typical_catalysts: Vec<String>,
    pub structural_risks: Vec<String>,
    pub macro_sensitivity_patch: Option<Value>,
    pub notes: Option<String>,
    pub linked_refs_patch: Option<Value>,
    pub payload_patch: Option<Value>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub validate: bool,
}

impl SectorTemplateParams {
    pub fn new(sector_name: &str, as_of_date: &str) -> Self {
        Self {
            sector_name: sector_name.to_string(),
            as_of_date: as_of_date.to_string(),
            sector_ref: None,
            generated_by: "aion_equities.sector_template_store".into(),
            confidence_tier: "tier_2".into(),
            acs_band: "unknown".into(),
            sector_confidence_tier: "tier_2".into(),
            typical_catalysts: Vec::new(),
            structural_risks: Vec::new(),
            macro_sensitivity_patch: None,
            notes: None,
            linked_refs_patch: None,
            payload_patch: None,
            created_at: None,
            updated_at: None,
            validate: true,
        }
    }
}

pub fn build_sector_template_payload(
    params: &SectorTemplateParams,
    validate: bool,
) -> Result<Value> {
    let sector_ref = normalize_sector_ref(
        params.sector_ref.as_deref(),
        Some(params.sector_name.as_str()),
    )?;
    let as_of_date = timefmt::date_str(&params.as_of_date)?;
    let created_at = timefmt::iso_z_or_now(params.created_at.as_deref())?;
    let updated_at = match &params.updated_at {
        Some(v) => timefmt::iso_z(v)?,
        None => created_at.clone(),
    };

    let mut payload = json!({
        "sector_template_id": sector_ref,
        "sector_ref": sector_ref,
        "sector_name": params.sector_name,
        "as_of_date": as_of_date,
        "version": PAYLOAD_VERSION,
        "confidence_tier": params.confidence_tier,
        "assessment_defaults": {
            "acs_band": params.acs_band,
            "sector_confidence_tier": params.sector_confidence_tier,
        },
        "typical_catalysts": params.typical_catalysts,
        "structural_risks": params.structural_risks,
        "macro_sensitivity": {
            "rates": "unknown",
            "fx": "unknown",
            "credit": "unknown",
            "commodities": "unknown",
            "notes": "",
        },
        "audit": {
            "created_at": created_at,
            "updated_at": updated_at,
            "created_by": params.generated_by,
        },
    });

    if let Some(notes) = &params.notes {
        payload["notes"] = json!(notes);
    }
    if let Some(patch) = &params.macro_sensitivity_patch {
        payload["macro_sensitivity"] = deep_merge(&payload["macro_sensitivity"], patch);
    }
    if let Some(patch) = &params.linked_refs_patch {
        payload["linked_refs"] = patch.clone();
    }
    if let Some(patch) = &params.payload_patch {
        payload = deep_merge(&payload, patch);
    }

    if validate {
        validate_current("sector_template", &payload)?;
    }
    Ok(payload)
}

pub struct SectorTemplateStore {
    templates_dir: PathBuf,
}

impl SectorTemplateStore {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            templates_dir: base_dir.join("sector_templates"),
        }
    }

    pub fn storage_path(&self, sector_ref: &str) -> PathBuf {
        self.templates_dir
            .join(format!("{}.json", safe_segment(sector_ref)))
    }

    pub fn save_sector_template(&self, params: &SectorTemplateParams) -> Result<Value> {
        let payload = build_sector_template_payload(params, params.validate)?;
        let sector_ref = payload["sector_ref"].as_str().unwrap_or_default().to_string();
        let path = self.storage_path(&sector_ref);
        write_json_atomic(&path, &payload)?;
        log_store_write("sector_template", &sector_ref, &path);
        Ok(payload)
    }

    pub fn load_sector_template(&self, sector_ref: &str, validate: bool) -> Result<Value> {
        let path = self.storage_path(sector_ref);
        let payload = read_entity_json(&path, sector_ref)?;
        if validate {
            validate_current("sector_template", &payload)?;
        }
        Ok(payload)
    }

    pub fn sector_template_exists(&self, sector_ref: &str) -> bool {
        self.storage_path(sector_ref).exists()
    }

    pub fn list_sector_templates(&self) -> Result<Vec<String>> {
        list_json_stems(&self.templates_dir)
    }
}
