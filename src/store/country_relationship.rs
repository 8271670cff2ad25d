//! Country relationship store.
//!
//! Directed pair snapshots, one file per pair:
//! ```text
//! country_relationships/country_relationship_GB-US.json
//! ```
//!
//! The pair is directed: `GB-US` and `US-GB` are distinct records.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::constants::PAYLOAD_VERSION;
use crate::error::Result;
use crate::ids::normalize_country_code;
use crate::logging::log_store_write;
use crate::merge::deep_merge;
use crate::schema_validate::validate_current;
use crate::store::{list_json_stems, read_entity_json, safe_segment, write_json_atomic};
use crate::timefmt;

fn relationship_id(lhs: &str, rhs: &str) -> Result<String> {
    let lhs = normalize_country_code(lhs)?;
    let rhs = normalize_country_code(rhs)?;
    Ok(format!("country_relationship/{lhs}-{rhs}"))
}

#[derive(Debug, Clone)]
pub struct CountryRelationshipParams {
    pub lhs_country_code: String,
    pub rhs_country_code: String,
    pub as_of_date: String,
    pub generated_by: String,
    pub relationship_score_patch: Option<Value>,
    pub relationship_drift_patch: Option<Value>,
    pub trade_policy_patch: Option<Value>,
    pub geopolitics_patch: Option<Value>,
    pub yield_differential_patch: Option<Value>,
    pub capital_flows_patch: Option<Value>,
    pub risk_flags: Vec<String>,
    pub linked_refs_patch: Option<Value>,
    pub payload_patch: Option<Value>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub validate: bool,
}

impl CountryRelationshipParams {
    pub fn new(lhs_country_code: &str, rhs_country_code: &str, as_of_date: &str) -> Self {
        Self {
            lhs_country_code: lhs_country_code.to_string(),
            rhs_country_code: rhs_country_code.to_string(),
            as_of_date: as_of_date.to_string(),
            generated_by: "aion_equities.country_relationship_store".into(),
            relationship_score_patch: None,
            relationship_drift_patch: None,
            trade_policy_patch: None,
            geopolitics_patch: None,
            yield_differential_patch: None,
            capital_flows_patch: None,
            risk_flags: Vec::new(),
            linked_refs_patch: None,
            payload_patch: None,
            created_at: None,
            updated_at: None,
            validate: true,
        }
    }
}

pub fn build_country_relationship_payload(
    params: &CountryRelationshipParams,
    validate: bool,
) -> Result<Value> {
    let lhs = normalize_country_code(&params.lhs_country_code)?;
    let rhs = normalize_country_code(&params.rhs_country_code)?;
    let as_of_date = timefmt::date_str(&params.as_of_date)?;
    let created_at = timefmt::iso_z_or_now(params.created_at.as_deref())?;
    let updated_at = match &params.updated_at {
        Some(v) => timefmt::iso_z(v)?,
        None => created_at.clone(),
    };

    let mut risk_flags = params.risk_flags.clone();
    risk_flags.sort();
    risk_flags.dedup();

    let mut payload = json!({
        "country_relationship_id": relationship_id(&lhs, &rhs)?,
        "lhs_country_ref": format!("country/{lhs}"),
        "rhs_country_ref": format!("country/{rhs}"),
        "as_of_date": as_of_date,
        "version": PAYLOAD_VERSION,
        "relationship_score": {
            "score": 50.0,
            "confidence": 50.0,
            "regime": "balanced",
            "summary": "",
        },
        "relationship_drift": {
            "direction": "stable",
            "velocity": "slow",
            "notes": "",
        },
        "trade_policy": {
            "tariff_regime": "open",
            "trade_alignment": "aligned",
            "export_dependency_regime": "medium",
            "import_dependency_regime": "medium",
            "notes": "",
        },
        "geopolitics": {
            "alignment_regime": "cooperative",
            "policy_coordination": "working",
            "sanctions_risk": "low",
            "notes": "",
        },
        "yield_differential": {
            "front_end_bps": 0.0,
            "long_end_bps": 0.0,
            "real_yield_diff_bps": 0.0,
            "carry_regime": "balanced",
            "notes": "",
        },
        "capital_flows": {
            "pair_flow_regime": "balanced",
            "funding_stress_regime": "calm",
            "notes": "",
        },
        "risk_flags": risk_flags,
        "linked_refs": {
            "lhs_ambassador_ref": format!("country/{lhs}"),
            "rhs_ambassador_ref": format!("country/{rhs}"),
            "macro_regime_refs": [],
            "company_refs": [],
        },
        "audit": {
            "created_at": created_at,
            "updated_at": updated_at,
            "created_by": params.generated_by,
        },
    });

    if let Some(patch) = &params.relationship_score_patch {
        payload["relationship_score"] = deep_merge(&payload["relationship_score"], patch);
    }
    if let Some(patch) = &params.relationship_drift_patch {
        payload["relationship_drift"] = deep_merge(&payload["relationship_drift"], patch);
    }
    if let Some(patch) = &params.trade_policy_patch {
        payload["trade_policy"] = deep_merge(&payload["trade_policy"], patch);
    }
    if let Some(patch) = &params.geopolitics_patch {
        payload["geopolitics"] = deep_merge(&payload["geopolitics"], patch);
    }
    if let Some(patch) = &params.yield_differential_patch {
        payload["yield_differential"] = deep_merge(&payload["yield_differential"], patch);
    }
    if let Some(patch) = &params.capital_flows_patch {
        payload["capital_flows"] = deep_merge(&payload["capital_flows"], patch);
    }
    if let Some(patch) = &params.linked_refs_patch {
        payload["linked_refs"] = deep_merge(&payload["linked_refs"], patch);
    }
    if let Some(patch) = &params.payload_patch {
        payload = deep_merge(&payload, patch);
    }

    if validate {
        validate_current("country_relationship", &payload)?;
    }
    Ok(payload)
}

pub struct CountryRelationshipStore {
    relationships_dir: PathBuf,
}

impl CountryRelationshipStore {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            relationships_dir: base_dir.join("country_relationships"),
        }
    }

    pub fn storage_path(&self, lhs_country_code: &str, rhs_country_code: &str) -> Result<PathBuf> {
        let rid = relationship_id(lhs_country_code, rhs_country_code)?;
        Ok(self
            .relationships_dir
            .join(format!("{}.json", safe_segment(&rid))))
    }

    pub fn save_country_relationship(&self, params: &CountryRelationshipParams) -> Result<Value> {
        let payload = build_country_relationship_payload(params, params.validate)?;
        let relationship_id = payload["country_relationship_id"].as_str().unwrap_or_default();
        let path = self.storage_path(&params.lhs_country_code, &params.rhs_country_code)?;
        write_json_atomic(&path, &payload)?;
        log_store_write("country_relationship", relationship_id, &path);
        Ok(payload)
    }

    pub fn load_country_relationship(
        &self,
        lhs_country_code: &str,
        rhs_country_code: &str,
        validate: bool,
    ) -> Result<Value> {
        let path = self.storage_path(lhs_country_code, rhs_country_code)?;
        let rid = relationship_id(lhs_country_code, rhs_country_code)?;
        let payload = read_entity_json(&path, &rid)?;
        if validate {
            validate_current("country_relationship", &payload)?;
        }
        Ok(payload)
    }

    pub fn country_relationship_exists(
        &self,
        lhs_country_code: &str,
        rhs_country_code: &str,
    ) -> bool {
        self.storage_path(lhs_country_code, rhs_country_code)
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    pub fn list_country_relationships(&self) -> Result<Vec<String>> {
        list_json_stems(&self.relationships_dir)
    }
}
