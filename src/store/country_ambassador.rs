//! Country ambassador store.
//!
//! One policy stance record per country, keyed by ISO alpha-2 code:
//! ```text
//! country_ambassadors/GB.json
//! country_ambassadors/JP.json
//! ```

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::constants::PAYLOAD_VERSION;
use crate::error::Result;
use crate::ids::normalize_country_code;
use crate::logging::log_store_write;
use crate::merge::deep_merge;
use crate::schema_validate::validate_current;
use crate::store::{list_json_stems, read_entity_json, write_json_atomic};
use crate::timefmt;

#[derive(Debug, Clone)]
pub struct CountryAmbassadorParams {
    pub country_code: String,
    pub country_name: String,
    pub as_of_date: String,
    pub generated_by: String,
    pub macro_stance_patch: Option<Value>,
    pub market_access_patch: Option<Value>,
    pub policy_signals_patch: Option<Value>,
    pub risk_flags: Vec<String>,
    pub linked_refs_patch: Option<Value>,
    pub payload_patch: Option<Value>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub validate: bool,
}

impl CountryAmbassadorParams {
    pub fn new(country_code: &str, country_name: &str, as_of_date: &str) -> Self {
        Self {
            country_code: country_code.to_string(),
            country_name: country_name.to_string(),
            as_of_date: as_of_date.to_string(),
            generated_by: "aion_equities.country_ambassador_store".into(),
            macro_stance_patch: None,
            market_access_patch: None,
            policy_signals_patch: None,
            risk_flags: Vec::new(),
            linked_refs_patch: None,
            payload_patch: None,
            created_at: None,
            updated_at: None,
            validate: true,
        }
    }
}

pub fn build_country_ambassador_payload(
    params: &CountryAmbassadorParams,
    validate: bool,
) -> Result<Value> {
    let code = normalize_country_code(&params.country_code)?;
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
        "country_ambassador_id": format!("country/{code}"),
        "country_code": code,
        "country_name": params.country_name,
        "as_of_date": as_of_date,
        "version": PAYLOAD_VERSION,
        "macro_stance": {
            "rates_trajectory": "unknown",
            "fiscal_stance": "unknown",
            "currency_stance": "unknown",
            "notes": "",
        },
        "market_access": {
            "capital_openness": "unknown",
            "fx_convertibility": "unknown",
            "notes": "",
        },
        "policy_signals": {
            "central_bank_bias": "unknown",
            "political_stability": "unknown",
            "notes": "",
        },
        "risk_flags": risk_flags,
        "linked_refs": {
            "macro_regime_refs": [],
            "relationship_refs": [],
            "company_refs": [],
        },
        "audit": {
            "created_at": created_at,
            "updated_at": updated_at,
            "created_by": params.generated_by,
        },
    });

    if let Some(patch) = &params.macro_stance_patch {
        payload["macro_stance"] = deep_merge(&payload["macro_stance"], patch);
    }
    if let Some(patch) = &params.market_access_patch {
        payload["market_access"] = deep_merge(&payload["market_access"], patch);
    }
    if let Some(patch) = &params.policy_signals_patch {
        payload["policy_signals"] = deep_merge(&payload["policy_signals"], patch);
    }
    if let Some(patch) = &params.linked_refs_patch {
        payload["linked_refs"] = deep_merge(&payload["linked_refs"], patch);
    }
    if let Some(patch) = &params.payload_patch {
        payload = deep_merge(&payload, patch);
    }

    if validate {
        validate_current("country_ambassador", &payload)?;
    }
    Ok(payload)
}

pub struct CountryAmbassadorStore {
    ambassadors_dir: PathBuf,
}

impl CountryAmbassadorStore {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            ambassadors_dir: base_dir.join("country_ambassadors"),
        }
    }

    pub fn storage_path(&self, country_code: &str) -> Result<PathBuf> {
        let code = normalize_country_code(country_code)?;
        Ok(self.ambassadors_dir.join(format!("{code}.json")))
    }

    pub fn save_country_ambassador(&self, params: &CountryAmbassadorParams) -> Result<Value> {
        let payload = build_country_ambassador_payload(params, params.validate)?;
        let ambassador_id = payload["country_ambassador_id"].as_str().unwrap_or_default();
        let path = self.storage_path(&params.country_code)?;
        write_json_atomic(&path, &payload)?;
        log_store_write("country_ambassador", ambassador_id, &path);
        Ok(payload)
    }

    pub fn load_country_ambassador(&self, country_code: &str, validate: bool) -> Result<Value> {
        let code = normalize_country_code(country_code)?;
        let path = self.ambassadors_dir.join(format!("{code}.json"));
        let payload = read_entity_json(&path, &format!("country/{code}"))?;
        if validate {
            validate_current("country_ambassador", &payload)?;
        }
        Ok(payload)
    }

    pub fn country_ambassador_exists(&self, country_code: &str) -> bool {
        self.storage_path(country_code)
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    pub fn list_country_ambassadors(&self) -> Result<Vec<String>> {
        list_json_stems(&self.ambassadors_dir)
    }
}
