//! Company container store.
//!
//! Latest-only persistence under `companies/<TICKER>.json`; change history
//! lives in the write-event log. Upserts rebuild the core blocks from the
//! caller's params, preserve `audit.created_at` / `audit.created_by` from the
//! stored record, then deep-merge `company_payload_patch`. Note that
//! `intelligence_state` is rebuilt wholesale on every upsert; callers that
//! want to keep existing refs must carry them through the patch.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::builders::EnvelopeParams;
use crate::constants::{DEFAULT_ACTOR, PAYLOAD_VERSION};
use crate::error::{Error, Result};
use crate::ids::make_company_id;
use crate::merge::deep_merge;
use crate::schema_validate::validate_current;
use crate::store::{persist_write_event, read_entity_json, read_json, safe_segment, write_json_atomic};
use crate::timefmt;

/// Sector slug for `sector_name` aliases: lowercase, `&` spelled out, all
/// separators folded to `_`.
fn slug_sector_name(value: &str) -> String {
    let mut s = value.trim().to_lowercase().replace('&', " and ");
    for sep in ['/', '\\', ' ', '-'] {
        s = s.replace(sep, "_");
    }
    while s.contains("__") {
        s = s.replace("__", "_");
    }
    s.trim_matches('_').to_string()
}

/// Resolve `sector_ref` from either an explicit ref or a display name.
/// Canonical storage always carries `sector_ref`.
pub fn normalize_sector_ref(sector_ref: Option<&str>, sector_name: Option<&str>) -> Result<String> {
    if let Some(r) = sector_ref.map(str::trim).filter(|r| !r.is_empty()) {
        return Ok(r.to_string());
    }
    if let Some(name) = sector_name.filter(|n| !n.trim().is_empty()) {
        return Ok(format!("sector/{}", slug_sector_name(name)));
    }
    Err(Error::InvalidId(
        "sector_ref or sector_name is required".to_string(),
    ))
}

#[derive(Debug, Clone)]
pub struct CompanyParams {
    pub ticker: String,
    pub name: String,
    pub exchange: String,
    pub currency: String,
    pub sector_ref: Option<String>,
    pub sector_name: Option<String>,
    pub status: String,
    pub country: Option<String>,
    pub industry: Option<String>,
    pub acs_band: String,
    pub sector_confidence_tier: String,
    pub latest_assessment_ref: String,
    pub active_thesis_refs: Vec<String>,
    pub quarter_event_refs: Vec<String>,
    pub catalyst_event_refs: Vec<String>,
    pub pattern_refs: Vec<String>,
    pub business_profile: Option<Value>,
    pub commodity_sensitivity_notes: Option<String>,
    pub model_risk_notes: Option<String>,
    pub generated_by: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub company_payload_patch: Option<Value>,
    pub create_write_event: bool,
    pub validate: bool,
}

impl CompanyParams {
    pub fn new(ticker: &str, name: &str, exchange: &str, currency: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            name: name.to_string(),
            exchange: exchange.to_string(),
            currency: currency.to_string(),
            sector_ref: None,
            sector_name: None,
            status: "watchlist".into(),
            country: None,
            industry: None,
            acs_band: "unknown".into(),
            sector_confidence_tier: "tier_3".into(),
            latest_assessment_ref: String::new(),
            active_thesis_refs: Vec::new(),
            quarter_event_refs: Vec::new(),
            catalyst_event_refs: Vec::new(),
            pattern_refs: Vec::new(),
            business_profile: None,
            commodity_sensitivity_notes: None,
            model_risk_notes: None,
            generated_by: DEFAULT_ACTOR.into(),
            created_at: None,
            updated_at: None,
            company_payload_patch: None,
            create_write_event: true,
            validate: true,
        }
    }
}

pub fn build_company_payload(params: &CompanyParams, validate: bool) -> Result<Value> {
    let created_at = match &params.created_at {
        Some(v) => timefmt::iso_z(v)?,
        None => timefmt::utc_now_iso(),
    };
    let updated_at = match &params.updated_at {
        Some(v) => timefmt::iso_z(v)?,
        None => created_at.clone(),
    };
    let sector_ref = normalize_sector_ref(
        params.sector_ref.as_deref(),
        params.sector_name.as_deref(),
    )?;

    let mut payload = json!({
        "company_id": make_company_id(&params.ticker)?,
        "ticker": params.ticker.trim(),
        "name": params.name,
        "exchange": params.exchange,
        "currency": params.currency.to_uppercase(),
        "sector_ref": sector_ref,
        "status": params.status,
        "version": PAYLOAD_VERSION,
        "predictability_profile": {
            "acs_band": params.acs_band,
            "sector_confidence_tier": params.sector_confidence_tier,
        },
        "intelligence_state": {
            "latest_assessment_ref": params.latest_assessment_ref,
            "active_thesis_refs": params.active_thesis_refs,
            "quarter_event_refs": params.quarter_event_refs,
            "catalyst_event_refs": params.catalyst_event_refs,
            "pattern_refs": params.pattern_refs,
        },
        "audit": {
            "created_at": created_at,
            "updated_at": updated_at,
            "created_by": params.generated_by,
            "updated_by": params.generated_by,
        },
    });

    if let Some(country) = params.country.as_deref().filter(|v| !v.is_empty()) {
        payload["country"] = json!(country);
    }
    if let Some(industry) = params.industry.as_deref().filter(|v| !v.is_empty()) {
        payload["industry"] = json!(industry);
    }
    if let Some(profile) = &params.business_profile {
        payload["business_profile"] = profile.clone();
    }
    if let Some(notes) = params
        .commodity_sensitivity_notes
        .as_deref()
        .filter(|v| !v.is_empty())
    {
        payload["predictability_profile"]["commodity_sensitivity_notes"] = json!(notes);
    }
    if let Some(notes) = params.model_risk_notes.as_deref().filter(|v| !v.is_empty()) {
        payload["predictability_profile"]["model_risk_notes"] = json!(notes);
    }

    if validate {
        validate_current("company", &payload)?;
    }
    Ok(payload)
}

pub struct CompanyStore {
    companies_dir: PathBuf,
    write_events_dir: PathBuf,
}

impl CompanyStore {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            companies_dir: base_dir.join("companies"),
            write_events_dir: base_dir.join("write_events"),
        }
    }

    pub fn storage_path(&self, ticker: &str) -> PathBuf {
        self.companies_dir
            .join(format!("{}.json", safe_segment(ticker)))
    }

    /// Create or refresh the company container.
    ///
    /// On update, core blocks come from the fresh build while
    /// `audit.created_at` / `audit.created_by` and any keys the build does not
    /// produce survive from the stored record. The patch deep-merges last,
    /// before the single validation pass.
    pub fn upsert_company(&self, params: &CompanyParams) -> Result<Value> {
        let path = self.storage_path(&params.ticker);
        let existing = if path.exists() {
            Some(read_json(&path)?)
        } else {
            None
        };

        let mut build_params = params.clone();
        build_params.updated_at = Some(timefmt::utc_now_iso());
        if let Some(existing) = &existing {
            if let Some(created_at) = existing["audit"]["created_at"].as_str() {
                build_params.created_at = Some(created_at.to_string());
            }
        }
        let fresh = build_company_payload(&build_params, false)?;

        let mut payload = match &existing {
            Some(existing) => merge_over_existing(existing, &fresh),
            None => fresh,
        };

        if let Some(patch) = &params.company_payload_patch {
            payload = deep_merge(&payload, patch);
        }

        if params.validate {
            validate_current("company", &payload)?;
        }

        write_json_atomic(&path, &payload)?;

        if params.create_write_event {
            let company_id = payload["company_id"].as_str().unwrap_or_default().to_string();
            let updated_at = payload["audit"]["updated_at"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let envelope = EnvelopeParams {
                event_id: format!("write_event/{company_id}/interpretation/{updated_at}"),
                stage: "interpretation".into(),
                timestamp: updated_at,
                entity_id: company_id.clone(),
                entity_type: "company".into(),
                operation: if existing.is_some() { "update" } else { "upsert" }.into(),
                payload_schema_id: "company".into(),
                payload_data: payload.clone(),
                source_kind: "system".into(),
                source_refs: vec![company_id.clone()],
                source_hashes: Vec::new(),
                generated_by: params.generated_by.clone(),
                correlation_id: format!("corr_{}", safe_segment(&company_id)),
            };
            persist_write_event(&self.write_events_dir, envelope, params.validate)?;
        }

        Ok(payload)
    }

    pub fn load_company(&self, ticker: &str, validate: bool) -> Result<Value> {
        let company_id = make_company_id(ticker)?;
        let payload = read_entity_json(&self.storage_path(ticker), &company_id)?;
        if validate {
            validate_current("company", &payload)?;
        }
        Ok(payload)
    }

    pub fn company_exists(&self, ticker: &str) -> bool {
        self.storage_path(ticker).exists()
    }
}

/// Core keys replace, audit creation fields survive, unknown stored keys pass
/// through untouched.
fn merge_over_existing(existing: &Value, fresh: &Value) -> Value {
    let mut merged = existing.clone();
    for key in [
        "company_id",
        "ticker",
        "name",
        "exchange",
        "currency",
        "sector_ref",
        "status",
        "version",
        "predictability_profile",
        "intelligence_state",
    ] {
        merged[key] = fresh[key].clone();
    }

    let mut audit = existing["audit"].as_object().cloned().unwrap_or_default();
    if let Some(fresh_audit) = fresh["audit"].as_object() {
        for (k, v) in fresh_audit {
            audit.insert(k.clone(), v.clone());
        }
    }
    for key in ["created_at", "created_by"] {
        if let Some(v) = existing["audit"].get(key) {
            audit.insert(key.to_string(), v.clone());
        }
    }
    merged["audit"] = Value::Object(audit);

    for key in ["country", "industry", "business_profile"] {
        if let Some(v) = fresh.get(key) {
            merged[key] = v.clone();
        }
    }
    merged
}
