//! Catalyst event store.
//!
//! Dual-written so both lookup directions are one file read:
//! ```text
//! catalyst_events/company_AHT.L_catalyst_fy_results.json
//! catalyst_events_by_company/company_AHT.L/company_AHT.L_catalyst_fy_results.json
//! ```

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::constants::PAYLOAD_VERSION;
use crate::error::{Error, Result};
use crate::ids::{make_catalyst_event_id, make_company_id};
use crate::logging::log_store_write;
use crate::merge::deep_merge;
use crate::schema_validate::validate_current;
use crate::store::{list_json_stems, read_entity_json, read_json, safe_segment, write_json_atomic};
use crate::timefmt;

#[derive(Debug, Clone)]
pub struct CatalystEventParams {
    /// Ticker or `company_ref`, at least one must be set.
    pub ticker: Option<String>,
    pub company_ref: Option<String>,
    /// Short event token or a full `catalyst_event_id`.
    pub event_id: Option<String>,
    pub catalyst_event_id: Option<String>,
    pub catalyst_type: String,
    pub status: String,
    pub expected_date: String,
    pub timing_confidence: f64,
    pub thesis_refs: Vec<String>,
    pub importance: Option<f64>,
    pub window_start: Option<String>,
    pub window_end: Option<String>,
    pub details: Option<Value>,
    pub preconditions: Option<Vec<String>>,
    pub outcome: Option<Value>,
    pub source_refs: Option<Vec<String>>,
    pub generated_by: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub catalyst_payload_patch: Option<Value>,
    pub validate: bool,
}

impl CatalystEventParams {
    pub fn new(ticker: &str, event_id: &str, catalyst_type: &str, expected_date: &str) -> Self {
        Self {
            ticker: Some(ticker.to_string()),
            company_ref: None,
            event_id: Some(event_id.to_string()),
            catalyst_event_id: None,
            catalyst_type: catalyst_type.to_string(),
            status: "scheduled".into(),
            expected_date: expected_date.to_string(),
            timing_confidence: 50.0,
            thesis_refs: Vec::new(),
            importance: None,
            window_start: None,
            window_end: None,
            details: None,
            preconditions: None,
            outcome: None,
            source_refs: None,
            generated_by: "aion_equities.catalyst_event_store".into(),
            created_at: None,
            updated_at: None,
            catalyst_payload_patch: None,
            validate: true,
        }
    }
}

fn resolve_ids(params: &CatalystEventParams) -> Result<(String, String)> {
    let company_ref = match &params.company_ref {
        Some(r) => r.clone(),
        None => {
            let ticker = params
                .ticker
                .as_deref()
                .ok_or_else(|| Error::InvalidId("ticker or company_ref is required".into()))?;
            make_company_id(ticker)?
        }
    };

    let catalyst_event_id = match &params.catalyst_event_id {
        Some(id) => id.clone(),
        None => {
            let event_id = params
                .event_id
                .as_deref()
                .ok_or_else(|| Error::InvalidId("event_id or catalyst_event_id is required".into()))?;
            let ticker = match params.ticker.as_deref() {
                Some(t) => t.to_string(),
                // company_ref is `company/<ticker>`
                None => company_ref
                    .split_once('/')
                    .map(|(_, t)| t.to_string())
                    .ok_or_else(|| Error::InvalidId(format!("invalid company_ref: {company_ref}")))?,
            };
            make_catalyst_event_id(&ticker, event_id)?
        }
    };

    Ok((company_ref, catalyst_event_id))
}

pub fn build_catalyst_event_payload(params: &CatalystEventParams, validate: bool) -> Result<Value> {
    let (company_ref, catalyst_event_id) = resolve_ids(params)?;
    let created_at = timefmt::iso_z_or_now(params.created_at.as_deref())?;
    let updated_at = match &params.updated_at {
        Some(v) => timefmt::iso_z(v)?,
        None => created_at.clone(),
    };

    let mut payload = json!({
        "catalyst_event_id": catalyst_event_id,
        "company_ref": company_ref,
        "catalyst_type": params.catalyst_type,
        "status": params.status,
        "expected_date": timefmt::date_str(&params.expected_date)?,
        "timing_confidence": params.timing_confidence,
        "thesis_refs": params.thesis_refs,
        "version": PAYLOAD_VERSION,
        "audit": {
            "created_at": created_at,
            "updated_at": updated_at,
            "created_by": params.generated_by,
            "updated_by": params.generated_by,
        },
    });

    if let Some(importance) = params.importance {
        payload["importance"] = json!(importance);
    }
    if let Some(start) = &params.window_start {
        payload["window_start"] = json!(timefmt::date_str(start)?);
    }
    if let Some(end) = &params.window_end {
        payload["window_end"] = json!(timefmt::date_str(end)?);
    }
    if let Some(details) = &params.details {
        payload["details"] = details.clone();
    }
    if let Some(preconditions) = &params.preconditions {
        payload["preconditions"] = json!(preconditions);
    }
    if let Some(outcome) = &params.outcome {
        payload["outcome"] = outcome.clone();
    }
    if let Some(refs) = &params.source_refs {
        payload["source_refs"] = json!(refs);
    }

    if validate {
        validate_current("catalyst_event", &payload)?;
    }
    Ok(payload)
}

pub struct CatalystEventStore {
    events_dir: PathBuf,
    by_company_dir: PathBuf,
}

impl CatalystEventStore {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            events_dir: base_dir.join("catalyst_events"),
            by_company_dir: base_dir.join("catalyst_events_by_company"),
        }
    }

    fn event_path(&self, catalyst_event_id: &str) -> PathBuf {
        self.events_dir
            .join(format!("{}.json", safe_segment(catalyst_event_id)))
    }

    fn company_dir(&self, company_ref: &str) -> PathBuf {
        self.by_company_dir.join(safe_segment(company_ref))
    }

    pub fn save_catalyst_event(&self, params: &CatalystEventParams) -> Result<Value> {
        let mut payload = build_catalyst_event_payload(params, false)?;
        if let Some(patch) = &params.catalyst_payload_patch {
            payload = deep_merge(&payload, patch);
        }
        if params.validate {
            validate_current("catalyst_event", &payload)?;
        }

        let catalyst_event_id = payload["catalyst_event_id"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let company_ref = payload["company_ref"].as_str().unwrap_or_default();

        let path = self.event_path(&catalyst_event_id);
        write_json_atomic(&path, &payload)?;
        write_json_atomic(
            &self
                .company_dir(company_ref)
                .join(format!("{}.json", safe_segment(&catalyst_event_id))),
            &payload,
        )?;
        log_store_write("catalyst_event", &catalyst_event_id, &path);
        Ok(payload)
    }

    pub fn load_catalyst_event(&self, catalyst_event_id: &str, validate: bool) -> Result<Value> {
        let payload = read_entity_json(&self.event_path(catalyst_event_id), catalyst_event_id)?;
        if validate {
            validate_current("catalyst_event", &payload)?;
        }
        Ok(payload)
    }

    pub fn catalyst_event_exists(&self, catalyst_event_id: &str) -> bool {
        self.event_path(catalyst_event_id).exists()
    }

    pub fn list_catalyst_events(&self, company_ref: &str) -> Result<Vec<String>> {
        let dir = self.company_dir(company_ref);
        let mut out = Vec::new();
        for stem in list_json_stems(&dir)? {
            let payload = read_json(&dir.join(format!("{stem}.json")))?;
            if let Some(id) = payload["catalyst_event_id"].as_str() {
                out.push(id.to_string());
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_dual_writes_and_lists() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalystEventStore::new(dir.path());
        let params = CatalystEventParams::new("AHT.L", "FY Results", "earnings", "2026-06-18");
        let payload = store.save_catalyst_event(&params).unwrap();

        assert_eq!(payload["catalyst_event_id"], "company/AHT.L/catalyst/fy_results");
        assert_eq!(payload["company_ref"], "company/AHT.L");
        assert_eq!(payload["status"], "scheduled");
        assert_eq!(payload["timing_confidence"], 50.0);

        assert!(store.catalyst_event_exists("company/AHT.L/catalyst/fy_results"));
        assert_eq!(
            store.list_catalyst_events("company/AHT.L").unwrap(),
            vec!["company/AHT.L/catalyst/fy_results"]
        );
        assert!(store.list_catalyst_events("company/MSFT").unwrap().is_empty());
    }

    #[test]
    fn test_expected_date_truncates_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalystEventStore::new(dir.path());
        let mut params = CatalystEventParams::new("AHT.L", "FY Results", "earnings", "2026-06-18T07:00:00Z");
        params.window_start = Some("2026-06-15".into());
        params.window_end = Some("2026-06-20".into());
        params.importance = Some(80.0);
        let payload = store.save_catalyst_event(&params).unwrap();
        assert_eq!(payload["expected_date"], "2026-06-18");
        assert_eq!(payload["window_start"], "2026-06-15");
        assert_eq!(payload["importance"], 80.0);
    }

    #[test]
    fn test_company_ref_alias_derives_ticker() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalystEventStore::new(dir.path());
        let mut params = CatalystEventParams::new("ignored", "FY Results", "earnings", "2026-06-18");
        params.ticker = None;
        params.company_ref = Some("company/AHT.L".into());
        let payload = store.save_catalyst_event(&params).unwrap();
        assert_eq!(payload["catalyst_event_id"], "company/AHT.L/catalyst/fy_results");
    }

    #[test]
    fn test_missing_identity_rejected() {
        let mut params = CatalystEventParams::new("AHT.L", "x", "earnings", "2026-06-18");
        params.ticker = None;
        params.company_ref = None;
        assert!(build_catalyst_event_payload(&params, false).is_err());

        let mut params = CatalystEventParams::new("AHT.L", "x", "earnings", "2026-06-18");
        params.event_id = None;
        assert!(build_catalyst_event_payload(&params, false).is_err());
    }

    #[test]
    fn test_patch_sets_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalystEventStore::new(dir.path());
        let mut params = CatalystEventParams::new("AHT.L", "FY Results", "earnings", "2026-06-18");
        params.catalyst_payload_patch = Some(serde_json::json!({
            "status": "confirmed",
            "details": {"note": "date confirmed by IR"},
        }));
        let payload = store.save_catalyst_event(&params).unwrap();
        assert_eq!(payload["status"], "confirmed");
        assert_eq!(payload["details"]["note"], "date confirmed by IR");
    }
}
