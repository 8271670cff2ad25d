//! Quarter event store.
//!
//! Flat layout, one file per reported quarter:
//! `quarter_events/company_AHT.L_quarter_2026-Q1.json`. Quarter events are
//! immutable snapshots of a reporting period; corrections re-save the same
//! `(ticker, year, quarter)` ID.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::constants::PAYLOAD_VERSION;
use crate::error::Result;
use crate::ids::{make_company_id, make_quarter_event_id};
use crate::logging::log_store_write;
use crate::merge::deep_merge;
use crate::schema_validate::validate_current;
use crate::store::{list_json_stems, read_entity_json, read_json, safe_segment, write_json_atomic};
use crate::timefmt;

#[derive(Debug, Clone)]
pub struct QuarterEventParams {
    pub ticker: String,
    pub fiscal_year: i32,
    pub fiscal_quarter: u8,
    pub as_reported_date: String,
    pub document_refs: Vec<String>,
    pub source_hashes: Vec<String>,
    pub created_by: String,
    pub event_type: String,
    pub provider: Option<String>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub earnings_call_date: Option<String>,
    pub financials: Option<Value>,
    pub narrative_summary: String,
    pub guidance_text_excerpt_refs: Option<Vec<String>>,
    pub management_claim_refs: Option<Vec<String>>,
    pub ast_applied: bool,
    pub ast_result_ref: Option<String>,
    pub deltas_vs_prior: Option<Value>,
    pub flags: Vec<String>,
    pub assessment_refs: Vec<String>,
    pub pattern_match_refs: Option<Vec<String>>,
    pub sqi_trace_refs: Option<Vec<String>>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub quarter_event_payload_patch: Option<Value>,
    pub validate: bool,
}

impl QuarterEventParams {
    pub fn new(ticker: &str, fiscal_year: i32, fiscal_quarter: u8, as_reported_date: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            fiscal_year,
            fiscal_quarter,
            as_reported_date: as_reported_date.to_string(),
            document_refs: Vec::new(),
            source_hashes: Vec::new(),
            created_by: "aion_equities.quarter_event_store".into(),
            event_type: "quarterly_results".into(),
            provider: None,
            period_start: None,
            period_end: None,
            earnings_call_date: None,
            financials: None,
            narrative_summary: String::new(),
            guidance_text_excerpt_refs: None,
            management_claim_refs: None,
            ast_applied: false,
            ast_result_ref: None,
            deltas_vs_prior: None,
            flags: Vec::new(),
            assessment_refs: Vec::new(),
            pattern_match_refs: None,
            sqi_trace_refs: None,
            created_at: None,
            updated_at: None,
            quarter_event_payload_patch: None,
            validate: true,
        }
    }
}

pub fn build_quarter_event_payload(params: &QuarterEventParams, validate: bool) -> Result<Value> {
    let created_at = timefmt::iso_z_or_now(params.created_at.as_deref())?;
    let updated_at = match &params.updated_at {
        Some(v) => timefmt::iso_z(v)?,
        None => created_at.clone(),
    };

    let quarter_event_id =
        make_quarter_event_id(&params.ticker, params.fiscal_year, params.fiscal_quarter)?;
    let company_ref = make_company_id(&params.ticker)?;

    let mut period = json!({
        "fiscal_year": params.fiscal_year,
        "fiscal_quarter": params.fiscal_quarter,
    });
    if let Some(start) = &params.period_start {
        period["period_start"] = json!(timefmt::date_str(start)?);
    }
    if let Some(end) = &params.period_end {
        period["period_end"] = json!(timefmt::date_str(end)?);
    }

    let mut source = json!({
        "document_refs": params.document_refs,
        "source_hashes": params.source_hashes,
    });
    if let Some(provider) = params.provider.as_deref().filter(|p| !p.is_empty()) {
        source["provider"] = json!(provider);
    }

    let mut narrative = json!({ "summary": params.narrative_summary });
    if let Some(refs) = &params.guidance_text_excerpt_refs {
        narrative["guidance_text_excerpt_refs"] = json!(refs);
    }
    if let Some(refs) = &params.management_claim_refs {
        narrative["management_claim_refs"] = json!(refs);
    }
    narrative["ast_applied"] = json!(params.ast_applied);
    if let Some(r) = params.ast_result_ref.as_deref().filter(|r| !r.is_empty()) {
        narrative["ast_result_ref"] = json!(r);
    }

    let mut analysis = json!({
        "deltas_vs_prior": params.deltas_vs_prior.clone().unwrap_or_else(|| json!({})),
        "flags": params.flags,
        "assessment_refs": params.assessment_refs,
    });
    if let Some(refs) = &params.pattern_match_refs {
        analysis["pattern_match_refs"] = json!(refs);
    }
    if let Some(refs) = &params.sqi_trace_refs {
        analysis["sqi_trace_refs"] = json!(refs);
    }

    let mut payload = json!({
        "quarter_event_id": quarter_event_id,
        "company_ref": company_ref,
        "period": period,
        "event_type": params.event_type,
        "as_reported_date": timefmt::date_str(&params.as_reported_date)?,
        "version": PAYLOAD_VERSION,
        "source": source,
        "extraction": {
            "financials": params.financials.clone().unwrap_or_else(|| json!({})),
            "narrative": narrative,
        },
        "analysis": analysis,
        "audit": {
            "created_at": created_at,
            "updated_at": updated_at,
            "created_by": params.created_by,
        },
    });

    if let Some(date) = &params.earnings_call_date {
        payload["earnings_call_date"] = json!(timefmt::date_str(date)?);
    }

    if validate {
        validate_current("quarter_event", &payload)?;
    }
    Ok(payload)
}

pub struct QuarterEventStore {
    events_dir: PathBuf,
}

impl QuarterEventStore {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            events_dir: base_dir.join("quarter_events"),
        }
    }

    pub fn storage_path(&self, quarter_event_id: &str) -> PathBuf {
        self.events_dir
            .join(format!("{}.json", safe_segment(quarter_event_id)))
    }

    /// Build, patch, validate, persist. Bootstrap callers without source
    /// documents get `document:unknown` / `sha256:unknown` placeholders so
    /// provenance fields are never silently empty.
    pub fn save_quarter_event(&self, params: &QuarterEventParams) -> Result<Value> {
        let mut build = params.clone();
        if build.document_refs.is_empty() {
            build.document_refs = vec!["document:unknown".into()];
        }
        if build.source_hashes.is_empty() {
            build.source_hashes = vec!["sha256:unknown".into()];
        }

        let mut payload = build_quarter_event_payload(&build, false)?;
        if let Some(patch) = &params.quarter_event_payload_patch {
            payload = deep_merge(&payload, patch);
        }
        if params.validate {
            validate_current("quarter_event", &payload)?;
        }

        let quarter_event_id = payload["quarter_event_id"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let path = self.storage_path(&quarter_event_id);
        write_json_atomic(&path, &payload)?;
        log_store_write("quarter_event", &quarter_event_id, &path);
        Ok(payload)
    }

    pub fn load_quarter_event(&self, quarter_event_id: &str, validate: bool) -> Result<Value> {
        let payload = read_entity_json(&self.storage_path(quarter_event_id), quarter_event_id)?;
        if validate {
            validate_current("quarter_event", &payload)?;
        }
        Ok(payload)
    }

    pub fn quarter_event_exists(&self, quarter_event_id: &str) -> bool {
        self.storage_path(quarter_event_id).exists()
    }

    /// IDs of all stored quarter events for a company, sorted by filename.
    pub fn list_quarter_events(&self, company_ref: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for stem in list_json_stems(&self.events_dir)? {
            let payload = read_json(&self.events_dir.join(format!("{stem}.json")))?;
            if payload["company_ref"] == company_ref {
                if let Some(qid) = payload["quarter_event_id"].as_str() {
                    out.push(qid.to_string());
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_fills_provenance_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let store = QuarterEventStore::new(dir.path());
        let params = QuarterEventParams::new("AHT.L", 2026, 1, "2026-03-01");
        let payload = store.save_quarter_event(&params).unwrap();

        assert_eq!(payload["quarter_event_id"], "company/AHT.L/quarter/2026-Q1");
        assert_eq!(payload["company_ref"], "company/AHT.L");
        assert_eq!(payload["source"]["document_refs"][0], "document:unknown");
        assert_eq!(payload["source"]["source_hashes"][0], "sha256:unknown");
        assert_eq!(payload["event_type"], "quarterly_results");
    }

    #[test]
    fn test_round_trip_and_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = QuarterEventStore::new(dir.path());
        let mut params = QuarterEventParams::new("AHT.L", 2026, 1, "2026-03-01");
        params.document_refs = vec!["company/AHT.L/filing/2026-03-01/10q".into()];
        params.source_hashes = vec!["sha256:abc".into()];
        params.period_start = Some("2025-11-01".into());
        params.period_end = Some("2026-01-31".into());
        let saved = store.save_quarter_event(&params).unwrap();

        assert!(store.quarter_event_exists("company/AHT.L/quarter/2026-Q1"));
        let loaded = store
            .load_quarter_event("company/AHT.L/quarter/2026-Q1", true)
            .unwrap();
        assert_eq!(saved, loaded);
        assert_eq!(loaded["period"]["period_start"], "2025-11-01");
    }

    #[test]
    fn test_list_filters_by_company() {
        let dir = tempfile::tempdir().unwrap();
        let store = QuarterEventStore::new(dir.path());
        store
            .save_quarter_event(&QuarterEventParams::new("AHT.L", 2026, 1, "2026-03-01"))
            .unwrap();
        store
            .save_quarter_event(&QuarterEventParams::new("AHT.L", 2025, 4, "2025-12-10"))
            .unwrap();
        store
            .save_quarter_event(&QuarterEventParams::new("MSFT", 2026, 1, "2026-01-25"))
            .unwrap();

        let events = store.list_quarter_events("company/AHT.L").unwrap();
        assert_eq!(
            events,
            vec![
                "company/AHT.L/quarter/2025-Q4",
                "company/AHT.L/quarter/2026-Q1",
            ]
        );
    }

    #[test]
    fn test_patch_overrides_financials() {
        let dir = tempfile::tempdir().unwrap();
        let store = QuarterEventStore::new(dir.path());
        let mut params = QuarterEventParams::new("AHT.L", 2026, 1, "2026-03-01");
        params.quarter_event_payload_patch = Some(serde_json::json!({
            "extraction": {"financials": {"revenue_usd_m": 2690.0}},
            "analysis": {"flags": ["guidance_raised"]},
        }));
        let payload = store.save_quarter_event(&params).unwrap();
        assert_eq!(payload["extraction"]["financials"]["revenue_usd_m"], 2690.0);
        assert_eq!(payload["analysis"]["flags"][0], "guidance_raised");
        // sibling block untouched by the merge
        assert_eq!(payload["extraction"]["narrative"]["summary"], "");
    }

    #[test]
    fn test_invalid_quarter_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = QuarterEventStore::new(dir.path());
        let params = QuarterEventParams::new("AHT.L", 2026, 5, "2026-03-01");
        assert!(store.save_quarter_event(&params).is_err());
    }
}
