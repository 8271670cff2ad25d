//! Observer decision cycle store.
//!
//! One payload per review pass over a thesis, grouped by thesis:
//! ```text
//! observer_decision_cycles/
//!   thesis_AHT.L_long_2026q2_pre_earnings/
//!     observer_cycle_thesis_AHT.L_long_2026q2_pre_earnings_2026-02-22T22-00-00Z.json
//! ```
//!
//! `bias_metrics` and `timing_metrics` are always present as objects, even
//! when empty. Optional scores are omitted rather than written as null so a
//! missing measurement never reads as a zero.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::constants::PAYLOAD_VERSION;
use crate::error::Result;
use crate::logging::log_store_write;
use crate::schema_validate::validate_current;
use crate::store::{list_json_stems, read_entity_json, safe_segment, write_json_atomic};
use crate::timefmt;

#[derive(Debug, Clone)]
pub struct ObserverCycleParams {
    pub thesis_id: String,
    pub timestamp: String,
    pub process_quality_score: f64,
    pub process_notes: String,
    pub gate_adherence: Option<bool>,
    pub evidence_completeness: Option<f64>,
    pub outcome_known: bool,
    pub outcome_score: Option<f64>,
    pub return_pct: Option<f64>,
    pub max_adverse_excursion_pct: Option<f64>,
    pub max_favorable_excursion_pct: Option<f64>,
    pub timing_validity: Option<String>,
    pub thesis_validity: Option<String>,
    pub confidence_inflation_score: Option<f64>,
    pub thesis_lock_in_score: Option<f64>,
    pub recency_bias_score: Option<f64>,
    pub catalyst_timing_error_days: Option<i64>,
    pub collapse_timing_error_score: Option<f64>,
    pub drift_warning_effective: Option<bool>,
    pub sector_ref: Option<String>,
    pub false_positive_bucket: Option<bool>,
    pub observer_cycle_id: Option<String>,
    pub validate: bool,
}

impl ObserverCycleParams {
    pub fn new(thesis_id: &str, timestamp: &str, process_quality_score: f64) -> Self {
        Self {
            thesis_id: thesis_id.to_string(),
            timestamp: timestamp.to_string(),
            process_quality_score,
            process_notes: String::new(),
            gate_adherence: None,
            evidence_completeness: None,
            outcome_known: false,
            outcome_score: None,
            return_pct: None,
            max_adverse_excursion_pct: None,
            max_favorable_excursion_pct: None,
            timing_validity: None,
            thesis_validity: None,
            confidence_inflation_score: None,
            thesis_lock_in_score: None,
            recency_bias_score: None,
            catalyst_timing_error_days: None,
            collapse_timing_error_score: None,
            drift_warning_effective: None,
            sector_ref: None,
            false_positive_bucket: None,
            observer_cycle_id: None,
            validate: true,
        }
    }
}

pub fn build_cycle_payload(params: &ObserverCycleParams, validate: bool) -> Result<Value> {
    let ts = timefmt::iso_z(&params.timestamp)?;
    let cycle_id = match &params.observer_cycle_id {
        Some(id) => id.clone(),
        None => format!("observer_cycle/{}/{ts}", safe_segment(&params.thesis_id)),
    };

    let mut payload = json!({
        "observer_cycle_id": cycle_id,
        "thesis_id": params.thesis_id,
        "timestamp": ts,
        "version": PAYLOAD_VERSION,
        "process_quality": {
            "score": params.process_quality_score,
        },
        "outcome_quality": {
            "known": params.outcome_known,
        },
        "bias_metrics": {},
        "timing_metrics": {},
    });

    if !params.process_notes.is_empty() {
        payload["process_quality"]["notes"] = json!(params.process_notes);
    }
    if let Some(v) = params.gate_adherence {
        payload["process_quality"]["gate_adherence"] = json!(v);
    }
    if let Some(v) = params.evidence_completeness {
        payload["process_quality"]["evidence_completeness"] = json!(v);
    }

    if let Some(v) = params.outcome_score {
        payload["outcome_quality"]["score"] = json!(v);
    }
    if let Some(v) = params.return_pct {
        payload["outcome_quality"]["return_pct"] = json!(v);
    }
    if let Some(v) = params.max_adverse_excursion_pct {
        payload["outcome_quality"]["max_adverse_excursion_pct"] = json!(v);
    }
    if let Some(v) = params.max_favorable_excursion_pct {
        payload["outcome_quality"]["max_favorable_excursion_pct"] = json!(v);
    }
    if let Some(v) = &params.timing_validity {
        payload["outcome_quality"]["timing_validity"] = json!(v);
    }
    if let Some(v) = &params.thesis_validity {
        payload["outcome_quality"]["thesis_validity"] = json!(v);
    }

    if let Some(v) = params.confidence_inflation_score {
        payload["bias_metrics"]["confidence_inflation_score"] = json!(v);
    }
    if let Some(v) = params.thesis_lock_in_score {
        payload["bias_metrics"]["thesis_lock_in_score"] = json!(v);
    }
    if let Some(v) = params.recency_bias_score {
        payload["bias_metrics"]["recency_bias_score"] = json!(v);
    }

    if let Some(v) = params.catalyst_timing_error_days {
        payload["timing_metrics"]["catalyst_timing_error_days"] = json!(v);
    }
    if let Some(v) = params.collapse_timing_error_score {
        payload["timing_metrics"]["collapse_timing_error_score"] = json!(v);
    }
    if let Some(v) = params.drift_warning_effective {
        payload["timing_metrics"]["drift_warning_effective"] = json!(v);
    }

    if params.sector_ref.is_some() || params.false_positive_bucket.is_some() {
        payload["sector_metrics"] = json!({});
        if let Some(v) = &params.sector_ref {
            payload["sector_metrics"]["sector_ref"] = json!(v);
        }
        if let Some(v) = params.false_positive_bucket {
            payload["sector_metrics"]["false_positive_bucket"] = json!(v);
        }
    }

    if validate {
        validate_current("observer_decision_cycle", &payload)?;
    }
    Ok(payload)
}

pub struct ObserverCycleStore {
    cycles_dir: PathBuf,
}

impl ObserverCycleStore {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            cycles_dir: base_dir.join("observer_decision_cycles"),
        }
    }

    fn thesis_dir(&self, thesis_id: &str) -> PathBuf {
        self.cycles_dir.join(safe_segment(thesis_id))
    }

    fn cycle_path(&self, thesis_id: &str, observer_cycle_id: &str) -> PathBuf {
        self.thesis_dir(thesis_id)
            .join(format!("{}.json", safe_segment(observer_cycle_id)))
    }

    pub fn save_cycle(&self, params: &ObserverCycleParams) -> Result<Value> {
        let payload = build_cycle_payload(params, params.validate)?;
        let cycle_id = payload["observer_cycle_id"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let path = self.cycle_path(&params.thesis_id, &cycle_id);
        write_json_atomic(&path, &payload)?;
        log_store_write("observer_cycle", &cycle_id, &path);
        Ok(payload)
    }

    pub fn load_cycle(
        &self,
        thesis_id: &str,
        observer_cycle_id: &str,
        validate: bool,
    ) -> Result<Value> {
        let payload = read_entity_json(
            &self.cycle_path(thesis_id, observer_cycle_id),
            observer_cycle_id,
        )?;
        if validate {
            validate_current("observer_decision_cycle", &payload)?;
        }
        Ok(payload)
    }

    pub fn cycle_exists(&self, thesis_id: &str, observer_cycle_id: &str) -> bool {
        self.cycle_path(thesis_id, observer_cycle_id).exists()
    }

    pub fn list_cycles(&self, thesis_id: &str) -> Result<Vec<String>> {
        list_json_stems(&self.thesis_dir(thesis_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THESIS_ID: &str = "thesis/AHT.L/long/2026q2_pre_earnings";

    #[test]
    fn test_save_derives_cycle_id_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObserverCycleStore::new(dir.path());
        let params = ObserverCycleParams::new(THESIS_ID, "2026-02-22T22:00:00Z", 70.0);
        let payload = store.save_cycle(&params).unwrap();

        let cycle_id = payload["observer_cycle_id"].as_str().unwrap();
        assert_eq!(
            cycle_id,
            "observer_cycle/thesis_AHT.L_long_2026q2_pre_earnings/2026-02-22T22:00:00Z"
        );
        assert!(store.cycle_exists(THESIS_ID, cycle_id));
        assert_eq!(payload["process_quality"]["score"], 70.0);
        assert_eq!(payload["outcome_quality"]["known"], false);
        assert!(payload["bias_metrics"].as_object().unwrap().is_empty());
        assert!(payload["timing_metrics"].as_object().unwrap().is_empty());
        assert!(payload.get("sector_metrics").is_none());
    }

    #[test]
    fn test_optional_metrics_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObserverCycleStore::new(dir.path());
        let mut params = ObserverCycleParams::new(THESIS_ID, "2026-03-01T09:15:00Z", 55.0);
        params.process_notes = "gate checklist skipped".into();
        params.gate_adherence = Some(false);
        params.outcome_known = true;
        params.outcome_score = Some(40.0);
        params.return_pct = Some(-3.2);
        params.confidence_inflation_score = Some(20.0);
        params.catalyst_timing_error_days = Some(-4);
        params.drift_warning_effective = Some(true);
        params.sector_ref = Some("sector/industrial_equipment_rental".into());
        params.false_positive_bucket = Some(false);

        let payload = store.save_cycle(&params).unwrap();
        assert_eq!(payload["process_quality"]["notes"], "gate checklist skipped");
        assert_eq!(payload["process_quality"]["gate_adherence"], false);
        assert_eq!(payload["outcome_quality"]["score"], 40.0);
        assert_eq!(payload["outcome_quality"]["return_pct"], -3.2);
        assert_eq!(payload["bias_metrics"]["confidence_inflation_score"], 20.0);
        assert_eq!(payload["timing_metrics"]["catalyst_timing_error_days"], -4);
        assert_eq!(payload["timing_metrics"]["drift_warning_effective"], true);
        assert_eq!(
            payload["sector_metrics"]["sector_ref"],
            "sector/industrial_equipment_rental"
        );
    }

    #[test]
    fn test_list_cycles_sorted_per_thesis() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObserverCycleStore::new(dir.path());
        for ts in ["2026-03-01T09:15:00Z", "2026-02-22T22:00:00Z"] {
            let params = ObserverCycleParams::new(THESIS_ID, ts, 60.0);
            store.save_cycle(&params).unwrap();
        }
        let stems = store.list_cycles(THESIS_ID).unwrap();
        assert_eq!(stems.len(), 2);
        assert!(stems[0] < stems[1]);
        assert!(stems[0].ends_with("2026-02-22T22-00-00Z"));

        assert!(store.list_cycles("thesis/MSFT/long/w").unwrap().is_empty());
    }

    #[test]
    fn test_load_missing_cycle_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObserverCycleStore::new(dir.path());
        let err = store.load_cycle(THESIS_ID, "observer_cycle/x/y", true).unwrap_err();
        assert!(matches!(err, crate::error::Error::EntityNotFound(_)));
    }
}
