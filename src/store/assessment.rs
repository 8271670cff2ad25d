//! Assessment store.
//!
//! Layout:
//! ```text
//! assessments/company_AHT.L.json
//! assessment_history/company_AHT.L/2026-02-22T22-00-00Z.json
//! write_events/company_AHT.L/interpretation/write_event_....json
//! ```
//! Latest is keyed by entity, history by the payload `as_of`. Saving twice
//! with the same `as_of` rewrites the one history file.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::builders::{
    assessment_id_from_entity, build_assessment_payload, AssessmentParams, EnvelopeParams,
};
use crate::error::{Error, Result};
use crate::merge::deep_merge;
use crate::schema_validate::validate_current;
use crate::store::{
    list_json_stems, persist_write_event, read_entity_json, read_json, safe_segment,
    write_latest_and_history,
};

#[derive(Debug, Clone)]
pub struct SaveAssessmentParams {
    pub entity_id: String,
    pub entity_type: String,
    pub as_of: String,
    pub source_event_ids: Vec<String>,
    pub source_hashes: Vec<String>,
    pub risk_notes: String,
    pub has_active_catalyst: bool,
    pub catalyst_count: u64,
    pub generated_by: String,
    pub assessment_payload_patch: Option<Value>,
    pub create_write_event: bool,
    pub validate: bool,
}

impl SaveAssessmentParams {
    pub fn new(entity_id: &str, entity_type: &str, as_of: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            entity_type: entity_type.to_string(),
            as_of: as_of.to_string(),
            source_event_ids: Vec::new(),
            source_hashes: Vec::new(),
            risk_notes: "bootstrap".into(),
            has_active_catalyst: false,
            catalyst_count: 0,
            generated_by: "aion_equities.assessment_store".into(),
            assessment_payload_patch: None,
            create_write_event: true,
            validate: true,
        }
    }
}

pub struct AssessmentStore {
    assessments_dir: PathBuf,
    history_dir: PathBuf,
    write_events_dir: PathBuf,
}

impl AssessmentStore {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            assessments_dir: base_dir.join("assessments"),
            history_dir: base_dir.join("assessment_history"),
            write_events_dir: base_dir.join("write_events"),
        }
    }

    fn latest_path(&self, entity_id: &str) -> PathBuf {
        self.assessments_dir
            .join(format!("{}.json", safe_segment(entity_id)))
    }

    fn history_entity_dir(&self, entity_id: &str) -> PathBuf {
        self.history_dir.join(safe_segment(entity_id))
    }

    /// Build, patch, validate, and persist an assessment.
    ///
    /// `assessment_payload_patch` deep-merges over builder defaults, so
    /// callers override schema fields without re-stating the whole tree.
    /// Validation runs once, on the merged payload.
    pub fn save_assessment(&self, params: &SaveAssessmentParams) -> Result<Value> {
        let mut build = AssessmentParams::new(&params.entity_id, &params.entity_type, &params.as_of);
        build.source_event_ids = if params.source_event_ids.is_empty() {
            vec![format!("{}/bootstrap", params.entity_id)]
        } else {
            params.source_event_ids.clone()
        };
        build.source_hashes = params.source_hashes.clone();
        build.risk_notes = params.risk_notes.clone();
        build.has_active_catalyst = params.has_active_catalyst;
        build.catalyst_count = params.catalyst_count;
        build.generated_by = params.generated_by.clone();

        let mut payload = build_assessment_payload(&build, false)?;
        if let Some(patch) = &params.assessment_payload_patch {
            payload = deep_merge(&payload, patch);
        }
        if params.validate {
            validate_current("assessment", &payload)?;
        }

        let as_of = payload["as_of"].as_str().unwrap_or(&params.as_of).to_string();
        write_latest_and_history(
            &self.latest_path(&params.entity_id),
            &self.history_entity_dir(&params.entity_id),
            &as_of,
            "assessment",
            &params.entity_id,
            &payload,
        )?;

        if params.create_write_event {
            let source_refs = payload["provenance"]
                .get("source_event_ids")
                .and_then(Value::as_array)
                .map(|refs| {
                    refs.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_else(|| vec![params.entity_id.clone()]);
            let envelope = EnvelopeParams {
                event_id: format!("write_event/{}/interpretation/{as_of}", params.entity_id),
                stage: "interpretation".into(),
                timestamp: as_of,
                entity_id: params.entity_id.clone(),
                entity_type: params.entity_type.clone(),
                operation: "upsert".into(),
                payload_schema_id: "assessment".into(),
                payload_data: payload.clone(),
                source_kind: "system".into(),
                source_refs,
                source_hashes: Vec::new(),
                generated_by: params.generated_by.clone(),
                correlation_id: format!("corr_{}", safe_segment(&params.entity_id)),
            };
            persist_write_event(&self.write_events_dir, envelope, params.validate)?;
        }

        Ok(payload)
    }

    pub fn load_latest_assessment(&self, entity_id: &str) -> Result<Value> {
        read_entity_json(&self.latest_path(entity_id), entity_id)
    }

    pub fn load_assessment_at(&self, entity_id: &str, as_of: &str) -> Result<Value> {
        let path = self
            .history_entity_dir(entity_id)
            .join(format!("{}.json", safe_segment(as_of)));
        read_entity_json(&path, &assessment_id_from_entity(entity_id, as_of))
    }

    /// Resolve an assessment by its ID, scanning latest snapshots first and
    /// the full history second.
    pub fn load_assessment_by_id(&self, assessment_id: &str) -> Result<Value> {
        for stem in list_json_stems(&self.assessments_dir)? {
            let payload = read_json(&self.assessments_dir.join(format!("{stem}.json")))?;
            if payload["assessment_id"] == assessment_id {
                return Ok(payload);
            }
        }
        if self.history_dir.is_dir() {
            let mut entity_dirs: Vec<PathBuf> = std::fs::read_dir(&self.history_dir)
                .map_err(|e| Error::io(&self.history_dir, e))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_dir())
                .collect();
            entity_dirs.sort();
            for dir in entity_dirs {
                for stem in list_json_stems(&dir)? {
                    let payload = read_json(&dir.join(format!("{stem}.json")))?;
                    if payload["assessment_id"] == assessment_id {
                        return Ok(payload);
                    }
                }
            }
        }
        Err(Error::EntityNotFound(assessment_id.to_string()))
    }

    pub fn assessment_exists(&self, entity_id: &str) -> bool {
        self.latest_path(entity_id).exists()
    }

    /// Sorted history timestamps (file stems) for an entity.
    pub fn list_assessment_history(&self, entity_id: &str) -> Result<Vec<String>> {
        list_json_stems(&self.history_entity_dir(entity_id))
    }

    pub fn load_write_events(&self, entity_id: &str, stage: &str) -> Result<Vec<Value>> {
        let stage_dir = self
            .write_events_dir
            .join(safe_segment(entity_id))
            .join(stage);
        let mut events = Vec::new();
        for stem in list_json_stems(&stage_dir)? {
            events.push(read_json(&stage_dir.join(format!("{stem}.json")))?);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn save_one(store: &AssessmentStore, as_of: &str) -> Value {
        let params = SaveAssessmentParams::new("company/AHT.L", "company", as_of);
        store.save_assessment(&params).unwrap()
    }

    #[test]
    fn test_save_then_load_latest_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssessmentStore::new(dir.path());
        let saved = save_one(&store, "2026-02-22T22:00:00Z");
        let latest = store.load_latest_assessment("company/AHT.L").unwrap();
        assert_eq!(saved, latest);
        assert_eq!(
            latest["assessment_id"],
            "assessment/company_AHT.L/2026-02-22T22:00:00Z"
        );
        assert_eq!(
            latest["provenance"]["source_event_ids"][0],
            "company/AHT.L/bootstrap"
        );
    }

    #[test]
    fn test_latest_matches_history_at_latest_ts() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssessmentStore::new(dir.path());
        save_one(&store, "2026-02-22T22:00:00Z");
        save_one(&store, "2026-03-01T09:15:00Z");

        let history = store.list_assessment_history("company/AHT.L").unwrap();
        assert_eq!(history.len(), 2);
        let latest = store.load_latest_assessment("company/AHT.L").unwrap();
        let at = store
            .load_assessment_at("company/AHT.L", "2026-03-01T09:15:00Z")
            .unwrap();
        assert_eq!(latest, at);
    }

    #[test]
    fn test_same_as_of_overwrites_single_history_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssessmentStore::new(dir.path());
        save_one(&store, "2026-02-22T22:00:00Z");
        save_one(&store, "2026-02-22T22:00:00Z");
        let history = store.list_assessment_history("company/AHT.L").unwrap();
        assert_eq!(history, vec!["2026-02-22T22-00-00Z"]);
    }

    #[test]
    fn test_patch_overrides_builder_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssessmentStore::new(dir.path());
        let mut params = SaveAssessmentParams::new("company/AHT.L", "company", "2026-02-22T22:00:00Z");
        params.assessment_payload_patch = Some(json!({
            "bqs": {"score": 84.5},
            "provenance": {"source_event_ids": ["company/AHT.L/quarter/2026-Q1"]},
        }));
        let payload = store.save_assessment(&params).unwrap();
        assert_eq!(payload["bqs"]["score"], 84.5);
        // untouched siblings survive the merge
        assert_eq!(payload["bqs"]["scale"], "0-100");
        assert_eq!(
            payload["provenance"]["source_event_ids"],
            json!(["company/AHT.L/quarter/2026-Q1"])
        );
    }

    #[test]
    fn test_invalid_patch_aborts_before_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssessmentStore::new(dir.path());
        let mut params = SaveAssessmentParams::new("company/AHT.L", "company", "2026-02-22T22:00:00Z");
        params.assessment_payload_patch = Some(json!({"bqs": {"score": "high"}}));
        let err = store.save_assessment(&params).unwrap_err();
        match err {
            Error::SchemaValidation { detail, .. } => assert!(detail.contains("bqs.score")),
            other => panic!("expected SchemaValidation, got {other:?}"),
        }
        assert!(!store.assessment_exists("company/AHT.L"));
        assert!(store.list_assessment_history("company/AHT.L").unwrap().is_empty());
    }

    #[test]
    fn test_load_assessment_by_id_scans_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssessmentStore::new(dir.path());
        save_one(&store, "2026-02-22T22:00:00Z");
        save_one(&store, "2026-03-01T09:15:00Z");
        let found = store
            .load_assessment_by_id("assessment/company_AHT.L/2026-02-22T22:00:00Z")
            .unwrap();
        assert_eq!(found["as_of"], "2026-02-22T22:00:00Z");
        assert!(store.load_assessment_by_id("assessment/none/1999").is_err());
    }

    #[test]
    fn test_write_event_recorded_with_hash() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssessmentStore::new(dir.path());
        save_one(&store, "2026-02-22T22:00:00Z");
        let events = store
            .load_write_events("company/AHT.L", "interpretation")
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["stage"], "interpretation");
        assert_eq!(events[0]["operation"], "upsert");
        let hash = events[0]["provenance"]["source_hashes"][0].as_str().unwrap();
        assert!(hash.starts_with("sha256:"));
    }
}
