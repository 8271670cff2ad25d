//! Thesis state store.
//!
//! Layout:
//! ```text
//! theses/thesis_AHT.L_long_2026q2_pre_earnings.json
//! thesis_history/thesis_AHT.L_long_2026q2_pre_earnings/2026-02-22T22-00-00Z.json
//! write_events/thesis_AHT.L_long_2026q2_pre_earnings/decision/write_event_....json
//! ```
//! Saves write the minimal bootstrap payload; updates load the latest
//! snapshot, apply a shallow top-level patch, refresh the audit block, and
//! append a new history entry. Both emit `decision` envelopes.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::builders::{build_thesis_state_payload_minimal, EnvelopeParams, ThesisParams};
use crate::error::Result;
use crate::ids::make_thesis_id;
use crate::schema_validate::validate_current;
use crate::store::{
    list_json_stems, persist_write_event, read_entity_json, read_json, safe_segment,
    write_latest_and_history,
};
use crate::timefmt;

#[derive(Debug, Clone)]
pub struct SaveThesisParams {
    /// Explicit ID; derived from `(ticker, mode, window)` when absent.
    pub thesis_id: Option<String>,
    pub ticker: String,
    pub mode: String,
    pub window: String,
    pub as_of: String,
    pub assessment_refs: Vec<String>,
    pub status: String,
    pub generated_by: String,
    pub create_write_event: bool,
    pub validate: bool,
}

impl SaveThesisParams {
    pub fn new(ticker: &str, mode: &str, window: &str, as_of: &str) -> Self {
        Self {
            thesis_id: None,
            ticker: ticker.to_string(),
            mode: mode.to_string(),
            window: window.to_string(),
            as_of: as_of.to_string(),
            assessment_refs: Vec::new(),
            status: "candidate".into(),
            generated_by: "aion_equities.thesis_store".into(),
            create_write_event: true,
            validate: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateThesisParams {
    pub thesis_id: String,
    pub patch: Value,
    pub as_of: String,
    pub generated_by: String,
    pub create_write_event: bool,
    pub validate: bool,
}

impl UpdateThesisParams {
    pub fn new(thesis_id: &str, patch: Value, as_of: &str) -> Self {
        Self {
            thesis_id: thesis_id.to_string(),
            patch,
            as_of: as_of.to_string(),
            generated_by: "aion_equities.thesis_store".into(),
            create_write_event: true,
            validate: true,
        }
    }
}

pub struct ThesisStore {
    theses_dir: PathBuf,
    history_dir: PathBuf,
    write_events_dir: PathBuf,
}

impl ThesisStore {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            theses_dir: base_dir.join("theses"),
            history_dir: base_dir.join("thesis_history"),
            write_events_dir: base_dir.join("write_events"),
        }
    }

    fn latest_path(&self, thesis_id: &str) -> PathBuf {
        self.theses_dir
            .join(format!("{}.json", safe_segment(thesis_id)))
    }

    fn history_entity_dir(&self, thesis_id: &str) -> PathBuf {
        self.history_dir.join(safe_segment(thesis_id))
    }

    fn history_path(&self, thesis_id: &str, as_of: &str) -> PathBuf {
        self.history_entity_dir(thesis_id)
            .join(format!("{}.json", safe_segment(as_of)))
    }

    pub fn save_thesis_state(&self, params: &SaveThesisParams) -> Result<Value> {
        let thesis_id = match &params.thesis_id {
            Some(id) => id.clone(),
            None => make_thesis_id(&params.ticker, &params.mode, &params.window)?,
        };

        let mut build = ThesisParams::new(
            &thesis_id,
            &params.ticker,
            &params.mode,
            &params.window,
            &params.as_of,
        );
        build.assessment_refs = params.assessment_refs.clone();
        build.generated_by = params.generated_by.clone();

        let mut payload = build_thesis_state_payload_minimal(&build, false)?;
        payload["status"] = json!(params.status);

        if params.validate {
            validate_current("thesis_state", &payload)?;
        }

        let as_of = payload["as_of"].as_str().unwrap_or(&params.as_of).to_string();
        write_latest_and_history(
            &self.latest_path(&thesis_id),
            &self.history_entity_dir(&thesis_id),
            &as_of,
            "thesis_state",
            &thesis_id,
            &payload,
        )?;

        if params.create_write_event {
            let source_refs = if params.assessment_refs.is_empty() {
                vec![thesis_id.clone()]
            } else {
                params.assessment_refs.clone()
            };
            let envelope = EnvelopeParams {
                event_id: format!("write_event/{thesis_id}/decision/{as_of}"),
                stage: "decision".into(),
                timestamp: as_of,
                entity_id: thesis_id.clone(),
                entity_type: "thesis_state".into(),
                operation: "upsert".into(),
                payload_schema_id: "thesis_state".into(),
                payload_data: payload.clone(),
                source_kind: "system".into(),
                source_refs,
                source_hashes: Vec::new(),
                generated_by: params.generated_by.clone(),
                correlation_id: format!("corr_{}", safe_segment(&thesis_id)),
            };
            persist_write_event(&self.write_events_dir, envelope, params.validate)?;
        }

        Ok(payload)
    }

    /// Shallow-patch the latest snapshot and persist the result as a new
    /// history entry. Top-level keys in `patch` replace wholesale; the audit
    /// block keeps its creation fields and gets fresh update fields.
    pub fn update_thesis_state(&self, params: &UpdateThesisParams) -> Result<Value> {
        let current = self.load_latest_thesis_state(&params.thesis_id)?;
        let mut updated = current.clone();
        if let (Some(target), Some(patch)) = (updated.as_object_mut(), params.patch.as_object()) {
            for (k, v) in patch {
                target.insert(k.clone(), v.clone());
            }
        }

        let as_of = timefmt::iso_z(&params.as_of)?;
        updated["as_of"] = json!(as_of);

        let current_audit = current.get("audit").and_then(Value::as_object).cloned().unwrap_or_default();
        let mut audit = updated.get("audit").and_then(Value::as_object).cloned().unwrap_or_default();
        if !audit.contains_key("created_at") {
            let v = current_audit.get("created_at").cloned().unwrap_or_else(|| json!(as_of));
            audit.insert("created_at".into(), v);
        }
        if !audit.contains_key("created_by") {
            let v = current_audit
                .get("created_by")
                .cloned()
                .unwrap_or_else(|| json!(params.generated_by));
            audit.insert("created_by".into(), v);
        }
        audit.insert("updated_at".into(), json!(as_of));
        audit.insert("updated_by".into(), json!(params.generated_by));
        updated["audit"] = Value::Object(audit);

        if !updated.get("assessment_refs").map(Value::is_array).unwrap_or(false) {
            updated["assessment_refs"] = current.get("assessment_refs").cloned().unwrap_or_else(|| json!([]));
        }

        if params.validate {
            validate_current("thesis_state", &updated)?;
        }

        write_latest_and_history(
            &self.latest_path(&params.thesis_id),
            &self.history_entity_dir(&params.thesis_id),
            &as_of,
            "thesis_state",
            &params.thesis_id,
            &updated,
        )?;

        if params.create_write_event {
            let mut source_refs: Vec<String> = updated["assessment_refs"]
                .as_array()
                .map(|refs| {
                    refs.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            if source_refs.is_empty() {
                source_refs = vec![params.thesis_id.clone()];
            }
            let envelope = EnvelopeParams {
                event_id: format!("write_event/{}/decision/{as_of}", params.thesis_id),
                stage: "decision".into(),
                timestamp: as_of.clone(),
                entity_id: params.thesis_id.clone(),
                entity_type: "thesis_state".into(),
                operation: "update".into(),
                payload_schema_id: "thesis_state".into(),
                payload_data: updated.clone(),
                source_kind: "system".into(),
                source_refs,
                source_hashes: Vec::new(),
                generated_by: params.generated_by.clone(),
                correlation_id: format!(
                    "corr_{}_{}",
                    safe_segment(&params.thesis_id),
                    safe_segment(&as_of)
                ),
            };
            persist_write_event(&self.write_events_dir, envelope, params.validate)?;
        }

        Ok(updated)
    }

    pub fn load_latest_thesis_state(&self, thesis_id: &str) -> Result<Value> {
        read_entity_json(&self.latest_path(thesis_id), thesis_id)
    }

    pub fn load_latest_thesis_state_by_parts(
        &self,
        ticker: &str,
        mode: &str,
        window: &str,
    ) -> Result<Value> {
        let thesis_id = make_thesis_id(ticker, mode, window)?;
        self.load_latest_thesis_state(&thesis_id)
    }

    pub fn load_thesis_state_at(&self, thesis_id: &str, as_of: &str) -> Result<Value> {
        read_entity_json(&self.history_path(thesis_id, as_of), thesis_id)
    }

    pub fn thesis_exists(&self, thesis_id: &str) -> bool {
        self.latest_path(thesis_id).exists()
    }

    pub fn list_thesis_history(&self, thesis_id: &str) -> Result<Vec<String>> {
        list_json_stems(&self.history_entity_dir(thesis_id))
    }

    pub fn load_write_events(&self, thesis_id: &str, stage: &str) -> Result<Vec<Value>> {
        let stage_dir = self
            .write_events_dir
            .join(safe_segment(thesis_id))
            .join(stage);
        let mut events = Vec::new();
        for stem in list_json_stems(&stage_dir)? {
            events.push(read_json(&stage_dir.join(format!("{stem}.json")))?);
        }
        Ok(events)
    }
}
