//! Knowledge-graph edge store.
//!
//! Edge IDs carry their endpoints: `edge/<link_type>/<src>-><dst>/<created_at>`
//! with endpoint tokens scrubbed to `[A-Za-z0-9._:/-]` (slashes and colons
//! survive inside the ID; `safe_segment` flattens them for filenames).
//!
//! Layout:
//! ```text
//! kg_edges/edge_exposure_company_AHT.L->sector_industrial_equipment_rental_2026-02-22T22-00-00Z.json
//! kg_edge_history/<edge file stem>/<ts>.json
//! write_events/<edge file stem>/interpretation/write_event_....json
//! ```

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::builders::{build_kg_edge_payload, EnvelopeParams, KgEdgeParams};
use crate::error::Result;
use crate::merge::deep_merge;
use crate::schema_validate::validate_current;
use crate::store::{
    list_json_stems, persist_write_event, read_entity_json, read_json, safe_segment,
    write_latest_and_history,
};
use crate::timefmt;

/// Scrub an endpoint for embedding in an edge ID. Runs of characters outside
/// `[A-Za-z0-9._:/-]` collapse to a single `_`.
pub fn edge_token(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_run = false;
    for c in value.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '/' | '-') {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct SaveKgEdgeParams {
    /// Explicit edge ID; derived from `(link_type, src, dst, created_at)`
    /// when absent.
    pub edge_id: Option<String>,
    pub src: String,
    pub dst: String,
    pub link_type: String,
    pub created_at: String,
    pub confidence: f64,
    pub active: bool,
    pub weight: Option<f64>,
    pub source_event_ids: Vec<String>,
    pub source_hashes: Vec<String>,
    pub generated_by: String,
    pub edge_payload_patch: Option<Value>,
    pub create_write_event: bool,
    pub validate: bool,
}

impl SaveKgEdgeParams {
    pub fn new(src: &str, dst: &str, link_type: &str, created_at: &str, confidence: f64) -> Self {
        Self {
            edge_id: None,
            src: src.to_string(),
            dst: dst.to_string(),
            link_type: link_type.to_string(),
            created_at: created_at.to_string(),
            confidence,
            active: true,
            weight: None,
            source_event_ids: Vec::new(),
            source_hashes: Vec::new(),
            generated_by: "aion_equities.kg_edge_store".into(),
            edge_payload_patch: None,
            create_write_event: true,
            validate: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateKgEdgeParams {
    pub edge_id: String,
    pub patch: Value,
    pub updated_at: String,
    pub generated_by: String,
    pub create_write_event: bool,
    pub validate: bool,
}

impl UpdateKgEdgeParams {
    pub fn new(edge_id: &str, patch: Value, updated_at: &str) -> Self {
        Self {
            edge_id: edge_id.to_string(),
            patch,
            updated_at: updated_at.to_string(),
            generated_by: "aion_equities.kg_edge_store".into(),
            create_write_event: true,
            validate: true,
        }
    }
}

pub struct KgEdgeStore {
    edges_dir: PathBuf,
    history_dir: PathBuf,
    write_events_dir: PathBuf,
}

impl KgEdgeStore {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            edges_dir: base_dir.join("kg_edges"),
            history_dir: base_dir.join("kg_edge_history"),
            write_events_dir: base_dir.join("write_events"),
        }
    }

    fn latest_path(&self, edge_id: &str) -> PathBuf {
        self.edges_dir.join(format!("{}.json", safe_segment(edge_id)))
    }

    fn history_entity_dir(&self, edge_id: &str) -> PathBuf {
        self.history_dir.join(safe_segment(edge_id))
    }

    pub fn save_edge(&self, params: &SaveKgEdgeParams) -> Result<Value> {
        let created_at = timefmt::iso_z(&params.created_at)?;
        let edge_id = match &params.edge_id {
            Some(id) => id.clone(),
            None => format!(
                "edge/{}/{}->{}/{created_at}",
                params.link_type,
                edge_token(&params.src),
                edge_token(&params.dst)
            ),
        };

        let mut build = KgEdgeParams::new(
            &edge_id,
            &params.src,
            &params.dst,
            &params.link_type,
            &created_at,
            params.confidence,
        );
        build.active = params.active;
        build.weight = params.weight;
        build.source_event_ids = params.source_event_ids.clone();
        build.source_hashes = params.source_hashes.clone();
        build.generated_by = params.generated_by.clone();

        let mut payload = build_kg_edge_payload(&build, false)?;
        if let Some(patch) = &params.edge_payload_patch {
            payload = deep_merge(&payload, patch);
        }
        if params.validate {
            validate_current("kg_edge", &payload)?;
        }

        write_latest_and_history(
            &self.latest_path(&edge_id),
            &self.history_entity_dir(&edge_id),
            &created_at,
            "kg_edge",
            &edge_id,
            &payload,
        )?;

        if params.create_write_event {
            let source_refs = if params.source_event_ids.is_empty() {
                vec![params.src.clone(), params.dst.clone()]
            } else {
                params.source_event_ids.clone()
            };
            let envelope = EnvelopeParams {
                event_id: format!("write_event/{edge_id}/interpretation/{created_at}"),
                stage: "interpretation".into(),
                timestamp: created_at,
                entity_id: edge_id.clone(),
                entity_type: "kg_edge".into(),
                operation: "upsert".into(),
                payload_schema_id: "kg_edge".into(),
                payload_data: payload.clone(),
                source_kind: "system".into(),
                source_refs,
                source_hashes: Vec::new(),
                generated_by: params.generated_by.clone(),
                correlation_id: format!("corr_{}", safe_segment(&edge_id)),
            };
            persist_write_event(&self.write_events_dir, envelope, params.validate)?;
        }

        Ok(payload)
    }

    /// Shallow-patch the latest edge. `created_at` keeps the identity
    /// timestamp; history for updates is keyed by `updated_at`.
    pub fn update_kg_edge(&self, params: &UpdateKgEdgeParams) -> Result<Value> {
        let current = self.load_latest_kg_edge(&params.edge_id)?;
        let mut updated = current.clone();
        if let (Some(target), Some(patch)) = (updated.as_object_mut(), params.patch.as_object()) {
            for (k, v) in patch {
                target.insert(k.clone(), v.clone());
            }
        }

        let updated_at = timefmt::iso_z(&params.updated_at)?;
        updated["updated_at"] = json!(updated_at);

        if !updated.get("provenance").map(Value::is_object).unwrap_or(false) {
            updated["provenance"] = json!({});
        }
        updated["provenance"]["generated_by"] = json!(params.generated_by);

        if params.validate {
            validate_current("kg_edge", &updated)?;
        }

        write_latest_and_history(
            &self.latest_path(&params.edge_id),
            &self.history_entity_dir(&params.edge_id),
            &updated_at,
            "kg_edge",
            &params.edge_id,
            &updated,
        )?;

        if params.create_write_event {
            let mut source_refs: Vec<String> = updated["provenance"]["source_event_ids"]
                .as_array()
                .map(|refs| {
                    refs.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            if source_refs.is_empty() {
                for key in ["src", "dst"] {
                    if let Some(v) = updated[key].as_str() {
                        source_refs.push(v.to_string());
                    }
                }
            }
            let envelope = EnvelopeParams {
                event_id: format!("write_event/{}/interpretation/{updated_at}", params.edge_id),
                stage: "interpretation".into(),
                timestamp: updated_at,
                entity_id: params.edge_id.clone(),
                entity_type: "kg_edge".into(),
                operation: "update".into(),
                payload_schema_id: "kg_edge".into(),
                payload_data: updated.clone(),
                source_kind: "system".into(),
                source_refs,
                source_hashes: Vec::new(),
                generated_by: params.generated_by.clone(),
                correlation_id: format!("corr_{}", safe_segment(&params.edge_id)),
            };
            persist_write_event(&self.write_events_dir, envelope, params.validate)?;
        }

        Ok(updated)
    }

    pub fn load_latest_kg_edge(&self, edge_id: &str) -> Result<Value> {
        read_entity_json(&self.latest_path(edge_id), edge_id)
    }

    pub fn load_kg_edge_at(&self, edge_id: &str, stamp: &str) -> Result<Value> {
        let path = self
            .history_entity_dir(edge_id)
            .join(format!("{}.json", safe_segment(stamp)));
        read_entity_json(&path, edge_id)
    }

    pub fn kg_edge_exists(&self, edge_id: &str) -> bool {
        self.latest_path(edge_id).exists()
    }

    pub fn list_kg_edge_history(&self, edge_id: &str) -> Result<Vec<String>> {
        list_json_stems(&self.history_entity_dir(edge_id))
    }

    pub fn load_write_events(&self, edge_id: &str, stage: &str) -> Result<Vec<Value>> {
        let stage_dir = self
            .write_events_dir
            .join(safe_segment(edge_id))
            .join(stage);
        let mut events = Vec::new();
        for stem in list_json_stems(&stage_dir)? {
            events.push(read_json(&stage_dir.join(format!("{stem}.json")))?);
        }
        Ok(events)
    }
}
