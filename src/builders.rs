//! Payload builders for the core intelligence entities.
//!
//! Assessment, thesis state, KG edge and the write-event envelope are built
//! here; satellite entities (macro regime, quarter events, ...) carry their
//! builders next to their stores. Builders fill complete default trees so a
//! bootstrap call with no overrides still produces a schema-valid payload.
//! Timestamps given as strings pass through untouched; the caller owns their
//! precision.

use serde_json::{json, Value};

use crate::constants::{
    ALLOWED_THESIS_MODES, BORROW_REQUIRED_MODES, CATALYST_REQUIRED_MODES, PAYLOAD_VERSION,
};
use crate::error::{Error, Result};
use crate::schema_validate::validate_current;

// =============================================================================
// Component helpers
// =============================================================================

/// A `{value, confidence}` leaf on the 0-100 scale.
pub fn scored_component(value: f64, confidence: f64) -> Value {
    json!({ "value": value, "confidence": confidence })
}

/// Scored component where a higher value means MORE risk, flagged so
/// downstream consumers do not read it as quality.
pub fn scored_component_inverted(value: f64, confidence: f64) -> Value {
    json!({
        "value": value,
        "confidence": confidence,
        "interpretation": "higher_value_means_higher_risk"
    })
}

/// `assessment/<entity-token>/<as_of>` with `/` collapsed out of the entity.
pub fn assessment_id_from_entity(entity_id: &str, as_of: &str) -> String {
    format!("assessment/{}/{}", entity_id.replace('/', "_"), as_of)
}

// =============================================================================
// Default assessment blocks
// =============================================================================

fn default_bqs_block() -> Value {
    json!({
        "score": 72.0,
        "scale": "0-100",
        "components": {
            "revenue_trajectory_quality": scored_component(72.0, 70.0),
            "margin_direction_resilience": scored_component(68.0, 67.0),
            "fcf_generation_quality": scored_component(70.0, 66.0),
            "balance_sheet_strength": scored_component(74.0, 71.0),
            "debt_maturity_refinancing_risk": scored_component_inverted(28.0, 64.0),
            "interest_coverage_quality": scored_component(76.0, 70.0),
            "moat_durability": scored_component(69.0, 63.0),
            "management_credibility_guidance_accuracy": scored_component(67.0, 64.0),
            "capital_allocation_discipline": scored_component(66.0, 62.0),
        },
        "summary": "Bootstrap BQS payload.",
    })
}

fn default_acs_block() -> Value {
    json!({
        "score": 75.0,
        "scale": "0-100",
        "components": {
            "public_data_clarity": scored_component(82.0, 75.0),
            "reporting_consistency": scored_component(79.0, 73.0),
            "earnings_predictability": scored_component(71.0, 68.0),
            "commodity_input_opacity": scored_component_inverted(24.0, 60.0),
            "hedging_book_opacity": scored_component_inverted(18.0, 58.0),
            "regulatory_complexity": scored_component_inverted(21.0, 59.0),
            "segment_complexity": scored_component_inverted(34.0, 61.0),
            "narrative_coherence": scored_component(78.0, 72.0),
            "historical_model_error_stability": scored_component(73.0, 69.0),
        },
        "summary": "Bootstrap ACS payload.",
    })
}

fn default_aot_block() -> Value {
    json!({
        "automation_beneficiary_score": 58.0,
        "automation_threat_score": 31.0,
        "signals": {
            "estimated_automatable_cost_base_pct": 22.0,
            "capex_ability_to_automate": scored_component(55.0, 60.0),
            "management_execution_credibility": scored_component(55.0, 58.0),
            "debt_blocks_transition": scored_component_inverted(20.0, 63.0),
            "customer_substitution_risk": scored_component_inverted(25.0, 61.0),
            "sector_ai_adoption_pace": scored_component(50.0, 57.0),
        },
        "summary": "Bootstrap AOT payload.",
    })
}

// =============================================================================
// Assessment
// =============================================================================

#[derive(Debug, Clone)]
pub struct AssessmentParams {
    pub entity_id: String,
    pub entity_type: String,
    pub as_of: String,
    pub source_event_ids: Vec<String>,
    pub risk_notes: String,
    pub has_active_catalyst: bool,
    pub catalyst_count: u64,
    pub next_catalyst_date: Option<String>,
    pub catalyst_types: Vec<String>,
    pub timing_confidence: Option<f64>,
    pub source_hashes: Vec<String>,
    pub generated_by: String,
}

impl AssessmentParams {
    pub fn new(entity_id: &str, entity_type: &str, as_of: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            entity_type: entity_type.to_string(),
            as_of: as_of.trim().to_string(),
            source_event_ids: Vec::new(),
            risk_notes: "bootstrap".into(),
            has_active_catalyst: false,
            catalyst_count: 0,
            next_catalyst_date: None,
            catalyst_types: Vec::new(),
            timing_confidence: None,
            source_hashes: Vec::new(),
            generated_by: "aion_equities.builders".into(),
        }
    }
}

pub fn build_assessment_payload(params: &AssessmentParams, validate: bool) -> Result<Value> {
    let as_of = params.as_of.trim();

    let mut catalyst = json!({
        "has_active_catalyst": params.has_active_catalyst,
        "catalyst_count": params.catalyst_count,
    });
    if let Some(date) = &params.next_catalyst_date {
        catalyst["next_catalyst_date"] = json!(date);
    }
    if !params.catalyst_types.is_empty() {
        catalyst["catalyst_types"] = json!(params.catalyst_types);
    }
    if let Some(tc) = params.timing_confidence {
        catalyst["timing_confidence"] = json!(tc);
    }

    let payload = json!({
        "assessment_id": assessment_id_from_entity(&params.entity_id, as_of),
        "entity_id": params.entity_id,
        "entity_type": params.entity_type,
        "as_of": as_of,
        "version": PAYLOAD_VERSION,
        "bqs": default_bqs_block(),
        "acs": default_acs_block(),
        "aot": default_aot_block(),
        "risk": {
            "analytical_confidence_gate_pass": true,
            "short_requires_catalyst": true,
            "borrow_cost_estimate_annualized_pct": 0.0,
            "position_risk_flags": [],
            "notes": params.risk_notes,
        },
        "catalyst": catalyst,
        "provenance": {
            "source_event_ids": params.source_event_ids,
            "source_hashes": params.source_hashes,
            "generated_by": params.generated_by,
            "generated_at": as_of,
        },
    });

    if validate {
        validate_current("assessment", &payload)?;
    }
    Ok(payload)
}

// =============================================================================
// Thesis state
// =============================================================================

#[derive(Debug, Clone)]
pub struct ThesisParams {
    pub thesis_id: String,
    pub ticker: String,
    pub mode: String,
    pub window: String,
    pub as_of: String,
    pub assessment_refs: Vec<String>,
    pub generated_by: String,
}

impl ThesisParams {
    pub fn new(thesis_id: &str, ticker: &str, mode: &str, window: &str, as_of: &str) -> Self {
        Self {
            thesis_id: thesis_id.to_string(),
            ticker: ticker.to_string(),
            mode: mode.to_string(),
            window: window.to_string(),
            as_of: as_of.trim().to_string(),
            assessment_refs: Vec::new(),
            generated_by: "aion_equities.builders".into(),
        }
    }
}

pub fn build_thesis_state_payload_minimal(params: &ThesisParams, validate: bool) -> Result<Value> {
    let mode = params.mode.as_str();
    if !ALLOWED_THESIS_MODES.contains(&mode) {
        return Err(Error::InvalidId(format!("invalid thesis mode: {mode}")));
    }

    let as_of = params.as_of.trim();
    let is_long = mode == "long" || mode == "catalyst_long";
    let is_short = mode == "short" || mode == "swing_short";
    let label = if is_long {
        "long"
    } else if is_short {
        "short"
    } else {
        "neutral"
    };
    let direction = if is_long {
        "up"
    } else if is_short {
        "down"
    } else {
        "flat"
    };
    // A short thesis still carries its directional candidate as primary;
    // only neutral_watch starts on the wait candidate.
    let selected = if mode == "neutral_watch" {
        "neutral_wait"
    } else {
        "long_base"
    };
    let catalyst_required = CATALYST_REQUIRED_MODES.contains(&mode);

    let payload = json!({
        "thesis_id": params.thesis_id,
        "ticker": params.ticker,
        "mode": mode,
        "window": params.window,
        "status": "candidate",
        "as_of": as_of,
        "version": PAYLOAD_VERSION,
        "superposition": [
            {
                "candidate_id": "long_base",
                "label": label,
                "probability_mass_hint": 0.5,
                "expected_move_direction": direction,
                "note": "Bootstrap thesis candidate",
            },
            {
                "candidate_id": "neutral_wait",
                "label": "neutral",
                "probability_mass_hint": 0.5,
                "expected_move_direction": "flat",
                "note": "Fallback neutral candidate",
            },
        ],
        "selected_candidate_id": selected,
        "assessment_refs": params.assessment_refs,
        "evidence_links": [],
        "catalyst": {
            "required": catalyst_required,
            "present": false,
            "timing_confidence": 0.0,
        },
        "borrow": {
            "required": BORROW_REQUIRED_MODES.contains(&mode),
            "borrow_cost_estimate_annualized_pct": 0.0,
            "locate_status": "unknown",
        },
        "sizing_proposal": {
            "unit_type": "capital_pct",
            "proposed_size": 0.0,
            "max_size": 0.0,
            "stop_logic": "bootstrap_placeholder",
            "target_logic": "bootstrap_placeholder",
        },
        "sqi": {
            "coherence_score": 50.0,
            "drift_score": 10.0,
            "contradiction_pressure": 5.0,
            "stability_score": 50.0,
            "collapse_readiness_score": 0.0,
            "trace_ids": [],
        },
        "policy_gate": {
            "bqs_pass": false,
            "acs_pass": false,
            "sqi_coherence_pass": false,
            "drift_pass": true,
            "contradiction_pass": true,
            "catalyst_pass": !catalyst_required,
            "risk_invariants_pass": true,
            "ready_for_action": false,
            "reasons": ["bootstrap_placeholder"],
        },
        "risk_invariants": {
            "version": PAYLOAD_VERSION,
        },
        "invalidation_conditions": [
            {
                "id": "time_window_expired",
                "condition_type": "time",
                "rule": "Thesis invalidates when review window expires without confirmation.",
                "severity": "warn",
            }
        ],
        "collapse": {
            "collapsed": false,
        },
        "audit": {
            "created_at": as_of,
            "updated_at": as_of,
            "created_by": params.generated_by,
            "updated_by": params.generated_by,
            "write_stage_refs": [],
        },
    });

    if validate {
        validate_current("thesis_state", &payload)?;
    }
    Ok(payload)
}

// =============================================================================
// KG edge
// =============================================================================

#[derive(Debug, Clone)]
pub struct KgEdgeParams {
    pub edge_id: String,
    pub src: String,
    pub dst: String,
    pub link_type: String,
    pub created_at: String,
    pub confidence: f64,
    pub active: bool,
    pub source_event_ids: Vec<String>,
    pub weight: Option<f64>,
    pub source_hashes: Vec<String>,
    pub generated_by: String,
}

impl KgEdgeParams {
    pub fn new(
        edge_id: &str,
        src: &str,
        dst: &str,
        link_type: &str,
        created_at: &str,
        confidence: f64,
    ) -> Self {
        Self {
            edge_id: edge_id.to_string(),
            src: src.to_string(),
            dst: dst.to_string(),
            link_type: link_type.to_string(),
            created_at: created_at.trim().to_string(),
            confidence,
            active: true,
            source_event_ids: Vec::new(),
            weight: None,
            source_hashes: Vec::new(),
            generated_by: "aion_equities.builders".into(),
        }
    }
}

pub fn build_kg_edge_payload(params: &KgEdgeParams, validate: bool) -> Result<Value> {
    let mut payload = json!({
        "edge_id": params.edge_id,
        "src": params.src,
        "dst": params.dst,
        "link_type": params.link_type,
        "created_at": params.created_at.trim(),
        "confidence": params.confidence,
        "active": params.active,
        "version": PAYLOAD_VERSION,
        "provenance": {
            "source_event_ids": params.source_event_ids,
            "source_hashes": params.source_hashes,
            "generated_by": params.generated_by,
        },
    });

    if let Some(w) = params.weight {
        payload["weight"] = json!(w);
    }

    if validate {
        validate_current("kg_edge", &payload)?;
    }
    Ok(payload)
}

// =============================================================================
// Write-event envelope
// =============================================================================

#[derive(Debug, Clone)]
pub struct EnvelopeParams {
    pub event_id: String,
    pub stage: String,
    pub timestamp: String,
    pub entity_id: String,
    pub entity_type: String,
    pub operation: String,
    pub payload_schema_id: String,
    pub payload_data: Value,
    pub source_kind: String,
    pub source_refs: Vec<String>,
    pub source_hashes: Vec<String>,
    pub generated_by: String,
    pub correlation_id: String,
}

pub fn build_write_event_envelope(params: &EnvelopeParams, validate: bool) -> Result<Value> {
    let payload = json!({
        "event_id": params.event_id,
        "stage": params.stage,
        "timestamp": params.timestamp.trim(),
        "entity_id": params.entity_id,
        "entity_type": params.entity_type,
        "operation": params.operation,
        "payload": {
            "schema_id": params.payload_schema_id,
            "data": params.payload_data,
        },
        "provenance": {
            "source_kind": params.source_kind,
            "source_refs": params.source_refs,
            "source_hashes": params.source_hashes,
            "generated_by": params.generated_by,
        },
        "trace": {
            "correlation_id": params.correlation_id,
        },
    });

    if validate {
        validate_current("write_event_envelope", &payload)?;
    }
    Ok(payload)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assessment_payload_validates() {
        let params = AssessmentParams::new("company/AHT.L", "company", "2026-02-22T22:00:00Z");
        let payload = build_assessment_payload(&params, true).unwrap();
        assert_eq!(
            payload["assessment_id"],
            "assessment/company_AHT.L/2026-02-22T22:00:00Z"
        );
        assert_eq!(payload["bqs"]["score"], 72.0);
        assert_eq!(payload["acs"]["score"], 75.0);
        assert_eq!(payload["version"], "v0.1.0");
        assert_eq!(payload["provenance"]["generated_at"], "2026-02-22T22:00:00Z");
    }

    #[test]
    fn test_assessment_accepts_bare_date_as_of() {
        let params = AssessmentParams::new("company/AHT.L", "company", "2025-01-10");
        let payload = build_assessment_payload(&params, true).unwrap();
        assert_eq!(payload["assessment_id"], "assessment/company_AHT.L/2025-01-10");
        assert_eq!(payload["as_of"], "2025-01-10");
    }

    #[test]
    fn test_assessment_catalyst_optionals_omitted() {
        let params = AssessmentParams::new("company/AHT.L", "company", "2026-02-22T22:00:00Z");
        let payload = build_assessment_payload(&params, true).unwrap();
        let catalyst = payload["catalyst"].as_object().unwrap();
        assert!(!catalyst.contains_key("next_catalyst_date"));
        assert!(!catalyst.contains_key("catalyst_types"));
        assert!(!catalyst.contains_key("timing_confidence"));
    }

    #[test]
    fn test_inverted_components_are_flagged() {
        let params = AssessmentParams::new("company/AHT.L", "company", "2026-02-22T22:00:00Z");
        let payload = build_assessment_payload(&params, false).unwrap();
        assert_eq!(
            payload["acs"]["components"]["hedging_book_opacity"]["interpretation"],
            "higher_value_means_higher_risk"
        );
        assert_eq!(
            payload["bqs"]["components"]["moat_durability"]
                .as_object()
                .unwrap()
                .contains_key("interpretation"),
            false
        );
    }

    #[test]
    fn test_thesis_minimal_validates() {
        let params = ThesisParams::new(
            "thesis/AHT.L/long/2026Q2_pre_earnings",
            "AHT.L",
            "long",
            "2026Q2_pre_earnings",
            "2026-02-22T22:00:00Z",
        );
        let payload = build_thesis_state_payload_minimal(&params, true).unwrap();
        assert_eq!(payload["status"], "candidate");
        assert_eq!(payload["selected_candidate_id"], "long_base");
        assert_eq!(payload["catalyst"]["required"], false);
        assert_eq!(payload["policy_gate"]["catalyst_pass"], true);
    }

    #[test]
    fn test_thesis_short_mode_requirements() {
        let params = ThesisParams::new(
            "thesis/AHT.L/short/2026Q2",
            "AHT.L",
            "short",
            "2026Q2",
            "2026-02-22T22:00:00Z",
        );
        let payload = build_thesis_state_payload_minimal(&params, true).unwrap();
        assert_eq!(payload["selected_candidate_id"], "long_base");
        assert_eq!(payload["superposition"][0]["label"], "short");
        assert_eq!(payload["superposition"][0]["expected_move_direction"], "down");
        assert_eq!(payload["catalyst"]["required"], true);
        assert_eq!(payload["borrow"]["required"], true);
        assert_eq!(payload["policy_gate"]["catalyst_pass"], false);
    }

    #[test]
    fn test_thesis_neutral_watch_waits() {
        let params = ThesisParams::new(
            "thesis/AHT.L/neutral_watch/2026Q2",
            "AHT.L",
            "neutral_watch",
            "2026Q2",
            "2026-02-22T22:00:00Z",
        );
        let payload = build_thesis_state_payload_minimal(&params, true).unwrap();
        assert_eq!(payload["selected_candidate_id"], "neutral_wait");
        assert_eq!(payload["superposition"][0]["expected_move_direction"], "flat");
    }

    #[test]
    fn test_thesis_invalid_mode_rejected() {
        let params = ThesisParams::new(
            "thesis/AHT.L/leveraged/2026Q2",
            "AHT.L",
            "leveraged",
            "2026Q2",
            "2026-02-22T22:00:00Z",
        );
        assert!(build_thesis_state_payload_minimal(&params, false).is_err());
    }

    #[test]
    fn test_kg_edge_payload_validates() {
        let mut params = KgEdgeParams::new(
            "edge/exposure/company_AHT.L->macro_dollar/2026-02-22T22:00:00Z",
            "company/AHT.L",
            "macro/dollar",
            "exposure",
            "2026-02-22T22:00:00Z",
            85.0,
        );
        params.source_event_ids = vec!["assessment/company_AHT.L/2026-02-22T22:00:00Z".into()];
        let payload = build_kg_edge_payload(&params, true).unwrap();
        assert_eq!(payload["active"], true);
        assert_eq!(payload["version"], "v0.1.0");
        assert!(!payload.as_object().unwrap().contains_key("weight"));
    }

    #[test]
    fn test_envelope_validates() {
        let params = EnvelopeParams {
            event_id: "write_event/company_AHT.L/interpretation/2026-02-22T22:00:00Z".into(),
            stage: "interpretation".into(),
            timestamp: "2026-02-22T22:00:00Z".into(),
            entity_id: "company/AHT.L".into(),
            entity_type: "company".into(),
            operation: "upsert".into(),
            payload_schema_id: "company".into(),
            payload_data: json!({"company_id": "company/AHT.L"}),
            source_kind: "bootstrap".into(),
            source_refs: vec![],
            source_hashes: vec![],
            generated_by: "aion_equities.builders".into(),
            correlation_id: "corr_company_AHT.L".into(),
        };
        let payload = build_write_event_envelope(&params, true).unwrap();
        assert_eq!(payload["payload"]["schema_id"], "company");
        assert_eq!(payload["trace"]["correlation_id"], "corr_company_AHT.L");
    }
}
