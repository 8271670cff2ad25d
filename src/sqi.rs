//! SQI signal mapping.
//!
//! [`build_sqi_signal_inputs`] flattens an assessment payload, an optional
//! thesis state, and optional KG/pattern/observer context into the nested
//! `{sqi, policy_gate}` inputs the downstream signal engine consumes.
//!
//! The mapping is a fixed rule table resolved over dotted source paths. The
//! table here is authoritative; `schemas/v0_1/sqi_field_mapping.v0_1.json`
//! mirrors it for review and the two are checked against each other in tests.
//!
//! Pure: same inputs, same output, no clock reads. Missing sources are
//! omitted from the output, never synthesized.

use serde_json::{json, Map, Value};

// ======================================================================
// rule table
// ======================================================================

/// How a resolved source value becomes the target value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extract {
    /// Copy the source verbatim.
    Value,
    /// Map each component name to its `.value` field.
    ComponentValues,
    /// Map each component name to its `.confidence` field.
    ComponentConfidences,
    /// `.value` per component, restricted to [`OPACITY_SUBSET`] names.
    OpacitySubset,
}

impl Extract {
    pub fn as_str(&self) -> &'static str {
        match self {
            Extract::Value => "value",
            Extract::ComponentValues => "component_values",
            Extract::ComponentConfidences => "component_confidences",
            Extract::OpacitySubset => "opacity_subset",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MappingRule {
    pub source: &'static str,
    pub target: &'static str,
    pub extract: Extract,
}

const fn rule(source: &'static str, target: &'static str, extract: Extract) -> MappingRule {
    MappingRule {
        source,
        target,
        extract,
    }
}

/// Opacity and complexity component names that feed the uncertainty penalty.
pub const OPACITY_SUBSET: [&str; 6] = [
    "commodity_input_opacity",
    "commodity_opacity",
    "hedging_book_opacity",
    "regulatory_complexity",
    "segment_complexity",
    "reporting_complexity",
];

/// Source roots are `assessment`, `thesis`, and `context`. Targets are
/// `sqi.<key>` or `policy_gate.<key>`.
pub const MAPPING_RULES: [MappingRule; 27] = [
    rule("assessment.bqs.score", "sqi.business_strength_signal", Extract::Value),
    rule("assessment.bqs.components", "sqi.evidence_component_signals", Extract::ComponentValues),
    rule("assessment.bqs.components", "sqi.evidence_confidence_weights", Extract::ComponentConfidences),
    rule("assessment.acs.score", "sqi.predictability_signal", Extract::Value),
    rule(
        "assessment.acs.components.narrative_coherence.value",
        "sqi.narrative_coherence_signal",
        Extract::Value,
    ),
    rule(
        "assessment.acs.components.historical_model_error_stability.value",
        "sqi.model_stability_signal",
        Extract::Value,
    ),
    rule("assessment.acs.components", "sqi.uncertainty_penalty_signals", Extract::OpacitySubset),
    rule(
        "assessment.aot.automation_beneficiary_score",
        "sqi.forward_margin_expansion_signal",
        Extract::Value,
    ),
    rule("assessment.aot.automation_threat_score", "sqi.disruption_threat_signal", Extract::Value),
    rule(
        "assessment.aot.signals.management_execution_credibility.value",
        "sqi.execution_credibility_signal",
        Extract::Value,
    ),
    rule(
        "assessment.aot.signals.debt_blocks_transition.value",
        "sqi.transition_blocker_penalty",
        Extract::Value,
    ),
    rule("assessment.catalyst.has_active_catalyst", "sqi.catalyst_alignment_signal", Extract::Value),
    rule("assessment.catalyst.timing_confidence", "sqi.catalyst_timing_confidence", Extract::Value),
    rule(
        "assessment.risk.borrow_cost_estimate_annualized_pct",
        "sqi.short_borrow_cost_signal",
        Extract::Value,
    ),
    rule("assessment.risk.analytical_confidence_gate_pass", "policy_gate.acs_pass", Extract::Value),
    rule(
        "assessment.risk.short_requires_catalyst",
        "policy_gate.short_requires_catalyst",
        Extract::Value,
    ),
    rule("assessment.catalyst.has_active_catalyst", "policy_gate.has_active_catalyst", Extract::Value),
    rule("thesis.catalyst.required", "policy_gate.catalyst_required", Extract::Value),
    rule("thesis.sqi.trace_ids", "sqi.trace_ids", Extract::Value),
    rule("context.kg.supports_count", "sqi.kg_supports_signal", Extract::Value),
    rule("context.kg.contradicts_count", "sqi.kg_contradicts_signal", Extract::Value),
    rule("context.kg.drift_score", "sqi.drift_signal", Extract::Value),
    rule("context.kg.confidence_modifier", "sqi.confidence_modifier_signal", Extract::Value),
    rule("context.kg.pattern_match_score", "sqi.kg_pattern_support_signal", Extract::Value),
    rule("context.pattern.aggregate_score", "sqi.pattern_support_signal", Extract::Value),
    rule("context.pattern.stability_modifier", "sqi.stability_modifier_signal", Extract::Value),
    rule("context.observer.bias_penalty", "sqi.bias_penalty_signal", Extract::Value),
];

// ======================================================================
// resolution
// ======================================================================

fn resolve<'a>(
    assessment: &'a Value,
    thesis_state: Option<&'a Value>,
    context: Option<&'a Value>,
    dotted: &str,
) -> Option<&'a Value> {
    let mut parts = dotted.split('.');
    let mut cur = match parts.next()? {
        "assessment" => assessment,
        "thesis" => thesis_state?,
        "context" => context?,
        _ => return None,
    };
    for part in parts {
        cur = cur.as_object()?.get(part)?;
    }
    if cur.is_null() {
        None
    } else {
        Some(cur)
    }
}

/// `{component: {field: x, ...}, ...}` to `{component: x, ...}`, skipping
/// components without the field.
fn component_field_map(components: &Value, field: &str) -> Option<Value> {
    let obj = components.as_object()?;
    let mut out = Map::new();
    for (name, comp) in obj {
        if let Some(v) = comp.as_object().and_then(|c| c.get(field)) {
            if !v.is_null() {
                out.insert(name.clone(), v.clone());
            }
        }
    }
    Some(Value::Object(out))
}

fn opacity_subset_map(components: &Value) -> Option<Value> {
    let obj = components.as_object()?;
    let mut out = Map::new();
    for name in OPACITY_SUBSET {
        let value = obj
            .get(name)
            .and_then(Value::as_object)
            .and_then(|c| c.get("value"));
        if let Some(v) = value {
            if !v.is_null() {
                out.insert(name.to_string(), v.clone());
            }
        }
    }
    Some(Value::Object(out))
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

// ======================================================================
// entry point
// ======================================================================

/// Run every mapping rule over the inputs and assemble the nested result.
///
/// After the table pass, `sqi.kg_net_support_signal` is derived from the raw
/// support/contradiction counts when both landed, and the borrow-cost signal
/// is coerced to a float (dropped when uncoercible).
pub fn build_sqi_signal_inputs(
    assessment: &Value,
    thesis_state: Option<&Value>,
    context: Option<&Value>,
) -> Value {
    let mut out = json!({ "sqi": {}, "policy_gate": {} });

    for rule in MAPPING_RULES {
        let Some(source) = resolve(assessment, thesis_state, context, rule.source) else {
            continue;
        };
        let extracted = match rule.extract {
            Extract::Value => Some(source.clone()),
            Extract::ComponentValues => component_field_map(source, "value"),
            Extract::ComponentConfidences => component_field_map(source, "confidence"),
            Extract::OpacitySubset => opacity_subset_map(source),
        };
        let Some(value) = extracted else { continue };
        let Some((group, key)) = rule.target.split_once('.') else {
            continue;
        };
        out[group][key] = value;
    }

    let supports = out["sqi"]["kg_supports_signal"].as_f64();
    let contradicts = out["sqi"]["kg_contradicts_signal"].as_f64();
    if let (Some(s), Some(c)) = (supports, contradicts) {
        out["sqi"]["kg_net_support_signal"] = json!(s - c);
    }

    if !out["sqi"]["short_borrow_cost_signal"].is_null() {
        match coerce_f64(&out["sqi"]["short_borrow_cost_signal"]) {
            Some(v) => out["sqi"]["short_borrow_cost_signal"] = json!(v),
            None => {
                if let Some(m) = out["sqi"].as_object_mut() {
                    m.remove("short_borrow_cost_signal");
                }
            }
        }
    }

    out
}

// ======================================================================
// Tests
// ======================================================================
