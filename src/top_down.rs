//! Macro to company cascade rules.
//!
//! Two entry points:
//! - [`derive_top_down_implications`] folds a macro regime payload and a
//!   top-down lever snapshot into the derived helicopter view used by the
//!   runtime. Pure: same inputs, same output, no clock reads.
//! - [`evaluate_macro_cascade_rules`] is the smaller lever-only table used
//!   to pre-seed `cascade_implications` on snapshot save.
//!
//! Lever snapshots arrive either with canonical `active_levers[]` entries or
//! in the legacy nested shape (`fx.usd_jpy.direction`, `credit.spreads.
//! direction`, ...). [`promote_legacy_levers`] folds the nested shape onto
//! canonical entries with heuristic materiality.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

// ======================================================================
// lever promotion
// ======================================================================

/// `fx.usd_broad` style legacy keys onto canonical lever names.
const LEGACY_LEVER_MAP: &[(&str, &str, &str)] = &[
    ("fx", "usd_broad", "dollar"),
    ("fx", "usd_jpy", "yen"),
    ("rates", "real_yields", "real_yields"),
    ("credit", "spreads", "credit_spreads"),
    ("commodities", "gold", "gold"),
    ("commodities", "oil", "oil"),
];

fn heuristic_materiality(direction: &str) -> f64 {
    match direction {
        "shock" | "widening" => 85.0,
        "up" | "down" | "into" | "out_of" | "risk_on" | "risk_off" | "tightening" | "easing" => {
            70.0
        }
        _ => 50.0,
    }
}

fn leaf_direction(leaf: &Value) -> Option<String> {
    match leaf {
        Value::String(s) => Some(s.clone()),
        Value::Object(_) => leaf["direction"].as_str().map(str::to_string),
        _ => None,
    }
}

fn canonical_lever(name: &str, direction: &str) -> Value {
    json!({
        "lever": name,
        "direction": direction,
        "materiality": heuristic_materiality(direction),
    })
}

/// Normalize an `active_levers` value to canonical entries.
///
/// An array passes through (entries without a string `lever` are dropped).
/// A nested legacy object is promoted group by group; sector flow keys
/// become `sector_flows/<sector>` levers, unmapped keys keep a dotted
/// `<group>.<key>` name so nothing is silently lost.
pub fn promote_legacy_levers(levers: &Value) -> Vec<Value> {
    match levers {
        Value::Array(entries) => entries
            .iter()
            .filter(|e| e["lever"].is_string())
            .cloned()
            .collect(),
        Value::Object(groups) => {
            let mut out = Vec::new();
            for (group, leaves) in groups {
                let Some(leaves) = leaves.as_object() else {
                    continue;
                };
                for (key, leaf) in leaves {
                    let Some(direction) = leaf_direction(leaf) else {
                        continue;
                    };
                    let name = LEGACY_LEVER_MAP
                        .iter()
                        .find(|(g, k, _)| g == group && k == key)
                        .map(|(_, _, canonical)| canonical.to_string())
                        .unwrap_or_else(|| {
                            if group == "sector_flows" {
                                format!("sector_flows/{key}")
                            } else {
                                format!("{group}.{key}")
                            }
                        });
                    out.push(canonical_lever(&name, &direction));
                }
            }
            out
        }
        _ => Vec::new(),
    }
}

// ======================================================================
// derived helicopter view
// ======================================================================

fn materiality_or(lever: Option<&Value>, default: f64) -> f64 {
    lever
        .and_then(|l| l["materiality"].as_f64())
        .unwrap_or(default)
}

fn cascade(rule_id: &str, summary: &str, scope: &str, effect: &str, confidence: f64) -> Value {
    json!({
        "rule_id": rule_id,
        "summary": summary,
        "affected_scope": scope,
        "effect_direction": effect,
        "confidence": confidence,
        "target_refs": [],
    })
}

fn set_posture(posture: &mut Map<String, Value>, sector: &str, value: &str) {
    posture
        .entry(sector.to_string())
        .or_insert_with(|| json!(value));
}

/// Fold a macro regime payload and a lever snapshot into the derived view:
/// `{regime_summary, active_levers, cascade_implications, sector_posture,
/// conviction_filter}`.
///
/// Explicit snapshot posture wins over lever flow hints, which win over
/// rule defaults. Cascades are only derived when the snapshot carries none
/// of its own.
pub fn derive_top_down_implications(macro_regime: &Value, top_down_snapshot: &Value) -> Value {
    let regime_name = macro_regime["summary"]
        .as_str()
        .or_else(|| macro_regime["regime_name"].as_str())
        .or_else(|| macro_regime["regime_state"].as_str())
        .unwrap_or("unknown");
    let regime_confidence = macro_regime["regime_confidence"]
        .as_f64()
        .or_else(|| macro_regime["regime_multipliers"]["regime_confidence"].as_f64())
        .unwrap_or(0.0);
    let regime_state = macro_regime["regime_state"].as_str().unwrap_or("unknown");

    let active_levers = promote_legacy_levers(&top_down_snapshot["active_levers"]);
    let input_cascades: Vec<Value> = top_down_snapshot["cascade_implications"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    let conviction_state = &top_down_snapshot["conviction_state"];

    let mut posture: Map<String, Value> = Map::new();

    // explicit snapshot posture rows first
    if let Some(rows) = top_down_snapshot["sector_posture"].as_array() {
        for row in rows {
            if let (Some(sector_ref), Some(p)) = (row["sector_ref"].as_str(), row["posture"].as_str())
            {
                if let Some(short) = sector_ref.strip_prefix("sector/") {
                    set_posture(&mut posture, short, p);
                }
            }
        }
    }

    let lever_map: HashMap<&str, &Value> = active_levers
        .iter()
        .filter_map(|l| l["lever"].as_str().map(|name| (name, l)))
        .collect();
    let has = |name: &str, direction: &str| -> bool {
        lever_map
            .get(name)
            .map_or(false, |l| l["direction"] == direction)
    };

    // sector flow levers carry posture hints
    for (name, lever) in &lever_map {
        if let Some(sector) = name.strip_prefix("sector_flows/") {
            match lever["direction"].as_str() {
                Some("into") => set_posture(&mut posture, sector, "green"),
                Some("out_of") => set_posture(&mut posture, sector, "red"),
                _ => {}
            }
        }
    }

    let yen_strong = has("yen", "up") || has("yen", "risk_off");
    let credit_widening =
        has("credit_spreads", "widening") || has("credit_spreads", "up") || has("credit_spreads", "risk_off");
    let real_yields_up = has("real_yields", "up") || has("real_yields", "tightening");
    // a falling yen reads as broad dollar strength
    let dollar_up = has("dollar", "up") || has("yen", "down");

    let mut cascades = input_cascades.clone();
    if input_cascades.is_empty() {
        if has("dollar", "up") {
            cascades.push(cascade(
                "stronger_usd",
                "Dollar strength is a broad headwind for risk assets and foreign earnings translation.",
                "cross_asset",
                "headwind",
                materiality_or(lever_map.get("dollar").copied(), 70.0),
            ));
        }
        if yen_strong {
            cascades.push(cascade(
                "yen_strength",
                "Yen strength signals carry unwind and risk-off positioning.",
                "macro",
                "de_risk",
                materiality_or(lever_map.get("yen").copied(), 85.0),
            ));
            set_posture(&mut posture, "defensives", "green");
            set_posture(&mut posture, "high_beta", "red");
        }
        if has("gold", "up") {
            cascades.push(cascade(
                "gold_rising",
                "Gold strength suggests defensive demand or fading confidence in risk assets.",
                "cross_asset",
                "uncertain",
                materiality_or(lever_map.get("gold").copied(), 68.0),
            ));
        }
        if credit_widening {
            cascades.push(cascade(
                "credit_spreads_widening",
                "Widening credit spreads raise stress for cyclicals and high-debt names.",
                "sector",
                "headwind",
                materiality_or(lever_map.get("credit_spreads").copied(), 88.0),
            ));
            set_posture(&mut posture, "high_debt", "red");
        }
        if real_yields_up {
            cascades.push(cascade(
                "real_yields_up",
                "Rising real yields pressure long-duration growth valuations.",
                "sector",
                "headwind",
                materiality_or(lever_map.get("real_yields").copied(), 78.0),
            ));
            set_posture(&mut posture, "long_duration_growth", "red");
        }
        if has("oil", "up") {
            cascades.push(cascade(
                "oil_rising",
                "Oil strength supports energy and pressures input-cost sensitive sectors.",
                "sector",
                "tailwind",
                materiality_or(lever_map.get("oil").copied(), 72.0),
            ));
            set_posture(&mut posture, "energy", "green");
        }
    }

    if has("sector_rotation", "risk_off") {
        set_posture(&mut posture, "defensives", "green");
        set_posture(&mut posture, "cyclicals", "red");
    }
    if has("ai_leadership", "down") {
        set_posture(&mut posture, "ai_infrastructure", "red");
    } else if has("ai_leadership", "up") {
        set_posture(&mut posture, "ai_infrastructure", "green");
    }

    let mut contradictions = 0u64;
    if dollar_up && has("gold", "up") {
        contradictions += 1;
    }
    if real_yields_up && has("ai_leadership", "up") {
        contradictions += 1;
    }
    if credit_widening && has("ai_leadership", "up") {
        contradictions += 1;
    }
    if has("yen", "risk_off") && has("oil", "up") {
        contradictions += 1;
    }
    if regime_state == "risk_off" {
        if posture.get("cyclicals") == Some(&json!("green")) {
            contradictions += 1;
        }
        if posture.get("long_duration_growth") == Some(&json!("green")) {
            contradictions += 1;
        }
        let defensives_ok = matches!(
            posture.get("defensives").and_then(Value::as_str),
            Some("green") | Some("amber")
        );
        if credit_widening && !defensives_ok {
            contradictions += 1;
        }
    }

    let signal_coherence = conviction_state["signal_coherence"].as_f64().unwrap_or(
        match contradictions {
            0 => 80.0,
            1 => 55.0,
            _ => 25.0,
        },
    );
    let uncertainty_score = conviction_state["uncertainty_score"].as_f64().unwrap_or(
        match contradictions {
            0 => 25.0,
            1 => 50.0,
            _ => 80.0,
        },
    );
    let coherence_label = match contradictions {
        0 => "high",
        1 => "medium",
        _ => "low",
    };

    json!({
        "regime_summary": {
            "regime_name": regime_name,
            "regime_confidence": regime_confidence,
        },
        "active_levers": active_levers,
        "cascade_implications": cascades,
        "sector_posture": posture,
        "conviction_filter": {
            "macro_signal_coherence": coherence_label,
            "contradiction_count": contradictions,
            "signal_coherence": signal_coherence,
            "uncertainty_score": uncertainty_score,
        },
    })
}

// ======================================================================
// lever-only cascade table
// ======================================================================

/// Hard-coded lever-only rule table, used to pre-seed a snapshot's
/// `cascade_implications` when it is saved without any.
pub fn evaluate_macro_cascade_rules(levers: &[Value]) -> Vec<Value> {
    let lever_map: HashMap<&str, &Value> = levers
        .iter()
        .filter_map(|l| l["lever"].as_str().map(|name| (name, l)))
        .collect();
    let has = |name: &str, direction: &str| -> bool {
        lever_map
            .get(name)
            .map_or(false, |l| l["direction"] == direction)
    };

    let mut out = Vec::new();
    if has("yen", "up") || has("yen", "risk_off") {
        out.push(cascade(
            "yen_carry_unwind",
            "Yen strength implies carry unwind pressure on leveraged risk positions.",
            "macro",
            "de_risk",
            materiality_or(lever_map.get("yen").copied(), 85.0),
        ));
    }
    if has("dollar", "up") {
        out.push(cascade(
            "dollar_headwind",
            "Broad dollar strength is a headwind for non-US earners and risk appetite.",
            "cross_asset",
            "headwind",
            materiality_or(lever_map.get("dollar").copied(), 70.0),
        ));
    }
    if has("credit_spreads", "widening") || has("credit_spreads", "up") {
        out.push(cascade(
            "credit_stress",
            "Spread widening raises funding stress for levered balance sheets.",
            "sector",
            "headwind",
            materiality_or(lever_map.get("credit_spreads").copied(), 88.0),
        ));
    }
    if has("oil", "up") {
        out.push(cascade(
            "oil_rotation",
            "Oil strength rotates flows toward energy and away from fuel consumers.",
            "sector",
            "tailwind",
            materiality_or(lever_map.get("oil").copied(), 72.0),
        ));
    }
    if has("gold", "up") {
        out.push(cascade(
            "gold_defensive",
            "Gold bid points at defensive demand and fading conviction in risk.",
            "cross_asset",
            "de_risk",
            materiality_or(lever_map.get("gold").copied(), 68.0),
        ));
    }
    if has("sector_rotation", "risk_off") {
        out.push(cascade(
            "sector_rotation_risk_off",
            "Explicit risk-off rotation favors defensives over cyclicals.",
            "sector",
            "rotate_defensive",
            materiality_or(lever_map.get("sector_rotation").copied(), 75.0),
        ));
    }
    out
}
