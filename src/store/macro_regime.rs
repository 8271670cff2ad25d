//! Macro regime store.
//!
//! One snapshot per calendar day, keyed by date:
//! ```text
//! macro_regime/2026-02-22.json
//! ```
//!
//! The regime id is `macro/regime/<date>`, so loading by id is loading by
//! the last path segment.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::constants::PAYLOAD_VERSION;
use crate::error::{Error, Result};
use crate::logging::log_store_write;
use crate::merge::deep_merge;
use crate::schema_validate::validate_current;
use crate::store::{list_json_stems, read_entity_json, safe_segment, write_json_atomic};
use crate::timefmt;

/// Fold legacy regime state labels onto the schema's enum. Unknown labels
/// pass through lowercased so the validator reports them, not this fn.
pub fn normalize_regime_state(value: &str) -> String {
    let v = value.trim().to_lowercase();
    if v.is_empty() {
        return "transition".into();
    }
    match v.as_str() {
        "transitioning" => "transition".into(),
        "active" => "risk_off".into(),
        _ => v,
    }
}

#[derive(Debug, Clone)]
pub struct MacroRegimeParams {
    pub as_of_date: String,
    pub regime_state: String,
    pub summary: String,
    /// Overrides `summary` when set.
    pub regime_name: Option<String>,
    /// Lands in `regime_multipliers.regime_confidence`.
    pub regime_confidence: Option<f64>,
    pub generated_by: String,
    pub signals_patch: Option<Value>,
    pub sector_flows_patch: Option<Value>,
    pub market_style_patch: Option<Value>,
    pub regime_multipliers_patch: Option<Value>,
    pub linked_refs_patch: Option<Value>,
    pub risk_flags: Vec<String>,
    pub payload_patch: Option<Value>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub validate: bool,
}

impl MacroRegimeParams {
    pub fn new(as_of_date: &str) -> Self {
        Self {
            as_of_date: as_of_date.to_string(),
            regime_state: "transition".into(),
            summary: "Macro regime snapshot".into(),
            regime_name: None,
            regime_confidence: None,
            generated_by: "aion_equities.macro_regime_store".into(),
            signals_patch: None,
            sector_flows_patch: None,
            market_style_patch: None,
            regime_multipliers_patch: None,
            linked_refs_patch: None,
            risk_flags: Vec::new(),
            payload_patch: None,
            created_at: None,
            updated_at: None,
            validate: true,
        }
    }
}

pub fn build_macro_regime_payload(params: &MacroRegimeParams, validate: bool) -> Result<Value> {
    let as_of_date = timefmt::date_str(&params.as_of_date)?;
    let created_at = timefmt::iso_z_or_now(params.created_at.as_deref())?;
    let updated_at = match &params.updated_at {
        Some(v) => timefmt::iso_z(v)?,
        None => created_at.clone(),
    };
    let summary = params.regime_name.as_deref().unwrap_or(&params.summary);

    let mut payload = json!({
        "macro_regime_id": format!("macro/regime/{as_of_date}"),
        "as_of_date": as_of_date,
        "regime_state": normalize_regime_state(&params.regime_state),
        "summary": summary,
        "version": PAYLOAD_VERSION,
        "signals": {
            "usd_direction": "unknown",
            "usd_jpy_signal": "unknown",
            "rates_direction": "unknown",
            "real_yields_direction": "unknown",
            "gold_direction": "unknown",
            "credit_spread_regime": "unknown",
        },
        "sector_flows": {
            "leaders": [],
            "laggards": [],
        },
        "market_style": {
            "mag7_state": "unknown",
            "breadth_state": "unknown",
            "ai_trade_state": "unknown",
        },
        "risk_flags": params.risk_flags,
        "audit": {
            "created_at": created_at,
            "updated_at": updated_at,
            "created_by": params.generated_by,
        },
    });

    if let Some(patch) = &params.signals_patch {
        payload["signals"] = deep_merge(&payload["signals"], patch);
    }
    if let Some(patch) = &params.sector_flows_patch {
        payload["sector_flows"] = deep_merge(&payload["sector_flows"], patch);
    }
    if let Some(patch) = &params.market_style_patch {
        payload["market_style"] = deep_merge(&payload["market_style"], patch);
    }
    if let Some(patch) = &params.regime_multipliers_patch {
        payload["regime_multipliers"] = patch.clone();
    }
    if let Some(patch) = &params.linked_refs_patch {
        payload["linked_refs"] = patch.clone();
    }

    let mut effective_patch = params.payload_patch.clone().unwrap_or_else(|| json!({}));
    if let Some(confidence) = params.regime_confidence {
        if !effective_patch.is_object() {
            effective_patch = json!({});
        }
        if !effective_patch["regime_multipliers"].is_object() {
            effective_patch["regime_multipliers"] = json!({});
        }
        effective_patch["regime_multipliers"]["regime_confidence"] = json!(confidence);
    }
    if effective_patch.as_object().map_or(false, |m| !m.is_empty()) {
        payload = deep_merge(&payload, &effective_patch);
    }

    if validate {
        validate_current("macro_regime", &payload)?;
    }
    Ok(payload)
}

pub struct MacroRegimeStore {
    regimes_dir: PathBuf,
}

impl MacroRegimeStore {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            regimes_dir: base_dir.join("macro_regime"),
        }
    }

    pub fn storage_path(&self, as_of_date: &str) -> Result<PathBuf> {
        let ds = timefmt::date_str(as_of_date)?;
        Ok(self.regimes_dir.join(format!("{}.json", safe_segment(&ds))))
    }

    pub fn save_macro_regime(&self, params: &MacroRegimeParams) -> Result<Value> {
        let payload = build_macro_regime_payload(params, params.validate)?;
        let as_of_date = payload["as_of_date"].as_str().unwrap_or_default();
        let regime_id = payload["macro_regime_id"].as_str().unwrap_or_default();
        let path = self.storage_path(as_of_date)?;
        write_json_atomic(&path, &payload)?;
        log_store_write("macro_regime", regime_id, &path);
        Ok(payload)
    }

    pub fn load_macro_regime(&self, as_of_date: &str, validate: bool) -> Result<Value> {
        let path = self.storage_path(as_of_date)?;
        let payload = read_entity_json(&path, &format!("macro/regime/{as_of_date}"))?;
        if validate {
            validate_current("macro_regime", &payload)?;
        }
        Ok(payload)
    }

    pub fn load_macro_regime_by_id(&self, macro_regime_id: &str, validate: bool) -> Result<Value> {
        let as_of_date = macro_regime_date(macro_regime_id)?;
        self.load_macro_regime(&as_of_date, validate)
    }

    pub fn macro_regime_exists(&self, as_of_date: &str) -> bool {
        self.storage_path(as_of_date).map(|p| p.exists()).unwrap_or(false)
    }

    pub fn macro_regime_exists_by_id(&self, macro_regime_id: &str) -> bool {
        macro_regime_date(macro_regime_id)
            .map(|d| self.macro_regime_exists(&d))
            .unwrap_or(false)
    }

    pub fn list_macro_regimes(&self) -> Result<Vec<String>> {
        list_json_stems(&self.regimes_dir)
    }
}

/// `macro/regime/<date>` -> `<date>`.
fn macro_regime_date(macro_regime_id: &str) -> Result<String> {
    let parts: Vec<&str> = macro_regime_id.split('/').collect();
    if parts.len() < 3 {
        return Err(Error::InvalidId(format!(
            "invalid macro_regime_id: {macro_regime_id}"
        )));
    }
    Ok(parts[parts.len() - 1].to_string())
}
