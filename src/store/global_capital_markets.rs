//! Global capital markets store.
//!
//! One cross-market snapshot per date:
//! ```text
//! global_capital_markets/2026-02-22.json
//! ```
//!
//! Object blocks are patched by deep-merge; table blocks (yield curves,
//! real yields, credit spreads, differential matrix, foreign ownership)
//! replace wholesale when provided.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::constants::PAYLOAD_VERSION;
use crate::error::Result;
use crate::logging::log_store_write;
use crate::merge::deep_merge;
use crate::schema_validate::validate_current;
use crate::store::{list_json_stems, read_entity_json, safe_segment, write_json_atomic};
use crate::timefmt;

#[derive(Debug, Clone)]
pub struct GlobalCapitalMarketsParams {
    pub as_of_date: String,
    pub generated_by: String,
    pub liquidity_regime_patch: Option<Value>,
    pub dollar_funding_patch: Option<Value>,
    pub yield_curves: Option<Vec<Value>>,
    pub real_yields: Option<Vec<Value>>,
    pub credit_spreads: Option<Vec<Value>>,
    pub yield_differential_matrix: Option<Vec<Value>>,
    pub foreign_ownership_vulnerability: Option<Vec<Value>>,
    pub market_structure_patch: Option<Value>,
    pub cross_market_signals_patch: Option<Value>,
    pub linked_refs_patch: Option<Value>,
    pub payload_patch: Option<Value>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub validate: bool,
}

impl GlobalCapitalMarketsParams {
    pub fn new(as_of_date: &str) -> Self {
        Self {
            as_of_date: as_of_date.to_string(),
            generated_by: "aion_equities.global_capital_markets_store".into(),
            liquidity_regime_patch: None,
            dollar_funding_patch: None,
            yield_curves: None,
            real_yields: None,
            credit_spreads: None,
            yield_differential_matrix: None,
            foreign_ownership_vulnerability: None,
            market_structure_patch: None,
            cross_market_signals_patch: None,
            linked_refs_patch: None,
            payload_patch: None,
            created_at: None,
            updated_at: None,
            validate: true,
        }
    }
}

pub fn build_global_capital_markets_payload(
    params: &GlobalCapitalMarketsParams,
    validate: bool,
) -> Result<Value> {
    let as_of_date = timefmt::date_str(&params.as_of_date)?;
    let created_at = timefmt::iso_z_or_now(params.created_at.as_deref())?;
    let updated_at = match &params.updated_at {
        Some(v) => timefmt::iso_z(v)?,
        None => created_at.clone(),
    };

    let yield_curves = params.yield_curves.clone().unwrap_or_else(|| {
        vec![json!({
            "country_code": "US",
            "yield_2y": 0.0,
            "yield_10y": 0.0,
            "yield_30y": 0.0,
            "curve_regime": "unknown",
        })]
    });
    let real_yields = params.real_yields.clone().unwrap_or_else(|| {
        vec![json!({
            "country_code": "US",
            "real_yield_10y": 0.0,
            "real_yield_2y": 0.0,
            "real_rate_regime": "unknown",
        })]
    });
    let credit_spreads = params.credit_spreads.clone().unwrap_or_else(|| {
        vec![json!({
            "country_code": "US",
            "ig_oas_bps": 0.0,
            "hy_oas_bps": 0.0,
            "spread_regime": "unknown",
            "direction": "unknown",
        })]
    });

    let mut payload = json!({
        "global_capital_markets_id": format!("global_capital_markets/{as_of_date}"),
        "as_of_date": as_of_date,
        "version": PAYLOAD_VERSION,
        "liquidity_regime": {
            "state": "neutral",
            "confidence": 50.0,
            "summary": "Neutral global liquidity backdrop",
        },
        "dollar_funding": {
            "regime": "normal",
            "dxy_direction": "unknown",
            "cross_currency_basis_regime": "unknown",
            "notes": "",
        },
        "yield_curves": yield_curves,
        "real_yields": real_yields,
        "credit_spreads": credit_spreads,
        "yield_differential_matrix": params.yield_differential_matrix.clone().unwrap_or_default(),
        "foreign_ownership_vulnerability": params
            .foreign_ownership_vulnerability
            .clone()
            .unwrap_or_default(),
        "market_structure": {
            "vix_regime": "unknown",
            "gamma_regime": "unknown",
            "liquidity_depth_regime": "unknown",
            "algo_pressure_regime": "unknown",
            "notes": "",
        },
        "cross_market_signals": {
            "risk_appetite_regime": "unknown",
            "carry_regime": "unknown",
            "equity_bond_correlation_regime": "unknown",
            "stress_notes": [],
        },
        "linked_refs": {
            "macro_regime_refs": [],
            "top_down_snapshot_refs": [],
            "country_ambassador_refs": [],
            "country_relationship_refs": [],
        },
        "audit": {
            "created_at": created_at,
            "updated_at": updated_at,
            "created_by": params.generated_by,
        },
    });

    if let Some(patch) = &params.liquidity_regime_patch {
        payload["liquidity_regime"] = deep_merge(&payload["liquidity_regime"], patch);
    }
    if let Some(patch) = &params.dollar_funding_patch {
        payload["dollar_funding"] = deep_merge(&payload["dollar_funding"], patch);
    }
    if let Some(patch) = &params.market_structure_patch {
        payload["market_structure"] = deep_merge(&payload["market_structure"], patch);
    }
    if let Some(patch) = &params.cross_market_signals_patch {
        payload["cross_market_signals"] = deep_merge(&payload["cross_market_signals"], patch);
    }
    if let Some(patch) = &params.linked_refs_patch {
        payload["linked_refs"] = deep_merge(&payload["linked_refs"], patch);
    }
    if let Some(patch) = &params.payload_patch {
        payload = deep_merge(&payload, patch);
    }

    if validate {
        validate_current("global_capital_markets", &payload)?;
    }
    Ok(payload)
}

pub struct GlobalCapitalMarketsStore {
    markets_dir: PathBuf,
}

impl GlobalCapitalMarketsStore {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            markets_dir: base_dir.join("global_capital_markets"),
        }
    }

    pub fn storage_path(&self, as_of_date: &str) -> Result<PathBuf> {
        let ds = timefmt::date_str(as_of_date)?;
        Ok(self.markets_dir.join(format!("{}.json", safe_segment(&ds))))
    }

    pub fn save_global_capital_markets(
        &self,
        params: &GlobalCapitalMarketsParams,
    ) -> Result<Value> {
        let payload = build_global_capital_markets_payload(params, params.validate)?;
        let as_of_date = payload["as_of_date"].as_str().unwrap_or_default();
        let markets_id = payload["global_capital_markets_id"].as_str().unwrap_or_default();
        let path = self.storage_path(as_of_date)?;
        write_json_atomic(&path, &payload)?;
        log_store_write("global_capital_markets", markets_id, &path);
        Ok(payload)
    }

    pub fn load_global_capital_markets(&self, as_of_date: &str, validate: bool) -> Result<Value> {
        let path = self.storage_path(as_of_date)?;
        let entity_id = format!("global_capital_markets/{}", timefmt::date_str(as_of_date)?);
        let payload = read_entity_json(&path, &entity_id)?;
        if validate {
            validate_current("global_capital_markets", &payload)?;
        }
        Ok(payload)
    }

    pub fn global_capital_markets_exists(&self, as_of_date: &str) -> bool {
        self.storage_path(as_of_date)
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    pub fn list_global_capital_markets(&self) -> Result<Vec<String>> {
        list_json_stems(&self.markets_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_defaults_and_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = GlobalCapitalMarketsStore::new(dir.path());
        let payload = store
            .save_global_capital_markets(&GlobalCapitalMarketsParams::new("2026-02-22"))
            .unwrap();

        assert_eq!(payload["global_capital_markets_id"], "global_capital_markets/2026-02-22");
        assert_eq!(payload["liquidity_regime"]["state"], "neutral");
        assert_eq!(payload["yield_curves"][0]["country_code"], "US");
        assert_eq!(payload["yield_differential_matrix"].as_array().unwrap().len(), 0);
        assert!(store.global_capital_markets_exists("2026-02-22"));
    }

    #[test]
    fn test_table_blocks_replace_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let store = GlobalCapitalMarketsStore::new(dir.path());
        let mut params = GlobalCapitalMarketsParams::new("2026-02-22");
        params.yield_curves = Some(vec![
            json!({
                "country_code": "JP",
                "yield_2y": 0.4,
                "yield_10y": 1.5,
                "yield_30y": 2.3,
                "curve_regime": "steepening",
            }),
        ]);
        params.dollar_funding_patch = Some(json!({"dxy_direction": "up"}));
        let payload = store.save_global_capital_markets(&params).unwrap();

        let curves = payload["yield_curves"].as_array().unwrap();
        assert_eq!(curves.len(), 1);
        assert_eq!(curves[0]["country_code"], "JP");
        assert_eq!(payload["dollar_funding"]["dxy_direction"], "up");
        assert_eq!(payload["dollar_funding"]["regime"], "normal");
    }

    #[test]
    fn test_linked_refs_merge_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = GlobalCapitalMarketsStore::new(dir.path());
        let mut params = GlobalCapitalMarketsParams::new("2026-02-22T22:00:00Z");
        params.linked_refs_patch = Some(json!({
            "macro_regime_refs": ["macro/regime/2026-02-22"],
        }));
        let payload = store.save_global_capital_markets(&params).unwrap();

        assert_eq!(payload["as_of_date"], "2026-02-22");
        assert_eq!(payload["linked_refs"]["macro_regime_refs"][0], "macro/regime/2026-02-22");
        assert_eq!(
            payload["linked_refs"]["country_ambassador_refs"].as_array().unwrap().len(),
            0
        );
        assert_eq!(store.list_global_capital_markets().unwrap(), vec!["2026-02-22"]);
    }
}
