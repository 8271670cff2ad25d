//! Integrated intelligence runtime.
//!
//! Composes the stores into the core loop:
//! ```text
//! company -> assessment -> sqi signals -> thesis -> kg edges
//! ```
//! plus the extended macro path:
//! ```text
//! macro_regime + top_down_snapshot -> rules engine -> helicopter view
//! ```
//!
//! All stores share one base directory, so a runtime instance is the single
//! entry point for a complete intelligence workspace on disk.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::error::Result;
use crate::logging::log_bootstrap_step;
use crate::sqi::build_sqi_signal_inputs;
use crate::store::assessment::{AssessmentStore, SaveAssessmentParams};
use crate::store::catalyst_event::CatalystEventStore;
use crate::store::company::{CompanyParams, CompanyStore};
use crate::store::country_ambassador::CountryAmbassadorStore;
use crate::store::country_relationship::CountryRelationshipStore;
use crate::store::credit_trajectory::CreditTrajectoryStore;
use crate::store::global_capital_markets::GlobalCapitalMarketsStore;
use crate::store::kg_edge::{KgEdgeStore, SaveKgEdgeParams};
use crate::store::macro_regime::MacroRegimeStore;
use crate::store::observer_cycle::ObserverCycleStore;
use crate::store::quarter_event::QuarterEventStore;
use crate::store::sector_template::SectorTemplateStore;
use crate::store::structural_profile::StructuralProfileStore;
use crate::store::thesis::{SaveThesisParams, ThesisStore};
use crate::store::top_down_levers::TopDownLeversStore;
use crate::top_down::derive_top_down_implications;

// ======================================================================
// bootstrap parameters
// ======================================================================

#[derive(Debug, Clone)]
pub struct BootstrapParams {
    pub ticker: String,
    pub name: String,
    pub exchange: String,
    pub currency: String,
    pub sector_name: String,
    pub as_of: String,
    pub industry: String,
    pub country: String,
    pub company_status: String,
    pub acs_band: String,
    pub sector_confidence_tier: String,
    pub generated_by: String,
    pub company_payload_patch: Option<Value>,
    pub assessment_payload_patch: Option<Value>,
    pub thesis_mode: String,
    pub thesis_window: String,
    pub thesis_status: String,
    pub assessment_refs: Vec<String>,
    pub create_write_events: bool,
    pub validate: bool,
    /// With both ids set, the bootstrap builds a helicopter view and feeds
    /// its derived posture into the SQI context and two extra edges.
    pub macro_regime_id: Option<String>,
    pub top_down_snapshot_id: Option<String>,
}

impl BootstrapParams {
    pub fn new(
        ticker: &str,
        name: &str,
        exchange: &str,
        currency: &str,
        sector_name: &str,
        as_of: &str,
    ) -> Self {
        Self {
            ticker: ticker.to_string(),
            name: name.to_string(),
            exchange: exchange.to_string(),
            currency: currency.to_string(),
            sector_name: sector_name.to_string(),
            as_of: as_of.to_string(),
            industry: String::new(),
            country: String::new(),
            company_status: "active".into(),
            acs_band: "unknown".into(),
            sector_confidence_tier: "tier_2".into(),
            generated_by: "aion_equities.intelligence_runtime".into(),
            company_payload_patch: None,
            assessment_payload_patch: None,
            thesis_mode: "long".into(),
            thesis_window: "bootstrap".into(),
            thesis_status: "candidate".into(),
            assessment_refs: Vec::new(),
            create_write_events: true,
            validate: true,
            macro_regime_id: None,
            top_down_snapshot_id: None,
        }
    }
}

// ======================================================================
// runtime
// ======================================================================

pub struct IntelligenceRuntime {
    pub base_dir: PathBuf,
    pub company_store: CompanyStore,
    pub assessment_store: AssessmentStore,
    pub thesis_store: ThesisStore,
    pub kg_edge_store: KgEdgeStore,
    pub quarter_event_store: QuarterEventStore,
    pub catalyst_event_store: CatalystEventStore,
    pub observer_cycle_store: ObserverCycleStore,
    pub macro_regime_store: MacroRegimeStore,
    pub top_down_levers_store: TopDownLeversStore,
    pub structural_profile_store: StructuralProfileStore,
    pub credit_trajectory_store: CreditTrajectoryStore,
    pub global_capital_markets_store: GlobalCapitalMarketsStore,
    pub country_ambassador_store: CountryAmbassadorStore,
    pub country_relationship_store: CountryRelationshipStore,
    pub sector_template_store: SectorTemplateStore,
}

impl IntelligenceRuntime {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            company_store: CompanyStore::new(base_dir),
            assessment_store: AssessmentStore::new(base_dir),
            thesis_store: ThesisStore::new(base_dir),
            kg_edge_store: KgEdgeStore::new(base_dir),
            quarter_event_store: QuarterEventStore::new(base_dir),
            catalyst_event_store: CatalystEventStore::new(base_dir),
            observer_cycle_store: ObserverCycleStore::new(base_dir),
            macro_regime_store: MacroRegimeStore::new(base_dir),
            top_down_levers_store: TopDownLeversStore::new(base_dir),
            structural_profile_store: StructuralProfileStore::new(base_dir),
            credit_trajectory_store: CreditTrajectoryStore::new(base_dir),
            global_capital_markets_store: GlobalCapitalMarketsStore::new(base_dir),
            country_ambassador_store: CountryAmbassadorStore::new(base_dir),
            country_relationship_store: CountryRelationshipStore::new(base_dir),
            sector_template_store: SectorTemplateStore::new(base_dir),
        }
    }

    /// Load a stored macro regime and lever snapshot and run the cascade
    /// rules over them.
    pub fn build_daily_helicopter_view(
        &self,
        macro_regime_id: &str,
        top_down_snapshot_id: &str,
    ) -> Result<Value> {
        let macro_regime = self
            .macro_regime_store
            .load_macro_regime_by_id(macro_regime_id, true)?;
        let top_down_snapshot = self
            .top_down_levers_store
            .load_snapshot_by_id(top_down_snapshot_id, true)?;

        let derived = derive_top_down_implications(&macro_regime, &top_down_snapshot);

        Ok(json!({
            "macro_regime": macro_regime,
            "top_down_snapshot": top_down_snapshot,
            "derived": derived,
        }))
    }

    /// Stand up the full intelligence state for one company in a single
    /// call: company record, first assessment, SQI signal inputs, bootstrap
    /// thesis, and the KG edges linking them. With a macro overlay the
    /// derived view also shifts the SQI context and adds two macro edges.
    pub fn bootstrap_company_intelligence(&self, params: &BootstrapParams) -> Result<Value> {
        let helicopter_view = match (&params.macro_regime_id, &params.top_down_snapshot_id) {
            (Some(regime_id), Some(snapshot_id)) => {
                let view = self.build_daily_helicopter_view(regime_id, snapshot_id)?;
                log_bootstrap_step(&params.ticker, "helicopter_view");
                Some(view)
            }
            _ => None,
        };

        let mut company = CompanyParams::new(
            &params.ticker,
            &params.name,
            &params.exchange,
            &params.currency,
        );
        company.sector_name = Some(params.sector_name.clone());
        company.status = params.company_status.clone();
        company.industry = non_empty(&params.industry);
        company.country = non_empty(&params.country);
        company.acs_band = params.acs_band.clone();
        company.sector_confidence_tier = params.sector_confidence_tier.clone();
        company.generated_by = params.generated_by.clone();
        company.company_payload_patch = params.company_payload_patch.clone();
        company.create_write_event = params.create_write_events;
        company.validate = params.validate;
        let company_payload = self.company_store.upsert_company(&company)?;
        let company_id = string_field(&company_payload, "company_id");
        log_bootstrap_step(&params.ticker, "company_upserted");

        let mut assessment = SaveAssessmentParams::new(&company_id, "company", &params.as_of);
        assessment.generated_by = params.generated_by.clone();
        assessment.assessment_payload_patch = params.assessment_payload_patch.clone();
        assessment.create_write_event = params.create_write_events;
        assessment.validate = params.validate;
        let assessment_payload = self.assessment_store.save_assessment(&assessment)?;
        let assessment_id = string_field(&assessment_payload, "assessment_id");
        log_bootstrap_step(&params.ticker, "assessment_saved");

        let context = self.sqi_context(&helicopter_view, &company_payload);
        let sqi_signals = build_sqi_signal_inputs(&assessment_payload, None, Some(&context));
        log_bootstrap_step(&params.ticker, "sqi_mapped");

        let mut linked_assessment_refs = params.assessment_refs.clone();
        if !linked_assessment_refs.contains(&assessment_id) {
            linked_assessment_refs.push(assessment_id.clone());
        }

        let mut thesis = SaveThesisParams::new(
            &params.ticker,
            &params.thesis_mode,
            &params.thesis_window,
            &params.as_of,
        );
        thesis.assessment_refs = linked_assessment_refs;
        thesis.status = params.thesis_status.clone();
        thesis.generated_by = params.generated_by.clone();
        thesis.create_write_event = params.create_write_events;
        thesis.validate = params.validate;
        let thesis_payload = self.thesis_store.save_thesis_state(&thesis)?;
        let thesis_id = string_field(&thesis_payload, "thesis_id");
        log_bootstrap_step(&params.ticker, "thesis_saved");

        let company_payload =
            self.link_intelligence_state(params, &company_payload, &assessment_id, &thesis_id)?;
        log_bootstrap_step(&params.ticker, "intelligence_state_linked");

        let sector_ref = string_field(&company_payload, "sector_ref");
        let mut edges = vec![
            self.save_bootstrap_edge(
                params,
                &assessment_id,
                &company_id,
                &sector_ref,
                "exposure",
                85.0,
                "company sector classification",
            )?,
            self.save_bootstrap_edge(
                params,
                &assessment_id,
                &company_id,
                &thesis_id,
                "supports_thesis",
                70.0,
                "bootstrap thesis linked to company",
            )?,
            self.save_bootstrap_edge(
                params,
                &assessment_id,
                &assessment_id,
                &thesis_id,
                "evidence_source",
                90.0,
                "assessment used as thesis evidence",
            )?,
        ];

        if let Some(view) = &helicopter_view {
            let macro_regime_id = string_field(&view["macro_regime"], "macro_regime_id");
            let snapshot_id = string_field(&view["top_down_snapshot"], "snapshot_id");
            edges.push(self.save_bootstrap_edge(
                params,
                &assessment_id,
                &macro_regime_id,
                &company_id,
                "confidence_modifier",
                75.0,
                "macro regime applied as company-level confidence modifier",
            )?);
            edges.push(self.save_bootstrap_edge(
                params,
                &assessment_id,
                &snapshot_id,
                &thesis_id,
                "drift_signal",
                65.0,
                "top-down lever snapshot informs thesis drift/context",
            )?);
        }
        log_bootstrap_step(&params.ticker, "edges_linked");

        Ok(json!({
            "company": company_payload,
            "assessment": assessment_payload,
            "sqi_signals": sqi_signals,
            "thesis": thesis_payload,
            "edges": edges,
            "helicopter_view": helicopter_view,
        }))
    }

    /// Latest stored state for one `(ticker, mode, window)` line of work.
    /// The assessment rides along via the company's `latest_assessment_ref`
    /// and is null until one has been linked.
    pub fn load_company_intelligence_snapshot(
        &self,
        ticker: &str,
        mode: &str,
        window: &str,
    ) -> Result<Value> {
        let company = self.company_store.load_company(ticker, true)?;
        let thesis = self
            .thesis_store
            .load_latest_thesis_state_by_parts(ticker, mode, window)?;

        let latest_assessment_ref =
            string_field(&company["intelligence_state"], "latest_assessment_ref");
        let assessment = if latest_assessment_ref.is_empty() {
            Value::Null
        } else {
            self.assessment_store
                .load_assessment_by_id(&latest_assessment_ref)?
        };

        Ok(json!({
            "company": company,
            "assessment": assessment,
            "thesis": thesis,
        }))
    }

    /// KG/pattern/observer context for the SQI mapping. Starts neutral and
    /// shifts with the helicopter view: macro coherence moves the KG
    /// confidence modifier, contradictions feed the contradiction count, and
    /// two sector posture reads nudge pattern support and observer bias.
    fn sqi_context(&self, helicopter_view: &Option<Value>, company_payload: &Value) -> Value {
        let mut kg_context = json!({
            "supports_count": 0,
            "contradicts_count": 0,
            "drift_score": 0.0,
            "confidence_modifier": 0.0,
            "pattern_match_score": 0.0,
        });
        let mut pattern_context = json!({
            "aggregate_score": 0.0,
            "stability_modifier": 0.0,
        });
        let mut observer_context = json!({ "bias_penalty": 0.0 });

        if let Some(view) = helicopter_view {
            let derived = &view["derived"];
            let conviction = derived["conviction_filter"]["macro_signal_coherence"]
                .as_str()
                .unwrap_or("medium");
            let contradiction_count = derived["conviction_filter"]["contradiction_count"]
                .as_f64()
                .unwrap_or(0.0);
            let sector_posture = &derived["sector_posture"];

            match conviction {
                "high" => kg_context["confidence_modifier"] = json!(0.10),
                "low" => kg_context["confidence_modifier"] = json!(-0.10),
                _ => {}
            }
            kg_context["contradicts_count"] = json!(contradiction_count);

            let company_sector = company_payload["sector_ref"].as_str().unwrap_or_default();
            if company_sector.ends_with("energy") && sector_posture["energy"] == "green" {
                pattern_context["aggregate_score"] = json!(0.15);
            }
            if company_sector.ends_with("industrial_equipment_rental")
                && sector_posture["cyclicals"] == "red"
            {
                observer_context["bias_penalty"] = json!(0.05);
            }
        }

        json!({
            "kg": kg_context,
            "pattern": pattern_context,
            "observer": observer_context,
        })
    }

    /// Re-upsert the company with assessment and thesis refs folded into
    /// `intelligence_state`. Existing refs survive; thesis refs are a sorted
    /// set union.
    fn link_intelligence_state(
        &self,
        params: &BootstrapParams,
        company_payload: &Value,
        assessment_id: &str,
        thesis_id: &str,
    ) -> Result<Value> {
        let prior_state = &company_payload["intelligence_state"];
        let mut active_thesis_refs: Vec<String> = prior_state["active_thesis_refs"]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        if !active_thesis_refs.iter().any(|r| r == thesis_id) {
            active_thesis_refs.push(thesis_id.to_string());
        }
        active_thesis_refs.sort();

        let profile = &company_payload["predictability_profile"];
        let mut relink = CompanyParams::new(
            &params.ticker,
            company_payload["name"].as_str().unwrap_or_default(),
            company_payload["exchange"].as_str().unwrap_or_default(),
            company_payload["currency"].as_str().unwrap_or_default(),
        );
        relink.sector_ref = Some(string_field(company_payload, "sector_ref"));
        relink.industry = company_payload["industry"].as_str().map(str::to_string);
        relink.country = company_payload["country"].as_str().map(str::to_string);
        relink.status = string_field(company_payload, "status");
        relink.acs_band = string_field(profile, "acs_band");
        relink.sector_confidence_tier = string_field(profile, "sector_confidence_tier");
        relink.generated_by = params.generated_by.clone();
        relink.create_write_event = params.create_write_events;
        relink.validate = params.validate;
        relink.company_payload_patch = Some(json!({
            "intelligence_state": {
                "latest_assessment_ref": assessment_id,
                "active_thesis_refs": active_thesis_refs,
                "quarter_event_refs": array_or_empty(&prior_state["quarter_event_refs"]),
                "catalyst_event_refs": array_or_empty(&prior_state["catalyst_event_refs"]),
                "pattern_refs": array_or_empty(&prior_state["pattern_refs"]),
            }
        }));
        self.company_store.upsert_company(&relink)
    }

    fn save_bootstrap_edge(
        &self,
        params: &BootstrapParams,
        assessment_id: &str,
        src: &str,
        dst: &str,
        link_type: &str,
        confidence: f64,
        relation_note: &str,
    ) -> Result<Value> {
        let mut edge = SaveKgEdgeParams::new(src, dst, link_type, &params.as_of, confidence);
        edge.active = true;
        edge.source_event_ids = vec![assessment_id.to_string()];
        edge.edge_payload_patch = Some(json!({
            "payload": { "relation_note": relation_note }
        }));
        edge.generated_by = params.generated_by.clone();
        edge.create_write_event = params.create_write_events;
        edge.validate = params.validate;
        self.kg_edge_store.save_edge(&edge)
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn string_field(payload: &Value, key: &str) -> String {
    payload[key].as_str().unwrap_or_default().to_string()
}

fn array_or_empty(value: &Value) -> Value {
    if value.is_array() {
        value.clone()
    } else {
        json!([])
    }
}

// ======================================================================
// Tests
// ======================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_bootstrap_params_defaults() {
        let params = BootstrapParams::new("AHT.L", "Ashtead Group", "LSE", "GBP", "Industrial Equipment Rental", "2026-02-22");
        assert_eq!(params.company_status, "active");
        assert_eq!(params.thesis_mode, "long");
        assert_eq!(params.thesis_window, "bootstrap");
        assert_eq!(params.thesis_status, "candidate");
        assert_eq!(params.sector_confidence_tier, "tier_2");
        assert!(params.create_write_events);
        assert!(params.validate);
        assert!(params.macro_regime_id.is_none());
    }

    #[test]
    fn test_helicopter_view_requires_stored_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = IntelligenceRuntime::new(dir.path());
        let err = runtime
            .build_daily_helicopter_view("macro/regime/2026-02-22", "top_down/2026-02-22T08:00:00Z")
            .unwrap_err();
        assert!(matches!(err, Error::EntityNotFound(_)));
    }

    #[test]
    fn test_snapshot_requires_company() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = IntelligenceRuntime::new(dir.path());
        let err = runtime
            .load_company_intelligence_snapshot("AHT.L", "long", "bootstrap")
            .unwrap_err();
        assert!(matches!(err, Error::EntityNotFound(_)));
    }
}
