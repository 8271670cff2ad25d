//! Full pass over the embedded schema pack.
//!
//! Saves one record of every entity family into a single workspace with
//! validation enabled, so a schema that drifts away from its builder fails
//! here before it fails in a real workspace.

use aion_equities::runtime::IntelligenceRuntime;
use aion_equities::store::assessment::SaveAssessmentParams;
use aion_equities::store::catalyst_event::CatalystEventParams;
use aion_equities::store::company::CompanyParams;
use aion_equities::store::country_ambassador::CountryAmbassadorParams;
use aion_equities::store::country_relationship::CountryRelationshipParams;
use aion_equities::store::credit_trajectory::CreditTrajectoryParams;
use aion_equities::store::global_capital_markets::GlobalCapitalMarketsParams;
use aion_equities::store::kg_edge::SaveKgEdgeParams;
use aion_equities::store::macro_regime::MacroRegimeParams;
use aion_equities::store::observer_cycle::ObserverCycleParams;
use aion_equities::store::quarter_event::QuarterEventParams;
use aion_equities::store::sector_template::SectorTemplateParams;
use aion_equities::store::structural_profile::StructuralProfileParams;
use aion_equities::store::thesis::SaveThesisParams;
use aion_equities::store::top_down_levers::TopDownSnapshotParams;

const AS_OF: &str = "2026-02-22T22:00:00Z";
const DATE: &str = "2026-02-22";
const THESIS_ID: &str = "thesis/AHT.L/long/2026q2_pre_earnings";

#[test]
fn every_entity_family_round_trips_with_validation_on() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = IntelligenceRuntime::new(dir.path());

    // core loop entities
    let mut company = CompanyParams::new("AHT.L", "Ashtead Group plc", "LSE", "GBP");
    company.sector_name = Some("Industrial Equipment Rental".into());
    runtime.company_store.upsert_company(&company).unwrap();

    runtime
        .assessment_store
        .save_assessment(&SaveAssessmentParams::new("company/AHT.L", "company", AS_OF))
        .unwrap();

    runtime
        .thesis_store
        .save_thesis_state(&SaveThesisParams::new(
            "AHT.L",
            "long",
            "2026Q2_pre_earnings",
            AS_OF,
        ))
        .unwrap();

    runtime
        .kg_edge_store
        .save_edge(&SaveKgEdgeParams::new(
            "company/AHT.L",
            "sector/industrial_equipment_rental",
            "exposure",
            AS_OF,
            85.0,
        ))
        .unwrap();

    // company event satellites
    runtime
        .quarter_event_store
        .save_quarter_event(&QuarterEventParams::new("AHT.L", 2026, 1, "2026-03-01"))
        .unwrap();
    runtime
        .catalyst_event_store
        .save_catalyst_event(&CatalystEventParams::new(
            "AHT.L",
            "fy_results",
            "earnings",
            "2026-06-16",
        ))
        .unwrap();
    runtime
        .observer_cycle_store
        .save_cycle(&ObserverCycleParams::new(THESIS_ID, AS_OF, 72.0))
        .unwrap();

    // macro layer
    let regime = runtime
        .macro_regime_store
        .save_macro_regime(&MacroRegimeParams::new(DATE))
        .unwrap();
    let regime_id = regime["macro_regime_id"].as_str().unwrap();
    runtime
        .top_down_levers_store
        .save_snapshot(&TopDownSnapshotParams::new(AS_OF, regime_id, "transition"))
        .unwrap();
    runtime
        .global_capital_markets_store
        .save_global_capital_markets(&GlobalCapitalMarketsParams::new(DATE))
        .unwrap();

    // structural and credit satellites
    runtime
        .structural_profile_store
        .save_structural_profile(&StructuralProfileParams::new("company/AHT.L", DATE))
        .unwrap();
    runtime
        .credit_trajectory_store
        .save_credit_trajectory(&CreditTrajectoryParams::new("company/AHT.L", "company", DATE))
        .unwrap();

    // country and sector reference entities
    runtime
        .country_ambassador_store
        .save_country_ambassador(&CountryAmbassadorParams::new("GB", "United Kingdom", DATE))
        .unwrap();
    runtime
        .country_relationship_store
        .save_country_relationship(&CountryRelationshipParams::new("US", "JP", DATE))
        .unwrap();
    runtime
        .sector_template_store
        .save_sector_template(&SectorTemplateParams::new("Industrial Equipment Rental", DATE))
        .unwrap();

    // everything reloads through its validating load path
    runtime.company_store.load_company("AHT.L", true).unwrap();
    runtime
        .quarter_event_store
        .load_quarter_event("company/AHT.L/quarter/2026-Q1", true)
        .unwrap();
    runtime
        .catalyst_event_store
        .load_catalyst_event("company/AHT.L/catalyst/fy_results", true)
        .unwrap();
    runtime
        .macro_regime_store
        .load_macro_regime(DATE, true)
        .unwrap();
    runtime
        .top_down_levers_store
        .load_latest_snapshot(true)
        .unwrap();
    runtime
        .global_capital_markets_store
        .load_global_capital_markets(DATE, true)
        .unwrap();
    runtime
        .structural_profile_store
        .load_structural_profile("company/AHT.L", DATE, true)
        .unwrap();
    runtime
        .credit_trajectory_store
        .load_credit_trajectory("company/AHT.L", DATE, true)
        .unwrap();
    runtime
        .country_ambassador_store
        .load_country_ambassador("GB", true)
        .unwrap();
    runtime
        .country_relationship_store
        .load_country_relationship("US", "JP", true)
        .unwrap();
    runtime
        .sector_template_store
        .load_sector_template("sector/industrial_equipment_rental", true)
        .unwrap();

    // one workspace, every directory populated
    for entity_dir in [
        "companies",
        "assessments",
        "assessment_history",
        "theses",
        "thesis_history",
        "kg_edges",
        "quarter_events",
        "catalyst_events",
        "observer_decision_cycles",
        "macro_regime",
        "top_down_levers",
        "global_capital_markets",
        "company_structural_profiles",
        "credit_trajectory",
        "country_ambassadors",
        "country_relationships",
        "sector_templates",
        "write_events",
    ] {
        assert!(
            dir.path().join(entity_dir).is_dir(),
            "missing workspace directory: {entity_dir}"
        );
    }
}
