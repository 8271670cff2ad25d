//! Durability contracts that hold across the entity stores.
//!
//! These tests read raw files back from disk rather than going through the
//! load paths, so they catch divergence between what a store reports and
//! what it actually persisted.

use std::fs;

use aion_equities::store::assessment::{AssessmentStore, SaveAssessmentParams};
use aion_equities::store::catalyst_event::{CatalystEventParams, CatalystEventStore};
use aion_equities::store::observer_cycle::{ObserverCycleParams, ObserverCycleStore};
use aion_equities::store::quarter_event::{QuarterEventParams, QuarterEventStore};
use aion_equities::store::thesis::{SaveThesisParams, ThesisStore, UpdateThesisParams};
use aion_equities::store::payload_sha256;
use serde_json::json;

const AS_OF: &str = "2026-02-22T22:00:00Z";
const THESIS_ID: &str = "thesis/AHT.L/long/2026q2_pre_earnings";

// ---------------------------------------------------------------------------
// Latest and history hold the same bytes
// ---------------------------------------------------------------------------

#[test]
fn assessment_latest_and_history_are_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let store = AssessmentStore::new(dir.path());
    store
        .save_assessment(&SaveAssessmentParams::new("company/AHT.L", "company", AS_OF))
        .unwrap();

    let latest = fs::read(dir.path().join("assessments").join("company_AHT.L.json")).unwrap();
    let history = fs::read(
        dir.path()
            .join("assessment_history")
            .join("company_AHT.L")
            .join("2026-02-22T22-00-00Z.json"),
    )
    .unwrap();
    assert_eq!(latest, history);
}

#[test]
fn thesis_latest_and_history_are_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let store = ThesisStore::new(dir.path());
    store
        .save_thesis_state(&SaveThesisParams::new(
            "AHT.L",
            "long",
            "2026Q2_pre_earnings",
            AS_OF,
        ))
        .unwrap();

    let stem = "thesis_AHT.L_long_2026q2_pre_earnings";
    let latest = fs::read(dir.path().join("theses").join(format!("{stem}.json"))).unwrap();
    let history = fs::read(
        dir.path()
            .join("thesis_history")
            .join(stem)
            .join("2026-02-22T22-00-00Z.json"),
    )
    .unwrap();
    assert_eq!(latest, history);
}

#[test]
fn thesis_update_keeps_latest_in_step_with_newest_history() {
    let dir = tempfile::tempdir().unwrap();
    let store = ThesisStore::new(dir.path());
    store
        .save_thesis_state(&SaveThesisParams::new(
            "AHT.L",
            "long",
            "2026Q2_pre_earnings",
            AS_OF,
        ))
        .unwrap();
    store
        .update_thesis_state(&UpdateThesisParams::new(
            THESIS_ID,
            json!({"status": "ready"}),
            "2026-03-01T09:15:00Z",
        ))
        .unwrap();

    let stem = "thesis_AHT.L_long_2026q2_pre_earnings";
    let latest = fs::read(dir.path().join("theses").join(format!("{stem}.json"))).unwrap();
    let newest = fs::read(
        dir.path()
            .join("thesis_history")
            .join(stem)
            .join("2026-03-01T09-15-00Z.json"),
    )
    .unwrap();
    assert_eq!(latest, newest);

    // the first snapshot is still readable and unrevised
    let first = store.load_thesis_state_at(THESIS_ID, AS_OF).unwrap();
    assert_eq!(first["status"], "candidate");
}

// ---------------------------------------------------------------------------
// Write events carry the payload they certify
// ---------------------------------------------------------------------------

#[test]
fn write_event_hash_covers_the_persisted_payload() {
    let dir = tempfile::tempdir().unwrap();
    let store = AssessmentStore::new(dir.path());
    let stored = store
        .save_assessment(&SaveAssessmentParams::new("company/AHT.L", "company", AS_OF))
        .unwrap();

    let events = store
        .load_write_events("company/AHT.L", "interpretation")
        .unwrap();
    assert_eq!(events.len(), 1);
    let event = &events[0];

    assert_eq!(event["payload"]["schema_id"], "assessment");
    assert_eq!(event["payload"]["data"], stored);
    assert_eq!(
        event["provenance"]["source_hashes"][0],
        payload_sha256(&stored),
    );
    assert_eq!(
        event["event_id"],
        format!("write_event/company/AHT.L/interpretation/{AS_OF}"),
    );
}

// ---------------------------------------------------------------------------
// Satellite stores share one company's canonical IDs
// ---------------------------------------------------------------------------

#[test]
fn quarter_catalyst_and_observer_records_share_canonical_ids() {
    let dir = tempfile::tempdir().unwrap();

    let quarters = QuarterEventStore::new(dir.path());
    let mut quarter = QuarterEventParams::new("AHT.L", 2026, 1, "2026-03-01");
    quarter.document_refs = vec!["company/AHT.L/filing/2026-03-01/10q".into()];
    quarter.source_hashes = vec!["sha256:abc".into()];
    let quarter_payload = quarters.save_quarter_event(&quarter).unwrap();
    assert_eq!(quarter_payload["quarter_event_id"], "company/AHT.L/quarter/2026-Q1");

    let catalysts = CatalystEventStore::new(dir.path());
    let mut catalyst = CatalystEventParams::new("AHT.L", "fy_results", "earnings", "2026-06-16");
    catalyst.thesis_refs = vec![THESIS_ID.into()];
    let catalyst_payload = catalysts.save_catalyst_event(&catalyst).unwrap();
    assert_eq!(
        catalyst_payload["catalyst_event_id"],
        "company/AHT.L/catalyst/fy_results"
    );
    assert_eq!(catalyst_payload["company_ref"], quarter_payload["company_ref"]);

    let cycles = ObserverCycleStore::new(dir.path());
    let mut cycle = ObserverCycleParams::new(THESIS_ID, AS_OF, 72.0);
    cycle.gate_adherence = Some(true);
    let cycle_payload = cycles.save_cycle(&cycle).unwrap();
    assert_eq!(cycle_payload["thesis_id"], THESIS_ID);

    assert_eq!(
        quarters.list_quarter_events("company/AHT.L").unwrap().len(),
        1
    );
    assert_eq!(
        catalysts.list_catalyst_events("company/AHT.L").unwrap().len(),
        1
    );
    assert_eq!(cycles.list_cycles(THESIS_ID).unwrap().len(), 1);
}
