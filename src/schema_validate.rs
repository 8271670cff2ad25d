//! Payload validation against the registered schema pack.
//!
//! Every store validates before persisting. Failures report dotted instance
//! paths (`bqs.score`, not `/bqs/score`) capped at the first eight offending
//! locations so a deeply broken payload still produces a readable error.

use serde_json::Value;

use crate::constants::SCHEMA_PACK_VERSION;
use crate::error::{Error, Result};
use crate::logging::{log, log_validation_failure, obj, v_str, Domain, Level};
use crate::schema_registry::compiled_validator;

/// How many individual schema errors are folded into one error message.
const MAX_REPORTED_ERRORS: usize = 8;

fn dotted_path(pointer: &str) -> String {
    if pointer.is_empty() {
        return "$".to_string();
    }
    pointer.trim_start_matches('/').replace('/', ".")
}

// =============================================================================
// Validation entry points
// =============================================================================

/// Validate `payload` against schema `name` under pack `version`.
pub fn validate_payload(name: &str, payload: &Value, version: &str) -> Result<()> {
    let validator = compiled_validator(name, version)?;

    let mut details: Vec<String> = Vec::new();
    for error in validator.iter_errors(payload) {
        if details.len() >= MAX_REPORTED_ERRORS {
            break;
        }
        details.push(format!(
            "{}: {}",
            dotted_path(&error.instance_path.to_string()),
            error
        ));
    }

    if details.is_empty() {
        return Ok(());
    }
    let detail = details.join("; ");
    log_validation_failure(name, &detail);
    Err(Error::SchemaValidation {
        schema: name.to_string(),
        detail,
    })
}

/// Validate against the shipped pack version.
pub fn validate_current(name: &str, payload: &Value) -> Result<()> {
    validate_payload(name, payload, SCHEMA_PACK_VERSION)
}

/// Like [`validate_payload`], but an uncompilable validator is downgraded to
/// a warning instead of failing the write. Actual payload violations still
/// error.
pub fn validate_payload_lenient(name: &str, payload: &Value, version: &str) -> Result<()> {
    match validate_payload(name, payload, version) {
        Err(Error::ValidatorUnavailable { schema, detail }) => {
            log(
                Level::Warn,
                Domain::Schema,
                "validator_unavailable",
                obj(&[("schema", v_str(&schema)), ("detail", v_str(&detail))]),
            );
            Ok(())
        }
        other => other,
    }
}

/// Boolean form for callers that only need a gate, not the detail.
pub fn payload_is_valid(name: &str, payload: &Value) -> bool {
    validate_current(name, payload).is_ok()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_edge() -> Value {
        json!({
            "edge_id": "edge/exposure/company_aht.l->macro_dollar/2025-01-10T00:00:00Z",
            "src": "company/AHT.L",
            "dst": "macro/dollar",
            "link_type": "exposure",
            "created_at": "2025-01-10T00:00:00Z",
            "confidence": 85,
            "active": true,
            "version": "v0.1.0",
            "provenance": {
                "source_event_ids": ["assessment/company/AHT.L/2025-01-10"],
                "source_hashes": [],
                "generated_by": "aion_equities"
            }
        })
    }

    #[test]
    fn test_valid_edge_passes() {
        validate_current("kg_edge", &minimal_edge()).unwrap();
    }

    #[test]
    fn test_missing_required_field_is_reported() {
        let mut edge = minimal_edge();
        edge.as_object_mut().unwrap().remove("confidence");
        let err = validate_current("kg_edge", &edge).unwrap_err();
        match err {
            Error::SchemaValidation { schema, detail } => {
                assert_eq!(schema, "kg_edge");
                assert!(detail.contains("confidence"), "detail was: {detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_wrong_type_reports_dotted_path() {
        let mut edge = minimal_edge();
        edge["provenance"]["generated_by"] = json!(42);
        let err = validate_current("kg_edge", &edge).unwrap_err();
        match err {
            Error::SchemaValidation { detail, .. } => {
                assert!(
                    detail.contains("provenance.generated_by"),
                    "detail was: {detail}"
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_version_const_is_enforced() {
        let mut edge = minimal_edge();
        edge["version"] = json!("v9.9.9");
        assert!(!payload_is_valid("kg_edge", &edge));
    }

    #[test]
    fn test_dotted_path_shapes() {
        assert_eq!(dotted_path(""), "$");
        assert_eq!(dotted_path("/bqs/score"), "bqs.score");
        assert_eq!(dotted_path("/a/0/b"), "a.0.b");
    }
}
