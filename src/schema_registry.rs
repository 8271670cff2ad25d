//! Versioned schema registry.
//!
//! The crate ships its schema pack embedded in the binary. An external root
//! (env var `AION_SCHEMA_ROOT`) can override it, which is how deployments pin
//! a pack revision without rebuilding. Compiled validators are cached per
//! `version/name` so repeated store writes do not recompile schemas.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use jsonschema::Validator;
use serde_json::Value;

use crate::constants::SCHEMA_PACK_VERSION;
use crate::error::{Error, Result};

// =============================================================================
// Pack contents
// =============================================================================

/// Every schema name the registry resolves, matching `schemas/<version>/<name>.schema.json`.
pub const SCHEMA_NAMES: [&str; 16] = [
    "assessment",
    "catalyst_event",
    "company",
    "company_structural_profile",
    "country_ambassador",
    "country_relationship",
    "credit_trajectory",
    "global_capital_markets",
    "kg_edge",
    "macro_regime",
    "observer_decision_cycle",
    "quarter_event",
    "sector_template",
    "thesis_state",
    "top_down_levers_snapshot",
    "write_event_envelope",
];

fn embedded_schema(name: &str) -> Option<&'static str> {
    let text = match name {
        "assessment" => include_str!("../schemas/v0_1/assessment.schema.json"),
        "catalyst_event" => include_str!("../schemas/v0_1/catalyst_event.schema.json"),
        "company" => include_str!("../schemas/v0_1/company.schema.json"),
        "company_structural_profile" => {
            include_str!("../schemas/v0_1/company_structural_profile.schema.json")
        }
        "country_ambassador" => include_str!("../schemas/v0_1/country_ambassador.schema.json"),
        "country_relationship" => include_str!("../schemas/v0_1/country_relationship.schema.json"),
        "credit_trajectory" => include_str!("../schemas/v0_1/credit_trajectory.schema.json"),
        "global_capital_markets" => {
            include_str!("../schemas/v0_1/global_capital_markets.schema.json")
        }
        "kg_edge" => include_str!("../schemas/v0_1/kg_edge.schema.json"),
        "macro_regime" => include_str!("../schemas/v0_1/macro_regime.schema.json"),
        "observer_decision_cycle" => {
            include_str!("../schemas/v0_1/observer_decision_cycle.schema.json")
        }
        "quarter_event" => include_str!("../schemas/v0_1/quarter_event.schema.json"),
        "sector_template" => include_str!("../schemas/v0_1/sector_template.schema.json"),
        "thesis_state" => include_str!("../schemas/v0_1/thesis_state.schema.json"),
        "top_down_levers_snapshot" => {
            include_str!("../schemas/v0_1/top_down_levers_snapshot.schema.json")
        }
        "write_event_envelope" => include_str!("../schemas/v0_1/write_event_envelope.schema.json"),
        _ => return None,
    };
    Some(text)
}

/// External pack root, when the process opts out of the embedded copy.
pub fn schema_root_override() -> Option<PathBuf> {
    std::env::var("AION_SCHEMA_ROOT").ok().map(PathBuf::from)
}

// =============================================================================
// Loading
// =============================================================================

/// Load the raw schema document for `name` under pack `version`.
///
/// With `AION_SCHEMA_ROOT` set the file is read from
/// `<root>/<version>/<name>.schema.json`; a missing file there is an error
/// rather than a silent fallback, so a misconfigured root never mixes packs.
pub fn load_schema(name: &str, version: &str) -> Result<Value> {
    if let Some(root) = schema_root_override() {
        let path = root.join(version).join(format!("{name}.schema.json"));
        if !path.is_file() {
            return Err(Error::SchemaFileMissing {
                name: name.to_string(),
                path,
            });
        }
        let text = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        return serde_json::from_str(&text).map_err(|e| Error::json(&path, e));
    }

    if version != SCHEMA_PACK_VERSION {
        return Err(Error::UnknownSchema(format!("{version}/{name}")));
    }
    let text = embedded_schema(name).ok_or_else(|| Error::UnknownSchema(name.to_string()))?;
    serde_json::from_str(text).map_err(|e| {
        Error::json(
            PathBuf::from(format!("schemas/{version}/{name}.schema.json")),
            e,
        )
    })
}

// =============================================================================
// Validator cache
// =============================================================================

static VALIDATOR_CACHE: OnceLock<Mutex<HashMap<String, Arc<Validator>>>> = OnceLock::new();

fn cache() -> &'static Mutex<HashMap<String, Arc<Validator>>> {
    VALIDATOR_CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Compile (or fetch from cache) the validator for `name` under `version`.
pub fn compiled_validator(name: &str, version: &str) -> Result<Arc<Validator>> {
    let key = format!("{version}/{name}");
    if let Ok(guard) = cache().lock() {
        if let Some(v) = guard.get(&key) {
            return Ok(Arc::clone(v));
        }
    }

    let schema = load_schema(name, version)?;
    let validator = jsonschema::options()
        .should_validate_formats(true)
        .build(&schema)
        .map_err(|e| Error::ValidatorUnavailable {
            schema: key.clone(),
            detail: e.to_string(),
        })?;
    let validator = Arc::new(validator);

    if let Ok(mut guard) = cache().lock() {
        guard.insert(key, Arc::clone(&validator));
    }
    Ok(validator)
}

/// Drop all cached validators. Needed by tests that flip `AION_SCHEMA_ROOT`.
pub fn clear_schema_cache() {
    if let Ok(mut guard) = cache().lock() {
        guard.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_pack_schema_parses() {
        for name in SCHEMA_NAMES {
            let doc = load_schema(name, SCHEMA_PACK_VERSION).unwrap();
            assert!(doc.is_object(), "{name} should be a json object");
            assert_eq!(
                doc.get("$schema").and_then(Value::as_str),
                Some("https://json-schema.org/draft/2020-12/schema"),
                "{name} missing draft marker"
            );
        }
    }

    #[test]
    fn test_every_pack_schema_compiles() {
        for name in SCHEMA_NAMES {
            compiled_validator(name, SCHEMA_PACK_VERSION).unwrap();
        }
    }

    #[test]
    fn test_unknown_schema_is_rejected() {
        let err = load_schema("no_such_entity", SCHEMA_PACK_VERSION).unwrap_err();
        assert!(matches!(err, Error::UnknownSchema(_)));
    }

    #[test]
    fn test_unknown_version_without_root_is_rejected() {
        let err = load_schema("company", "v9_9").unwrap_err();
        assert!(matches!(err, Error::UnknownSchema(_)));
    }

    #[test]
    fn test_cache_returns_same_validator() {
        let a = compiled_validator("kg_edge", SCHEMA_PACK_VERSION).unwrap();
        let b = compiled_validator("kg_edge", SCHEMA_PACK_VERSION).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
