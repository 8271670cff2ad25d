//! Structured logging for the equities intelligence runtime.
//!
//! Design goals:
//! 1. Multi-level granularity (TRACE → FATAL)
//! 2. Domain-specific categories for filtering
//! 3. One JSONL record per event, safe to grep and replay
//! 4. Zero configuration: level and domains come from env vars

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            Ok("fatal") => Level::Fatal,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains (categories for filtering)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Schema,  // Registry resolution, validation outcomes
    Store,   // File writes, history snapshots, loads
    Runtime, // Bootstrap orchestration steps
    Rules,   // Top-down derivation, SQI mapping
    Audit,   // Write-event envelope trail
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Schema => "schema",
            Domain::Store => "store",
            Domain::Runtime => "runtime",
            Domain::Rules => "rules",
            Domain::Audit => "audit",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // Check LOG_DOMAINS env var (comma-separated list or "all")
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Sequence counter for ordering
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_ID: OnceLock<String> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

fn run_id() -> &'static str {
    RUN_ID.get_or_init(|| {
        std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()))
    })
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds (for replay correlation)
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    let min_level = Level::from_env();
    if level < min_level || !domain.is_enabled() {
        return;
    }

    emit_record(level, domain.as_str(), event, fields);
}

fn emit_record(level: Level, component: &str, event: &str, mut fields: Map<String, Value>) {
    let msg = fields
        .remove("msg")
        .unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(run_id()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    entry.insert("data".to_string(), Value::Object(fields));

    eprintln!("{}", Value::Object(entry));
}

// =============================================================================
// Domain-Specific Logging Helpers
// =============================================================================

pub fn log_validation_failure(schema: &str, detail: &str) {
    log(
        Level::Warn,
        Domain::Schema,
        "validation_failed",
        obj(&[("schema", v_str(schema)), ("detail", v_str(detail))]),
    );
}

pub fn log_store_write(entity_kind: &str, entity_id: &str, path: &std::path::Path) {
    log(
        Level::Debug,
        Domain::Store,
        "write",
        obj(&[
            ("entity_kind", v_str(entity_kind)),
            ("entity_id", v_str(entity_id)),
            ("path", v_str(&path.display().to_string())),
        ]),
    );
}

pub fn log_write_event(entity_id: &str, stage: &str, event_id: &str) {
    log(
        Level::Debug,
        Domain::Audit,
        "write_event",
        obj(&[
            ("entity_id", v_str(entity_id)),
            ("stage", v_str(stage)),
            ("event_id", v_str(event_id)),
        ]),
    );
}

pub fn log_bootstrap_step(ticker: &str, step: &str) {
    log(
        Level::Info,
        Domain::Runtime,
        "bootstrap_step",
        obj(&[("ticker", v_str(ticker)), ("step", v_str(step))]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn test_obj_helper() {
        let m = obj(&[("key", v_str("value")), ("num", v_num(42.0))]);
        assert_eq!(m.get("key").unwrap(), "value");
        assert_eq!(m.get("num").unwrap(), 42.0);
    }

    #[test]
    fn test_seq_increments() {
        let s1 = next_seq();
        let s2 = next_seq();
        assert!(s2 > s1);
    }

    #[test]
    fn test_domain_names_are_stable() {
        assert_eq!(Domain::Schema.as_str(), "schema");
        assert_eq!(Domain::Store.as_str(), "store");
        assert_eq!(Domain::Runtime.as_str(), "runtime");
        assert_eq!(Domain::Rules.as_str(), "rules");
        assert_eq!(Domain::Audit.as_str(), "audit");
    }
}
