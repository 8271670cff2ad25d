//! Version markers and fixed vocabularies shared across the crate.

/// Embedded in every persisted payload under the `version` key.
pub const PAYLOAD_VERSION: &str = "v0.1.0";

/// Addresses the schema registry; directory name of the shipped pack.
pub const SCHEMA_PACK_VERSION: &str = "v0_1";

/// Thesis modes accepted by `make_thesis_id` in strict mode.
pub const ALLOWED_THESIS_MODES: [&str; 5] =
    ["long", "short", "swing_short", "catalyst_long", "neutral_watch"];

/// Modes whose theses require an active catalyst before the policy gate opens.
pub const CATALYST_REQUIRED_MODES: [&str; 3] = ["short", "swing_short", "catalyst_long"];

/// Modes that require borrow availability checks.
pub const BORROW_REQUIRED_MODES: [&str; 2] = ["short", "swing_short"];

/// Write-event envelope stages, in pipeline order.
pub const WRITE_EVENT_STAGES: [&str; 4] = ["ingestion", "interpretation", "decision", "outcome"];

/// Default actor recorded in audit blocks when none is supplied.
pub const DEFAULT_ACTOR: &str = "aion_equities";
