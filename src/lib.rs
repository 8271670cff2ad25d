//! AION equities intelligence runtime.
//!
//! A schema-governed, event-sourced, file-backed JSON store for equity
//! analysis artifacts: companies, assessments, theses, knowledge-graph
//! edges, quarter and catalyst events, observer cycles, macro regimes,
//! top-down lever snapshots, and their supporting entities. On top of the
//! stores sit a pure SQI signal mapping, a macro-to-company cascade rules
//! engine, and the runtime that composes everything into per-company
//! intelligence snapshots.
//!
//! Layering:
//! ```text
//! ┌─────────────────────┐
//! │ IntelligenceRuntime │  bootstrap, helicopter view, snapshots
//! └──────────┬──────────┘
//!            │
//! ┌──────────▼──────────┐     ┌────────────────┐
//! │    entity stores    │────►│  write events  │
//! │  latest + history   │     │  append-only   │
//! └──────────┬──────────┘     └────────────────┘
//!            │
//! ┌──────────▼──────────┐
//! │   schema registry   │  embedded v0_1 pack, cached validators
//! └─────────────────────┘
//! ```
//!
//! Every persisted payload validates against its named schema unless the
//! caller opts out; `latest/` files are byte-identical to the newest
//! history entry; write-event envelopes are append-only.

pub mod builders;
pub mod constants;
pub mod error;
pub mod ids;
pub mod logging;
pub mod merge;
pub mod runtime;
pub mod schema_registry;
pub mod schema_validate;
pub mod sqi;
pub mod store;
pub mod timefmt;
pub mod top_down;

pub use error::{Error, Result};
pub use runtime::{BootstrapParams, IntelligenceRuntime};
