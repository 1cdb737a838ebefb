//! finfocus — plugin routing and cost-aggregation engine for a FinOps CLI.
//!
//! This crate implements THE CORE named by the specification: ingesting
//! infrastructure-as-code plan/state documents into a provider-agnostic
//! resource graph (`ingest`), routing each resource to installed
//! cost-source plugins (`router`, `pattern`, `provider`), orchestrating
//! concurrent plugin RPCs with priority fallback and failure isolation
//! (`engine`, `plugin`), persisting recommendation dismissals (`dismissal`),
//! and evaluating budgets and carbon equivalency downstream of the engine's
//! output (`budget`, `carbon`). The interactive terminal renderer, the
//! per-cloud plugin binaries, and process-spawning/gRPC transport mechanics
//! are out of scope — `plugin::PluginClient` is the trait boundary a real
//! transport would implement.

pub mod budget;
pub mod carbon;
pub mod config;
pub mod dismissal;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod pattern;
pub mod plugin;
pub mod provider;
pub mod render;
pub mod router;

pub use error::{FinFocusError, Result};

/// Crate version, exposed for CLI banners and diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
