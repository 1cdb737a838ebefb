//! Ingest (spec.md §4.1, component C1): parses plan and state documents into
//! a normalized `ResourceDescriptor` stream.
//!
//! Both document kinds expose two entry surfaces — `from_bytes` (streaming
//! parse over an in-memory buffer) and `from_path` (load + delegate) — and
//! `from_path` is always exactly a read followed by `from_bytes`, never a
//! parallel implementation, so the two are byte-equivalent by construction
//! (spec.md §3.2, §8 "Ingest equivalence").

pub mod plan;
pub mod state;

pub use plan::PlanDocument;
pub use state::StateDocument;
