//! Dismissal store (spec.md §4.6, component C7): persists dismissal/snooze
//! records with atomic writes and cross-process advisory locking, so
//! recommendations the user already rejected stay excluded on later runs.

pub mod record;
pub mod store;

pub use record::{DismissalRecord, HistoryEntry};
pub use store::DismissalStore;
