//! Provider-agnostic value types shared across the ingest, router, engine,
//! and rendering layers (spec.md §3, component C11).

pub mod cost;
pub mod currency;
pub mod recommendation;
pub mod resource;

pub use cost::CostResult;
pub use currency::Currency;
pub use recommendation::{Recommendation, RecommendationStatus};
pub use resource::{PropertyValue, ResourceDescriptor};
