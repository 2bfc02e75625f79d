//! Usability policies applied to source answers.

pub mod deviation;
pub mod staleness;

pub use deviation::DeviationPolicy;
pub use staleness::{is_stale, StalenessPolicy, NO_STALENESS_CHECK};
