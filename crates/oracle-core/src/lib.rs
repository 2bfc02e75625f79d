//! Oracle aggregation and fallback resolution.
//!
//! The [`ProviderRegistry`] dispatches requests to leaf sources by
//! [`ProviderId`](oracle_types::ProviderId). A [`FallbackOracle`] composes a
//! primary provider with up to two fallbacks behind staleness and deviation
//! policies, the [`MasterRegistry`] routes each asset to its oracle and the
//! [`StablePegHelper`] picks a stable coin that holds its peg.
//! [`OracleBuilder`] wires all of them from configuration.

pub mod engine;
pub mod fallback;
pub mod governance;
pub mod master_registry;
pub mod policy;
pub mod provider_registry;
pub mod stable_peg;

#[cfg(test)]
mod test_utils;

pub use engine::{EngineError, OracleBuilder, OracleEngine};
pub use fallback::{FallbackConfig, FallbackOracle};
pub use governance::Governance;
pub use master_registry::{MasterRegistry, PriceOracle};
pub use policy::{is_stale, DeviationPolicy, StalenessPolicy, NO_STALENESS_CHECK};
pub use provider_registry::ProviderRegistry;
pub use stable_peg::{StableCoin, StablePegHelper, StablePegState};
