//! Leaf price sources for the oracle engine.
//!
//! A price source answers four questions about the assets it knows: the USD
//! price of one whole token, token-to-token conversion, and the two
//! token/USD conversions. Concrete feed adapters implement
//! [`PriceSourceInterface`]; the engine never looks past this trait, so a
//! fallback oracle can itself stand in as a source.

use async_trait::async_trait;
use oracle_types::{
	Address, AmountQuote, Clock, ConfigSchema, PairQuote, PriceResult, ValidationError, U256,
};
use std::sync::Arc;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod fixed;
}

/// Errors reported by a leaf source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
	#[error("Unsupported token: {0}")]
	UnsupportedToken(Address),
	#[error("Arithmetic overflow: {0}")]
	Overflow(String),
	#[error("Backend error: {0}")]
	Backend(String),
	/// A composed source refused to answer; carries its reason code.
	#[error("Rejected: {0}")]
	Rejected(String),
	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),
}

impl From<ValidationError> for SourceError {
	fn from(e: ValidationError) -> Self {
		SourceError::InvalidConfig(e.to_string())
	}
}

/// Capability every price source exposes.
///
/// All USD amounts are on the 18-decimal scale; token amounts are in the
/// token's native decimals. A zero amount or zero timestamp means "no data".
#[async_trait]
pub trait PriceSourceInterface: Send + Sync {
	/// Human readable name used in logs and events.
	fn name(&self) -> &str;

	async fn get_price_in_usd(&self, token: Address) -> Result<PriceResult, SourceError>;

	async fn quote(
		&self,
		token_in: Address,
		token_out: Address,
		amount_in: U256,
	) -> Result<PairQuote, SourceError>;

	async fn quote_token_to_usd(
		&self,
		token: Address,
		amount: U256,
	) -> Result<AmountQuote, SourceError>;

	async fn quote_usd_to_token(
		&self,
		token: Address,
		usd_amount: U256,
	) -> Result<AmountQuote, SourceError>;
}

/// Builds a source from its name, its `config` table and the engine clock.
pub type SourceFactory = fn(
	&str,
	&toml::Value,
	Arc<dyn Clock>,
) -> Result<Arc<dyn PriceSourceInterface>, SourceError>;

/// A named source implementation selectable from configuration.
pub struct SourceImplementation {
	pub name: &'static str,
	pub schema: fn() -> Box<dyn ConfigSchema>,
	pub factory: SourceFactory,
}

/// Every implementation shipped with this crate.
pub fn get_all_implementations() -> Vec<SourceImplementation> {
	vec![SourceImplementation {
		name: implementations::fixed::IMPLEMENTATION_NAME,
		schema: implementations::fixed::config_schema,
		factory: implementations::fixed::create_source,
	}]
}

/// Looks up an implementation by its configuration name.
pub fn implementation(name: &str) -> Option<SourceImplementation> {
	get_all_implementations()
		.into_iter()
		.find(|implementation| implementation.name == name)
}

/// Validates `config` against the implementation's schema and builds it.
pub fn create_source(
	implementation_name: &str,
	source_name: &str,
	config: &toml::Value,
	clock: Arc<dyn Clock>,
) -> Result<Arc<dyn PriceSourceInterface>, SourceError> {
	let implementation = implementation(implementation_name).ok_or_else(|| {
		SourceError::InvalidConfig(format!(
			"Unknown source implementation: {}",
			implementation_name
		))
	})?;

	(implementation.schema)().validate(config)?;
	(implementation.factory)(source_name, config, clock)
}
