//! Error types for the price oracle engine.
//!
//! Every variant maps to a stable kebab-case reason code so callers (and the
//! HTTP API) can branch on the failure without parsing messages.

use crate::provider::ProviderId;
use alloy_primitives::Address;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OracleError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
	/// The `None` provider tag was used where a real provider is required.
	#[error("invalid-provider: provider id must not be none")]
	InvalidProvider,

	#[error("provider-not-registered: no source registered for {0}")]
	ProviderNotRegistered(ProviderId),

	#[error("oracle-not-set: no oracle for asset {0} and no default oracle")]
	OracleNotSet(Address),

	#[error("primary-failed: primary provider {0} unusable and no fallback configured")]
	PrimaryFailed(ProviderId),

	#[error("fallback-a-failed: primary and fallback A both unusable")]
	FallbackAFailed,

	#[error("fallbacks-failed: primary and both fallbacks unusable")]
	FallbacksFailed,

	#[error("prices-deviation-too-high: fallback A and fallback B disagree")]
	PricesDeviationTooHigh,

	#[error("invalid-token-price: zero price for asset {0}")]
	InvalidTokenPrice(Address),

	#[error("stable-prices-invalid: {0}")]
	StablePricesInvalid(String),

	#[error("unauthorized: {0} is not the governance owner")]
	Unauthorized(Address),

	#[error("invalid-address: {0}")]
	InvalidAddress(String),

	#[error("invalid-fallback-config: {0}")]
	InvalidFallbackConfig(String),

	#[error("invalid-deviation: {0}")]
	InvalidDeviation(String),

	#[error("same-stable-coins: primary and secondary are both {0}")]
	SameStableCoins(Address),

	#[error("source-failure: {provider} failed: {message}")]
	SourceFailure {
		provider: ProviderId,
		message: String,
	},

	#[error("source-timeout: {provider} did not answer within {timeout_ms}ms")]
	SourceTimeout {
		provider: ProviderId,
		timeout_ms: u64,
	},

	#[error("math-overflow: {0}")]
	MathOverflow(String),
}

impl OracleError {
	/// Stable reason code for this failure.
	pub fn reason(&self) -> &'static str {
		match self {
			OracleError::InvalidProvider => "invalid-provider",
			OracleError::ProviderNotRegistered(_) => "provider-not-registered",
			OracleError::OracleNotSet(_) => "oracle-not-set",
			OracleError::PrimaryFailed(_) => "primary-failed",
			OracleError::FallbackAFailed => "fallback-a-failed",
			OracleError::FallbacksFailed => "fallbacks-failed",
			OracleError::PricesDeviationTooHigh => "prices-deviation-too-high",
			OracleError::InvalidTokenPrice(_) => "invalid-token-price",
			OracleError::StablePricesInvalid(_) => "stable-prices-invalid",
			OracleError::Unauthorized(_) => "unauthorized",
			OracleError::InvalidAddress(_) => "invalid-address",
			OracleError::InvalidFallbackConfig(_) => "invalid-fallback-config",
			OracleError::InvalidDeviation(_) => "invalid-deviation",
			OracleError::SameStableCoins(_) => "same-stable-coins",
			OracleError::SourceFailure { .. } => "source-failure",
			OracleError::SourceTimeout { .. } => "source-timeout",
			OracleError::MathOverflow(_) => "math-overflow",
		}
	}

	/// True when a leaf source answered badly or not at all.
	///
	/// Fallback resolution treats these like the zero sentinel, while every
	/// other error propagates unchanged.
	pub fn is_source_failure(&self) -> bool {
		matches!(
			self,
			OracleError::SourceFailure { .. } | OracleError::SourceTimeout { .. }
		)
	}
}
