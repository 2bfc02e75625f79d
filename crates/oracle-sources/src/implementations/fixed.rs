//! Static price source.
//!
//! Serves operator-supplied USD prices from an in-memory table. Useful for
//! pegged assets, local deployments and replaying recorded prices.

use crate::{PriceSourceInterface, SourceError};
use async_trait::async_trait;
use oracle_types::{
	decimal_to_wad, mul_div, pow10, Address, AmountQuote, Clock, ConfigSchema, Field,
	FieldType, PairQuote, PriceResult, Schema, Timestamp, ValidationError, U256,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

pub const IMPLEMENTATION_NAME: &str = "static";

/// Price entry for one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticPrice {
	pub decimals: u8,
	/// USD per whole token, 18 decimals.
	pub price_in_usd: U256,
	/// Fixed timestamp, or `None` to report the clock's current time.
	pub updated_at: Option<Timestamp>,
}

pub struct StaticPriceSource {
	name: String,
	prices: HashMap<Address, StaticPrice>,
	clock: Arc<dyn Clock>,
}

impl StaticPriceSource {
	pub fn new(name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
		Self {
			name: name.into(),
			prices: HashMap::new(),
			clock,
		}
	}

	/// Builder-style insert used while constructing the source.
	pub fn with_token(mut self, token: Address, price: StaticPrice) -> Self {
		self.prices.insert(token, price);
		self
	}

	fn lookup(&self, token: Address) -> Result<(StaticPrice, Timestamp), SourceError> {
		let price = *self
			.prices
			.get(&token)
			.ok_or(SourceError::UnsupportedToken(token))?;
		let updated_at = price.updated_at.unwrap_or_else(|| self.clock.now());
		Ok((price, updated_at))
	}
}

fn overflow(what: &str, token: Address) -> SourceError {
	SourceError::Overflow(format!("{} for token {}", what, token))
}

fn token_unit(price: &StaticPrice, token: Address) -> Result<U256, SourceError> {
	pow10(price.decimals).ok_or_else(|| overflow("decimals", token))
}

#[async_trait]
impl PriceSourceInterface for StaticPriceSource {
	fn name(&self) -> &str {
		&self.name
	}

	async fn get_price_in_usd(&self, token: Address) -> Result<PriceResult, SourceError> {
		let (price, updated_at) = self.lookup(token)?;
		Ok(PriceResult::new(price.price_in_usd, updated_at))
	}

	async fn quote(
		&self,
		token_in: Address,
		token_out: Address,
		amount_in: U256,
	) -> Result<PairQuote, SourceError> {
		let usd = self.quote_token_to_usd(token_in, amount_in).await?;
		let out = self.quote_usd_to_token(token_out, usd.amount_out).await?;
		Ok(PairQuote::new(out.amount_out, usd.updated_at, out.updated_at))
	}

	async fn quote_token_to_usd(
		&self,
		token: Address,
		amount: U256,
	) -> Result<AmountQuote, SourceError> {
		let (price, updated_at) = self.lookup(token)?;
		let unit = token_unit(&price, token)?;
		let usd = mul_div(amount, price.price_in_usd, unit)
			.ok_or_else(|| overflow("token to usd", token))?;
		Ok(AmountQuote::new(usd, updated_at))
	}

	async fn quote_usd_to_token(
		&self,
		token: Address,
		usd_amount: U256,
	) -> Result<AmountQuote, SourceError> {
		let (price, updated_at) = self.lookup(token)?;
		if price.price_in_usd.is_zero() {
			return Ok(AmountQuote::new(U256::ZERO, updated_at));
		}
		let unit = token_unit(&price, token)?;
		let amount = mul_div(usd_amount, unit, price.price_in_usd)
			.ok_or_else(|| overflow("usd to token", token))?;
		Ok(AmountQuote::new(amount, updated_at))
	}
}

#[derive(Debug, Deserialize)]
struct StaticSourceConfig {
	#[serde(default)]
	tokens: Vec<StaticTokenConfig>,
}

#[derive(Debug, Deserialize)]
struct StaticTokenConfig {
	address: Address,
	decimals: u8,
	price_usd: String,
	updated_at: Option<Timestamp>,
}

/// Configuration schema for the static source.
pub struct StaticSourceSchema;

impl ConfigSchema for StaticSourceSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let token = Schema::new(
			vec![
				Field::new("address", FieldType::Address),
				Field::new(
					"decimals",
					FieldType::Integer {
						min: Some(0),
						max: Some(36),
					},
				),
				Field::new("price_usd", FieldType::String).with_validator(|value| {
					let raw = value.as_str().unwrap_or_default();
					let price = Decimal::from_str(raw)
						.map_err(|e| format!("'{}' is not a decimal: {}", raw, e))?;
					if price.is_sign_negative() {
						return Err("price_usd must not be negative".to_string());
					}
					Ok(())
				}),
			],
			vec![Field::new(
				"updated_at",
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			)],
		);

		Schema::new(
			vec![],
			vec![Field::new("tokens", FieldType::Array(Box::new(FieldType::Table(token))))],
		)
		.validate(config)
	}
}

pub fn config_schema() -> Box<dyn ConfigSchema> {
	Box::new(StaticSourceSchema)
}

/// Factory function to create a static source from configuration.
///
/// Configuration parameters:
/// - `tokens`: array of `{ address, decimals, price_usd, updated_at? }`
pub fn create_source(
	name: &str,
	config: &toml::Value,
	clock: Arc<dyn Clock>,
) -> Result<Arc<dyn PriceSourceInterface>, SourceError> {
	let parsed: StaticSourceConfig = config
		.clone()
		.try_into()
		.map_err(|e| SourceError::InvalidConfig(format!("{}: {}", name, e)))?;

	let token_count = parsed.tokens.len();
	let mut source = StaticPriceSource::new(name, clock);
	for token in parsed.tokens {
		let price = Decimal::from_str(&token.price_usd)
			.ok()
			.and_then(decimal_to_wad)
			.ok_or_else(|| {
				SourceError::InvalidConfig(format!(
					"Invalid price_usd '{}' for token {}",
					token.price_usd, token.address
				))
			})?;
		source = source.with_token(
			token.address,
			StaticPrice {
				decimals: token.decimals,
				price_in_usd: price,
				updated_at: token.updated_at,
			},
		);
	}

	debug!(source = %name, tokens = token_count, "Static source created");
	Ok(Arc::new(source))
}
