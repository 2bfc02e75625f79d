//! Price and quote results plus the 18-decimal fixed-point helpers.
//!
//! Every USD amount in the engine is an integer scaled by `10^18`
//! regardless of the decimals of the asset it describes. A zero amount or a
//! zero timestamp is the "unavailable" sentinel and never a real price.

use alloy_primitives::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Decimals of the canonical USD scale.
pub const USD_DECIMALS: u8 = 18;

const WAD_U64: u64 = 1_000_000_000_000_000_000;

/// One USD (or 100%) on the 18-decimal scale.
pub fn wad() -> U256 {
	U256::from(WAD_U64)
}

/// USD price of one whole token, 18 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceResult {
	pub price_in_usd: U256,
	pub updated_at: Timestamp,
}

impl PriceResult {
	pub fn new(price_in_usd: U256, updated_at: Timestamp) -> Self {
		Self {
			price_in_usd,
			updated_at,
		}
	}

	pub fn is_unavailable(&self) -> bool {
		self.price_in_usd.is_zero() || self.updated_at == 0
	}
}

/// Single-token conversion result (token to USD or USD to token).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AmountQuote {
	pub amount_out: U256,
	pub updated_at: Timestamp,
}

impl AmountQuote {
	pub fn new(amount_out: U256, updated_at: Timestamp) -> Self {
		Self {
			amount_out,
			updated_at,
		}
	}

	pub fn is_unavailable(&self) -> bool {
		self.amount_out.is_zero() || self.updated_at == 0
	}
}

/// Token-to-token conversion result, carrying the freshness of both legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PairQuote {
	/// Output amount in the output token's native decimals.
	pub amount_out: U256,
	pub updated_at_in: Timestamp,
	pub updated_at_out: Timestamp,
}

impl PairQuote {
	pub fn new(amount_out: U256, updated_at_in: Timestamp, updated_at_out: Timestamp) -> Self {
		Self {
			amount_out,
			updated_at_in,
			updated_at_out,
		}
	}

	pub fn is_unavailable(&self) -> bool {
		self.amount_out.is_zero() || self.updated_at_in == 0 || self.updated_at_out == 0
	}
}

/// `10^decimals`, `None` when it does not fit in 256 bits.
pub fn pow10(decimals: u8) -> Option<U256> {
	U256::from(10u64).checked_pow(U256::from(decimals))
}

/// `a * b / denominator` with overflow and division-by-zero reported as `None`.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Option<U256> {
	if denominator.is_zero() {
		return None;
	}
	a.checked_mul(b)?.checked_div(denominator)
}

/// Moves `amount` from `from` decimals to `to` decimals, truncating when
/// precision is dropped.
pub fn rescale(amount: U256, from: u8, to: u8) -> Option<U256> {
	match from.cmp(&to) {
		std::cmp::Ordering::Equal => Some(amount),
		std::cmp::Ordering::Less => amount.checked_mul(pow10(to - from)?),
		std::cmp::Ordering::Greater => amount.checked_div(pow10(from - to)?),
	}
}

/// Converts a non-negative decimal (e.g. `"3000.25"` or `"0.05"`) to the
/// 18-decimal scale. Digits beyond the 18th decimal are truncated.
pub fn decimal_to_wad(value: Decimal) -> Option<U256> {
	if value.is_sign_negative() {
		return None;
	}
	let mantissa = u128::try_from(value.mantissa()).ok()?;
	let scale = u8::try_from(value.scale()).ok()?;
	rescale(U256::from(mantissa), scale, USD_DECIMALS)
}
