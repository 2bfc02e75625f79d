//! Serde helpers for configuration deserialization

use oracle_types::{decimal_to_wad, Address, ProviderId, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::str::FromStr;

/// Custom deserializer for HashMap<ProviderId, T> that handles string keys
pub fn deserialize_provider_map<'de, D, T>(
	deserializer: D,
) -> Result<HashMap<ProviderId, T>, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de>,
{
	let map = HashMap::<String, T>::deserialize(deserializer)?;

	map.into_iter()
		.map(|(k, v)| {
			k.parse::<ProviderId>()
				.map(|id| (id, v))
				.map_err(serde::de::Error::custom)
		})
		.collect()
}

/// Custom deserializer for HashMap<Address, T> that handles string keys
pub fn deserialize_address_map<'de, D, T>(
	deserializer: D,
) -> Result<HashMap<Address, T>, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de>,
{
	let map = HashMap::<String, T>::deserialize(deserializer)?;

	map.into_iter()
		.map(|(k, v)| {
			k.parse::<Address>()
				.map(|address| (address, v))
				.map_err(|_| serde::de::Error::custom(format!("Invalid address: {}", k)))
		})
		.collect()
}

/// Parses a decimal fraction such as `"0.05"` into the 18-decimal scale.
pub fn deserialize_fraction<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;
	Decimal::from_str(&raw)
		.ok()
		.and_then(decimal_to_wad)
		.ok_or_else(|| serde::de::Error::custom(format!("Invalid decimal fraction: {}", raw)))
}
