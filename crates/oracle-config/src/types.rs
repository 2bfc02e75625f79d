//! Configuration model for the price oracle.

use crate::serde_helpers::{deserialize_address_map, deserialize_fraction, deserialize_provider_map};
use oracle_types::{Address, ProviderId, U256};
use serde::Deserialize;
use std::collections::HashMap;

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub engine: EngineConfig,
	#[serde(default)]
	pub api: ApiConfig,
	/// Leaf sources keyed by the provider id they are registered under.
	#[serde(default, deserialize_with = "deserialize_provider_map")]
	pub providers: HashMap<ProviderId, ProviderConfig>,
	/// Fallback oracles keyed by name.
	#[serde(default)]
	pub oracles: HashMap<String, OracleConfig>,
	#[serde(default)]
	pub registry: RegistryConfig,
	pub stable_peg: Option<StablePegConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
	pub name: String,
	/// The single address allowed to perform governance writes.
	pub owner: Address,
	#[serde(default = "default_source_timeout_ms")]
	pub source_timeout_ms: u64,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
	#[serde(default = "default_true")]
	pub enabled: bool,
	#[serde(default = "default_host")]
	pub host: String,
	#[serde(default = "default_port")]
	pub port: u16,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			host: default_host(),
			port: default_port(),
		}
	}
}

/// One leaf source.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
	/// Name of the source implementation, e.g. `static`.
	pub implementation: String,
	/// Implementation specific table, checked by the implementation's schema.
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
	pub primary: ProviderId,
	#[serde(default)]
	pub fallback_a: ProviderId,
	#[serde(default)]
	pub fallback_b: ProviderId,
	pub stale_period_secs: u64,
	/// Skip the age check entirely, for sources that prove freshness themselves.
	#[serde(default)]
	pub disable_staleness_check: bool,
	#[serde(deserialize_with = "deserialize_fraction")]
	pub max_deviation: U256,
	#[serde(default, deserialize_with = "deserialize_address_map")]
	pub custom_stale_periods: HashMap<Address, u64>,
	/// Registers the oracle back into the provider registry under this id.
	#[serde(default)]
	pub register_as: Option<ProviderId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryConfig {
	pub default_oracle: Option<String>,
	/// Asset to oracle name.
	#[serde(default, deserialize_with = "deserialize_address_map")]
	pub tokens: HashMap<Address, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StablePegConfig {
	pub provider: ProviderId,
	pub stale_period_secs: u64,
	#[serde(deserialize_with = "deserialize_fraction")]
	pub max_deviation: U256,
	pub primary: StableCoinConfig,
	pub secondary: StableCoinConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StableCoinConfig {
	pub address: Address,
	pub decimals: u8,
}

fn default_source_timeout_ms() -> u64 {
	5_000
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_true() -> bool {
	true
}

fn default_host() -> String {
	"127.0.0.1".to_string()
}

fn default_port() -> u16 {
	3000
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::map::Map::new())
}
