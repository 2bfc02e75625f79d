//! Configuration loading for the price oracle.
//!
//! The loader reads a TOML file, substitutes `${VAR}` references from the
//! environment, applies `ORACLE_*` overrides and checks that every name the
//! file refers to is actually defined.

use oracle_types::{wad, Address, ProviderId, U256};
use std::collections::{HashMap, HashSet};
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

pub mod serde_helpers;
mod types;

pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "ORACLE_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<Config, ConfigError> {
		let file_path = self.file_path.as_ref().ok_or_else(|| {
			ConfigError::FileNotFound("No configuration file specified".to_string())
		})?;

		if !Path::new(file_path).exists() {
			return Err(ConfigError::FileNotFound(file_path.clone()));
		}

		let content = tokio::fs::read_to_string(file_path).await?;
		debug!(path = %file_path, "Loaded configuration file");
		self.parse(&content)
	}

	/// Runs substitution, parsing, overrides and validation on raw TOML.
	pub fn parse(&self, content: &str) -> Result<Config, ConfigError> {
		let substituted_content = self.substitute_env_vars(content)?;

		let mut config: Config = toml::from_str(&substituted_content)
			.map_err(|e| ConfigError::ParseError(e.to_string()))?;

		self.apply_env_overrides(&mut config)?;
		validate_config(&config)?;

		Ok(config)
	}

	fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
		let mut result = content.to_string();

		let re = regex::Regex::new(r"\$\{([^}]+)\}")
			.map_err(|e| ConfigError::ParseError(e.to_string()))?;

		for cap in re.captures_iter(content) {
			let full_match = &cap[0];
			let var_name = &cap[1];

			let env_value = env::var(var_name)
				.map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

			result = result.replace(full_match, &env_value);
		}

		Ok(result)
	}

	fn apply_env_overrides(&self, config: &mut Config) -> Result<(), ConfigError> {
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			config.engine.log_level = log_level;
		}

		if let Ok(http_port) = env::var(format!("{}HTTP_PORT", self.env_prefix)) {
			config.api.port = http_port
				.parse()
				.map_err(|e| ConfigError::ValidationError(format!("Invalid HTTP port: {}", e)))?;
		}

		if let Ok(timeout) = env::var(format!("{}SOURCE_TIMEOUT_MS", self.env_prefix)) {
			config.engine.source_timeout_ms = timeout.parse().map_err(|e| {
				ConfigError::ValidationError(format!("Invalid source timeout: {}", e))
			})?;
		}

		Ok(())
	}
}

fn invalid(message: impl Into<String>) -> ConfigError {
	ConfigError::ValidationError(message.into())
}

fn check_deviation(context: &str, max_deviation: U256) -> Result<(), ConfigError> {
	if max_deviation.is_zero() || max_deviation > wad() {
		return Err(invalid(format!(
			"{}: max_deviation must be greater than 0 and at most 1",
			context
		)));
	}
	Ok(())
}

/// Checks cross references between the sections of a parsed configuration.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
	if config.engine.owner == Address::ZERO {
		return Err(invalid("engine.owner must not be the zero address"));
	}
	if config.engine.source_timeout_ms == 0 {
		return Err(invalid("engine.source_timeout_ms must be greater than 0"));
	}

	if config.providers.contains_key(&ProviderId::None) {
		return Err(invalid("providers: 'none' cannot be registered"));
	}

	// Provider ids supplied by oracles registered back into the registry.
	let mut composites: HashMap<ProviderId, &str> = HashMap::new();
	for (name, oracle) in &config.oracles {
		let Some(id) = oracle.register_as else {
			continue;
		};
		if id.is_none() {
			return Err(invalid(format!("oracles.{}: register_as must not be 'none'", name)));
		}
		if config.providers.contains_key(&id) {
			return Err(invalid(format!(
				"oracles.{}: register_as '{}' is already a configured provider",
				name, id
			)));
		}
		if let Some(other) = composites.insert(id, name) {
			return Err(invalid(format!(
				"oracles.{} and oracles.{} both register as '{}'",
				other, name, id
			)));
		}
	}

	let available =
		|id: ProviderId| config.providers.contains_key(&id) || composites.contains_key(&id);

	for (name, oracle) in &config.oracles {
		let context = format!("oracles.{}", name);
		if oracle.primary.is_none() {
			return Err(invalid(format!("{}: primary must not be 'none'", context)));
		}
		if oracle.fallback_a.is_none() && !oracle.fallback_b.is_none() {
			return Err(invalid(format!(
				"{}: fallback_b requires fallback_a",
				context
			)));
		}
		check_deviation(&context, oracle.max_deviation)?;

		for id in [oracle.primary, oracle.fallback_a, oracle.fallback_b] {
			if id.is_none() {
				continue;
			}
			if !available(id) {
				return Err(invalid(format!(
					"{}: provider '{}' is not configured",
					context, id
				)));
			}
			if oracle.register_as == Some(id) {
				return Err(invalid(format!(
					"{}: cannot use its own registration '{}'",
					context, id
				)));
			}
		}
	}

	check_composite_cycles(config, &composites)?;

	let oracle_exists = |name: &String| config.oracles.contains_key(name);
	if let Some(default) = &config.registry.default_oracle {
		if !oracle_exists(default) {
			return Err(invalid(format!(
				"registry.default_oracle: unknown oracle '{}'",
				default
			)));
		}
	}
	for (asset, oracle) in &config.registry.tokens {
		if *asset == Address::ZERO {
			return Err(invalid("registry.tokens: zero address"));
		}
		if !oracle_exists(oracle) {
			return Err(invalid(format!(
				"registry.tokens.{}: unknown oracle '{}'",
				asset, oracle
			)));
		}
	}

	if let Some(peg) = &config.stable_peg {
		if !available(peg.provider) {
			return Err(invalid(format!(
				"stable_peg: provider '{}' is not configured",
				peg.provider
			)));
		}
		check_deviation("stable_peg", peg.max_deviation)?;
		if peg.primary.address == Address::ZERO || peg.secondary.address == Address::ZERO {
			return Err(invalid("stable_peg: stable coin address must not be zero"));
		}
		if peg.primary.address == peg.secondary.address {
			return Err(invalid("stable_peg: primary and secondary must differ"));
		}
	}

	Ok(())
}

/// Rejects oracles that end up consulting themselves through registered
/// composites.
fn check_composite_cycles(
	config: &Config,
	composites: &HashMap<ProviderId, &str>,
) -> Result<(), ConfigError> {
	for start in config.oracles.keys() {
		let mut stack = composite_dependencies(config, composites, start);
		let mut seen = HashSet::new();
		while let Some(next) = stack.pop() {
			if next == start.as_str() {
				return Err(invalid(format!(
					"oracles.{}: composite registration forms a cycle",
					start
				)));
			}
			if seen.insert(next) {
				stack.extend(composite_dependencies(config, composites, next));
			}
		}
	}

	Ok(())
}

fn composite_dependencies<'a>(
	config: &Config,
	composites: &HashMap<ProviderId, &'a str>,
	name: &str,
) -> Vec<&'a str> {
	config
		.oracles
		.get(name)
		.map(|oracle| {
			[oracle.primary, oracle.fallback_a, oracle.fallback_b]
				.iter()
				.filter_map(|id| composites.get(id).copied())
				.collect()
		})
		.unwrap_or_default()
}
