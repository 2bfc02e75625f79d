//! Wires registries, oracles and the peg helper from configuration.

use crate::fallback::{FallbackConfig, FallbackOracle};
use crate::governance::Governance;
use crate::master_registry::{MasterRegistry, PriceOracle};
use crate::policy::{DeviationPolicy, StalenessPolicy, NO_STALENESS_CHECK};
use crate::provider_registry::ProviderRegistry;
use crate::stable_peg::{StableCoin, StablePegHelper, StablePegState};
use oracle_config::{Config, OracleConfig};
use oracle_sources::{PriceSourceInterface, SourceError};
use oracle_types::{Clock, EventBus, OracleError, ProviderId, SystemClock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Source error: {0}")]
	Source(#[from] SourceError),
	#[error("Oracle error: {0}")]
	Oracle(#[from] OracleError),
}

/// Fully wired oracle engine.
pub struct OracleEngine {
	config: Config,
	providers: Arc<ProviderRegistry>,
	master: Arc<MasterRegistry>,
	oracles: HashMap<String, Arc<FallbackOracle>>,
	stable_peg: Option<Arc<StablePegHelper>>,
	governance: Governance,
	events: EventBus,
}

impl OracleEngine {
	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn providers(&self) -> &Arc<ProviderRegistry> {
		&self.providers
	}

	pub fn master(&self) -> &Arc<MasterRegistry> {
		&self.master
	}

	pub fn oracle(&self, name: &str) -> Option<&Arc<FallbackOracle>> {
		self.oracles.get(name)
	}

	/// Oracle names in sorted order.
	pub fn oracle_names(&self) -> Vec<&str> {
		let mut names: Vec<_> = self.oracles.keys().map(String::as_str).collect();
		names.sort_unstable();
		names
	}

	pub fn stable_peg(&self) -> Option<&Arc<StablePegHelper>> {
		self.stable_peg.as_ref()
	}

	pub fn governance(&self) -> &Governance {
		&self.governance
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.events
	}
}

pub struct OracleBuilder {
	config: Config,
	clock: Arc<dyn Clock>,
	events: EventBus,
	sources: HashMap<ProviderId, Arc<dyn PriceSourceInterface>>,
}

impl OracleBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			clock: Arc::new(SystemClock),
			events: EventBus::default(),
			sources: HashMap::new(),
		}
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	pub fn with_event_bus(mut self, events: EventBus) -> Self {
		self.events = events;
		self
	}

	/// Supplies a ready-made source for `id`, taking precedence over the
	/// configured implementation.
	pub fn with_source(mut self, id: ProviderId, source: Arc<dyn PriceSourceInterface>) -> Self {
		self.sources.insert(id, source);
		self
	}

	pub fn build(self) -> Result<OracleEngine, EngineError> {
		let governance = Governance::new(self.config.engine.owner)?;
		let owner = governance.owner();

		let providers = Arc::new(
			ProviderRegistry::new(governance, self.events.clone())
				.with_timeout(Duration::from_millis(self.config.engine.source_timeout_ms)),
		);

		for (id, provider) in &self.config.providers {
			if self.sources.contains_key(id) {
				continue;
			}
			let source = oracle_sources::create_source(
				&provider.implementation,
				id.as_str(),
				&provider.config,
				self.clock.clone(),
			)?;
			providers.set_provider(owner, *id, source)?;
		}
		for (id, source) in &self.sources {
			providers.set_provider(owner, *id, source.clone())?;
		}

		let mut oracles = HashMap::new();
		for name in build_order(&self.config)? {
			let oracle_config = &self.config.oracles[&name];
			let oracle = Arc::new(FallbackOracle::new(
				name.clone(),
				providers.clone(),
				fallback_config(oracle_config)?,
				governance,
				self.events.clone(),
				self.clock.clone(),
			)?);
			if let Some(id) = oracle_config.register_as {
				providers.set_provider(owner, id, oracle.clone())?;
			}
			debug!(oracle = %name, "Fallback oracle built");
			oracles.insert(name, oracle);
		}

		let master = Arc::new(MasterRegistry::new(governance, self.events.clone()));
		let lookup = |name: &String| -> Result<Arc<dyn PriceOracle>, EngineError> {
			oracles
				.get(name)
				.map(|oracle| oracle.clone() as Arc<dyn PriceOracle>)
				.ok_or_else(|| EngineError::Config(format!("unknown oracle '{}'", name)))
		};
		if let Some(default) = &self.config.registry.default_oracle {
			master.set_default_oracle(owner, lookup(default)?)?;
		}
		for (asset, name) in &self.config.registry.tokens {
			master.update_token_oracle(owner, *asset, lookup(name)?)?;
		}

		let stable_peg = match &self.config.stable_peg {
			Some(peg) => Some(Arc::new(StablePegHelper::new(
				providers.clone(),
				StablePegState {
					provider: peg.provider,
					primary: StableCoin::new(peg.primary.address, peg.primary.decimals),
					secondary: StableCoin::new(peg.secondary.address, peg.secondary.decimals),
					stale_period: peg.stale_period_secs,
					deviation: DeviationPolicy::new(peg.max_deviation)?,
				},
				governance,
				self.events.clone(),
				self.clock.clone(),
			)?)),
			None => None,
		};

		info!(
			engine = %self.config.engine.name,
			providers = providers.providers().len(),
			oracles = oracles.len(),
			tokens = master.tokens().len(),
			stable_peg = stable_peg.is_some(),
			"Oracle engine built"
		);

		Ok(OracleEngine {
			config: self.config,
			providers,
			master,
			oracles,
			stable_peg,
			governance,
			events: self.events,
		})
	}
}

fn fallback_config(oracle: &OracleConfig) -> Result<FallbackConfig, EngineError> {
	let default_period = if oracle.disable_staleness_check {
		NO_STALENESS_CHECK
	} else {
		oracle.stale_period_secs
	};
	let staleness = oracle
		.custom_stale_periods
		.iter()
		.fold(StalenessPolicy::new(default_period), |policy, (asset, period)| {
			policy.with_override(*asset, *period)
		});

	Ok(FallbackConfig::new(
		oracle.primary,
		staleness,
		DeviationPolicy::new(oracle.max_deviation)?,
	)
	.with_fallbacks(oracle.fallback_a, oracle.fallback_b))
}

/// Orders oracles so that an oracle registered as a provider is built
/// before any oracle that consults it.
fn build_order(config: &Config) -> Result<Vec<String>, EngineError> {
	let registered: HashMap<ProviderId, &String> = config
		.oracles
		.iter()
		.filter_map(|(name, oracle)| oracle.register_as.map(|id| (id, name)))
		.collect();

	let mut names: Vec<&String> = config.oracles.keys().collect();
	names.sort();

	let mut order = Vec::with_capacity(names.len());
	let mut placed: HashSet<&String> = HashSet::new();
	while order.len() < names.len() {
		let before = order.len();
		for name in &names {
			if placed.contains(name) {
				continue;
			}
			let oracle = &config.oracles[*name];
			let ready = [oracle.primary, oracle.fallback_a, oracle.fallback_b]
				.iter()
				.filter_map(|id| registered.get(id))
				.all(|dependency| placed.contains(dependency));
			if ready {
				placed.insert(*name);
				order.push((*name).clone());
			}
		}
		if order.len() == before {
			return Err(EngineError::Config(
				"composite oracle registrations form a cycle".to_string(),
			));
		}
	}

	Ok(order)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_utils::{asset, usd, MockAnswer, MockSource, NOW};
	use oracle_config::ConfigLoader;
	use oracle_types::{Address, FixedClock, U256};

	const OWNER: Address = Address::with_last_byte(0xaa);

	const CONFIG: &str = r#"
[engine]
name = "test-engine"
owner = "0x00000000000000000000000000000000000000aa"
source_timeout_ms = 50

[providers.push_feed]
implementation = "static"

[[providers.push_feed.config.tokens]]
address = "0x0000000000000000000000000000000000000001"
decimals = 18
price_usd = "3000"

[[providers.push_feed.config.tokens]]
address = "0x00000000000000000000000000000000000000c1"
decimals = 6
price_usd = "0.999"

[[providers.push_feed.config.tokens]]
address = "0x00000000000000000000000000000000000000c2"
decimals = 18
price_usd = "1.001"

[providers.amm_v3]
implementation = "static"

[[providers.amm_v3.config.tokens]]
address = "0x0000000000000000000000000000000000000001"
decimals = 18
price_usd = "2995"

[providers.pull_feed]
implementation = "static"

[[providers.pull_feed.config.tokens]]
address = "0x0000000000000000000000000000000000000001"
decimals = 18
price_usd = "3005"

[oracles.eth]
primary = "push_feed"
fallback_a = "amm_v3"
fallback_b = "pull_feed"
stale_period_secs = 3600
max_deviation = "0.05"
register_as = "composite"

[oracles.outer]
primary = "amm_v3"
fallback_a = "composite"
stale_period_secs = 3600
max_deviation = "0.05"
disable_staleness_check = true

[registry]
default_oracle = "eth"

[registry.tokens]
"0x0000000000000000000000000000000000000001" = "outer"

[stable_peg]
provider = "push_feed"
stale_period_secs = 86400
max_deviation = "0.02"
primary = { address = "0x00000000000000000000000000000000000000c1", decimals = 6 }
secondary = { address = "0x00000000000000000000000000000000000000c2", decimals = 18 }
"#;

	fn config() -> Config {
		ConfigLoader::new()
			.with_env_prefix("ORACLE_ENGINE_TEST_UNUSED_")
			.parse(CONFIG)
			.unwrap()
	}

	fn engine() -> OracleEngine {
		OracleBuilder::new(config())
			.with_clock(Arc::new(FixedClock::new(NOW)))
			.build()
			.unwrap()
	}

	#[tokio::test]
	async fn test_build_from_config() {
		let engine = engine();

		assert_eq!(
			engine.providers().providers(),
			vec![
				ProviderId::PushFeed,
				ProviderId::PullFeed,
				ProviderId::AmmV3,
				ProviderId::Composite,
			]
		);
		assert_eq!(engine.oracle_names(), vec!["eth", "outer"]);
		assert_eq!(engine.governance().owner(), OWNER);
		assert_eq!(
			engine.oracle("outer").unwrap().config().staleness.default_period(),
			NO_STALENESS_CHECK
		);
		assert_eq!(
			engine.providers().timeout(),
			Duration::from_millis(50)
		);
	}

	#[tokio::test]
	async fn test_prices_through_master_registry() {
		let engine = engine();

		// explicit entry: outer oracle, primary amm_v3
		let eth = engine.master().get_price_in_usd(asset(1)).await.unwrap();
		assert_eq!(eth, usd(2995));

		// default oracle for everything else; unknown tokens are source failures
		assert_eq!(
			engine.master().get_price(asset(9)).await,
			Err(OracleError::FallbacksFailed)
		);
	}

	#[tokio::test]
	async fn test_stable_peg_from_config() {
		let engine = engine();
		let peg = engine.stable_peg().unwrap();

		let coin = peg.get_stable_coin_if_pegged().await.unwrap();
		assert_eq!(coin.address, Address::with_last_byte(0xc1));
		assert_eq!(
			peg.to_usd_representation(U256::from(2_000_000u64)).unwrap(),
			usd(2)
		);
	}

	#[tokio::test]
	async fn test_injected_source_overrides_config() {
		let source = Arc::new(MockSource::new("mock"));
		source.set(asset(1), MockAnswer::Price(usd(10), 0));

		let engine = OracleBuilder::new(config())
			.with_clock(Arc::new(FixedClock::new(NOW)))
			.with_source(ProviderId::PushFeed, source.clone())
			.build()
			.unwrap();

		assert_eq!(
			engine.providers().source(ProviderId::PushFeed).unwrap().name(),
			"mock"
		);

		// push_feed answers the zero sentinel, fallbacks amm_v3 and pull_feed agree
		let price = engine.oracle("eth").unwrap().get_price_in_usd(asset(1)).await.unwrap();
		assert_eq!(price.price_in_usd, usd(2995));
		assert_eq!(source.calls(), 1);
	}

	#[test]
	fn test_build_order_puts_registered_oracles_first() {
		let order = build_order(&config()).unwrap();
		assert_eq!(order, vec!["eth".to_string(), "outer".to_string()]);
	}

	#[test]
	fn test_unknown_implementation_rejected() {
		let content = CONFIG.replacen("implementation = \"static\"", "implementation = \"chainlink\"", 1);
		let config = ConfigLoader::new()
			.with_env_prefix("ORACLE_ENGINE_TEST_UNUSED_")
			.parse(&content)
			.unwrap();

		assert!(matches!(
			OracleBuilder::new(config).build(),
			Err(EngineError::Source(SourceError::InvalidConfig(_)))
		));
	}
}
