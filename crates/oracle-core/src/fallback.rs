//! Fallback oracle.
//!
//! Composes a primary provider with up to two fallbacks. Every request
//! walks the same decision tree:
//!
//! 1. a usable primary answer is returned as is;
//! 2. without fallback A the call fails `primary-failed`;
//! 3. without fallback B, a usable A answer is returned, otherwise the call
//!    fails `fallback-a-failed`;
//! 4. with both fallbacks, the single usable one wins. When both are usable
//!    they must agree within the deviation policy and A is returned;
//!    otherwise the call fails `prices-deviation-too-high`. With neither
//!    usable it fails `fallbacks-failed`.
//!
//! An answer is usable when it is not the zero sentinel and not stale.
//! Leaf errors and timeouts count as unusable answers. Registry misses
//! propagate immediately.

use crate::governance::Governance;
use crate::policy::{DeviationPolicy, StalenessPolicy};
use crate::provider_registry::ProviderRegistry;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use oracle_sources::{PriceSourceInterface, SourceError};
use oracle_types::{
	Address, AmountQuote, Clock, EventBus, GovernanceEvent, OracleError, PairQuote, PriceResult,
	ProviderId, Result, Timestamp, U256,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Provider selection and policies of one fallback oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackConfig {
	pub primary: ProviderId,
	pub fallback_a: ProviderId,
	pub fallback_b: ProviderId,
	pub staleness: StalenessPolicy,
	pub deviation: DeviationPolicy,
}

impl FallbackConfig {
	/// Primary only; add fallbacks with [`FallbackConfig::with_fallbacks`].
	pub fn new(primary: ProviderId, staleness: StalenessPolicy, deviation: DeviationPolicy) -> Self {
		Self {
			primary,
			fallback_a: ProviderId::None,
			fallback_b: ProviderId::None,
			staleness,
			deviation,
		}
	}

	pub fn with_fallbacks(mut self, fallback_a: ProviderId, fallback_b: ProviderId) -> Self {
		self.fallback_a = fallback_a;
		self.fallback_b = fallback_b;
		self
	}

	pub fn validate(&self) -> Result<()> {
		if self.primary.is_none() {
			return Err(OracleError::InvalidProvider);
		}
		check_fallbacks(self.primary, self.fallback_a, self.fallback_b)
	}
}

/// Fallback B needs fallback A, and no provider may appear twice.
fn check_fallbacks(primary: ProviderId, a: ProviderId, b: ProviderId) -> Result<()> {
	if a.is_none() && !b.is_none() {
		return Err(OracleError::InvalidFallbackConfig(
			"fallback B is set while fallback A is none".to_string(),
		));
	}
	if !a.is_none() && (a == primary || a == b) {
		return Err(OracleError::InvalidFallbackConfig(format!(
			"provider {} is used twice",
			a
		)));
	}
	if !b.is_none() && b == primary {
		return Err(OracleError::InvalidFallbackConfig(format!(
			"provider {} is used twice",
			b
		)));
	}
	Ok(())
}

/// Answer of one provider that passed the usability checks, together with
/// the USD-comparable value used for the deviation check.
struct Usable<T> {
	answer: T,
	value: U256,
}

pub struct FallbackOracle {
	name: String,
	registry: Arc<ProviderRegistry>,
	config: ArcSwap<FallbackConfig>,
	governance: Governance,
	events: EventBus,
	clock: Arc<dyn Clock>,
}

impl FallbackOracle {
	pub fn new(
		name: impl Into<String>,
		registry: Arc<ProviderRegistry>,
		config: FallbackConfig,
		governance: Governance,
		events: EventBus,
		clock: Arc<dyn Clock>,
	) -> Result<Self> {
		config.validate()?;
		Ok(Self {
			name: name.into(),
			registry,
			config: ArcSwap::from_pointee(config),
			governance,
			events,
			clock,
		})
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Current configuration snapshot.
	pub fn config(&self) -> Arc<FallbackConfig> {
		self.config.load_full()
	}

	pub async fn get_price_in_usd(&self, token: Address) -> Result<PriceResult> {
		let config = self.config.load_full();
		let now = self.clock.now();

		self.resolve(
			&config,
			"get_price_in_usd",
			move |provider| self.registry.get_price_in_usd(provider, token),
			|price: &PriceResult| {
				let fresh = !config.staleness.is_stale(token, price.updated_at, now);
				(!price.is_unavailable() && fresh).then_some(price.price_in_usd)
			},
		)
		.await
	}

	/// Pair quote with both legs checked against their own stale periods.
	pub async fn quote(
		&self,
		token_in: Address,
		token_out: Address,
		amount_in: U256,
	) -> Result<PairQuote> {
		let config = self.config.load_full();
		let now = self.clock.now();

		self.resolve(
			&config,
			"quote",
			move |provider| {
				self.registry
					.quote(provider, token_in, provider, token_out, amount_in)
			},
			|quote: &PairQuote| {
				let fresh = !config.staleness.is_stale(token_in, quote.updated_at_in, now)
					&& !config.staleness.is_stale(token_out, quote.updated_at_out, now);
				(!quote.is_unavailable() && fresh).then_some(quote.amount_out)
			},
		)
		.await
	}

	pub async fn quote_token_to_usd(&self, token: Address, amount: U256) -> Result<AmountQuote> {
		let config = self.config.load_full();
		let now = self.clock.now();

		self.resolve(
			&config,
			"quote_token_to_usd",
			move |provider| self.registry.quote_token_to_usd(provider, token, amount),
			|quote: &AmountQuote| amount_value(&config, token, quote, now),
		)
		.await
	}

	pub async fn quote_usd_to_token(&self, token: Address, usd_amount: U256) -> Result<AmountQuote> {
		let config = self.config.load_full();
		let now = self.clock.now();

		self.resolve(
			&config,
			"quote_usd_to_token",
			move |provider| self.registry.quote_usd_to_token(provider, token, usd_amount),
			|quote: &AmountQuote| amount_value(&config, token, quote, now),
		)
		.await
	}

	async fn resolve<T, F, Fut, U>(
		&self,
		config: &FallbackConfig,
		operation: &'static str,
		fetch: F,
		usable: U,
	) -> Result<T>
	where
		F: Fn(ProviderId) -> Fut,
		Fut: Future<Output = Result<T>>,
		U: Fn(&T) -> Option<U256>,
	{
		if let Some(primary) = self
			.attempt(config.primary, operation, &fetch, &usable)
			.await?
		{
			return Ok(primary.answer);
		}

		let Some(fallback_a) = config.fallback_a.configured() else {
			warn!(oracle = %self.name, operation, primary = %config.primary, "Primary unusable and no fallback configured");
			return Err(OracleError::PrimaryFailed(config.primary));
		};
		let a = self.attempt(fallback_a, operation, &fetch, &usable).await?;

		let Some(fallback_b) = config.fallback_b.configured() else {
			return match a {
				Some(a) => {
					debug!(oracle = %self.name, operation, provider = %fallback_a, "Resolved from fallback A");
					Ok(a.answer)
				}
				None => Err(OracleError::FallbackAFailed),
			};
		};
		let b = self.attempt(fallback_b, operation, &fetch, &usable).await?;

		match (a, b) {
			(Some(a), None) => Ok(a.answer),
			(None, Some(b)) => Ok(b.answer),
			(None, None) => Err(OracleError::FallbacksFailed),
			(Some(a), Some(b)) => {
				if config.deviation.is_deviation_ok(a.value, b.value) {
					debug!(oracle = %self.name, operation, "Fallbacks agree, using fallback A");
					Ok(a.answer)
				} else {
					warn!(
						oracle = %self.name,
						operation,
						fallback_a = %a.value,
						fallback_b = %b.value,
						max_deviation = %config.deviation.max_deviation(),
						"Fallback prices deviate too much"
					);
					Err(OracleError::PricesDeviationTooHigh)
				}
			}
		}
	}

	/// Queries one provider. `Ok(None)` means the answer exists but cannot be
	/// used.
	async fn attempt<T, F, Fut, U>(
		&self,
		provider: ProviderId,
		operation: &'static str,
		fetch: &F,
		usable: &U,
	) -> Result<Option<Usable<T>>>
	where
		F: Fn(ProviderId) -> Fut,
		Fut: Future<Output = Result<T>>,
		U: Fn(&T) -> Option<U256>,
	{
		match fetch(provider).await {
			Ok(answer) => match usable(&answer) {
				Some(value) => Ok(Some(Usable { answer, value })),
				None => {
					warn!(oracle = %self.name, operation, %provider, "Answer is zero or stale");
					Ok(None)
				}
			},
			Err(e) if e.is_source_failure() => {
				warn!(oracle = %self.name, operation, %provider, error = %e, "Provider failed");
				Ok(None)
			}
			Err(e) => Err(e),
		}
	}

	/// Rejects providers whose registered source is this oracle, which
	/// would make every read resolve through itself.
	fn ensure_not_self(&self, providers: &[ProviderId]) -> Result<()> {
		let this = (self as *const Self).cast::<()>();
		for &id in providers {
			let Ok(source) = self.registry.source(id) else {
				continue;
			};
			if Arc::as_ptr(&source).cast::<()>() == this {
				return Err(OracleError::InvalidFallbackConfig(format!(
					"provider {} resolves to oracle {}",
					id, self.name
				)));
			}
		}
		Ok(())
	}

	pub fn update_primary_provider(&self, caller: Address, primary: ProviderId) -> Result<()> {
		self.governance.ensure_owner(caller)?;
		if primary.is_none() {
			return Err(OracleError::InvalidProvider);
		}
		let (fallback_a, fallback_b) = {
			let current = self.config.load();
			(current.fallback_a, current.fallback_b)
		};
		check_fallbacks(primary, fallback_a, fallback_b)?;
		self.ensure_not_self(&[primary])?;

		self.config.rcu(|current| FallbackConfig {
			primary,
			..FallbackConfig::clone(current)
		});

		info!(oracle = %self.name, %primary, "Primary provider updated");
		self.events.publish(GovernanceEvent::PrimaryProviderUpdated {
			oracle: self.name.clone(),
			primary,
		});
		Ok(())
	}

	/// Sets both fallbacks. `None` clears a slot; B alone is rejected.
	pub fn update_fallback_providers(
		&self,
		caller: Address,
		fallback_a: ProviderId,
		fallback_b: ProviderId,
	) -> Result<()> {
		self.governance.ensure_owner(caller)?;
		check_fallbacks(self.config.load().primary, fallback_a, fallback_b)?;
		self.ensure_not_self(&[fallback_a, fallback_b])?;

		self.config.rcu(|current| FallbackConfig {
			fallback_a,
			fallback_b,
			..FallbackConfig::clone(current)
		});

		info!(oracle = %self.name, %fallback_a, %fallback_b, "Fallback providers updated");
		self.events.publish(GovernanceEvent::FallbackProvidersUpdated {
			oracle: self.name.clone(),
			fallback_a,
			fallback_b,
		});
		Ok(())
	}

	pub fn update_stale_period(&self, caller: Address, period_secs: u64) -> Result<()> {
		self.governance.ensure_owner(caller)?;

		self.config.rcu(|current| {
			let mut config = FallbackConfig::clone(current);
			config.staleness.set_default_period(period_secs);
			config
		});

		info!(oracle = %self.name, period_secs, "Stale period updated");
		self.events.publish(GovernanceEvent::StalePeriodUpdated {
			component: self.name.clone(),
			period_secs,
		});
		Ok(())
	}

	/// Overrides the stale period of one asset. Zero restores the default.
	pub fn update_custom_stale_period(
		&self,
		caller: Address,
		asset: Address,
		period_secs: u64,
	) -> Result<()> {
		self.governance.ensure_owner(caller)?;
		if asset == Address::ZERO {
			return Err(OracleError::InvalidAddress(
				"custom stale period asset must not be zero".to_string(),
			));
		}

		self.config.rcu(|current| {
			let mut config = FallbackConfig::clone(current);
			config.staleness.set_override(asset, period_secs);
			config
		});

		info!(oracle = %self.name, %asset, period_secs, "Custom stale period updated");
		self.events.publish(GovernanceEvent::CustomStalePeriodUpdated {
			component: self.name.clone(),
			asset,
			period_secs,
		});
		Ok(())
	}

	pub fn update_max_deviation(&self, caller: Address, max_deviation: U256) -> Result<()> {
		self.governance.ensure_owner(caller)?;
		let deviation = DeviationPolicy::new(max_deviation)?;

		self.config.rcu(|current| FallbackConfig {
			deviation,
			..FallbackConfig::clone(current)
		});

		info!(oracle = %self.name, %max_deviation, "Max deviation updated");
		self.events.publish(GovernanceEvent::MaxDeviationUpdated {
			component: self.name.clone(),
			max_deviation,
		});
		Ok(())
	}
}

fn amount_value(
	config: &FallbackConfig,
	token: Address,
	quote: &AmountQuote,
	now: Timestamp,
) -> Option<U256> {
	let fresh = !config.staleness.is_stale(token, quote.updated_at, now);
	(!quote.is_unavailable() && fresh).then_some(quote.amount_out)
}

fn rejected(error: OracleError) -> SourceError {
	SourceError::Rejected(error.to_string())
}

/// Lets a fallback oracle stand in as a source of another fallback oracle.
#[async_trait]
impl PriceSourceInterface for FallbackOracle {
	fn name(&self) -> &str {
		&self.name
	}

	async fn get_price_in_usd(&self, token: Address) -> std::result::Result<PriceResult, SourceError> {
		FallbackOracle::get_price_in_usd(self, token)
			.await
			.map_err(rejected)
	}

	async fn quote(
		&self,
		token_in: Address,
		token_out: Address,
		amount_in: U256,
	) -> std::result::Result<PairQuote, SourceError> {
		FallbackOracle::quote(self, token_in, token_out, amount_in)
			.await
			.map_err(rejected)
	}

	async fn quote_token_to_usd(
		&self,
		token: Address,
		amount: U256,
	) -> std::result::Result<AmountQuote, SourceError> {
		FallbackOracle::quote_token_to_usd(self, token, amount)
			.await
			.map_err(rejected)
	}

	async fn quote_usd_to_token(
		&self,
		token: Address,
		usd_amount: U256,
	) -> std::result::Result<AmountQuote, SourceError> {
		FallbackOracle::quote_usd_to_token(self, token, usd_amount)
			.await
			.map_err(rejected)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_utils::{asset, usd, MockAnswer, MockSource, NOW};
	use oracle_types::{wad, FixedClock};
	use std::time::Duration;

	const OWNER: Address = Address::with_last_byte(0xaa);
	const PERIOD: u64 = 3600;

	struct Harness {
		registry: Arc<ProviderRegistry>,
		primary: Arc<MockSource>,
		a: Arc<MockSource>,
		b: Arc<MockSource>,
		clock: Arc<FixedClock>,
		events: EventBus,
	}

	impl Harness {
		fn new() -> Self {
			let events = EventBus::default();
			let registry = Arc::new(
				ProviderRegistry::new(Governance::new(OWNER).unwrap(), events.clone())
					.with_timeout(Duration::from_millis(20)),
			);
			let primary = Arc::new(MockSource::new("primary"));
			let a = Arc::new(MockSource::new("a"));
			let b = Arc::new(MockSource::new("b"));
			registry
				.set_provider(OWNER, ProviderId::PushFeed, primary.clone())
				.unwrap();
			registry
				.set_provider(OWNER, ProviderId::AmmV3, a.clone())
				.unwrap();
			registry
				.set_provider(OWNER, ProviderId::PullFeed, b.clone())
				.unwrap();

			Self {
				registry,
				primary,
				a,
				b,
				clock: Arc::new(FixedClock::new(NOW)),
				events,
			}
		}

		fn config(&self, fallback_a: ProviderId, fallback_b: ProviderId) -> FallbackConfig {
			FallbackConfig::new(
				ProviderId::PushFeed,
				StalenessPolicy::new(PERIOD),
				DeviationPolicy::new(wad() / U256::from(20)).unwrap(),
			)
			.with_fallbacks(fallback_a, fallback_b)
		}

		fn oracle(&self, fallback_a: ProviderId, fallback_b: ProviderId) -> FallbackOracle {
			FallbackOracle::new(
				"eth",
				self.registry.clone(),
				self.config(fallback_a, fallback_b),
				Governance::new(OWNER).unwrap(),
				self.events.clone(),
				self.clock.clone(),
			)
			.unwrap()
		}

		fn full(&self) -> FallbackOracle {
			self.oracle(ProviderId::AmmV3, ProviderId::PullFeed)
		}
	}

	fn price(units: u64) -> MockAnswer {
		MockAnswer::Price(usd(units), NOW)
	}

	fn unavailable() -> MockAnswer {
		MockAnswer::Price(U256::ZERO, 0)
	}

	#[tokio::test]
	async fn test_primary_used_without_touching_fallbacks() {
		let h = Harness::new();
		h.primary.set_all(price(3000));

		let result = h.full().get_price_in_usd(asset(1)).await.unwrap();
		assert_eq!(result.price_in_usd, usd(3000));
		assert_eq!(h.a.calls(), 0);
		assert_eq!(h.b.calls(), 0);
	}

	#[tokio::test]
	async fn test_fallback_a_alone() {
		let h = Harness::new();
		h.primary.set_all(unavailable());
		h.a.set_all(price(3000));

		let oracle = h.oracle(ProviderId::AmmV3, ProviderId::None);
		let result = oracle.get_price_in_usd(asset(1)).await.unwrap();
		assert_eq!(result.price_in_usd, usd(3000));
		assert_eq!(h.b.calls(), 0);

		h.a.set_all(unavailable());
		assert_eq!(
			oracle.get_price_in_usd(asset(1)).await,
			Err(OracleError::FallbackAFailed)
		);
	}

	#[tokio::test]
	async fn test_agreeing_fallbacks_prefer_a() {
		let h = Harness::new();
		h.primary.set_all(unavailable());
		h.a.set_all(price(3000));
		h.b.set_all(price(2990));

		let result = h.full().get_price_in_usd(asset(1)).await.unwrap();
		assert_eq!(result.price_in_usd, usd(3000));
	}

	#[tokio::test]
	async fn test_a_preferred_even_when_b_is_fresher() {
		let h = Harness::new();
		h.primary.set_all(unavailable());
		h.a.set_all(MockAnswer::Price(usd(3000), NOW - 100));
		h.b.set_all(MockAnswer::Price(usd(3001), NOW));

		let result = h.full().get_price_in_usd(asset(1)).await.unwrap();
		assert_eq!(result, PriceResult::new(usd(3000), NOW - 100));
	}

	#[tokio::test]
	async fn test_disagreeing_fallbacks_fail() {
		let h = Harness::new();
		h.primary.set_all(unavailable());
		h.a.set_all(price(3000));
		h.b.set_all(price(2000));

		assert_eq!(
			h.full().get_price_in_usd(asset(1)).await,
			Err(OracleError::PricesDeviationTooHigh)
		);
	}

	#[tokio::test]
	async fn test_everything_unavailable() {
		let h = Harness::new();
		for source in [&h.primary, &h.a, &h.b] {
			source.set_all(unavailable());
		}

		assert_eq!(
			h.full().get_price_in_usd(asset(1)).await,
			Err(OracleError::FallbacksFailed)
		);
	}

	#[tokio::test]
	async fn test_single_usable_fallback_wins() {
		let h = Harness::new();
		h.primary.set_all(unavailable());
		h.a.set_all(unavailable());
		h.b.set_all(price(2000));
		assert_eq!(
			h.full().get_price_in_usd(asset(1)).await.unwrap().price_in_usd,
			usd(2000)
		);

		h.a.set_all(price(3000));
		h.b.set_all(unavailable());
		assert_eq!(
			h.full().get_price_in_usd(asset(1)).await.unwrap().price_in_usd,
			usd(3000)
		);
	}

	#[tokio::test]
	async fn test_primary_only_config() {
		let h = Harness::new();
		h.primary.set_all(unavailable());

		assert_eq!(
			h.oracle(ProviderId::None, ProviderId::None)
				.get_price_in_usd(asset(1))
				.await,
			Err(OracleError::PrimaryFailed(ProviderId::PushFeed))
		);
	}

	#[tokio::test]
	async fn test_either_zero_field_is_unusable() {
		let h = Harness::new();
		let oracle = h.oracle(ProviderId::AmmV3, ProviderId::None);
		h.a.set_all(price(3000));

		for answer in [
			MockAnswer::Price(U256::ZERO, NOW),
			MockAnswer::Price(usd(2500), 0),
			MockAnswer::Price(U256::ZERO, 0),
		] {
			h.primary.set_all(answer);
			let result = oracle.get_price_in_usd(asset(1)).await.unwrap();
			assert_eq!(result.price_in_usd, usd(3000));
		}
	}

	#[tokio::test]
	async fn test_stale_primary_boundary() {
		let h = Harness::new();
		let oracle = h.oracle(ProviderId::AmmV3, ProviderId::None);
		h.a.set_all(price(1));

		h.primary
			.set_all(MockAnswer::Price(usd(3000), NOW - PERIOD + 1));
		assert_eq!(
			oracle.get_price_in_usd(asset(1)).await.unwrap().price_in_usd,
			usd(3000)
		);

		h.primary
			.set_all(MockAnswer::Price(usd(3000), NOW - PERIOD - 1));
		assert_eq!(
			oracle.get_price_in_usd(asset(1)).await.unwrap().price_in_usd,
			usd(1)
		);
	}

	#[tokio::test]
	async fn test_custom_stale_period() {
		let h = Harness::new();
		let oracle = h.oracle(ProviderId::AmmV3, ProviderId::None);
		h.primary.set_all(MockAnswer::Price(usd(3000), NOW - 120));
		h.a.set_all(price(1));

		oracle
			.update_custom_stale_period(OWNER, asset(1), 60)
			.unwrap();
		assert_eq!(
			oracle.get_price_in_usd(asset(1)).await.unwrap().price_in_usd,
			usd(1)
		);
		// other assets keep the default period
		assert_eq!(
			oracle.get_price_in_usd(asset(2)).await.unwrap().price_in_usd,
			usd(3000)
		);

		oracle.update_custom_stale_period(OWNER, asset(1), 0).unwrap();
		assert_eq!(
			oracle.get_price_in_usd(asset(1)).await.unwrap().price_in_usd,
			usd(3000)
		);
	}

	#[tokio::test]
	async fn test_leaf_errors_and_timeouts_trigger_fallback() {
		let h = Harness::new();
		h.primary.set_all(MockAnswer::Fail("reverted".to_string()));
		h.a.set_all(MockAnswer::Hang);
		h.b.set_all(price(2000));

		let result = h.full().get_price_in_usd(asset(1)).await.unwrap();
		assert_eq!(result.price_in_usd, usd(2000));
	}

	#[tokio::test]
	async fn test_unregistered_provider_propagates() {
		let h = Harness::new();
		h.primary.set_all(unavailable());
		let oracle = h.oracle(ProviderId::LpToken, ProviderId::None);

		assert_eq!(
			oracle.get_price_in_usd(asset(1)).await,
			Err(OracleError::ProviderNotRegistered(ProviderId::LpToken))
		);
	}

	#[tokio::test]
	async fn test_conversions_follow_same_tree() {
		let h = Harness::new();
		h.primary.set_all(unavailable());
		h.a.set_all(price(3000));
		h.b.set_all(price(2000));
		let oracle = h.full();

		assert_eq!(
			oracle.quote_token_to_usd(asset(1), usd(1)).await,
			Err(OracleError::PricesDeviationTooHigh)
		);
		assert_eq!(
			oracle.quote_usd_to_token(asset(1), usd(6000)).await,
			Err(OracleError::PricesDeviationTooHigh)
		);

		h.b.set_all(price(2990));
		let to_usd = oracle.quote_token_to_usd(asset(1), usd(2)).await.unwrap();
		assert_eq!(to_usd.amount_out, usd(6000));
		let to_token = oracle.quote_usd_to_token(asset(1), usd(6000)).await.unwrap();
		assert_eq!(to_token.amount_out, usd(2));
	}

	#[tokio::test]
	async fn test_pair_quote_checks_both_legs() {
		let h = Harness::new();
		let oracle = h.oracle(ProviderId::AmmV3, ProviderId::None);
		h.primary.set(asset(1), price(3000));
		h.primary
			.set(asset(2), MockAnswer::Price(usd(1), NOW - PERIOD - 1));
		h.a.set(asset(1), price(3000));
		h.a.set(asset(2), price(2));

		let quote = oracle.quote(asset(1), asset(2), usd(1)).await.unwrap();
		assert_eq!(quote.amount_out, usd(1500));

		h.a.set(asset(2), unavailable());
		assert_eq!(
			oracle.quote(asset(1), asset(2), usd(1)).await,
			Err(OracleError::FallbackAFailed)
		);
	}

	#[tokio::test]
	async fn test_governance_updates() {
		let h = Harness::new();
		let oracle = h.oracle(ProviderId::AmmV3, ProviderId::None);
		let mut events = h.events.subscribe();
		let stranger = Address::with_last_byte(0xbb);

		assert_eq!(
			oracle.update_fallback_providers(stranger, ProviderId::AmmV3, ProviderId::PullFeed),
			Err(OracleError::Unauthorized(stranger))
		);
		assert!(matches!(
			oracle.update_fallback_providers(OWNER, ProviderId::None, ProviderId::PullFeed),
			Err(OracleError::InvalidFallbackConfig(_))
		));
		assert!(matches!(
			oracle.update_fallback_providers(OWNER, ProviderId::PushFeed, ProviderId::None),
			Err(OracleError::InvalidFallbackConfig(_))
		));

		oracle
			.update_fallback_providers(OWNER, ProviderId::AmmV3, ProviderId::PullFeed)
			.unwrap();
		assert_eq!(oracle.config().fallback_b, ProviderId::PullFeed);
		assert_eq!(
			events.recv().await.unwrap(),
			GovernanceEvent::FallbackProvidersUpdated {
				oracle: "eth".to_string(),
				fallback_a: ProviderId::AmmV3,
				fallback_b: ProviderId::PullFeed,
			}
		);

		assert_eq!(
			oracle.update_primary_provider(OWNER, ProviderId::None),
			Err(OracleError::InvalidProvider)
		);
		oracle
			.update_primary_provider(OWNER, ProviderId::Passport)
			.unwrap();
		assert_eq!(oracle.config().primary, ProviderId::Passport);

		assert!(matches!(
			oracle.update_max_deviation(OWNER, U256::ZERO),
			Err(OracleError::InvalidDeviation(_))
		));
		oracle.update_max_deviation(OWNER, wad() / U256::from(100)).unwrap();
		assert_eq!(
			oracle.config().deviation.max_deviation(),
			wad() / U256::from(100)
		);

		oracle.update_stale_period(OWNER, 60).unwrap();
		assert_eq!(oracle.config().staleness.default_period(), 60);
	}

	#[tokio::test]
	async fn test_invalid_construction() {
		let h = Harness::new();
		let invalid = FallbackOracle::new(
			"broken",
			h.registry.clone(),
			h.config(ProviderId::None, ProviderId::PullFeed),
			Governance::new(OWNER).unwrap(),
			h.events.clone(),
			h.clock.clone(),
		);
		assert!(matches!(
			invalid,
			Err(OracleError::InvalidFallbackConfig(_))
		));
	}

	#[tokio::test]
	async fn test_rejects_providers_resolving_to_itself() {
		let h = Harness::new();
		h.primary.set_all(unavailable());
		h.a.set_all(price(3000));

		let oracle = Arc::new(h.oracle(ProviderId::AmmV3, ProviderId::None));
		h.registry
			.set_provider(OWNER, ProviderId::Composite, oracle.clone())
			.unwrap();

		assert!(matches!(
			oracle.update_fallback_providers(OWNER, ProviderId::Composite, ProviderId::None),
			Err(OracleError::InvalidFallbackConfig(_))
		));
		assert!(matches!(
			oracle.update_fallback_providers(OWNER, ProviderId::AmmV3, ProviderId::Composite),
			Err(OracleError::InvalidFallbackConfig(_))
		));
		assert!(matches!(
			oracle.update_primary_provider(OWNER, ProviderId::Composite),
			Err(OracleError::InvalidFallbackConfig(_))
		));

		assert_eq!(
			*oracle.config(),
			h.config(ProviderId::AmmV3, ProviderId::None)
		);
		let result = oracle.get_price_in_usd(asset(1)).await.unwrap();
		assert_eq!(result.price_in_usd, usd(3000));

		// Another oracle may still use this one under the same id.
		let outer = h.oracle(ProviderId::AmmV3, ProviderId::None);
		outer
			.update_fallback_providers(OWNER, ProviderId::Composite, ProviderId::None)
			.unwrap();
		assert_eq!(outer.config().fallback_a, ProviderId::Composite);
	}

	#[tokio::test]
	async fn test_composes_as_source_of_another_oracle() {
		let h = Harness::new();
		h.primary.set_all(unavailable());
		h.a.set_all(price(3000));
		h.b.set_all(price(2990));

		let inner = Arc::new(h.full());
		h.registry
			.set_provider(OWNER, ProviderId::Composite, inner)
			.unwrap();

		let outer = FallbackOracle::new(
			"outer",
			h.registry.clone(),
			FallbackConfig::new(
				ProviderId::Passport,
				StalenessPolicy::new(PERIOD),
				DeviationPolicy::new(wad()).unwrap(),
			)
			.with_fallbacks(ProviderId::Composite, ProviderId::None),
			Governance::new(OWNER).unwrap(),
			h.events.clone(),
			h.clock.clone(),
		)
		.unwrap();

		// Passport is unregistered, so the outer primary propagates.
		assert_eq!(
			outer.get_price_in_usd(asset(1)).await,
			Err(OracleError::ProviderNotRegistered(ProviderId::Passport))
		);

		outer
			.update_primary_provider(OWNER, ProviderId::PushFeed)
			.unwrap();
		let result = outer.get_price_in_usd(asset(1)).await.unwrap();
		assert_eq!(result.price_in_usd, usd(3000));

		// A failing inner oracle is an ordinary source failure for the outer one.
		h.a.set_all(unavailable());
		h.b.set_all(unavailable());
		assert_eq!(
			outer.get_price_in_usd(asset(1)).await,
			Err(OracleError::FallbackAFailed)
		);
	}
}
