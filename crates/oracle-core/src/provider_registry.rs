//! Provider registry.
//!
//! Maps each [`ProviderId`] to at most one concrete source and dispatches
//! requests to it. The registry applies no price policy of its own; it only
//! resolves ids, bounds every leaf call with a timeout and translates leaf
//! errors into [`OracleError`]s.

use crate::governance::Governance;
use arc_swap::ArcSwap;
use oracle_sources::{PriceSourceInterface, SourceError};
use oracle_types::{
	Address, AmountQuote, EventBus, GovernanceEvent, OracleError, PairQuote, PriceResult,
	ProviderId, Result, U256,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

type SourceTable = HashMap<ProviderId, Arc<dyn PriceSourceInterface>>;

pub struct ProviderRegistry {
	sources: ArcSwap<SourceTable>,
	governance: Governance,
	events: EventBus,
	timeout: Duration,
}

impl ProviderRegistry {
	pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

	pub fn new(governance: Governance, events: EventBus) -> Self {
		Self {
			sources: ArcSwap::from_pointee(HashMap::new()),
			governance,
			events,
			timeout: Self::DEFAULT_TIMEOUT,
		}
	}

	/// Upper bound for a single leaf call.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Registers `source` under `id`, replacing any previous source.
	pub fn set_provider(
		&self,
		caller: Address,
		id: ProviderId,
		source: Arc<dyn PriceSourceInterface>,
	) -> Result<()> {
		self.governance.ensure_owner(caller)?;
		if id.is_none() {
			return Err(OracleError::InvalidProvider);
		}

		let name = source.name().to_string();
		self.sources.rcu(|current| {
			let mut table = SourceTable::clone(current);
			table.insert(id, source.clone());
			table
		});

		info!(provider = %id, source = %name, "Provider set");
		self.events
			.publish(GovernanceEvent::ProviderSet { id, source: name });
		Ok(())
	}

	pub fn remove_provider(&self, caller: Address, id: ProviderId) -> Result<()> {
		self.governance.ensure_owner(caller)?;
		self.source(id)?;

		self.sources.rcu(|current| {
			let mut table = SourceTable::clone(current);
			table.remove(&id);
			table
		});

		info!(provider = %id, "Provider removed");
		self.events.publish(GovernanceEvent::ProviderRemoved { id });
		Ok(())
	}

	/// Resolves `id` to its source, rejecting `None` and unknown ids.
	pub fn source(&self, id: ProviderId) -> Result<Arc<dyn PriceSourceInterface>> {
		if id.is_none() {
			return Err(OracleError::InvalidProvider);
		}
		self.sources
			.load()
			.get(&id)
			.cloned()
			.ok_or(OracleError::ProviderNotRegistered(id))
	}

	/// Registered ids in declaration order.
	pub fn providers(&self) -> Vec<ProviderId> {
		let table = self.sources.load();
		ProviderId::ALL
			.into_iter()
			.filter(|id| table.contains_key(id))
			.collect()
	}

	pub async fn get_price_in_usd(&self, id: ProviderId, token: Address) -> Result<PriceResult> {
		let source = self.source(id)?;
		let price = self.call(id, source.get_price_in_usd(token)).await?;
		debug!(provider = %id, %token, price = %price.price_in_usd, updated_at = price.updated_at, "Price fetched");
		Ok(price)
	}

	pub async fn quote_token_to_usd(
		&self,
		id: ProviderId,
		token: Address,
		amount: U256,
	) -> Result<AmountQuote> {
		let source = self.source(id)?;
		self.call(id, source.quote_token_to_usd(token, amount)).await
	}

	pub async fn quote_usd_to_token(
		&self,
		id: ProviderId,
		token: Address,
		usd_amount: U256,
	) -> Result<AmountQuote> {
		let source = self.source(id)?;
		self.call(id, source.quote_usd_to_token(token, usd_amount)).await
	}

	/// Converts `amount_in` of `token_in` into `token_out`.
	///
	/// With one provider the source's own pair quote is used. Otherwise
	/// `provider_in` prices the input leg in USD and `provider_out` turns
	/// that USD amount into the output token.
	pub async fn quote(
		&self,
		provider_in: ProviderId,
		token_in: Address,
		provider_out: ProviderId,
		token_out: Address,
		amount_in: U256,
	) -> Result<PairQuote> {
		let source_in = self.source(provider_in)?;
		let source_out = self.source(provider_out)?;

		if provider_in == provider_out {
			return self
				.call(provider_in, source_in.quote(token_in, token_out, amount_in))
				.await;
		}

		let usd = self
			.call(provider_in, source_in.quote_token_to_usd(token_in, amount_in))
			.await?;
		let out = self
			.call(
				provider_out,
				source_out.quote_usd_to_token(token_out, usd.amount_out),
			)
			.await?;

		debug!(
			%provider_in,
			%provider_out,
			%token_in,
			%token_out,
			usd = %usd.amount_out,
			amount_out = %out.amount_out,
			"Cross-provider quote"
		);
		Ok(PairQuote::new(out.amount_out, usd.updated_at, out.updated_at))
	}

	async fn call<T, F>(&self, provider: ProviderId, request: F) -> Result<T>
	where
		F: Future<Output = std::result::Result<T, SourceError>>,
	{
		match tokio::time::timeout(self.timeout, request).await {
			Ok(Ok(value)) => Ok(value),
			Ok(Err(e)) => Err(OracleError::SourceFailure {
				provider,
				message: e.to_string(),
			}),
			Err(_) => Err(OracleError::SourceTimeout {
				provider,
				timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
			}),
		}
	}
}
