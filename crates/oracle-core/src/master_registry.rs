//! Master registry.
//!
//! Per-asset table of which oracle prices the asset, with one optional
//! default oracle for every asset without an entry. The registry rejects a
//! zero price or timestamp; all freshness and deviation checks happened in
//! the oracle.

use crate::fallback::FallbackOracle;
use crate::governance::Governance;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use oracle_types::{Address, EventBus, GovernanceEvent, OracleError, PriceResult, Result, U256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Anything the master registry can delegate an asset price to.
#[async_trait]
pub trait PriceOracle: Send + Sync {
	fn name(&self) -> &str;

	async fn get_price_in_usd(&self, asset: Address) -> Result<PriceResult>;
}

#[async_trait]
impl PriceOracle for FallbackOracle {
	fn name(&self) -> &str {
		FallbackOracle::name(self)
	}

	async fn get_price_in_usd(&self, asset: Address) -> Result<PriceResult> {
		FallbackOracle::get_price_in_usd(self, asset).await
	}
}

#[derive(Clone, Default)]
struct OracleTable {
	tokens: HashMap<Address, Arc<dyn PriceOracle>>,
	default: Option<Arc<dyn PriceOracle>>,
}

pub struct MasterRegistry {
	table: ArcSwap<OracleTable>,
	governance: Governance,
	events: EventBus,
}

impl MasterRegistry {
	pub fn new(governance: Governance, events: EventBus) -> Self {
		Self {
			table: ArcSwap::from_pointee(OracleTable::default()),
			governance,
			events,
		}
	}

	pub fn update_token_oracle(
		&self,
		caller: Address,
		asset: Address,
		oracle: Arc<dyn PriceOracle>,
	) -> Result<()> {
		self.governance.ensure_owner(caller)?;
		if asset == Address::ZERO {
			return Err(OracleError::InvalidAddress(
				"asset must not be the zero address".to_string(),
			));
		}

		let name = oracle.name().to_string();
		self.table.rcu(|current| {
			let mut table = OracleTable::clone(current);
			table.tokens.insert(asset, oracle.clone());
			table
		});

		info!(%asset, oracle = %name, "Token oracle updated");
		self.events
			.publish(GovernanceEvent::TokenOracleUpdated { asset, oracle: name });
		Ok(())
	}

	/// Drops the entry for `asset`; the asset then resolves via the default.
	pub fn remove_token_oracle(&self, caller: Address, asset: Address) -> Result<()> {
		self.governance.ensure_owner(caller)?;
		if !self.table.load().tokens.contains_key(&asset) {
			return Err(OracleError::OracleNotSet(asset));
		}

		self.table.rcu(|current| {
			let mut table = OracleTable::clone(current);
			table.tokens.remove(&asset);
			table
		});

		info!(%asset, "Token oracle removed");
		self.events
			.publish(GovernanceEvent::TokenOracleRemoved { asset });
		Ok(())
	}

	pub fn set_default_oracle(&self, caller: Address, oracle: Arc<dyn PriceOracle>) -> Result<()> {
		self.governance.ensure_owner(caller)?;

		let name = oracle.name().to_string();
		self.table.rcu(|current| OracleTable {
			default: Some(oracle.clone()),
			..OracleTable::clone(current)
		});

		info!(oracle = %name, "Default oracle updated");
		self.events
			.publish(GovernanceEvent::DefaultOracleUpdated { oracle: name });
		Ok(())
	}

	/// Oracle consulted for `asset`: its own entry, else the default.
	pub fn oracle_for(&self, asset: Address) -> Result<Arc<dyn PriceOracle>> {
		let table = self.table.load();
		table
			.tokens
			.get(&asset)
			.or(table.default.as_ref())
			.cloned()
			.ok_or(OracleError::OracleNotSet(asset))
	}

	/// Assets with an explicit entry.
	pub fn tokens(&self) -> Vec<Address> {
		let mut tokens: Vec<_> = self.table.load().tokens.keys().copied().collect();
		tokens.sort();
		tokens
	}

	pub async fn get_price(&self, asset: Address) -> Result<PriceResult> {
		let oracle = self.oracle_for(asset)?;
		let price = oracle.get_price_in_usd(asset).await?;
		if price.is_unavailable() {
			return Err(OracleError::InvalidTokenPrice(asset));
		}
		debug!(%asset, oracle = oracle.name(), price = %price.price_in_usd, "Resolved asset price");
		Ok(price)
	}

	/// USD price of one whole `asset` on the 18-decimal scale.
	pub async fn get_price_in_usd(&self, asset: Address) -> Result<U256> {
		Ok(self.get_price(asset).await?.price_in_usd)
	}
}
