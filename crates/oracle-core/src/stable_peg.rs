//! Stable coin peg helper.
//!
//! Picks whichever of two configured stable coins currently trades within
//! tolerance of one dollar, and rescales amounts of the primary coin to the
//! 18-decimal USD scale. AMM based sources use it to value pools that have
//! no direct USD leg.

use crate::governance::Governance;
use crate::policy::{is_stale, DeviationPolicy};
use crate::provider_registry::ProviderRegistry;
use arc_swap::ArcSwap;
use oracle_types::{
	rescale, wad, Address, Clock, EventBus, GovernanceEvent, OracleError, ProviderId, Result,
	U256, USD_DECIMALS,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

const COMPONENT: &str = "stable_peg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StableCoin {
	pub address: Address,
	pub decimals: u8,
}

impl StableCoin {
	pub fn new(address: Address, decimals: u8) -> Self {
		Self { address, decimals }
	}
}

/// Governance-owned peg configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StablePegState {
	pub provider: ProviderId,
	pub primary: StableCoin,
	pub secondary: StableCoin,
	pub stale_period: u64,
	pub deviation: DeviationPolicy,
}

impl StablePegState {
	pub fn validate(&self) -> Result<()> {
		if self.provider.is_none() {
			return Err(OracleError::InvalidProvider);
		}
		check_coins(&self.primary, &self.secondary)
	}
}

fn check_coins(primary: &StableCoin, secondary: &StableCoin) -> Result<()> {
	if primary.address == Address::ZERO || secondary.address == Address::ZERO {
		return Err(OracleError::InvalidAddress(
			"stable coin address must not be zero".to_string(),
		));
	}
	if primary.address == secondary.address {
		return Err(OracleError::SameStableCoins(primary.address));
	}
	Ok(())
}

pub struct StablePegHelper {
	registry: Arc<ProviderRegistry>,
	state: ArcSwap<StablePegState>,
	governance: Governance,
	events: EventBus,
	clock: Arc<dyn Clock>,
}

impl StablePegHelper {
	pub fn new(
		registry: Arc<ProviderRegistry>,
		state: StablePegState,
		governance: Governance,
		events: EventBus,
		clock: Arc<dyn Clock>,
	) -> Result<Self> {
		state.validate()?;
		Ok(Self {
			registry,
			state: ArcSwap::from_pointee(state),
			governance,
			events,
			clock,
		})
	}

	pub fn state(&self) -> Arc<StablePegState> {
		self.state.load_full()
	}

	/// Returns the primary coin if it holds its peg, else the secondary if
	/// that one does.
	///
	/// Both prices must be present and fresh even when the primary alone
	/// would decide the answer.
	pub async fn get_stable_coin_if_pegged(&self) -> Result<StableCoin> {
		let state = self.state.load_full();

		let primary_price = self.fetch_price(&state, &state.primary).await?;
		let secondary_price = self.fetch_price(&state, &state.secondary).await?;
		let (Some(primary_price), Some(secondary_price)) = (primary_price, secondary_price) else {
			return Err(OracleError::StablePricesInvalid(
				"stable coin price is zero or stale".to_string(),
			));
		};

		if state.deviation.is_deviation_ok(primary_price, wad()) {
			return Ok(state.primary);
		}
		if state.deviation.is_deviation_ok(secondary_price, wad()) {
			debug!(
				primary = %state.primary.address,
				price = %primary_price,
				"Primary stable coin off peg, using secondary"
			);
			return Ok(state.secondary);
		}

		warn!(
			primary = %primary_price,
			secondary = %secondary_price,
			"Both stable coins are off peg"
		);
		Err(OracleError::StablePricesInvalid(
			"both stable coins are off peg".to_string(),
		))
	}

	/// Rescales an amount in the primary coin's decimals to 18 decimals.
	pub fn to_usd_representation(&self, amount: U256) -> Result<U256> {
		let decimals = self.state.load().primary.decimals;
		rescale(amount, decimals, USD_DECIMALS).ok_or_else(|| {
			OracleError::MathOverflow(format!(
				"rescaling {} from {} decimals",
				amount, decimals
			))
		})
	}

	async fn fetch_price(&self, state: &StablePegState, coin: &StableCoin) -> Result<Option<U256>> {
		match self
			.registry
			.get_price_in_usd(state.provider, coin.address)
			.await
		{
			Ok(price) => {
				let stale = is_stale(price.updated_at, state.stale_period, self.clock.now());
				if price.is_unavailable() || stale {
					warn!(coin = %coin.address, updated_at = price.updated_at, "Stable coin price unusable");
					return Ok(None);
				}
				Ok(Some(price.price_in_usd))
			}
			Err(e) if e.is_source_failure() => {
				warn!(coin = %coin.address, error = %e, "Stable coin price unavailable");
				Ok(None)
			}
			Err(e) => Err(e),
		}
	}

	pub fn update_stable_coins(
		&self,
		caller: Address,
		primary: StableCoin,
		secondary: StableCoin,
	) -> Result<()> {
		self.governance.ensure_owner(caller)?;
		check_coins(&primary, &secondary)?;

		self.state.rcu(|current| StablePegState {
			primary,
			secondary,
			..StablePegState::clone(current)
		});

		info!(primary = %primary.address, secondary = %secondary.address, "Stable coins updated");
		self.events.publish(GovernanceEvent::StableCoinsUpdated {
			primary: primary.address,
			secondary: secondary.address,
		});
		Ok(())
	}

	pub fn update_stale_period(&self, caller: Address, period_secs: u64) -> Result<()> {
		self.governance.ensure_owner(caller)?;

		self.state.rcu(|current| StablePegState {
			stale_period: period_secs,
			..StablePegState::clone(current)
		});

		info!(period_secs, "Stable peg stale period updated");
		self.events.publish(GovernanceEvent::StalePeriodUpdated {
			component: COMPONENT.to_string(),
			period_secs,
		});
		Ok(())
	}

	pub fn update_max_deviation(&self, caller: Address, max_deviation: U256) -> Result<()> {
		self.governance.ensure_owner(caller)?;
		let deviation = DeviationPolicy::new(max_deviation)?;

		self.state.rcu(|current| StablePegState {
			deviation,
			..StablePegState::clone(current)
		});

		info!(%max_deviation, "Stable peg max deviation updated");
		self.events.publish(GovernanceEvent::MaxDeviationUpdated {
			component: COMPONENT.to_string(),
			max_deviation,
		});
		Ok(())
	}
}
