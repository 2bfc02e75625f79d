use oracle_types::{Address, Timestamp};
use std::collections::HashMap;

/// Allowed period that disables the age check.
pub const NO_STALENESS_CHECK: u64 = u64::MAX;

/// Returns true when a price last updated at `updated_at` is too old at `now`.
///
/// `updated_at == 0` means "never updated" and is always stale. A timestamp
/// ahead of `now` counts as age zero. Exactly `allowed_period` old is fresh.
pub fn is_stale(updated_at: Timestamp, allowed_period: u64, now: Timestamp) -> bool {
	if updated_at == 0 {
		return true;
	}
	now.saturating_sub(updated_at) > allowed_period
}

/// Default allowed age plus per-asset overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalenessPolicy {
	default_period: u64,
	overrides: HashMap<Address, u64>,
}

impl StalenessPolicy {
	pub fn new(default_period: u64) -> Self {
		Self {
			default_period,
			overrides: HashMap::new(),
		}
	}

	pub fn with_override(mut self, asset: Address, period: u64) -> Self {
		self.set_override(asset, period);
		self
	}

	pub fn default_period(&self) -> u64 {
		self.default_period
	}

	pub fn set_default_period(&mut self, period: u64) {
		self.default_period = period;
	}

	/// Sets the override for `asset`. Zero clears it.
	pub fn set_override(&mut self, asset: Address, period: u64) {
		if period == 0 {
			self.overrides.remove(&asset);
		} else {
			self.overrides.insert(asset, period);
		}
	}

	pub fn overrides(&self) -> &HashMap<Address, u64> {
		&self.overrides
	}

	pub fn effective_period(&self, asset: Address) -> u64 {
		match self.overrides.get(&asset) {
			Some(period) if *period != 0 => *period,
			_ => self.default_period,
		}
	}

	pub fn is_stale(&self, asset: Address, updated_at: Timestamp, now: Timestamp) -> bool {
		is_stale(updated_at, self.effective_period(asset), now)
	}
}
