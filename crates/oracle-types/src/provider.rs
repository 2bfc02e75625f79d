//! Provider identifiers.
//!
//! A provider identifier is a small closed tag naming one family of price
//! source. The registry maps each tag to at most one concrete source.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical identifier of a price source family.
///
/// `None` is the "unset" tag. It never resolves to a source and is rejected
/// at every registry boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
	#[default]
	None,
	/// Push-style feeds that publish rounds on their own schedule.
	PushFeed,
	/// Pull-style feeds whose attestation carries its own freshness proof.
	PullFeed,
	/// Constant-product AMM time-weighted observations.
	AmmV2,
	/// Concentrated-liquidity AMM time-weighted observations.
	AmmV3,
	/// Liquidity-pool share valuation.
	LpToken,
	/// Passport-style attested feeds.
	Passport,
	/// A fallback oracle registered back into the registry.
	Composite,
}

impl ProviderId {
	pub const ALL: [ProviderId; 7] = [
		ProviderId::PushFeed,
		ProviderId::PullFeed,
		ProviderId::AmmV2,
		ProviderId::AmmV3,
		ProviderId::LpToken,
		ProviderId::Passport,
		ProviderId::Composite,
	];

	pub fn is_none(&self) -> bool {
		matches!(self, ProviderId::None)
	}

	/// Returns `Some(self)` unless this is the `None` tag.
	pub fn configured(self) -> Option<ProviderId> {
		if self.is_none() {
			None
		} else {
			Some(self)
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			ProviderId::None => "none",
			ProviderId::PushFeed => "push_feed",
			ProviderId::PullFeed => "pull_feed",
			ProviderId::AmmV2 => "amm_v2",
			ProviderId::AmmV3 => "amm_v3",
			ProviderId::LpToken => "lp_token",
			ProviderId::Passport => "passport",
			ProviderId::Composite => "composite",
		}
	}
}

impl fmt::Display for ProviderId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ProviderId {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"none" => Ok(ProviderId::None),
			"push_feed" => Ok(ProviderId::PushFeed),
			"pull_feed" => Ok(ProviderId::PullFeed),
			"amm_v2" => Ok(ProviderId::AmmV2),
			"amm_v3" => Ok(ProviderId::AmmV3),
			"lp_token" => Ok(ProviderId::LpToken),
			"passport" => Ok(ProviderId::Passport),
			"composite" => Ok(ProviderId::Composite),
			other => Err(format!("Unknown provider id: {}", other)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_and_display_agree() {
		for id in ProviderId::ALL {
			assert_eq!(id.to_string().parse::<ProviderId>().unwrap(), id);
		}
		assert_eq!("none".parse::<ProviderId>().unwrap(), ProviderId::None);
		assert!("chainlink".parse::<ProviderId>().is_err());
	}

	#[test]
	fn test_none_is_never_configured() {
		assert!(ProviderId::default().is_none());
		assert_eq!(ProviderId::None.configured(), None);
		assert_eq!(
			ProviderId::PushFeed.configured(),
			Some(ProviderId::PushFeed)
		);
	}
}
