//! Governance change notifications.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::provider::ProviderId;

/// Emitted after every successful governance write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GovernanceEvent {
	ProviderSet {
		id: ProviderId,
		source: String,
	},
	ProviderRemoved {
		id: ProviderId,
	},
	TokenOracleUpdated {
		asset: Address,
		oracle: String,
	},
	TokenOracleRemoved {
		asset: Address,
	},
	DefaultOracleUpdated {
		oracle: String,
	},
	PrimaryProviderUpdated {
		oracle: String,
		primary: ProviderId,
	},
	FallbackProvidersUpdated {
		oracle: String,
		fallback_a: ProviderId,
		fallback_b: ProviderId,
	},
	StalePeriodUpdated {
		component: String,
		period_secs: u64,
	},
	CustomStalePeriodUpdated {
		component: String,
		asset: Address,
		period_secs: u64,
	},
	MaxDeviationUpdated {
		component: String,
		max_deviation: U256,
	},
	StableCoinsUpdated {
		primary: Address,
		secondary: Address,
	},
}

/// Fan-out channel for governance events.
///
/// Publishing without subscribers is not an error; the event is dropped.
pub struct EventBus {
	sender: broadcast::Sender<GovernanceEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<GovernanceEvent> {
		self.sender.subscribe()
	}

	pub fn publish(&self, event: GovernanceEvent) {
		let _ = self.sender.send(event);
	}
}

impl Clone for EventBus {
	fn clone(&self) -> Self {
		Self {
			sender: self.sender.clone(),
		}
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(256)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_subscribers_receive_published_events() {
		let bus = EventBus::new(8);
		let mut rx = bus.subscribe();

		bus.publish(GovernanceEvent::ProviderRemoved {
			id: ProviderId::AmmV2,
		});

		assert_eq!(
			rx.recv().await.unwrap(),
			GovernanceEvent::ProviderRemoved {
				id: ProviderId::AmmV2
			}
		);
	}

	#[test]
	fn test_publish_without_subscribers() {
		let bus = EventBus::default();
		bus.publish(GovernanceEvent::DefaultOracleUpdated {
			oracle: "eth".into(),
		});
	}
}
