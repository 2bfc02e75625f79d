//! Time source used for staleness checks.

use crate::price::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};

pub trait Clock: Send + Sync {
	/// Current unix time in seconds.
	fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> Timestamp {
		u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
	}
}

/// Manually driven clock for deterministic tests and replays.
#[derive(Debug, Default)]
pub struct FixedClock {
	now: AtomicU64,
}

impl FixedClock {
	pub fn new(now: Timestamp) -> Self {
		Self {
			now: AtomicU64::new(now),
		}
	}

	pub fn set(&self, now: Timestamp) {
		self.now.store(now, Ordering::SeqCst);
	}

	pub fn advance(&self, secs: u64) {
		self.now.fetch_add(secs, Ordering::SeqCst);
	}
}

impl Clock for FixedClock {
	fn now(&self) -> Timestamp {
		self.now.load(Ordering::SeqCst)
	}
}
