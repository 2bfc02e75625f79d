//! Programmable sources for engine tests.

use async_trait::async_trait;
use oracle_sources::{PriceSourceInterface, SourceError};
use oracle_types::{wad, Address, AmountQuote, PairQuote, PriceResult, Timestamp, U256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const NOW: Timestamp = 1_700_000_000;

pub fn usd(units: u64) -> U256 {
	U256::from(units) * wad()
}

pub fn asset(byte: u8) -> Address {
	Address::with_last_byte(byte)
}

#[derive(Debug, Clone)]
pub enum MockAnswer {
	Price(U256, Timestamp),
	Fail(String),
	Hang,
}

/// Answers every operation from a per-token table and counts calls.
///
/// Token amounts are treated as 18-decimal so conversions are
/// `amount * price / 1e18` and back.
pub struct MockSource {
	name: String,
	answers: Mutex<HashMap<Address, MockAnswer>>,
	fallback: Mutex<MockAnswer>,
	calls: AtomicUsize,
}

impl MockSource {
	pub fn new(name: &str) -> Self {
		Self {
			name: name.to_string(),
			answers: Mutex::new(HashMap::new()),
			fallback: Mutex::new(MockAnswer::Price(U256::ZERO, 0)),
			calls: AtomicUsize::new(0),
		}
	}

	/// Same answer for every token.
	pub fn answering(name: &str, answer: MockAnswer) -> Self {
		let source = Self::new(name);
		source.set_all(answer);
		source
	}

	pub fn price(name: &str, price: U256, updated_at: Timestamp) -> Self {
		Self::answering(name, MockAnswer::Price(price, updated_at))
	}

	pub fn set_all(&self, answer: MockAnswer) {
		*self.fallback.lock().unwrap() = answer;
	}

	pub fn set(&self, token: Address, answer: MockAnswer) {
		self.answers.lock().unwrap().insert(token, answer);
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	async fn answer(&self, token: Address) -> Result<(U256, Timestamp), SourceError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		let answer = self
			.answers
			.lock()
			.unwrap()
			.get(&token)
			.cloned()
			.unwrap_or_else(|| self.fallback.lock().unwrap().clone());
		match answer {
			MockAnswer::Price(price, updated_at) => Ok((price, updated_at)),
			MockAnswer::Fail(message) => Err(SourceError::Backend(message)),
			MockAnswer::Hang => {
				tokio::time::sleep(Duration::from_secs(3600)).await;
				Err(SourceError::Backend("woke up".to_string()))
			}
		}
	}
}

#[async_trait]
impl PriceSourceInterface for MockSource {
	fn name(&self) -> &str {
		&self.name
	}

	async fn get_price_in_usd(&self, token: Address) -> Result<PriceResult, SourceError> {
		let (price, updated_at) = self.answer(token).await?;
		Ok(PriceResult::new(price, updated_at))
	}

	async fn quote(
		&self,
		token_in: Address,
		token_out: Address,
		amount_in: U256,
	) -> Result<PairQuote, SourceError> {
		let usd = self.quote_token_to_usd(token_in, amount_in).await?;
		let out = self.quote_usd_to_token(token_out, usd.amount_out).await?;
		Ok(PairQuote::new(out.amount_out, usd.updated_at, out.updated_at))
	}

	async fn quote_token_to_usd(
		&self,
		token: Address,
		amount: U256,
	) -> Result<AmountQuote, SourceError> {
		let (price, updated_at) = self.answer(token).await?;
		Ok(AmountQuote::new(amount * price / wad(), updated_at))
	}

	async fn quote_usd_to_token(
		&self,
		token: Address,
		usd_amount: U256,
	) -> Result<AmountQuote, SourceError> {
		let (price, updated_at) = self.answer(token).await?;
		if price.is_zero() {
			return Ok(AmountQuote::new(U256::ZERO, updated_at));
		}
		Ok(AmountQuote::new(usd_amount * wad() / price, updated_at))
	}
}
