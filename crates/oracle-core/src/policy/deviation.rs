use oracle_types::{mul_div, wad, OracleError, Result, U256};

/// Maximum relative disagreement tolerated between two prices.
///
/// The deviation of `a` and `b` is `|a - b| / min(a, b)` on the 18-decimal
/// scale, so `0.05e18` tolerates 5%. Dividing by the smaller operand keeps
/// the check symmetric and never under-reports a wide spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviationPolicy {
	max_deviation: U256,
}

impl DeviationPolicy {
	/// Accepts fractions in `(0, 1e18]`.
	pub fn new(max_deviation: U256) -> Result<Self> {
		if max_deviation.is_zero() || max_deviation > wad() {
			return Err(OracleError::InvalidDeviation(format!(
				"{} is outside (0, {}]",
				max_deviation,
				wad()
			)));
		}
		Ok(Self { max_deviation })
	}

	pub fn max_deviation(&self) -> U256 {
		self.max_deviation
	}

	/// Zero operands are never OK; they mean "unavailable".
	pub fn is_deviation_ok(&self, a: U256, b: U256) -> bool {
		if a.is_zero() || b.is_zero() {
			return false;
		}
		let diff = if a > b { a - b } else { b - a };
		match mul_div(diff, wad(), a.min(b)) {
			Some(deviation) => deviation <= self.max_deviation,
			None => false,
		}
	}
}
