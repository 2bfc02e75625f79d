//! Owner check shared by every governance write.

use oracle_types::{Address, OracleError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Governance {
	owner: Address,
}

impl Governance {
	pub fn new(owner: Address) -> Result<Self> {
		if owner == Address::ZERO {
			return Err(OracleError::InvalidAddress(
				"governance owner must not be zero".to_string(),
			));
		}
		Ok(Self { owner })
	}

	pub fn owner(&self) -> Address {
		self.owner
	}

	pub fn ensure_owner(&self, caller: Address) -> Result<()> {
		if caller != self.owner {
			return Err(OracleError::Unauthorized(caller));
		}
		Ok(())
	}
}
