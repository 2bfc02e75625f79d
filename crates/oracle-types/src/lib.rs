//! Shared types for the price oracle engine.
//!
//! Everything that more than one crate needs to agree on lives here: the
//! closed set of provider identifiers, the 18-decimal price and quote
//! results, the error taxonomy with its stable reason codes, governance
//! events, the clock abstraction and config-schema validation.

pub mod clock;
pub mod errors;
pub mod events;
pub mod price;
pub mod provider;
pub mod validation;

pub use alloy_primitives::{Address, U256};
pub use clock::*;
pub use errors::*;
pub use events::*;
pub use price::*;
pub use provider::*;
pub use validation::*;
