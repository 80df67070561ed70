//! Shared types for the marketplace backend.
//!
//! Identifiers are UUID newtypes so an item id can never be passed where an
//! account id is expected. [`Version`] backs the conditional writes of the
//! catalog, and [`Money`] keeps prices in integer cents.

mod money;
mod types;
mod version;

pub use money::{Money, MoneyParseError};
pub use types::{AccountId, IdParseError, ItemId, TransactionId};
pub use version::Version;
