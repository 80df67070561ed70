//! Persistence for the marketplace backend.
//!
//! Three collaborators live here: the [`CatalogStore`] (items, with
//! version-checked writes), the [`TransactionStore`] and the
//! [`AccountDirectory`]. Each has an in-memory and a PostgreSQL
//! implementation behind the same traits.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use common::{AccountId, ItemId, Money, TransactionId, Version};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{
    Account, FulfillmentMap, Item, NewAccount, NewItem, NewTransaction, Transaction,
    TransactionStatus,
};
pub use postgres::PostgresStore;
pub use store::{AccountDirectory, CatalogStore, MarketplaceStore, TransactionStore};
