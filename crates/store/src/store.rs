use async_trait::async_trait;

use crate::{
    AccountId, Item, ItemId, Result, Transaction, TransactionId,
    model::{Account, NewAccount, NewItem, NewTransaction},
};

/// Durable item records with version-checked writes.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Inserts a new item; the store assigns its id, creation time and first version.
    async fn insert_item(&self, item: NewItem) -> Result<Item>;

    /// Retrieves an item by id.
    ///
    /// Returns None if the item doesn't exist.
    async fn get_item(&self, id: ItemId) -> Result<Option<Item>>;

    /// Writes every mutable field of `item` if the stored record is still at
    /// `item.version`.
    ///
    /// Fails with `ConcurrencyConflict` when another write got there first
    /// and with `NotFound` when the item is gone. Returns the stored record
    /// with its bumped version.
    async fn put_item(&self, item: &Item) -> Result<Item>;

    /// Lists items whose title contains `title_contains` (case-insensitive,
    /// literal match), oldest first. `None` lists everything.
    async fn search_items(&self, title_contains: Option<&str>) -> Result<Vec<Item>>;
}

/// Durable transaction records.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persists a new transaction; the store assigns its id.
    async fn create_transaction(&self, transaction: NewTransaction) -> Result<Transaction>;

    /// Retrieves a transaction by id.
    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>>;

    /// Lists an account's transactions, newest first.
    async fn transactions_for_account(&self, user_id: AccountId) -> Result<Vec<Transaction>>;
}

/// Account records and session lookup.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Inserts a new account. Fails with `DuplicateEmail` if the email is taken.
    async fn insert_account(&self, account: NewAccount) -> Result<Account>;

    /// Finds an account by exact email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Finds the account currently holding `token`.
    async fn find_by_session(&self, token: &str) -> Result<Option<Account>>;

    /// Replaces an account's session token; `None` logs the account out.
    async fn set_session_token(&self, id: AccountId, token: Option<&str>) -> Result<()>;

    /// Resolves a session token to the account holding it.
    async fn resolve(&self, token: &str) -> Result<Option<AccountId>> {
        if token.is_empty() {
            return Ok(None);
        }
        Ok(self.find_by_session(token).await?.map(|account| account.id))
    }
}

/// A single backend providing every collection the server needs.
pub trait MarketplaceStore:
    CatalogStore + TransactionStore + AccountDirectory + Clone + 'static
{
}

// Blanket implementation for any type providing all three collections
impl<T> MarketplaceStore for T where
    T: CatalogStore + TransactionStore + AccountDirectory + Clone + 'static
{
}
