use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    AccountId, Item, ItemId, Result, StoreError, Transaction, TransactionId,
    model::{Account, NewAccount, NewItem, NewTransaction},
    store::{AccountDirectory, CatalogStore, TransactionStore},
};

#[derive(Default)]
struct Collections {
    items: HashMap<ItemId, Item>,
    transactions: Vec<Transaction>,
    accounts: HashMap<AccountId, Account>,
}

#[derive(Default)]
struct Faults {
    fail_item_writes: AtomicBool,
    fail_transaction_writes: AtomicBool,
    transaction_creates: AtomicUsize,
}

/// In-memory store implementation for tests and local runs.
///
/// This implementation keeps every collection in memory and provides the
/// same interface as the PostgreSQL implementation, plus switches to make
/// writes fail.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    collections: Arc<RwLock<Collections>>,
    faults: Arc<Faults>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent item write (`put_item`) fail.
    pub fn set_fail_item_writes(&self, fail: bool) {
        self.faults.fail_item_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent transaction insert fail.
    pub fn set_fail_transaction_writes(&self, fail: bool) {
        self.faults
            .fail_transaction_writes
            .store(fail, Ordering::SeqCst);
    }

    /// Number of `create_transaction` calls seen, successful or not.
    pub fn transaction_create_calls(&self) -> usize {
        self.faults.transaction_creates.load(Ordering::SeqCst)
    }

    /// Returns the number of stored transactions.
    pub async fn transaction_count(&self) -> usize {
        self.collections.read().await.transactions.len()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn insert_item(&self, item: NewItem) -> Result<Item> {
        let item = item.into_item(ItemId::new(), Utc::now());
        self.collections
            .write()
            .await
            .items
            .insert(item.id, item.clone());
        Ok(item)
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        Ok(self.collections.read().await.items.get(&id).cloned())
    }

    async fn put_item(&self, item: &Item) -> Result<Item> {
        if self.faults.fail_item_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "item write rejected for {}",
                item.id
            )));
        }

        let mut collections = self.collections.write().await;
        let stored = collections
            .items
            .get_mut(&item.id)
            .ok_or_else(|| StoreError::NotFound {
                record: "Item",
                id: item.id.to_string(),
            })?;

        if stored.version != item.version {
            return Err(StoreError::ConcurrencyConflict {
                record: "Item",
                id: item.id.to_string(),
                expected: item.version,
                actual: stored.version,
            });
        }

        // id, seller and creation time are immutable
        stored.title = item.title.clone();
        stored.price = item.price;
        stored.stock = item.stock;
        stored.description = item.description.clone();
        stored.image = item.image.clone();
        stored.version = stored.version.next();

        Ok(stored.clone())
    }

    async fn search_items(&self, title_contains: Option<&str>) -> Result<Vec<Item>> {
        let needle = title_contains.map(str::to_lowercase);
        let collections = self.collections.read().await;
        let mut items: Vec<_> = collections
            .items
            .values()
            .filter(|item| match &needle {
                Some(needle) => item.title.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }
}

#[async_trait]
impl TransactionStore for InMemoryStore {
    async fn create_transaction(&self, transaction: NewTransaction) -> Result<Transaction> {
        self.faults.transaction_creates.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_transaction_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "transaction write rejected".to_string(),
            ));
        }

        let transaction = transaction.into_transaction(TransactionId::new());
        self.collections
            .write()
            .await
            .transactions
            .push(transaction.clone());
        Ok(transaction)
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        Ok(self
            .collections
            .read()
            .await
            .transactions
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }

    async fn transactions_for_account(&self, user_id: AccountId) -> Result<Vec<Transaction>> {
        let collections = self.collections.read().await;
        let mut transactions: Vec<_> = collections
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        transactions.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(transactions)
    }
}

#[async_trait]
impl AccountDirectory for InMemoryStore {
    async fn insert_account(&self, account: NewAccount) -> Result<Account> {
        let mut collections = self.collections.write().await;
        if collections
            .accounts
            .values()
            .any(|a| a.email == account.email)
        {
            return Err(StoreError::DuplicateEmail(account.email));
        }

        let account = account.into_account(AccountId::new(), Utc::now());
        collections.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        Ok(self
            .collections
            .read()
            .await
            .accounts
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn find_by_session(&self, token: &str) -> Result<Option<Account>> {
        Ok(self
            .collections
            .read()
            .await
            .accounts
            .values()
            .find(|a| a.session_token.as_deref() == Some(token))
            .cloned())
    }

    async fn set_session_token(&self, id: AccountId, token: Option<&str>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let account = collections
            .accounts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound {
                record: "Account",
                id: id.to_string(),
            })?;
        account.session_token = token.map(str::to_string);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FulfillmentMap, Money, Version};

    fn new_item(title: &str, stock: u32) -> NewItem {
        NewItem {
            title: title.to_string(),
            price: Money::from_cents(1000),
            stock,
            description: "A thing".to_string(),
            image: "thing.png".to_string(),
            seller_id: AccountId::new(),
        }
    }

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            address: None,
            session_token: None,
        }
    }

    #[tokio::test]
    async fn insert_and_get_item() {
        let store = InMemoryStore::new();
        let item = store.insert_item(new_item("Widget", 5)).await.unwrap();

        assert_eq!(item.version, Version::first());
        let loaded = store.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(loaded, item);
        assert!(store.get_item(ItemId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_item_bumps_version() {
        let store = InMemoryStore::new();
        let mut item = store.insert_item(new_item("Widget", 5)).await.unwrap();

        item.stock = 3;
        let saved = store.put_item(&item).await.unwrap();

        assert_eq!(saved.stock, 3);
        assert_eq!(saved.version, Version::new(2));
    }

    #[tokio::test]
    async fn put_item_with_stale_version_conflicts() {
        let store = InMemoryStore::new();
        let item = store.insert_item(new_item("Widget", 5)).await.unwrap();

        let mut first = item.clone();
        first.stock = 4;
        store.put_item(&first).await.unwrap();

        let mut stale = item;
        stale.stock = 1;
        let err = store.put_item(&stale).await.unwrap_err();
        assert!(err.is_conflict());

        let stored = store.get_item(stale.id).await.unwrap().unwrap();
        assert_eq!(stored.stock, 4);
    }

    #[tokio::test]
    async fn put_missing_item_is_not_found() {
        let store = InMemoryStore::new();
        let item = new_item("Ghost", 1).into_item(ItemId::new(), Utc::now());

        let err = store.put_item(&item).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { record: "Item", .. }));
    }

    #[tokio::test]
    async fn failing_item_writes_leave_stock_untouched() {
        let store = InMemoryStore::new();
        let mut item = store.insert_item(new_item("Widget", 5)).await.unwrap();
        store.set_fail_item_writes(true);

        item.stock = 0;
        assert!(matches!(
            store.put_item(&item).await,
            Err(StoreError::Unavailable(_))
        ));
        assert_eq!(store.get_item(item.id).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_literal() {
        let store = InMemoryStore::new();
        store.insert_item(new_item("Blue Widget", 1)).await.unwrap();
        store.insert_item(new_item("red widget", 1)).await.unwrap();
        store.insert_item(new_item("Gadget (v2)", 1)).await.unwrap();

        assert_eq!(store.search_items(Some("WIDGET")).await.unwrap().len(), 2);
        assert_eq!(store.search_items(Some("(v2)")).await.unwrap().len(), 1);
        assert_eq!(store.search_items(Some(".*")).await.unwrap().len(), 0);
        assert_eq!(store.search_items(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn transactions_are_listed_per_account_newest_first() {
        let store = InMemoryStore::new();
        let user = AccountId::new();
        let older = Utc::now() - chrono::Duration::days(1);

        for (date, owner) in [(older, user), (Utc::now(), user), (Utc::now(), AccountId::new())] {
            store
                .create_transaction(NewTransaction {
                    items: FulfillmentMap::new(),
                    date,
                    address: "1 Main St".to_string(),
                    user_id: owner,
                })
                .await
                .unwrap();
        }

        let listed = store.transactions_for_account(user).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].date > listed[1].date);
        assert_eq!(store.transaction_create_calls(), 3);
    }

    #[tokio::test]
    async fn failing_transaction_writes_store_nothing() {
        let store = InMemoryStore::new();
        store.set_fail_transaction_writes(true);

        let result = store
            .create_transaction(NewTransaction {
                items: FulfillmentMap::new(),
                date: Utc::now(),
                address: "1 Main St".to_string(),
                user_id: AccountId::new(),
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.transaction_count().await, 0);
        assert_eq!(store.transaction_create_calls(), 1);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = InMemoryStore::new();
        store.insert_account(new_account("a@b.io")).await.unwrap();

        let err = store.insert_account(new_account("a@b.io")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(email) if email == "a@b.io"));
    }

    #[tokio::test]
    async fn session_tokens_resolve_until_cleared() {
        let store = InMemoryStore::new();
        let account = store.insert_account(new_account("a@b.io")).await.unwrap();

        store
            .set_session_token(account.id, Some("abc123"))
            .await
            .unwrap();
        assert_eq!(store.resolve("abc123").await.unwrap(), Some(account.id));
        assert_eq!(store.resolve("").await.unwrap(), None);

        store.set_session_token(account.id, None).await.unwrap();
        assert_eq!(store.resolve("abc123").await.unwrap(), None);
    }
}
