//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use serial_test::serial;
use sqlx::PgPool;
use store::{
    AccountDirectory, AccountId, CatalogStore, FulfillmentMap, ItemId, Money, NewAccount, NewItem,
    NewTransaction, PostgresStore, StoreError, TransactionStatus, TransactionStore, Version,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            // Run migrations using raw_sql to execute multiple statements
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_marketplace_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE items, transactions, accounts")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn widget(stock: u32) -> NewItem {
    NewItem {
        title: "Blue Widget".to_string(),
        price: Money::from_cents(1999),
        stock,
        description: "A widget".to_string(),
        image: "widget.png".to_string(),
        seller_id: AccountId::new(),
    }
}

fn account(email: &str) -> NewAccount {
    NewAccount {
        email: email.to_string(),
        password_hash: "$argon2id$fake".to_string(),
        address: Some("1 Main St".to_string()),
        session_token: None,
    }
}

#[tokio::test]
#[serial]
async fn insert_and_get_item() {
    let store = get_test_store().await;

    let item = store.insert_item(widget(10)).await.unwrap();
    assert_eq!(item.version, Version::first());

    let loaded = store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(loaded.title, "Blue Widget");
    assert_eq!(loaded.price, Money::from_cents(1999));
    assert_eq!(loaded.stock, 10);

    assert!(store.get_item(ItemId::new()).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn put_item_is_version_checked() {
    let store = get_test_store().await;
    let item = store.insert_item(widget(10)).await.unwrap();

    let mut first = item.clone();
    first.stock = 7;
    let saved = store.put_item(&first).await.unwrap();
    assert_eq!(saved.stock, 7);
    assert_eq!(saved.version, Version::new(2));

    let mut stale = item;
    stale.stock = 0;
    let err = store.put_item(&stale).await.unwrap_err();
    match err {
        StoreError::ConcurrencyConflict {
            expected, actual, ..
        } => {
            assert_eq!(expected, Version::first());
            assert_eq!(actual, Version::new(2));
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    let stored = store.get_item(saved.id).await.unwrap().unwrap();
    assert_eq!(stored.stock, 7);
}

#[tokio::test]
#[serial]
async fn put_missing_item_is_not_found() {
    let store = get_test_store().await;
    let mut item = store.insert_item(widget(1)).await.unwrap();
    item.id = ItemId::new();

    let err = store.put_item(&item).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
#[serial]
async fn search_matches_title_substring_case_insensitively() {
    let store = get_test_store().await;
    store.insert_item(widget(1)).await.unwrap();
    let mut gadget = widget(1);
    gadget.title = "Gadget 100%".to_string();
    store.insert_item(gadget).await.unwrap();

    assert_eq!(store.search_items(Some("WIDGET")).await.unwrap().len(), 1);
    assert_eq!(store.search_items(Some("100%")).await.unwrap().len(), 1);
    assert_eq!(store.search_items(Some("%")).await.unwrap().len(), 1);
    assert_eq!(store.search_items(None).await.unwrap().len(), 2);
}

#[tokio::test]
#[serial]
async fn create_and_list_transactions() {
    let store = get_test_store().await;
    let user = AccountId::new();
    let item = ItemId::new();
    let items: FulfillmentMap = [(item, 3)].into_iter().collect();

    let older = store
        .create_transaction(NewTransaction {
            items: items.clone(),
            date: Utc::now() - chrono::Duration::hours(1),
            address: "1 Main St".to_string(),
            user_id: user,
        })
        .await
        .unwrap();
    let newer = store
        .create_transaction(NewTransaction {
            items,
            date: Utc::now(),
            address: "1 Main St".to_string(),
            user_id: user,
        })
        .await
        .unwrap();

    assert_eq!(newer.status, TransactionStatus::Processing);
    assert_eq!(newer.items.get(&item), Some(3));

    let listed = store.transactions_for_account(user).await.unwrap();
    let ids: Vec<_> = listed.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![newer.id, older.id]);

    let loaded = store.get_transaction(older.id).await.unwrap().unwrap();
    assert_eq!(loaded.items, older.items);
}

#[tokio::test]
#[serial]
async fn accounts_and_sessions() {
    let store = get_test_store().await;
    let created = store.insert_account(account("a@b.io")).await.unwrap();

    let err = store.insert_account(account("a@b.io")).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateEmail(_)));

    store
        .set_session_token(created.id, Some("token-1"))
        .await
        .unwrap();
    assert_eq!(store.resolve("token-1").await.unwrap(), Some(created.id));

    let by_email = store.find_by_email("a@b.io").await.unwrap().unwrap();
    assert_eq!(by_email.session_token.as_deref(), Some("token-1"));

    store.set_session_token(created.id, None).await.unwrap();
    assert!(store.find_by_session("token-1").await.unwrap().is_none());

    let err = store
        .set_session_token(AccountId::new(), Some("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}
