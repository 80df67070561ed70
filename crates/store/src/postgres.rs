use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AccountId, Item, ItemId, Money, Result, StoreError, Transaction, TransactionId, Version,
    model::{Account, FulfillmentMap, NewAccount, NewItem, NewTransaction},
    store::{AccountDirectory, CatalogStore, TransactionStore},
};

const ITEM_COLUMNS: &str =
    "id, title, price_cents, stock, description, image, seller_id, created_at, version";
const TRANSACTION_COLUMNS: &str = "id, items, date, status, address, user_id";
const ACCOUNT_COLUMNS: &str = "id, email, password_hash, address, session_token, created_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and returns a store on the new pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    fn row_to_item(row: PgRow) -> Result<Item> {
        let stock: i64 = row.try_get("stock")?;
        let stock = u32::try_from(stock)
            .map_err(|_| StoreError::InvalidRecord(format!("item stock out of range: {stock}")))?;

        Ok(Item {
            id: ItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            title: row.try_get("title")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock,
            description: row.try_get("description")?,
            image: row.try_get("image")?,
            seller_id: AccountId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
            created_at: row.try_get("created_at")?,
            version: Version::new(row.try_get("version")?),
        })
    }

    fn row_to_transaction(row: PgRow) -> Result<Transaction> {
        let items: serde_json::Value = row.try_get("items")?;
        let items: FulfillmentMap = serde_json::from_value(items)?;
        let status: String = row.try_get("status")?;

        Ok(Transaction {
            id: TransactionId::from_uuid(row.try_get::<Uuid, _>("id")?),
            items,
            date: row.try_get("date")?,
            status: status.parse().map_err(StoreError::InvalidRecord)?,
            address: row.try_get("address")?,
            user_id: AccountId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        })
    }

    fn row_to_account(row: PgRow) -> Result<Account> {
        Ok(Account {
            id: AccountId::from_uuid(row.try_get::<Uuid, _>("id")?),
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            address: row.try_get("address")?,
            session_token: row.try_get("session_token")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn insert_item(&self, item: NewItem) -> Result<Item> {
        let item = item.into_item(ItemId::new(), Utc::now());

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO items (id, title, price_cents, stock, description, image, seller_id, created_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item.id.as_uuid())
        .bind(&item.title)
        .bind(item.price.cents())
        .bind(i64::from(item.stock))
        .bind(&item.description)
        .bind(&item.image)
        .bind(item.seller_id.as_uuid())
        .bind(item.created_at)
        .bind(item.version.as_i64())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_item(row)
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_item).transpose()
    }

    async fn put_item(&self, item: &Item) -> Result<Item> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE items
            SET title = $2, price_cents = $3, stock = $4, description = $5, image = $6,
                version = version + 1
            WHERE id = $1 AND version = $7
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item.id.as_uuid())
        .bind(&item.title)
        .bind(item.price.cents())
        .bind(i64::from(item.stock))
        .bind(&item.description)
        .bind(&item.image)
        .bind(item.version.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Self::row_to_item(row);
        }

        // Nothing matched: either the item is gone or its version moved on
        let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM items WHERE id = $1")
            .bind(item.id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match actual {
            Some(actual) => {
                tracing::debug!(
                    item_id = %item.id,
                    expected = %item.version,
                    actual,
                    "item version moved on"
                );
                Err(StoreError::ConcurrencyConflict {
                    record: "Item",
                    id: item.id.to_string(),
                    expected: item.version,
                    actual: Version::new(actual),
                })
            }
            None => Err(StoreError::NotFound {
                record: "Item",
                id: item.id.to_string(),
            }),
        }
    }

    async fn search_items(&self, title_contains: Option<&str>) -> Result<Vec<Item>> {
        let rows = match title_contains {
            Some(needle) => {
                sqlx::query(&format!(
                    r#"
                    SELECT {ITEM_COLUMNS} FROM items
                    WHERE strpos(lower(title), lower($1)) > 0
                    ORDER BY created_at ASC, id ASC
                    "#
                ))
                .bind(needle)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {ITEM_COLUMNS} FROM items ORDER BY created_at ASC, id ASC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(Self::row_to_item).collect()
    }
}

#[async_trait]
impl TransactionStore for PostgresStore {
    async fn create_transaction(&self, transaction: NewTransaction) -> Result<Transaction> {
        let transaction = transaction.into_transaction(TransactionId::new());
        let items = serde_json::to_value(&transaction.items)?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO transactions (id, items, date, status, address, user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(transaction.id.as_uuid())
        .bind(items)
        .bind(transaction.date)
        .bind(transaction.status.as_str())
        .bind(&transaction.address)
        .bind(transaction.user_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_transaction(row)
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_transaction).transpose()
    }

    async fn transactions_for_account(&self, user_id: AccountId) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS} FROM transactions
            WHERE user_id = $1
            ORDER BY date DESC
            "#
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_transaction).collect()
    }
}

#[async_trait]
impl AccountDirectory for PostgresStore {
    async fn insert_account(&self, account: NewAccount) -> Result<Account> {
        let account = account.into_account(AccountId::new(), Utc::now());

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO accounts (id, email, password_hash, address, session_token, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(account.id.as_uuid())
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.address)
        .bind(&account.session_token)
        .bind(account.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("accounts_email_key")
            {
                return StoreError::DuplicateEmail(account.email.clone());
            }
            StoreError::Database(e)
        })?;

        Self::row_to_account(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_account).transpose()
    }

    async fn find_by_session(&self, token: &str) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE session_token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_account).transpose()
    }

    async fn set_session_token(&self, id: AccountId, token: Option<&str>) -> Result<()> {
        let result = sqlx::query("UPDATE accounts SET session_token = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(token)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                record: "Account",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
