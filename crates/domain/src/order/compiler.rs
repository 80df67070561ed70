use std::time::Instant;

use chrono::Utc;
use serde::Deserialize;
use store::{CatalogStore, FulfillmentMap, NewTransaction, Transaction, TransactionStore};

use super::{Cart, LedgerError, OrderError, Reservation, StockLedger, parse_order_date};
use crate::SessionContext;

/// A raw order as submitted by the client.
///
/// Every field is optional here so that absence can be reported as
/// [`OrderError::MissingField`] rather than as a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderRequest {
    /// Comma-separated item identifiers.
    pub items: Option<String>,
    /// Comma-separated amounts, one per item.
    pub amounts: Option<String>,
    pub address: Option<String>,
    pub date: Option<String>,
}

/// Result of an order that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
    /// At least one line was fulfilled and the transaction is stored.
    Placed(Transaction),
    /// Nothing could be reserved; no transaction was created.
    NoStockAvailable,
}

/// Turns order requests into stored transactions.
///
/// The compiler validates the request, reserves each cart line through the
/// [`StockLedger`] in input order, and stores one transaction holding only
/// what was actually reserved. If the order aborts after stock has been
/// taken, the reservations made so far are released again in reverse
/// order.
pub struct OrderCompiler<C: CatalogStore, T: TransactionStore> {
    ledger: StockLedger<C>,
    transactions: T,
}

impl<C: CatalogStore, T: TransactionStore> OrderCompiler<C, T> {
    /// Creates a new compiler over the given stores.
    pub fn new(catalog: C, transactions: T) -> Self {
        Self {
            ledger: StockLedger::new(catalog),
            transactions,
        }
    }

    /// Overrides how many conflicting stock writes a single line tolerates.
    pub fn with_max_reserve_attempts(mut self, max_attempts: u32) -> Self {
        self.ledger = self.ledger.with_max_attempts(max_attempts);
        self
    }

    /// Places an order for the caller identified by `session`.
    #[tracing::instrument(skip_all, fields(account_id))]
    pub async fn place_order(
        &self,
        session: Option<&SessionContext>,
        request: OrderRequest,
    ) -> Result<OrderOutcome, OrderError> {
        let started = Instant::now();
        let result = self.compile(session, request).await;

        metrics::histogram!("order_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        match &result {
            Ok(OrderOutcome::Placed(transaction)) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(
                    transaction_id = %transaction.id,
                    lines = transaction.items.len(),
                    units = transaction.items.total_units(),
                    "order placed"
                );
            }
            Ok(OrderOutcome::NoStockAvailable) => {
                metrics::counter!("orders_no_stock_total").increment(1);
                tracing::info!("order rejected, no stock available");
            }
            Err(e) => {
                metrics::counter!("orders_failed_total", "reason" => e.kind()).increment(1);
                tracing::warn!(error = %e, "order failed");
            }
        }

        result
    }

    /// Lists the caller's transactions, newest first.
    pub async fn transactions_for(
        &self,
        session: &SessionContext,
    ) -> Result<Vec<Transaction>, OrderError> {
        self.transactions
            .transactions_for_account(session.account_id())
            .await
            .map_err(OrderError::PersistenceFailure)
    }

    async fn compile(
        &self,
        session: Option<&SessionContext>,
        request: OrderRequest,
    ) -> Result<OrderOutcome, OrderError> {
        // 1. Validate presence, then identity
        let items = required(request.items, "items")?;
        let amounts = required(request.amounts, "quantity")?;
        let address = required(request.address, "address")?;
        let session = session.ok_or(OrderError::Unauthenticated)?;
        let user_id = session.account_id();
        tracing::Span::current().record("account_id", tracing::field::display(user_id));

        // 2. Date, then the cart itself; nothing has been touched yet
        let date = parse_order_date(request.date.as_deref(), Utc::now())?;
        let cart = Cart::parse(&items, &amounts)?;

        // 3. Reserve line by line, remembering what to give back on abort
        let mut fulfilled = FulfillmentMap::new();
        let mut committed: Vec<Reservation> = Vec::with_capacity(cart.len());

        for line in cart.lines() {
            match self.ledger.reserve(&line.item, line.amount).await {
                Ok(reservation) => {
                    if reservation.is_excluded() {
                        continue;
                    }
                    if reservation.is_partial() {
                        tracing::debug!(
                            item_id = %reservation.item_id,
                            requested = reservation.requested,
                            reserved = reservation.reserved,
                            "partially fulfilled line"
                        );
                    }
                    fulfilled.add(reservation.item_id, reservation.reserved);
                    committed.push(reservation);
                }
                Err(LedgerError::ItemNotFound(item)) => {
                    self.compensate(&committed).await;
                    return Err(OrderError::ItemNotFound(item));
                }
                Err(LedgerError::Lookup { source, .. }) => {
                    self.compensate(&committed).await;
                    return Err(OrderError::PersistenceFailure(source));
                }
                Err(e @ (LedgerError::Write { .. } | LedgerError::Contended { .. })) => {
                    // The stored stock is untouched, so the line is simply left out
                    tracing::warn!(item = %line.item, error = %e, "dropping cart line");
                }
            }
        }

        // 4. Nothing reserved: soft failure, nothing to undo
        if fulfilled.is_empty() {
            return Ok(OrderOutcome::NoStockAvailable);
        }

        // 5. Persist exactly once
        let new_transaction = NewTransaction {
            items: fulfilled,
            date,
            address,
            user_id,
        };
        match self.transactions.create_transaction(new_transaction).await {
            Ok(transaction) => Ok(OrderOutcome::Placed(transaction)),
            Err(source) => {
                tracing::error!(error = %source, "failed to save transaction");
                self.compensate(&committed).await;
                Err(OrderError::PersistenceFailure(source))
            }
        }
    }

    /// Releases committed reservations, newest first.
    ///
    /// A failed release is logged and counted; it never replaces the error
    /// that caused the abort.
    async fn compensate(&self, committed: &[Reservation]) {
        for reservation in committed.iter().rev() {
            match self
                .ledger
                .release(reservation.item_id, reservation.reserved)
                .await
            {
                Ok(()) => {
                    metrics::counter!("order_compensations_total", "outcome" => "released")
                        .increment(1);
                }
                Err(e) => {
                    metrics::counter!("order_compensations_total", "outcome" => "failed")
                        .increment(1);
                    tracing::error!(
                        item_id = %reservation.item_id,
                        units = reservation.reserved,
                        error = %e,
                        "failed to release reserved stock"
                    );
                }
            }
        }
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, OrderError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(OrderError::MissingField(field))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use common::{AccountId, ItemId, Money};
    use store::{InMemoryStore, Item, NewItem, StoreError};

    use super::*;

    /// Catalog whose stock writes fail for a single item.
    struct FailOneCatalog {
        inner: InMemoryStore,
        failing: ItemId,
    }

    #[async_trait]
    impl CatalogStore for FailOneCatalog {
        async fn insert_item(&self, item: NewItem) -> store::Result<Item> {
            self.inner.insert_item(item).await
        }

        async fn get_item(&self, id: ItemId) -> store::Result<Option<Item>> {
            self.inner.get_item(id).await
        }

        async fn put_item(&self, item: &Item) -> store::Result<Item> {
            if item.id == self.failing {
                return Err(StoreError::Unavailable(format!("write to {}", item.id)));
            }
            self.inner.put_item(item).await
        }

        async fn search_items(&self, title_contains: Option<&str>) -> store::Result<Vec<Item>> {
            self.inner.search_items(title_contains).await
        }
    }

    fn compiler(store: &InMemoryStore) -> OrderCompiler<InMemoryStore, InMemoryStore> {
        OrderCompiler::new(store.clone(), store.clone())
    }

    fn session() -> SessionContext {
        SessionContext::new(AccountId::new())
    }

    async fn stocked(store: &InMemoryStore, stock: u32) -> ItemId {
        store
            .insert_item(NewItem {
                title: "Widget".to_string(),
                price: Money::from_cents(250),
                stock,
                description: "A widget".to_string(),
                image: "widget.png".to_string(),
                seller_id: AccountId::new(),
            })
            .await
            .unwrap()
            .id
    }

    fn request(items: &str, amounts: &str) -> OrderRequest {
        OrderRequest {
            items: Some(items.to_string()),
            amounts: Some(amounts.to_string()),
            address: Some("1 Main St".to_string()),
            date: None,
        }
    }

    #[tokio::test]
    async fn missing_fields_are_reported_before_authentication() {
        let store = InMemoryStore::new();
        let compiler = compiler(&store);

        let mut req = request("a", "1");
        req.items = None;
        let err = compiler.place_order(None, req).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing items");

        let mut req = request("a", "1");
        req.amounts = Some("   ".to_string());
        let err = compiler.place_order(None, req).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing quantity");

        let mut req = request("a", "1");
        req.address = None;
        let err = compiler.place_order(None, req).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing address");

        let err = compiler
            .place_order(None, request("a", "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Unauthenticated));
    }

    #[tokio::test]
    async fn owner_comes_from_the_session() {
        let store = InMemoryStore::new();
        let id = stocked(&store, 5).await;
        let session = session();

        let outcome = compiler(&store)
            .place_order(Some(&session), request(&id.to_string(), "1"))
            .await
            .unwrap();

        let OrderOutcome::Placed(transaction) = outcome else {
            panic!("expected a placed order");
        };
        assert_eq!(transaction.user_id, session.account_id());
        assert_eq!(transaction.address, "1 Main St");
    }

    #[tokio::test]
    async fn invalid_date_aborts_before_any_reservation() {
        let store = InMemoryStore::new();
        let id = stocked(&store, 5).await;
        let mut req = request(&id.to_string(), "2");
        req.date = Some("not a date".to_string());

        let err = compiler(&store)
            .place_order(Some(&session()), req)
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::InvalidDate(_)));
        assert_eq!(store.get_item(id).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn supplied_date_is_kept() {
        let store = InMemoryStore::new();
        let id = stocked(&store, 5).await;
        let mut req = request(&id.to_string(), "2");
        req.date = Some("2024-05-01".to_string());

        let OrderOutcome::Placed(transaction) = compiler(&store)
            .place_order(Some(&session()), req)
            .await
            .unwrap()
        else {
            panic!("expected a placed order");
        };

        assert_eq!(transaction.date.to_rfc3339(), "2024-05-01T00:00:00+00:00");
    }

    #[tokio::test]
    async fn repeated_item_lines_accumulate() {
        let store = InMemoryStore::new();
        let id = stocked(&store, 4).await;
        let items = format!("{id},{id}");

        let OrderOutcome::Placed(transaction) = compiler(&store)
            .place_order(Some(&session()), request(&items, "3,3"))
            .await
            .unwrap()
        else {
            panic!("expected a placed order");
        };

        assert_eq!(transaction.items.get(&id), Some(4));
        assert_eq!(store.get_item(id).await.unwrap().unwrap().stock, 0);
    }

    #[tokio::test]
    async fn failed_stock_write_on_only_line_is_no_stock() {
        let store = InMemoryStore::new();
        let id = stocked(&store, 4).await;
        store.set_fail_item_writes(true);

        let outcome = compiler(&store)
            .place_order(Some(&session()), request(&id.to_string(), "1"))
            .await
            .unwrap();

        assert_eq!(outcome, OrderOutcome::NoStockAvailable);
        assert_eq!(store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn failed_stock_write_drops_only_that_line() {
        let store = InMemoryStore::new();
        let a = stocked(&store, 10).await;
        let b = stocked(&store, 10).await;
        let compiler = OrderCompiler::new(
            FailOneCatalog {
                inner: store.clone(),
                failing: b,
            },
            store.clone(),
        );

        let OrderOutcome::Placed(transaction) = compiler
            .place_order(Some(&session()), request(&format!("{a},{b}"), "2,3"))
            .await
            .unwrap()
        else {
            panic!("expected a placed order");
        };

        assert_eq!(transaction.items.get(&a), Some(2));
        assert!(!transaction.items.contains(&b));
        assert_eq!(transaction.items.len(), 1);
        assert_eq!(store.get_item(a).await.unwrap().unwrap().stock, 8);
        assert_eq!(store.get_item(b).await.unwrap().unwrap().stock, 10);
        assert_eq!(store.transaction_count().await, 1);
    }

    #[tokio::test]
    async fn amounts_are_checked_before_items_are_looked_up() {
        let store = InMemoryStore::new();
        let x = stocked(&store, 5).await;

        let err = compiler(&store)
            .place_order(Some(&session()), request(&format!("Y,{x}"), "1,abc"))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::InvalidAmount(ref raw) if raw == "abc"));
        assert_eq!(store.get_item(x).await.unwrap().unwrap().stock, 5);
        assert_eq!(store.transaction_create_calls(), 0);
    }
}
