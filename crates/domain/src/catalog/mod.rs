//! Catalog item creation, seller updates and title search.

use common::{ItemId, Money, MoneyParseError};
use serde::Deserialize;
use store::{CatalogStore, Item, NewItem, StoreError};
use thiserror::Error;

use crate::SessionContext;

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A required form field was absent or blank.
    #[error("Missing item {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    InvalidPrice(#[from] MoneyParseError),

    /// Stock was not a non-negative integer.
    #[error("{0} is not a valid number")]
    InvalidStock(String),

    #[error("Missing or invalid session Id")]
    Unauthenticated,

    #[error("Item: {0} does not exist")]
    NotFound(String),

    /// Only the seller may change an item.
    #[error("Only the seller may update this item")]
    NotOwner,

    /// The item changed between read and write.
    #[error("Item {0} was modified concurrently, retry the update")]
    Conflict(ItemId),

    #[error("Catalog store error: {0}")]
    Store(#[from] StoreError),
}

/// Form fields for listing a new item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewItemRequest {
    pub title: Option<String>,
    pub price: Option<String>,
    pub stock: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
}

/// Form fields for updating an item; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemUpdateRequest {
    pub title: Option<String>,
    pub price: Option<String>,
    pub stock: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
}

/// Service for seller-facing catalog operations.
pub struct CatalogService<C: CatalogStore> {
    catalog: C,
}

impl<C: CatalogStore> CatalogService<C> {
    /// Creates a new catalog service over the given store.
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    /// Lists a new item with the caller as its seller.
    #[tracing::instrument(skip_all)]
    pub async fn create_item(
        &self,
        session: Option<&SessionContext>,
        request: NewItemRequest,
    ) -> Result<Item, CatalogError> {
        let title = required(request.title, "title")?;
        let price = required(request.price, "price")?;
        let stock = required(request.stock, "stock")?;
        let image = required(request.image, "image")?;
        let description = required(request.description, "description")?;

        let price = Money::parse(&price)?;
        let stock = parse_stock(&stock)?;
        let session = session.ok_or(CatalogError::Unauthenticated)?;

        let item = self
            .catalog
            .insert_item(NewItem {
                title,
                price,
                stock,
                description,
                image,
                seller_id: session.account_id(),
            })
            .await?;

        tracing::info!(item_id = %item.id, stock = item.stock, "item listed");
        Ok(item)
    }

    /// Applies the supplied fields to an item the caller sells.
    ///
    /// The write is version-checked; a concurrent change (an order taking
    /// stock, for one) surfaces as [`CatalogError::Conflict`].
    #[tracing::instrument(skip(self, session, request))]
    pub async fn update_item(
        &self,
        session: Option<&SessionContext>,
        item_id: &str,
        request: ItemUpdateRequest,
    ) -> Result<Item, CatalogError> {
        let session = session.ok_or(CatalogError::Unauthenticated)?;
        let id: ItemId = item_id
            .parse()
            .map_err(|_| CatalogError::NotFound(item_id.to_string()))?;

        let mut item = self
            .catalog
            .get_item(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(item_id.to_string()))?;
        if item.seller_id != session.account_id() {
            return Err(CatalogError::NotOwner);
        }

        let changed = apply_update(&mut item, request)?;
        if !changed {
            return Ok(item);
        }

        let stored = self.catalog.put_item(&item).await.map_err(|e| match e {
            StoreError::ConcurrencyConflict { .. } => CatalogError::Conflict(id),
            StoreError::NotFound { .. } => CatalogError::NotFound(item_id.to_string()),
            other => CatalogError::Store(other),
        })?;

        tracing::info!(item_id = %stored.id, version = %stored.version, "item updated");
        Ok(stored)
    }

    /// Lists items whose title contains `term`; a blank term lists everything.
    pub async fn search(&self, term: Option<&str>) -> Result<Vec<Item>, CatalogError> {
        let term = term.map(str::trim).filter(|t| !t.is_empty());
        Ok(self.catalog.search_items(term).await?)
    }
}

fn apply_update(item: &mut Item, request: ItemUpdateRequest) -> Result<bool, CatalogError> {
    let mut changed = false;

    if let Some(title) = present(request.title) {
        changed |= item.title != title;
        item.title = title;
    }
    if let Some(price) = present(request.price) {
        let price = Money::parse(&price)?;
        changed |= item.price != price;
        item.price = price;
    }
    if let Some(stock) = present(request.stock) {
        let stock = parse_stock(&stock)?;
        changed |= item.stock != stock;
        item.stock = stock;
    }
    if let Some(image) = present(request.image) {
        changed |= item.image != image;
        item.image = image;
    }
    if let Some(description) = present(request.description) {
        changed |= item.description != description;
        item.description = description;
    }

    Ok(changed)
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, field: &'static str) -> Result<String, CatalogError> {
    present(value).ok_or(CatalogError::MissingField(field))
}

fn parse_stock(raw: &str) -> Result<u32, CatalogError> {
    raw.parse::<u32>()
        .map_err(|_| CatalogError::InvalidStock(raw.to_string()))
}
