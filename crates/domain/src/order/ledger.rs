use common::ItemId;
use store::{CatalogStore, StoreError};
use thiserror::Error;

/// Default number of read-decide-write rounds before a contended line gives up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// What the ledger committed for one cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub item_id: ItemId,
    pub requested: u32,
    /// Units taken out of stock; 0 when the item was sold out.
    pub reserved: u32,
    /// Stock left on the item after this reservation.
    pub remaining_stock: u32,
}

impl Reservation {
    /// True when fewer units than requested could be reserved.
    pub fn is_partial(&self) -> bool {
        self.reserved < self.requested
    }

    /// True when nothing was reserved and the line is left out of the order.
    pub fn is_excluded(&self) -> bool {
        self.reserved == 0
    }
}

/// Errors reported by the ledger for a single line.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The item reference is malformed or names no catalog item.
    #[error("Item: {0} does not exist")]
    ItemNotFound(String),

    /// The item could not be read.
    #[error("failed to read item {item_id}: {source}")]
    Lookup {
        item_id: ItemId,
        #[source]
        source: StoreError,
    },

    /// The stock write failed; the stored stock is unchanged.
    #[error("failed to write stock for item {item_id}: {source}")]
    Write {
        item_id: ItemId,
        #[source]
        source: StoreError,
    },

    /// Every attempt lost the race against a concurrent write.
    #[error("gave up on item {item_id} after {attempts} conflicting writes")]
    Contended { item_id: ItemId, attempts: u32 },
}

/// Units reservable from `stock` for a request of `requested` units.
///
/// Full fulfilment when stock suffices, everything that is left when it
/// doesn't, and nothing when the item is sold out.
pub fn reservable(stock: u32, requested: u32) -> u32 {
    stock.min(requested)
}

/// Reserves stock for one item at a time against a [`CatalogStore`].
///
/// Every decrement is a conditional write on the item's version: when a
/// concurrent order wrote first, the item is re-read and the decision is
/// made again on fresh stock, so two orders can never both take the last
/// units.
pub struct StockLedger<C: CatalogStore> {
    catalog: C,
    max_attempts: u32,
}

impl<C: CatalogStore> StockLedger<C> {
    /// Creates a new ledger over the given catalog.
    pub fn new(catalog: C) -> Self {
        Self {
            catalog,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Overrides how many conflicting writes a line tolerates. At least one attempt is always made.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Reserves up to `requested` units of the item referenced by `item_ref`.
    ///
    /// `item_ref` is the identifier as the client sent it; a malformed one
    /// is reported as `ItemNotFound`, like an unknown one.
    pub async fn reserve(&self, item_ref: &str, requested: u32) -> Result<Reservation, LedgerError> {
        let item_id = item_ref
            .parse::<ItemId>()
            .map_err(|_| LedgerError::ItemNotFound(item_ref.to_string()))?;
        self.reserve_item(item_id, requested).await
    }

    /// Reserves up to `requested` units of `item_id`.
    #[tracing::instrument(skip(self), fields(reserved))]
    pub async fn reserve_item(
        &self,
        item_id: ItemId,
        requested: u32,
    ) -> Result<Reservation, LedgerError> {
        for attempt in 1..=self.max_attempts {
            let mut item = self
                .catalog
                .get_item(item_id)
                .await
                .map_err(|source| LedgerError::Lookup { item_id, source })?
                .ok_or_else(|| LedgerError::ItemNotFound(item_id.to_string()))?;

            let reserved = reservable(item.stock, requested);
            if reserved == 0 {
                tracing::debug!(%item_id, "item sold out, line excluded");
                return Ok(Reservation {
                    item_id,
                    requested,
                    reserved: 0,
                    remaining_stock: item.stock,
                });
            }

            item.stock -= reserved;
            match self.catalog.put_item(&item).await {
                Ok(saved) => {
                    tracing::Span::current().record("reserved", reserved);
                    metrics::counter!("stock_units_reserved_total").increment(u64::from(reserved));
                    return Ok(Reservation {
                        item_id,
                        requested,
                        reserved,
                        remaining_stock: saved.stock,
                    });
                }
                Err(e) if e.is_conflict() => {
                    metrics::counter!("stock_reservation_conflicts_total").increment(1);
                    tracing::debug!(%item_id, attempt, "stock write lost a race, retrying");
                }
                Err(StoreError::NotFound { .. }) => {
                    return Err(LedgerError::ItemNotFound(item_id.to_string()));
                }
                Err(source) => return Err(LedgerError::Write { item_id, source }),
            }
        }

        Err(LedgerError::Contended {
            item_id,
            attempts: self.max_attempts,
        })
    }

    /// Puts `amount` units back into stock, undoing an earlier reservation.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, item_id: ItemId, amount: u32) -> Result<(), LedgerError> {
        if amount == 0 {
            return Ok(());
        }

        for attempt in 1..=self.max_attempts {
            let mut item = self
                .catalog
                .get_item(item_id)
                .await
                .map_err(|source| LedgerError::Lookup { item_id, source })?
                .ok_or_else(|| LedgerError::ItemNotFound(item_id.to_string()))?;

            item.stock = item.stock.saturating_add(amount);
            match self.catalog.put_item(&item).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_conflict() => {
                    tracing::debug!(%item_id, attempt, "stock release lost a race, retrying");
                }
                Err(StoreError::NotFound { .. }) => {
                    return Err(LedgerError::ItemNotFound(item_id.to_string()));
                }
                Err(source) => return Err(LedgerError::Write { item_id, source }),
            }
        }

        Err(LedgerError::Contended {
            item_id,
            attempts: self.max_attempts,
        })
    }
}
