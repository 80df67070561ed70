//! Order placement: cart parsing, stock reservation and transaction assembly.

mod cart;
mod compiler;
mod date;
mod ledger;

pub use cart::{Cart, CartLine};
pub use compiler::{OrderCompiler, OrderOutcome, OrderRequest};
pub use date::parse_order_date;
pub use ledger::{LedgerError, Reservation, StockLedger};

use store::StoreError;
use thiserror::Error;

/// Errors that abort an order.
///
/// Running out of stock is not one of them: that is
/// [`OrderOutcome::NoStockAvailable`].
#[derive(Debug, Error)]
pub enum OrderError {
    /// A required form field was absent or blank.
    #[error("Missing {0}")]
    MissingField(&'static str),

    /// No session, or a session token no account holds.
    #[error("Missing or invalid session Id")]
    Unauthenticated,

    /// The requested date could not be parsed.
    #[error("{0} is not a valid date")]
    InvalidDate(String),

    /// An amount was not a positive integer.
    #[error("{0} is not a valid amount")]
    InvalidAmount(String),

    /// The items and amounts lists have different lengths.
    #[error("Cart lists {items} items but {amounts} amounts")]
    MalformedCart { items: usize, amounts: usize },

    /// A cart line names an item the catalog does not hold.
    #[error("Item: {0} does not exist")]
    ItemNotFound(String),

    /// Reading the catalog or saving the transaction failed.
    #[error("Failed to persist order")]
    PersistenceFailure(#[source] StoreError),
}

impl OrderError {
    /// Short machine-friendly label, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::MissingField(_) => "missing_field",
            OrderError::Unauthenticated => "unauthenticated",
            OrderError::InvalidDate(_) => "invalid_date",
            OrderError::InvalidAmount(_) => "invalid_amount",
            OrderError::MalformedCart { .. } => "malformed_cart",
            OrderError::ItemNotFound(_) => "item_not_found",
            OrderError::PersistenceFailure(_) => "persistence_failure",
        }
    }
}
