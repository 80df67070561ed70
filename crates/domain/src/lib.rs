//! Domain layer for the marketplace backend.
//!
//! This crate provides:
//! - the order placement workflow: cart parsing, the [`StockLedger`] that
//!   reserves stock one line at a time, and the [`OrderCompiler`] that turns
//!   a raw order request into a persisted transaction
//! - account registration, login and session resolution
//! - catalog item creation, owner updates and search

pub mod account;
pub mod catalog;
pub mod order;
mod session;

pub use account::{AccountError, AccountService, LoggedIn};
pub use catalog::{CatalogError, CatalogService, ItemUpdateRequest, NewItemRequest};
pub use order::{
    Cart, CartLine, LedgerError, OrderCompiler, OrderError, OrderOutcome, OrderRequest,
    Reservation, StockLedger,
};
pub use session::SessionContext;
