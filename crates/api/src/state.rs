//! Shared application state.

use domain::{AccountService, CatalogService, OrderCompiler};
use store::MarketplaceStore;

/// Shared application state accessible from all handlers.
pub struct AppState<S: MarketplaceStore> {
    pub orders: OrderCompiler<S, S>,
    pub accounts: AccountService<S>,
    pub catalog: CatalogService<S>,
    /// Lifetime of the `sessionId` cookie, in seconds.
    pub session_max_age_secs: u64,
}

impl<S: MarketplaceStore> AppState<S> {
    /// Builds every service over one shared store.
    pub fn new(store: S, session_max_age_secs: u64, reserve_max_attempts: u32) -> Self {
        Self {
            orders: OrderCompiler::new(store.clone(), store.clone())
                .with_max_reserve_attempts(reserve_max_attempts),
            accounts: AccountService::new(store.clone()),
            catalog: CatalogService::new(store),
            session_max_age_secs,
        }
    }
}
