use common::AccountId;

/// The authenticated caller of a request.
///
/// Built once per request from the session cookie and passed explicitly to
/// every operation that needs an identity; nothing reads the cookie again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
    account_id: AccountId,
}

impl SessionContext {
    pub fn new(account_id: AccountId) -> Self {
        Self { account_id }
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }
}
