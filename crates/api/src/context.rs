use ucaep_auth::{Account, Role};
use ucaep_core::{AccountId, SessionId};
use ucaep_infra::Authenticated;

/// Authenticated caller for a request.
///
/// Built by the bearer middleware from the live account record, so the role
/// here reflects the store, not the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    account: Account,
    session: SessionId,
}

impl PrincipalContext {
    pub fn new(account: Account, session: SessionId) -> Self {
        Self { account, session }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn account_id(&self) -> AccountId {
        self.account.id
    }

    pub fn role(&self) -> Role {
        self.account.role
    }

    /// Session of the bearer token used for this request.
    pub fn session(&self) -> SessionId {
        self.session
    }
}

impl From<Authenticated> for PrincipalContext {
    fn from(value: Authenticated) -> Self {
        Self::new(value.account, value.session)
    }
}
