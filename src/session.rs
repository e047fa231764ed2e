//! Authentication collaborator.
//!
//! The sync layer never drives sign-in; it only asks "who is signed in
//! right now". No identity means no data and no loading; controllers
//! reset instead of churning the cache.

use parking_lot::Mutex;

/// Supplies the current authenticated account identity, if any.
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Option<String>;
}

/// Mutable identity holder for hosts that manage sessions themselves
/// (and for tests).
#[derive(Default)]
pub struct SessionIdentity {
    account: Mutex<Option<String>>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(account: impl Into<String>) -> Self {
        Self {
            account: Mutex::new(Some(account.into())),
        }
    }

    pub fn sign_in(&self, account: impl Into<String>) {
        *self.account.lock() = Some(account.into());
    }

    pub fn sign_out(&self) {
        *self.account.lock() = None;
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_identity(&self) -> Option<String> {
        self.account.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_and_out() {
        let session = SessionIdentity::new();
        assert!(session.current_identity().is_none());

        session.sign_in("acct-1");
        assert_eq!(session.current_identity().as_deref(), Some("acct-1"));

        session.sign_out();
        assert!(session.current_identity().is_none());
    }
}
