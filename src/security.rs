//! # Security Module
//!
//! Authentication is an external collaborator. The dispatch engine hands the raw
//! `Authorization` header to an [`Authenticator`] and forwards whatever [`Account`] comes back to
//! the resolved content target; it never looks inside the account itself. Whether an account may
//! do something is a decision for the endpoint or action that receives it.
//!
//! With no authenticator configured every request is anonymous (`None`).
//!
//! ## Example
//!
//! ```rust
//! use webobj::security::{Account, Authenticator, BearerTokenAuthenticator};
//!
//! let auth = BearerTokenAuthenticator::new().token("s3cret", Account::new("alice".to_string()));
//! let account = auth.authenticate(Some("Bearer s3cret")).unwrap();
//! assert_eq!(account.downcast_ref::<String>().map(String::as_str), Some("alice"));
//! assert!(auth.authenticate(None).is_none());
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Opaque identity produced by an [`Authenticator`].
///
/// Cloning is cheap; the payload is shared.
#[derive(Clone)]
pub struct Account(Arc<dyn Any + Send + Sync>);

impl Account {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrow the payload if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Account(..)")
    }
}

/// Maps an `Authorization` header value to an account, or `None` for anonymous.
///
/// Implemented for any `Fn(Option<&str>) -> Option<Account>`.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, authorization: Option<&str>) -> Option<Account>;
}

impl<F> Authenticator for F
where
    F: Fn(Option<&str>) -> Option<Account> + Send + Sync,
{
    fn authenticate(&self, authorization: Option<&str>) -> Option<Account> {
        self(authorization)
    }
}

/// Static table of bearer tokens.
#[derive(Default, Clone)]
pub struct BearerTokenAuthenticator {
    tokens: HashMap<String, Account>,
}

impl BearerTokenAuthenticator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token` as identifying `account`.
    #[must_use]
    pub fn token(mut self, token: impl Into<String>, account: Account) -> Self {
        self.tokens.insert(token.into(), account);
        self
    }
}

impl Authenticator for BearerTokenAuthenticator {
    fn authenticate(&self, authorization: Option<&str>) -> Option<Account> {
        let value = authorization?.trim();
        let (scheme, token) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        self.tokens.get(token.trim()).cloned()
    }
}
