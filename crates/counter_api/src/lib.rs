//! Order lifecycle and role-gated mutations for a food-service counter.
//!
//! Every operation takes an explicit [`Session`] (except account creation and
//! login) and is authorized by [`dispatch::authorize`] before it touches any
//! order or catalog data.

pub mod access;
pub mod catalog;
pub mod dispatch;
pub mod ledger;
pub mod menu_admin;
pub mod status;

use serde::Serialize;
use shared::{
    domain::Role,
    error::{ApiError, ErrorCode},
};
use storage::Storage;

pub use dispatch::Operation;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

impl ApiContext {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }
}

/// An authenticated login and the role it was granted at login time.
///
/// Only [`access::authenticate`] hands these out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    login: String,
    role: Role,
}

impl Session {
    pub(crate) fn new(login: impl Into<String>, role: Role) -> Self {
        Self {
            login: login.into(),
            role,
        }
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

pub(crate) fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Store, format!("{err:#}"))
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
