use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    DuplicateLogin,
    AuthFailure,
    UnknownUser,
    InvalidRole,
    UnknownItem,
    DuplicateItem,
    ItemInUse,
    OrderNotFound,
    LineNotFound,
    Unauthorized,
    Validation,
    /// The backing store could not be reached or failed mid-operation.
    Store,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::DuplicateLogin => "duplicate_login",
            ErrorCode::AuthFailure => "auth_failure",
            ErrorCode::UnknownUser => "unknown_user",
            ErrorCode::InvalidRole => "invalid_role",
            ErrorCode::UnknownItem => "unknown_item",
            ErrorCode::DuplicateItem => "duplicate_item",
            ErrorCode::ItemInUse => "item_in_use",
            ErrorCode::OrderNotFound => "order_not_found",
            ErrorCode::LineNotFound => "line_not_found",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Validation => "validation",
            ErrorCode::Store => "store",
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{}: {message}", .code.as_str())]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Business-rule rejections are recoverable; only store failures end the session.
    pub fn is_fatal(&self) -> bool {
        self.code == ErrorCode::Store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_store_failures_are_fatal() {
        assert!(ApiError::new(ErrorCode::Store, "disk gone").is_fatal());
        assert!(!ApiError::new(ErrorCode::ItemInUse, "Latte").is_fatal());
    }

    #[test]
    fn display_leads_with_stable_code() {
        let err = ApiError::new(ErrorCode::OrderNotFound, "order 7");
        assert_eq!(err.to_string(), "order_not_found: order 7");
    }
}
