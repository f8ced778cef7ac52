use serde::Serialize;
use shared::{
    domain::Role,
    error::{ApiError, ErrorCode},
};
use tracing::warn;

use crate::{internal, ApiContext, Session};

/// Everything a session can ask the core to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    BrowseMenu,
    PlaceOrder,
    AddItemToOrder,
    OrderHistory,
    OrderDetail,
    StatusOf,
    SetComment,
    ManageOwnAccount,
    MarkPaid,
    OpenOrders,
    SetStatus,
    ManageMenu,
    ChangeRole,
    ManageUsers,
}

const CUSTOMER_OPERATIONS: &[Operation] = &[
    Operation::BrowseMenu,
    Operation::PlaceOrder,
    Operation::AddItemToOrder,
    Operation::OrderHistory,
    Operation::OrderDetail,
    Operation::StatusOf,
    Operation::SetComment,
    Operation::ManageOwnAccount,
];

const EMPLOYEE_OPERATIONS: &[Operation] = &[
    Operation::BrowseMenu,
    Operation::PlaceOrder,
    Operation::AddItemToOrder,
    Operation::OrderHistory,
    Operation::OrderDetail,
    Operation::StatusOf,
    Operation::SetComment,
    Operation::ManageOwnAccount,
    Operation::MarkPaid,
    Operation::OpenOrders,
    Operation::SetStatus,
];

const MANAGER_OPERATIONS: &[Operation] = &[
    Operation::BrowseMenu,
    Operation::PlaceOrder,
    Operation::AddItemToOrder,
    Operation::OrderHistory,
    Operation::OrderDetail,
    Operation::StatusOf,
    Operation::SetComment,
    Operation::ManageOwnAccount,
    Operation::MarkPaid,
    Operation::OpenOrders,
    Operation::SetStatus,
    Operation::ManageMenu,
    Operation::ChangeRole,
    Operation::ManageUsers,
];

pub fn allowed_operations(role: Role) -> &'static [Operation] {
    match role {
        Role::Customer => CUSTOMER_OPERATIONS,
        Role::Employee => EMPLOYEE_OPERATIONS,
        Role::Manager => MANAGER_OPERATIONS,
    }
}

pub fn allows(role: Role, operation: Operation) -> bool {
    allowed_operations(role).contains(&operation)
}

/// Gatekeeper run at the top of every session-bearing operation.
///
/// The session's own role is checked first, without touching the store. A
/// session that passes is then checked against the role currently on record,
/// so a demotion applies to the very next call. Returns the current role.
pub async fn authorize(
    ctx: &ApiContext,
    session: &Session,
    operation: Operation,
) -> Result<Role, ApiError> {
    if !allows(session.role(), operation) {
        warn!(login = session.login(), role = %session.role(), ?operation, "operation refused");
        return Err(unauthorized(operation));
    }

    let current = ctx
        .storage
        .role_for_login(session.login())
        .await
        .map_err(internal)?;
    match current {
        Some(role) if allows(role, operation) => Ok(role),
        Some(role) => {
            warn!(login = session.login(), role = %role, ?operation, "operation refused after role change");
            Err(unauthorized(operation))
        }
        None => {
            warn!(login = session.login(), ?operation, "session user no longer exists");
            Err(unauthorized(operation))
        }
    }
}

fn unauthorized(operation: Operation) -> ApiError {
    ApiError::new(
        ErrorCode::Unauthorized,
        format!("{operation:?} is not permitted for this account"),
    )
}

#[cfg(test)]
#[path = "tests/dispatch_tests.rs"]
mod tests;
