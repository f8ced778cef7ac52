use chrono::Utc;
use shared::{
    domain::{ItemStatus, OrderId},
    error::{ApiError, ErrorCode},
    protocol::LineStatus,
};
use tracing::info;

use crate::{
    dispatch::{authorize, Operation},
    internal,
    ledger::visible_order,
    ApiContext, Session,
};

/// Staff may move a line to any status at any time; every call refreshes
/// `last_updated`. All lines of `item_name` in the order are updated.
pub async fn set_status(
    ctx: &ApiContext,
    session: &Session,
    order_id: OrderId,
    item_name: &str,
    status: ItemStatus,
) -> Result<(), ApiError> {
    authorize(ctx, session, Operation::SetStatus).await?;
    let changed = ctx
        .storage
        .set_line_status(order_id, item_name, &status, Utc::now())
        .await
        .map_err(internal)?;
    if changed == 0 {
        return Err(line_not_found(order_id, item_name));
    }
    info!(by = session.login(), %order_id, item = item_name, %status, lines = changed, "line status set");
    Ok(())
}

/// Customers may comment on lines of their own unpaid orders; staff on any line.
pub async fn set_comment(
    ctx: &ApiContext,
    session: &Session,
    order_id: OrderId,
    item_name: &str,
    comment: &str,
) -> Result<(), ApiError> {
    let role = authorize(ctx, session, Operation::SetComment).await?;
    let owner = (!role.is_staff()).then(|| session.login());
    let changed = ctx
        .storage
        .set_line_comment(order_id, item_name, comment, owner)
        .await
        .map_err(internal)?;
    if changed == 0 {
        return Err(line_not_found(order_id, item_name));
    }
    info!(by = session.login(), %order_id, item = item_name, "line comment set");
    Ok(())
}

pub async fn status_of(
    ctx: &ApiContext,
    session: &Session,
    order_id: OrderId,
) -> Result<Vec<LineStatus>, ApiError> {
    let role = authorize(ctx, session, Operation::StatusOf).await?;
    visible_order(ctx, session, role, order_id).await?;
    let lines = ctx
        .storage
        .lines_for_order(order_id)
        .await
        .map_err(internal)?;
    Ok(lines
        .into_iter()
        .map(|line| LineStatus {
            item_name: line.item_name,
            status: line.status,
        })
        .collect())
}

fn line_not_found(order_id: OrderId, item_name: &str) -> ApiError {
    ApiError::new(
        ErrorCode::LineNotFound,
        format!("no '{item_name}' line on order {order_id}"),
    )
}

#[cfg(test)]
#[path = "tests/status_tests.rs"]
mod tests;
