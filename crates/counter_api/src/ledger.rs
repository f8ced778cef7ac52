use chrono::{DateTime, Duration, Utc};
use shared::{
    domain::{Money, OrderId, Role},
    error::{ApiError, ErrorCode},
    protocol::{ItemLineSummary, OrderDetail, OrderSummary},
};
use storage::{AppendOutcome, PlaceOutcome, StoredLine, StoredOrder};
use tracing::info;

use crate::{
    catalog::unknown_item,
    dispatch::{authorize, Operation},
    internal, ApiContext, Session,
};

pub const DEFAULT_HISTORY_LIMIT: u32 = 5;
pub const DEFAULT_OPEN_WINDOW_HOURS: i64 = 24;

/// Opens a new unpaid order for the session's login with `item_name` as its
/// first line.
pub async fn place_order(
    ctx: &ApiContext,
    session: &Session,
    item_name: &str,
    comment: &str,
) -> Result<OrderId, ApiError> {
    authorize(ctx, session, Operation::PlaceOrder).await?;
    let outcome = ctx
        .storage
        .create_order(session.login(), item_name, comment, Utc::now())
        .await
        .map_err(internal)?;
    match outcome {
        PlaceOutcome::Placed(order_id) => {
            info!(login = session.login(), %order_id, item = item_name, "order placed");
            Ok(order_id)
        }
        PlaceOutcome::UnknownItem => Err(unknown_item(item_name)),
    }
}

/// Appends a line to one of the caller's unpaid orders and returns the new
/// total. Ownership and paid state are checked before the item is.
pub async fn add_item_to_order(
    ctx: &ApiContext,
    session: &Session,
    order_id: OrderId,
    item_name: &str,
    comment: &str,
) -> Result<Money, ApiError> {
    authorize(ctx, session, Operation::AddItemToOrder).await?;
    let outcome = ctx
        .storage
        .append_item(order_id, session.login(), item_name, comment, Utc::now())
        .await
        .map_err(internal)?;
    match outcome {
        AppendOutcome::Appended { total } => {
            info!(login = session.login(), %order_id, item = item_name, %total, "item added to order");
            Ok(total)
        }
        AppendOutcome::OrderNotEditable => Err(ApiError::new(
            ErrorCode::OrderNotFound,
            format!("order {order_id} is not an open order of yours"),
        )),
        AppendOutcome::UnknownItem => Err(unknown_item(item_name)),
        AppendOutcome::TotalOverflow => Err(ApiError::new(
            ErrorCode::Validation,
            format!("adding '{item_name}' would push order {order_id} past the largest total"),
        )),
    }
}

/// Marking an already-paid order is a no-op.
pub async fn mark_paid(
    ctx: &ApiContext,
    session: &Session,
    order_id: OrderId,
) -> Result<(), ApiError> {
    authorize(ctx, session, Operation::MarkPaid).await?;
    let found = ctx.storage.mark_paid(order_id).await.map_err(internal)?;
    if !found {
        return Err(order_not_found(order_id));
    }
    info!(by = session.login(), %order_id, "order marked paid");
    Ok(())
}

/// The caller's own orders, most recently touched first.
pub async fn order_history(
    ctx: &ApiContext,
    session: &Session,
    limit: u32,
) -> Result<Vec<OrderSummary>, ApiError> {
    authorize(ctx, session, Operation::OrderHistory).await?;
    let orders = ctx
        .storage
        .list_orders_for_login(session.login(), limit)
        .await
        .map_err(internal)?;
    Ok(orders.into_iter().map(order_summary).collect())
}

/// Staff work queue: unpaid orders touched within `window`, oldest first.
/// A window reaching past the earliest representable time covers every
/// unpaid order.
pub async fn open_orders(
    ctx: &ApiContext,
    session: &Session,
    window: Duration,
) -> Result<Vec<OrderSummary>, ApiError> {
    authorize(ctx, session, Operation::OpenOrders).await?;
    let orders = ctx
        .storage
        .list_open_orders(
            Utc::now()
                .checked_sub_signed(window)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        )
        .await
        .map_err(internal)?;
    Ok(orders.into_iter().map(order_summary).collect())
}

pub async fn order_detail(
    ctx: &ApiContext,
    session: &Session,
    order_id: OrderId,
) -> Result<OrderDetail, ApiError> {
    let role = authorize(ctx, session, Operation::OrderDetail).await?;
    let order = visible_order(ctx, session, role, order_id).await?;
    let lines = ctx
        .storage
        .lines_for_order(order_id)
        .await
        .map_err(internal)?;
    Ok(OrderDetail {
        order: order_summary(order),
        lines: lines.into_iter().map(line_summary).collect(),
    })
}

/// Loads an order the caller may look at. Customers only see their own;
/// anything else reads as missing.
pub(crate) async fn visible_order(
    ctx: &ApiContext,
    session: &Session,
    role: Role,
    order_id: OrderId,
) -> Result<StoredOrder, ApiError> {
    let order = ctx
        .storage
        .load_order(order_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| order_not_found(order_id))?;
    if !role.is_staff() && order.login != session.login() {
        return Err(order_not_found(order_id));
    }
    Ok(order)
}

pub(crate) fn order_not_found(order_id: OrderId) -> ApiError {
    ApiError::new(ErrorCode::OrderNotFound, format!("order {order_id} not found"))
}

fn order_summary(order: StoredOrder) -> OrderSummary {
    OrderSummary {
        order_id: order.order_id,
        login: order.login,
        paid: order.paid,
        received_at: order.received_at,
        total: order.total,
    }
}

fn line_summary(line: StoredLine) -> ItemLineSummary {
    ItemLineSummary {
        order_id: line.order_id,
        item_name: line.item_name,
        unit_price: line.unit_price,
        last_updated: line.last_updated,
        status: line.status,
        comments: line.comments,
    }
}

#[cfg(test)]
#[path = "tests/ledger_tests.rs"]
mod tests;
