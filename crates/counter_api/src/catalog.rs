use shared::{
    domain::Money,
    error::{ApiError, ErrorCode},
    protocol::MenuItemSummary,
};
use storage::StoredMenuItem;

use crate::{
    dispatch::{authorize, Operation},
    internal, ApiContext, Session,
};

/// Exact-name lookup. No match is an empty list, not an error.
pub async fn find_by_name(
    ctx: &ApiContext,
    session: &Session,
    item_name: &str,
) -> Result<Vec<MenuItemSummary>, ApiError> {
    authorize(ctx, session, Operation::BrowseMenu).await?;
    let items = ctx
        .storage
        .menu_items_by_name(item_name)
        .await
        .map_err(internal)?;
    Ok(items.into_iter().map(summary_from).collect())
}

pub async fn find_by_type(
    ctx: &ApiContext,
    session: &Session,
    item_type: &str,
) -> Result<Vec<MenuItemSummary>, ApiError> {
    authorize(ctx, session, Operation::BrowseMenu).await?;
    let items = ctx
        .storage
        .menu_items_by_type(item_type)
        .await
        .map_err(internal)?;
    Ok(items.into_iter().map(summary_from).collect())
}

pub async fn list_menu(
    ctx: &ApiContext,
    session: &Session,
) -> Result<Vec<MenuItemSummary>, ApiError> {
    authorize(ctx, session, Operation::BrowseMenu).await?;
    let items = ctx.storage.list_menu().await.map_err(internal)?;
    Ok(items.into_iter().map(summary_from).collect())
}

/// Never falls back to zero for an item that is not on the menu.
pub async fn price_of(ctx: &ApiContext, item_name: &str) -> Result<Money, ApiError> {
    ctx.storage
        .price_of(item_name)
        .await
        .map_err(internal)?
        .ok_or_else(|| unknown_item(item_name))
}

pub(crate) fn unknown_item(item_name: &str) -> ApiError {
    ApiError::new(
        ErrorCode::UnknownItem,
        format!("'{item_name}' is not on the menu"),
    )
}

fn summary_from(item: StoredMenuItem) -> MenuItemSummary {
    MenuItemSummary {
        item_name: item.item_name,
        item_type: item.item_type,
        price: item.price,
        description: item.description,
        image_url: item.image_url,
    }
}
