use shared::{
    domain::{MenuField, Money},
    error::{ApiError, ErrorCode},
    protocol::NewMenuItem,
};
use storage::{GuardedEdit, MenuEdit};
use tracing::info;

use crate::{
    catalog::unknown_item,
    dispatch::{authorize, Operation},
    internal, ApiContext, Session,
};

pub async fn add_item(
    ctx: &ApiContext,
    session: &Session,
    item: NewMenuItem,
) -> Result<(), ApiError> {
    authorize(ctx, session, Operation::ManageMenu).await?;
    if item.item_name.trim().is_empty() {
        return Err(ApiError::new(ErrorCode::Validation, "item name must not be empty"));
    }

    let inserted = ctx
        .storage
        .insert_menu_item(&item)
        .await
        .map_err(internal)?;
    if !inserted {
        return Err(duplicate_item(&item.item_name));
    }
    info!(by = session.login(), item = %item.item_name, price = %item.price, "menu item added");
    Ok(())
}

/// Edits one field of an item that no order line references yet.
pub async fn update_field(
    ctx: &ApiContext,
    session: &Session,
    item_name: &str,
    field: MenuField,
    value: &str,
) -> Result<(), ApiError> {
    authorize(ctx, session, Operation::ManageMenu).await?;
    let edit = parse_edit(field, value)?;

    let outcome = ctx
        .storage
        .update_menu_item(item_name, &edit)
        .await
        .map_err(internal)?;
    let renamed_to = match &edit {
        MenuEdit::Rename(new_name) => Some(new_name.as_str()),
        _ => None,
    };
    guarded(outcome, item_name, renamed_to)?;
    info!(by = session.login(), item = item_name, ?field, "menu item updated");
    Ok(())
}

pub async fn delete_item(
    ctx: &ApiContext,
    session: &Session,
    item_name: &str,
) -> Result<(), ApiError> {
    authorize(ctx, session, Operation::ManageMenu).await?;
    let outcome = ctx
        .storage
        .delete_menu_item(item_name)
        .await
        .map_err(internal)?;
    guarded(outcome, item_name, None)?;
    info!(by = session.login(), item = item_name, "menu item deleted");
    Ok(())
}

fn parse_edit(field: MenuField, value: &str) -> Result<MenuEdit, ApiError> {
    Ok(match field {
        MenuField::Name => {
            if value.trim().is_empty() {
                return Err(ApiError::new(ErrorCode::Validation, "item name must not be empty"));
            }
            MenuEdit::Rename(value.to_string())
        }
        MenuField::Type => MenuEdit::Type(value.to_string()),
        MenuField::Price => {
            let price: Money = value
                .parse()
                .map_err(|e| ApiError::new(ErrorCode::Validation, format!("{e}")))?;
            MenuEdit::Price(price)
        }
        MenuField::Description => MenuEdit::Description(value.to_string()),
        MenuField::ImageUrl => MenuEdit::ImageUrl(value.to_string()),
    })
}

fn guarded(
    outcome: GuardedEdit,
    item_name: &str,
    renamed_to: Option<&str>,
) -> Result<(), ApiError> {
    match outcome {
        GuardedEdit::Applied => Ok(()),
        GuardedEdit::UnknownItem => Err(unknown_item(item_name)),
        GuardedEdit::InUse => Err(ApiError::new(
            ErrorCode::ItemInUse,
            format!("'{item_name}' is referenced by existing orders"),
        )),
        GuardedEdit::NameTaken => Err(duplicate_item(renamed_to.unwrap_or(item_name))),
    }
}

fn duplicate_item(item_name: &str) -> ApiError {
    ApiError::new(
        ErrorCode::DuplicateItem,
        format!("'{item_name}' is already on the menu"),
    )
}

#[cfg(test)]
#[path = "tests/menu_admin_tests.rs"]
mod tests;
