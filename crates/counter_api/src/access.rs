use shared::{
    domain::Role,
    error::{ApiError, ErrorCode},
    protocol::UserProfile,
};
use storage::StoredUser;
use tracing::{info, warn};

use crate::{
    dispatch::{authorize, Operation},
    internal, ApiContext, Session,
};

/// Signs up a new customer with no favorites.
pub async fn create_account(
    ctx: &ApiContext,
    login: &str,
    password: &str,
    phone: &str,
) -> Result<UserProfile, ApiError> {
    if login.trim().is_empty() {
        return Err(ApiError::new(ErrorCode::Validation, "login must not be empty"));
    }

    let created = ctx
        .storage
        .create_user(login, password, phone)
        .await
        .map_err(internal)?
        .ok_or_else(|| {
            ApiError::new(ErrorCode::DuplicateLogin, format!("login '{login}' is taken"))
        })?;
    info!(login, "account created");
    Ok(profile_from(created))
}

/// Every attempt stands alone; there is no lockout.
pub async fn authenticate(
    ctx: &ApiContext,
    login: &str,
    password: &str,
) -> Result<Session, ApiError> {
    let role = ctx
        .storage
        .verify_credentials(login, password)
        .await
        .map_err(internal)?;
    match role {
        Some(role) => {
            info!(login, %role, "signed in");
            Ok(Session::new(login, role))
        }
        None => {
            warn!(login, "sign-in rejected");
            Err(auth_failure())
        }
    }
}

/// The old password is checked again even though the caller holds a session,
/// since the terminal may have been left unattended.
pub async fn change_password(
    ctx: &ApiContext,
    session: &Session,
    old_password: &str,
    new_password: &str,
) -> Result<(), ApiError> {
    authorize(ctx, session, Operation::ManageOwnAccount).await?;
    let replaced = ctx
        .storage
        .replace_password(session.login(), old_password, new_password)
        .await
        .map_err(internal)?;
    if !replaced {
        warn!(login = session.login(), "password change rejected: old password mismatch");
        return Err(auth_failure());
    }
    info!(login = session.login(), "password changed");
    Ok(())
}

pub async fn change_role(
    ctx: &ApiContext,
    session: &Session,
    target_login: &str,
    new_role: &str,
) -> Result<(), ApiError> {
    authorize(ctx, session, Operation::ChangeRole).await?;
    let role: Role = new_role
        .parse()
        .map_err(|e| ApiError::new(ErrorCode::InvalidRole, format!("{e}")))?;

    let updated = ctx
        .storage
        .set_role(target_login, role)
        .await
        .map_err(internal)?;
    if !updated {
        return Err(unknown_user(target_login));
    }
    info!(by = session.login(), target = target_login, %role, "role changed");
    Ok(())
}

pub async fn profile(ctx: &ApiContext, session: &Session) -> Result<UserProfile, ApiError> {
    authorize(ctx, session, Operation::ManageOwnAccount).await?;
    load_profile(ctx, session.login()).await
}

pub async fn update_phone(
    ctx: &ApiContext,
    session: &Session,
    phone: &str,
) -> Result<UserProfile, ApiError> {
    authorize(ctx, session, Operation::ManageOwnAccount).await?;
    if !ctx
        .storage
        .update_phone(session.login(), phone)
        .await
        .map_err(internal)?
    {
        return Err(unknown_user(session.login()));
    }
    load_profile(ctx, session.login()).await
}

/// Favorites only ever grow; new text is appended to what is already there.
pub async fn add_favorite_items(
    ctx: &ApiContext,
    session: &Session,
    items: &str,
) -> Result<UserProfile, ApiError> {
    authorize(ctx, session, Operation::ManageOwnAccount).await?;
    if !ctx
        .storage
        .append_favorite_items(session.login(), items)
        .await
        .map_err(internal)?
    {
        return Err(unknown_user(session.login()));
    }
    load_profile(ctx, session.login()).await
}

/// Manager edit of someone else's contact details.
pub async fn update_user_info(
    ctx: &ApiContext,
    session: &Session,
    target_login: &str,
    phone: Option<&str>,
    favorite_items: Option<&str>,
) -> Result<UserProfile, ApiError> {
    authorize(ctx, session, Operation::ManageUsers).await?;
    if ctx
        .storage
        .find_user(target_login)
        .await
        .map_err(internal)?
        .is_none()
    {
        return Err(unknown_user(target_login));
    }

    if let Some(phone) = phone {
        ctx.storage
            .update_phone(target_login, phone)
            .await
            .map_err(internal)?;
    }
    if let Some(items) = favorite_items {
        ctx.storage
            .append_favorite_items(target_login, items)
            .await
            .map_err(internal)?;
    }
    info!(by = session.login(), target = target_login, "user info updated");
    load_profile(ctx, target_login).await
}

pub async fn list_users(ctx: &ApiContext, session: &Session) -> Result<Vec<UserProfile>, ApiError> {
    authorize(ctx, session, Operation::ManageUsers).await?;
    let users = ctx.storage.list_users().await.map_err(internal)?;
    Ok(users.into_iter().map(profile_from).collect())
}

async fn load_profile(ctx: &ApiContext, login: &str) -> Result<UserProfile, ApiError> {
    ctx.storage
        .find_user(login)
        .await
        .map_err(internal)?
        .map(profile_from)
        .ok_or_else(|| unknown_user(login))
}

fn profile_from(user: StoredUser) -> UserProfile {
    UserProfile {
        login: user.login,
        phone: user.phone,
        favorite_items: user.favorite_items,
        role: user.role,
    }
}

fn auth_failure() -> ApiError {
    ApiError::new(ErrorCode::AuthFailure, "login or password did not match")
}

fn unknown_user(login: &str) -> ApiError {
    ApiError::new(ErrorCode::UnknownUser, format!("no user '{login}'"))
}

#[cfg(test)]
#[path = "tests/access_tests.rs"]
mod tests;
