use shared::{
    domain::{Money, Role},
    protocol::NewMenuItem,
};
use storage::Storage;

use crate::{access, ApiContext, Session};

pub(crate) const LATTE_CENTS: i64 = 350;
pub(crate) const MUFFIN_CENTS: i64 = 225;

/// alice and bob are customers, erin is an employee, mia manages.
pub(crate) async fn seeded_context() -> ApiContext {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let ctx = ApiContext::new(storage);

    for login in ["alice", "bob", "erin", "mia"] {
        access::create_account(&ctx, login, &password_for(login), "555-0100")
            .await
            .expect("account");
    }
    ctx.storage
        .set_role("erin", Role::Employee)
        .await
        .expect("role");
    ctx.storage
        .set_role("mia", Role::Manager)
        .await
        .expect("role");

    for (name, kind, cents) in [("Latte", "Drinks", LATTE_CENTS), ("Muffin", "Bakery", MUFFIN_CENTS)] {
        ctx.storage
            .insert_menu_item(&NewMenuItem {
                item_name: name.into(),
                item_type: kind.into(),
                price: Money::from_cents(cents).expect("price"),
                description: format!("house {name}"),
                image_url: String::new(),
            })
            .await
            .expect("menu item");
    }
    ctx
}

pub(crate) fn password_for(login: &str) -> String {
    format!("{login}-pw")
}

pub(crate) async fn customer_session(ctx: &ApiContext, login: &str) -> Session {
    access::authenticate(ctx, login, &password_for(login))
        .await
        .expect("session")
}

pub(crate) async fn employee_session(ctx: &ApiContext) -> Session {
    customer_session(ctx, "erin").await
}

pub(crate) async fn manager_session(ctx: &ApiContext) -> Session {
    customer_session(ctx, "mia").await
}
