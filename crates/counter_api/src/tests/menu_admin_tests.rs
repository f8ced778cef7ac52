use super::*;
use crate::{
    catalog, ledger,
    test_support::{customer_session, employee_session, manager_session, seeded_context},
};

fn scone() -> NewMenuItem {
    NewMenuItem {
        item_name: "Scone".into(),
        item_type: "Bakery".into(),
        price: "2.75".parse().expect("price"),
        description: "cranberry".into(),
        image_url: "https://example.invalid/scone.png".into(),
    }
}

#[tokio::test]
async fn only_managers_curate_the_menu() {
    let ctx = seeded_context().await;
    for session in [
        customer_session(&ctx, "alice").await,
        employee_session(&ctx).await,
    ] {
        let err = add_item(&ctx, &session, scone()).await.expect_err("refused");
        assert_eq!(err.code, ErrorCode::Unauthorized);
        let err = delete_item(&ctx, &session, "Muffin")
            .await
            .expect_err("refused");
        assert_eq!(err.code, ErrorCode::Unauthorized);
    }
    assert!(catalog::price_of(&ctx, "Muffin").await.is_ok());
}

#[tokio::test]
async fn add_rejects_duplicate_names() {
    let ctx = seeded_context().await;
    let mia = manager_session(&ctx).await;
    add_item(&ctx, &mia, scone()).await.expect("added");
    let err = add_item(&ctx, &mia, scone()).await.expect_err("duplicate");
    assert_eq!(err.code, ErrorCode::DuplicateItem);
}

#[tokio::test]
async fn referenced_item_cannot_be_edited_or_deleted() {
    let ctx = seeded_context().await;
    let mia = manager_session(&ctx).await;
    let alice = customer_session(&ctx, "alice").await;
    ledger::place_order(&ctx, &alice, "Latte", "")
        .await
        .expect("order");

    for field in [
        MenuField::Name,
        MenuField::Type,
        MenuField::Price,
        MenuField::Description,
        MenuField::ImageUrl,
    ] {
        let value = if field == MenuField::Price { "4.00" } else { "x" };
        let err = update_field(&ctx, &mia, "Latte", field, value)
            .await
            .expect_err("in use");
        assert_eq!(err.code, ErrorCode::ItemInUse, "{field:?}");
    }
    let err = delete_item(&ctx, &mia, "Latte").await.expect_err("in use");
    assert_eq!(err.code, ErrorCode::ItemInUse);
    assert_eq!(catalog::price_of(&ctx, "Latte").await.expect("price").cents(), 350);
}

#[tokio::test]
async fn unreferenced_item_can_be_edited_and_deleted() {
    let ctx = seeded_context().await;
    let mia = manager_session(&ctx).await;

    update_field(&ctx, &mia, "Muffin", MenuField::Price, "2.5")
        .await
        .expect("price");
    assert_eq!(catalog::price_of(&ctx, "Muffin").await.expect("price").cents(), 250);

    update_field(&ctx, &mia, "Muffin", MenuField::Name, "Bran Muffin")
        .await
        .expect("rename");
    let err = catalog::price_of(&ctx, "Muffin").await.expect_err("renamed");
    assert_eq!(err.code, ErrorCode::UnknownItem);

    delete_item(&ctx, &mia, "Bran Muffin").await.expect("delete");
    let found = catalog::find_by_name(&ctx, &mia, "Bran Muffin")
        .await
        .expect("lookup");
    assert!(found.is_empty());
}

#[tokio::test]
async fn edits_report_missing_items_and_bad_values() {
    let ctx = seeded_context().await;
    let mia = manager_session(&ctx).await;

    let err = update_field(&ctx, &mia, "Cortado", MenuField::Description, "strong")
        .await
        .expect_err("missing");
    assert_eq!(err.code, ErrorCode::UnknownItem);
    let err = delete_item(&ctx, &mia, "Cortado").await.expect_err("missing");
    assert_eq!(err.code, ErrorCode::UnknownItem);

    let err = update_field(&ctx, &mia, "Muffin", MenuField::Price, "-1")
        .await
        .expect_err("negative");
    assert_eq!(err.code, ErrorCode::Validation);

    let err = update_field(&ctx, &mia, "Muffin", MenuField::Name, "Latte")
        .await
        .expect_err("collision");
    assert_eq!(err.code, ErrorCode::DuplicateItem);
}
