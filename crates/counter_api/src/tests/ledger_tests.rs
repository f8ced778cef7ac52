use super::*;
use crate::test_support::{
    customer_session, employee_session, manager_session, seeded_context, LATTE_CENTS,
    MUFFIN_CENTS,
};
use shared::domain::ItemStatus;

async fn assert_total_matches_lines(ctx: &ApiContext, order_id: OrderId, expected_cents: i64) {
    let order = ctx
        .storage
        .load_order(order_id)
        .await
        .expect("load")
        .expect("order");
    assert_eq!(order.total.cents(), expected_cents);
    assert_eq!(
        order.total,
        ctx.storage.line_total(order_id).await.expect("line sum")
    );
}

#[tokio::test]
async fn total_tracks_every_line_added() {
    let ctx = seeded_context().await;
    let alice = customer_session(&ctx, "alice").await;

    let order_id = place_order(&ctx, &alice, "Latte", "").await.expect("order");
    assert_total_matches_lines(&ctx, order_id, LATTE_CENTS).await;

    let total = add_item_to_order(&ctx, &alice, order_id, "Muffin", "")
        .await
        .expect("add");
    assert_eq!(total.cents(), LATTE_CENTS + MUFFIN_CENTS);
    assert_total_matches_lines(&ctx, order_id, LATTE_CENTS + MUFFIN_CENTS).await;

    add_item_to_order(&ctx, &alice, order_id, "Muffin", "second one")
        .await
        .expect("add");
    assert_total_matches_lines(&ctx, order_id, LATTE_CENTS + 2 * MUFFIN_CENTS).await;
}

#[tokio::test]
async fn place_order_rejects_unknown_item() {
    let ctx = seeded_context().await;
    let alice = customer_session(&ctx, "alice").await;
    let err = place_order(&ctx, &alice, "Cortado", "")
        .await
        .expect_err("not on menu");
    assert_eq!(err.code, ErrorCode::UnknownItem);
    assert!(order_history(&ctx, &alice, DEFAULT_HISTORY_LIMIT)
        .await
        .expect("history")
        .is_empty());
}

#[tokio::test]
async fn paid_order_rejects_additions_regardless_of_item() {
    let ctx = seeded_context().await;
    let alice = customer_session(&ctx, "alice").await;
    let erin = employee_session(&ctx).await;
    let order_id = place_order(&ctx, &alice, "Latte", "").await.expect("order");
    mark_paid(&ctx, &erin, order_id).await.expect("paid");

    for item in ["Muffin", "Cortado"] {
        let err = add_item_to_order(&ctx, &alice, order_id, item, "")
            .await
            .expect_err("paid");
        assert_eq!(err.code, ErrorCode::OrderNotFound, "{item}");
    }
    assert_total_matches_lines(&ctx, order_id, LATTE_CENTS).await;
}

#[tokio::test]
async fn only_the_owner_may_add_to_an_order() {
    let ctx = seeded_context().await;
    let alice = customer_session(&ctx, "alice").await;
    let bob = customer_session(&ctx, "bob").await;
    let order_id = place_order(&ctx, &alice, "Latte", "").await.expect("order");

    let err = add_item_to_order(&ctx, &bob, order_id, "Muffin", "")
        .await
        .expect_err("not bob's");
    assert_eq!(err.code, ErrorCode::OrderNotFound);

    let err = add_item_to_order(&ctx, &alice, OrderId(4040), "Muffin", "")
        .await
        .expect_err("missing");
    assert_eq!(err.code, ErrorCode::OrderNotFound);

    let err = add_item_to_order(&ctx, &alice, order_id, "Cortado", "")
        .await
        .expect_err("unknown item");
    assert_eq!(err.code, ErrorCode::UnknownItem);
}

#[tokio::test]
async fn mark_paid_is_staff_only_and_idempotent() {
    let ctx = seeded_context().await;
    let alice = customer_session(&ctx, "alice").await;
    let mia = manager_session(&ctx).await;
    let order_id = place_order(&ctx, &alice, "Latte", "").await.expect("order");

    let err = mark_paid(&ctx, &alice, order_id).await.expect_err("customer");
    assert_eq!(err.code, ErrorCode::Unauthorized);

    mark_paid(&ctx, &mia, order_id).await.expect("paid");
    let once = order_detail(&ctx, &mia, order_id).await.expect("detail");
    mark_paid(&ctx, &mia, order_id).await.expect("paid again");
    let twice = order_detail(&ctx, &mia, order_id).await.expect("detail");
    assert!(once.order.paid);
    assert_eq!(once, twice);

    let err = mark_paid(&ctx, &mia, OrderId(4040)).await.expect_err("missing");
    assert_eq!(err.code, ErrorCode::OrderNotFound);
}

#[tokio::test]
async fn history_is_own_newest_first_and_bounded() {
    let ctx = seeded_context().await;
    let alice = customer_session(&ctx, "alice").await;
    let bob = customer_session(&ctx, "bob").await;

    let mut placed = Vec::new();
    for _ in 0..6 {
        placed.push(place_order(&ctx, &alice, "Latte", "").await.expect("order"));
    }
    place_order(&ctx, &bob, "Muffin", "").await.expect("order");

    let history = order_history(&ctx, &alice, DEFAULT_HISTORY_LIMIT)
        .await
        .expect("history");
    assert_eq!(history.len(), 5);
    assert!(history.iter().all(|o| o.login == "alice"));
    assert_eq!(history[0].order_id, placed[5]);

    // Touching an older order moves it to the front.
    add_item_to_order(&ctx, &alice, placed[0], "Muffin", "")
        .await
        .expect("add");
    let history = order_history(&ctx, &alice, 2).await.expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].order_id, placed[0]);

    let bob_history = order_history(&ctx, &bob, DEFAULT_HISTORY_LIMIT)
        .await
        .expect("history");
    assert_eq!(bob_history.len(), 1);
}

#[tokio::test]
async fn open_orders_lists_unpaid_recent_orders_for_staff() {
    let ctx = seeded_context().await;
    let alice = customer_session(&ctx, "alice").await;
    let erin = employee_session(&ctx).await;
    let window = Duration::hours(DEFAULT_OPEN_WINDOW_HOURS);

    let paid = place_order(&ctx, &alice, "Latte", "").await.expect("order");
    let open = place_order(&ctx, &alice, "Muffin", "").await.expect("order");
    mark_paid(&ctx, &erin, paid).await.expect("paid");

    let queue = open_orders(&ctx, &erin, window).await.expect("queue");
    let ids: Vec<OrderId> = queue.iter().map(|o| o.order_id).collect();
    assert_eq!(ids, vec![open]);

    let err = open_orders(&ctx, &alice, window).await.expect_err("customer");
    assert_eq!(err.code, ErrorCode::Unauthorized);
}

#[tokio::test]
async fn order_detail_hides_other_customers_orders() {
    let ctx = seeded_context().await;
    let alice = customer_session(&ctx, "alice").await;
    let bob = customer_session(&ctx, "bob").await;
    let erin = employee_session(&ctx).await;
    let order_id = place_order(&ctx, &alice, "Latte", "oat milk")
        .await
        .expect("order");

    let detail = order_detail(&ctx, &alice, order_id).await.expect("own");
    assert_eq!(detail.lines.len(), 1);
    assert_eq!(detail.lines[0].status, ItemStatus::NotStarted);
    assert_eq!(detail.lines[0].comments, "oat milk");
    assert_eq!(detail.lines[0].unit_price.cents(), LATTE_CENTS);

    let err = order_detail(&ctx, &bob, order_id).await.expect_err("foreign");
    assert_eq!(err.code, ErrorCode::OrderNotFound);
    order_detail(&ctx, &erin, order_id).await.expect("staff");
}

#[tokio::test]
async fn oversized_window_covers_every_unpaid_order() {
    let ctx = seeded_context().await;
    let alice = customer_session(&ctx, "alice").await;
    let erin = employee_session(&ctx).await;
    let order_id = place_order(&ctx, &alice, "Latte", "").await.expect("order");

    let queue = open_orders(&ctx, &erin, Duration::hours(3_000_000_000))
        .await
        .expect("queue");
    let ids: Vec<OrderId> = queue.iter().map(|o| o.order_id).collect();
    assert_eq!(ids, vec![order_id]);
}

#[tokio::test]
async fn total_overflow_is_a_recoverable_rejection() {
    let ctx = seeded_context().await;
    let alice = customer_session(&ctx, "alice").await;
    ctx.storage
        .insert_menu_item(&shared::protocol::NewMenuItem {
            item_name: "Gold Leaf Cake".into(),
            item_type: "Bakery".into(),
            price: "50000000000000000.00".parse().expect("price"),
            description: String::new(),
            image_url: String::new(),
        })
        .await
        .expect("menu item");
    let order_id = place_order(&ctx, &alice, "Gold Leaf Cake", "")
        .await
        .expect("order");

    let err = add_item_to_order(&ctx, &alice, order_id, "Gold Leaf Cake", "")
        .await
        .expect_err("total out of range");
    assert_eq!(err.code, ErrorCode::Validation);
    assert!(!err.is_fatal());

    let detail = order_detail(&ctx, &alice, order_id).await.expect("detail");
    assert_eq!(detail.lines.len(), 1);
    assert_eq!(detail.order.total.cents(), 5_000_000_000_000_000_000);
}
