mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use storefront_api::{
    entities::{cart_item, order_item, product, CartItem, Order, OrderItem, OrderStatus, Payment},
    errors::ServiceError,
    services::checkout::CheckoutInput,
};

fn input(token: &str) -> CheckoutInput {
    CheckoutInput {
        payment_token: token.to_string(),
        note: None,
        idempotency_key: None,
    }
}

#[tokio::test]
async fn widget_checkout_end_to_end() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", false).await;
    let widget = app.seed_product("Widget", dec!(9.99)).await;
    app.add_to_cart(&customer, widget, 2).await;

    let outcome = app
        .state
        .services
        .checkout
        .checkout(customer.id, input("tok_test"))
        .await
        .expect("checkout should succeed");

    assert_eq!(outcome.order.total, dec!(19.98));
    assert_eq!(outcome.order.status, OrderStatus::Success);
    assert_eq!(outcome.order.customer_id, customer.id);

    // One payment, linked in both directions
    let payment = Payment::find_by_id(outcome.payment_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("payment row should exist");
    assert_eq!(payment.order_id, Some(outcome.order.id));
    assert_eq!(payment.amount, dec!(19.98));
    assert_eq!(payment.gateway_token, "tok_test");
    assert_eq!(outcome.order.payment_id, payment.id);

    // One frozen order item carrying the snapshot values
    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(outcome.order.id))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Widget");
    assert_eq!(items[0].price, dec!(9.99));
    assert_eq!(items[0].quantity, 2);

    // Cart is empty afterwards
    let remaining = CartItem::find()
        .filter(cart_item::Column::CustomerId.eq(customer.id))
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    // Exactly one gateway charge, in minor units, with the client token
    assert_eq!(app.gateway.charge_count(), 1);
    let charge = app.gateway.last_charge().unwrap();
    assert_eq!(charge.amount_minor, 1998);
    assert_eq!(charge.token, "tok_test");
    assert!(charge.description.contains(&outcome.order.id.to_string()));
    assert!(outcome.gateway_reference.is_some());
}

#[tokio::test]
async fn empty_cart_checkout_is_rejected_before_any_write() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", false).await;

    let err = app
        .state
        .services
        .checkout
        .checkout(customer.id, input("tok_test"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::EmptyCart);

    assert_eq!(Payment::find().count(&*app.state.db).await.unwrap(), 0);
    assert_eq!(Order::find().count(&*app.state.db).await.unwrap(), 0);
    assert_eq!(OrderItem::find().count(&*app.state.db).await.unwrap(), 0);
    assert_eq!(app.gateway.charge_count(), 0);
}

#[tokio::test]
async fn blank_payment_token_is_rejected_before_any_write() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", false).await;
    let widget = app.seed_product("Widget", dec!(9.99)).await;
    app.add_to_cart(&customer, widget, 1).await;

    let err = app
        .state
        .services
        .checkout
        .checkout(customer.id, input("   "))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    assert_eq!(Payment::find().count(&*app.state.db).await.unwrap(), 0);
    assert_eq!(Order::find().count(&*app.state.db).await.unwrap(), 0);
    assert_eq!(app.gateway.charge_count(), 0);
}

#[tokio::test]
async fn order_snapshot_is_immune_to_later_catalog_changes() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", false).await;
    let widget = app.seed_product("Widget", dec!(9.99)).await;
    app.add_to_cart(&customer, widget, 2).await;

    let outcome = app
        .state
        .services
        .checkout
        .checkout(customer.id, input("tok_test"))
        .await
        .unwrap();

    // Reprice and rename the product after the fact
    product::ActiveModel {
        id: Set(widget),
        name: Set("Widget Deluxe".to_string()),
        price: Set(dec!(100.00)),
        ..Default::default()
    }
    .update(&*app.state.db)
    .await
    .unwrap();

    let order = Order::find_by_id(outcome.order.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.total, dec!(19.98));

    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order.id))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(items[0].name, "Widget");
    assert_eq!(items[0].price, dec!(9.99));
}

#[tokio::test]
async fn commit_unit_rolls_back_when_item_insert_fails() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", false).await;
    let widget = app.seed_product("Widget", dec!(9.99)).await;
    app.add_to_cart(&customer, widget, 2).await;

    // Force a failure between the order insert and the order item insert.
    app.state
        .db
        .execute_unprepared("DROP TABLE order_items")
        .await
        .unwrap();

    let err = app
        .state
        .services
        .checkout
        .checkout(customer.id, input("tok_test"))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::CommitFailed {
            step: "order item insert",
            ..
        }
    );

    // Nothing from the attempt persisted
    assert_eq!(Payment::find().count(&*app.state.db).await.unwrap(), 0);
    assert_eq!(Order::find().count(&*app.state.db).await.unwrap(), 0);

    // The pricing input survives for a retry
    let remaining = CartItem::find()
        .filter(cart_item::Column::CustomerId.eq(customer.id))
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(remaining, 1);

    assert_eq!(app.gateway.charge_count(), 0);
}

#[tokio::test]
async fn gateway_failure_cancels_the_committed_order() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", false).await;
    let widget = app.seed_product("Widget", dec!(9.99)).await;
    app.add_to_cart(&customer, widget, 2).await;

    app.gateway.decline_next("card_declined");

    let err = app
        .state
        .services
        .checkout
        .checkout(customer.id, input("tok_test"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::GatewayError(_));

    // The local commit survived, but the order is no longer SUCCESS
    let orders = Order::find().all(&*app.state.db).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Cancelled);
    let note = orders[0].note.as_deref().unwrap_or_default();
    assert!(note.contains("card_declined"), "note was: {note}");

    // The payment row is retained for reconciliation, still linked
    let payments = Payment::find().all(&*app.state.db).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].order_id, Some(orders[0].id));

    // The cart was cleared by the commit unit
    let remaining = CartItem::find()
        .filter(cart_item::Column::CustomerId.eq(customer.id))
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    assert_eq!(app.gateway.charge_count(), 1);
}

#[tokio::test]
async fn idempotency_key_replays_the_committed_order() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", false).await;
    let widget = app.seed_product("Widget", dec!(9.99)).await;
    app.add_to_cart(&customer, widget, 2).await;

    let keyed = CheckoutInput {
        payment_token: "tok_test".to_string(),
        note: None,
        idempotency_key: Some("attempt-1".to_string()),
    };

    let first = app
        .state
        .services
        .checkout
        .checkout(customer.id, keyed.clone())
        .await
        .expect("first attempt should commit");

    // The cart is empty now; the replay must short-circuit before the
    // empty-cart check and must not charge again.
    let replay = app
        .state
        .services
        .checkout
        .checkout(customer.id, keyed)
        .await
        .expect("replay should succeed");

    assert_eq!(replay.order.id, first.order.id);
    assert_eq!(replay.payment_id, first.payment_id);
    assert!(replay.gateway_reference.is_none());

    assert_eq!(Order::find().count(&*app.state.db).await.unwrap(), 1);
    assert_eq!(app.gateway.charge_count(), 1);
}
