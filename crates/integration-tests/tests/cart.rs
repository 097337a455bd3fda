//! Cart scenarios: reservations against inventory, checkout, concurrency.

use tristore_engine::models::DocumentCollection;
use tristore_engine::{ConsistencyError, ErrorKind};
use tristore_integration_tests::{TestContext, main_street, product};

// ============================================================================
// Reservations
// ============================================================================

#[tokio::test]
async fn test_cart_scenario() {
    let ctx = TestContext::new();
    let acme = ctx.vendor("Acme").await;
    let customer = ctx.customer("ada").await;
    let supplier = ctx.supplier("Parcel Co").await;
    let billing = ctx.customer_address(customer, main_street()).await;
    let listing = ctx.listing(acme, product("Widget", 500, 10)).await;

    let carts = ctx.engine.carts();
    let cart = carts.create_cart(customer).await.expect("cart");

    carts.add_to_cart(cart.id, listing, 6).await.expect("reserve 6");
    let err = carts
        .add_to_cart(cart.id, listing, 5)
        .await
        .expect_err("6 + 5 exceeds 10");
    assert!(matches!(
        err,
        ConsistencyError::InsufficientStock {
            requested: 11,
            available: 10,
            ..
        }
    ));

    let left = carts
        .remove_from_cart(cart.id, listing, 6)
        .await
        .expect("remove 6");
    assert!(left.is_none());
    assert!(carts.cart_contents(cart.id).await.expect("contents").is_empty());

    carts.add_to_cart(cart.id, listing, 10).await.expect("reserve 10");
    let placed = carts
        .place_order(cart.id, billing, supplier)
        .await
        .expect("order");
    assert_eq!(placed.positions.len(), 1);
    assert_eq!(placed.order.billing_address_id, billing);

    let info = ctx
        .engine
        .catalog()
        .listing_information(listing)
        .await
        .expect("info");
    assert_eq!(info.inventory_level, 0);
    assert!(!carts.is_item_available(listing, 1).await.expect("available"));
    assert_eq!(ctx.stores.documents.len(DocumentCollection::CustomerAction), 1);

    let empty = carts
        .place_order(cart.id, billing, supplier)
        .await
        .expect_err("cart consumed");
    assert_eq!(empty.kind(), ErrorKind::EmptyCart);
}

#[tokio::test]
async fn test_reservations_are_per_cart() {
    let ctx = TestContext::new();
    let acme = ctx.vendor("Acme").await;
    let customer = ctx.customer("ada").await;
    let listing = ctx.listing(acme, product("Widget", 500, 4)).await;

    let carts = ctx.engine.carts();
    let first = carts.create_cart(customer).await.expect("cart");
    let second = carts.create_cart(customer).await.expect("cart");

    // Each cart is checked against inventory on its own.
    carts.add_to_cart(first.id, listing, 4).await.expect("first");
    carts.add_to_cart(second.id, listing, 4).await.expect("second");
}

#[tokio::test]
async fn test_checkout_with_several_listings() {
    let ctx = TestContext::new();
    let acme = ctx.vendor("Acme").await;
    let customer = ctx.customer("ada").await;
    let supplier = ctx.supplier("Parcel Co").await;
    let billing = ctx.customer_address(customer, main_street()).await;
    let widget = ctx.listing(acme, product("Widget", 500, 10)).await;
    let gadget = ctx.listing(acme, product("Gadget", 900, 3)).await;

    let carts = ctx.engine.carts();
    let cart = carts.create_cart(customer).await.expect("cart");
    carts.add_to_cart(cart.id, gadget, 3).await.expect("gadget");
    carts.add_to_cart(cart.id, widget, 2).await.expect("widget");

    let placed = carts
        .place_order(cart.id, billing, supplier)
        .await
        .expect("order");
    let listings: Vec<_> = placed.positions.iter().map(|p| p.listing_id).collect();
    assert_eq!(listings, vec![widget, gadget]);

    let catalog = ctx.engine.catalog();
    assert_eq!(
        catalog.listing_information(widget).await.expect("widget").inventory_level,
        8
    );
    assert_eq!(
        catalog.listing_information(gadget).await.expect("gadget").inventory_level,
        0
    );
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_never_oversell() {
    const BUYERS: usize = 12;
    const STOCK: i32 = 5;

    let ctx = TestContext::new();
    let acme = ctx.vendor("Acme").await;
    let supplier = ctx.supplier("Parcel Co").await;
    let listing = ctx.listing(acme, product("Widget", 500, STOCK)).await;

    let mut handles = Vec::with_capacity(BUYERS);
    for buyer in 0..BUYERS {
        let customer = ctx.customer(&format!("buyer{buyer}")).await;
        let billing = ctx.customer_address(customer, main_street()).await;
        let engine = ctx.engine.clone();
        handles.push(tokio::spawn(async move {
            let carts = engine.carts();
            let cart = carts.create_cart(customer).await?;
            carts.add_to_cart(cart.id, listing, 1).await?;
            carts.place_order(cart.id, billing, supplier).await
        }));
    }

    let mut placed = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => placed += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::InsufficientStock, "{e}"),
        }
    }

    let info = ctx
        .engine
        .catalog()
        .listing_information(listing)
        .await
        .expect("info");
    assert_eq!(placed, STOCK);
    assert_eq!(info.inventory_level, 0);
}
