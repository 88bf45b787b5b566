//! Catalog caching and purchase flow preconditions.

mod common;

use bridge_sandbox::{SandboxBillingFactory, SandboxOp, SandboxUi};
use bridge_traits::billing::{features, ProductKind, ReplacementMode, ResponseCode};
use bridge_traits::ManualClock;
use chrono::{Duration as ChronoDuration, Utc};
use common::*;
use core_billing::{BillingBridge, BillingError, Freshness, PurchaseFlowRequest};
use core_runtime::events::{CatalogEvent, CoreEvent};
use std::sync::Arc;

async fn stocked(factory: &SandboxBillingFactory) -> BillingBridge {
    factory
        .add_product(product("gas", ProductKind::InApp, "$1"))
        .add_product(product("oil", ProductKind::InApp, "$5"))
        .add_product(product("gold_monthly", ProductKind::Subs, "$3"))
        .add_product(product("gold_yearly", ProductKind::Subs, "$30"));
    let bridge = connected(factory).await;
    bridge
        .query_product_details(ProductKind::InApp, ids(&["gas", "oil"]))
        .await
        .unwrap();
    bridge
        .query_product_details(ProductKind::Subs, ids(&["gold_monthly", "gold_yearly"]))
        .await
        .unwrap();
    bridge
        .attach_ui(Arc::new(SandboxUi::new("main-activity")))
        .await
        .unwrap();
    bridge
}

#[core_async::test]
async fn test_gas_oil_diesel() {
    let factory = SandboxBillingFactory::new();
    factory
        .add_product(product("gas", ProductKind::InApp, "$1"))
        .add_product(product("oil", ProductKind::InApp, "$5"));
    let bridge = connected(&factory).await;
    bridge
        .attach_ui(Arc::new(SandboxUi::new("main-activity")))
        .await
        .unwrap();

    let outcome = bridge
        .query_product_details(ProductKind::InApp, ids(&["gas", "oil"]))
        .await
        .unwrap();
    assert!(outcome.is_ok());
    assert_eq!(outcome.payload.unwrap().len(), 2);

    let ack = bridge
        .launch_billing_flow(PurchaseFlowRequest::new("gas"))
        .await
        .unwrap();
    assert_eq!(ack.code, ResponseCode::Ok);

    let err = bridge
        .launch_billing_flow(PurchaseFlowRequest::new("diesel"))
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::ItemNotFound { ref product_id } if product_id == "diesel"));
    assert_eq!(err.host_code(), "NOT_FOUND");

    let client = factory.last_client().unwrap();
    assert_eq!(client.calls().launch_billing_flow, 1);
    assert_eq!(client.launches()[0].product.product_id, "gas");
}

#[core_async::test]
async fn test_launch_without_catalog_query_never_reaches_sdk() {
    let factory = SandboxBillingFactory::new();
    factory.add_product(product("gas", ProductKind::InApp, "$1"));
    let bridge = connected(&factory).await;
    bridge
        .attach_ui(Arc::new(SandboxUi::new("main-activity")))
        .await
        .unwrap();

    let err = bridge
        .launch_billing_flow(PurchaseFlowRequest::new("gas"))
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::ItemNotFound { .. }));
    assert_eq!(factory.last_client().unwrap().calls().launch_billing_flow, 0);
}

#[core_async::test]
async fn test_replacement_mode_without_old_item_is_rejected() {
    let factory = SandboxBillingFactory::new();
    let bridge = stocked(&factory).await;

    let request = PurchaseFlowRequest::new("gold_yearly")
        .with_replacement_mode(ReplacementMode::ImmediateWithTimeProration);
    let err = bridge.launch_billing_flow(request).await.unwrap_err();

    assert!(matches!(err, BillingError::MissingReplacementItem));
    assert_eq!(err.host_code(), "IN_APP_PURCHASE_REQUIRE_OLD_SKU");
    assert_eq!(factory.last_client().unwrap().calls().launch_billing_flow, 0);
}

#[core_async::test]
async fn test_uncached_replacement_item_is_rejected() {
    let factory = SandboxBillingFactory::new();
    let bridge = stocked(&factory).await;

    let request = PurchaseFlowRequest::new("gold_yearly").replacing("silver_monthly");
    let err = bridge.launch_billing_flow(request).await.unwrap_err();

    assert!(matches!(
        err,
        BillingError::InvalidReplacementItem { ref product_id } if product_id == "silver_monthly"
    ));
    assert_eq!(factory.last_client().unwrap().calls().launch_billing_flow, 0);
}

#[core_async::test]
async fn test_launch_forwards_replacement_and_account_tokens() {
    let factory = SandboxBillingFactory::new();
    let bridge = stocked(&factory).await;

    let upgrade = PurchaseFlowRequest::new("gold_yearly")
        .with_account("acct-hash")
        .with_profile("profile-hash")
        .replacing("gold_monthly")
        .with_replacement_mode(ReplacementMode::Deferred)
        .with_old_purchase_token("tok-monthly");
    bridge.launch_billing_flow(upgrade).await.unwrap();

    // Without a replacement token no subscription update is attached.
    let plain = PurchaseFlowRequest::new("gold_yearly").replacing("gold_monthly");
    bridge.launch_billing_flow(plain).await.unwrap();

    let launches = factory.last_client().unwrap().launches();
    assert_eq!(launches.len(), 2);

    let update = launches[0].subscription_update.as_ref().unwrap();
    assert_eq!(update.old_product_id.as_deref(), Some("gold_monthly"));
    assert_eq!(update.old_purchase_token, "tok-monthly");
    assert_eq!(update.replacement_mode, ReplacementMode::Deferred);
    assert_eq!(launches[0].obfuscated_account_id.as_deref(), Some("acct-hash"));
    assert_eq!(launches[0].obfuscated_profile_id.as_deref(), Some("profile-hash"));
    assert_eq!(launches[0].product.metadata["price"], "$30");

    assert!(launches[1].subscription_update.is_none());
}

#[core_async::test]
async fn test_launch_ack_is_passed_through() {
    let factory = SandboxBillingFactory::new();
    let bridge = stocked(&factory).await;
    factory.respond_with(SandboxOp::LaunchBillingFlow, ResponseCode::ItemAlreadyOwned);

    let ack = bridge
        .launch_billing_flow(PurchaseFlowRequest::new("gas"))
        .await
        .unwrap();
    assert_eq!(ack.code, ResponseCode::ItemAlreadyOwned);
    assert_eq!(ack.message, "ITEM_ALREADY_OWNED");
}

#[core_async::test]
async fn test_launch_requires_live_ui() {
    let factory = SandboxBillingFactory::new();
    let bridge = stocked(&factory).await;

    bridge.detach_ui().await.unwrap();
    let err = bridge
        .launch_billing_flow(PurchaseFlowRequest::new("gas"))
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::UiUnavailable { .. }));
    assert_eq!(err.host_code(), "ACTIVITY_UNAVAILABLE");

    let ui = Arc::new(SandboxUi::new("dying-activity"));
    bridge.attach_ui(ui.clone()).await.unwrap();
    ui.finish();
    assert!(matches!(
        bridge.launch_billing_flow(PurchaseFlowRequest::new("gas")).await,
        Err(BillingError::UiUnavailable { .. })
    ));
    assert_eq!(factory.last_client().unwrap().calls().launch_billing_flow, 0);
}

#[core_async::test]
async fn test_catalog_overwrites_entries_whole() {
    let factory = SandboxBillingFactory::new();
    factory
        .add_product(product("gas", ProductKind::InApp, "$1"))
        .add_product(product("oil", ProductKind::InApp, "$5"));
    let bridge = connected(&factory).await;
    bridge
        .query_product_details(ProductKind::InApp, ids(&["gas", "oil"]))
        .await
        .unwrap();

    // The store now only knows a repriced gas without a title.
    factory.script(|s| {
        s.products = vec![bridge_traits::billing::ProductDetails::new("gas", ProductKind::InApp)
            .with_metadata(serde_json::json!({ "price": "$2" }))];
    });
    let outcome = bridge
        .query_product_details(ProductKind::InApp, ids(&["gas", "oil"]))
        .await
        .unwrap();
    assert_eq!(outcome.payload.unwrap().len(), 1);

    let gas = bridge.cached_product("gas").await.unwrap().unwrap();
    assert_eq!(gas.metadata["price"], "$2");
    assert!(gas.metadata.get("title").is_none());

    let oil = bridge.cached_product("oil").await.unwrap().unwrap();
    assert_eq!(oil.metadata["price"], "$5");
    assert!(bridge.cached_product("diesel").await.unwrap().is_none());
}

#[core_async::test]
async fn test_unrequested_products_are_cached() {
    let factory = SandboxBillingFactory::new();
    factory.script(|s| {
        s.unrequested_products = vec![product("promo", ProductKind::InApp, "$0")];
    });
    let bridge = connected(&factory).await;
    let mut events = bridge.subscribe();

    bridge
        .query_product_details(ProductKind::InApp, ids(&["gas"]))
        .await
        .unwrap();

    assert!(bridge.cached_product("promo").await.unwrap().is_some());
    assert_eq!(
        next_event(&mut events).await,
        CoreEvent::Catalog(CatalogEvent::Refreshed {
            kind: ProductKind::InApp,
            product_ids: ids(&["promo"]),
        })
    );
}

#[core_async::test]
async fn test_staleness_is_advisory_and_resets_on_failure() {
    let factory = SandboxBillingFactory::new();
    factory.add_product(product("gas", ProductKind::InApp, "$1"));
    let start = Utc::now();
    let clock = Arc::new(ManualClock::new(start));
    let bridge = BillingBridge::new(&config_with_clock(&factory, clock.clone())).unwrap();
    bridge.start_connection(HANDLE, true).await.unwrap();

    let status = bridge.catalog_status().await.unwrap();
    assert!(status.stale);
    assert_eq!(status.freshness, Freshness::NeverSucceeded);

    bridge
        .query_product_details(ProductKind::InApp, ids(&["gas"]))
        .await
        .unwrap();
    let status = bridge.catalog_status().await.unwrap();
    assert!(!status.stale);
    assert_eq!(status.entries, 1);
    assert_eq!(status.freshness, Freshness::RespondedAt { at: start });

    clock.advance(ChronoDuration::hours(5));
    assert!(bridge.catalog_status().await.unwrap().stale);

    // A stale catalog still answers queries and launches.
    let requery = bridge
        .query_product_details(ProductKind::InApp, ids(&["gas"]))
        .await
        .unwrap();
    assert!(requery.is_ok());
    assert!(!bridge.catalog_status().await.unwrap().stale);

    factory.respond_with(SandboxOp::QueryProductDetails, ResponseCode::ServiceUnavailable);
    let failed = bridge
        .query_product_details(ProductKind::InApp, ids(&["gas"]))
        .await
        .unwrap();
    assert_eq!(failed.code, ResponseCode::ServiceUnavailable);

    let status = bridge.catalog_status().await.unwrap();
    assert!(status.stale);
    assert_eq!(status.freshness, Freshness::NeverSucceeded);
    assert_eq!(status.entries, 1);
}

#[core_async::test]
async fn test_price_change_flow_checks_ui_first() {
    let factory = SandboxBillingFactory::new();
    let bridge = bridge(&factory);

    // Not connected, but the missing UI is reported first.
    assert!(matches!(
        bridge.launch_price_change_flow("gold_monthly").await,
        Err(BillingError::UiUnavailable { .. })
    ));
}

#[core_async::test]
async fn test_price_change_flow_round_trip() {
    let factory = SandboxBillingFactory::new();
    let bridge = stocked(&factory).await;

    assert!(matches!(
        bridge.launch_price_change_flow("platinum").await,
        Err(BillingError::ItemNotFound { .. })
    ));

    let outcome = bridge
        .launch_price_change_flow("gold_monthly")
        .await
        .unwrap();
    assert!(outcome.is_ok());
    assert_eq!(
        factory.last_client().unwrap().price_changes(),
        ids(&["gold_monthly"])
    );
}

#[core_async::test]
async fn test_feature_support() {
    let factory = SandboxBillingFactory::new();
    factory.support_feature(features::SUBSCRIPTIONS);
    let bridge = connected(&factory).await;

    assert!(bridge
        .is_feature_supported(features::SUBSCRIPTIONS)
        .await
        .unwrap());
    assert!(!bridge
        .is_feature_supported(features::PRICE_CHANGE_CONFIRMATION)
        .await
        .unwrap());
}
