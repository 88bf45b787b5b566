#![allow(dead_code)]

use bridge_sandbox::SandboxBillingFactory;
use bridge_traits::billing::{ProductDetails, ProductKind, Purchase, PurchaseState};
use bridge_traits::Clock;
use core_async::time::{sleep, timeout, Duration};
use core_billing::BillingBridge;
use core_runtime::config::BillingConfig;
use core_runtime::events::{CoreEvent, EventStream};
use serde_json::json;
use std::sync::Arc;

pub const HANDLE: i64 = 42;

pub fn config(factory: &SandboxBillingFactory) -> BillingConfig {
    BillingConfig::builder()
        .client_factory(Arc::new(factory.clone()))
        .build()
        .unwrap()
}

pub fn config_with_clock(factory: &SandboxBillingFactory, clock: Arc<dyn Clock>) -> BillingConfig {
    BillingConfig::builder()
        .client_factory(Arc::new(factory.clone()))
        .clock(clock)
        .build()
        .unwrap()
}

pub fn bridge(factory: &SandboxBillingFactory) -> BillingBridge {
    BillingBridge::new(&config(factory)).unwrap()
}

/// A bridge whose connection is already Ready.
pub async fn connected(factory: &SandboxBillingFactory) -> BillingBridge {
    let bridge = bridge(factory);
    let outcome = bridge.start_connection(HANDLE, true).await.unwrap();
    assert!(outcome.is_ok(), "setup failed: {:?}", outcome);
    bridge
}

pub fn product(id: &str, kind: ProductKind, price: &str) -> ProductDetails {
    ProductDetails::new(id, kind).with_metadata(json!({ "price": price, "title": id }))
}

pub fn purchase(token: &str, product_id: &str) -> Purchase {
    Purchase {
        purchase_token: token.to_string(),
        product_ids: vec![product_id.to_string()],
        purchase_state: PurchaseState::Purchased,
        is_acknowledged: false,
        metadata: json!({}),
    }
}

pub fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Waits until the bridge has absorbed at least `expected` anomalies.
pub async fn wait_for_anomalies(bridge: &BillingBridge, expected: u64) -> u64 {
    for _ in 0..200 {
        let seen = bridge.anomaly_count().await.unwrap();
        if seen >= expected {
            return seen;
        }
        sleep(Duration::from_millis(5)).await;
    }
    bridge.anomaly_count().await.unwrap()
}

pub async fn next_event(stream: &mut EventStream) -> CoreEvent {
    timeout(Duration::from_secs(2), stream.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed")
}
