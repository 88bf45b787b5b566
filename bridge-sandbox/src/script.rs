//! Scripted store contents and SDK behaviour.

use bridge_traits::billing::{
    BillingResult, ProductDetails, ProductKind, Purchase, PurchaseHistoryRecord, ResponseCode,
};
use std::collections::{HashMap, HashSet};

/// SDK operations whose reported result can be scripted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SandboxOp {
    QueryProductDetails,
    QueryPurchases,
    QueryPurchaseHistory,
    Consume,
    Acknowledge,
    LaunchBillingFlow,
    LaunchPriceChangeFlow,
}

/// How `start_connection` reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupMode {
    /// Report setup with this code as soon as the connection is started.
    Immediate(ResponseCode),
    /// Wait for `SandboxBillingClient::finish_setup`.
    Manual,
}

/// Everything the sandbox store answers with.
#[derive(Debug, Clone)]
pub struct SandboxScript {
    pub setup: SetupMode,
    /// How many times each listener is invoked. `0` drops listeners unanswered.
    pub callback_fires: usize,
    pub products: Vec<ProductDetails>,
    /// Returned by every catalog query regardless of the requested ids.
    pub unrequested_products: Vec<ProductDetails>,
    pub purchases: Vec<(ProductKind, Purchase)>,
    pub history: Vec<(ProductKind, PurchaseHistoryRecord)>,
    pub responses: HashMap<SandboxOp, BillingResult>,
    pub supported_features: HashSet<String>,
    pub fail_client_creation: bool,
}

impl Default for SandboxScript {
    fn default() -> Self {
        Self {
            setup: SetupMode::Immediate(ResponseCode::Ok),
            callback_fires: 1,
            products: Vec::new(),
            unrequested_products: Vec::new(),
            purchases: Vec::new(),
            history: Vec::new(),
            responses: HashMap::new(),
            supported_features: HashSet::new(),
            fail_client_creation: false,
        }
    }
}

impl SandboxScript {
    pub fn response_for(&self, op: SandboxOp) -> BillingResult {
        self.responses
            .get(&op)
            .cloned()
            .unwrap_or_else(BillingResult::ok)
    }

    /// Catalog entries of `kind` whose id is in `ids`, plus any unrequested extras.
    pub fn catalog_for(&self, kind: ProductKind, ids: &[String]) -> Vec<ProductDetails> {
        self.products
            .iter()
            .filter(|p| p.kind == kind && ids.iter().any(|id| id == &p.product_id))
            .chain(self.unrequested_products.iter())
            .cloned()
            .collect()
    }

    pub fn purchases_for(&self, kind: ProductKind) -> Vec<Purchase> {
        self.purchases
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn history_for(&self, kind: ProductKind) -> Vec<PurchaseHistoryRecord> {
        self.history
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, r)| r.clone())
            .collect()
    }
}

/// Responses grouped by operation, for building scripts quickly.
pub fn responses(entries: &[(SandboxOp, ResponseCode)]) -> HashMap<SandboxOp, BillingResult> {
    entries
        .iter()
        .map(|(op, code)| (*op, BillingResult::new(*code, code.name())))
        .collect()
}
