use bridge_traits::billing::{
    BillingClient, BillingClientFactory, BillingResult, ProductDetails, ProductKind, Purchase,
    PurchaseHistoryRecord, PurchasesUpdatedListener, ResponseCode,
};
use bridge_traits::error::{BridgeError, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

use crate::client::SandboxBillingClient;
use crate::script::{SandboxOp, SandboxScript, SetupMode};

/// Creates [`SandboxBillingClient`]s that share one scripted store.
///
/// The script can be edited at any time; clients read it on every call.
#[derive(Clone, Default)]
pub struct SandboxBillingFactory {
    script: Arc<Mutex<SandboxScript>>,
    clients: Arc<Mutex<Vec<Arc<SandboxBillingClient>>>>,
}

impl SandboxBillingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: SandboxScript) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
            clients: Arc::default(),
        }
    }

    /// Edits the shared script in place.
    pub fn script<R>(&self, edit: impl FnOnce(&mut SandboxScript) -> R) -> R {
        edit(&mut self.lock_script())
    }

    pub fn add_product(&self, product: ProductDetails) -> &Self {
        self.lock_script().products.push(product);
        self
    }

    pub fn add_purchase(&self, kind: ProductKind, purchase: Purchase) -> &Self {
        self.lock_script().purchases.push((kind, purchase));
        self
    }

    pub fn add_history(&self, kind: ProductKind, record: PurchaseHistoryRecord) -> &Self {
        self.lock_script().history.push((kind, record));
        self
    }

    pub fn respond_with(&self, op: SandboxOp, code: ResponseCode) -> &Self {
        self.lock_script()
            .responses
            .insert(op, BillingResult::new(code, code.name()));
        self
    }

    pub fn set_setup(&self, mode: SetupMode) -> &Self {
        self.lock_script().setup = mode;
        self
    }

    pub fn set_callback_fires(&self, fires: usize) -> &Self {
        self.lock_script().callback_fires = fires;
        self
    }

    pub fn support_feature(&self, feature: &str) -> &Self {
        self.lock_script()
            .supported_features
            .insert(feature.to_string());
        self
    }

    /// Number of clients created so far.
    pub fn created(&self) -> usize {
        self.lock_clients().len()
    }

    /// The most recently created client.
    pub fn last_client(&self) -> Option<Arc<SandboxBillingClient>> {
        self.lock_clients().last().cloned()
    }

    fn lock_script(&self) -> MutexGuard<'_, SandboxScript> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_clients(&self) -> MutexGuard<'_, Vec<Arc<SandboxBillingClient>>> {
        self.clients.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BillingClientFactory for SandboxBillingFactory {
    fn create_client(
        &self,
        enable_pending_purchases: bool,
        purchases_listener: Arc<dyn PurchasesUpdatedListener>,
    ) -> Result<Arc<dyn BillingClient>> {
        if self.lock_script().fail_client_creation {
            return Err(BridgeError::ClientCreation(
                "sandbox store refused to create a client".to_string(),
            ));
        }

        let client = Arc::new(SandboxBillingClient::new(
            Arc::clone(&self.script),
            enable_pending_purchases,
            purchases_listener,
        ));
        self.lock_clients().push(Arc::clone(&client));
        info!(client_id = %client.id(), "Sandbox billing client handed out");
        Ok(client)
    }
}

impl std::fmt::Debug for SandboxBillingFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxBillingFactory")
            .field("created", &self.created())
            .finish()
    }
}
