//! Scripted billing client.
//!
//! Listeners are invoked from a dedicated callback thread, never from the
//! calling thread, mirroring how a real store SDK reports back.

use bridge_traits::billing::{
    BillingClient, BillingFlowParams, BillingResult, ConnectionStateListener, ProductDetails,
    ProductKind, Purchase, PurchaseHistoryRecord, PurchasesUpdatedListener, ResponseCode,
    ResponseListener,
};
use bridge_traits::ui::UiContext;
use core_async::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use tracing::{debug, warn};

use crate::script::{SandboxOp, SandboxScript, SetupMode};

type Job = Box<dyn FnOnce() + Send>;

/// Calls the sandbox has received, for assertions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CallCounts {
    pub start_connection: usize,
    pub end_connection: usize,
    pub query_product_details: usize,
    pub query_purchases: usize,
    pub query_purchase_history: usize,
    pub consume: usize,
    pub acknowledge: usize,
    pub launch_billing_flow: usize,
    pub launch_price_change_flow: usize,
    pub is_feature_supported: usize,
}

#[derive(Default)]
struct ClientState {
    ready: bool,
    connection_listener: Option<Arc<dyn ConnectionStateListener>>,
    calls: CallCounts,
    launches: Vec<BillingFlowParams>,
    price_changes: Vec<String>,
}

/// In-memory store SDK client driven by a shared [`SandboxScript`].
pub struct SandboxBillingClient {
    id: String,
    enable_pending_purchases: bool,
    script: Arc<Mutex<SandboxScript>>,
    purchases_listener: Arc<dyn PurchasesUpdatedListener>,
    state: Mutex<ClientState>,
    callbacks: mpsc::UnboundedSender<Job>,
}

impl SandboxBillingClient {
    pub(crate) fn new(
        script: Arc<Mutex<SandboxScript>>,
        enable_pending_purchases: bool,
        purchases_listener: Arc<dyn PurchasesUpdatedListener>,
    ) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        let thread_name = format!("sandbox-billing-{}", &id[..8]);
        let spawned = thread::Builder::new().name(thread_name).spawn(move || {
            while let Some(job) = rx.blocking_recv() {
                job();
            }
        });
        if let Err(e) = spawned {
            warn!(error = %e, "Failed to start sandbox callback thread");
        }

        debug!(client_id = %id, enable_pending_purchases, "Sandbox billing client created");

        Self {
            id,
            enable_pending_purchases,
            script,
            purchases_listener,
            state: Mutex::new(ClientState::default()),
            callbacks: tx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pending_purchases_enabled(&self) -> bool {
        self.enable_pending_purchases
    }

    pub fn calls(&self) -> CallCounts {
        self.state().calls.clone()
    }

    /// Every `launch_billing_flow` request, in order.
    pub fn launches(&self) -> Vec<BillingFlowParams> {
        self.state().launches.clone()
    }

    /// Product ids passed to `launch_price_change_flow`, in order.
    pub fn price_changes(&self) -> Vec<String> {
        self.state().price_changes.clone()
    }

    /// Reports setup for the current connection attempt. Used with [`SetupMode::Manual`].
    pub fn finish_setup(&self, code: ResponseCode) {
        let listener = {
            let mut state = self.state();
            state.ready = code.is_ok();
            state.connection_listener.clone()
        };
        match listener {
            Some(listener) => self.fire_setup(listener, code),
            None => warn!(client_id = %self.id, "finish_setup without a connection listener"),
        }
    }

    /// Drops the service connection and notifies the connection listener.
    pub fn simulate_disconnect(&self) {
        let listener = {
            let mut state = self.state();
            state.ready = false;
            state.connection_listener.clone()
        };
        if let Some(listener) = listener {
            self.post(Box::new(move || listener.on_service_disconnected()));
        }
    }

    /// Pushes a purchases update through the factory-supplied listener.
    pub fn push_purchases_update(&self, result: BillingResult, purchases: Vec<Purchase>) {
        let listener = Arc::clone(&self.purchases_listener);
        self.post(Box::new(move || {
            listener.on_purchases_updated(result, purchases)
        }));
    }

    fn state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn script(&self) -> MutexGuard<'_, SandboxScript> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn post(&self, job: Job) {
        if self.callbacks.send(job).is_err() {
            warn!(client_id = %self.id, "Sandbox callback thread is gone");
        }
    }

    fn fire_setup(&self, listener: Arc<dyn ConnectionStateListener>, code: ResponseCode) {
        let fires = self.script().callback_fires;
        self.post(Box::new(move || {
            for _ in 0..fires {
                listener.on_setup_finished(BillingResult::new(code, ""));
            }
        }));
    }

    fn respond<T>(&self, op: SandboxOp, listener: ResponseListener<T>, payload: T)
    where
        T: Clone + Send + 'static,
    {
        let (result, fires) = {
            let script = self.script();
            (script.response_for(op), script.callback_fires)
        };
        debug!(client_id = %self.id, ?op, code = %result.response_code, fires, "Sandbox response");
        self.post(Box::new(move || {
            for _ in 0..fires {
                listener(result.clone(), payload.clone());
            }
        }));
    }
}

impl BillingClient for SandboxBillingClient {
    fn start_connection(&self, listener: Arc<dyn ConnectionStateListener>) {
        let setup = self.script().setup;
        {
            let mut state = self.state();
            state.calls.start_connection += 1;
            state.connection_listener = Some(Arc::clone(&listener));
        }
        if let SetupMode::Immediate(code) = setup {
            self.state().ready = code.is_ok();
            self.fire_setup(listener, code);
        }
    }

    fn end_connection(&self) {
        let mut state = self.state();
        state.calls.end_connection += 1;
        state.ready = false;
        state.connection_listener = None;
    }

    fn is_ready(&self) -> bool {
        self.state().ready
    }

    fn query_product_details(
        &self,
        kind: ProductKind,
        product_ids: Vec<String>,
        listener: ResponseListener<Vec<ProductDetails>>,
    ) {
        self.state().calls.query_product_details += 1;
        let result = self.script().response_for(SandboxOp::QueryProductDetails);
        let payload = if result.is_ok() {
            self.script().catalog_for(kind, &product_ids)
        } else {
            Vec::new()
        };
        self.respond(SandboxOp::QueryProductDetails, listener, payload);
    }

    fn query_purchases(&self, kind: ProductKind, listener: ResponseListener<Vec<Purchase>>) {
        self.state().calls.query_purchases += 1;
        let payload = self.script().purchases_for(kind);
        self.respond(SandboxOp::QueryPurchases, listener, payload);
    }

    fn query_purchase_history(
        &self,
        kind: ProductKind,
        listener: ResponseListener<Vec<PurchaseHistoryRecord>>,
    ) {
        self.state().calls.query_purchase_history += 1;
        let payload = self.script().history_for(kind);
        self.respond(SandboxOp::QueryPurchaseHistory, listener, payload);
    }

    fn consume(&self, purchase_token: &str, listener: ResponseListener<String>) {
        self.state().calls.consume += 1;
        self.respond(SandboxOp::Consume, listener, purchase_token.to_string());
    }

    fn acknowledge(&self, _purchase_token: &str, listener: ResponseListener<()>) {
        self.state().calls.acknowledge += 1;
        self.respond(SandboxOp::Acknowledge, listener, ());
    }

    fn launch_billing_flow(&self, ui: &dyn UiContext, params: BillingFlowParams) -> BillingResult {
        debug!(client_id = %self.id, ui = %ui.id(), product_id = %params.product.product_id, "Sandbox launch");
        let mut state = self.state();
        state.calls.launch_billing_flow += 1;
        state.launches.push(params);
        drop(state);
        self.script().response_for(SandboxOp::LaunchBillingFlow)
    }

    fn launch_price_change_flow(
        &self,
        ui: &dyn UiContext,
        product: &ProductDetails,
        listener: ResponseListener<()>,
    ) {
        debug!(client_id = %self.id, ui = %ui.id(), product_id = %product.product_id, "Sandbox price change");
        {
            let mut state = self.state();
            state.calls.launch_price_change_flow += 1;
            state.price_changes.push(product.product_id.clone());
        }
        self.respond(SandboxOp::LaunchPriceChangeFlow, listener, ());
    }

    fn is_feature_supported(&self, feature: &str) -> BillingResult {
        self.state().calls.is_feature_supported += 1;
        if self.script().supported_features.contains(feature) {
            BillingResult::ok()
        } else {
            BillingResult::new(ResponseCode::FeatureNotSupported, feature)
        }
    }
}

impl std::fmt::Debug for SandboxBillingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("SandboxBillingClient")
            .field("id", &self.id)
            .field("ready", &state.ready)
            .field("calls", &state.calls)
            .finish()
    }
}
