//! # Billing Bridge
//!
//! Host-facing coordinator for one purchase session.
//!
//! ## Overview
//!
//! `BillingBridge` accepts host calls, checks them against the connection
//! state and the catalog cache, forwards them to the commerce SDK and hands
//! back exactly one [`BillingOutcome`] per call. SDK callbacks arrive on SDK
//! threads; they only post work back onto the host context, which is where
//! every state change and every completion happens.
//!
//! ## Workflow
//!
//! ### Async SDK operations
//! 1. Check readiness on the host context (fail fast with `ConnectionUnavailable`)
//! 2. Register a pending operation with the completion guard
//! 3. Issue the SDK call with a listener bound to that operation
//! 4. Listener fires (0..n times), posting the result back
//! 5. First result is translated, logged by tier and delivered; the rest are absorbed
//!
//! ### Purchase flow launch
//! 1. Connection ready
//! 2. Item cached (`ItemNotFound` otherwise)
//! 3. Replacement parameters consistent and cached
//! 4. UI context attached and live
//! 5. Synchronous SDK launch; its acknowledgment is returned as-is
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_billing::{BillingBridge, PurchaseFlowRequest};
//! use bridge_traits::billing::ProductKind;
//!
//! let bridge = BillingBridge::new(&config)?;
//! bridge.start_connection(1, true).await?;
//! bridge
//!     .query_product_details(ProductKind::InApp, vec!["gas".into()])
//!     .await?;
//! bridge.attach_ui(activity).await?;
//! let ack = bridge.launch_billing_flow(PurchaseFlowRequest::new("gas")).await?;
//! ```

use bridge_traits::billing::{
    BillingClient, BillingClientFactory, BillingFlowParams, BillingResult,
    ConnectionStateListener, ProductDetails, ProductKind, Purchase, PurchaseHistoryRecord,
    PurchasesUpdatedListener, ReplacementMode, ResponseCode, ResponseListener, SubscriptionUpdate,
};
use bridge_traits::{Clock, UiContext};
use core_runtime::config::BillingConfig;
use core_runtime::events::{
    CatalogEvent, ConnectionEvent, CoreEvent, EventBus, EventStream, PurchaseEvent,
};
use core_runtime::logging::redact_if_sensitive;
use std::sync::Arc;
use tracing::{debug, info, instrument, trace, warn};

use crate::catalog::CatalogCache;
use crate::completion::{Completion, CompletionGuard};
use crate::connection::{
    ConnectionMachine, ConnectionState, DisconnectEffect, SetupResolution, StartDecision,
};
use crate::dispatch::HostContext;
use crate::error::{internal, BillingError, Result};
use crate::translator::{record, translate, OperationKind};
use crate::types::{BillingOutcome, CatalogStatus, OperationId, PurchaseFlowRequest};

type Ctx = HostContext<BridgeState>;

// ============================================================================
// Bridge state (owned by the host context)
// ============================================================================

struct BridgeState {
    machine: ConnectionMachine,
    catalog: CatalogCache,
    guard: CompletionGuard,
    client: Option<Arc<dyn BillingClient>>,
    ui: Option<Arc<dyn UiContext>>,
    factory: Arc<dyn BillingClientFactory>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

enum StartPlan {
    Wait(Completion<BillingOutcome<()>>),
    Done(BillingOutcome<()>),
}

impl BridgeState {
    fn publish(&self, event: CoreEvent) {
        if self.events.emit(event).is_err() {
            trace!("No event subscribers");
        }
    }

    fn ready_client(&self, kind: OperationKind) -> Result<Arc<dyn BillingClient>> {
        self.machine.require_ready(kind)?;
        self.client
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| BillingError::ConnectionUnavailable {
                operation: kind.name().to_string(),
            })
    }

    fn live_ui(&self, kind: OperationKind) -> Result<Arc<dyn UiContext>> {
        self.ui
            .as_ref()
            .filter(|ui| ui.is_live())
            .map(Arc::clone)
            .ok_or_else(|| BillingError::UiUnavailable {
                operation: kind.name().to_string(),
            })
    }

    fn cached(&self, product_id: &str) -> Result<ProductDetails> {
        self.catalog
            .lookup(product_id)
            .cloned()
            .ok_or_else(|| BillingError::ItemNotFound {
                product_id: product_id.to_string(),
            })
    }

    fn client_or_create(
        &mut self,
        ctx: &Ctx,
        enable_pending: bool,
    ) -> Result<Arc<dyn BillingClient>> {
        if let Some(client) = &self.client {
            return Ok(Arc::clone(client));
        }

        let relay = Arc::new(PurchasesRelay { ctx: ctx.clone() });
        let client = self
            .factory
            .create_client(enable_pending, relay)
            .map_err(core_runtime::Error::from)?;
        debug!(enable_pending, "Billing client created");
        self.client = Some(Arc::clone(&client));
        Ok(client)
    }

    fn begin_start(&mut self, ctx: &Ctx, handle: i64, enable_pending: bool) -> Result<StartPlan> {
        match self.machine.begin_start(handle)? {
            StartDecision::AlreadyReady => Ok(StartPlan::Done(BillingOutcome::new(
                ResponseCode::Ok,
                "",
                None,
            ))),
            StartDecision::Join { setup_op } => {
                debug!("Setup already in flight, joining");
                setup_op
                    .and_then(|op| self.guard.join(op))
                    .map(StartPlan::Wait)
                    .ok_or_else(|| internal("connection setup in flight without a waiter"))
            }
            StartDecision::Issue { epoch } => {
                let client = match self.client_or_create(ctx, enable_pending) {
                    Ok(client) => client,
                    Err(e) => {
                        self.machine.setup_aborted(epoch);
                        return Err(e);
                    }
                };

                let completion = self
                    .guard
                    .register::<BillingOutcome<()>>(OperationKind::StartConnection);
                self.machine.attach_setup(completion.id());
                self.publish(CoreEvent::Connection(ConnectionEvent::Connecting { handle }));

                client.start_connection(Arc::new(SetupListener {
                    ctx: ctx.clone(),
                    epoch,
                    op: completion.id(),
                }));
                Ok(StartPlan::Wait(completion))
            }
        }
    }

    fn on_setup_finished(&mut self, epoch: u64, op: OperationId, result: BillingResult) {
        let outcome: BillingOutcome<()> = translate(result, None);
        match self.machine.setup_finished(epoch, outcome.is_ok()) {
            SetupResolution::Resolved { setup_op } => {
                record(OperationKind::StartConnection, &outcome);
                let event = if outcome.is_ok() {
                    ConnectionEvent::Ready
                } else {
                    ConnectionEvent::SetupFailed {
                        code: outcome.code.code(),
                        message: outcome.message.clone(),
                    }
                };
                self.guard.complete(setup_op.unwrap_or(op), outcome);
                self.publish(CoreEvent::Connection(event));
            }
            SetupResolution::Stale | SetupResolution::Duplicate => {
                if self.guard.is_pending(&op) {
                    self.guard.complete(op, outcome);
                } else {
                    self.guard.absorb(op);
                }
            }
        }
    }

    fn on_service_disconnected(&mut self, epoch: u64) {
        if let DisconnectEffect::Notify { handle, setup_op } = self.machine.disconnected(epoch) {
            if let Some(op) = setup_op {
                let outcome: BillingOutcome<()> = BillingOutcome::new(
                    ResponseCode::ServiceDisconnected,
                    "Service disconnected during setup",
                    None,
                );
                record(OperationKind::StartConnection, &outcome);
                self.guard.complete(op, outcome);
            }
            warn!(handle, "Billing service disconnected");
            self.publish(CoreEvent::Connection(ConnectionEvent::Disconnected { handle }));
        }
    }

    fn on_setup_listener_released(&mut self, epoch: u64, op: OperationId) {
        if self.guard.abandon(op) {
            self.machine.setup_aborted(epoch);
        }
    }

    fn end(&mut self) {
        if !self.machine.end() {
            debug!("Connection already ended");
            return;
        }
        if let Some(client) = self.client.take() {
            client.end_connection();
        }
        info!("Billing connection ended");
        self.publish(CoreEvent::Connection(ConnectionEvent::Ended));
    }

    fn apply_catalog(
        &mut self,
        kind: ProductKind,
        requested: &[String],
        result: &BillingResult,
        details: Vec<ProductDetails>,
    ) -> Option<Vec<ProductDetails>> {
        let now = self.clock.now();
        let update =
            self.catalog
                .record_response(kind, requested, result.is_ok(), details.clone(), now);

        let event = if result.is_ok() {
            CatalogEvent::Refreshed {
                kind,
                product_ids: update.written,
            }
        } else {
            CatalogEvent::QueryFailed {
                kind,
                code: result.response_code.code(),
            }
        };
        self.publish(CoreEvent::Catalog(event));
        Some(details)
    }

    fn launch_billing_flow(&mut self, request: PurchaseFlowRequest) -> Result<BillingOutcome<()>> {
        let kind = OperationKind::LaunchBillingFlow;
        let client = self.ready_client(kind)?;
        let product = self.cached(&request.product_id)?;

        match (&request.old_product_id, request.replacement_mode) {
            (None, Some(_)) => return Err(BillingError::MissingReplacementItem),
            (Some(old), _) if self.catalog.lookup(old).is_none() => {
                return Err(BillingError::InvalidReplacementItem {
                    product_id: old.clone(),
                })
            }
            _ => {}
        }

        let ui = self.live_ui(kind)?;

        let subscription_update =
            request
                .old_purchase_token
                .map(|old_purchase_token| SubscriptionUpdate {
                    old_product_id: request.old_product_id.clone(),
                    old_purchase_token,
                    replacement_mode: request
                        .replacement_mode
                        .unwrap_or(ReplacementMode::UnknownReplacementMode),
                });
        let params = BillingFlowParams {
            product,
            obfuscated_account_id: request.obfuscated_account_id,
            obfuscated_profile_id: request.obfuscated_profile_id,
            subscription_update,
        };

        let outcome = translate(client.launch_billing_flow(ui.as_ref(), params), None);
        record(kind, &outcome);
        Ok(outcome)
    }

    fn on_purchases_updated(&mut self, result: BillingResult, purchases: Vec<Purchase>) {
        let outcome = translate(result, Some(purchases));
        record(OperationKind::PurchasesUpdated, &outcome);
        self.publish(CoreEvent::Purchase(PurchaseEvent::PurchasesUpdated {
            code: outcome.code.code(),
            message: outcome.message,
            purchases: outcome.payload.unwrap_or_default(),
        }));
    }
}

// ============================================================================
// SDK listeners
// ============================================================================

/// Binds SDK callbacks to one pending operation. Dropping the last copy
/// abandons the operation if it never completed.
struct ListenerToken {
    ctx: Ctx,
    op: OperationId,
    kind: OperationKind,
}

impl ListenerToken {
    fn deliver<T, P, F>(&self, result: BillingResult, payload: T, settle: F)
    where
        T: Send + 'static,
        P: Clone + Send + 'static,
        F: FnOnce(&mut BridgeState, &BillingResult, T) -> Option<P> + Send + 'static,
    {
        let (op, kind) = (self.op, self.kind);
        let posted = self.ctx.post(move |state| {
            if !state.guard.is_pending(&op) {
                state.guard.absorb(op);
                return;
            }
            let payload = settle(state, &result, payload);
            let outcome = translate(result, payload);
            record(kind, &outcome);
            state.guard.complete(op, outcome);
        });
        if !posted {
            debug!(operation_id = %op, operation = %kind, "Callback after bridge shutdown");
        }
    }
}

impl Drop for ListenerToken {
    fn drop(&mut self) {
        let op = self.op;
        self.ctx.post(move |state| {
            state.guard.abandon(op);
        });
    }
}

fn guarded<T, P, F>(
    ctx: &Ctx,
    completion: &Completion<BillingOutcome<P>>,
    settle: F,
) -> ResponseListener<T>
where
    T: Send + 'static,
    P: Clone + Send + 'static,
    F: Fn(&mut BridgeState, &BillingResult, T) -> Option<P> + Clone + Send + Sync + 'static,
{
    let token = ListenerToken {
        ctx: ctx.clone(),
        op: completion.id(),
        kind: completion.kind(),
    };
    Arc::new(move |result: BillingResult, payload: T| {
        token.deliver(result, payload, settle.clone())
    })
}

struct SetupListener {
    ctx: Ctx,
    epoch: u64,
    op: OperationId,
}

impl ConnectionStateListener for SetupListener {
    fn on_setup_finished(&self, result: BillingResult) {
        let (epoch, op) = (self.epoch, self.op);
        self.ctx
            .post(move |state| state.on_setup_finished(epoch, op, result));
    }

    fn on_service_disconnected(&self) {
        let epoch = self.epoch;
        self.ctx
            .post(move |state| state.on_service_disconnected(epoch));
    }
}

impl Drop for SetupListener {
    fn drop(&mut self) {
        let (epoch, op) = (self.epoch, self.op);
        self.ctx
            .post(move |state| state.on_setup_listener_released(epoch, op));
    }
}

struct PurchasesRelay {
    ctx: Ctx,
}

impl PurchasesUpdatedListener for PurchasesRelay {
    fn on_purchases_updated(&self, result: BillingResult, purchases: Vec<Purchase>) {
        self.ctx
            .post(move |state| state.on_purchases_updated(result, purchases));
    }
}

// ============================================================================
// Host-facing API
// ============================================================================

/// One purchase session between the host and the commerce SDK.
pub struct BillingBridge {
    ctx: Ctx,
    events: EventBus,
}

impl BillingBridge {
    /// Creates a bridge with its own event bus. Must be called on a runtime.
    pub fn new(config: &BillingConfig) -> Result<Self> {
        Self::with_event_bus(config, EventBus::new(config.event_buffer_size))
    }

    pub fn with_event_bus(config: &BillingConfig, events: EventBus) -> Result<Self> {
        let state = BridgeState {
            machine: ConnectionMachine::new(),
            catalog: CatalogCache::new(config.catalog_requery_interval),
            guard: CompletionGuard::new(),
            client: None,
            ui: config.ui_context.clone(),
            factory: Arc::clone(&config.client_factory),
            clock: Arc::clone(&config.clock),
            events: events.clone(),
        };
        let ctx = HostContext::spawn(state)?;
        info!("Billing bridge created");
        Ok(Self { ctx, events })
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    /// Whether the connection is ready and the SDK agrees.
    pub async fn is_ready(&self) -> bool {
        self.ctx
            .call(|state| {
                state.machine.is_ready()
                    && state.client.as_ref().map_or(false, |client| client.is_ready())
            })
            .await
            .unwrap_or(false)
    }

    pub async fn connection_state(&self) -> Result<ConnectionState> {
        self.ctx.call(|state| state.machine.state()).await
    }

    /// Starts the connection, or joins the setup already in flight.
    ///
    /// `handle` comes back in the `Disconnected` event if the SDK later drops
    /// this connection on its own.
    #[instrument(skip(self))]
    pub async fn start_connection(
        &self,
        handle: i64,
        enable_pending_purchases: bool,
    ) -> Result<BillingOutcome<()>> {
        let ctx = self.ctx.clone();
        let plan = self
            .ctx
            .call(move |state| state.begin_start(&ctx, handle, enable_pending_purchases))
            .await??;

        match plan {
            StartPlan::Done(outcome) => Ok(outcome),
            StartPlan::Wait(completion) => completion.wait().await,
        }
    }

    /// Releases the SDK connection. Terminal and idempotent.
    #[instrument(skip(self))]
    pub async fn end_connection(&self) -> Result<()> {
        self.ctx.call(|state| state.end()).await
    }

    #[instrument(skip(self), fields(count = product_ids.len()))]
    pub async fn query_product_details(
        &self,
        kind: ProductKind,
        product_ids: Vec<String>,
    ) -> Result<BillingOutcome<Vec<ProductDetails>>> {
        let ctx = self.ctx.clone();
        let completion = self
            .ctx
            .call(move |state| {
                let op = OperationKind::QueryProductDetails;
                let client = state.ready_client(op)?;
                let completion = state.guard.register::<BillingOutcome<Vec<ProductDetails>>>(op);
                let requested = product_ids.clone();
                let listener = guarded(
                    &ctx,
                    &completion,
                    move |state: &mut BridgeState,
                          result: &BillingResult,
                          details: Vec<ProductDetails>| {
                        state.apply_catalog(kind, &requested, result, details)
                    },
                );
                client.query_product_details(kind, product_ids, listener);
                Ok::<_, BillingError>(completion)
            })
            .await??;
        completion.wait().await
    }

    #[instrument(skip(self))]
    pub async fn query_purchases(
        &self,
        kind: ProductKind,
    ) -> Result<BillingOutcome<Vec<Purchase>>> {
        let ctx = self.ctx.clone();
        let completion = self
            .ctx
            .call(move |state| {
                let op = OperationKind::QueryPurchases;
                let client = state.ready_client(op)?;
                let completion = state.guard.register::<BillingOutcome<Vec<Purchase>>>(op);
                let listener = guarded(
                    &ctx,
                    &completion,
                    |_: &mut BridgeState, _: &BillingResult, purchases: Vec<Purchase>| {
                        Some(purchases)
                    },
                );
                client.query_purchases(kind, listener);
                Ok::<_, BillingError>(completion)
            })
            .await??;
        completion.wait().await
    }

    #[instrument(skip(self))]
    pub async fn query_purchase_history(
        &self,
        kind: ProductKind,
    ) -> Result<BillingOutcome<Vec<PurchaseHistoryRecord>>> {
        let ctx = self.ctx.clone();
        let completion = self
            .ctx
            .call(move |state| {
                let op = OperationKind::QueryPurchaseHistory;
                let client = state.ready_client(op)?;
                let completion = state
                    .guard
                    .register::<BillingOutcome<Vec<PurchaseHistoryRecord>>>(op);
                let listener = guarded(
                    &ctx,
                    &completion,
                    |_: &mut BridgeState, _: &BillingResult, records: Vec<PurchaseHistoryRecord>| {
                        Some(records)
                    },
                );
                client.query_purchase_history(kind, listener);
                Ok::<_, BillingError>(completion)
            })
            .await??;
        completion.wait().await
    }

    /// Consumes a purchase. The payload echoes the consumed token.
    #[instrument(
        skip(self, purchase_token),
        fields(purchase_token = %redact_if_sensitive("purchase_token", purchase_token))
    )]
    pub async fn consume(&self, purchase_token: &str) -> Result<BillingOutcome<String>> {
        let ctx = self.ctx.clone();
        let token = purchase_token.to_string();
        let completion = self
            .ctx
            .call(move |state| {
                let op = OperationKind::Consume;
                let client = state.ready_client(op)?;
                let completion = state.guard.register::<BillingOutcome<String>>(op);
                let listener = guarded(
                    &ctx,
                    &completion,
                    |_: &mut BridgeState, _: &BillingResult, echoed: String| {
                        Some(echoed)
                    },
                );
                client.consume(&token, listener);
                Ok::<_, BillingError>(completion)
            })
            .await??;
        completion.wait().await
    }

    #[instrument(
        skip(self, purchase_token),
        fields(purchase_token = %redact_if_sensitive("purchase_token", purchase_token))
    )]
    pub async fn acknowledge(&self, purchase_token: &str) -> Result<BillingOutcome<()>> {
        let ctx = self.ctx.clone();
        let token = purchase_token.to_string();
        let completion = self
            .ctx
            .call(move |state| {
                let op = OperationKind::Acknowledge;
                let client = state.ready_client(op)?;
                let completion = state.guard.register::<BillingOutcome<()>>(op);
                let listener = guarded(
                    &ctx,
                    &completion,
                    |_: &mut BridgeState, _: &BillingResult, _: ()| {
                        None::<()>
                    },
                );
                client.acknowledge(&token, listener);
                Ok::<_, BillingError>(completion)
            })
            .await??;
        completion.wait().await
    }

    /// Launches the purchase UI.
    ///
    /// Returns the SDK's immediate acknowledgment. The purchase itself is
    /// reported later as a `PurchasesUpdated` event.
    #[instrument(skip(self, request), fields(product_id = %request.product_id))]
    pub async fn launch_billing_flow(
        &self,
        request: PurchaseFlowRequest,
    ) -> Result<BillingOutcome<()>> {
        self.ctx
            .call(move |state| state.launch_billing_flow(request))
            .await?
    }

    #[instrument(skip(self))]
    pub async fn launch_price_change_flow(&self, product_id: &str) -> Result<BillingOutcome<()>> {
        let ctx = self.ctx.clone();
        let product_id = product_id.to_string();
        let completion = self
            .ctx
            .call(move |state| {
                let op = OperationKind::LaunchPriceChangeFlow;
                let ui = state.live_ui(op)?;
                let client = state.ready_client(op)?;
                let product = state.cached(&product_id)?;
                let completion = state.guard.register::<BillingOutcome<()>>(op);
                let listener = guarded(
                    &ctx,
                    &completion,
                    |_: &mut BridgeState, _: &BillingResult, _: ()| {
                        None::<()>
                    },
                );
                client.launch_price_change_flow(ui.as_ref(), &product, listener);
                Ok::<_, BillingError>(completion)
            })
            .await??;
        completion.wait().await
    }

    /// True iff the SDK reports the feature as supported.
    #[instrument(skip(self))]
    pub async fn is_feature_supported(&self, feature: &str) -> Result<bool> {
        let feature = feature.to_string();
        self.ctx
            .call(move |state| {
                let op = OperationKind::IsFeatureSupported;
                let client = state.ready_client(op)?;
                let outcome: BillingOutcome<()> =
                    translate(client.is_feature_supported(&feature), None);
                record(op, &outcome);
                Ok(outcome.is_ok())
            })
            .await?
    }

    /// Sets the foreground UI used by launch flows.
    pub async fn attach_ui(&self, ui: Arc<dyn UiContext>) -> Result<()> {
        debug!(ui = %ui.id(), "UI context attached");
        self.ctx.call(move |state| state.ui = Some(ui)).await
    }

    pub async fn detach_ui(&self) -> Result<()> {
        self.ctx
            .call(|state| {
                if let Some(ui) = state.ui.take() {
                    debug!(ui = %ui.id(), "UI context detached");
                }
            })
            .await
    }

    pub async fn catalog_status(&self) -> Result<CatalogStatus> {
        self.ctx
            .call(|state| {
                let now = state.clock.now();
                state.catalog.status(now)
            })
            .await
    }

    /// Cache-only lookup.
    pub async fn cached_product(&self, product_id: &str) -> Result<Option<ProductDetails>> {
        let product_id = product_id.to_string();
        self.ctx
            .call(move |state| state.catalog.lookup(&product_id).cloned())
            .await
    }

    /// Callbacks absorbed or abandoned since the bridge was created.
    pub async fn anomaly_count(&self) -> Result<u64> {
        self.ctx.call(|state| state.guard.anomalies()).await
    }

    /// Operations still waiting on the SDK.
    pub async fn pending_operations(&self) -> Result<usize> {
        self.ctx.call(|state| state.guard.pending_count()).await
    }

    /// Stops the host context. Pending host calls resolve with an error.
    pub fn shutdown(&self) {
        self.ctx.stop();
    }
}

impl Drop for BillingBridge {
    fn drop(&mut self) {
        self.ctx.stop();
    }
}

impl std::fmt::Debug for BillingBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingBridge")
            .field("running", &self.ctx.is_running())
            .field("events", &self.events)
            .finish()
    }
}
