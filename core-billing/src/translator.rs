//! Result translation and tiered logging.
//!
//! [`translate`] is a pure mapping from an SDK result to a [`BillingOutcome`].
//! [`record`] classifies the outcome for the operation that produced it and
//! logs it at the matching level. Classification never changes what the host
//! receives.

use bridge_traits::billing::{BillingResult, ResponseCode};
use core_runtime::logging::CONTRACT_TARGET;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::types::BillingOutcome;

/// Host-facing operations, used for logs, errors and classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    StartConnection,
    QueryProductDetails,
    QueryPurchases,
    QueryPurchaseHistory,
    Consume,
    Acknowledge,
    LaunchBillingFlow,
    LaunchPriceChangeFlow,
    IsFeatureSupported,
    PurchasesUpdated,
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::StartConnection => "start_connection",
            OperationKind::QueryProductDetails => "query_product_details",
            OperationKind::QueryPurchases => "query_purchases",
            OperationKind::QueryPurchaseHistory => "query_purchase_history",
            OperationKind::Consume => "consume",
            OperationKind::Acknowledge => "acknowledge",
            OperationKind::LaunchBillingFlow => "launch_billing_flow",
            OperationKind::LaunchPriceChangeFlow => "launch_price_change_flow",
            OperationKind::IsFeatureSupported => "is_feature_supported",
            OperationKind::PurchasesUpdated => "purchases_updated",
        }
    }

    fn shows_ui(&self) -> bool {
        matches!(
            self,
            OperationKind::LaunchBillingFlow
                | OperationKind::LaunchPriceChangeFlow
                | OperationKind::PurchasesUpdated
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultTier {
    Success,
    /// A failure the operation can legitimately produce.
    ExpectedFailure,
    /// A code that should never come back from this operation.
    Unexpected,
}

pub fn translate<P>(result: BillingResult, payload: Option<P>) -> BillingOutcome<P> {
    BillingOutcome::from_result(result, payload)
}

pub fn classify(kind: OperationKind, code: ResponseCode) -> ResultTier {
    use OperationKind as Op;
    use ResponseCode as Code;

    match code {
        Code::Ok => ResultTier::Success,
        Code::ServiceTimeout
        | Code::ServiceDisconnected
        | Code::ServiceUnavailable
        | Code::BillingUnavailable
        | Code::DeveloperError
        | Code::Error => ResultTier::ExpectedFailure,
        Code::UserCanceled if kind.shows_ui() => ResultTier::ExpectedFailure,
        Code::ItemUnavailable if kind.shows_ui() || kind == Op::QueryProductDetails => {
            ResultTier::ExpectedFailure
        }
        Code::ItemAlreadyOwned if matches!(kind, Op::LaunchBillingFlow | Op::PurchasesUpdated) => {
            ResultTier::ExpectedFailure
        }
        Code::ItemNotOwned
            if matches!(
                kind,
                Op::Consume | Op::Acknowledge | Op::LaunchBillingFlow | Op::PurchasesUpdated
            ) =>
        {
            ResultTier::ExpectedFailure
        }
        Code::FeatureNotSupported
            if matches!(
                kind,
                Op::IsFeatureSupported | Op::LaunchBillingFlow | Op::LaunchPriceChangeFlow
            ) =>
        {
            ResultTier::ExpectedFailure
        }
        _ => ResultTier::Unexpected,
    }
}

/// Classifies `outcome` and logs it at the level its tier calls for.
pub fn record<P>(kind: OperationKind, outcome: &BillingOutcome<P>) -> ResultTier {
    let tier = classify(kind, outcome.code);
    match tier {
        ResultTier::Success => {
            debug!(operation = %kind, "Billing call succeeded");
        }
        ResultTier::ExpectedFailure if outcome.code == ResponseCode::UserCanceled => {
            info!(operation = %kind, message = %outcome.message, "User canceled");
        }
        ResultTier::ExpectedFailure => {
            warn!(
                operation = %kind,
                code = %outcome.code,
                message = %outcome.message,
                "Billing call failed"
            );
        }
        ResultTier::Unexpected => {
            error!(
                target: CONTRACT_TARGET,
                anomaly = true,
                operation = %kind,
                code = %outcome.code,
                message = %outcome.message,
                "Billing service returned a code this operation never produces"
            );
        }
    }
    tier
}
