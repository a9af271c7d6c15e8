use serde::{Deserialize, Serialize};
use tally_ledger_engine::db_types::{ContractEvent, ContractId, MinorUnits, ValueKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Into<String>>(message: S) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn failure<S: Into<String>>(message: S) -> Self {
        Self { success: false, message: message.into() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseRequest {
    pub account_id: i64,
    pub package_id: i64,
}

/// Returned from `POST /api/purchase`. The UI redirects the user to `redirect_url` and keeps `external_ref` to call
/// the verify endpoint with when the user returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub session_id: i64,
    pub external_ref: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyRequest {
    pub external_ref: String,
    /// The amount the gateway reports as paid, fetched by the caller from the gateway's status endpoint.
    pub amount: MinorUnits,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterContractRequest {
    pub contract_id: ContractId,
    pub client_account_id: i64,
    pub freelancer_account_id: i64,
    pub amount: MinorUnits,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    pub event: ContractEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRequest {
    pub owner_id: String,
    pub kind: ValueKind,
}

/// The body the payment gateway posts to `/gateway/webhook`. Authenticity is established by the HMAC middleware
/// before this is ever deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// One of `checkout.completed`, `checkout.failed`, `checkout.expired`. Unknown types are acknowledged and
    /// ignored so the gateway does not retry forever when it adds new event types.
    pub event_type: String,
    pub external_ref: String,
    /// Present on `checkout.completed`; the amount actually charged.
    pub amount: Option<MinorUnits>,
}
