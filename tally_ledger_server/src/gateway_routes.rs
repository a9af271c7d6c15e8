//! Handlers for the gateway-facing webhook endpoint.
//!
//! These routes are wrapped by the HMAC middleware, so by the time a handler runs the payload is known to come from
//! the payment gateway. Deliveries are at-least-once and unordered: every outcome here must be idempotent, and
//! recognized-but-benign results are answered with a 200-range status so the gateway stops retrying.
use actix_web::{web, HttpResponse};
use log::*;
use tally_ledger_engine::{traits::LedgerBackend, LedgerError, PurchaseFlowApi};

use crate::{
    data_objects::{JsonResponse, WebhookPayload},
    errors::ServerError,
    route,
};

route!(gateway_webhook => Post "/webhook" impl LedgerBackend);
pub async fn gateway_webhook<B: LedgerBackend>(
    body: web::Json<WebhookPayload>,
    api: web::Data<PurchaseFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let payload = body.into_inner();
    let external_ref = payload.external_ref.as_str();
    debug!("🛃️ Gateway webhook '{}' received for [{external_ref}]", payload.event_type);
    match payload.event_type.as_str() {
        "checkout.completed" => {
            let amount = payload
                .amount
                .ok_or_else(|| ServerError::InvalidRequestBody("checkout.completed requires an amount".into()))?;
            match api.confirm(external_ref, amount).await {
                Ok(entry) => {
                    info!("🛃️ Webhook confirmed checkout [{external_ref}]");
                    Ok(HttpResponse::Ok().json(entry))
                },
                // The session already reached a terminal failure state (e.g. the expiry sweep won the race). A
                // retry can never succeed, so acknowledge the delivery rather than have the gateway hammer us.
                Err(LedgerError::InvalidTransition(msg)) => {
                    warn!("🛃️ Webhook for [{external_ref}] arrived too late: {msg}");
                    Ok(HttpResponse::Ok().json(JsonResponse::failure(msg)))
                },
                Err(e) => Err(e.into()),
            }
        },
        "checkout.failed" => {
            let session = api.fail(external_ref).await?;
            let message = match session {
                Some(_) => format!("Checkout [{external_ref}] marked as failed"),
                None => format!("Checkout [{external_ref}] was already closed"),
            };
            Ok(HttpResponse::Ok().json(JsonResponse::success(message)))
        },
        "checkout.expired" => {
            let session = api.expire(external_ref).await?;
            let message = match session {
                Some(_) => format!("Checkout [{external_ref}] expired"),
                None => format!("Checkout [{external_ref}] was already closed"),
            };
            Ok(HttpResponse::Ok().json(JsonResponse::success(message)))
        },
        other => {
            // The gateway adds event types over time; acknowledging unknown ones keeps deliveries flowing.
            info!("🛃️ Ignoring unhandled gateway event type '{other}'");
            Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Event '{other}' acknowledged"))))
        },
    }
}
