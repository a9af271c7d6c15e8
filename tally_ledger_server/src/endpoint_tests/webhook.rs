use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, App};
use chrono::{TimeZone, Utc};
use tally_common::Secret;
use tally_ledger_engine::{
    db_types::{EntryKind, EntryStatus, LedgerEntry, MinorUnits, PurchaseSession, SessionStatus},
    events::EventProducers,
    traits::InsertEntryResult,
    PurchaseFlowApi,
};

use super::mocks::MockLedger;
use crate::{
    gateway_routes::GatewayWebhookRoute,
    helpers::calculate_hmac,
    middleware::HmacMiddlewareFactory,
    server::GATEWAY_HMAC_HEADER,
};

const SECRET: &str = "test-webhook-secret";

#[actix_web::test]
async fn signed_completed_webhook_credits_the_account() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger.expect_confirm_purchase().returning(|_, _| Ok(InsertEntryResult::Inserted(purchased_entry())));
    ledger.expect_fetch_session().returning(|_| Ok(Some(confirmed_session())));
    let body = r#"{"event_type":"checkout.completed","external_ref":"cafe0123","amount":500}"#;
    let signature = calculate_hmac(SECRET, body.as_bytes());
    let (status, body) = call_webhook(body, Some(&signature), ledger).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""kind":"Purchased""#));
    assert!(body.contains(r#""amount":500"#));
}

#[actix_web::test]
async fn webhook_without_signature_is_rejected() {
    let _ = env_logger::try_init().ok();
    let body = r#"{"event_type":"checkout.completed","external_ref":"cafe0123","amount":500}"#;
    let err = call_webhook(body, None, MockLedger::new()).await.expect_err("Expected error");
    assert_eq!(err, "No HMAC signature found.");
}

#[actix_web::test]
async fn tampered_webhook_body_is_rejected() {
    let _ = env_logger::try_init().ok();
    let body = r#"{"event_type":"checkout.completed","external_ref":"cafe0123","amount":500}"#;
    let signature = calculate_hmac(SECRET, body.as_bytes());
    let tampered = body.replace("500", "999");
    let err = call_webhook(&tampered, Some(&signature), MockLedger::new()).await.expect_err("Expected error");
    assert_eq!(err, "Invalid HMAC signature.");
}

#[actix_web::test]
async fn unknown_event_types_are_acknowledged() {
    let _ = env_logger::try_init().ok();
    let body = r#"{"event_type":"checkout.paused","external_ref":"cafe0123","amount":null}"#;
    let signature = calculate_hmac(SECRET, body.as_bytes());
    let (status, body) = call_webhook(body, Some(&signature), MockLedger::new()).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"success":true,"message":"Event 'checkout.paused' acknowledged"}"#);
}

#[actix_web::test]
async fn expired_webhook_closes_the_session() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger.expect_close_purchase_session().returning(|_, _| Ok(None));
    let body = r#"{"event_type":"checkout.expired","external_ref":"cafe0123","amount":null}"#;
    let signature = calculate_hmac(SECRET, body.as_bytes());
    let (status, body) = call_webhook(body, Some(&signature), ledger).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"success":true,"message":"Checkout [cafe0123] was already closed"}"#);
}

async fn call_webhook(
    body: &str,
    signature: Option<&str>,
    ledger: MockLedger,
) -> Result<(StatusCode, String), String> {
    let api = PurchaseFlowApi::new(ledger, EventProducers::default());
    let hmac = HmacMiddlewareFactory::new(GATEWAY_HMAC_HEADER, Secret::new(SECRET.to_string()), true);
    let app = App::new()
        .app_data(web::Data::new(api))
        .service(web::scope("/gateway").wrap(hmac).service(GatewayWebhookRoute::<MockLedger>::new()));
    let service = test::init_service(app).await;
    let mut req = TestRequest::post()
        .uri("/gateway/webhook")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_string());
    if let Some(sig) = signature {
        req = req.insert_header((GATEWAY_HMAC_HEADER, sig));
    }
    let (_, res) = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}

fn purchased_entry() -> LedgerEntry {
    LedgerEntry {
        id: 21,
        account_id: 5,
        amount: MinorUnits::from(500),
        kind: EntryKind::Purchased,
        status: EntryStatus::Active,
        source_ref: Some("session-9".to_string()),
        description: Some("Purchase of '500 credits'".to_string()),
        created_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    }
}

fn confirmed_session() -> PurchaseSession {
    PurchaseSession {
        id: 9,
        account_id: 5,
        package_id: 4,
        external_ref: Some("cafe0123".to_string()),
        status: SessionStatus::Confirmed,
        created_at: Utc.with_ymd_and_hms(2026, 3, 1, 11, 55, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    }
}
