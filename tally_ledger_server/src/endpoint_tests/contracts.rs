use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use tally_ledger_engine::{
    db_types::{Contract, ContractId, ContractStatus, EntryKind, EntryStatus, LedgerEntry, MinorUnits},
    events::EventProducers,
    traits::AcceptOutcome,
    ContractFlowApi,
    LedgerError,
};

use super::{helpers::post_request, mocks::MockLedger};
use crate::routes::{RegisterContractRoute, TransitionRoute};

#[actix_web::test]
async fn register_contract_for_escrow() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({
        "contract_id": "c-100",
        "client_account_id": 2,
        "freelancer_account_id": 3,
        "amount": 400
    });
    let (status, body) = post_request("/contract", &body, configure_register).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""contract_id":"c-100""#));
    assert!(body.contains(r#""status":"Pending""#));
}

#[actix_web::test]
async fn second_acceptance_activates_and_returns_the_hold() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "event": { "type": "AcceptedByClient" } });
    let (status, body) =
        post_request("/contract/c-100/transition", &body, configure_activation).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""outcome":"Accepted""#));
    assert!(body.contains(r#""status":"Active""#));
    assert!(body.contains(r#""kind":"Held""#));
}

#[actix_web::test]
async fn completing_an_unactivated_contract_conflicts() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "event": { "type": "Complete" } });
    let (status, body) =
        post_request("/contract/c-100/transition", &body, configure_premature_complete).await.expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("cannot be settled"));
}

fn contract(status: ContractStatus) -> Contract {
    Contract {
        contract_id: ContractId("c-100".to_string()),
        client_account_id: 2,
        freelancer_account_id: 3,
        amount: MinorUnits::from(400),
        status,
        created_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    }
}

fn hold_entry() -> LedgerEntry {
    LedgerEntry {
        id: 10,
        account_id: 2,
        amount: MinorUnits::from(-400),
        kind: EntryKind::Held,
        status: EntryStatus::OnHold,
        source_ref: Some("c-100".to_string()),
        description: None,
        created_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    }
}

fn configure_register(cfg: &mut ServiceConfig) {
    let mut ledger = MockLedger::new();
    ledger.expect_upsert_contract().returning(|_| Ok(contract(ContractStatus::Pending)));
    let api = ContractFlowApi::new(ledger, EventProducers::default());
    cfg.service(RegisterContractRoute::<MockLedger>::new()).app_data(web::Data::new(api));
}

fn configure_activation(cfg: &mut ServiceConfig) {
    let mut ledger = MockLedger::new();
    ledger
        .expect_accept_contract()
        .returning(|_, _| Ok(AcceptOutcome { contract: contract(ContractStatus::Active), hold: Some(hold_entry()) }));
    let api = ContractFlowApi::new(ledger, EventProducers::default());
    cfg.service(TransitionRoute::<MockLedger>::new()).app_data(web::Data::new(api));
}

fn configure_premature_complete(cfg: &mut ServiceConfig) {
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_contract().returning(|_| Ok(Some(contract(ContractStatus::ClientAccepted))));
    ledger.expect_settle_contract().returning(|id, _| {
        Err(LedgerError::InvalidTransition(format!("Contract {id} is in ClientAccepted and cannot be settled")))
    });
    let api = ContractFlowApi::new(ledger, EventProducers::default());
    cfg.service(TransitionRoute::<MockLedger>::new()).app_data(web::Data::new(api));
}
