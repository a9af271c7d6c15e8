use actix_web::{http::StatusCode, web, web::ServiceConfig};
use tally_ledger_engine::{
    db_types::{Balance, MinorUnits, Package, ValueKind},
    LedgerApi,
    LedgerError,
};

use super::{
    helpers::{get_request, post_request},
    mocks::MockLedger,
};
use crate::{
    data_objects::AccountRequest,
    routes::{AccountRoute, BalanceRoute, PackagesRoute},
};

#[actix_web::test]
async fn fetch_balance() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/balance/42", configure_balance).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"available":1500,"on_hold":400}"#);
}

#[actix_web::test]
async fn fetch_balance_for_unknown_account() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/balance/99", configure_missing_account).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"Account not found: 99"}"#);
}

#[actix_web::test]
async fn list_active_packages() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/packages/Connects", configure_packages).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        r#"[{"id":1,"name":"10 connects","kind":"Connects","amount":1000,"price":299,"currency":"USD","active":true}]"#
    );
}

#[actix_web::test]
async fn reject_unknown_package_kind() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/packages/gold", configure_packages).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Could not read request path: Invalid value kind: gold"}"#);
}

#[actix_web::test]
async fn resolve_account_for_owner() {
    let _ = env_logger::try_init().ok();
    let req = AccountRequest { owner_id: "user-1".to_string(), kind: ValueKind::Credits };
    let (status, body) = post_request("/account", &req, configure_account).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"account_id":7}"#);
}

fn configure_balance(cfg: &mut ServiceConfig) {
    let mut ledger = MockLedger::new();
    ledger
        .expect_fetch_balance()
        .returning(|_| Ok(Balance { available: MinorUnits::from(1500), on_hold: MinorUnits::from(400) }));
    let api = LedgerApi::new(ledger);
    cfg.service(BalanceRoute::<MockLedger>::new()).app_data(web::Data::new(api));
}

fn configure_missing_account(cfg: &mut ServiceConfig) {
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_balance().returning(|id| Err(LedgerError::AccountNotFound(id)));
    let api = LedgerApi::new(ledger);
    cfg.service(BalanceRoute::<MockLedger>::new()).app_data(web::Data::new(api));
}

fn configure_packages(cfg: &mut ServiceConfig) {
    let mut ledger = MockLedger::new();
    ledger.expect_active_packages().returning(|_| {
        Ok(vec![Package {
            id: 1,
            name: "10 connects".to_string(),
            kind: ValueKind::Connects,
            amount: MinorUnits::from(1000),
            price: MinorUnits::from(299),
            currency: "USD".to_string(),
            active: true,
        }])
    });
    let api = LedgerApi::new(ledger);
    cfg.service(PackagesRoute::<MockLedger>::new()).app_data(web::Data::new(api));
}

fn configure_account(cfg: &mut ServiceConfig) {
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_or_create_account().returning(|_, _| Ok(7));
    let api = LedgerApi::new(ledger);
    cfg.service(AccountRoute::<MockLedger>::new()).app_data(web::Data::new(api));
}
