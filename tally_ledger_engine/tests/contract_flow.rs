//! Contract state machine tests driven through `ContractFlowApi`, including the full marketplace scenario of a
//! client purchasing credits and spending them through an escrowed contract.
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use tally_ledger_engine::{
    db_types::{ContractEvent, ContractId, ContractStatus, MinorUnits, NewContract, ValueKind},
    events::{EventHandlers, EventHooks, EventProducers},
    traits::LedgerError,
    AccountManagement,
    ContractFlowApi,
    PurchaseFlowApi,
    SqliteDatabase,
};

mod support;
use support::{assert_conserved, funded_account, new_test_db};

async fn registered_contract(
    api: &ContractFlowApi<SqliteDatabase>,
    db: &SqliteDatabase,
    id: &str,
    client_funds: i64,
    amount: i64,
) -> (ContractId, i64, i64) {
    let client = funded_account(db, &format!("{id}-client"), ValueKind::Credits, client_funds).await;
    let freelancer = funded_account(db, &format!("{id}-freelancer"), ValueKind::Credits, 0).await;
    let contract_id = ContractId::from(id.to_string());
    api.register_contract(NewContract {
        contract_id: contract_id.clone(),
        client_account_id: client,
        freelancer_account_id: freelancer,
        amount: MinorUnits::from(amount),
    })
    .await
    .unwrap();
    (contract_id, client, freelancer)
}

#[tokio::test]
async fn full_marketplace_scenario() {
    // Client starts with 1000 available. Buys a 500-credit package, activates a 400-credit contract, completes it.
    let db = new_test_db().await;
    let purchases = PurchaseFlowApi::new(db.clone(), EventProducers::default());
    let contracts = ContractFlowApi::new(db.clone(), EventProducers::default());
    let client = funded_account(&db, "scenario-client", ValueKind::Credits, 1_000).await;
    let freelancer = funded_account(&db, "scenario-freelancer", ValueKind::Credits, 0).await;

    let session = purchases.new_session(client, 4).await.unwrap();
    purchases.attach_checkout(session.id, "chk-scenario").await.unwrap();
    purchases.confirm("chk-scenario", MinorUnits::from(500)).await.unwrap();
    let balance = db.fetch_balance(client).await.unwrap();
    assert_eq!(balance.available, MinorUnits::from(1_500));
    assert_eq!(balance.on_hold, MinorUnits::from(0));

    let contract_id = ContractId::from("scenario-job".to_string());
    contracts
        .register_contract(NewContract {
            contract_id: contract_id.clone(),
            client_account_id: client,
            freelancer_account_id: freelancer,
            amount: MinorUnits::from(400),
        })
        .await
        .unwrap();
    contracts.transition(&contract_id, ContractEvent::AcceptedByClient).await.unwrap();
    contracts.transition(&contract_id, ContractEvent::AcceptedByFreelancer).await.unwrap();
    let balance = db.fetch_balance(client).await.unwrap();
    assert_eq!(balance.available, MinorUnits::from(1_100));
    assert_eq!(balance.on_hold, MinorUnits::from(400));

    contracts.transition(&contract_id, ContractEvent::Complete).await.unwrap();
    let balance = db.fetch_balance(client).await.unwrap();
    assert_eq!(balance.available, MinorUnits::from(1_100));
    assert_eq!(balance.on_hold, MinorUnits::from(0));
    let balance = db.fetch_balance(freelancer).await.unwrap();
    assert_eq!(balance.available, MinorUnits::from(400));
    assert_conserved(&db, client).await;
    assert_conserved(&db, freelancer).await;
}

#[tokio::test]
async fn acceptance_order_is_irrelevant_and_duplicates_are_noops() {
    let db = new_test_db().await;
    let api = ContractFlowApi::new(db.clone(), EventProducers::default());
    let (contract_id, client, _) = registered_contract(&api, &db, "job-200", 1_000, 400).await;

    api.transition(&contract_id, ContractEvent::AcceptedByFreelancer).await.unwrap();
    let contract = db.fetch_contract(&contract_id).await.unwrap().unwrap();
    assert_eq!(contract.status, ContractStatus::FreelancerAccepted);
    // Same party accepting twice changes nothing and takes no hold.
    api.transition(&contract_id, ContractEvent::AcceptedByFreelancer).await.unwrap();
    let balance = db.fetch_balance(client).await.unwrap();
    assert_eq!(balance.on_hold, MinorUnits::from(0));

    api.transition(&contract_id, ContractEvent::AcceptedByClient).await.unwrap();
    let contract = db.fetch_contract(&contract_id).await.unwrap().unwrap();
    assert_eq!(contract.status, ContractStatus::Active);
    let balance = db.fetch_balance(client).await.unwrap();
    assert_eq!(balance.on_hold, MinorUnits::from(400));

    // An acceptance landing after activation is also a harmless replay.
    api.transition(&contract_id, ContractEvent::AcceptedByClient).await.unwrap();
    let balance = db.fetch_balance(client).await.unwrap();
    assert_eq!(balance.on_hold, MinorUnits::from(400));
    assert_conserved(&db, client).await;
}

#[tokio::test]
async fn insufficient_funds_leaves_contract_in_single_accepted_state() {
    let db = new_test_db().await;
    let api = ContractFlowApi::new(db.clone(), EventProducers::default());
    let (contract_id, client, _) = registered_contract(&api, &db, "job-201", 100, 400).await;

    api.transition(&contract_id, ContractEvent::AcceptedByFreelancer).await.unwrap();
    let err = api.transition(&contract_id, ContractEvent::AcceptedByClient).await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientEscrowFunds { .. }));

    let contract = db.fetch_contract(&contract_id).await.unwrap().unwrap();
    assert_eq!(contract.status, ContractStatus::FreelancerAccepted);
    let balance = db.fetch_balance(client).await.unwrap();
    assert_eq!(balance.available, MinorUnits::from(100));
    assert_eq!(balance.on_hold, MinorUnits::from(0));

    // Top up and the same acceptance goes through.
    let purchases = PurchaseFlowApi::new(db.clone(), EventProducers::default());
    let session = purchases.new_session(client, 4).await.unwrap();
    purchases.attach_checkout(session.id, "chk-topup").await.unwrap();
    purchases.confirm("chk-topup", MinorUnits::from(500)).await.unwrap();
    api.transition(&contract_id, ContractEvent::AcceptedByClient).await.unwrap();
    let contract = db.fetch_contract(&contract_id).await.unwrap().unwrap();
    assert_eq!(contract.status, ContractStatus::Active);
    assert_conserved(&db, client).await;
}

#[tokio::test]
async fn out_of_order_transitions_are_rejected() {
    let db = new_test_db().await;
    let api = ContractFlowApi::new(db.clone(), EventProducers::default());
    let (contract_id, _, _) = registered_contract(&api, &db, "job-202", 1_000, 400).await;

    // Nothing is on hold yet, so there is nothing to complete, cancel or freeze.
    let err = api.transition(&contract_id, ContractEvent::Complete).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransition(_)));
    let err = api.transition(&contract_id, ContractEvent::OpenAdminReview).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransition(_)));

    let err = api.transition(&ContractId::from("no-such-job".to_string()), ContractEvent::Cancel).await.unwrap_err();
    assert!(matches!(err, LedgerError::ContractNotFound(_)));
}

#[tokio::test]
async fn admin_review_resolves_with_a_split() {
    let db = new_test_db().await;
    let api = ContractFlowApi::new(db.clone(), EventProducers::default());
    let (contract_id, client, freelancer) = registered_contract(&api, &db, "job-203", 1_000, 400).await;
    api.transition(&contract_id, ContractEvent::AcceptedByFreelancer).await.unwrap();
    api.transition(&contract_id, ContractEvent::AcceptedByClient).await.unwrap();

    api.transition(&contract_id, ContractEvent::OpenAdminReview).await.unwrap();
    let contract = db.fetch_contract(&contract_id).await.unwrap().unwrap();
    assert_eq!(contract.status, ContractStatus::UnderAdminReview);
    // Funds stay on hold while frozen.
    let balance = db.fetch_balance(client).await.unwrap();
    assert_eq!(balance.on_hold, MinorUnits::from(400));

    let event = ContractEvent::ResolveSplit {
        freelancer_share: MinorUnits::from(300),
        client_share: MinorUnits::from(100),
    };
    api.transition(&contract_id, event).await.unwrap();
    let balance = db.fetch_balance(client).await.unwrap();
    assert_eq!(balance.available, MinorUnits::from(700));
    assert_eq!(balance.on_hold, MinorUnits::from(0));
    let balance = db.fetch_balance(freelancer).await.unwrap();
    assert_eq!(balance.available, MinorUnits::from(300));
    let contract = db.fetch_contract(&contract_id).await.unwrap().unwrap();
    assert_eq!(contract.status, ContractStatus::Completed);
    assert_conserved(&db, client).await;
    assert_conserved(&db, freelancer).await;
}

#[tokio::test]
async fn activation_and_settlement_events_fire() {
    let db = new_test_db().await;
    let activated = Arc::new(AtomicU64::new(0));
    let settled = Arc::new(AtomicU64::new(0));
    let mut hooks = EventHooks::default();
    let a = activated.clone();
    hooks.on_contract_activated(move |_ev| {
        let a = a.clone();
        Box::pin(async move {
            a.fetch_add(1, Ordering::SeqCst);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let s = settled.clone();
    hooks.on_contract_settled(move |_ev| {
        let s = s.clone();
        Box::pin(async move {
            s.fetch_add(1, Ordering::SeqCst);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let api = ContractFlowApi::new(db.clone(), producers);
    let (contract_id, _, _) = registered_contract(&api, &db, "job-204", 1_000, 400).await;
    api.transition(&contract_id, ContractEvent::AcceptedByClient).await.unwrap();
    api.transition(&contract_id, ContractEvent::AcceptedByFreelancer).await.unwrap();
    api.transition(&contract_id, ContractEvent::Complete).await.unwrap();
    drop(api);

    tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    assert_eq!(activated.load(Ordering::SeqCst), 1);
    assert_eq!(settled.load(Ordering::SeqCst), 1);
}
