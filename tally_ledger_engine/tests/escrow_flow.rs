//! Escrow coordinator tests: hold, release, refund and admin split, and the invariants that hold across them.
use tally_ledger_engine::{
    db_types::{ContractId, ContractStatus, EntryKind, EntryStatus, MinorUnits, NewContract, ValueKind},
    traits::{EntryQueryFilter, LedgerError, Pagination, Party},
    AccountManagement,
    EscrowApi,
    LedgerDatabase,
    SqliteDatabase,
};

mod support;
use support::{assert_conserved, funded_account, new_test_db};

async fn active_contract(db: &SqliteDatabase, id: &str, client_funds: i64, amount: i64) -> (ContractId, i64, i64) {
    let client = funded_account(db, &format!("{id}-client"), ValueKind::Credits, client_funds).await;
    let freelancer = funded_account(db, &format!("{id}-freelancer"), ValueKind::Credits, 0).await;
    let contract_id = ContractId::from(id.to_string());
    let contract = NewContract {
        contract_id: contract_id.clone(),
        client_account_id: client,
        freelancer_account_id: freelancer,
        amount: MinorUnits::from(amount),
    };
    db.upsert_contract(contract).await.unwrap();
    db.accept_contract(&contract_id, Party::Freelancer).await.unwrap();
    db.accept_contract(&contract_id, Party::Client).await.unwrap();
    (contract_id, client, freelancer)
}

#[tokio::test]
async fn escrow_round_trip_release() {
    let db = new_test_db().await;
    let escrow = EscrowApi::new(db.clone());
    let (contract_id, client, freelancer) = active_contract(&db, "job-100", 1_000, 400).await;

    let balance = db.fetch_balance(client).await.unwrap();
    assert_eq!(balance.available, MinorUnits::from(600));
    assert_eq!(balance.on_hold, MinorUnits::from(400));

    let settlement = escrow.release(&contract_id).await.unwrap();
    let earned = settlement.earned.unwrap();
    assert_eq!(earned.account_id, freelancer);
    assert_eq!(earned.amount, MinorUnits::from(400));
    assert_eq!(earned.kind, EntryKind::Earned);
    assert!(settlement.refunded.is_none());

    // Exactly `amount` moved from client on-hold to freelancer available.
    let balance = db.fetch_balance(client).await.unwrap();
    assert_eq!(balance.available, MinorUnits::from(600));
    assert_eq!(balance.on_hold, MinorUnits::from(0));
    let balance = db.fetch_balance(freelancer).await.unwrap();
    assert_eq!(balance.available, MinorUnits::from(400));

    // The hold entry is settled, not deleted.
    let filter = EntryQueryFilter::default().with_source_ref(contract_id.as_str()).with_kind(EntryKind::Held);
    let hold = db.fetch_entries(filter, Pagination::default()).await.unwrap().remove(0);
    assert_eq!(hold.status, EntryStatus::Completed);
    assert_conserved(&db, client).await;
    assert_conserved(&db, freelancer).await;
}

#[tokio::test]
async fn refund_returns_funds_to_client() {
    let db = new_test_db().await;
    let escrow = EscrowApi::new(db.clone());
    let (contract_id, client, freelancer) = active_contract(&db, "job-101", 1_000, 400).await;

    let settlement = escrow.refund(&contract_id).await.unwrap();
    assert!(settlement.earned.is_none());
    assert_eq!(settlement.refunded.unwrap().amount, MinorUnits::from(400));

    let balance = db.fetch_balance(client).await.unwrap();
    assert_eq!(balance.available, MinorUnits::from(1_000));
    assert_eq!(balance.on_hold, MinorUnits::from(0));
    let balance = db.fetch_balance(freelancer).await.unwrap();
    assert_eq!(balance.available, MinorUnits::from(0));
    let contract = db.fetch_contract(&contract_id).await.unwrap().unwrap();
    assert_eq!(contract.status, ContractStatus::Cancelled);
    assert_conserved(&db, client).await;
}

#[tokio::test]
async fn no_double_hold_for_one_contract() {
    let db = new_test_db().await;
    let escrow = EscrowApi::new(db.clone());
    let (contract_id, client, _) = active_contract(&db, "job-102", 1_000, 400).await;

    let first = escrow.hold(&contract_id).await.unwrap();
    let second = escrow.hold(&contract_id).await.unwrap();
    assert_eq!(first.id, second.id);

    let balance = db.fetch_balance(client).await.unwrap();
    assert_eq!(balance.available, MinorUnits::from(600));
    assert_eq!(balance.on_hold, MinorUnits::from(400));
}

#[tokio::test]
async fn split_must_conserve_the_held_amount() {
    let db = new_test_db().await;
    let escrow = EscrowApi::new(db.clone());
    let (contract_id, client, freelancer) = active_contract(&db, "job-103", 1_000, 400).await;
    escrow.freeze(&contract_id).await.unwrap();

    let err = escrow.split(&contract_id, MinorUnits::from(100), MinorUnits::from(100)).await.unwrap_err();
    assert!(matches!(err, LedgerError::SplitMismatch { .. }));
    // The failed split changed nothing.
    let balance = db.fetch_balance(client).await.unwrap();
    assert_eq!(balance.on_hold, MinorUnits::from(400));
    let contract = db.fetch_contract(&contract_id).await.unwrap().unwrap();
    assert_eq!(contract.status, ContractStatus::UnderAdminReview);

    let settlement = escrow.split(&contract_id, MinorUnits::from(150), MinorUnits::from(250)).await.unwrap();
    assert_eq!(settlement.earned.unwrap().amount, MinorUnits::from(150));
    assert_eq!(settlement.refunded.unwrap().amount, MinorUnits::from(250));
    let balance = db.fetch_balance(client).await.unwrap();
    assert_eq!(balance.available, MinorUnits::from(850));
    assert_eq!(balance.on_hold, MinorUnits::from(0));
    let balance = db.fetch_balance(freelancer).await.unwrap();
    assert_eq!(balance.available, MinorUnits::from(150));
    assert_conserved(&db, client).await;
    assert_conserved(&db, freelancer).await;
}

#[tokio::test]
async fn split_shares_must_be_non_negative() {
    let db = new_test_db().await;
    let escrow = EscrowApi::new(db.clone());
    let (contract_id, client, freelancer) = active_contract(&db, "job-106", 1_000, 400).await;
    // A second active contract holds more of the same client's funds in escrow.
    let other_id = ContractId::from("job-106-second".to_string());
    let other = NewContract {
        contract_id: other_id.clone(),
        client_account_id: client,
        freelancer_account_id: freelancer,
        amount: MinorUnits::from(400),
    };
    db.upsert_contract(other).await.unwrap();
    db.accept_contract(&other_id, Party::Freelancer).await.unwrap();
    db.accept_contract(&other_id, Party::Client).await.unwrap();
    escrow.freeze(&contract_id).await.unwrap();

    // Shares that sum to the held amount but dip negative would refund more than this contract holds.
    let err = escrow.split(&contract_id, MinorUnits::from(-100), MinorUnits::from(500)).await.unwrap_err();
    assert!(matches!(err, LedgerError::SplitMismatch { .. }));
    let err = escrow.split(&contract_id, MinorUnits::from(500), MinorUnits::from(-100)).await.unwrap_err();
    assert!(matches!(err, LedgerError::SplitMismatch { .. }));

    let balance = db.fetch_balance(client).await.unwrap();
    assert_eq!(balance.available, MinorUnits::from(200));
    assert_eq!(balance.on_hold, MinorUnits::from(800));
    let contract = db.fetch_contract(&contract_id).await.unwrap().unwrap();
    assert_eq!(contract.status, ContractStatus::UnderAdminReview);

    // The other contract's escrow is untouched and still releases in full.
    let settlement = escrow.release(&other_id).await.unwrap();
    assert_eq!(settlement.earned.unwrap().amount, MinorUnits::from(400));
    assert_conserved(&db, client).await;
    assert_conserved(&db, freelancer).await;
}

#[tokio::test]
async fn settlement_is_idempotent() {
    let db = new_test_db().await;
    let escrow = EscrowApi::new(db.clone());
    let (contract_id, client, freelancer) = active_contract(&db, "job-104", 1_000, 400).await;

    let first = escrow.release(&contract_id).await.unwrap();
    let replay = escrow.release(&contract_id).await.unwrap();
    assert_eq!(first.earned.unwrap().id, replay.earned.unwrap().id);

    let balance = db.fetch_balance(freelancer).await.unwrap();
    assert_eq!(balance.available, MinorUnits::from(400));
    assert_conserved(&db, client).await;
}
