pub mod prepare_env;

use tally_ledger_engine::{
    db_types::{EntryStatus, MinorUnits, NewLedgerEntry, ValueKind},
    traits::{EntryQueryFilter, Pagination},
    AccountManagement,
    LedgerDatabase,
    SqliteDatabase,
};

pub async fn new_test_db() -> SqliteDatabase {
    let url = prepare_env::random_db_path();
    prepare_env::prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database")
}

/// Creates an account for `owner_id` and seeds it with `amount` of purchased value.
pub async fn funded_account(db: &SqliteDatabase, owner_id: &str, kind: ValueKind, amount: i64) -> i64 {
    let account_id = db.fetch_or_create_account(owner_id, kind).await.expect("Error creating account");
    if amount > 0 {
        let entry = NewLedgerEntry::new(
            account_id,
            MinorUnits::from(amount),
            tally_ledger_engine::db_types::EntryKind::Purchased,
            EntryStatus::Active,
        )
        .with_source_ref(format!("seed-{owner_id}"));
        db.append(entry).await.expect("Error seeding account");
    }
    account_id
}

/// Asserts that the stored balances equal the fold of the account's entry history. This is the conservation
/// invariant: balances are derived state and must never drift from the entries that produced them.
pub async fn assert_conserved(db: &SqliteDatabase, account_id: i64) {
    let filter = EntryQueryFilter::default().with_account_id(account_id);
    let entries = db.fetch_entries(filter, Pagination::new(0, 1_000)).await.expect("Error fetching entries");
    let zero = MinorUnits::from(0);
    let (mut available, mut on_hold) = (zero, zero);
    for entry in entries {
        if matches!(entry.status, EntryStatus::Pending | EntryStatus::Failed) {
            continue;
        }
        let (da, dh) = entry.kind.balance_effect(entry.amount);
        available += da;
        on_hold += dh;
    }
    let balance = db.fetch_balance(account_id).await.expect("Error fetching balance");
    assert_eq!(balance.available, available, "available balance drifted from entry history");
    assert_eq!(balance.on_hold, on_hold, "on-hold balance drifted from entry history");
}
