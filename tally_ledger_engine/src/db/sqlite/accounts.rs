use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Account, MinorUnits, ValueKind},
    traits::LedgerError,
};

const ACCOUNT_COLUMNS: &str = "id, owner_id, kind, available, on_hold, created_at, updated_at";

pub async fn account_by_id(account_id: i64, conn: &mut SqliteConnection) -> Result<Option<Account>, LedgerError> {
    let account = sqlx::query_as::<_, Account>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
    ))
    .bind(account_id)
    .fetch_optional(conn)
    .await?;
    Ok(account)
}

pub async fn account_for_owner(
    owner_id: &str,
    kind: ValueKind,
    conn: &mut SqliteConnection,
) -> Result<Option<Account>, LedgerError> {
    let account = sqlx::query_as::<_, Account>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE owner_id = $1 AND kind = $2"
    ))
    .bind(owner_id)
    .bind(kind.to_string())
    .fetch_optional(conn)
    .await?;
    Ok(account)
}

/// Fetches the account id for `(owner_id, kind)`, creating the account with zero balances if it does not exist.
/// Accounts are created lazily on first use and never deleted.
pub async fn fetch_or_create_account(
    owner_id: &str,
    kind: ValueKind,
    conn: &mut SqliteConnection,
) -> Result<i64, LedgerError> {
    trace!("🧑️ Fetching or creating {kind} account for owner {owner_id}");
    if let Some(account) = account_for_owner(owner_id, kind, &mut *conn).await? {
        return Ok(account.id);
    }
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO accounts (owner_id, kind) VALUES ($1, $2)
         ON CONFLICT (owner_id, kind) DO UPDATE SET updated_at = updated_at
         RETURNING id",
    )
    .bind(owner_id)
    .bind(kind.to_string())
    .fetch_one(conn)
    .await?;
    debug!("📝️ Created new {kind} account #{} for owner {owner_id}", row.0);
    Ok(row.0)
}

/// Applies balance deltas to an account. Callers must have verified inside the same transaction that neither balance
/// goes negative; the schema CHECK constraints are only a backstop.
pub async fn adjust_balances(
    account_id: i64,
    available_delta: MinorUnits,
    on_hold_delta: MinorUnits,
    conn: &mut SqliteConnection,
) -> Result<(), LedgerError> {
    let _ = sqlx::query(
        "UPDATE accounts SET
         available = available + $1,
         on_hold = on_hold + $2,
         updated_at = CURRENT_TIMESTAMP
         WHERE id = $3",
    )
    .bind(available_delta.value())
    .bind(on_hold_delta.value())
    .bind(account_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Verifies that applying `(available_delta, on_hold_delta)` keeps both balances non-negative, returning the account.
pub async fn check_funds(
    account_id: i64,
    available_delta: MinorUnits,
    on_hold_delta: MinorUnits,
    conn: &mut SqliteConnection,
) -> Result<Account, LedgerError> {
    let account =
        account_by_id(account_id, conn).await?.ok_or(LedgerError::AccountNotFound(account_id))?;
    let zero = MinorUnits::from(0);
    if account.available + available_delta < zero {
        return Err(LedgerError::InsufficientFunds {
            account_id,
            required: available_delta.abs(),
            available: account.available,
        });
    }
    if account.on_hold + on_hold_delta < zero {
        return Err(LedgerError::InsufficientFunds {
            account_id,
            required: on_hold_delta.abs(),
            available: account.on_hold,
        });
    }
    Ok(account)
}
