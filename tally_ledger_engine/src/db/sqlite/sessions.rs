use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{PurchaseSession, SessionStatus},
    traits::LedgerError,
};

const SESSION_COLUMNS: &str = "id, account_id, package_id, external_ref, status, created_at, updated_at";

pub async fn insert_session(
    account_id: i64,
    package_id: i64,
    conn: &mut SqliteConnection,
) -> Result<PurchaseSession, LedgerError> {
    let session = sqlx::query_as::<_, PurchaseSession>(&format!(
        "INSERT INTO purchase_sessions (account_id, package_id) VALUES ($1, $2)
         RETURNING {SESSION_COLUMNS}"
    ))
    .bind(account_id)
    .bind(package_id)
    .fetch_one(conn)
    .await?;
    Ok(session)
}

pub async fn session_by_id(session_id: i64, conn: &mut SqliteConnection) -> Result<Option<PurchaseSession>, LedgerError> {
    let session = sqlx::query_as::<_, PurchaseSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM purchase_sessions WHERE id = $1"
    ))
    .bind(session_id)
    .fetch_optional(conn)
    .await?;
    Ok(session)
}

pub async fn session_by_ref(
    external_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PurchaseSession>, LedgerError> {
    let session = sqlx::query_as::<_, PurchaseSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM purchase_sessions WHERE external_ref = $1"
    ))
    .bind(external_ref)
    .fetch_optional(conn)
    .await?;
    Ok(session)
}

pub async fn set_external_ref(
    session_id: i64,
    external_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, LedgerError> {
    let result = sqlx::query(
        "UPDATE purchase_sessions
         SET external_ref = $1, status = 'AwaitingConfirmation', updated_at = CURRENT_TIMESTAMP
         WHERE id = $2 AND status = 'Created'",
    )
    .bind(external_ref)
    .bind(session_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Optimistic check-and-set on the session status. Returns `false` when the session was not in any of the expected
/// `from` states, i.e. a concurrent caller already moved it; the caller then re-reads and observes the winner.
pub async fn status_cas(
    session_id: i64,
    from: &[SessionStatus],
    to: SessionStatus,
    conn: &mut SqliteConnection,
) -> Result<bool, LedgerError> {
    let from_clause = from.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
    let sql = format!(
        "UPDATE purchase_sessions SET status = $1, updated_at = CURRENT_TIMESTAMP
         WHERE id = $2 AND status IN ({from_clause})"
    );
    let result = sqlx::query(&sql).bind(to.to_string()).bind(session_id).execute(conn).await?;
    trace!("🧾️ Session #{session_id} CAS -> {to}: {}", result.rows_affected() > 0);
    Ok(result.rows_affected() > 0)
}

/// Sessions that have sat in a non-terminal state since before `cutoff` and are eligible for expiry.
pub async fn stale_sessions(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<PurchaseSession>, LedgerError> {
    let cutoff = cutoff.format("%Y-%m-%d %H:%M:%S").to_string();
    let sessions = sqlx::query_as::<_, PurchaseSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM purchase_sessions
         WHERE status IN ('Created', 'AwaitingConfirmation') AND updated_at < $1"
    ))
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    Ok(sessions)
}

/// The `source_ref` a session's purchase entry is keyed on. Keyed on the internal id so the placeholder can be
/// written before the gateway has assigned an external reference.
pub fn purchase_source_ref(session: &PurchaseSession) -> String {
    format!("session-{}", session.id)
}
