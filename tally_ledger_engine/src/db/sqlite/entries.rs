use log::trace;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{EntryKind, EntryStatus, LedgerEntry, MinorUnits, NewLedgerEntry},
    traits::{EntryQueryFilter, InsertEntryResult, LedgerError, Pagination},
};

const ENTRY_COLUMNS: &str = "id, account_id, amount, kind, status, source_ref, description, created_at";

/// Inserts a ledger entry, returning the existing entry instead if the `(kind, source_ref)` uniqueness constraint
/// fires. This is the store-level exactly-once guarantee; callers decide whether `AlreadyExists` is a benign replay
/// or a conflict.
pub async fn idempotent_insert(
    entry: NewLedgerEntry,
    conn: &mut SqliteConnection,
) -> Result<InsertEntryResult, LedgerError> {
    match insert_entry(&entry, &mut *conn).await {
        Ok(e) => Ok(InsertEntryResult::Inserted(e)),
        Err(LedgerError::DuplicateSource { .. }) => {
            let source_ref = entry.source_ref.as_deref().unwrap_or_default();
            let existing = entry_by_source(entry.kind, source_ref, conn)
                .await?
                .ok_or(LedgerError::DuplicateSource {
                    kind: entry.kind.to_string(),
                    source_ref: source_ref.to_string(),
                })?;
            Ok(InsertEntryResult::AlreadyExists(existing))
        },
        Err(e) => Err(e),
    }
}

pub async fn insert_entry(entry: &NewLedgerEntry, conn: &mut SqliteConnection) -> Result<LedgerEntry, LedgerError> {
    let result = sqlx::query_as::<_, LedgerEntry>(&format!(
        "INSERT INTO ledger_entries (account_id, amount, kind, status, source_ref, description)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {ENTRY_COLUMNS}"
    ))
    .bind(entry.account_id)
    .bind(entry.amount.value())
    .bind(entry.kind.to_string())
    .bind(entry.status.to_string())
    .bind(entry.source_ref.as_deref())
    .bind(entry.description.as_deref())
    .fetch_one(conn)
    .await;
    match result {
        Ok(e) => Ok(e),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(LedgerError::DuplicateSource {
            kind: entry.kind.to_string(),
            source_ref: entry.source_ref.clone().unwrap_or_default(),
        }),
        Err(e) => Err(e.into()),
    }
}

pub async fn entry_by_source(
    kind: EntryKind,
    source_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<LedgerEntry>, LedgerError> {
    let entry = sqlx::query_as::<_, LedgerEntry>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE kind = $1 AND source_ref = $2"
    ))
    .bind(kind.to_string())
    .bind(source_ref)
    .fetch_optional(conn)
    .await?;
    Ok(entry)
}

/// Promotes a zero-amount `Pending` purchase placeholder to a credited `Active` entry. This is the one permitted
/// in-place mutation in the ledger; the row keeps its `(kind, source_ref)` key, which is what makes the credit
/// exactly-once. Returns `false` if the entry was not `Pending` (an earlier confirmation already promoted it).
pub async fn promote_placeholder(
    entry_id: i64,
    amount: MinorUnits,
    conn: &mut SqliteConnection,
) -> Result<bool, LedgerError> {
    let result = sqlx::query(
        "UPDATE ledger_entries SET amount = $1, status = 'Active' WHERE id = $2 AND status = 'Pending'",
    )
    .bind(amount.value())
    .bind(entry_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Marks a non-terminal entry's status (e.g. an `OnHold` escrow entry becoming `Completed` at settlement, or a
/// placeholder becoming `Failed` when its session expires). `Active` and `Completed` entries are immutable.
pub async fn update_entry_status(
    entry_id: i64,
    status: EntryStatus,
    conn: &mut SqliteConnection,
) -> Result<(), LedgerError> {
    let _ = sqlx::query(
        "UPDATE ledger_entries SET status = $1 WHERE id = $2 AND status IN ('Pending', 'OnHold')",
    )
    .bind(status.to_string())
    .bind(entry_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Fetches entries according to the criteria in `filter`, newest first.
pub async fn fetch_entries(
    filter: EntryQueryFilter,
    pagination: Pagination,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerEntry>, LedgerError> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {ENTRY_COLUMNS} FROM ledger_entries "
    ));
    if !filter.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(account_id) = filter.account_id {
        where_clause.push("account_id = ");
        where_clause.push_bind_unseparated(account_id);
    }
    if let Some(source_ref) = filter.source_ref {
        where_clause.push("source_ref = ");
        where_clause.push_bind_unseparated(source_ref);
    }
    if !filter.kinds.is_empty() {
        let kinds = filter.kinds.iter().map(|k| format!("'{k}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("kind IN ({kinds})"));
    }
    if !filter.statuses.is_empty() {
        let statuses = filter.statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    builder.push_bind(pagination.count);
    builder.push(" OFFSET ");
    builder.push_bind(pagination.offset);
    trace!("📒️ Executing query: {}", builder.sql());
    let entries = builder.build_query_as::<LedgerEntry>().fetch_all(conn).await?;
    Ok(entries)
}
