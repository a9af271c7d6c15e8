use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Contract, ContractId, ContractStatus, NewContract},
    traits::LedgerError,
};

const CONTRACT_COLUMNS: &str =
    "contract_id, client_account_id, freelancer_account_id, amount, status, created_at, updated_at";

pub async fn contract_by_id(
    contract_id: &ContractId,
    conn: &mut SqliteConnection,
) -> Result<Option<Contract>, LedgerError> {
    let contract = sqlx::query_as::<_, Contract>(&format!(
        "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE contract_id = $1"
    ))
    .bind(contract_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(contract)
}

/// Registers a contract from the CRUD collaborator. Re-registration of an existing contract is a no-op that returns
/// the current record; amount and party ids are fixed on first registration.
pub async fn upsert_contract(contract: &NewContract, conn: &mut SqliteConnection) -> Result<Contract, LedgerError> {
    let result = sqlx::query(
        "INSERT INTO contracts (contract_id, client_account_id, freelancer_account_id, amount)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (contract_id) DO NOTHING",
    )
    .bind(contract.contract_id.as_str())
    .bind(contract.client_account_id)
    .bind(contract.freelancer_account_id)
    .bind(contract.amount.value())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() > 0 {
        debug!("🗂️ Contract {} registered for escrow tracking", contract.contract_id);
    }
    contract_by_id(&contract.contract_id, conn)
        .await?
        .ok_or_else(|| LedgerError::ContractNotFound(contract.contract_id.clone()))
}

/// Optimistic check-and-set on the contract status. `false` means a concurrent caller already applied a transition;
/// the caller re-reads the row and treats a duplicate of its own transition as a no-op.
pub async fn status_cas(
    contract_id: &ContractId,
    from: &[ContractStatus],
    to: ContractStatus,
    conn: &mut SqliteConnection,
) -> Result<bool, LedgerError> {
    let from_clause = from.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
    let sql = format!(
        "UPDATE contracts SET status = $1, updated_at = CURRENT_TIMESTAMP
         WHERE contract_id = $2 AND status IN ({from_clause})"
    );
    let result = sqlx::query(&sql).bind(to.to_string()).bind(contract_id.as_str()).execute(conn).await?;
    trace!("🗂️ Contract {contract_id} CAS -> {to}: {}", result.rows_affected() > 0);
    Ok(result.rows_affected() > 0)
}
