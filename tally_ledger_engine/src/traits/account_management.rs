use crate::{
    db_types::{Account, Balance, Contract, ContractId, LedgerEntry, Package, PurchaseSession, ValueKind},
    traits::{EntryQueryFilter, LedgerError, Pagination},
};

/// Read paths over the ledger store: balances, entry history, purchase sessions, contracts and the package catalog.
/// The mutating machinery lives in [`crate::traits::LedgerDatabase`]; this trait never changes state.
#[allow(async_fn_in_trait)]
pub trait AccountManagement: Clone {
    /// Fetches the account with the given internal id, or `None` if it does not exist.
    async fn fetch_account(&self, account_id: i64) -> Result<Option<Account>, LedgerError>;

    /// Fetches the account for the given owner and value kind, or `None` if no transaction has created it yet.
    async fn fetch_account_for_owner(&self, owner_id: &str, kind: ValueKind)
        -> Result<Option<Account>, LedgerError>;

    /// The current balance for an account. Always consistent with the entry history.
    async fn fetch_balance(&self, account_id: i64) -> Result<Balance, LedgerError>;

    /// Pages through ledger entries matching `filter`, ordered by creation time descending. This is the restartable
    /// backing query for history views; the engine itself never reads balances from it.
    async fn fetch_entries(
        &self,
        filter: EntryQueryFilter,
        pagination: Pagination,
    ) -> Result<Vec<LedgerEntry>, LedgerError>;

    async fn fetch_session(&self, external_ref: &str) -> Result<Option<PurchaseSession>, LedgerError>;

    async fn fetch_contract(&self, contract_id: &ContractId) -> Result<Option<Contract>, LedgerError>;

    /// All packages a user of the given kind can currently buy.
    async fn active_packages(&self, kind: ValueKind) -> Result<Vec<Package>, LedgerError>;

    async fn fetch_package(&self, package_id: i64) -> Result<Option<Package>, LedgerError>;
}
