use chrono::Duration;
use mockall::mock;
use tally_ledger_engine::{
    db_types::{
        Account,
        Balance,
        Contract,
        ContractId,
        LedgerEntry,
        MinorUnits,
        NewContract,
        NewLedgerEntry,
        Package,
        PurchaseSession,
        SessionStatus,
        ValueKind,
    },
    traits::{
        AcceptOutcome,
        AccountManagement,
        EntryQueryFilter,
        InsertEntryResult,
        LedgerDatabase,
        LedgerError,
        Pagination,
        Party,
        Resolution,
        Settlement,
    },
};

mock! {
    pub Ledger {}
    impl Clone for Ledger {
        fn clone(&self) -> Self;
    }
    impl AccountManagement for Ledger {
        async fn fetch_account(&self, account_id: i64) -> Result<Option<Account>, LedgerError>;
        async fn fetch_account_for_owner(&self, owner_id: &str, kind: ValueKind) -> Result<Option<Account>, LedgerError>;
        async fn fetch_balance(&self, account_id: i64) -> Result<Balance, LedgerError>;
        async fn fetch_entries(&self, filter: EntryQueryFilter, pagination: Pagination) -> Result<Vec<LedgerEntry>, LedgerError>;
        async fn fetch_session(&self, external_ref: &str) -> Result<Option<PurchaseSession>, LedgerError>;
        async fn fetch_contract(&self, contract_id: &ContractId) -> Result<Option<Contract>, LedgerError>;
        async fn active_packages(&self, kind: ValueKind) -> Result<Vec<Package>, LedgerError>;
        async fn fetch_package(&self, package_id: i64) -> Result<Option<Package>, LedgerError>;
    }
    impl LedgerDatabase for Ledger {
        fn url(&self) -> &str;
        async fn fetch_or_create_account(&self, owner_id: &str, kind: ValueKind) -> Result<i64, LedgerError>;
        async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, LedgerError>;
        async fn debit(&self, account_id: i64, amount: MinorUnits, source_ref: Option<String>, description: &str) -> Result<LedgerEntry, LedgerError>;
        async fn create_purchase_session(&self, account_id: i64, package_id: i64) -> Result<PurchaseSession, LedgerError>;
        async fn attach_checkout(&self, session_id: i64, external_ref: &str) -> Result<PurchaseSession, LedgerError>;
        async fn confirm_purchase(&self, external_ref: &str, verified_amount: MinorUnits) -> Result<InsertEntryResult, LedgerError>;
        async fn close_purchase_session(&self, external_ref: &str, status: SessionStatus) -> Result<Option<PurchaseSession>, LedgerError>;
        async fn expire_stale_sessions(&self, timeout: Duration) -> Result<Vec<PurchaseSession>, LedgerError>;
        async fn upsert_contract(&self, contract: NewContract) -> Result<Contract, LedgerError>;
        async fn accept_contract(&self, contract_id: &ContractId, party: Party) -> Result<AcceptOutcome, LedgerError>;
        async fn hold_for_contract(&self, contract_id: &ContractId) -> Result<LedgerEntry, LedgerError>;
        async fn settle_contract(&self, contract_id: &ContractId, resolution: Resolution) -> Result<Settlement, LedgerError>;
        async fn freeze_contract(&self, contract_id: &ContractId) -> Result<Contract, LedgerError>;
    }
}
