use chrono::Duration;
use thiserror::Error;

use crate::{
    db_types::{
        Contract,
        ContractId,
        LedgerEntry,
        MinorUnits,
        NewContract,
        NewLedgerEntry,
        PurchaseSession,
        SessionStatus,
        ValueKind,
    },
    traits::{AcceptOutcome, InsertEntryResult, Party, Resolution, Settlement},
};

/// This trait defines the mutating behaviour backends must provide to support the ledger engine.
///
/// Every method executes as a single atomic unit of work against the durable store: the ledger entry insert and the
/// balance update either both apply or neither does. Idempotency is enforced by the store itself (uniqueness on
/// `(kind, source_ref)` for exactly-once entry kinds, and optimistic check-and-set on session/contract status), never
/// by application-level check-then-act.
#[allow(async_fn_in_trait)]
pub trait LedgerDatabase: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Fetches the account for `(owner_id, kind)`, creating it with zero balances if it does not exist yet.
    async fn fetch_or_create_account(&self, owner_id: &str, kind: ValueKind) -> Result<i64, LedgerError>;

    /// Appends a ledger entry and applies its balance effect in one transaction.
    ///
    /// Fails with [`LedgerError::InsufficientFunds`] if the entry would drive `available` or `on_hold` negative, and
    /// with [`LedgerError::DuplicateSource`] if an entry with the same `(kind, source_ref)` already exists.
    async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, LedgerError>;

    /// Spends value from an account (a `Used` entry). When `source_ref` is given (e.g. a proposal id), the spend is
    /// exactly-once per source: a duplicate redemption attempt returns the original entry instead of debiting twice.
    async fn debit(
        &self,
        account_id: i64,
        amount: MinorUnits,
        source_ref: Option<String>,
        description: &str,
    ) -> Result<LedgerEntry, LedgerError>;

    //--------------------------------------  Purchase sessions  ---------------------------------------------------

    /// Creates a purchase session in `Created` status for an active package, together with its zero-amount `Pending`
    /// placeholder entry so the attempt is visible in history before payment completes.
    async fn create_purchase_session(&self, account_id: i64, package_id: i64)
        -> Result<PurchaseSession, LedgerError>;

    /// Records the gateway checkout reference against the session and moves it to `AwaitingConfirmation`. The
    /// checkout itself is created outside any database transaction.
    async fn attach_checkout(&self, session_id: i64, external_ref: &str) -> Result<PurchaseSession, LedgerError>;

    /// The single choke point for turning a paid session into ledger value.
    ///
    /// Idempotent: if the session is already `Confirmed` the existing `Purchased` entry is returned as
    /// `AlreadyExists` and nothing else happens. Otherwise the session status is moved
    /// `AwaitingConfirmation -> Confirmed` by optimistic check-and-set and the placeholder entry is promoted to
    /// `Active` with the package's value amount, all in one transaction, returning `Inserted`.
    /// Fails with [`LedgerError::AmountMismatch`] if `verified_amount` disagrees with the package price on record.
    async fn confirm_purchase(
        &self,
        external_ref: &str,
        verified_amount: MinorUnits,
    ) -> Result<InsertEntryResult, LedgerError>;

    /// Moves a session to a terminal failure state (`Expired` or `Failed`) and marks its placeholder entry `Failed`.
    /// No balance effect. Returns `None` (no-op) if the session is already terminal, e.g. when an expiry sweep races
    /// a late confirmation that won.
    async fn close_purchase_session(
        &self,
        external_ref: &str,
        status: SessionStatus,
    ) -> Result<Option<PurchaseSession>, LedgerError>;

    /// Expires every session still in `AwaitingConfirmation` or `Created` older than `timeout`. Returns the sessions
    /// that were expired.
    async fn expire_stale_sessions(&self, timeout: Duration) -> Result<Vec<PurchaseSession>, LedgerError>;

    //--------------------------------------  Contracts & escrow  --------------------------------------------------

    /// Registers (or re-registers, idempotently) a contract the CRUD collaborator has created. Amount and party
    /// account ids are fixed at registration.
    async fn upsert_contract(&self, contract: NewContract) -> Result<Contract, LedgerError>;

    /// Records an acceptance by one party. When this is the second acceptance the contract activates: the escrow
    /// hold is taken from the client account and the status moves to `Active` in the same transaction. If the client
    /// has insufficient available funds the whole transition rolls back with
    /// [`LedgerError::InsufficientEscrowFunds`] and the contract stays in its single-accepted state.
    /// A repeated acceptance by the same party is a no-op returning the current state.
    async fn accept_contract(&self, contract_id: &ContractId, party: Party) -> Result<AcceptOutcome, LedgerError>;

    /// Takes the escrow hold for an `Active`-bound contract. Idempotent on the contract id: a duplicate call returns
    /// the existing `Held` entry.
    async fn hold_for_contract(&self, contract_id: &ContractId) -> Result<LedgerEntry, LedgerError>;

    /// Settles the held amount per `resolution` and moves the contract to `Completed` (freelancer gets everything),
    /// `Cancelled` (client gets everything back) or `Completed` for a split, in one transaction. Idempotent: if the
    /// contract is already settled the recorded settlement is returned. Fails with [`LedgerError::SplitMismatch`]
    /// if the resolution does not conserve the held amount.
    async fn settle_contract(&self, contract_id: &ContractId, resolution: Resolution)
        -> Result<Settlement, LedgerError>;

    /// Freezes an `Active` contract pending manual resolution. Funds remain on hold. No-op if already frozen.
    async fn freeze_contract(&self, contract_id: &ContractId) -> Result<Contract, LedgerError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), LedgerError> {
        Ok(())
    }
}

//--------------------------------------      LedgerError     --------------------------------------------------------
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Account not found: {0}")]
    AccountNotFound(i64),
    #[error("Package not found: {0}")]
    PackageNotFound(i64),
    #[error("Package {0} is not active")]
    PackageNotActive(i64),
    #[error("Package #{package_id} is a {package_kind} package but the account holds {account_kind}")]
    PackageKindMismatch { package_id: i64, package_kind: ValueKind, account_kind: ValueKind },
    #[error("Purchase session not found: {0}")]
    SessionNotFound(String),
    #[error("Contract not found: {0}")]
    ContractNotFound(ContractId),
    #[error("Insufficient balance. Top up to proceed. (account #{account_id} needs {required}, has {available})")]
    InsufficientFunds { account_id: i64, required: MinorUnits, available: MinorUnits },
    #[error("Insufficient funds to place contract {contract_id} in escrow. Top up to proceed.")]
    InsufficientEscrowFunds { contract_id: ContractId, required: MinorUnits, available: MinorUnits },
    #[error("An entry for {kind}/{source_ref} already exists")]
    DuplicateSource { kind: String, source_ref: String },
    #[error("Verified amount {actual} does not match the package price {expected} on record")]
    AmountMismatch { expected: MinorUnits, actual: MinorUnits },
    #[error("Split shares {freelancer_share} + {client_share} do not equal the held amount {held}")]
    SplitMismatch { held: MinorUnits, freelancer_share: MinorUnits, client_share: MinorUnits },
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl LedgerError {
    /// True for errors that are the caller's fault rather than the engine's; the server maps these to 4xx statuses.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, LedgerError::DatabaseError(_))
    }
}
