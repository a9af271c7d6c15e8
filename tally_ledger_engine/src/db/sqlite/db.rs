use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;
use sqlx::{SqliteConnection, SqlitePool};

use super::{accounts, contracts, db_url, entries, new_pool, packages, sessions};
use crate::{
    db_types::{
        Account,
        Balance,
        Contract,
        ContractId,
        ContractStatus,
        EntryKind,
        EntryStatus,
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

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL from the environment.
    pub async fn new(max_connections: u32) -> Result<Self, LedgerError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, LedgerError> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Safe to call on every startup.
    pub async fn migrate(&self) -> Result<(), LedgerError> {
        sqlx::migrate!("./src/db/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::DatabaseError(sqlx::Error::Migrate(Box::new(e))))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Appends an entry and applies its balance effect on the given connection. This is the single place where
    /// ledger entries and balances change together; every mutating flow below runs it inside its own transaction.
    async fn apply_entry(
        entry: NewLedgerEntry,
        conn: &mut SqliteConnection,
    ) -> Result<InsertEntryResult, LedgerError> {
        let (d_avail, d_hold) = match entry.status {
            // Placeholders and failures have no balance effect.
            EntryStatus::Pending | EntryStatus::Failed => (MinorUnits::from(0), MinorUnits::from(0)),
            _ => entry.kind.balance_effect(entry.amount),
        };
        accounts::check_funds(entry.account_id, d_avail, d_hold, &mut *conn).await?;
        let result = entries::idempotent_insert(entry, &mut *conn).await?;
        if let InsertEntryResult::Inserted(e) = &result {
            accounts::adjust_balances(e.account_id, d_avail, d_hold, conn).await?;
            trace!("🗃️ Entry #{} ({} {}) applied to account #{}", e.id, e.kind, e.amount, e.account_id);
        }
        Ok(result)
    }

    /// Takes the escrow hold for a contract on an open transaction. Idempotent on the contract id.
    async fn take_hold(contract: &Contract, conn: &mut SqliteConnection) -> Result<LedgerEntry, LedgerError> {
        let entry = NewLedgerEntry::new(
            contract.client_account_id,
            -contract.amount,
            EntryKind::Held,
            EntryStatus::OnHold,
        )
        .with_source_ref(contract.contract_id.as_str())
        .with_description(format!("Escrow hold for contract {}", contract.contract_id));
        let result = Self::apply_entry(entry, conn).await.map_err(|e| match e {
            LedgerError::InsufficientFunds { required, available, .. } => LedgerError::InsufficientEscrowFunds {
                contract_id: contract.contract_id.clone(),
                required,
                available,
            },
            e => e,
        })?;
        Ok(result.into_entry())
    }

    /// Fetches the settlement entries previously written for a contract, for idempotent replays.
    async fn recorded_settlement(
        contract_id: &ContractId,
        conn: &mut SqliteConnection,
    ) -> Result<Settlement, LedgerError> {
        let released = entries::entry_by_source(EntryKind::Released, contract_id.as_str(), &mut *conn).await?;
        let earned = entries::entry_by_source(EntryKind::Earned, contract_id.as_str(), &mut *conn).await?;
        let refunded = entries::entry_by_source(EntryKind::Refunded, contract_id.as_str(), conn).await?;
        Ok(Settlement { contract_id: contract_id.clone(), released, earned, refunded })
    }

    async fn close_session_on(
        external_ref: &str,
        status: SessionStatus,
        conn: &mut SqliteConnection,
    ) -> Result<Option<PurchaseSession>, LedgerError> {
        let session = sessions::session_by_ref(external_ref, &mut *conn)
            .await?
            .ok_or_else(|| LedgerError::SessionNotFound(external_ref.to_string()))?;
        if session.status.is_terminal() {
            debug!("🧾️ Session #{} is already {}. Close request is a no-op.", session.id, session.status);
            return Ok(None);
        }
        let moved = sessions::status_cas(
            session.id,
            &[SessionStatus::Created, SessionStatus::AwaitingConfirmation],
            status,
            &mut *conn,
        )
        .await?;
        if !moved {
            return Ok(None);
        }
        let source_ref = sessions::purchase_source_ref(&session);
        if let Some(placeholder) = entries::entry_by_source(EntryKind::Purchased, &source_ref, &mut *conn).await? {
            entries::update_entry_status(placeholder.id, EntryStatus::Failed, &mut *conn).await?;
        }
        let session = sessions::session_by_id(session.id, conn)
            .await?
            .ok_or_else(|| LedgerError::SessionNotFound(external_ref.to_string()))?;
        Ok(Some(session))
    }
}

impl LedgerDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_or_create_account(&self, owner_id: &str, kind: ValueKind) -> Result<i64, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        accounts::fetch_or_create_account(owner_id, kind, &mut conn).await
    }

    async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let result = Self::apply_entry(entry, &mut tx).await?;
        match result {
            InsertEntryResult::Inserted(e) => {
                tx.commit().await?;
                Ok(e)
            },
            InsertEntryResult::AlreadyExists(e) => Err(LedgerError::DuplicateSource {
                kind: e.kind.to_string(),
                source_ref: e.source_ref.unwrap_or_default(),
            }),
        }
    }

    async fn debit(
        &self,
        account_id: i64,
        amount: MinorUnits,
        source_ref: Option<String>,
        description: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let mut entry = NewLedgerEntry::new(account_id, -amount.abs(), EntryKind::Used, EntryStatus::Active)
            .with_description(description);
        entry.source_ref = source_ref;
        let result = Self::apply_entry(entry, &mut tx).await?;
        tx.commit().await?;
        if !result.was_inserted() {
            debug!("🗃️ Duplicate redemption attempt on account #{account_id}. Returning the original entry.");
        }
        Ok(result.into_entry())
    }

    //--------------------------------------  Purchase sessions  ---------------------------------------------------

    async fn create_purchase_session(
        &self,
        account_id: i64,
        package_id: i64,
    ) -> Result<PurchaseSession, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let account = accounts::account_by_id(account_id, &mut tx)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        let package = packages::package_by_id(package_id, &mut tx)
            .await?
            .ok_or(LedgerError::PackageNotFound(package_id))?;
        if !package.active {
            return Err(LedgerError::PackageNotActive(package_id));
        }
        if package.kind != account.kind {
            return Err(LedgerError::PackageKindMismatch {
                package_id,
                package_kind: package.kind,
                account_kind: account.kind,
            });
        }
        let session = sessions::insert_session(account_id, package_id, &mut tx).await?;
        // Zero-amount placeholder so the attempt shows up in history before payment completes.
        let placeholder = NewLedgerEntry::new(account_id, MinorUnits::from(0), EntryKind::Purchased, EntryStatus::Pending)
            .with_source_ref(sessions::purchase_source_ref(&session))
            .with_description(format!("Purchase of {}", package.name));
        entries::insert_entry(&placeholder, &mut tx).await?;
        tx.commit().await?;
        debug!("🧾️ Session #{} created for account #{account_id}, package '{}'", session.id, package.name);
        Ok(session)
    }

    async fn attach_checkout(&self, session_id: i64, external_ref: &str) -> Result<PurchaseSession, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let moved = sessions::set_external_ref(session_id, external_ref, &mut tx).await?;
        let session = sessions::session_by_id(session_id, &mut tx)
            .await?
            .ok_or_else(|| LedgerError::SessionNotFound(session_id.to_string()))?;
        if !moved && session.external_ref.as_deref() != Some(external_ref) {
            return Err(LedgerError::InvalidTransition(format!(
                "Session #{session_id} is {} and cannot accept a checkout reference",
                session.status
            )));
        }
        tx.commit().await?;
        Ok(session)
    }

    async fn confirm_purchase(
        &self,
        external_ref: &str,
        verified_amount: MinorUnits,
    ) -> Result<InsertEntryResult, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let session = sessions::session_by_ref(external_ref, &mut tx)
            .await?
            .ok_or_else(|| LedgerError::SessionNotFound(external_ref.to_string()))?;
        let source_ref = sessions::purchase_source_ref(&session);
        match session.status {
            SessionStatus::Confirmed => {
                // Benign replay: the verify path and the webhook both landed. Return the winner's entry.
                let entry = entries::entry_by_source(EntryKind::Purchased, &source_ref, &mut tx)
                    .await?
                    .ok_or_else(|| LedgerError::SessionNotFound(external_ref.to_string()))?;
                debug!("🧾️ Session #{} already confirmed. Replay is a no-op.", session.id);
                return Ok(InsertEntryResult::AlreadyExists(entry));
            },
            SessionStatus::Expired | SessionStatus::Failed => {
                return Err(LedgerError::InvalidTransition(format!(
                    "Session #{} is {} and can no longer be confirmed",
                    session.id, session.status
                )));
            },
            SessionStatus::Created | SessionStatus::AwaitingConfirmation => {},
        }
        let package = packages::package_by_id(session.package_id, &mut tx)
            .await?
            .ok_or(LedgerError::PackageNotFound(session.package_id))?;
        // Guards against a tampered client-supplied amount: only the price on record may confirm the session.
        if verified_amount != package.price {
            return Err(LedgerError::AmountMismatch { expected: package.price, actual: verified_amount });
        }
        let won = sessions::status_cas(
            session.id,
            &[SessionStatus::Created, SessionStatus::AwaitingConfirmation],
            SessionStatus::Confirmed,
            &mut tx,
        )
        .await?;
        if !won {
            // A concurrent confirmation got there first; observe its result.
            let entry = entries::entry_by_source(EntryKind::Purchased, &source_ref, &mut tx)
                .await?
                .ok_or_else(|| LedgerError::SessionNotFound(external_ref.to_string()))?;
            return Ok(InsertEntryResult::AlreadyExists(entry));
        }
        let placeholder = entries::entry_by_source(EntryKind::Purchased, &source_ref, &mut tx)
            .await?
            .ok_or_else(|| LedgerError::SessionNotFound(external_ref.to_string()))?;
        entries::promote_placeholder(placeholder.id, package.amount, &mut tx).await?;
        accounts::adjust_balances(session.account_id, package.amount, MinorUnits::from(0), &mut tx).await?;
        let entry = entries::entry_by_source(EntryKind::Purchased, &source_ref, &mut tx)
            .await?
            .ok_or_else(|| LedgerError::SessionNotFound(external_ref.to_string()))?;
        tx.commit().await?;
        info!(
            "🧾️ Session #{} confirmed. {} credited {} to account #{}",
            session.id, package.amount, package.kind, session.account_id
        );
        Ok(InsertEntryResult::Inserted(entry))
    }

    async fn close_purchase_session(
        &self,
        external_ref: &str,
        status: SessionStatus,
    ) -> Result<Option<PurchaseSession>, LedgerError> {
        if !status.is_terminal() || status == SessionStatus::Confirmed {
            return Err(LedgerError::InvalidTransition(format!(
                "close_purchase_session only accepts terminal failure states, not {status}"
            )));
        }
        let mut tx = self.pool.begin().await?;
        let session = Self::close_session_on(external_ref, status, &mut tx).await?;
        tx.commit().await?;
        Ok(session)
    }

    async fn expire_stale_sessions(&self, timeout: Duration) -> Result<Vec<PurchaseSession>, LedgerError> {
        let cutoff = Utc::now() - timeout;
        let mut tx = self.pool.begin().await?;
        let stale = sessions::stale_sessions(cutoff, &mut tx).await?;
        let mut expired = Vec::with_capacity(stale.len());
        for session in stale {
            let external_ref = match &session.external_ref {
                Some(r) => r.clone(),
                // Sessions abandoned before a checkout was attached are closed by internal id lookup.
                None => {
                    sessions::status_cas(session.id, &[SessionStatus::Created], SessionStatus::Expired, &mut tx)
                        .await?;
                    expired.push(session);
                    continue;
                },
            };
            if let Some(s) = Self::close_session_on(&external_ref, SessionStatus::Expired, &mut tx).await? {
                expired.push(s);
            }
        }
        tx.commit().await?;
        Ok(expired)
    }

    //--------------------------------------  Contracts & escrow  --------------------------------------------------

    async fn upsert_contract(&self, contract: NewContract) -> Result<Contract, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        contracts::upsert_contract(&contract, &mut conn).await
    }

    async fn accept_contract(&self, contract_id: &ContractId, party: Party) -> Result<AcceptOutcome, LedgerError> {
        use ContractStatus::*;
        let mut tx = self.pool.begin().await?;
        let contract = contracts::contract_by_id(contract_id, &mut tx)
            .await?
            .ok_or_else(|| LedgerError::ContractNotFound(contract_id.clone()))?;
        let accepted_state = match party {
            Party::Freelancer => FreelancerAccepted,
            Party::Client => ClientAccepted,
        };
        match (contract.status, party) {
            // First acceptance: record it independently, no escrow yet.
            (Pending, _) => {
                contracts::status_cas(contract_id, &[Pending], accepted_state, &mut tx).await?;
                let contract = contracts::contract_by_id(contract_id, &mut tx)
                    .await?
                    .ok_or_else(|| LedgerError::ContractNotFound(contract_id.clone()))?;
                tx.commit().await?;
                Ok(AcceptOutcome { contract, hold: None })
            },
            // Duplicate acceptance by the same party, or acceptance racing an activation that already won.
            (FreelancerAccepted, Party::Freelancer) | (ClientAccepted, Party::Client) | (Active, _) => {
                debug!("🗂️ Contract {contract_id} acceptance by {party:?} is a no-op (status {})", contract.status);
                Ok(AcceptOutcome { contract, hold: None })
            },
            // Second acceptance: hold escrow funds and activate in one unit of work.
            (FreelancerAccepted, Party::Client) | (ClientAccepted, Party::Freelancer) => {
                let won = contracts::status_cas(contract_id, &[contract.status], Active, &mut tx).await?;
                if !won {
                    let contract = contracts::contract_by_id(contract_id, &mut tx)
                        .await?
                        .ok_or_else(|| LedgerError::ContractNotFound(contract_id.clone()))?;
                    return Ok(AcceptOutcome { contract, hold: None });
                }
                let hold = Self::take_hold(&contract, &mut tx).await?;
                let contract = contracts::contract_by_id(contract_id, &mut tx)
                    .await?
                    .ok_or_else(|| LedgerError::ContractNotFound(contract_id.clone()))?;
                tx.commit().await?;
                info!("🗂️ Contract {contract_id} is active. {} held in escrow.", hold.amount.abs());
                Ok(AcceptOutcome { contract, hold: Some(hold) })
            },
            (status, _) => Err(LedgerError::InvalidTransition(format!(
                "Contract {contract_id} is {status} and cannot record an acceptance"
            ))),
        }
    }

    async fn hold_for_contract(&self, contract_id: &ContractId) -> Result<LedgerEntry, LedgerError> {
        let mut tx = self.pool.begin().await?;
        if let Some(existing) = entries::entry_by_source(EntryKind::Held, contract_id.as_str(), &mut tx).await? {
            return Ok(existing);
        }
        let contract = contracts::contract_by_id(contract_id, &mut tx)
            .await?
            .ok_or_else(|| LedgerError::ContractNotFound(contract_id.clone()))?;
        let hold = Self::take_hold(&contract, &mut tx).await?;
        tx.commit().await?;
        Ok(hold)
    }

    async fn settle_contract(
        &self,
        contract_id: &ContractId,
        resolution: Resolution,
    ) -> Result<Settlement, LedgerError> {
        use ContractStatus::*;
        let mut tx = self.pool.begin().await?;
        let contract = contracts::contract_by_id(contract_id, &mut tx)
            .await?
            .ok_or_else(|| LedgerError::ContractNotFound(contract_id.clone()))?;
        // Each share must be a genuine portion of the hold. A negative share still sums correctly but would refund
        // more than this contract holds, draining escrow belonging to other contracts.
        if resolution.total() != contract.amount
            || resolution.freelancer_share.is_negative()
            || resolution.client_share.is_negative()
        {
            return Err(LedgerError::SplitMismatch {
                held: contract.amount,
                freelancer_share: resolution.freelancer_share,
                client_share: resolution.client_share,
            });
        }
        if matches!(contract.status, Completed | Cancelled) {
            debug!("🗂️ Contract {contract_id} is already settled. Returning the recorded settlement.");
            return Self::recorded_settlement(contract_id, &mut tx).await;
        }
        if !matches!(contract.status, Active | UnderAdminReview) {
            return Err(LedgerError::InvalidTransition(format!(
                "Contract {contract_id} is {} and has no escrow to settle",
                contract.status
            )));
        }
        let hold = entries::entry_by_source(EntryKind::Held, contract_id.as_str(), &mut tx)
            .await?
            .ok_or_else(|| {
                LedgerError::InvalidTransition(format!("Contract {contract_id} has no escrow hold on record"))
            })?;
        // A full refund cancels the contract; anything reaching the freelancer completes it.
        let zero = MinorUnits::from(0);
        let target = if resolution.freelancer_share == zero { Cancelled } else { Completed };
        let won = contracts::status_cas(contract_id, &[Active, UnderAdminReview], target, &mut tx).await?;
        if !won {
            return Self::recorded_settlement(contract_id, &mut tx).await;
        }
        let mut settlement =
            Settlement { contract_id: contract_id.clone(), released: None, earned: None, refunded: None };
        if resolution.freelancer_share > zero {
            let released = NewLedgerEntry::new(
                contract.client_account_id,
                -resolution.freelancer_share,
                EntryKind::Released,
                EntryStatus::Completed,
            )
            .with_source_ref(contract_id.as_str())
            .with_description(format!("Escrow released for contract {contract_id}"));
            settlement.released = Some(Self::apply_entry(released, &mut tx).await?.into_entry());
            let earned = NewLedgerEntry::new(
                contract.freelancer_account_id,
                resolution.freelancer_share,
                EntryKind::Earned,
                EntryStatus::Active,
            )
            .with_source_ref(contract_id.as_str())
            .with_description(format!("Earnings for contract {contract_id}"));
            settlement.earned = Some(Self::apply_entry(earned, &mut tx).await?.into_entry());
        }
        if resolution.client_share > zero {
            let refunded = NewLedgerEntry::new(
                contract.client_account_id,
                resolution.client_share,
                EntryKind::Refunded,
                EntryStatus::Completed,
            )
            .with_source_ref(contract_id.as_str())
            .with_description(format!("Escrow refunded for contract {contract_id}"));
            settlement.refunded = Some(Self::apply_entry(refunded, &mut tx).await?.into_entry());
        }
        entries::update_entry_status(hold.id, EntryStatus::Completed, &mut tx).await?;
        tx.commit().await?;
        info!(
            "🗂️ Contract {contract_id} settled as {target}: {} to freelancer, {} back to client",
            resolution.freelancer_share, resolution.client_share
        );
        Ok(settlement)
    }

    async fn freeze_contract(&self, contract_id: &ContractId) -> Result<Contract, LedgerError> {
        use ContractStatus::*;
        let mut tx = self.pool.begin().await?;
        let contract = contracts::contract_by_id(contract_id, &mut tx)
            .await?
            .ok_or_else(|| LedgerError::ContractNotFound(contract_id.clone()))?;
        match contract.status {
            UnderAdminReview => Ok(contract),
            Active => {
                contracts::status_cas(contract_id, &[Active], UnderAdminReview, &mut tx).await?;
                let contract = contracts::contract_by_id(contract_id, &mut tx)
                    .await?
                    .ok_or_else(|| LedgerError::ContractNotFound(contract_id.clone()))?;
                tx.commit().await?;
                info!("🗂️ Contract {contract_id} frozen pending admin review. Funds remain on hold.");
                Ok(contract)
            },
            status => Err(LedgerError::InvalidTransition(format!(
                "Contract {contract_id} is {status} and cannot be frozen"
            ))),
        }
    }

    async fn close(&mut self) -> Result<(), LedgerError> {
        self.pool.close().await;
        Ok(())
    }
}

impl AccountManagement for SqliteDatabase {
    async fn fetch_account(&self, account_id: i64) -> Result<Option<Account>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        accounts::account_by_id(account_id, &mut conn).await
    }

    async fn fetch_account_for_owner(
        &self,
        owner_id: &str,
        kind: ValueKind,
    ) -> Result<Option<Account>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        accounts::account_for_owner(owner_id, kind, &mut conn).await
    }

    async fn fetch_balance(&self, account_id: i64) -> Result<Balance, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let account = accounts::account_by_id(account_id, &mut conn)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        Ok(account.balance())
    }

    async fn fetch_entries(
        &self,
        filter: EntryQueryFilter,
        pagination: Pagination,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        entries::fetch_entries(filter, pagination, &mut conn).await
    }

    async fn fetch_session(&self, external_ref: &str) -> Result<Option<PurchaseSession>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        sessions::session_by_ref(external_ref, &mut conn).await
    }

    async fn fetch_contract(&self, contract_id: &ContractId) -> Result<Option<Contract>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        contracts::contract_by_id(contract_id, &mut conn).await
    }

    async fn active_packages(&self, kind: ValueKind) -> Result<Vec<Package>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        packages::active_packages(kind, &mut conn).await
    }

    async fn fetch_package(&self, package_id: i64) -> Result<Option<Package>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        packages::package_by_id(package_id, &mut conn).await
    }
}
