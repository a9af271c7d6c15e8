//! Unified read-and-spend API over accounts, balances, history and the package catalog.

use std::{collections::VecDeque, fmt::Debug};

use futures_util::{stream, Stream};
use log::trace;

use crate::{
    db_types::{Account, Balance, LedgerEntry, MinorUnits, Package, ValueKind},
    traits::{AccountManagement, EntryQueryFilter, LedgerDatabase, LedgerError, Pagination},
};

pub struct LedgerApi<B> {
    db: B,
}

impl<B: Debug> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi ({:?})", self.db)
    }
}

impl<B> LedgerApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> LedgerApi<B>
where B: AccountManagement
{
    /// Fetches the account with the given internal id, or `None` if it does not exist.
    pub async fn account_by_id(&self, account_id: i64) -> Result<Option<Account>, LedgerError> {
        self.db.fetch_account(account_id).await
    }

    /// Fetches the account an owner holds for the given value kind, if any transaction has created one yet.
    pub async fn account_for_owner(&self, owner_id: &str, kind: ValueKind) -> Result<Option<Account>, LedgerError> {
        self.db.fetch_account_for_owner(owner_id, kind).await
    }

    pub async fn balance(&self, account_id: i64) -> Result<Balance, LedgerError> {
        self.db.fetch_balance(account_id).await
    }

    /// One page of ledger history matching `filter`, newest first.
    pub async fn history(
        &self,
        filter: EntryQueryFilter,
        pagination: Pagination,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.db.fetch_entries(filter, pagination).await
    }

    /// Streams every entry matching `filter`, fetching pages lazily as the consumer pulls. Restartable exports and
    /// audits use this rather than loading an account's full history into memory.
    pub fn entry_stream(&self, filter: EntryQueryFilter) -> impl Stream<Item = Result<LedgerEntry, LedgerError>> {
        let state = (self.db.clone(), filter, Pagination::default(), VecDeque::new(), false);
        stream::try_unfold(state, |(db, filter, mut page, mut buffer, mut exhausted)| async move {
            if buffer.is_empty() && !exhausted {
                trace!("📒️ Fetching history page at offset {}", page.offset);
                let batch = db.fetch_entries(filter.clone(), page).await?;
                exhausted = (batch.len() as i64) < page.count;
                page = page.next();
                buffer = batch.into();
            }
            Ok(buffer.pop_front().map(|entry| (entry, (db, filter, page, buffer, exhausted))))
        })
    }

    /// All packages a user of the given kind can currently buy, cheapest first.
    pub async fn packages(&self, kind: ValueKind) -> Result<Vec<Package>, LedgerError> {
        self.db.active_packages(kind).await
    }

    pub async fn package(&self, package_id: i64) -> Result<Option<Package>, LedgerError> {
        self.db.fetch_package(package_id).await
    }
}

impl<B> LedgerApi<B>
where B: LedgerDatabase
{
    /// Fetches the account id for `(owner_id, kind)`, creating the account lazily on first use.
    pub async fn account_id_for_owner(&self, owner_id: &str, kind: ValueKind) -> Result<i64, LedgerError> {
        self.db.fetch_or_create_account(owner_id, kind).await
    }

    /// Spends value from an account. When `source_ref` names the thing being paid for (e.g. a proposal id), the
    /// spend is exactly-once per source and a retry returns the original entry.
    pub async fn spend(
        &self,
        account_id: i64,
        amount: MinorUnits,
        source_ref: Option<String>,
        description: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        self.db.debit(account_id, amount, source_ref, description).await
    }
}
