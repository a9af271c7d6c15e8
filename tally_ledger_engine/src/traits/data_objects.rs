use serde::{Deserialize, Serialize};

use crate::db_types::{ContractId, EntryKind, EntryStatus, LedgerEntry, MinorUnits};

/// Result of an idempotent insert. `AlreadyExists` carries the entry the earlier winner created, so that a losing
/// racer observes the winner's result instead of an ambiguous error.
#[derive(Debug, Clone)]
pub enum InsertEntryResult {
    Inserted(LedgerEntry),
    AlreadyExists(LedgerEntry),
}

impl InsertEntryResult {
    pub fn into_entry(self) -> LedgerEntry {
        match self {
            InsertEntryResult::Inserted(e) | InsertEntryResult::AlreadyExists(e) => e,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, InsertEntryResult::Inserted(_))
    }
}

/// The party performing a contract acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Party {
    Freelancer,
    Client,
}

/// How the held amount of a contract is divided when it leaves escrow. `release` and `refund` are the two trivial
/// splits; admin review can settle at any ratio that conserves the held amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub freelancer_share: MinorUnits,
    pub client_share: MinorUnits,
}

impl Resolution {
    pub fn release(amount: MinorUnits) -> Self {
        Self { freelancer_share: amount, client_share: MinorUnits::from(0) }
    }

    pub fn refund(amount: MinorUnits) -> Self {
        Self { freelancer_share: MinorUnits::from(0), client_share: amount }
    }

    pub fn split(freelancer_share: MinorUnits, client_share: MinorUnits) -> Self {
        Self { freelancer_share, client_share }
    }

    pub fn total(&self) -> MinorUnits {
        self.freelancer_share + self.client_share
    }
}

/// The ledger entries produced by settling a contract's escrow. Any side with a zero share has no entry.
#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    pub contract_id: ContractId,
    /// `Released` entry draining the client's on-hold balance towards the freelancer.
    pub released: Option<LedgerEntry>,
    /// `Earned` entry crediting the freelancer.
    pub earned: Option<LedgerEntry>,
    /// `Refunded` entry returning the client share to their available balance.
    pub refunded: Option<LedgerEntry>,
}

/// Result of recording a contract acceptance. `hold` is present iff this acceptance was the second one and the
/// contract activated (escrow funds were moved on hold).
#[derive(Debug, Clone)]
pub struct AcceptOutcome {
    pub contract: crate::db_types::Contract,
    pub hold: Option<LedgerEntry>,
}

//--------------------------------------      Pagination      --------------------------------------------------------
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub offset: i64,
    pub count: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { offset: 0, count: 50 }
    }
}

impl Pagination {
    pub fn new(offset: i64, count: i64) -> Self {
        Self { offset, count }
    }

    pub fn next(&self) -> Self {
        Self { offset: self.offset + self.count, count: self.count }
    }
}

//--------------------------------------   EntryQueryFilter   --------------------------------------------------------
/// Criteria for history queries. Empty filter matches everything; results are ordered by creation time descending.
#[derive(Debug, Clone, Default)]
pub struct EntryQueryFilter {
    pub account_id: Option<i64>,
    pub source_ref: Option<String>,
    pub kinds: Vec<EntryKind>,
    pub statuses: Vec<EntryStatus>,
}

impl EntryQueryFilter {
    pub fn with_account_id(mut self, account_id: i64) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn with_source_ref<S: Into<String>>(mut self, source_ref: S) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }

    pub fn with_kind(mut self, kind: EntryKind) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn with_status(mut self, status: EntryStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.account_id.is_none() && self.source_ref.is_none() && self.kinds.is_empty() && self.statuses.is_empty()
    }
}
