//! Interface contracts of the ledger engine database backends.
//!
//! ## Accounts and entries
//! An account tracks one value-kind balance (connects or credits) for one marketplace user. Every balance change is
//! an append-only ledger entry; the backend applies the entry and the balance update in the same unit of work, and is
//! the only component permitted to mutate balances.
//!
//! ## Traits
//! * [`LedgerDatabase`] defines the mutating operations: appending entries, driving purchase sessions, escrow
//!   holds/settlements, and contract lifecycle check-and-set updates. Every method is a single atomic unit of work.
//! * [`AccountManagement`] provides the read paths: balances, entry history, sessions, contracts and the package
//!   catalog.
mod account_management;
mod data_objects;
mod ledger_database;

pub use account_management::AccountManagement;
pub use data_objects::{
    AcceptOutcome,
    EntryQueryFilter,
    InsertEntryResult,
    Pagination,
    Party,
    Resolution,
    Settlement,
};
pub use ledger_database::{LedgerDatabase, LedgerError};

/// Convenience bound for components that need both the read and write halves of a backend. Implemented for every
/// type that provides both.
pub trait LedgerBackend: LedgerDatabase + AccountManagement {}

impl<T: LedgerDatabase + AccountManagement> LedgerBackend for T {}
