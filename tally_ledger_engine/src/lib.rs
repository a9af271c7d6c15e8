//! Tally Ledger Engine
//!
//! The ledger engine is the one part of the Tally marketplace with real invariants: it tracks purchasable balances
//! (connects for freelancers, credits for clients), holds funds in escrow against accepted contracts, releases or
//! refunds them when a contract resolves, and reconciles purchases against the external payment gateway.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@db`]). SQLite is the supported backend. You should never need to access
//!    the database directly; use the public API instead. The exception is the data types used in the database, which
//!    are defined in the `db_types` module and are public.
//! 2. The public API ([`mod@api`]). `LedgerApi` serves balance, history and catalog queries; `PurchaseFlowApi` drives
//!    purchase sessions to resolution exactly once; `EscrowApi` moves value between available and on-hold; and
//!    `ContractFlowApi` is the contract state machine that invokes the escrow coordinator. Backends implement the
//!    traits in [`mod@traits`] to plug into these APIs.
//!
//! The engine also emits events when purchases confirm or contracts settle. A simple actor framework lets the
//! (external) notification collaborator hook into these events without the engine knowing about delivery.
mod db;

pub mod api;
pub mod db_types;
pub mod events;
pub mod traits;

pub use db::sqlite::SqliteDatabase;
pub use traits::{AccountManagement, InsertEntryResult, LedgerBackend, LedgerDatabase, LedgerError};

pub use api::{
    contract_api::ContractFlowApi,
    escrow_api::EscrowApi,
    ledger_api::LedgerApi,
    purchase_api::PurchaseFlowApi,
};
