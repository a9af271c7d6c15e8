//! The public engine APIs that sit between the HTTP layer (or any other caller) and the ledger store. Each API owns
//! one slice of the domain and delegates atomicity and idempotency to the [`crate::traits::LedgerDatabase`] backend.
pub mod contract_api;
pub mod escrow_api;
pub mod ledger_api;
pub mod purchase_api;

pub use contract_api::{ContractFlowApi, TransitionOutcome};
pub use escrow_api::EscrowApi;
pub use ledger_api::LedgerApi;
pub use purchase_api::PurchaseFlowApi;
