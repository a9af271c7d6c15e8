use serde::Serialize;

use crate::{
    db_types::{Contract, LedgerEntry, PurchaseSession},
    traits::Settlement,
};

/// Fired exactly once per purchase session, when the gateway's payment confirmation is folded into the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseConfirmedEvent {
    pub session: PurchaseSession,
    pub entry: LedgerEntry,
}

impl PurchaseConfirmedEvent {
    pub fn new(session: PurchaseSession, entry: LedgerEntry) -> Self {
        Self { session, entry }
    }
}

/// Fired when a purchase session reaches a terminal failure state (expired or failed at the gateway).
#[derive(Debug, Clone, Serialize)]
pub struct SessionClosedEvent {
    pub session: PurchaseSession,
}

impl SessionClosedEvent {
    pub fn new(session: PurchaseSession) -> Self {
        Self { session }
    }
}

/// Fired when the second acceptance lands and the escrow hold has been taken.
#[derive(Debug, Clone, Serialize)]
pub struct ContractActivatedEvent {
    pub contract: Contract,
    pub hold: LedgerEntry,
}

impl ContractActivatedEvent {
    pub fn new(contract: Contract, hold: LedgerEntry) -> Self {
        Self { contract, hold }
    }
}

/// Fired when held funds are paid out, refunded or split and the contract reaches a terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct ContractSettledEvent {
    pub contract: Contract,
    pub settlement: Settlement,
}

impl ContractSettledEvent {
    pub fn new(contract: Contract, settlement: Settlement) -> Self {
        Self { contract, settlement }
    }
}
