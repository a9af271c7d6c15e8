use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Contract, ContractId, LedgerEntry, MinorUnits},
    traits::{AccountManagement, LedgerDatabase, LedgerError, Resolution, Settlement},
};

/// `EscrowApi` moves value between an account's available and on-hold buckets as contracts move through their
/// lifecycle, and performs the final release, refund or split when a contract resolves. Every operation is
/// idempotent on the contract id.
pub struct EscrowApi<B> {
    db: B,
}

impl<B> Debug for EscrowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EscrowApi")
    }
}

impl<B> EscrowApi<B>
where B: LedgerDatabase + AccountManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Moves the contract amount from the client's available balance to on-hold. A duplicate call returns the
    /// existing hold entry.
    pub async fn hold(&self, contract_id: &ContractId) -> Result<LedgerEntry, LedgerError> {
        self.db.hold_for_contract(contract_id).await
    }

    /// Pays the full held amount out to the freelancer.
    pub async fn release(&self, contract_id: &ContractId) -> Result<Settlement, LedgerError> {
        let contract = self.contract(contract_id).await?;
        self.db.settle_contract(contract_id, Resolution::release(contract.amount)).await
    }

    /// Returns the full held amount to the client.
    pub async fn refund(&self, contract_id: &ContractId) -> Result<Settlement, LedgerError> {
        let contract = self.contract(contract_id).await?;
        self.db.settle_contract(contract_id, Resolution::refund(contract.amount)).await
    }

    /// Admin-review resolution at an arbitrary ratio. Fails with [`LedgerError::SplitMismatch`] unless the shares
    /// sum to the held amount.
    pub async fn split(
        &self,
        contract_id: &ContractId,
        freelancer_share: MinorUnits,
        client_share: MinorUnits,
    ) -> Result<Settlement, LedgerError> {
        debug!("⚖️ Splitting contract {contract_id} escrow {freelancer_share}/{client_share}");
        self.db.settle_contract(contract_id, Resolution::split(freelancer_share, client_share)).await
    }

    /// Freezes an active contract for admin review. Funds stay on hold until a resolution lands.
    pub async fn freeze(&self, contract_id: &ContractId) -> Result<Contract, LedgerError> {
        self.db.freeze_contract(contract_id).await
    }

    async fn contract(&self, contract_id: &ContractId) -> Result<Contract, LedgerError> {
        self.db
            .fetch_contract(contract_id)
            .await?
            .ok_or_else(|| LedgerError::ContractNotFound(contract_id.clone()))
    }
}
