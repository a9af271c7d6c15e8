use std::fmt::Debug;

use log::*;
use serde::Serialize;

use crate::{
    db_types::{Contract, ContractEvent, ContractId, NewContract},
    events::{ContractActivatedEvent, ContractSettledEvent, EventProducers},
    traits::{AccountManagement, LedgerDatabase, LedgerError, Party, Resolution, Settlement},
};

/// What a lifecycle transition did. `Accepted` with `escrow_hold: None` is a first (or duplicate) acceptance;
/// activation always carries the hold entry.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome")]
pub enum TransitionOutcome {
    Accepted { contract: Contract, escrow_hold: Option<crate::db_types::LedgerEntry> },
    Settled { contract: Contract, settlement: Settlement },
    Frozen { contract: Contract },
}

/// `ContractFlowApi` is the entry point for the contract CRUD collaborator. It translates lifecycle events into
/// escrow operations against the ledger store and publishes activation and settlement events to subscribers.
pub struct ContractFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for ContractFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContractFlowApi")
    }
}

impl<B> ContractFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> ContractFlowApi<B>
where B: LedgerDatabase + AccountManagement
{
    /// Registers a contract for escrow tracking. Idempotent; amount and party accounts are fixed on first
    /// registration.
    pub async fn register_contract(&self, contract: NewContract) -> Result<Contract, LedgerError> {
        self.db.upsert_contract(contract).await
    }

    pub async fn fetch_contract(&self, contract_id: &ContractId) -> Result<Option<Contract>, LedgerError> {
        self.db.fetch_contract(contract_id).await
    }

    /// Applies a lifecycle event to the contract. Transitions are check-and-set against the current status: a
    /// duplicate of an already-applied transition is a no-op, anything else out of order fails with
    /// [`LedgerError::InvalidTransition`].
    pub async fn transition(
        &self,
        contract_id: &ContractId,
        event: ContractEvent,
    ) -> Result<TransitionOutcome, LedgerError> {
        debug!("🗂️ Applying {event} to contract {contract_id}");
        match event {
            ContractEvent::AcceptedByFreelancer => self.accept(contract_id, Party::Freelancer).await,
            ContractEvent::AcceptedByClient => self.accept(contract_id, Party::Client).await,
            ContractEvent::Complete => {
                let contract = self.contract(contract_id).await?;
                self.settle(contract_id, Resolution::release(contract.amount)).await
            },
            ContractEvent::Cancel => {
                let contract = self.contract(contract_id).await?;
                self.settle(contract_id, Resolution::refund(contract.amount)).await
            },
            ContractEvent::OpenAdminReview => {
                let contract = self.db.freeze_contract(contract_id).await?;
                Ok(TransitionOutcome::Frozen { contract })
            },
            ContractEvent::ResolveSplit { freelancer_share, client_share } => {
                self.settle(contract_id, Resolution::split(freelancer_share, client_share)).await
            },
        }
    }

    async fn accept(&self, contract_id: &ContractId, party: Party) -> Result<TransitionOutcome, LedgerError> {
        let outcome = self.db.accept_contract(contract_id, party).await?;
        if let Some(hold) = &outcome.hold {
            self.call_contract_activated_hook(outcome.contract.clone(), hold.clone()).await;
        }
        Ok(TransitionOutcome::Accepted { contract: outcome.contract, escrow_hold: outcome.hold })
    }

    async fn settle(
        &self,
        contract_id: &ContractId,
        resolution: Resolution,
    ) -> Result<TransitionOutcome, LedgerError> {
        let settlement = self.db.settle_contract(contract_id, resolution).await?;
        let contract = self.contract(contract_id).await?;
        self.call_contract_settled_hook(contract.clone(), settlement.clone()).await;
        Ok(TransitionOutcome::Settled { contract, settlement })
    }

    async fn contract(&self, contract_id: &ContractId) -> Result<Contract, LedgerError> {
        self.db
            .fetch_contract(contract_id)
            .await?
            .ok_or_else(|| LedgerError::ContractNotFound(contract_id.clone()))
    }

    async fn call_contract_activated_hook(&self, contract: Contract, hold: crate::db_types::LedgerEntry) {
        for emitter in &self.producers.contract_activated_producer {
            debug!("🗂️ Notifying contract activated hook subscribers");
            emitter.publish_event(ContractActivatedEvent::new(contract.clone(), hold.clone())).await;
        }
    }

    async fn call_contract_settled_hook(&self, contract: Contract, settlement: Settlement) {
        for emitter in &self.producers.contract_settled_producer {
            debug!("🗂️ Notifying contract settled hook subscribers");
            emitter.publish_event(ContractSettledEvent::new(contract.clone(), settlement.clone())).await;
        }
    }
}
