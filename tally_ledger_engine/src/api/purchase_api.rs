use std::fmt::Debug;

use chrono::Duration;
use log::*;

use crate::{
    db_types::{LedgerEntry, MinorUnits, PurchaseSession, SessionStatus},
    events::{EventProducers, PurchaseConfirmedEvent, SessionClosedEvent},
    traits::{AccountManagement, InsertEntryResult, LedgerDatabase, LedgerError},
};

/// `PurchaseFlowApi` drives a purchase session from creation through gateway checkout to its exactly-once ledger
/// credit, in response to both the synchronous verify call and asynchronous gateway webhooks.
pub struct PurchaseFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for PurchaseFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PurchaseFlowApi")
    }
}

impl<B> PurchaseFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> PurchaseFlowApi<B>
where B: LedgerDatabase + AccountManagement
{
    /// Creates a purchase session for an active package. The returned session is in `Created` status; the caller
    /// takes it to the payment gateway and then records the checkout reference with [`Self::attach_checkout`].
    pub async fn new_session(&self, account_id: i64, package_id: i64) -> Result<PurchaseSession, LedgerError> {
        let session = self.db.create_purchase_session(account_id, package_id).await?;
        trace!("🧾️ Purchase session #{} created for account #{account_id}", session.id);
        Ok(session)
    }

    /// Records the gateway checkout reference against the session. The gateway call itself happens between
    /// [`Self::new_session`] and this, outside any database transaction.
    pub async fn attach_checkout(&self, session_id: i64, external_ref: &str) -> Result<PurchaseSession, LedgerError> {
        self.db.attach_checkout(session_id, external_ref).await
    }

    /// Confirms the purchase identified by the gateway's checkout reference. Both the verify path and the webhook
    /// reconciler call this; whichever arrives first credits the account, the other observes the winner's entry.
    pub async fn confirm(&self, external_ref: &str, verified_amount: MinorUnits) -> Result<LedgerEntry, LedgerError> {
        let result = self.db.confirm_purchase(external_ref, verified_amount).await?;
        match result {
            InsertEntryResult::Inserted(entry) => {
                if let Some(session) = self.db.fetch_session(external_ref).await? {
                    self.call_purchase_confirmed_hook(session, &entry).await;
                }
                Ok(entry)
            },
            InsertEntryResult::AlreadyExists(entry) => {
                debug!("🧾️ Confirmation for [{external_ref}] was already processed");
                Ok(entry)
            },
        }
    }

    /// Marks a session as failed at the gateway. No-op if the session is already terminal.
    pub async fn fail(&self, external_ref: &str) -> Result<Option<PurchaseSession>, LedgerError> {
        let session = self.db.close_purchase_session(external_ref, SessionStatus::Failed).await?;
        if let Some(s) = &session {
            self.call_session_closed_hook(s.clone()).await;
        }
        Ok(session)
    }

    /// Expires a session the gateway reported as timed out. No-op if a late confirmation already won.
    pub async fn expire(&self, external_ref: &str) -> Result<Option<PurchaseSession>, LedgerError> {
        let session = self.db.close_purchase_session(external_ref, SessionStatus::Expired).await?;
        if let Some(s) = &session {
            self.call_session_closed_hook(s.clone()).await;
        }
        Ok(session)
    }

    /// Sweeps every session left non-terminal for longer than `timeout`. Called from the periodic expiry worker.
    pub async fn expire_stale_sessions(&self, timeout: Duration) -> Result<Vec<PurchaseSession>, LedgerError> {
        let expired = self.db.expire_stale_sessions(timeout).await?;
        if !expired.is_empty() {
            info!("🕰️ Expired {} stale purchase session(s)", expired.len());
        }
        for session in &expired {
            self.call_session_closed_hook(session.clone()).await;
        }
        Ok(expired)
    }

    pub async fn fetch_session(&self, external_ref: &str) -> Result<Option<PurchaseSession>, LedgerError> {
        self.db.fetch_session(external_ref).await
    }

    async fn call_purchase_confirmed_hook(&self, session: PurchaseSession, entry: &LedgerEntry) {
        for emitter in &self.producers.purchase_confirmed_producer {
            debug!("🧾️ Notifying purchase confirmed hook subscribers");
            let event = PurchaseConfirmedEvent::new(session.clone(), entry.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_session_closed_hook(&self, session: PurchaseSession) {
        for emitter in &self.producers.session_closed_producer {
            debug!("🧾️ Notifying session closed hook subscribers");
            emitter.publish_event(SessionClosedEvent::new(session.clone())).await;
        }
    }
}
