use chrono::Duration;
use log::*;
use tally_ledger_engine::{db_types::PurchaseSession, events::EventProducers, PurchaseFlowApi, SqliteDatabase};
use tokio::task::JoinHandle;

/// Starts the session expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_expiry_worker(db: SqliteDatabase, producers: EventProducers, timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(60));
        let api = PurchaseFlowApi::new(db, producers);
        info!("🕰️ Purchase session expiry worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running purchase session expiry sweep");
            match api.expire_stale_sessions(timeout).await {
                Ok(expired) if expired.is_empty() => {},
                Ok(expired) => {
                    info!("🕰️ {} purchase sessions expired: {}", expired.len(), session_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error running purchase session expiry sweep: {e}");
                },
            }
        }
    })
}

fn session_list(sessions: &[PurchaseSession]) -> String {
    sessions
        .iter()
        .map(|s| format!("[{}] account: #{} ref: {}", s.id, s.account_id, s.external_ref.as_deref().unwrap_or("-")))
        .collect::<Vec<String>>()
        .join(", ")
}
