//! The outward-facing half of the purchase flow: creating a checkout the user can be redirected to.
//!
//! The gateway contract is deliberately thin. The server generates the globally unique external reference itself and
//! hands it to the gateway as the idempotency key, so no gateway round trip happens inside any database transaction;
//! the gateway reports back asynchronously through the signed webhook, or synchronously when the UI calls the verify
//! endpoint with the amount it fetched from the gateway's status API.

use rand::Rng;
use tally_ledger_engine::db_types::{Package, PurchaseSession};

use crate::config::GatewayConfig;

#[derive(Debug, Clone)]
pub struct CheckoutIntent {
    /// The idempotency key shared with the gateway. Webhooks and verify calls quote it back.
    pub external_ref: String,
    /// Where to send the user to pay.
    pub redirect_url: String,
}

pub trait CheckoutGateway: Clone {
    fn new_checkout(&self, session: &PurchaseSession, package: &Package) -> CheckoutIntent;
}

/// Checkout against a gateway with a hosted payment page. The reference is embedded in the page URL; the gateway
/// echoes it in every status report about the attempt.
#[derive(Debug, Clone)]
pub struct HostedCheckout {
    base_url: String,
}

impl HostedCheckout {
    pub fn new(config: &GatewayConfig) -> Self {
        Self { base_url: config.checkout_base_url.trim_end_matches('/').to_string() }
    }
}

impl CheckoutGateway for HostedCheckout {
    fn new_checkout(&self, session: &PurchaseSession, package: &Package) -> CheckoutIntent {
        let external_ref = new_external_ref();
        let redirect_url = format!(
            "{}/checkout/{external_ref}?amount={}&currency={}&session={}",
            self.base_url,
            package.price.value(),
            package.currency,
            session.id
        );
        CheckoutIntent { external_ref, redirect_url }
    }
}

/// 128 bits of randomness, hex encoded. Globally unique for any realistic session volume.
fn new_external_ref() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
