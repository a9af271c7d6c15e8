use std::{env, net::IpAddr};

use chrono::Duration;
use log::*;
use tally_common::Secret;

const DEFAULT_TALLY_HOST: &str = "127.0.0.1";
const DEFAULT_TALLY_PORT: u16 = 8480;
const DEFAULT_SESSION_TIMEOUT: Duration = Duration::hours(2);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    /// The time before an unconfirmed purchase session is considered abandoned and swept to `Expired`.
    pub session_timeout: Duration,
    /// Payment gateway configuration
    pub gateway: GatewayConfig,
}

#[derive(Clone, Debug, Default)]
pub struct GatewayConfig {
    /// Base URL of the gateway's hosted checkout page; the external reference is appended to it.
    pub checkout_base_url: String,
    /// Shared secret for webhook signature verification.
    pub hmac_secret: Secret<String>,
    pub hmac_checks: bool,
    /// If supplied, requests against /gateway endpoints will be checked against a whitelist of gateway IP addresses.
    /// To explicitly disable the whitelist, set this to "false", "none", or "0".
    pub whitelist: Option<Vec<IpAddr>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_TALLY_HOST.to_string(),
            port: DEFAULT_TALLY_PORT,
            database_url: String::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            gateway: GatewayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("TALLY_HOST").ok().unwrap_or_else(|| DEFAULT_TALLY_HOST.into());
        let port = env::var("TALLY_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for TALLY_PORT. {e} Using the default, {DEFAULT_TALLY_PORT}, \
                         instead."
                    );
                    DEFAULT_TALLY_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_TALLY_PORT);
        let database_url = env::var("TALLY_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ TALLY_DATABASE_URL is not set. Please set it to the URL for the ledger database.");
            String::default()
        });
        let use_x_forwarded_for =
            env::var("TALLY_USE_X_FORWARDED_FOR").map(|s| &s == "1" || &s == "true").unwrap_or(false);
        let use_forwarded = env::var("TALLY_USE_FORWARDED").map(|s| &s == "1" || &s == "true").unwrap_or(false);
        let session_timeout = configure_session_timeout();
        let gateway = GatewayConfig::from_env_or_defaults();
        Self { host, port, database_url, use_x_forwarded_for, use_forwarded, session_timeout, gateway }
    }
}

impl GatewayConfig {
    pub fn from_env_or_defaults() -> Self {
        let checkout_base_url = env::var("TALLY_GATEWAY_CHECKOUT_URL").ok().unwrap_or_else(|| {
            error!(
                "🪛️ TALLY_GATEWAY_CHECKOUT_URL is not set. Please set it to the gateway's hosted checkout base URL."
            );
            String::default()
        });
        let hmac_secret = env::var("TALLY_GATEWAY_HMAC_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ TALLY_GATEWAY_HMAC_SECRET is not set. Please set it to the gateway's webhook signing key.");
            String::default()
        });
        let hmac_secret = Secret::new(hmac_secret);
        let hmac_checks = env::var("TALLY_GATEWAY_HMAC_CHECKS").map(|s| &s != "0" && &s != "false").unwrap_or(true);
        let whitelist = env::var("TALLY_GATEWAY_IP_WHITELIST").ok().and_then(|s| {
            if ["none", "false", "0"].contains(&s.to_lowercase().as_str()) {
                info!(
                    "🪛️ Gateway IP whitelist is disabled. If this is not what you want, set \
                     TALLY_GATEWAY_IP_WHITELIST to a comma-separated list of IP addresses to enable it."
                );
                return None;
            }
            let ip_addrs = s
                .split(',')
                .filter_map(|s| {
                    s.parse()
                        .map_err(|e| {
                            warn!("🪛️ Ignoring invalid IP address ({s}) in TALLY_GATEWAY_IP_WHITELIST: {e}");
                            None::<IpAddr>
                        })
                        .ok()
                })
                .collect::<Vec<IpAddr>>();
            Some(ip_addrs)
        });
        match &whitelist {
            Some(whitelist) if whitelist.is_empty() => {
                warn!(
                    "🚨️ The gateway IP whitelist was configured, but is empty. The server will run, but won't \
                     authorise any incoming gateway requests."
                );
            },
            None => {
                info!("🪛️ No gateway IP whitelist is set. Only HMAC validation will be used.");
            },
            Some(v) => {
                let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
                info!("🪛️ Gateway IP whitelist: {addrs}");
            },
        }
        Self { checkout_base_url, hmac_secret, hmac_checks, whitelist }
    }
}

fn configure_session_timeout() -> Duration {
    env::var("TALLY_SESSION_TIMEOUT")
        .map_err(|_| {
            info!(
                "🪛️ TALLY_SESSION_TIMEOUT is not set. Using the default value of {} hrs.",
                DEFAULT_SESSION_TIMEOUT.num_hours()
            )
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map(Duration::hours)
                .map_err(|e| warn!("🪛️ Invalid configuration value for TALLY_SESSION_TIMEOUT. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_SESSION_TIMEOUT)
}
