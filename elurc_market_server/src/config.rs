//! Server configuration.
//!
//! Every setting is read from an `ELURC_*` environment variable. Missing or malformed values are logged and replaced
//! with a default, so the server always starts. The one exception that matters in production is the admin API key:
//! if it is not set, the admin routes reject every request.
use std::{env, net::IpAddr};

use chrono::Duration;
use elurc_common::{helpers::parse_boolean_flag, Lamports, Secret};
use elurc_market_engine::{OrderFlowOptions, DEFAULT_PAYMENT_TIMEOUT_MINUTES, DEFAULT_UNDERPAYMENT_TOLERANCE};
use log::*;

const DEFAULT_ELURC_HOST: &str = "127.0.0.1";
const DEFAULT_ELURC_PORT: u16 = 8470;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The key admin clients must present in the `X-Elurc-Admin-Key` header.
    pub admin_api_key: Secret<String>,
    pub webhook: WebhookConfig,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    /// How long a pending order waits for its payment before it is marked as timed out.
    pub payment_timeout: Duration,
    /// The largest shortfall that is accepted without an admin review.
    pub underpayment_tolerance: Lamports,
}

/// Settings for the payment confirmation webhook that the ledger verifier calls.
#[derive(Clone, Debug, Default)]
pub struct WebhookConfig {
    pub hmac_secret: Secret<String>,
    pub hmac_checks: bool,
    /// If supplied, webhook calls are only accepted from these addresses.
    /// To explicitly disable the whitelist, set this to "false", "none", or "0".
    pub whitelist: Option<Vec<IpAddr>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_ELURC_HOST.to_string(),
            port: DEFAULT_ELURC_PORT,
            database_url: String::default(),
            admin_api_key: Secret::default(),
            webhook: WebhookConfig { hmac_checks: true, ..Default::default() },
            use_x_forwarded_for: false,
            use_forwarded: false,
            payment_timeout: Duration::minutes(DEFAULT_PAYMENT_TIMEOUT_MINUTES),
            underpayment_tolerance: Lamports::from(DEFAULT_UNDERPAYMENT_TOLERANCE),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("ELURC_HOST").ok().unwrap_or_else(|| DEFAULT_ELURC_HOST.into());
        let port = env::var("ELURC_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for ELURC_PORT. {e} Using the default, {DEFAULT_ELURC_PORT}, \
                         instead."
                    );
                    DEFAULT_ELURC_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_ELURC_PORT);
        let database_url = env::var("ELURC_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ ELURC_DATABASE_URL is not set. Please set it to the URL for the marketplace database.");
            String::default()
        });
        let admin_api_key = env::var("ELURC_ADMIN_API_KEY").ok().unwrap_or_else(|| {
            warn!("🪛️ ELURC_ADMIN_API_KEY is not set. All requests to the admin API will be refused.");
            String::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("ELURC_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("ELURC_USE_FORWARDED").ok(), false);
        Self {
            host,
            port,
            database_url,
            admin_api_key: Secret::new(admin_api_key),
            webhook: WebhookConfig::from_env_or_defaults(),
            use_x_forwarded_for,
            use_forwarded,
            payment_timeout: configure_payment_timeout(),
            underpayment_tolerance: configure_underpayment_tolerance(),
        }
    }

    pub fn order_flow_options(&self) -> OrderFlowOptions {
        OrderFlowOptions { underpayment_tolerance: self.underpayment_tolerance, payment_timeout: self.payment_timeout }
    }
}

impl WebhookConfig {
    pub fn from_env_or_defaults() -> Self {
        let hmac_secret = env::var("ELURC_WEBHOOK_HMAC_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ ELURC_WEBHOOK_HMAC_SECRET is not set. Please set it to the key the ledger verifier signs payment \
                 confirmations with."
            );
            String::default()
        });
        let hmac_checks = parse_boolean_flag(env::var("ELURC_WEBHOOK_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!("🚨️ HMAC checks on the payment webhook are DISABLED. Anyone who can reach it can mark orders paid.");
        }
        let whitelist = env::var("ELURC_VERIFIER_IP_WHITELIST").ok().and_then(|s| parse_whitelist(&s));
        match &whitelist {
            Some(whitelist) if whitelist.is_empty() => {
                warn!(
                    "🚨️ The verifier IP whitelist was configured, but is empty. The server will run, but won't accept \
                     any payment confirmations."
                );
            },
            None => {
                info!("🪛️ No verifier IP whitelist is set. Only HMAC validation will be used.");
            },
            Some(v) => {
                let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
                info!("🪛️ Verifier IP whitelist: {addrs}");
            },
        }
        Self { hmac_secret: Secret::new(hmac_secret), hmac_checks, whitelist }
    }
}

/// Parses a comma-separated list of IP addresses. Invalid entries are skipped. Returns `None` if the whitelist is
/// explicitly disabled.
pub fn parse_whitelist(value: &str) -> Option<Vec<IpAddr>> {
    if ["none", "false", "0", ""].contains(&value.trim().to_lowercase().as_str()) {
        info!(
            "🪛️ Verifier IP whitelist is disabled. If this is not what you want, set ELURC_VERIFIER_IP_WHITELIST to a \
             comma-separated list of IP addresses to enable it."
        );
        return None;
    }
    let ip_addrs = elurc_common::helpers::split_list(value)
        .into_iter()
        .filter_map(|s| {
            s.parse()
                .map_err(|e| warn!("🪛️ Ignoring invalid IP address ({s}) in ELURC_VERIFIER_IP_WHITELIST: {e}"))
                .ok()
        })
        .collect::<Vec<IpAddr>>();
    Some(ip_addrs)
}

fn configure_payment_timeout() -> Duration {
    env::var("ELURC_PAYMENT_TIMEOUT")
        .map_err(|_| {
            info!(
                "🪛️ ELURC_PAYMENT_TIMEOUT is not set. Using the default value of {DEFAULT_PAYMENT_TIMEOUT_MINUTES} \
                 minutes."
            )
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for ELURC_PAYMENT_TIMEOUT. {e}"))
                .and_then(|m| match m {
                    m if m > 0 => Ok(Duration::minutes(m)),
                    _ => Err(warn!("🪛️ ELURC_PAYMENT_TIMEOUT must be a positive number of minutes. Got {m}.")),
                })
        })
        .ok()
        .unwrap_or(Duration::minutes(DEFAULT_PAYMENT_TIMEOUT_MINUTES))
}

fn configure_underpayment_tolerance() -> Lamports {
    env::var("ELURC_UNDERPAYMENT_TOLERANCE")
        .map_err(|_| {
            info!(
                "🪛️ ELURC_UNDERPAYMENT_TOLERANCE is not set. Using the default value of \
                 {DEFAULT_UNDERPAYMENT_TOLERANCE} lamports."
            )
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for ELURC_UNDERPAYMENT_TOLERANCE. {e}"))
                .and_then(|v| match v {
                    v if v >= 0 => Ok(Lamports::from(v)),
                    _ => Err(warn!("🪛️ ELURC_UNDERPAYMENT_TOLERANCE cannot be negative. Got {v}.")),
                })
        })
        .ok()
        .unwrap_or(Lamports::from(DEFAULT_UNDERPAYMENT_TOLERANCE))
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that route handlers need. Secrets are excluded so they are not passed around
/// the system.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    pub verifier_whitelist: Option<Vec<IpAddr>>,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
            verifier_whitelist: config.webhook.whitelist.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn whitelist_parsing() {
        assert!(parse_whitelist("none").is_none());
        assert!(parse_whitelist("False").is_none());
        let list = parse_whitelist("10.0.0.1, not-an-ip, ::1").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0], "10.0.0.1".parse::<IpAddr>().unwrap());
        assert!(list[1].is_loopback());
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::new("0.0.0.0", 9000);
        assert_eq!(config.port, 9000);
        assert!(config.webhook.hmac_checks);
        assert!(config.admin_api_key.is_empty());
        let options = config.order_flow_options();
        assert_eq!(options.payment_timeout, Duration::minutes(30));
        assert_eq!(options.underpayment_tolerance, Lamports::from(1_000));
    }
}
