use std::{env, time::Duration};

use hps_common::Secret;
use log::*;

const DEFAULT_HPS_HOST: &str = "127.0.0.1";
const DEFAULT_HPS_PORT: u16 = 8360;
/// Maximum clock skew accepted on Stripe signature timestamps.
const DEFAULT_STRIPE_TOLERANCE: Duration = Duration::from_secs(300);
/// Hard deadline on PayPal verification API calls. A timeout means "unverified".
const DEFAULT_PAYPAL_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_PAYPAL_API_BASE: &str = "https://api-m.paypal.com";

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
    /// The static API key admin clients must present in the `x-admin-api-key` header. When unset, every admin
    /// call is rejected.
    pub admin_api_key: Option<Secret<String>>,
    pub stripe: StripeConfig,
    pub paystack: PaystackConfig,
    pub paypal: PayPalConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HPS_HOST.to_string(),
            port: DEFAULT_HPS_PORT,
            database_url: String::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            admin_api_key: None,
            stripe: StripeConfig::default(),
            paystack: PaystackConfig::default(),
            paypal: PayPalConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct StripeConfig {
    /// The webhook endpoint signing secret (`whsec_...`). When unset, all Stripe webhooks are rejected.
    pub signing_secret: Option<Secret<String>>,
    pub tolerance: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct PaystackConfig {
    /// The Paystack secret key used for webhook signatures. When unset, all Paystack webhooks are rejected.
    pub signing_secret: Option<Secret<String>>,
}

#[derive(Clone, Debug)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// The webhook id PayPal assigned to this endpoint. Signature verification is impossible without it, so
    /// when it is unset every PayPal webhook is rejected.
    pub webhook_id: Option<String>,
    pub api_base: String,
    pub timeout: Duration,
}

impl Default for PayPalConfig {
    fn default() -> Self {
        Self {
            client_id: String::default(),
            client_secret: Secret::default(),
            webhook_id: None,
            api_base: DEFAULT_PAYPAL_API_BASE.to_string(),
            timeout: DEFAULT_PAYPAL_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("HPS_HOST").ok().unwrap_or_else(|| DEFAULT_HPS_HOST.into());
        let port = env::var("HPS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for HPS_PORT. {e} Using the default, {DEFAULT_HPS_PORT}, instead."
                    );
                    DEFAULT_HPS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_HPS_PORT);
        let database_url = env::var("HPS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ HPS_DATABASE_URL is not set. Please set it to the URL for the reconciliation database.");
            String::default()
        });
        let use_x_forwarded_for =
            env::var("HPS_USE_X_FORWARDED_FOR").map(|s| &s == "1" || &s == "true").unwrap_or(false);
        let use_forwarded = env::var("HPS_USE_FORWARDED").map(|s| &s == "1" || &s == "true").unwrap_or(false);
        let admin_api_key = env::var("HPS_ADMIN_API_KEY").ok().map(Secret::new);
        if admin_api_key.is_none() {
            warn!(
                "🪛️ HPS_ADMIN_API_KEY is not set. All admin API calls will be rejected. Set it to enable the /api \
                 endpoints."
            );
        }
        Self {
            host,
            port,
            database_url,
            use_x_forwarded_for,
            use_forwarded,
            admin_api_key,
            stripe: StripeConfig::from_env_or_default(),
            paystack: PaystackConfig::from_env_or_default(),
            paypal: PayPalConfig::from_env_or_default(),
        }
    }
}

impl StripeConfig {
    pub fn from_env_or_default() -> Self {
        let signing_secret = env::var("HPS_STRIPE_SIGNING_SECRET").ok().map(Secret::new);
        if signing_secret.is_none() {
            warn!(
                "🪛️ HPS_STRIPE_SIGNING_SECRET is not set. All Stripe webhooks will be rejected until it is \
                 configured."
            );
        }
        let tolerance = env::var("HPS_STRIPE_TOLERANCE")
            .map_err(|_| {
                info!(
                    "🪛️ HPS_STRIPE_TOLERANCE is not set. Using the default value of {} s.",
                    DEFAULT_STRIPE_TOLERANCE.as_secs()
                )
            })
            .and_then(|s| {
                s.parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| warn!("🪛️ Invalid configuration value for HPS_STRIPE_TOLERANCE. {e}"))
            })
            .ok()
            .unwrap_or(DEFAULT_STRIPE_TOLERANCE);
        Self { signing_secret, tolerance }
    }
}

impl PaystackConfig {
    pub fn from_env_or_default() -> Self {
        let signing_secret = env::var("HPS_PAYSTACK_SIGNING_SECRET").ok().map(Secret::new);
        if signing_secret.is_none() {
            warn!(
                "🪛️ HPS_PAYSTACK_SIGNING_SECRET is not set. All Paystack webhooks will be rejected until it is \
                 configured."
            );
        }
        Self { signing_secret }
    }
}

impl PayPalConfig {
    pub fn from_env_or_default() -> Self {
        let client_id = env::var("HPS_PAYPAL_CLIENT_ID").ok().unwrap_or_else(|| {
            warn!("🪛️ HPS_PAYPAL_CLIENT_ID is not set. PayPal webhook verification will fail.");
            String::default()
        });
        let client_secret = Secret::new(env::var("HPS_PAYPAL_CLIENT_SECRET").ok().unwrap_or_else(|| {
            warn!("🪛️ HPS_PAYPAL_CLIENT_SECRET is not set. PayPal webhook verification will fail.");
            String::default()
        }));
        let webhook_id = env::var("HPS_PAYPAL_WEBHOOK_ID").ok();
        if webhook_id.is_none() {
            warn!(
                "🪛️ HPS_PAYPAL_WEBHOOK_ID is not set. All PayPal webhooks will be rejected until it is configured."
            );
        }
        let api_base = env::var("HPS_PAYPAL_API_BASE").ok().unwrap_or_else(|| DEFAULT_PAYPAL_API_BASE.to_string());
        let timeout = env::var("HPS_PAYPAL_TIMEOUT")
            .map_err(|_| {
                info!(
                    "🪛️ HPS_PAYPAL_TIMEOUT is not set. Using the default value of {} s.",
                    DEFAULT_PAYPAL_TIMEOUT.as_secs()
                )
            })
            .and_then(|s| {
                s.parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| warn!("🪛️ Invalid configuration value for HPS_PAYPAL_TIMEOUT. {e}"))
            })
            .ok()
            .unwrap_or(DEFAULT_PAYPAL_TIMEOUT);
        Self { client_id, client_secret, webhook_id, api_base, timeout }
    }
}

/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep
/// this as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}
