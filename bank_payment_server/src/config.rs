use std::{env, fmt::Display, str::FromStr, time::Duration as StdDuration};

use bank_payment_engine::{db::sqlite::DEFAULT_SQLITE_DB_URL, helpers::DEFAULT_MEMO_MARKER};
use bpg_common::Secret;
use chrono::Duration;
use log::*;

const DEFAULT_BPG_HOST: &str = "127.0.0.1";
const DEFAULT_BPG_PORT: u16 = 8360;
const DEFAULT_UNPAID_ORDER_TTL_MINUTES: i64 = 10;
const DEFAULT_REAPER_INTERVAL_MINUTES: u64 = 5;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Webhook credentials, one per payment provider
    pub providers: ProviderSecrets,
    /// The text that precedes the order number in transfer memos
    pub memo_marker: String,
    /// Orders still unpaid this long after creation are cancelled by the reaper.
    pub unpaid_order_ttl: Duration,
    /// How often the reaper looks for expired orders
    pub reaper_interval: StdDuration,
    /// The longest a webhook call may wait on the order store before the provider is told to retry.
    pub store_timeout: StdDuration,
    /// Capacity of each event hook channel
    pub event_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BPG_HOST.to_string(),
            port: DEFAULT_BPG_PORT,
            database_url: DEFAULT_SQLITE_DB_URL.to_string(),
            providers: ProviderSecrets::default(),
            memo_marker: DEFAULT_MEMO_MARKER.to_string(),
            unpaid_order_ttl: Duration::minutes(DEFAULT_UNPAID_ORDER_TTL_MINUTES),
            reaper_interval: StdDuration::from_secs(DEFAULT_REAPER_INTERVAL_MINUTES * 60),
            store_timeout: StdDuration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("BPG_HOST").ok().unwrap_or_else(|| DEFAULT_BPG_HOST.into());
        let port = parse_env_or_default("BPG_PORT", DEFAULT_BPG_PORT);
        let database_url = env::var("BPG_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ BPG_DATABASE_URL is not set. Using the default, {DEFAULT_SQLITE_DB_URL}.");
            DEFAULT_SQLITE_DB_URL.to_string()
        });
        let providers = ProviderSecrets::from_env();
        let memo_marker = env::var("BPG_MEMO_MARKER")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| {
                if s.is_empty() {
                    warn!("🪛️ BPG_MEMO_MARKER is empty. Using the default, {DEFAULT_MEMO_MARKER}, instead.");
                }
                !s.is_empty()
            })
            .unwrap_or_else(|| DEFAULT_MEMO_MARKER.to_string());
        let ttl_minutes = positive_or_default(
            "BPG_UNPAID_ORDER_TTL",
            parse_env_or_default("BPG_UNPAID_ORDER_TTL", DEFAULT_UNPAID_ORDER_TTL_MINUTES),
            DEFAULT_UNPAID_ORDER_TTL_MINUTES,
        );
        let interval_minutes = positive_or_default(
            "BPG_REAPER_INTERVAL",
            parse_env_or_default("BPG_REAPER_INTERVAL", DEFAULT_REAPER_INTERVAL_MINUTES),
            DEFAULT_REAPER_INTERVAL_MINUTES,
        );
        let store_timeout_ms = positive_or_default(
            "BPG_STORE_TIMEOUT_MS",
            parse_env_or_default("BPG_STORE_TIMEOUT_MS", DEFAULT_STORE_TIMEOUT_MS),
            DEFAULT_STORE_TIMEOUT_MS,
        );
        let event_buffer_size = positive_or_default(
            "BPG_EVENT_BUFFER_SIZE",
            parse_env_or_default("BPG_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE),
            DEFAULT_EVENT_BUFFER_SIZE,
        );
        info!(
            "🪛️ Unpaid orders expire after {ttl_minutes} minutes. The reaper runs every {interval_minutes} minutes."
        );
        Self {
            host,
            port,
            database_url,
            providers,
            memo_marker,
            unpaid_order_ttl: Duration::minutes(ttl_minutes),
            reaper_interval: StdDuration::from_secs(interval_minutes * 60),
            store_timeout: StdDuration::from_millis(store_timeout_ms),
            event_buffer_size,
        }
    }
}

fn parse_env_or_default<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

fn positive_or_default<T>(name: &str, value: T, default: T) -> T
where T: PartialOrd + Default + Display {
    if value > T::default() {
        value
    } else {
        error!("🪛️ {name} must be greater than zero. Using the default, {default}, instead.");
        default
    }
}

//-------------------------------------------------  ProviderSecrets  --------------------------------------------------
/// The credentials each payment provider presents on its webhook calls. An unset credential means that provider's
/// webhooks are always rejected.
#[derive(Clone, Debug, Default)]
pub struct ProviderSecrets {
    pub sepay_api_key: Secret<String>,
    pub casso_webhook_token: Secret<String>,
}

impl ProviderSecrets {
    pub fn from_env() -> Self {
        let sepay_api_key = env::var("BPG_SEPAY_API_KEY").ok().unwrap_or_else(|| {
            warn!("🪛️ BPG_SEPAY_API_KEY is not set. SePay webhooks will be rejected.");
            String::default()
        });
        let casso_webhook_token = env::var("BPG_CASSO_WEBHOOK_TOKEN").ok().unwrap_or_else(|| {
            warn!("🪛️ BPG_CASSO_WEBHOOK_TOKEN is not set. Casso webhooks will be rejected.");
            String::default()
        });
        Self { sepay_api_key: Secret::new(sepay_api_key), casso_webhook_token: Secret::new(casso_webhook_token) }
    }
}

//-------------------------------------------------  WebhookOptions  ---------------------------------------------------
/// The part of the configuration that webhook handlers need. It carries no secrets.
#[derive(Clone, Copy, Debug)]
pub struct WebhookOptions {
    pub store_timeout: StdDuration,
}

impl WebhookOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { store_timeout: config.store_timeout }
    }
}

impl Default for WebhookOptions {
    fn default() -> Self {
        Self { store_timeout: StdDuration::from_millis(DEFAULT_STORE_TIMEOUT_MS) }
    }
}
