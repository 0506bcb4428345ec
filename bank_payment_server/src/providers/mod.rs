//! Webhook ingress: provider authentication and payload normalisation.
//!
//! Each bank data provider has its own way of authenticating webhook calls and its own payload shape. Everything that
//! is specific to a provider lives in that provider's [`ProviderAdapter`]. The output of every adapter is the same: a
//! list of canonical [`PaymentEvent`]s. Nothing downstream of this module sees a provider's raw payload.
//!
//! Authentication always happens before the body is parsed. Credentials are compared in constant time and never
//! logged.
mod casso;
mod credentials;
mod errors;
mod sepay;

use std::{fmt::Display, str::FromStr};

use actix_web::http::header::HeaderMap;
use bank_payment_engine::db_types::PaymentEvent;
pub use casso::{CassoAdapter, CassoEnvelope, CassoTransaction, CASSO_TOKEN_HEADER};
use chrono::{DateTime, Utc};
pub use credentials::verify_credential;
pub use errors::{AuthError, IngressError, ParseError};
use log::*;
use serde::Deserialize;
pub use sepay::{SePayAdapter, SePayTransaction};

use crate::config::ProviderSecrets;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    SePay,
    Casso,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::SePay => "sepay",
            ProviderId::Casso => "casso",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sepay" => Ok(Self::SePay),
            "casso" => Ok(Self::Casso),
            _ => Err(format!("Unknown payment provider: {s}")),
        }
    }
}

/// A decoded provider payload. Each variant knows how to turn itself into canonical payment events.
#[derive(Debug, Clone)]
pub enum ProviderPayload {
    SePay(SePayTransaction),
    Casso(CassoEnvelope),
}

impl ProviderPayload {
    pub fn into_events(self, received_at: DateTime<Utc>) -> Result<Vec<PaymentEvent>, ParseError> {
        match self {
            ProviderPayload::SePay(tx) => tx.into_events(received_at),
            ProviderPayload::Casso(envelope) => envelope.into_events(received_at),
        }
    }
}

pub trait ProviderAdapter: Send + Sync {
    fn provider_id(&self) -> ProviderId;

    /// Checks the credential presented in the request headers.
    fn authenticate(&self, headers: &HeaderMap) -> Result<(), AuthError>;

    /// Decodes the raw request body. `content_type` is the value of the `Content-Type` header, if any.
    fn decode(&self, body: &[u8], content_type: Option<&str>) -> Result<ProviderPayload, ParseError>;

    fn receive(&self, body: &[u8], headers: &HeaderMap) -> Result<Vec<PaymentEvent>, IngressError> {
        self.authenticate(headers)?;
        let content_type = headers.get("content-type").and_then(|v| v.to_str().ok());
        let payload = self.decode(body, content_type)?;
        let events = payload.into_events(Utc::now())?;
        trace!("📥️ {} webhook produced {} payment events", self.provider_id(), events.len());
        Ok(events)
    }
}

/// Routes webhook deliveries to the adapter for the named provider.
#[derive(Debug, Clone)]
pub struct WebhookIngress {
    sepay: SePayAdapter,
    casso: CassoAdapter,
}

impl WebhookIngress {
    pub fn new(secrets: ProviderSecrets) -> Self {
        if !secrets.sepay_api_key.is_configured() {
            warn!("📥️ No SePay API key is configured. All SePay webhook calls will be rejected.");
        }
        if !secrets.casso_webhook_token.is_configured() {
            warn!("📥️ No Casso webhook token is configured. All Casso webhook calls will be rejected.");
        }
        Self { sepay: SePayAdapter::new(secrets.sepay_api_key), casso: CassoAdapter::new(secrets.casso_webhook_token) }
    }

    pub fn adapter(&self, provider: ProviderId) -> &dyn ProviderAdapter {
        match provider {
            ProviderId::SePay => &self.sepay,
            ProviderId::Casso => &self.casso,
        }
    }

    pub fn receive(
        &self,
        provider: ProviderId,
        body: &[u8],
        headers: &HeaderMap,
    ) -> Result<Vec<PaymentEvent>, IngressError> {
        self.adapter(provider).receive(body, headers)
    }
}

/// Transaction ids arrive as JSON numbers from some providers and as strings from others (and always as strings in
/// form bodies).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExternalId {
    Number(i64),
    Text(String),
}

impl ExternalId {
    /// The id as a string, or `None` if it is blank.
    pub fn into_string(self) -> Option<String> {
        match self {
            ExternalId::Number(n) => Some(n.to_string()),
            ExternalId::Text(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            },
        }
    }
}

pub(crate) fn is_json(body: &[u8], content_type: Option<&str>) -> bool {
    match content_type {
        Some(ct) if ct.to_ascii_lowercase().contains("json") => true,
        Some(ct) if ct.to_ascii_lowercase().contains("x-www-form-urlencoded") => false,
        _ => body.iter().find(|b| !b.is_ascii_whitespace()).is_some_and(|b| *b == b'{' || *b == b'['),
    }
}
