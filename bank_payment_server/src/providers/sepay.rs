use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use bank_payment_engine::db_types::{Money, PaymentEvent};
use bpg_common::{helpers::strip_auth_scheme, Secret};
use chrono::{DateTime, Utc};
use log::*;
use serde::Deserialize;

use super::{
    is_json,
    verify_credential,
    AuthError,
    ExternalId,
    ParseError,
    ProviderAdapter,
    ProviderId,
    ProviderPayload,
};

const AUTH_SCHEME: &str = "Apikey";

/// SePay authenticates with `Authorization: Apikey <key>` and posts one transaction per call, as JSON or as a form.
#[derive(Debug, Clone)]
pub struct SePayAdapter {
    api_key: Secret<String>,
}

impl SePayAdapter {
    pub fn new(api_key: Secret<String>) -> Self {
        Self { api_key }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SePayTransaction {
    pub id: Option<ExternalId>,
    pub gateway: Option<String>,
    pub transaction_date: Option<String>,
    pub account_number: Option<String>,
    pub content: Option<String>,
    /// `in` for incoming transfers, `out` for outgoing ones
    pub transfer_type: Option<String>,
    pub transfer_amount: Option<Money>,
    pub reference_code: Option<String>,
    pub description: Option<String>,
}

impl SePayTransaction {
    pub fn is_outgoing(&self) -> bool {
        self.transfer_type.as_deref().is_some_and(|t| t.trim().eq_ignore_ascii_case("out"))
    }

    pub fn into_events(self, received_at: DateTime<Utc>) -> Result<Vec<PaymentEvent>, ParseError> {
        if self.is_outgoing() {
            debug!("📥️ Ignoring outgoing SePay transfer {:?}", self.id);
            return Ok(Vec::new());
        }
        let id = self.id.and_then(ExternalId::into_string).ok_or(ParseError::MissingField("id"))?;
        let amount = self.transfer_amount.ok_or(ParseError::MissingField("transferAmount"))?;
        if !amount.is_positive() {
            return Err(ParseError::InvalidAmount(amount.to_string()));
        }
        let memo = non_blank(self.content)
            .or_else(|| non_blank(self.description))
            .ok_or(ParseError::MissingField("content"))?;
        trace!(
            "📥️ SePay transfer {id} via {} ref {}",
            self.gateway.as_deref().unwrap_or("unknown gateway"),
            self.reference_code.as_deref().unwrap_or("-")
        );
        let event = PaymentEvent::new(ProviderId::SePay.as_str(), id, amount, memo).received_at(received_at);
        Ok(vec![event])
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

impl ProviderAdapter for SePayAdapter {
    fn provider_id(&self) -> ProviderId {
        ProviderId::SePay
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        let Some(header) = header else {
            return verify_credential(None, &self.api_key);
        };
        let key = strip_auth_scheme(header, AUTH_SCHEME).ok_or_else(|| {
            if self.api_key.is_configured() {
                AuthError::InvalidCredential
            } else {
                AuthError::NotConfigured
            }
        })?;
        verify_credential(Some(key), &self.api_key)
    }

    fn decode(&self, body: &[u8], content_type: Option<&str>) -> Result<ProviderPayload, ParseError> {
        let tx = if is_json(body, content_type) {
            serde_json::from_slice::<SePayTransaction>(body).map_err(|e| ParseError::InvalidJson(e.to_string()))?
        } else {
            let fields = url::form_urlencoded::parse(body)
                .map(|(k, v)| (k.into_owned(), serde_json::Value::String(v.into_owned())))
                .collect::<serde_json::Map<_, _>>();
            if fields.is_empty() {
                return Err(ParseError::InvalidForm("The form body is empty".into()));
            }
            serde_json::from_value::<SePayTransaction>(serde_json::Value::Object(fields))
                .map_err(|e| ParseError::InvalidForm(e.to_string()))?
        };
        Ok(ProviderPayload::SePay(tx))
    }
}
