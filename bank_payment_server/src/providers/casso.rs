use actix_web::http::header::HeaderMap;
use bank_payment_engine::db_types::{Money, PaymentEvent};
use bpg_common::{helpers::strip_auth_scheme, Secret};
use chrono::{DateTime, Utc};
use log::*;
use serde::Deserialize;

use super::{verify_credential, AuthError, ExternalId, ParseError, ProviderAdapter, ProviderId, ProviderPayload};

pub const CASSO_TOKEN_HEADER: &str = "X-Webhook-Token";

/// Casso authenticates with a token in `X-Webhook-Token` and wraps transactions in a `data` field, which holds either
/// a single transaction or an array of them.
#[derive(Debug, Clone)]
pub struct CassoAdapter {
    token: Secret<String>,
}

impl CassoAdapter {
    pub fn new(token: Secret<String>) -> Self {
        Self { token }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CassoEnvelope {
    #[serde(default)]
    pub error: Option<i64>,
    pub data: Option<CassoData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CassoData {
    Many(Vec<CassoTransaction>),
    One(CassoTransaction),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CassoTransaction {
    pub id: Option<ExternalId>,
    /// The bank's own transaction reference
    pub tid: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Money>,
    pub when: Option<String>,
    pub cusum_balance: Option<Money>,
    #[serde(rename = "subAccId")]
    pub sub_acc_id: Option<String>,
}

impl CassoTransaction {
    fn into_event(self, received_at: DateTime<Utc>) -> Result<Option<PaymentEvent>, ParseError> {
        let id = self.id.and_then(ExternalId::into_string).ok_or(ParseError::MissingField("id"))?;
        let amount = self.amount.ok_or(ParseError::MissingField("amount"))?;
        if !amount.is_positive() {
            debug!("📥️ Ignoring outgoing Casso transaction {id} ({amount})");
            return Ok(None);
        }
        let memo =
            self.description.filter(|d| !d.trim().is_empty()).ok_or(ParseError::MissingField("description"))?;
        trace!(
            "📥️ Casso transaction {id} (bank ref {}) at {}",
            self.tid.as_deref().unwrap_or("-"),
            self.when.as_deref().unwrap_or("-")
        );
        Ok(Some(PaymentEvent::new(ProviderId::Casso.as_str(), id, amount, memo).received_at(received_at)))
    }
}

impl CassoEnvelope {
    /// A single malformed transaction fails the whole delivery, so that the provider redelivers the batch once it is
    /// fixed. Transactions that were already applied are recognised as duplicates on redelivery.
    pub fn into_events(self, received_at: DateTime<Utc>) -> Result<Vec<PaymentEvent>, ParseError> {
        if let Some(code) = self.error.filter(|c| *c != 0) {
            warn!("📥️ Casso delivered a payload with error code {code}");
        }
        let transactions = match self.data.ok_or(ParseError::MissingField("data"))? {
            CassoData::Many(txs) => txs,
            CassoData::One(tx) => vec![tx],
        };
        let mut events = Vec::with_capacity(transactions.len());
        for tx in transactions {
            if let Some(event) = tx.into_event(received_at)? {
                events.push(event);
            }
        }
        Ok(events)
    }
}

impl ProviderAdapter for CassoAdapter {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Casso
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let token = headers.get(CASSO_TOKEN_HEADER).and_then(|v| v.to_str().ok()).map(|v| {
            strip_auth_scheme(v, "Apikey").or_else(|| strip_auth_scheme(v, "Bearer")).unwrap_or(v)
        });
        verify_credential(token, &self.token)
    }

    fn decode(&self, body: &[u8], _content_type: Option<&str>) -> Result<ProviderPayload, ParseError> {
        let envelope =
            serde_json::from_slice::<CassoEnvelope>(body).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
        Ok(ProviderPayload::Casso(envelope))
    }
}
