//! Stripe client reading subscription state.

use crate::error::{DomainErrorKind, Error, ExternalErrorKind};
use crate::gateway::{required_secret, secret_header, Billing, BillingSubscription};
use async_trait::async_trait;
use log::*;
use secrecy::SecretString;
use serde::Deserialize;
use service::config::Config;

#[derive(Debug, Deserialize)]
struct StripeSubscription {
    id: String,
    status: String,
    #[serde(default)]
    current_period_start: Option<i64>,
    #[serde(default)]
    current_period_end: Option<i64>,
}

pub struct StripeClient {
    client: reqwest::Client,
    base_url: String,
}

impl StripeClient {
    pub fn new(secret_key: &SecretString, base_url: &str) -> Result<Self, Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            secret_header("Bearer ", secret_key)?,
        );

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let secret_key = required_secret("Stripe secret key", config.stripe_secret_key())?;
        Self::new(&secret_key, config.stripe_base_url())
    }
}

#[async_trait]
impl Billing for StripeClient {
    async fn get_subscription(&self, subscription_id: &str) -> Result<BillingSubscription, Error> {
        let url = format!("{}/subscriptions/{}", self.base_url, subscription_id);
        debug!("Fetching Stripe subscription {subscription_id}");

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!("Failed to fetch Stripe subscription {subscription_id}: {e:?}");
            Error::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Stripe API: {status} - {error_text}");
            let error_kind = if status.is_client_error() && status.as_u16() != 429 {
                ExternalErrorKind::Rejected(format!("Stripe returned {status}"))
            } else {
                ExternalErrorKind::Other(format!("Stripe returned {status}"))
            };
            return Err(Error {
                source: None,
                error_kind: DomainErrorKind::External(error_kind),
            });
        }

        let subscription: StripeSubscription = response.json().await.map_err(|e| {
            warn!("Failed to parse Stripe subscription: {e:?}");
            Error {
                source: Some(Box::new(e)),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Other(
                    "Invalid response from Stripe".to_string(),
                )),
            }
        })?;

        info!(
            "Stripe subscription {} is {}",
            subscription.id, subscription.status
        );

        Ok(BillingSubscription {
            status: subscription.status,
            current_period_start: subscription.current_period_start,
            current_period_end: subscription.current_period_end,
        })
    }
}
