//! Subscription manager (C8): creates, renews, and deletes the NSP
//! notification subscription that determines which bus topic carries fault
//! events.

use crate::error::{Error, Result};
use crate::session::Session;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    pub subscription_id: String,
    pub topic_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    response: CreateResponseBody,
}

#[derive(Debug, Deserialize)]
struct CreateResponseBody {
    data: CreateResponseData,
}

#[derive(Debug, Deserialize)]
struct CreateResponseData {
    #[serde(rename = "subscriptionId")]
    subscription_id: String,
    #[serde(rename = "topicId")]
    topic_id: String,
}

pub struct SubscriptionManager {
    client: Client,
    base_url: String,
}

impl SubscriptionManager {
    pub fn new(host: &str, http_timeout_secs: u64, verify_ssl: bool) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!verify_ssl)
            .timeout(std::time::Duration::from_secs(http_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: format!(
                "https://{host}:8443/nbi-notification/api/v1/notifications/subscriptions"
            ),
        })
    }

    pub async fn create(&self, session: &Session) -> Result<SubscriptionHandle> {
        let token = session.current_token().await?;
        let resp = self
            .client
            .post(&self.base_url)
            .bearer_auth(token)
            .json(&json!({"categories": [{"name": "NSP-FAULT"}]}))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::subscription(e.to_string()))?;

        let parsed: CreateResponse = resp.json().await?;
        Ok(SubscriptionHandle {
            subscription_id: parsed.response.data.subscription_id,
            topic_id: parsed.response.data.topic_id,
        })
    }

    pub async fn renew(&self, session: &Session, subscription_id: &str) -> Result<()> {
        let token = session.current_token().await?;
        self.client
            .post(format!("{}/{subscription_id}/renewals", self.base_url))
            .bearer_auth(token)
            .json(&json!({}))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::subscription(e.to_string()))?;
        Ok(())
    }

    pub async fn delete(&self, session: &Session, subscription_id: &str) -> Result<()> {
        let token = session.current_token().await?;
        self.client
            .delete(format!("{}/{subscription_id}", self.base_url))
            .bearer_auth(token)
            .json(&json!({}))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::subscription(e.to_string()))?;
        Ok(())
    }
}
