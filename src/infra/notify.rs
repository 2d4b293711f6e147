//! HTTP delivery of evaluation callbacks.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::application::repos::{DeliveryError, EvaluationSink};
use crate::domain::publish::EvaluationPayload;
use crate::infra::error::InfraError;

#[derive(Clone)]
pub struct HttpEvaluationSink {
    client: Client,
}

impl HttpEvaluationSink {
    pub fn new(timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(concat!("pagesmith/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl EvaluationSink for HttpEvaluationSink {
    async fn deliver(&self, url: &Url, payload: &EvaluationPayload) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(url.clone())
            .json(&payload.to_body())
            .send()
            .await
            .map_err(|err| DeliveryError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
