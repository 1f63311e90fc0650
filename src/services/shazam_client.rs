//! HTTP client for the external recognition service

use crate::config::ServiceSettings;
use crate::services::fingerprinter::Signature;
use crate::services::recognizer::RecognitionService;
use crate::types::RecognitionPayload;
use crate::{Error, Result};
use serde_json::json;
use std::time::Duration;

const USER_AGENT: &str = "sounddex/0.1.0 (https://github.com/sounddex/sounddex)";

pub struct ShazamClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl ShazamClient {
    pub fn new(settings: &ServiceSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: settings.endpoint.clone(),
        })
    }
}

impl RecognitionService for ShazamClient {
    /// Submit one signature.
    ///
    /// The service contract keeps errors in-band: transport failures and
    /// non-success statuses come back as error payloads, a 429 carries the
    /// rate-limit status code so the engine can cool off.
    async fn recognize(&self, signature: &Signature) -> RecognitionPayload {
        let body = json!({
            "signature": {
                "uri": signature.uri,
                "samplems": signature.sample_ms,
            },
        });

        tracing::debug!(
            offset_seconds = signature.offset_seconds,
            sample_ms = signature.sample_ms,
            "Submitting signature"
        );

        let response = match self.http_client.post(&self.endpoint).json(&body).send().await {
            Ok(response) => response,
            Err(e) => return RecognitionPayload::from_error(format!("request failed: {e}")),
        };

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000);

            let mut payload = RecognitionPayload::from_error("rate limited".to_string());
            payload.status_code = Some(429);
            payload.retry_ms = retry_after_ms;
            return payload;
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let mut payload =
                RecognitionPayload::from_error(format!("service error: {text}"));
            payload.status_code = Some(status.as_u16());
            return payload;
        }

        match response.json::<RecognitionPayload>().await {
            Ok(payload) => payload,
            Err(e) => RecognitionPayload::from_error(format!("parse failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ShazamClient::new(&ServiceSettings::default());
        assert!(client.is_ok());
    }
}
