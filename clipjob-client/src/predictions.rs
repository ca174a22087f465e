//! Prediction API endpoints

use crate::ProviderClient;
use crate::error::{ClientError, Result};
use crate::prediction::{CreatePrediction, Prediction, extract_detail};
use clipjob_core::domain::job::{InputParams, ensure_flat};
use reqwest::StatusCode;
use tracing::debug;

impl ProviderClient {
    // =============================================================================
    // Prediction Lifecycle
    // =============================================================================

    /// Create a prediction
    ///
    /// A model reference carrying a version (`owner/name:version`) goes to
    /// `POST /predictions`; anything else goes to the model's own endpoint,
    /// `POST /models/{owner}/{name}/predictions`.
    ///
    /// # Errors
    /// * [`ClientError::Billing`] when the provider answers 402
    /// * [`ClientError::Submission`] for any other non-2xx answer
    pub async fn create_prediction(&self, model: &str, input: &InputParams) -> Result<Prediction> {
        ensure_flat(input).map_err(|e| ClientError::InvalidInput(e.to_string()))?;

        let (url, body) = if model.contains(':') {
            (
                format!("{}/predictions", self.base_url),
                CreatePrediction {
                    version: Some(model),
                    input,
                },
            )
        } else {
            (
                format!("{}/models/{}/predictions", self.base_url, model),
                CreatePrediction {
                    version: None,
                    input,
                },
            )
        };

        debug!("Creating prediction for {} via {}", model, url);
        let response = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::PAYMENT_REQUIRED {
            let text = Self::body_text(response).await;
            let detail = extract_detail(&text).unwrap_or(text);
            return Err(ClientError::Billing { detail });
        }
        if !status.is_success() {
            return Err(ClientError::Submission {
                status: status.as_u16(),
                message: Self::body_text(response).await,
            });
        }

        Self::parse_json(response).await
    }

    /// Get the current state of a prediction
    pub async fn get_prediction(&self, remote_id: &str) -> Result<Prediction> {
        let url = format!("{}/predictions/{}", self.base_url, remote_id);
        let response = self.authorized(self.client.get(&url)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::remote(
                status.as_u16(),
                Self::body_text(response).await,
            ));
        }

        Self::parse_json(response).await
    }

    /// Ask the provider to cancel a prediction
    ///
    /// A 409 means the prediction already settled; that is not an error.
    pub async fn cancel_prediction(&self, remote_id: &str) -> Result<()> {
        let url = format!("{}/predictions/{}/cancel", self.base_url, remote_id);
        let response = self.authorized(self.client.post(&url)).send().await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::CONFLICT {
            return Ok(());
        }

        Err(ClientError::remote(
            status.as_u16(),
            Self::body_text(response).await,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipjob_core::domain::outcome::{PollOutcome, ProviderStatus};
    use mockito::Matcher;
    use serde_json::json;

    fn input() -> InputParams {
        json!({ "prompt": "a cat", "resolution": "480p" })
            .as_object()
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_uses_model_endpoint_without_version() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/wan-video/wan-2.2-t2v-fast/predictions")
            .match_header("authorization", "Bearer token")
            .match_body(Matcher::Json(json!({
                "input": { "prompt": "a cat", "resolution": "480p" }
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"pred-1","status":"starting"}"#)
            .create_async()
            .await;

        let client = ProviderClient::new(server.url(), "token");
        let prediction = client
            .create_prediction("wan-video/wan-2.2-t2v-fast", &input())
            .await
            .unwrap();

        assert_eq!(prediction.id, "pred-1");
        assert_eq!(prediction.status, ProviderStatus::Starting);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_uses_versioned_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/predictions")
            .match_body(Matcher::PartialJson(json!({ "version": "owner/model:abc123" })))
            .with_status(200)
            .with_body(r#"{"id":"pred-2","status":"processing"}"#)
            .create_async()
            .await;

        let client = ProviderClient::new(server.url(), "token");
        let prediction = client
            .create_prediction("owner/model:abc123", &input())
            .await
            .unwrap();

        assert_eq!(prediction.id, "pred-2");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_payment_required_is_billing_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/models/owner/model/predictions")
            .with_status(402)
            .with_body(r#"{"title":"Payment Required","detail":"You have insufficient credit"}"#)
            .create_async()
            .await;

        let client = ProviderClient::new(server.url(), "token");
        let err = client
            .create_prediction("owner/model", &input())
            .await
            .unwrap_err();

        match err {
            ClientError::Billing { detail } => assert_eq!(detail, "You have insufficient credit"),
            other => panic!("expected billing error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejected_submission_keeps_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/models/owner/model/predictions")
            .with_status(422)
            .with_body("invalid input")
            .create_async()
            .await;

        let client = ProviderClient::new(server.url(), "token");
        let err = client
            .create_prediction("owner/model", &input())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::Submission { status: 422, ref message } if message == "invalid input"
        ));
    }

    #[tokio::test]
    async fn test_nested_input_never_reaches_the_wire() {
        let server = mockito::Server::new_async().await;
        let client = ProviderClient::new(server.url(), "token");
        let nested = json!({ "frames": [1, 2] }).as_object().cloned().unwrap();

        let err = client
            .create_prediction("owner/model", &nested)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_get_prediction_failed_with_nested_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/predictions/pred-1")
            .with_status(200)
            .with_body(r#"{"id":"pred-1","status":"failed","error":{"message":"NSFW content"}}"#)
            .create_async()
            .await;

        let client = ProviderClient::new(server.url(), "token");
        let prediction = client.get_prediction("pred-1").await.unwrap();

        assert_eq!(
            prediction.into_outcome(),
            PollOutcome::Failed {
                reason: "NSFW content".into()
            }
        );
    }

    #[tokio::test]
    async fn test_get_prediction_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/predictions/missing")
            .with_status(404)
            .with_body(r#"{"detail":"Not found."}"#)
            .create_async()
            .await;

        let client = ProviderClient::new(server.url(), "token");
        let err = client.get_prediction("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_cancel_accepts_conflict() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/predictions/pred-1/cancel")
            .with_status(409)
            .create_async()
            .await;
        server
            .mock("POST", "/predictions/pred-2/cancel")
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;

        let client = ProviderClient::new(server.url(), "token");
        assert!(client.cancel_prediction("pred-1").await.is_ok());
        assert!(matches!(
            client.cancel_prediction("pred-2").await.unwrap_err(),
            ClientError::Remote { status: 401, .. }
        ));
    }
}
