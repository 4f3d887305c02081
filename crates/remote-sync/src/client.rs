//! HTTP client for the remote audit service REST API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;

use auditdesk_core::sync::{
    EntityType, RemoteEntityRecord, RemoteTransport, TransportError, TransportResult,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};

const MAX_LOG_BODY_CHARS: usize = 512;

/// Structured error body returned by the audit service.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    code: String,
    message: String,
}

fn transport_error(err: reqwest::Error) -> TransportError {
    if err.is_decode() {
        TransportError::Decode(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}

/// Builds the transport error for a non-success response, preferring the
/// service's structured error body when it parses.
fn api_error_from_body(status: u16, body: &str) -> TransportError {
    if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(body) {
        return TransportError::api(status, format!("{}: {}", error.code, error.message));
    }
    TransportError::api(status, format!("Request failed: {}", body))
}

/// Lifts one pull row out of the wire shape. The service returns a list of
/// bare entity documents; each carries its own `id` and server-side
/// `updated_at` rather than wrapping them in an envelope.
fn remote_record_from_payload(value: serde_json::Value) -> TransportResult<RemoteEntityRecord> {
    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| TransportError::Decode("pull row is missing an 'id' field".to_string()))?
        .to_string();

    let updated_at = match value.get("updated_at").or_else(|| value.get("updatedAt")) {
        Some(serde_json::Value::String(raw)) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| {
                    TransportError::Decode(format!(
                        "invalid 'updated_at' in pull row '{}': {}",
                        id, e
                    ))
                })?,
        ),
        _ => None,
    };

    Ok(RemoteEntityRecord {
        id,
        updated_at,
        payload: value,
    })
}

/// Client for the remote audit service.
///
/// One method per remote call shape; all requests carry a bearer token and
/// a bounded timeout so a hung server can never wedge a sync cycle.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn headers(&self, token: &str) -> TransportResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| TransportError::Auth("invalid access token format".to_string()))?;
        headers.insert(AUTHORIZATION, auth_value);

        Ok(headers)
    }

    fn collection_url(&self, entity_type: EntityType) -> String {
        format!("{}/{}", self.base_url, entity_type.as_str())
    }

    fn item_url(&self, entity_type: EntityType, entity_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, entity_type.as_str(), entity_id)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    async fn check_response(response: reqwest::Response) -> TransportResult<()> {
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(api_error_from_body(status.as_u16(), &body));
        }
        Ok(())
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> TransportResult<T> {
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(api_error_from_body(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!(
                "Failed to deserialize response. Body: {}, Error: {}",
                body,
                e
            );
            TransportError::Decode(format!("Failed to parse response: {}", e))
        })
    }
}

#[async_trait]
impl RemoteTransport for RemoteClient {
    async fn push_create(
        &self,
        token: &str,
        entity_type: EntityType,
        payload: &serde_json::Value,
    ) -> TransportResult<()> {
        let response = self
            .client
            .post(self.collection_url(entity_type))
            .headers(self.headers(token)?)
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;
        Self::check_response(response).await
    }

    async fn push_update(
        &self,
        token: &str,
        entity_type: EntityType,
        entity_id: &str,
        payload: &serde_json::Value,
    ) -> TransportResult<()> {
        let response = self
            .client
            .put(self.item_url(entity_type, entity_id))
            .headers(self.headers(token)?)
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;
        Self::check_response(response).await
    }

    async fn push_delete(
        &self,
        token: &str,
        entity_type: EntityType,
        entity_id: &str,
    ) -> TransportResult<()> {
        let response = self
            .client
            .delete(self.item_url(entity_type, entity_id))
            .headers(self.headers(token)?)
            .send()
            .await
            .map_err(transport_error)?;
        Self::check_response(response).await
    }

    async fn pull_updated_since(
        &self,
        token: &str,
        entity_type: EntityType,
        updated_since: Option<DateTime<Utc>>,
    ) -> TransportResult<Vec<RemoteEntityRecord>> {
        let mut request = self
            .client
            .get(self.collection_url(entity_type))
            .headers(self.headers(token)?);
        if let Some(watermark) = updated_since {
            request = request.query(&[("updated_since", watermark.to_rfc3339())]);
        }

        let response = request.send().await.map_err(transport_error)?;
        let rows: Vec<serde_json::Value> = Self::parse_response(response).await?;
        rows.into_iter().map(remote_record_from_payload).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_built_from_entity_type_and_id() {
        let client = RemoteClient::new("https://api.auditdesk.app/v1/");
        assert_eq!(
            client.collection_url(EntityType::Engagement),
            "https://api.auditdesk.app/v1/engagement"
        );
        assert_eq!(
            client.item_url(EntityType::TrialBalance, "tb-42"),
            "https://api.auditdesk.app/v1/trial_balance/tb-42"
        );
    }

    #[test]
    fn structured_error_body_is_surfaced() {
        let err = api_error_from_body(422, r#"{"code":"INVALID_PAYLOAD","message":"bad mapping"}"#);
        match err {
            TransportError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "INVALID_PAYLOAD: bad mapping");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unstructured_error_body_falls_back_to_raw_text() {
        let err = api_error_from_body(500, "Internal Server Error");
        match err {
            TransportError::Api { status, message } => {
                assert_eq!(status, 500);
                assert!(message.contains("Internal Server Error"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn pull_rows_are_bare_documents_carrying_their_own_id() {
        let body = r#"[{"id":"org1","name":"Acme Holdings","updated_at":"2026-08-29T10:00:00Z"}]"#;
        let rows: Vec<serde_json::Value> = serde_json::from_str(body).expect("decode body");
        let records = rows
            .into_iter()
            .map(remote_record_from_payload)
            .collect::<TransportResult<Vec<_>>>()
            .expect("lift pull rows");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "org1");
        assert_eq!(
            records[0].updated_at.map(|t| t.to_rfc3339()),
            Some("2026-08-29T10:00:00+00:00".to_string())
        );
        // The full document stays available as the payload.
        assert_eq!(records[0].payload["name"], serde_json::json!("Acme Holdings"));
        assert_eq!(records[0].payload["id"], serde_json::json!("org1"));
    }

    #[test]
    fn pull_row_without_id_is_a_decode_error() {
        let err = remote_record_from_payload(serde_json::json!({"name": "orphan"}))
            .expect_err("missing id must fail");
        assert!(matches!(err, TransportError::Decode(_)));
    }

    #[test]
    fn pull_row_without_server_timestamp_yields_none() {
        let record = remote_record_from_payload(serde_json::json!({"id": "m1", "account": "1000"}))
            .expect("lift row");
        assert_eq!(record.updated_at, None);
    }

    #[test]
    fn invalid_token_is_rejected_before_the_request_is_sent() {
        let client = RemoteClient::new("https://api.auditdesk.app");
        assert!(matches!(
            client.headers("bad\ntoken"),
            Err(TransportError::Auth(_))
        ));
    }
}
