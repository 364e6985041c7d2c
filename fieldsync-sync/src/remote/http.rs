//! HTTP/JSON remote endpoint.
//!
//! Wire format, under `{base_url}/{endpoint}`:
//! - `GET /` lists records (a JSON array, or `{"records": [...]}`)
//! - `GET /{id}` fetches one record
//! - `POST /` with `{"operation": "create" | "update", "data": {...}}`
//! - `DELETE /{id}` removes one record; 404 counts as already gone

use super::RemoteEndpoint;
use crate::config::{EntityConfig, RemoteConfig};
use crate::credentials::CredentialProvider;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use fieldsync_types::{EntityType, Record, RecordId};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Builds the shared HTTP client with the configured request timeout.
pub fn build_client(config: &RemoteConfig) -> SyncResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {e}")))
}

/// Remote endpoint for one entity type, spoken over HTTP.
pub struct HttpRemote {
    entity_type: EntityType,
    url: String,
    client: Client,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpRemote {
    /// Creates an endpoint at `{base_url}/{entity.endpoint}`.
    pub fn new(
        client: Client,
        base_url: &str,
        entity: &EntityConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        let url = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            entity.endpoint.trim_matches('/')
        );
        Self {
            entity_type: entity.entity_type,
            url,
            client,
            credentials,
        }
    }

    /// The collection URL this endpoint talks to.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn record_url(&self, id: &RecordId) -> String {
        format!("{}/{}", self.url, urlencoding::encode(id.as_str()))
    }

    /// Attaches the current bearer token and sends the request.
    async fn send(&self, request: RequestBuilder, what: &str) -> SyncResult<Response> {
        let request = match self.credentials.bearer_token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        request.send().await.map_err(|e| transport_error(what, e))
    }

    async fn post(&self, operation: &str, record: &Record) -> SyncResult<Value> {
        let body = json!({ "operation": operation, "data": record.to_value() });
        let response = self
            .send(self.client.post(&self.url).json(&body), operation)
            .await?;
        let response = check_status(response).await?;
        read_json(response).await
    }
}

#[async_trait]
impl RemoteEndpoint for HttpRemote {
    fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    async fn list(&self) -> SyncResult<Vec<Record>> {
        debug!("GET {}", self.url);
        let response = self.send(self.client.get(&self.url), "list").await?;
        let body = read_json(check_status(response).await?).await?;

        let items = match body {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("records") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(SyncError::InvalidResponse(format!(
                        "{}: expected a record array",
                        self.url
                    )));
                }
            },
            Value::Null => Vec::new(),
            _ => {
                return Err(SyncError::InvalidResponse(format!(
                    "{}: expected a record array",
                    self.url
                )));
            }
        };

        items.into_iter().map(parse_record).collect()
    }

    async fn get(&self, id: &RecordId) -> SyncResult<Record> {
        let url = self.record_url(id);
        debug!("GET {}", url);
        let response = self.send(self.client.get(&url), "get").await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(SyncError::NotFound {
                entity_type: self.entity_type,
                id: id.clone(),
            });
        }
        let body = read_json(check_status(response).await?).await?;
        parse_record(unwrap_record(body))
    }

    async fn create(&self, record: &Record) -> SyncResult<Record> {
        debug!("POST {} create {}", self.url, record.id);
        let body = self.post("create", record).await?;

        let Value::Object(mut map) = body else {
            return Err(SyncError::InvalidResponse(
                "create response is not an object".to_string(),
            ));
        };
        let server_id = match map.remove("id") {
            Some(Value::String(s)) if !s.is_empty() => RecordId::new(s),
            Some(Value::Number(n)) => RecordId::new(n.to_string()),
            _ => {
                return Err(SyncError::InvalidResponse(
                    "create response carries no id".to_string(),
                ));
            }
        };

        let returned = map.remove("record").or_else(|| map.remove("data"));
        match returned {
            Some(Value::Object(mut fields)) => {
                fields.insert("id".to_string(), Value::String(server_id.to_string()));
                parse_record(Value::Object(fields))
            }
            _ => Ok(record.clone().with_id(server_id)),
        }
    }

    async fn update(&self, record: &Record) -> SyncResult<Record> {
        debug!("POST {} update {}", self.url, record.id);
        let body = self.post("update", record).await?;
        match unwrap_record(body) {
            Value::Object(map) if map.contains_key("id") => parse_record(Value::Object(map)),
            _ => Ok(record.clone()),
        }
    }

    async fn delete(&self, id: &RecordId) -> SyncResult<()> {
        let url = self.record_url(id);
        debug!("DELETE {}", url);
        let response = self.send(self.client.delete(&url), "delete").await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("{} already absent remotely", id);
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }
}

/// Maps a failed send to a sync error.
fn transport_error(what: &str, e: reqwest::Error) -> SyncError {
    if e.is_builder() {
        SyncError::Config(format!("{what}: {e}"))
    } else {
        SyncError::NetworkUnreachable(format!("{what}: {e}"))
    }
}

/// Passes 2xx responses through and maps everything else to an error.
async fn check_status(response: Response) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED => SyncError::RemoteUnauthorized(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            SyncError::ValidationFailed(message)
        }
        other => SyncError::RemoteRequestFailed {
            status: other.as_u16(),
            message,
        },
    })
}

/// Reads a JSON body; an empty body reads as `null`.
async fn read_json(response: Response) -> SyncResult<Value> {
    let text = response
        .text()
        .await
        .map_err(|e| SyncError::NetworkUnreachable(format!("failed to read response: {e}")))?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text)
        .map_err(|e| SyncError::InvalidResponse(format!("malformed JSON: {e}")))
}

/// Unwraps `{"record": {...}}` envelopes.
fn unwrap_record(body: Value) -> Value {
    match body {
        Value::Object(mut map) if matches!(map.get("record"), Some(Value::Object(_))) => {
            map.remove("record").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn parse_record(value: Value) -> SyncResult<Record> {
    Record::from_value(value).map_err(|e| SyncError::InvalidResponse(e.to_string()))
}
