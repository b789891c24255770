//! HTTP implementation of [`ResourceClient`] against an IAM admin REST API.
//!
//! Transient failures (connect errors, HTTP 5xx) are retried here with
//! exponential backoff so the engine above only ever sees a final outcome.
//! Authentication is a pre-acquired bearer token; the token handshake is the
//! caller's concern.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use realmsync_core::{KindRegistry, LiveResource, ResourceConfig};

use crate::error::{ClientError, Result};
use crate::traits::ResourceClient;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(250);

/// Internal-id field name used by the admin API in resource reads.
const INTERNAL_ID_FIELD: &str = "id";

pub struct HttpResourceClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    registry: Arc<KindRegistry>,
    max_retries: u32,
    base_backoff: Duration,
}

impl HttpResourceClient {
    pub fn new(base_url: &str, token: Option<String>, registry: Arc<KindRegistry>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            registry,
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff: DEFAULT_BASE_BACKOFF,
        }
    }

    pub fn with_retries(mut self, max_retries: u32, base_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_backoff = base_backoff;
        self
    }

    fn admin_url(&self, path: &str) -> String {
        format!("{}/admin/realms/{}", self.base_url, path)
    }

    fn kind_url(&self, realm: &str, kind: &str) -> Result<String> {
        let descriptor = self
            .registry
            .get(kind)
            .ok_or_else(|| ClientError::not_found(format!("resource kind {kind}")))?;
        Ok(self.admin_url(&format!("{realm}/{}", descriptor.api_path)))
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req.header("Accept", "application/json")
    }

    /// Sends a request, retrying transient failures with exponential
    /// backoff. The request must be cloneable (JSON bodies are).
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let mut attempt = 0u32;
        loop {
            let this_try = req
                .try_clone()
                .ok_or_else(|| ClientError::unavailable("request body not retryable"))?;
            let outcome = this_try.send().await;

            let transient = match &outcome {
                Err(e) => e.is_connect() || e.is_timeout(),
                Ok(resp) => resp.status().is_server_error(),
            };

            if transient && attempt < self.max_retries {
                let backoff = self.base_backoff * 2u32.saturating_pow(attempt);
                attempt += 1;
                warn!(attempt, backoff_ms = backoff.as_millis() as u64, "transient failure, retrying");
                tokio::time::sleep(backoff).await;
                continue;
            }

            return match outcome {
                Err(e) => Err(ClientError::unavailable(e.to_string())),
                Ok(resp) if resp.status().is_server_error() => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    Err(ClientError::unavailable(format!("HTTP {status}: {body}")))
                }
                Ok(resp) => Ok(resp),
            };
        }
    }

    async fn expect_success(&self, resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND {
            Err(ClientError::not_found(body))
        } else {
            Err(ClientError::api(status.as_u16(), body))
        }
    }

    fn to_live_resource(&self, kind: &str, mut value: Value) -> Result<LiveResource> {
        let descriptor = self
            .registry
            .get(kind)
            .ok_or_else(|| ClientError::not_found(format!("resource kind {kind}")))?;
        let object = value
            .as_object_mut()
            .ok_or_else(|| ClientError::api(0, format!("{kind} entry is not an object")))?;

        let internal_id = object
            .get(INTERNAL_ID_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let identity = object
            .get(&descriptor.identity_field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        object.remove(INTERNAL_ID_FIELD);
        let mut live = LiveResource::new(internal_id, identity);
        for (name, field) in object.iter() {
            live.fields.insert(name.clone(), field.clone());
        }
        Ok(live)
    }
}

#[async_trait]
impl ResourceClient for HttpResourceClient {
    async fn get_realm(&self, realm: &str) -> Result<Option<IndexMap<String, Value>>> {
        let url = self.admin_url(realm);
        let resp = self.send(self.request(reqwest::Method::GET, &url)).await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = self.expect_success(resp).await?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ClientError::unavailable(e.to_string()))?;
        let object = body
            .as_object()
            .ok_or_else(|| ClientError::api(0, "realm representation is not an object"))?;
        Ok(Some(
            object.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        ))
    }

    async fn create_realm(&self, realm: &str, attributes: &IndexMap<String, Value>) -> Result<()> {
        let mut body = serde_json::Map::new();
        body.insert("realm".to_string(), Value::String(realm.to_string()));
        for (name, value) in attributes {
            body.insert(name.clone(), value.clone());
        }
        let url = format!("{}/admin/realms", self.base_url);
        debug!(realm, "creating realm");
        let resp = self
            .send(
                self.request(reqwest::Method::POST, &url)
                    .json(&Value::Object(body)),
            )
            .await?;
        self.expect_success(resp).await?;
        Ok(())
    }

    async fn update_realm(&self, realm: &str, changes: &IndexMap<String, Value>) -> Result<()> {
        let url = self.admin_url(realm);
        debug!(realm, fields = changes.len(), "updating realm");
        let resp = self
            .send(self.request(reqwest::Method::PUT, &url).json(changes))
            .await?;
        self.expect_success(resp).await?;
        Ok(())
    }

    async fn delete_realm(&self, realm: &str) -> Result<()> {
        let url = self.admin_url(realm);
        let resp = self.send(self.request(reqwest::Method::DELETE, &url)).await?;
        self.expect_success(resp).await?;
        Ok(())
    }

    async fn list(&self, realm: &str, kind: &str) -> Result<Vec<LiveResource>> {
        let url = self.kind_url(realm, kind)?;
        let resp = self.send(self.request(reqwest::Method::GET, &url)).await?;
        let resp = self.expect_success(resp).await?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ClientError::unavailable(e.to_string()))?;
        let items = body
            .as_array()
            .ok_or_else(|| ClientError::api(0, format!("{kind} listing is not an array")))?;
        items
            .iter()
            .map(|item| self.to_live_resource(kind, item.clone()))
            .collect()
    }

    async fn create(&self, realm: &str, kind: &str, resource: &ResourceConfig) -> Result<String> {
        let url = self.kind_url(realm, kind)?;
        debug!(realm, kind, identity = %resource.identity, "creating resource");
        let resp = self
            .send(self.request(reqwest::Method::POST, &url).json(&resource.fields))
            .await?;
        let resp = self.expect_success(resp).await?;

        // The admin API reports the new internal id via the Location header;
        // fall back to re-listing when it is absent.
        if let Some(location) = resp.headers().get(reqwest::header::LOCATION)
            && let Ok(location) = location.to_str()
            && let Some(id) = location.rsplit('/').next()
            && !id.is_empty()
        {
            return Ok(id.to_string());
        }
        self.list(realm, kind)
            .await?
            .into_iter()
            .find(|live| live.identity == resource.identity)
            .map(|live| live.internal_id)
            .ok_or_else(|| {
                ClientError::not_found(format!("{kind}/{} after create", resource.identity))
            })
    }

    async fn update(
        &self,
        realm: &str,
        kind: &str,
        internal_id: &str,
        changes: &IndexMap<String, Value>,
    ) -> Result<()> {
        let url = format!("{}/{internal_id}", self.kind_url(realm, kind)?);
        debug!(realm, kind, internal_id, fields = changes.len(), "updating resource");
        let resp = self
            .send(self.request(reqwest::Method::PUT, &url).json(changes))
            .await?;
        self.expect_success(resp).await?;
        Ok(())
    }

    async fn delete(&self, realm: &str, kind: &str, internal_id: &str) -> Result<()> {
        let url = format!("{}/{internal_id}", self.kind_url(realm, kind)?);
        debug!(realm, kind, internal_id, "deleting resource");
        let resp = self.send(self.request(reqwest::Method::DELETE, &url)).await?;
        self.expect_success(resp).await?;
        Ok(())
    }

    async fn read_write_only_field(
        &self,
        realm: &str,
        kind: &str,
        internal_id: &str,
        field: &str,
    ) -> Result<Option<Value>> {
        let descriptor = self
            .registry
            .get(kind)
            .ok_or_else(|| ClientError::not_found(format!("resource kind {kind}")))?;
        let Some(template) = &descriptor.write_only_read_path else {
            return Err(ClientError::unsupported(kind, field));
        };
        let path = template.replace("{id}", internal_id);
        let url = self.admin_url(&format!("{realm}/{path}"));
        let resp = self.send(self.request(reqwest::Method::GET, &url)).await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = self.expect_success(resp).await?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ClientError::unavailable(e.to_string()))?;

        // Credential endpoints wrap the secret as {"type": ..., "value": ...}.
        match body {
            Value::Object(ref object) if object.contains_key("value") => {
                Ok(object.get("value").cloned())
            }
            Value::Null => Ok(None),
            other => Ok(Some(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> HttpResourceClient {
        HttpResourceClient::new(
            "https://iam.example.com/",
            Some("token".to_string()),
            Arc::new(KindRegistry::builtin()),
        )
    }

    #[test]
    fn test_url_building() {
        let client = client();
        assert_eq!(
            client.admin_url("acme"),
            "https://iam.example.com/admin/realms/acme"
        );
        assert_eq!(
            client.kind_url("acme", "clients").unwrap(),
            "https://iam.example.com/admin/realms/acme/clients"
        );
        assert_eq!(
            client.kind_url("acme", "identityProviders").unwrap(),
            "https://iam.example.com/admin/realms/acme/identity-provider/instances"
        );
        assert!(client.kind_url("acme", "widgets").is_err());
    }

    #[test]
    fn test_to_live_resource_extracts_ids() {
        let client = client();
        let live = client
            .to_live_resource(
                "clients",
                json!({
                    "id": "uuid-1",
                    "clientId": "web-app",
                    "enabled": true
                }),
            )
            .unwrap();

        assert_eq!(live.internal_id, "uuid-1");
        assert_eq!(live.identity, "web-app");
        assert_eq!(live.fields["enabled"], json!(true));
        // The internal id is carried separately, not as a field.
        assert!(live.fields.get("id").is_none());
    }

    #[test]
    fn test_to_live_resource_rejects_non_object() {
        let client = client();
        assert!(client.to_live_resource("clients", json!([1, 2])).is_err());
    }
}
