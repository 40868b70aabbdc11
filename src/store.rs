//! Remote store client - collections, requests and environments over REST
//!
//! Every call carries the user's bearer token. Responses are wrapped as
//! `{ "data": ... }`.

use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Collection, Environment, Request, Variable};
use crate::network::client::create_client;

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Client for the backend's entity endpoints
#[derive(Clone, Debug)]
pub struct RemoteStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl RemoteStore {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Self {
        RemoteStore {
            client: create_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        RemoteStore::new(
            &config.api_url,
            config.token.clone().unwrap_or_default(),
            config.request_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn call<B, T>(&self, method: Method, path: &str, body: Option<&B>, failure: &str) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut builder = self
            .client
            .request(method.clone(), self.url(path))
            .bearer_auth(&self.token);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(%method, path, error = %e, "Store request failed");
            Error::store(format!("{}: {}", failure, e))
        })?;

        if !response.status().is_success() {
            tracing::warn!(%method, path, status = response.status().as_u16(), "Store rejected request");
            return Err(Error::store(failure));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::store(format!("{}: {}", failure, e)))?;
        Ok(envelope.data)
    }

    async fn delete(&self, path: &str, failure: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::store(format!("{}: {}", failure, e)))?;
        if !response.status().is_success() {
            return Err(Error::store(failure));
        }
        Ok(())
    }

    // ========================
    // Collections
    // ========================

    pub async fn list_collections(&self) -> Result<Vec<Collection>> {
        self.call::<(), _>(Method::GET, "collections", None, "Failed to fetch collections")
            .await
    }

    pub async fn create_collection(
        &self,
        name: &str,
        requests: &[Request],
        variables: &[Variable],
    ) -> Result<Collection> {
        let body = json!({ "name": name, "requests": requests, "variables": variables });
        self.call(Method::POST, "collections", Some(&body), "Failed to create collection")
            .await
    }

    pub async fn update_collection(
        &self,
        id: &str,
        name: Option<&str>,
        variables: Option<&[Variable]>,
    ) -> Result<Collection> {
        let body = json!({ "name": name, "variables": variables });
        self.call(
            Method::PATCH,
            &format!("collections/{}", id),
            Some(&body),
            "Failed to update collection",
        )
        .await
    }

    pub async fn delete_collection(&self, id: &str) -> Result<()> {
        self.delete(&format!("collections/{}", id), "Failed to delete collection")
            .await
    }

    // ========================
    // Requests
    // ========================

    /// Requests that belong to no collection
    pub async fn list_requests(&self) -> Result<Vec<Request>> {
        self.call::<(), _>(Method::GET, "requests", None, "Failed to fetch requests")
            .await
    }

    pub async fn create_request(&self, request: &Request) -> Result<Request> {
        self.call(Method::POST, "requests", Some(request), "Failed to create request")
            .await
    }

    pub async fn update_request(&self, request: &Request) -> Result<Request> {
        self.call(
            Method::PATCH,
            &format!("requests/{}", request.id),
            Some(request),
            "Failed to update request",
        )
        .await
    }

    pub async fn delete_request(&self, id: &str) -> Result<()> {
        self.delete(&format!("requests/{}", id), "Failed to delete request")
            .await
    }

    // ========================
    // Environments
    // ========================

    pub async fn list_environments(&self) -> Result<Vec<Environment>> {
        self.call::<(), _>(Method::GET, "environments", None, "Failed to fetch environments")
            .await
    }

    pub async fn create_environment(&self, name: &str) -> Result<Environment> {
        let body = json!({ "name": name, "variables": [] });
        self.call(Method::POST, "environments", Some(&body), "Failed to create environment")
            .await
    }

    pub async fn update_environment(
        &self,
        id: &str,
        name: Option<&str>,
        variables: Option<&[Variable]>,
    ) -> Result<Environment> {
        let body = json!({ "name": name, "variables": variables });
        self.call(
            Method::PATCH,
            &format!("environments/{}", id),
            Some(&body),
            "Failed to update environment",
        )
        .await
    }

    pub async fn delete_environment(&self, id: &str) -> Result<()> {
        self.delete(&format!("environments/{}", id), "Failed to delete environment")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_list_collections_sends_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/collections"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{
                    "id": 1,
                    "name": "API",
                    "requests": [{"id": 10, "name": "ping", "url": "https://x.test"}],
                    "variables": [{"key": "h", "value": "c"}]
                }]
            })))
            .mount(&server)
            .await;

        let store = RemoteStore::new(format!("{}/api/", server.uri()), "secret", TIMEOUT);
        let collections = store.list_collections().await.unwrap();
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].id, "1");
        assert_eq!(collections[0].requests[0].id, "10");
        assert!(collections[0].folders.is_empty());
    }

    #[tokio::test]
    async fn test_update_request_patches_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/requests/r1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"id": "r1", "name": "saved", "url": "https://x.test"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = RemoteStore::new(server.uri(), "t", TIMEOUT);
        let saved = store.update_request(&Request::new("r1", "saved")).await.unwrap();
        assert_eq!(saved.name, "saved");
    }

    #[tokio::test]
    async fn test_rejection_maps_to_store_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/environments/e1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = RemoteStore::new(server.uri(), "t", TIMEOUT);
        let err = store.delete_environment("e1").await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to delete environment");
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/environments"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": []}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let store = RemoteStore::new(server.uri(), "t", Duration::from_millis(200));
        let err = store.list_environments().await.unwrap_err();
        assert!(matches!(err, Error::Store { .. }), "{err:?}");
    }

    #[test]
    fn test_from_config_keeps_base_and_token() {
        let config = Config {
            api_url: "https://backend.test/api/".into(),
            token: Some("abc".into()),
            ..Config::default()
        };
        let store = RemoteStore::from_config(&config);
        assert_eq!(store.base_url(), "https://backend.test/api");
        assert_eq!(store.token(), "abc");
    }
}
