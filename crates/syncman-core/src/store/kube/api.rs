//! Minimal Kubernetes API client: namespaced get/create/replace/delete, list and
//! line-delimited watch streams.

use std::time::Duration;

use async_stream::try_stream;
use bytes::BytesMut;
use futures::{Stream, StreamExt};
use reqwest::{Certificate, Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::store::{StoreError, StoreResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Server-side watch duration; the client timeout leaves headroom past it.
const WATCH_SECONDS: u64 = 300;
const WATCH_TIMEOUT: Duration = Duration::from_secs(WATCH_SECONDS + 30);

#[derive(Debug, Deserialize)]
pub(super) struct ObjectList {
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default)]
    pub items: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ListMeta {
    #[serde(default)]
    pub resource_version: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct WatchEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub object: Value,
}

#[derive(Debug, Clone)]
pub(super) struct KubeApi {
    http: Client,
    base: Url,
    token: Option<String>,
}

impl KubeApi {
    pub fn new(base: &str, token: Option<String>, ca_pem: Option<&[u8]>) -> StoreResult<Self> {
        let base = Url::parse(base)
            .map_err(|e| StoreError::InvalidConfig(format!("invalid API server {base}: {e}")))?;

        let mut builder = Client::builder();
        if let Some(pem) = ca_pem {
            builder = builder.add_root_certificate(Certificate::from_pem(pem)?);
        }
        Ok(Self { http: builder.build()?, base, token })
    }

    fn request(&self, method: Method, path: &str) -> StoreResult<RequestBuilder> {
        let url = self
            .base
            .join(path)
            .map_err(|e| StoreError::InvalidConfig(format!("invalid API path {path}: {e}")))?;
        let mut builder = self.http.request(method, url).timeout(REQUEST_TIMEOUT);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    fn collection_path(namespace: &str, resource: &str) -> String {
        format!("/api/v1/namespaces/{namespace}/{resource}")
    }

    pub async fn get(&self, namespace: &str, resource: &str, name: &str) -> StoreResult<Option<Value>> {
        let path = format!("{}/{}", Self::collection_path(namespace, resource), name);
        let response = self.request(Method::GET, &path)?.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(ensure_success(response).await?.json().await?))
    }

    pub async fn create(&self, namespace: &str, resource: &str, body: &Value) -> StoreResult<()> {
        let path = Self::collection_path(namespace, resource);
        let response = self.request(Method::POST, &path)?.json(body).send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    pub async fn replace(
        &self,
        namespace: &str,
        resource: &str,
        name: &str,
        body: &Value,
    ) -> StoreResult<()> {
        let path = format!("{}/{}", Self::collection_path(namespace, resource), name);
        let response = self.request(Method::PUT, &path)?.json(body).send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Delete by name; an absent object is not an error.
    pub async fn delete(&self, namespace: &str, resource: &str, name: &str) -> StoreResult<()> {
        let path = format!("{}/{}", Self::collection_path(namespace, resource), name);
        let response = self.request(Method::DELETE, &path)?.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(response).await?;
        Ok(())
    }

    pub async fn list(&self, namespace: &str, resource: &str, selector: &str) -> StoreResult<ObjectList> {
        let response = self
            .request(Method::GET, &Self::collection_path(namespace, resource))?
            .query(&[("labelSelector", selector)])
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    /// Events after `resource_version`, one JSON object per line.
    pub fn watch(
        &self,
        namespace: &str,
        resource: &str,
        selector: &str,
        resource_version: &str,
    ) -> impl Stream<Item = StoreResult<WatchEvent>> + Send + 'static {
        let request = self.request(Method::GET, &Self::collection_path(namespace, resource)).map(|b| {
            b.query(&[
                ("labelSelector", selector),
                ("watch", "true"),
                ("allowWatchBookmarks", "true"),
                ("resourceVersion", resource_version),
                ("timeoutSeconds", WATCH_SECONDS.to_string().as_str()),
            ])
            .timeout(WATCH_TIMEOUT)
        });

        try_stream! {
            let response = ensure_success(request?.send().await?).await?;
            let mut body = response.bytes_stream();
            let mut buffer = BytesMut::new();

            while let Some(chunk) = body.next().await {
                buffer.extend_from_slice(&chunk?);
                while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                    let line = buffer.split_to(newline + 1);
                    let line = &line[..newline];
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    let event: WatchEvent = serde_json::from_slice(line)?;
                    yield event;
                }
            }
        }
    }
}

async fn ensure_success(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::backend(status.as_u16(), body))
}

/// `metadata.resourceVersion` as a number, 0 when absent or opaque.
pub(super) fn resource_version(object: &Value) -> u64 {
    object
        .pointer("/metadata/resourceVersion")
        .and_then(Value::as_str)
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

pub(super) fn object_name(object: &Value) -> Option<&str> {
    object.pointer("/metadata/name").and_then(Value::as_str)
}
