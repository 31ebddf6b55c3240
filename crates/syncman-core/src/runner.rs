//! HTTP client for the workload runner.
//!
//! The runner provisions per-project infrastructure. The manager calls it when a
//! project is created and when one is deleted.

use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("runner returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid runner address {addr}: {message}")]
    Address { addr: String, message: String },
}

#[derive(Debug, Clone)]
pub struct RunnerClient {
    http: Client,
    base: Url,
}

impl RunnerClient {
    /// `addr` may be `host:port` or a full URL.
    pub fn new(addr: &str) -> Result<Self, RunnerError> {
        let with_scheme = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("http://{addr}")
        };
        let base = Url::parse(&with_scheme)
            .map_err(|e| RunnerError::Address { addr: addr.to_string(), message: e.to_string() })?;

        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, RunnerError> {
        self.base.join(path).map_err(|e| RunnerError::Address {
            addr: self.base.to_string(),
            message: e.to_string(),
        })
    }

    /// Provision infrastructure for a new project.
    pub async fn create_project(&self, project_id: &str, token: &str) -> Result<(), RunnerError> {
        let url = self.endpoint(&format!("/v1/runner/project/{project_id}"))?;
        debug!(%url, "creating project on runner");

        let response =
            self.http.post(url).bearer_auth(token).json(&json!({ "id": project_id })).send().await?;
        check_status(response).await?;

        info!(project = %project_id, "runner provisioned project");
        Ok(())
    }

    /// Tear down a project's infrastructure.
    pub async fn delete_project(&self, project_id: &str, token: &str) -> Result<(), RunnerError> {
        let url = self.endpoint(&format!("/v1/runner/{project_id}"))?;
        debug!(%url, "deleting project on runner");

        let response = self.http.delete(url).bearer_auth(token).send().await?;
        check_status(response).await?;

        info!(project = %project_id, "runner removed project");
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<(), RunnerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(RunnerError::Status { status: status.as_u16(), body })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_address_without_scheme_gets_http() {
        let client = RunnerClient::new("runner.space-cloud.svc:4050").unwrap();
        assert_eq!(client.base_url().as_str(), "http://runner.space-cloud.svc:4050/");
    }

    #[tokio::test]
    async fn test_create_project_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/runner/project/todo"))
            .and(header("authorization", "Bearer internal-token"))
            .and(body_json(serde_json::json!({ "id": "todo" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = RunnerClient::new(&server.uri()).unwrap();
        client.create_project("todo", "internal-token").await.unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/runner/todo"))
            .respond_with(ResponseTemplate::new(500).set_body_string("quota store down"))
            .mount(&server)
            .await;

        let client = RunnerClient::new(&server.uri()).unwrap();
        let err = client.delete_project("todo", "t").await.unwrap_err();
        match err {
            RunnerError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "quota store down");
            },
            other => panic!("unexpected error: {other}"),
        }
    }
}
