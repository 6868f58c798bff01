//! Hetzner Cloud API client
//!
//! Direct REST implementation using Bearer token authentication.

use std::time::Duration;

use hconnect_cloud::{Action, ActionReporter, CloudError, action_outcome};
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{HetznerError, Result};
use crate::schema::{ActionResponse, ErrorResponse, ServersResponse};

pub const DEFAULT_ENDPOINT: &str = "https://api.hetzner.cloud/v1";

const TOKEN_LENGTH: usize = 64;
const ACTION_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct HetznerConfig {
    pub token: String,
    pub endpoint: String,
    /// Log every request and response body at debug level
    pub debug: bool,
    pub poll_interval: Duration,
}

impl HetznerConfig {
    /// Create a config with the default endpoint. The token must be exactly
    /// 64 characters long.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.len() != TOKEN_LENGTH {
            return Err(HetznerError::InvalidToken);
        }

        Ok(Self {
            token,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            debug: false,
            poll_interval: ACTION_POLL_INTERVAL,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(HetznerError::InvalidEndpoint(endpoint));
        }
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Hetzner Cloud API client
#[derive(Debug, Clone)]
pub struct HetznerClient {
    http: reqwest::Client,
    token: String,
    endpoint: String,
    debug: bool,
    poll_interval: Duration,
}

impl HetznerClient {
    pub fn new(config: HetznerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("hcloud-connect/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            token: config.token,
            endpoint: config.endpoint,
            debug: config.debug,
            poll_interval: config.poll_interval,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let request = self.http.request(Method::GET, self.url(path)).query(query);
        self.send(request, "GET", path).await
    }

    pub(crate) async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        if self.debug {
            tracing::debug!(
                path,
                body = %serde_json::to_string(body).unwrap_or_default(),
                "hcloud request"
            );
        }
        let request = self.http.request(Method::POST, self.url(path)).json(body);
        self.send(request, "POST", path).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        method: &str,
        path: &str,
    ) -> Result<T> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if self.debug {
            tracing::debug!(
                method,
                path,
                status = status.as_u16(),
                body = %body,
                "hcloud response"
            );
        }

        if status.is_success() {
            return Ok(serde_json::from_str(&body)?);
        }

        match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(api) => Err(HetznerError::Api {
                code: api.error.code,
                message: api.error.message,
            }),
            Err(_) => Err(HetznerError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            }),
        }
    }

    /// Verify that the endpoint is reachable and the token is accepted
    pub async fn check_connection(&self) -> Result<()> {
        let _: ServersResponse = self
            .get("/servers", &[("per_page", "1".to_string())])
            .await?;
        Ok(())
    }

    pub async fn get_action(&self, id: u64) -> Result<Action> {
        let response: ActionResponse = self.get(&format!("/actions/{id}"), &[]).await?;
        Ok(response.action)
    }

    /// Poll an action until it reaches a terminal status and report the
    /// outcome. Stops early once nobody is listening anymore.
    pub(crate) async fn track_action(&self, id: u64, reporter: ActionReporter) {
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            interval.tick().await;
            if reporter.is_closed() {
                tracing::debug!(action = id, "action watch dropped, stop polling");
                return;
            }

            match self.get_action(id).await {
                Ok(action) if action.is_finished() => {
                    reporter.finish(action_outcome(&action));
                    return;
                }
                Ok(action) => reporter.progress(action.progress),
                Err(err) => {
                    let err = CloudError::from(err);
                    if err.is_transient() {
                        tracing::debug!(action = id, error = %err, "action poll throttled");
                        continue;
                    }
                    reporter.finish(Err(err));
                    return;
                }
            }
        }
    }
}
