//! HTTP client for the portal's read endpoints.

use printwatch_common::jobs::JobPage;
use printwatch_common::reports::{OverviewReport, TrendsReport};
use printwatch_common::ErrorBody;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = concat!("printwatch-dashboard/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
}

pub struct DashboardClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct LoginReply {
    token: String,
}

impl DashboardClient {
    pub fn new(base_url: &str) -> Result<DashboardClient, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(DashboardClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), ClientError> {
        let url = format!("{}/api/auth/login", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await?;
        let response = check(response).await?;
        let reply: LoginReply = response.json().await?;
        self.token = Some(reply.token);
        Ok(())
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Fetches the bounded page the local view works over.
    pub async fn fetch_jobs(&self, fetch_limit: u64) -> Result<JobPage, ClientError> {
        let url = format!(
            "{}/api/print-jobs?per_page={fetch_limit}",
            self.base_url
        );
        let response = self.authed(self.http.get(&url)).send().await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn fetch_overview(&self) -> Result<OverviewReport, ClientError> {
        let url = format!("{}/api/reports/overview", self.base_url);
        let response = self.authed(self.http.get(&url)).send().await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn fetch_trends(&self) -> Result<TrendsReport, ClientError> {
        let url = format!("{}/api/reports/trends", self.base_url);
        let response = self.authed(self.http.get(&url)).send().await?;
        Ok(check(response).await?.json().await?)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
