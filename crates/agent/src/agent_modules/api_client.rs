//! HTTP client for the portal API. Responses are mapped to a typed
//! outcome so the drain loop never inspects status codes itself.

use printwatch_common::agents::{RegisterRequest, RegisterResponse};
use printwatch_common::jobs::{PrintJobPayload, SubmitResponse};
use printwatch_common::ErrorBody;
use reqwest::StatusCode;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = concat!("printwatch-agent/", env!("CARGO_PKG_VERSION"));
const API_KEY_HEADER: &str = "X-Api-Key";

/// How the server answered one submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Accepted { job_id: i32 },
    /// The server already holds this submission id; delivered as far as
    /// the agent is concerned.
    Duplicate { job_id: Option<i32> },
    /// Definitive rejection (validation); never retried.
    Rejected { message: String },
    /// Bad or revoked API key; the drain must halt.
    Unauthorized,
    /// Network trouble or a server-side failure; retried with backoff.
    Transient { message: String },
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(ApiClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// One-off registration call made before an API key exists.
    pub async fn register(
        server_url: &str,
        request: &RegisterRequest,
    ) -> Result<RegisterResponse, String> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;

        let url = format!("{}/api/agents/register", server_url.trim_end_matches('/'));
        let response = http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| format!("registration request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("registration rejected with {status}: {body}"));
        }
        response
            .json::<RegisterResponse>()
            .await
            .map_err(|e| format!("failed to parse registration response: {e}"))
    }

    pub async fn submit(&self, payload: &PrintJobPayload) -> SubmitOutcome {
        let url = format!("{}/api/print-jobs", self.base_url);
        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(payload)
            .send()
            .await;

        match response {
            Ok(response) => classify_response(response).await,
            Err(e) => SubmitOutcome::Transient {
                message: e.to_string(),
            },
        }
    }

    pub async fn heartbeat(&self) -> Result<(), String> {
        let url = format!("{}/api/agents/heartbeat", self.base_url);
        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("heartbeat rejected with {}", response.status()))
        }
    }
}

async fn classify_response(response: reqwest::Response) -> SubmitOutcome {
    let status = response.status();
    match status {
        StatusCode::CREATED | StatusCode::OK => match response.json::<SubmitResponse>().await {
            Ok(body) => SubmitOutcome::Accepted { job_id: body.job_id },
            // The row landed but the body was lost; a retry is safe
            // because the server de-duplicates on the submission id.
            Err(e) => SubmitOutcome::Transient {
                message: format!("unreadable success response: {e}"),
            },
        },
        StatusCode::CONFLICT => {
            let job_id = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.job_id);
            SubmitOutcome::Duplicate { job_id }
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => format!("rejected with {status}"),
            };
            SubmitOutcome::Rejected { message }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SubmitOutcome::Unauthorized,
        _ => SubmitOutcome::Transient {
            message: format!("server answered {status}"),
        },
    }
}
