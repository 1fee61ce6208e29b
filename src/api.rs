use std::time::Duration;

use anyhow::Result;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Question, WrongAnswer};

/// Timeout for the question fetch; a hung backend must never keep the block
/// overlay waiting longer than this before the fallback set takes over.
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no active room or stored credentials")]
    MissingCredentials,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status: {0}")]
    Status(StatusCode),
}

/// Wrong-answer entry as reported to the backend, tagged with the room it
/// was answered in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedWrongAnswer {
    #[serde(flatten)]
    pub answer: WrongAnswer,
    pub room_id: String,
}

/// Body of `POST /quiz/submit`. Best-effort telemetry; the response beyond
/// the status code is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReport {
    pub room_id: String,
    pub score: u32,
    pub total_questions: u32,
    pub usage_seconds: u64,
    pub wrong_answers: Vec<ReportedWrongAnswer>,
}

/// Client for the two backend endpoints the gating core consumes.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    /// `GET /quiz/{roomId}?count=N` with bearer auth. Any non-2xx response
    /// is an error; callers degrade to the fallback question set.
    pub async fn fetch_questions(
        &self,
        room_id: &str,
        token: &str,
        count: usize,
    ) -> Result<Vec<Question>, ApiError> {
        let url = format!("{}/quiz/{}?count={}", self.base_url, room_id, count);
        let response = self.http.get(&url).bearer_auth(token).send().await?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }

        Ok(response.json().await?)
    }

    /// `POST /quiz/submit`. Callers log failures and move on; unblocking is
    /// never conditioned on this call.
    pub async fn submit_completion(
        &self,
        token: &str,
        report: &CompletionReport,
    ) -> Result<(), ApiError> {
        let url = format!("{}/quiz/submit", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(report)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }

        Ok(())
    }
}
