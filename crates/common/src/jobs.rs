//! Print-job payloads and listing records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Final state of a print job as reported by the agent.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Completed,
    Failed,
    Pending,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Pending => "pending",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<JobStatus> {
        match s {
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "pending" => Some(JobStatus::Pending),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_copies() -> i32 {
    1
}

/// One print job as submitted by an agent.
///
/// `submission_id` is generated by the agent when the event is first
/// captured and is stable across retries; the server de-duplicates on it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PrintJobPayload {
    pub submission_id: Uuid,
    pub username: String,
    pub computer_name: String,
    pub printer_name: String,
    #[serde(default)]
    pub printer_ip: Option<String>,
    pub document_name: String,
    pub pages: i32,
    #[serde(default = "default_copies")]
    pub copies: i32,
    #[serde(default)]
    pub is_color: bool,
    #[serde(default)]
    pub is_duplex: bool,
    #[serde(default)]
    pub status: JobStatus,
    pub print_time: DateTime<Utc>,
}

impl PrintJobPayload {
    /// Validates the required fields before the payload is queued or
    /// persisted. Returns a human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.printer_name.trim().is_empty() {
            return Err("printer_name must not be empty".to_string());
        }
        if self.document_name.trim().is_empty() {
            return Err("document_name must not be empty".to_string());
        }
        if self.username.trim().is_empty() {
            return Err("username must not be empty".to_string());
        }
        if self.computer_name.trim().is_empty() {
            return Err("computer_name must not be empty".to_string());
        }
        if self.pages < 0 {
            return Err(format!("pages must be >= 0, got {}", self.pages));
        }
        if self.copies < 1 {
            return Err(format!("copies must be >= 1, got {}", self.copies));
        }
        Ok(())
    }

    /// Page count actually produced by this job.
    pub fn total_pages(&self) -> i32 {
        self.pages.saturating_mul(self.copies)
    }
}

/// Server reply for a single accepted submission.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SubmitResponse {
    pub job_id: i32,
    pub duplicate: bool,
}

/// Per-item outcome inside a batch submission reply.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BatchItemOutcome {
    pub submission_id: Uuid,
    pub outcome: BatchOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchOutcome {
    Accepted,
    Duplicate,
    Rejected,
}

/// Reply for `POST /api/print-jobs/batch`. A bad item never fails the
/// batch; it is reported in its slot instead.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BatchSubmitResponse {
    pub processed: usize,
    pub rejected: usize,
    pub items: Vec<BatchItemOutcome>,
}

/// One persisted print job as returned by the listing endpoints.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PrintJobRecord {
    pub id: i32,
    pub agent_id: i32,
    pub site_id: i32,
    pub username: String,
    pub computer_name: String,
    pub printer_name: String,
    pub printer_ip: Option<String>,
    pub document_name: String,
    pub pages: i32,
    pub copies: i32,
    pub total_pages: i32,
    pub is_color: bool,
    pub is_duplex: bool,
    pub status: JobStatus,
    pub print_time: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

/// One page of the job listing.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct JobPage {
    pub items: Vec<PrintJobRecord>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}
