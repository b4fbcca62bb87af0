use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, NaiveDate, NaiveTime};
use printwatch_common::jobs::{
    BatchItemOutcome, BatchOutcome, BatchSubmitResponse, JobPage, JobStatus, PrintJobPayload,
    PrintJobRecord, SubmitResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::db::services::{
    agent_service,
    print_job_service::{self, InsertOutcome, JobFilter},
};
use crate::web::{error::AppError, models::AuthenticatedAgent, AppState};

/// Routes reached by agents with an API key.
pub fn ingest_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/print-jobs", post(submit_print_job))
        .route("/print-jobs/batch", post(submit_print_jobs_batch))
}

/// Routes reached by portal users with a JWT.
pub fn query_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/print-jobs", get(list_print_jobs))
        .route("/print-jobs/{id}", get(get_print_job))
}

async fn submit_print_job(
    Extension(agent): Extension<AuthenticatedAgent>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<PrintJobPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::InvalidInput)?;

    let outcome =
        print_job_service::insert_job(&app_state.db, agent.id, agent.site_id, &payload).await?;
    agent_service::touch_last_seen(&app_state.db, agent.id).await?;

    match outcome {
        InsertOutcome::Created(model) => {
            info!(
                job_id = model.id,
                agent_id = agent.id,
                printer = %model.printer_name,
                pages = model.total_pages,
                "Recorded print job."
            );
            Ok((
                StatusCode::CREATED,
                Json(SubmitResponse {
                    job_id: model.id,
                    duplicate: false,
                }),
            ))
        }
        InsertOutcome::Duplicate(model) => Err(AppError::DuplicateSubmission { job_id: model.id }),
    }
}

/// Batch replay used by agents coming back online. Items are processed
/// in payload order; one bad item never fails the batch.
async fn submit_print_jobs_batch(
    Extension(agent): Extension<AuthenticatedAgent>,
    State(app_state): State<Arc<AppState>>,
    Json(payloads): Json<Vec<PrintJobPayload>>,
) -> Result<impl IntoResponse, AppError> {
    let mut items = Vec::with_capacity(payloads.len());
    let mut processed = 0usize;
    let mut rejected = 0usize;

    for payload in &payloads {
        if let Err(reason) = payload.validate() {
            rejected += 1;
            items.push(BatchItemOutcome {
                submission_id: payload.submission_id,
                outcome: BatchOutcome::Rejected,
                job_id: None,
                error: Some(reason),
            });
            continue;
        }

        match print_job_service::insert_job(&app_state.db, agent.id, agent.site_id, payload)
            .await?
        {
            InsertOutcome::Created(model) => {
                processed += 1;
                items.push(BatchItemOutcome {
                    submission_id: payload.submission_id,
                    outcome: BatchOutcome::Accepted,
                    job_id: Some(model.id),
                    error: None,
                });
            }
            InsertOutcome::Duplicate(model) => {
                processed += 1;
                items.push(BatchItemOutcome {
                    submission_id: payload.submission_id,
                    outcome: BatchOutcome::Duplicate,
                    job_id: Some(model.id),
                    error: None,
                });
            }
        }
    }

    agent_service::touch_last_seen(&app_state.db, agent.id).await?;
    info!(
        agent_id = agent.id,
        processed, rejected, "Processed print job batch."
    );

    Ok(Json(BatchSubmitResponse {
        processed,
        rejected,
        items,
    }))
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    50
}

const MAX_PER_PAGE: u64 = 500;

#[derive(Deserialize, Debug, Default)]
pub struct JobListParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    pub username: Option<String>,
    pub document: Option<String>,
    pub printer_name: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub site_id: Option<i32>,
    pub agent_id: Option<i32>,
}

impl JobListParams {
    fn into_filter(self) -> Result<(JobFilter, u64, u64), AppError> {
        let status = match self.status.as_deref() {
            None => None,
            Some(raw) => Some(
                JobStatus::parse(raw)
                    .ok_or_else(|| AppError::InvalidInput(format!("unknown status '{raw}'")))?,
            ),
        };

        let filter = JobFilter {
            username_like: self.username,
            document_like: self.document,
            printer_name: self.printer_name,
            status,
            start: self
                .start_date
                .map(|d| d.and_time(NaiveTime::MIN).and_utc()),
            // End date is inclusive on the wire, half-open in the query.
            end: self
                .end_date
                .map(|d| (d + Duration::days(1)).and_time(NaiveTime::MIN).and_utc()),
            site_id: self.site_id,
            agent_id: self.agent_id,
        };

        let page = self.page.max(1);
        let per_page = self.per_page.clamp(1, MAX_PER_PAGE);
        Ok((filter, page, per_page))
    }
}

async fn list_print_jobs(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<JobListParams>,
) -> Result<Json<JobPage>, AppError> {
    let (filter, page, per_page) = params.into_filter()?;
    let (models, total) =
        print_job_service::list_jobs(&app_state.db, &filter, page, per_page).await?;

    Ok(Json(JobPage {
        items: models
            .into_iter()
            .map(print_job_service::to_record)
            .collect(),
        total,
        page,
        per_page,
    }))
}

/// A missing id surfaces as an empty body, not an error.
async fn get_print_job(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<Option<PrintJobRecord>>, AppError> {
    let job = print_job_service::get_job(&app_state.db, id).await?;
    Ok(Json(job.map(print_job_service::to_record)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let params = JobListParams {
            page: default_page(),
            per_page: default_per_page(),
            ..Default::default()
        };
        let (filter, page, per_page) = params.into_filter().unwrap();
        assert_eq!(page, 1);
        assert_eq!(per_page, 50);
        assert!(filter.status.is_none());
        assert!(filter.start.is_none());
    }

    #[test]
    fn unknown_status_is_invalid_input() {
        let params = JobListParams {
            page: 1,
            per_page: 50,
            status: Some("printing".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            params.into_filter(),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn per_page_is_clamped() {
        let params = JobListParams {
            page: 0,
            per_page: 10_000,
            ..Default::default()
        };
        let (_, page, per_page) = params.into_filter().unwrap();
        assert_eq!(page, 1);
        assert_eq!(per_page, MAX_PER_PAGE);
    }

    #[test]
    fn end_date_becomes_exclusive_next_midnight() {
        let params = JobListParams {
            page: 1,
            per_page: 50,
            start_date: Some("2026-01-01".parse().unwrap()),
            end_date: Some("2026-01-31".parse().unwrap()),
            ..Default::default()
        };
        let (filter, _, _) = params.into_filter().unwrap();
        assert_eq!(
            filter.start.unwrap().to_rfc3339(),
            "2026-01-01T00:00:00+00:00"
        );
        assert_eq!(
            filter.end.unwrap().to_rfc3339(),
            "2026-02-01T00:00:00+00:00"
        );
    }
}
