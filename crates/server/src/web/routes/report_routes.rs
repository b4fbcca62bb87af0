use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use printwatch_common::reports::{OverviewReport, TrendsReport};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::services::report_service::{self, ReportScope};
use crate::web::{error::AppError, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reports/overview", get(overview_handler))
        .route("/reports/trends", get(trends_handler))
}

#[derive(Deserialize, Debug, Default)]
pub struct ReportParams {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub site_id: Option<i32>,
    pub agent_id: Option<i32>,
}

/// Defaults to the last 30 days ending today.
fn resolve_range(
    params: &ReportParams,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), AppError> {
    let end_day = params.end_date.unwrap_or(today);
    let start_day = params.start_date.unwrap_or(end_day - Duration::days(29));
    if start_day > end_day {
        return Err(AppError::InvalidInput(format!(
            "start_date {start_day} is after end_date {end_day}"
        )));
    }
    Ok((start_day, end_day))
}

fn scope_for(params: &ReportParams, start_day: NaiveDate, end_day: NaiveDate) -> ReportScope {
    ReportScope {
        start: start_day.and_time(NaiveTime::MIN).and_utc(),
        end: (end_day + Duration::days(1)).and_time(NaiveTime::MIN).and_utc(),
        site_id: params.site_id,
        agent_id: params.agent_id,
    }
}

async fn overview_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<ReportParams>,
) -> Result<Json<OverviewReport>, AppError> {
    let (start_day, end_day) = resolve_range(&params, Utc::now().date_naive())?;
    let scope = scope_for(&params, start_day, end_day);
    Ok(Json(report_service::overview(&app_state.db, &scope).await?))
}

async fn trends_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<ReportParams>,
) -> Result<Json<TrendsReport>, AppError> {
    let (start_day, end_day) = resolve_range(&params, Utc::now().date_naive())?;
    let scope = scope_for(&params, start_day, end_day);
    Ok(Json(
        report_service::trends(&app_state.db, &scope, start_day, end_day).await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn default_range_is_last_thirty_days() {
        let (start, end) = resolve_range(&ReportParams::default(), day("2026-02-01")).unwrap();
        assert_eq!(end, day("2026-02-01"));
        assert_eq!(start, day("2026-01-03"));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let params = ReportParams {
            start_date: Some(day("2026-02-02")),
            end_date: Some(day("2026-02-01")),
            ..Default::default()
        };
        assert!(resolve_range(&params, day("2026-02-05")).is_err());
    }

    #[test]
    fn scope_is_half_open_over_full_days() {
        let params = ReportParams::default();
        let scope = scope_for(&params, day("2026-02-01"), day("2026-02-01"));
        assert_eq!(scope.start.to_rfc3339(), "2026-02-01T00:00:00+00:00");
        assert_eq!(scope.end.to_rfc3339(), "2026-02-02T00:00:00+00:00");
    }
}
