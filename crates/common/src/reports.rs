//! Aggregated report types served by `GET /api/reports/*`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Totals over a date range, optionally scoped to a site or agent.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct OverviewReport {
    pub total_jobs: i64,
    pub total_pages: i64,
    pub color_pages: i64,
    pub bw_pages: i64,
    pub duplex_jobs: i64,
    pub unique_users: i64,
    pub unique_printers: i64,
}

/// One day of the trend series.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TrendPoint {
    pub day: NaiveDate,
    pub total_jobs: i64,
    pub total_pages: i64,
    pub color_pages: i64,
    pub duplex_jobs: i64,
}

impl TrendPoint {
    pub fn empty(day: NaiveDate) -> TrendPoint {
        TrendPoint {
            day,
            total_jobs: 0,
            total_pages: 0,
            color_pages: 0,
            duplex_jobs: 0,
        }
    }
}

/// Daily series over `[start, end]`; every day in the range is present,
/// days without jobs carry zeros.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TrendsReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub points: Vec<TrendPoint>,
}
