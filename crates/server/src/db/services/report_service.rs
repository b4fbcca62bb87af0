use chrono::{DateTime, NaiveDate, Utc};
use printwatch_common::reports::{OverviewReport, TrendPoint, TrendsReport};
use sea_orm::{
    sea_query::{Alias, Expr},
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, Order, QueryFilter,
    QueryOrder, QuerySelect, Select,
};

use crate::db::entities::print_job;

// --- Reporting Aggregator ---

/// Date range plus optional site/agent scope for a report query. The
/// range is half-open: `[start, end)`.
#[derive(Debug, Clone)]
pub struct ReportScope {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub site_id: Option<i32>,
    pub agent_id: Option<i32>,
}

fn apply_scope(
    mut query: Select<print_job::Entity>,
    scope: &ReportScope,
) -> Select<print_job::Entity> {
    query = query
        .filter(print_job::Column::PrintTime.gte(scope.start))
        .filter(print_job::Column::PrintTime.lt(scope.end));
    if let Some(site_id) = scope.site_id {
        query = query.filter(print_job::Column::SiteId.eq(site_id));
    }
    if let Some(agent_id) = scope.agent_id {
        query = query.filter(print_job::Column::AgentId.eq(agent_id));
    }
    query
}

#[derive(FromQueryResult, Debug, Default)]
struct OverviewRow {
    total_jobs: Option<i64>,
    total_pages: Option<i64>,
    color_pages: Option<i64>,
    duplex_jobs: Option<i64>,
    unique_users: Option<i64>,
    unique_printers: Option<i64>,
}

fn finish_overview(row: OverviewRow) -> OverviewReport {
    let total_pages = row.total_pages.unwrap_or(0);
    let color_pages = row.color_pages.unwrap_or(0);
    OverviewReport {
        total_jobs: row.total_jobs.unwrap_or(0),
        total_pages,
        color_pages,
        bw_pages: total_pages - color_pages,
        duplex_jobs: row.duplex_jobs.unwrap_or(0),
        unique_users: row.unique_users.unwrap_or(0),
        unique_printers: row.unique_printers.unwrap_or(0),
    }
}

/// Totals over the scoped range, straight off the committed rows.
pub async fn overview(
    db: &DatabaseConnection,
    scope: &ReportScope,
) -> Result<OverviewReport, DbErr> {
    let query = apply_scope(print_job::Entity::find(), scope)
        .select_only()
        .column_as(Expr::cust("COUNT(*)"), "total_jobs")
        .column_as(Expr::cust("COALESCE(SUM(total_pages), 0)"), "total_pages")
        .column_as(
            Expr::cust("COALESCE(SUM(CASE WHEN is_color THEN total_pages ELSE 0 END), 0)"),
            "color_pages",
        )
        .column_as(Expr::cust("COUNT(*) FILTER (WHERE is_duplex)"), "duplex_jobs")
        .column_as(Expr::cust("COUNT(DISTINCT username)"), "unique_users")
        .column_as(
            Expr::cust("COUNT(DISTINCT printer_name)"),
            "unique_printers",
        );

    let row = query.into_model::<OverviewRow>().one(db).await?;
    Ok(finish_overview(row.unwrap_or_default()))
}

#[derive(FromQueryResult, Debug)]
struct TrendRow {
    day: NaiveDate,
    total_jobs: i64,
    total_pages: i64,
    color_pages: i64,
    duplex_jobs: i64,
}

/// Daily series over `[start_day, end_day]`; days without jobs are
/// filled with zeros so the series is dense.
pub async fn trends(
    db: &DatabaseConnection,
    scope: &ReportScope,
    start_day: NaiveDate,
    end_day: NaiveDate,
) -> Result<TrendsReport, DbErr> {
    let day_expr = Expr::cust("CAST(date_trunc('day', print_time) AS date)");

    let rows = apply_scope(print_job::Entity::find(), scope)
        .select_only()
        .column_as(day_expr.clone(), "day")
        .column_as(Expr::cust("COUNT(*)"), "total_jobs")
        .column_as(Expr::cust("COALESCE(SUM(total_pages), 0)"), "total_pages")
        .column_as(
            Expr::cust("COALESCE(SUM(CASE WHEN is_color THEN total_pages ELSE 0 END), 0)"),
            "color_pages",
        )
        .column_as(Expr::cust("COUNT(*) FILTER (WHERE is_duplex)"), "duplex_jobs")
        .group_by(day_expr)
        .order_by(Expr::col(Alias::new("day")), Order::Asc)
        .into_model::<TrendRow>()
        .all(db)
        .await?;

    let points = rows
        .into_iter()
        .map(|r| TrendPoint {
            day: r.day,
            total_jobs: r.total_jobs,
            total_pages: r.total_pages,
            color_pages: r.color_pages,
            duplex_jobs: r.duplex_jobs,
        })
        .collect();

    Ok(TrendsReport {
        start: start_day,
        end: end_day,
        points: fill_missing_days(start_day, end_day, points),
    })
}

/// Expands a sparse day series into one point per calendar day.
fn fill_missing_days(
    start_day: NaiveDate,
    end_day: NaiveDate,
    points: Vec<TrendPoint>,
) -> Vec<TrendPoint> {
    let mut by_day: std::collections::BTreeMap<NaiveDate, TrendPoint> =
        points.into_iter().map(|p| (p.day, p)).collect();

    start_day
        .iter_days()
        .take_while(|d| *d <= end_day)
        .map(|day| by_day.remove(&day).unwrap_or_else(|| TrendPoint::empty(day)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn overview_totals_sum_pages() {
        // Three jobs with page counts 10, 20, 5 sum to 35.
        let row = OverviewRow {
            total_jobs: Some(3),
            total_pages: Some(35),
            color_pages: Some(10),
            duplex_jobs: Some(1),
            unique_users: Some(2),
            unique_printers: Some(2),
        };
        let report = finish_overview(row);
        assert_eq!(report.total_jobs, 3);
        assert_eq!(report.total_pages, 35);
        assert_eq!(report.bw_pages, 25);
    }

    #[test]
    fn empty_overview_is_all_zeroes() {
        let report = finish_overview(OverviewRow::default());
        assert_eq!(report, OverviewReport::default());
    }

    #[test]
    fn missing_days_are_zero_filled() {
        let sparse = vec![TrendPoint {
            day: day("2026-03-02"),
            total_jobs: 2,
            total_pages: 12,
            color_pages: 4,
            duplex_jobs: 1,
        }];
        let dense = fill_missing_days(day("2026-03-01"), day("2026-03-03"), sparse);
        assert_eq!(dense.len(), 3);
        assert_eq!(dense[0], TrendPoint::empty(day("2026-03-01")));
        assert_eq!(dense[1].total_pages, 12);
        assert_eq!(dense[2], TrendPoint::empty(day("2026-03-03")));
    }

    #[test]
    fn single_day_range_has_one_point() {
        let dense = fill_missing_days(day("2026-03-01"), day("2026-03-01"), Vec::new());
        assert_eq!(dense.len(), 1);
        assert_eq!(dense[0].day, day("2026-03-01"));
    }
}
