//! Pure text rendering of the dashboard state; no terminal control, so
//! the output is testable and pipeable.

use printwatch_common::jobs::PrintJobRecord;
use printwatch_common::reports::{OverviewReport, TrendsReport};

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let cut: String = s.chars().take(width.saturating_sub(1)).collect();
        format!("{cut}~")
    }
}

pub fn render_jobs_table(
    rows: &[&PrintJobRecord],
    page: usize,
    page_count: usize,
    total_fetched: usize,
) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>6}  {:<20}  {:<12}  {:<18}  {:<28}  {:>5}  {:>5}  {:<5}  {:<6}  {:<9}\n",
        "id", "print_time", "user", "printer", "document", "pages", "total", "color", "duplex", "status"
    ));
    for row in rows {
        out.push_str(&format!(
            "{:>6}  {:<20}  {:<12}  {:<18}  {:<28}  {:>5}  {:>5}  {:<5}  {:<6}  {:<9}\n",
            row.id,
            row.print_time.format("%Y-%m-%d %H:%M:%S"),
            truncate(&row.username, 12),
            truncate(&row.printer_name, 18),
            truncate(&row.document_name, 28),
            row.pages,
            row.total_pages,
            if row.is_color { "yes" } else { "no" },
            if row.is_duplex { "yes" } else { "no" },
            row.status,
        ));
    }
    out.push_str(&format!(
        "page {}/{} ({} records fetched)\n",
        page + 1,
        page_count,
        total_fetched
    ));
    out
}

pub fn render_overview(report: &OverviewReport) -> String {
    format!(
        "jobs: {}   pages: {} ({} color / {} b&w)   duplex jobs: {}   users: {}   printers: {}\n",
        report.total_jobs,
        report.total_pages,
        report.color_pages,
        report.bw_pages,
        report.duplex_jobs,
        report.unique_users,
        report.unique_printers,
    )
}

pub fn render_trends(report: &TrendsReport) -> String {
    let peak = report
        .points
        .iter()
        .map(|p| p.total_pages)
        .max()
        .unwrap_or(0)
        .max(1);

    let mut out = String::new();
    out.push_str(&format!("daily pages, {} to {}\n", report.start, report.end));
    for point in &report.points {
        let bar_len = ((point.total_pages * 40) / peak) as usize;
        out.push_str(&format!(
            "{}  {:>6} pages  {:>4} jobs  {}\n",
            point.day,
            point.total_pages,
            point.total_jobs,
            "#".repeat(bar_len),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use printwatch_common::reports::TrendPoint;

    #[test]
    fn overview_line_contains_the_totals() {
        let report = OverviewReport {
            total_jobs: 3,
            total_pages: 35,
            color_pages: 10,
            bw_pages: 25,
            duplex_jobs: 1,
            unique_users: 2,
            unique_printers: 2,
        };
        let line = render_overview(&report);
        assert!(line.contains("pages: 35"));
        assert!(line.contains("10 color"));
    }

    #[test]
    fn trends_render_one_line_per_day() {
        let day = |s: &str| s.parse::<NaiveDate>().unwrap();
        let report = TrendsReport {
            start: day("2026-03-01"),
            end: day("2026-03-02"),
            points: vec![TrendPoint::empty(day("2026-03-01")), TrendPoint {
                day: day("2026-03-02"),
                total_jobs: 1,
                total_pages: 8,
                color_pages: 0,
                duplex_jobs: 0,
            }],
        };
        let text = render_trends(&report);
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("2026-03-02"));
    }

    #[test]
    fn long_fields_are_truncated() {
        assert_eq!(truncate("short", 10), "short");
        let cut = truncate("a-very-long-document-name.pdf", 10);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with('~'));
    }
}
