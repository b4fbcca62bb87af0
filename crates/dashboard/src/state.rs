//! Explicit dashboard view state.
//!
//! The fetched page of records is held as-is; filtering, sorting, and
//! pagination are pure functions of this state, driven by a small set
//! of events (filter-change, sort-change, page-change, refresh).

use printwatch_common::jobs::PrintJobRecord;
use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortColumn {
    PrintTime,
    Username,
    PrinterName,
    DocumentName,
    Pages,
    TotalPages,
    Status,
}

impl SortColumn {
    pub fn parse(s: &str) -> Option<SortColumn> {
        match s {
            "print_time" => Some(SortColumn::PrintTime),
            "username" => Some(SortColumn::Username),
            "printer_name" => Some(SortColumn::PrinterName),
            "document_name" => Some(SortColumn::DocumentName),
            "pages" => Some(SortColumn::Pages),
            "total_pages" => Some(SortColumn::TotalPages),
            "status" => Some(SortColumn::Status),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

pub struct DashboardState {
    records: Vec<PrintJobRecord>,
    filter: String,
    sort: Option<(SortColumn, SortDirection)>,
    page: usize,
    page_size: usize,
}

impl DashboardState {
    pub fn new(page_size: usize) -> DashboardState {
        DashboardState {
            records: Vec::new(),
            filter: String::new(),
            sort: None,
            page: 0,
            page_size: page_size.max(1),
        }
    }

    /// Refresh event: replaces the fetched records.
    pub fn set_records(&mut self, records: Vec<PrintJobRecord>) {
        self.records = records;
        self.clamp_page();
    }

    /// Filter-change event: substring match on username and document.
    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
        self.page = 0;
    }

    /// Sort-change event.
    pub fn set_sort(&mut self, column: SortColumn, direction: SortDirection) {
        self.sort = Some((column, direction));
    }

    pub fn clear_sort(&mut self) {
        self.sort = None;
    }

    // Page-change events.
    pub fn next_page(&mut self) {
        if self.page + 1 < self.page_count() {
            self.page += 1;
        }
    }

    pub fn prev_page(&mut self) {
        self.page = self.page.saturating_sub(1);
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_count(&self) -> usize {
        self.filtered_sorted().len().div_ceil(self.page_size).max(1)
    }

    fn clamp_page(&mut self) {
        self.page = self.page.min(self.page_count() - 1);
    }

    fn matches_filter(&self, record: &PrintJobRecord, needle: &str) -> bool {
        needle.is_empty()
            || record.username.to_lowercase().contains(needle)
            || record.document_name.to_lowercase().contains(needle)
    }

    /// The full filtered view in display order. Ties always break by id
    /// ascending, regardless of sort direction, so the order is stable
    /// across refreshes.
    pub fn filtered_sorted(&self) -> Vec<&PrintJobRecord> {
        let needle = self.filter.to_lowercase();
        let mut rows: Vec<&PrintJobRecord> = self
            .records
            .iter()
            .filter(|r| self.matches_filter(r, &needle))
            .collect();

        if let Some((column, direction)) = self.sort {
            rows.sort_by(|a, b| {
                let ordering = compare_by(column, a, b);
                let ordering = match direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                };
                ordering.then(a.id.cmp(&b.id))
            });
        }
        rows
    }

    /// The slice of the view shown on the current page.
    pub fn visible_rows(&self) -> Vec<&PrintJobRecord> {
        let rows = self.filtered_sorted();
        rows.into_iter()
            .skip(self.page * self.page_size)
            .take(self.page_size)
            .collect()
    }
}

fn compare_by(column: SortColumn, a: &PrintJobRecord, b: &PrintJobRecord) -> Ordering {
    match column {
        SortColumn::PrintTime => a.print_time.cmp(&b.print_time),
        SortColumn::Username => a.username.cmp(&b.username),
        SortColumn::PrinterName => a.printer_name.cmp(&b.printer_name),
        SortColumn::DocumentName => a.document_name.cmp(&b.document_name),
        SortColumn::Pages => a.pages.cmp(&b.pages),
        SortColumn::TotalPages => a.total_pages.cmp(&b.total_pages),
        SortColumn::Status => a.status.as_str().cmp(b.status.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use printwatch_common::jobs::JobStatus;

    fn record(id: i32, username: &str, document: &str, pages: i32) -> PrintJobRecord {
        PrintJobRecord {
            id,
            agent_id: 1,
            site_id: 1,
            username: username.to_string(),
            computer_name: "PC-042".to_string(),
            printer_name: "HQ-Laser-1".to_string(),
            printer_ip: None,
            document_name: document.to_string(),
            pages,
            copies: 1,
            total_pages: pages,
            is_color: false,
            is_duplex: false,
            status: JobStatus::Completed,
            print_time: Utc::now(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn sort_by_pages_descending_with_id_tie_break() {
        let mut state = DashboardState::new(10);
        state.set_records(vec![
            record(1, "a", "one.pdf", 5),
            record(2, "b", "two.pdf", 20),
            record(3, "c", "three.pdf", 10),
            record(4, "d", "tie.pdf", 20),
        ]);
        state.set_sort(SortColumn::Pages, SortDirection::Descending);

        let pages: Vec<(i32, i32)> = state
            .filtered_sorted()
            .iter()
            .map(|r| (r.pages, r.id))
            .collect();
        // 20s first with ids ascending among the tie, then 10, then 5.
        assert_eq!(pages, vec![(20, 2), (20, 4), (10, 3), (5, 1)]);
    }

    #[test]
    fn filter_matches_username_or_document_substring() {
        let mut state = DashboardState::new(10);
        state.set_records(vec![
            record(1, "alice", "budget.xlsx", 1),
            record(2, "bob", "Alice-report.pdf", 1),
            record(3, "carol", "notes.txt", 1),
        ]);
        state.set_filter("alice");

        let ids: Vec<i32> = state.filtered_sorted().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn pagination_slices_the_filtered_view() {
        let mut state = DashboardState::new(2);
        state.set_records((1..=5).map(|i| record(i, "u", "d.pdf", i)).collect());

        assert_eq!(state.page_count(), 3);
        assert_eq!(state.visible_rows().len(), 2);

        state.next_page();
        state.next_page();
        assert_eq!(state.page(), 2);
        assert_eq!(state.visible_rows().len(), 1);

        // Already on the last page.
        state.next_page();
        assert_eq!(state.page(), 2);
    }

    #[test]
    fn filter_change_resets_the_page() {
        let mut state = DashboardState::new(2);
        state.set_records((1..=6).map(|i| record(i, "u", "d.pdf", i)).collect());
        state.next_page();
        assert_eq!(state.page(), 1);

        state.set_filter("u");
        assert_eq!(state.page(), 0);
    }

    #[test]
    fn empty_view_still_has_one_page() {
        let state = DashboardState::new(10);
        assert_eq!(state.page_count(), 1);
        assert!(state.visible_rows().is_empty());
    }

    #[test]
    fn refresh_clamps_the_current_page() {
        let mut state = DashboardState::new(2);
        state.set_records((1..=6).map(|i| record(i, "u", "d.pdf", i)).collect());
        state.next_page();
        state.next_page();
        assert_eq!(state.page(), 2);

        state.set_records(vec![record(1, "u", "d.pdf", 1)]);
        assert_eq!(state.page(), 0);
    }
}
