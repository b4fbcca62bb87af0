//! CSV export of the currently filtered and sorted view. A pure
//! transform of what is on screen; the server is not involved.

use printwatch_common::jobs::PrintJobRecord;

const HEADER: &str =
    "id,print_time,username,computer_name,printer_name,document_name,pages,copies,total_pages,color,duplex,status";

pub fn to_csv(rows: &[&PrintJobRecord]) -> String {
    let mut out = String::with_capacity(64 * (rows.len() + 1));
    out.push_str(HEADER);
    out.push('\n');
    for row in rows {
        let fields = [
            row.id.to_string(),
            row.print_time.to_rfc3339(),
            escape(&row.username),
            escape(&row.computer_name),
            escape(&row.printer_name),
            escape(&row.document_name),
            row.pages.to_string(),
            row.copies.to_string(),
            row.total_pages.to_string(),
            row.is_color.to_string(),
            row.is_duplex.to_string(),
            row.status.to_string(),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use printwatch_common::jobs::JobStatus;

    fn record(id: i32, document: &str) -> PrintJobRecord {
        PrintJobRecord {
            id,
            agent_id: 1,
            site_id: 1,
            username: "jdoe".to_string(),
            computer_name: "PC-042".to_string(),
            printer_name: "HQ-Laser-1".to_string(),
            printer_ip: None,
            document_name: document.to_string(),
            pages: 2,
            copies: 1,
            total_pages: 2,
            is_color: false,
            is_duplex: true,
            status: JobStatus::Completed,
            print_time: Utc::now(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn header_and_row_order_match_the_view() {
        let a = record(1, "first.pdf");
        let b = record(2, "second.pdf");
        let csv = to_csv(&[&b, &a]);

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,print_time"));
        assert!(lines[1].starts_with("2,"));
        assert!(lines[2].starts_with("1,"));
    }

    #[test]
    fn fields_with_commas_and_quotes_are_quoted() {
        let mut tricky = record(1, "sales, \"Q3\" final.xlsx");
        tricky.username = "doe, jane".to_string();
        let csv = to_csv(&[&tricky]);

        assert!(csv.contains("\"doe, jane\""));
        assert!(csv.contains("\"sales, \"\"Q3\"\" final.xlsx\""));
    }

    #[test]
    fn empty_view_is_just_the_header() {
        let csv = to_csv(&[]);
        assert_eq!(csv.lines().count(), 1);
    }
}
