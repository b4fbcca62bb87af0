//! Print-event intake.
//!
//! The platform print hook appends one JSON object per line to a local
//! spool file; this module tails it and feeds the offline queue. The
//! consumed byte offset is persisted next to the queue so a restart
//! neither replays nor skips events.

use chrono::{DateTime, Utc};
use printwatch_common::jobs::{JobStatus, PrintJobPayload};
use serde::Deserialize;
use std::io;
use std::path::Path;
use tokio::time::{interval, Duration};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::agent_modules::queue::OfflineQueue;

/// One captured print event as written by the hook. Identity fields may
/// be omitted; the agent fills them from its own environment.
#[derive(Deserialize, Debug)]
pub struct SpoolEvent {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub computer_name: Option<String>,
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
    #[serde(default)]
    pub print_time: Option<DateTime<Utc>>,
}

fn default_copies() -> i32 {
    1
}

fn os_username() -> String {
    std::env::var("USERNAME")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Parses one spool line into a validated, submission-id-stamped payload.
pub fn parse_spool_line(line: &str, hostname: &str) -> Result<PrintJobPayload, String> {
    let event: SpoolEvent =
        serde_json::from_str(line).map_err(|e| format!("bad spool line: {e}"))?;

    let payload = PrintJobPayload {
        submission_id: Uuid::new_v4(),
        username: event.username.unwrap_or_else(os_username),
        computer_name: event
            .computer_name
            .unwrap_or_else(|| hostname.to_string()),
        printer_name: event.printer_name,
        printer_ip: event.printer_ip,
        document_name: event.document_name,
        pages: event.pages,
        copies: event.copies,
        is_color: event.is_color,
        is_duplex: event.is_duplex,
        status: event.status,
        print_time: event.print_time.unwrap_or_else(Utc::now),
    };
    payload.validate()?;
    Ok(payload)
}

/// Reads complete lines past `offset`. A shrunken file means the hook
/// rotated the spool, so reading restarts from the top. Returns the new
/// offset pointing just past the last full line.
pub async fn read_new_lines(path: &Path, offset: u64) -> io::Result<(Vec<String>, u64)> {
    let data = tokio::fs::read(path).await?;
    let start = if offset > data.len() as u64 {
        0usize
    } else {
        offset as usize
    };

    let chunk = &data[start..];
    let consumed = chunk
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|p| p + 1)
        .unwrap_or(0);

    let lines = chunk[..consumed]
        .split(|b| *b == b'\n')
        .filter(|l| !l.is_empty())
        .map(|l| String::from_utf8_lossy(l).into_owned())
        .collect();

    Ok((lines, start as u64 + consumed as u64))
}

/// Tails the spool file on an interval and enqueues every parsable
/// event. Malformed lines are logged and skipped; they never block the
/// queue.
pub async fn spool_tail_loop(
    queue: OfflineQueue,
    path: std::path::PathBuf,
    hostname: String,
    poll: Duration,
) {
    let mut ticker = interval(poll);
    loop {
        ticker.tick().await;

        let offset = match queue.load_spool_offset().await {
            Ok(offset) => offset,
            Err(e) => {
                warn!(error = %e, "Failed to load spool offset; skipping tick.");
                continue;
            }
        };

        let (lines, new_offset) = match read_new_lines(&path, offset).await {
            Ok(result) => result,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Failed to read spool file.");
                continue;
            }
        };

        for line in &lines {
            match parse_spool_line(line, &hostname) {
                Ok(payload) => match queue.enqueue(&payload).await {
                    Ok(queue_id) => {
                        debug!(
                            queue_id,
                            document = %payload.document_name,
                            "Queued captured print event."
                        );
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to enqueue print event.");
                    }
                },
                Err(reason) => {
                    warn!(reason = %reason, "Skipping malformed spool line.");
                }
            }
        }

        if new_offset != offset {
            if let Err(e) = queue.store_spool_offset(new_offset).await {
                warn!(error = %e, "Failed to persist spool offset.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_event_parses() {
        let line = r#"{"username":"jdoe","computer_name":"PC-042","printer_name":"HQ-Laser-1","document_name":"memo.docx","pages":3,"copies":2,"is_color":true,"print_time":"2026-03-01T10:00:00Z"}"#;
        let payload = parse_spool_line(line, "fallback-host").unwrap();
        assert_eq!(payload.username, "jdoe");
        assert_eq!(payload.computer_name, "PC-042");
        assert_eq!(payload.total_pages(), 6);
        assert!(payload.is_color);
    }

    #[test]
    fn identity_fields_fall_back_to_environment() {
        let line = r#"{"printer_name":"HQ-Laser-1","document_name":"memo.docx","pages":1}"#;
        let payload = parse_spool_line(line, "PC-HOST").unwrap();
        assert_eq!(payload.computer_name, "PC-HOST");
        assert!(!payload.username.is_empty());
        assert_eq!(payload.copies, 1);
    }

    #[test]
    fn invalid_event_is_reported() {
        assert!(parse_spool_line("not json", "h").is_err());
        // Parses but fails validation: empty printer name.
        let line = r#"{"printer_name":"","document_name":"memo.docx","pages":1}"#;
        assert!(parse_spool_line(line, "h").unwrap_err().contains("printer_name"));
    }

    #[tokio::test]
    async fn partial_lines_are_left_for_the_next_pass() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spool.jsonl");
        tokio::fs::write(&path, "{\"a\":1}\n{\"b\":2}\n{\"incompl")
            .await
            .unwrap();

        let (lines, offset) = read_new_lines(&path, 0).await.unwrap();
        assert_eq!(lines, vec!["{\"a\":1}", "{\"b\":2}"]);
        assert_eq!(offset, 16);

        // The hook finishes the line; only the new one is returned.
        tokio::fs::write(&path, "{\"a\":1}\n{\"b\":2}\n{\"incomplete\":3}\n")
            .await
            .unwrap();
        let (lines, offset) = read_new_lines(&path, offset).await.unwrap();
        assert_eq!(lines, vec!["{\"incomplete\":3}"]);
        assert_eq!(offset, 33);
    }

    #[tokio::test]
    async fn rotation_restarts_from_the_top() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spool.jsonl");
        tokio::fs::write(&path, "{\"n\":1}\n").await.unwrap();

        let (_, offset) = read_new_lines(&path, 0).await.unwrap();
        assert_eq!(offset, 8);

        // Rotated: the file is now shorter than the stored offset.
        tokio::fs::write(&path, "{}\n").await.unwrap();
        let (lines, offset) = read_new_lines(&path, offset).await.unwrap();
        assert_eq!(lines, vec!["{}"]);
        assert_eq!(offset, 3);
    }
}
