//! Directory-account reconciliation.
//!
//! The portal never binds to LDAP itself; an operator (or automation)
//! posts a snapshot of the directory and this module reconciles the
//! directory-backed accounts against it. Local accounts are untouched.

use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::db::services::user_service::{self, UserChanges};
use crate::web::error::AppError;

/// One account in the posted directory snapshot.
#[derive(Deserialize, Debug, Clone)]
pub struct DirectoryEntry {
    pub username: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Serialize, Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub created: usize,
    pub reactivated: usize,
    pub deactivated: usize,
    pub skipped: usize,
}

pub async fn sync_directory(
    db: &DatabaseConnection,
    entries: &[DirectoryEntry],
) -> Result<SyncSummary, AppError> {
    let mut summary = SyncSummary::default();

    let enabled: HashSet<&str> = entries
        .iter()
        .filter(|e| e.enabled && !e.username.trim().is_empty())
        .map(|e| e.username.as_str())
        .collect();

    for &username in &enabled {
        match user_service::get_user_by_username(db, username).await? {
            None => {
                user_service::create_user(db, username, None, "user", true).await?;
                summary.created += 1;
            }
            Some(existing) if existing.is_ldap_user => {
                if !existing.is_active {
                    user_service::update_user(
                        db,
                        existing.id,
                        UserChanges {
                            is_active: Some(true),
                            ..Default::default()
                        },
                    )
                    .await?;
                    summary.reactivated += 1;
                }
            }
            Some(_) => {
                // A local account already owns this username.
                warn!(username, "Directory entry collides with a local account; skipping.");
                summary.skipped += 1;
            }
        }
    }

    // Directory-backed accounts missing from the snapshot are deactivated.
    for existing in user_service::list_directory_users(db).await? {
        if existing.is_active && !enabled.contains(existing.username.as_str()) {
            user_service::deactivate_user(db, existing.id).await?;
            summary.deactivated += 1;
        }
    }

    info!(
        created = summary.created,
        reactivated = summary.reactivated,
        deactivated = summary.deactivated,
        skipped = summary.skipped,
        "Directory sync finished."
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_entries_default_to_enabled() {
        let entry: DirectoryEntry =
            serde_json::from_value(serde_json::json!({ "username": "jdoe" })).unwrap();
        assert!(entry.enabled);
    }

    #[test]
    fn disabled_entries_are_excluded_from_the_enabled_set() {
        let entries = vec![
            DirectoryEntry {
                username: "a".to_string(),
                enabled: true,
            },
            DirectoryEntry {
                username: "b".to_string(),
                enabled: false,
            },
        ];
        let enabled: HashSet<&str> = entries
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.username.as_str())
            .collect();
        assert!(enabled.contains("a"));
        assert!(!enabled.contains("b"));
    }
}
