//! Database migration runner.

use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, Statement};
use tracing::info;

/// Embedded migration files, applied in order.
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial_schema",
    include_str!("migrations/001_initial_schema.sql"),
)];

/// Run all pending migrations, tracked in the `schema_migrations` table.
pub async fn run(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.execute_unprepared(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version BIGINT PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .await?;

    let current_version = get_current_version(db).await?;
    info!(current_version, "Current schema version");

    let mut applied = 0u32;
    for (i, (name, sql)) in MIGRATIONS.iter().enumerate() {
        let version = i as i64 + 1;
        if version <= current_version {
            continue;
        }
        info!(version, name, "Applying migration");
        db.execute_unprepared(sql).await?;
        let record = Statement::from_sql_and_values(
            db.get_database_backend(),
            "INSERT INTO schema_migrations (version, name) VALUES ($1, $2)",
            [version.into(), (*name).into()],
        );
        db.execute(record).await?;
        applied += 1;
    }

    if applied == 0 {
        info!("No pending migrations");
    } else {
        info!(applied, "Migrations applied");
    }
    Ok(())
}

async fn get_current_version(db: &DatabaseConnection) -> Result<i64, DbErr> {
    let stmt = Statement::from_string(
        db.get_database_backend(),
        "SELECT MAX(version) AS version FROM schema_migrations",
    );
    let row = db.query_one(stmt).await?;
    match row {
        Some(row) => Ok(row.try_get::<Option<i64>>("", "version")?.unwrap_or(0)),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered() {
        for (i, (name, sql)) in MIGRATIONS.iter().enumerate() {
            let expected_prefix = format!("{:03}_", i + 1);
            assert!(
                name.starts_with(&expected_prefix),
                "migration {name} should start with {expected_prefix}"
            );
            assert!(!sql.trim().is_empty());
        }
    }
}
