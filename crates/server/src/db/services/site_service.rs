use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, Order, QueryFilter,
    QueryOrder, Set, SqlErr,
};

use crate::db::entities::site;

// --- Site Service Functions ---

pub async fn get_site_by_label(
    db: &DatabaseConnection,
    label: &str,
) -> Result<Option<site::Model>, DbErr> {
    site::Entity::find()
        .filter(site::Column::Label.eq(label))
        .one(db)
        .await
}

pub async fn create_site(db: &DatabaseConnection, label: &str) -> Result<site::Model, DbErr> {
    let active = site::ActiveModel {
        label: Set(label.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    active.insert(db).await
}

/// Site labels have no lifecycle of their own; the first agent naming a
/// label creates it. A lost creation race resolves to the winner's row.
pub async fn find_or_create_site(
    db: &DatabaseConnection,
    label: &str,
) -> Result<site::Model, DbErr> {
    if let Some(existing) = get_site_by_label(db, label).await? {
        return Ok(existing);
    }
    match create_site(db, label).await {
        Ok(created) => Ok(created),
        Err(e) => match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                match get_site_by_label(db, label).await? {
                    Some(existing) => Ok(existing),
                    None => Err(e),
                }
            }
            _ => Err(e),
        },
    }
}

pub async fn list_sites(db: &DatabaseConnection) -> Result<Vec<site::Model>, DbErr> {
    site::Entity::find()
        .order_by(site::Column::Label, Order::Asc)
        .all(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn find_or_create_returns_existing() {
        let existing = site::Model {
            id: 3,
            label: "HQ".to_string(),
            created_at: Utc::now(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing.clone()]])
            .into_connection();

        let site = find_or_create_site(&db, "HQ").await.unwrap();
        assert_eq!(site.id, 3);
    }
}
