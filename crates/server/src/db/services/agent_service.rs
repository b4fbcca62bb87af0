use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, Order, QueryFilter,
    QueryOrder, Set,
};

use crate::db::entities::{agent, site};

// --- Agent Service Functions ---

pub async fn register_agent(
    db: &DatabaseConnection,
    site_id: i32,
    hostname: &str,
    agent_version: Option<String>,
    api_key_hash: &str,
) -> Result<agent::Model, DbErr> {
    let now = Utc::now();
    let active = agent::ActiveModel {
        site_id: Set(site_id),
        hostname: Set(hostname.to_string()),
        agent_version: Set(agent_version),
        api_key_hash: Set(api_key_hash.to_string()),
        last_seen: Set(now),
        registered_at: Set(now),
        ..Default::default()
    };
    active.insert(db).await
}

/// Credential lookup for the ingestion path; the caller hashes the
/// presented key first so plaintext never reaches the query layer.
pub async fn find_by_api_key_hash(
    db: &DatabaseConnection,
    api_key_hash: &str,
) -> Result<Option<agent::Model>, DbErr> {
    agent::Entity::find()
        .filter(agent::Column::ApiKeyHash.eq(api_key_hash))
        .one(db)
        .await
}

/// Bumped on every successful ingestion or heartbeat.
pub async fn touch_last_seen(db: &DatabaseConnection, agent_id: i32) -> Result<(), DbErr> {
    agent::Entity::update_many()
        .col_expr(
            agent::Column::LastSeen,
            sea_orm::sea_query::Expr::value(Utc::now()),
        )
        .filter(agent::Column::Id.eq(agent_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Fleet listing with each agent's site row.
pub async fn list_agents_with_sites(
    db: &DatabaseConnection,
) -> Result<Vec<(agent::Model, Option<site::Model>)>, DbErr> {
    agent::Entity::find()
        .find_also_related(site::Entity)
        .order_by(agent::Column::Id, Order::Asc)
        .all(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn unknown_key_hash_is_none() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<agent::Model>::new()])
            .into_connection();

        let found = find_by_api_key_hash(&db, "deadbeef").await.unwrap();
        assert!(found.is_none());
    }
}
