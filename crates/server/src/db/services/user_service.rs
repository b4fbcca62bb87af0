use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel, Order,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};

use crate::db::entities::user;

// --- User Service Functions ---

pub async fn create_user(
    db: &DatabaseConnection,
    username: &str,
    password_hash: Option<String>,
    role: &str,
    is_ldap_user: bool,
) -> Result<user::Model, DbErr> {
    let now = Utc::now();
    let active = user::ActiveModel {
        username: Set(username.to_string()),
        password_hash: Set(password_hash),
        role: Set(role.to_string()),
        is_ldap_user: Set(is_ldap_user),
        is_active: Set(true),
        last_login: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    active.insert(db).await
}

pub async fn get_user_by_id(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Option<user::Model>, DbErr> {
    user::Entity::find_by_id(user_id).one(db).await
}

pub async fn get_user_by_username(
    db: &DatabaseConnection,
    username: &str,
) -> Result<Option<user::Model>, DbErr> {
    user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await
}

pub async fn list_users(db: &DatabaseConnection) -> Result<Vec<user::Model>, DbErr> {
    user::Entity::find()
        .order_by(user::Column::Username, Order::Asc)
        .all(db)
        .await
}

pub async fn list_directory_users(db: &DatabaseConnection) -> Result<Vec<user::Model>, DbErr> {
    user::Entity::find()
        .filter(user::Column::IsLdapUser.eq(true))
        .all(db)
        .await
}

pub async fn count_users(db: &DatabaseConnection) -> Result<u64, DbErr> {
    user::Entity::find().count(db).await
}

/// Field changes for `PUT /api/users/{id}`; unset fields are untouched.
#[derive(Debug, Default)]
pub struct UserChanges {
    pub role: Option<String>,
    pub is_active: Option<bool>,
    pub password_hash: Option<String>,
}

pub async fn update_user(
    db: &DatabaseConnection,
    user_id: i32,
    changes: UserChanges,
) -> Result<Option<user::Model>, DbErr> {
    let Some(existing) = get_user_by_id(db, user_id).await? else {
        return Ok(None);
    };

    let mut active = existing.into_active_model();
    if let Some(role) = changes.role {
        active.role = Set(role);
    }
    if let Some(is_active) = changes.is_active {
        active.is_active = Set(is_active);
    }
    if let Some(password_hash) = changes.password_hash {
        active.password_hash = Set(Some(password_hash));
    }
    active.updated_at = Set(Utc::now());
    Ok(Some(active.update(db).await?))
}

/// Soft removal: accounts are deactivated, never deleted.
pub async fn deactivate_user(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Option<user::Model>, DbErr> {
    update_user(
        db,
        user_id,
        UserChanges {
            is_active: Some(false),
            ..Default::default()
        },
    )
    .await
}

pub async fn touch_last_login(db: &DatabaseConnection, user_id: i32) -> Result<(), DbErr> {
    user::Entity::update_many()
        .col_expr(
            user::Column::LastLogin,
            sea_orm::sea_query::Expr::value(Some(Utc::now())),
        )
        .filter(user::Column::Id.eq(user_id))
        .exec(db)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn user_model(id: i32, username: &str) -> user::Model {
        user::Model {
            id,
            username: username.to_string(),
            password_hash: Some("$2b$12$hash".to_string()),
            role: "user".to_string(),
            is_ldap_user: false,
            is_active: true,
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn get_user_by_username_returns_match() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_model(1, "jdoe")]])
            .into_connection();

        let user = get_user_by_username(&db, "jdoe").await.unwrap();
        assert_eq!(user.unwrap().username, "jdoe");
    }

    #[tokio::test]
    async fn update_missing_user_is_none() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();

        let updated = update_user(&db, 99, UserChanges::default()).await.unwrap();
        assert!(updated.is_none());
    }
}
