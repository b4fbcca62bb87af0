use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "agents")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub site_id: i32,
    pub hostname: String,
    pub agent_version: Option<String>,
    /// SHA-256 hex of the issued key; the plaintext is never stored.
    #[sea_orm(unique)]
    pub api_key_hash: String,
    pub last_seen: ChronoDateTimeUtc,
    pub registered_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::site::Entity",
        from = "Column::SiteId",
        to = "super::site::Column::Id"
    )]
    Site,

    #[sea_orm(has_many = "super::print_job::Entity")]
    PrintJob,
}

impl Related<super::site::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Site.def()
    }
}

impl Related<super::print_job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PrintJob.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
