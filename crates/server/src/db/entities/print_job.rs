use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Immutable once inserted; listing and report paths only read.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "print_jobs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Cleared by the background sweep once the row leaves the de-dup
    /// window; the partial unique index only covers non-null values.
    pub submission_id: Option<Uuid>,
    pub agent_id: i32,
    pub site_id: i32,
    pub username: String,
    pub computer_name: String,
    pub printer_name: String,
    pub printer_ip: Option<String>,
    pub document_name: String,
    pub pages: i32,
    pub copies: i32,
    pub total_pages: i32,
    pub is_color: bool,
    pub is_duplex: bool,
    pub status: String,
    pub print_time: ChronoDateTimeUtc,
    pub received_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::agent::Entity",
        from = "Column::AgentId",
        to = "super::agent::Column::Id"
    )]
    Agent,

    #[sea_orm(
        belongs_to = "super::site::Entity",
        from = "Column::SiteId",
        to = "super::site::Column::Id"
    )]
    Site,
}

impl Related<super::agent::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Agent.def()
    }
}

impl Related<super::site::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Site.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
