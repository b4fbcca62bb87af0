use chrono::{DateTime, Utc};
use printwatch_common::jobs::{JobStatus, PrintJobPayload, PrintJobRecord};
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, SqlErr,
};
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::entities::print_job;

// --- PrintJob Service Functions ---

/// Result of an ingestion insert. A duplicate carries the row the server
/// already holds for this submission id.
#[derive(Debug)]
pub enum InsertOutcome {
    Created(print_job::Model),
    Duplicate(print_job::Model),
}

/// Persists one submission. The unique index on (agent_id, submission_id)
/// is the de-duplication authority; a violation means a concurrent or
/// retried submission already landed, and the original row is returned.
pub async fn insert_job(
    db: &DatabaseConnection,
    agent_id: i32,
    site_id: i32,
    payload: &PrintJobPayload,
) -> Result<InsertOutcome, DbErr> {
    let active = print_job::ActiveModel {
        submission_id: Set(Some(payload.submission_id)),
        agent_id: Set(agent_id),
        site_id: Set(site_id),
        username: Set(payload.username.clone()),
        computer_name: Set(payload.computer_name.clone()),
        printer_name: Set(payload.printer_name.clone()),
        printer_ip: Set(payload.printer_ip.clone()),
        document_name: Set(payload.document_name.clone()),
        pages: Set(payload.pages),
        copies: Set(payload.copies),
        total_pages: Set(payload.total_pages()),
        is_color: Set(payload.is_color),
        is_duplex: Set(payload.is_duplex),
        status: Set(payload.status.as_str().to_string()),
        print_time: Set(payload.print_time),
        received_at: Set(Utc::now()),
        ..Default::default()
    };

    match active.insert(db).await {
        Ok(model) => Ok(InsertOutcome::Created(model)),
        Err(e) => match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                let existing =
                    find_by_submission(db, agent_id, payload.submission_id).await?;
                match existing {
                    Some(model) => Ok(InsertOutcome::Duplicate(model)),
                    // The row was swept out of the window between the
                    // violation and the lookup; surface the original error.
                    None => Err(e),
                }
            }
            _ => Err(e),
        },
    }
}

pub async fn find_by_submission(
    db: &DatabaseConnection,
    agent_id: i32,
    submission_id: Uuid,
) -> Result<Option<print_job::Model>, DbErr> {
    print_job::Entity::find()
        .filter(print_job::Column::AgentId.eq(agent_id))
        .filter(print_job::Column::SubmissionId.eq(submission_id))
        .one(db)
        .await
}

pub async fn get_job(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<print_job::Model>, DbErr> {
    print_job::Entity::find_by_id(id).one(db).await
}

/// Listing filter; every field is optional and they combine with AND.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub username_like: Option<String>,
    pub document_like: Option<String>,
    pub printer_name: Option<String>,
    pub status: Option<JobStatus>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub site_id: Option<i32>,
    pub agent_id: Option<i32>,
}

fn apply_filter(
    mut query: Select<print_job::Entity>,
    filter: &JobFilter,
) -> Select<print_job::Entity> {
    if let Some(needle) = &filter.username_like {
        query = query.filter(
            Expr::expr(Func::lower(Expr::col(print_job::Column::Username)))
                .like(format!("%{}%", needle.to_lowercase())),
        );
    }
    if let Some(needle) = &filter.document_like {
        query = query.filter(
            Expr::expr(Func::lower(Expr::col(print_job::Column::DocumentName)))
                .like(format!("%{}%", needle.to_lowercase())),
        );
    }
    if let Some(printer) = &filter.printer_name {
        query = query.filter(print_job::Column::PrinterName.eq(printer.clone()));
    }
    if let Some(status) = filter.status {
        query = query.filter(print_job::Column::Status.eq(status.as_str()));
    }
    if let Some(start) = filter.start {
        query = query.filter(print_job::Column::PrintTime.gte(start));
    }
    if let Some(end) = filter.end {
        query = query.filter(print_job::Column::PrintTime.lt(end));
    }
    if let Some(site_id) = filter.site_id {
        query = query.filter(print_job::Column::SiteId.eq(site_id));
    }
    if let Some(agent_id) = filter.agent_id {
        query = query.filter(print_job::Column::AgentId.eq(agent_id));
    }
    query
}

/// Paginated listing, newest first, id as the stable tie-break.
/// `page` is 1-based.
pub async fn list_jobs(
    db: &DatabaseConnection,
    filter: &JobFilter,
    page: u64,
    per_page: u64,
) -> Result<(Vec<print_job::Model>, u64), DbErr> {
    let query = apply_filter(print_job::Entity::find(), filter)
        .order_by(print_job::Column::PrintTime, Order::Desc)
        .order_by(print_job::Column::Id, Order::Desc);

    let paginator = query.paginate(db, per_page.max(1));
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page.saturating_sub(1)).await?;
    Ok((items, total))
}

/// Clears submission ids on rows older than the de-dup horizon so the
/// partial unique index only guards the configured window.
pub async fn expire_dedup_window(
    db: &DatabaseConnection,
    window_hours: i64,
) -> Result<u64, DbErr> {
    let cutoff = Utc::now() - chrono::Duration::hours(window_hours);
    let result = print_job::Entity::update_many()
        .col_expr(print_job::Column::SubmissionId, Expr::value(None::<Uuid>))
        .filter(print_job::Column::SubmissionId.is_not_null())
        .filter(print_job::Column::ReceivedAt.lt(cutoff))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

#[derive(FromQueryResult, Debug)]
struct AgentJobCount {
    agent_id: i32,
    total_jobs: i64,
}

/// Job totals per agent for the fleet listing.
pub async fn count_jobs_by_agent(
    db: &DatabaseConnection,
) -> Result<HashMap<i32, i64>, DbErr> {
    let rows = print_job::Entity::find()
        .select_only()
        .column(print_job::Column::AgentId)
        .column_as(Expr::col(print_job::Column::Id).count(), "total_jobs")
        .group_by(print_job::Column::AgentId)
        .into_model::<AgentJobCount>()
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|r| (r.agent_id, r.total_jobs)).collect())
}

/// Maps a stored row to the wire record served by the listing endpoints.
pub fn to_record(model: print_job::Model) -> PrintJobRecord {
    PrintJobRecord {
        id: model.id,
        agent_id: model.agent_id,
        site_id: model.site_id,
        username: model.username,
        computer_name: model.computer_name,
        printer_name: model.printer_name,
        printer_ip: model.printer_ip,
        document_name: model.document_name,
        pages: model.pages,
        copies: model.copies,
        total_pages: model.total_pages,
        is_color: model.is_color,
        is_duplex: model.is_duplex,
        status: JobStatus::parse(&model.status).unwrap_or_default(),
        print_time: model.print_time,
        received_at: model.received_at,
    }
}
