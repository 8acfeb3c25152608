use chrono::{DateTime, Utc};
use poem::web::Data;
use poem_openapi::payload::Json;
use poem_openapi::{ApiResponse, Object, OpenApi};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use lockgate_core::Services;
use lockgate_db_entities::AuditLogEntry;
use lockgate_db_entities::AuditLogEntry::AuditAction;

use super::pagination::{PaginatedResponse, PaginationParams};

pub struct Api;

#[derive(ApiResponse)]
enum GetAuditLogResponse {
    #[oai(status = 200)]
    Ok(Json<PaginatedResponse<AuditLogEntry::Model>>),
}

#[derive(Object)]
struct GetAuditLogRequest {
    before: Option<DateTime<Utc>>,
    actor: Option<String>,
    action: Option<AuditAction>,
    offset: Option<u64>,
    limit: Option<u64>,
}

#[OpenApi]
impl Api {
    /// Audit trail in descending time order; write-once records.
    #[oai(path = "/audit", method = "post", operation_id = "get_audit_log")]
    async fn api_get_audit_log(
        &self,
        services: Data<&Services>,
        body: Json<GetAuditLogRequest>,
    ) -> poem::Result<GetAuditLogResponse> {
        let db = services.db.lock().await;

        let mut q = AuditLogEntry::Entity::find()
            .order_by_desc(AuditLogEntry::Column::Timestamp);

        if let Some(before) = body.before {
            q = q.filter(AuditLogEntry::Column::Timestamp.lt(before));
        }
        if let Some(ref actor) = body.actor {
            q = q.filter(AuditLogEntry::Column::Actor.eq(actor.clone()));
        }
        if let Some(action) = body.action {
            q = q.filter(AuditLogEntry::Column::Action.eq(action));
        }

        Ok(GetAuditLogResponse::Ok(Json(
            PaginatedResponse::new(
                q,
                PaginationParams {
                    offset: body.offset,
                    limit: body.limit,
                },
                &*db,
                |e| e,
            )
            .await?,
        )))
    }
}
