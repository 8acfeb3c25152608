use chrono::{DateTime, Utc};
use poem::web::Data;
use poem_openapi::payload::Json;
use poem_openapi::{ApiResponse, Object, OpenApi};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use lockgate_core::Services;
use lockgate_db_entities::LoginLogEntry;
use lockgate_db_entities::LoginLogEntry::LoginOutcome;

use super::pagination::{PaginatedResponse, PaginationParams};

pub struct Api;

#[derive(ApiResponse)]
enum GetLoginLogResponse {
    #[oai(status = 200)]
    Ok(Json<PaginatedResponse<LoginLogEntry::Model>>),
}

#[derive(Object)]
struct GetLoginLogRequest {
    before: Option<DateTime<Utc>>,
    after: Option<DateTime<Utc>>,
    identity: Option<String>,
    remote_ip: Option<String>,
    outcome: Option<LoginOutcome>,
    offset: Option<u64>,
    limit: Option<u64>,
}

#[OpenApi]
impl Api {
    /// Login log in descending time order. Entries are append-only; this
    /// surface never mutates them.
    #[oai(path = "/logs", method = "post", operation_id = "get_login_log")]
    async fn api_get_login_log(
        &self,
        services: Data<&Services>,
        body: Json<GetLoginLogRequest>,
    ) -> poem::Result<GetLoginLogResponse> {
        let db = services.db.lock().await;

        let mut q = LoginLogEntry::Entity::find()
            .order_by_desc(LoginLogEntry::Column::Timestamp);

        if let Some(before) = body.before {
            q = q.filter(LoginLogEntry::Column::Timestamp.lt(before));
        }
        if let Some(after) = body.after {
            q = q.filter(LoginLogEntry::Column::Timestamp.gt(after));
        }
        if let Some(ref identity) = body.identity {
            q = q.filter(LoginLogEntry::Column::Identity.eq(identity.clone()));
        }
        if let Some(ref remote_ip) = body.remote_ip {
            q = q.filter(LoginLogEntry::Column::RemoteIp.eq(remote_ip.clone()));
        }
        if let Some(outcome) = body.outcome {
            q = q.filter(LoginLogEntry::Column::Outcome.eq(outcome));
        }

        Ok(GetLoginLogResponse::Ok(Json(
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
