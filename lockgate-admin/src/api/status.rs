use poem::web::Data;
use poem_openapi::payload::Json;
use poem_openapi::{ApiResponse, Object, OpenApi};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use lockgate_common::LockgateError;
use lockgate_core::{BlockListFilter, Services};
use lockgate_db_entities::LoginLogEntry;
use lockgate_db_entities::LoginLogEntry::LoginOutcome;

pub struct Api;

#[derive(Object)]
struct SecurityStatus {
    active_block_count: u64,
    penalized_counter_count: u64,
    failed_attempts_last_hour: u64,
    failed_attempts_last_24h: u64,
}

#[derive(ApiResponse)]
enum SecurityStatusResponse {
    #[oai(status = 200)]
    Ok(Json<SecurityStatus>),
}

#[OpenApi]
impl Api {
    #[oai(path = "/status", method = "get", operation_id = "get_security_status")]
    async fn get_security_status(
        &self,
        services: Data<&Services>,
    ) -> Result<SecurityStatusResponse, LockgateError> {
        let active_block_count = services
            .block_registry
            .list(BlockListFilter::ActiveOnly)
            .await?
            .len() as u64;
        let penalized_counter_count =
            services.attempt_tracker.list_penalized().await?.len() as u64;

        let db = services.db.lock().await;
        let now = chrono::Utc::now();

        let failed_attempts_last_hour = LoginLogEntry::Entity::find()
            .filter(LoginLogEntry::Column::Outcome.ne(LoginOutcome::Success))
            .filter(LoginLogEntry::Column::Timestamp.gte(now - chrono::Duration::hours(1)))
            .count(&*db)
            .await?;

        let failed_attempts_last_24h = LoginLogEntry::Entity::find()
            .filter(LoginLogEntry::Column::Outcome.ne(LoginOutcome::Success))
            .filter(LoginLogEntry::Column::Timestamp.gte(now - chrono::Duration::hours(24)))
            .count(&*db)
            .await?;

        Ok(SecurityStatusResponse::Ok(Json(SecurityStatus {
            active_block_count,
            penalized_counter_count,
            failed_attempts_last_hour,
            failed_attempts_last_24h,
        })))
    }
}
