use std::time::Duration;

use chrono::{DateTime, Utc};
use poem::web::Data;
use poem_openapi::param::{Header, Query};
use poem_openapi::payload::Json;
use poem_openapi::{ApiResponse, Enum, Object, OpenApi};
use uuid::Uuid;
use lockgate_common::LockgateError;
use lockgate_core::{BlockListFilter, Services};
use lockgate_db_entities::BlockEntry;

use super::client_ip;

pub struct Api;

#[derive(Object)]
pub struct BlockInfo {
    pub id: Uuid,
    pub ip_address: String,
    pub reason: String,
    pub blocked_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Derived from `expires_at` at read time, never the stored cache.
    pub active: bool,
}

pub(crate) fn block_info(entry: BlockEntry::Model, now: DateTime<Utc>) -> BlockInfo {
    BlockInfo {
        id: entry.id,
        ip_address: entry.subject.clone(),
        reason: entry.reason.clone(),
        blocked_at: entry.created_at,
        expires_at: entry.expires_at,
        active: entry.is_effectively_active(now),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Enum)]
#[oai(rename_all = "lowercase")]
enum BlockFilter {
    Active,
    All,
}

#[derive(Object)]
struct CreateBlockRequest {
    subject: String,
    reason: String,
    /// Omitted means permanent until explicitly removed.
    duration_minutes: Option<u64>,
}

#[derive(Object)]
struct ApiErrorBody {
    message: String,
}

#[derive(ApiResponse)]
enum ListBlocksResponse {
    #[oai(status = 200)]
    Ok(Json<Vec<BlockInfo>>),
}

#[derive(ApiResponse)]
enum CreateBlockResponse {
    #[oai(status = 201)]
    Created(Json<BlockInfo>),
    #[oai(status = 400)]
    BadRequest(Json<ApiErrorBody>),
    #[oai(status = 409)]
    AlreadyBlocked(Json<ApiErrorBody>),
}

#[OpenApi]
impl Api {
    #[oai(path = "/blocks", method = "get", operation_id = "list_blocks")]
    async fn list_blocks(
        &self,
        services: Data<&Services>,
        filter: Query<Option<BlockFilter>>,
    ) -> Result<ListBlocksResponse, LockgateError> {
        let filter = match filter.0.unwrap_or(BlockFilter::Active) {
            BlockFilter::Active => BlockListFilter::ActiveOnly,
            BlockFilter::All => BlockListFilter::All,
        };
        let now = Utc::now();
        let entries = services.block_registry.list(filter).await?;
        Ok(ListBlocksResponse::Ok(Json(
            entries.into_iter().map(|e| block_info(e, now)).collect(),
        )))
    }

    #[oai(path = "/blocks", method = "post", operation_id = "create_block")]
    async fn create_block(
        &self,
        req: &poem::Request,
        services: Data<&Services>,
        #[oai(name = "X-Admin-Actor")] actor: Header<String>,
        body: Json<CreateBlockRequest>,
    ) -> Result<CreateBlockResponse, LockgateError> {
        if actor.0.trim().is_empty() {
            return Ok(CreateBlockResponse::BadRequest(Json(ApiErrorBody {
                message: "X-Admin-Actor must not be empty".to_owned(),
            })));
        }

        let duration = body.duration_minutes.map(|m| Duration::from_secs(m * 60));
        match services
            .block_registry
            .create_block(&body.subject, &body.reason, duration, &actor.0, client_ip(req))
            .await
        {
            Ok((entry, true)) => Ok(CreateBlockResponse::Created(Json(block_info(
                entry,
                Utc::now(),
            )))),
            Ok((entry, false)) => Ok(CreateBlockResponse::AlreadyBlocked(Json(ApiErrorBody {
                message: format!("{} is already blocked", entry.subject),
            }))),
            Err(LockgateError::InvalidSubject(subject)) => {
                Ok(CreateBlockResponse::BadRequest(Json(ApiErrorBody {
                    message: format!("not a valid IP address: {subject}"),
                })))
            }
            Err(err) => Err(err),
        }
    }
}
