use chrono::{DateTime, Utc};
use poem::web::Data;
use poem_openapi::param::{Header, Path};
use poem_openapi::payload::Json;
use poem_openapi::{ApiResponse, Object, OpenApi};
use lockgate_common::LockgateError;
use lockgate_core::Services;

use super::client_ip;

pub struct Api;

#[derive(Object)]
struct PenalizedCounterInfo {
    key: String,
    /// The protected login identity; same as `key` under identity keying.
    email: String,
    count: u32,
    window_start: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    last_remote_ip: String,
}

#[derive(ApiResponse)]
enum ListCountersResponse {
    #[oai(status = 200)]
    Ok(Json<Vec<PenalizedCounterInfo>>),
}

#[derive(ApiResponse)]
enum ResetCounterResponse {
    #[oai(status = 200)]
    Ok,
    #[oai(status = 400)]
    BadRequest,
    #[oai(status = 404)]
    NotFound,
}

#[OpenApi]
impl Api {
    #[oai(path = "/counters", method = "get", operation_id = "list_penalized_counters")]
    async fn list_penalized_counters(
        &self,
        services: Data<&Services>,
    ) -> Result<ListCountersResponse, LockgateError> {
        let counters = services.attempt_tracker.list_penalized().await?;
        Ok(ListCountersResponse::Ok(Json(
            counters
                .into_iter()
                .map(|c| PenalizedCounterInfo {
                    email: c.key.clone(),
                    key: c.key,
                    count: c.count.max(0) as u32,
                    window_start: c.window_start,
                    expires_at: c.expires_at,
                    last_remote_ip: c.last_remote_ip,
                })
                .collect(),
        )))
    }

    /// Clears the counter for an identity, undoing a pending automatic block
    /// without needing the block id.
    #[oai(path = "/counters/:key", method = "delete", operation_id = "reset_counter")]
    async fn reset_counter(
        &self,
        req: &poem::Request,
        services: Data<&Services>,
        key: Path<String>,
        #[oai(name = "X-Admin-Actor")] actor: Header<String>,
    ) -> Result<ResetCounterResponse, LockgateError> {
        if actor.0.trim().is_empty() {
            return Ok(ResetCounterResponse::BadRequest);
        }

        match services
            .attempt_tracker
            .reset(&key.0, &actor.0, client_ip(req))
            .await
        {
            Ok(()) => Ok(ResetCounterResponse::Ok),
            Err(LockgateError::CounterNotFound(_)) => Ok(ResetCounterResponse::NotFound),
            Err(err) => Err(err),
        }
    }
}
