use poem::web::Data;
use poem_openapi::param::{Header, Path};
use poem_openapi::{ApiResponse, OpenApi};
use uuid::Uuid;
use lockgate_common::LockgateError;
use lockgate_core::Services;

use super::client_ip;

pub struct Api;

#[derive(ApiResponse)]
enum RemoveBlockResponse {
    #[oai(status = 200)]
    Ok,
    #[oai(status = 400)]
    BadRequest,
    #[oai(status = 404)]
    NotFound,
}

#[OpenApi]
impl Api {
    #[oai(path = "/blocks/:id", method = "delete", operation_id = "remove_block")]
    async fn remove_block(
        &self,
        req: &poem::Request,
        services: Data<&Services>,
        id: Path<Uuid>,
        #[oai(name = "X-Admin-Actor")] actor: Header<String>,
    ) -> Result<RemoveBlockResponse, LockgateError> {
        if actor.0.trim().is_empty() {
            return Ok(RemoveBlockResponse::BadRequest);
        }

        match services
            .block_registry
            .remove_block(id.0, &actor.0, client_ip(req))
            .await
        {
            Ok(_) => Ok(RemoveBlockResponse::Ok),
            Err(LockgateError::BlockNotFound(_)) => Ok(RemoveBlockResponse::NotFound),
            Err(err) => Err(err),
        }
    }
}
