use poem_openapi::payload::Json;
use poem_openapi::{ApiResponse, Object, OpenApi};
use serde::Serialize;

pub struct Api;

#[derive(Serialize, Object)]
pub struct Info {
    version: String,
}

#[derive(ApiResponse)]
enum InfoResponse {
    #[oai(status = 200)]
    Ok(Json<Info>),
}

#[OpenApi]
impl Api {
    #[oai(path = "/info", method = "get", operation_id = "get_info")]
    async fn api_get_info(&self) -> InfoResponse {
        InfoResponse::Ok(Json(Info {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }))
    }
}
