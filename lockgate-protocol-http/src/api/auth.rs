use poem::web::Data;
use poem_openapi::payload::Json;
use poem_openapi::{ApiResponse, Object, OpenApi};
use tracing::*;
use lockgate_common::Secret;
use lockgate_core::{LoginDecision, LoginRequest, Services};

use crate::common::remote_ip;

pub struct Api;

#[derive(Object)]
struct LoginRequestBody {
    identity: String,
    password: Secret<String>,
    /// Best-effort geolocation hint from the caller, stored opaquely in the
    /// login log.
    geolocation: Option<String>,
}

#[derive(Object)]
struct LoginFailureBody {
    message: String,
}

#[derive(ApiResponse)]
enum LoginResponse {
    #[oai(status = 200)]
    Ok,
    #[oai(status = 401)]
    Failure(Json<LoginFailureBody>),
}

/// The one denial body for every non-success outcome. Blocked addresses must
/// not be distinguishable from wrong credentials.
fn generic_failure() -> LoginResponse {
    LoginResponse::Failure(Json(LoginFailureBody {
        message: "Authentication failed".to_owned(),
    }))
}

#[OpenApi]
impl Api {
    #[oai(path = "/login", method = "post", operation_id = "login")]
    async fn login(
        &self,
        req: &poem::Request,
        services: Data<&Services>,
        body: Json<LoginRequestBody>,
    ) -> LoginResponse {
        let trust_forwarded = {
            let config = services.config.lock().await;
            config.store.http.trust_x_forwarded_headers
        };
        let Some(ip) = remote_ip(req, trust_forwarded) else {
            warn!("Could not resolve client address, denying login");
            return generic_failure();
        };

        let request = LoginRequest {
            identity: body.0.identity,
            password: body.0.password,
            remote_ip: ip,
            geolocation: body.0.geolocation,
        };

        match services.gate.authenticate(&request).await {
            Ok(LoginDecision::Allowed) => LoginResponse::Ok,
            Ok(LoginDecision::Denied(_)) => generic_failure(),
            Err(error) => {
                // Fail closed; the gate has already logged the details.
                error!(?error, identity = %request.identity, "Login check failed");
                generic_failure()
            }
        }
    }
}
