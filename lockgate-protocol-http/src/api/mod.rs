use poem_openapi::OpenApi;

pub mod auth;

pub fn get() -> impl OpenApi {
    auth::Api
}
