mod api;
mod common;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use poem::listener::TcpListener;
use poem::middleware::AddData;
use poem::{EndpointExt, Route, Server};
use poem_openapi::OpenApiService;
use tracing::*;
use lockgate_core::Services;

/// Serves the pre-authentication choke point consumed by the website's
/// login form. TLS termination is left to the fronting reverse proxy.
pub struct AuthProtocolServer {
    services: Services,
}

impl AuthProtocolServer {
    pub fn new(services: &Services) -> Self {
        AuthProtocolServer {
            services: services.clone(),
        }
    }

    pub async fn run(self, address: SocketAddr) -> Result<()> {
        let api_service = OpenApiService::new(
            api::get(),
            "Lockgate Authentication API",
            env!("CARGO_PKG_VERSION"),
        )
        .server("/auth");

        let app = Route::new()
            .nest("/auth", api_service)
            .with(AddData::new(self.services.clone()));

        info!(?address, "Authentication endpoint listening");
        Server::new(TcpListener::bind(address))
            .run(app)
            .await
            .context("Failed to start authentication server")
    }
}
