mod api;
mod token_auth;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use poem::listener::TcpListener;
use poem::middleware::AddData;
use poem::{EndpointExt, Route, Server};
use poem_openapi::OpenApiService;
use tracing::*;
use lockgate_core::Services;

use crate::token_auth::TokenAuthMiddleware;

pub struct AdminServer {
    services: Services,
}

impl AdminServer {
    pub fn new(services: &Services) -> Self {
        AdminServer {
            services: services.clone(),
        }
    }

    pub async fn run(self, address: SocketAddr) -> Result<()> {
        let token = {
            let config = self.services.config.lock().await;
            config.store.admin.token.clone()
        };

        let api_service = OpenApiService::new(
            api::get(),
            "Lockgate Admin API",
            env!("CARGO_PKG_VERSION"),
        )
        .server("/api");
        let spec = api_service.spec_endpoint();

        let app = Route::new()
            .nest("/api/openapi.json", spec)
            .nest("/api", api_service)
            .with(TokenAuthMiddleware::new(token))
            .with(AddData::new(self.services.clone()));

        info!(?address, "Admin API listening");
        Server::new(TcpListener::bind(address))
            .run(app)
            .await
            .context("Failed to start admin server")
    }
}
