use std::net::IpAddr;

use poem_openapi::OpenApi;

pub mod audit;
pub mod blocks_detail;
pub mod blocks_list;
pub mod counters;
pub mod info;
pub mod logs;
mod pagination;
pub mod status;

pub fn get() -> impl OpenApi {
    (
        blocks_list::Api,
        blocks_detail::Api,
        counters::Api,
        logs::Api,
        audit::Api,
        status::Api,
        info::Api,
    )
}

/// Originating address of the admin console call, for audit attribution.
pub(crate) fn client_ip(req: &poem::Request) -> Option<IpAddr> {
    req.remote_addr().as_socket_addr().map(|a| a.ip())
}
