use std::net::IpAddr;

use poem::Request;

/// Resolve the client address, preferring X-Forwarded-For only when the
/// deployment says the fronting proxy can be trusted.
pub(crate) fn remote_ip(req: &Request, trust_forwarded_headers: bool) -> Option<IpAddr> {
    if trust_forwarded_headers {
        if let Some(forwarded) = req.header("x-forwarded-for") {
            if let Some(first) = forwarded.split(',').next() {
                if let Ok(ip) = first.trim().parse() {
                    return Some(ip);
                }
            }
        }
    }
    req.remote_addr().as_socket_addr().map(|a| a.ip())
}
