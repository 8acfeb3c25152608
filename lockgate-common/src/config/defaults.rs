use std::net::ToSocketAddrs;
use std::time::Duration;

use crate::{ListenEndpoint, Secret};

pub(crate) const fn _default_true() -> bool {
    true
}

pub(crate) const fn _default_false() -> bool {
    false
}

#[inline]
pub(crate) fn _default_database_url() -> Secret<String> {
    Secret::new("sqlite:data/db".to_owned())
}

#[inline]
pub(crate) fn _default_auth_listen() -> ListenEndpoint {
    #[allow(clippy::unwrap_used)]
    ListenEndpoint("0.0.0.0:8440".to_socket_addrs().unwrap().next().unwrap())
}

#[inline]
pub(crate) fn _default_admin_listen() -> ListenEndpoint {
    #[allow(clippy::unwrap_used)]
    ListenEndpoint("127.0.0.1:8441".to_socket_addrs().unwrap().next().unwrap())
}

pub(crate) const fn _default_failure_threshold() -> u32 {
    5
}

#[inline]
pub(crate) fn _default_failure_window() -> Duration {
    Duration::from_secs(60)
}

#[inline]
pub(crate) fn _default_block_duration() -> Duration {
    Duration::from_secs(60 * 15)
}

pub(crate) const fn _default_report_threshold() -> u32 {
    3
}

pub(crate) const fn _default_increment_retries() -> u32 {
    3
}

#[inline]
pub(crate) fn _default_login_log_retention() -> Duration {
    Duration::from_secs(60 * 60 * 24 * 30)
}

#[inline]
pub(crate) fn _default_block_history_retention() -> Duration {
    Duration::from_secs(60 * 60 * 24 * 90)
}

#[inline]
pub(crate) fn _default_cleanup_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

#[inline]
pub(crate) fn _default_credential_store_timeout() -> Duration {
    Duration::from_secs(5)
}
