use chrono::{DateTime, Utc};
use poem_openapi::{Enum, Object};
use sea_orm::entity::prelude::*;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, PartialEq, Eq, Serialize, Clone, Copy, Enum, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum LoginOutcome {
    #[sea_orm(string_value = "success")]
    Success,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "blocked")]
    Blocked,
}

/// Append-only record of one authentication attempt. Never updated or
/// deleted by the core; retention pruning is a separate sweep.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Object)]
#[sea_orm(table_name = "login_log")]
#[oai(rename = "LoginLogEntry")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Identity that was attempted (may not exist).
    pub identity: String,

    pub remote_ip: String,

    /// Best-effort geolocation hint supplied by the caller; opaque text.
    pub geolocation: Option<String>,

    pub outcome: LoginOutcome,

    /// Failure classification, e.g. "invalid-credentials" or
    /// "credential-store-unavailable".
    #[sea_orm(column_type = "Text", nullable)]
    pub reason: Option<String>,

    /// True when this failure pushed the counter over the threshold and an
    /// automatic block was created.
    pub block_created: bool,

    pub timestamp: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
