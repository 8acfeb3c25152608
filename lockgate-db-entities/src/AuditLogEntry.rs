use chrono::{DateTime, Utc};
use poem_openapi::{Enum, Object};
use sea_orm::entity::prelude::*;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, PartialEq, Eq, Serialize, Clone, Copy, Enum, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum AuditAction {
    #[sea_orm(string_value = "create")]
    Create,
    #[sea_orm(string_value = "update")]
    Update,
    #[sea_orm(string_value = "delete")]
    Delete,
    #[sea_orm(string_value = "block")]
    Block,
    #[sea_orm(string_value = "unblock")]
    Unblock,
    #[sea_orm(string_value = "counter_reset")]
    CounterReset,
}

/// Write-once record of a security-relevant action.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Object)]
#[sea_orm(table_name = "audit_log")]
#[oai(rename = "AuditLogEntry")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Administrator identity, or "enforcement-gate" for automatic blocks.
    pub actor: String,

    pub action: AuditAction,

    pub entity_type: String,

    pub entity_id: Option<String>,

    /// Originating address of the actor, when known.
    pub remote_ip: Option<String>,

    pub timestamp: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
