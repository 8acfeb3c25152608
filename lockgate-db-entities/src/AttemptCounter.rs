use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "attempt_counters")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Login identity under protection (an email address). Keying by identity
    /// alone catches distributed attacks against one account from many
    /// addresses.
    #[sea_orm(unique)]
    pub key: String,

    /// Address of the most recent counted failure; the subject of the block
    /// created when the threshold is reached.
    pub last_remote_ip: String,

    /// Consecutive failures inside the current window.
    pub count: i32,

    pub window_start: DateTime<Utc>,

    /// When a block created from this counter lapses. A counter past this
    /// point is logically zero and is reset on the next recorded failure.
    pub expires_at: Option<DateTime<Utc>>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
