use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, DatabaseConnection};
use tokio::sync::Mutex;
use uuid::Uuid;
use lockgate_common::LockgateError;
use lockgate_db_entities::LoginLogEntry;
use lockgate_db_entities::LoginLogEntry::LoginOutcome;

/// One authentication attempt about to be written to the login log.
#[derive(Clone, Debug)]
pub struct LoginEvent {
    pub identity: String,
    pub remote_ip: IpAddr,
    pub geolocation: Option<String>,
    pub outcome: LoginOutcome,
    pub reason: Option<String>,
    pub block_created: bool,
}

/// Append-only writer for the login log.
pub struct LoginRecorder {
    db: Arc<Mutex<DatabaseConnection>>,
}

impl LoginRecorder {
    pub fn new(db: Arc<Mutex<DatabaseConnection>>) -> Self {
        Self { db }
    }

    pub async fn record(&self, event: LoginEvent) -> Result<LoginLogEntry::Model, LockgateError> {
        let db = self.db.lock().await;
        let entry = LoginLogEntry::ActiveModel {
            id: Set(Uuid::new_v4()),
            identity: Set(event.identity),
            remote_ip: Set(event.remote_ip.to_string()),
            geolocation: Set(event.geolocation),
            outcome: Set(event.outcome),
            reason: Set(event.reason),
            block_created: Set(event.block_created),
            timestamp: Set(Utc::now()),
        };
        Ok(entry.insert(&*db).await?)
    }
}
