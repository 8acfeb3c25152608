use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection};
use tokio::sync::Mutex;
use uuid::Uuid;
use lockgate_common::LockgateError;
use lockgate_db_entities::AuditLogEntry;
use lockgate_db_entities::AuditLogEntry::AuditAction;

/// One security-relevant action about to be written to the audit log.
#[derive(Clone, Debug)]
pub struct AuditEvent<'a> {
    pub actor: &'a str,
    pub action: AuditAction,
    pub entity_type: &'a str,
    pub entity_id: Option<String>,
    pub remote_ip: Option<IpAddr>,
}

/// Append-only writer for the audit log. Entries are write-once: nothing in
/// the service updates or deletes them.
pub struct AuditRecorder {
    db: Arc<Mutex<DatabaseConnection>>,
}

impl AuditRecorder {
    pub fn new(db: Arc<Mutex<DatabaseConnection>>) -> Self {
        Self { db }
    }

    pub async fn record(&self, event: AuditEvent<'_>) -> Result<AuditLogEntry::Model, LockgateError> {
        let db = self.db.lock().await;
        Self::record_with(&*db, event).await
    }

    /// Write within a caller-supplied connection, letting mutations and their
    /// audit entry share one transaction.
    pub async fn record_with<C: ConnectionTrait>(
        db: &C,
        event: AuditEvent<'_>,
    ) -> Result<AuditLogEntry::Model, LockgateError> {
        let entry = AuditLogEntry::ActiveModel {
            id: Set(Uuid::new_v4()),
            actor: Set(event.actor.to_owned()),
            action: Set(event.action),
            entity_type: Set(event.entity_type.to_owned()),
            entity_id: Set(event.entity_id),
            remote_ip: Set(event.remote_ip.map(|ip| ip.to_string())),
            timestamp: Set(Utc::now()),
        };
        Ok(entry.insert(db).await?)
    }
}
