use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use tokio::sync::Mutex;
use tracing::*;
use uuid::Uuid;
use lockgate_common::LockgateError;
use lockgate_db_entities::AuditLogEntry::AuditAction;
use lockgate_db_entities::BlockEntry;

use crate::recorder::{AuditEvent, AuditRecorder};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockListFilter {
    ActiveOnly,
    All,
}

/// Single source of truth for "is this address currently blocked".
///
/// Entries are deactivated, never deleted, by expiry or explicit removal;
/// history stays queryable. Activity is always re-derived from `removed_at`
/// and `expires_at` against current time - the stored `active` column is a
/// display cache that list reads refresh lazily.
pub struct BlockRegistry {
    db: Arc<Mutex<DatabaseConnection>>,
}

fn effectively_active(now: DateTime<Utc>) -> Condition {
    Condition::all()
        .add(BlockEntry::Column::RemovedAt.is_null())
        .add(
            Condition::any()
                .add(BlockEntry::Column::ExpiresAt.is_null())
                .add(BlockEntry::Column::ExpiresAt.gt(now)),
        )
}

impl BlockRegistry {
    pub fn new(db: Arc<Mutex<DatabaseConnection>>) -> Self {
        Self { db }
    }

    /// Insert a block for `subject`. `duration` absent means permanent until
    /// explicitly removed. If an effectively-active block for the subject
    /// already exists it is returned unchanged (`false` in the result), so
    /// concurrent threshold crossings cannot stack up duplicates.
    ///
    /// One audit entry is written in the same transaction as the insert;
    /// `actor` is the administrator identity or [`crate::GATE_ACTOR`].
    pub async fn create_block(
        &self,
        subject: &str,
        reason: &str,
        duration: Option<Duration>,
        actor: &str,
        actor_ip: Option<IpAddr>,
    ) -> Result<(BlockEntry::Model, bool), LockgateError> {
        let address: IpAddr = subject
            .trim()
            .parse()
            .map_err(|_| LockgateError::InvalidSubject(subject.to_owned()))?;

        let db = self.db.lock().await;
        let txn = db.begin().await?;
        let now = Utc::now();

        let existing = BlockEntry::Entity::find()
            .filter(BlockEntry::Column::Subject.eq(address.to_string()))
            .filter(effectively_active(now))
            .one(&txn)
            .await?;

        if let Some(existing) = existing {
            txn.commit().await?;
            debug!(subject = %address, id = %existing.id, "Block already active, not duplicating");
            return Ok((existing, false));
        }

        let expires_at = duration
            .map(chrono::Duration::from_std)
            .transpose()
            .map_err(LockgateError::other)?
            .map(|d| now + d);

        let entry = BlockEntry::ActiveModel {
            id: Set(Uuid::new_v4()),
            subject: Set(address.to_string()),
            reason: Set(reason.to_owned()),
            created_at: Set(now),
            expires_at: Set(expires_at),
            active: Set(true),
            removed_at: Set(None),
            removed_by: Set(None),
        };
        let entry = entry.insert(&txn).await?;

        AuditRecorder::record_with(
            &txn,
            AuditEvent {
                actor,
                action: AuditAction::Block,
                entity_type: "block_entry",
                entity_id: Some(entry.id.to_string()),
                remote_ip: actor_ip,
            },
        )
        .await?;

        txn.commit().await?;

        info!(
            subject = %address,
            id = %entry.id,
            expires_at = ?entry.expires_at,
            %actor,
            "Address blocked"
        );

        Ok((entry, true))
    }

    /// The only read the enforcement gate uses. Re-derives activity from
    /// `expires_at` on every call; the stored flag is never consulted.
    pub async fn is_blocked(
        &self,
        subject: &IpAddr,
    ) -> Result<Option<BlockEntry::Model>, LockgateError> {
        let db = self.db.lock().await;
        let now = Utc::now();
        Ok(BlockEntry::Entity::find()
            .filter(BlockEntry::Column::Subject.eq(subject.to_string()))
            .filter(effectively_active(now))
            .one(&*db)
            .await?)
    }

    /// Deactivate a block immediately, regardless of its expiry. Fails with
    /// `BlockNotFound` when the id is unknown or the entry is already
    /// inactive - in which case no audit entry is written.
    pub async fn remove_block(
        &self,
        id: Uuid,
        actor: &str,
        actor_ip: Option<IpAddr>,
    ) -> Result<BlockEntry::Model, LockgateError> {
        let db = self.db.lock().await;
        let txn = db.begin().await?;
        let now = Utc::now();

        let entry = BlockEntry::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(LockgateError::BlockNotFound(id))?;

        if !entry.is_effectively_active(now) {
            return Err(LockgateError::BlockNotFound(id));
        }

        let subject = entry.subject.clone();
        let mut model: BlockEntry::ActiveModel = entry.into();
        model.active = Set(false);
        model.removed_at = Set(Some(now));
        model.removed_by = Set(Some(actor.to_owned()));
        let entry = model.update(&txn).await?;

        AuditRecorder::record_with(
            &txn,
            AuditEvent {
                actor,
                action: AuditAction::Unblock,
                entity_type: "block_entry",
                entity_id: Some(id.to_string()),
                remote_ip: actor_ip,
            },
        )
        .await?;

        txn.commit().await?;

        info!(%subject, %id, %actor, "Address unblocked");
        Ok(entry)
    }

    /// Enumeration for the admin console, newest first. Reading also flips
    /// the stored `active` flag on entries whose expiry has passed - the lazy
    /// reclassification that keeps the cache honest without a background
    /// sweep.
    pub async fn list(
        &self,
        filter: BlockListFilter,
    ) -> Result<Vec<BlockEntry::Model>, LockgateError> {
        let db = self.db.lock().await;
        let now = Utc::now();

        let mut entries = match filter {
            BlockListFilter::ActiveOnly => {
                BlockEntry::Entity::find()
                    .filter(effectively_active(now))
                    .order_by_desc(BlockEntry::Column::CreatedAt)
                    .all(&*db)
                    .await?
            }
            BlockListFilter::All => {
                BlockEntry::Entity::find()
                    .order_by_desc(BlockEntry::Column::CreatedAt)
                    .all(&*db)
                    .await?
            }
        };

        let stale: Vec<Uuid> = entries
            .iter()
            .filter(|e| e.active && !e.is_effectively_active(now))
            .map(|e| e.id)
            .collect();

        if !stale.is_empty() {
            BlockEntry::Entity::update_many()
                .col_expr(BlockEntry::Column::Active, sea_orm::sea_query::Expr::value(false))
                .filter(BlockEntry::Column::Id.is_in(stale.clone()))
                .exec(&*db)
                .await?;
            for entry in entries.iter_mut() {
                if stale.contains(&entry.id) {
                    entry.active = false;
                }
            }
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::PaginatorTrait;
    use lockgate_db_entities::AuditLogEntry;

    use crate::test_support::test_db;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_create_and_check_permanent_block() {
        let db = test_db().await;
        let registry = BlockRegistry::new(db.clone());

        let (entry, created) = registry
            .create_block("192.168.1.100", "Suspicious activity", None, "alice", None)
            .await
            .unwrap();
        assert!(created);
        assert_eq!(entry.expires_at, None);

        let hit = registry.is_blocked(&ip("192.168.1.100")).await.unwrap();
        assert_eq!(hit.map(|e| e.id), Some(entry.id));
        assert!(registry.is_blocked(&ip("192.168.1.101")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_subject_is_rejected() {
        let db = test_db().await;
        let registry = BlockRegistry::new(db.clone());

        let err = registry
            .create_block("not-an-ip", "manual", None, "alice", None)
            .await
            .unwrap_err();
        assert!(matches!(err, LockgateError::InvalidSubject(_)));
    }

    #[tokio::test]
    async fn test_expired_block_reports_unblocked_without_removal() {
        let db = test_db().await;
        let registry = BlockRegistry::new(db.clone());

        // Backdate an entry so its expiry has already passed
        {
            let db = db.lock().await;
            let now = Utc::now();
            BlockEntry::ActiveModel {
                id: Set(Uuid::new_v4()),
                subject: Set("10.0.0.5".to_owned()),
                reason: Set("threshold-exceeded:user@example.com".to_owned()),
                created_at: Set(now - chrono::Duration::hours(2)),
                expires_at: Set(Some(now - chrono::Duration::minutes(1))),
                active: Set(true),
                removed_at: Set(None),
                removed_by: Set(None),
            }
            .insert(&*db)
            .await
            .unwrap();
        }

        assert!(registry.is_blocked(&ip("10.0.0.5")).await.unwrap().is_none());

        // The row is still there for history, and listing flips its cache flag
        let all = registry.list(BlockListFilter::All).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].active);
        assert!(registry.list(BlockListFilter::ActiveOnly).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_block_is_idempotent_failure_on_second_call() {
        let db = test_db().await;
        let registry = BlockRegistry::new(db.clone());

        let (entry, _) = registry
            .create_block("10.1.2.3", "manual", Some(Duration::from_secs(3600)), "alice", None)
            .await
            .unwrap();

        registry.remove_block(entry.id, "alice", None).await.unwrap();
        assert!(registry.is_blocked(&ip("10.1.2.3")).await.unwrap().is_none());

        let err = registry.remove_block(entry.id, "alice", None).await.unwrap_err();
        assert!(matches!(err, LockgateError::BlockNotFound(id) if id == entry.id));

        // Exactly one unblock audit entry despite two calls
        let db = db.lock().await;
        let unblocks = AuditLogEntry::Entity::find()
            .filter(AuditLogEntry::Column::Action.eq(AuditAction::Unblock))
            .count(&*db)
            .await
            .unwrap();
        assert_eq!(unblocks, 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_returns_existing_block() {
        let db = test_db().await;
        let registry = BlockRegistry::new(db.clone());

        let (first, created) = registry
            .create_block("10.9.9.9", "manual", Some(Duration::from_secs(600)), "alice", None)
            .await
            .unwrap();
        assert!(created);

        let (second, created) = registry
            .create_block("10.9.9.9", "manual again", Some(Duration::from_secs(600)), "bob", None)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);

        let db = db.lock().await;
        let rows = BlockEntry::Entity::find().count(&*db).await.unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_every_mutation_leaves_an_attributed_audit_entry() {
        let db = test_db().await;
        let registry = BlockRegistry::new(db.clone());

        let (entry, _) = registry
            .create_block("172.16.0.1", "manual", None, "alice", Some(ip("198.51.100.7")))
            .await
            .unwrap();
        registry
            .remove_block(entry.id, "bob", Some(ip("198.51.100.8")))
            .await
            .unwrap();

        let db = db.lock().await;
        let entries = AuditLogEntry::Entity::find().all(&*db).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| !e.actor.is_empty()));
        assert!(entries.iter().any(|e| e.action == AuditAction::Block
            && e.remote_ip.as_deref() == Some("198.51.100.7")));
        assert!(entries.iter().any(|e| e.action == AuditAction::Unblock
            && e.actor == "bob"));
    }
}
