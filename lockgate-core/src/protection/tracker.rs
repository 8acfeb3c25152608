use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, SqlErr, TransactionTrait,
};
use tokio::sync::Mutex;
use tracing::*;
use uuid::Uuid;
use lockgate_common::{LockgateError, ProtectionConfig};
use lockgate_db_entities::AttemptCounter;
use lockgate_db_entities::AuditLogEntry::AuditAction;

use crate::recorder::{AuditEvent, AuditRecorder};

/// Per-identity failure counting over a sliding window.
///
/// Counting only: the threshold decision and block creation live in the
/// enforcement gate, so the policy can be tuned without touching the counting
/// mechanics here. Every increment is a single read-modify-write transaction,
/// retried a bounded number of times when it loses to a concurrent writer -
/// dropping a failure count silently would weaken the protection.
pub struct AttemptTracker {
    db: Arc<Mutex<DatabaseConnection>>,
    config: ProtectionConfig,
}

fn is_race_lost(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        // Two first failures for the same key raced on the unique index;
        // the loser retries and lands on the increment path.
        return true;
    }
    err.to_string().contains("database is locked")
}

impl AttemptTracker {
    pub fn new(db: Arc<Mutex<DatabaseConnection>>, config: ProtectionConfig) -> Self {
        Self { db, config }
    }

    /// Count one failed attempt for `identity`, returning the post-increment
    /// count. A counter whose window or block expiry has lapsed is reset
    /// before counting, so stale counts never carry over.
    pub async fn record_failure(
        &self,
        identity: &str,
        remote_ip: &IpAddr,
    ) -> Result<u32, LockgateError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_record_failure(identity, remote_ip).await {
                Ok(count) => return Ok(count),
                Err(LockgateError::DatabaseError(err))
                    if is_race_lost(&err) && attempt < self.config.increment_retries =>
                {
                    debug!(%identity, attempt, "Counter update lost a race, retrying");
                    continue;
                }
                Err(LockgateError::DatabaseError(err)) if is_race_lost(&err) => {
                    return Err(LockgateError::RaceLost);
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_record_failure(
        &self,
        identity: &str,
        remote_ip: &IpAddr,
    ) -> Result<u32, LockgateError> {
        let db = self.db.lock().await;
        let txn = db.begin().await?;
        let now = Utc::now();
        let window =
            chrono::Duration::from_std(self.config.failure_window).map_err(LockgateError::other)?;

        let existing = AttemptCounter::Entity::find()
            .filter(AttemptCounter::Column::Key.eq(identity))
            .one(&txn)
            .await?;

        let count = match existing {
            Some(counter) => {
                let lapsed = counter.expires_at.map(|e| now >= e).unwrap_or(false)
                    || now - counter.window_start > window;
                let count = if lapsed { 1 } else { counter.count + 1 };

                let mut model: AttemptCounter::ActiveModel = counter.into();
                model.count = Set(count);
                model.last_remote_ip = Set(remote_ip.to_string());
                model.updated_at = Set(now);
                if lapsed {
                    model.window_start = Set(now);
                    model.expires_at = Set(None);
                }
                model.update(&txn).await?;
                count
            }
            None => {
                AttemptCounter::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    key: Set(identity.to_owned()),
                    last_remote_ip: Set(remote_ip.to_string()),
                    count: Set(1),
                    window_start: Set(now),
                    expires_at: Set(None),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?;
                1
            }
        };

        txn.commit().await?;
        Ok(count as u32)
    }

    /// Forget all failures for `identity`. Idempotent.
    pub async fn record_success(&self, identity: &str) -> Result<(), LockgateError> {
        let db = self.db.lock().await;
        AttemptCounter::Entity::delete_many()
            .filter(AttemptCounter::Column::Key.eq(identity))
            .exec(&*db)
            .await?;
        Ok(())
    }

    /// Stamp the counter with the expiry of the block it just triggered, so
    /// the count lapses together with the block.
    pub async fn mark_blocked(
        &self,
        identity: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), LockgateError> {
        let db = self.db.lock().await;
        AttemptCounter::Entity::update_many()
            .col_expr(
                AttemptCounter::Column::ExpiresAt,
                sea_orm::sea_query::Expr::value(expires_at),
            )
            .filter(AttemptCounter::Column::Key.eq(identity))
            .exec(&*db)
            .await?;
        Ok(())
    }

    /// Admin reset: clears the counter entirely, undoing a pending automatic
    /// block without needing the derived block id. `CounterNotFound` when
    /// there is nothing to reset; no audit entry is written in that case.
    pub async fn reset(
        &self,
        identity: &str,
        actor: &str,
        actor_ip: Option<IpAddr>,
    ) -> Result<(), LockgateError> {
        let db = self.db.lock().await;
        let txn = db.begin().await?;

        let removed = AttemptCounter::Entity::delete_many()
            .filter(AttemptCounter::Column::Key.eq(identity))
            .exec(&txn)
            .await?;

        if removed.rows_affected == 0 {
            return Err(LockgateError::CounterNotFound(identity.to_owned()));
        }

        AuditRecorder::record_with(
            &txn,
            AuditEvent {
                actor,
                action: AuditAction::CounterReset,
                entity_type: "attempt_counter",
                entity_id: Some(identity.to_owned()),
                remote_ip: actor_ip,
            },
        )
        .await?;

        txn.commit().await?;

        info!(%identity, %actor, "Attempt counter reset");
        Ok(())
    }

    /// Counters worth an operator's attention: at or above the reporting
    /// level inside a live window, or still backing an active block.
    pub async fn list_penalized(&self) -> Result<Vec<AttemptCounter::Model>, LockgateError> {
        let db = self.db.lock().await;
        let now = Utc::now();
        let window =
            chrono::Duration::from_std(self.config.failure_window).map_err(LockgateError::other)?;

        Ok(AttemptCounter::Entity::find()
            .filter(
                Condition::any()
                    .add(AttemptCounter::Column::ExpiresAt.gt(now))
                    .add(
                        Condition::all()
                            .add(AttemptCounter::Column::ExpiresAt.is_null())
                            .add(
                                AttemptCounter::Column::Count
                                    .gte(self.config.report_threshold as i32),
                            )
                            .add(AttemptCounter::Column::WindowStart.gte(now - window)),
                    ),
            )
            .order_by_desc(AttemptCounter::Column::UpdatedAt)
            .all(&*db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::PaginatorTrait;
    use lockgate_db_entities::AuditLogEntry;

    use crate::test_support::{test_db, test_protection_config};

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_failures_count_up_within_window() {
        let db = test_db().await;
        let tracker = AttemptTracker::new(db, test_protection_config());

        for expected in 1..=4 {
            let count = tracker
                .record_failure("user@example.com", &ip("10.0.0.5"))
                .await
                .unwrap();
            assert_eq!(count, expected);
        }
    }

    #[tokio::test]
    async fn test_success_resets_count_to_zero() {
        let db = test_db().await;
        let tracker = AttemptTracker::new(db, test_protection_config());

        tracker.record_failure("user@example.com", &ip("10.0.0.5")).await.unwrap();
        tracker.record_failure("user@example.com", &ip("10.0.0.5")).await.unwrap();
        tracker.record_success("user@example.com").await.unwrap();

        // Counting starts over, not from a residue
        let count = tracker
            .record_failure("user@example.com", &ip("10.0.0.5"))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_record_success_is_idempotent() {
        let db = test_db().await;
        let tracker = AttemptTracker::new(db, test_protection_config());

        tracker.record_success("never-failed@example.com").await.unwrap();
        tracker.record_success("never-failed@example.com").await.unwrap();
    }

    #[tokio::test]
    async fn test_elapsed_window_resets_before_counting() {
        let db = test_db().await;
        let tracker = AttemptTracker::new(db.clone(), test_protection_config());

        {
            let db = db.lock().await;
            let now = Utc::now();
            AttemptCounter::ActiveModel {
                id: Set(Uuid::new_v4()),
                key: Set("user@example.com".to_owned()),
                last_remote_ip: Set("10.0.0.5".to_owned()),
                count: Set(4),
                window_start: Set(now - chrono::Duration::minutes(10)),
                expires_at: Set(None),
                updated_at: Set(now - chrono::Duration::minutes(10)),
            }
            .insert(&*db)
            .await
            .unwrap();
        }

        let count = tracker
            .record_failure("user@example.com", &ip("10.0.0.5"))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_lapsed_block_expiry_resets_counter() {
        let db = test_db().await;
        let tracker = AttemptTracker::new(db.clone(), test_protection_config());

        {
            let db = db.lock().await;
            let now = Utc::now();
            AttemptCounter::ActiveModel {
                id: Set(Uuid::new_v4()),
                key: Set("user@example.com".to_owned()),
                last_remote_ip: Set("10.0.0.5".to_owned()),
                count: Set(7),
                window_start: Set(now - chrono::Duration::seconds(5)),
                expires_at: Set(Some(now - chrono::Duration::seconds(1))),
                updated_at: Set(now - chrono::Duration::seconds(5)),
            }
            .insert(&*db)
            .await
            .unwrap();
        }

        let count = tracker
            .record_failure("user@example.com", &ip("10.0.0.5"))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_failures_are_both_counted() {
        let db = test_db().await;
        let tracker = Arc::new(AttemptTracker::new(db, test_protection_config()));

        let a = tokio::spawn({
            let tracker = tracker.clone();
            async move { tracker.record_failure("user@example.com", &ip("10.0.0.5")).await }
        });
        let b = tokio::spawn({
            let tracker = tracker.clone();
            async move { tracker.record_failure("user@example.com", &ip("10.0.0.6")).await }
        });

        let mut counts = vec![a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];
        counts.sort_unstable();
        assert_eq!(counts, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_reset_missing_counter_reports_not_found_without_audit() {
        let db = test_db().await;
        let tracker = AttemptTracker::new(db.clone(), test_protection_config());

        let err = tracker
            .reset("ghost@example.com", "alice", None)
            .await
            .unwrap_err();
        assert!(matches!(err, LockgateError::CounterNotFound(_)));

        let db = db.lock().await;
        assert_eq!(AuditLogEntry::Entity::find().count(&*db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reset_clears_counter_and_audits_once() {
        let db = test_db().await;
        let tracker = AttemptTracker::new(db.clone(), test_protection_config());

        tracker.record_failure("user@example.com", &ip("10.0.0.5")).await.unwrap();
        tracker.reset("user@example.com", "alice", None).await.unwrap();

        let count = tracker
            .record_failure("user@example.com", &ip("10.0.0.5"))
            .await
            .unwrap();
        assert_eq!(count, 1);

        let db = db.lock().await;
        let resets = AuditLogEntry::Entity::find()
            .filter(AuditLogEntry::Column::Action.eq(AuditAction::CounterReset))
            .count(&*db)
            .await
            .unwrap();
        assert_eq!(resets, 1);
    }

    #[tokio::test]
    async fn test_penalized_listing_reports_near_threshold_counters() {
        let db = test_db().await;
        let tracker = AttemptTracker::new(db, test_protection_config());

        tracker.record_failure("quiet@example.com", &ip("10.0.0.1")).await.unwrap();
        for _ in 0..3 {
            tracker.record_failure("noisy@example.com", &ip("10.0.0.2")).await.unwrap();
        }

        let penalized = tracker.list_penalized().await.unwrap();
        assert_eq!(penalized.len(), 1);
        assert_eq!(penalized[0].key, "noisy@example.com");
    }
}
