use std::net::IpAddr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::*;
use lockgate_common::{LockgateError, ProtectionConfig, Secret};
use lockgate_db_entities::LoginLogEntry::LoginOutcome;

use crate::recorder::{LoginEvent, LoginRecorder};
use crate::verifier::{CredentialVerifier, CredentialVerifierEnum};

use super::registry::BlockRegistry;
use super::tracker::AttemptTracker;

/// Audit/reason attribution for blocks created by the gate itself.
pub const GATE_ACTOR: &str = "enforcement-gate";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenialReason {
    /// Wrong credentials (or unknown identity).
    Credentials,
    /// The originating address is blocked. Callers must present this to the
    /// end user identically to `Credentials`.
    Blocked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginDecision {
    Allowed,
    Denied(DenialReason),
}

#[derive(Clone, Debug)]
pub struct LoginRequest {
    pub identity: String,
    pub password: Secret<String>,
    pub remote_ip: IpAddr,
    pub geolocation: Option<String>,
}

/// The choke point every login request passes through, terminal within one
/// request:
///
/// 1. blocked address -> denied, logged as BLOCKED, counters untouched;
/// 2. credential check -> success resets the counter and allows;
/// 3. failure counts once and, at the threshold, blocks the address.
///
/// Store errors fail closed: the request is denied, and no failure is
/// counted for infrastructure problems.
pub struct EnforcementGate {
    config: ProtectionConfig,
    registry: Arc<BlockRegistry>,
    tracker: Arc<AttemptTracker>,
    login_log: Arc<LoginRecorder>,
    verifier: Arc<Mutex<CredentialVerifierEnum>>,
}

impl EnforcementGate {
    pub fn new(
        config: ProtectionConfig,
        registry: Arc<BlockRegistry>,
        tracker: Arc<AttemptTracker>,
        login_log: Arc<LoginRecorder>,
        verifier: Arc<Mutex<CredentialVerifierEnum>>,
    ) -> Self {
        Self {
            config,
            registry,
            tracker,
            login_log,
            verifier,
        }
    }

    pub async fn authenticate(
        &self,
        request: &LoginRequest,
    ) -> Result<LoginDecision, LockgateError> {
        if self.config.enabled {
            let blocked = match self.registry.is_blocked(&request.remote_ip).await {
                Ok(blocked) => blocked,
                Err(err) => return Err(self.fail_closed(request, err).await),
            };
            if let Some(block) = blocked {
                info!(
                    identity = %request.identity,
                    ip = %request.remote_ip,
                    block_id = %block.id,
                    "Login attempt from blocked address denied"
                );
                self.login_log
                    .record(LoginEvent {
                        identity: request.identity.clone(),
                        remote_ip: request.remote_ip,
                        geolocation: request.geolocation.clone(),
                        outcome: LoginOutcome::Blocked,
                        reason: Some("subject-blocked".to_owned()),
                        block_created: false,
                    })
                    .await?;
                // Counters stay untouched: attempts from a blocked address
                // must not show up as new counted failures.
                return Ok(LoginDecision::Denied(DenialReason::Blocked));
            }
        }

        let valid = {
            let mut verifier = self.verifier.lock().await;
            match verifier.verify(&request.identity, &request.password).await {
                Ok(valid) => valid,
                Err(err) => {
                    warn!(
                        identity = %request.identity,
                        ip = %request.remote_ip,
                        error = %err,
                        "Credential store failure, denying login"
                    );
                    return Err(self.fail_closed(request, err).await);
                }
            }
        };

        if valid {
            if self.config.enabled {
                if let Err(err) = self.tracker.record_success(&request.identity).await {
                    return Err(self.fail_closed(request, err).await);
                }
            }
            self.login_log
                .record(LoginEvent {
                    identity: request.identity.clone(),
                    remote_ip: request.remote_ip,
                    geolocation: request.geolocation.clone(),
                    outcome: LoginOutcome::Success,
                    reason: None,
                    block_created: false,
                })
                .await?;
            return Ok(LoginDecision::Allowed);
        }

        let mut block_created = false;
        if self.config.enabled {
            let count = match self
                .tracker
                .record_failure(&request.identity, &request.remote_ip)
                .await
            {
                Ok(count) => count,
                Err(err) => return Err(self.fail_closed(request, err).await),
            };

            if count >= self.config.failure_threshold {
                let reason = format!("threshold-exceeded:{}", request.identity);
                let result = self
                    .registry
                    .create_block(
                        &request.remote_ip.to_string(),
                        &reason,
                        Some(self.config.block_duration),
                        GATE_ACTOR,
                        None,
                    )
                    .await;
                let (block, created) = match result {
                    Ok(r) => r,
                    Err(err) => return Err(self.fail_closed(request, err).await),
                };
                if let Err(err) = self
                    .tracker
                    .mark_blocked(&request.identity, block.expires_at)
                    .await
                {
                    return Err(self.fail_closed(request, err).await);
                }
                block_created = created;
                if created {
                    warn!(
                        identity = %request.identity,
                        ip = %request.remote_ip,
                        count,
                        block_id = %block.id,
                        "Failure threshold exceeded, address blocked"
                    );
                }
            }
        }

        self.login_log
            .record(LoginEvent {
                identity: request.identity.clone(),
                remote_ip: request.remote_ip,
                geolocation: request.geolocation.clone(),
                outcome: LoginOutcome::Failed,
                reason: Some("invalid-credentials".to_owned()),
                block_created,
            })
            .await?;

        Ok(LoginDecision::Denied(DenialReason::Credentials))
    }

    /// Best-effort FAILED log entry before propagating, so security-relevant
    /// failures are never silently dropped. The original error wins even if
    /// the log write fails too.
    async fn fail_closed(&self, request: &LoginRequest, err: LockgateError) -> LockgateError {
        let reason = match &err {
            LockgateError::CredentialStoreUnavailable(_) => "credential-store-unavailable",
            LockgateError::StoreUnavailable(_) => "store-unavailable",
            _ => "internal-error",
        };
        if let Err(log_err) = self
            .login_log
            .record(LoginEvent {
                identity: request.identity.clone(),
                remote_ip: request.remote_ip,
                geolocation: request.geolocation.clone(),
                outcome: LoginOutcome::Failed,
                reason: Some(reason.to_owned()),
                block_created: false,
            })
            .await
        {
            error!(error = %log_err, "Failed to write login log entry for failed request");
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
    use lockgate_common::helpers::hash::hash_password;
    use lockgate_db_entities::{AttemptCounter, BlockEntry, LoginLogEntry};

    use super::*;
    use crate::test_support::{test_db, test_protection_config};
    use crate::verifier::{HttpCredentialVerifier, StaticCredentialVerifier};

    struct Fixture {
        db: Arc<Mutex<sea_orm::DatabaseConnection>>,
        gate: EnforcementGate,
        registry: Arc<BlockRegistry>,
    }

    async fn fixture_with(verifier: CredentialVerifierEnum, config: ProtectionConfig) -> Fixture {
        let db = test_db().await;
        let registry = Arc::new(BlockRegistry::new(db.clone()));
        let tracker = Arc::new(AttemptTracker::new(db.clone(), config.clone()));
        let login_log = Arc::new(LoginRecorder::new(db.clone()));
        let gate = EnforcementGate::new(
            config,
            registry.clone(),
            tracker,
            login_log,
            Arc::new(Mutex::new(verifier)),
        );
        Fixture { db, gate, registry }
    }

    async fn fixture() -> Fixture {
        let verifier = StaticCredentialVerifier::new([(
            "user@example.com".to_owned(),
            Secret::new(hash_password("correct-horse")),
        )]);
        fixture_with(verifier.into(), test_protection_config()).await
    }

    fn request(password: &str) -> LoginRequest {
        LoginRequest {
            identity: "user@example.com".to_owned(),
            password: Secret::new(password.to_owned()),
            remote_ip: "10.0.0.5".parse().unwrap(),
            geolocation: None,
        }
    }

    async fn counter_count(db: &Arc<Mutex<sea_orm::DatabaseConnection>>) -> Option<i32> {
        let db = db.lock().await;
        AttemptCounter::Entity::find()
            .filter(AttemptCounter::Column::Key.eq("user@example.com"))
            .one(&*db)
            .await
            .unwrap()
            .map(|c| c.count)
    }

    #[tokio::test]
    async fn test_fifth_failure_blocks_the_address_but_fourth_does_not() {
        let f = fixture().await;

        for _ in 0..4 {
            let decision = f.gate.authenticate(&request("wrong")).await.unwrap();
            assert_eq!(decision, LoginDecision::Denied(DenialReason::Credentials));
        }
        assert!(f
            .registry
            .is_blocked(&"10.0.0.5".parse().unwrap())
            .await
            .unwrap()
            .is_none());

        let decision = f.gate.authenticate(&request("wrong")).await.unwrap();
        assert_eq!(decision, LoginDecision::Denied(DenialReason::Credentials));

        let block = f
            .registry
            .is_blocked(&"10.0.0.5".parse().unwrap())
            .await
            .unwrap()
            .expect("fifth failure must block");
        assert!(block.reason.contains("threshold-exceeded:user@example.com"));
        assert!(block.expires_at.is_some());

        // The fifth failure's log entry records the block creation
        let db = f.db.lock().await;
        let flagged = LoginLogEntry::Entity::find()
            .filter(LoginLogEntry::Column::BlockCreated.eq(true))
            .count(&*db)
            .await
            .unwrap();
        assert_eq!(flagged, 1);
    }

    #[tokio::test]
    async fn test_blocked_address_is_denied_without_counting() {
        let f = fixture().await;

        for _ in 0..5 {
            f.gate.authenticate(&request("wrong")).await.unwrap();
        }
        assert_eq!(counter_count(&f.db).await, Some(5));

        // Even a correct password is denied while blocked
        let decision = f.gate.authenticate(&request("correct-horse")).await.unwrap();
        assert_eq!(decision, LoginDecision::Denied(DenialReason::Blocked));
        assert_eq!(counter_count(&f.db).await, Some(5));

        let db = f.db.lock().await;
        let blocked_entries = LoginLogEntry::Entity::find()
            .filter(LoginLogEntry::Column::Outcome.eq(LoginOutcome::Blocked))
            .count(&*db)
            .await
            .unwrap();
        assert_eq!(blocked_entries, 1);
    }

    #[tokio::test]
    async fn test_success_allows_and_resets_the_counter() {
        let f = fixture().await;

        f.gate.authenticate(&request("wrong")).await.unwrap();
        f.gate.authenticate(&request("wrong")).await.unwrap();

        let decision = f.gate.authenticate(&request("correct-horse")).await.unwrap();
        assert_eq!(decision, LoginDecision::Allowed);
        assert_eq!(counter_count(&f.db).await, None);

        // Counting starts over after the reset
        f.gate.authenticate(&request("wrong")).await.unwrap();
        assert_eq!(counter_count(&f.db).await, Some(1));
    }

    #[tokio::test]
    async fn test_credential_store_failure_fails_closed_without_counting() {
        let verifier = HttpCredentialVerifier::new(
            "http://127.0.0.1:1/verify",
            Duration::from_millis(200),
        )
        .unwrap();
        let f = fixture_with(verifier.into(), test_protection_config()).await;

        let err = f.gate.authenticate(&request("correct-horse")).await.unwrap_err();
        assert!(matches!(err, LockgateError::CredentialStoreUnavailable(_)));
        assert_eq!(counter_count(&f.db).await, None);

        // The infrastructure failure still reaches the login log
        let db = f.db.lock().await;
        let entry = LoginLogEntry::Entity::find().one(&*db).await.unwrap().unwrap();
        assert_eq!(entry.outcome, LoginOutcome::Failed);
        assert_eq!(entry.reason.as_deref(), Some("credential-store-unavailable"));
    }

    #[tokio::test]
    async fn test_concurrent_threshold_crossing_creates_a_single_block() {
        let f = Arc::new(fixture().await);

        for _ in 0..4 {
            f.gate.authenticate(&request("wrong")).await.unwrap();
        }

        let a = tokio::spawn({
            let f = f.clone();
            async move { f.gate.authenticate(&request("wrong")).await }
        });
        let b = tokio::spawn({
            let f = f.clone();
            async move { f.gate.authenticate(&request("wrong")).await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        // Depending on interleaving the second request either counts (6) or
        // is already denied as blocked and must not count (5). Either way no
        // update is lost and exactly one block row exists.
        let count = counter_count(&f.db).await.unwrap();
        assert!(count == 5 || count == 6, "unexpected count {count}");
        let db = f.db.lock().await;
        let blocks = BlockEntry::Entity::find()
            .filter(BlockEntry::Column::Subject.eq("10.0.0.5"))
            .count(&*db)
            .await
            .unwrap();
        assert_eq!(blocks, 1);
    }

    #[tokio::test]
    async fn test_disabled_protection_skips_counting_but_still_logs() {
        let mut config = test_protection_config();
        config.enabled = false;
        let verifier = StaticCredentialVerifier::new([(
            "user@example.com".to_owned(),
            Secret::new(hash_password("correct-horse")),
        )]);
        let f = fixture_with(verifier.into(), config).await;

        for _ in 0..6 {
            let decision = f.gate.authenticate(&request("wrong")).await.unwrap();
            assert_eq!(decision, LoginDecision::Denied(DenialReason::Credentials));
        }
        assert_eq!(counter_count(&f.db).await, None);

        let db = f.db.lock().await;
        assert_eq!(
            LoginLogEntry::Entity::find().count(&*db).await.unwrap(),
            6
        );
    }
}
