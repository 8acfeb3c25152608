use std::sync::Arc;

use anyhow::Result;
use sea_orm::DatabaseConnection;
use tokio::sync::Mutex;
use tracing::*;
use lockgate_common::LockgateConfig;

use crate::db::{cleanup_db, connect_to_db};
use crate::protection::{AttemptTracker, BlockRegistry, EnforcementGate};
use crate::recorder::{AuditRecorder, LoginRecorder};
use crate::verifier::CredentialVerifierEnum;

#[derive(Clone)]
pub struct Services {
    pub db: Arc<Mutex<DatabaseConnection>>,
    pub config: Arc<Mutex<LockgateConfig>>,
    pub block_registry: Arc<BlockRegistry>,
    pub attempt_tracker: Arc<AttemptTracker>,
    pub audit: Arc<AuditRecorder>,
    pub login_log: Arc<LoginRecorder>,
    pub credential_verifier: Arc<Mutex<CredentialVerifierEnum>>,
    pub gate: Arc<EnforcementGate>,
}

impl Services {
    pub async fn new(config: LockgateConfig) -> Result<Self> {
        let db = connect_to_db(&config).await?;
        let db = Arc::new(Mutex::new(db));

        let audit = Arc::new(AuditRecorder::new(db.clone()));
        let login_log = Arc::new(LoginRecorder::new(db.clone()));
        let block_registry = Arc::new(BlockRegistry::new(db.clone()));
        let attempt_tracker = Arc::new(AttemptTracker::new(
            db.clone(),
            config.store.protection.clone(),
        ));
        let credential_verifier = Arc::new(Mutex::new(CredentialVerifierEnum::from_config(
            &config.store.credential_store,
        )?));

        let gate = Arc::new(EnforcementGate::new(
            config.store.protection.clone(),
            block_registry.clone(),
            attempt_tracker.clone(),
            login_log.clone(),
            credential_verifier.clone(),
        ));

        let config = Arc::new(Mutex::new(config));

        tokio::spawn({
            let db = db.clone();
            let config = config.clone();
            async move {
                loop {
                    let (interval, store) = {
                        let config = config.lock().await;
                        (config.store.log.cleanup_interval, config.store.clone())
                    };
                    {
                        let db = db.lock().await;
                        if let Err(error) = cleanup_db(&db, &store).await {
                            warn!(?error, "Cleanup sweep failed");
                        }
                    }
                    tokio::time::sleep(interval).await;
                }
            }
        });

        Ok(Self {
            db,
            config,
            block_registry,
            attempt_tracker,
            audit,
            login_log,
            credential_verifier,
            gate,
        })
    }
}
