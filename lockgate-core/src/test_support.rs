use std::sync::Arc;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tokio::sync::Mutex;
use lockgate_common::ProtectionConfig;
use lockgate_db_migrations::migrate_database;

/// Fresh migrated in-memory database. A single pooled connection keeps the
/// whole test on one sqlite memory instance.
pub(crate) async fn test_db() -> Arc<Mutex<DatabaseConnection>> {
    let mut opt = ConnectOptions::new("sqlite::memory:".to_owned());
    opt.max_connections(1).sqlx_logging(false);
    #[allow(clippy::unwrap_used)]
    let db = Database::connect(opt).await.unwrap();
    #[allow(clippy::unwrap_used)]
    migrate_database(&db).await.unwrap();
    Arc::new(Mutex::new(db))
}

pub(crate) fn test_protection_config() -> ProtectionConfig {
    ProtectionConfig {
        enabled: true,
        failure_threshold: 5,
        failure_window: Duration::from_secs(60),
        block_duration: Duration::from_secs(60 * 15),
        report_threshold: 3,
        increment_retries: 3,
    }
}
