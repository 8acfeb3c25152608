use std::time::Duration;

use anyhow::Result;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, ConnectOptions, Database, DatabaseConnection, EntityTrait, QueryFilter,
};
use tracing::*;
use lockgate_common::helpers::fs::secure_file;
use lockgate_common::{LockgateConfig, LockgateConfigStore};
use lockgate_db_entities::{AttemptCounter, BlockEntry, LoginLogEntry};
use lockgate_db_migrations::migrate_database;

pub async fn connect_to_db(config: &LockgateConfig) -> Result<DatabaseConnection> {
    let mut url = url::Url::parse(&config.store.database_url.expose_secret()[..])?;
    if url.scheme() == "sqlite" {
        let path = url.path();
        let mut abs_path = config.paths_relative_to.clone();
        abs_path.push(path);
        abs_path.push("db.sqlite3");

        if let Some(parent) = abs_path.parent() {
            std::fs::create_dir_all(parent)?
        }

        url.set_path(
            abs_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Failed to convert database path to string"))?,
        );

        url.set_query(Some("mode=rwc"));

        let db = Database::connect(ConnectOptions::new(url.to_string())).await?;
        db.ping().await?;
        drop(db);

        secure_file(&abs_path)?;
    }

    let mut opt = ConnectOptions::new(url.to_string());
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .max_lifetime(Duration::from_secs(8))
        .sqlx_logging(true);

    let connection = Database::connect(opt).await?;

    migrate_database(&connection).await?;
    Ok(connection)
}

/// Counts from one cleanup sweep.
#[derive(Clone, Debug, Default)]
pub struct CleanupStats {
    pub login_entries_removed: u64,
    pub blocks_purged: u64,
    pub counters_purged: u64,
}

/// Periodic sweep. Purely an optimization: block activity and counter windows
/// are always re-derived at read time, so nothing here is load-bearing.
/// Audit entries are never touched.
pub async fn cleanup_db(
    db: &DatabaseConnection,
    store: &LockgateConfigStore,
) -> Result<CleanupStats> {
    let now = chrono::Utc::now();

    let retention_cutoff = now - chrono::Duration::from_std(store.log.retention)?;
    let login_entries = LoginLogEntry::Entity::delete_many()
        .filter(Expr::col(LoginLogEntry::Column::Timestamp).lt(retention_cutoff))
        .exec(db)
        .await?;

    // Deactivated blocks are kept for history, then physically dropped once
    // they are long past any usefulness to an operator.
    let history_cutoff = now - chrono::Duration::from_std(store.log.block_history_retention)?;
    let blocks = BlockEntry::Entity::delete_many()
        .filter(
            Condition::any()
                .add(BlockEntry::Column::RemovedAt.lt(history_cutoff))
                .add(
                    Condition::all()
                        .add(BlockEntry::Column::ExpiresAt.is_not_null())
                        .add(BlockEntry::Column::ExpiresAt.lt(history_cutoff)),
                ),
        )
        .exec(db)
        .await?;

    // Counters that are logically zero either way
    let window_cutoff = now - chrono::Duration::from_std(store.protection.failure_window)?;
    let counters = AttemptCounter::Entity::delete_many()
        .filter(
            Condition::any()
                .add(
                    Condition::all()
                        .add(AttemptCounter::Column::ExpiresAt.is_not_null())
                        .add(AttemptCounter::Column::ExpiresAt.lt(now)),
                )
                .add(
                    Condition::all()
                        .add(AttemptCounter::Column::ExpiresAt.is_null())
                        .add(AttemptCounter::Column::WindowStart.lt(window_cutoff)),
                ),
        )
        .exec(db)
        .await?;

    let stats = CleanupStats {
        login_entries_removed: login_entries.rows_affected,
        blocks_purged: blocks.rows_affected,
        counters_purged: counters.rows_affected,
    };

    if stats.login_entries_removed > 0 || stats.blocks_purged > 0 || stats.counters_purged > 0 {
        debug!(
            login_entries = stats.login_entries_removed,
            blocks = stats.blocks_purged,
            counters = stats.counters_purged,
            "Cleanup sweep completed"
        );
    }

    Ok(stats)
}
