use sea_orm::Schema;
use sea_orm_migration::prelude::*;

pub mod block_entry {
    use chrono::{DateTime, Utc};
    use sea_orm::entity::prelude::*;
    use uuid::Uuid;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "block_entries")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub subject: String,
        #[sea_orm(column_type = "Text")]
        pub reason: String,
        pub created_at: DateTime<Utc>,
        pub expires_at: Option<DateTime<Utc>>,
        pub active: bool,
        pub removed_at: Option<DateTime<Utc>>,
        pub removed_by: Option<String>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod attempt_counter {
    use chrono::{DateTime, Utc};
    use sea_orm::entity::prelude::*;
    use uuid::Uuid;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "attempt_counters")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        #[sea_orm(unique)]
        pub key: String,
        pub last_remote_ip: String,
        pub count: i32,
        pub window_start: DateTime<Utc>,
        pub expires_at: Option<DateTime<Utc>>,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m00001_account_protection"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let builder = manager.get_database_backend();
        let schema = Schema::new(builder);

        manager
            .create_table(schema.create_table_from_entity(block_entry::Entity))
            .await?;

        // Lookup path for the enforcement gate: "active blocks for this address"
        manager
            .create_index(
                Index::create()
                    .table(block_entry::Entity)
                    .name("idx_block_entries_subject")
                    .col(Alias::new("subject"))
                    .to_owned(),
            )
            .await?;

        // Cleanup sweep scans by expiry
        manager
            .create_index(
                Index::create()
                    .table(block_entry::Entity)
                    .name("idx_block_entries_expires_at")
                    .col(Alias::new("expires_at"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(schema.create_table_from_entity(attempt_counter::Entity))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .table(block_entry::Entity)
                    .name("idx_block_entries_expires_at")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .table(block_entry::Entity)
                    .name("idx_block_entries_subject")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(attempt_counter::Entity).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(block_entry::Entity).to_owned())
            .await?;

        Ok(())
    }
}
