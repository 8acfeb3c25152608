use sea_orm::Schema;
use sea_orm_migration::prelude::*;

pub mod login_log_entry {
    use chrono::{DateTime, Utc};
    use sea_orm::entity::prelude::*;
    use uuid::Uuid;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "login_log")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub identity: String,
        pub remote_ip: String,
        pub geolocation: Option<String>,
        pub outcome: String,
        #[sea_orm(column_type = "Text", nullable)]
        pub reason: Option<String>,
        pub block_created: bool,
        pub timestamp: DateTime<Utc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod audit_log_entry {
    use chrono::{DateTime, Utc};
    use sea_orm::entity::prelude::*;
    use uuid::Uuid;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "audit_log")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub actor: String,
        pub action: String,
        pub entity_type: String,
        pub entity_id: Option<String>,
        pub remote_ip: Option<String>,
        pub timestamp: DateTime<Utc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m00002_event_logs"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let builder = manager.get_database_backend();
        let schema = Schema::new(builder);

        manager
            .create_table(schema.create_table_from_entity(login_log_entry::Entity))
            .await?;

        // Admin console reads in descending time order
        manager
            .create_index(
                Index::create()
                    .table(login_log_entry::Entity)
                    .name("idx_login_log_timestamp")
                    .col(Alias::new("timestamp"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(login_log_entry::Entity)
                    .name("idx_login_log_identity_timestamp")
                    .col(Alias::new("identity"))
                    .col(Alias::new("timestamp"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(schema.create_table_from_entity(audit_log_entry::Entity))
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(audit_log_entry::Entity)
                    .name("idx_audit_log_timestamp")
                    .col(Alias::new("timestamp"))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .table(audit_log_entry::Entity)
                    .name("idx_audit_log_timestamp")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .table(login_log_entry::Entity)
                    .name("idx_login_log_identity_timestamp")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .table(login_log_entry::Entity)
                    .name("idx_login_log_timestamp")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(audit_log_entry::Entity).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(login_log_entry::Entity).to_owned())
            .await?;

        Ok(())
    }
}
