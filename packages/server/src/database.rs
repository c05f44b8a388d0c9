use std::time::Duration;

use sea_orm::sea_query::{Index, IndexCreateStatement, PostgresQueryBuilder, SqliteQueryBuilder};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr};
use tracing::info;

use crate::entity::file_record;

pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());

    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .max_lifetime(Duration::from_secs(8))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;
    prepare_schema(&db).await?;

    Ok(db)
}

/// Create or update tables from the entity registry, then add indexes.
pub async fn prepare_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.get_schema_registry("dossier_server::entity::*")
        .sync(db)
        .await?;
    ensure_indexes(db).await
}

/// Ensure the version-chain indexes exist.
///
/// The two unique indexes are what make a lost race visible: a second
/// latest record or a duplicated version number in one chain is rejected
/// by the database.
pub async fn ensure_indexes<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    // At most one head per chain. Partial indexes are not expressible through
    // the index builder, and this statement is valid on Postgres and SQLite.
    db.execute_unprepared(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_file_record_root_latest \
         ON file_record (root_id) WHERE is_latest",
    )
    .await?;
    info!("Ensured index idx_file_record_root_latest exists");

    let root_version = Index::create()
        .if_not_exists()
        .unique()
        .name("idx_file_record_root_version")
        .table(file_record::Entity)
        .col(file_record::Column::RootId)
        .col(file_record::Column::VersionNumber)
        .to_owned();
    db.execute_unprepared(&index_sql(db.get_database_backend(), &root_version))
        .await?;
    info!("Ensured index idx_file_record_root_version exists");

    // SELECT ... WHERE project_id = ? AND is_latest
    let project_latest = Index::create()
        .if_not_exists()
        .name("idx_file_record_project_latest")
        .table(file_record::Entity)
        .col(file_record::Column::ProjectId)
        .col(file_record::Column::IsLatest)
        .to_owned();
    if let Err(e) = db
        .execute_unprepared(&index_sql(db.get_database_backend(), &project_latest))
        .await
    {
        tracing::warn!("Failed to create index idx_file_record_project_latest: {}", e);
    }

    Ok(())
}

fn index_sql(backend: DbBackend, stmt: &IndexCreateStatement) -> String {
    match backend {
        DbBackend::Sqlite => stmt.to_string(SqliteQueryBuilder),
        _ => stmt.to_string(PostgresQueryBuilder),
    }
}
