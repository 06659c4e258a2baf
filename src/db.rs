use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};

use crate::error::AppResult;

pub async fn connect_and_migrate(database_url: &str) -> AppResult<DatabaseConnection> {
    let mut opts = ConnectOptions::new(database_url);
    if database_url.contains(":memory:") {
        // Every pooled connection would otherwise see its own empty database.
        opts.max_connections(1).min_connections(1);
    }
    opts.sqlx_logging(false);

    let db = Database::connect(opts).await?;

    for pragma in ["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL", "PRAGMA foreign_keys=ON"] {
        db.execute(Statement::from_string(db.get_database_backend(), pragma.to_string())).await?;
    }

    Migrator::up(&db, None).await?;
    tracing::debug!("migrations applied");
    Ok(db)
}

pub fn now_sec() -> i64 {
    jiff::Timestamp::now().as_second()
}

pub fn now_micros() -> i64 {
    jiff::Timestamp::now().as_microsecond()
}
