use std::{path::Path, str::FromStr};

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteSynchronous},
};

use crate::storage::interface::{StorageFuture, TokenKind, TokenStorage};


#[derive(Debug, thiserror::Error)]
pub enum CreateSqliteStorageError {
    #[error("failed to migrate token database to current version: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Token storage backed by a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Opens or creates the token database at `path`.
    pub async fn open(path: &Path) -> Result<Self, CreateSqliteStorageError> {
        Ok(Self {
            pool: Self::do_open(
                SqliteConnectOptions::new()
                    .create_if_missing(true)
                    .filename(path),
            )
            .await?,
        })
    }

    /// Creates a storage that uses a new in-memory database.
    pub async fn new_memory() -> Result<Self, CreateSqliteStorageError> {
        // sqlx has some special handling for the in-memory database which only
        // happens when parsing from a URL string
        Ok(Self {
            pool: Self::do_open(SqliteConnectOptions::from_str("sqlite://:memory:")?).await?,
        })
    }

    async fn do_open(
        base_options: SqliteConnectOptions,
    ) -> Result<SqlitePool, CreateSqliteStorageError> {
        let options = base_options
            .synchronous(SqliteSynchronous::Normal)
            .optimize_on_close(true, None);
        let pool = SqlitePool::connect_with(options).await?;

        sqlx::migrate!("src/storage/clients/sqlite/migrations")
            .run(&pool)
            .await?;

        Ok(pool)
    }
}

impl TokenStorage for SqliteStorage {
    fn load(&self, kind: TokenKind) -> StorageFuture<'static, Option<String>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let value: Option<String> =
                sqlx::query_scalar("SELECT value FROM tokens WHERE kind = $1")
                    .bind(kind.key())
                    .fetch_optional(&pool)
                    .await?;
            Ok(value)
        })
    }

    fn store<'a>(&self, kind: TokenKind, value: &'a str) -> StorageFuture<'a, ()> {
        let pool = self.pool.clone();
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO tokens (kind, value, updated_at)
                VALUES ($1, $2, unixepoch())
                ON CONFLICT (kind) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            )
            .bind(kind.key())
            .bind(value)
            .execute(&pool)
            .await?;
            Ok(())
        })
    }

    fn remove(&self, kind: TokenKind) -> StorageFuture<'static, ()> {
        let pool = self.pool.clone();
        Box::pin(async move {
            sqlx::query("DELETE FROM tokens WHERE kind = $1")
                .bind(kind.key())
                .execute(&pool)
                .await?;
            Ok(())
        })
    }
}
