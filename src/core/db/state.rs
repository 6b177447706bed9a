use sqlx::{
    Connection, Sqlite,
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous},
};
use tokio::sync::{Mutex, RwLock, RwLockReadGuard};

use std::{
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
};

use crate::error::StoreError;

const SCHEMA: &str = r#"CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)"#;

const SELECT_VALUE: &str = "SELECT value FROM kv_store WHERE key = $1";
const UPSERT_VALUE: &str = r#"INSERT INTO kv_store (key, value) VALUES ($1, $2)
    ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value"#;

pub(super) struct StoreState {
    db_file: PathBuf,
    pool: RwLock<SqlitePool>,
    /// Held by every write so read-modify-write updates never interleave
    writer: Mutex<()>,
}

impl std::fmt::Debug for StoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreState")
            .field("db_file", &self.db_file)
            .finish()
    }
}

impl StoreState {
    pub(super) async fn new<P: AsRef<Path>>(db_file: P) -> Result<Self, StoreError> {
        let db_file = db_file.as_ref().to_path_buf();

        if let Some(parent) = db_file.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(StoreError::MissingParent(parent.to_path_buf()));
            }
        }

        let connect_opts = SqliteConnectOptions::new()
            .filename(&db_file)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_opts)
            .await?;
        sqlx::query(SCHEMA).execute(&pool).await?;

        Ok(Self {
            db_file,
            pool: RwLock::new(pool),
            writer: Mutex::new(()),
        })
    }

    /// Acquire a pooled connection and hold the pool read lock for the entire lifetime
    /// of the returned guard.
    pub(super) async fn conn(&self) -> Result<DbConnGuard<'_>, StoreError> {
        let pool_guard = self.pool.read().await;
        let conn = pool_guard.acquire().await?;
        Ok(DbConnGuard {
            _pool_guard: pool_guard,
            conn,
        })
    }

    pub(super) async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn().await?;
        let value = sqlx::query_scalar::<_, String>(SELECT_VALUE)
            .bind(key)
            .fetch_optional(&mut **conn)
            .await?;
        Ok(value)
    }

    pub(super) async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _writer = self.writer.lock().await;
        let mut conn = self.conn().await?;
        sqlx::query(UPSERT_VALUE)
            .bind(key)
            .bind(value)
            .execute(&mut **conn)
            .await?;
        Ok(())
    }

    /// Replace the value of `key` with what `apply` derives from the current
    /// one. The read and the write share one transaction and exclude other
    /// writers of this store.
    pub(super) async fn update<T, F>(&self, key: &str, apply: F) -> Result<T, StoreError>
    where
        F: FnOnce(Option<String>) -> Result<(String, T), StoreError>,
    {
        let _writer = self.writer.lock().await;
        let mut conn = self.conn().await?;
        let mut tx = conn.begin().await?;
        let current = sqlx::query_scalar::<_, String>(SELECT_VALUE)
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;
        let (value, output) = apply(current)?;
        sqlx::query(UPSERT_VALUE)
            .bind(key)
            .bind(&value)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(output)
    }

    /// Checkpoint the WAL and release file handles. Waits for in-flight
    /// queries because it takes the write lock.
    pub(super) async fn close(&self) -> Result<(), StoreError> {
        let pool_guard = self.pool.write().await;
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE);")
            .execute(&*pool_guard)
            .await?;
        pool_guard.close().await;
        Ok(())
    }
}

pub struct DbConnGuard<'a> {
    _pool_guard: RwLockReadGuard<'a, SqlitePool>,
    conn: PoolConnection<Sqlite>,
}

impl<'a> Deref for DbConnGuard<'a> {
    type Target = PoolConnection<Sqlite>;
    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl<'a> DerefMut for DbConnGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}
