use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, postgres::PgPoolOptions};

use crate::{
    Entity, EntityId, Result, StoreError, Version, Versioned,
    repository::{Repository, Transaction},
};

/// PostgreSQL-backed repository implementation.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new PostgreSQL repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool of at most `max_connections` to `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction { tx })
    }
}

/// Transaction handle of the [`PostgresRepository`].
///
/// Wraps a pooled connection with an open database transaction. sqlx rolls
/// the transaction back when the handle is dropped unfinished.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    async fn current_version(&mut self, entity_type: &str, id: EntityId) -> Result<Version> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM entities WHERE entity_type = $1 AND id = $2")
                .bind(entity_type)
                .bind(id.as_i64())
                .fetch_optional(&mut *self.tx)
                .await?;

        Ok(version.map(Version::new).unwrap_or(Version::initial()))
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn load<E: Entity>(&mut self, id: EntityId) -> Result<Option<Versioned<E>>> {
        let row = sqlx::query(
            r#"
            SELECT version, state, updated_at
            FROM entities
            WHERE entity_type = $1 AND id = $2
            "#,
        )
        .bind(E::entity_type())
        .bind(id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => {
                let state: serde_json::Value = row.try_get("state")?;
                Ok(Some(Versioned {
                    entity: serde_json::from_value(state)?,
                    version: Version::new(row.try_get("version")?),
                    updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn save<E: Entity>(&mut self, record: &Versioned<E>) -> Result<Version> {
        let entity_type = E::entity_type();
        let id = record.id();
        let state = serde_json::to_value(&record.entity)?;
        let new_version = record.version.next();

        let result = if record.is_new() {
            sqlx::query(
                r#"
                INSERT INTO entities (entity_type, id, version, state, updated_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (entity_type, id) DO NOTHING
                "#,
            )
            .bind(entity_type)
            .bind(id.as_i64())
            .bind(new_version.as_i64())
            .bind(&state)
            .bind(Utc::now())
            .execute(&mut *self.tx)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE entities
                SET version = $3, state = $4, updated_at = $5
                WHERE entity_type = $1 AND id = $2 AND version = $6
                "#,
            )
            .bind(entity_type)
            .bind(id.as_i64())
            .bind(new_version.as_i64())
            .bind(&state)
            .bind(Utc::now())
            .bind(record.version.as_i64())
            .execute(&mut *self.tx)
            .await?
        };

        if result.rows_affected() == 0 {
            let actual = self.current_version(entity_type, id).await?;
            metrics::counter!("store_concurrency_conflicts_total", "backend" => "postgres")
                .increment(1);
            tracing::debug!(entity_type, %id, expected = %record.version, %actual, "version conflict");
            return Err(StoreError::ConcurrencyConflict {
                entity_type,
                id,
                expected: record.version,
                actual,
            });
        }

        Ok(new_version)
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
