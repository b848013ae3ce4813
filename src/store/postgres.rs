//! PostgreSQL gateway built on sqlx bulk statements

use crate::error::{IngestError, Result};
use crate::store::{resolve_topics, EnrichmentStore, RepoIdMap, UpsertGateway};
use crate::types::{DocEnrichment, PendingTopic, RepositoryRecord, StoredRepository};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Postgres caps a statement at 65 535 bind parameters
const MAX_BIND_PARAMS: usize = 65_535;
const REPOSITORY_COLUMNS: usize = 4;
const TOPIC_COLUMNS: usize = 3;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS repositories (
        id BIGSERIAL PRIMARY KEY,
        name_with_owner TEXT NOT NULL UNIQUE,
        stars BIGINT NOT NULL DEFAULT 0,
        forks BIGINT NOT NULL DEFAULT 0,
        open_issues BIGINT NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS topics (
        id BIGSERIAL PRIMARY KEY,
        repo_id BIGINT NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        stars BIGINT NOT NULL DEFAULT 0,
        UNIQUE (repo_id, name)
    )",
    "CREATE TABLE IF NOT EXISTS repo_docs (
        repo_id BIGINT PRIMARY KEY REFERENCES repositories(id) ON DELETE CASCADE,
        readme TEXT NOT NULL DEFAULT '',
        wiki TEXT NOT NULL DEFAULT '',
        fetched_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
];

/// Connection parameters for the store
#[derive(Clone)]
pub struct DbConfig {
    /// Full connection URL; takes precedence over the individual fields
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .finish()
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            host: String::from("localhost"),
            port: 5432,
            user: String::from("postgres"),
            password: String::new(),
            database: String::from("repo_ingest"),
            max_connections: 5,
            acquire_timeout_secs: 10,
        }
    }
}

impl DbConfig {
    /// Read `DATABASE_URL` or the libpq-style `PG*` variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        Self {
            database_url: var("DATABASE_URL"),
            host: var("PGHOST").unwrap_or(defaults.host),
            port: var("PGPORT").and_then(|v| v.parse().ok()).unwrap_or(defaults.port),
            user: var("PGUSER").unwrap_or(defaults.user),
            password: var("PGPASSWORD").unwrap_or(defaults.password),
            database: var("PGDATABASE").unwrap_or(defaults.database),
            max_connections: var("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections),
            acquire_timeout_secs: defaults.acquire_timeout_secs,
        }
    }

    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        if let Some(url) = &self.database_url {
            return url
                .parse()
                .map_err(|e| IngestError::store("parse database url", e));
        }

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database))
    }

    pub async fn connect(&self) -> Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .connect_with(self.connect_options()?)
            .await
            .map_err(|e| IngestError::store("connect", e))?;

        info!(
            host = %self.host,
            database = %self.database,
            max_connections = self.max_connections,
            "connected to store"
        );
        Ok(pool)
    }
}

/// Gateway that writes batches to PostgreSQL
#[derive(Clone)]
pub struct PgGateway {
    pool: PgPool,
}

impl PgGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DbConfig) -> Result<Self> {
        Ok(Self::new(config.connect().await?))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the repositories, topics and repo_docs tables if they are missing
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| IngestError::store("create schema", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl UpsertGateway for PgGateway {
    async fn upsert_repositories(&self, repositories: &[RepositoryRecord]) -> Result<RepoIdMap> {
        if repositories.is_empty() {
            return Ok(RepoIdMap::new());
        }

        let stage = "upsert repositories";
        let mut tx = self.pool.begin().await.map_err(|e| IngestError::store(stage, e))?;

        for chunk in repositories.chunks(MAX_BIND_PARAMS / REPOSITORY_COLUMNS) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO repositories (name_with_owner, stars, forks, open_issues) ",
            );
            qb.push_values(chunk, |mut b, repo| {
                b.push_bind(&repo.name_with_owner)
                    .push_bind(repo.stars)
                    .push_bind(repo.forks)
                    .push_bind(repo.open_issues);
            });
            qb.push(" ON CONFLICT (name_with_owner) DO NOTHING");

            let result = qb
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| IngestError::store(stage, e))?;
            debug!(
                submitted = chunk.len(),
                inserted = result.rows_affected(),
                "repository chunk written"
            );
        }

        // Conflicting rows return nothing from the insert, so read the ids back
        let keys: Vec<String> = repositories.iter().map(|r| r.name_with_owner.clone()).collect();
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT id, name_with_owner FROM repositories WHERE name_with_owner = ANY($1)",
        )
        .bind(&keys)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| IngestError::store(stage, e))?;

        tx.commit().await.map_err(|e| IngestError::store(stage, e))?;

        Ok(rows.into_iter().map(|(id, key)| (key, id)).collect())
    }

    async fn upsert_topics(&self, topics: &[PendingTopic], repo_ids: &RepoIdMap) -> Result<usize> {
        let (resolved, misses) = resolve_topics(topics, repo_ids);
        if misses > 0 {
            warn!(misses, "dropping topics whose repository id did not resolve");
        }
        if resolved.is_empty() {
            return Ok(0);
        }

        let stage = "upsert topics";
        let mut tx = self.pool.begin().await.map_err(|e| IngestError::store(stage, e))?;

        for chunk in resolved.chunks(MAX_BIND_PARAMS / TOPIC_COLUMNS) {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO topics (repo_id, name, stars) ");
            qb.push_values(chunk, |mut b, topic| {
                b.push_bind(topic.repo_id)
                    .push_bind(&topic.name)
                    .push_bind(topic.stars);
            });
            qb.push(" ON CONFLICT (repo_id, name) DO NOTHING");

            qb.build()
                .execute(&mut *tx)
                .await
                .map_err(|e| IngestError::store(stage, e))?;
        }

        tx.commit().await.map_err(|e| IngestError::store(stage, e))?;
        Ok(resolved.len())
    }
}

#[async_trait]
impl EnrichmentStore for PgGateway {
    async fn select_page(&self, limit: usize) -> Result<Vec<StoredRepository>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT r.id, r.name_with_owner
             FROM repositories r
             LEFT JOIN repo_docs d ON d.repo_id = r.id
             ORDER BY d.fetched_at ASC NULLS FIRST, r.id ASC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IngestError::store("select repositories", e))?;

        Ok(rows
            .into_iter()
            .map(|(id, name_with_owner)| StoredRepository { id, name_with_owner })
            .collect())
    }

    async fn upsert_docs(&self, doc: &DocEnrichment) -> Result<()> {
        sqlx::query(
            "INSERT INTO repo_docs (repo_id, readme, wiki, fetched_at)
             VALUES ($1, $2, $3, now())
             ON CONFLICT (repo_id) DO UPDATE
             SET readme = EXCLUDED.readme, wiki = EXCLUDED.wiki, fetched_at = EXCLUDED.fetched_at",
        )
        .bind(doc.repo_id)
        .bind(&doc.readme)
        .bind(&doc.wiki)
        .execute(&self.pool)
        .await
        .map_err(|e| IngestError::store("upsert docs", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_redacts_password() {
        let config = DbConfig {
            password: "hunter2".to_string(),
            database_url: Some("postgres://u:hunter2@h/db".to_string()),
            ..DbConfig::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_connect_options_rejects_bad_url() {
        let config = DbConfig {
            database_url: Some("not a url".to_string()),
            ..DbConfig::default()
        };
        assert!(matches!(
            config.connect_options(),
            Err(IngestError::StoreWrite { stage: "parse database url", .. })
        ));

        let config = DbConfig {
            database_url: Some("postgres://ingest@db.internal:6543/corpus".to_string()),
            ..DbConfig::default()
        };
        assert!(config.connect_options().is_ok());
    }

    #[test]
    fn test_chunks_stay_under_bind_limit() {
        assert!((MAX_BIND_PARAMS / REPOSITORY_COLUMNS) * REPOSITORY_COLUMNS <= MAX_BIND_PARAMS);
        assert!((MAX_BIND_PARAMS / TOPIC_COLUMNS) * TOPIC_COLUMNS <= MAX_BIND_PARAMS);
    }
}
