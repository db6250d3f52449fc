use anima_shared::{LimitPeriod, RecentChangeStore, RecentChanges, TraitKind, TraitVector};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use crate::clock::Clock;

/// Upper bound on any single store operation so a locked database cannot hang a pipeline pass.
const DB_TIMEOUT_SECS: u64 = 10;

const MIGRATION_TIMEOUT_SECS: u64 = 30;

/// Rows older than the longest period are never read.
const LONGEST_PERIOD: LimitPeriod = LimitPeriod::Monthly;

/// [`RecentChangeStore`] backed by an append-only SQLite log.
///
/// Every applied delta is one row; reads sum absolute deltas inside each
/// rolling window relative to the store's clock.
pub struct SqliteRecentChangeStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

fn timestamp_key(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl SqliteRecentChangeStore {
    #[must_use]
    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Open a pool for `database_url`. In-memory databases get a single
    /// long-lived connection, since each new connection would see an empty database.
    pub async fn connect(database_url: &str, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let in_memory = database_url.contains(":memory:");
        let mut options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            options = options.idle_timeout(None).max_lifetime(None);
        }
        let pool = options
            .connect(database_url)
            .await
            .with_context(|| format!("Failed to open recent-change database {database_url}"))?;
        Ok(Self::with_clock(pool, clock))
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the change log table if needed.
    pub async fn init(&self) -> anyhow::Result<()> {
        info!("Running recent-change store migrations...");
        timeout(
            Duration::from_secs(MIGRATION_TIMEOUT_SECS),
            sqlx::migrate!("./migrations").run(&self.pool),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Database migrations timed out after {}s", MIGRATION_TIMEOUT_SECS))?
        .map_err(|e| anyhow::anyhow!("Database migration failed: {}", e))?;
        Ok(())
    }

    /// Append the non-zero entries of `deltas` for `agent_id`, stamped with the store clock.
    ///
    /// Returns the number of rows written.
    pub async fn record_changes(&self, agent_id: &str, deltas: &TraitVector) -> anyhow::Result<usize> {
        if agent_id.is_empty() || agent_id.contains('\0') {
            anyhow::bail!("agent_id must be non-empty and must not contain null bytes");
        }
        if !deltas.all_finite() {
            anyhow::bail!("refusing to record non-finite trait deltas for '{}'", agent_id);
        }

        let recorded_at = timestamp_key(self.clock.now());
        let rows: Vec<(TraitKind, f64)> = deltas
            .iter()
            .filter(|(_, d)| **d != 0.0)
            .map(|(kind, d)| (kind, *d))
            .collect();
        if rows.is_empty() {
            return Ok(0);
        }

        let write = async {
            let mut tx = self.pool.begin().await?;
            for (kind, delta) in &rows {
                sqlx::query(
                    "INSERT INTO trait_change_log (id, agent_id, trait_name, delta, recorded_at) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(uuid::Uuid::new_v4().to_string())
                .bind(agent_id)
                .bind(kind.as_str())
                .bind(*delta)
                .bind(&recorded_at)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await
        };

        timeout(Duration::from_secs(DB_TIMEOUT_SECS), write)
            .await
            .map_err(|_| anyhow::anyhow!("Database operation timed out after {}s", DB_TIMEOUT_SECS))?
            .map_err(|e| anyhow::anyhow!("Failed to record trait changes for '{}': {}", agent_id, e))?;

        debug!(agent_id = %agent_id, rows = rows.len(), "Recorded trait changes");
        Ok(rows.len())
    }

    /// Delete rows that no period can see any more. Returns the number removed.
    pub async fn prune(&self) -> anyhow::Result<u64> {
        let cutoff = timestamp_key(self.clock.now() - chrono::Duration::days(LONGEST_PERIOD.days()));
        let query_future = sqlx::query("DELETE FROM trait_change_log WHERE recorded_at <= ?")
            .bind(cutoff)
            .execute(&self.pool);

        let result = timeout(Duration::from_secs(DB_TIMEOUT_SECS), query_future)
            .await
            .map_err(|_| anyhow::anyhow!("Database operation timed out after {}s", DB_TIMEOUT_SECS))?
            .map_err(|e| anyhow::anyhow!("Failed to prune trait change log: {}", e))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RecentChangeStore for SqliteRecentChangeStore {
    async fn recent_changes(&self, agent_id: &str) -> anyhow::Result<RecentChanges> {
        let now = self.clock.now();
        let since = timestamp_key(now - chrono::Duration::days(LONGEST_PERIOD.days()));

        let query_future = sqlx::query_as::<_, (String, f64, String)>(
            "SELECT trait_name, delta, recorded_at FROM trait_change_log WHERE agent_id = ? AND recorded_at > ?",
        )
        .bind(agent_id)
        .bind(since)
        .fetch_all(&self.pool);

        let rows = timeout(Duration::from_secs(DB_TIMEOUT_SECS), query_future)
            .await
            .map_err(|_| anyhow::anyhow!("Database operation timed out after {}s", DB_TIMEOUT_SECS))?
            .map_err(|e| anyhow::anyhow!("Failed to read recent changes for '{}': {}", agent_id, e))?;

        let mut changes = RecentChanges::default();
        for (trait_name, delta, recorded_at) in rows {
            let Ok(kind) = trait_name.parse::<TraitKind>() else {
                warn!(agent_id = %agent_id, trait_name = %trait_name, "Ignoring change row for unknown trait");
                continue;
            };
            let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
                .with_context(|| format!("Corrupt recorded_at '{recorded_at}' in trait_change_log"))?
                .with_timezone(&Utc);

            for period in LimitPeriod::ALL {
                if recorded_at > now - chrono::Duration::days(period.days()) {
                    changes.for_period_mut(*period)[kind] += delta.abs();
                }
            }
        }
        Ok(changes)
    }
}
