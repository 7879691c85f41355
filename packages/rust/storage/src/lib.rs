//! libSQL storage layer: target registry and append-only snapshot store.
//!
//! The [`Storage`] struct wraps a libSQL database holding the monitored
//! targets and their observed content snapshots.
//!
//! **Access rules:**
//! - Pipeline/CLI: read-write (sole writer) via [`Storage::open`]
//! - Dashboard-style readers: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use pagewatch_shared::{PagewatchError, Result, Snapshot, SnapshotId, Target, TargetStatus};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PagewatchError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PagewatchError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| PagewatchError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.enable_foreign_keys().await?;
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PagewatchError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| PagewatchError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// SQLite only enforces `ON DELETE CASCADE` when foreign keys are
    /// enabled on the connection.
    async fn enable_foreign_keys(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .await
            .map_err(|e| PagewatchError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        PagewatchError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(PagewatchError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Target registry
    // -----------------------------------------------------------------------

    /// Insert a new target record.
    pub async fn insert_target(&self, target: &Target) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO targets (id, url, name, owner_email, frequency_hours, status, last_checked, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    target.id.to_string(),
                    target.url.as_str(),
                    target.name.as_deref(),
                    target.owner_email.as_str(),
                    i64::from(target.frequency_hours),
                    target.status.as_str(),
                    target.last_checked.map(|t| t.to_rfc3339()),
                    target.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| PagewatchError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Get a target by ID.
    pub async fn get_target(&self, id: &str) -> Result<Option<Target>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, url, name, owner_email, frequency_hours, status, last_checked, created_at
                 FROM targets WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| PagewatchError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_target(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(PagewatchError::Storage(e.to_string())),
        }
    }

    /// List all targets in registration order.
    pub async fn list_targets(&self) -> Result<Vec<Target>> {
        self.query_targets("SELECT id, url, name, owner_email, frequency_hours, status, last_checked, created_at
                 FROM targets ORDER BY created_at, id")
            .await
    }

    /// List targets eligible for a monitoring pass, in registration order.
    pub async fn list_active_targets(&self) -> Result<Vec<Target>> {
        self.query_targets(
            "SELECT id, url, name, owner_email, frequency_hours, status, last_checked, created_at
                 FROM targets WHERE status = 'active' ORDER BY created_at, id",
        )
        .await
    }

    async fn query_targets(&self, sql: &str) -> Result<Vec<Target>> {
        let mut rows = self
            .conn
            .query(sql, params![])
            .await
            .map_err(|e| PagewatchError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_target(&row)?);
        }
        Ok(results)
    }

    /// Delete a target; its snapshots cascade.
    pub async fn delete_target(&self, id: &str) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute("DELETE FROM targets WHERE id = ?1", params![id])
            .await
            .map_err(|e| PagewatchError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Set a target's lifecycle status (admin surface; the pipeline never
    /// changes status).
    pub async fn set_target_status(&self, id: &str, status: TargetStatus) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "UPDATE targets SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )
            .await
            .map_err(|e| PagewatchError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Record that the pipeline just checked a target.
    pub async fn touch_last_checked(&self, id: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE targets SET last_checked = ?1 WHERE id = ?2",
                params![now.as_str(), id],
            )
            .await
            .map_err(|e| PagewatchError::Storage(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Snapshot store (append-only)
    // -----------------------------------------------------------------------

    /// Append a snapshot. A single INSERT, so a record is either fully
    /// written or not written at all.
    pub async fn insert_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO snapshots (id, target_id, content_hash, clean_content, summary, diff_description, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    snapshot.id.to_string(),
                    snapshot.target_id.to_string(),
                    snapshot.content_hash.as_str(),
                    snapshot.clean_content.as_str(),
                    snapshot.summary.as_str(),
                    snapshot.diff_description.as_str(),
                    snapshot.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| PagewatchError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Get the most recent snapshot for a target, if any. Creation-time ties
    /// fall back to id order (UUID v7, so insertion order).
    pub async fn latest_snapshot(&self, target_id: &str) -> Result<Option<Snapshot>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, target_id, content_hash, clean_content, summary, diff_description, created_at
                 FROM snapshots WHERE target_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1",
                params![target_id],
            )
            .await
            .map_err(|e| PagewatchError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_snapshot(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(PagewatchError::Storage(e.to_string())),
        }
    }

    /// List snapshots for a target, most recent first.
    pub async fn list_snapshots(&self, target_id: &str, limit: u32) -> Result<Vec<Snapshot>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, target_id, content_hash, clean_content, summary, diff_description, created_at
                 FROM snapshots WHERE target_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2",
                params![target_id, i64::from(limit)],
            )
            .await
            .map_err(|e| PagewatchError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_snapshot(&row)?);
        }
        Ok(results)
    }

    /// Count snapshots stored for a target.
    pub async fn count_snapshots(&self, target_id: &str) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM snapshots WHERE target_id = ?1",
                params![target_id],
            )
            .await
            .map_err(|e| PagewatchError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let n: i64 = row
                    .get(0)
                    .map_err(|e| PagewatchError::Storage(e.to_string()))?;
                Ok(n as u64)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(PagewatchError::Storage(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Row converters
// ---------------------------------------------------------------------------

/// Convert a database row to a [`Target`].
fn row_to_target(row: &libsql::Row) -> Result<Target> {
    let status_str: String = row
        .get(5)
        .map_err(|e| PagewatchError::Storage(e.to_string()))?;

    Ok(Target {
        id: get_string(row, 0)?
            .parse()
            .map_err(|e| PagewatchError::Storage(format!("invalid target id: {e}")))?,
        url: get_string(row, 1)?,
        name: row.get::<String>(2).ok(),
        owner_email: get_string(row, 3)?,
        frequency_hours: row
            .get::<i64>(4)
            .map_err(|e| PagewatchError::Storage(e.to_string()))? as u32,
        status: status_str.parse()?,
        last_checked: match row.get::<String>(6).ok() {
            Some(s) => Some(parse_timestamp(&s)?),
            None => None,
        },
        created_at: parse_timestamp(&get_string(row, 7)?)?,
    })
}

/// Convert a database row to a [`Snapshot`].
fn row_to_snapshot(row: &libsql::Row) -> Result<Snapshot> {
    Ok(Snapshot {
        id: SnapshotId(
            get_string(row, 0)?
                .parse()
                .map_err(|e| PagewatchError::Storage(format!("invalid snapshot id: {e}")))?,
        ),
        target_id: get_string(row, 1)?
            .parse()
            .map_err(|e| PagewatchError::Storage(format!("invalid target id: {e}")))?,
        content_hash: get_string(row, 2)?,
        clean_content: get_string(row, 3)?,
        summary: get_string(row, 4)?,
        diff_description: get_string(row, 5)?,
        created_at: parse_timestamp(&get_string(row, 6)?)?,
    })
}

fn get_string(row: &libsql::Row, idx: i32) -> Result<String> {
    row.get::<String>(idx)
        .map_err(|e| PagewatchError::Storage(e.to_string()))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PagewatchError::Storage(format!("invalid date: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagewatch_shared::{ChangeSummary, Target, TargetStatus};
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("pw_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn make_target(url: &str) -> Target {
        Target::new(url, "owner@example.com", None).expect("valid target")
    }

    fn make_snapshot(target: &Target, hash: &str, content: &str) -> Snapshot {
        let change = ChangeSummary::initial();
        Snapshot {
            id: SnapshotId::new(),
            target_id: target.id.clone(),
            content_hash: hash.into(),
            clean_content: content.into(),
            summary: change.summary,
            diff_description: change.description,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("pw_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn target_crud() {
        let storage = test_storage().await;
        let target = make_target("https://example.com/pricing");

        storage.insert_target(&target).await.expect("insert");

        let found = storage
            .get_target(&target.id.to_string())
            .await
            .expect("get")
            .expect("present");
        assert_eq!(found.url, "https://example.com/pricing");
        assert_eq!(found.owner_email, "owner@example.com");
        assert_eq!(found.status, TargetStatus::Active);
        assert!(found.last_checked.is_none());

        let all = storage.list_targets().await.expect("list");
        assert_eq!(all.len(), 1);

        storage
            .delete_target(&target.id.to_string())
            .await
            .expect("delete");
        assert!(
            storage
                .get_target(&target.id.to_string())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn list_active_excludes_paused() {
        let storage = test_storage().await;

        let active = make_target("https://a.example.com");
        let paused = make_target("https://b.example.com");
        storage.insert_target(&active).await.unwrap();
        storage.insert_target(&paused).await.unwrap();

        storage
            .set_target_status(&paused.id.to_string(), TargetStatus::Paused)
            .await
            .expect("pause");

        let listed = storage.list_active_targets().await.expect("list active");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, active.id);
    }

    #[tokio::test]
    async fn touch_last_checked_updates_timestamp() {
        let storage = test_storage().await;
        let target = make_target("https://example.com");
        storage.insert_target(&target).await.unwrap();

        storage
            .touch_last_checked(&target.id.to_string())
            .await
            .expect("touch");

        let found = storage
            .get_target(&target.id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert!(found.last_checked.is_some());
    }

    #[tokio::test]
    async fn snapshot_append_and_latest() {
        let storage = test_storage().await;
        let target = make_target("https://example.com");
        storage.insert_target(&target).await.unwrap();

        let tid = target.id.to_string();
        assert!(storage.latest_snapshot(&tid).await.unwrap().is_none());

        let first = make_snapshot(&target, "hash-1", "Price: $10");
        storage.insert_snapshot(&first).await.expect("append first");

        let mut second = make_snapshot(&target, "hash-2", "Price: $20");
        second.created_at = first.created_at + chrono::Duration::seconds(1);
        storage.insert_snapshot(&second).await.expect("append second");

        let latest = storage
            .latest_snapshot(&tid)
            .await
            .expect("latest")
            .expect("present");
        assert_eq!(latest.content_hash, "hash-2");
        assert_eq!(latest.clean_content, "Price: $20");

        let history = storage.list_snapshots(&tid, 10).await.expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content_hash, "hash-2");
        assert_eq!(history[1].content_hash, "hash-1");

        assert_eq!(storage.count_snapshots(&tid).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn latest_breaks_created_at_ties_by_id() {
        let storage = test_storage().await;
        let target = make_target("https://example.com");
        storage.insert_target(&target).await.unwrap();

        // Same created_at on purpose; v7 ids still order by insertion
        let ts = Utc::now();
        let mut a = make_snapshot(&target, "hash-a", "a");
        let mut b = make_snapshot(&target, "hash-b", "b");
        a.created_at = ts;
        b.created_at = ts;
        // Force an unambiguous id ordering regardless of generation timing
        a.id = SnapshotId("00000000-0000-7000-8000-000000000001".parse().unwrap());
        b.id = SnapshotId("00000000-0000-7000-8000-000000000002".parse().unwrap());

        storage.insert_snapshot(&a).await.unwrap();
        storage.insert_snapshot(&b).await.unwrap();

        let latest = storage
            .latest_snapshot(&target.id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.content_hash, "hash-b");
    }

    #[tokio::test]
    async fn delete_target_cascades_to_snapshots() {
        let storage = test_storage().await;
        let target = make_target("https://example.com");
        storage.insert_target(&target).await.unwrap();

        let snap = make_snapshot(&target, "hash", "content");
        storage.insert_snapshot(&snap).await.unwrap();

        storage.delete_target(&target.id.to_string()).await.unwrap();
        assert_eq!(
            storage
                .count_snapshots(&target.id.to_string())
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("pw_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.insert_target(&make_target("https://example.com"))
            .await
            .unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        let result = ro.insert_target(&make_target("https://other.example.com")).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));

        // Reads still work
        assert_eq!(ro.list_targets().await.unwrap().len(), 1);
    }
}
