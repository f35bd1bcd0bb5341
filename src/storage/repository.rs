//! Repository functions translating the domain types to/from the row shapes
//! in `models` (§3, §6, §8). No other module issues `sqlx` queries.

use chrono::{DateTime, Utc};

use crate::domain::{Ingest, IngestParams, IngestStatus, PipelineError, Recording, Result, User};

use super::models::{IngestRow, RecordingRow, UserRow};
use super::pool::SqlitePool;

#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Readiness probe (§10.4): a trivial round-trip against the pool.
    pub async fn health_check(&self) -> Result<()> {
        self.pool.health_check().await
    }

    /// Inserts a Recording if its uuid is new, or refreshes its mutable
    /// fields (title, duration) if it already exists — a `recording.renamed`
    /// event and a re-delivered `recording.completed` both land here.
    pub async fn upsert_recording(&self, recording: &Recording) -> Result<Recording> {
        let row: RecordingRow = sqlx::query_as(
            r#"
            INSERT INTO recording (uuid, host_id, start_time, title, duration)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(uuid) DO UPDATE SET title = excluded.title, duration = excluded.duration
            RETURNING id, uuid, host_id, start_time, title, duration
            "#,
        )
        .bind(&recording.uuid)
        .bind(&recording.host_id)
        .bind(recording.start_time.to_rfc3339())
        .bind(&recording.title)
        .bind(recording.duration_minutes)
        .fetch_one(self.pool.inner())
        .await
        .map_err(|e| PipelineError::Storage(e.to_string()))?;

        recording_from_row(row)
    }

    pub async fn get_recording_by_uuid(&self, uuid: &str) -> Result<Option<Recording>> {
        let row: Option<RecordingRow> =
            sqlx::query_as("SELECT id, uuid, host_id, start_time, title, duration FROM recording WHERE uuid = ?1")
                .bind(uuid)
                .fetch_optional(self.pool.inner())
                .await
                .map_err(|e| PipelineError::Storage(e.to_string()))?;
        row.map(recording_from_row).transpose()
    }

    /// Creates a new Ingest row. §8 invariant 2 (at most one webhook=true
    /// Ingest per uuid) is enforced by a partial unique index; a duplicate
    /// webhook ingest surfaces here as a `Storage` error rather than
    /// silently overwriting the earlier one.
    pub async fn create_ingest(&self, ingest: &Ingest) -> Result<Ingest> {
        let params_json = serde_json::to_string(&ingest.params).map_err(|e| PipelineError::Storage(e.to_string()))?;

        let row: IngestRow = sqlx::query_as(
            r#"
            INSERT INTO ingest (uuid, status, timestamp, is_webhook, zingest_params, mediapackage_id, workflow_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING id, uuid, status, timestamp, is_webhook, zingest_params, mediapackage_id, workflow_id
            "#,
        )
        .bind(&ingest.uuid)
        .bind(ingest.status.as_db_code())
        .bind(ingest.timestamp.to_rfc3339())
        .bind(ingest.is_webhook as i64)
        .bind(params_json)
        .bind(&ingest.mediapackage_id)
        .bind(&ingest.workflow_instance_id)
        .fetch_one(self.pool.inner())
        .await
        .map_err(|e| PipelineError::Storage(e.to_string()))?;

        ingest_from_row(row)
    }

    /// The active (`webhook=true`) Ingest for `uuid`, if any (§4.1, §8
    /// invariant 2). Used by Intake to dedupe a replayed webhook and to
    /// decide whether a rename should fall through to a completion.
    pub async fn get_webhook_ingest_by_uuid(&self, uuid: &str) -> Result<Option<Ingest>> {
        let row: Option<IngestRow> = sqlx::query_as(
            "SELECT id, uuid, status, timestamp, is_webhook, zingest_params, mediapackage_id, workflow_id FROM ingest WHERE uuid = ?1 AND is_webhook = 1",
        )
        .bind(uuid)
        .fetch_optional(self.pool.inner())
        .await
        .map_err(|e| PipelineError::Storage(e.to_string()))?;
        row.map(ingest_from_row).transpose()
    }

    pub async fn get_ingest(&self, id: i64) -> Result<Option<Ingest>> {
        let row: Option<IngestRow> = sqlx::query_as(
            "SELECT id, uuid, status, timestamp, is_webhook, zingest_params, mediapackage_id, workflow_id FROM ingest WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(self.pool.inner())
        .await
        .map_err(|e| PipelineError::Storage(e.to_string()))?;
        row.map(ingest_from_row).transpose()
    }

    /// Moves an Ingest to `status`, recording the Sink's terminal ids when
    /// it reaches FINISHED or WARNING (§8 invariant 3), and stamping
    /// `timestamp` with the transition time (§3: "last-transition
    /// timestamp") so the reaper's staleness window is measured from the
    /// most recent transition, not from row creation.
    pub async fn transition_ingest(
        &self,
        id: i64,
        status: IngestStatus,
        mediapackage_id: Option<&str>,
        workflow_instance_id: Option<&str>,
    ) -> Result<()> {
        sqlx::query("UPDATE ingest SET status = ?1, timestamp = ?2, mediapackage_id = ?3, workflow_id = ?4 WHERE id = ?5")
            .bind(status.as_db_code())
            .bind(Utc::now().to_rfc3339())
            .bind(mediapackage_id)
            .bind(workflow_instance_id)
            .bind(id)
            .execute(self.pool.inner())
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Rows stuck in NEW for at least `threshold_secs`, candidates for the
    /// reaper (§4.4). IN_PROGRESS is deliberately excluded: an ingest that
    /// crashed mid-upload needs operator judgment, not an automatic reap.
    pub async fn reapable_ingests(&self, threshold_secs: i64) -> Result<Vec<Ingest>> {
        let cutoff = (Utc::now() - chrono::Duration::seconds(threshold_secs)).to_rfc3339();
        let rows: Vec<IngestRow> = sqlx::query_as(
            "SELECT id, uuid, status, timestamp, is_webhook, zingest_params, mediapackage_id, workflow_id FROM ingest WHERE status = ?1 AND timestamp <= ?2",
        )
        .bind(IngestStatus::New.as_db_code())
        .bind(cutoff)
        .fetch_all(self.pool.inner())
        .await
        .map_err(|e| PipelineError::Storage(e.to_string()))?;

        rows.into_iter().map(ingest_from_row).collect()
    }

    pub async fn upsert_user(&self, user: &User) -> Result<User> {
        sqlx::query(
            r#"
            INSERT INTO user (user_id, first_name, last_name, email, updated)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                email = excluded.email,
                updated = excluded.updated
            "#,
        )
        .bind(&user.user_id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.updated_at.to_rfc3339())
        .execute(self.pool.inner())
        .await
        .map_err(|e| PipelineError::Storage(e.to_string()))?;
        Ok(user.clone())
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT user_id, first_name, last_name, email, updated FROM user WHERE user_id = ?1")
                .bind(user_id)
                .fetch_optional(self.pool.inner())
                .await
                .map_err(|e| PipelineError::Storage(e.to_string()))?;
        row.map(user_from_row).transpose()
    }
}

fn recording_from_row(row: RecordingRow) -> Result<Recording> {
    Ok(Recording {
        id: row.id,
        uuid: row.uuid,
        host_id: row.host_id,
        start_time: parse_rfc3339(&row.start_time)?,
        title: row.title,
        duration_minutes: row.duration,
    })
}

fn ingest_from_row(row: IngestRow) -> Result<Ingest> {
    let params: IngestParams = serde_json::from_str(&row.zingest_params).map_err(|e| PipelineError::Storage(e.to_string()))?;
    Ok(Ingest {
        id: row.id,
        uuid: row.uuid,
        status: IngestStatus::from_db_code(row.status)
            .ok_or_else(|| PipelineError::Storage(format!("unknown ingest status code {}", row.status)))?,
        timestamp: parse_rfc3339(&row.timestamp)?,
        is_webhook: row.is_webhook != 0,
        params,
        mediapackage_id: row.mediapackage_id,
        workflow_instance_id: row.workflow_id,
    })
}

fn user_from_row(row: UserRow) -> Result<User> {
    Ok(User {
        user_id: row.user_id,
        email: row.email,
        first_name: row.first_name,
        last_name: row.last_name,
        updated_at: parse_rfc3339(&row.updated)?,
    })
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PipelineError::Storage(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_repo() -> Repository {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        pool.run_migrations().await.unwrap();
        Repository::new(pool)
    }

    #[tokio::test]
    async fn round_trips_a_recording() {
        let repo = test_repo().await;
        let recording = Recording::new("abc==", "host-1", "Lecture", Utc::now(), 45);
        let saved = repo.upsert_recording(&recording).await.unwrap();
        assert!(saved.id > 0);

        let fetched = repo.get_recording_by_uuid("abc==").await.unwrap().unwrap();
        assert_eq!(fetched.title, "Lecture");
    }

    #[tokio::test]
    async fn upserting_a_recording_twice_updates_rather_than_duplicates() {
        let repo = test_repo().await;
        let mut recording = Recording::new("abc==", "host-1", "Lecture", Utc::now(), 45);
        let first = repo.upsert_recording(&recording).await.unwrap();
        recording.title = "Lecture (renamed)".to_string();
        let second = repo.upsert_recording(&recording).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.title, "Lecture (renamed)");
    }

    #[tokio::test]
    async fn rejects_a_second_webhook_ingest_for_the_same_uuid() {
        let repo = test_repo().await;
        let recording = Recording::new("abc==", "host-1", "Lecture", Utc::now(), 45);
        repo.upsert_recording(&recording).await.unwrap();

        let first = Ingest::new_for("abc==", true, IngestParams::default());
        repo.create_ingest(&first).await.unwrap();

        let second = Ingest::new_for("abc==", true, IngestParams::default());
        let err = repo.create_ingest(&second).await.unwrap_err();
        assert!(matches!(err, PipelineError::Storage(_)));
    }

    #[tokio::test]
    async fn finds_the_active_webhook_ingest_by_uuid() {
        let repo = test_repo().await;
        let recording = Recording::new("abc==", "host-1", "Lecture", Utc::now(), 45);
        repo.upsert_recording(&recording).await.unwrap();
        repo.create_ingest(&Ingest::new_for("abc==", true, IngestParams::default())).await.unwrap();

        let found = repo.get_webhook_ingest_by_uuid("abc==").await.unwrap();
        assert!(found.is_some());
        assert!(repo.get_webhook_ingest_by_uuid("nope==").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn a_non_webhook_ingest_does_not_collide_with_a_webhook_one() {
        let repo = test_repo().await;
        let recording = Recording::new("abc==", "host-1", "Lecture", Utc::now(), 45);
        repo.upsert_recording(&recording).await.unwrap();

        repo.create_ingest(&Ingest::new_for("abc==", true, IngestParams::default())).await.unwrap();
        repo.create_ingest(&Ingest::new_for("abc==", false, IngestParams::default())).await.unwrap();
    }

    #[tokio::test]
    async fn transitions_status_and_records_terminal_ids() {
        let repo = test_repo().await;
        let recording = Recording::new("abc==", "host-1", "Lecture", Utc::now(), 45);
        repo.upsert_recording(&recording).await.unwrap();
        let created = repo.create_ingest(&Ingest::new_for("abc==", false, IngestParams::default())).await.unwrap();

        repo.transition_ingest(created.id, IngestStatus::Finished, Some("mp-1"), Some("wf-1")).await.unwrap();
        let fetched = repo.get_ingest(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, IngestStatus::Finished);
        assert!(fetched.finished_ids_valid());
    }

    #[tokio::test]
    async fn reapable_ingests_excludes_fresh_rows() {
        let repo = test_repo().await;
        let recording = Recording::new("abc==", "host-1", "Lecture", Utc::now(), 45);
        repo.upsert_recording(&recording).await.unwrap();
        repo.create_ingest(&Ingest::new_for("abc==", false, IngestParams::default())).await.unwrap();

        let reapable = repo.reapable_ingests(3600).await.unwrap();
        assert!(reapable.is_empty(), "a just-created ingest should not be reapable yet");
    }

    #[tokio::test]
    async fn round_trips_a_user() {
        let repo = test_repo().await;
        let user = User {
            user_id: "u1".into(),
            email: "a@example.edu".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            updated_at: Utc::now(),
        };
        repo.upsert_user(&user).await.unwrap();
        let fetched = repo.get_user("u1").await.unwrap().unwrap();
        assert_eq!(fetched.display_name(), "Lovelace, Ada");
    }
}
