//! Row shapes returned by `sqlx::query_as`, one per table (§6). Plain,
//! owned fields matching column types exactly; conversion to/from domain
//! types happens in `repository`, not here.

use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct RecordingRow {
    pub id: i64,
    pub uuid: String,
    pub host_id: String,
    pub start_time: String,
    pub title: String,
    pub duration: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct IngestRow {
    pub id: i64,
    pub uuid: String,
    pub status: i64,
    pub timestamp: String,
    pub is_webhook: i64,
    pub zingest_params: String,
    pub mediapackage_id: Option<String>,
    pub workflow_id: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub updated: String,
}
