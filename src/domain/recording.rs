use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The canonical identity of one Source meeting instance (§3).
///
/// `uuid` is the Source-assigned opaque identity. It may begin with `/` or
/// contain `//`; callers must treat it as an opaque byte string and
/// double-URL-encode it whenever it is interpolated into a Source path
/// (see [`crate::source::encode_uuid`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    pub id: i64,
    pub uuid: String,
    pub host_id: String,
    pub start_time: DateTime<Utc>,
    pub title: String,
    pub duration_minutes: i64,
}

impl Recording {
    pub fn new(uuid: impl Into<String>, host_id: impl Into<String>, title: impl Into<String>, start_time: DateTime<Utc>, duration_minutes: i64) -> Self {
        Self {
            id: 0,
            uuid: uuid.into(),
            host_id: host_id.into(),
            start_time,
            title: crate::domain::strip_zero_width_space(&title.into()),
            duration_minutes,
        }
    }
}
