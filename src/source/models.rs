//! Wire types for Source webhook/API payloads, and the U+200B stripping of
//! every string field in every decoded response (§4.2).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingFile {
    pub id: String,
    pub recording_start: String,
    pub recording_end: String,
    pub download_url: String,
    pub file_type: String,
    pub file_size: i64,
    pub recording_type: String,
    pub status: String,
}

impl RecordingFile {
    pub fn is_mp4(&self) -> bool {
        self.file_type.eq_ignore_ascii_case("mp4")
    }

    pub fn is_completed(&self) -> bool {
        self.status.eq_ignore_ascii_case("completed")
    }

    pub fn is_chat_file(&self) -> bool {
        self.recording_type.eq_ignore_ascii_case("chat_file")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingObject {
    pub id: Value,
    pub uuid: String,
    pub host_id: String,
    pub topic: String,
    pub start_time: String,
    pub duration: i64,
    pub recording_files: Vec<RecordingFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameFields {
    pub uuid: String,
    pub topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookBody {
    pub event: String,
    pub payload: Value,
    #[serde(default)]
    pub download_token: Option<String>,
}

/// A page of a user's recordings, as returned by `list_user_recordings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingsPage {
    pub meetings: Vec<RecordingObject>,
    pub next_page_token: Option<String>,
}

/// A cached/looked-up Source user, joined with Persistence's knowledge of
/// an Ingest's status, for the render-ready "renderable event" view (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderableEvent {
    pub id: String,
    pub title: String,
    pub date: String,
    pub duration: i64,
    pub url: String,
    pub email: String,
    pub host: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceUser {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSearchPage {
    pub users: Vec<SourceUser>,
    pub next_page_token: Option<String>,
}

/// Recursively strip U+200B from every string value in a JSON document.
/// Every decoded Source response is passed through this before being
/// returned to callers (§4.2).
pub fn strip_zero_width_recursive(value: &mut Value) {
    match value {
        Value::String(s) => {
            if s.contains('\u{200b}') {
                *s = crate::domain::strip_zero_width_space(s);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_zero_width_recursive(item);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                strip_zero_width_recursive(v);
            }
        }
        _ => {}
    }
}

/// Strip U+200B from every string value of a typed, serializable response.
pub fn strip_zero_width_typed<T: Serialize + for<'de> Deserialize<'de>>(value: T) -> serde_json::Result<T> {
    let mut json = serde_json::to_value(value)?;
    strip_zero_width_recursive(&mut json);
    serde_json::from_value(json)
}

pub type JsonMap = HashMap<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_zwsp_recursively() {
        let mut value = json!({
            "topic": "Lecture\u{200b}",
            "nested": { "title": "Talk\u{200b}s" },
            "list": ["a\u{200b}", "b"]
        });
        strip_zero_width_recursive(&mut value);
        assert_eq!(value["topic"], "Lecture");
        assert_eq!(value["nested"]["title"], "Talks");
        assert_eq!(value["list"][0], "a");
    }

    #[test]
    fn mp4_and_completed_are_case_insensitive() {
        let f = RecordingFile {
            id: "f1".into(),
            recording_start: "s".into(),
            recording_end: "e".into(),
            download_url: "u".into(),
            file_type: "MP4".into(),
            file_size: 10,
            recording_type: "shared_screen".into(),
            status: "COMPLETED".into(),
        };
        assert!(f.is_mp4());
        assert!(f.is_completed());
    }
}
