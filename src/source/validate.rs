//! Payload validation (§4.1, §4.2). Operates on raw JSON so that a missing
//! field can be distinguished from a malformed one, matching the "missing
//! field -> BadWebhookData" contract precisely.

use serde_json::Value;

use super::error::SourceError;
use super::models::{RecordingFile, RecordingObject};

const REQUIRED_OBJECT_FIELDS: &[&str] = &["id", "uuid", "host_id", "topic", "start_time", "duration", "recording_files"];
const REQUIRED_FILE_FIELDS: &[&str] = &[
    "id",
    "recording_start",
    "recording_end",
    "download_url",
    "file_type",
    "file_size",
    "recording_type",
    "status",
];

/// Validate the top-level webhook payload: must be a JSON object with an
/// `object` field (the recording).
pub fn validate_recording_payload(payload: &Value) -> Result<(), SourceError> {
    let obj = payload.as_object().ok_or_else(|| SourceError::BadWebhookData("payload is not a JSON object".into()))?;
    if !obj.contains_key("object") {
        return Err(SourceError::BadWebhookData(format!(
            "missing required payload field 'object'. keys found: {:?}",
            obj.keys().collect::<Vec<_>>()
        )));
    }
    Ok(())
}

/// Validate the recording object embedded in a `recording.completed` event.
pub fn validate_recording_object(obj: &Value) -> Result<RecordingObject, SourceError> {
    let map = obj.as_object().ok_or_else(|| SourceError::BadWebhookData("object is not a JSON object".into()))?;

    for field in REQUIRED_OBJECT_FIELDS {
        if !map.contains_key(*field) {
            return Err(SourceError::BadWebhookData(format!(
                "missing required object field '{field}'. keys found: {:?}",
                map.keys().collect::<Vec<_>>()
            )));
        }
    }

    let files_value = map.get("recording_files").expect("checked above");
    let files_array = files_value.as_array().ok_or_else(|| SourceError::BadWebhookData("recording_files is not an array".into()))?;

    let mut files = Vec::with_capacity(files_array.len());
    for file_value in files_array {
        let file_map = file_value.as_object().ok_or_else(|| SourceError::BadWebhookData("recording file is not a JSON object".into()))?;
        for field in REQUIRED_FILE_FIELDS {
            if !file_map.contains_key(*field) {
                return Err(SourceError::BadWebhookData(format!("missing required file field '{field}'")));
            }
        }
        let file: RecordingFile = serde_json::from_value(file_value.clone()).map_err(|e| SourceError::BadWebhookData(e.to_string()))?;
        files.push(file);
    }

    let has_acceptable_mp4 = files.iter().any(|f| f.is_mp4() && f.is_completed());
    if !has_acceptable_mp4 {
        return Err(SourceError::NoMp4Files("no completed mp4 files in recording data".into()));
    }

    let recording: RecordingObject = serde_json::from_value(obj.clone()).map_err(|e| SourceError::BadWebhookData(e.to_string()))?;
    Ok(recording)
}

/// Validate a `recording.renamed` event: requires `old_object` and `object`,
/// each with at least `uuid` and `topic`.
pub fn validate_renamed(payload: &Value) -> Result<(super::models::RenameFields, super::models::RenameFields), SourceError> {
    let map = payload.as_object().ok_or_else(|| SourceError::BadWebhookData("payload is not a JSON object".into()))?;

    let old_object = map.get("old_object").ok_or_else(|| SourceError::BadWebhookData("missing required payload field 'old_object'".into()))?;
    let object = map.get("object").ok_or_else(|| SourceError::BadWebhookData("missing required payload field 'object'".into()))?;

    let old_fields = extract_rename_fields(old_object)?;
    let new_fields = extract_rename_fields(object)?;

    Ok((old_fields, new_fields))
}

fn extract_rename_fields(value: &Value) -> Result<super::models::RenameFields, SourceError> {
    let map = value.as_object().ok_or_else(|| SourceError::BadWebhookData("rename object is not a JSON object".into()))?;
    for field in ["uuid", "topic"] {
        if !map.contains_key(field) {
            return Err(SourceError::BadWebhookData(format!("missing required rename field '{field}'")));
        }
    }
    serde_json::from_value(value.clone()).map_err(|e| SourceError::BadWebhookData(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_object() -> Value {
        json!({
            "id": 123,
            "uuid": "abc==",
            "host_id": "H",
            "topic": "Lecture",
            "start_time": "2024-01-02T10:00:00Z",
            "duration": 45,
            "recording_files": [{
                "id": "F1",
                "recording_start": "2024-01-02T10:00:00Z",
                "recording_end": "2024-01-02T10:45:00Z",
                "download_url": "https://src/x",
                "file_type": "MP4",
                "file_size": 1024,
                "recording_type": "shared_screen_with_speaker_view",
                "status": "completed"
            }]
        })
    }

    #[test]
    fn accepts_a_complete_payload() {
        let payload = json!({ "object": valid_object() });
        validate_recording_payload(&payload).unwrap();
        validate_recording_object(&valid_object()).unwrap();
    }

    #[test]
    fn rejects_payload_missing_object() {
        let payload = json!({ "nope": true });
        let err = validate_recording_payload(&payload).unwrap_err();
        assert!(matches!(err, SourceError::BadWebhookData(_)));
    }

    #[test]
    fn rejects_object_missing_a_required_field() {
        let mut obj = valid_object();
        obj.as_object_mut().unwrap().remove("host_id");
        let err = validate_recording_object(&obj).unwrap_err();
        assert!(matches!(err, SourceError::BadWebhookData(_)));
    }

    #[test]
    fn rejects_when_no_completed_mp4_present() {
        let mut obj = valid_object();
        obj["recording_files"][0]["file_type"] = json!("m4a");
        let err = validate_recording_object(&obj).unwrap_err();
        assert!(matches!(err, SourceError::NoMp4Files(_)));
    }

    #[test]
    fn rejects_when_mp4_present_but_not_completed() {
        let mut obj = valid_object();
        obj["recording_files"][0]["status"] = json!("processing");
        let err = validate_recording_object(&obj).unwrap_err();
        assert!(matches!(err, SourceError::NoMp4Files(_)));
    }

    #[test]
    fn validates_rename_fields() {
        let payload = json!({
            "old_object": { "uuid": "abc==", "topic": "Lecture" },
            "object": { "uuid": "abc==", "topic": "Lecture (fixed)" }
        });
        let (old, new) = validate_renamed(&payload).unwrap();
        assert_eq!(old.topic, "Lecture");
        assert_eq!(new.topic, "Lecture (fixed)");
    }

    #[test]
    fn rejects_rename_missing_old_object() {
        let payload = json!({ "object": { "uuid": "a", "topic": "b" } });
        let err = validate_renamed(&payload).unwrap_err();
        assert!(matches!(err, SourceError::BadWebhookData(_)));
    }
}
