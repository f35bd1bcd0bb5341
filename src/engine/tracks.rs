//! Track selection (§4.4): prefer a recording_type from `PREFERRED_TYPES`
//! over one from `FALLBACK_TYPES`; choosing a fallback marks the owning
//! Ingest WARNING rather than FINISHED. Chat transcript files are never
//! video candidates, but a `chat_file` entry is looked up separately for
//! attachment as a transcript.

use crate::domain::PipelineError;
use crate::source::RecordingFile;

/// Preferred recording types, in priority order (§4.4). Kept as code, not
/// config (DESIGN.md): these reflect a fixed visual-quality ranking, not a
/// per-deployment policy a config file should own.
const PREFERRED_TYPES: &[&str] =
    &["shared_screen_with_speaker_view", "shared_screen_with_speaker_view(cc)", "shared_screen", "active_speaker"];

/// Acceptable but lower-quality types; selecting one of these is a WARNING,
/// not a FINISHED.
const FALLBACK_TYPES: &[&str] = &["shared_screen_with_gallery_view", "gallery_view", "speaker_view", "audio_only"];

pub struct TrackSelection<'a> {
    pub file: &'a RecordingFile,
    pub used_fallback: bool,
}

/// Picks the best acceptable mp4 among `files`, in preferred-then-fallback
/// order. `NoMp4Files` if nothing in either list matches (§4.4, §7).
pub fn select_track(files: &[RecordingFile]) -> Result<TrackSelection<'_>, PipelineError> {
    let candidates: Vec<&RecordingFile> = files.iter().filter(|f| f.is_mp4() && f.is_completed() && !f.is_chat_file()).collect();

    for recording_type in PREFERRED_TYPES {
        if let Some(file) = candidates.iter().find(|f| f.recording_type.eq_ignore_ascii_case(recording_type)) {
            return Ok(TrackSelection { file, used_fallback: false });
        }
    }

    for recording_type in FALLBACK_TYPES {
        if let Some(file) = candidates.iter().find(|f| f.recording_type.eq_ignore_ascii_case(recording_type)) {
            return Ok(TrackSelection { file, used_fallback: true });
        }
    }

    Err(PipelineError::NoMp4Files("no file matched the preferred or fallback recording_type lists".to_string()))
}

/// Locates the `chat_file` entry, if any, for optional attachment as a
/// transcript (§4.4). A chat file's `status`/`file_type` aren't screened —
/// unlike video candidates, there's exactly one role it can play.
pub fn find_chat_file(files: &[RecordingFile]) -> Option<&RecordingFile> {
    files.iter().find(|f| f.is_chat_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(recording_type: &str, file_type: &str, status: &str) -> RecordingFile {
        RecordingFile {
            id: format!("{recording_type}-id"),
            recording_start: "2024-01-01T00:00:00Z".into(),
            recording_end: "2024-01-01T01:00:00Z".into(),
            download_url: "https://src/x".into(),
            file_type: file_type.into(),
            file_size: 1024,
            recording_type: recording_type.into(),
            status: status.into(),
        }
    }

    #[test]
    fn prefers_shared_screen_with_speaker_view() {
        let files = vec![file("gallery_view", "mp4", "completed"), file("shared_screen_with_speaker_view", "mp4", "completed")];
        let selection = select_track(&files).unwrap();
        assert_eq!(selection.file.recording_type, "shared_screen_with_speaker_view");
        assert!(!selection.used_fallback);
    }

    #[test]
    fn falls_back_and_flags_warning_when_no_preferred_type_present() {
        let files = vec![file("gallery_view", "mp4", "completed")];
        let selection = select_track(&files).unwrap();
        assert_eq!(selection.file.recording_type, "gallery_view");
        assert!(selection.used_fallback);
    }

    #[test]
    fn never_selects_a_chat_file() {
        let files = vec![file("chat_file", "txt", "completed")];
        let err = select_track(&files).unwrap_err();
        assert!(matches!(err, PipelineError::NoMp4Files(_)));
    }

    #[test]
    fn rejects_when_nothing_completed() {
        let files = vec![file("shared_screen_with_speaker_view", "mp4", "processing")];
        let err = select_track(&files).unwrap_err();
        assert!(matches!(err, PipelineError::NoMp4Files(_)));
    }

    #[test]
    fn rejects_a_recording_type_in_neither_list() {
        let files = vec![file("some_unlisted_type", "mp4", "completed")];
        let err = select_track(&files).unwrap_err();
        assert!(matches!(err, PipelineError::NoMp4Files(_)));
    }

    #[test]
    fn prefers_active_speaker_over_any_fallback_type() {
        let files = vec![file("audio_only", "mp4", "completed"), file("active_speaker", "mp4", "completed")];
        let selection = select_track(&files).unwrap();
        assert_eq!(selection.file.recording_type, "active_speaker");
        assert!(!selection.used_fallback);
    }

    #[test]
    fn is_deterministic_given_the_same_input() {
        let files = vec![file("gallery_view", "mp4", "completed"), file("speaker_view", "mp4", "completed")];
        let first = select_track(&files).unwrap();
        let second = select_track(&files).unwrap();
        assert_eq!(first.file.id, second.file.id);
    }

    #[test]
    fn finds_a_chat_file_alongside_the_video_candidates() {
        let files = vec![file("shared_screen_with_speaker_view", "mp4", "completed"), file("chat_file", "txt", "completed")];
        let chat = find_chat_file(&files).unwrap();
        assert_eq!(chat.recording_type, "chat_file");
    }

    #[test]
    fn no_chat_file_when_none_present() {
        let files = vec![file("shared_screen_with_speaker_view", "mp4", "completed")];
        assert!(find_chat_file(&files).is_none());
    }
}
