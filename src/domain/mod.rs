//! Core data model: the canonical Recording, the mutable Ingest lifecycle,
//! and the cached User identity tuple described in the persistence layer.

mod error;
mod ingest;
mod recording;
mod user;

pub use error::{PipelineError, Result};
pub use ingest::{Ingest, IngestParams, IngestStatus};
pub use recording::Recording;
pub use user::User;

/// Strip U+200B (zero-width space) from a string. The Source has been observed
/// to embed this character in recording titles; every human-entered string
/// that flows through Intake must be sanitized before persistence.
pub fn strip_zero_width_space(input: &str) -> String {
    input.chars().filter(|&c| c != '\u{200b}').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_zero_width_space() {
        let dirty = "Lecture\u{200b} 1\u{200b}";
        assert_eq!(strip_zero_width_space(dirty), "Lecture 1");
    }

    #[test]
    fn leaves_clean_strings_untouched() {
        assert_eq!(strip_zero_width_space("Lecture 1"), "Lecture 1");
    }
}
