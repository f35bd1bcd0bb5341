//! Source Adapter: the sole boundary that talks to the video-conferencing
//! provider (§4.2). Everything else in the pipeline works with the types
//! defined here, never with raw provider JSON.

mod client;
mod error;
mod jwt;
mod models;
mod retry;
mod validate;

pub use client::{encode_uuid, SourceClient};
pub use error::{SourceError, SourceResult};
pub use jwt::CredentialMinter;
pub use models::{
    strip_zero_width_recursive, strip_zero_width_typed, JsonMap, RecordingFile, RecordingObject, RecordingsPage, RenameFields,
    RenderableEvent, SourceUser, UserSearchPage, WebhookBody,
};
pub use retry::RetryPolicy;
pub use validate::{validate_recording_object, validate_recording_payload, validate_renamed};
