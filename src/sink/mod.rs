//! Sink Adapter: the institutional media-processing platform's ingest
//! protocol and its cached catalogs (§4.3).

mod catalog;
mod client;
mod dc;
mod digest;
mod error;
mod http;
mod mediapackage;
mod xacml;

pub use catalog::{format_series_title, AclEntry, AclRecord, CatalogCache, WorkflowDef};
pub use client::{SinkAdapter, UploadFile};
pub use dc::{build_episode_dc, build_ethterms_dc, format_extent};
pub use error::{SinkError, SinkResult};
pub use http::AuthedHttp;
pub use mediapackage::{extract_mediapackage_id, extract_workflow_ids, validate_mediapackage_xml};
pub use xacml::build_episode_policy;
