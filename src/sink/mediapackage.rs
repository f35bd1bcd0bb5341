//! Intermediate mediapackage XML validation and id extraction (§4.3): each
//! upload step consumes the previous step's mediapackage XML, and a parse
//! failure aborts with a retryable error.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use super::error::{SinkError, SinkResult};

/// Parses `xml` purely to confirm well-formedness; a failure is retryable
/// per §7 (`MediapackageInvalid`).
pub fn validate_mediapackage_xml(xml: &str) -> SinkResult<()> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => return Ok(()),
            Ok(_) => buf.clear(),
            Err(e) => return Err(SinkError::MediapackageInvalid(e.to_string())),
        }
    }
}

/// Extracts the `id` attribute of the root `mediapackage` element returned
/// by each intermediate `/ingest/*` step.
pub fn extract_mediapackage_id(xml: &str) -> SinkResult<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => {
                return Err(SinkError::MediapackageInvalid("no mediapackage element with an id attribute".into()))
            }
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if local_name(e.name().as_ref()) == "mediapackage" {
                    for attr in e.attributes().flatten() {
                        if local_name(attr.key.as_ref()) == "id" {
                            let value = attr.unescape_value().map_err(|err| SinkError::MediapackageInvalid(err.to_string()))?;
                            return Ok(value.into_owned());
                        }
                    }
                    return Err(SinkError::MediapackageInvalid("mediapackage element missing id attribute".into()));
                }
            }
            Ok(_) => {}
            Err(e) => return Err(SinkError::MediapackageInvalid(e.to_string())),
        }
        buf.clear();
    }
}

/// Extracts both `wf:workflow/@id` (workflow instance id) and
/// `wf:workflow/mp:mediapackage/@id` (mediapackage id) from the final
/// `/ingest/ingest/{workflow_id}` response.
pub fn extract_workflow_ids(xml: &str) -> SinkResult<(String, String)> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut workflow_instance_id = None;
    let mut mediapackage_id = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = local_name(e.name().as_ref());
                if name == "workflow" && workflow_instance_id.is_none() {
                    for attr in e.attributes().flatten() {
                        if local_name(attr.key.as_ref()) == "id" {
                            let value = attr.unescape_value().map_err(|err| SinkError::MediapackageInvalid(err.to_string()))?;
                            workflow_instance_id = Some(value.into_owned());
                        }
                    }
                } else if name == "mediapackage" && mediapackage_id.is_none() {
                    for attr in e.attributes().flatten() {
                        if local_name(attr.key.as_ref()) == "id" {
                            let value = attr.unescape_value().map_err(|err| SinkError::MediapackageInvalid(err.to_string()))?;
                            mediapackage_id = Some(value.into_owned());
                        }
                    }
                }
            }
            Ok(_) => {}
            Err(e) => return Err(SinkError::MediapackageInvalid(e.to_string())),
        }
        buf.clear();
    }

    match (mediapackage_id, workflow_instance_id) {
        (Some(mp), Some(wf)) => Ok((mp, wf)),
        _ => Err(SinkError::MediapackageInvalid("workflow response missing mediapackage id or workflow instance id".into())),
    }
}

fn local_name(qualified: &[u8]) -> &str {
    let s = std::str::from_utf8(qualified).unwrap_or("");
    s.rsplit(':').next().unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_xml() {
        let err = validate_mediapackage_xml("<mediapackage id=\"x\"><unclosed></mediapackage>").unwrap_err();
        assert!(matches!(err, SinkError::MediapackageInvalid(_)));
    }

    #[test]
    fn accepts_well_formed_xml() {
        validate_mediapackage_xml(r#"<mediapackage id="mp-1"></mediapackage>"#).unwrap();
    }

    #[test]
    fn extracts_mediapackage_id() {
        let id = extract_mediapackage_id(r#"<mediapackage id="mp-42" start="x"></mediapackage>"#).unwrap();
        assert_eq!(id, "mp-42");
    }

    #[test]
    fn extracts_workflow_and_mediapackage_ids() {
        let xml = r#"
            <wf:workflow xmlns:wf="http://workflow.opencastproject.org" id="wf-7">
              <wf:mediapackage xmlns:mp="http://mediapackage.opencastproject.org" id="mp-9"></wf:mediapackage>
            </wf:workflow>
        "#;
        let (mp_id, wf_id) = extract_workflow_ids(xml).unwrap();
        assert_eq!(mp_id, "mp-9");
        assert_eq!(wf_id, "wf-7");
    }
}
