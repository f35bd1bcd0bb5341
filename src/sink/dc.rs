//! Dublin Core and institutional-extension ("ethterms") catalog builders
//! (§4.3 Metadata shaping).

use std::collections::HashMap;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;

use super::error::{SinkError, SinkResult};

const DC_NS: &str = "http://www.opencastproject.org/xsd/1.0/dublincore/";
const DCTERMS_NS: &str = "http://purl.org/dc/terms/";
const ETHTERMS_NS: &str = "http://www.opencastproject.org/xsd/1.0/ethterms/";

/// Fields that become one `dcterms:*` element per `;`-separated value.
const LIST_FIELDS: &[&str] = &["publisher", "contributor", "presenter", "creator", "subjects"];

/// Builds the `dublincore/episode` catalog consumed by `addDCCatalog`.
pub fn build_episode_dc(
    title: &str,
    creator: Option<&str>,
    date: Option<&str>,
    duration_minutes: Option<i64>,
    extra: &HashMap<String, String>,
) -> SinkResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    let mut root = BytesStart::new("dublincore");
    root.push_attribute(("xmlns", DC_NS));
    root.push_attribute(("xmlns:dcterms", DCTERMS_NS));
    writer.write_event(Event::Start(root.clone())).map_err(xml_err)?;

    write_elements(&mut writer, "title", &[title.to_string()])?;

    if let Some(creator) = creator {
        if !extra.contains_key("creator") {
            write_elements(&mut writer, "creator", &split_list(creator))?;
        }
    }

    for field in LIST_FIELDS {
        if let Some(value) = extra.get(*field) {
            write_elements(&mut writer, field, &split_list(value))?;
        }
    }

    if let Some(date) = date {
        write_elements(&mut writer, "created", &[date.to_string()])?;
    }

    if let Some(minutes) = duration_minutes {
        write_elements(&mut writer, "extent", &[format_extent(minutes)])?;
    }

    let spatial = extra.get("dcterms:spatial").or_else(|| extra.get("spatial")).cloned().unwrap_or_else(|| "Zoom".to_string());
    write_elements(&mut writer, "spatial", &[spatial])?;

    writer.write_event(Event::End(BytesEnd::new("dublincore"))).map_err(xml_err)?;

    String::from_utf8(writer.into_inner()).map_err(|e| SinkError::Xml(e.to_string()))
}

/// Builds the institutional extension (`ethterms/episode`) catalog: only
/// `eth-*` fields survive, stripped of their prefix.
pub fn build_ethterms_dc(extra: &HashMap<String, String>) -> SinkResult<Option<String>> {
    let eth_fields: Vec<(&str, String)> = extra
        .iter()
        .filter_map(|(k, v)| {
            k.strip_prefix("eth-").map(|stripped| {
                let value = if stripped == "advertised" {
                    if v.eq_ignore_ascii_case("on") { "true".to_string() } else { "false".to_string() }
                } else {
                    v.clone()
                };
                (stripped, value)
            })
        })
        .collect();

    if eth_fields.is_empty() {
        return Ok(None);
    }

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    let mut root = BytesStart::new("ethterms");
    root.push_attribute(("xmlns", ETHTERMS_NS));
    writer.write_event(Event::Start(root.clone())).map_err(xml_err)?;

    for (name, value) in eth_fields {
        let start = BytesStart::new(name);
        writer.write_event(Event::Start(start)).map_err(xml_err)?;
        writer.write_event(Event::Text(BytesText::new(&value))).map_err(xml_err)?;
        writer.write_event(Event::End(BytesEnd::new(name))).map_err(xml_err)?;
    }

    writer.write_event(Event::End(BytesEnd::new("ethterms"))).map_err(xml_err)?;
    Ok(Some(String::from_utf8(writer.into_inner()).map_err(|e| SinkError::Xml(e.to_string()))?))
}

fn split_list(value: &str) -> Vec<String> {
    value.split(';').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

/// `dcterms:extent = "PT{H}H{M}M0S"`, `H = dur / 60`, `M = dur - 60H`.
pub fn format_extent(duration_minutes: i64) -> String {
    let hours = duration_minutes / 60;
    let minutes = duration_minutes - 60 * hours;
    format!("PT{hours}H{minutes}M0S")
}

fn write_elements(writer: &mut Writer<Vec<u8>>, local_name: &str, values: &[String]) -> SinkResult<()> {
    for value in values {
        let start = BytesStart::new(format!("dcterms:{local_name}"));
        writer.write_event(Event::Start(start)).map_err(xml_err)?;
        writer.write_event(Event::Text(BytesText::new(value))).map_err(xml_err)?;
        writer.write_event(Event::End(BytesEnd::new(format!("dcterms:{local_name}")))).map_err(xml_err)?;
    }
    Ok(())
}

fn xml_err(e: quick_xml::Error) -> SinkError {
    SinkError::Xml(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_formats_hours_and_minutes() {
        assert_eq!(format_extent(90), "PT1H30M0S");
        assert_eq!(format_extent(45), "PT0H45M0S");
    }

    #[test]
    fn episode_dc_defaults_spatial_to_zoom() {
        let xml = build_episode_dc("Lecture 1", Some("Prof A"), Some("2024-01-02T10:00:00Z"), Some(45), &HashMap::new()).unwrap();
        assert!(xml.contains("<dcterms:spatial>Zoom</dcterms:spatial>"));
        assert!(xml.contains("<dcterms:extent>PT0H45M0S</dcterms:extent>"));
        assert!(xml.contains("<dcterms:created>2024-01-02T10:00:00Z</dcterms:created>"));
    }

    #[test]
    fn episode_dc_splits_semicolon_lists() {
        let mut extra = HashMap::new();
        extra.insert("presenter".to_string(), "Alice;Bob".to_string());
        let xml = build_episode_dc("Lecture 1", None, None, None, &extra).unwrap();
        assert_eq!(xml.matches("<dcterms:presenter>").count(), 2);
        assert!(xml.contains("<dcterms:presenter>Alice</dcterms:presenter>"));
        assert!(xml.contains("<dcterms:presenter>Bob</dcterms:presenter>"));
    }

    #[test]
    fn episode_dc_skips_origin_and_eth_fields() {
        let mut extra = HashMap::new();
        extra.insert("origin_host".to_string(), "zoom-room-1".to_string());
        extra.insert("eth-advertised".to_string(), "on".to_string());
        let xml = build_episode_dc("Lecture 1", None, None, None, &extra).unwrap();
        assert!(!xml.contains("origin_host"));
        assert!(!xml.contains("eth-advertised"));
    }

    #[test]
    fn episode_dc_ignores_keys_outside_the_documented_allowlist() {
        let mut extra = HashMap::new();
        extra.insert("titel".to_string(), "typo'd field name".to_string());
        let xml = build_episode_dc("Lecture 1", None, None, None, &extra).unwrap();
        assert!(!xml.contains("titel"));
        assert!(!xml.contains("typo'd field name"));
    }

    #[test]
    fn ethterms_strips_prefix_and_coerces_advertised() {
        let mut extra = HashMap::new();
        extra.insert("eth-advertised".to_string(), "on".to_string());
        extra.insert("eth-license".to_string(), "cc-by".to_string());
        extra.insert("title".to_string(), "ignored".to_string());
        let xml = build_ethterms_dc(&extra).unwrap().unwrap();
        assert!(xml.contains("<advertised>true</advertised>"));
        assert!(xml.contains("<license>cc-by</license>"));
        assert!(!xml.contains("ignored"));
    }

    #[test]
    fn ethterms_absent_when_no_eth_fields() {
        let extra = HashMap::new();
        assert!(build_ethterms_dc(&extra).unwrap().is_none());
    }
}
