//! XACML permit-overrides policy builder for `security/xacml+episode`
//! attachments (§4.3).

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;

use super::catalog::AclEntry;
use super::error::{SinkError, SinkResult};

const XACML_NS: &str = "urn:oasis:names:tc:xacml:2.0:policy:schema:os";
const RULE_COMBINING_ALGORITHM: &str = "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:permit-overrides";

/// Builds a permit-overrides policy scoped to `resource_id`: one Permit rule
/// per (role, action) entry in the ACL, plus a terminal catch-all Deny rule.
pub fn build_episode_policy(resource_id: &str, entries: &[AclEntry]) -> SinkResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    let policy_id = format!("mediapackage-{resource_id}");
    let mut policy = BytesStart::new("Policy");
    policy.push_attribute(("xmlns", XACML_NS));
    policy.push_attribute(("PolicyId", policy_id.as_str()));
    policy.push_attribute(("RuleCombiningAlgId", RULE_COMBINING_ALGORITHM));
    writer.write_event(Event::Start(policy.clone())).map_err(xml_err)?;

    write_target_resource(&mut writer, resource_id)?;

    for (i, entry) in entries.iter().filter(|e| e.allow).enumerate() {
        write_permit_rule(&mut writer, &format!("{}_{}_Permit", entry.role, i), &entry.role, &entry.action)?;
    }

    write_deny_rule(&mut writer)?;

    writer.write_event(Event::End(BytesEnd::new("Policy"))).map_err(xml_err)?;
    String::from_utf8(writer.into_inner()).map_err(|e| SinkError::Xml(e.to_string()))
}

fn write_target_resource(writer: &mut Writer<Vec<u8>>, resource_id: &str) -> SinkResult<()> {
    writer.write_event(Event::Start(BytesStart::new("Target"))).map_err(xml_err)?;
    writer.write_event(Event::Start(BytesStart::new("Resources"))).map_err(xml_err)?;
    writer.write_event(Event::Start(BytesStart::new("Resource"))).map_err(xml_err)?;
    writer.write_event(Event::Start(BytesStart::new("ResourceMatch"))).map_err(xml_err)?;
    writer.write_event(Event::Start(BytesStart::new("AttributeValue"))).map_err(xml_err)?;
    writer.write_event(Event::Text(BytesText::new(resource_id))).map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new("AttributeValue"))).map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new("ResourceMatch"))).map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new("Resource"))).map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new("Resources"))).map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new("Target"))).map_err(xml_err)?;
    Ok(())
}

fn write_permit_rule(writer: &mut Writer<Vec<u8>>, rule_id: &str, role: &str, action: &str) -> SinkResult<()> {
    let mut rule = BytesStart::new("Rule");
    rule.push_attribute(("RuleId", rule_id));
    rule.push_attribute(("Effect", "Permit"));
    writer.write_event(Event::Start(rule.clone())).map_err(xml_err)?;

    writer.write_event(Event::Start(BytesStart::new("Target"))).map_err(xml_err)?;
    writer.write_event(Event::Start(BytesStart::new("Subjects"))).map_err(xml_err)?;
    writer.write_event(Event::Start(BytesStart::new("Subject"))).map_err(xml_err)?;
    writer.write_event(Event::Start(BytesStart::new("SubjectMatch"))).map_err(xml_err)?;
    writer.write_event(Event::Start(BytesStart::new("AttributeValue"))).map_err(xml_err)?;
    writer.write_event(Event::Text(BytesText::new(role))).map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new("AttributeValue"))).map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new("SubjectMatch"))).map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new("Subject"))).map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new("Subjects"))).map_err(xml_err)?;

    writer.write_event(Event::Start(BytesStart::new("Actions"))).map_err(xml_err)?;
    writer.write_event(Event::Start(BytesStart::new("Action"))).map_err(xml_err)?;
    writer.write_event(Event::Start(BytesStart::new("ActionMatch"))).map_err(xml_err)?;
    writer.write_event(Event::Start(BytesStart::new("AttributeValue"))).map_err(xml_err)?;
    writer.write_event(Event::Text(BytesText::new(action))).map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new("AttributeValue"))).map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new("ActionMatch"))).map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new("Action"))).map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new("Actions"))).map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new("Target"))).map_err(xml_err)?;

    writer.write_event(Event::End(BytesEnd::new("Rule"))).map_err(xml_err)?;
    Ok(())
}

fn write_deny_rule(writer: &mut Writer<Vec<u8>>) -> SinkResult<()> {
    let mut rule = BytesStart::new("Rule");
    rule.push_attribute(("RuleId", "DenyRule"));
    rule.push_attribute(("Effect", "Deny"));
    writer.write_event(Event::Empty(rule)).map_err(xml_err)?;
    Ok(())
}

fn xml_err(e: quick_xml::Error) -> SinkError {
    SinkError::Xml(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_one_permit_rule_per_allow_entry_plus_terminal_deny() {
        let entries = vec![
            AclEntry { role: "ROLE_ADMIN".into(), action: "read".into(), allow: true },
            AclEntry { role: "ROLE_ADMIN".into(), action: "write".into(), allow: true },
            AclEntry { role: "ROLE_ANONYMOUS".into(), action: "read".into(), allow: false },
        ];
        let xml = build_episode_policy("mp-123", &entries).unwrap();
        assert_eq!(xml.matches(r#"Effect="Permit""#).count(), 2);
        assert!(xml.contains(r#"RuleId="DenyRule" Effect="Deny""#));
        assert!(xml.contains("mediapackage-mp-123"));
    }

    #[test]
    fn builds_deny_only_policy_for_empty_acl() {
        let xml = build_episode_policy("mp-123", &[]).unwrap();
        assert!(!xml.contains(r#"Effect="Permit""#));
        assert!(xml.contains(r#"Effect="Deny""#));
    }
}
