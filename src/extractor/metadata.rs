// file: src/extractor/metadata.rs
// description: pzn code and issue date discovery over any document tree
// reference: https://simplifier.net/erezept

use crate::extractor::dates::parse_timestamp;
use crate::extractor::tree::{JsonNode, TreeNode, XmlNode};
use crate::models::ExtractedMetadata;
use crate::parser::xml::XmlElement;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

pub const PZN_SYSTEM: &str = "http://fhir.de/CodeSystem/ifa/pzn";

pub const MISSING_CODE_WARNING: &str = "No PZN code was found in the document.";
pub const MISSING_DATE_WARNING: &str = "No issued/timestamp value was detected in the document.";

const CODING_NAMES: &[&str] = &["coding", "valueCoding"];

const TIMESTAMP_NAMES: &[&str] = &[
    "timestamp",
    "authoredOn",
    "time",
    "whenHandedOver",
    "whenPrepared",
    "issued",
    "recordedDate",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract_xml(&self, root: &XmlElement) -> ExtractedMetadata {
        self.extract(XmlNode(root))
    }

    pub fn extract_json(&self, root: &Value) -> ExtractedMetadata {
        self.extract(JsonNode::root(root))
    }

    /// Walks the tree in document order. Codes are collected from every coding
    /// node; the first parsable timestamp wins.
    pub fn extract<N: TreeNode>(&self, root: N) -> ExtractedMetadata {
        let mut codes: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut issue_date = None;

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if let Some(name) = node.name() {
                if is_one_of(name, CODING_NAMES)
                    && let Some(code) = pzn_code(&node)
                    && seen.insert(code.to_lowercase())
                {
                    codes.push(code);
                }

                if issue_date.is_none() && is_one_of(name, TIMESTAMP_NAMES) {
                    issue_date = node
                        .attribute("value")
                        .or_else(|| node.text_value())
                        .and_then(|raw| parse_timestamp(&raw));
                }
            }

            let mut children = node.children();
            children.reverse();
            stack.extend(children);
        }

        let mut warnings = Vec::new();
        if codes.is_empty() {
            warnings.push(MISSING_CODE_WARNING.to_string());
        }
        if issue_date.is_none() {
            warnings.push(MISSING_DATE_WARNING.to_string());
        }

        debug!(
            "Extracted {} code(s), issue date present: {}",
            codes.len(),
            issue_date.is_some()
        );

        ExtractedMetadata {
            primary_code: codes.first().cloned(),
            codes,
            issue_date,
            warnings,
        }
    }
}

fn is_one_of(name: &str, candidates: &[&str]) -> bool {
    candidates.iter().any(|c| c.eq_ignore_ascii_case(name))
}

fn pzn_code<N: TreeNode>(node: &N) -> Option<String> {
    let system = node.attribute_or_value("system")?;
    if !system.trim().eq_ignore_ascii_case(PZN_SYSTEM) {
        return None;
    }

    let code = node.attribute_or_value("code")?;
    let code = code.trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::xml::XmlParser;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const XML_BUNDLE: &str = r#"<Bundle xmlns="http://hl7.org/fhir">
  <timestamp value="2023-05-02T08:00:00Z"/>
  <entry><resource><Medication>
    <code>
      <coding>
        <system value="http://fhir.de/CodeSystem/ifa/pzn"/>
        <code value="06313728"/>
      </coding>
      <coding>
        <system value="http://fhir.de/CodeSystem/ask"/>
        <code value="ignored"/>
      </coding>
    </code>
  </Medication></resource></entry>
  <entry><resource><MedicationRequest>
    <authoredOn value="2023-05-01"/>
  </MedicationRequest></resource></entry>
</Bundle>"#;

    #[test]
    fn test_xml_extraction() {
        let root = XmlParser::parse(XML_BUNDLE).unwrap();
        let metadata = MetadataExtractor::new().extract_xml(&root);

        assert_eq!(metadata.codes, vec!["06313728".to_string()]);
        assert_eq!(metadata.primary_code.as_deref(), Some("06313728"));
        assert_eq!(
            metadata.issue_date,
            Some(Utc.with_ymd_and_hms(2023, 5, 2, 8, 0, 0).unwrap())
        );
        assert!(metadata.warnings.is_empty());
    }

    #[test]
    fn test_json_extraction_dedupes_case_insensitively() {
        let doc = json!({
            "resourceType": "Bundle",
            "entry": [
                {"resource": {"code": {"coding": [
                    {"system": "HTTP://FHIR.DE/CodeSystem/ifa/pzn", "code": "abc1"},
                    {"system": "http://fhir.de/CodeSystem/ifa/pzn", "code": "ABC1"},
                    {"system": "http://fhir.de/CodeSystem/ifa/pzn", "code": "  "}
                ]}}},
                {"resource": {"valueCoding": {"system": "http://fhir.de/CodeSystem/ifa/pzn", "code": "0002"}}}
            ]
        });

        let metadata = MetadataExtractor::new().extract_json(&doc);
        assert_eq!(metadata.codes, vec!["abc1".to_string(), "0002".to_string()]);
        assert_eq!(metadata.primary_code.as_deref(), Some("abc1"));
        assert_eq!(metadata.warnings, vec![MISSING_DATE_WARNING.to_string()]);
    }

    #[test]
    fn test_first_parsable_timestamp_wins() {
        let doc = json!({
            "issued": "not a date",
            "authoredOn": "2023-05-01",
            "whenHandedOver": "2024-01-01"
        });

        let metadata = MetadataExtractor::new().extract_json(&doc);
        assert_eq!(
            metadata.issue_date,
            Some(Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_timestamp_ignores_child_value_elements() {
        let root = XmlParser::parse(
            r#"<Bundle>
  <issued><value>2020-01-01</value>2023-05-03</issued>
</Bundle>"#,
        )
        .unwrap();

        let metadata = MetadataExtractor::new().extract_xml(&root);
        assert_eq!(
            metadata.issue_date,
            Some(Utc.with_ymd_and_hms(2023, 5, 3, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_missing_everything_yields_both_warnings() {
        let metadata = MetadataExtractor::new().extract_json(&json!({"resourceType": "Bundle"}));

        assert!(metadata.codes.is_empty());
        assert_eq!(metadata.primary_code, None);
        assert_eq!(
            metadata.warnings,
            vec![
                MISSING_CODE_WARNING.to_string(),
                MISSING_DATE_WARNING.to_string()
            ]
        );
    }

    #[test]
    fn test_extraction_is_repeatable() {
        let root = XmlParser::parse(XML_BUNDLE).unwrap();
        let extractor = MetadataExtractor::new();
        assert_eq!(extractor.extract_xml(&root), extractor.extract_xml(&root));
    }
}
