// file: src/parser/xml.rs
// description: namespace-aware xml parsing into an owned element tree
// reference: https://docs.rs/quick-xml

use crate::error::{PipelineError, Result};
use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;

/// Deepest element nesting accepted from a document.
pub const MAX_DEPTH: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    /// Qualified name as written, including any prefix.
    pub name: String,
    pub local_name: String,
    pub namespace: Option<String>,
    /// Attributes in document order. Namespace declarations are not included.
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attribute_ignore_case(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| local_part(key).eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> Option<&str> {
        let trimmed = self.text.trim();
        if trimmed.is_empty() { None } else { Some(trimmed) }
    }

    pub fn is_in_namespace(&self, namespace: &str) -> bool {
        self.namespace.as_deref() == Some(namespace)
    }
}

fn local_part(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

pub struct XmlParser;

impl XmlParser {
    /// Parses a complete document. Malformed input yields `XmlParse`, never a panic.
    pub fn parse(content: &str) -> Result<XmlElement> {
        let mut reader = NsReader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let (namespace, event) = match reader.read_resolved_event() {
                Ok(pair) => pair,
                Err(e) => return Err(PipelineError::XmlParse(e.to_string())),
            };

            match event {
                Event::Start(start) => {
                    let element = open_element(&namespace, &start)?;
                    if stack.is_empty() && root.is_some() {
                        return Err(multiple_roots(&element));
                    }
                    if stack.len() >= MAX_DEPTH {
                        return Err(PipelineError::XmlParse(format!(
                            "elements nested deeper than {} levels",
                            MAX_DEPTH
                        )));
                    }
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = open_element(&namespace, &start)?;
                    attach(element, &mut stack, &mut root)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        PipelineError::XmlParse("closing tag without an open element".to_string())
                    })?;
                    attach(element, &mut stack, &mut root)?;
                }
                Event::Text(text) => {
                    let value = text
                        .unescape()
                        .map_err(|e| PipelineError::XmlParse(e.to_string()))?;
                    append_text(&mut stack, &value)?;
                }
                Event::CData(data) => {
                    let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    append_text(&mut stack, &value)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(PipelineError::XmlParse(format!(
                "unexpected end of document, element <{}> is not closed",
                open.name
            )));
        }

        root.ok_or_else(|| PipelineError::XmlParse("document has no root element".to_string()))
    }
}

fn open_element(namespace: &ResolveResult, start: &BytesStart) -> Result<XmlElement> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let local_name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

    let namespace = match namespace {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        ResolveResult::Unbound => None,
        ResolveResult::Unknown(prefix) => {
            return Err(PipelineError::XmlParse(format!(
                "undeclared namespace prefix '{}' on <{}>",
                String::from_utf8_lossy(prefix),
                name
            )));
        }
    };

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| PipelineError::XmlParse(e.to_string()))?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| PipelineError::XmlParse(e.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(XmlElement {
        name,
        local_name,
        namespace,
        attributes,
        text: String::new(),
        children: Vec::new(),
    })
}

fn attach(
    element: XmlElement,
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }

    if root.is_some() {
        return Err(multiple_roots(&element));
    }

    *root = Some(element);
    Ok(())
}

fn append_text(stack: &mut [XmlElement], value: &str) -> Result<()> {
    match stack.last_mut() {
        Some(current) => {
            current.text.push_str(value);
            Ok(())
        }
        None if value.trim().is_empty() => Ok(()),
        None => Err(PipelineError::XmlParse(
            "text content outside of the root element".to_string(),
        )),
    }
}

fn multiple_roots(element: &XmlElement) -> PipelineError {
    PipelineError::XmlParse(format!(
        "multiple root elements, found a second root <{}>",
        element.name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_fhir_fragment() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<Bundle xmlns="http://hl7.org/fhir">
  <id value="abc"/>
  <entry>
    <fullUrl value="urn:uuid:1"/>
  </entry>
</Bundle>"#;

        let root = XmlParser::parse(xml).unwrap();
        assert_eq!(root.local_name, "Bundle");
        assert_eq!(root.namespace.as_deref(), Some("http://hl7.org/fhir"));
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].attribute("value"), Some("abc"));
        assert!(root.children[1].is_in_namespace("http://hl7.org/fhir"));
        assert!(root.attributes.is_empty());
    }

    #[test]
    fn test_prefixed_names_and_text() {
        let xml = r#"<p:root xmlns:p="urn:x"><p:item kind="a">one &amp; two</p:item></p:root>"#;
        let root = XmlParser::parse(xml).unwrap();

        assert_eq!(root.name, "p:root");
        assert_eq!(root.local_name, "root");
        let item = &root.children[0];
        assert_eq!(item.text(), Some("one & two"));
        assert_eq!(item.attribute_ignore_case("KIND"), Some("a"));
    }

    #[test]
    fn test_mismatched_tags_rejected() {
        let result = XmlParser::parse("<a><b></a>");
        assert!(matches!(result, Err(PipelineError::XmlParse(_))));
    }

    #[test]
    fn test_unclosed_element_rejected() {
        let result = XmlParser::parse("<a><b/>");
        assert!(matches!(result, Err(PipelineError::XmlParse(_))));
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));

        assert!(XmlParser::parse(&nested(MAX_DEPTH)).is_ok());

        let result = XmlParser::parse(&nested(200_000));
        match result {
            Err(PipelineError::XmlParse(message)) => assert!(message.contains("nested deeper")),
            other => panic!("expected a nesting error, got {:?}", other.map(|e| e.name)),
        }
    }

    #[test]
    fn test_empty_and_non_xml_rejected() {
        assert!(XmlParser::parse("").is_err());
        assert!(XmlParser::parse("just some text").is_err());
        assert!(XmlParser::parse("<a/><b/>").is_err());
    }
}
