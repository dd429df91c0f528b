// file: src/parser/convert.rs
// description: ordered xml to json conversion attempts with fallback
// reference: https://hl7.org/fhir/json.html

use crate::error::{PipelineError, Result};
use crate::parser::xml::{MAX_DEPTH, XmlElement};
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub const FHIR_NAMESPACE: &str = "http://hl7.org/fhir";
const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Elements that are arrays in FHIR JSON even with a single occurrence.
const REPEATING_ELEMENTS: &[&str] = &[
    "entry",
    "link",
    "coding",
    "identifier",
    "extension",
    "modifierExtension",
    "contained",
    "profile",
    "tag",
    "security",
    "name",
    "given",
    "prefix",
    "suffix",
    "line",
    "telecom",
    "address",
    "contact",
    "qualification",
    "category",
    "dosageInstruction",
    "doseAndRate",
    "note",
    "performer",
    "supportingInformation",
    "insurance",
    "reasonCode",
    "reasonReference",
    "basedOn",
    "partOf",
    "section",
    "author",
    "attester",
    "ingredient",
    "authorizingPrescription",
    "receiver",
];

/// Elements whose single child is an embedded resource.
const RESOURCE_CONTAINERS: &[&str] = &["resource", "contained"];

/// One attempt to turn a parsed XML tree into canonical JSON.
pub trait PayloadConversion: Send + Sync {
    fn name(&self) -> &'static str;

    fn convert(&self, root: &XmlElement) -> Result<Value>;
}

/// Tries each conversion in order and keeps the first success.
pub struct ConversionChain {
    steps: Vec<Box<dyn PayloadConversion>>,
}

impl ConversionChain {
    pub fn new(steps: Vec<Box<dyn PayloadConversion>>) -> Self {
        Self { steps }
    }

    /// Strict FHIR conversion first, then the generic structural mirror.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(FhirXmlConversion),
            Box::new(GenericXmlConversion),
        ])
    }

    pub fn convert(&self, root: &XmlElement, file_name: &str) -> Option<Value> {
        for step in &self.steps {
            match step.convert(root) {
                Ok(value) => {
                    debug!("Converted {} with {} conversion", file_name, step.name());
                    return Some(value);
                }
                Err(e) => {
                    warn!("{} conversion failed for {}: {}", step.name(), file_name, e);
                }
            }
        }

        warn!("No canonical payload could be produced for {}", file_name);
        None
    }
}

impl Default for ConversionChain {
    fn default() -> Self {
        Self::standard()
    }
}

/// Schema-aware conversion following the FHIR JSON representation rules.
pub struct FhirXmlConversion;

impl PayloadConversion for FhirXmlConversion {
    fn name(&self) -> &'static str {
        "fhir"
    }

    fn convert(&self, root: &XmlElement) -> Result<Value> {
        if !root.is_in_namespace(FHIR_NAMESPACE) {
            return Err(PipelineError::Conversion(format!(
                "root element <{}> is not in the FHIR namespace",
                root.name
            )));
        }
        resource_to_json(root, 0)
    }
}

fn resource_to_json(element: &XmlElement, depth: usize) -> Result<Value> {
    check_depth(depth)?;

    if let Some((key, _)) = element.attributes.first() {
        return Err(PipelineError::Conversion(format!(
            "unexpected attribute '{}' on resource {}",
            key, element.local_name
        )));
    }
    reject_text(element)?;

    let mut object = Map::new();
    object.insert(
        "resourceType".to_string(),
        Value::String(element.local_name.clone()),
    );
    populate_properties(&mut object, &element.children, depth)?;
    Ok(Value::Object(object))
}

fn populate_properties(
    object: &mut Map<String, Value>,
    children: &[XmlElement],
    depth: usize,
) -> Result<()> {
    for (name, group) in group_by_name(children, |c| c.local_name.as_str()) {
        let mut values = Vec::with_capacity(group.len());
        let mut extras = Vec::with_capacity(group.len());

        for child in &group {
            if child.is_in_namespace(XHTML_NAMESPACE) {
                return Err(PipelineError::Conversion(
                    "narrative xhtml content is not supported".to_string(),
                ));
            }
            if !child.is_in_namespace(FHIR_NAMESPACE) {
                return Err(PipelineError::Conversion(format!(
                    "element <{}> is outside the FHIR namespace",
                    child.name
                )));
            }
            let (value, extra) = element_to_json(child, depth + 1)?;
            values.push(value);
            extras.push(extra);
        }

        let has_extras = extras.iter().any(Option::is_some);
        let underscore = format!("_{}", name);

        if group.len() > 1 || REPEATING_ELEMENTS.contains(&name) {
            if values.iter().any(Option::is_some) {
                let items = values.into_iter().map(|v| v.unwrap_or(Value::Null)).collect();
                object.insert(name.to_string(), Value::Array(items));
            }
            if has_extras {
                let items = extras
                    .into_iter()
                    .map(|e| e.map(Value::Object).unwrap_or(Value::Null))
                    .collect();
                object.insert(underscore, Value::Array(items));
            }
        } else {
            if let Some(Some(value)) = values.into_iter().next() {
                object.insert(name.to_string(), value);
            }
            if let Some(Some(extra)) = extras.into_iter().next() {
                object.insert(underscore, Value::Object(extra));
            }
        }
    }

    Ok(())
}

/// Returns the property value and, for primitives, the `_name` companion object.
fn element_to_json(
    element: &XmlElement,
    depth: usize,
) -> Result<(Option<Value>, Option<Map<String, Value>>)> {
    check_depth(depth)?;
    reject_text(element)?;

    if RESOURCE_CONTAINERS.contains(&element.local_name.as_str()) {
        return match element.children.as_slice() {
            [resource] if element.attributes.is_empty() => {
                Ok((Some(resource_to_json(resource, depth + 1)?), None))
            }
            _ => Err(PipelineError::Conversion(format!(
                "<{}> must hold exactly one resource",
                element.local_name
            ))),
        };
    }

    if let Some(raw) = element.attribute("value") {
        return primitive_to_json(element, raw, depth);
    }

    let mut object = Map::new();
    for (key, value) in &element.attributes {
        match key.as_str() {
            "id" | "url" => {
                object.insert(key.clone(), Value::String(value.clone()));
            }
            other => {
                return Err(PipelineError::Conversion(format!(
                    "unexpected attribute '{}' on <{}>",
                    other, element.local_name
                )));
            }
        }
    }
    populate_properties(&mut object, &element.children, depth)?;

    if object.is_empty() {
        return Err(PipelineError::Conversion(format!(
            "element <{}> has no value, attributes or children",
            element.local_name
        )));
    }

    Ok((Some(Value::Object(object)), None))
}

fn primitive_to_json(
    element: &XmlElement,
    raw: &str,
    depth: usize,
) -> Result<(Option<Value>, Option<Map<String, Value>>)> {
    let value = match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        other => Value::String(other.to_string()),
    };

    let mut extra = Map::new();
    for (key, attr) in &element.attributes {
        match key.as_str() {
            "value" => {}
            "id" => {
                extra.insert("id".to_string(), Value::String(attr.clone()));
            }
            other => {
                return Err(PipelineError::Conversion(format!(
                    "unexpected attribute '{}' on primitive <{}>",
                    other, element.local_name
                )));
            }
        }
    }

    if let Some(child) = element
        .children
        .iter()
        .find(|c| c.local_name != "extension")
    {
        return Err(PipelineError::Conversion(format!(
            "primitive <{}> cannot contain <{}>",
            element.local_name, child.local_name
        )));
    }
    populate_properties(&mut extra, &element.children, depth)?;

    let extra = if extra.is_empty() { None } else { Some(extra) };
    Ok((Some(value), extra))
}

/// Structural mirror of the XML without the root wrapper: attributes become
/// `@name`, mixed text becomes `#text`, repeated siblings become arrays.
pub struct GenericXmlConversion;

impl PayloadConversion for GenericXmlConversion {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn convert(&self, root: &XmlElement) -> Result<Value> {
        generic_value(root, 0)
    }
}

fn generic_value(element: &XmlElement, depth: usize) -> Result<Value> {
    check_depth(depth)?;

    if element.attributes.is_empty() && element.children.is_empty() {
        return Ok(element
            .text()
            .map(|t| Value::String(t.to_string()))
            .unwrap_or(Value::Null));
    }

    let mut object = Map::new();
    for (key, value) in &element.attributes {
        object.insert(format!("@{}", key), Value::String(value.clone()));
    }

    for (name, group) in group_by_name(&element.children, |c| c.name.as_str()) {
        let mut items = group
            .iter()
            .map(|child| generic_value(child, depth + 1))
            .collect::<Result<Vec<_>>>()?;

        let value = if items.len() == 1 {
            items.remove(0)
        } else {
            Value::Array(items)
        };
        object.insert(name.to_string(), value);
    }

    if let Some(text) = element.text() {
        object.insert("#text".to_string(), Value::String(text.to_string()));
    }

    Ok(Value::Object(object))
}

/// Groups siblings by name, keeping first-seen order of names and elements.
fn group_by_name<'a, F>(children: &'a [XmlElement], key: F) -> Vec<(&'a str, Vec<&'a XmlElement>)>
where
    F: Fn(&'a XmlElement) -> &'a str,
{
    let mut groups: Vec<(&str, Vec<&XmlElement>)> = Vec::new();
    for child in children {
        let name = key(child);
        match groups.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, members)) => members.push(child),
            None => groups.push((name, vec![child])),
        }
    }
    groups
}

fn reject_text(element: &XmlElement) -> Result<()> {
    match element.text() {
        Some(text) => Err(PipelineError::Conversion(format!(
            "unexpected text '{}' in <{}>",
            text, element.local_name
        ))),
        None => Ok(()),
    }
}

fn check_depth(depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(PipelineError::Conversion(format!(
            "document nesting exceeds {} levels",
            MAX_DEPTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::xml::XmlParser;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const BUNDLE: &str = r#"<Bundle xmlns="http://hl7.org/fhir">
  <id value="b1"/>
  <type value="document"/>
  <entry>
    <resource>
      <MedicationRequest>
        <id value="m1"/>
        <authoredOn value="2023-05-01"/>
        <doNotPerform value="false"/>
      </MedicationRequest>
    </resource>
  </entry>
</Bundle>"#;

    #[test]
    fn test_fhir_conversion_shapes_resources() {
        let root = XmlParser::parse(BUNDLE).unwrap();
        let value = FhirXmlConversion.convert(&root).unwrap();

        assert_eq!(
            value,
            json!({
                "resourceType": "Bundle",
                "id": "b1",
                "type": "document",
                "entry": [{
                    "resource": {
                        "resourceType": "MedicationRequest",
                        "id": "m1",
                        "authoredOn": "2023-05-01",
                        "doNotPerform": false
                    }
                }]
            })
        );
    }

    #[test]
    fn test_fhir_conversion_keeps_primitive_extensions() {
        let xml = r#"<Patient xmlns="http://hl7.org/fhir">
  <birthDate id="bd" value="1970-01-01">
    <extension url="http://example.org/ext"><valueString value="x"/></extension>
  </birthDate>
</Patient>"#;
        let root = XmlParser::parse(xml).unwrap();
        let value = FhirXmlConversion.convert(&root).unwrap();

        assert_eq!(value["birthDate"], json!("1970-01-01"));
        assert_eq!(value["_birthDate"]["id"], json!("bd"));
        assert_eq!(
            value["_birthDate"]["extension"][0]["url"],
            json!("http://example.org/ext")
        );
    }

    #[test]
    fn test_fhir_conversion_rejects_foreign_namespace() {
        let root = XmlParser::parse("<Bundle><id value=\"x\"/></Bundle>").unwrap();
        assert!(FhirXmlConversion.convert(&root).is_err());
    }

    #[test]
    fn test_fhir_conversion_rejects_narrative() {
        let xml = r#"<Patient xmlns="http://hl7.org/fhir"><text><status value="generated"/><div xmlns="http://www.w3.org/1999/xhtml">hi</div></text></Patient>"#;
        let root = XmlParser::parse(xml).unwrap();
        assert!(FhirXmlConversion.convert(&root).is_err());
    }

    #[test]
    fn test_generic_conversion_mirrors_structure() {
        let xml = r#"<order no="7"><item>a</item><item>b</item><note lang="de">hallo</note><empty/></order>"#;
        let root = XmlParser::parse(xml).unwrap();
        let value = GenericXmlConversion.convert(&root).unwrap();

        assert_eq!(
            value,
            json!({
                "@no": "7",
                "item": ["a", "b"],
                "note": {"@lang": "de", "#text": "hallo"},
                "empty": null
            })
        );
    }

    #[test]
    fn test_chain_falls_back_to_generic() {
        let root = XmlParser::parse("<prescription><pzn>123</pzn></prescription>").unwrap();
        let value = ConversionChain::standard().convert(&root, "rx.xml");
        assert_eq!(value, Some(json!({"pzn": "123"})));
    }

    struct AlwaysFails;

    impl PayloadConversion for AlwaysFails {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn convert(&self, _root: &XmlElement) -> Result<Value> {
            Err(PipelineError::Conversion("nope".to_string()))
        }
    }

    #[test]
    fn test_chain_yields_none_when_every_step_fails() {
        let root = XmlParser::parse("<a/>").unwrap();
        let chain = ConversionChain::new(vec![Box::new(AlwaysFails), Box::new(AlwaysFails)]);
        assert_eq!(chain.convert(&root, "a.xml"), None);
    }
}
