// file: src/extractor/tree.rs
// description: uniform read-only view over xml element trees and json value trees

use crate::parser::xml::XmlElement;
use serde_json::Value;

/// Navigation capability shared by both document shapes, so traversal is written once.
pub trait TreeNode: Copy {
    /// Tag or property name; `None` for an unnamed json root or array item.
    fn name(&self) -> Option<&str>;

    /// Direct children in document order.
    fn children(&self) -> Vec<Self>;

    /// Value stored directly on this node under `key`; never looks at child nodes.
    fn attribute(&self, key: &str) -> Option<String>;

    /// Value stored under `key` on this node: an attribute or a child value.
    fn attribute_or_value(&self, key: &str) -> Option<String>;

    /// Scalar content of the node itself.
    fn text_value(&self) -> Option<String>;
}

#[derive(Debug, Clone, Copy)]
pub struct XmlNode<'a>(pub &'a XmlElement);

impl<'a> TreeNode for XmlNode<'a> {
    fn name(&self) -> Option<&str> {
        Some(self.0.local_name.as_str())
    }

    fn children(&self) -> Vec<Self> {
        self.0.children.iter().map(XmlNode).collect()
    }

    fn attribute(&self, key: &str) -> Option<String> {
        self.0.attribute_ignore_case(key).map(str::to_string)
    }

    fn attribute_or_value(&self, key: &str) -> Option<String> {
        if let Some(value) = self.attribute(key) {
            return Some(value);
        }

        // FHIR XML keeps primitives in child elements: <code value="..."/>
        self.0
            .children
            .iter()
            .find(|child| child.local_name.eq_ignore_ascii_case(key))
            .and_then(|child| {
                child
                    .attribute_ignore_case("value")
                    .or_else(|| child.text())
                    .map(str::to_string)
            })
    }

    fn text_value(&self) -> Option<String> {
        self.0.text().map(str::to_string)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct JsonNode<'a> {
    name: Option<&'a str>,
    value: &'a Value,
}

impl<'a> JsonNode<'a> {
    pub fn root(value: &'a Value) -> Self {
        Self { name: None, value }
    }
}

impl<'a> TreeNode for JsonNode<'a> {
    fn name(&self) -> Option<&str> {
        self.name
    }

    /// Array items are surfaced as children carrying the array's property name.
    fn children(&self) -> Vec<Self> {
        match self.value {
            Value::Object(map) => {
                let mut children = Vec::with_capacity(map.len());
                for (key, value) in map {
                    match value {
                        Value::Array(items) => children.extend(items.iter().map(|item| JsonNode {
                            name: Some(key.as_str()),
                            value: item,
                        })),
                        other => children.push(JsonNode {
                            name: Some(key.as_str()),
                            value: other,
                        }),
                    }
                }
                children
            }
            Value::Array(items) => items
                .iter()
                .map(|item| JsonNode {
                    name: self.name,
                    value: item,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Json objects carry no attributes apart from their scalar properties.
    fn attribute(&self, key: &str) -> Option<String> {
        self.attribute_or_value(key)
    }

    fn attribute_or_value(&self, key: &str) -> Option<String> {
        let Value::Object(map) = self.value else {
            return None;
        };

        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .and_then(|(_, value)| scalar_text(value))
    }

    fn text_value(&self) -> Option<String> {
        scalar_text(self.value)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
