// file: src/models/document.rs
// description: raw document payload and input format resolution
// reference: internal data structures

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Xml,
    Json,
    #[default]
    Unknown,
}

impl DocumentFormat {
    /// Format implied by the file extension, `Unknown` when inconclusive.
    pub fn from_file_name(file_name: &str) -> Self {
        match Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => DocumentFormat::Json,
            Some("xml") => DocumentFormat::Xml,
            _ => DocumentFormat::Unknown,
        }
    }

    /// Peeks at the first non-whitespace character. Empty or ambiguous content is XML.
    pub fn sniff(content: &[u8]) -> Self {
        let content = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content);
        match content.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') | Some(b'[') => DocumentFormat::Json,
            _ => DocumentFormat::Xml,
        }
    }

    /// A known hint wins, then the extension, then content sniffing.
    pub fn resolve(hint: DocumentFormat, file_name: &str, content: &[u8]) -> Self {
        if hint != DocumentFormat::Unknown {
            return hint;
        }

        match Self::from_file_name(file_name) {
            DocumentFormat::Unknown => Self::sniff(content),
            known => known,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Xml => "xml",
            DocumentFormat::Json => "json",
            DocumentFormat::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "xml" => DocumentFormat::Xml,
            "json" => DocumentFormat::Json,
            _ => DocumentFormat::Unknown,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bytes of one incoming file. The format is only a hint until processing resolves it.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub file_name: String,
    pub content: Bytes,
    pub format: DocumentFormat,
}

impl RawDocument {
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let format = DocumentFormat::from_file_name(&file_name);
        Self {
            file_name,
            content: content.into(),
            format,
        }
    }

    pub fn with_format(mut self, format: DocumentFormat) -> Self {
        self.format = format;
        self
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
