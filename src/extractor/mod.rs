// file: src/extractor/mod.rs
// description: metadata extraction module exports
// reference: internal module structure

pub mod dates;
pub mod metadata;
pub mod tree;

pub use dates::parse_timestamp;
pub use metadata::{MISSING_CODE_WARNING, MISSING_DATE_WARNING, MetadataExtractor, PZN_SYSTEM};
pub use tree::{JsonNode, TreeNode, XmlNode};
