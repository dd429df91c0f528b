// file: src/parser/mod.rs
// description: xml parsing and canonical json conversion module exports
// reference: internal module structure

pub mod convert;
pub mod xml;

pub use convert::{
    ConversionChain, FHIR_NAMESPACE, FhirXmlConversion, GenericXmlConversion, PayloadConversion,
};
pub use xml::{MAX_DEPTH, XmlElement, XmlParser};
