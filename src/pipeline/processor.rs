// file: src/pipeline/processor.rs
// description: turns raw document bytes into a prescription record
// reference: detects format, parses, converts, extracts and assembles the record

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::extractor::MetadataExtractor;
use crate::models::{
    DocumentFormat, ExtractedMetadata, PrescriptionRecord, ProcessingResult, RawDocument,
};
use crate::parser::{ConversionChain, XmlParser};
use encoding_rs::{Encoding, UTF_8};
use serde_json::Value;
use std::borrow::Cow;
use tracing::{debug, error, info};

pub struct DocumentProcessor {
    extractor: MetadataExtractor,
    chain: ConversionChain,
    max_file_size: u64,
}

impl DocumentProcessor {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            extractor: MetadataExtractor::new(),
            chain: ConversionChain::standard(),
            max_file_size: (config.max_file_size_mb as u64) * 1_048_576,
        }
    }

    pub fn with_chain(mut self, chain: ConversionChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn process_document(&self, document: &RawDocument) -> ProcessingResult {
        self.process(&document.content, &document.file_name, document.format)
    }

    /// Never fails outright: every read or parse problem becomes a failed result.
    pub fn process(&self, content: &[u8], file_name: &str, hint: DocumentFormat) -> ProcessingResult {
        info!("Processing file: {}", file_name);

        match self.build_record(content, file_name, hint) {
            Ok((record, warnings)) => ProcessingResult::Succeeded { record, warnings },
            Err(e) => {
                error!("Failed to process {}: {}", file_name, e);
                ProcessingResult::failed(e.to_string())
            }
        }
    }

    fn build_record(
        &self,
        content: &[u8],
        file_name: &str,
        hint: DocumentFormat,
    ) -> Result<(PrescriptionRecord, Vec<String>)> {
        if self.max_file_size > 0 && content.len() as u64 > self.max_file_size {
            return Err(PipelineError::Validation(format!(
                "File too large ({} bytes, limit {} bytes)",
                content.len(),
                self.max_file_size
            )));
        }

        let text = decode(content)?;
        let format = DocumentFormat::resolve(hint, file_name, text.as_bytes());
        debug!("Resolved {} as {}", file_name, format);

        let (metadata, payload) = match format {
            DocumentFormat::Json => self.read_json(&text)?,
            DocumentFormat::Xml | DocumentFormat::Unknown => self.read_xml(&text, file_name)?,
        };

        let record = PrescriptionRecord::new(
            file_name.to_string(),
            &metadata,
            payload,
            text.to_string(),
            format,
        );

        Ok((record, metadata.warnings))
    }

    fn read_json(&self, text: &str) -> Result<(ExtractedMetadata, Option<Value>)> {
        let value: Value = serde_json::from_str(text)?;
        let metadata = self.extractor.extract_json(&value);
        Ok((metadata, Some(value)))
    }

    fn read_xml(&self, text: &str, file_name: &str) -> Result<(ExtractedMetadata, Option<Value>)> {
        let root = XmlParser::parse(text)?;
        let metadata = self.extractor.extract_xml(&root);
        let payload = self.chain.convert(&root, file_name);
        Ok((metadata, payload))
    }
}

/// Decodes by byte order mark (UTF-8, UTF-16LE, UTF-16BE), defaulting to strict UTF-8.
fn decode(content: &[u8]) -> Result<Cow<'_, str>> {
    let (encoding, bom_length) = Encoding::for_bom(content).unwrap_or((UTF_8, 0));
    encoding
        .decode_without_bom_handling_and_without_replacement(&content[bom_length..])
        .ok_or_else(|| {
            PipelineError::Encoding(format!("invalid {} byte sequence", encoding.name()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::extractor::{MISSING_CODE_WARNING, MISSING_DATE_WARNING};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn processor() -> DocumentProcessor {
        DocumentProcessor::new(&Config::default_config().pipeline)
    }

    const JSON_RX: &str = r#"{
  "resourceType": "Bundle",
  "entry": [{
    "resource": {
      "resourceType": "MedicationRequest",
      "authoredOn": "2023-05-01",
      "medicationCodeableConcept": {
        "coding": [{"system": "http://fhir.de/CodeSystem/ifa/pzn", "code": "12345678"}]
      }
    }
  }]
}"#;

    #[test]
    fn test_json_document_round_trip() {
        let result = processor().process(JSON_RX.as_bytes(), "rx.json", DocumentFormat::Unknown);
        let record = result.record().unwrap();

        assert_eq!(record.codes, vec!["12345678".to_string()]);
        assert_eq!(record.primary_code.as_deref(), Some("12345678"));
        assert_eq!(
            record.issue_date,
            Some(Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(record.format, DocumentFormat::Json);
        assert_eq!(record.raw_payload, JSON_RX);
        assert_eq!(record.canonical_payload.as_ref().unwrap()["resourceType"], json!("Bundle"));
        assert!(result.warnings().is_empty());
    }

    #[test]
    fn test_xml_document_uses_fhir_conversion() {
        let xml = r#"<Bundle xmlns="http://hl7.org/fhir"><timestamp value="2023-05-01T10:00:00Z"/></Bundle>"#;
        let result = processor().process(xml.as_bytes(), "upload", DocumentFormat::Unknown);
        let record = result.record().unwrap();

        assert_eq!(record.format, DocumentFormat::Xml);
        assert_eq!(
            record.canonical_payload,
            Some(json!({"resourceType": "Bundle", "timestamp": "2023-05-01T10:00:00Z"}))
        );
        assert_eq!(result.warnings(), &[MISSING_CODE_WARNING.to_string()]);
    }

    #[test]
    fn test_non_fhir_xml_falls_back_to_generic_payload() {
        let xml = "<rx><pzn>1</pzn></rx>";
        let result = processor().process(xml.as_bytes(), "rx.xml", DocumentFormat::Unknown);
        let record = result.record().unwrap();

        assert_eq!(record.canonical_payload, Some(json!({"pzn": "1"})));
        assert_eq!(
            result.warnings(),
            &[
                MISSING_CODE_WARNING.to_string(),
                MISSING_DATE_WARNING.to_string()
            ]
        );
    }

    #[test]
    fn test_malformed_inputs_fail_without_panicking() {
        let processor = processor();

        let xml = processor.process(b"<Bundle><entry></Bundle>", "bad.xml", DocumentFormat::Unknown);
        assert!(xml.error_message().unwrap().starts_with("Malformed XML"));

        let json = processor.process(b"{\"a\":", "bad.json", DocumentFormat::Unknown);
        assert!(json.error_message().unwrap().starts_with("Malformed JSON"));

        let binary = processor.process(&[0xff, 0xfe, 0x00], "blob.xml", DocumentFormat::Unknown);
        assert!(!binary.succeeded());
    }

    #[test]
    fn test_hint_overrides_extension() {
        let result = processor().process(b"<a/>", "odd.json", DocumentFormat::Xml);
        assert!(result.succeeded());
        assert_eq!(result.record().unwrap().format, DocumentFormat::Xml);
    }

    #[test]
    fn test_bom_is_stripped() {
        let mut content = b"\xEF\xBB\xBF".to_vec();
        content.extend_from_slice(b"{\"resourceType\":\"Bundle\"}");
        let result = processor().process(&content, "bom", DocumentFormat::Unknown);
        assert_eq!(result.record().unwrap().format, DocumentFormat::Json);
    }

    fn utf16le_with_bom(text: &str) -> Vec<u8> {
        let mut content = vec![0xFF, 0xFE];
        for unit in text.encode_utf16() {
            content.extend_from_slice(&unit.to_le_bytes());
        }
        content
    }

    #[test]
    fn test_utf16_document_is_decoded() {
        let xml = r#"<?xml version="1.0" encoding="UTF-16"?><Bundle xmlns="http://hl7.org/fhir"><entry><resource><MedicationRequest><medicationCodeableConcept><coding><system value="http://fhir.de/CodeSystem/ifa/pzn"/><code value="04351736"/></coding></medicationCodeableConcept><authoredOn value="2024-02-29"/></MedicationRequest></resource></entry></Bundle>"#;

        let result = processor().process(&utf16le_with_bom(xml), "rx.xml", DocumentFormat::Unknown);
        let record = result.record().unwrap();

        assert_eq!(record.codes, vec!["04351736".to_string()]);
        assert_eq!(record.format, DocumentFormat::Xml);
        assert_eq!(record.raw_payload, xml);
        assert!(result.warnings().is_empty());
    }

    #[test]
    fn test_truncated_utf16_rejected() {
        let mut content = utf16le_with_bom("<a/>");
        content.push(0x3C);
        let result = processor().process(&content, "a.xml", DocumentFormat::Unknown);
        assert!(result.error_message().unwrap().contains("UTF-16LE"));
    }

    #[test]
    fn test_value_coding_code_is_extracted_from_xml() {
        let xml = r#"<Bundle xmlns="http://hl7.org/fhir">
  <timestamp value="2023-05-02T08:00:00Z"/>
  <entry>
    <resource>
      <Observation>
        <valueCoding>
          <system value="http://fhir.de/CodeSystem/ifa/pzn"/>
          <code value="08585997"/>
        </valueCoding>
      </Observation>
    </resource>
  </entry>
</Bundle>"#;

        let result = processor().process(xml.as_bytes(), "obs.xml", DocumentFormat::Xml);
        let record = result.record().unwrap();

        assert_eq!(record.codes, vec!["08585997".to_string()]);
        assert_eq!(record.primary_code.as_deref(), Some("08585997"));
        assert_eq!(
            record.issue_date,
            Some(Utc.with_ymd_and_hms(2023, 5, 2, 8, 0, 0).unwrap())
        );
        assert!(result.warnings().is_empty());
    }

    #[test]
    fn test_deeply_nested_document_fails_cleanly() {
        let depth = 200_000;
        let xml = format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));

        let result = processor().process(xml.as_bytes(), "deep.xml", DocumentFormat::Unknown);
        assert!(!result.succeeded());
        assert!(result.error_message().unwrap().starts_with("Malformed XML"));
    }

    #[test]
    fn test_oversized_file_rejected() {
        let mut config = Config::default_config().pipeline;
        config.max_file_size_mb = 0;
        assert!(DocumentProcessor::new(&config).process(b"<a/>", "a.xml", DocumentFormat::Unknown).succeeded());

        let processor = DocumentProcessor {
            max_file_size: 2,
            ..processor()
        };
        let result = processor.process(b"<a/>", "a.xml", DocumentFormat::Unknown);
        assert!(result.error_message().unwrap().contains("too large"));
    }
}
