// file: src/utils/validation.rs
// description: input checks for paths, endpoints, batch sizes and search ranges

use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use std::path::Path;

const DOCUMENT_EXTENSIONS: &[&str] = &["xml", "json"];
const MAX_BATCH_SIZE: usize = 10_000;

pub struct Validator;

impl Validator {
    pub fn validate_existing_path(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(PipelineError::Validation(format!(
                "Path does not exist: {}",
                path.display()
            )));
        }
        Ok(())
    }

    pub fn has_document_extension(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                DOCUMENT_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }

    /// Accepts absolute http(s) URLs with a host.
    pub fn validate_url(url: &str) -> Result<()> {
        let lower = url.trim().to_ascii_lowercase();
        let rest = lower
            .strip_prefix("https://")
            .or_else(|| lower.strip_prefix("http://"));

        match rest {
            Some(rest) if !rest.is_empty() && !rest.starts_with('/') => Ok(()),
            _ => Err(PipelineError::Validation(format!(
                "Invalid URL format: {}",
                url
            ))),
        }
    }

    pub fn validate_batch_size(size: usize) -> Result<()> {
        if size == 0 {
            return Err(PipelineError::Validation(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        if size > MAX_BATCH_SIZE {
            return Err(PipelineError::Validation(format!(
                "Batch size too large (max {})",
                MAX_BATCH_SIZE
            )));
        }

        Ok(())
    }

    pub fn validate_date_range(
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if let (Some(from), Some(to)) = (from, to)
            && from > to
        {
            return Err(PipelineError::Validation(format!(
                "Issue date range is empty: {} is after {}",
                from.date_naive(),
                to.date_naive()
            )));
        }
        Ok(())
    }

    /// Shortens text to `max_chars` characters, appending an ellipsis when cut.
    pub fn truncate_text(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            Some((idx, _)) => format!("{}...", &text[..idx]),
            None => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_validate_existing_path() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("rx.xml");
        fs::write(&file_path, "<Bundle/>").unwrap();

        assert!(Validator::validate_existing_path(&file_path).is_ok());
        assert!(Validator::validate_existing_path(Path::new("/nonexistent/rx.xml")).is_err());
    }

    #[test]
    fn test_document_extensions() {
        assert!(Validator::has_document_extension(Path::new("a.xml")));
        assert!(Validator::has_document_extension(Path::new("a.JSON")));
        assert!(!Validator::has_document_extension(Path::new("a.txt")));
        assert!(!Validator::has_document_extension(Path::new("xml")));
    }

    #[test]
    fn test_validate_url() {
        assert!(Validator::validate_url("https://s3.eu-central-1.amazonaws.com").is_ok());
        assert!(Validator::validate_url("http://localhost:9000").is_ok());
        assert!(Validator::validate_url("localhost:9000").is_err());
        assert!(Validator::validate_url("ftp://example.com").is_err());
        assert!(Validator::validate_url("http://").is_err());
    }

    #[test]
    fn test_validate_batch_size() {
        assert!(Validator::validate_batch_size(100).is_ok());
        assert!(Validator::validate_batch_size(0).is_err());
        assert!(Validator::validate_batch_size(10_001).is_err());
    }

    #[test]
    fn test_validate_date_range() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        assert!(Validator::validate_date_range(Some(early), Some(late)).is_ok());
        assert!(Validator::validate_date_range(Some(early), Some(early)).is_ok());
        assert!(Validator::validate_date_range(None, Some(early)).is_ok());
        assert!(Validator::validate_date_range(Some(late), Some(early)).is_err());
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(Validator::truncate_text("short", 10), "short");
        assert_eq!(
            Validator::truncate_text("Verordnung über Arzneimittel", 10),
            "Verordnung..."
        );
        assert_eq!(Validator::truncate_text("Präparat", 3), "Prä...");
    }
}
