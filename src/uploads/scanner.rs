// file: src/uploads/scanner.rs
// description: collects local prescription files into raw documents
// reference: https://docs.rs/walkdir

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::models::{IngestionFailure, RawDocument};
use crate::utils::Validator;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub struct FileScanner {
    config: PipelineConfig,
}

/// Documents ready for ingestion plus files that could not be read.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub documents: Vec<RawDocument>,
    pub failures: Vec<IngestionFailure>,
}

impl FileScanner {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Expands directories into their `.xml`/`.json` files. Files named directly are kept as-is.
    pub fn collect_paths(&self, inputs: &[PathBuf]) -> (Vec<PathBuf>, Vec<IngestionFailure>) {
        let mut files = Vec::new();
        let mut failures = Vec::new();

        for input in inputs {
            if let Err(e) = Validator::validate_existing_path(input) {
                failures.push(IngestionFailure {
                    file_name: input.display().to_string(),
                    error_message: e.to_string(),
                });
                continue;
            }

            if input.is_file() {
                files.push(input.clone());
                continue;
            }

            info!("Scanning directory: {}", input.display());
            for entry in WalkDir::new(input)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
            {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        let path = e.path().unwrap_or(input.as_path()).to_path_buf();
                        warn!("Could not walk {}: {}", path.display(), e);
                        failures.push(IngestionFailure {
                            file_name: path.display().to_string(),
                            error_message: PipelineError::FileOperation {
                                path,
                                source: e.into(),
                            }
                            .to_string(),
                        });
                        continue;
                    }
                };

                let path = entry.path();
                if !entry.file_type().is_file() || !Validator::has_document_extension(path) {
                    continue;
                }

                if self.should_skip(path) {
                    debug!("Skipping file: {}", path.display());
                    continue;
                }

                files.push(path.to_path_buf());
            }
        }

        info!("Found {} document file(s)", files.len());
        (files, failures)
    }

    pub fn scan(&self, inputs: &[PathBuf]) -> ScanOutcome {
        let (paths, failures) = self.collect_paths(inputs);
        let mut outcome = ScanOutcome {
            documents: Vec::with_capacity(paths.len()),
            failures,
        };

        for path in paths {
            match Self::read_document(&path) {
                Ok(document) => outcome.documents.push(document),
                Err(e) => {
                    warn!("Could not read {}: {}", path.display(), e);
                    outcome.failures.push(IngestionFailure {
                        file_name: display_name(&path),
                        error_message: e.to_string(),
                    });
                }
            }
        }

        outcome
    }

    fn read_document(path: &Path) -> Result<RawDocument, PipelineError> {
        let content = fs::read(path).map_err(|source| PipelineError::FileOperation {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(RawDocument::new(display_name(path), content))
    }

    fn should_skip(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();

        self.config.skip_patterns.iter().any(|pattern| {
            if let Some(suffix) = pattern.strip_prefix('*') {
                path_str.ends_with(suffix)
            } else if let Some(dir) = pattern.strip_suffix("/*") {
                path.components()
                    .any(|c| c.as_os_str().to_string_lossy() == dir)
            } else {
                path_str.contains(pattern.as_str())
            }
        })
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
