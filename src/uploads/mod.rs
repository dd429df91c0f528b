// file: src/uploads/mod.rs
// description: local upload intake module exports

pub mod scanner;

pub use scanner::{FileScanner, ScanOutcome};
