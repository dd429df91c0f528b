// file: src/utils/mod.rs
// description: utility functions module exports
// reference: internal module structure

pub mod cancel;
pub mod logging;
pub mod telemetry;
pub mod validation;

pub use cancel::{CancellationHandle, CancellationSignal};
pub use telemetry::{HealthCheck, HealthReport, HealthStatus, OperationTimer, PerformanceMetrics};
pub use validation::Validator;
