// file: src/utils/telemetry.rs
// description: health reports for the record store and timing of ingestion runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    fn icon(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "✓",
            HealthStatus::Degraded => "⚠",
            HealthStatus::Unhealthy => "✗",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub component: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub response_time_ms: u64,
}

impl HealthCheck {
    fn new(
        component: &str,
        status: HealthStatus,
        message: Option<String>,
        response_time: Duration,
    ) -> Self {
        Self {
            component: component.to_string(),
            status,
            message,
            response_time_ms: response_time.as_millis() as u64,
        }
    }

    pub fn healthy(component: &str, response_time: Duration) -> Self {
        Self::new(component, HealthStatus::Healthy, None, response_time)
    }

    pub fn degraded(component: &str, message: String, response_time: Duration) -> Self {
        Self::new(component, HealthStatus::Degraded, Some(message), response_time)
    }

    pub fn unhealthy(component: &str, message: String, response_time: Duration) -> Self {
        Self::new(component, HealthStatus::Unhealthy, Some(message), response_time)
    }
}

/// Result of a connection test. The overall status is the worst individual status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub overall_status: HealthStatus,
    pub checks: Vec<HealthCheck>,
    pub checked_at: DateTime<Utc>,
    pub version: String,
}

impl HealthReport {
    pub fn new(checks: Vec<HealthCheck>, version: String) -> Self {
        let overall_status = if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Self {
            overall_status,
            checks,
            checked_at: Utc::now(),
            version,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.overall_status == HealthStatus::Healthy
    }

    pub fn failing(&self) -> impl Iterator<Item = &HealthCheck> {
        self.checks
            .iter()
            .filter(|c| c.status != HealthStatus::Healthy)
    }

    pub fn format(&self) -> String {
        let mut output = format!(
            "{} Store health: {:?}\nVersion: {}\nChecked at: {}\n\n",
            self.overall_status.icon(),
            self.overall_status,
            self.version,
            self.checked_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        for check in &self.checks {
            output.push_str(&format!(
                "{} {} ({:?}) - {}ms",
                check.status.icon(),
                check.component,
                check.status,
                check.response_time_ms
            ));

            if let Some(msg) = &check.message {
                output.push_str(&format!("\n  {}", msg));
            }
            output.push('\n');
        }

        output
    }
}

pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        info!("Starting {}", operation);
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        info!("Finished {} in {:.2}s", self.operation, elapsed.as_secs_f64());
        elapsed
    }

    /// Logs throughput for `count` documents and returns the metrics.
    pub fn finish_with_count(self, count: usize) -> PerformanceMetrics {
        let metrics = PerformanceMetrics::new(&self.operation, count, self.elapsed());
        info!("Finished {}", metrics.format());
        metrics
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub operation: String,
    pub count: usize,
    pub duration_ms: u64,
    /// Documents per second.
    pub throughput: f64,
}

impl PerformanceMetrics {
    pub fn new(operation: &str, count: usize, duration: Duration) -> Self {
        let secs = duration.as_secs_f64();
        Self {
            operation: operation.to_string(),
            count,
            duration_ms: duration.as_millis() as u64,
            throughput: if secs > 0.0 { count as f64 / secs } else { 0.0 },
        }
    }

    pub fn format(&self) -> String {
        format!(
            "{}: {} document(s) in {}ms ({:.2}/s)",
            self.operation, self.count, self.duration_ms, self.throughput
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_check_creation() {
        let check = HealthCheck::healthy("lancedb", Duration::from_millis(50));
        assert_eq!(check.component, "lancedb");
        assert_eq!(check.status, HealthStatus::Healthy);
        assert_eq!(check.response_time_ms, 50);
        assert!(check.message.is_none());
    }

    #[test]
    fn test_overall_status_is_worst_check() {
        let report = HealthReport::new(
            vec![
                HealthCheck::healthy("settings", Duration::from_millis(1)),
                HealthCheck::degraded("collection", "missing".into(), Duration::ZERO),
            ],
            "0.1.0".to_string(),
        );
        assert_eq!(report.overall_status, HealthStatus::Degraded);
        assert_eq!(report.failing().count(), 1);

        let report = HealthReport::new(
            vec![
                HealthCheck::degraded("collection", "missing".into(), Duration::ZERO),
                HealthCheck::unhealthy("lancedb", "refused".into(), Duration::ZERO),
            ],
            "0.1.0".to_string(),
        );
        assert_eq!(report.overall_status, HealthStatus::Unhealthy);
        assert!(report.format().contains("refused"));
    }

    #[test]
    fn test_empty_report_is_healthy() {
        assert!(HealthReport::new(Vec::new(), "0.1.0".into()).is_healthy());
    }

    #[test]
    fn test_performance_metrics() {
        let metrics = PerformanceMetrics::new("ingest", 100, Duration::from_secs(10));
        assert_eq!(metrics.count, 100);
        assert_eq!(metrics.throughput, 10.0);

        let instant = PerformanceMetrics::new("ingest", 3, Duration::ZERO);
        assert_eq!(instant.throughput, 0.0);
    }

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::new("test");
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.finish() >= Duration::from_millis(10));
    }
}
