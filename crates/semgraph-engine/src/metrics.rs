//! Minimal in-process metrics registry, keyed by `operation.<name>.duration`,
//! `.count`, `.errors` (see `/DESIGN.md`). A small counter/histogram
//! registry backed by `parking_lot` mutexes stands in for an external
//! metrics crate at this layer.

use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct OperationMetric {
    pub count: u64,
    pub errors: u64,
    pub total_duration_ms: u128,
}

impl OperationMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.count as f64
        }
    }
}

#[derive(Default)]
pub struct MetricsRegistry {
    metrics: Mutex<HashMap<String, OperationMetric>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, operation: &str, duration_ms: u128, succeeded: bool) {
        let mut metrics = self.metrics.lock();
        let entry = metrics.entry(operation.to_string()).or_default();
        entry.count += 1;
        entry.total_duration_ms += duration_ms;
        if !succeeded {
            entry.errors += 1;
        }
    }

    pub fn snapshot(&self) -> HashMap<String, OperationMetric> {
        self.metrics.lock().clone()
    }

    pub fn get(&self, operation: &str) -> Option<OperationMetric> {
        self.metrics.lock().get(operation).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_count_and_errors_separately() {
        let registry = MetricsRegistry::new();
        registry.record("decompose", 10, true);
        registry.record("decompose", 20, false);
        let metric = registry.get("decompose").unwrap();
        assert_eq!(metric.count, 2);
        assert_eq!(metric.errors, 1);
        assert_eq!(metric.total_duration_ms, 30);
    }
}
