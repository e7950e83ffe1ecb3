use std::time::Duration;

use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};

const METER_NAME: &str = "detector";

/// Request and model-load instruments. Cheap to clone; all clones share
/// the same underlying instruments.
#[derive(Clone)]
pub struct DetectorMetrics {
    predict_duration: Histogram<f64>,
    requests: Counter<u64>,
    detections: Counter<u64>,
    model_loads: Counter<u64>,
}

impl DetectorMetrics {
    pub fn new() -> Self {
        let meter = global::meter(METER_NAME);
        let latency_buckets = [
            0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0,
        ];

        Self {
            predict_duration: meter
                .f64_histogram("detector_predict_duration_seconds")
                .with_description("Time to serve one predict call (stage + load + infer + serialize)")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
            requests: meter
                .u64_counter("detector_requests_total")
                .with_description("Total predict calls by outcome")
                .build(),
            detections: meter
                .u64_counter("detector_detections_total")
                .with_description("Total detections returned")
                .build(),
            model_loads: meter
                .u64_counter("detector_model_loads_total")
                .with_description("Model load attempts by outcome")
                .build(),
        }
    }

    pub fn record_request(&self, elapsed: Duration, outcome: Outcome, detections: usize) {
        let attrs = [KeyValue::new("outcome", outcome.as_str())];
        self.predict_duration.record(elapsed.as_secs_f64(), &attrs);
        self.requests.add(1, &attrs);
        self.detections.add(detections as u64, &[]);
    }

    pub fn record_model_load(&self, outcome: Outcome) {
        self.model_loads
            .add(1, &[KeyValue::new("outcome", outcome.as_str())]);
    }
}

impl Default for DetectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DetectorMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorMetrics").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Empty,
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Empty => "empty",
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}
