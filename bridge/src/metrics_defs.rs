//! Metrics definitions for the bridge.

use shared::metrics_defs::{MetricDef, MetricType};

pub const DISPATCH_OUTCOME: MetricDef = MetricDef {
    name: "dispatch.outcome",
    metric_type: MetricType::Counter,
    description: "Number of dispatched events. Tagged with outcome.",
};

pub const DISPATCH_DURATION: MetricDef = MetricDef {
    name: "dispatch.duration",
    metric_type: MetricType::Histogram,
    description: "Time to dispatch one event in seconds, tracker calls included",
};

pub const TRACKER_ERROR: MetricDef = MetricDef {
    name: "dispatch.tracker_error",
    metric_type: MetricType::Counter,
    description: "Number of dispatches that failed on a tracker call",
};

pub const ALL_METRICS: &[MetricDef] = &[DISPATCH_OUTCOME, DISPATCH_DURATION, TRACKER_ERROR];
