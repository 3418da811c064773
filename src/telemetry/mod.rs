//! Telemetry and logging infrastructure
//!
//! Structured logging with tracing, runtime performance monitoring and the
//! fire-and-forget telemetry sink.

pub mod logging;
pub mod metrics;
pub mod monitor;
pub mod sink;

pub use logging::{init_logging, LogConfig};
pub use metrics::{MemorySample, MetricKind, PerformanceReport, PerformanceSample, SampleRing};
pub use monitor::PerformanceMonitor;
pub use sink::{emit, MemorySink, NullSink, TelemetryEvent, TelemetrySink, TracingSink};
