//! Performance samples and bounded history
//!
//! Frame-rate and memory samples live in fixed-capacity rings that evict
//! the oldest entry on overflow. Load-time samples are kept for the whole
//! session since only their sum is reported.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::host::MemoryReading;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// What a sample measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    FrameRate,
    Memory,
    LoadTime,
}

/// One measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub kind: MetricKind,
    pub value: f64,
    pub timestamp_ms: f64,
}

/// FIFO sample store
///
/// With a capacity the ring evicts its oldest sample on overflow; without
/// one it grows for the life of the session.
#[derive(Debug, Clone)]
pub struct SampleRing {
    samples: VecDeque<PerformanceSample>,
    capacity: Option<usize>,
}

impl SampleRing {
    /// Ring holding at most `capacity` samples (at least one)
    pub fn bounded(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: Some(capacity),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            samples: VecDeque::new(),
            capacity: None,
        }
    }

    /// Append a sample, returning the evicted one if the ring was full
    pub fn push(&mut self, sample: PerformanceSample) -> Option<PerformanceSample> {
        let evicted = match self.capacity {
            Some(capacity) if self.samples.len() >= capacity => self.samples.pop_front(),
            _ => None,
        };
        self.samples.push_back(sample);
        evicted
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn latest(&self) -> Option<&PerformanceSample> {
        self.samples.back()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &PerformanceSample> + '_ {
        self.samples.iter()
    }

    pub fn sum(&self) -> f64 {
        self.samples.iter().map(|s| s.value).sum()
    }

    /// Mean value, 0.0 when empty
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.sum() / self.samples.len() as f64
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Heap usage in megabytes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemorySample {
    pub used_mb: f64,
    pub total_mb: f64,
    pub limit_mb: f64,
    pub timestamp_ms: f64,
}

impl MemorySample {
    pub fn from_reading(reading: MemoryReading, timestamp_ms: f64) -> Self {
        Self {
            used_mb: reading.used_bytes as f64 / BYTES_PER_MB,
            total_mb: reading.total_bytes as f64 / BYTES_PER_MB,
            limit_mb: reading.limit_bytes as f64 / BYTES_PER_MB,
            timestamp_ms,
        }
    }

    /// used / limit, 0.0 when the limit is unknown
    pub fn pressure(&self) -> f64 {
        if self.limit_mb > 0.0 {
            self.used_mb / self.limit_mb
        } else {
            0.0
        }
    }
}

/// Periodic performance summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub average_fps: f64,
    /// Latest used heap in MB, if memory is observable
    pub memory_used_mb: Option<f64>,
    /// Sum of every recorded load time
    pub load_time_ms: f64,
    pub error_count: usize,
    pub is_performant: bool,
}
