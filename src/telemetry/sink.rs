//! External telemetry collaborator
//!
//! Events are fire-and-forget: callers log a failed `send` at debug level
//! and move on. No sink at all is represented by [`NullSink`].

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::TelemetryError;

/// A named event with a flat key/value payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryEvent {
    pub name: String,
    pub payload: BTreeMap<String, Value>,
}

impl TelemetryEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: BTreeMap::new(),
        }
    }

    /// Builder-style field insertion
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

pub trait TelemetrySink {
    fn send(&self, event: &TelemetryEvent) -> Result<(), TelemetryError>;
}

/// Send `event`, swallowing any failure
pub fn emit(sink: &dyn TelemetrySink, event: TelemetryEvent) {
    if let Err(error) = sink.send(&event) {
        tracing::debug!(
            target: "adaptive_fx::telemetry",
            event = %event.name,
            error = %error,
            "Telemetry dropped"
        );
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn send(&self, _event: &TelemetryEvent) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Forwards events to the log as structured JSON
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn send(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
        let payload = serde_json::to_string(&event.payload).map_err(|e| {
            TelemetryError::Rejected {
                event: event.name.clone(),
                reason: e.to_string(),
            }
        })?;
        tracing::info!(
            target: "adaptive_fx::telemetry",
            event = %event.name,
            payload = %payload,
            "Telemetry event"
        );
        Ok(())
    }
}

/// Records events in memory; can be told to fail
#[derive(Debug, Default)]
pub struct MemorySink {
    events: RefCell<Vec<TelemetryEvent>>,
    failing: Cell<bool>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `send` fail with [`TelemetryError::Unavailable`]
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.borrow().clone()
    }

    pub fn events_named(&self, name: &str) -> Vec<TelemetryEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.name == name)
            .cloned()
            .collect()
    }
}

impl TelemetrySink for MemorySink {
    fn send(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
        if self.failing.get() {
            return Err(TelemetryError::Unavailable);
        }
        self.events.borrow_mut().push(event.clone());
        Ok(())
    }
}
