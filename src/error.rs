//! Error types shared across the crate
//!
//! Nothing in this crate propagates a failure up to the page; these types
//! exist so each failure can be isolated, logged and recorded close to its
//! source.

use thiserror::Error;

/// Failure raised by an effect while it is being built or driven
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EffectError {
    /// The effect could not be constructed
    #[error("failed to create effect '{kind}': {message}")]
    Construction { kind: String, message: String },

    /// A lifecycle hook reported a failure
    #[error("{operation} failed: {message}")]
    Hook { operation: String, message: String },

    /// A hook panicked; the panic was caught at the isolation boundary
    #[error("effect panicked during {operation}: {message}")]
    Panicked { operation: String, message: String },
}

impl EffectError {
    /// Shorthand for a hook failure
    pub fn hook(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Hook {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Failure to make an effect implementation available
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    /// The script loader rejected the locator
    #[error("failed to load script '{locator}': {reason}")]
    Script { locator: String, reason: String },

    /// No definition is registered for the requested kind
    #[error("no effect definition registered for '{0}'")]
    UnknownEffect(String),

    /// The implementation loaded but could not be instantiated
    #[error(transparent)]
    Instantiate(#[from] EffectError),
}

/// Failure inside an external telemetry sink
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TelemetryError {
    /// The sink is not reachable
    #[error("telemetry sink unavailable")]
    Unavailable,

    /// The sink rejected the event
    #[error("telemetry sink rejected '{event}': {reason}")]
    Rejected { event: String, reason: String },
}

/// Settings-related errors
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::DeError),

    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::SeError),
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
