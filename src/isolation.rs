//! Error isolation layer
//!
//! Uncaught errors and unhandled rejections reach [`ErrorIsolation::handle`]
//! from the host's global error bridges. Messages that mention an effect
//! are recorded, the implicated effect alone is destroyed and a best-effort
//! `exception` event is sent. Anything else passes through untouched.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::OnceLock;

use serde::Serialize;

use crate::effects::{in_isolated_hook, EffectManager, LifecycleFailure};
use crate::error::panic_message;
use crate::host::Clock;
use crate::settings::IsolationSettings;
use crate::telemetry::{emit, TelemetryEvent, TelemetrySink};

/// Where an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Uncaught error (or a panic seen by the panic hook)
    Runtime,
    /// Unhandled asynchronous rejection
    Promise,
    /// Failure isolated by the effect manager
    Lifecycle,
}

/// An error observed at the process boundary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub message: String,
    pub stack: Option<String>,
    pub source: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl ErrorEvent {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }

    pub fn promise(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Promise, message)
    }

    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stack: None,
            source: None,
            line: None,
            column: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_location(mut self, source: impl Into<String>, line: u32, column: u32) -> Self {
        self.source = Some(source.into());
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

/// Where a recorded error happened and what it implicated
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorContext {
    pub source: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    /// Instance names the error was attributed to
    pub effects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    pub stack: Option<String>,
    pub timestamp_ms: f64,
    pub context: ErrorContext,
}

/// Summary handed to reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub total: usize,
    pub recent: Vec<ErrorRecord>,
}

/// Append-only record of every effect error this session
#[derive(Debug, Default)]
pub struct ErrorLog {
    records: Vec<ErrorRecord>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ErrorRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The last `n` records, oldest first
    pub fn recent(&self, n: usize) -> &[ErrorRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    pub fn report(&self, surfaced: usize) -> ErrorReport {
        ErrorReport {
            total: self.records.len(),
            recent: self.recent(surfaced).to_vec(),
        }
    }
}

/// Outcome of handling one error event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Not effect-related; left to the host's default handling
    Ignored,
    /// Recorded; the listed effects were destroyed
    Isolated { destroyed: Vec<String> },
}

pub struct ErrorIsolation {
    manager: Rc<EffectManager>,
    log: Rc<RefCell<ErrorLog>>,
    sink: Rc<dyn TelemetrySink>,
    clock: Rc<dyn Clock>,
    settings: IsolationSettings,
    /// Lowercased once; matching is case-insensitive
    keywords: Vec<String>,
}

impl ErrorIsolation {
    pub fn new(
        manager: Rc<EffectManager>,
        sink: Rc<dyn TelemetrySink>,
        clock: Rc<dyn Clock>,
        settings: IsolationSettings,
    ) -> Self {
        let keywords = settings.keywords.iter().map(|k| k.to_lowercase()).collect();
        Self {
            manager,
            log: Rc::new(RefCell::new(ErrorLog::new())),
            sink,
            clock,
            settings,
            keywords,
        }
    }

    /// Shared handle to the error log
    pub fn log(&self) -> Rc<RefCell<ErrorLog>> {
        self.log.clone()
    }

    pub fn error_count(&self) -> usize {
        self.log.borrow().len()
    }

    pub fn report(&self) -> ErrorReport {
        self.log.borrow().report(self.settings.surfaced_records)
    }

    pub fn is_effect_related(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.keywords.iter().any(|keyword| message.contains(keyword.as_str()))
    }

    /// Instance names implicated by `message`, each at most once
    pub fn implicated_effects(&self, message: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for mapping in &self.settings.mappings {
            if message.contains(mapping.pattern.as_str()) && !names.contains(&mapping.effect) {
                names.push(mapping.effect.clone());
            }
        }
        names
    }

    /// Handle one uncaught error or rejection
    pub fn handle(&self, event: &ErrorEvent) -> Disposition {
        if !self.is_effect_related(&event.message) {
            tracing::trace!(
                target: "adaptive_fx::isolation",
                message = %event.message,
                "Error not effect-related, passing through"
            );
            return Disposition::Ignored;
        }

        let effects = self.implicated_effects(&event.message);
        self.log.borrow_mut().push(ErrorRecord {
            kind: event.kind,
            message: event.message.clone(),
            stack: event.stack.clone(),
            timestamp_ms: self.clock.now_ms(),
            context: ErrorContext {
                source: event.source.clone(),
                line: event.line,
                column: event.column,
                effects: effects.clone(),
            },
        });

        tracing::warn!(
            target: "adaptive_fx::isolation",
            kind = ?event.kind,
            message = %event.message,
            effects = ?effects,
            "Effect error isolated"
        );

        // The log borrow is released: destroy may report lifecycle failures
        let mut destroyed = Vec::new();
        for name in effects {
            if self.manager.destroy(&name) {
                destroyed.push(name);
            }
        }

        emit(
            self.sink.as_ref(),
            TelemetryEvent::new("exception")
                .with("description", event.message.as_str())
                .with("fatal", false),
        );

        Disposition::Isolated { destroyed }
    }

    /// Record a failure the manager already isolated
    pub fn record_lifecycle(&self, failure: &LifecycleFailure) {
        record_lifecycle(&self.log, self.clock.as_ref(), failure);
    }

    /// Handle every panic captured by [`install_panic_hook`] on this thread
    pub fn drain_panics(&self) -> usize {
        let events: Vec<ErrorEvent> =
            CAPTURED_PANICS.with(|queue| queue.borrow_mut().drain(..).collect());
        for event in &events {
            self.handle(event);
        }
        events.len()
    }
}

/// Append a lifecycle failure to `log`
///
/// Standalone so the manager's failure hook can hold just the log.
pub fn record_lifecycle(log: &RefCell<ErrorLog>, clock: &dyn Clock, failure: &LifecycleFailure) {
    log.borrow_mut().push(ErrorRecord {
        kind: ErrorKind::Lifecycle,
        message: failure.error.to_string(),
        stack: None,
        timestamp_ms: clock.now_ms(),
        context: ErrorContext {
            source: Some(failure.operation.to_string()),
            effects: vec![failure.name.clone()],
            ..ErrorContext::default()
        },
    });
}

thread_local! {
    static CAPTURED_PANICS: RefCell<Vec<ErrorEvent>> = const { RefCell::new(Vec::new()) };
}

/// Capture uncaught panics as runtime error events
///
/// Captured events queue up per thread until
/// [`ErrorIsolation::drain_panics`] is called, and the previous hook still
/// runs for them. Panics raised inside an effect hook the manager isolates
/// are skipped entirely: the manager already records them as lifecycle
/// failures, and nothing is printed. Installing twice is a no-op.
pub fn install_panic_hook() {
    static HOOK: OnceLock<()> = OnceLock::new();
    HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if in_isolated_hook() {
                return;
            }
            let mut event = ErrorEvent::runtime(panic_message(info.payload()));
            if let Some(location) = info.location() {
                event = event.with_location(location.file(), location.line(), location.column());
            }
            // The hook can run during thread teardown
            let _ = CAPTURED_PANICS.try_with(|queue| {
                if let Ok(mut queue) = queue.try_borrow_mut() {
                    queue.push(event);
                }
            });
            previous(info);
        }));
    });
}
