//! Adaptive FX Library
//!
//! Lifecycle and adaptive degradation core for page visual effects.
//! Classifies the device, loads effects in stages, watches frame rate and
//! memory at runtime, and isolates effect failures so the page never breaks.

pub mod app;
pub mod device;
pub mod effects;
pub mod error;
pub mod host;
pub mod isolation;
pub mod loader;
pub mod schedule;
pub mod settings;
pub mod telemetry;

pub use app::{AppReport, EffectApp, HostServices};
pub use device::{DeviceProfile, EnvironmentSignals, PerformanceTier, PlatformFeatures};
pub use effects::{Effect, EffectCatalog, EffectKind, EffectManager, EffectSettings};
pub use error::{EffectError, LoadError, SettingsError, TelemetryError};
pub use isolation::{Disposition, ErrorEvent, ErrorIsolation, ErrorKind, ErrorLog, ErrorRecord};
pub use loader::{LoadReport, LoadStage, ProgressiveLoader};
pub use settings::RuntimeSettings;
