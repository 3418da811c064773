//! Runtime settings
//!
//! Thresholds, sampling intervals, the error keyword set and the script
//! locators live in one XML document. Every field has a default, so an
//! empty `<AdaptiveFx/>` is a valid settings file.

use std::fs;
use std::path::Path;

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};

use crate::effects::{EffectContent, EffectKind, ThrottleSettings};
use crate::error::SettingsError;
use crate::telemetry::LogConfig;

/// Performance monitor thresholds and intervals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Frame rate below which effects are throttled
    #[serde(rename = "fpsFloor")]
    pub fps_floor: f64,

    #[serde(rename = "degradedVelocityThreshold")]
    pub degraded_velocity_threshold: f64,

    #[serde(rename = "degradedMaxImages")]
    pub degraded_max_images: usize,

    #[serde(rename = "frameBufferCapacity")]
    pub frame_buffer_capacity: usize,

    #[serde(rename = "memoryBufferCapacity")]
    pub memory_buffer_capacity: usize,

    /// Minimum time between two frame-rate flushes
    #[serde(rename = "frameWindowMs")]
    pub frame_window_ms: f64,

    #[serde(rename = "memorySampleIntervalMs")]
    pub memory_sample_interval_ms: f64,

    /// used / limit above which memory optimization runs
    #[serde(rename = "memoryPressureRatio")]
    pub memory_pressure_ratio: f64,

    #[serde(rename = "reportIntervalMs")]
    pub report_interval_ms: f64,

    /// Average fps a session must exceed to count as performant
    #[serde(rename = "performantFps")]
    pub performant_fps: f64,

    /// Used heap (MB) a session must stay under to count as performant
    #[serde(rename = "performantMemoryMb")]
    pub performant_memory_mb: f64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            fps_floor: 30.0,
            degraded_velocity_threshold: 15.0,
            degraded_max_images: 3,
            frame_buffer_capacity: 100,
            memory_buffer_capacity: 50,
            frame_window_ms: 1000.0,
            memory_sample_interval_ms: 5000.0,
            memory_pressure_ratio: 0.8,
            report_interval_ms: 30_000.0,
            performant_fps: 50.0,
            performant_memory_mb: 100.0,
        }
    }
}

impl MonitorSettings {
    /// Limits pushed into effects when the frame rate collapses
    pub fn throttle(&self) -> ThrottleSettings {
        ThrottleSettings {
            velocity_threshold: self.degraded_velocity_threshold,
            max_images: self.degraded_max_images,
        }
    }
}

/// Maps an error-message substring to the effect it implicates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectMapping {
    #[serde(rename = "pattern")]
    pub pattern: String,
    /// Instance name passed to `destroy`
    #[serde(rename = "effect")]
    pub effect: String,
}

impl EffectMapping {
    pub fn new(pattern: &str, effect: EffectKind) -> Self {
        Self {
            pattern: pattern.to_string(),
            effect: effect.instance_name().to_string(),
        }
    }
}

/// Error isolation filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationSettings {
    /// An error is effect-related if its message contains one of these
    #[serde(rename = "keyword")]
    pub keywords: Vec<String>,

    #[serde(rename = "mapping")]
    pub mappings: Vec<EffectMapping>,

    /// How many records a report surfaces
    #[serde(rename = "surfacedRecords")]
    pub surfaced_records: usize,
}

impl Default for IsolationSettings {
    fn default() -> Self {
        Self {
            keywords: ["KineticTypography", "VelocityImageSpawner", "ImageSpawner", "CustomCursor", "effect"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            mappings: vec![
                EffectMapping::new("KineticTypography", EffectKind::KineticText),
                EffectMapping::new("kinetic", EffectKind::KineticText),
                EffectMapping::new("VelocityImageSpawner", EffectKind::VelocitySpawner),
                EffectMapping::new("ImageSpawner", EffectKind::VelocitySpawner),
                EffectMapping::new("spawner", EffectKind::VelocitySpawner),
                EffectMapping::new("CustomCursor", EffectKind::CustomCursor),
                EffectMapping::new("cursor", EffectKind::CustomCursor),
            ],
            surfaced_records: 10,
        }
    }
}

/// Resource locator per effect implementation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptLocators {
    #[serde(rename = "kinetic")]
    pub kinetic: String,
    #[serde(rename = "spawner")]
    pub spawner: String,
    #[serde(rename = "cursor")]
    pub cursor: String,
}

impl Default for ScriptLocators {
    fn default() -> Self {
        Self {
            kinetic: "fx/kinetic-typography.js".to_string(),
            spawner: "fx/velocity-image-spawner.js".to_string(),
            cursor: "fx/custom-cursor.js".to_string(),
        }
    }
}

impl ScriptLocators {
    pub fn locator(&self, kind: EffectKind) -> &str {
        match kind {
            EffectKind::KineticText => &self.kinetic,
            EffectKind::VelocitySpawner => &self.spawner,
            EffectKind::CustomCursor => &self.cursor,
        }
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "AdaptiveFx", default)]
pub struct RuntimeSettings {
    #[serde(rename = "monitor")]
    pub monitor: MonitorSettings,

    #[serde(rename = "isolation")]
    pub isolation: IsolationSettings,

    #[serde(rename = "scripts")]
    pub scripts: ScriptLocators,

    #[serde(rename = "content")]
    pub content: EffectContent,

    #[serde(rename = "logging")]
    pub logging: LogConfig,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            monitor: MonitorSettings::default(),
            isolation: IsolationSettings::default(),
            scripts: ScriptLocators::default(),
            content: EffectContent::default(),
            logging: LogConfig::default(),
        }
    }
}

impl RuntimeSettings {
    /// Clamp out-of-range values
    pub fn sanitize(&mut self) {
        let monitor = &mut self.monitor;
        monitor.fps_floor = monitor.fps_floor.clamp(1.0, 240.0);
        monitor.degraded_velocity_threshold = monitor.degraded_velocity_threshold.max(0.0);
        monitor.frame_buffer_capacity = monitor.frame_buffer_capacity.max(1);
        monitor.memory_buffer_capacity = monitor.memory_buffer_capacity.max(1);
        monitor.frame_window_ms = monitor.frame_window_ms.max(100.0);
        monitor.memory_sample_interval_ms = monitor.memory_sample_interval_ms.max(100.0);
        monitor.memory_pressure_ratio = monitor.memory_pressure_ratio.clamp(0.1, 1.0);
        monitor.report_interval_ms = monitor.report_interval_ms.max(1000.0);
        monitor.performant_memory_mb = monitor.performant_memory_mb.max(0.0);

        self.isolation.surfaced_records = self.isolation.surfaced_records.max(1);
        self.isolation.keywords.retain(|k| !k.trim().is_empty());
        self.isolation.mappings.retain(|m| !m.pattern.trim().is_empty());
    }

    /// Parse settings from XML, then sanitize
    pub fn from_xml(xml: &str) -> Result<Self, SettingsError> {
        let mut settings: Self = from_str(xml)?;
        settings.sanitize();
        Ok(settings)
    }

    pub fn to_xml(&self) -> Result<String, SettingsError> {
        let xml = to_string(self)?;
        Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml))
    }

    /// Load settings from an XML file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;
        Self::from_xml(&contents)
    }

    /// Save settings to an XML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        fs::write(path, self.to_xml()?)?;
        Ok(())
    }
}
