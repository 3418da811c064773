//! Device capability classification
//!
//! A [`DeviceProfile`] is computed once from static environment signals at
//! startup and never changes afterwards. Every decision about which effects
//! to run, and with which settings, is a pure function of that profile.

use serde::{Deserialize, Serialize};

use crate::effects::EffectKind;

/// Memory assumed when the platform does not expose it
pub const DEFAULT_MEMORY_GB: f64 = 4.0;

/// Logical cores assumed when the platform does not expose them
pub const DEFAULT_HARDWARE_CONCURRENCY: u32 = 4;

const MOBILE_AGENTS: &[&str] = &[
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

const MOBILE_MAX_WIDTH: u32 = 768;
const TABLET_MAX_WIDTH: u32 = 1024;

/// Coarse performance classification driving effect settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PerformanceTier {
    Low,
    Medium,
    High,
}

impl PerformanceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceTier::Low => "low",
            PerformanceTier::Medium => "medium",
            PerformanceTier::High => "high",
        }
    }
}

impl std::fmt::Display for PerformanceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling and observation primitives the platform offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformFeatures {
    /// Frame-synchronised callback scheduling
    pub animation_frame: bool,
    /// Element visibility observation
    pub intersection_observer: bool,
    /// Heap usage introspection
    pub memory_introspection: bool,
}

impl Default for PlatformFeatures {
    fn default() -> Self {
        Self {
            animation_frame: true,
            intersection_observer: true,
            memory_introspection: false,
        }
    }
}

/// Raw signals read from the environment at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSignals {
    pub user_agent: String,
    pub viewport_width: u32,
    pub max_touch_points: u32,
    pub hardware_concurrency: Option<u32>,
    pub device_memory_gb: Option<f64>,
    pub prefers_reduced_motion: bool,
    pub features: PlatformFeatures,
}

impl Default for EnvironmentSignals {
    fn default() -> Self {
        Self {
            user_agent: String::new(),
            viewport_width: 1920,
            max_touch_points: 0,
            hardware_concurrency: None,
            device_memory_gb: None,
            prefers_reduced_motion: false,
            features: PlatformFeatures::default(),
        }
    }
}

/// Immutable snapshot of what the device can do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub is_mobile: bool,
    pub is_tablet: bool,
    pub is_low_end: bool,
    pub reduced_motion: bool,
    pub memory_limit_gb: f64,
    pub hardware_concurrency: u32,
    pub features: PlatformFeatures,
}

impl DeviceProfile {
    /// Derive a profile from environment signals
    ///
    /// Missing signals fall back to [`DEFAULT_MEMORY_GB`] and
    /// [`DEFAULT_HARDWARE_CONCURRENCY`]; classification never fails.
    pub fn classify(signals: &EnvironmentSignals) -> Self {
        let agent = signals.user_agent.to_lowercase();
        let memory_limit_gb = signals
            .device_memory_gb
            .filter(|gb| gb.is_finite() && *gb > 0.0)
            .unwrap_or(DEFAULT_MEMORY_GB);
        let hardware_concurrency = signals
            .hardware_concurrency
            .filter(|cores| *cores > 0)
            .unwrap_or(DEFAULT_HARDWARE_CONCURRENCY);

        let is_mobile = MOBILE_AGENTS.iter().any(|needle| agent.contains(needle))
            || signals.viewport_width <= MOBILE_MAX_WIDTH;

        let android_tablet = agent.contains("android") && !agent.contains("mobile");
        let touch_tablet = signals.max_touch_points > 0
            && signals.viewport_width > MOBILE_MAX_WIDTH
            && signals.viewport_width <= TABLET_MAX_WIDTH;
        let is_tablet = agent.contains("ipad") || android_tablet || touch_tablet;

        let is_low_end = hardware_concurrency <= 2 || memory_limit_gb < 2.0;

        let profile = Self {
            is_mobile,
            is_tablet,
            is_low_end,
            reduced_motion: signals.prefers_reduced_motion,
            memory_limit_gb,
            hardware_concurrency,
            features: signals.features,
        };

        tracing::debug!(
            target: "adaptive_fx::device",
            mobile = profile.is_mobile,
            tablet = profile.is_tablet,
            low_end = profile.is_low_end,
            reduced_motion = profile.reduced_motion,
            memory_gb = profile.memory_limit_gb,
            tier = %profile.tier(),
            "Device classified"
        );

        profile
    }

    /// Performance tier by the fixed decision rule
    pub fn tier(&self) -> PerformanceTier {
        if self.is_mobile || self.is_low_end || self.memory_limit_gb < 2.0 {
            PerformanceTier::Low
        } else if self.memory_limit_gb < 4.0 {
            PerformanceTier::Medium
        } else {
            PerformanceTier::High
        }
    }

    /// Whether the enhanced stage can run at all
    pub fn supports_enhanced(&self) -> bool {
        self.features.animation_frame
            && self.features.intersection_observer
            && self.hardware_concurrency > 2
    }

    /// Whether the advanced stage can run
    pub fn supports_advanced(&self) -> bool {
        self.tier() == PerformanceTier::High && !self.is_mobile && !self.reduced_motion
    }

    /// Per-effect enable rule
    pub fn should_enable(&self, kind: EffectKind) -> bool {
        if self.reduced_motion {
            return false;
        }
        match kind {
            EffectKind::KineticText => true,
            EffectKind::VelocitySpawner => self.tier() != PerformanceTier::Low,
            EffectKind::CustomCursor => !self.is_mobile,
        }
    }
}
