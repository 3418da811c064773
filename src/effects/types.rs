//! Core effect data types
//!
//! Effect kinds and the static per-tier settings table. These are plain data;
//! live instances are owned by the [`EffectManager`](super::EffectManager).

use serde::{Deserialize, Serialize};

use crate::device::PerformanceTier;

/// The effect implementations this crate knows how to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EffectKind {
    /// Rotating kinetic headline text
    KineticText,
    /// Images spawned along fast pointer movement
    VelocitySpawner,
    /// Smoothed custom cursor with hover feedback
    CustomCursor,
}

impl EffectKind {
    /// Every kind, in load order
    pub const ALL: [EffectKind; 3] = [
        EffectKind::KineticText,
        EffectKind::VelocitySpawner,
        EffectKind::CustomCursor,
    ];

    /// Name the instance is registered under
    pub fn instance_name(&self) -> &'static str {
        match self {
            EffectKind::KineticText => "kinetic",
            EffectKind::VelocitySpawner => "spawner",
            EffectKind::CustomCursor => "cursor",
        }
    }

    /// Identifier the implementation reports in its own error messages
    pub fn class_name(&self) -> &'static str {
        match self {
            EffectKind::KineticText => "KineticTypography",
            EffectKind::VelocitySpawner => "VelocityImageSpawner",
            EffectKind::CustomCursor => "CustomCursor",
        }
    }

    pub fn from_instance_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.instance_name() == name)
    }
}

impl std::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.instance_name())
    }
}

/// Kinetic text timing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KineticSettings {
    /// How long a phrase stays fully visible
    pub display_duration_ms: f64,
    /// How long the swap to the next phrase takes
    pub transition_duration_ms: f64,
    /// Upper bound on simultaneously visible phrases
    pub max_texts: usize,
}

/// Velocity spawner limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnerSettings {
    /// Pointer speed (distance per ms, times 10) that triggers a spawn
    pub velocity_threshold: f64,
    /// Upper bound on live spawned images
    pub max_images: usize,
    /// Minimum time between two pointer samples
    pub throttle_ms: f64,
}

/// Custom cursor feel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorSettings {
    /// Fraction of the remaining distance covered per frame (0-1)
    pub smoothing: f64,
    /// Scale applied while hovering an interactive element
    pub hover_scale: f64,
}

/// Settings for one effect at one tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EffectSettings {
    Kinetic(KineticSettings),
    Spawner(SpawnerSettings),
    Cursor(CursorSettings),
}

impl EffectSettings {
    /// Static lookup keyed by (kind, tier)
    pub fn lookup(kind: EffectKind, tier: PerformanceTier) -> Self {
        use PerformanceTier::*;

        match kind {
            EffectKind::KineticText => {
                let (display, transition, max_texts) = match tier {
                    Low => (4000.0, 800.0, 1),
                    Medium => (3000.0, 600.0, 2),
                    High => (2500.0, 500.0, 3),
                };
                EffectSettings::Kinetic(KineticSettings {
                    display_duration_ms: display,
                    transition_duration_ms: transition,
                    max_texts,
                })
            }
            EffectKind::VelocitySpawner => {
                let (threshold, max_images, throttle) = match tier {
                    Low => (20.0, 2, 100.0),
                    Medium => (10.0, 5, 50.0),
                    High => (5.0, 8, 16.0),
                };
                EffectSettings::Spawner(SpawnerSettings {
                    velocity_threshold: threshold,
                    max_images,
                    throttle_ms: throttle,
                })
            }
            EffectKind::CustomCursor => {
                let (smoothing, hover_scale) = match tier {
                    Low => (0.35, 1.0),
                    Medium => (0.2, 1.5),
                    High => (0.15, 2.0),
                };
                EffectSettings::Cursor(CursorSettings {
                    smoothing,
                    hover_scale,
                })
            }
        }
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            EffectSettings::Kinetic(_) => EffectKind::KineticText,
            EffectSettings::Spawner(_) => EffectKind::VelocitySpawner,
            EffectSettings::Cursor(_) => EffectKind::CustomCursor,
        }
    }
}

/// Page content the effects animate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectContent {
    /// Phrases cycled by the kinetic text rotator
    #[serde(rename = "phrase", default)]
    pub phrases: Vec<String>,
    /// Image sources the spawner picks from
    #[serde(rename = "image", default)]
    pub images: Vec<String>,
    /// Elements that enlarge the custom cursor on hover
    #[serde(rename = "hoverSelector", default)]
    pub hover_selectors: Vec<String>,
}

impl Default for EffectContent {
    fn default() -> Self {
        Self {
            phrases: vec![
                "Design".to_string(),
                "Motion".to_string(),
                "Stories".to_string(),
            ],
            images: vec![
                "img/trail-01.webp".to_string(),
                "img/trail-02.webp".to_string(),
                "img/trail-03.webp".to_string(),
            ],
            hover_selectors: vec!["a".to_string(), "button".to_string()],
        }
    }
}

/// Throttle-down values broadcast when frame rate collapses
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThrottleSettings {
    pub velocity_threshold: f64,
    pub max_images: usize,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            velocity_threshold: 15.0,
            max_images: 3,
        }
    }
}
