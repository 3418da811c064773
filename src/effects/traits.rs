//! Effect capability contract
//!
//! Every capability an effect may offer is optional. Instead of probing an
//! instance at runtime, an effect hands out a typed view of each capability
//! it supports; the manager calls through the view or skips the instance.
//!
//! - `Dispose` - release timers, listeners and nodes
//! - `Suspend` - pause / resume
//! - `Throttle` - accept degraded limits from the performance monitor
//!
//! `EffectDefinition` is the factory side: one definition per
//! [`EffectKind`], registered with the [`EffectCatalog`](super::EffectCatalog).

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::types::{EffectContent, EffectKind, EffectSettings};
use crate::error::EffectError;
use crate::host::{PageInput, Page};

/// Releases everything the effect owns
pub trait Dispose {
    /// Must tolerate being called more than once
    fn destroy(&mut self) -> Result<(), EffectError>;
}

/// Temporarily stops an effect without releasing it
pub trait Suspend {
    fn pause(&mut self, now_ms: f64) -> Result<(), EffectError>;
    fn resume(&mut self, now_ms: f64) -> Result<(), EffectError>;
}

/// Accepts throttled limits at runtime
///
/// Each hook is optional on its own; an effect overrides only the limits
/// it actually has.
pub trait Throttle {
    fn set_velocity_threshold(&mut self, _threshold: f64) {}

    fn set_max_images(&mut self, _max_images: usize) {}

    /// Drop cached resources under memory pressure
    fn release_memory(&mut self) {}
}

/// Which optional capabilities an instance exposes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub dispose: bool,
    pub suspend: bool,
    pub throttle: bool,
}

/// A live effect instance
///
/// The driving hooks (`on_frame`, `on_input`, `on_resize`) default to
/// no-ops; the capability views default to `None`.
pub trait Effect {
    fn kind(&self) -> Option<EffectKind> {
        None
    }

    fn disposer(&mut self) -> Option<&mut dyn Dispose> {
        None
    }

    fn suspender(&mut self) -> Option<&mut dyn Suspend> {
        None
    }

    fn throttle(&mut self) -> Option<&mut dyn Throttle> {
        None
    }

    /// Called once per animation frame
    fn on_frame(&mut self, _now_ms: f64) -> Result<(), EffectError> {
        Ok(())
    }

    fn on_input(&mut self, _input: &PageInput) -> Result<(), EffectError> {
        Ok(())
    }

    fn on_resize(&mut self, _width: u32, _height: u32) -> Result<(), EffectError> {
        Ok(())
    }

    fn capabilities(&mut self) -> Capabilities {
        Capabilities {
            dispose: self.disposer().is_some(),
            suspend: self.suspender().is_some(),
            throttle: self.throttle().is_some(),
        }
    }
}

/// Everything a definition needs to build an instance
#[derive(Clone)]
pub struct EffectContext {
    pub page: Rc<dyn Page>,
    pub now_ms: f64,
    pub content: EffectContent,
    /// Seed for any randomness the effect uses
    pub seed: u64,
}

/// Factory for one effect kind
pub trait EffectDefinition {
    fn kind(&self) -> EffectKind;

    /// Human-readable name (e.g., "Kinetic Text")
    fn display_name(&self) -> &'static str;

    /// Build a live instance with tier-appropriate settings
    fn create(
        &self,
        settings: &EffectSettings,
        context: &EffectContext,
    ) -> Result<Box<dyn Effect>, EffectError>;
}

/// Shared guard for definitions receiving settings of the wrong kind
pub(crate) fn settings_mismatch(kind: EffectKind, settings: &EffectSettings) -> EffectError {
    EffectError::Construction {
        kind: kind.class_name().to_string(),
        message: format!("expected {} settings, got {}", kind, settings.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare;
    impl Effect for Bare {}

    struct Pausable {
        paused: bool,
    }

    impl Suspend for Pausable {
        fn pause(&mut self, _now_ms: f64) -> Result<(), EffectError> {
            self.paused = true;
            Ok(())
        }

        fn resume(&mut self, _now_ms: f64) -> Result<(), EffectError> {
            self.paused = false;
            Ok(())
        }
    }

    impl Effect for Pausable {
        fn suspender(&mut self) -> Option<&mut dyn Suspend> {
            Some(self)
        }
    }

    #[test]
    fn test_bare_effect_has_no_capabilities() {
        let mut effect = Bare;
        assert_eq!(effect.capabilities(), Capabilities::default());
        assert!(effect.on_frame(0.0).is_ok());
    }

    #[test]
    fn test_capabilities_reflect_views() {
        let mut effect = Pausable { paused: false };
        let caps = effect.capabilities();
        assert!(caps.suspend);
        assert!(!caps.dispose);
        assert!(!caps.throttle);

        if let Some(s) = effect.suspender() {
            s.pause(0.0).unwrap();
        }
        assert!(effect.paused);
    }
}
