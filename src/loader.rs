//! Progressive loader
//!
//! Activation happens in stages: Basic (static presentation, always),
//! Enhanced (kinetic text) and Advanced (velocity spawner and custom
//! cursor). Each stage is gated by the device profile and the stage never
//! moves backwards. Effect failures stay local to the effect: the stage
//! records which gates passed, the report records what actually loaded.

use std::cell::Cell;
use std::rc::Rc;

use futures_util::future;
use serde::Serialize;

use crate::device::DeviceProfile;
use crate::effects::{EffectCatalog, EffectContent, EffectContext, EffectKind, EffectManager, EffectSettings};
use crate::error::LoadError;
use crate::host::{Clock, Page, PresentationMode, ScriptLoader};
use crate::settings::ScriptLocators;
use crate::telemetry::{emit, NullSink, TelemetryEvent, TelemetrySink};

/// Loading stage, ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LoadStage {
    Basic,
    Enhanced,
    Advanced,
}

impl LoadStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStage::Basic => "basic",
            LoadStage::Enhanced => "enhanced",
            LoadStage::Advanced => "advanced",
        }
    }

    fn presentation_mode(&self) -> PresentationMode {
        match self {
            LoadStage::Basic => PresentationMode::CssOnly,
            LoadStage::Enhanced => PresentationMode::Enhanced,
            LoadStage::Advanced => PresentationMode::Advanced,
        }
    }
}

impl std::fmt::Display for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one effect during loading
#[derive(Debug, Clone, PartialEq)]
pub enum EffectOutcome {
    Loaded,
    /// Disabled for this profile, or the manager was already torn down
    Skipped,
    Failed(LoadError),
}

/// Result of one loader run
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub stage: LoadStage,
    pub loaded: Vec<EffectKind>,
    pub skipped: Vec<EffectKind>,
    pub failed: Vec<(EffectKind, LoadError)>,
}

impl LoadReport {
    fn new(stage: LoadStage) -> Self {
        Self {
            stage,
            loaded: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }

    fn record(&mut self, kind: EffectKind, outcome: EffectOutcome) {
        match outcome {
            EffectOutcome::Loaded => self.loaded.push(kind),
            EffectOutcome::Skipped => self.skipped.push(kind),
            EffectOutcome::Failed(error) => self.failed.push((kind, error)),
        }
    }
}

pub struct ProgressiveLoader {
    profile: DeviceProfile,
    manager: Rc<EffectManager>,
    catalog: Rc<EffectCatalog>,
    page: Rc<dyn Page>,
    scripts: Rc<dyn ScriptLoader>,
    clock: Rc<dyn Clock>,
    sink: Rc<dyn TelemetrySink>,
    locators: ScriptLocators,
    content: EffectContent,
    seed: u64,
    stage: Cell<Option<LoadStage>>,
}

impl ProgressiveLoader {
    pub fn new(
        profile: DeviceProfile,
        manager: Rc<EffectManager>,
        catalog: Rc<EffectCatalog>,
        page: Rc<dyn Page>,
        scripts: Rc<dyn ScriptLoader>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Self {
            profile,
            manager,
            catalog,
            page,
            scripts,
            clock,
            sink: Rc::new(NullSink),
            locators: ScriptLocators::default(),
            content: EffectContent::default(),
            seed: 0,
            stage: Cell::new(None),
        }
    }

    pub fn with_sink(mut self, sink: Rc<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_locators(mut self, locators: ScriptLocators) -> Self {
        self.locators = locators;
        self
    }

    pub fn with_content(mut self, content: EffectContent) -> Self {
        self.content = content;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Highest stage entered so far; `None` before [`apply_basic`](Self::apply_basic)
    pub fn stage(&self) -> Option<LoadStage> {
        self.stage.get()
    }

    /// Enter the Basic stage synchronously
    pub fn apply_basic(&self) {
        self.enter(LoadStage::Basic);
    }

    /// Run every stage the profile allows
    ///
    /// Basic is applied before the first suspension point, so the page is
    /// usable even if the returned future is never polled to completion.
    pub async fn run(&self) -> LoadReport {
        self.apply_basic();
        let mut report = LoadReport::new(LoadStage::Basic);

        if !self.profile.supports_enhanced() {
            return self.finish(report);
        }
        self.enter(LoadStage::Enhanced);
        report.stage = LoadStage::Enhanced;
        let outcome = self.load_effect(EffectKind::KineticText).await;
        report.record(EffectKind::KineticText, outcome);

        if !self.profile.supports_advanced() {
            return self.finish(report);
        }
        self.enter(LoadStage::Advanced);
        report.stage = LoadStage::Advanced;
        let (spawner, cursor) = future::join(
            self.load_effect(EffectKind::VelocitySpawner),
            self.load_effect(EffectKind::CustomCursor),
        )
        .await;
        report.record(EffectKind::VelocitySpawner, spawner);
        report.record(EffectKind::CustomCursor, cursor);

        self.finish(report)
    }

    /// Gate, fetch, build and register one effect
    pub async fn load_effect(&self, kind: EffectKind) -> EffectOutcome {
        if !self.profile.should_enable(kind) {
            tracing::debug!(target: "adaptive_fx::loader", effect = %kind, "Effect disabled for this device");
            return EffectOutcome::Skipped;
        }

        let locator = self.locators.locator(kind);
        if let Err(error) = self.scripts.load(locator).await {
            tracing::warn!(
                target: "adaptive_fx::loader",
                effect = %kind,
                locator,
                error = %error,
                "Effect unavailable"
            );
            return EffectOutcome::Failed(error);
        }

        let settings = EffectSettings::lookup(kind, self.profile.tier());
        let context = EffectContext {
            page: self.page.clone(),
            now_ms: self.clock.now_ms(),
            content: self.content.clone(),
            seed: self.seed.wrapping_add(kind as u64),
        };

        let effect = match self.catalog.instantiate(kind, &settings, &context) {
            Ok(effect) => effect,
            Err(error) => {
                tracing::warn!(
                    target: "adaptive_fx::loader",
                    effect = %kind,
                    error = %error,
                    "Effect failed to initialize"
                );
                return EffectOutcome::Failed(error);
            }
        };

        if self.manager.register(kind.instance_name(), effect) {
            tracing::debug!(target: "adaptive_fx::loader", effect = %kind, "Effect loaded");
            EffectOutcome::Loaded
        } else {
            EffectOutcome::Skipped
        }
    }

    fn enter(&self, stage: LoadStage) {
        if self.stage.get().is_some_and(|current| current >= stage) {
            return;
        }
        self.stage.set(Some(stage));
        self.page.set_presentation_mode(stage.presentation_mode());
        tracing::debug!(target: "adaptive_fx::loader", stage = %stage, "Stage entered");
    }

    fn finish(&self, report: LoadReport) -> LoadReport {
        let tier = self.profile.tier();
        tracing::info!(
            target: "adaptive_fx::loader",
            stage = %report.stage,
            tier = %tier,
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "Effects loaded"
        );
        emit(
            self.sink.as_ref(),
            TelemetryEvent::new("effects_loaded")
                .with("stage", report.stage.as_str())
                .with("tier", tier.as_str()),
        );
        report
    }
}
