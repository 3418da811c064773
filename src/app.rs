//! Application composition root
//!
//! Builds every service explicitly and wires them together: classifier,
//! manager, loader, monitor and error isolation share the host's clock,
//! page and telemetry sink. Nothing here is global; dropping the app after
//! [`EffectApp::teardown`] releases everything.

use std::rc::Rc;

use serde::Serialize;

use crate::device::{DeviceProfile, EnvironmentSignals, PerformanceTier};
use crate::effects::{EffectCatalog, EffectManager};
use crate::host::{Clock, MemoryProbe, Page, PageEvent, PageInput, ScriptLoader};
use crate::isolation::{record_lifecycle, Disposition, ErrorEvent, ErrorIsolation, ErrorReport};
use crate::loader::{LoadReport, LoadStage, ProgressiveLoader};
use crate::settings::RuntimeSettings;
use crate::telemetry::{NullSink, PerformanceMonitor, PerformanceReport, TelemetrySink};

/// Collaborators supplied by the embedding page
pub struct HostServices {
    pub page: Rc<dyn Page>,
    pub scripts: Rc<dyn ScriptLoader>,
    pub clock: Rc<dyn Clock>,
    /// Heap introspection, if the platform has it
    pub memory: Option<Box<dyn MemoryProbe>>,
    pub telemetry: Rc<dyn TelemetrySink>,
}

impl HostServices {
    pub fn new(page: Rc<dyn Page>, scripts: Rc<dyn ScriptLoader>, clock: Rc<dyn Clock>) -> Self {
        Self {
            page,
            scripts,
            clock,
            memory: None,
            telemetry: Rc::new(NullSink),
        }
    }

    pub fn with_memory(mut self, probe: impl MemoryProbe + 'static) -> Self {
        self.memory = Some(Box::new(probe));
        self
    }

    pub fn with_telemetry(mut self, sink: Rc<dyn TelemetrySink>) -> Self {
        self.telemetry = sink;
        self
    }
}

/// Snapshot of the whole session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppReport {
    pub stage: Option<LoadStage>,
    pub tier: PerformanceTier,
    pub effects: Vec<String>,
    pub performance: PerformanceReport,
    pub errors: ErrorReport,
}

pub struct EffectApp {
    profile: DeviceProfile,
    clock: Rc<dyn Clock>,
    manager: Rc<EffectManager>,
    loader: ProgressiveLoader,
    monitor: PerformanceMonitor,
    isolation: ErrorIsolation,
    load_report: Option<LoadReport>,
}

impl EffectApp {
    pub fn new(signals: &EnvironmentSignals, host: HostServices, settings: RuntimeSettings) -> Self {
        let profile = DeviceProfile::classify(signals);
        let clock = host.clock.clone();
        let manager = Rc::new(EffectManager::new(clock.clone()));

        let isolation = ErrorIsolation::new(
            manager.clone(),
            host.telemetry.clone(),
            clock.clone(),
            settings.isolation.clone(),
        );

        {
            let log = isolation.log();
            let clock = clock.clone();
            manager.set_failure_hook(move |failure| record_lifecycle(&log, clock.as_ref(), failure));
        }

        let memory = host
            .memory
            .filter(|_| profile.features.memory_introspection);
        let log = isolation.log();
        let monitor = PerformanceMonitor::new(
            manager.clone(),
            clock.clone(),
            memory,
            host.telemetry.clone(),
            settings.monitor.clone(),
        )
        .with_error_counter(move || log.borrow().len());

        let loader = ProgressiveLoader::new(
            profile.clone(),
            manager.clone(),
            Rc::new(EffectCatalog::with_builtins()),
            host.page.clone(),
            host.scripts.clone(),
            clock.clone(),
        )
        .with_sink(host.telemetry.clone())
        .with_locators(settings.scripts.clone())
        .with_content(settings.content.clone())
        .with_seed(clock.now_ms().to_bits());

        tracing::info!(
            target: "adaptive_fx::app",
            tier = %profile.tier(),
            enhanced = profile.supports_enhanced(),
            advanced = profile.supports_advanced(),
            "Effect runtime created"
        );

        Self {
            profile,
            clock,
            manager,
            loader,
            monitor,
            isolation,
            load_report: None,
        }
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn manager(&self) -> &Rc<EffectManager> {
        &self.manager
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    pub fn isolation(&self) -> &ErrorIsolation {
        &self.isolation
    }

    pub fn load_report(&self) -> Option<&LoadReport> {
        self.load_report.as_ref()
    }

    /// Run the progressive loader to completion
    pub async fn start(&mut self) -> LoadReport {
        let report = self.loader.run().await;
        self.load_report = Some(report.clone());
        report
    }

    /// Drive effects and the frame-rate sampler for one animation frame
    pub fn on_animation_frame(&mut self) {
        self.manager.tick_all(self.clock.now_ms());
        self.monitor.on_animation_frame();
    }

    /// Host timer tick: captured panics, memory sampling, periodic report
    pub fn poll(&mut self) {
        self.isolation.drain_panics();
        self.monitor.poll();
    }

    pub fn on_page_event(&mut self, event: PageEvent) {
        self.manager.handle_page_event(event);
        if event == PageEvent::Visible {
            self.monitor.reset_frame_window();
        }
    }

    pub fn on_input(&self, input: &PageInput) {
        self.manager.dispatch_input(input);
    }

    /// Feed an uncaught error or rejection from the host's error bridge
    pub fn report_error(&self, event: &ErrorEvent) -> Disposition {
        self.isolation.handle(event)
    }

    /// Destroy every effect and refuse late registrations
    pub fn teardown(&mut self) {
        self.manager.teardown();
        tracing::info!(target: "adaptive_fx::app", "Effect runtime torn down");
    }

    pub fn report(&self) -> AppReport {
        AppReport {
            stage: self.loader.stage(),
            tier: self.profile.tier(),
            effects: self.manager.names(),
            performance: self.monitor.report(),
            errors: self.isolation.report(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{Effect, Suspend};
    use crate::error::EffectError;
    use crate::host::{BundledScripts, HeadlessPage, ManualClock, MemoryReading};
    use crate::isolation::{install_panic_hook, ErrorKind};
    use crate::telemetry::MemorySink;

    struct PanickyPause;

    impl Suspend for PanickyPause {
        fn pause(&mut self, _now_ms: f64) -> Result<(), EffectError> {
            panic!("CustomCursor pause failed")
        }

        fn resume(&mut self, _now_ms: f64) -> Result<(), EffectError> {
            Ok(())
        }
    }

    impl Effect for PanickyPause {
        fn suspender(&mut self) -> Option<&mut dyn Suspend> {
            Some(self)
        }
    }

    struct StaticProbe;

    impl MemoryProbe for StaticProbe {
        fn read(&self) -> Option<MemoryReading> {
            Some(MemoryReading {
                used_bytes: 40 * 1024 * 1024,
                total_bytes: 60 * 1024 * 1024,
                limit_bytes: 2048 * 1024 * 1024,
            })
        }
    }

    fn desktop() -> EnvironmentSignals {
        EnvironmentSignals {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0)".to_string(),
            viewport_width: 1680,
            hardware_concurrency: Some(10),
            device_memory_gb: Some(8.0),
            ..Default::default()
        }
    }

    fn build(signals: &EnvironmentSignals) -> (EffectApp, Rc<HeadlessPage>, ManualClock, Rc<MemorySink>) {
        let page = Rc::new(HeadlessPage::new());
        let clock = ManualClock::new(0.0);
        let sink = Rc::new(MemorySink::new());
        let host = HostServices::new(page.clone(), Rc::new(BundledScripts::new()), Rc::new(clock.clone()))
            .with_memory(StaticProbe)
            .with_telemetry(sink.clone());
        let app = EffectApp::new(signals, host, RuntimeSettings::default());
        (app, page, clock, sink)
    }

    #[test]
    fn test_full_session_leaves_nothing_behind() {
        let (mut app, page, clock, _sink) = build(&desktop());
        let report = pollster::block_on(app.start());
        assert_eq!(report.stage, LoadStage::Advanced);
        assert_eq!(app.manager().len(), 3);

        for _ in 0..120 {
            clock.advance(16.0);
            app.on_input(&PageInput::PointerMove {
                x: clock.now_ms(),
                y: 10.0,
                timestamp_ms: clock.now_ms(),
            });
            app.on_animation_frame();
        }
        assert!(page.live_nodes() > 0);
        assert!(page.live_listeners() > 0);

        app.on_page_event(PageEvent::Unload);
        assert!(app.manager().is_empty());
        assert_eq!(page.live_nodes(), 0);
        assert_eq!(page.live_listeners(), 0);
    }

    #[test]
    fn test_memory_probe_needs_platform_support() {
        let (mut app, _page, clock, _sink) = build(&desktop());
        clock.advance(5000.0);
        app.poll();
        assert!(app.monitor().memory_samples().is_empty());

        let mut signals = desktop();
        signals.features.memory_introspection = true;
        let (mut app, _page, clock, _sink) = build(&signals);
        clock.advance(5000.0);
        app.poll();
        assert_eq!(app.monitor().memory_samples().len(), 1);
    }

    #[test]
    fn test_visibility_round_trip() {
        let (mut app, _page, clock, _sink) = build(&desktop());
        pollster::block_on(app.start());

        app.on_page_event(PageEvent::Hidden);
        assert!(app.manager().is_paused());
        clock.advance(60_000.0);
        app.on_page_event(PageEvent::Visible);
        assert!(!app.manager().is_paused());

        // Time spent hidden does not count as a slow frame
        for _ in 0..60 {
            clock.advance(16.0);
            app.on_animation_frame();
        }
        assert_eq!(app.monitor().degradations(), 0);
    }

    #[test]
    fn test_effect_error_is_counted_in_report() {
        let (mut app, _page, _clock, _sink) = build(&desktop());
        pollster::block_on(app.start());

        let outcome = app.report_error(&ErrorEvent::runtime("CustomCursor: element detached"));
        assert_eq!(
            outcome,
            Disposition::Isolated {
                destroyed: vec!["cursor".to_string()]
            }
        );

        let report = app.report();
        assert_eq!(report.effects, vec!["kinetic", "spawner"]);
        assert_eq!(report.errors.total, 1);
        assert_eq!(report.performance.error_count, 1);
        assert_eq!(report.stage, Some(LoadStage::Advanced));
    }

    #[test]
    fn test_isolated_panic_is_recorded_once() {
        install_panic_hook();
        let (mut app, _page, _clock, _sink) = build(&desktop());
        app.poll();
        let before = app.isolation().error_count();
        app.manager().register("cursor", Box::new(PanickyPause));

        app.on_page_event(PageEvent::Hidden);
        assert_eq!(app.isolation().error_count(), before + 1);

        app.poll();
        assert_eq!(app.isolation().error_count(), before + 1);
        assert!(app.manager().contains("cursor"));
        let report = app.report();
        assert_eq!(report.errors.recent.last().map(|r| r.kind), Some(ErrorKind::Lifecycle));
    }

    #[test]
    fn test_uncaught_panic_is_handled_on_poll() {
        install_panic_hook();
        let (mut app, _page, _clock, _sink) = build(&desktop());
        app.poll();
        let before = app.isolation().error_count();
        app.manager().register("cursor", Box::new(PanickyPause));

        let caught = std::panic::catch_unwind(|| panic!("CustomCursor: render loop crashed"));
        assert!(caught.is_err());
        assert_eq!(app.isolation().error_count(), before);

        app.poll();
        assert_eq!(app.isolation().error_count(), before + 1);
        let report = app.report();
        assert_eq!(report.errors.recent.last().map(|r| r.kind), Some(ErrorKind::Runtime));
        assert!(!app.manager().contains("cursor"));
    }
}
