//! End-to-end lifecycle tests: registry semantics, staged loading on
//! constrained devices and targeted error isolation.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use adaptive_fx::device::{EnvironmentSignals, PerformanceTier};
use adaptive_fx::effects::{Dispose, Effect, EffectManager, LifecycleFailure, LifecycleOp, Suspend};
use adaptive_fx::error::EffectError;
use adaptive_fx::host::{BundledScripts, HeadlessPage, ManualClock, PageEvent};
use adaptive_fx::isolation::{Disposition, ErrorEvent};
use adaptive_fx::loader::LoadStage;
use adaptive_fx::settings::RuntimeSettings;
use adaptive_fx::telemetry::MemorySink;
use adaptive_fx::{EffectApp, HostServices};

#[derive(Default)]
struct Counts {
    destroyed: Cell<u32>,
    paused: Cell<u32>,
}

enum Behaviour {
    Healthy,
    FailingDestroy,
    PanickingDestroy,
}

struct Probe {
    counts: Rc<Counts>,
    behaviour: Behaviour,
}

impl Probe {
    fn boxed(counts: &Rc<Counts>, behaviour: Behaviour) -> Box<dyn Effect> {
        Box::new(Self {
            counts: counts.clone(),
            behaviour,
        })
    }
}

impl Dispose for Probe {
    fn destroy(&mut self) -> Result<(), EffectError> {
        self.counts.destroyed.set(self.counts.destroyed.get() + 1);
        match self.behaviour {
            Behaviour::Healthy => Ok(()),
            Behaviour::FailingDestroy => Err(EffectError::hook("destroy", "listener already gone")),
            Behaviour::PanickingDestroy => panic!("CustomCursor destroy exploded"),
        }
    }
}

impl Suspend for Probe {
    fn pause(&mut self, _now_ms: f64) -> Result<(), EffectError> {
        self.counts.paused.set(self.counts.paused.get() + 1);
        Ok(())
    }

    fn resume(&mut self, _now_ms: f64) -> Result<(), EffectError> {
        Ok(())
    }
}

impl Effect for Probe {
    fn disposer(&mut self) -> Option<&mut dyn Dispose> {
        Some(self)
    }

    fn suspender(&mut self) -> Option<&mut dyn Suspend> {
        Some(self)
    }
}

fn manager() -> EffectManager {
    EffectManager::new(Rc::new(ManualClock::new(0.0)))
}

fn mobile(cores: u32) -> EnvironmentSignals {
    EnvironmentSignals {
        user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148".to_string(),
        viewport_width: 390,
        max_touch_points: 5,
        hardware_concurrency: Some(cores),
        device_memory_gb: Some(4.0),
        ..Default::default()
    }
}

fn app_for(signals: &EnvironmentSignals) -> (EffectApp, Rc<HeadlessPage>, Rc<MemorySink>) {
    let page = Rc::new(HeadlessPage::new());
    let sink = Rc::new(MemorySink::new());
    let host = HostServices::new(
        page.clone(),
        Rc::new(BundledScripts::new()),
        Rc::new(ManualClock::new(0.0)),
    )
    .with_telemetry(sink.clone());
    (EffectApp::new(signals, host, RuntimeSettings::default()), page, sink)
}

#[test]
fn destroy_twice_is_harmless() {
    let manager = manager();
    let counts = Rc::new(Counts::default());
    manager.register("kinetic", Probe::boxed(&counts, Behaviour::Healthy));

    assert!(manager.destroy("kinetic"));
    assert!(!manager.contains("kinetic"));
    assert!(!manager.destroy("kinetic"));
    assert!(!manager.contains("kinetic"));
    assert_eq!(counts.destroyed.get(), 1);
}

#[test]
fn destroy_all_survives_failing_instances() {
    let manager = manager();
    let failures: Rc<RefCell<Vec<LifecycleFailure>>> = Rc::default();
    {
        let failures = failures.clone();
        manager.set_failure_hook(move |failure| failures.borrow_mut().push(failure.clone()));
    }

    let healthy = Rc::new(Counts::default());
    let failing = Rc::new(Counts::default());
    let panicking = Rc::new(Counts::default());
    manager.register("a", Probe::boxed(&healthy, Behaviour::Healthy));
    manager.register("b", Probe::boxed(&failing, Behaviour::FailingDestroy));
    manager.register("c", Probe::boxed(&panicking, Behaviour::PanickingDestroy));
    manager.register("d", Probe::boxed(&healthy, Behaviour::Healthy));

    manager.destroy_all();

    assert!(manager.is_empty());
    assert_eq!(healthy.destroyed.get(), 2);
    assert_eq!(failing.destroyed.get(), 1);
    assert_eq!(panicking.destroyed.get(), 1);

    let failures = failures.borrow();
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|f| f.operation == LifecycleOp::Destroy));
    assert!(matches!(failures[1].error, EffectError::Panicked { .. }));
}

#[test]
fn re_register_destroys_previous_instance() {
    let manager = manager();
    let first = Rc::new(Counts::default());
    let second = Rc::new(Counts::default());
    manager.register("spawner", Probe::boxed(&first, Behaviour::Healthy));
    manager.register("spawner", Probe::boxed(&second, Behaviour::Healthy));

    assert_eq!(first.destroyed.get(), 1);
    assert_eq!(second.destroyed.get(), 0);
    assert_eq!(manager.len(), 1);
}

#[test]
fn hidden_page_pauses_every_instance() {
    let manager = manager();
    let counts = Rc::new(Counts::default());
    manager.register("a", Probe::boxed(&counts, Behaviour::Healthy));
    manager.register("b", Probe::boxed(&counts, Behaviour::Healthy));

    manager.handle_page_event(PageEvent::Hidden);
    assert_eq!(counts.paused.get(), 2);

    manager.handle_page_event(PageEvent::Unload);
    assert!(manager.is_empty());
    assert_eq!(counts.destroyed.get(), 2);
}

#[test]
fn low_end_mobile_stays_basic() {
    let signals = mobile(2);
    let (mut app, page, sink) = app_for(&signals);
    assert_eq!(app.profile().tier(), PerformanceTier::Low);
    assert!(!app.profile().supports_enhanced());

    let report = pollster::block_on(app.start());
    assert_eq!(report.stage, LoadStage::Basic);
    assert!(app.manager().is_empty());
    assert_eq!(page.live_nodes(), 0);

    let events = sink.events_named("effects_loaded");
    assert_eq!(events[0].get("stage"), Some(&serde_json::Value::from("basic")));
    assert_eq!(events[0].get("tier"), Some(&serde_json::Value::from("low")));
}

#[test]
fn capable_mobile_stops_at_enhanced() {
    let signals = mobile(6);
    let (mut app, _page, _sink) = app_for(&signals);
    assert_eq!(app.profile().tier(), PerformanceTier::Low);
    assert!(app.profile().supports_enhanced());

    let report = pollster::block_on(app.start());
    assert_eq!(report.stage, LoadStage::Enhanced);
    assert_eq!(app.manager().names(), vec!["kinetic"]);
}

#[test]
fn kinetic_error_destroys_only_kinetic() {
    let (app, _page, _sink) = app_for(&EnvironmentSignals::default());
    let kinetic = Rc::new(Counts::default());
    let cursor = Rc::new(Counts::default());
    app.manager().register("kinetic", Probe::boxed(&kinetic, Behaviour::Healthy));
    app.manager().register("cursor", Probe::boxed(&cursor, Behaviour::Healthy));

    let before = app.isolation().error_count();
    let outcome = app.report_error(&ErrorEvent::runtime(
        "Uncaught TypeError: KineticTypography.rotate is not a function",
    ));

    assert_eq!(
        outcome,
        Disposition::Isolated {
            destroyed: vec!["kinetic".to_string()]
        }
    );
    assert_eq!(kinetic.destroyed.get(), 1);
    assert_eq!(app.isolation().error_count(), before + 1);
    assert_eq!(cursor.destroyed.get(), 0);
    assert!(app.manager().contains("cursor"));
}

#[test]
fn unrelated_errors_pass_through() {
    let (app, _page, sink) = app_for(&EnvironmentSignals::default());
    let outcome = app.report_error(&ErrorEvent::promise("fetch failed: 503"));
    assert_eq!(outcome, Disposition::Ignored);
    assert_eq!(app.isolation().error_count(), 0);
    assert!(sink.events_named("exception").is_empty());
}
