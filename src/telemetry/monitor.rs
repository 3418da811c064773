//! Runtime performance monitor
//!
//! The host drives the monitor: `on_animation_frame` once per frame and
//! `poll` from a timer. Frame rate is flushed into a bounded ring every
//! window; a flush below the floor throttles every effect that accepts it.
//! Memory is sampled on its own interval when the platform exposes heap
//! readings, and a periodic report goes to the telemetry sink.

use std::cell::RefCell;
use std::rc::Rc;

use super::metrics::{MemorySample, MetricKind, PerformanceReport, PerformanceSample, SampleRing};
use super::sink::{emit, TelemetryEvent, TelemetrySink};
use crate::effects::EffectManager;
use crate::host::{Clock, MemoryProbe};
use crate::schedule::Interval;
use crate::settings::MonitorSettings;

type ErrorCounter = Box<dyn Fn() -> usize>;

pub struct PerformanceMonitor {
    manager: Rc<EffectManager>,
    clock: Rc<dyn Clock>,
    memory_probe: Option<Box<dyn MemoryProbe>>,
    sink: Rc<dyn TelemetrySink>,
    error_count: ErrorCounter,
    settings: MonitorSettings,

    frames: u32,
    /// Opened by the first animation frame
    window_start_ms: Option<f64>,
    frame_rates: SampleRing,
    memory: SampleRing,
    latest_memory: Option<MemorySample>,
    /// Shared with the manager's register hook
    load_times: Rc<RefCell<SampleRing>>,
    memory_interval: Interval,
    report_interval: Interval,
    degradations: usize,
}

impl PerformanceMonitor {
    /// Start monitoring `manager`
    ///
    /// Installs a register hook on the manager so every registration is
    /// recorded as a load-time sample measured from now.
    pub fn new(
        manager: Rc<EffectManager>,
        clock: Rc<dyn Clock>,
        memory_probe: Option<Box<dyn MemoryProbe>>,
        sink: Rc<dyn TelemetrySink>,
        settings: MonitorSettings,
    ) -> Self {
        let started_ms = clock.now_ms();
        let load_times = Rc::new(RefCell::new(SampleRing::unbounded()));

        {
            let load_times = load_times.clone();
            let clock = clock.clone();
            manager.add_register_hook(move |name| {
                let now = clock.now_ms();
                let elapsed = (now - started_ms).max(0.0);
                load_times.borrow_mut().push(PerformanceSample {
                    kind: MetricKind::LoadTime,
                    value: elapsed,
                    timestamp_ms: now,
                });
                tracing::debug!(
                    target: "adaptive_fx::monitor",
                    effect = name,
                    load_time_ms = elapsed,
                    "Effect load time recorded"
                );
            });
        }

        Self {
            manager,
            clock,
            memory_probe,
            sink,
            error_count: Box::new(|| 0),
            frames: 0,
            window_start_ms: None,
            frame_rates: SampleRing::bounded(settings.frame_buffer_capacity),
            memory: SampleRing::bounded(settings.memory_buffer_capacity),
            latest_memory: None,
            load_times,
            memory_interval: Interval::new(started_ms, settings.memory_sample_interval_ms),
            report_interval: Interval::new(started_ms, settings.report_interval_ms),
            degradations: 0,
            settings,
        }
    }

    /// Source of the error count included in reports
    pub fn with_error_counter(mut self, counter: impl Fn() -> usize + 'static) -> Self {
        self.error_count = Box::new(counter);
        self
    }

    /// Count one animation frame
    ///
    /// Returns the flushed frame rate when the window closed on this frame.
    /// The very first frame only opens the window, so time before rendering
    /// started never counts as a slow second.
    pub fn on_animation_frame(&mut self) -> Option<f64> {
        let now = self.clock.now_ms();
        let Some(window_start) = self.window_start_ms else {
            self.reset_frame_window();
            return None;
        };
        self.frames += 1;

        let elapsed = now - window_start;
        if elapsed < self.settings.frame_window_ms {
            return None;
        }

        let fps = f64::from(self.frames) * 1000.0 / elapsed;
        self.frame_rates.push(PerformanceSample {
            kind: MetricKind::FrameRate,
            value: fps,
            timestamp_ms: now,
        });
        self.frames = 0;
        self.window_start_ms = Some(now);

        if fps < self.settings.fps_floor {
            tracing::warn!(
                target: "adaptive_fx::monitor",
                fps,
                floor = self.settings.fps_floor,
                "Low frame rate, degrading effects"
            );
            self.manager.degrade(self.settings.throttle());
            self.degradations += 1;
        }

        Some(fps)
    }

    /// Run whichever timers are due
    pub fn poll(&mut self) {
        let now = self.clock.now_ms();

        if self.memory_probe.is_some() && self.memory_interval.fire(now) {
            self.sample_memory();
        }

        if self.report_interval.fire(now) {
            let report = self.report();
            emit(self.sink.as_ref(), report_event(&report));
        }
    }

    /// Take one memory sample now
    ///
    /// Returns `None` when the platform has no memory introspection.
    pub fn sample_memory(&mut self) -> Option<MemorySample> {
        let reading = self.memory_probe.as_ref()?.read()?;
        let now = self.clock.now_ms();
        let sample = MemorySample::from_reading(reading, now);

        self.memory.push(PerformanceSample {
            kind: MetricKind::Memory,
            value: sample.used_mb,
            timestamp_ms: now,
        });
        self.latest_memory = Some(sample);

        if sample.pressure() > self.settings.memory_pressure_ratio {
            tracing::warn!(
                target: "adaptive_fx::monitor",
                used_mb = sample.used_mb,
                limit_mb = sample.limit_mb,
                "Memory pressure, optimizing effects"
            );
            self.manager.optimize_memory();
        }

        Some(sample)
    }

    /// Restart the frame window, e.g. after the page was hidden
    pub fn reset_frame_window(&mut self) {
        self.frames = 0;
        self.window_start_ms = Some(self.clock.now_ms());
    }

    pub fn report(&self) -> PerformanceReport {
        let average_fps = self.frame_rates.average();
        let memory_used_mb = self.latest_memory.map(|m| m.used_mb);
        let memory_ok = memory_used_mb.map_or(true, |used| used < self.settings.performant_memory_mb);

        PerformanceReport {
            average_fps,
            memory_used_mb,
            load_time_ms: self.load_times.borrow().sum(),
            error_count: (self.error_count)(),
            is_performant: average_fps > self.settings.performant_fps && memory_ok,
        }
    }

    pub fn frame_rates(&self) -> &SampleRing {
        &self.frame_rates
    }

    pub fn memory_samples(&self) -> &SampleRing {
        &self.memory
    }

    pub fn load_time_samples(&self) -> usize {
        self.load_times.borrow().len()
    }

    /// How many flushes triggered degradation
    pub fn degradations(&self) -> usize {
        self.degradations
    }
}

fn report_event(report: &PerformanceReport) -> TelemetryEvent {
    TelemetryEvent::new("performance_report")
        .with("average_fps", report.average_fps)
        .with("memory_used_mb", report.memory_used_mb)
        .with("load_time_ms", report.load_time_ms)
        .with("error_count", report.error_count)
        .with("is_performant", report.is_performant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{Effect, Throttle};
    use crate::host::{Clock, ManualClock, MemoryReading};
    use crate::telemetry::MemorySink;
    use std::cell::Cell;

    #[derive(Default)]
    struct Recorded {
        threshold: Cell<Option<f64>>,
        max_images: Cell<Option<usize>>,
        released: Cell<u32>,
    }

    struct Throttled(Rc<Recorded>);

    impl Throttle for Throttled {
        fn set_velocity_threshold(&mut self, threshold: f64) {
            self.0.threshold.set(Some(threshold));
        }

        fn set_max_images(&mut self, max_images: usize) {
            self.0.max_images.set(Some(max_images));
        }

        fn release_memory(&mut self) {
            self.0.released.set(self.0.released.get() + 1);
        }
    }

    impl Effect for Throttled {
        fn throttle(&mut self) -> Option<&mut dyn Throttle> {
            Some(self)
        }
    }

    struct FixedProbe(MemoryReading);

    impl MemoryProbe for FixedProbe {
        fn read(&self) -> Option<MemoryReading> {
            Some(self.0)
        }
    }

    const MB: u64 = 1024 * 1024;

    type Fixture = (ManualClock, Rc<EffectManager>, Rc<MemorySink>, PerformanceMonitor);

    fn setup(probe: Option<Box<dyn MemoryProbe>>) -> Fixture {
        let clock = ManualClock::new(0.0);
        let manager = Rc::new(EffectManager::new(Rc::new(clock.clone())));
        let sink = Rc::new(MemorySink::new());
        let monitor = PerformanceMonitor::new(
            manager.clone(),
            Rc::new(clock.clone()),
            probe,
            sink.clone(),
            MonitorSettings::default(),
        );
        (clock, manager, sink, monitor)
    }

    /// Monitor whose frame window was opened by a first frame at t=0
    fn setup_rendering(probe: Option<Box<dyn MemoryProbe>>) -> Fixture {
        let (clock, manager, sink, mut monitor) = setup(probe);
        assert_eq!(monitor.on_animation_frame(), None);
        (clock, manager, sink, monitor)
    }

    /// Run `frames` frames evenly spread over one second
    fn run_second(clock: &ManualClock, monitor: &mut PerformanceMonitor, frames: u32) -> Option<f64> {
        let start = clock.now_ms();
        let mut flushed = None;
        for i in 1..=frames {
            clock.set(start + 1000.0 * f64::from(i) / f64::from(frames));
            flushed = monitor.on_animation_frame().or(flushed);
        }
        flushed
    }

    #[test]
    fn test_flush_computes_fps() {
        let (clock, _manager, _sink, mut monitor) = setup_rendering(None);
        let fps = run_second(&clock, &mut monitor, 60).unwrap();
        assert!((fps - 60.0).abs() < 0.5);
        assert_eq!(monitor.frame_rates().len(), 1);
        assert_eq!(monitor.degradations(), 0);
    }

    #[test]
    fn test_low_fps_degrades_throttleable_effects() {
        let (clock, manager, _sink, mut monitor) = setup_rendering(None);
        let recorded = Rc::new(Recorded::default());
        manager.register("spawner", Box::new(Throttled(recorded.clone())));

        run_second(&clock, &mut monitor, 20);
        assert_eq!(monitor.degradations(), 1);
        assert_eq!(recorded.threshold.get(), Some(15.0));
        assert_eq!(recorded.max_images.get(), Some(3));
    }

    #[test]
    fn test_memory_pressure_optimizes() {
        let probe = FixedProbe(MemoryReading {
            used_bytes: 90 * MB,
            total_bytes: 95 * MB,
            limit_bytes: 100 * MB,
        });
        let (clock, manager, _sink, mut monitor) = setup(Some(Box::new(probe)));
        let recorded = Rc::new(Recorded::default());
        manager.register("spawner", Box::new(Throttled(recorded.clone())));

        clock.advance(4999.0);
        monitor.poll();
        assert!(monitor.memory_samples().is_empty());

        clock.advance(1.0);
        monitor.poll();
        assert_eq!(monitor.memory_samples().len(), 1);
        assert_eq!(recorded.released.get(), 1);
    }

    #[test]
    fn test_no_probe_means_no_memory_samples() {
        let (clock, _manager, _sink, mut monitor) = setup(None);
        clock.advance(60_000.0);
        monitor.poll();
        assert!(monitor.sample_memory().is_none());
        assert!(monitor.memory_samples().is_empty());
        assert_eq!(monitor.report().memory_used_mb, None);
    }

    #[test]
    fn test_registrations_record_load_time() {
        let (clock, manager, _sink, monitor) = setup(None);
        clock.advance(120.0);
        manager.register("a", Box::new(Throttled(Rc::default())));
        clock.advance(30.0);
        manager.register("b", Box::new(Throttled(Rc::default())));

        assert_eq!(monitor.load_time_samples(), 2);
        assert_eq!(monitor.report().load_time_ms, 270.0);
    }

    #[test]
    fn test_report_is_emitted_and_failures_swallowed() {
        let (clock, _manager, sink, monitor) = setup_rendering(None);
        let mut monitor = monitor.with_error_counter(|| 4);
        for _ in 0..30 {
            run_second(&clock, &mut monitor, 60);
        }
        monitor.poll();

        let reports = sink.events_named("performance_report");
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].get("error_count"), Some(&serde_json::Value::from(4)));
        assert_eq!(reports[0].get("is_performant"), Some(&serde_json::Value::from(true)));

        sink.set_failing(true);
        clock.advance(30_000.0);
        monitor.poll();
        assert_eq!(sink.events_named("performance_report").len(), 1);
    }

    #[test]
    fn test_reset_frame_window_ignores_hidden_time() {
        let (clock, _manager, _sink, mut monitor) = setup(None);
        clock.advance(10_000.0);
        monitor.reset_frame_window();
        let fps = run_second(&clock, &mut monitor, 60).unwrap();
        assert!(fps > 59.0);
        assert_eq!(monitor.degradations(), 0);
    }

    #[test]
    fn test_startup_gap_is_not_a_slow_second() {
        let (clock, manager, _sink, mut monitor) = setup(None);
        let recorded = Rc::new(Recorded::default());
        manager.register("spawner", Box::new(Throttled(recorded.clone())));

        // Rendering starts five seconds after the monitor was built
        clock.advance(5000.0);
        assert_eq!(run_second(&clock, &mut monitor, 60), None);
        let fps = run_second(&clock, &mut monitor, 60).unwrap();

        assert!((fps - 60.0).abs() < 0.5);
        assert_eq!(monitor.degradations(), 0);
        assert!(recorded.threshold.get().is_none());
    }
}
