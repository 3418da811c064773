//! Adaptive FX - headless demo session
//!
//! Runs the effect runtime against an in-memory page with a simulated
//! clock: staged loading, a few seconds of frames and pointer movement, a
//! visibility round-trip, an injected effect error, then teardown.

use std::path::PathBuf;
use std::rc::Rc;

use adaptive_fx::host::{BundledScripts, Clock, HeadlessPage, ManualClock, PageEvent, PageInput};
use adaptive_fx::isolation::install_panic_hook;
use adaptive_fx::telemetry::{init_logging, TracingSink};
use adaptive_fx::{EffectApp, EnvironmentSignals, ErrorEvent, HostServices, RuntimeSettings};

const FRAME_MS: f64 = 1000.0 / 60.0;

fn load_settings() -> RuntimeSettings {
    let Some(path) = std::env::var_os("ADAPTIVE_FX_SETTINGS").map(PathBuf::from) else {
        return RuntimeSettings::default();
    };
    match RuntimeSettings::load_from_file(&path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load settings from {}: {}", path.display(), e);
            RuntimeSettings::default()
        }
    }
}

fn run_frames(app: &mut EffectApp, clock: &ManualClock, frames: u32) {
    for frame in 0..frames {
        clock.advance(FRAME_MS);
        let t = f64::from(frame);
        app.on_input(&PageInput::PointerMove {
            x: 640.0 + (t * 0.15).sin() * 400.0,
            y: 360.0 + (t * 0.1).cos() * 200.0,
            timestamp_ms: clock.now_ms(),
        });
        app.on_animation_frame();
        app.poll();
    }
}

fn main() {
    let settings = load_settings();

    // Keep the guard alive for the program duration
    let _log_guard = match init_logging(&settings.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!("Adaptive FX v{}", env!("CARGO_PKG_VERSION"));
    install_panic_hook();

    let signals = EnvironmentSignals {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/131.0".to_string(),
        viewport_width: 1440,
        hardware_concurrency: Some(8),
        device_memory_gb: Some(8.0),
        ..Default::default()
    };

    let page = Rc::new(HeadlessPage::new());
    let clock = ManualClock::new(0.0);
    let host = HostServices::new(page.clone(), Rc::new(BundledScripts::new()), Rc::new(clock.clone()))
        .with_telemetry(Rc::new(TracingSink));

    let mut app = EffectApp::new(&signals, host, settings);
    let load = pollster::block_on(app.start());
    tracing::info!(stage = %load.stage, loaded = ?load.loaded, failed = load.failed.len(), "Loader finished");

    run_frames(&mut app, &clock, 180);

    app.on_page_event(PageEvent::Hidden);
    clock.advance(10_000.0);
    app.on_page_event(PageEvent::Visible);
    run_frames(&mut app, &clock, 120);

    app.report_error(&ErrorEvent::runtime("VelocityImageSpawner: image pool exhausted"));
    run_frames(&mut app, &clock, 60);

    match serde_json::to_string_pretty(&app.report()) {
        Ok(json) => tracing::info!(report = %json, "Session report"),
        Err(e) => tracing::warn!(error = %e, "Failed to serialize session report"),
    }

    app.on_page_event(PageEvent::Unload);
    tracing::info!(
        nodes = page.live_nodes(),
        listeners = page.live_listeners(),
        "Page resources after teardown"
    );
}
