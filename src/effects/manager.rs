//! Effect manager - owns every live effect instance
//!
//! The manager is the single owner of the name -> instance map and gives
//! uniform lifecycle control (destroy / pause / resume / throttle) without
//! callers knowing effect-specific APIs.
//!
//! Every call into an effect is isolated: errors and panics are caught,
//! reported through the failure hook and never stop sibling effects.
//!
//! # Reentrancy
//!
//! While one of its hooks runs, an instance is checked out of the map and
//! no map borrow is held. A `destroy(name)` that arrives for a checked-out
//! instance (for example from an error handler running inside that hook) is
//! deferred and carried out as soon as the hook returns. Broadcasts iterate
//! over a snapshot of names, so instances may be added or removed mid-way.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use serde::Serialize;

use super::traits::{Capabilities, Effect};
use super::types::ThrottleSettings;
use crate::error::{panic_message, EffectError};
use crate::host::{Clock, PageEvent, PageInput};

/// The lifecycle operation that was running when an effect failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleOp {
    Destroy,
    Pause,
    Resume,
    Frame,
    Input,
    Resize,
    Throttle,
    ReleaseMemory,
}

impl LifecycleOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleOp::Destroy => "destroy",
            LifecycleOp::Pause => "pause",
            LifecycleOp::Resume => "resume",
            LifecycleOp::Frame => "frame",
            LifecycleOp::Input => "input",
            LifecycleOp::Resize => "resize",
            LifecycleOp::Throttle => "throttle",
            LifecycleOp::ReleaseMemory => "release_memory",
        }
    }
}

impl std::fmt::Display for LifecycleOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An isolated failure of one effect
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleFailure {
    pub name: String,
    pub operation: LifecycleOp,
    pub error: EffectError,
}

type FailureHook = Rc<dyn Fn(&LifecycleFailure)>;
type RegisterHook = Rc<dyn Fn(&str)>;

/// Central owner of live effect instances
pub struct EffectManager {
    clock: Rc<dyn Clock>,
    instances: RefCell<HashMap<String, Box<dyn Effect>>>,
    /// Names whose instance is currently running a hook
    checked_out: RefCell<HashSet<String>>,
    /// Checked-out names to destroy once their hook returns
    deferred_destroy: RefCell<HashSet<String>>,
    paused: Cell<bool>,
    torn_down: Cell<bool>,
    failure_hook: RefCell<Option<FailureHook>>,
    register_hooks: RefCell<Vec<RegisterHook>>,
}

impl EffectManager {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            instances: RefCell::new(HashMap::new()),
            checked_out: RefCell::new(HashSet::new()),
            deferred_destroy: RefCell::new(HashSet::new()),
            paused: Cell::new(false),
            torn_down: Cell::new(false),
            failure_hook: RefCell::new(None),
            register_hooks: RefCell::new(Vec::new()),
        }
    }

    /// Receive every isolated failure
    pub fn set_failure_hook(&self, hook: impl Fn(&LifecycleFailure) + 'static) {
        *self.failure_hook.borrow_mut() = Some(Rc::new(hook));
    }

    /// Observe every successful registration
    pub fn add_register_hook(&self, hook: impl Fn(&str) + 'static) {
        self.register_hooks.borrow_mut().push(Rc::new(hook));
    }

    /// Store `effect` under `name`
    ///
    /// A previous instance under the same name is destroyed first. After
    /// [`teardown`](Self::teardown) nothing is stored: the new instance is
    /// destroyed immediately and `false` is returned.
    pub fn register(&self, name: &str, effect: Box<dyn Effect>) -> bool {
        if self.torn_down.get() {
            tracing::debug!(
                target: "adaptive_fx::effects",
                effect = name,
                "Registration after teardown, destroying instance"
            );
            self.run_destroy(name, effect);
            return false;
        }

        let previous = self.instances.borrow_mut().remove(name);
        if self.checked_out.borrow().contains(name) {
            self.deferred_destroy.borrow_mut().insert(name.to_string());
        }
        if let Some(previous) = previous {
            tracing::warn!(
                target: "adaptive_fx::effects",
                effect = name,
                "Effect re-registered, destroying previous instance"
            );
            self.run_destroy(name, previous);
        }

        self.instances.borrow_mut().insert(name.to_string(), effect);
        tracing::debug!(target: "adaptive_fx::effects", effect = name, "Effect registered");

        if self.paused.get() {
            let now = self.clock.now_ms();
            self.with_effect(name, LifecycleOp::Pause, |effect| match effect.suspender() {
                Some(suspender) => suspender.pause(now),
                None => Ok(()),
            });
        }

        let hooks: Vec<RegisterHook> = self.register_hooks.borrow().clone();
        for hook in hooks {
            hook(name);
        }
        true
    }

    /// Destroy and remove `name`; a no-op when absent
    ///
    /// Returns true when an instance was found. Safe to call repeatedly and
    /// from inside another effect's hook.
    pub fn destroy(&self, name: &str) -> bool {
        let mut found = false;

        if self.checked_out.borrow().contains(name) {
            self.deferred_destroy.borrow_mut().insert(name.to_string());
            found = true;
        }

        let effect = self.instances.borrow_mut().remove(name);
        if let Some(effect) = effect {
            self.run_destroy(name, effect);
            found = true;
        }
        found
    }

    /// Destroy every instance, isolating individual failures
    pub fn destroy_all(&self) {
        let names = self.all_names();
        tracing::debug!(target: "adaptive_fx::effects", count = names.len(), "Destroying all effects");
        for name in names {
            self.destroy(&name);
        }
    }

    /// Destroy everything and refuse further registrations
    pub fn teardown(&self) {
        self.torn_down.set(true);
        self.destroy_all();
    }

    pub fn pause_all(&self) {
        self.paused.set(true);
        let now = self.clock.now_ms();
        for name in self.names() {
            self.with_effect(&name, LifecycleOp::Pause, |effect| match effect.suspender() {
                Some(suspender) => suspender.pause(now),
                None => Ok(()),
            });
        }
    }

    pub fn resume_all(&self) {
        self.paused.set(false);
        let now = self.clock.now_ms();
        for name in self.names() {
            self.with_effect(&name, LifecycleOp::Resume, |effect| match effect.suspender() {
                Some(suspender) => suspender.resume(now),
                None => Ok(()),
            });
        }
    }

    /// Drive one animation frame through every instance
    pub fn tick_all(&self, now_ms: f64) {
        if self.paused.get() {
            return;
        }
        for name in self.names() {
            self.with_effect(&name, LifecycleOp::Frame, |effect| effect.on_frame(now_ms));
        }
    }

    pub fn dispatch_input(&self, input: &PageInput) {
        if self.paused.get() {
            return;
        }
        for name in self.names() {
            self.with_effect(&name, LifecycleOp::Input, |effect| effect.on_input(input));
        }
    }

    pub fn dispatch_resize(&self, width: u32, height: u32) {
        for name in self.names() {
            self.with_effect(&name, LifecycleOp::Resize, |effect| effect.on_resize(width, height));
        }
    }

    /// Push throttled limits into every instance exposing the hooks
    ///
    /// Returns how many instances were throttled.
    pub fn degrade(&self, throttle: ThrottleSettings) -> usize {
        let throttled = Cell::new(0usize);
        for name in self.names() {
            self.with_effect(&name, LifecycleOp::Throttle, |effect| {
                if let Some(hooks) = effect.throttle() {
                    hooks.set_velocity_threshold(throttle.velocity_threshold);
                    hooks.set_max_images(throttle.max_images);
                    throttled.set(throttled.get() + 1);
                }
                Ok(())
            });
        }
        tracing::info!(
            target: "adaptive_fx::effects",
            velocity_threshold = throttle.velocity_threshold,
            max_images = throttle.max_images,
            throttled = throttled.get(),
            "Effects degraded"
        );
        throttled.get()
    }

    /// Ask every instance to drop cached resources
    pub fn optimize_memory(&self) {
        for name in self.names() {
            self.with_effect(&name, LifecycleOp::ReleaseMemory, |effect| {
                if let Some(hooks) = effect.throttle() {
                    hooks.release_memory();
                }
                Ok(())
            });
        }
    }

    /// Route a page lifecycle signal
    pub fn handle_page_event(&self, event: PageEvent) {
        match event {
            PageEvent::Unload => self.teardown(),
            PageEvent::Hidden => self.pause_all(),
            PageEvent::Visible => self.resume_all(),
            PageEvent::Resize { width, height } => self.dispatch_resize(width, height),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.instances.borrow().contains_key(name) || self.checked_out.borrow().contains(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instances.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.instances.borrow().len() + self.checked_out.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_paused(&self) -> bool {
        self.paused.get()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.get()
    }

    /// Capabilities of a registered instance
    pub fn capabilities(&self, name: &str) -> Option<Capabilities> {
        self.instances
            .borrow_mut()
            .get_mut(name)
            .map(|effect| effect.capabilities())
    }

    fn all_names(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self.instances.borrow().keys().cloned().collect();
        names.extend(self.checked_out.borrow().iter().cloned());
        names.into_iter().collect()
    }

    /// Run `f` against a checked-out instance
    fn with_effect<F>(&self, name: &str, operation: LifecycleOp, f: F)
    where
        F: FnOnce(&mut dyn Effect) -> Result<(), EffectError>,
    {
        let Some(mut effect) = self.instances.borrow_mut().remove(name) else {
            return;
        };
        self.checked_out.borrow_mut().insert(name.to_string());

        let outcome = isolate(operation, || f(effect.as_mut()));

        self.checked_out.borrow_mut().remove(name);
        if let Err(error) = outcome {
            self.report_failure(name, operation, error);
        }

        let destroy_now = self.deferred_destroy.borrow_mut().remove(name);
        let superseded = self.instances.borrow().contains_key(name);
        if destroy_now || superseded {
            self.run_destroy(name, effect);
        } else {
            self.instances.borrow_mut().insert(name.to_string(), effect);
        }
    }

    fn run_destroy(&self, name: &str, mut effect: Box<dyn Effect>) {
        let outcome = match effect.disposer() {
            Some(disposer) => isolate(LifecycleOp::Destroy, || disposer.destroy()),
            None => Ok(()),
        };
        match outcome {
            Ok(()) => {
                tracing::debug!(target: "adaptive_fx::effects", effect = name, "Effect destroyed")
            }
            Err(error) => self.report_failure(name, LifecycleOp::Destroy, error),
        }
    }

    fn report_failure(&self, name: &str, operation: LifecycleOp, error: EffectError) {
        tracing::warn!(
            target: "adaptive_fx::effects",
            effect = name,
            operation = %operation,
            error = %error,
            "Effect failure isolated"
        );
        let hook = self.failure_hook.borrow().clone();
        if let Some(hook) = hook {
            hook(&LifecycleFailure {
                name: name.to_string(),
                operation,
                error,
            });
        }
    }
}

thread_local! {
    /// Nesting depth of hooks currently running under [`isolate`]
    static ISOLATION_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// True while an effect hook runs under the manager's panic boundary
///
/// A panic raised now is already caught and reported as a
/// [`LifecycleFailure`], so a process-wide panic hook must leave it alone.
pub fn in_isolated_hook() -> bool {
    ISOLATION_DEPTH.with(|depth| depth.get() > 0)
}

struct IsolationScope;

impl IsolationScope {
    fn enter() -> Self {
        ISOLATION_DEPTH.with(|depth| depth.set(depth.get() + 1));
        IsolationScope
    }
}

impl Drop for IsolationScope {
    fn drop(&mut self) {
        ISOLATION_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Run an effect hook, converting panics into errors
fn isolate<F>(operation: LifecycleOp, f: F) -> Result<(), EffectError>
where
    F: FnOnce() -> Result<(), EffectError>,
{
    let outcome = {
        let _scope = IsolationScope::enter();
        panic::catch_unwind(AssertUnwindSafe(f))
    };
    match outcome {
        Ok(result) => result,
        Err(payload) => Err(EffectError::Panicked {
            operation: operation.to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}
