//! Page collaborators
//!
//! The core never touches a real document. Everything it needs from the
//! embedding page (listeners, nodes, time, memory readings, script loading)
//! goes through the traits in this module, so the same code runs in a
//! browser bridge and in headless tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use futures_util::future::{self, LocalBoxFuture};
use serde::{Deserialize, Serialize};

use crate::error::LoadError;

pub type ListenerId = u64;
pub type NodeId = u64;

/// Event kinds an effect may subscribe to on page elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    MouseEnter,
    MouseLeave,
}

/// Page-wide presentation mode, applied as a root class by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PresentationMode {
    /// Static styling only, no scripted effects
    CssOnly,
    Enhanced,
    Advanced,
}

/// Visual state of a node owned by an effect
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeTransform {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub opacity: f64,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
            opacity: 1.0,
        }
    }
}

/// The embedding page as seen by effects and the loader
pub trait Page {
    /// Subscribe to `kind` on every element matching `selector`
    fn add_listener(&self, selector: &str, kind: EventKind) -> ListenerId;

    /// Release a subscription; unknown ids are ignored
    fn remove_listener(&self, id: ListenerId);

    /// Create a node carrying `class`
    fn create_node(&self, class: &str) -> NodeId;

    /// Remove a node; unknown ids are ignored
    fn remove_node(&self, id: NodeId);

    fn set_text(&self, node: NodeId, text: &str);

    fn set_transform(&self, node: NodeId, transform: NodeTransform);

    fn set_presentation_mode(&self, mode: PresentationMode);
}

/// One listener registration owned by an effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerBinding {
    pub selector: String,
    pub kind: EventKind,
    pub id: ListenerId,
}

/// Disposable list of every listener an effect registered
///
/// Dropping the effect without calling [`release_all`](Self::release_all)
/// would leak the registrations, so effects call it from their destroy path.
pub struct ListenerSet {
    page: Rc<dyn Page>,
    bindings: Vec<ListenerBinding>,
}

impl ListenerSet {
    pub fn new(page: Rc<dyn Page>) -> Self {
        Self {
            page,
            bindings: Vec::new(),
        }
    }

    pub fn add(&mut self, selector: &str, kind: EventKind) -> ListenerId {
        let id = self.page.add_listener(selector, kind);
        self.bindings.push(ListenerBinding {
            selector: selector.to_string(),
            kind,
            id,
        });
        id
    }

    pub fn find(&self, id: ListenerId) -> Option<&ListenerBinding> {
        self.bindings.iter().find(|binding| binding.id == id)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Remove every registration; returns how many were released
    pub fn release_all(&mut self) -> usize {
        let released = self.bindings.len();
        for binding in self.bindings.drain(..) {
            self.page.remove_listener(binding.id);
        }
        released
    }
}

/// Page lifecycle signals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PageEvent {
    Unload,
    Hidden,
    Visible,
    Resize { width: u32, height: u32 },
}

/// Pointer and hover input forwarded to effects
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PageInput {
    PointerMove { x: f64, y: f64, timestamp_ms: f64 },
    Hover { listener: ListenerId, entered: bool },
}

/// Monotonic time source in milliseconds
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Wall clock, measured from construction
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: web_time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: web_time::Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

/// Clock advanced by hand; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

/// Heap usage reading in bytes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryReading {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub limit_bytes: u64,
}

/// Heap introspection primitive; only present on some platforms
pub trait MemoryProbe {
    fn read(&self) -> Option<MemoryReading>;
}

/// Makes an effect implementation available for a resource locator
pub trait ScriptLoader {
    fn load<'a>(&'a self, locator: &'a str) -> LocalBoxFuture<'a, Result<(), LoadError>>;
}

/// Loader for implementations compiled into the binary
///
/// Every locator resolves immediately unless it was marked unavailable,
/// which lets hosts and tests simulate network failures.
#[derive(Debug, Default)]
pub struct BundledScripts {
    unavailable: RefCell<HashSet<String>>,
    requested: RefCell<Vec<String>>,
}

impl BundledScripts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_unavailable(&self, locator: impl Into<String>) {
        self.unavailable.borrow_mut().insert(locator.into());
    }

    /// Locators requested so far, in order
    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }
}

impl ScriptLoader for BundledScripts {
    fn load<'a>(&'a self, locator: &'a str) -> LocalBoxFuture<'a, Result<(), LoadError>> {
        self.requested.borrow_mut().push(locator.to_string());
        let result = if self.unavailable.borrow().contains(locator) {
            Err(LoadError::Script {
                locator: locator.to_string(),
                reason: "resource unavailable".to_string(),
            })
        } else {
            Ok(())
        };
        Box::pin(future::ready(result))
    }
}

/// A node held by [`HeadlessPage`]
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessNode {
    pub class: String,
    pub text: String,
    pub transform: NodeTransform,
}

#[derive(Debug, Default)]
struct HeadlessState {
    next_id: u64,
    listeners: BTreeMap<ListenerId, (String, EventKind)>,
    nodes: BTreeMap<NodeId, HeadlessNode>,
    mode: Option<PresentationMode>,
}

/// In-memory page used by the demo binary and tests
///
/// Tracks every live listener and node so leaks are observable.
#[derive(Debug, Default)]
pub struct HeadlessPage {
    state: RefCell<HeadlessState>,
}

impl HeadlessPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_listeners(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    pub fn live_nodes(&self) -> usize {
        self.state.borrow().nodes.len()
    }

    pub fn nodes_with_class(&self, class: &str) -> Vec<HeadlessNode> {
        self.state
            .borrow()
            .nodes
            .values()
            .filter(|node| node.class == class)
            .cloned()
            .collect()
    }

    pub fn listeners_for(&self, selector: &str) -> Vec<(ListenerId, EventKind)> {
        self.state
            .borrow()
            .listeners
            .iter()
            .filter(|(_, (sel, _))| sel == selector)
            .map(|(id, (_, kind))| (*id, *kind))
            .collect()
    }

    pub fn presentation_mode(&self) -> Option<PresentationMode> {
        self.state.borrow().mode
    }

    fn next_id(state: &mut HeadlessState) -> u64 {
        state.next_id += 1;
        state.next_id
    }
}

impl Page for HeadlessPage {
    fn add_listener(&self, selector: &str, kind: EventKind) -> ListenerId {
        let mut state = self.state.borrow_mut();
        let id = Self::next_id(&mut state);
        state.listeners.insert(id, (selector.to_string(), kind));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.state.borrow_mut().listeners.remove(&id);
    }

    fn create_node(&self, class: &str) -> NodeId {
        let mut state = self.state.borrow_mut();
        let id = Self::next_id(&mut state);
        state.nodes.insert(
            id,
            HeadlessNode {
                class: class.to_string(),
                text: String::new(),
                transform: NodeTransform::default(),
            },
        );
        id
    }

    fn remove_node(&self, id: NodeId) {
        self.state.borrow_mut().nodes.remove(&id);
    }

    fn set_text(&self, node: NodeId, text: &str) {
        if let Some(node) = self.state.borrow_mut().nodes.get_mut(&node) {
            node.text = text.to_string();
        }
    }

    fn set_transform(&self, node: NodeId, transform: NodeTransform) {
        if let Some(node) = self.state.borrow_mut().nodes.get_mut(&node) {
            node.transform = transform;
        }
    }

    fn set_presentation_mode(&self, mode: PresentationMode) {
        self.state.borrow_mut().mode = Some(mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_page_tracks_resources() {
        let page = HeadlessPage::new();
        let node = page.create_node("fx-image");
        let listener = page.add_listener("a", EventKind::MouseEnter);
        assert_eq!(page.live_nodes(), 1);
        assert_eq!(page.live_listeners(), 1);

        page.set_text(node, "hello");
        assert_eq!(page.nodes_with_class("fx-image")[0].text, "hello");

        page.remove_node(node);
        page.remove_listener(listener);
        page.remove_listener(listener);
        assert_eq!(page.live_nodes(), 0);
        assert_eq!(page.live_listeners(), 0);
    }

    #[test]
    fn test_listener_set_releases_everything() {
        let page = Rc::new(HeadlessPage::new());
        let mut set = ListenerSet::new(page.clone());
        let enter = set.add("a", EventKind::MouseEnter);
        set.add("a", EventKind::MouseLeave);
        set.add("button", EventKind::MouseEnter);
        assert_eq!(page.live_listeners(), 3);
        assert_eq!(set.find(enter).map(|b| b.kind), Some(EventKind::MouseEnter));

        assert_eq!(set.release_all(), 3);
        assert_eq!(page.live_listeners(), 0);
        assert_eq!(set.release_all(), 0);
    }

    #[test]
    fn test_manual_clock_is_shared() {
        let clock = ManualClock::new(10.0);
        let other = clock.clone();
        clock.advance(5.0);
        assert_eq!(other.now_ms(), 15.0);
    }

    #[test]
    fn test_bundled_scripts_fail_when_marked() {
        let scripts = BundledScripts::new();
        scripts.mark_unavailable("fx/cursor.js");

        assert!(pollster::block_on(scripts.load("fx/kinetic.js")).is_ok());
        let err = pollster::block_on(scripts.load("fx/cursor.js")).unwrap_err();
        assert!(matches!(err, LoadError::Script { .. }));
        assert_eq!(scripts.requested(), vec!["fx/kinetic.js", "fx/cursor.js"]);
    }
}
