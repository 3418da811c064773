//! Custom Cursor Effect
//!
//! A cursor node that trails the pointer with exponential smoothing and
//! grows while an interactive element is hovered. Every hover listener is
//! recorded in a [`ListenerSet`] and released on destroy.

use std::rc::Rc;

use crate::effects::traits::{
    settings_mismatch, Dispose, Effect, EffectContext, EffectDefinition, Suspend,
};
use crate::effects::types::{CursorSettings, EffectKind, EffectSettings};
use crate::error::EffectError;
use crate::host::{EventKind, ListenerSet, NodeId, NodeTransform, Page, PageInput};
use crate::schedule::CancelToken;

const NODE_CLASS: &str = "fx-cursor";

/// Custom cursor definition
pub struct CustomCursorDefinition;

impl EffectDefinition for CustomCursorDefinition {
    fn kind(&self) -> EffectKind {
        EffectKind::CustomCursor
    }

    fn display_name(&self) -> &'static str {
        "Custom Cursor"
    }

    fn create(
        &self,
        settings: &EffectSettings,
        context: &EffectContext,
    ) -> Result<Box<dyn Effect>, EffectError> {
        let EffectSettings::Cursor(settings) = settings else {
            return Err(settings_mismatch(self.kind(), settings));
        };
        Ok(Box::new(CustomCursor::new(
            context.page.clone(),
            *settings,
            &context.content.hover_selectors,
        )))
    }
}

pub struct CustomCursor {
    page: Rc<dyn Page>,
    settings: CursorSettings,
    node: Option<NodeId>,
    listeners: ListenerSet,
    target: (f64, f64),
    position: (f64, f64),
    scale: f64,
    hovered: bool,
    paused: bool,
    token: CancelToken,
}

impl CustomCursor {
    pub fn new(page: Rc<dyn Page>, settings: CursorSettings, hover_selectors: &[String]) -> Self {
        let node = page.create_node(NODE_CLASS);

        let mut listeners = ListenerSet::new(page.clone());
        for selector in hover_selectors {
            listeners.add(selector, EventKind::MouseEnter);
            listeners.add(selector, EventKind::MouseLeave);
        }

        tracing::debug!(
            target: "adaptive_fx::effects",
            listeners = listeners.len(),
            "Custom cursor attached"
        );

        Self {
            page,
            settings,
            node: Some(node),
            listeners,
            target: (0.0, 0.0),
            position: (0.0, 0.0),
            scale: 1.0,
            hovered: false,
            paused: false,
            token: CancelToken::new(),
        }
    }

    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn is_hovered(&self) -> bool {
        self.hovered
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_alive(&self) -> bool {
        self.token.is_live()
    }

    fn render(&self) {
        if let Some(node) = self.node {
            self.page.set_transform(
                node,
                NodeTransform {
                    x: self.position.0,
                    y: self.position.1,
                    scale: self.scale,
                    opacity: 1.0,
                },
            );
        }
    }
}

impl Effect for CustomCursor {
    fn kind(&self) -> Option<EffectKind> {
        Some(EffectKind::CustomCursor)
    }

    fn disposer(&mut self) -> Option<&mut dyn Dispose> {
        Some(self)
    }

    fn suspender(&mut self) -> Option<&mut dyn Suspend> {
        Some(self)
    }

    fn on_frame(&mut self, _now_ms: f64) -> Result<(), EffectError> {
        if self.token.is_cancelled() || self.paused {
            return Ok(());
        }
        let smoothing = self.settings.smoothing.clamp(0.0, 1.0);
        self.position.0 += (self.target.0 - self.position.0) * smoothing;
        self.position.1 += (self.target.1 - self.position.1) * smoothing;

        let target_scale = if self.hovered {
            self.settings.hover_scale
        } else {
            1.0
        };
        self.scale += (target_scale - self.scale) * smoothing;
        self.render();
        Ok(())
    }

    fn on_input(&mut self, input: &PageInput) -> Result<(), EffectError> {
        if self.token.is_cancelled() {
            return Ok(());
        }
        match *input {
            PageInput::PointerMove { x, y, .. } => self.target = (x, y),
            PageInput::Hover { listener, entered } => {
                // Only react to listeners this cursor registered
                if self.listeners.find(listener).is_some() {
                    self.hovered = entered;
                }
            }
        }
        Ok(())
    }
}

impl Suspend for CustomCursor {
    fn pause(&mut self, _now_ms: f64) -> Result<(), EffectError> {
        self.paused = true;
        Ok(())
    }

    fn resume(&mut self, _now_ms: f64) -> Result<(), EffectError> {
        self.paused = false;
        // Jump straight to the pointer instead of gliding across the page
        self.position = self.target;
        Ok(())
    }
}

impl Dispose for CustomCursor {
    fn destroy(&mut self) -> Result<(), EffectError> {
        if self.token.is_cancelled() {
            return Ok(());
        }
        self.token.cancel();
        let released = self.listeners.release_all();
        if let Some(node) = self.node.take() {
            self.page.remove_node(node);
        }
        tracing::debug!(
            target: "adaptive_fx::effects",
            listeners = released,
            "Custom cursor detached"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HeadlessPage;

    fn cursor(page: &Rc<HeadlessPage>) -> CustomCursor {
        CustomCursor::new(
            page.clone(),
            CursorSettings {
                smoothing: 0.5,
                hover_scale: 2.0,
            },
            &["a".to_string(), "button".to_string()],
        )
    }

    #[test]
    fn test_follows_pointer_with_smoothing() {
        let page = Rc::new(HeadlessPage::new());
        let mut fx = cursor(&page);
        fx.on_input(&PageInput::PointerMove {
            x: 100.0,
            y: 40.0,
            timestamp_ms: 0.0,
        })
        .unwrap();

        fx.on_frame(16.0).unwrap();
        assert_eq!(fx.position(), (50.0, 20.0));
        fx.on_frame(32.0).unwrap();
        assert_eq!(fx.position(), (75.0, 30.0));

        let node = &page.nodes_with_class(NODE_CLASS)[0];
        assert_eq!(node.transform.x, 75.0);
    }

    #[test]
    fn test_hover_scales_cursor() {
        let page = Rc::new(HeadlessPage::new());
        let mut fx = cursor(&page);
        let (enter, _) = page.listeners_for("button")[0];

        fx.on_input(&PageInput::Hover {
            listener: enter,
            entered: true,
        })
        .unwrap();
        assert!(fx.is_hovered());
        fx.on_frame(16.0).unwrap();
        assert_eq!(fx.scale(), 1.5);

        // Foreign listener ids are ignored
        fx.on_input(&PageInput::Hover {
            listener: 9999,
            entered: false,
        })
        .unwrap();
        assert!(fx.is_hovered());
    }

    #[test]
    fn test_destroy_releases_every_listener() {
        let page = Rc::new(HeadlessPage::new());
        let mut fx = cursor(&page);
        assert_eq!(fx.listener_count(), 4);
        assert_eq!(page.live_listeners(), 4);
        assert_eq!(page.live_nodes(), 1);

        fx.destroy().unwrap();
        fx.destroy().unwrap();
        assert_eq!(page.live_listeners(), 0);
        assert_eq!(page.live_nodes(), 0);
        assert!(!fx.is_alive());
    }

    #[test]
    fn test_pause_freezes_position() {
        let page = Rc::new(HeadlessPage::new());
        let mut fx = cursor(&page);
        fx.on_input(&PageInput::PointerMove {
            x: 100.0,
            y: 0.0,
            timestamp_ms: 0.0,
        })
        .unwrap();
        fx.pause(0.0).unwrap();
        fx.on_frame(16.0).unwrap();
        assert_eq!(fx.position(), (0.0, 0.0));

        fx.resume(20.0).unwrap();
        assert_eq!(fx.position(), (100.0, 0.0));
    }
}
