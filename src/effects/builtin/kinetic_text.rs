//! Kinetic Text Effect
//!
//! Rotates through headline phrases: each phrase is displayed, then
//! cross-faded into the next one. Timing comes from the tier settings and is
//! driven entirely by the effect's own [`Timeline`].

use std::collections::VecDeque;
use std::rc::Rc;

use crate::effects::traits::{
    settings_mismatch, Dispose, Effect, EffectContext, EffectDefinition, Suspend,
};
use crate::effects::types::{EffectKind, EffectSettings, KineticSettings};
use crate::error::EffectError;
use crate::host::{NodeId, NodeTransform, Page};
use crate::schedule::Timeline;

const NODE_CLASS: &str = "fx-kinetic-text";

/// Kinetic text effect definition
pub struct KineticTextDefinition;

impl EffectDefinition for KineticTextDefinition {
    fn kind(&self) -> EffectKind {
        EffectKind::KineticText
    }

    fn display_name(&self) -> &'static str {
        "Kinetic Text"
    }

    fn create(
        &self,
        settings: &EffectSettings,
        context: &EffectContext,
    ) -> Result<Box<dyn Effect>, EffectError> {
        let EffectSettings::Kinetic(settings) = settings else {
            return Err(settings_mismatch(self.kind(), settings));
        };
        let effect = KineticText::new(
            context.page.clone(),
            *settings,
            context.content.phrases.clone(),
            context.now_ms,
        )?;
        Ok(Box::new(effect))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    BeginTransition,
    CompleteTransition,
}

/// Where the rotator is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KineticPhase {
    Display,
    Transition,
}

/// Runtime state of the kinetic text rotator
pub struct KineticText {
    page: Rc<dyn Page>,
    settings: KineticSettings,
    phrases: Vec<String>,
    index: usize,
    /// Oldest first; the back node holds the current (or incoming) phrase
    visible: VecDeque<NodeId>,
    phase: KineticPhase,
    transition_started_ms: f64,
    paused_at: Option<f64>,
    timeline: Timeline<Step>,
    alive: bool,
}

impl KineticText {
    pub fn new(
        page: Rc<dyn Page>,
        settings: KineticSettings,
        phrases: Vec<String>,
        now_ms: f64,
    ) -> Result<Self, EffectError> {
        if phrases.is_empty() {
            return Err(EffectError::Construction {
                kind: EffectKind::KineticText.class_name().to_string(),
                message: "no phrases to rotate".to_string(),
            });
        }

        let node = page.create_node(NODE_CLASS);
        page.set_text(node, &phrases[0]);

        let mut timeline = Timeline::new();
        if phrases.len() > 1 {
            timeline.schedule_after(now_ms, settings.display_duration_ms, Step::BeginTransition);
        }

        Ok(Self {
            page,
            settings,
            phrases,
            index: 0,
            visible: VecDeque::from([node]),
            phase: KineticPhase::Display,
            transition_started_ms: now_ms,
            paused_at: None,
            timeline,
            alive: true,
        })
    }

    pub fn current_phrase(&self) -> &str {
        &self.phrases[self.index]
    }

    pub fn phase(&self) -> KineticPhase {
        self.phase
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    fn next_index(&self) -> usize {
        (self.index + 1) % self.phrases.len()
    }

    fn begin_transition(&mut self, now_ms: f64) {
        let incoming = &self.phrases[self.next_index()];

        if self.visible.len() < self.settings.max_texts.max(1) {
            let node = self.page.create_node(NODE_CLASS);
            self.page.set_text(node, incoming);
            self.page.set_transform(
                node,
                NodeTransform {
                    opacity: 0.0,
                    ..NodeTransform::default()
                },
            );
            self.visible.push_back(node);
        } else if let Some(node) = self.visible.pop_front() {
            // No room for a second node: swap the text in place
            self.page.set_text(node, incoming);
            self.visible.push_back(node);
        }

        self.phase = KineticPhase::Transition;
        self.transition_started_ms = now_ms;
        self.timeline.schedule_after(
            now_ms,
            self.settings.transition_duration_ms,
            Step::CompleteTransition,
        );
    }

    fn complete_transition(&mut self, now_ms: f64) {
        self.index = self.next_index();
        while self.visible.len() > 1 {
            if let Some(node) = self.visible.pop_front() {
                self.page.remove_node(node);
            }
        }
        if let Some(&node) = self.visible.back() {
            self.page.set_transform(node, NodeTransform::default());
        }
        self.phase = KineticPhase::Display;
        self.timeline
            .schedule_after(now_ms, self.settings.display_duration_ms, Step::BeginTransition);
    }

    fn render_crossfade(&self, now_ms: f64) {
        let duration = self.settings.transition_duration_ms.max(1.0);
        let progress = ((now_ms - self.transition_started_ms) / duration).clamp(0.0, 1.0);
        let last = self.visible.len().saturating_sub(1);
        for (i, &node) in self.visible.iter().enumerate() {
            let opacity = if i == last { progress } else { 1.0 - progress };
            self.page.set_transform(
                node,
                NodeTransform {
                    y: (1.0 - opacity) * 12.0,
                    opacity,
                    ..NodeTransform::default()
                },
            );
        }
    }
}

impl Effect for KineticText {
    fn kind(&self) -> Option<EffectKind> {
        Some(EffectKind::KineticText)
    }

    fn disposer(&mut self) -> Option<&mut dyn Dispose> {
        Some(self)
    }

    fn suspender(&mut self) -> Option<&mut dyn Suspend> {
        Some(self)
    }

    fn on_frame(&mut self, now_ms: f64) -> Result<(), EffectError> {
        if !self.alive {
            return Ok(());
        }
        while let Some(step) = self.timeline.next_due(now_ms) {
            match step {
                Step::BeginTransition => self.begin_transition(now_ms),
                Step::CompleteTransition => self.complete_transition(now_ms),
            }
        }
        if self.phase == KineticPhase::Transition && !self.timeline.is_paused() {
            self.render_crossfade(now_ms);
        }
        Ok(())
    }
}

impl Suspend for KineticText {
    fn pause(&mut self, now_ms: f64) -> Result<(), EffectError> {
        if self.paused_at.is_none() {
            self.paused_at = Some(now_ms);
        }
        self.timeline.pause(now_ms);
        Ok(())
    }

    fn resume(&mut self, now_ms: f64) -> Result<(), EffectError> {
        // The crossfade origin moves with the timeline
        if let Some(paused_at) = self.paused_at.take() {
            self.transition_started_ms += (now_ms - paused_at).max(0.0);
        }
        self.timeline.resume(now_ms);
        Ok(())
    }
}

impl Dispose for KineticText {
    fn destroy(&mut self) -> Result<(), EffectError> {
        if !self.alive {
            return Ok(());
        }
        self.alive = false;
        self.timeline.cancel();
        for node in self.visible.drain(..) {
            self.page.remove_node(node);
        }
        Ok(())
    }
}
