//! Velocity Image Spawner
//!
//! Spawns short-lived images along the pointer trail when the pointer moves
//! fast enough. Pointer samples are throttled, live images are capped, and
//! every image expires through the effect's [`Timeline`].

use std::collections::VecDeque;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::effects::traits::{
    settings_mismatch, Dispose, Effect, EffectContext, EffectDefinition, Suspend, Throttle,
};
use crate::effects::types::{EffectKind, EffectSettings, SpawnerSettings};
use crate::error::EffectError;
use crate::host::{NodeId, NodeTransform, Page, PageInput};
use crate::schedule::Timeline;

const NODE_CLASS: &str = "fx-spawned-image";

/// How long a spawned image stays on the page
pub const IMAGE_LIFETIME_MS: f64 = 1200.0;

/// Velocity image spawner definition
pub struct VelocitySpawnerDefinition;

impl EffectDefinition for VelocitySpawnerDefinition {
    fn kind(&self) -> EffectKind {
        EffectKind::VelocitySpawner
    }

    fn display_name(&self) -> &'static str {
        "Velocity Image Spawner"
    }

    fn create(
        &self,
        settings: &EffectSettings,
        context: &EffectContext,
    ) -> Result<Box<dyn Effect>, EffectError> {
        let EffectSettings::Spawner(settings) = settings else {
            return Err(settings_mismatch(self.kind(), settings));
        };
        let effect = VelocitySpawner::new(
            context.page.clone(),
            *settings,
            context.content.images.clone(),
            context.seed,
        )?;
        Ok(Box::new(effect))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Expire(NodeId),
}

#[derive(Debug, Clone, Copy)]
struct PointerSample {
    x: f64,
    y: f64,
    timestamp_ms: f64,
}

#[derive(Debug, Clone, Copy)]
struct SpawnedImage {
    node: NodeId,
    x: f64,
    y: f64,
}

pub struct VelocitySpawner {
    page: Rc<dyn Page>,
    settings: SpawnerSettings,
    images: Vec<String>,
    rng: StdRng,
    /// Oldest first
    live: VecDeque<SpawnedImage>,
    last_sample: Option<PointerSample>,
    last_velocity: f64,
    timeline: Timeline<Step>,
    paused: bool,
    alive: bool,
}

impl VelocitySpawner {
    pub fn new(
        page: Rc<dyn Page>,
        settings: SpawnerSettings,
        images: Vec<String>,
        seed: u64,
    ) -> Result<Self, EffectError> {
        if images.is_empty() {
            return Err(EffectError::Construction {
                kind: EffectKind::VelocitySpawner.class_name().to_string(),
                message: "image pool is empty".to_string(),
            });
        }

        Ok(Self {
            page,
            settings,
            images,
            rng: StdRng::seed_from_u64(seed),
            live: VecDeque::new(),
            last_sample: None,
            last_velocity: 0.0,
            timeline: Timeline::new(),
            paused: false,
            alive: true,
        })
    }

    pub fn settings(&self) -> SpawnerSettings {
        self.settings
    }

    pub fn live_images(&self) -> usize {
        self.live.len()
    }

    /// Velocity computed from the last two accepted samples
    pub fn last_velocity(&self) -> f64 {
        self.last_velocity
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    fn on_pointer(&mut self, x: f64, y: f64, timestamp_ms: f64) {
        let sample = PointerSample { x, y, timestamp_ms };
        let Some(previous) = self.last_sample else {
            self.last_sample = Some(sample);
            return;
        };

        let elapsed = timestamp_ms - previous.timestamp_ms;
        if elapsed < self.settings.throttle_ms || elapsed <= 0.0 {
            return;
        }

        let distance = (x - previous.x).hypot(y - previous.y);
        self.last_velocity = distance / elapsed * 10.0;
        self.last_sample = Some(sample);

        if self.last_velocity > self.settings.velocity_threshold
            && self.live.len() < self.settings.max_images
        {
            self.spawn(x, y, timestamp_ms);
        }
    }

    fn spawn(&mut self, x: f64, y: f64, now_ms: f64) {
        let source = &self.images[self.rng.random_range(0..self.images.len())];
        let node = self.page.create_node(NODE_CLASS);
        self.page.set_text(node, source);
        self.page.set_transform(
            node,
            NodeTransform {
                x,
                y,
                scale: self.rng.random_range(0.8..1.2),
                opacity: 1.0,
            },
        );
        self.live.push_back(SpawnedImage { node, x, y });
        self.timeline
            .schedule_after(now_ms, IMAGE_LIFETIME_MS, Step::Expire(node));
    }

    fn remove_image(&mut self, node: NodeId) {
        if let Some(index) = self.live.iter().position(|image| image.node == node) {
            self.live.remove(index);
            self.page.remove_node(node);
        }
    }

    fn trim_to(&mut self, max_images: usize) {
        while self.live.len() > max_images {
            if let Some(image) = self.live.pop_front() {
                self.page.remove_node(image.node);
            }
        }
    }
}

impl Effect for VelocitySpawner {
    fn kind(&self) -> Option<EffectKind> {
        Some(EffectKind::VelocitySpawner)
    }

    fn disposer(&mut self) -> Option<&mut dyn Dispose> {
        Some(self)
    }

    fn suspender(&mut self) -> Option<&mut dyn Suspend> {
        Some(self)
    }

    fn throttle(&mut self) -> Option<&mut dyn Throttle> {
        Some(self)
    }

    fn on_frame(&mut self, now_ms: f64) -> Result<(), EffectError> {
        if !self.alive {
            return Ok(());
        }
        while let Some(Step::Expire(node)) = self.timeline.next_due(now_ms) {
            self.remove_image(node);
        }
        Ok(())
    }

    fn on_input(&mut self, input: &PageInput) -> Result<(), EffectError> {
        if !self.alive || self.paused {
            return Ok(());
        }
        if let PageInput::PointerMove { x, y, timestamp_ms } = *input {
            self.on_pointer(x, y, timestamp_ms);
        }
        Ok(())
    }

    fn on_resize(&mut self, width: u32, height: u32) -> Result<(), EffectError> {
        if !self.alive {
            return Ok(());
        }
        let (width, height) = (f64::from(width), f64::from(height));
        let outside: Vec<NodeId> = self
            .live
            .iter()
            .filter(|image| image.x > width || image.y > height)
            .map(|image| image.node)
            .collect();
        for node in outside {
            self.remove_image(node);
        }
        Ok(())
    }
}

impl Suspend for VelocitySpawner {
    fn pause(&mut self, now_ms: f64) -> Result<(), EffectError> {
        self.paused = true;
        // A stale sample would turn the first move after resume into a jump
        self.last_sample = None;
        self.timeline.pause(now_ms);
        Ok(())
    }

    fn resume(&mut self, now_ms: f64) -> Result<(), EffectError> {
        self.paused = false;
        self.timeline.resume(now_ms);
        Ok(())
    }
}

impl Throttle for VelocitySpawner {
    fn set_velocity_threshold(&mut self, threshold: f64) {
        self.settings.velocity_threshold = threshold;
    }

    fn set_max_images(&mut self, max_images: usize) {
        self.settings.max_images = max_images;
        self.trim_to(max_images);
    }

    fn release_memory(&mut self) {
        self.trim_to(0);
    }
}

impl Dispose for VelocitySpawner {
    fn destroy(&mut self) -> Result<(), EffectError> {
        if !self.alive {
            return Ok(());
        }
        self.alive = false;
        self.timeline.cancel();
        self.trim_to(0);
        self.last_sample = None;
        Ok(())
    }
}
