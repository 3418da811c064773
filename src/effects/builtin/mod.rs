//! Built-in effects
//!
//! The three effects that ship with adaptive-fx. Each one is a headless
//! state machine that talks to the page only through [`Page`](crate::host::Page).

mod custom_cursor;
mod kinetic_text;
mod velocity_spawner;

pub use custom_cursor::{CustomCursor, CustomCursorDefinition};
pub use kinetic_text::{KineticPhase, KineticText, KineticTextDefinition};
pub use velocity_spawner::{VelocitySpawner, VelocitySpawnerDefinition, IMAGE_LIFETIME_MS};

use super::EffectCatalog;

/// Register all built-in effects with the catalog
pub fn register_builtin_effects(catalog: &mut EffectCatalog) {
    catalog.register(KineticTextDefinition);
    catalog.register(VelocitySpawnerDefinition);
    catalog.register(CustomCursorDefinition);
}
