//! Effects system for adaptive-fx
//!
//! This module provides the effect lifecycle core:
//! - A capability contract every effect implements (all capabilities optional)
//! - A catalog of effect definitions keyed by kind
//! - A manager owning live instances with isolated lifecycle control
//!
//! # Architecture
//!
//! - **Data types** (`types.rs`): EffectKind, the per-tier EffectSettings
//!   table, page content and throttle values
//! - **Traits** (`traits.rs`): Effect, its capability views and the
//!   EffectDefinition factory trait
//! - **Registry** (`registry.rs`): EffectCatalog of available definitions
//! - **Manager** (`manager.rs`): EffectManager, the name -> instance map
//! - **Builtin** (`builtin/`): kinetic text, velocity spawner, custom cursor
//!
//! # Usage
//!
//! ```ignore
//! let catalog = EffectCatalog::with_builtins();
//! let settings = EffectSettings::lookup(EffectKind::KineticText, profile.tier());
//! let effect = catalog.instantiate(EffectKind::KineticText, &settings, &context)?;
//!
//! let manager = EffectManager::new(clock);
//! manager.register("kinetic", effect);
//! manager.pause_all();
//! manager.destroy("kinetic");
//! ```

mod types;
mod traits;
mod registry;
mod manager;
pub mod builtin;

pub use types::*;
pub use traits::*;
pub use registry::*;
pub use manager::*;
