//! Catalog of loadable effect definitions
//!
//! The catalog holds one definition per [`EffectKind`] and builds live
//! instances for the progressive loader. It knows nothing about which
//! instances are currently alive; that is the manager's job.

use std::collections::BTreeMap;
use std::rc::Rc;

use super::traits::{Effect, EffectContext, EffectDefinition};
use super::types::{EffectKind, EffectSettings};
use crate::error::LoadError;

/// Registry of available effect definitions
pub struct EffectCatalog {
    definitions: BTreeMap<EffectKind, Rc<dyn EffectDefinition>>,
}

impl Default for EffectCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self {
            definitions: BTreeMap::new(),
        }
    }

    /// Catalog with every built-in effect registered
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        super::builtin::register_builtin_effects(&mut catalog);
        catalog
    }

    /// Register a definition, replacing any previous one for the same kind
    pub fn register(&mut self, definition: impl EffectDefinition + 'static) {
        self.definitions.insert(definition.kind(), Rc::new(definition));
    }

    pub fn get(&self, kind: EffectKind) -> Option<Rc<dyn EffectDefinition>> {
        self.definitions.get(&kind).cloned()
    }

    pub fn contains(&self, kind: EffectKind) -> bool {
        self.definitions.contains_key(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = EffectKind> + '_ {
        self.definitions.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn display_name(&self, kind: EffectKind) -> Option<&'static str> {
        self.definitions.get(&kind).map(|def| def.display_name())
    }

    /// Build an instance of `kind`
    pub fn instantiate(
        &self,
        kind: EffectKind,
        settings: &EffectSettings,
        context: &EffectContext,
    ) -> Result<Box<dyn Effect>, LoadError> {
        let definition = self
            .get(kind)
            .ok_or_else(|| LoadError::UnknownEffect(kind.to_string()))?;
        Ok(definition.create(settings, context)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::PerformanceTier;
    use crate::effects::EffectContent;
    use crate::error::EffectError;
    use crate::host::HeadlessPage;

    struct MockEffect;
    impl Effect for MockEffect {}

    struct MockDefinition {
        kind: EffectKind,
        fail: bool,
    }

    impl EffectDefinition for MockDefinition {
        fn kind(&self) -> EffectKind {
            self.kind
        }

        fn display_name(&self) -> &'static str {
            "Mock"
        }

        fn create(
            &self,
            _settings: &EffectSettings,
            _context: &EffectContext,
        ) -> Result<Box<dyn Effect>, EffectError> {
            if self.fail {
                Err(EffectError::Construction {
                    kind: "Mock".to_string(),
                    message: "boom".to_string(),
                })
            } else {
                Ok(Box::new(MockEffect))
            }
        }
    }

    fn context() -> EffectContext {
        EffectContext {
            page: Rc::new(HeadlessPage::new()),
            now_ms: 0.0,
            content: EffectContent::default(),
            seed: 7,
        }
    }

    #[test]
    fn test_catalog_new() {
        let catalog = EffectCatalog::new();
        assert!(catalog.is_empty());
        assert_eq!(catalog.len(), 0);
    }

    #[test]
    fn test_builtins_cover_every_kind() {
        let catalog = EffectCatalog::with_builtins();
        for kind in EffectKind::ALL {
            assert!(catalog.contains(kind), "missing {kind}");
        }
        assert_eq!(catalog.display_name(EffectKind::CustomCursor), Some("Custom Cursor"));
    }

    #[test]
    fn test_instantiate_unknown_kind() {
        let catalog = EffectCatalog::new();
        let settings = EffectSettings::lookup(EffectKind::KineticText, PerformanceTier::High);
        let result = catalog.instantiate(EffectKind::KineticText, &settings, &context());
        assert!(matches!(result, Err(LoadError::UnknownEffect(_))));
    }

    #[test]
    fn test_instantiate_propagates_construction_failure() {
        let mut catalog = EffectCatalog::new();
        catalog.register(MockDefinition {
            kind: EffectKind::KineticText,
            fail: true,
        });
        let settings = EffectSettings::lookup(EffectKind::KineticText, PerformanceTier::High);
        let result = catalog.instantiate(EffectKind::KineticText, &settings, &context());
        assert!(matches!(result, Err(LoadError::Instantiate(_))));

        catalog.register(MockDefinition {
            kind: EffectKind::KineticText,
            fail: false,
        });
        assert!(catalog
            .instantiate(EffectKind::KineticText, &settings, &context())
            .is_ok());
    }
}
