//! Explicit registry of fittable models.
//!
//! The registry is an ordered list of `(id, factory)` pairs fixed at startup.
//! Order is registration order and is what front-ends display.

use crate::domain::BrdfModelId;
use crate::error::FitError;
use crate::models::{Brdf, Charlie, CookTorrance, Ggx, Lambert};

/// Builds a fresh model instance for one fitting run.
pub type BrdfFactory = fn() -> Box<dyn Brdf>;

pub const LAMBERT: BrdfModelId = BrdfModelId::new("Lambert");
pub const GGX: BrdfModelId = BrdfModelId::new("GGX");
pub const COOK_TORRANCE: BrdfModelId = BrdfModelId::new("CookTorrance");
pub const CHARLIE: BrdfModelId = BrdfModelId::new("Charlie");

#[derive(Clone)]
struct Entry {
    id: BrdfModelId,
    factory: BrdfFactory,
}

#[derive(Clone, Default)]
pub struct ModelRegistry {
    entries: Vec<Entry>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All models shipped with the generator.
    pub fn builtin() -> Self {
        Self::new()
            .with(LAMBERT, || Box::new(Lambert))
            .with(GGX, || Box::new(Ggx))
            .with(COOK_TORRANCE, || Box::new(CookTorrance))
            .with(CHARLIE, || Box::new(Charlie))
    }

    /// Register a model. A second registration of the same id is ignored.
    pub fn with(mut self, id: BrdfModelId, factory: BrdfFactory) -> Self {
        if self.contains(id) {
            log::warn!("BRDF model '{id}' registered twice; keeping the first registration");
            return self;
        }
        self.entries.push(Entry { id, factory });
        self
    }

    pub fn list_models(&self) -> Vec<BrdfModelId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: BrdfModelId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn instantiate(&self, id: BrdfModelId) -> Result<Box<dyn Brdf>, FitError> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| (e.factory)())
            .ok_or_else(|| FitError::UnknownModel(id.name().to_string()))
    }

    /// Resolve a user-supplied name (case-insensitive).
    pub fn lookup(&self, name: &str) -> Result<BrdfModelId, FitError> {
        self.entries
            .iter()
            .find(|e| e.id.name().eq_ignore_ascii_case(name.trim()))
            .map(|e| e.id)
            .ok_or_else(|| FitError::UnknownModel(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_order_is_stable() {
        let registry = ModelRegistry::builtin();
        assert_eq!(
            registry.list_models(),
            vec![LAMBERT, GGX, COOK_TORRANCE, CHARLIE]
        );
        assert_eq!(registry.list_models(), registry.list_models());
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let registry = ModelRegistry::new().with(LAMBERT, || Box::new(Lambert));
        assert!(registry.instantiate(LAMBERT).is_ok());
        assert!(matches!(
            registry.instantiate(GGX),
            Err(FitError::UnknownModel(name)) if name == "GGX"
        ));
    }

    #[test]
    fn lookup_ignores_case() {
        let registry = ModelRegistry::builtin();
        assert_eq!(registry.lookup("cooktorrance").unwrap(), COOK_TORRANCE);
        assert!(registry.lookup("Phong").is_err());
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let registry = ModelRegistry::new()
            .with(LAMBERT, || Box::new(Lambert))
            .with(LAMBERT, || Box::new(Ggx));
        assert_eq!(registry.len(), 1);
    }
}
