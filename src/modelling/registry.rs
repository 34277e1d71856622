//! Kinetic models by name
//!
//! A parameter file names its model in the block header
//! (`Patlak Plot Parameters:=`) or in a leading `Kinetic Model type :=` line.
//! The registry maps that name to a factory which builds a configured
//! [`KineticModel`] from the parsed block.
//!
//! # Example
//!
//! ```rust,no_run
//! use petkin::modelling::ModelRegistry;
//!
//! let registry = ModelRegistry::builtin();
//! let mut model = registry.read("patlak.par").unwrap();
//! model.set_up().unwrap();
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::data::parser::keymap::{normalise_key, KeyMap};
use crate::modelling::{KineticModel, PatlakPlot};
use crate::KineticError;

/// Builds a configured model from a parameter block; relative file names are
/// resolved against the directory argument
pub type ModelFactory = fn(&KeyMap, Option<&Path>) -> Result<KineticModel, KineticError>;

#[derive(Clone, Default)]
pub struct ModelRegistry {
    factories: BTreeMap<String, (String, ModelFactory)>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

fn patlak_factory(keymap: &KeyMap, base_dir: Option<&Path>) -> Result<KineticModel, KineticError> {
    PatlakPlot::from_keymap(keymap, base_dir).map(KineticModel::from)
}

impl ModelRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every model of this crate
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(PatlakPlot::NAME, patlak_factory);
        registry
    }

    /// Add a model; returns the factory previously registered under `name`
    pub fn register(&mut self, name: &str, factory: ModelFactory) -> Option<ModelFactory> {
        self.factories
            .insert(normalise_key(name), (name.to_string(), factory))
            .map(|(_, previous)| previous)
    }

    /// Registered names, as given to [`register`](Self::register)
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.values().map(|(name, _)| name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&normalise_key(name))
    }

    /// Build the model `name` from `keymap`
    pub fn create(
        &self,
        name: &str,
        keymap: &KeyMap,
        base_dir: Option<&Path>,
    ) -> Result<KineticModel, KineticError> {
        let (_, factory) = self.factories.get(&normalise_key(name)).ok_or_else(|| {
            KineticError::InvalidConfiguration(format!(
                "unknown kinetic model '{}', available: {}",
                name,
                self.names().collect::<Vec<_>>().join(", ")
            ))
        })?;
        factory(keymap, base_dir)
    }

    /// Build the model named by a parameter block
    pub fn parse(&self, text: &str, base_dir: Option<&Path>) -> Result<KineticModel, KineticError> {
        let keymap = KeyMap::parse(text)?;
        let name = keymap.name().ok_or_else(|| {
            KineticError::InvalidConfiguration("parameter text does not name a kinetic model".into())
        })?;
        self.create(name, &keymap, base_dir)
    }

    /// Build the model named by a parameter file
    pub fn read(&self, path: impl AsRef<Path>) -> Result<KineticModel, KineticError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| KineticError::FileNotFound {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.parse(&text, path.parent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing(_: &KeyMap, _: Option<&Path>) -> Result<KineticModel, KineticError> {
        Err(KineticError::InvalidConfiguration("not implemented".into()))
    }

    #[test]
    fn builtin_names() {
        let registry = ModelRegistry::builtin();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["Patlak Plot"]);
        assert!(registry.contains("patlak  plot"));
        assert!(!registry.contains("Logan Plot"));
    }

    #[test]
    fn register_replaces() {
        let mut registry = ModelRegistry::builtin();
        assert!(registry.register("Logan Plot", failing).is_none());
        assert!(registry.register("LOGAN PLOT", failing).is_some());
        assert_eq!(registry.names().count(), 2);
    }

    #[test]
    fn unknown_model_is_rejected() {
        let registry = ModelRegistry::builtin();
        let err = registry
            .parse("Logan Plot Parameters:=\nend Logan Plot Parameters:=\n", None)
            .unwrap_err();
        match err {
            KineticError::InvalidConfiguration(message) => assert!(message.contains("Patlak Plot")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unnamed_text_is_rejected() {
        let registry = ModelRegistry::builtin();
        assert!(registry.parse("; nothing here\n", None).is_err());
    }

    #[test]
    fn missing_file() {
        let err = ModelRegistry::builtin().read("/nonexistent/patlak.par").unwrap_err();
        assert!(matches!(err, KineticError::FileNotFound { .. }));
    }
}
