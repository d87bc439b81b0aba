//! Import selectors, registrars and the import stack used for cycle detection.

use crate::environment::Environment;
use crate::source::SourceDescriptor;
use fxhash::{FxHashMap, FxHashSet};
use itertools::Itertools;
use std::fmt::{Display, Formatter};
use vernal_beans::error::ErrorPtr;
use vernal_beans::registry::{DefinitionRegistry, DefinitionRegistryFacade};

pub type ImportSelectorPtr = Box<dyn ImportSelector + Send + Sync>;

pub type ImportRegistrarPtr = Box<dyn ImportRegistrar + Send + Sync>;

/// State visible to selectors when they compute imports.
pub struct SelectionContext<'a> {
    /// Names of configuration units resolved so far.
    pub resolved_units: &'a [String],
    pub registry: &'a dyn DefinitionRegistryFacade,
    pub environment: &'a Environment,
}

/// Computes names of sources to import, based on the importing source.
pub trait ImportSelector {
    /// Called once, right after the selector is created.
    fn aware(&mut self, _environment: &Environment, _registry: &dyn DefinitionRegistryFacade) {}

    fn select_imports(
        &self,
        importing: &SourceDescriptor,
        context: &SelectionContext,
    ) -> Result<Vec<String>, ErrorPtr>;

    /// Deferred selectors run after all other configuration units are resolved.
    fn is_deferred(&self) -> bool {
        false
    }

    /// Order among deferred selectors. Falls back to the order of the selector source.
    fn order(&self) -> Option<i32> {
        None
    }
}

/// Registers definitions on behalf of the importing source.
pub trait ImportRegistrar {
    /// Called once, right after the registrar is created.
    fn aware(&mut self, _environment: &Environment, _registry: &dyn DefinitionRegistryFacade) {}

    fn register_definitions(
        &self,
        importing: &SourceDescriptor,
        registry: &mut dyn DefinitionRegistry,
        environment: &Environment,
    ) -> Result<(), ErrorPtr>;
}

/// Stack of units currently being processed, along with a record of which unit imported which.
#[derive(Clone, Debug, Default)]
pub struct ImportStack {
    stack: Vec<String>,
    imports: FxHashMap<String, Vec<String>>,
}

impl ImportStack {
    #[inline]
    pub fn push<T: ToString>(&mut self, unit: T) {
        self.stack.push(unit.to_string());
    }

    #[inline]
    pub fn pop(&mut self) -> Option<String> {
        self.stack.pop()
    }

    #[inline]
    pub fn peek(&self) -> Option<&str> {
        self.stack.last().map(String::as_str)
    }

    #[inline]
    pub fn contains(&self, unit: &str) -> bool {
        self.stack.iter().any(|entry| entry == unit)
    }

    /// Records that `importing` imports `imported`.
    pub fn register_import(&mut self, importing: &str, imported: &str) {
        self.imports
            .entry(imported.to_string())
            .or_default()
            .push(importing.to_string());
    }

    /// Returns the most recent unit importing given one.
    pub fn importing_unit_for(&self, imported: &str) -> Option<&str> {
        self.imports
            .get(imported)
            .and_then(|importing| importing.last())
            .map(String::as_str)
    }

    /// Forgets all imports made by given unit.
    pub fn remove_importing_unit(&mut self, importing: &str) {
        for units in self.imports.values_mut() {
            units.retain(|unit| unit != importing);
        }
    }

    /// Checks if the unit is on the stack and its chain of importers leads back to itself.
    pub fn is_chained_import(&self, unit: &str) -> bool {
        if !self.contains(unit) {
            return false;
        }

        let mut visited = FxHashSet::default();
        let mut importing = self.importing_unit_for(unit);

        while let Some(current) = importing {
            if current == unit {
                return true;
            }

            if !visited.insert(current) {
                return false;
            }

            importing = self.importing_unit_for(current);
        }

        false
    }
}

impl Display for ImportStack {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.stack.iter().join("->"))
    }
}
