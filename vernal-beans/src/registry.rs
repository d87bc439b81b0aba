//! Functionality related to registering bean definitions. The [BeanFactory](crate::factory::BeanFactory)
//! creates beans based on those definitions, which can be registered statically at start-up or
//! added by registry processors at any time before instantiation.

use crate::definition::{BeanDefinition, Capability};
use crate::error::DefinitionRegistryError;
use crate::registry::internal::DefinitionRegisterer;
use crate::registry::map::OrderedDefinitionMap;
#[cfg(test)]
use mockall::automock;

pub type DefinitionRegistryPtr = Box<dyn DefinitionRegistry + Send + Sync>;

/// A registry of bean definitions. Iteration order is always the registration order.
#[cfg_attr(test, automock)]
pub trait DefinitionRegistry {
    /// Adds a new definition. Handling of duplicate names is registry-dependent.
    fn register_definition(
        &mut self,
        definition: BeanDefinition,
    ) -> Result<(), DefinitionRegistryError>;

    /// Removes the definition with given name along with all its aliases.
    fn remove_definition(&mut self, name: &str) -> Result<BeanDefinition, DefinitionRegistryError>;

    /// Returns a definition with given name or alias.
    fn definition(&self, name: &str) -> Option<BeanDefinition>;

    /// Checks if there's a definition registered directly under given name.
    fn contains_definition(&self, name: &str) -> bool;

    /// Returns all definition names in registration order.
    fn definition_names(&self) -> Vec<String>;

    /// Returns names of definitions with given capability, in registration order.
    fn names_for_capability(&self, capability: Capability) -> Vec<String>;

    /// Returns names of object definitions with given type name, in registration order.
    fn names_for_type(&self, type_name: &str) -> Vec<String>;

    /// Registers an alternative name for an existing definition.
    fn register_alias(&mut self, name: &str, alias: &str) -> Result<(), DefinitionRegistryError>;

    /// Resolves an alias to the definition name. Returns the input if it's not an alias.
    fn canonical_name(&self, name: &str) -> String;

    /// Checks if registering a definition with an existing name replaces the old one.
    fn allows_definition_overriding(&self) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A read-only facade of a [DefinitionRegistry] safe to use in registration conditions and
/// selectors.
#[cfg_attr(test, automock)]
pub trait DefinitionRegistryFacade {
    /// Checks if there's a definition with given name or alias.
    fn is_registered(&self, name: &str) -> bool;

    /// Checks if there's an object definition with given type name.
    fn is_type_registered(&self, type_name: &str) -> bool;
}

/// [DefinitionRegistryFacade] over any type-erased registry.
#[derive(Clone, Copy)]
pub struct RegistryView<'a> {
    registry: &'a dyn DefinitionRegistry,
}

impl<'a> RegistryView<'a> {
    pub fn new(registry: &'a dyn DefinitionRegistry) -> Self {
        Self { registry }
    }
}

impl DefinitionRegistryFacade for RegistryView<'_> {
    #[inline]
    fn is_registered(&self, name: &str) -> bool {
        self.registry.definition(name).is_some()
    }

    #[inline]
    fn is_type_registered(&self, type_name: &str) -> bool {
        !self.registry.names_for_type(type_name).is_empty()
    }
}

/// Registry keeping definitions in registration order.
#[derive(Clone, Debug, Default)]
pub struct OrderedDefinitionRegistry {
    definition_map: OrderedDefinitionMap,
    allow_definition_overriding: bool,
}

impl OrderedDefinitionRegistry {
    pub fn new(allow_definition_overriding: bool) -> Self {
        Self {
            definition_map: Default::default(),
            allow_definition_overriding,
        }
    }

    /// Creates a registry with all definitions submitted statically via
    /// [internal::DefinitionRegisterer].
    pub fn with_static_definitions(
        allow_definition_overriding: bool,
    ) -> Result<Self, DefinitionRegistryError> {
        let mut registry = Self::new(allow_definition_overriding);

        for registerer in inventory::iter::<DefinitionRegisterer> {
            registry.register_definition((registerer.register)())?;
        }

        Ok(registry)
    }
}

impl DefinitionRegistry for OrderedDefinitionRegistry {
    #[inline]
    fn register_definition(
        &mut self,
        definition: BeanDefinition,
    ) -> Result<(), DefinitionRegistryError> {
        self.definition_map
            .try_register(definition, self.allow_definition_overriding)
    }

    #[inline]
    fn remove_definition(&mut self, name: &str) -> Result<BeanDefinition, DefinitionRegistryError> {
        self.definition_map
            .remove(name)
            .ok_or_else(|| DefinitionRegistryError::MissingDefinition(name.to_string()))
    }

    #[inline]
    fn definition(&self, name: &str) -> Option<BeanDefinition> {
        self.definition_map.definition(name).cloned()
    }

    #[inline]
    fn contains_definition(&self, name: &str) -> bool {
        self.definition_map.contains(name)
    }

    #[inline]
    fn definition_names(&self) -> Vec<String> {
        self.definition_map.names_matching(|_| true)
    }

    #[inline]
    fn names_for_capability(&self, capability: Capability) -> Vec<String> {
        self.definition_map
            .names_matching(|definition| definition.capability == capability)
    }

    #[inline]
    fn names_for_type(&self, type_name: &str) -> Vec<String> {
        self.definition_map.names_matching(|definition| {
            definition.capability == Capability::Object && definition.type_name == type_name
        })
    }

    #[inline]
    fn register_alias(&mut self, name: &str, alias: &str) -> Result<(), DefinitionRegistryError> {
        self.definition_map.try_register_alias(name, alias)
    }

    #[inline]
    fn canonical_name(&self, name: &str) -> String {
        self.definition_map.canonical_name(name).to_string()
    }

    #[inline]
    fn allows_definition_overriding(&self) -> bool {
        self.allow_definition_overriding
    }

    #[inline]
    fn len(&self) -> usize {
        self.definition_map.len()
    }
}

impl DefinitionRegistryFacade for OrderedDefinitionRegistry {
    #[inline]
    fn is_registered(&self, name: &str) -> bool {
        self.definition_map.definition(name).is_some()
    }

    #[inline]
    fn is_type_registered(&self, type_name: &str) -> bool {
        !self.names_for_type(type_name).is_empty()
    }
}

mod map {
    use crate::definition::BeanDefinition;
    use crate::error::DefinitionRegistryError;
    use fxhash::FxHashMap;

    #[derive(Default, Clone, Debug)]
    pub(super) struct OrderedDefinitionMap {
        definitions: Vec<BeanDefinition>,
        index: FxHashMap<String, usize>,
        aliases: FxHashMap<String, String>,
    }

    impl OrderedDefinitionMap {
        pub(super) fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
            self.aliases.get(name).map(String::as_str).unwrap_or(name)
        }

        pub(super) fn definition(&self, name: &str) -> Option<&BeanDefinition> {
            self.index
                .get(self.canonical_name(name))
                .and_then(|index| self.definitions.get(*index))
        }

        #[inline]
        pub(super) fn contains(&self, name: &str) -> bool {
            self.index.contains_key(name)
        }

        #[inline]
        pub(super) fn len(&self) -> usize {
            self.definitions.len()
        }

        pub(super) fn names_matching<F: Fn(&BeanDefinition) -> bool>(
            &self,
            predicate: F,
        ) -> Vec<String> {
            self.definitions
                .iter()
                .filter(|definition| predicate(definition))
                .map(|definition| definition.name.clone())
                .collect()
        }

        pub(super) fn try_register(
            &mut self,
            definition: BeanDefinition,
            allow_definition_overriding: bool,
        ) -> Result<(), DefinitionRegistryError> {
            if let Some(index) = self.index.get(&definition.name) {
                if !allow_definition_overriding {
                    return Err(DefinitionRegistryError::DuplicateDefinitionName(
                        definition.name,
                    ));
                }

                // replacing keeps the original position
                self.definitions[*index] = definition;
                return Ok(());
            }

            self.aliases.remove(&definition.name);
            self.index
                .insert(definition.name.clone(), self.definitions.len());
            self.definitions.push(definition);

            Ok(())
        }

        pub(super) fn try_register_alias(
            &mut self,
            name: &str,
            alias: &str,
        ) -> Result<(), DefinitionRegistryError> {
            if alias == name {
                self.aliases.remove(alias);
                return Ok(());
            }

            if self.index.contains_key(alias) {
                return Err(DefinitionRegistryError::DuplicateAlias {
                    alias: alias.to_string(),
                    name: name.to_string(),
                });
            }

            if let Some(existing) = self.aliases.get(alias) {
                if existing != name {
                    return Err(DefinitionRegistryError::DuplicateAlias {
                        alias: alias.to_string(),
                        name: name.to_string(),
                    });
                }
            }

            let name = self.canonical_name(name).to_string();
            if !self.index.contains_key(&name) {
                return Err(DefinitionRegistryError::MissingDefinition(name));
            }

            self.aliases.insert(alias.to_string(), name);
            Ok(())
        }

        pub(super) fn remove(&mut self, name: &str) -> Option<BeanDefinition> {
            let position = self.index.remove(name)?;
            let definition = self.definitions.remove(position);

            for index in self.index.values_mut() {
                if *index > position {
                    *index -= 1;
                }
            }

            self.aliases.retain(|_, target| target != name);

            Some(definition)
        }
    }

    #[cfg(test)]
    mod tests {
        use crate::definition::BeanDefinition;
        use crate::error::DefinitionRegistryError;
        use crate::registry::map::OrderedDefinitionMap;

        fn create_definition(name: &str) -> BeanDefinition {
            BeanDefinition::object(name, |_| Ok(0_u8))
        }

        #[test]
        fn should_register_definition() {
            let mut map = OrderedDefinitionMap::default();
            map.try_register(create_definition("name"), false).unwrap();

            assert!(map.contains("name"));
            assert_eq!(map.definition("name").unwrap().name, "name");
            assert_eq!(map.len(), 1);
        }

        #[test]
        fn should_not_register_duplicate_name() {
            let mut map = OrderedDefinitionMap::default();
            map.try_register(create_definition("name"), false).unwrap();

            assert_eq!(
                map.try_register(create_definition("name"), false)
                    .unwrap_err(),
                DefinitionRegistryError::DuplicateDefinitionName("name".to_string())
            );
        }

        #[test]
        fn should_override_in_place() {
            let mut map = OrderedDefinitionMap::default();
            map.try_register(create_definition("a"), true).unwrap();
            map.try_register(create_definition("b"), true).unwrap();
            map.try_register(create_definition("a").with_lazy(true), true)
                .unwrap();

            assert_eq!(map.names_matching(|_| true), vec!["a", "b"]);
            assert!(map.definition("a").unwrap().lazy);
        }

        #[test]
        fn should_resolve_aliases() {
            let mut map = OrderedDefinitionMap::default();
            map.try_register(create_definition("name"), false).unwrap();
            map.try_register_alias("name", "alias").unwrap();

            assert_eq!(map.definition("alias").unwrap().name, "name");
            assert!(!map.contains("alias"));
        }

        #[test]
        fn should_reject_alias_shadowing_definition() {
            let mut map = OrderedDefinitionMap::default();
            map.try_register(create_definition("a"), false).unwrap();
            map.try_register(create_definition("b"), false).unwrap();

            assert!(matches!(
                map.try_register_alias("a", "b").unwrap_err(),
                DefinitionRegistryError::DuplicateAlias { .. }
            ));
        }

        #[test]
        fn should_remove_definition_with_aliases() {
            let mut map = OrderedDefinitionMap::default();
            map.try_register(create_definition("a"), false).unwrap();
            map.try_register(create_definition("b"), false).unwrap();
            map.try_register(create_definition("c"), false).unwrap();
            map.try_register_alias("b", "alias").unwrap();

            assert!(map.remove("b").is_some());
            assert!(map.definition("alias").is_none());
            assert_eq!(map.definition("c").unwrap().name, "c");
            assert_eq!(map.names_matching(|_| true), vec!["a", "c"]);
        }
    }
}

#[doc(hidden)]
pub mod internal {
    use crate::definition::BeanDefinition;
    use inventory::collect;
    pub use inventory::submit;

    pub struct DefinitionRegisterer {
        pub register: fn() -> BeanDefinition,
    }

    collect!(DefinitionRegisterer);
}

#[cfg(test)]
mod tests {
    use crate::definition::{BeanDefinition, Capability, Ordering};
    use crate::error::{DefinitionRegistryError, ErrorPtr};
    use crate::factory::BeanFactory;
    use crate::processor::{FactoryPostProcessor, FactoryProcessorPtr};
    use crate::registry::{
        DefinitionRegistry, DefinitionRegistryFacade, OrderedDefinitionRegistry, RegistryView,
    };
    use std::sync::Arc;

    struct NoopProcessor;

    impl FactoryPostProcessor for NoopProcessor {
        fn process_factory(&self, _factory: &mut BeanFactory) -> Result<(), ErrorPtr> {
            Ok(())
        }
    }

    #[test]
    fn should_register_definition() {
        let mut registry = OrderedDefinitionRegistry::new(false);
        registry
            .register_definition(BeanDefinition::object("a", |_| Ok(1_u32)))
            .unwrap();

        assert!(registry.contains_definition("a"));
        assert!(registry.is_type_registered(std::any::type_name::<u32>()));
        assert_eq!(registry.names_for_type(std::any::type_name::<u32>()), vec!["a"]);
        assert!(!registry.is_empty());
    }

    #[test]
    fn should_not_register_duplicate_name() {
        let mut registry = OrderedDefinitionRegistry::new(false);
        registry
            .register_definition(BeanDefinition::object("a", |_| Ok(1_u32)))
            .unwrap();

        assert_eq!(
            registry
                .register_definition(BeanDefinition::object("a", |_| Ok(1_u32)))
                .unwrap_err(),
            DefinitionRegistryError::DuplicateDefinitionName("a".to_string())
        );
    }

    #[test]
    fn should_list_names_by_capability() {
        let mut registry = OrderedDefinitionRegistry::new(false);
        registry
            .register_definition(BeanDefinition::object("a", |_| Ok(1_u32)))
            .unwrap();
        registry
            .register_definition(BeanDefinition::factory_processor(
                "b",
                Ordering::Ordered(1),
                |_| Ok(Arc::new(NoopProcessor) as FactoryProcessorPtr),
            ))
            .unwrap();

        assert_eq!(
            registry.names_for_capability(Capability::FactoryProcessor),
            vec!["b"]
        );
        assert_eq!(registry.definition_names(), vec!["a", "b"]);
    }

    #[test]
    fn should_report_missing_definition_on_removal() {
        let mut registry = OrderedDefinitionRegistry::new(true);
        assert_eq!(
            registry.remove_definition("a").unwrap_err(),
            DefinitionRegistryError::MissingDefinition("a".to_string())
        );
    }

    #[test]
    fn should_expose_facade_over_dyn_registry() {
        let mut registry = OrderedDefinitionRegistry::new(true);
        registry
            .register_definition(BeanDefinition::object("a", |_| Ok(1_u32)))
            .unwrap();
        registry.register_alias("a", "b").unwrap();

        let view = RegistryView::new(&registry);
        assert!(view.is_registered("b"));
        assert!(!view.is_registered("c"));
        assert_eq!(registry.canonical_name("b"), "a");
    }
}
