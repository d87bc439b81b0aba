//! Core functionality for creating [Bean] instances.

use crate::definition::{Bean, BeanDefinition, Capability};
use crate::error::{BeanInstanceProviderError, DefinitionRegistryError};
use crate::instance_provider::{
    BeanInstanceAnyPtr, BeanInstanceProvider, BeanInstancePtr, TypedBeanInstanceProvider,
};
use crate::processor::InstanceProcessorPtr;
use crate::registry::{DefinitionRegistry, DefinitionRegistryPtr, OrderedDefinitionRegistry};
use crate::scope::{
    PrototypeScopeFactory, ScopeFactoryPtr, ScopePtr, SingletonScopeFactory, PROTOTYPE, SINGLETON,
};
use fxhash::{FxHashMap, FxHashSet};
use std::any::{type_name, Any};
use tracing::trace;

pub type ScopeFactoryRegistry = FxHashMap<String, ScopeFactoryPtr>;

/// Builder for [BeanFactory] with sensible defaults, for easy construction.
pub struct BeanFactoryBuilder {
    definition_registry: DefinitionRegistryPtr,
    scope_factories: ScopeFactoryRegistry,
}

impl BeanFactoryBuilder {
    /// Creates a new builder with a registry containing statically submitted definitions.
    pub fn new() -> Result<Self, DefinitionRegistryError> {
        Ok(Self {
            definition_registry: Box::new(OrderedDefinitionRegistry::with_static_definitions(
                true,
            )?),
            scope_factories: [
                (
                    SINGLETON.to_string(),
                    Box::<SingletonScopeFactory>::default() as ScopeFactoryPtr,
                ),
                (
                    PROTOTYPE.to_string(),
                    Box::<PrototypeScopeFactory>::default() as ScopeFactoryPtr,
                ),
            ]
            .into_iter()
            .collect(),
        })
    }

    /// Sets new [DefinitionRegistry].
    pub fn with_definition_registry(mut self, definition_registry: DefinitionRegistryPtr) -> Self {
        self.definition_registry = definition_registry;
        self
    }

    /// Sets new scope factories.
    pub fn with_scope_factories(mut self, scope_factories: ScopeFactoryRegistry) -> Self {
        self.scope_factories = scope_factories;
        self
    }

    /// Adds a new scope factory.
    pub fn with_scope_factory<T: ToString>(mut self, name: T, factory: ScopeFactoryPtr) -> Self {
        self.scope_factories.insert(name.to_string(), factory);
        self
    }

    /// Builds resulting [BeanFactory].
    pub fn build(self) -> BeanFactory {
        BeanFactory::new(self.definition_registry, self.scope_factories)
    }
}

/// Generic factory for beans. Uses definitions from the [DefinitionRegistry] and
/// [scopes](crate::scope) to create and store instances for reuse. Newly created object beans are
/// passed through all registered [instance processors](crate::processor::InstancePostProcessor).
pub struct BeanFactory {
    definition_registry: DefinitionRegistryPtr,
    scope_factories: ScopeFactoryRegistry,
    scopes: FxHashMap<String, ScopePtr>,
    names_under_construction: FxHashSet<String>,
    instance_processors: Vec<InstanceProcessorPtr>,
}

impl BeanFactory {
    /// Creates a new factory with given registry and scope factories. The factory map should
    /// include built-in [SINGLETON] and [PROTOTYPE], since definitions use them by default.
    pub fn new(
        definition_registry: DefinitionRegistryPtr,
        scope_factories: ScopeFactoryRegistry,
    ) -> Self {
        Self {
            definition_registry,
            scope_factories,
            scopes: Default::default(),
            names_under_construction: Default::default(),
            instance_processors: Default::default(),
        }
    }

    #[inline]
    pub fn registry(&self) -> &dyn DefinitionRegistry {
        self.definition_registry.as_ref()
    }

    #[inline]
    pub fn registry_mut(&mut self) -> &mut dyn DefinitionRegistry {
        self.definition_registry.as_mut()
    }

    /// Registers a custom scope after the factory has been created.
    pub fn register_scope_factory<T: ToString>(&mut self, name: T, factory: ScopeFactoryPtr) {
        self.scope_factories.insert(name.to_string(), factory);
    }

    /// Appends an instance processor. Only beans created afterwards are processed by it.
    pub fn add_instance_processor(&mut self, processor: InstanceProcessorPtr) {
        self.instance_processors.push(processor);
    }

    #[inline]
    pub fn instance_processor_count(&self) -> usize {
        self.instance_processors.len()
    }

    /// Checks if there's a definition for given name or alias.
    #[inline]
    pub fn contains_bean(&self, name: &str) -> bool {
        self.definition_registry.definition(name).is_some()
    }

    /// Returns all object beans of type `T`, in registration order.
    pub fn beans_of_type<T: Any + Send + Sync>(
        &mut self,
    ) -> Result<Vec<(String, BeanInstancePtr<T>)>, BeanInstanceProviderError> {
        self.definition_registry
            .names_for_type(type_name::<T>())
            .into_iter()
            .map(|name| {
                let instance = self.instance_typed::<T>(&name)?;
                Ok((name, instance))
            })
            .collect()
    }

    /// Eagerly creates all non-lazy singleton object beans, in registration order.
    pub fn pre_instantiate_singletons(&mut self) -> Result<(), BeanInstanceProviderError> {
        for name in self.definition_registry.definition_names() {
            let eager = self
                .definition_registry
                .definition(&name)
                .map(|definition| {
                    definition.capability == Capability::Object
                        && definition.scope_name == SINGLETON
                        && !definition.lazy
                })
                .unwrap_or(false);

            if eager {
                trace!(bean = name.as_str(), "Pre-instantiating singleton.");
                self.bean(&name)?;
            }
        }

        Ok(())
    }

    fn create_instance(
        &mut self,
        definition: &BeanDefinition,
    ) -> Result<Bean, BeanInstanceProviderError> {
        if self.names_under_construction.contains(&definition.name) {
            return Err(BeanInstanceProviderError::DependencyCycle(
                definition.name.clone(),
            ));
        }

        let scope = {
            if let Some(scope) = self.scopes.get(&definition.scope_name) {
                scope
            } else {
                let factory = self
                    .scope_factories
                    .get(&definition.scope_name)
                    .ok_or_else(|| {
                        BeanInstanceProviderError::UnrecognizedScope(
                            definition.scope_name.to_string(),
                        )
                    })?;

                self.scopes
                    .entry(definition.scope_name.clone())
                    .or_insert(factory.create_scope())
            }
        };

        if let Some(instance) = scope.instance(definition) {
            return Ok(instance);
        }

        self.names_under_construction.insert(definition.name.clone());
        let instance = definition.construct(self);
        self.names_under_construction.remove(&definition.name);

        let instance = match instance? {
            Bean::Object(instance) => Bean::Object(self.process_instance(definition, instance)?),
            other => other,
        };

        let scope = self.scopes.get_mut(&definition.scope_name).ok_or_else(|| {
            BeanInstanceProviderError::UnrecognizedScope(definition.scope_name.to_string())
        })?;

        scope.store_instance(definition, instance.clone());

        Ok(instance)
    }

    fn process_instance(
        &self,
        definition: &BeanDefinition,
        instance: BeanInstanceAnyPtr,
    ) -> Result<BeanInstanceAnyPtr, BeanInstanceProviderError> {
        let to_error = |source| BeanInstanceProviderError::InstanceProcessorError {
            name: definition.name.clone(),
            source,
        };

        let instance = self
            .instance_processors
            .iter()
            .try_fold(instance, |instance, processor| {
                processor.before_initialization(definition, instance)
            })
            .map_err(to_error)?;

        self.instance_processors
            .iter()
            .try_fold(instance, |instance, processor| {
                processor.after_initialization(definition, instance)
            })
            .map_err(to_error)
    }
}

impl BeanInstanceProvider for BeanFactory {
    fn bean(&mut self, name: &str) -> Result<Bean, BeanInstanceProviderError> {
        let definition = self
            .definition_registry
            .definition(name)
            .ok_or_else(|| BeanInstanceProviderError::NoDefinition(name.to_string()))?;

        self.create_instance(&definition)
    }
}

#[cfg(test)]
mod tests {
    use crate::definition::{Bean, BeanDefinition};
    use crate::error::{BeanInstanceProviderError, ErrorPtr};
    use crate::factory::{BeanFactory, BeanFactoryBuilder, ScopeFactoryPtr};
    use crate::instance_provider::{BeanInstanceProvider, TypedBeanInstanceProvider};
    use crate::registry::{
        DefinitionRegistry, DefinitionRegistryPtr, MockDefinitionRegistry,
        OrderedDefinitionRegistry,
    };
    use crate::scope::{
        MockScope, MockScopeFactory, PrototypeScopeFactory, ScopePtr, PROTOTYPE, SINGLETON,
    };
    use mockall::predicate::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn create_definition() -> BeanDefinition {
        BeanDefinition::object("name", |_| Ok(0_i8)).with_scope(PROTOTYPE)
    }

    fn create_factory(definition_registry: MockDefinitionRegistry) -> BeanFactory {
        BeanFactory::new(
            Box::new(definition_registry) as DefinitionRegistryPtr,
            [(
                PROTOTYPE.to_string(),
                Box::<PrototypeScopeFactory>::default() as ScopeFactoryPtr,
            )]
            .into_iter()
            .collect(),
        )
    }

    #[test]
    fn should_return_bean_by_name() {
        let mut registry = MockDefinitionRegistry::new();
        registry
            .expect_definition()
            .with(eq("name"))
            .times(1)
            .return_const(Some(create_definition()));

        let mut factory = create_factory(registry);
        assert_eq!(*factory.instance_typed::<i8>("name").unwrap(), 0);
    }

    #[test]
    fn should_detect_dependency_cycles() {
        let definition = BeanDefinition::object("name", |provider| {
            provider
                .instance_typed::<i8>("name")
                .map(|value| *value)
                .map_err(|error| Arc::new(error) as ErrorPtr)
        })
        .with_scope(PROTOTYPE);

        let mut registry = MockDefinitionRegistry::new();
        registry
            .expect_definition()
            .with(eq("name"))
            .times(2)
            .return_const(Some(definition));

        let mut factory = create_factory(registry);
        let error = factory.bean("name").err().unwrap();
        assert!(matches!(
            error,
            BeanInstanceProviderError::ConstructorError { ref source, .. }
                if source.to_string() == BeanInstanceProviderError::DependencyCycle("name".to_string()).to_string()
        ));
    }

    #[test]
    fn should_not_return_missing_bean() {
        let mut registry = MockDefinitionRegistry::new();
        registry
            .expect_definition()
            .with(eq("name"))
            .times(1)
            .return_const(None);

        let mut factory = create_factory(registry);
        assert!(matches!(
            factory.bean("name").err().unwrap(),
            BeanInstanceProviderError::NoDefinition(name) if name == "name"
        ));
    }

    #[test]
    fn should_recognize_missing_scope() {
        let mut registry = MockDefinitionRegistry::new();
        registry
            .expect_definition()
            .with(eq("name"))
            .times(1)
            .return_const(Some(create_definition().with_scope(SINGLETON)));

        let mut factory = create_factory(registry);
        assert!(matches!(
            factory.bean("name").err().unwrap(),
            BeanInstanceProviderError::UnrecognizedScope(scope) if scope == SINGLETON
        ));
    }

    #[test]
    fn should_store_instance_in_scope() {
        let mut registry = MockDefinitionRegistry::new();
        registry
            .expect_definition()
            .with(eq("name"))
            .times(1)
            .return_const(Some(create_definition()));

        let mut scope_factory = MockScopeFactory::new();
        scope_factory.expect_create_scope().returning(|| {
            let mut scope = MockScope::new();
            scope.expect_store_instance().times(1).return_const(());
            scope.expect_instance().return_const(None::<Bean>);

            Box::new(scope) as ScopePtr
        });

        let mut factory = BeanFactory::new(
            Box::new(registry) as DefinitionRegistryPtr,
            [(
                PROTOTYPE.to_string(),
                Box::new(scope_factory) as ScopeFactoryPtr,
            )]
            .into_iter()
            .collect(),
        );

        factory.bean("name").unwrap();
    }

    #[test]
    fn should_pre_instantiate_eager_singletons() {
        let created = Arc::new(AtomicUsize::new(0));
        let eager_created = created.clone();
        let lazy_created = created.clone();

        let mut registry = OrderedDefinitionRegistry::new(false);
        registry
            .register_definition(BeanDefinition::object("eager", move |_| {
                eager_created.fetch_add(1, Ordering::SeqCst);
                Ok(1_u8)
            }))
            .unwrap();
        registry
            .register_definition(
                BeanDefinition::object("lazy", move |_| {
                    lazy_created.fetch_add(10, Ordering::SeqCst);
                    Ok(2_u8)
                })
                .with_lazy(true),
            )
            .unwrap();

        let mut factory = BeanFactoryBuilder::new()
            .unwrap()
            .with_definition_registry(Box::new(registry))
            .build();

        factory.pre_instantiate_singletons().unwrap();
        factory.pre_instantiate_singletons().unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 1);

        let values = factory.beans_of_type::<u8>().unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(created.load(Ordering::SeqCst), 11);
    }
}
