//! Bean definitions describe how a bean is created and which lifecycle capabilities it has.
//!
//! Instead of a hierarchy of post-processor interfaces, each definition declares a single
//! [Capability], and the constructed [Bean] is a tagged variant matching that capability. Ordering
//! of processors is expressed with [Ordering], which also determines the [ProcessorTier] a
//! processor runs in.

use crate::error::{BeanInstanceProviderError, ErrorPtr};
use crate::instance_provider::{BeanInstanceAnyPtr, BeanInstanceProvider, BeanInstancePtr};
use crate::processor::{FactoryProcessorPtr, InstanceProcessorPtr, RegistryProcessorPtr};
use crate::scope::SINGLETON;
use derivative::Derivative;
use fxhash::FxHashMap;
use std::any::{type_name, Any};
use std::sync::Arc;

/// Order value of definitions without explicit ordering.
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

/// Order value which always goes first.
pub const HIGHEST_PRECEDENCE: i32 = i32::MIN;

/// Lifecycle capability of a bean.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Capability {
    /// Plain application object.
    Object,
    /// Processor mutating the definition registry before any bean is created.
    RegistryProcessor,
    /// Processor finalizing the factory configuration after registry processing.
    FactoryProcessor,
    /// Processor applied to every object bean around its initialization.
    InstanceProcessor,
}

/// Priority class of a processor.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum ProcessorTier {
    Primary,
    Secondary,
    Unordered,
}

impl ProcessorTier {
    /// All tiers in execution order.
    pub const ALL: [ProcessorTier; 3] = [
        ProcessorTier::Primary,
        ProcessorTier::Secondary,
        ProcessorTier::Unordered,
    ];
}

/// Declared ordering of a bean. Lower values go first within a tier.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Ordering {
    /// Runs in the [ProcessorTier::Primary] tier.
    Priority(i32),
    /// Runs in the [ProcessorTier::Secondary] tier.
    Ordered(i32),
    #[default]
    Unordered,
}

impl Ordering {
    pub fn tier(&self) -> ProcessorTier {
        match self {
            Ordering::Priority(_) => ProcessorTier::Primary,
            Ordering::Ordered(_) => ProcessorTier::Secondary,
            Ordering::Unordered => ProcessorTier::Unordered,
        }
    }

    pub fn order(&self) -> i32 {
        match self {
            Ordering::Priority(order) | Ordering::Ordered(order) => *order,
            Ordering::Unordered => LOWEST_PRECEDENCE,
        }
    }
}

/// Role hint for a definition.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Role {
    #[default]
    Application,
    /// Framework-internal bean, not interesting for application code.
    Infrastructure,
}

/// Where a definition came from.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum DefinitionSource {
    /// Registered directly by the user.
    #[default]
    Explicit,
    /// Found by scanning.
    Scanned,
    /// A configuration unit imported by another unit.
    Imported { by: String },
    /// Produced by a factory method of a configuration unit.
    FactoryMethod { unit: String, method: String },
    /// Contributed by an import registrar.
    Registrar { unit: String },
    /// Registered by the framework itself.
    Infrastructure,
}

/// A constructed bean. The variant always matches the [Capability] of its definition.
#[derive(Clone)]
pub enum Bean {
    Object(BeanInstanceAnyPtr),
    RegistryProcessor(RegistryProcessorPtr),
    FactoryProcessor(FactoryProcessorPtr),
    InstanceProcessor(InstanceProcessorPtr),
}

impl Bean {
    pub fn capability(&self) -> Capability {
        match self {
            Bean::Object(_) => Capability::Object,
            Bean::RegistryProcessor(_) => Capability::RegistryProcessor,
            Bean::FactoryProcessor(_) => Capability::FactoryProcessor,
            Bean::InstanceProcessor(_) => Capability::InstanceProcessor,
        }
    }

    pub fn into_object(self) -> Option<BeanInstanceAnyPtr> {
        match self {
            Bean::Object(instance) => Some(instance),
            _ => None,
        }
    }
}

/// Constructor for type-erased beans. Other beans can be retrieved from the given provider.
pub type Constructor =
    Arc<dyn Fn(&mut dyn BeanInstanceProvider) -> Result<Bean, ErrorPtr> + Send + Sync>;

/// Definition for a bean registered in a [DefinitionRegistry](crate::registry::DefinitionRegistry).
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct BeanDefinition {
    /// Unique name of the definition.
    pub name: String,

    /// Descriptive type name of the produced object. Typed definitions use
    /// [std::any::type_name], which makes [beans_of_type](crate::factory::BeanFactory::beans_of_type)
    /// lookups possible without instantiating anything.
    pub type_name: String,

    pub capability: Capability,

    pub ordering: Ordering,

    pub role: Role,

    /// Name of the [Scope](crate::scope::Scope) holding instances.
    pub scope_name: String,

    pub source: DefinitionSource,

    /// Lazy beans are not created by
    /// [pre_instantiate_singletons](crate::factory::BeanFactory::pre_instantiate_singletons).
    pub lazy: bool,

    /// Name of the declaration source this bean was created from, if any. Configuration
    /// processing uses it to find configuration candidates.
    pub source_name: Option<String>,

    /// Free-form metadata attached by processors.
    pub attributes: FxHashMap<String, String>,

    #[derivative(Debug = "ignore")]
    pub constructor: Constructor,
}

impl BeanDefinition {
    /// Creates a singleton, unordered definition with given capability.
    pub fn new<N: ToString>(name: N, capability: Capability, constructor: Constructor) -> Self {
        Self {
            name: name.to_string(),
            type_name: String::new(),
            capability,
            ordering: Ordering::Unordered,
            role: Role::Application,
            scope_name: SINGLETON.to_string(),
            source: DefinitionSource::Explicit,
            lazy: false,
            source_name: None,
            attributes: Default::default(),
            constructor,
        }
    }

    /// Creates a definition for an object bean of type `T`.
    pub fn object<N, T, F>(name: N, factory: F) -> Self
    where
        N: ToString,
        T: Any + Send + Sync,
        F: Fn(&mut dyn BeanInstanceProvider) -> Result<T, ErrorPtr> + Send + Sync + 'static,
    {
        let mut definition = Self::new(
            name,
            Capability::Object,
            Arc::new(move |provider: &mut dyn BeanInstanceProvider| {
                factory(provider)
                    .map(|instance| Bean::Object(BeanInstancePtr::new(instance) as BeanInstanceAnyPtr))
            }),
        );
        definition.type_name = type_name::<T>().to_string();
        definition
    }

    /// Creates a definition for a registry processor.
    pub fn registry_processor<N, F>(name: N, ordering: Ordering, factory: F) -> Self
    where
        N: ToString,
        F: Fn(&mut dyn BeanInstanceProvider) -> Result<RegistryProcessorPtr, ErrorPtr>
            + Send
            + Sync
            + 'static,
    {
        Self::new(
            name,
            Capability::RegistryProcessor,
            Arc::new(move |provider: &mut dyn BeanInstanceProvider| {
                factory(provider).map(Bean::RegistryProcessor)
            }),
        )
        .with_ordering(ordering)
    }

    /// Creates a definition for a factory processor.
    pub fn factory_processor<N, F>(name: N, ordering: Ordering, factory: F) -> Self
    where
        N: ToString,
        F: Fn(&mut dyn BeanInstanceProvider) -> Result<FactoryProcessorPtr, ErrorPtr>
            + Send
            + Sync
            + 'static,
    {
        Self::new(
            name,
            Capability::FactoryProcessor,
            Arc::new(move |provider: &mut dyn BeanInstanceProvider| {
                factory(provider).map(Bean::FactoryProcessor)
            }),
        )
        .with_ordering(ordering)
    }

    /// Creates a definition for an instance processor.
    pub fn instance_processor<N, F>(name: N, ordering: Ordering, factory: F) -> Self
    where
        N: ToString,
        F: Fn(&mut dyn BeanInstanceProvider) -> Result<InstanceProcessorPtr, ErrorPtr>
            + Send
            + Sync
            + 'static,
    {
        Self::new(
            name,
            Capability::InstanceProcessor,
            Arc::new(move |provider: &mut dyn BeanInstanceProvider| {
                factory(provider).map(Bean::InstanceProcessor)
            }),
        )
        .with_ordering(ordering)
    }

    pub fn with_ordering(mut self, ordering: Ordering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_scope<T: ToString>(mut self, scope_name: T) -> Self {
        self.scope_name = scope_name.to_string();
        self
    }

    pub fn with_source(mut self, source: DefinitionSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_source_name<T: ToString>(mut self, source_name: T) -> Self {
        self.source_name = Some(source_name.to_string());
        self
    }

    pub fn with_type_name<T: ToString>(mut self, type_name: T) -> Self {
        self.type_name = type_name.to_string();
        self
    }

    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn with_attribute<K: ToString, V: ToString>(mut self, key: K, value: V) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    /// Checks if this definition produces object beans of type `T`.
    pub fn is_type<T: ?Sized + 'static>(&self) -> bool {
        self.capability == Capability::Object && self.type_name == type_name::<T>()
    }

    /// Constructs a bean and verifies it matches the declared capability.
    pub fn construct(
        &self,
        provider: &mut dyn BeanInstanceProvider,
    ) -> Result<Bean, BeanInstanceProviderError> {
        let bean = (self.constructor)(provider).map_err(|source| {
            BeanInstanceProviderError::ConstructorError {
                name: self.name.clone(),
                source,
            }
        })?;

        if bean.capability() != self.capability {
            return Err(BeanInstanceProviderError::IncompatibleBean {
                name: self.name.clone(),
                expected: format!("{:?}", self.capability),
            });
        }

        Ok(bean)
    }
}
