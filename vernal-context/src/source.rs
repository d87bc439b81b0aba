//! Declaration sources are the metadata from which configuration is resolved.
//!
//! A [SourceDescriptor] describes a single named declaration: a configuration unit, a component,
//! an import selector or an import registrar, along with its directives (nested members, property
//! sources, scans, imports and factory methods). Sources are looked up by name through a
//! [SourceReader], with [SourceCatalog] being the default in-memory implementation, which can also
//! be filled statically:
//!
//! ```
//! use vernal_context::source::internal::{submit, SourceRegisterer};
//! use vernal_context::source::SourceDescriptor;
//!
//! fn app_config() -> SourceDescriptor {
//!     SourceDescriptor::configuration("app::AppConfig").with_scan("app::services")
//! }
//!
//! submit! {
//!     SourceRegisterer { register: app_config }
//! }
//! ```

use crate::condition::Condition;
use crate::error::SourceError;
use crate::import::{ImportRegistrarPtr, ImportSelectorPtr};
use derivative::Derivative;
use fxhash::FxHashMap;
#[cfg(test)]
use mockall::automock;
use std::any::{type_name, Any};
use std::sync::Arc;
use vernal_beans::definition::{
    Bean, BeanDefinition, Capability, Constructor, DefinitionSource, Ordering, Role,
};
use vernal_beans::error::ErrorPtr;
use vernal_beans::instance_provider::{BeanInstanceAnyPtr, BeanInstanceProvider, BeanInstancePtr};
use vernal_beans::scope::SINGLETON;

pub type SourceReaderPtr = Arc<dyn SourceReader + Send + Sync>;

pub type SelectorFactory = Arc<dyn Fn() -> ImportSelectorPtr + Send + Sync>;

pub type RegistrarFactory = Arc<dyn Fn() -> ImportRegistrarPtr + Send + Sync>;

/// Separator between package segments in source names.
pub const PACKAGE_SEPARATOR: &str = "::";

/// Default bean created for configuration units without an explicit constructor.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ConfigurationBean {
    pub name: String,
}

/// What an imported source contributes.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub enum SourceKind {
    /// Regular unit: configuration, component or plain type.
    Unit,
    /// Selector computing further sources to import.
    Selector(#[derivative(Debug = "ignore")] SelectorFactory),
    /// Registrar contributing definitions directly.
    Registrar(#[derivative(Debug = "ignore")] RegistrarFactory),
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Stereotype {
    /// Full configuration unit.
    Configuration,
    /// Component eligible for scanning.
    Component,
    /// Anything else.
    Plain,
}

/// Request to add property sources to the environment.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct PropertySourceDirective {
    /// Name of the resulting source. Defaults to the location.
    pub name: Option<String>,
    /// Locations, possibly containing placeholders.
    pub locations: Vec<String>,
    /// Skip missing or unresolvable locations instead of failing.
    pub ignore_resource_not_found: bool,
}

/// Request to scan packages for components.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct ScanDirective {
    /// Base packages, possibly containing placeholders. Empty means the package of the declaring
    /// source.
    pub base_packages: Vec<String>,
}

/// Method of a configuration unit producing a bean.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct FactoryMethod {
    pub name: String,
    /// Explicit bean names. The first one is the primary name, the rest become aliases.
    pub bean_names: Vec<String>,
    /// Abstract methods have no body and are only allowed in interfaces.
    pub is_abstract: bool,
    pub capability: Capability,
    pub ordering: Ordering,
    pub role: Role,
    pub scope_name: String,
    pub lazy: bool,
    pub conditions: Vec<Condition>,
    pub type_name: String,
    #[derivative(Debug = "ignore")]
    pub constructor: Option<Constructor>,
}

impl FactoryMethod {
    pub fn new<N: ToString>(name: N, capability: Capability, constructor: Constructor) -> Self {
        Self {
            name: name.to_string(),
            bean_names: vec![],
            is_abstract: false,
            capability,
            ordering: Ordering::Unordered,
            role: Role::Application,
            scope_name: SINGLETON.to_string(),
            lazy: false,
            conditions: vec![],
            type_name: String::new(),
            constructor: Some(constructor),
        }
    }

    /// Creates a method producing an object of type `T`.
    pub fn object<N, T, F>(name: N, factory: F) -> Self
    where
        N: ToString,
        T: Any + Send + Sync,
        F: Fn(&mut dyn BeanInstanceProvider) -> Result<T, ErrorPtr> + Send + Sync + 'static,
    {
        let mut method = Self::new(name, Capability::Object, object_constructor(factory));
        method.type_name = type_name::<T>().to_string();
        method
    }

    /// Creates a method without a body.
    pub fn abstract_method<N: ToString>(name: N) -> Self {
        Self {
            name: name.to_string(),
            bean_names: vec![],
            is_abstract: true,
            capability: Capability::Object,
            ordering: Ordering::Unordered,
            role: Role::Application,
            scope_name: SINGLETON.to_string(),
            lazy: false,
            conditions: vec![],
            type_name: String::new(),
            constructor: None,
        }
    }

    pub fn with_bean_names<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: ToString,
    {
        self.bean_names = names.into_iter().map(|name| name.to_string()).collect();
        self
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

    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Primary bean name: the first explicit name or the method name.
    pub fn bean_name(&self) -> &str {
        self.bean_names
            .first()
            .map(String::as_str)
            .unwrap_or(&self.name)
    }

    /// Additional names for the produced bean.
    pub fn aliases(&self) -> &[String] {
        self.bean_names.get(1..).unwrap_or(&[])
    }

    /// Creates a definition for the bean produced by this method, declared in `unit`.
    pub fn to_definition(&self, unit: &str) -> Option<BeanDefinition> {
        self.constructor.clone().map(|constructor| {
            BeanDefinition::new(self.bean_name(), self.capability, constructor)
                .with_type_name(&self.type_name)
                .with_ordering(self.ordering)
                .with_role(self.role)
                .with_scope(&self.scope_name)
                .with_lazy(self.lazy)
                .with_source(DefinitionSource::FactoryMethod {
                    unit: unit.to_string(),
                    method: self.name.clone(),
                })
        })
    }
}

/// Metadata of a single named declaration.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct SourceDescriptor {
    /// Fully qualified name, with packages separated by `::`.
    pub name: String,
    pub kind: SourceKind,
    pub stereotype: Stereotype,
    /// Order among nested members and deferred selectors.
    pub order: Option<i32>,
    /// Explicit name of the bean created from this source.
    pub bean_name: Option<String>,
    /// Names of nested member sources.
    pub members: Vec<String>,
    pub property_sources: Vec<PropertySourceDirective>,
    pub scans: Vec<ScanDirective>,
    /// Names of directly imported sources.
    pub imports: Vec<String>,
    /// Names of annotation sources, whose imports are collected transitively.
    pub annotations: Vec<String>,
    pub factory_methods: Vec<FactoryMethod>,
    pub interfaces: Vec<String>,
    pub superclass: Option<String>,
    pub is_interface: bool,
    pub conditions: Vec<Condition>,
    /// Annotation-like attributes, e.g. configuration for registrars.
    pub attributes: FxHashMap<String, Vec<String>>,
    pub type_name: String,
    pub capability: Capability,
    pub ordering: Ordering,
    pub lazy: bool,
    #[derivative(Debug = "ignore")]
    pub constructor: Option<Constructor>,
}

impl SourceDescriptor {
    pub fn new<N: ToString>(name: N, kind: SourceKind, stereotype: Stereotype) -> Self {
        Self {
            name: name.to_string(),
            kind,
            stereotype,
            order: None,
            bean_name: None,
            members: vec![],
            property_sources: vec![],
            scans: vec![],
            imports: vec![],
            annotations: vec![],
            factory_methods: vec![],
            interfaces: vec![],
            superclass: None,
            is_interface: false,
            conditions: vec![],
            attributes: Default::default(),
            type_name: String::new(),
            capability: Capability::Object,
            ordering: Ordering::Unordered,
            lazy: false,
            constructor: None,
        }
    }

    #[inline]
    pub fn configuration<N: ToString>(name: N) -> Self {
        Self::new(name, SourceKind::Unit, Stereotype::Configuration)
    }

    #[inline]
    pub fn component<N: ToString>(name: N) -> Self {
        Self::new(name, SourceKind::Unit, Stereotype::Component)
    }

    #[inline]
    pub fn plain<N: ToString>(name: N) -> Self {
        Self::new(name, SourceKind::Unit, Stereotype::Plain)
    }

    pub fn interface<N: ToString>(name: N) -> Self {
        let mut source = Self::plain(name);
        source.is_interface = true;
        source
    }

    pub fn selector<N, F>(name: N, factory: F) -> Self
    where
        N: ToString,
        F: Fn() -> ImportSelectorPtr + Send + Sync + 'static,
    {
        Self::new(name, SourceKind::Selector(Arc::new(factory)), Stereotype::Plain)
    }

    pub fn registrar<N, F>(name: N, factory: F) -> Self
    where
        N: ToString,
        F: Fn() -> ImportRegistrarPtr + Send + Sync + 'static,
    {
        Self::new(name, SourceKind::Registrar(Arc::new(factory)), Stereotype::Plain)
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_bean_name<T: ToString>(mut self, bean_name: T) -> Self {
        self.bean_name = Some(bean_name.to_string());
        self
    }

    pub fn with_member<T: ToString>(mut self, member: T) -> Self {
        self.members.push(member.to_string());
        self
    }

    pub fn with_property_source(mut self, directive: PropertySourceDirective) -> Self {
        self.property_sources.push(directive);
        self
    }

    /// Adds a scan of a single base package.
    pub fn with_scan<T: ToString>(mut self, base_package: T) -> Self {
        self.scans.push(ScanDirective {
            base_packages: vec![base_package.to_string()],
        });
        self
    }

    pub fn with_scan_directive(mut self, directive: ScanDirective) -> Self {
        self.scans.push(directive);
        self
    }

    pub fn with_import<T: ToString>(mut self, import: T) -> Self {
        self.imports.push(import.to_string());
        self
    }

    pub fn with_annotation<T: ToString>(mut self, annotation: T) -> Self {
        self.annotations.push(annotation.to_string());
        self
    }

    pub fn with_factory_method(mut self, method: FactoryMethod) -> Self {
        self.factory_methods.push(method);
        self
    }

    pub fn with_interface<T: ToString>(mut self, interface: T) -> Self {
        self.interfaces.push(interface.to_string());
        self
    }

    pub fn with_superclass<T: ToString>(mut self, superclass: T) -> Self {
        self.superclass = Some(superclass.to_string());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_attribute<K, I, V>(mut self, key: K, values: I) -> Self
    where
        K: ToString,
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        self.attributes.insert(
            key.to_string(),
            values.into_iter().map(|value| value.to_string()).collect(),
        );
        self
    }

    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Sets the constructor of the bean created from this source.
    pub fn with_constructor(
        mut self,
        capability: Capability,
        ordering: Ordering,
        constructor: Constructor,
    ) -> Self {
        self.capability = capability;
        self.ordering = ordering;
        self.constructor = Some(constructor);
        self
    }

    /// Sets an object constructor producing type `T`.
    pub fn with_object<T, F>(mut self, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&mut dyn BeanInstanceProvider) -> Result<T, ErrorPtr> + Send + Sync + 'static,
    {
        self.type_name = type_name::<T>().to_string();
        self.capability = Capability::Object;
        self.constructor = Some(object_constructor(factory));
        self
    }

    /// Checks if this source should be processed as configuration.
    pub fn is_configuration_candidate(&self) -> bool {
        if self.is_interface || !matches!(self.kind, SourceKind::Unit) {
            return false;
        }

        matches!(
            self.stereotype,
            Stereotype::Configuration | Stereotype::Component
        ) || !self.scans.is_empty()
            || !self.imports.is_empty()
            || !self.factory_methods.is_empty()
    }

    /// Package part of the name.
    pub fn package(&self) -> &str {
        self.name
            .rsplit_once(PACKAGE_SEPARATOR)
            .map(|(package, _)| package)
            .unwrap_or("")
    }

    /// Name without the package.
    pub fn short_name(&self) -> &str {
        self.name
            .rsplit_once(PACKAGE_SEPARATOR)
            .map(|(_, name)| name)
            .unwrap_or(&self.name)
    }

    pub fn attribute(&self, key: &str) -> Option<&[String]> {
        self.attributes.get(key).map(Vec::as_slice)
    }

    /// Creates a definition for the bean represented by this source.
    pub fn to_definition<N: ToString>(&self, bean_name: N) -> BeanDefinition {
        let (constructor, type_name) = match &self.constructor {
            Some(constructor) => (constructor.clone(), self.type_name.clone()),
            None => {
                let name = self.name.clone();
                (
                    object_constructor(move |_| {
                        Ok(ConfigurationBean { name: name.clone() })
                    }),
                    type_name::<ConfigurationBean>().to_string(),
                )
            }
        };

        BeanDefinition::new(bean_name, self.capability, constructor)
            .with_type_name(type_name)
            .with_ordering(self.ordering)
            .with_lazy(self.lazy)
            .with_source_name(&self.name)
    }
}

fn object_constructor<T, F>(factory: F) -> Constructor
where
    T: Any + Send + Sync,
    F: Fn(&mut dyn BeanInstanceProvider) -> Result<T, ErrorPtr> + Send + Sync + 'static,
{
    Arc::new(move |provider: &mut dyn BeanInstanceProvider| {
        factory(provider)
            .map(|instance| Bean::Object(BeanInstancePtr::new(instance) as BeanInstanceAnyPtr))
    })
}

/// Lookup of declaration sources.
#[cfg_attr(test, automock)]
pub trait SourceReader {
    /// Reads the source with given name.
    fn read(&self, name: &str) -> Result<SourceDescriptor, SourceError>;

    /// Returns names of all known sources, in registration order.
    fn names(&self) -> Vec<String>;

    /// Returns factory method names of given source in their actual declaration order, if known.
    /// Primary metadata may not preserve declaration order, in which case this secondary
    /// information is used to restore it.
    fn declaration_order(&self, name: &str) -> Option<Vec<String>>;
}

/// In-memory source registry.
#[derive(Clone, Debug, Default)]
pub struct SourceCatalog {
    sources: FxHashMap<String, SourceDescriptor>,
    names: Vec<String>,
    declaration_orders: FxHashMap<String, Vec<String>>,
}

impl SourceCatalog {
    /// Creates a catalog with all sources submitted via [internal::SourceRegisterer].
    pub fn from_static() -> Result<Self, SourceError> {
        let mut catalog = Self::default();

        for registerer in inventory::iter::<internal::SourceRegisterer> {
            catalog.register((registerer.register)())?;
        }

        Ok(catalog)
    }

    pub fn register(&mut self, source: SourceDescriptor) -> Result<(), SourceError> {
        if self.sources.contains_key(&source.name) {
            return Err(SourceError::Duplicate(source.name));
        }

        self.names.push(source.name.clone());
        self.sources.insert(source.name.clone(), source);
        Ok(())
    }

    pub fn with_source(mut self, source: SourceDescriptor) -> Result<Self, SourceError> {
        self.register(source)?;
        Ok(self)
    }

    pub fn set_declaration_order<N, I, M>(&mut self, name: N, methods: I)
    where
        N: ToString,
        I: IntoIterator<Item = M>,
        M: ToString,
    {
        self.declaration_orders.insert(
            name.to_string(),
            methods.into_iter().map(|method| method.to_string()).collect(),
        );
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl SourceReader for SourceCatalog {
    fn read(&self, name: &str) -> Result<SourceDescriptor, SourceError> {
        self.sources
            .get(name)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(name.to_string()))
    }

    fn names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn declaration_order(&self, name: &str) -> Option<Vec<String>> {
        self.declaration_orders.get(name).cloned()
    }
}

#[doc(hidden)]
pub mod internal {
    use crate::source::SourceDescriptor;
    use inventory::collect;
    pub use inventory::submit;

    pub struct SourceRegisterer {
        pub register: fn() -> SourceDescriptor,
    }

    collect!(SourceRegisterer);
}
