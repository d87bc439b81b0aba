//! Bean instances are contained in [Scope]s - containers which decide when to reuse or create
//! an instance. There's a global one for singletons, but there also can be other, specialized ones.
//! Some can be simple, like [PrototypeScope], while other can be quite complex and depend on
//! external factors, e.g. tying the lifetime of instances to a transaction.
//!
//! Note: scope resolution happens at bean instantiation time, so a [singleton](SINGLETON) bean
//! depending on a [prototype](PROTOTYPE) one keeps the single dependency instance it got at
//! creation time.

use crate::definition::{Bean, BeanDefinition};
use fxhash::FxHashMap;
#[cfg(test)]
use mockall::automock;

pub type ScopePtr = Box<dyn Scope + Send + Sync>;

pub type ScopeFactoryPtr = Box<dyn ScopeFactory + Send + Sync>;

/// Name of the [SingletonScope].
pub const SINGLETON: &str = "SINGLETON";

/// Name of the [PrototypeScope].
pub const PROTOTYPE: &str = "PROTOTYPE";

/// A scope containing bean instances. See module documentation for information on scopes.
#[cfg_attr(test, automock)]
pub trait Scope {
    /// Gets an instance requested for the given definition, if available in this scope.
    fn instance(&self, definition: &BeanDefinition) -> Option<Bean>;

    /// Stores given instance in the scope. The scope might not support storing instances and ignore
    /// it.
    fn store_instance(&mut self, definition: &BeanDefinition, instance: Bean);
}

/// Scope for instances shared between beans.
#[derive(Default)]
pub struct SingletonScope {
    instances: FxHashMap<String, Bean>,
}

impl Scope for SingletonScope {
    #[inline]
    fn instance(&self, definition: &BeanDefinition) -> Option<Bean> {
        self.instances.get(&definition.name).cloned()
    }

    #[inline]
    fn store_instance(&mut self, definition: &BeanDefinition, instance: Bean) {
        self.instances.insert(definition.name.clone(), instance);
    }
}

/// A scope which creates a new instance of a given bean on each request.
#[derive(Default, Copy, Clone, Eq, PartialEq)]
pub struct PrototypeScope;

impl Scope for PrototypeScope {
    #[inline]
    fn instance(&self, _definition: &BeanDefinition) -> Option<Bean> {
        None
    }

    #[inline]
    fn store_instance(&mut self, _definition: &BeanDefinition, _instance: Bean) {}
}

/// Factory for custom [Scope]s.
#[cfg_attr(test, automock)]
pub trait ScopeFactory {
    fn create_scope(&self) -> ScopePtr;
}

#[derive(Copy, Clone, Eq, PartialEq, Default)]
pub struct SingletonScopeFactory;

impl ScopeFactory for SingletonScopeFactory {
    fn create_scope(&self) -> ScopePtr {
        Box::<SingletonScope>::default()
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Default)]
pub struct PrototypeScopeFactory;

impl ScopeFactory for PrototypeScopeFactory {
    fn create_scope(&self) -> ScopePtr {
        Box::<PrototypeScope>::default()
    }
}
