//! Bean container with ordered definition registry and multi-tier post-processing.
//!
//! Beans are described by [BeanDefinition](definition::BeanDefinition)s held in a
//! [DefinitionRegistry](registry::DefinitionRegistry), which preserves registration order. The
//! [BeanFactory](factory::BeanFactory) creates beans on demand, storing them in
//! [scopes](scope). Before any application bean is created, registry and factory processors run in
//! priority tiers via [invoke_factory_processors](processor::invoke_factory_processors), which lets
//! them add or modify definitions. Instance processors, registered by
//! [register_instance_processors](processor::register_instance_processors), can then wrap every
//! newly created object bean.
//!
//! Definitions can be registered manually, by processors, or statically with
//! [internal::submit](registry::internal::submit):
//!
//! ```
//! use vernal_beans::definition::BeanDefinition;
//! use vernal_beans::registry::internal::{submit, DefinitionRegisterer};
//!
//! fn greeting() -> BeanDefinition {
//!     BeanDefinition::object("greeting", |_| Ok("hello".to_string()))
//! }
//!
//! submit! {
//!     DefinitionRegisterer { register: greeting }
//! }
//! ```

pub mod definition;
pub mod error;
pub mod factory;
pub mod instance_provider;
pub mod processor;
pub mod registry;
pub mod scope;
