//! Application context built on top of `vernal-beans`.
//!
//! Bean definitions are derived from declaration [sources](source::SourceDescriptor). A
//! configuration unit can declare nested members, property sources, component scans, imports of
//! other units (directly, via [import selectors](import::ImportSelector) or
//! [import registrars](import::ImportRegistrar)) and factory methods. On
//! [refresh](application::ApplicationContext::refresh), the
//! [configuration processor](configuration_processor::ConfigurationProcessor) resolves the whole
//! configuration graph, guarding against import cycles, evaluates
//! [conditions](condition::Condition) and registers resulting definitions, before any application
//! bean gets created.
//!
//! Placeholders of the form `${key:default}` are resolved against an
//! [Environment](environment::Environment) made of ordered property sources.

pub mod application;
pub mod condition;
pub mod config;
pub mod configuration_processor;
pub mod environment;
pub mod error;
pub mod import;
pub mod materializer;
pub mod problem;
pub mod resolver;
pub mod scanner;
pub mod source;
