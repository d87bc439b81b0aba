use crate::definition::{Capability, ProcessorTier};
use std::error::Error;
use std::sync::Arc;
use thiserror::Error;

/// Type-erased error produced by user code: constructors, processors, selectors.
pub type ErrorPtr = Arc<dyn Error + Send + Sync>;

/// Errors related to creating and retrieving bean instances.
#[derive(Error, Clone, Debug)]
pub enum BeanInstanceProviderError {
    #[error("Cannot find a bean definition named: {0}")]
    NoDefinition(String),
    #[error("Bean '{name}' is not of the expected type {expected}")]
    IncompatibleBean { name: String, expected: String },
    #[error("Detected dependency cycle while creating bean: {0}")]
    DependencyCycle(String),
    #[error("Unrecognized scope: {0}")]
    UnrecognizedScope(String),
    #[error("Error constructing bean '{name}': {source}")]
    ConstructorError {
        name: String,
        #[source]
        source: ErrorPtr,
    },
    #[error("Instance processor failed for bean '{name}': {source}")]
    InstanceProcessorError {
        name: String,
        #[source]
        source: ErrorPtr,
    },
}

/// Errors related to definition registries.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum DefinitionRegistryError {
    #[error("Attempted to register a duplicated bean definition with name: {0}")]
    DuplicateDefinitionName(String),
    #[error("No bean definition registered with name: {0}")]
    MissingDefinition(String),
    #[error("Cannot register alias '{alias}' for '{name}' - the alias is already in use")]
    DuplicateAlias { alias: String, name: String },
}

/// Errors aborting processor orchestration.
#[derive(Error, Clone, Debug)]
pub enum ProcessorError {
    #[error("Error retrieving processor '{name}': {source}")]
    Instantiation {
        name: String,
        #[source]
        source: BeanInstanceProviderError,
    },
    #[error("Processor '{name}' failed: {source}")]
    ProcessorFailed {
        name: String,
        #[source]
        source: ErrorPtr,
    },
    #[error("Processor '{name}' with capability {capability:?} was registered after its {tier:?} tier had already completed")]
    LateTierRegistration {
        name: String,
        capability: Capability,
        tier: ProcessorTier,
    },
}
