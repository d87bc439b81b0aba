use crate::problem::Problem;
use itertools::Itertools;
use thiserror::Error;
use vernal_beans::error::{
    BeanInstanceProviderError, DefinitionRegistryError, ErrorPtr, ProcessorError,
};

/// Errors related to reading and resolving property values.
#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum EnvironmentError {
    #[error("Could not resolve placeholder '{placeholder}' in value \"{value}\"")]
    UnresolvablePlaceholder { placeholder: String, value: String },
    #[error("Circular placeholder reference '{0}' in property definitions")]
    CircularPlaceholder(String),
    #[error("Property source named '{0}' does not exist")]
    MissingPropertySource(String),
    #[error("Property source location '{location}' not found: {message}")]
    ResourceNotFound { location: String, message: String },
    #[error("Error loading property source from '{location}': {message}")]
    Load { location: String, message: String },
}

impl EnvironmentError {
    /// Checks if the error can be ignored for property sources allowing missing resources.
    pub fn is_resource_not_found(&self) -> bool {
        matches!(
            self,
            EnvironmentError::UnresolvablePlaceholder { .. }
                | EnvironmentError::ResourceNotFound { .. }
        )
    }
}

/// Errors related to source metadata lookup.
#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum SourceError {
    #[error("Cannot find declaration source: {0}")]
    NotFound(String),
    #[error("Duplicate declaration source: {0}")]
    Duplicate(String),
}

/// Errors reported by the application context and configuration processing.
#[derive(Error, Debug)]
pub enum ContextError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("Failed to parse configuration source '{name}': {source}")]
    ParseFailure {
        name: String,
        #[source]
        source: ErrorPtr,
    },
    #[error("Failed to process import candidates for configuration unit '{unit}': {source}")]
    ImportProcessing {
        unit: String,
        #[source]
        source: ErrorPtr,
    },
    #[error("Configuration problems found:\n{}", .0.iter().map(|problem| problem.to_string()).join("\n"))]
    ConfigurationProblems(Vec<Problem>),
    #[error("At least one property source location is required in '{0}'")]
    MissingPropertySourceLocation(String),
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
    #[error(transparent)]
    Registry(#[from] DefinitionRegistryError),
    #[error("Import selector '{selector}' failed: {source}")]
    Selector {
        selector: String,
        #[source]
        source: ErrorPtr,
    },
    #[error("Import registrar imported by '{unit}' failed: {source}")]
    Registrar {
        unit: String,
        #[source]
        source: ErrorPtr,
    },
    #[error("Bean name '{bean}' derived from a factory method clashes with the bean name of its containing unit '{unit}'")]
    BeanNameClash { bean: String, unit: String },
    #[error("Bean name '{name}' for source '{source_name}' conflicts with existing, non-compatible definition of same name")]
    ConflictingDefinition { name: String, source_name: String },
    #[error("Bean name '{name}' derived from factory method '{method}' of '{unit}' would override an existing definition")]
    DefinitionOverride {
        name: String,
        method: String,
        unit: String,
    },
    #[error("At least one base package must be specified")]
    NoBasePackages,
    #[error("Application context has already been refreshed")]
    AlreadyRefreshed,
    #[error(transparent)]
    Processor(#[from] ProcessorError),
    #[error(transparent)]
    Instance(#[from] BeanInstanceProviderError),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
}
