//! Context configuration is based on a [ContextConfigProvider], which can later be used to
//! retrieve [ContextConfig]. The [ApplicationContext](crate::application::ApplicationContext) uses
//! the config to configure itself, and registers the provider as a bean so it can be retrieved by
//! any other bean.
//!
//! By default, the config is created with opinionated default values, which can then be overwritten
//! by environment variables prefixed with `VERNAL_` or `vernal.json` file.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::sync::Arc;
use vernal_beans::error::ErrorPtr;

/// Prefix for environment variables overriding framework configuration.
pub const CONFIG_ENV_PREFIX: &str = "VERNAL";

/// Name of the default config file.
pub const CONFIG_FILE: &str = "vernal.json";

/// Name of the bean holding the [ContextConfigProvider].
pub const CONTEXT_CONFIG_PROVIDER_NAME: &str = "context_config_provider";

pub type ContextConfigProviderPtr = Arc<dyn ContextConfigProvider + Send + Sync>;

/// Reads framework configuration with the `config` crate: an optional [CONFIG_FILE] overridden by
/// environment variables with [CONFIG_ENV_PREFIX].
pub fn load_config<T: for<'de> Deserialize<'de>>() -> Result<T, ConfigError> {
    Config::builder()
        .add_source(File::with_name(CONFIG_FILE).required(false))
        .add_source(Environment::with_prefix(CONFIG_ENV_PREFIX))
        .build()
        .and_then(|config| config.try_deserialize::<T>())
}

/// Application context configuration which can be provided by a [ContextConfigProvider].
#[non_exhaustive]
#[derive(Clone, Debug)]
pub struct ContextConfig {
    /// Should a default tracing logger be installed when the context is created.
    pub install_tracing_logger: bool,
    /// Can definitions with the same name replace each other.
    pub allow_definition_overriding: bool,
    /// Should all eager singletons be created on refresh.
    pub pre_instantiate_singletons: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            install_tracing_logger: true,
            allow_definition_overriding: true,
            pre_instantiate_singletons: true,
        }
    }
}

impl From<OptionalContextConfig> for ContextConfig {
    fn from(value: OptionalContextConfig) -> Self {
        let default = Self::default();
        Self {
            install_tracing_logger: value
                .install_tracing_logger
                .unwrap_or(default.install_tracing_logger),
            allow_definition_overriding: value
                .allow_definition_overriding
                .unwrap_or(default.allow_definition_overriding),
            pre_instantiate_singletons: value
                .pre_instantiate_singletons
                .unwrap_or(default.pre_instantiate_singletons),
        }
    }
}

impl ContextConfig {
    pub fn init_from_environment() -> Result<Self, ConfigError> {
        load_config::<OptionalContextConfig>().map(|config| config.into())
    }

    pub fn with_install_tracing_logger(mut self, install_tracing_logger: bool) -> Self {
        self.install_tracing_logger = install_tracing_logger;
        self
    }

    pub fn with_allow_definition_overriding(mut self, allow_definition_overriding: bool) -> Self {
        self.allow_definition_overriding = allow_definition_overriding;
        self
    }

    pub fn with_pre_instantiate_singletons(mut self, pre_instantiate_singletons: bool) -> Self {
        self.pre_instantiate_singletons = pre_instantiate_singletons;
        self
    }
}

/// Provider for [ContextConfig].
pub trait ContextConfigProvider {
    fn config(&self) -> Result<&ContextConfig, ErrorPtr>;
}

/// Provider reading the config from the environment once.
pub struct DefaultContextConfigProvider {
    // cached init result
    config: Result<ContextConfig, ErrorPtr>,
}

impl DefaultContextConfigProvider {
    pub fn new() -> Self {
        Self {
            config: ContextConfig::init_from_environment()
                .map_err(|error| Arc::new(error) as ErrorPtr),
        }
    }
}

impl Default for DefaultContextConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ContextConfig> for DefaultContextConfigProvider {
    fn from(config: ContextConfig) -> Self {
        Self { config: Ok(config) }
    }
}

impl ContextConfigProvider for DefaultContextConfigProvider {
    fn config(&self) -> Result<&ContextConfig, ErrorPtr> {
        match &self.config {
            Ok(config) => Ok(config),
            Err(error) => Err(error.clone()),
        }
    }
}

#[derive(Deserialize)]
struct OptionalContextConfig {
    install_tracing_logger: Option<bool>,
    allow_definition_overriding: Option<bool>,
    pre_instantiate_singletons: Option<bool>,
}

#[cfg(test)]
mod tests {
    use crate::config::{ContextConfig, OptionalContextConfig};

    #[test]
    fn should_merge_optional_values_over_defaults() {
        let config: ContextConfig = OptionalContextConfig {
            install_tracing_logger: Some(false),
            allow_definition_overriding: None,
            pre_instantiate_singletons: None,
        }
        .into();

        assert!(!config.install_tracing_logger);
        assert!(config.allow_definition_overriding);
        assert!(config.pre_instantiate_singletons);
    }
}
