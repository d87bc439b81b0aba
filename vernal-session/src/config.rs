//! Session configuration, read the same way as the context configuration, from the `session` key of
//! the framework config file or `VERNAL_SESSION__*` environment variables.

use crate::session::ExecutorType;
use config::ConfigError;
use serde::Deserialize;
use vernal_context::config::load_config;

#[non_exhaustive]
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Executor type of templates created without an explicit one.
    pub executor_type: ExecutorType,
    /// Should scanned mappers be added to the session configuration, unless the scan says
    /// otherwise.
    pub add_mappers_to_registry: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            executor_type: ExecutorType::Simple,
            add_mappers_to_registry: true,
        }
    }
}

impl From<OptionalSessionConfig> for SessionConfig {
    fn from(value: OptionalSessionConfig) -> Self {
        let default = Self::default();
        Self {
            executor_type: value.executor_type.unwrap_or(default.executor_type),
            add_mappers_to_registry: value
                .add_mappers_to_registry
                .unwrap_or(default.add_mappers_to_registry),
        }
    }
}

impl SessionConfig {
    pub fn init_from_environment() -> Result<Self, ConfigError> {
        load_config::<OptionalSessionConfigWrapper>()
            .map(|config| config.session.map(|config| config.into()).unwrap_or_default())
    }

    pub fn with_executor_type(mut self, executor_type: ExecutorType) -> Self {
        self.executor_type = executor_type;
        self
    }

    pub fn with_add_mappers_to_registry(mut self, add_mappers_to_registry: bool) -> Self {
        self.add_mappers_to_registry = add_mappers_to_registry;
        self
    }
}

#[derive(Deserialize)]
struct OptionalSessionConfig {
    executor_type: Option<ExecutorType>,
    add_mappers_to_registry: Option<bool>,
}

#[derive(Deserialize)]
struct OptionalSessionConfigWrapper {
    session: Option<OptionalSessionConfig>,
}
