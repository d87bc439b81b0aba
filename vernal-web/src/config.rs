//! Web configuration is based on a [WebConfigProvider], which can later be used to retrieve
//! [WebConfig].
//!
//! By default, the config is created with opinionated default values, which can then be overwritten
//! by values from `vernal.json` file under the `web` key, or `VERNAL_WEB__*` environment variables.

use config::ConfigError;
use fxhash::FxHashMap;
use serde::Deserialize;
use std::sync::Arc;
use vernal_beans::error::ErrorPtr;
use vernal_beans::factory::BeanFactory;
use vernal_beans::instance_provider::TypedBeanInstanceProvider;
use vernal_context::config::load_config;

/// Name of the bean holding the [WebConfigProvider], if any.
pub const WEB_CONFIG_PROVIDER_NAME: &str = "web_config_provider";

pub type WebConfigProviderPtr = Arc<dyn WebConfigProvider + Send + Sync>;

/// Server configuration.
#[non_exhaustive]
#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    /// Address on which to listen.
    pub listen_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:80".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn new<T: ToString>(listen_address: T) -> Self {
        Self {
            listen_address: listen_address.to_string(),
        }
    }
}

/// Configuration of strategy detection and dispatching.
#[non_exhaustive]
#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    /// Detect all handler mapping beans, instead of only the `handler_mapping` one.
    pub detect_all_handler_mappings: bool,
    /// Detect all handler adapter beans, instead of only the `handler_adapter` one.
    pub detect_all_handler_adapters: bool,
    /// Detect all exception resolver beans, instead of only the `handler_exception_resolver` one.
    pub detect_all_exception_resolvers: bool,
    /// Detect all view resolver beans, instead of only the `view_resolver` one.
    pub detect_all_view_resolvers: bool,
    /// Raise [WebError::NoHandlerFound](crate::error::WebError::NoHandlerFound) for unmapped
    /// requests, so it can be resolved like any other error, instead of responding with 404
    /// directly.
    pub throw_exception_if_no_handler_found: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            detect_all_handler_mappings: true,
            detect_all_handler_adapters: true,
            detect_all_exception_resolvers: true,
            detect_all_view_resolvers: true,
            throw_exception_if_no_handler_found: false,
        }
    }
}

impl From<OptionalDispatcherConfig> for DispatcherConfig {
    fn from(value: OptionalDispatcherConfig) -> Self {
        let default = Self::default();
        Self {
            detect_all_handler_mappings: value
                .detect_all_handler_mappings
                .unwrap_or(default.detect_all_handler_mappings),
            detect_all_handler_adapters: value
                .detect_all_handler_adapters
                .unwrap_or(default.detect_all_handler_adapters),
            detect_all_exception_resolvers: value
                .detect_all_exception_resolvers
                .unwrap_or(default.detect_all_exception_resolvers),
            detect_all_view_resolvers: value
                .detect_all_view_resolvers
                .unwrap_or(default.detect_all_view_resolvers),
            throw_exception_if_no_handler_found: value
                .throw_exception_if_no_handler_found
                .unwrap_or(default.throw_exception_if_no_handler_found),
        }
    }
}

impl DispatcherConfig {
    pub fn with_detect_all_handler_mappings(mut self, detect_all_handler_mappings: bool) -> Self {
        self.detect_all_handler_mappings = detect_all_handler_mappings;
        self
    }

    pub fn with_detect_all_handler_adapters(mut self, detect_all_handler_adapters: bool) -> Self {
        self.detect_all_handler_adapters = detect_all_handler_adapters;
        self
    }

    pub fn with_detect_all_exception_resolvers(
        mut self,
        detect_all_exception_resolvers: bool,
    ) -> Self {
        self.detect_all_exception_resolvers = detect_all_exception_resolvers;
        self
    }

    pub fn with_detect_all_view_resolvers(mut self, detect_all_view_resolvers: bool) -> Self {
        self.detect_all_view_resolvers = detect_all_view_resolvers;
        self
    }

    pub fn with_throw_exception_if_no_handler_found(
        mut self,
        throw_exception_if_no_handler_found: bool,
    ) -> Self {
        self.throw_exception_if_no_handler_found = throw_exception_if_no_handler_found;
        self
    }
}

/// Web configuration which can be provided by a [WebConfigProvider].
#[non_exhaustive]
#[derive(Clone, Debug)]
pub struct WebConfig {
    /// Map from server name to their config. Typically, only one server with one address will be
    /// present, but in case multiple servers are desired, they should be specified here.
    pub servers: FxHashMap<String, ServerConfig>,
    pub dispatcher: DispatcherConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            servers: [("default".to_string(), Default::default())]
                .into_iter()
                .collect(),
            dispatcher: Default::default(),
        }
    }
}

impl From<OptionalWebConfig> for WebConfig {
    fn from(value: OptionalWebConfig) -> Self {
        let default = Self::default();
        Self {
            servers: value.servers.unwrap_or(default.servers),
            dispatcher: value
                .dispatcher
                .map(|dispatcher| dispatcher.into())
                .unwrap_or(default.dispatcher),
        }
    }
}

impl WebConfig {
    pub fn init_from_environment() -> Result<Self, ConfigError> {
        load_config::<OptionalWebConfigWrapper>()
            .map(|config| config.web.map(|config| config.into()).unwrap_or_default())
    }

    /// Replaces all servers with a single one.
    pub fn with_server<N: ToString>(mut self, name: N, server: ServerConfig) -> Self {
        self.servers = [(name.to_string(), server)].into_iter().collect();
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: DispatcherConfig) -> Self {
        self.dispatcher = dispatcher;
        self
    }
}

/// Provider for [WebConfig]. Register an instance under [WEB_CONFIG_PROVIDER_NAME] to override the
/// default one.
pub trait WebConfigProvider {
    fn config(&self) -> Result<&WebConfig, ErrorPtr>;
}

/// Provider reading the config from the environment once.
pub struct DefaultWebConfigProvider {
    // cached init result
    config: Result<WebConfig, ErrorPtr>,
}

impl WebConfigProvider for DefaultWebConfigProvider {
    fn config(&self) -> Result<&WebConfig, ErrorPtr> {
        match &self.config {
            Ok(config) => Ok(config),
            Err(error) => Err(error.clone()),
        }
    }
}

impl DefaultWebConfigProvider {
    pub fn new() -> Self {
        Self {
            config: WebConfig::init_from_environment()
                .map_err(|error| Arc::new(error) as ErrorPtr),
        }
    }
}

impl Default for DefaultWebConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Provider returning a fixed config.
#[derive(Clone, Debug, Default)]
pub struct StaticWebConfigProvider {
    config: WebConfig,
}

impl StaticWebConfigProvider {
    pub fn new(config: WebConfig) -> Self {
        Self { config }
    }
}

impl WebConfigProvider for StaticWebConfigProvider {
    fn config(&self) -> Result<&WebConfig, ErrorPtr> {
        Ok(&self.config)
    }
}

/// Returns the config from the provider registered under [WEB_CONFIG_PROVIDER_NAME], or from a
/// [DefaultWebConfigProvider] if there's none.
pub fn web_config(factory: &mut BeanFactory) -> Result<WebConfig, ErrorPtr> {
    let provider = factory
        .instance_option::<WebConfigProviderPtr>(WEB_CONFIG_PROVIDER_NAME)
        .map_err(|error| Arc::new(error) as ErrorPtr)?;

    match provider {
        Some(provider) => provider.config().cloned(),
        None => DefaultWebConfigProvider::new().config().cloned(),
    }
}

#[derive(Deserialize)]
struct OptionalDispatcherConfig {
    detect_all_handler_mappings: Option<bool>,
    detect_all_handler_adapters: Option<bool>,
    detect_all_exception_resolvers: Option<bool>,
    detect_all_view_resolvers: Option<bool>,
    throw_exception_if_no_handler_found: Option<bool>,
}

#[derive(Deserialize)]
struct OptionalWebConfig {
    servers: Option<FxHashMap<String, ServerConfig>>,
    dispatcher: Option<OptionalDispatcherConfig>,
}

#[derive(Deserialize)]
struct OptionalWebConfigWrapper {
    web: Option<OptionalWebConfig>,
}

#[cfg(test)]
mod tests {
    use crate::config::{OptionalDispatcherConfig, OptionalWebConfig, WebConfig};

    #[test]
    fn should_merge_optional_values_over_defaults() {
        let config: WebConfig = OptionalWebConfig {
            servers: None,
            dispatcher: Some(OptionalDispatcherConfig {
                detect_all_handler_mappings: Some(false),
                detect_all_handler_adapters: None,
                detect_all_exception_resolvers: None,
                detect_all_view_resolvers: None,
                throw_exception_if_no_handler_found: Some(true),
            }),
        }
        .into();

        assert_eq!(config.servers["default"].listen_address, "0.0.0.0:80");
        assert!(!config.dispatcher.detect_all_handler_mappings);
        assert!(config.dispatcher.detect_all_handler_adapters);
        assert!(config.dispatcher.throw_exception_if_no_handler_found);
    }

    #[test]
    fn should_deserialize_servers() {
        let config: WebConfig = serde_json::from_str::<OptionalWebConfig>(
            r#"{"servers": {"api": {"listen_address": "127.0.0.1:8080"}}}"#,
        )
        .unwrap()
        .into();

        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers["api"].listen_address, "127.0.0.1:8080");
    }
}
