//! The [ApplicationContext] ties together a [BeanFactory], declaration [sources](crate::source)
//! and the [Environment]. Sources are registered explicitly or found by scanning, and
//! [ApplicationContext::refresh] then resolves the whole configuration graph, runs all processors
//! and creates eager singletons.
//!
//! ```
//! use vernal_context::application::ApplicationContextBuilder;
//! use vernal_context::config::ContextConfig;
//! use vernal_context::source::{SourceCatalog, SourceDescriptor};
//! use std::sync::Arc;
//!
//! let catalog = SourceCatalog::default()
//!     .with_source(SourceDescriptor::component("app::Greeter").with_object(|_| Ok("hello")))
//!     .unwrap();
//!
//! let mut context = ApplicationContextBuilder::new()
//!     .with_source_reader(Arc::new(catalog))
//!     .with_config(ContextConfig::default().with_install_tracing_logger(false))
//!     .with_static_definitions(false)
//!     .build()
//!     .unwrap();
//!
//! context.register("app::Greeter").unwrap();
//! context.refresh().unwrap();
//!
//! assert_eq!(*context.bean::<&str>("greeter").unwrap(), "hello");
//! ```

use crate::condition::{should_skip, ConfigurationPhase, SimpleConditionContext};
use crate::config::{
    ContextConfig, ContextConfigProviderPtr, DefaultContextConfigProvider,
    CONTEXT_CONFIG_PROVIDER_NAME,
};
use crate::configuration_processor::{ConfigurationProcessor, CONFIGURATION_PROCESSOR_NAME};
use crate::environment::{ConfigFileLoader, Environment, EnvironmentPtr, PropertySourceLoaderPtr};
use crate::error::ContextError;
use crate::scanner::{
    BeanNameGeneratorPtr, CatalogScanner, ComponentScannerPtr, ScannedComponent,
    SnakeCaseNameGenerator,
};
use crate::source::{SourceCatalog, SourceReaderPtr};
use parking_lot::RwLock;
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use vernal_beans::definition::{BeanDefinition, DefinitionSource, Role};
use vernal_beans::factory::{BeanFactory, BeanFactoryBuilder};
use vernal_beans::instance_provider::{BeanInstancePtr, TypedBeanInstanceProvider};
use vernal_beans::processor::{
    invoke_factory_processors, register_instance_processors, SuppliedProcessor,
};
use vernal_beans::registry::{OrderedDefinitionRegistry, RegistryView};
use vernal_beans::scope::ScopeFactoryPtr;

/// Name of the bean holding the shared [EnvironmentPtr].
pub const ENVIRONMENT_BEAN_NAME: &str = "environment";

/// Installs a default `tracing` subscriber respecting `RUST_LOG`. Does nothing if a global
/// subscriber is already set.
pub fn install_tracing_logger() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init();
}

/// Builder for [ApplicationContext]. Every collaborator has a default, so only the interesting
/// parts need to be set.
#[derive(Default)]
pub struct ApplicationContextBuilder {
    reader: Option<SourceReaderPtr>,
    scanner: Option<ComponentScannerPtr>,
    loader: Option<PropertySourceLoaderPtr>,
    name_generator: Option<BeanNameGeneratorPtr>,
    environment: Option<Environment>,
    config: Option<ContextConfig>,
    scope_factories: Vec<(String, ScopeFactoryPtr)>,
    skip_static_definitions: bool,
}

impl ApplicationContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reader for declaration sources. Defaults to a [SourceCatalog] with all statically
    /// submitted sources.
    pub fn with_source_reader(mut self, reader: SourceReaderPtr) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn with_scanner(mut self, scanner: ComponentScannerPtr) -> Self {
        self.scanner = Some(scanner);
        self
    }

    pub fn with_property_source_loader(mut self, loader: PropertySourceLoaderPtr) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn with_name_generator(mut self, name_generator: BeanNameGeneratorPtr) -> Self {
        self.name_generator = Some(name_generator);
        self
    }

    /// Sets the initial environment. Defaults to [Environment::standard].
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Sets the config. Defaults to [ContextConfig::default], not to the one read from the
    /// environment - see [ApplicationContext::create_default] for that.
    pub fn with_config(mut self, config: ContextConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_scope_factory<T: ToString>(mut self, name: T, factory: ScopeFactoryPtr) -> Self {
        self.scope_factories.push((name.to_string(), factory));
        self
    }

    /// Should statically submitted bean definitions be included in the registry.
    pub fn with_static_definitions(mut self, static_definitions: bool) -> Self {
        self.skip_static_definitions = !static_definitions;
        self
    }

    pub fn build(self) -> Result<ApplicationContext, ContextError> {
        let config = self.config.unwrap_or_default();

        let reader = match self.reader {
            Some(reader) => reader,
            None => Arc::new(SourceCatalog::from_static()?),
        };

        let registry = if self.skip_static_definitions {
            OrderedDefinitionRegistry::new(config.allow_definition_overriding)
        } else {
            OrderedDefinitionRegistry::with_static_definitions(config.allow_definition_overriding)?
        };

        let mut factory_builder =
            BeanFactoryBuilder::new()?.with_definition_registry(Box::new(registry));
        for (name, factory) in self.scope_factories {
            factory_builder = factory_builder.with_scope_factory(name, factory);
        }

        Ok(ApplicationContext {
            factory: factory_builder.build(),
            reader,
            scanner: self
                .scanner
                .unwrap_or_else(|| Arc::new(CatalogScanner::default())),
            loader: self.loader.unwrap_or_else(|| Arc::new(ConfigFileLoader)),
            name_generator: self
                .name_generator
                .unwrap_or_else(|| Arc::new(SnakeCaseNameGenerator)),
            environment: Arc::new(RwLock::new(
                self.environment.unwrap_or_else(Environment::standard),
            )),
            config,
            supplied: vec![],
            refreshed: false,
        })
    }
}

/// Central application container. Holds the bean factory along with everything needed to turn
/// declaration sources into bean definitions.
pub struct ApplicationContext {
    factory: BeanFactory,
    reader: SourceReaderPtr,
    scanner: ComponentScannerPtr,
    loader: PropertySourceLoaderPtr,
    name_generator: BeanNameGeneratorPtr,
    environment: EnvironmentPtr,
    config: ContextConfig,
    supplied: Vec<SuppliedProcessor>,
    refreshed: bool,
}

impl ApplicationContext {
    /// Creates a context with config read from the environment and sources submitted statically.
    /// Installs the default tracing logger, if configured.
    pub fn create_default() -> Result<Self, ContextError> {
        let config = ContextConfig::init_from_environment()?;
        if config.install_tracing_logger {
            install_tracing_logger();
        }

        ApplicationContextBuilder::new().with_config(config).build()
    }

    /// Registers a definition for the named source, unless its conditions say otherwise. Returns
    /// the bean name, if registered.
    pub fn register(&mut self, source_name: &str) -> Result<Option<String>, ContextError> {
        let source = self.reader.read(source_name)?;

        let phase = if source.is_configuration_candidate() {
            ConfigurationPhase::ParseConfiguration
        } else {
            ConfigurationPhase::RegisterBean
        };

        {
            let environment = self.environment.read();
            let registry = RegistryView::new(self.factory.registry());
            let context = SimpleConditionContext::new(&registry, &environment);

            if should_skip(&source.conditions, &source.name, phase, &context) {
                debug!(source = source_name, "Skipping registration due to conditions.");
                return Ok(None);
            }
        }

        let bean_name = self.name_generator.generate(&source);
        debug!(bean_name = bean_name.as_str(), source = source_name, "Registering source.");

        self.factory.registry_mut().register_definition(
            source
                .to_definition(&bean_name)
                .with_source(DefinitionSource::Explicit),
        )?;

        Ok(Some(bean_name))
    }

    /// Scans given packages for components and registers them.
    pub fn scan(&mut self, base_packages: &[String]) -> Result<Vec<ScannedComponent>, ContextError> {
        if base_packages.is_empty() {
            return Err(ContextError::NoBasePackages);
        }

        let environment = self.environment.read();
        self.scanner.scan_packages(
            base_packages,
            None,
            &*self.reader,
            &environment,
            self.factory.registry_mut(),
        )
    }

    /// Adds a processor which will run before any registered one of the same kind.
    pub fn add_processor(&mut self, processor: SuppliedProcessor) {
        self.supplied.push(processor);
    }

    /// Processes configuration and prepares all beans. Can only be called once.
    pub fn refresh(&mut self) -> Result<(), ContextError> {
        if self.refreshed {
            return Err(ContextError::AlreadyRefreshed);
        }

        self.refreshed = true;

        info!("Refreshing application context...");

        self.register_infrastructure()?;

        invoke_factory_processors(&mut self.factory, &self.supplied)?;
        register_instance_processors(&mut self.factory)?;

        if self.config.pre_instantiate_singletons {
            self.factory.pre_instantiate_singletons()?;
        }

        info!(
            definitions = self.factory.registry().len(),
            "Application context refreshed."
        );

        Ok(())
    }

    #[inline]
    pub fn is_refreshed(&self) -> bool {
        self.refreshed
    }

    #[inline]
    pub fn factory(&self) -> &BeanFactory {
        &self.factory
    }

    #[inline]
    pub fn factory_mut(&mut self) -> &mut BeanFactory {
        &mut self.factory
    }

    #[inline]
    pub fn environment(&self) -> &EnvironmentPtr {
        &self.environment
    }

    #[inline]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Returns an object bean with given name.
    pub fn bean<T: Any + Send + Sync>(
        &mut self,
        name: &str,
    ) -> Result<BeanInstancePtr<T>, ContextError> {
        Ok(self.factory.instance_typed::<T>(name)?)
    }

    /// Returns all object beans of given type, in registration order.
    pub fn beans_of_type<T: Any + Send + Sync>(
        &mut self,
    ) -> Result<Vec<(String, BeanInstancePtr<T>)>, ContextError> {
        Ok(self.factory.beans_of_type::<T>()?)
    }

    fn register_infrastructure(&mut self) -> Result<(), ContextError> {
        let registry = self.factory.registry_mut();

        if !registry.contains_definition(CONFIGURATION_PROCESSOR_NAME) {
            registry.register_definition(ConfigurationProcessor::definition(
                self.reader.clone(),
                self.scanner.clone(),
                self.loader.clone(),
                self.environment.clone(),
            ))?;
        }

        if !registry.contains_definition(ENVIRONMENT_BEAN_NAME) {
            let environment = self.environment.clone();
            registry.register_definition(
                BeanDefinition::object(ENVIRONMENT_BEAN_NAME, move |_| Ok(environment.clone()))
                    .with_role(Role::Infrastructure)
                    .with_source(DefinitionSource::Infrastructure),
            )?;
        }

        if !registry.contains_definition(CONTEXT_CONFIG_PROVIDER_NAME) {
            let provider: ContextConfigProviderPtr =
                Arc::new(DefaultContextConfigProvider::from(self.config.clone()));
            registry.register_definition(
                BeanDefinition::object(CONTEXT_CONFIG_PROVIDER_NAME, move |_| {
                    Ok(provider.clone())
                })
                .with_role(Role::Infrastructure)
                .with_source(DefinitionSource::Infrastructure),
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::application::{ApplicationContext, ApplicationContextBuilder, ENVIRONMENT_BEAN_NAME};
    use crate::condition::Condition;
    use crate::config::{ContextConfig, ContextConfigProviderPtr, CONTEXT_CONFIG_PROVIDER_NAME};
    use crate::environment::{Environment, EnvironmentPtr, PropertySource};
    use crate::error::ContextError;
    use crate::source::{FactoryMethod, SourceCatalog, SourceDescriptor};
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;
    use vernal_beans::error::ErrorPtr;
    use vernal_beans::factory::BeanFactory;
    use vernal_beans::processor::{FactoryPostProcessor, SuppliedProcessor};

    fn create_context(catalog: SourceCatalog, environment: Environment) -> ApplicationContext {
        ApplicationContextBuilder::new()
            .with_source_reader(Arc::new(catalog))
            .with_environment(environment)
            .with_config(ContextConfig::default().with_install_tracing_logger(false))
            .with_static_definitions(false)
            .build()
            .unwrap()
    }

    #[test]
    fn should_refresh_configuration_with_factory_methods() {
        let catalog = SourceCatalog::default()
            .with_source(
                SourceDescriptor::configuration("app::AppConfig")
                    .with_factory_method(FactoryMethod::object("port", |_| Ok(8080_u16))),
            )
            .unwrap();

        let mut context = create_context(catalog, Environment::default());
        assert_eq!(
            context.register("app::AppConfig").unwrap().as_deref(),
            Some("app_config")
        );

        context.refresh().unwrap();

        assert_eq!(*context.bean::<u16>("port").unwrap(), 8080);
        assert!(context.factory().contains_bean(ENVIRONMENT_BEAN_NAME));
        assert!(context
            .bean::<EnvironmentPtr>(ENVIRONMENT_BEAN_NAME)
            .is_ok());
        assert!(!context
            .bean::<ContextConfigProviderPtr>(CONTEXT_CONFIG_PROVIDER_NAME)
            .unwrap()
            .config()
            .unwrap()
            .install_tracing_logger);
    }

    #[test]
    fn should_skip_registration_on_failed_condition() {
        let catalog = SourceCatalog::default()
            .with_source(
                SourceDescriptor::component("app::Feature")
                    .with_condition(Condition::on_property("feature.enabled", None)),
            )
            .unwrap()
            .with_source(
                SourceDescriptor::component("app::Enabled")
                    .with_condition(Condition::on_property("enabled", Some("yes".to_string()))),
            )
            .unwrap();

        let mut environment = Environment::default();
        environment.add_last(PropertySource::from_map(
            "test",
            [("enabled".to_string(), "yes".to_string())]
                .into_iter()
                .collect(),
        ));

        let mut context = create_context(catalog, environment);
        assert!(context.register("app::Feature").unwrap().is_none());
        assert_eq!(
            context.register("app::Enabled").unwrap().as_deref(),
            Some("enabled")
        );
    }

    #[test]
    fn should_require_packages_to_scan() {
        let mut context = create_context(SourceCatalog::default(), Environment::default());
        assert!(matches!(
            context.scan(&[]).unwrap_err(),
            ContextError::NoBasePackages
        ));
    }

    #[test]
    fn should_scan_packages() {
        let catalog = SourceCatalog::default()
            .with_source(SourceDescriptor::component("app::services::Users"))
            .unwrap()
            .with_source(SourceDescriptor::component("other::Orders"))
            .unwrap();

        let mut context = create_context(catalog, Environment::default());
        let components = context.scan(&["app".to_string()]).unwrap();

        assert_eq!(components.len(), 1);
        assert!(context.factory().contains_bean("users"));
        assert!(!context.factory().contains_bean("orders"));
    }

    #[test]
    fn should_refresh_only_once() {
        let mut context = create_context(SourceCatalog::default(), Environment::default());
        context.refresh().unwrap();

        assert!(context.is_refreshed());
        assert!(matches!(
            context.refresh().unwrap_err(),
            ContextError::AlreadyRefreshed
        ));
    }

    #[test]
    fn should_run_supplied_processors() {
        struct CountingProcessor(Arc<AtomicUsize>);

        impl FactoryPostProcessor for CountingProcessor {
            fn process_factory(&self, _factory: &mut BeanFactory) -> Result<(), ErrorPtr> {
                self.0.fetch_add(1, AtomicOrdering::SeqCst);
                Ok(())
            }
        }

        let count = Arc::new(AtomicUsize::new(0));
        let mut context = create_context(SourceCatalog::default(), Environment::default());
        context.add_processor(SuppliedProcessor::Factory(
            "counting".to_string(),
            Arc::new(CountingProcessor(count.clone())),
        ));

        context.refresh().unwrap();
        assert_eq!(count.load(AtomicOrdering::SeqCst), 1);
    }
}
