//! Default strategies used by the [Dispatcher](crate::dispatcher::Dispatcher) when the bean
//! factory does not provide its own. Each strategy is created by a factory function, so defaults
//! can depend on other beans.

use crate::adapter::{
    ControllerHandlerAdapter, FunctionHandlerAdapter, HandlerAdapterPtr, HttpRequestHandlerAdapter,
};
use crate::error::WebError;
use crate::exception::{
    DefaultHandlerExceptionResolver, HandlerExceptionResolverPtr, ResponseStatusExceptionResolver,
};
use crate::mapping::{BeanNameHandlerMapping, HandlerMappingPtr};
use crate::view::{
    PathViewNameTranslator, UrlBasedViewResolver, ViewNameTranslatorPtr, ViewResolverPtr,
};
use itertools::Itertools;
use std::sync::Arc;
use vernal_beans::error::ErrorPtr;
use vernal_beans::factory::BeanFactory;

/// Order of strategies which should be consulted last.
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

/// Default directory of view templates.
pub const DEFAULT_VIEW_PREFIX: &str = "templates";

/// Default extension of view templates.
pub const DEFAULT_VIEW_SUFFIX: &str = ".html";

pub type StrategyFactory<T> = Arc<dyn Fn(&mut BeanFactory) -> Result<T, ErrorPtr> + Send + Sync>;

/// Factories for default strategies, per contract.
#[derive(Clone)]
pub struct DispatcherStrategies {
    handler_mappings: Vec<StrategyFactory<HandlerMappingPtr>>,
    handler_adapters: Vec<StrategyFactory<HandlerAdapterPtr>>,
    exception_resolvers: Vec<StrategyFactory<HandlerExceptionResolverPtr>>,
    view_resolvers: Vec<StrategyFactory<ViewResolverPtr>>,
    view_name_translators: Vec<StrategyFactory<ViewNameTranslatorPtr>>,
}

impl Default for DispatcherStrategies {
    fn default() -> Self {
        Self::empty()
            .with_handler_mapping(|factory| {
                BeanNameHandlerMapping::from_factory(factory)
                    .map(|mapping| Arc::new(mapping) as HandlerMappingPtr)
            })
            .with_handler_adapter(|_| Ok(Arc::new(HttpRequestHandlerAdapter) as HandlerAdapterPtr))
            .with_handler_adapter(|_| Ok(Arc::new(ControllerHandlerAdapter) as HandlerAdapterPtr))
            .with_handler_adapter(|_| {
                Ok(Arc::new(FunctionHandlerAdapter::default()) as HandlerAdapterPtr)
            })
            .with_exception_resolver(|_| {
                Ok(Arc::new(ResponseStatusExceptionResolver) as HandlerExceptionResolverPtr)
            })
            .with_exception_resolver(|_| {
                Ok(Arc::new(DefaultHandlerExceptionResolver) as HandlerExceptionResolverPtr)
            })
            .with_view_resolver(|_| {
                Ok(Arc::new(UrlBasedViewResolver::new(
                    DEFAULT_VIEW_PREFIX,
                    DEFAULT_VIEW_SUFFIX,
                )) as ViewResolverPtr)
            })
            .with_view_name_translator(|_| {
                Ok(Arc::new(PathViewNameTranslator::default()) as ViewNameTranslatorPtr)
            })
    }
}

impl DispatcherStrategies {
    /// Creates strategies without any defaults.
    pub fn empty() -> Self {
        Self {
            handler_mappings: vec![],
            handler_adapters: vec![],
            exception_resolvers: vec![],
            view_resolvers: vec![],
            view_name_translators: vec![],
        }
    }

    pub fn with_handler_mapping<F>(mut self, factory: F) -> Self
    where
        F: Fn(&mut BeanFactory) -> Result<HandlerMappingPtr, ErrorPtr> + Send + Sync + 'static,
    {
        self.handler_mappings.push(Arc::new(factory));
        self
    }

    pub fn with_handler_adapter<F>(mut self, factory: F) -> Self
    where
        F: Fn(&mut BeanFactory) -> Result<HandlerAdapterPtr, ErrorPtr> + Send + Sync + 'static,
    {
        self.handler_adapters.push(Arc::new(factory));
        self
    }

    pub fn with_exception_resolver<F>(mut self, factory: F) -> Self
    where
        F: Fn(&mut BeanFactory) -> Result<HandlerExceptionResolverPtr, ErrorPtr>
            + Send
            + Sync
            + 'static,
    {
        self.exception_resolvers.push(Arc::new(factory));
        self
    }

    pub fn with_view_resolver<F>(mut self, factory: F) -> Self
    where
        F: Fn(&mut BeanFactory) -> Result<ViewResolverPtr, ErrorPtr> + Send + Sync + 'static,
    {
        self.view_resolvers.push(Arc::new(factory));
        self
    }

    pub fn with_view_name_translator<F>(mut self, factory: F) -> Self
    where
        F: Fn(&mut BeanFactory) -> Result<ViewNameTranslatorPtr, ErrorPtr> + Send + Sync + 'static,
    {
        self.view_name_translators.push(Arc::new(factory));
        self
    }

    pub fn handler_mappings(&self, factory: &mut BeanFactory) -> Result<Vec<HandlerMappingPtr>, ErrorPtr> {
        create_all(&self.handler_mappings, factory)
    }

    pub fn handler_adapters(&self, factory: &mut BeanFactory) -> Result<Vec<HandlerAdapterPtr>, ErrorPtr> {
        create_all(&self.handler_adapters, factory)
    }

    pub fn exception_resolvers(
        &self,
        factory: &mut BeanFactory,
    ) -> Result<Vec<HandlerExceptionResolverPtr>, ErrorPtr> {
        create_all(&self.exception_resolvers, factory)
    }

    pub fn view_resolvers(&self, factory: &mut BeanFactory) -> Result<Vec<ViewResolverPtr>, ErrorPtr> {
        create_all(&self.view_resolvers, factory)
    }

    /// Creates the single default [ViewNameTranslator](crate::view::ViewNameTranslator). Fails
    /// unless exactly one default is present.
    pub fn view_name_translator(
        &self,
        factory: &mut BeanFactory,
    ) -> Result<ViewNameTranslatorPtr, ErrorPtr> {
        create_single(&self.view_name_translators, factory, "ViewNameTranslator")
    }
}

fn create_all<T>(
    factories: &[StrategyFactory<T>],
    bean_factory: &mut BeanFactory,
) -> Result<Vec<T>, ErrorPtr> {
    factories
        .iter()
        .map(|factory| factory(bean_factory))
        .try_collect()
}

fn create_single<T>(
    factories: &[StrategyFactory<T>],
    bean_factory: &mut BeanFactory,
    contract: &str,
) -> Result<T, ErrorPtr> {
    match factories {
        [factory] => factory(bean_factory),
        _ => Err(Arc::new(WebError::StrategyInitialization {
            contract: contract.to_string(),
        }) as ErrorPtr),
    }
}
