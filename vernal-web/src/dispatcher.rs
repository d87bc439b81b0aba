//! The front controller. A [Dispatcher] routes each request through the strategies detected at
//! initialization:
//!
//! 1. the first [HandlerMapping](crate::mapping::HandlerMapping) returning a handler wins; with no handler, the response is a 404
//!    or [WebError::NoHandlerFound] is raised, depending on configuration
//! 2. the first [HandlerAdapter](crate::adapter::HandlerAdapter) supporting the handler invokes it
//! 3. `GET` and `HEAD` requests for resources not modified since `If-Modified-Since` get a 304
//! 4. interceptors pre-handle the request, possibly stopping processing
//! 5. the handler runs and a default view name is applied if it returned a model without a view
//! 6. interceptors post-handle the request in reverse order
//! 7. errors raised along the way are passed to [HandlerExceptionResolvers](crate::exception::HandlerExceptionResolver)
//! 8. the resulting [ModelAndView] is rendered
//! 9. interceptors which pre-handled the request are notified of completion, in reverse order

use crate::adapter::HandlerAdapterPtr;
use crate::config::{web_config, DispatcherConfig};
use crate::error::WebError;
use crate::exception::HandlerExceptionResolverPtr;
use crate::handler::Handler;
use crate::interceptor::HandlerExecutionChain;
use crate::mapping::HandlerMappingPtr;
use crate::model::{ModelAndView, ViewReference};
use crate::request::{WebRequest, WebResponse};
use crate::strategy::DispatcherStrategies;
use crate::view::{ViewNameTranslatorPtr, ViewPtr, ViewResolverPtr};
use axum::headers::{HeaderMapExt, IfModifiedSince, LastModified};
use axum::http::{Method, StatusCode};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, trace, warn};
use vernal_beans::error::ErrorPtr;
use vernal_beans::factory::BeanFactory;
use vernal_beans::instance_provider::TypedBeanInstanceProvider;
use vernal_context::application::ApplicationContext;

/// Bean name of the single [HandlerMapping](crate::mapping::HandlerMapping) used when not detecting all of them.
pub const HANDLER_MAPPING_BEAN_NAME: &str = "handler_mapping";

/// Bean name of the single [HandlerAdapter](crate::adapter::HandlerAdapter) used when not detecting all of them.
pub const HANDLER_ADAPTER_BEAN_NAME: &str = "handler_adapter";

/// Bean name of the single
/// [HandlerExceptionResolver](crate::exception::HandlerExceptionResolver) used when not detecting all of them.
pub const HANDLER_EXCEPTION_RESOLVER_BEAN_NAME: &str = "handler_exception_resolver";

/// Bean name of the single [ViewResolver](crate::view::ViewResolver) used when not detecting all of them.
pub const VIEW_RESOLVER_BEAN_NAME: &str = "view_resolver";

/// Bean name of the [ViewNameTranslator](crate::view::ViewNameTranslator).
pub const VIEW_NAME_TRANSLATOR_BEAN_NAME: &str = "view_name_translator";

/// Bean name of custom [DispatcherStrategies].
pub const DISPATCHER_STRATEGIES_BEAN_NAME: &str = "dispatcher_strategies";

/// Request attribute holding the message of an error resolved without a view.
pub const ERROR_ATTRIBUTE: &str = "vernal_web.error";

pub type DispatcherPtr = Arc<Dispatcher>;

enum HandleOutcome {
    // response is complete
    Complete,
    Render(Option<ModelAndView>),
}

/// Central dispatcher for requests.
pub struct Dispatcher {
    handler_mappings: Vec<HandlerMappingPtr>,
    handler_adapters: Vec<HandlerAdapterPtr>,
    exception_resolvers: Vec<HandlerExceptionResolverPtr>,
    view_resolvers: Vec<ViewResolverPtr>,
    view_name_translator: ViewNameTranslatorPtr,
    throw_exception_if_no_handler_found: bool,
}

impl Dispatcher {
    /// Detects strategies in given factory. Depending on configuration, either all beans of a
    /// given contract are used, or only the one with the well-known name. If none are found,
    /// defaults are created from `strategies`. Strategies are sorted by their order.
    pub fn initialize(
        factory: &mut BeanFactory,
        config: &DispatcherConfig,
        strategies: &DispatcherStrategies,
    ) -> Result<Self, ErrorPtr> {
        let mut handler_mappings = detect_strategies::<HandlerMappingPtr>(
            factory,
            config.detect_all_handler_mappings,
            HANDLER_MAPPING_BEAN_NAME,
            "HandlerMapping",
        )?;
        if handler_mappings.is_empty() {
            debug!("No handler mappings declared, using default strategies.");
            handler_mappings = strategies.handler_mappings(factory)?;
        }
        handler_mappings.sort_by_key(|mapping| mapping.order());

        let mut handler_adapters = detect_strategies::<HandlerAdapterPtr>(
            factory,
            config.detect_all_handler_adapters,
            HANDLER_ADAPTER_BEAN_NAME,
            "HandlerAdapter",
        )?;
        if handler_adapters.is_empty() {
            debug!("No handler adapters declared, using default strategies.");
            handler_adapters = strategies.handler_adapters(factory)?;
        }
        handler_adapters.sort_by_key(|adapter| adapter.order());

        let mut exception_resolvers = detect_strategies::<HandlerExceptionResolverPtr>(
            factory,
            config.detect_all_exception_resolvers,
            HANDLER_EXCEPTION_RESOLVER_BEAN_NAME,
            "HandlerExceptionResolver",
        )?;
        if exception_resolvers.is_empty() {
            debug!("No exception resolvers declared, using default strategies.");
            exception_resolvers = strategies.exception_resolvers(factory)?;
        }
        exception_resolvers.sort_by_key(|resolver| resolver.order());

        let mut view_resolvers = detect_strategies::<ViewResolverPtr>(
            factory,
            config.detect_all_view_resolvers,
            VIEW_RESOLVER_BEAN_NAME,
            "ViewResolver",
        )?;
        if view_resolvers.is_empty() {
            debug!("No view resolvers declared, using default strategies.");
            view_resolvers = strategies.view_resolvers(factory)?;
        }
        view_resolvers.sort_by_key(|resolver| resolver.order());

        let view_name_translator = match detect_strategies::<ViewNameTranslatorPtr>(
            factory,
            false,
            VIEW_NAME_TRANSLATOR_BEAN_NAME,
            "ViewNameTranslator",
        )?
        .pop()
        {
            Some(view_name_translator) => view_name_translator,
            None => strategies.view_name_translator(factory)?,
        };

        debug!(
            handler_mappings = handler_mappings.len(),
            handler_adapters = handler_adapters.len(),
            exception_resolvers = exception_resolvers.len(),
            view_resolvers = view_resolvers.len(),
            "Initialized dispatcher."
        );

        Ok(Self {
            handler_mappings,
            handler_adapters,
            exception_resolvers,
            view_resolvers,
            view_name_translator,
            throw_exception_if_no_handler_found: config.throw_exception_if_no_handler_found,
        })
    }

    /// Initializes a dispatcher with the [WebConfig](crate::config::WebConfig) and
    /// [DispatcherStrategies] registered in given context, falling back to defaults.
    pub fn from_context(context: &mut ApplicationContext) -> Result<Self, ErrorPtr> {
        let factory = context.factory_mut();
        let config = web_config(factory)?;
        let strategies = factory
            .instance_option::<DispatcherStrategies>(DISPATCHER_STRATEGIES_BEAN_NAME)
            .map_err(|error| Arc::new(error) as ErrorPtr)?
            .map(|strategies| strategies.as_ref().clone())
            .unwrap_or_default();

        Self::initialize(factory, &config.dispatcher, &strategies)
    }

    /// Processes a request, turning unresolved errors into a 500 response.
    pub fn serve(&self, mut request: WebRequest) -> WebResponse {
        let mut response = WebResponse::default();
        if let Err(error) = self.dispatch(&mut request, &mut response) {
            error!(
                method = %request.method(),
                path = request.path(),
                %error,
                "Request processing failed."
            );

            response = WebResponse::default();
            response.send_error::<&str>(StatusCode::INTERNAL_SERVER_ERROR, None);
        }

        response
    }

    /// Processes a request. Errors which no
    /// [HandlerExceptionResolver](crate::exception::HandlerExceptionResolver) resolved are returned.
    pub fn dispatch(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
    ) -> Result<(), ErrorPtr> {
        trace!(
            method = %request.method(),
            path = request.path(),
            "Dispatching request."
        );

        let mut chain = None;
        let (model_and_view, error) = match self.handle(request, response, &mut chain) {
            Ok(HandleOutcome::Complete) => return Ok(()),
            Ok(HandleOutcome::Render(model_and_view)) => (model_and_view, None),
            Err(error) => (None, Some(error)),
        };

        let result =
            self.process_dispatch_result(request, response, chain.as_ref(), model_and_view, error);

        if let Some(chain) = &chain {
            chain.trigger_after_completion(request, response, result.as_ref().err());
        }

        result
    }

    fn handle(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        chain: &mut Option<HandlerExecutionChain>,
    ) -> Result<HandleOutcome, ErrorPtr> {
        let Some(found) = self.handler(request)? else {
            self.no_handler_found(request, response)?;
            return Ok(HandleOutcome::Complete);
        };

        let chain = chain.insert(found);
        let adapter = self.handler_adapter(chain.handler())?;

        if *request.method() == Method::GET || *request.method() == Method::HEAD {
            let last_modified = adapter.last_modified(request, chain.handler());
            if let Some(last_modified) = last_modified {
                if check_not_modified(request, response, last_modified) {
                    trace!(path = request.path(), "Resource not modified.");
                    return Ok(HandleOutcome::Complete);
                }
            }
        }

        if !chain.apply_pre_handle(request, response)? {
            return Ok(HandleOutcome::Complete);
        }

        let mut model_and_view = adapter.handle(request, response, chain.handler())?;
        if let Some(model_and_view) = &mut model_and_view {
            self.apply_default_view_name(request, model_and_view)?;
        }

        chain.apply_post_handle(request, response, &mut model_and_view)?;
        Ok(HandleOutcome::Render(model_and_view))
    }

    fn handler(&self, request: &mut WebRequest) -> Result<Option<HandlerExecutionChain>, ErrorPtr> {
        for mapping in &self.handler_mappings {
            if let Some(chain) = mapping.handler(request)? {
                return Ok(Some(chain));
            }
        }

        Ok(None)
    }

    fn handler_adapter(&self, handler: &Handler) -> Result<&HandlerAdapterPtr, ErrorPtr> {
        self.handler_adapters
            .iter()
            .find(|adapter| adapter.supports(handler))
            .ok_or_else(|| {
                Arc::new(WebError::NoHandlerAdapter {
                    handler: handler.name().to_string(),
                }) as ErrorPtr
            })
    }

    fn no_handler_found(
        &self,
        request: &WebRequest,
        response: &mut WebResponse,
    ) -> Result<(), ErrorPtr> {
        if self.throw_exception_if_no_handler_found {
            return Err(Arc::new(WebError::NoHandlerFound {
                method: request.method().clone(),
                path: request.path().to_string(),
            }) as ErrorPtr);
        }

        warn!(
            target: "vernal_web::page_not_found",
            method = %request.method(),
            path = request.path(),
            "No mapping for request."
        );

        response.send_error::<&str>(StatusCode::NOT_FOUND, None);
        Ok(())
    }

    fn apply_default_view_name(
        &self,
        request: &WebRequest,
        model_and_view: &mut ModelAndView,
    ) -> Result<(), ErrorPtr> {
        if !model_and_view.has_view() {
            if let Some(view_name) = self.view_name_translator.view_name(request)? {
                model_and_view.set_view_name(view_name);
            }
        }

        Ok(())
    }

    fn process_dispatch_result(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        chain: Option<&HandlerExecutionChain>,
        model_and_view: Option<ModelAndView>,
        error: Option<ErrorPtr>,
    ) -> Result<(), ErrorPtr> {
        let model_and_view = match error {
            Some(error) => self.process_handler_exception(
                request,
                response,
                chain.map(HandlerExecutionChain::handler),
                error,
            )?,
            None => model_and_view,
        };

        match model_and_view {
            Some(model_and_view) if !model_and_view.was_cleared() => {
                self.render(&model_and_view, request, response)
            }
            _ => Ok(()),
        }
    }

    fn process_handler_exception(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        handler: Option<&Handler>,
        error: ErrorPtr,
    ) -> Result<Option<ModelAndView>, ErrorPtr> {
        let resolved = self
            .exception_resolvers
            .iter()
            .find_map(|resolver| resolver.resolve_exception(request, response, handler, &error));

        let Some(mut model_and_view) = resolved else {
            return Err(error);
        };

        if model_and_view.is_empty() {
            request.set_attribute(ERROR_ATTRIBUTE, Value::String(error.to_string()));
            return Ok(None);
        }

        debug!(%error, "Using resolved error view.");
        self.apply_default_view_name(request, &mut model_and_view)?;
        Ok(Some(model_and_view))
    }

    fn render(
        &self,
        model_and_view: &ModelAndView,
        request: &WebRequest,
        response: &mut WebResponse,
    ) -> Result<(), ErrorPtr> {
        if let Some(status) = model_and_view.status() {
            response.set_status(status);
        }

        let view = match model_and_view.view() {
            Some(ViewReference::Name(view_name)) => self.resolve_view_name(view_name)?,
            Some(ViewReference::Instance(view)) => view.clone(),
            None => return Err(Arc::new(WebError::MissingView) as ErrorPtr),
        };

        trace!(path = request.path(), "Rendering view.");
        view.render(model_and_view.model(), request, response)
    }

    fn resolve_view_name(&self, view_name: &str) -> Result<ViewPtr, ErrorPtr> {
        for resolver in &self.view_resolvers {
            if let Some(view) = resolver.resolve_view_name(view_name)? {
                return Ok(view);
            }
        }

        Err(Arc::new(WebError::UnresolvedView {
            view_name: view_name.to_string(),
        }) as ErrorPtr)
    }
}

fn detect_strategies<T: Any + Clone + Send + Sync>(
    factory: &mut BeanFactory,
    detect_all: bool,
    bean_name: &str,
    contract: &str,
) -> Result<Vec<T>, ErrorPtr> {
    let to_error = |source| {
        Arc::new(WebError::StrategyLookup {
            contract: contract.to_string(),
            source,
        }) as ErrorPtr
    };

    if detect_all {
        factory
            .beans_of_type::<T>()
            .map(|beans| {
                beans
                    .into_iter()
                    .map(|(_, strategy)| strategy.as_ref().clone())
                    .collect()
            })
            .map_err(to_error)
    } else {
        factory
            .instance_option::<T>(bean_name)
            .map(|strategy| {
                strategy
                    .map(|strategy| strategy.as_ref().clone())
                    .into_iter()
                    .collect()
            })
            .map_err(to_error)
    }
}

// sets Last-Modified and returns true if the resource has not been modified since the time
// requested by the client
fn check_not_modified(
    request: &WebRequest,
    response: &mut WebResponse,
    last_modified: SystemTime,
) -> bool {
    response
        .headers_mut()
        .typed_insert(LastModified::from(last_modified));

    match request.headers().typed_get::<IfModifiedSince>() {
        Some(if_modified_since) if !if_modified_since.is_modified(last_modified) => {
            response.set_status(StatusCode::NOT_MODIFIED);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use crate::adapter::{HandlerAdapterPtr, MockHandlerAdapter};
    use crate::config::DispatcherConfig;
    use crate::dispatcher::{Dispatcher, ERROR_ATTRIBUTE};
    use crate::error::WebError;
    use crate::exception::{HandlerExceptionResolverPtr, MockHandlerExceptionResolver};
    use crate::handler::{ControllerPtr, Handler, MockController};
    use crate::interceptor::{HandlerInterceptorPtr, MockHandlerInterceptor};
    use crate::mapping::{HandlerMappingPtr, PathPatternHandlerMapping};
    use crate::model::ModelAndView;
    use crate::request::{WebRequest, WebResponse};
    use crate::return_value::ReturnValue;
    use crate::strategy::DispatcherStrategies;
    use crate::view::{MockView, StaticViewResolver, ViewPtr, ViewResolverPtr};
    use axum::headers::{HeaderMapExt, IfModifiedSince};
    use axum::http::{Method, StatusCode, Uri};
    use mockall::Sequence;
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};
    use vernal_beans::definition::BeanDefinition;
    use vernal_beans::error::ErrorPtr;
    use vernal_beans::factory::{BeanFactory, BeanFactoryBuilder};

    fn factory(definitions: Vec<BeanDefinition>) -> BeanFactory {
        let mut factory = BeanFactoryBuilder::new().unwrap().build();
        for definition in definitions {
            factory.registry_mut().register_definition(definition).unwrap();
        }

        factory
    }

    fn mapping_definition(mapping: PathPatternHandlerMapping) -> BeanDefinition {
        BeanDefinition::object("routes", move |_| {
            Ok(Arc::new(mapping.clone()) as HandlerMappingPtr)
        })
    }

    fn dispatcher(definitions: Vec<BeanDefinition>) -> Dispatcher {
        Dispatcher::initialize(
            &mut factory(definitions),
            &DispatcherConfig::default(),
            &DispatcherStrategies::default(),
        )
        .unwrap()
    }

    fn request(method: Method, path: &'static str) -> WebRequest {
        WebRequest::new(method, Uri::from_static(path))
    }

    #[test]
    fn should_respond_not_found_without_handler() {
        let response = dispatcher(vec![]).serve(request(Method::GET, "/missing"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn should_raise_no_handler_found_when_configured() {
        let dispatcher = Dispatcher::initialize(
            &mut factory(vec![]),
            &DispatcherConfig::default().with_throw_exception_if_no_handler_found(true),
            &DispatcherStrategies::default(),
        )
        .unwrap();

        // the default resolver maps the error to 404
        let mut request = request(Method::GET, "/missing");
        let mut response = WebResponse::default();
        dispatcher.dispatch(&mut request, &mut response).unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(request.attribute(ERROR_ATTRIBUTE).is_some());
    }

    #[test]
    fn should_map_bean_names_by_default() {
        let dispatcher = dispatcher(vec![BeanDefinition::object("/hello/{name}", |_| {
            let mut controller = MockController::new();
            controller.expect_last_modified().return_const(None);
            controller.expect_handle_request().returning(|request, response| {
                response.write(format!("hello {}", request.path_variable("name").unwrap_or("")));
                Ok(None)
            });
            Ok(Arc::new(controller) as ControllerPtr)
        })]);

        let response = dispatcher.serve(request(Method::GET, "/hello/world"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), b"hello world");
    }

    #[test]
    fn should_run_interceptors_around_handler() {
        let mut sequence = Sequence::new();
        let mut interceptor = MockHandlerInterceptor::new();
        interceptor
            .expect_pre_handle()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _| Ok(true));
        interceptor
            .expect_post_handle()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _, _| Ok(()));
        interceptor
            .expect_after_completion()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _, error| {
                assert!(error.is_none());
                Ok(())
            });

        let mapping = PathPatternHandlerMapping::new()
            .with_route(
                "/users",
                Handler::function("users", |_| Ok(ReturnValue::text("users"))),
            )
            .unwrap()
            .with_interceptor(Arc::new(interceptor) as HandlerInterceptorPtr);

        let response = dispatcher(vec![mapping_definition(mapping)])
            .serve(request(Method::GET, "/users"));
        assert_eq!(response.body(), b"users");
    }

    #[test]
    fn should_stop_when_pre_handle_fails() {
        let mut interceptor = MockHandlerInterceptor::new();
        interceptor
            .expect_pre_handle()
            .returning(|_, response, _| {
                response.send_error(StatusCode::UNAUTHORIZED, Some("denied"));
                Ok(false)
            });
        interceptor.expect_post_handle().never();
        interceptor.expect_after_completion().never();

        let mapping = PathPatternHandlerMapping::new()
            .with_route(
                "/admin",
                Handler::function("admin", |_| panic!("handler should not run")),
            )
            .unwrap()
            .with_interceptor(Arc::new(interceptor) as HandlerInterceptorPtr);

        let response = dispatcher(vec![mapping_definition(mapping)])
            .serve(request(Method::GET, "/admin"));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.body(), b"denied");
    }

    #[test]
    fn should_render_default_view_name() {
        let mut view = MockView::new();
        view.expect_render().times(1).returning(|model, _, response| {
            response.write(model["user"].as_str().unwrap_or_default());
            Ok(())
        });

        let resolver = StaticViewResolver::default().with_view("users/show", Arc::new(view) as ViewPtr);
        let mapping = PathPatternHandlerMapping::new()
            .with_route(
                "/users/show",
                Handler::function("show", |_| {
                    Ok(ReturnValue::ModelAndView(
                        ModelAndView::new().add_object("user", "alice").unwrap(),
                    ))
                }),
            )
            .unwrap();

        let response = dispatcher(vec![
            mapping_definition(mapping),
            BeanDefinition::object("views", move |_| {
                Ok(Arc::new(resolver.clone()) as ViewResolverPtr)
            }),
        ])
        .serve(request(Method::GET, "/users/show"));

        assert_eq!(response.body(), b"alice");
    }

    #[test]
    fn should_fail_on_unresolved_view() {
        let mapping = PathPatternHandlerMapping::new()
            .with_route(
                "/page",
                Handler::function("page", |_| Ok(ReturnValue::view_name("missing"))),
            )
            .unwrap();

        let mut response = WebResponse::default();
        let error = dispatcher(vec![mapping_definition(mapping)])
            .dispatch(&mut request(Method::GET, "/page"), &mut response)
            .unwrap_err();

        assert!(matches!(
            error.downcast_ref::<WebError>(),
            Some(WebError::UnresolvedView { view_name }) if view_name == "missing"
        ));
    }

    #[test]
    fn should_resolve_handler_errors() {
        let mapping = PathPatternHandlerMapping::new()
            .with_route(
                "/broken",
                Handler::function("broken", |_| {
                    Err(Arc::new(WebError::MissingView) as ErrorPtr)
                }),
            )
            .unwrap();

        let dispatcher = dispatcher(vec![
            mapping_definition(mapping),
            BeanDefinition::object("resolver", |_| {
                let mut resolver = MockHandlerExceptionResolver::new();
                resolver
                    .expect_resolve_exception()
                    .times(1)
                    .returning(|_, response, handler, error| {
                        assert_eq!(handler.map(Handler::name), Some("broken"));
                        response.send_error(StatusCode::BAD_GATEWAY, Some(error.to_string()));
                        Some(ModelAndView::new())
                    });
                resolver.expect_order().return_const(0);

                Ok(Arc::new(resolver) as HandlerExceptionResolverPtr)
            }),
        ]);

        let mut request = request(Method::GET, "/broken");
        let mut response = WebResponse::default();
        dispatcher.dispatch(&mut request, &mut response).unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            request.attribute(ERROR_ATTRIBUTE).and_then(|error| error.as_str()),
            Some(WebError::MissingView.to_string().as_str())
        );
    }

    #[test]
    fn should_answer_not_modified() {
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);

        let mut controller = MockController::new();
        controller.expect_last_modified().returning(move |_| Some(modified));
        controller.expect_handle_request().times(1).returning(|_, response| {
            response.write("fresh");
            Ok(None)
        });

        let controller = Arc::new(controller) as ControllerPtr;
        let mapping = PathPatternHandlerMapping::new()
            .with_route("/report", Handler::controller("report", controller))
            .unwrap();
        let dispatcher = dispatcher(vec![mapping_definition(mapping)]);

        let mut cached = request(Method::GET, "/report");
        let mut headers = axum::http::HeaderMap::new();
        headers.typed_insert(IfModifiedSince::from(modified + Duration::from_secs(10)));
        cached = cached.with_headers(headers);

        let response = dispatcher.serve(cached);
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert!(response.body().is_empty());

        let mut stale = request(Method::GET, "/report");
        let mut headers = axum::http::HeaderMap::new();
        headers.typed_insert(IfModifiedSince::from(modified - Duration::from_secs(10)));
        stale = stale.with_headers(headers);

        let response = dispatcher.serve(stale);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), b"fresh");
    }

    #[test]
    fn should_fail_without_supporting_adapter() {
        let mapping = PathPatternHandlerMapping::new()
            .with_route("/users", Handler::function("users", |_| Ok(ReturnValue::Unit)))
            .unwrap();

        let mut response = WebResponse::default();
        let error = dispatcher(vec![
            mapping_definition(mapping),
            BeanDefinition::object("adapter", move |_| {
                let mut adapter = MockHandlerAdapter::new();
                adapter.expect_supports().return_const(false);
                adapter.expect_order().return_const(0);
                Ok(Arc::new(adapter) as HandlerAdapterPtr)
            }),
        ])
        .dispatch(&mut request(Method::GET, "/users"), &mut response)
        .unwrap_err();

        assert!(matches!(
            error.downcast_ref::<WebError>(),
            Some(WebError::NoHandlerAdapter { handler }) if handler == "users"
        ));
    }
}
