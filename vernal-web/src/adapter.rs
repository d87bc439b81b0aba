//! Adapters invoking handlers of particular types.

use crate::handler::{ControllerPtr, FunctionHandler, Handler, HttpRequestHandlerPtr};
use crate::model::ModelAndView;
use crate::request::{WebRequest, WebResponse};
use crate::return_value::ReturnValueHandlerComposite;
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;
use std::time::SystemTime;
use vernal_beans::error::ErrorPtr;

/// Invokes handlers of supported types on behalf of the
/// [Dispatcher](crate::dispatcher::Dispatcher).
#[cfg_attr(test, automock)]
pub trait HandlerAdapter {
    fn supports(&self, handler: &Handler) -> bool;

    /// Handles the request with given handler, which is guaranteed to be
    /// [supported](HandlerAdapter::supports).
    fn handle(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        handler: &Handler,
    ) -> Result<Option<ModelAndView>, ErrorPtr>;

    /// Last modification time of the resource handled by given handler, if known.
    fn last_modified(&self, _request: &WebRequest, _handler: &Handler) -> Option<SystemTime> {
        None
    }

    /// Adapters with lower order are consulted first.
    fn order(&self) -> i32 {
        crate::strategy::LOWEST_PRECEDENCE
    }
}

pub type HandlerAdapterPtr = Arc<dyn HandlerAdapter + Send + Sync>;

/// Adapter for [HttpRequestHandlers](crate::handler::HttpRequestHandler).
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpRequestHandlerAdapter;

impl HandlerAdapter for HttpRequestHandlerAdapter {
    fn supports(&self, handler: &Handler) -> bool {
        handler.target::<HttpRequestHandlerPtr>().is_some()
    }

    fn handle(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        handler: &Handler,
    ) -> Result<Option<ModelAndView>, ErrorPtr> {
        if let Some(handler) = handler.target::<HttpRequestHandlerPtr>() {
            handler.handle_request(request, response)?;
        }

        Ok(None)
    }
}

/// Adapter for [Controllers](crate::handler::Controller).
#[derive(Clone, Copy, Debug, Default)]
pub struct ControllerHandlerAdapter;

impl HandlerAdapter for ControllerHandlerAdapter {
    fn supports(&self, handler: &Handler) -> bool {
        handler.target::<ControllerPtr>().is_some()
    }

    fn handle(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        handler: &Handler,
    ) -> Result<Option<ModelAndView>, ErrorPtr> {
        match handler.target::<ControllerPtr>() {
            Some(controller) => controller.handle_request(request, response),
            None => Ok(None),
        }
    }

    fn last_modified(&self, request: &WebRequest, handler: &Handler) -> Option<SystemTime> {
        handler
            .target::<ControllerPtr>()
            .and_then(|controller| controller.last_modified(request))
    }
}

/// Adapter for [FunctionHandlers](crate::handler::FunctionHandler), interpreting returned values
/// with a [ReturnValueHandlerComposite].
#[derive(Clone)]
pub struct FunctionHandlerAdapter {
    return_value_handlers: ReturnValueHandlerComposite,
}

impl Default for FunctionHandlerAdapter {
    fn default() -> Self {
        Self::new(ReturnValueHandlerComposite::with_defaults())
    }
}

impl FunctionHandlerAdapter {
    pub fn new(return_value_handlers: ReturnValueHandlerComposite) -> Self {
        Self {
            return_value_handlers,
        }
    }
}

impl HandlerAdapter for FunctionHandlerAdapter {
    fn supports(&self, handler: &Handler) -> bool {
        handler.target::<FunctionHandler>().is_some()
    }

    fn handle(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        handler: &Handler,
    ) -> Result<Option<ModelAndView>, ErrorPtr> {
        let Some(function) = handler.target::<FunctionHandler>() else {
            return Ok(None);
        };

        let value = function.invoke(request)?;
        self.return_value_handlers
            .handle_return_value(value, request, response)
    }
}

#[cfg(test)]
mod tests {
    use crate::adapter::{
        ControllerHandlerAdapter, FunctionHandlerAdapter, HandlerAdapter,
        HttpRequestHandlerAdapter,
    };
    use crate::handler::{
        ControllerPtr, Handler, HttpRequestHandlerPtr, MockController, MockHttpRequestHandler,
    };
    use crate::model::ModelAndView;
    use crate::request::{WebRequest, WebResponse};
    use crate::return_value::ReturnValue;
    use axum::http::{Method, Uri};
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    fn request() -> WebRequest {
        WebRequest::new(Method::GET, Uri::from_static("/"))
    }

    #[test]
    fn should_support_matching_handlers() {
        let controller =
            Handler::controller("controller", Arc::new(MockController::new()) as ControllerPtr);
        let request_handler = Handler::request_handler(
            "request_handler",
            Arc::new(MockHttpRequestHandler::new()) as HttpRequestHandlerPtr,
        );
        let function = Handler::function("function", |_| Ok(ReturnValue::Unit));

        assert!(ControllerHandlerAdapter.supports(&controller));
        assert!(!ControllerHandlerAdapter.supports(&request_handler));
        assert!(HttpRequestHandlerAdapter.supports(&request_handler));
        assert!(!HttpRequestHandlerAdapter.supports(&function));
        assert!(FunctionHandlerAdapter::default().supports(&function));
        assert!(!FunctionHandlerAdapter::default().supports(&controller));
    }

    #[test]
    fn should_delegate_to_controller() {
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);

        let mut controller = MockController::new();
        controller
            .expect_handle_request()
            .times(1)
            .returning(|_, _| Ok(Some(ModelAndView::with_view_name("home"))));
        controller
            .expect_last_modified()
            .returning(move |_| Some(modified));

        let handler = Handler::controller("controller", Arc::new(controller) as ControllerPtr);
        let result = ControllerHandlerAdapter
            .handle(&mut request(), &mut WebResponse::default(), &handler)
            .unwrap()
            .unwrap();

        assert_eq!(result.view_name(), Some("home"));
        assert_eq!(
            ControllerHandlerAdapter.last_modified(&request(), &handler),
            Some(modified)
        );
    }

    #[test]
    fn should_interpret_function_results() {
        let handler = Handler::function("function", |request| {
            Ok(ReturnValue::text(request.path()))
        });

        let mut response = WebResponse::default();
        let result = FunctionHandlerAdapter::default()
            .handle(&mut request(), &mut response, &handler)
            .unwrap();

        assert!(result.is_none());
        assert_eq!(response.body(), b"/");
    }
}
