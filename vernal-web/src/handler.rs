//! Request handlers. A [Handler] is type-erased, since mappings can return anything which some
//! [HandlerAdapter](crate::adapter::HandlerAdapter) knows how to invoke. Built-in adapters support
//! [Controller], [HttpRequestHandler] and [FunctionHandler].

use crate::model::ModelAndView;
use crate::request::{WebRequest, WebResponse};
use crate::return_value::ReturnValue;
#[cfg(test)]
use mockall::automock;
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::SystemTime;
use vernal_beans::error::ErrorPtr;
use vernal_beans::instance_provider::BeanInstanceAnyPtr;

/// Classic handler returning an optional [ModelAndView]. `None` means the response has been
/// written directly.
#[cfg_attr(test, automock)]
pub trait Controller {
    fn handle_request(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
    ) -> Result<Option<ModelAndView>, ErrorPtr>;

    /// Last modification time of the resource, used to answer conditional `GET` and `HEAD`
    /// requests.
    fn last_modified(&self, _request: &WebRequest) -> Option<SystemTime> {
        None
    }
}

pub type ControllerPtr = Arc<dyn Controller + Send + Sync>;

/// Handler which always writes the response itself.
#[cfg_attr(test, automock)]
pub trait HttpRequestHandler {
    fn handle_request(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
    ) -> Result<(), ErrorPtr>;
}

pub type HttpRequestHandlerPtr = Arc<dyn HttpRequestHandler + Send + Sync>;

pub type HandlerFunction =
    Arc<dyn Fn(&mut WebRequest) -> Result<ReturnValue, ErrorPtr> + Send + Sync>;

/// Plain function handler. Its [ReturnValue] is interpreted by
/// [ReturnValueHandlers](crate::return_value::ReturnValueHandler).
#[derive(Clone)]
pub struct FunctionHandler {
    function: HandlerFunction,
}

impl FunctionHandler {
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(&mut WebRequest) -> Result<ReturnValue, ErrorPtr> + Send + Sync + 'static,
    {
        Self {
            function: Arc::new(function),
        }
    }

    #[inline]
    pub fn invoke(&self, request: &mut WebRequest) -> Result<ReturnValue, ErrorPtr> {
        (self.function)(request)
    }
}

/// Named, type-erased handler.
#[derive(Clone)]
pub struct Handler {
    name: String,
    target: BeanInstanceAnyPtr,
}

impl Debug for Handler {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler").field("name", &self.name).finish()
    }
}

impl Handler {
    /// Wraps any target. Objects created from bean definitions can be used directly.
    pub fn new<N: ToString>(name: N, target: BeanInstanceAnyPtr) -> Self {
        Self {
            name: name.to_string(),
            target,
        }
    }

    pub fn controller<N: ToString>(name: N, controller: ControllerPtr) -> Self {
        Self::new(name, Arc::new(controller) as BeanInstanceAnyPtr)
    }

    pub fn request_handler<N: ToString>(name: N, handler: HttpRequestHandlerPtr) -> Self {
        Self::new(name, Arc::new(handler) as BeanInstanceAnyPtr)
    }

    pub fn function<N, F>(name: N, function: F) -> Self
    where
        N: ToString,
        F: Fn(&mut WebRequest) -> Result<ReturnValue, ErrorPtr> + Send + Sync + 'static,
    {
        Self::new(name, Arc::new(FunctionHandler::new(function)) as BeanInstanceAnyPtr)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the target if it is of type `T`.
    pub fn target<T: Any>(&self) -> Option<&T> {
        self.target.downcast_ref::<T>()
    }
}
