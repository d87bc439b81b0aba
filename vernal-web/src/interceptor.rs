//! Handler interceptors and the execution chain wrapping a handler with them.

use crate::handler::Handler;
use crate::model::ModelAndView;
use crate::request::{WebRequest, WebResponse};
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;
use tracing::error;
use vernal_beans::error::ErrorPtr;

/// Workflow interceptor around handler execution.
#[cfg_attr(test, automock)]
pub trait HandlerInterceptor {
    /// Called before the handler. Returning `false` stops processing, in which case the
    /// interceptor is responsible for writing the response.
    fn pre_handle(
        &self,
        _request: &mut WebRequest,
        _response: &mut WebResponse,
        _handler: &Handler,
    ) -> Result<bool, ErrorPtr> {
        Ok(true)
    }

    /// Called after successful handler execution, but before rendering.
    fn post_handle(
        &self,
        _request: &mut WebRequest,
        _response: &mut WebResponse,
        _handler: &Handler,
        _model_and_view: &mut Option<ModelAndView>,
    ) -> Result<(), ErrorPtr> {
        Ok(())
    }

    /// Called after request processing is complete, for every interceptor whose
    /// [pre_handle](HandlerInterceptor::pre_handle) returned `true`.
    fn after_completion<'a>(
        &self,
        _request: &mut WebRequest,
        _response: &mut WebResponse,
        _handler: &Handler,
        _error: Option<&'a ErrorPtr>,
    ) -> Result<(), ErrorPtr> {
        Ok(())
    }
}

pub type HandlerInterceptorPtr = Arc<dyn HandlerInterceptor + Send + Sync>;

/// Handler with its interceptors. Created per request by
/// [HandlerMappings](crate::mapping::HandlerMapping).
#[derive(Clone)]
pub struct HandlerExecutionChain {
    handler: Handler,
    interceptors: Vec<HandlerInterceptorPtr>,
    // index of the last interceptor which successfully pre-handled the request
    interceptor_index: Option<usize>,
}

impl HandlerExecutionChain {
    pub fn new(handler: Handler) -> Self {
        Self {
            handler,
            interceptors: vec![],
            interceptor_index: None,
        }
    }

    pub fn with_interceptors(handler: Handler, interceptors: Vec<HandlerInterceptorPtr>) -> Self {
        Self {
            handler,
            interceptors,
            interceptor_index: None,
        }
    }

    pub fn add_interceptor(&mut self, interceptor: HandlerInterceptorPtr) {
        self.interceptors.push(interceptor);
    }

    #[inline]
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    #[inline]
    pub fn interceptors(&self) -> &[HandlerInterceptorPtr] {
        &self.interceptors
    }

    /// Runs `pre_handle` in order. Returns `false` if an interceptor stopped processing, after
    /// triggering completion for the ones which already ran.
    pub fn apply_pre_handle(
        &mut self,
        request: &mut WebRequest,
        response: &mut WebResponse,
    ) -> Result<bool, ErrorPtr> {
        for (index, interceptor) in self.interceptors.iter().enumerate() {
            if !interceptor.pre_handle(request, response, &self.handler)? {
                self.trigger_after_completion(request, response, None);
                return Ok(false);
            }

            self.interceptor_index = Some(index);
        }

        Ok(true)
    }

    /// Runs `post_handle` in reverse order.
    pub fn apply_post_handle(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        model_and_view: &mut Option<ModelAndView>,
    ) -> Result<(), ErrorPtr> {
        for interceptor in self.interceptors.iter().rev() {
            interceptor.post_handle(request, response, &self.handler, model_and_view)?;
        }

        Ok(())
    }

    /// Runs `after_completion` in reverse order on interceptors which pre-handled the request.
    /// Errors are logged and do not stop remaining interceptors.
    pub fn trigger_after_completion(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        error: Option<&ErrorPtr>,
    ) {
        let Some(interceptor_index) = self.interceptor_index else {
            return;
        };

        for interceptor in self.interceptors[..=interceptor_index].iter().rev() {
            if let Err(error) = interceptor.after_completion(request, response, &self.handler, error)
            {
                error!(
                    handler = self.handler.name(),
                    %error,
                    "Interceptor after completion failed."
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::handler::{ControllerPtr, Handler, MockController};
    use crate::interceptor::{HandlerExecutionChain, HandlerInterceptorPtr, MockHandlerInterceptor};
    use crate::request::{WebRequest, WebResponse};
    use axum::http::{Method, Uri};
    use mockall::Sequence;
    use std::sync::Arc;

    fn handler() -> Handler {
        Handler::controller("test", Arc::new(MockController::new()) as ControllerPtr)
    }

    fn request() -> WebRequest {
        WebRequest::new(Method::GET, Uri::from_static("/"))
    }

    #[test]
    fn should_complete_only_pre_handled_interceptors_in_reverse() {
        let mut sequence = Sequence::new();

        let mut first = MockHandlerInterceptor::new();
        let mut second = MockHandlerInterceptor::new();
        let mut third = MockHandlerInterceptor::new();

        first
            .expect_pre_handle()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _| Ok(true));
        second
            .expect_pre_handle()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _| Ok(false));
        third.expect_pre_handle().never();
        first
            .expect_after_completion()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _, _| Ok(()));
        second.expect_after_completion().never();
        third.expect_after_completion().never();

        let mut chain = HandlerExecutionChain::with_interceptors(
            handler(),
            vec![
                Arc::new(first) as HandlerInterceptorPtr,
                Arc::new(second) as HandlerInterceptorPtr,
                Arc::new(third) as HandlerInterceptorPtr,
            ],
        );

        assert!(!chain
            .apply_pre_handle(&mut request(), &mut WebResponse::default())
            .unwrap());
    }

    #[test]
    fn should_post_handle_in_reverse() {
        let mut sequence = Sequence::new();

        let mut first = MockHandlerInterceptor::new();
        let mut second = MockHandlerInterceptor::new();

        second
            .expect_post_handle()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _, _| Ok(()));
        first
            .expect_post_handle()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _, _| Ok(()));

        let chain = HandlerExecutionChain::with_interceptors(
            handler(),
            vec![
                Arc::new(first) as HandlerInterceptorPtr,
                Arc::new(second) as HandlerInterceptorPtr,
            ],
        );

        chain
            .apply_post_handle(&mut request(), &mut WebResponse::default(), &mut None)
            .unwrap();
    }

    #[test]
    fn should_not_complete_without_pre_handle() {
        let mut interceptor = MockHandlerInterceptor::new();
        interceptor.expect_after_completion().never();

        let chain = HandlerExecutionChain::with_interceptors(
            handler(),
            vec![Arc::new(interceptor) as HandlerInterceptorPtr],
        );

        chain.trigger_after_completion(&mut request(), &mut WebResponse::default(), None);
    }
}
