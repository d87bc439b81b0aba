//! Resolving errors raised during handler mapping or execution into responses.

use crate::error::WebError;
use crate::handler::Handler;
use crate::model::ModelAndView;
use crate::request::{WebRequest, WebResponse};
use axum::http::StatusCode;
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;
use tracing::debug;
use vernal_beans::error::ErrorPtr;

/// Resolves errors into a [ModelAndView] to render. An empty [ModelAndView] signals the error has
/// been handled and the response is complete. `None` lets other resolvers try.
#[cfg_attr(test, automock)]
pub trait HandlerExceptionResolver {
    fn resolve_exception<'a>(
        &self,
        request: &WebRequest,
        response: &mut WebResponse,
        handler: Option<&'a Handler>,
        error: &ErrorPtr,
    ) -> Option<ModelAndView>;

    /// Resolvers with lower order are consulted first.
    fn order(&self) -> i32 {
        crate::strategy::LOWEST_PRECEDENCE
    }
}

pub type HandlerExceptionResolverPtr = Arc<dyn HandlerExceptionResolver + Send + Sync>;

/// Resolves [WebError::ResponseStatus] by sending an error with its status and reason.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResponseStatusExceptionResolver;

impl HandlerExceptionResolver for ResponseStatusExceptionResolver {
    fn resolve_exception<'a>(
        &self,
        _request: &WebRequest,
        response: &mut WebResponse,
        _handler: Option<&'a Handler>,
        error: &ErrorPtr,
    ) -> Option<ModelAndView> {
        match error.downcast_ref::<WebError>() {
            Some(WebError::ResponseStatus { status, reason }) => {
                response.send_error(*status, (!reason.is_empty()).then_some(reason));
                Some(ModelAndView::new())
            }
            _ => None,
        }
    }

    fn order(&self) -> i32 {
        1
    }
}

/// Translates framework errors into standard status codes.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultHandlerExceptionResolver;

impl HandlerExceptionResolver for DefaultHandlerExceptionResolver {
    fn resolve_exception<'a>(
        &self,
        _request: &WebRequest,
        response: &mut WebResponse,
        handler: Option<&'a Handler>,
        error: &ErrorPtr,
    ) -> Option<ModelAndView> {
        let status = match error.downcast_ref::<WebError>()? {
            WebError::NoHandlerFound { .. } => StatusCode::NOT_FOUND,
            WebError::MethodNotSupported { .. } => StatusCode::METHOD_NOT_ALLOWED,
            _ => return None,
        };

        debug!(
            handler = handler.map(Handler::name).unwrap_or_default(),
            %error,
            "Resolved framework error."
        );

        response.send_error::<&str>(status, None);
        Some(ModelAndView::new())
    }

    fn order(&self) -> i32 {
        2
    }
}

/// Renders a fixed view for errors matched by a predicate, exposing the error message as the
/// `error` model attribute.
pub struct MappingExceptionResolver {
    mappings: Vec<(ErrorPredicate, String, Option<StatusCode>)>,
    order: i32,
}

pub type ErrorPredicate = Box<dyn Fn(&ErrorPtr) -> bool + Send + Sync>;

impl Default for MappingExceptionResolver {
    fn default() -> Self {
        Self {
            mappings: vec![],
            order: crate::strategy::LOWEST_PRECEDENCE,
        }
    }
}

impl MappingExceptionResolver {
    pub fn with_mapping<F, V>(mut self, predicate: F, view_name: V, status: Option<StatusCode>) -> Self
    where
        F: Fn(&ErrorPtr) -> bool + Send + Sync + 'static,
        V: ToString,
    {
        self.mappings
            .push((Box::new(predicate), view_name.to_string(), status));
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

impl HandlerExceptionResolver for MappingExceptionResolver {
    fn resolve_exception<'a>(
        &self,
        _request: &WebRequest,
        response: &mut WebResponse,
        _handler: Option<&'a Handler>,
        error: &ErrorPtr,
    ) -> Option<ModelAndView> {
        let (_, view_name, status) = self
            .mappings
            .iter()
            .find(|(predicate, _, _)| predicate(error))?;

        if let Some(status) = status {
            response.set_status(*status);
        }

        let mut model_and_view = ModelAndView::with_view_name(view_name);
        model_and_view
            .model_mut()
            .insert("error".to_string(), error.to_string().into());
        Some(model_and_view)
    }

    fn order(&self) -> i32 {
        self.order
    }
}
