//! Interpretation of values returned by [FunctionHandlers](crate::handler::FunctionHandler).

use crate::error::WebError;
use crate::model::ModelAndView;
use crate::request::{WebRequest, WebResponse};
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use vernal_beans::error::ErrorPtr;

/// Value returned by a function handler.
#[derive(Clone, Debug)]
pub enum ReturnValue {
    /// The handler wrote the response itself.
    Unit,
    /// Name of the view to render with an empty model.
    ViewName(String),
    ModelAndView(ModelAndView),
    /// Body serialized as JSON.
    Json(Value),
    /// Plain text body.
    Text(String),
    /// Empty body with given status.
    Status(StatusCode),
}

impl ReturnValue {
    pub fn view_name<T: ToString>(view_name: T) -> Self {
        Self::ViewName(view_name.to_string())
    }

    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::Json)
    }

    pub fn text<T: ToString>(text: T) -> Self {
        Self::Text(text.to_string())
    }

    fn kind(&self) -> &'static str {
        match self {
            ReturnValue::Unit => "unit",
            ReturnValue::ViewName(_) => "view name",
            ReturnValue::ModelAndView(_) => "model and view",
            ReturnValue::Json(_) => "json",
            ReturnValue::Text(_) => "text",
            ReturnValue::Status(_) => "status",
        }
    }
}

/// Strategy for handling a particular kind of [ReturnValue]. Returns the [ModelAndView] to render,
/// or `None` if the response is complete.
pub trait ReturnValueHandler {
    fn supports(&self, value: &ReturnValue) -> bool;

    fn handle_return_value(
        &self,
        value: ReturnValue,
        request: &WebRequest,
        response: &mut WebResponse,
    ) -> Result<Option<ModelAndView>, ErrorPtr>;
}

pub type ReturnValueHandlerPtr = Arc<dyn ReturnValueHandler + Send + Sync>;

struct UnitReturnValueHandler;

impl ReturnValueHandler for UnitReturnValueHandler {
    fn supports(&self, value: &ReturnValue) -> bool {
        matches!(value, ReturnValue::Unit)
    }

    fn handle_return_value(
        &self,
        _value: ReturnValue,
        _request: &WebRequest,
        _response: &mut WebResponse,
    ) -> Result<Option<ModelAndView>, ErrorPtr> {
        Ok(None)
    }
}

struct ViewReturnValueHandler;

impl ReturnValueHandler for ViewReturnValueHandler {
    fn supports(&self, value: &ReturnValue) -> bool {
        matches!(
            value,
            ReturnValue::ViewName(_) | ReturnValue::ModelAndView(_)
        )
    }

    fn handle_return_value(
        &self,
        value: ReturnValue,
        _request: &WebRequest,
        _response: &mut WebResponse,
    ) -> Result<Option<ModelAndView>, ErrorPtr> {
        Ok(match value {
            ReturnValue::ViewName(view_name) => Some(ModelAndView::with_view_name(view_name)),
            ReturnValue::ModelAndView(model_and_view) => Some(model_and_view),
            _ => None,
        })
    }
}

struct BodyReturnValueHandler;

impl ReturnValueHandler for BodyReturnValueHandler {
    fn supports(&self, value: &ReturnValue) -> bool {
        matches!(
            value,
            ReturnValue::Json(_) | ReturnValue::Text(_) | ReturnValue::Status(_)
        )
    }

    fn handle_return_value(
        &self,
        value: ReturnValue,
        _request: &WebRequest,
        response: &mut WebResponse,
    ) -> Result<Option<ModelAndView>, ErrorPtr> {
        match value {
            ReturnValue::Json(value) => {
                let body =
                    serde_json::to_vec(&value).map_err(|error| Arc::new(error) as ErrorPtr)?;
                response.set_content_type("application/json");
                response.write(body);
            }
            ReturnValue::Text(text) => {
                response.set_content_type("text/plain; charset=utf-8");
                response.write(text);
            }
            ReturnValue::Status(status) => response.set_status(status),
            _ => {}
        }

        Ok(None)
    }
}

/// Delegates to the first registered [ReturnValueHandler] supporting a value.
#[derive(Clone, Default)]
pub struct ReturnValueHandlerComposite {
    handlers: Vec<ReturnValueHandlerPtr>,
}

impl ReturnValueHandlerComposite {
    /// Creates a composite with built-in handlers for every [ReturnValue].
    pub fn with_defaults() -> Self {
        Self {
            handlers: vec![
                Arc::new(UnitReturnValueHandler) as ReturnValueHandlerPtr,
                Arc::new(ViewReturnValueHandler) as ReturnValueHandlerPtr,
                Arc::new(BodyReturnValueHandler) as ReturnValueHandlerPtr,
            ],
        }
    }

    /// Adds a handler, consulted before the already registered ones.
    pub fn with_handler(mut self, handler: ReturnValueHandlerPtr) -> Self {
        self.handlers.insert(0, handler);
        self
    }

    pub fn supports(&self, value: &ReturnValue) -> bool {
        self.handlers.iter().any(|handler| handler.supports(value))
    }

    pub fn handle_return_value(
        &self,
        value: ReturnValue,
        request: &WebRequest,
        response: &mut WebResponse,
    ) -> Result<Option<ModelAndView>, ErrorPtr> {
        let handler = self
            .handlers
            .iter()
            .find(|handler| handler.supports(&value))
            .ok_or_else(|| {
                Arc::new(WebError::UnsupportedReturnValue(value.kind().to_string())) as ErrorPtr
            })?;

        handler.handle_return_value(value, request, response)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::WebError;
    use crate::request::{WebRequest, WebResponse};
    use crate::return_value::{ReturnValue, ReturnValueHandlerComposite};
    use axum::http::{Method, StatusCode, Uri};
    use serde_json::json;

    fn request() -> WebRequest {
        WebRequest::new(Method::GET, Uri::from_static("/"))
    }

    #[test]
    fn should_write_json_body() {
        let mut response = WebResponse::default();
        let result = ReturnValueHandlerComposite::with_defaults()
            .handle_return_value(
                ReturnValue::Json(json!({"id": 1})),
                &request(),
                &mut response,
            )
            .unwrap();

        assert!(result.is_none());
        assert_eq!(response.body(), br#"{"id":1}"#);
        assert_eq!(
            response.headers()["content-type"],
            "application/json"
        );
    }

    #[test]
    fn should_convert_view_names() {
        let result = ReturnValueHandlerComposite::with_defaults()
            .handle_return_value(
                ReturnValue::view_name("users/list"),
                &request(),
                &mut WebResponse::default(),
            )
            .unwrap()
            .unwrap();

        assert_eq!(result.view_name(), Some("users/list"));
    }

    #[test]
    fn should_set_status() {
        let mut response = WebResponse::default();
        ReturnValueHandlerComposite::with_defaults()
            .handle_return_value(
                ReturnValue::Status(StatusCode::NO_CONTENT),
                &request(),
                &mut response,
            )
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn should_reject_unsupported_values() {
        let error = ReturnValueHandlerComposite::default()
            .handle_return_value(ReturnValue::Unit, &request(), &mut WebResponse::default())
            .unwrap_err();

        assert!(matches!(
            error.downcast_ref::<WebError>(),
            Some(WebError::UnsupportedReturnValue(kind)) if kind == "unit"
        ));
    }
}
