//! Dispatching errors.

use axum::http::{Method, StatusCode};
use thiserror::Error;
use vernal_beans::error::BeanInstanceProviderError;

#[derive(Error, Debug)]
pub enum WebError {
    #[error("Dispatcher needs exactly 1 strategy for contract [{contract}]")]
    StrategyInitialization { contract: String },
    #[error("Error retrieving strategy beans for contract [{contract}]: {source}")]
    StrategyLookup {
        contract: String,
        #[source]
        source: BeanInstanceProviderError,
    },
    #[error("No handler found for {method} {path}")]
    NoHandlerFound { method: Method, path: String },
    #[error("No adapter for handler [{handler}]: the dispatcher configuration needs to include a handler adapter that supports this handler")]
    NoHandlerAdapter { handler: String },
    #[error("Could not resolve view with name '{view_name}'")]
    UnresolvedView { view_name: String },
    #[error("Model and view neither contains a view name nor a view")]
    MissingView,
    #[error("{status}: {reason}")]
    ResponseStatus { status: StatusCode, reason: String },
    #[error("Invalid path pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("Ambiguous mapping: cannot map handler [{handler}] to '{pattern}', since it is already mapped")]
    AmbiguousMapping { pattern: String, handler: String },
    #[error("Request method '{method}' not supported")]
    MethodNotSupported { method: Method },
    #[error("Unsupported return value of type '{0}'")]
    UnsupportedReturnValue(String),
}

impl WebError {
    /// Creates an error which resolves to a response with given status.
    pub fn response_status<T: ToString>(status: StatusCode, reason: T) -> Self {
        Self::ResponseStatus {
            status,
            reason: reason.to_string(),
        }
    }
}
