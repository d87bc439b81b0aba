use thiserror::Error;
use vernal_beans::error::ErrorPtr;

#[derive(Error, Clone, Debug)]
pub enum AopError {
    #[error("Cannot determine target type: either an interface or a target is required for proxy creation")]
    NoTarget,
    #[error("Operation '{operation}' is not exposed by proxy for '{target}'")]
    UnsupportedOperation { operation: String, target: String },
    #[error("Invalid pointcut pattern: {0}")]
    InvalidPointcut(String),
    #[error("Error invoking '{operation}': {source}")]
    Invocation {
        operation: String,
        #[source]
        source: ErrorPtr,
    },
}
