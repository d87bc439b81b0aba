//! Front-controller web framework based on `vernal-context` and axum.
//!
//! Every request goes through a single [Dispatcher](dispatcher::Dispatcher), which finds a
//! [handler](handler::Handler) with [handler mappings](mapping::HandlerMapping), invokes it with a
//! matching [adapter](adapter::HandlerAdapter), resolves errors with
//! [exception resolvers](exception::HandlerExceptionResolver) and finally renders the resulting
//! [ModelAndView](model::ModelAndView) with [view resolvers](view::ViewResolver). All strategies
//! are beans, so they can be replaced or extended by registering bean definitions. When none are
//! present, [default strategies](strategy::DispatcherStrategies) are used.
//!
//! ### Simple usage example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vernal_beans::definition::BeanDefinition;
//! use vernal_context::application::ApplicationContext;
//! use vernal_web::mapping::{HandlerMappingPtr, PathPatternHandlerMapping};
//! use vernal_web::handler::Handler;
//! use vernal_web::return_value::ReturnValue;
//! use vernal_web::server::ServerRunner;
//!
//! // note: for the sake of simplicity, errors are unwrapped, rather than
//! // gracefully handled
//! #[tokio::main]
//! async fn main() {
//!     let mut context = ApplicationContext::create_default().expect("unable to create context");
//!
//!     // register a mapping responding to GET requests for http://localhost/hello/{name}
//!     context
//!         .factory_mut()
//!         .registry_mut()
//!         .register_definition(BeanDefinition::object("routes", |_| {
//!             Ok(Arc::new(
//!                 PathPatternHandlerMapping::default()
//!                     .with_route(
//!                         "/hello/{name}",
//!                         Handler::function("hello", |request| {
//!                             Ok(ReturnValue::text(format!(
//!                                 "Hello {}!",
//!                                 request.path_variable("name").unwrap_or_default()
//!                             )))
//!                         }),
//!                     )
//!                     .expect("invalid route"),
//!             ) as HandlerMappingPtr)
//!         }))
//!         .expect("unable to register routes");
//!
//!     context.refresh().expect("unable to refresh context");
//!
//!     // run servers with default configuration
//!     ServerRunner::from_context(&mut context)
//!         .expect("unable to create servers")
//!         .run()
//!         .await
//!         .expect("error running servers");
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod exception;
pub mod handler;
pub mod interceptor;
pub mod mapping;
pub mod model;
pub mod request;
pub mod return_value;
pub mod server;
pub mod strategy;
pub mod view;

pub use axum;
