//! Serving the [Dispatcher] over HTTP with axum.

use crate::config::{web_config, ServerConfig, WebConfig};
use crate::dispatcher::{Dispatcher, DispatcherPtr};
use crate::request::WebRequest;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures::future::{try_join_all, BoxFuture, FutureExt};
use hyper::server::conn::AddrIncoming;
use hyper::server::Builder;
use hyper::Error as HyperError;
use std::future::Future;
use std::net::AddrParseError;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use vernal_beans::error::ErrorPtr;
use vernal_beans::instance_provider::TypedBeanInstanceProvider;
use vernal_context::application::ApplicationContext;

/// Name of the bean holding a custom [ServerBootstrap], if any.
pub const SERVER_BOOTSTRAP_BEAN_NAME: &str = "server_bootstrap";

/// Errors related to bootstrapping servers.
#[derive(Error, Debug)]
pub enum ServerBootstrapError {
    #[error("Error parsing listen address: {0}")]
    ListenAddressParseError(AddrParseError),
    #[error("Error binding server: {0}")]
    BindError(#[source] HyperError),
    #[error("Error initializing dispatcher: {0}")]
    DispatcherError(#[source] ErrorPtr),
}

/// Creates web servers from [ServerConfig]. Register a bean under [SERVER_BOOTSTRAP_BEAN_NAME] to
/// override the default bootstrap.
pub trait ServerBootstrap {
    /// Create a [Builder] which will them be used to create a web server.
    fn bootstrap_server(
        &self,
        config: &ServerConfig,
    ) -> BoxFuture<'_, Result<Builder<AddrIncoming>, ServerBootstrapError>>;
}

pub type ServerBootstrapPtr = Arc<dyn ServerBootstrap + Send + Sync>;

/// Binds to the configured listen address.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultServerBootstrap;

impl ServerBootstrap for DefaultServerBootstrap {
    fn bootstrap_server(
        &self,
        config: &ServerConfig,
    ) -> BoxFuture<'_, Result<Builder<AddrIncoming>, ServerBootstrapError>> {
        let listen_address = config.listen_address.clone();

        async move {
            axum::Server::try_bind(
                &listen_address
                    .parse()
                    .map_err(ServerBootstrapError::ListenAddressParseError)?,
            )
            .map_err(ServerBootstrapError::BindError)
        }
        .boxed()
    }
}

/// Creates a [Router] passing every request to given dispatcher. Dispatching is synchronous, so it
/// happens on a blocking thread.
pub fn router(dispatcher: DispatcherPtr) -> Router {
    Router::new().fallback(move |request: Request<Body>| {
        let dispatcher = dispatcher.clone();
        async move { dispatch(dispatcher, request).await }
    })
}

async fn dispatch(dispatcher: DispatcherPtr, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = match hyper::body::to_bytes(body).await {
        Ok(body) => body,
        Err(error) => {
            error!(%error, "Error reading request body.");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let request = WebRequest::new(parts.method, parts.uri)
        .with_headers(parts.headers)
        .with_body(body);

    match tokio::task::spawn_blocking(move || dispatcher.serve(request)).await {
        Ok(response) => {
            let (status, headers, body) = response.into_parts();

            let mut response = body.into_response();
            *response.status_mut() = status;
            response.headers_mut().remove(CONTENT_TYPE);
            response.headers_mut().extend(headers);
            response
        }
        Err(error) => {
            error!(%error, "Dispatcher task failed.");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Runs one server per configured [ServerConfig], all sharing a single [Dispatcher].
pub struct ServerRunner {
    dispatcher: DispatcherPtr,
    server_bootstrap: ServerBootstrapPtr,
    config: WebConfig,
}

impl ServerRunner {
    pub fn new(dispatcher: DispatcherPtr, config: WebConfig) -> Self {
        Self {
            dispatcher,
            server_bootstrap: Arc::new(DefaultServerBootstrap),
            config,
        }
    }

    pub fn with_server_bootstrap(mut self, server_bootstrap: ServerBootstrapPtr) -> Self {
        self.server_bootstrap = server_bootstrap;
        self
    }

    /// Creates a runner with the dispatcher, config and [ServerBootstrap] from given context.
    pub fn from_context(context: &mut ApplicationContext) -> Result<Self, ServerBootstrapError> {
        let dispatcher =
            Dispatcher::from_context(context).map_err(ServerBootstrapError::DispatcherError)?;

        let factory = context.factory_mut();
        let config = web_config(factory).map_err(ServerBootstrapError::DispatcherError)?;
        let server_bootstrap = factory
            .instance_option::<ServerBootstrapPtr>(SERVER_BOOTSTRAP_BEAN_NAME)
            .map_err(|error| ServerBootstrapError::DispatcherError(Arc::new(error) as ErrorPtr))?
            .map(|server_bootstrap| server_bootstrap.as_ref().clone());

        let runner = Self::new(Arc::new(dispatcher), config);
        Ok(match server_bootstrap {
            Some(server_bootstrap) => runner.with_server_bootstrap(server_bootstrap),
            None => runner,
        })
    }

    pub fn config(&self) -> &WebConfig {
        &self.config
    }

    /// Runs all servers until one of them fails.
    pub async fn run(&self) -> Result<(), ErrorPtr> {
        self.run_with_shutdown(futures::future::pending()).await
    }

    /// Runs all servers until given signal completes, after which they shut down gracefully.
    pub async fn run_with_shutdown<S>(&self, signal: S) -> Result<(), ErrorPtr>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let signal = signal.shared();
        let servers = self
            .create_servers(signal)
            .await
            .map_err(|error| Arc::new(error) as ErrorPtr)?;

        try_join_all(servers.into_iter()).await.map(|_| ())
    }

    async fn create_server<S>(
        &self,
        config: &ServerConfig,
        server_name: &str,
        signal: S,
    ) -> Result<impl Future<Output = Result<(), ErrorPtr>>, ServerBootstrapError>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let router = router(self.dispatcher.clone());

        let builder = self.server_bootstrap.bootstrap_server(config).await?;
        info!(
            server = server_name,
            listen_address = %config.listen_address,
            "Starting server."
        );

        Ok(async move {
            builder
                .serve(router.into_make_service())
                .with_graceful_shutdown(signal)
                .await
                .map_err(|error| Arc::new(error) as ErrorPtr)
        })
    }

    async fn create_servers<S>(
        &self,
        signal: S,
    ) -> Result<Vec<impl Future<Output = Result<(), ErrorPtr>>>, ServerBootstrapError>
    where
        S: Future<Output = ()> + Clone + Send + 'static,
    {
        let mut result = Vec::with_capacity(self.config.servers.len());
        for (server_name, config) in self.config.servers.iter() {
            result.push(
                self.create_server(config, server_name, signal.clone())
                    .await?,
            );
        }

        Ok(result)
    }
}
