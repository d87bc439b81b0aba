mod dispatcher_test {
    use portpicker::pick_unused_port;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use vernal_beans::definition::BeanDefinition;
    use vernal_beans::error::ErrorPtr;
    use vernal_context::application::ApplicationContextBuilder;
    use vernal_context::config::ContextConfig;
    use vernal_web::axum::http::{Method, StatusCode};
    use vernal_web::config::{
        ServerConfig, StaticWebConfigProvider, WebConfig, WebConfigProviderPtr,
        WEB_CONFIG_PROVIDER_NAME,
    };
    use vernal_web::error::WebError;
    use vernal_web::handler::Handler;
    use vernal_web::mapping::{HandlerMappingPtr, PathPatternHandlerMapping};
    use vernal_web::return_value::ReturnValue;
    use vernal_web::server::ServerRunner;

    fn routes() -> Result<PathPatternHandlerMapping, WebError> {
        PathPatternHandlerMapping::new()
            .with_method_route(
                Method::GET,
                "/users/{id}",
                Handler::function("user", |request| {
                    Ok(ReturnValue::text(format!(
                        "User {}",
                        request.path_variable("id").unwrap_or_default()
                    )))
                }),
            )?
            .with_method_route(
                Method::POST,
                "/echo",
                Handler::function("echo", |request| {
                    Ok(ReturnValue::text(String::from_utf8_lossy(request.body())))
                }),
            )?
            .with_route(
                "/conflict",
                Handler::function("conflict", |_| {
                    Err(Arc::new(WebError::response_status(
                        StatusCode::CONFLICT,
                        "Already there",
                    )) as ErrorPtr)
                }),
            )
    }

    async fn wait_until_ready(client: &reqwest::Client, base_url: &str) {
        for _ in 0..50 {
            if client.get(format!("{base_url}/users/0")).send().await.is_ok() {
                return;
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        panic!("server did not start");
    }

    #[tokio::test]
    async fn should_serve_requests_through_dispatcher() {
        let listen_address = format!("127.0.0.1:{}", pick_unused_port().unwrap());
        let base_url = format!("http://{listen_address}");

        let mut context = ApplicationContextBuilder::new()
            .with_config(ContextConfig::default().with_install_tracing_logger(false))
            .with_static_definitions(false)
            .build()
            .unwrap();

        let registry = context.factory_mut().registry_mut();
        registry
            .register_definition(BeanDefinition::object("routes", |_| {
                routes()
                    .map(|mapping| Arc::new(mapping) as HandlerMappingPtr)
                    .map_err(|error| Arc::new(error) as ErrorPtr)
            }))
            .unwrap();

        let config = WebConfig::default().with_server("test", ServerConfig::new(&listen_address));
        registry
            .register_definition(BeanDefinition::object(WEB_CONFIG_PROVIDER_NAME, move |_| {
                Ok(Arc::new(StaticWebConfigProvider::new(config.clone())) as WebConfigProviderPtr)
            }))
            .unwrap();

        context.refresh().unwrap();

        let runner = ServerRunner::from_context(&mut context).unwrap();
        let (shutdown_sender, shutdown_receiver) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            runner
                .run_with_shutdown(async {
                    let _ = shutdown_receiver.await;
                })
                .await
        });

        let client = reqwest::Client::new();
        wait_until_ready(&client, &base_url).await;

        let response = client
            .get(format!("{base_url}/users/42"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "User 42");

        let response = client
            .post(format!("{base_url}/echo"))
            .body("ping")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "ping");

        let response = client
            .get(format!("{base_url}/conflict"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(response.text().await.unwrap(), "Already there");

        let response = client
            .delete(format!("{base_url}/users/42"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = client
            .get(format!("{base_url}/missing"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        shutdown_sender.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
