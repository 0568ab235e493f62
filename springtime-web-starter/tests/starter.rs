use config::{Config, File, FileFormat};
use portpicker::pick_unused_port;
use springtime_web_route::axum::http::{HeaderValue, StatusCode};
use springtime_web_route::axum::middleware::Next;
use springtime_web_route::axum::response::IntoResponse;
use springtime_web_route::condition::ConditionBuilder;
use springtime_web_route::filter::filter_fn;
use springtime_web_route::mapping::WebMapping;
use springtime_web_starter::config::{ApplicationProperties, WebServerConfig};
use springtime_web_starter::context::SpringtimeApplicationContext;
use springtime_web_starter::server::AxumWebServer;
use springtime_web_starter::starter::{StarterError, WebServerStarter};

fn create_context() -> SpringtimeApplicationContext {
    let config = Config::builder()
        .add_source(File::from_str(
            r#"{ "greeting": { "enabled": "true" }, "profiles": { "active": "dev" } }"#,
            FileFormat::Json,
        ))
        .build()
        .unwrap();

    SpringtimeApplicationContext::new(ApplicationProperties::new(config)).with_filters([(
        "auth".to_string(),
        filter_fn(|request, next: Next<_>| async move {
            if request.headers().contains_key("authorization") {
                next.run(request).await
            } else {
                StatusCode::UNAUTHORIZED.into_response()
            }
        }),
    )])
}

fn create_mapping() -> WebMapping {
    let mut mapping = WebMapping::new();
    mapping.get_mapping("/health", || async { "OK" });
    mapping
        .get_mapping("/greeting", || async { "Hello" })
        .condition_on_property("greeting.enabled")
        .condition_on_profile("dev");
    mapping
        .get_mapping("/metrics", || async { "metrics" })
        .condition_on_profile("prod");

    let mut api = mapping.route("/api");
    api.set_filter_names(["auth"]).set_filters([filter_fn(
        |request, next: Next<_>| async move {
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert("x-api", HeaderValue::from_static("true"));
            response
        },
    )]);
    api.get("/users", || async { "[]" });
    api.post("/users", || async { "created" });

    mapping
}

#[tokio::test]
async fn should_serve_matching_routes() {
    let port = pick_unused_port().unwrap();
    let mut starter = WebServerStarter::new(Box::new(AxumWebServer::new(port)), create_mapping());
    starter.on_start_application(&create_context()).unwrap();

    assert_eq!(
        starter.bound_keys(),
        [
            "0x0001@/api/users",
            "0x0001@/greeting",
            "0x0001@/health",
            "0x0004@/api/users",
        ]
    );

    let base = format!("http://127.0.0.1:{port}");
    let client = reqwest::Client::new();

    let response = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");

    let response = client.get(format!("{base}/greeting")).send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "Hello");

    let response = client.get(format!("{base}/metrics")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    let response = client.get(format!("{base}/api/users")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

    let response = client
        .post(format!("{base}/api/users"))
        .header("authorization", "Bearer token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.headers()["x-api"], "true");
    assert_eq!(response.text().await.unwrap(), "created");

    let response = client
        .delete(format!("{base}/api/users"))
        .header("authorization", "Bearer token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);

    starter.on_stop_application().await.unwrap();
    assert!(client.get(format!("{base}/health")).send().await.is_err());
}

#[tokio::test]
async fn should_bind_health_route_on_configured_port() {
    let port = pick_unused_port().unwrap();
    let config = Config::builder()
        .add_source(File::from_str(
            &format!(r#"{{ "web": {{ "server": {{ "port": {port} }} }} }}"#),
            FileFormat::Json,
        ))
        .build()
        .unwrap();
    let config = WebServerConfig::from_config(&config).unwrap();

    let mut mapping = WebMapping::new();
    mapping.get_mapping("/health", || async { "OK" });

    let mut starter = WebServerStarter::new(Box::new(AxumWebServer::new(config.port)), mapping);
    starter
        .on_start_application(&SpringtimeApplicationContext::default())
        .unwrap();

    let response = reqwest::get(format!("http://127.0.0.1:{port}/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    starter.on_stop_application().await.unwrap();
    assert!(reqwest::get(format!("http://127.0.0.1:{port}/health"))
        .await
        .is_err());
}

#[tokio::test]
async fn should_fail_start_on_missing_filter() {
    let mut mapping = WebMapping::new();
    mapping
        .get_mapping("/secure", || async { "secret" })
        .set_filter_names(["missing"]);

    let mut starter = WebServerStarter::new(
        Box::new(AxumWebServer::new(pick_unused_port().unwrap())),
        mapping,
    );

    assert!(matches!(
        starter.on_start_application(&create_context()).unwrap_err(),
        StarterError::MissingFilter { .. }
    ));
    assert!(starter.on_stop_application().await.is_err());
}
