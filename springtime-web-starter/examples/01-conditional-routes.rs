// note: this example assumes you've analyzed the previous one

use springtime::application;
use springtime::future::{BoxFuture, FutureExt};
use springtime_di::instance_provider::ErrorPtr;
use springtime_di::{component_alias, Component};
use springtime_web_starter::axum::body::Body;
use springtime_web_starter::axum::http::{Request, StatusCode};
use springtime_web_starter::axum::middleware::Next;
use springtime_web_starter::axum::response::{IntoResponse, Response};
use springtime_web_starter::runner::{NamedFilter, WebMappingProvider};
use springtime_web_starter::springtime_web_route::condition::ConditionBuilder;
use springtime_web_starter::springtime_web_route::mapping::WebMapping;

// filters registered as components can be referenced by routes by their name
#[derive(Component)]
struct ApiKeyFilter;

#[component_alias]
impl NamedFilter for ApiKeyFilter {
    fn name(&self) -> &str {
        "api-key"
    }

    fn filter(&self, request: Request<Body>, next: Next<Body>) -> BoxFuture<'static, Response> {
        async move {
            if request.headers().contains_key("x-api-key") {
                next.run(request).await
            } else {
                StatusCode::FORBIDDEN.into_response()
            }
        }
        .boxed()
    }
}

#[derive(Component)]
struct AdminRoutes;

#[component_alias]
impl WebMappingProvider for AdminRoutes {
    fn web_mapping(&self) -> BoxFuture<'_, Result<WebMapping, ErrorPtr>> {
        async {
            let mut mapping = WebMapping::new();

            // registered only when the "dev" profile is active, e.g. by running with
            // SPRINGTIME_PROFILES_ACTIVE=dev
            mapping
                .get_mapping("/debug", || async { "debug info" })
                .condition_on_profile("dev");

            // all routes in this group require the "api-key" filter and are registered when
            // "admin.enabled" is set to true, or when running in the "dev" profile
            let mut admin = mapping.route("/admin");
            admin
                .set_filter_names(["api-key"])
                .condition_on_property_value("admin.enabled", true)
                .or()
                .condition_on_profile("dev");
            admin.get("/stats", || async { "stats" });
            admin.delete("/cache", || async { "cache cleared" });

            // conditions can also be written as expressions
            mapping
                .get_mapping("/beta", || async { "beta feature" })
                .condition_on_expression("${features.beta} == 'on' && ${web.server.port} >= 8000");

            Ok(mapping)
        }
        .boxed()
    }
}

#[tokio::main]
async fn main() {
    let mut application = application::create_default().expect("unable to create application");
    application.run().await.expect("error running application");
}
