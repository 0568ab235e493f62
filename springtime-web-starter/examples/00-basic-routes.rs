use springtime::application;
use springtime::future::{BoxFuture, FutureExt};
use springtime_di::instance_provider::ErrorPtr;
use springtime_di::{component_alias, Component};
use springtime_web_starter::axum::extract::Path;
use springtime_web_starter::runner::WebMappingProvider;
use springtime_web_starter::springtime_web_route::mapping::WebMapping;

async fn hello_world() -> &'static str {
    "Hello world!"
}

// all axum features are available for handlers
async fn hello_user(Path(user): Path<String>) -> String {
    format!("Hello {user}!")
}

// routes are provided by components implementing WebMappingProvider - all such components are
// discovered by dependency injection and their routes are merged
#[derive(Component)]
struct ExampleRoutes;

#[component_alias]
impl WebMappingProvider for ExampleRoutes {
    fn web_mapping(&self) -> BoxFuture<'_, Result<WebMapping, ErrorPtr>> {
        async {
            let mut mapping = WebMapping::new();

            // GET http://localhost:8080/
            mapping.get_mapping("/", hello_world);

            // group routes under a common path - GET http://localhost:8080/hello/{user}
            mapping.route("/hello").get("/:user", hello_user);

            Ok(mapping)
        }
        .boxed()
    }
}

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
#[tokio::main]
async fn main() {
    let mut application = application::create_default().expect("unable to create application");

    // run our server with default configuration (port 8080) until Ctrl-C is pressed
    application.run().await.expect("error running application");
}
