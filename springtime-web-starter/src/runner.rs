//! Integration with the Springtime application lifecycle. The [WebServerRunner] is an
//! [ApplicationRunner] which gathers route tables from all [WebMappingProvider]s and filters from
//! all [NamedFilter]s, starts the web server and keeps it running until the
//! [ShutdownSignalSource] fires.

use crate::config::{ApplicationPropertiesProvider, WebServerConfigProvider};
use crate::context::SpringtimeApplicationContext;
use crate::server::ServerBootstrap;
use crate::starter::WebServerStarter;
use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use springtime::future::{BoxFuture, FutureExt};
use springtime::runner::ApplicationRunner;
use springtime_di::component_registry::conditional::{
    unregistered_component, SimpleContextFactory,
};
use springtime_di::component_registry::StaticComponentDefinitionRegistry;
use springtime_di::instance_provider::{ComponentInstancePtr, ErrorPtr};
use springtime_di::{component_alias, injectable, Component};
use springtime_web_route::filter::{Filter, FilterPtr};
use springtime_web_route::mapping::WebMapping;
use std::sync::Arc;
use tracing::{info, warn};

/// Source of routes to bind. All providers are merged in the order of injection, so later
/// providers override routes with the same key.
#[injectable]
pub trait WebMappingProvider {
    fn web_mapping(&self) -> BoxFuture<'_, Result<WebMapping, ErrorPtr>>;
}

/// Filter available to routes by [name](NamedFilter::name), via
/// [set_filter_names](springtime_web_route::mapping::Mapping::set_filter_names).
#[injectable]
pub trait NamedFilter {
    fn name(&self) -> &str;

    /// See [Filter::filter].
    fn filter(&self, request: Request<Body>, next: Next<Body>) -> BoxFuture<'static, Response>;
}

/// Signal for stopping the web server. Create a component implementing this trait to override
/// the default, which waits for Ctrl-C.
#[injectable]
pub trait ShutdownSignalSource {
    /// Completes when the server should stop.
    fn shutdown_signal(&self) -> BoxFuture<'_, ()>;
}

#[derive(Component)]
#[component(priority = -128, condition = "unregistered_component::<dyn ShutdownSignalSource + Send + Sync>")]
struct CtrlCShutdownSignalSource;

#[component_alias]
impl ShutdownSignalSource for CtrlCShutdownSignalSource {
    fn shutdown_signal(&self) -> BoxFuture<'_, ()> {
        async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!(%error, "Cannot listen for Ctrl-C - the web server will run until killed.");
                futures::future::pending::<()>().await;
            }
        }
        .boxed()
    }
}

struct NamedFilterAdapter(ComponentInstancePtr<dyn NamedFilter + Send + Sync>);

impl Filter for NamedFilterAdapter {
    fn filter(&self, request: Request<Body>, next: Next<Body>) -> BoxFuture<'static, Response> {
        self.0.filter(request, next)
    }
}

/// Runs the web server for the lifetime of the application.
#[derive(Component)]
pub struct WebServerRunner {
    config_provider: ComponentInstancePtr<dyn WebServerConfigProvider + Send + Sync>,
    properties_provider: ComponentInstancePtr<dyn ApplicationPropertiesProvider + Send + Sync>,
    server_bootstrap: ComponentInstancePtr<dyn ServerBootstrap + Send + Sync>,
    shutdown_signal_source: ComponentInstancePtr<dyn ShutdownSignalSource + Send + Sync>,
    mapping_providers: Vec<ComponentInstancePtr<dyn WebMappingProvider + Send + Sync>>,
    filters: Vec<ComponentInstancePtr<dyn NamedFilter + Send + Sync>>,
}

#[component_alias]
impl ApplicationRunner for WebServerRunner {
    fn run(&self) -> BoxFuture<'_, Result<(), ErrorPtr>> {
        async {
            let config = self.config_provider.config().await?;
            if !config.enable_http {
                info!("Web server disabled in configuration.");
                return Ok(());
            }

            if config.enable_https {
                warn!(
                    ssl_port = config.ssl_port,
                    "HTTPS is not supported by the web server - serving plain HTTP only."
                );
            }

            let mapping = self.create_mapping().await?;
            let server = self.server_bootstrap.bootstrap_server(config).await?;
            let mut starter = WebServerStarter::new(server, mapping);

            {
                let context = self.create_context().await?;
                starter
                    .on_start_application(&context)
                    .map_err(|error| Arc::new(error) as ErrorPtr)?;
            }

            self.shutdown_signal_source.shutdown_signal().await;

            starter
                .on_stop_application()
                .await
                .map_err(|error| Arc::new(error) as ErrorPtr)
        }
        .boxed()
    }
}

impl WebServerRunner {
    async fn create_mapping(&self) -> Result<WebMapping, ErrorPtr> {
        let mut mapping = WebMapping::new();
        for provider in &self.mapping_providers {
            mapping.merge(provider.web_mapping().await?);
        }

        Ok(mapping)
    }

    async fn create_context(&self) -> Result<SpringtimeApplicationContext, ErrorPtr> {
        let properties = self.properties_provider.properties().await?;
        let registry = StaticComponentDefinitionRegistry::new(true, &SimpleContextFactory)
            .map_err(|error| Arc::new(error) as ErrorPtr)?;

        Ok(SpringtimeApplicationContext::new(properties.clone())
            .with_registry(registry)
            .with_filters(self.named_filters()))
    }

    fn named_filters(&self) -> Vec<(String, FilterPtr)> {
        let mut result: Vec<(String, FilterPtr)> = Vec::with_capacity(self.filters.len());
        for filter in &self.filters {
            let name = filter.name().to_string();
            if result.iter().any(|(existing, _)| *existing == name) {
                warn!(filter = %name, "Duplicate filter name - using the last registered filter.");
            }

            result.push((name, Arc::new(NamedFilterAdapter(filter.clone()))));
        }

        result
    }
}
