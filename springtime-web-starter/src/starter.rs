//! Binding of route tables into a running [WebServer](crate::server::WebServer).

use crate::context::ApplicationContext;
use crate::server::{WebServerError, WebServerPtr};
use fxhash::FxHashMap;
use springtime_web_route::filter::{apply_filters, FilterPtr};
use springtime_web_route::mapping::{Mapping, WebMapping};
use springtime_web_route::method::RequestMethod;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors which can occur when starting or stopping the web server.
#[derive(Error, Debug)]
pub enum StarterError {
    #[error("Cannot find filter '{filter}' required by route {route}")]
    MissingFilter { route: String, filter: String },
    #[error("Invalid route path '{0}' - paths must start with '/'")]
    InvalidPath(String),
    #[error("Route {0} conflicts with the path or methods of another route")]
    ConflictingRoute(String),
    #[error("Error starting web server: {0}")]
    Start(#[source] WebServerError),
    #[error("Error stopping web server: {0}")]
    Stop(#[source] WebServerError),
}

/// Materializes a [WebMapping] into a [WebServer](crate::server::WebServer) when the application
/// starts, and stops the server when it stops.
pub struct WebServerStarter {
    server: WebServerPtr,
    mapping: WebMapping,
    bound: Vec<String>,
}

impl WebServerStarter {
    pub fn new(server: WebServerPtr, mapping: WebMapping) -> Self {
        Self {
            server,
            mapping,
            bound: Vec::new(),
        }
    }

    /// Binds all routes matching their conditions and starts the server.
    pub fn on_start_application<C: ApplicationContext>(
        &mut self,
        context: &C,
    ) -> Result<(), StarterError> {
        let server_port = self.server.port();

        // stable binding order makes logs and errors reproducible
        let mut mappings = self.mapping.mappings().collect::<Vec<_>>();
        mappings.sort_unstable_by(|a, b| a.key().cmp(b.key()));

        let mut bound_methods = FxHashMap::<&str, RequestMethod>::default();
        let mut bound = Vec::new();

        for mapping in mappings {
            if mapping.port() != 0 && mapping.port() != server_port {
                warn!(
                    route = mapping.key(),
                    port = mapping.port(),
                    server_port,
                    "Skipping route registered for another port."
                );
                continue;
            }

            if !mapping.matches(context) {
                debug!(route = mapping.key(), "Route condition not met - skipping.");
                continue;
            }

            if !mapping.path().starts_with('/') {
                return Err(StarterError::InvalidPath(mapping.path().to_string()));
            }

            if bound_methods
                .keys()
                .any(|path| *path != mapping.path() && paths_conflict(path, mapping.path()))
            {
                return Err(StarterError::ConflictingRoute(mapping.key().to_string()));
            }

            let methods = bound_methods
                .entry(mapping.path())
                .or_insert_with(|| RequestMethod::from_bits(0));
            if methods.bits() & mapping.method().bits() != 0 {
                return Err(StarterError::ConflictingRoute(mapping.key().to_string()));
            }
            *methods |= mapping.method();

            let filters = Self::resolve_filters(mapping, context)?;
            self.server.bind_handler(
                mapping.path(),
                apply_filters(mapping.handler().clone(), &filters),
            );

            debug!(
                route = mapping.key(),
                method = %mapping.method(),
                path = mapping.path(),
                filters = filters.len(),
                "Bound route."
            );

            bound.push(mapping.key().to_string());
        }

        info!(
            bound = bound.len(),
            total = self.mapping.len(),
            port = server_port,
            "Starting web server."
        );

        self.bound = bound;
        self.server.start().map_err(StarterError::Start)
    }

    /// Gracefully stops the server.
    pub async fn on_stop_application(&mut self) -> Result<(), StarterError> {
        info!("Stopping web server.");
        self.server.shutdown().await.map_err(StarterError::Stop)
    }

    /// Keys of routes bound on the last start.
    pub fn bound_keys(&self) -> &[String] {
        &self.bound
    }

    fn resolve_filters<C: ApplicationContext>(
        mapping: &Mapping,
        context: &C,
    ) -> Result<Vec<FilterPtr>, StarterError> {
        let mut filters = mapping.filters().to_vec();
        for name in mapping.filter_names() {
            let filter =
                context
                    .filter_by_name(name)
                    .ok_or_else(|| StarterError::MissingFilter {
                        route: mapping.key().to_string(),
                        filter: name.clone(),
                    })?;
            filters.push(filter);
        }

        Ok(filters)
    }
}

/// Checks if two distinct paths would be ambiguous for the router: differently named parameters
/// in the same segment, or a wildcard next to any other segment.
fn paths_conflict(first: &str, second: &str) -> bool {
    for (first, second) in first.split('/').zip(second.split('/')) {
        if first == second {
            continue;
        }

        if first.starts_with('*') || second.starts_with('*') {
            return true;
        }

        return first.starts_with(':') && second.starts_with(':');
    }

    false
}
