//! Route descriptors, registrations and route tables.
//!
//! A [Mapper] identifies an endpoint by its [RequestMethod] and path, and holds the handler with
//! its filters. A [Mapping] adds registration metadata on top: port, named filters, a registration
//! condition and documentation. All mappings live in a [WebMapping], keyed by [Mapper::key].

use crate::condition::{Condition, ConditionBuilder, ConditionContext, Conditional};
use crate::filter::FilterPtr;
use crate::method::RequestMethod;
use crate::router::Router;
use axum::body::Body;
use axum::handler::Handler;
use axum::http::{Method, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{any, on, MethodRouter};
use fxhash::FxHashMap;
use std::collections::hash_map::Entry;
use std::fmt::{Debug, Formatter};
use thiserror::Error;
use tracing::warn;

/// Type-erased handler bound to its [RequestMethod].
pub type RouteHandler = MethodRouter;

/// Errors related to registering routes.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum RouteError {
    #[error("Route is already registered: {0}")]
    DuplicateRoute(String),
}

fn create_handler<H, T>(method: RequestMethod, handler: H) -> RouteHandler
where
    H: Handler<T, (), Body>,
    T: 'static,
{
    if method == RequestMethod::ANY {
        return any(handler);
    }

    let router = match method.method_filter() {
        Some(filter) => on(filter, handler.clone()),
        None => MethodRouter::new(),
    };

    if !method.contains(RequestMethod::CONNECT) {
        return router;
    }

    // axum cannot filter on CONNECT, so it is dispatched from the fallback
    router.fallback(move |request: Request<Body>| {
        let handler = handler.clone();
        async move {
            if request.method() == Method::CONNECT {
                handler.call(request, ()).await
            } else {
                StatusCode::METHOD_NOT_ALLOWED.into_response()
            }
        }
    })
}

/// Route descriptor - a method and path identity with associated handler and filters.
#[derive(Clone)]
pub struct Mapper {
    key: String,
    method: RequestMethod,
    path: String,
    handler: RouteHandler,
    filters: Vec<FilterPtr>,
}

impl Mapper {
    pub fn new<H, T>(method: RequestMethod, path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, (), Body>,
        T: 'static,
    {
        let path = path.into();
        Self {
            key: format!("0x{:04x}@{}", method.bits(), path),
            method,
            path,
            handler: create_handler(method, handler),
            filters: vec![],
        }
    }

    /// Unique identity of this route.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn method(&self) -> RequestMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn handler(&self) -> &RouteHandler {
        &self.handler
    }

    pub fn filters(&self) -> &[FilterPtr] {
        &self.filters
    }

    pub fn set_filters(&mut self, filters: Vec<FilterPtr>) -> &mut Self {
        self.filters = filters;
        self
    }
}

impl Debug for Mapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapper")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("filters", &self.filters.len())
            .finish()
    }
}

/// Route registration - a [Mapper] with metadata deciding when and where it should be registered.
/// No validation is performed on any of the values.
#[derive(Clone, Debug)]
pub struct Mapping {
    mapper: Mapper,
    port: u16,
    filter_names: Vec<String>,
    condition: Conditional,
    doc: String,
}

impl Mapping {
    pub fn new(mapper: Mapper) -> Self {
        Self {
            mapper,
            port: 0,
            filter_names: vec![],
            condition: Conditional::new(),
            doc: String::new(),
        }
    }

    pub fn key(&self) -> &str {
        self.mapper.key()
    }

    pub fn method(&self) -> RequestMethod {
        self.mapper.method()
    }

    pub fn path(&self) -> &str {
        self.mapper.path()
    }

    pub fn handler(&self) -> &RouteHandler {
        self.mapper.handler()
    }

    pub fn filters(&self) -> &[FilterPtr] {
        self.mapper.filters()
    }

    pub fn set_filters(&mut self, filters: impl IntoIterator<Item = FilterPtr>) -> &mut Self {
        self.mapper.set_filters(filters.into_iter().collect());
        self
    }

    /// Port of the server this route should be bound to. `0` means any server.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn set_port(&mut self, port: u16) -> &mut Self {
        self.port = port;
        self
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn set_doc(&mut self, doc: impl Into<String>) -> &mut Self {
        self.doc = doc.into();
        self
    }

    /// Names of filters to resolve from the application context at startup. Resolved filters run
    /// after the ones set directly.
    pub fn filter_names(&self) -> &[String] {
        &self.filter_names
    }

    pub fn set_filter_names<N: Into<String>>(
        &mut self,
        filter_names: impl IntoIterator<Item = N>,
    ) -> &mut Self {
        self.filter_names = filter_names.into_iter().map(Into::into).collect();
        self
    }

    pub fn condition(&self) -> &Conditional {
        &self.condition
    }

    /// Checks if this route should be registered in given context.
    pub fn matches(&self, context: &dyn ConditionContext) -> bool {
        self.condition.matches(context)
    }
}

impl ConditionBuilder for Mapping {
    fn conditional_mut(&mut self) -> &mut Conditional {
        &mut self.condition
    }
}

/// Route table containing [Mapping]s keyed by their identity. Registering a route with an already
/// existing key replaces the previous registration.
#[derive(Clone, Debug, Default)]
pub struct WebMapping {
    mappings: FxHashMap<String, Mapping>,
}

impl WebMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for given method and path, replacing any existing registration with the
    /// same identity.
    pub fn request<H, T>(
        &mut self,
        method: RequestMethod,
        path: impl Into<String>,
        handler: H,
    ) -> &mut Mapping
    where
        H: Handler<T, (), Body>,
        T: 'static,
    {
        self.insert(Mapping::new(Mapper::new(method, path, handler)))
    }

    /// Registers a handler like [WebMapping::request], but fails if the route is already present.
    pub fn try_request<H, T>(
        &mut self,
        method: RequestMethod,
        path: impl Into<String>,
        handler: H,
    ) -> Result<&mut Mapping, RouteError>
    where
        H: Handler<T, (), Body>,
        T: 'static,
    {
        let mapping = Mapping::new(Mapper::new(method, path, handler));
        match self.mappings.entry(mapping.key().to_string()) {
            Entry::Occupied(entry) => Err(RouteError::DuplicateRoute(entry.key().clone())),
            Entry::Vacant(entry) => Ok(entry.insert(mapping)),
        }
    }

    /// Adds an existing mapping, replacing any existing registration with the same identity.
    pub fn insert(&mut self, mapping: Mapping) -> &mut Mapping {
        match self.mappings.entry(mapping.key().to_string()) {
            Entry::Occupied(mut entry) => {
                warn!(route = entry.key().as_str(), "Overriding registered route.");
                entry.insert(mapping);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(mapping),
        }
    }

    /// Moves all mappings from `other` into this table. Mappings from `other` take precedence.
    pub fn merge(&mut self, other: WebMapping) {
        for (_, mapping) in other.mappings {
            self.insert(mapping);
        }
    }

    /// Returns a mapping with given key.
    pub fn get(&self, key: &str) -> Option<&Mapping> {
        self.mappings.get(key)
    }

    pub fn mappings(&self) -> impl Iterator<Item = &Mapping> {
        self.mappings.values()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Creates a [Router] adding routes under given base path to this table.
    pub fn route(&mut self, base_path: impl Into<String>) -> Router<'_> {
        Router::new(self, base_path)
    }

    pub fn get_mapping<H, T>(&mut self, path: impl Into<String>, handler: H) -> &mut Mapping
    where
        H: Handler<T, (), Body>,
        T: 'static,
    {
        self.request(RequestMethod::GET, path, handler)
    }

    pub fn post_mapping<H, T>(&mut self, path: impl Into<String>, handler: H) -> &mut Mapping
    where
        H: Handler<T, (), Body>,
        T: 'static,
    {
        self.request(RequestMethod::POST, path, handler)
    }

    pub fn put_mapping<H, T>(&mut self, path: impl Into<String>, handler: H) -> &mut Mapping
    where
        H: Handler<T, (), Body>,
        T: 'static,
    {
        self.request(RequestMethod::PUT, path, handler)
    }

    pub fn patch_mapping<H, T>(&mut self, path: impl Into<String>, handler: H) -> &mut Mapping
    where
        H: Handler<T, (), Body>,
        T: 'static,
    {
        self.request(RequestMethod::PATCH, path, handler)
    }

    pub fn delete_mapping<H, T>(&mut self, path: impl Into<String>, handler: H) -> &mut Mapping
    where
        H: Handler<T, (), Body>,
        T: 'static,
    {
        self.request(RequestMethod::DELETE, path, handler)
    }

    pub fn head_mapping<H, T>(&mut self, path: impl Into<String>, handler: H) -> &mut Mapping
    where
        H: Handler<T, (), Body>,
        T: 'static,
    {
        self.request(RequestMethod::HEAD, path, handler)
    }

    pub fn options_mapping<H, T>(&mut self, path: impl Into<String>, handler: H) -> &mut Mapping
    where
        H: Handler<T, (), Body>,
        T: 'static,
    {
        self.request(RequestMethod::OPTIONS, path, handler)
    }
}
