//! Filters are middleware functions wrapped around route handlers. A route can have filters given
//! directly as values, or referenced by name and resolved when the application starts.

use crate::mapping::RouteHandler;
use axum::body::Body;
use axum::http::Request;
use axum::middleware::{from_fn, Next};
use axum::response::Response;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;

/// A single element of a filter chain. Implementations can inspect or modify the request, call
/// `next` to continue processing, and inspect or modify the resulting response. Not calling `next`
/// short-circuits the chain.
pub trait Filter: Send + Sync {
    fn filter(&self, request: Request<Body>, next: Next<Body>) -> BoxFuture<'static, Response>;
}

pub type FilterPtr = Arc<dyn Filter>;

/// [Filter] created from a plain function or closure.
#[derive(Clone)]
pub struct FnFilter<F> {
    f: F,
}

impl<F, Fut> Filter for FnFilter<F>
where
    F: Fn(Request<Body>, Next<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn filter(&self, request: Request<Body>, next: Next<Body>) -> BoxFuture<'static, Response> {
        (self.f)(request, next).boxed()
    }
}

/// Creates a [FilterPtr] from given function.
pub fn filter_fn<F, Fut>(f: F) -> FilterPtr
where
    F: Fn(Request<Body>, Next<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(FnFilter { f })
}

/// Wraps the handler with given filters. Filters are run in the order of the slice, i.e. the first
/// filter sees the request first and the response last.
pub fn apply_filters(handler: RouteHandler, filters: &[FilterPtr]) -> RouteHandler {
    filters.iter().rev().fold(handler, |handler, filter| {
        let filter = filter.clone();
        handler.layer(from_fn(move |request: Request<Body>, next: Next<Body>| {
            filter.filter(request, next)
        }))
    })
}

#[cfg(test)]
mod tests {
    use crate::filter::{apply_filters, filter_fn, FilterPtr};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::middleware::Next;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    type Trace = Arc<Mutex<Vec<&'static str>>>;

    fn tracing_filter(trace: Trace, name: &'static str) -> FilterPtr {
        filter_fn(move |request: Request<Body>, next: Next<Body>| {
            let trace = trace.clone();
            async move {
                trace.lock().unwrap().push(name);
                next.run(request).await
            }
        })
    }

    #[tokio::test]
    async fn should_run_filters_in_order() {
        let trace = Trace::default();
        let filters = vec![
            tracing_filter(trace.clone(), "first"),
            tracing_filter(trace.clone(), "second"),
        ];

        let handler_trace = trace.clone();
        let handler = get(move || {
            let trace = handler_trace.clone();
            async move {
                trace.lock().unwrap().push("handler");
                "ok"
            }
        });

        let router = Router::new().route("/", apply_filters(handler, &filters));
        let response = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*trace.lock().unwrap(), vec!["first", "second", "handler"]);
    }

    #[tokio::test]
    async fn should_short_circuit_chain() {
        let filters = vec![filter_fn(|_: Request<Body>, _: Next<Body>| async {
            StatusCode::UNAUTHORIZED.into_response()
        })];

        let router = Router::new().route(
            "/",
            apply_filters(get(|| async { "unreachable" }), &filters),
        );
        let response = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
