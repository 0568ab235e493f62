//! Web server starter for [Springtime](https://crates.io/crates/springtime) applications, based on
//! axum.
//!
//! Route tables built with [springtime_web_route] are provided by components implementing
//! [WebMappingProvider](runner::WebMappingProvider). When the application runs, every route
//! condition is evaluated against application properties, active profiles and registered
//! components, matching routes are bound into the web server, and the server runs until a
//! shutdown signal is received (Ctrl-C by default).
//!
//! ### Simple usage example
//!
//! ```no_run
//! use springtime::application;
//! use springtime::future::{BoxFuture, FutureExt};
//! use springtime_di::instance_provider::ErrorPtr;
//! use springtime_di::{component_alias, Component};
//! use springtime_web_starter::runner::WebMappingProvider;
//! use springtime_web_starter::springtime_web_route::condition::ConditionBuilder;
//! use springtime_web_starter::springtime_web_route::mapping::WebMapping;
//!
//! #[derive(Component)]
//! struct HealthRoutes;
//!
//! #[component_alias]
//! impl WebMappingProvider for HealthRoutes {
//!     fn web_mapping(&self) -> BoxFuture<'_, Result<WebMapping, ErrorPtr>> {
//!         async {
//!             let mut mapping = WebMapping::new();
//!             mapping.get_mapping("/health", || async { "OK" });
//!
//!             // registered only when the "debug" profile is active
//!             mapping
//!                 .get_mapping("/debug", || async { "debug" })
//!                 .condition_on_profile("debug");
//!
//!             Ok(mapping)
//!         }
//!         .boxed()
//!     }
//! }
//!
//! // note: for the sake of simplicity, errors are unwrapped, rather than
//! // gracefully handled
//! #[tokio::main]
//! async fn main() {
//!     let mut application =
//!         application::create_default().expect("unable to create application");
//!
//!     // serves on port 8080, unless configured otherwise
//!     application.run().await.expect("error running application");
//! }
//! ```

pub mod config;
pub mod context;
pub mod runner;
pub mod server;
pub mod starter;

pub use axum;
pub use springtime_web_route;
