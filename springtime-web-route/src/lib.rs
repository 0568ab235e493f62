//! Conditional web route registration for [Springtime](https://crates.io/crates/springtime) and
//! axum.
//!
//! Routes are declared up front in a [WebMapping](mapping::WebMapping) route table, optionally
//! grouped under a common base path with a [Router](router::Router). Each route can carry filters
//! (middleware), names of filters to look up when the application starts, and a
//! [condition](condition) deciding if the route should be registered at all, e.g. only when a
//! property is set or a profile is active. The route table is then handed over to a starter which
//! binds matching routes into a running server.
//!
//! ### Simple usage example
//!
//! ```
//! use springtime_web_route::condition::ConditionBuilder;
//! use springtime_web_route::mapping::WebMapping;
//!
//! async fn health() -> &'static str {
//!     "OK"
//! }
//!
//! async fn list_users() -> &'static str {
//!     "[]"
//! }
//!
//! let mut mapping = WebMapping::new();
//!
//! // always registered
//! mapping.get_mapping("/health", health);
//!
//! // GET /api/users, only when the "users.enabled" property exists and the "dev" profile is
//! // active; requests pass through a filter registered under the "auth" name
//! let mut api = mapping.route("/api");
//! api.set_filter_names(["auth"])
//!     .condition_on_property("users.enabled")
//!     .condition_on_profile("dev");
//! api.get("/users", list_users).set_doc("Lists all users.");
//!
//! assert_eq!(mapping.len(), 2);
//! ```

pub mod condition;
pub mod filter;
pub mod mapping;
pub mod method;
pub mod router;

pub use axum;
