//! Route grouping. A [Router] adds routes under a common base path to a [WebMapping] and applies
//! shared defaults to each of them.

use crate::condition::{ConditionBuilder, Conditional};
use crate::filter::FilterPtr;
use crate::mapping::{Mapping, WebMapping};
use crate::method::RequestMethod;
use axum::body::Body;
use axum::handler::Handler;

/// Group of routes sharing a base path, port, filters and a registration condition.
///
/// The condition is copied into each route at the time the route is added, so changing the
/// group afterwards does not affect already added routes.
pub struct Router<'a> {
    mapping: &'a mut WebMapping,
    base_path: String,
    port: u16,
    filters: Vec<FilterPtr>,
    filter_names: Vec<String>,
    condition: Conditional,
}

impl<'a> Router<'a> {
    pub fn new(mapping: &'a mut WebMapping, base_path: impl Into<String>) -> Self {
        Self {
            mapping,
            base_path: base_path.into(),
            port: 0,
            filters: vec![],
            filter_names: vec![],
            condition: Conditional::new(),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn set_port(&mut self, port: u16) -> &mut Self {
        self.port = port;
        self
    }

    pub fn set_filters(&mut self, filters: impl IntoIterator<Item = FilterPtr>) -> &mut Self {
        self.filters = filters.into_iter().collect();
        self
    }

    pub fn set_filter_names<N: Into<String>>(
        &mut self,
        filter_names: impl IntoIterator<Item = N>,
    ) -> &mut Self {
        self.filter_names = filter_names.into_iter().map(Into::into).collect();
        self
    }

    /// Registers a handler at `base_path + path`. Paths are concatenated as they are.
    pub fn request<H, T>(&mut self, method: RequestMethod, path: &str, handler: H) -> &mut Mapping
    where
        H: Handler<T, (), Body>,
        T: 'static,
    {
        let mapping = self
            .mapping
            .request(method, format!("{}{}", self.base_path, path), handler);

        mapping
            .set_port(self.port)
            .set_filters(self.filters.iter().cloned())
            .set_filter_names(self.filter_names.iter().cloned());

        if !self.condition.is_empty() {
            mapping.condition_on(self.condition.clone());
        }

        mapping
    }

    pub fn get<H, T>(&mut self, path: &str, handler: H) -> &mut Mapping
    where
        H: Handler<T, (), Body>,
        T: 'static,
    {
        self.request(RequestMethod::GET, path, handler)
    }

    pub fn post<H, T>(&mut self, path: &str, handler: H) -> &mut Mapping
    where
        H: Handler<T, (), Body>,
        T: 'static,
    {
        self.request(RequestMethod::POST, path, handler)
    }

    pub fn put<H, T>(&mut self, path: &str, handler: H) -> &mut Mapping
    where
        H: Handler<T, (), Body>,
        T: 'static,
    {
        self.request(RequestMethod::PUT, path, handler)
    }

    pub fn patch<H, T>(&mut self, path: &str, handler: H) -> &mut Mapping
    where
        H: Handler<T, (), Body>,
        T: 'static,
    {
        self.request(RequestMethod::PATCH, path, handler)
    }

    pub fn delete<H, T>(&mut self, path: &str, handler: H) -> &mut Mapping
    where
        H: Handler<T, (), Body>,
        T: 'static,
    {
        self.request(RequestMethod::DELETE, path, handler)
    }

    pub fn head<H, T>(&mut self, path: &str, handler: H) -> &mut Mapping
    where
        H: Handler<T, (), Body>,
        T: 'static,
    {
        self.request(RequestMethod::HEAD, path, handler)
    }

    pub fn options<H, T>(&mut self, path: &str, handler: H) -> &mut Mapping
    where
        H: Handler<T, (), Body>,
        T: 'static,
    {
        self.request(RequestMethod::OPTIONS, path, handler)
    }
}

impl ConditionBuilder for Router<'_> {
    fn conditional_mut(&mut self) -> &mut Conditional {
        &mut self.condition
    }
}

#[cfg(test)]
mod tests {
    use crate::condition::{ConditionBuilder, MockConditionContext};
    use crate::filter::{filter_fn, FilterPtr};
    use crate::mapping::WebMapping;
    use axum::body::Body;
    use axum::http::Request;
    use axum::middleware::Next;
    use mockall::predicate::*;

    async fn handler() -> &'static str {
        "ok"
    }

    fn pass_through() -> FilterPtr {
        filter_fn(|request: Request<Body>, next: Next<Body>| next.run(request))
    }

    #[test]
    fn should_prefix_paths() {
        let mut web_mapping = WebMapping::new();
        let mut router = web_mapping.route("/api");
        router.get("/users", handler);
        router.post("/users", handler);
        router.delete("//users", handler);

        assert_eq!(web_mapping.len(), 3);
        assert!(web_mapping.get("0x0001@/api/users").is_some());
        assert!(web_mapping.get("0x0004@/api/users").is_some());
        assert!(web_mapping.get("0x0020@/api//users").is_some());
    }

    #[test]
    fn should_apply_group_defaults() {
        let mut web_mapping = WebMapping::new();
        let mut router = web_mapping.route("/admin");
        router
            .set_port(9001)
            .set_filters([pass_through()])
            .set_filter_names(["auth", "audit"])
            .condition_on_profile("admin");
        router.put("/settings", handler).set_doc("Settings.");

        let mapping = web_mapping.get("0x0008@/admin/settings").unwrap();
        assert_eq!(mapping.port(), 9001);
        assert_eq!(mapping.filters().len(), 1);
        assert_eq!(
            mapping.filter_names(),
            ["auth".to_string(), "audit".to_string()]
        );
        assert_eq!(mapping.doc(), "Settings.");

        let mut context = MockConditionContext::new();
        context
            .expect_is_profile_active()
            .with(eq("admin"))
            .times(1)
            .return_const(false);
        assert!(!mapping.matches(&context));
    }

    #[test]
    fn should_snapshot_group_condition() {
        let mut web_mapping = WebMapping::new();
        let mut router = web_mapping.route("");
        router.patch("/before", handler);
        router.condition_on_property("late");
        router.head("/after", handler);
        router.options("/after", handler);

        let mut context = MockConditionContext::new();
        context.expect_has_property().return_const(false);

        assert!(web_mapping.get("0x0010@/before").unwrap().matches(&context));
        assert!(!web_mapping.get("0x0002@/after").unwrap().matches(&context));
        assert!(!web_mapping.get("0x0080@/after").unwrap().matches(&context));
    }
}
