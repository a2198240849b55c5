use std::fmt;
use std::sync::Arc;

use crate::middleware::Middleware;
use crate::router::MethodRouter;

/// Routes sharing a path prefix and a set of middlewares.
///
/// Groups nest: a route's final chain is the router's global middlewares, then every
/// enclosing group from the outermost in, then the route's own middlewares.
///
/// ```
/// use futures::FutureExt;
/// use rill_web::router::{get, Group, Router};
/// use rill_web::handler_fn;
///
/// let router = Router::builder()
///     .group(
///         Group::new("/api")
///             .route("/health", get(handler_fn(|_req| async { "ok" }.boxed())))
///             .group(Group::new("/v1").route(
///                 "/users/{id}",
///                 get(handler_fn(|req| async move { format!("user {}", req.params().get("id").unwrap_or_default()) }.boxed())),
///             )),
///     )
///     .build()
///     .unwrap();
/// # drop(router);
/// ```
#[derive(Default)]
pub struct Group {
    prefix: String,
    middlewares: Vec<Arc<dyn Middleware>>,
    routes: Vec<(String, MethodRouter)>,
    groups: Vec<Group>,
}

impl Group {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), ..Self::default() }
    }

    /// Adds a middleware applied to every route of this group and its subgroups.
    pub fn wrap(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn route(mut self, path: impl Into<String>, methods: MethodRouter) -> Self {
        self.routes.push((path.into(), methods));
        self
    }

    pub fn group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }

    /// Flattens the group into `(template, chain, methods)` registrations, depth first.
    pub(crate) fn flatten(
        self,
        parent_prefix: &str,
        parent_middlewares: &[Arc<dyn Middleware>],
        out: &mut Vec<(String, Vec<Arc<dyn Middleware>>, MethodRouter)>,
    ) {
        let prefix = join_path(parent_prefix, &self.prefix);
        let middlewares = [parent_middlewares, &self.middlewares].concat();

        for (path, methods) in self.routes {
            out.push((join_path(&prefix, &path), middlewares.clone(), methods));
        }
        for group in self.groups {
            group.flatten(&prefix, &middlewares, out);
        }
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("prefix", &self.prefix)
            .field("middlewares", &self.middlewares.len())
            .field("routes", &self.routes)
            .field("groups", &self.groups)
            .finish()
    }
}

/// Joins a group prefix and a route path without doubling the separating `/`.
pub(crate) fn join_path(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        return path.to_owned();
    }
    if path.is_empty() || path == "/" {
        return prefix.to_owned();
    }
    format!("{}{path}", prefix.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_prefix_and_path() {
        assert_eq!(join_path("", "/users"), "/users");
        assert_eq!(join_path("/api", "/"), "/api");
        assert_eq!(join_path("/api", "/users"), "/api/users");
        assert_eq!(join_path("/api/", "/users"), "/api/users");
        assert_eq!(join_path("/api", ""), "/api");
    }

    #[test]
    fn nested_groups_accumulate_prefixes_and_middlewares() {
        let mw: Arc<dyn Middleware> = Arc::new(crate::middleware::Recover);
        let group = Group::new("/api")
            .wrap(crate::middleware::Recover)
            .route("/a", MethodRouter::default())
            .group(Group::new("/v1").wrap(crate::middleware::Recover).route("/b", MethodRouter::default()));

        let mut out = Vec::new();
        group.flatten("", &[mw], &mut out);

        let flat = out.iter().map(|(template, chain, _)| (template.as_str(), chain.len())).collect::<Vec<_>>();
        assert_eq!(flat, vec![("/api/a", 2), ("/api/v1/b", 3)]);
    }
}
