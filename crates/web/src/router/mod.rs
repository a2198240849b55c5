//! Path and method routing.
//!
//! Route templates are compiled into a radix tree when the router is built. A template is a
//! path starting with `/` in which whole segments may be wildcards written `{name}`:
//!
//! ```text
//! /users/{id}/posts/{post}
//! ```
//!
//! A request is matched in two steps. The path selects an endpoint, preferring static text over
//! wildcards, and the wildcard bindings land in [`Request::params`]. The method then selects the
//! handler:
//!
//! 1. the handler registered for the method,
//! 2. for `HEAD`, the `GET` handler (the renderer drops the body),
//! 3. `OPTIONS` answers `204 No Content` with `Allow`, `TRACE` echoes the request,
//! 4. anything else is `405 Method Not Allowed` with `Allow` listing the registered methods.
//!
//! Paths without an endpoint get `404 Not Found`. Both errors go through the router's
//! [error handler](RouterBuilder::error_handler).
//!
//! Every handler, including the ones answering 404 and 405, is wrapped in its middleware chain
//! once by [`RouterBuilder::build`], so routing a request is a tree walk plus an array index.

mod error;
mod group;
mod template;
mod tree;

use std::fmt;
use std::fmt::Write;
use std::mem;
use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use rill_http::handler::Handler;
use rill_http::protocol::{Method, Request, Response};
use tracing::{debug, trace};

use crate::middleware::{compose, Middleware};
use tree::{InsertError, Tree};

pub use error::{RouteError, RouterBuildError};
pub use group::Group;

/// Turns a routing failure into a response.
pub type ErrorHandler = Arc<dyn Fn(&Request, &RouteError) -> Response + Send + Sync>;

/// Handler table of one path template.
struct Endpoint {
    methods: [Option<Arc<dyn Handler>>; Method::KNOWN.len()],
    /// Answers OPTIONS, TRACE and unregistered methods.
    automatic: Arc<dyn Handler>,
}

impl Endpoint {
    fn resolve(&self, method: Method) -> &Arc<dyn Handler> {
        let slot = |method: Method| method.index().and_then(|index| self.methods[index].as_ref());
        slot(method)
            .or_else(|| slot(Method::Get).filter(|_| method == Method::Head))
            .unwrap_or(&self.automatic)
    }
}

/// The application's routing table, itself a [`Handler`].
///
/// ```
/// use futures::FutureExt;
/// use rill_web::router::{get, Router};
/// use rill_web::handler_fn;
///
/// let router = Router::builder()
///     .route("/", get(handler_fn(|_req| async { "hello" }.boxed())))
///     .route(
///         "/hello/{name}",
///         get(handler_fn(|req| async move { format!("hello {}", req.params().get("name").unwrap_or_default()) }.boxed())),
///     )
///     .build()
///     .unwrap();
/// # drop(router);
/// ```
pub struct Router {
    tree: Tree<Endpoint>,
    not_found: Arc<dyn Handler>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Selects the handler for the request, filling its route params.
    fn resolve(&self, req: &mut Request) -> &Arc<dyn Handler> {
        let mut params = mem::take(req.params_mut());
        params.clear();
        let endpoint = self.tree.lookup(req.path(), &mut params);
        *req.params_mut() = params;

        match endpoint {
            Some(endpoint) => endpoint.resolve(req.method()),
            None => {
                trace!(path = req.path(), "no route");
                &self.not_found
            }
        }
    }
}

#[async_trait]
impl Handler for Router {
    async fn call(&self, req: &mut Request) -> Response {
        self.resolve(req).call(req).await
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").finish_non_exhaustive()
    }
}

/// Collects routes, groups and middlewares; [`build`](RouterBuilder::build) checks and compiles them.
pub struct RouterBuilder {
    registrations: Vec<(String, Vec<Arc<dyn Middleware>>, MethodRouter)>,
    middlewares: Vec<Arc<dyn Middleware>>,
    error_handler: ErrorHandler,
}

impl RouterBuilder {
    fn new() -> Self {
        Self { registrations: Vec::new(), middlewares: Vec::new(), error_handler: Arc::new(default_error_handler) }
    }

    /// Registers the handlers of `methods` under `template`.
    ///
    /// A template may be registered several times as long as no method repeats.
    pub fn route(mut self, template: impl Into<String>, methods: MethodRouter) -> Self {
        self.registrations.push((template.into(), Vec::new(), methods));
        self
    }

    pub fn group(mut self, group: Group) -> Self {
        group.flatten("", &[], &mut self.registrations);
        self
    }

    /// Adds a global middleware. Global middlewares wrap every route, in registration order,
    /// as well as the 404 and 405 responses.
    pub fn wrap(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Replaces the responder used for [`RouteError`]s.
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Request, &RouteError) -> Response + Send + Sync + 'static,
    {
        self.error_handler = Arc::new(handler);
        self
    }

    pub fn build(self) -> Result<Router, RouterBuildError> {
        let Self { registrations, middlewares: global, error_handler } = self;

        // endpoints keep the order in which their template first appeared
        let mut endpoints: Vec<(String, EndpointBuilder)> = Vec::new();
        for (template, group_chain, method_router) in registrations {
            let index = match endpoints.iter().position(|(t, _)| *t == template) {
                Some(index) => index,
                None => {
                    endpoints.push((template.clone(), EndpointBuilder::default()));
                    endpoints.len() - 1
                }
            };

            let chain = [global.as_slice(), &group_chain, &method_router.middlewares].concat();
            for (method, handler) in method_router.handlers {
                endpoints[index].1.add(&template, method, compose(handler, &chain))?;
            }
        }

        let mut tree = Tree::default();
        for (template, builder) in endpoints {
            let segments = template::parse(&template)
                .map_err(|e| RouterBuildError::InvalidTemplate { template: template.clone(), reason: e.reason() })?;

            let first_method = builder.order.first().copied().unwrap_or_default();
            let endpoint = builder.build(&global, &error_handler);
            tree.insert(&segments, endpoint).map_err(|e| match e {
                InsertError::MismatchingWildcards { existing, new } => {
                    RouterBuildError::MismatchingWildcards { template: template.clone(), existing, new }
                }
                InsertError::Occupied => RouterBuildError::DuplicateRoute { method: first_method, template: template.clone() },
            })?;
            debug!(%template, "route registered");
        }

        let not_found = compose(Arc::new(NotFound { error_handler }), &global);
        Ok(Router { tree, not_found })
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder")
            .field("routes", &self.registrations.iter().map(|(template, _, _)| template).collect::<Vec<_>>())
            .field("middlewares", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct EndpointBuilder {
    methods: [Option<Arc<dyn Handler>>; Method::KNOWN.len()],
    order: Vec<Method>,
}

impl EndpointBuilder {
    fn add(&mut self, template: &str, method: Method, handler: Arc<dyn Handler>) -> Result<(), RouterBuildError> {
        let index = method.index().ok_or(RouterBuildError::UnroutableMethod { method })?;
        if self.methods[index].is_some() {
            return Err(RouterBuildError::DuplicateRoute { method, template: template.to_owned() });
        }
        self.methods[index] = Some(handler);
        self.order.push(method);
        Ok(())
    }

    fn build(self, global: &[Arc<dyn Middleware>], error_handler: &ErrorHandler) -> Endpoint {
        let allow = self.order.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
        let automatic = compose(Arc::new(Automatic { allow, error_handler: Arc::clone(error_handler) }), global);
        Endpoint { methods: self.methods, automatic }
    }
}

/// Handlers for the methods of one route, created with [`get`], [`post`], ... and chained.
///
/// ```
/// use futures::FutureExt;
/// use rill_web::router::get;
/// use rill_web::middleware::Recover;
/// use rill_web::handler_fn;
///
/// let methods = get(handler_fn(|_req| async { "read" }.boxed()))
///     .post(handler_fn(|_req| async { "write" }.boxed()))
///     .with(Recover);
/// # drop(methods);
/// ```
#[derive(Default)]
pub struct MethodRouter {
    handlers: Vec<(Method, Arc<dyn Handler>)>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MethodRouter {
    /// Adds a handler for an arbitrary method.
    pub fn on<H: Handler + 'static>(mut self, method: Method, handler: H) -> Self {
        let handler: Arc<dyn Handler> = Arc::new(handler);
        self.handlers.push((method, handler));
        self
    }

    /// Adds a middleware around every handler of this route, inside group and global ones.
    pub fn with(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }
}

impl fmt::Debug for MethodRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRouter")
            .field("methods", &self.handlers.iter().map(|(method, _)| method.as_str()).collect::<Vec<_>>())
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}

/// Starts a [`MethodRouter`] with a handler for `method`.
pub fn on<H: Handler + 'static>(method: Method, handler: H) -> MethodRouter {
    MethodRouter::default().on(method, handler)
}

macro_rules! method_router {
    ($($name:ident => $method:ident),+ $(,)?) => {
        $(
            #[doc = concat!("Starts a [`MethodRouter`] with a `", stringify!($method), "` handler.")]
            pub fn $name<H: Handler + 'static>(handler: H) -> MethodRouter {
                on(Method::$method, handler)
            }
        )+

        impl MethodRouter {
            $(
                #[doc = concat!("Adds a `", stringify!($method), "` handler.")]
                pub fn $name<H: Handler + 'static>(self, handler: H) -> Self {
                    self.on(Method::$method, handler)
                }
            )+
        }
    };
}

method_router! {
    get => Get,
    head => Head,
    post => Post,
    put => Put,
    delete => Delete,
    connect => Connect,
    options => Options,
    trace => Trace,
    patch => Patch,
}

/// Answers methods a matched endpoint has no handler for.
struct Automatic {
    allow: String,
    error_handler: ErrorHandler,
}

#[async_trait]
impl Handler for Automatic {
    async fn call(&self, req: &mut Request) -> Response {
        match req.method() {
            Method::Options => Response::new(StatusCode::NO_CONTENT).with_header("Allow", self.allow.as_str()),
            Method::Trace => trace_echo(req),
            _ => (self.error_handler)(req, &RouteError::MethodNotAllowed { allow: self.allow.clone() }),
        }
    }
}

struct NotFound {
    error_handler: ErrorHandler,
}

#[async_trait]
impl Handler for NotFound {
    async fn call(&self, req: &mut Request) -> Response {
        if req.method() == Method::Trace {
            return trace_echo(req);
        }
        (self.error_handler)(req, &RouteError::NotFound)
    }
}

/// Renders the received request head as a `message/http` body.
fn trace_echo(req: &Request) -> Response {
    let mut message = String::with_capacity(128);
    message.push_str(req.method().as_str());
    message.push(' ');
    message.push_str(req.path());
    if !req.query().raw().is_empty() {
        message.push('?');
        message.push_str(req.query().raw());
    }
    message.push(' ');
    message.push_str(req.protocol().as_str());
    message.push_str("\r\n");
    for (key, value) in req.headers().iter() {
        let _ = write!(message, "{key}: {value}\r\n");
    }
    message.push_str("\r\n");

    Response::new(StatusCode::OK).with_header(http::header::CONTENT_TYPE.as_str(), "message/http").with_body(message)
}

/// Status with its reason phrase, plus `Allow` for 405.
pub fn default_error_handler(_req: &Request, error: &RouteError) -> Response {
    let resp = Response::error(error.status());
    match error {
        RouteError::MethodNotAllowed { allow } => resp.with_header("Allow", allow.as_str()),
        RouteError::NotFound => resp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{middleware_fn, Recover};
    use rill_http::handler::make_handler;
    use rill_http::protocol::Protocol;

    /// Answers with a fixed label and the bound params.
    fn label(name: &'static str) -> impl Handler {
        make_handler(move |req| {
            Box::pin(async move {
                let params = req.params().iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&");
                Response::text(format!("{name} {params}").trim_end().to_owned())
            })
        })
    }

    /// Appends its tag to the `trace` request header and the `trace` response header.
    fn tagging(tag: &'static str) -> impl Middleware {
        middleware_fn(move |req, next| {
            Box::pin(async move {
                req.headers_mut().add("trace", tag);
                let mut resp = next.call(req).await;
                resp.headers_mut().add("trace", tag);
                resp
            })
        })
    }

    async fn call(router: &Router, method: Method, path: &str) -> Response {
        router.call(&mut Request::new(method, path)).await
    }

    fn body(resp: &Response) -> &str {
        std::str::from_utf8(resp.body()).unwrap()
    }

    #[tokio::test]
    async fn static_routes_take_precedence_over_wildcards() {
        let router = Router::builder()
            .route("/hello/{world}", get(label("wildcard")))
            .route("/hello/world/length/does/not/matter", get(label("static")))
            .build()
            .unwrap();

        let resp = call(&router, Method::Get, "/hello/some-very-long-world").await;
        assert_eq!(body(&resp), "wildcard world=some-very-long-world");

        let resp = call(&router, Method::Get, "/hello/world/length/does/not/matter").await;
        assert_eq!(body(&resp), "static");

        let resp = call(&router, Method::Get, "/hello").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&resp), "Not Found");
    }

    #[tokio::test]
    async fn params_are_reset_between_requests() {
        let router = Router::builder().route("/users/{id}", get(label("user"))).build().unwrap();

        let mut req = Request::new(Method::Get, "/users/2");
        req.params_mut().add("stale", "1");
        let resp = router.call(&mut req).await;

        assert_eq!(body(&resp), "user id=2");
        assert_eq!(req.params().iter().collect::<Vec<_>>(), vec![("id", "2")]);
    }

    #[tokio::test]
    async fn head_falls_back_to_get() {
        let router = Router::builder().route("/", get(label("get"))).build().unwrap();

        let resp = call(&router, Method::Head, "/").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body(&resp), "get");
    }

    #[tokio::test]
    async fn explicit_head_handler_wins() {
        let router = Router::builder().route("/", get(label("get")).head(label("head"))).build().unwrap();
        assert_eq!(body(&call(&router, Method::Head, "/").await), "head");
    }

    #[tokio::test]
    async fn unregistered_method_is_405_with_allow() {
        let router = Router::builder()
            .route("/", get(label("get")))
            .route("/", post(label("post")).put(label("put")))
            .build()
            .unwrap();

        let resp = call(&router, Method::Delete, "/").await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers().get("allow"), Some("GET, POST, PUT"));

        let single = Router::builder().route("/", get(label("get"))).build().unwrap();
        let resp = call(&single, Method::Post, "/").await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers().get("Allow"), Some("GET"));
    }

    #[tokio::test]
    async fn options_lists_allowed_methods() {
        let router = Router::builder().route("/items", get(label("get")).post(label("post"))).build().unwrap();

        let resp = call(&router, Method::Options, "/items").await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(resp.headers().get("Allow"), Some("GET, POST"));
        assert!(resp.body().is_empty());
    }

    #[tokio::test]
    async fn trace_echoes_the_request_head() {
        let router = Router::builder().route("/echo", get(label("get"))).build().unwrap();

        let mut req = Request::new(Method::Trace, "/echo")
            .with_query("a=1")
            .with_protocol(Protocol::Http11)
            .with_header("host", "localhost")
            .with_header("x-token", "abc");
        let resp = router.call(&mut req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("content-type"), Some("message/http"));
        assert_eq!(body(&resp), "TRACE /echo?a=1 HTTP/1.1\r\nhost: localhost\r\nx-token: abc\r\n\r\n");
    }

    #[tokio::test]
    async fn custom_error_handler_sees_route_errors() {
        let router = Router::builder()
            .route("/", get(label("get")))
            .error_handler(|req, error| Response::text(format!("{} {}: {error}", req.method(), req.path())).with_status(error.status()))
            .build()
            .unwrap();

        let resp = call(&router, Method::Get, "/missing").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&resp), "GET /missing: no route matches the request path");

        let resp = call(&router, Method::Patch, "/").await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body(&resp), "PATCH /: method not allowed, allowed: GET");
    }

    #[tokio::test]
    async fn middlewares_run_global_then_groups_then_point() {
        let router = Router::builder()
            .wrap(tagging("global"))
            .group(
                Group::new("/api")
                    .wrap(tagging("api"))
                    .group(Group::new("/v1").wrap(tagging("v1")).route("/ping", get(label("ping")).with(tagging("point")))),
            )
            .build()
            .unwrap();

        let mut req = Request::new(Method::Get, "/api/v1/ping");
        let resp = router.call(&mut req).await;

        assert_eq!(body(&resp), "ping");
        assert_eq!(req.headers().get_all("trace").collect::<Vec<_>>(), vec!["global", "api", "v1", "point"]);
        assert_eq!(resp.headers().get_all("trace").collect::<Vec<_>>(), vec!["point", "v1", "api", "global"]);
    }

    #[tokio::test]
    async fn global_middlewares_wrap_error_responses() {
        let router = Router::builder().wrap(tagging("global")).route("/", get(label("get"))).build().unwrap();

        let resp = call(&router, Method::Get, "/missing").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers().get("trace"), Some("global"));

        let resp = call(&router, Method::Post, "/").await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers().get("trace"), Some("global"));
    }

    #[tokio::test]
    async fn recover_middleware_turns_panics_into_500() {
        let router = Router::builder()
            .wrap(Recover)
            .route(
                "/boom",
                get(make_handler(|req| {
                    Box::pin(async move {
                        if req.path() == "/boom" {
                            panic!("handler failed");
                        }
                        Response::text("fine")
                    })
                })),
            )
            .build()
            .unwrap();

        let resp = call(&router, Method::Get, "/boom").await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn build_rejects_mismatching_wildcards() {
        let err = Router::builder()
            .route("/users/{id}", get(label("a")))
            .route("/users/{name}/posts", get(label("b")))
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            RouterBuildError::MismatchingWildcards { template: "/users/{name}/posts".into(), existing: "id".into(), new: "name".into() }
        );
    }

    #[test]
    fn build_rejects_invalid_templates() {
        let err = Router::builder().route("users", get(label("a"))).build().unwrap_err();
        assert!(matches!(err, RouterBuildError::InvalidTemplate { ref template, .. } if template == "users"));

        let err = Router::builder().route("/user{id}", get(label("a"))).build().unwrap_err();
        assert!(matches!(err, RouterBuildError::InvalidTemplate { .. }));
    }

    #[test]
    fn build_rejects_duplicates_and_unknown_methods() {
        let err = Router::builder().route("/", get(label("a"))).route("/", get(label("b"))).build().unwrap_err();
        assert_eq!(err, RouterBuildError::DuplicateRoute { method: Method::Get, template: "/".into() });

        let err = Router::builder().route("/", on(Method::Unknown, label("a"))).build().unwrap_err();
        assert_eq!(err, RouterBuildError::UnroutableMethod { method: Method::Unknown });
    }

    #[tokio::test]
    async fn head_falls_back_to_get_over_the_wire() {
        use rill_http::connection::HttpConnection;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let accepted = make_handler(|_req| Box::pin(async { Response::new(StatusCode::ACCEPTED).with_body("accepted") }));
        let router = Router::builder().route("/job", get(accepted)).build().unwrap();

        let (mut client, server) = tokio::io::duplex(16 * 1024);
        let (reader, writer) = tokio::io::split(server);
        let serving = tokio::spawn(HttpConnection::new(reader, writer).process(Arc::new(router)));

        client.write_all(b"HEAD /job HTTP/1.1\r\n\r\nPOST /job HTTP/1.1\r\nConnection: close\r\n\r\n").await.unwrap();
        let mut output = String::new();
        client.read_to_string(&mut output).await.unwrap();
        serving.await.unwrap().unwrap();

        let (head, rest) = output.split_once("\r\n\r\n").unwrap();
        assert!(head.starts_with("HTTP/1.1 202 Accepted\r\n"), "{output}");
        assert!(head.contains("Content-Length: 8"));
        assert!(rest.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"), "{output}");
        assert!(rest.contains("Allow: GET\r\n"));
    }
}
