//! Request routing: map HTTP methods and paths to handler functions.
//!
//! The service exposes a handful of fixed endpoints, so patterns are literal
//! paths. Trailing slashes are normalized on both patterns and incoming
//! paths, so `/predict/` and `/predict` are treated as equivalent.
//!
//! Routes are matched in registration order; the first route whose method and
//! path both match the incoming request wins. A route may carry its own
//! middleware stack (see [`Router::post_with`]), which runs after the global
//! pipeline and before the handler.

use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::middleware::{MiddlewareHandler, Next};
use crate::{Method, Request, Response, StatusCode};

/// Type-erased, heap-allocated async handler that processes a [`Context`] and returns a
/// [`Response`].
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so they can be cloned and shared across
/// threads without copying the underlying closure.
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait automatically via the blanket impl
/// below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

// Strip a trailing slash from everything but the root path.
fn normalize(path: &str) -> &str {
    if path != "/" {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

// A single registered route binding a method + path to a handler.
struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

impl Route {
    fn matches(&self, method: &Method, path: &str) -> bool {
        &self.method == method && self.path == normalize(path)
    }
}

/// HTTP request router that dispatches requests to registered handler functions.
///
/// When no route matches, a JSON `404 Not Found` response is returned.
///
/// # Examples
///
/// ```rust,no_run
/// use carprice::{Router, Response, StatusCode};
///
/// let mut router = Router::new();
/// router.get("/health", |_ctx| async {
///     Response::json(StatusCode::Ok, &serde_json::json!({"status": "ok"}))
/// });
/// ```
pub struct Router {
    routes: Vec<Route>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create a new, empty `Router` with no registered routes.
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a handler for `GET` requests matching `path`.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Get, path, handler);
    }

    /// Register a handler for `POST` requests matching `path`.
    pub fn post(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Post, path, handler);
    }

    /// Register a `POST` handler guarded by route-local middleware.
    ///
    /// `middlewares` run in order for this route only; any of them may
    /// short-circuit, in which case `handler` is never invoked.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use std::sync::Arc;
    /// use carprice::{Router, Response, StatusCode};
    /// use carprice::middleware::{LoggerMiddleware, from_middleware};
    ///
    /// let mut router = Router::new();
    /// router.post_with(
    ///     "/predict",
    ///     vec![from_middleware(Arc::new(LoggerMiddleware))],
    ///     |_ctx| async { Response::new(StatusCode::Ok) },
    /// );
    /// ```
    pub fn post_with(
        &mut self,
        path: &str,
        middlewares: Vec<MiddlewareHandler>,
        handler: impl IntoHandler,
    ) {
        let endpoint: Handler = Arc::new(move |ctx| handler.call(ctx));
        let layered = move |ctx: Context| {
            Next::with_endpoint(middlewares.clone(), Arc::clone(&endpoint)).run(ctx)
        };
        self.add_route(Method::Post, path, layered);
    }

    // Erase the concrete handler type and store it as a `Handler` trait object.
    fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler) {
        let handler: Handler = Arc::new(move |ctx| handler.call(ctx));
        self.routes.push(Route {
            method,
            path: normalize(path).to_owned(),
            handler,
        });
    }

    /// Return the number of routes registered in this router.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Return `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch an already-built context to the first matching route.
    ///
    /// This is the terminal step of the global middleware pipeline; the
    /// context keeps whatever extensions earlier middleware inserted.
    pub async fn dispatch(&self, ctx: Context) -> Response {
        let route = self
            .routes
            .iter()
            .find(|route| route.matches(ctx.request().method(), ctx.request().path()));

        match route {
            Some(route) => (route.handler)(ctx).await,
            None => Response::detail(StatusCode::NotFound, "Not Found"),
        }
    }

    /// Dispatch `request` to the first matching route and return its response.
    pub async fn route(&self, request: Request) -> Response {
        self.dispatch(Context::new(request)).await
    }
}
