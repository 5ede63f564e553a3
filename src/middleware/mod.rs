//! Middleware pipeline: composable before/after request handler logic.
//!
//! Each middleware wraps the next layer, enabling request inspection,
//! short-circuit responses, and response decoration without coupling route
//! handlers to infrastructure concerns.
//!
//! ## Core types
//!
//! - [`Middleware`]: trait implemented by all middleware.
//! - [`Next`]: cursor into the remaining middleware chain; call [`Next::run`] to
//!   advance to the next layer. Once the chain is exhausted the endpoint runs.
//! - [`MiddlewareHandler`]: type-erased, cheaply-cloneable middleware function.
//! - [`from_middleware`]: converts a [`Middleware`] into a [`MiddlewareHandler`].
//! - [`Pipeline`]: global middleware stack in front of a [`Router`].
//! - [`LoggerMiddleware`]: request/response logger.
//! - [`MetricsMiddleware`]: request counter and latency histogram.
//! - [`TimeoutMiddleware`]: bounds the whole downstream chain.

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use metrics::Recorder;
use tokio::time::Instant;

use crate::{Request, Response, StatusCode, context::Context, router::Handler, router::Router};

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is passed to each middleware's [`Middleware::handle`] implementation.
/// Calling [`Next::run`] advances the cursor by one position and invokes the next
/// middleware, or the endpoint once every middleware has run.
///
/// `Next` is consumed on each call to [`run`](Self::run), so it cannot be called
/// more than once per middleware invocation.
pub struct Next {
    middlewares: Vec<MiddlewareHandler>,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
    endpoint: Option<Handler>,
}

/// The boxed future every middleware and handler resolves through.
pub type BoxedResponse = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A type-erased, reference-counted middleware function.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use carprice::{context::Context, middleware::{BoxedResponse, MiddlewareHandler, Next}};
///
/// let handler: MiddlewareHandler = Arc::new(|ctx: Context, next: Next| -> BoxedResponse {
///     Box::pin(async move { next.run(ctx).await })
/// });
/// ```
pub type MiddlewareHandler = Arc<
    dyn Fn(Context, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static,
>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

impl Next {
    /// Creates a new `Next` with no endpoint.
    ///
    /// If every middleware passes through, the chain ends in a `500`.
    pub fn new(middlewares: Vec<MiddlewareHandler>) -> Self {
        Self {
            middlewares,
            index: 0,
            endpoint: None,
        }
    }

    /// Creates a new `Next` that ends in `endpoint` once `middlewares` are exhausted.
    pub fn with_endpoint(middlewares: Vec<MiddlewareHandler>, endpoint: Handler) -> Self {
        Self {
            middlewares,
            index: 0,
            endpoint: Some(endpoint),
        }
    }

    /// Invokes the next middleware in the chain (or the endpoint) and returns its response.
    pub async fn run(mut self, ctx: Context) -> Response {
        if self.index < self.middlewares.len() {
            let handler = self.middlewares[self.index].clone();
            self.index += 1;
            handler(ctx, self).await
        } else if let Some(endpoint) = self.endpoint.take() {
            endpoint(ctx).await
        } else {
            Response::detail(
                StatusCode::InternalServerError,
                "No response generated by middleware pipeline",
            )
        }
    }
}

/// The core trait for all middleware.
///
/// Implementors receive a [`Context`] and a [`Next`] cursor. They may:
///
/// - **Pass through**: call `next.run(ctx).await` without modification.
/// - **Short-circuit**: return a [`Response`] directly without calling `next`.
/// - **Decorate**: call `next.run(ctx).await`, inspect the response, and return
///   a modified copy.
///
/// Implementations must be `Send + Sync` because middleware is shared across
/// Tokio tasks, and `handle` must return a pinned, `Send` future.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the next middleware.
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

/// Logs each request's method, path, status, and duration.
///
/// Credentials and bodies are never logged.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().as_str().to_string();
            let path = ctx.request().path().to_string();

            let response = next.run(ctx).await;

            tracing::info!(
                method = %method,
                path = %path,
                status = response.status().as_u16(),
                elapsed = ?start.elapsed(),
                "request completed"
            );

            response
        })
    }
}

/// Counter of completed requests, labelled by method, path and status.
pub const REQUESTS_TOTAL: &str = "carprice_http_requests_total";

/// Histogram of request latency in seconds, labelled by method and path.
pub const REQUEST_DURATION_SECONDS: &str = "carprice_http_request_duration_seconds";

/// Records [`REQUESTS_TOTAL`] and [`REQUEST_DURATION_SECONDS`] for every
/// request into the given recorder.
///
/// Requests that matched no route are labelled `path="unmatched"` so that
/// arbitrary paths cannot grow the series set.
pub struct MetricsMiddleware {
    recorder: Arc<dyn Recorder + Send + Sync>,
}

impl MetricsMiddleware {
    pub fn new(recorder: Arc<dyn Recorder + Send + Sync>) -> Self {
        Self { recorder }
    }
}

impl Middleware for MetricsMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let recorder = Arc::clone(&self.recorder);
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().as_str().to_owned();
            let path = ctx.request().path().to_owned();

            let response = next.run(ctx).await;

            let status = response.status();
            let path = if status == StatusCode::NotFound {
                "unmatched".to_owned()
            } else {
                path
            };
            let elapsed = start.elapsed().as_secs_f64();
            metrics::with_local_recorder(recorder.as_ref(), || {
                metrics::counter!(
                    REQUESTS_TOTAL,
                    "method" => method.clone(),
                    "path" => path.clone(),
                    "status" => status.as_u16().to_string()
                )
                .increment(1);
                metrics::histogram!(REQUEST_DURATION_SECONDS, "method" => method, "path" => path)
                    .record(elapsed);
            });

            response
        })
    }
}

/// Bounds the downstream chain (auth, prediction, cache I/O) to a fixed duration.
///
/// On expiry the in-flight work is dropped and a `504 Gateway Timeout` is returned.
pub struct TimeoutMiddleware {
    limit: Duration,
}

impl TimeoutMiddleware {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }
}

impl Middleware for TimeoutMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let limit = self.limit;
        Box::pin(async move {
            match tokio::time::timeout(limit, next.run(ctx)).await {
                Ok(response) => response,
                Err(_) => {
                    tracing::warn!(limit = ?limit, "request timed out");
                    Response::detail(StatusCode::GatewayTimeout, "request timed out")
                }
            }
        })
    }
}

/// Global middleware stack terminated by a [`Router`].
///
/// This is the single entry point the server hands every parsed request to.
pub struct Pipeline {
    middlewares: Vec<MiddlewareHandler>,
    endpoint: Handler,
}

impl Pipeline {
    pub fn new(router: Router) -> Self {
        let router = Arc::new(router);
        let endpoint: Handler = Arc::new(move |ctx: Context| -> BoxedResponse {
            let router = Arc::clone(&router);
            Box::pin(async move { router.dispatch(ctx).await })
        });
        Self {
            middlewares: Vec::new(),
            endpoint,
        }
    }

    /// Appends a middleware; middlewares run in the order they were added.
    #[must_use]
    pub fn layer<M>(mut self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.middlewares.push(from_middleware(Arc::new(middleware)));
        self
    }

    /// Runs `request` through the middleware stack and the router.
    pub async fn handle(&self, request: Request) -> Response {
        Next::with_endpoint(self.middlewares.clone(), Arc::clone(&self.endpoint))
            .run(Context::new(request))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request(path: &str) -> Request {
        let raw = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        Request::parse(raw.as_bytes()).unwrap().0
    }

    struct Tag(&'static str);

    impl Middleware for Tag {
        fn handle(
            &self,
            ctx: Context,
            next: Next,
        ) -> Pin<Box<dyn Future<Output = Response> + Send>> {
            let tag = self.0;
            Box::pin(async move {
                let mut response = next.run(ctx).await;
                response.add_header("X-Layer", tag);
                response
            })
        }
    }

    #[tokio::test]
    async fn exhausted_chain_without_endpoint_is_500() {
        let res = Next::new(Vec::new()).run(Context::new(make_request("/"))).await;
        assert_eq!(res.status(), StatusCode::InternalServerError);
    }

    #[tokio::test]
    async fn pipeline_runs_layers_in_order_then_router() {
        let mut router = Router::new();
        router.get("/health", |_ctx| async { Response::new(StatusCode::Ok) });
        let pipeline = Pipeline::new(router)
            .layer(Tag("outer"))
            .layer(Tag("inner"));

        let res = pipeline.handle(make_request("/health")).await;
        assert_eq!(res.status(), StatusCode::Ok);
        // Decoration happens on the way out, so the inner layer writes first.
        let tags: Vec<_> = res
            .headers()
            .iter()
            .filter(|(name, _)| *name == "X-Layer")
            .map(|(_, value)| value)
            .collect();
        assert_eq!(tags, vec!["inner", "outer"]);
    }

    #[tokio::test]
    async fn logger_passes_response_through() {
        let pipeline = Pipeline::new(Router::new()).layer(LoggerMiddleware);
        let res = pipeline.handle(make_request("/missing")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn metrics_count_requests_by_route_and_status() {
        use metrics_exporter_prometheus::PrometheusBuilder;

        let recorder = Arc::new(PrometheusBuilder::new().build_recorder());
        let handle = recorder.handle();

        let mut router = Router::new();
        router.get("/health", |_ctx| async { Response::new(StatusCode::Ok) });
        let pipeline = Pipeline::new(router).layer(MetricsMiddleware::new(recorder));

        for path in ["/health", "/health", "/wp-admin"] {
            pipeline.handle(make_request(path)).await;
        }

        let rendered = handle.render();
        let line = |path: &str, status: &str| {
            rendered
                .lines()
                .find(|line| {
                    line.starts_with(REQUESTS_TOTAL)
                        && line.contains(&format!("path=\"{path}\""))
                        && line.contains(&format!("status=\"{status}\""))
                })
                .map(str::to_owned)
        };
        assert!(line("/health", "200").is_some_and(|l| l.ends_with(" 2")));
        assert!(line("unmatched", "404").is_some_and(|l| l.ends_with(" 1")));
        assert!(!rendered.contains("wp-admin"));
        assert!(rendered.contains(REQUEST_DURATION_SECONDS));
    }

    #[tokio::test]
    async fn timeout_returns_504_when_handler_stalls() {
        let mut router = Router::new();
        router.get("/slow", |_ctx| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Response::new(StatusCode::Ok)
        });
        let pipeline =
            Pipeline::new(router).layer(TimeoutMiddleware::new(Duration::from_millis(20)));

        let res = pipeline.handle(make_request("/slow")).await;
        assert_eq!(res.status(), StatusCode::GatewayTimeout);
    }
}
