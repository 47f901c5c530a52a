//! Middleware chain composition.
//!
//! A [`Chain`] is an ordered list of [`Interceptor`]s. Wrapping a terminal service with
//! [`Chain::then`] (or applying the chain as a tower [`Layer`]) yields a service that runs the
//! interceptors in list order, each wrapping the next: the first interceptor is outermost, so it
//! sees the request first and the response last.
//!
//! ```rust,no_run
//! use axum::{routing::get, Router};
//! use snippetbox::chain::Chain;
//! use snippetbox::middleware::{LogRequest, RecoverPanic, SecureHeaders};
//!
//! let standard = Chain::new()
//!     .with(RecoverPanic)
//!     .with(LogRequest)
//!     .with(SecureHeaders);
//!
//! let app: Router = Router::new()
//!     .route("/ping", get(|| async { "OK" }))
//!     .layer(standard);
//! ```

use async_trait::async_trait;
use axum::{extract::Request, response::Response};
use futures_util::future::BoxFuture;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::util::BoxCloneService;
use tower::{Layer, Service, ServiceExt};

/// A single step of a chain.
///
/// An interceptor either forwards the request with [`Next::run`] (optionally inspecting or
/// rewriting the response on the way out) or answers it directly, in which case nothing further
/// down the chain runs.
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    async fn intercept(&self, request: Request, next: Next) -> Response;
}

/// The remainder of a chain, handed to each interceptor.
pub struct Next {
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    position: usize,
    terminal: BoxCloneService<Request, Response, Infallible>,
}

impl Next {
    /// Run the rest of the chain and then the terminal service.
    pub fn run(mut self, request: Request) -> BoxFuture<'static, Response> {
        Box::pin(async move {
            match self.interceptors.get(self.position).cloned() {
                Some(interceptor) => {
                    self.position += 1;
                    interceptor.intercept(request, self).await
                }
                None => match self.terminal.oneshot(request).await {
                    Ok(response) => response,
                    Err(never) => match never {},
                },
            }
        })
    }
}

/// Ordered list of interceptors.
#[derive(Clone, Default)]
pub struct Chain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an interceptor inside all current ones.
    pub fn with(mut self, interceptor: impl Interceptor) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// A new chain extended with `interceptor`; `self` is left untouched.
    pub fn append(&self, interceptor: impl Interceptor) -> Self {
        self.clone().with(interceptor)
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Wrap `terminal` with this chain.
    pub fn then<S>(&self, terminal: S) -> ChainService<S> {
        ChainService {
            interceptors: self.interceptors.clone().into(),
            inner: terminal,
        }
    }
}

impl<S> Layer<S> for Chain {
    type Service = ChainService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        self.then(inner)
    }
}

/// A terminal service wrapped by a chain.
#[derive(Clone)]
pub struct ChainService<S> {
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    inner: S,
}

impl<S> Service<Request> for ChainService<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // The terminal is driven to readiness by `oneshot` when the chain reaches it
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let next = Next {
            interceptors: self.interceptors.clone(),
            position: 0,
            terminal: BoxCloneService::new(self.inner.clone()),
        };
        Box::pin(async move { Ok(next.run(request).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::sync::Mutex;

    type Trace = Arc<Mutex<Vec<String>>>;

    struct Record {
        name: &'static str,
        trace: Trace,
    }

    #[async_trait]
    impl Interceptor for Record {
        async fn intercept(&self, request: Request, next: Next) -> Response {
            self.trace.lock().unwrap().push(format!("in:{}", self.name));
            let response = next.run(request).await;
            self.trace.lock().unwrap().push(format!("out:{}", self.name));
            response
        }
    }

    struct Reject;

    #[async_trait]
    impl Interceptor for Reject {
        async fn intercept(&self, _request: Request, _next: Next) -> Response {
            StatusCode::BAD_REQUEST.into_response()
        }
    }

    fn terminal(
        trace: Trace,
    ) -> impl Service<Request, Response = Response, Error = Infallible, Future: Send> + Clone + Send
    {
        tower::service_fn(move |_req: Request| {
            let trace = trace.clone();
            async move {
                trace.lock().unwrap().push("handler".to_string());
                Ok::<_, Infallible>("done".into_response())
            }
        })
    }

    fn request() -> Request {
        Request::builder().uri("/").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_first_interceptor_is_outermost() {
        let trace = Trace::default();
        let chain = Chain::new()
            .with(Record {
                name: "a",
                trace: trace.clone(),
            })
            .with(Record {
                name: "b",
                trace: trace.clone(),
            });

        let response = chain
            .then(terminal(trace.clone()))
            .oneshot(request())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            *trace.lock().unwrap(),
            vec!["in:a", "in:b", "handler", "out:b", "out:a"]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_skips_rest_of_chain() {
        let trace = Trace::default();
        let chain = Chain::new()
            .with(Record {
                name: "a",
                trace: trace.clone(),
            })
            .with(Reject)
            .with(Record {
                name: "c",
                trace: trace.clone(),
            });

        let response = chain
            .then(terminal(trace.clone()))
            .oneshot(request())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(*trace.lock().unwrap(), vec!["in:a", "out:a"]);
    }

    #[tokio::test]
    async fn test_append_leaves_original_untouched() {
        let trace = Trace::default();
        let dynamic = Chain::new().with(Record {
            name: "a",
            trace: trace.clone(),
        });
        let protected = dynamic.append(Reject);

        assert_eq!(dynamic.len(), 1);
        assert_eq!(protected.len(), 2);

        let response = dynamic
            .then(terminal(trace.clone()))
            .oneshot(request())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = protected
            .then(terminal(trace.clone()))
            .oneshot(request())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_empty_chain_calls_terminal() {
        let trace = Trace::default();
        let response = Chain::new()
            .then(terminal(trace.clone()))
            .oneshot(request())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*trace.lock().unwrap(), vec!["handler"]);
    }

    #[tokio::test]
    async fn test_chain_as_router_layer() {
        let trace = Trace::default();
        let app = axum::Router::new()
            .route("/", axum::routing::get(|| async { "routed" }))
            .layer(Chain::new().with(Record {
                name: "a",
                trace: trace.clone(),
            }));

        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, "routed");
        assert_eq!(*trace.lock().unwrap(), vec!["in:a", "out:a"]);
    }
}
