use super::matcher::PathMatcher;
use crate::contract::HttpMethod;
use crate::error::ContractError;
use crate::server::{ErrorHandler, Handler, Next, Request, Response};
use http::Method;
use parking_lot::RwLock;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// The routing operations a contract router delegates to.
///
/// Implemented by [`Router`]; any other router can be wrapped by
/// implementing these three operations.
pub trait BaseRouter: Send + Sync + 'static {
    /// Run `handlers` for every request whose path starts with `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::InvalidPath`] if `path` cannot be compiled.
    fn mount(&self, path: &str, handlers: Vec<Arc<dyn Handler>>) -> Result<(), ContractError>;

    /// Run `handlers` for `method` requests matching `path` exactly.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::InvalidPath`] if `path` cannot be compiled.
    fn route(
        &self,
        method: HttpMethod,
        path: &str,
        handlers: Vec<Arc<dyn Handler>>,
    ) -> Result<(), ContractError>;

    /// Run the matching handlers for one request.
    fn dispatch(&self, req: &mut Request, res: &mut Response) -> Next;
}

struct Layer {
    method: Option<Method>,
    matcher: PathMatcher,
    handlers: Vec<Arc<dyn Handler>>,
}

#[derive(Default)]
struct RouterTable {
    layers: Vec<Arc<Layer>>,
    error_handlers: Vec<Arc<dyn ErrorHandler>>,
}

/// In-process router with Express semantics.
///
/// Layers (mounts and routes) run in registration order. A mount strips its
/// prefix from `req.path` while its handlers run, which lets routers nest.
/// Cloning yields another handle to the same routing table.
///
/// # Example
///
/// ```rust
/// use contract_router::router::Router;
/// use contract_router::server::{handler_fn, Next, Request};
/// use http::Method;
///
/// let api = Router::new();
/// api.get("/ping", vec![handler_fn(|_req, res| {
///     res.send("pong");
///     Next::Done
/// })])
/// .unwrap();
///
/// let app = Router::new();
/// app.mount("/api", vec![api.handler()]).unwrap();
///
/// let res = app.handle_request(Request::new(Method::GET, "/api/ping"));
/// assert_eq!(res.status_code(), 200);
/// ```
#[derive(Clone, Default)]
pub struct Router {
    table: Arc<RwLock<RouterTable>>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push_layer(&self, method: Option<Method>, matcher: PathMatcher, handlers: Vec<Arc<dyn Handler>>) {
        debug!(
            method = method.as_ref().map_or("*", Method::as_str),
            path = %matcher.template(),
            params = ?matcher.param_names(),
            handler_count = handlers.len(),
            "Layer registered"
        );
        self.table.write().layers.push(Arc::new(Layer {
            method,
            matcher,
            handlers,
        }));
    }

    /// Mount handlers under `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::InvalidPath`] if `path` cannot be compiled.
    pub fn mount(&self, path: &str, handlers: Vec<Arc<dyn Handler>>) -> Result<(), ContractError> {
        let matcher = PathMatcher::prefix(path)?;
        self.push_layer(None, matcher, handlers);
        Ok(())
    }

    /// Mount handlers at the router's root.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the root template always compiles.
    pub fn use_root(&self, handlers: Vec<Arc<dyn Handler>>) -> Result<(), ContractError> {
        self.mount("/", handlers)
    }

    /// Register handlers for `method` requests matching `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::InvalidPath`] if `path` cannot be compiled.
    pub fn route(
        &self,
        method: HttpMethod,
        path: &str,
        handlers: Vec<Arc<dyn Handler>>,
    ) -> Result<(), ContractError> {
        let matcher = PathMatcher::route(path)?;
        self.push_layer(Some(method.as_http()), matcher, handlers);
        Ok(())
    }

    /// # Errors
    ///
    /// See [`Router::route`].
    pub fn get(&self, path: &str, handlers: Vec<Arc<dyn Handler>>) -> Result<(), ContractError> {
        self.route(HttpMethod::Get, path, handlers)
    }

    /// # Errors
    ///
    /// See [`Router::route`].
    pub fn post(&self, path: &str, handlers: Vec<Arc<dyn Handler>>) -> Result<(), ContractError> {
        self.route(HttpMethod::Post, path, handlers)
    }

    /// # Errors
    ///
    /// See [`Router::route`].
    pub fn put(&self, path: &str, handlers: Vec<Arc<dyn Handler>>) -> Result<(), ContractError> {
        self.route(HttpMethod::Put, path, handlers)
    }

    /// # Errors
    ///
    /// See [`Router::route`].
    pub fn patch(&self, path: &str, handlers: Vec<Arc<dyn Handler>>) -> Result<(), ContractError> {
        self.route(HttpMethod::Patch, path, handlers)
    }

    /// # Errors
    ///
    /// See [`Router::route`].
    pub fn delete(&self, path: &str, handlers: Vec<Arc<dyn Handler>>) -> Result<(), ContractError> {
        self.route(HttpMethod::Delete, path, handlers)
    }

    /// Add an error handler. Errors raised by this router's handlers (and
    /// errors left unhandled by nested routers) are offered to the error
    /// handlers in registration order.
    pub fn on_error(&self, handler: Arc<dyn ErrorHandler>) {
        self.table.write().error_handlers.push(handler);
    }

    /// This router as a mountable handler.
    #[must_use]
    pub fn handler(&self) -> Arc<dyn Handler> {
        Arc::new(self.clone())
    }

    /// Dispatch `req` through the router and produce the final response.
    ///
    /// Requests no handler finished get a 404 JSON body; errors no error
    /// handler took get a 500 JSON body.
    #[must_use]
    pub fn handle_request(&self, mut req: Request) -> Response {
        let mut res = Response::new();
        match self.dispatch(&mut req, &mut res) {
            Next::Error(err) => {
                error!(
                    method = %req.method,
                    path = %req.original_path,
                    error = %err,
                    "Unhandled error"
                );
                res.write_json_error(
                    500,
                    json!({
                        "error": "Internal Server Error",
                        "message": err.to_string(),
                    }),
                );
            }
            Next::Continue | Next::Done if !res.is_finished() => {
                warn!(
                    method = %req.method,
                    path = %req.original_path,
                    "No route matched"
                );
                res.write_json_error(
                    404,
                    json!({
                        "error": "Not Found",
                        "method": req.method.as_str(),
                        "path": req.original_path,
                    }),
                );
            }
            Next::Continue | Next::Done => {}
        }
        res
    }

    /// Run matching layers until one finishes the request or raises an error.
    fn run_layers(&self, layers: &[Arc<Layer>], req: &mut Request, res: &mut Response) -> Next {
        for layer in layers {
            if layer.method.as_ref().is_some_and(|method| *method != req.method) {
                continue;
            }
            let Some(matched) = layer.matcher.matches(&req.path) else {
                continue;
            };

            let outer = matched.rest.as_ref().map(|rest| {
                let path = std::mem::replace(&mut req.path, rest.clone());
                let params = std::mem::replace(&mut req.params, matched.params.clone());
                (path, params)
            });
            if outer.is_none() {
                req.params = matched.params;
            }

            let mut outcome = Next::Continue;
            for handler in &layer.handlers {
                outcome = handler.handle(req, res);
                if !matches!(outcome, Next::Continue) || res.is_finished() {
                    break;
                }
            }

            if let Some((path, params)) = outer {
                req.path = path;
                req.params = params;
            }

            match outcome {
                Next::Continue if !res.is_finished() => continue,
                Next::Continue | Next::Done => return Next::Done,
                Next::Error(err) => return Next::Error(err),
            }
        }
        Next::Continue
    }
}

impl BaseRouter for Router {
    fn mount(&self, path: &str, handlers: Vec<Arc<dyn Handler>>) -> Result<(), ContractError> {
        Router::mount(self, path, handlers)
    }

    fn route(
        &self,
        method: HttpMethod,
        path: &str,
        handlers: Vec<Arc<dyn Handler>>,
    ) -> Result<(), ContractError> {
        Router::route(self, method, path, handlers)
    }

    fn dispatch(&self, req: &mut Request, res: &mut Response) -> Next {
        // Snapshot so handlers may register routes without deadlocking.
        let (layers, error_handlers) = {
            let table = self.table.read();
            (table.layers.clone(), table.error_handlers.clone())
        };

        let mut pending = match self.run_layers(&layers, req, res) {
            Next::Error(err) => err,
            other => return other,
        };

        for handler in &error_handlers {
            match handler.handle_error(pending, req, res) {
                Ok(()) => return Next::Done,
                Err(err) => pending = err,
            }
        }
        Next::Error(pending)
    }
}

impl Handler for Router {
    fn handle(&self, req: &mut Request, res: &mut Response) -> Next {
        self.dispatch(req, res)
    }
}
