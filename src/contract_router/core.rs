use super::tree::RouterTree;
use crate::contract::{Contract, HttpMethod};
use crate::error::ContractError;
use crate::openapi::{register, OpenApiFactory, OpenApiRegistry, RegisterOptions};
use crate::router::{BaseRouter, Router};
use crate::runtime_config::RuntimeConfig;
use crate::server::{ErrorHandler, Handler, Next, Request, Response};
use crate::validate::ValidationMiddleware;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// A router that carries a contract.
///
/// Handlers whose [`Handler::contract_bearing`] returns `Some` are treated
/// as validated sub-routers: mounting one records it in the parent's
/// [`RouterTree`] so its routes appear in the parent's documents.
pub trait ContractBearing: Send + Sync {
    fn contract(&self) -> &Contract;

    /// Register this router's routes and those of every router mounted
    /// below it.
    ///
    /// # Errors
    ///
    /// - [`ContractError::MissingRoute`] for an undeclared route
    /// - [`ContractError::NestingTooDeep`] past the configured depth limit
    fn register_into(
        &self,
        registry: &mut OpenApiRegistry,
        options: &RegisterOptions,
    ) -> Result<(), ContractError>;
}

struct RouterState<R> {
    contract: Contract,
    base: R,
    config: RuntimeConfig,
    tree: RwLock<RouterTree>,
}

impl<R: BaseRouter> ContractBearing for RouterState<R> {
    fn contract(&self) -> &Contract {
        &self.contract
    }

    fn register_into(
        &self,
        registry: &mut OpenApiRegistry,
        options: &RegisterOptions,
    ) -> Result<(), ContractError> {
        let limit = self.config.max_nesting_depth;
        if options.depth > limit {
            return Err(ContractError::NestingTooDeep {
                limit,
                path: options.path_prefix.clone().unwrap_or_default(),
            });
        }

        register(&self.contract, registry, options)?;

        // Release the lock before recursing; a child may be this router.
        let children: Vec<(String, Arc<dyn ContractBearing>)> = self
            .tree
            .read()
            .iter()
            .map(|(path, child)| (path.to_string(), child))
            .collect();
        for (mount_path, child) in children {
            child.register_into(registry, &options.nested(&mount_path))?;
        }
        Ok(())
    }
}

/// Wraps a [`BaseRouter`] with a [`Contract`].
///
/// Every route added through [`get`](Self::get) and friends runs a
/// [`ValidationMiddleware`] ahead of its handlers, and
/// [`openapi`](Self::openapi) documents this router together with every
/// contract router mounted below it. Cloning yields another handle to the
/// same router.
///
/// # Example
///
/// ```rust
/// use contract_router::contract::{Contract, HttpMethod, RouteConfig};
/// use contract_router::contract_router::ContractRouter;
/// use contract_router::openapi::DocumentConfig;
/// use contract_router::runtime_config::RuntimeConfig;
/// use contract_router::schema::Schema;
/// use contract_router::server::{handler_fn, Next};
///
/// let contract = Contract::new().route(
///     HttpMethod::Get,
///     "/ping",
///     RouteConfig::new().response(200, Schema::string()),
/// );
/// let api = ContractRouter::with_config(contract, RuntimeConfig::default());
/// api.get("/ping", vec![handler_fn(|_req, res| {
///     res.json(&"pong");
///     Next::Done
/// })])
/// .unwrap();
///
/// let doc = api.openapi().unwrap().generate(&DocumentConfig::new("Ping", "1.0.0"));
/// assert!(doc["paths"]["/ping"]["get"].is_object());
/// ```
pub struct ContractRouter<R: BaseRouter = Router> {
    state: Arc<RouterState<R>>,
}

impl<R: BaseRouter> Clone for ContractRouter<R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<R: BaseRouter> std::fmt::Debug for ContractRouter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractRouter")
            .field("routes", &self.state.contract.iter_routes().count())
            .field("tree", &*self.state.tree.read())
            .finish_non_exhaustive()
    }
}

impl ContractRouter<Router> {
    /// Create a router for `contract` with configuration from the environment.
    #[must_use]
    pub fn create(contract: Contract) -> Self {
        Self::with_config(contract, RuntimeConfig::from_env())
    }

    #[must_use]
    pub fn with_config(contract: Contract, config: RuntimeConfig) -> Self {
        Self::with_base(Router::new(), contract, config)
    }

    /// Run one request through this router as an application.
    pub fn handle_request(&self, req: Request) -> Response {
        self.state.base.handle_request(req)
    }

    /// Attach an error handler to the underlying router.
    pub fn on_error(&self, handler: Arc<dyn ErrorHandler>) {
        self.state.base.on_error(handler);
    }
}

impl<R: BaseRouter> ContractRouter<R> {
    /// Wrap an existing base router.
    pub fn with_base(base: R, contract: Contract, config: RuntimeConfig) -> Self {
        Self {
            state: Arc::new(RouterState {
                contract,
                base,
                config,
                tree: RwLock::new(RouterTree::new()),
            }),
        }
    }

    #[must_use]
    pub fn contract(&self) -> &Contract {
        &self.state.contract
    }

    #[must_use]
    pub fn base(&self) -> &R {
        &self.state.base
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.state.config
    }

    /// Snapshot of the nested router tree.
    #[must_use]
    pub fn tree(&self) -> RouterTree {
        self.state.tree.read().clone()
    }

    /// Mount `handlers` at `path`, recording contract-bearing ones once the
    /// base router has accepted the mount.
    ///
    /// Mounting a router into itself through a base router that keeps its
    /// handlers (as [`Router`] does) makes the router own itself; it is
    /// never dropped.
    ///
    /// # Errors
    ///
    /// Returns the base router's error for an invalid path; nothing is
    /// recorded in that case.
    pub fn mount(&self, path: &str, handlers: Vec<Arc<dyn Handler>>) -> Result<(), ContractError> {
        let bearing = contract_bearing(&handlers);
        self.state.base.mount(path, handlers)?;
        self.record(path, bearing);
        Ok(())
    }

    /// Mount `handlers` at this router's root.
    ///
    /// # Errors
    ///
    /// Returns the base router's error for an invalid path.
    pub fn use_root(&self, handlers: Vec<Arc<dyn Handler>>) -> Result<(), ContractError> {
        self.mount("/", handlers)
    }

    /// Add a validated route.
    ///
    /// The route's [`ValidationMiddleware`] runs before `handlers`. A
    /// contract-bearing handler in `handlers` is recorded under `path`.
    ///
    /// # Errors
    ///
    /// - [`ContractError::MissingRoute`] if the contract does not declare
    ///   `method` + `path`; nothing is registered in that case
    /// - [`ContractError::InvalidSchema`] if a declared schema does not compile
    /// - the base router's error for an invalid path
    pub fn route(
        &self,
        method: HttpMethod,
        path: &str,
        handlers: Vec<Arc<dyn Handler>>,
    ) -> Result<(), ContractError> {
        let validation =
            ValidationMiddleware::build(&self.state.contract, method, path, &self.state.config)?;
        let bearing = contract_bearing(&handlers);

        let mut chain: Vec<Arc<dyn Handler>> = Vec::with_capacity(handlers.len() + 1);
        chain.push(Arc::new(validation));
        chain.extend(handlers);

        let handler_count = chain.len();
        self.state.base.route(method, path, chain)?;
        self.record(path, bearing);
        debug!(method = %method, path = %path, handler_count, "Contract route added");
        Ok(())
    }

    /// # Errors
    ///
    /// See [`route`](Self::route).
    pub fn get(&self, path: &str, handlers: Vec<Arc<dyn Handler>>) -> Result<(), ContractError> {
        self.route(HttpMethod::Get, path, handlers)
    }

    /// # Errors
    ///
    /// See [`route`](Self::route).
    pub fn post(&self, path: &str, handlers: Vec<Arc<dyn Handler>>) -> Result<(), ContractError> {
        self.route(HttpMethod::Post, path, handlers)
    }

    /// # Errors
    ///
    /// See [`route`](Self::route).
    pub fn put(&self, path: &str, handlers: Vec<Arc<dyn Handler>>) -> Result<(), ContractError> {
        self.route(HttpMethod::Put, path, handlers)
    }

    /// # Errors
    ///
    /// See [`route`](Self::route).
    pub fn patch(&self, path: &str, handlers: Vec<Arc<dyn Handler>>) -> Result<(), ContractError> {
        self.route(HttpMethod::Patch, path, handlers)
    }

    /// # Errors
    ///
    /// See [`route`](Self::route).
    pub fn delete(&self, path: &str, handlers: Vec<Arc<dyn Handler>>) -> Result<(), ContractError> {
        self.route(HttpMethod::Delete, path, handlers)
    }

    /// Compile this router and every contract router below it into a
    /// fresh registry.
    ///
    /// # Errors
    ///
    /// See [`ContractBearing::register_into`].
    pub fn openapi(&self) -> Result<OpenApiFactory, ContractError> {
        let mut registry = OpenApiRegistry::new();
        self.state
            .register_into(&mut registry, &RegisterOptions::default())?;
        debug!(operation_count = registry.len(), "OpenAPI registry compiled");
        Ok(OpenApiFactory::new(registry))
    }

    /// This router as a mountable handler.
    #[must_use]
    pub fn handler(&self) -> Arc<dyn Handler> {
        Arc::new(self.clone())
    }

    fn record(&self, path: &str, bearing: Vec<Arc<dyn ContractBearing>>) {
        if bearing.is_empty() {
            return;
        }
        let mut tree = self.state.tree.write();
        for child in bearing {
            if tree.insert(path, &child) {
                info!(
                    mount_path = %path,
                    child_routes = child.contract().iter_routes().count(),
                    "Contract router mounted"
                );
            }
        }
    }
}

fn contract_bearing(handlers: &[Arc<dyn Handler>]) -> Vec<Arc<dyn ContractBearing>> {
    handlers
        .iter()
        .filter_map(|handler| handler.contract_bearing())
        .collect()
}

impl<R: BaseRouter> Handler for ContractRouter<R> {
    fn handle(&self, req: &mut Request, res: &mut Response) -> Next {
        self.state.base.dispatch(req, res)
    }

    fn contract_bearing(&self) -> Option<Arc<dyn ContractBearing>> {
        Some(Arc::clone(&self.state) as Arc<dyn ContractBearing>)
    }
}
