//! # contract-router
//!
//! **contract-router** is a typed HTTP contract layer: one declarative
//! [`Contract`] drives runtime request validation *and* an OpenAPI 3.1
//! document, so the two can never drift apart.
//!
//! ## Overview
//!
//! A contract maps HTTP method + path to request schemas (headers, path
//! parameters, query, body) and response schemas. A [`ContractRouter`] wraps a
//! base router with that contract:
//!
//! - every route added with `get`/`post`/`put`/`patch`/`delete` runs a
//!   [`ValidationMiddleware`] ahead of its handlers
//! - failures are handled by the route's validation error policy (`send` a
//!   400, `forward` to the error handlers, `ignore`, or a custom function)
//! - contract routers mounted inside each other form a tree that
//!   [`ContractRouter::openapi`] flattens into one document
//!
//! ## Architecture
//!
//! - **[`path`]** - Path template normalisation (`:id`, `:id?`, `{/:id}` → `{id}`)
//! - **[`schema`]** - JSON Schema handle with content-type tags, void marker and caching validator
//! - **[`error`]** - Validation error model and configuration errors
//! - **[`contract`]** - Contract and route declarations, YAML/JSON loading
//! - **[`validate`]** - Request validation middleware
//! - **[`openapi`]** - Contract → registry compiler and document generator
//! - **[`contract_router`]** - The coordinator and nested router tree
//! - **[`router`]** - In-process router with Express-style paths and nesting
//! - **[`server`]** - Request, response and handler types
//! - **[`typed`]** - Handlers over deserialized request types
//! - **[`runtime_config`]** - Environment-driven runtime knobs
//! - **[`logging`]** - `tracing` subscriber setup
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Router
//!     participant Validation as ValidationMiddleware
//!     participant Handler
//!     participant Errors as ErrorHandler
//!
//!     Client->>Router: Request
//!     Router->>Validation: matching route
//!     Validation->>Validation: headers, params, query, body
//!     alt valid (or policy = ignore)
//!         Validation->>Handler: Next::Continue
//!         Handler-->>Client: Response
//!     else policy = send
//!         Validation-->>Client: 400 {paramsErrors, ...}
//!     else policy = forward
//!         Validation->>Errors: Next::Error(ValidationError)
//!         Errors-->>Client: Response
//!     end
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use contract_router::{Contract, ContractRouter, DocumentConfig, HttpMethod, RouteConfig, Schema};
//! use contract_router::runtime_config::RuntimeConfig;
//! use contract_router::server::{handler_fn, Next, Request};
//! use http::Method;
//! use serde_json::json;
//!
//! let contract = Contract::new().tag("items").route(
//!     HttpMethod::Get,
//!     "/items/:id",
//!     RouteConfig::new()
//!         .summary("Fetch an item")
//!         .params(Schema::object([("id", Schema::string().min_length(3))]))
//!         .response(200, Schema::object([("id", Schema::string())]).describe("The item")),
//! );
//!
//! let items = ContractRouter::with_config(contract, RuntimeConfig::default());
//! items
//!     .get("/items/:id", vec![handler_fn(|req, res| {
//!         res.json(&json!({ "id": req.params["id"] }));
//!         Next::Done
//!     })])
//!     .unwrap();
//!
//! let ok = items.handle_request(Request::new(Method::GET, "/items/123"));
//! assert_eq!(ok.status_code(), 200);
//!
//! let rejected = items.handle_request(Request::new(Method::GET, "/items/12"));
//! assert_eq!(rejected.status_code(), 400);
//! assert!(rejected.body().unwrap()["paramsErrors"].is_array());
//!
//! let doc = items.openapi().unwrap().generate(&DocumentConfig::new("Items", "1.0.0"));
//! assert_eq!(doc["paths"]["/items/{id}"]["get"]["tags"], json!(["items"]));
//! ```
//!
//! ## Contracts From Files
//!
//! Contracts can be written in YAML or JSON with the same method → path →
//! field nesting; schemas are JSON Schema objects:
//!
//! ```yaml
//! tags: [users]
//! commonResponses:
//!   500:
//!     type: object
//!     description: Unexpected failure
//! get:
//!   /users/:id:
//!     summary: Fetch a user
//!     params:
//!       type: object
//!       properties:
//!         id: { type: string, minLength: 3 }
//!       required: [id]
//!     responses:
//!       200: { type: object, description: The user }
//!       204: { x-void: true, description: Nothing to return }
//! ```
//!
//! Load one with [`contract::load_contract`].
//!
//! ## Logging
//!
//! The crate emits `tracing` events only. Call
//! [`logging::init_logging_with_config`] to print them; see [`logging`] for
//! the `CONTRACT_LOG_*` variables.

pub mod contract;
pub mod contract_router;
pub mod error;
pub mod logging;
pub mod openapi;
pub mod path;
pub mod router;
pub mod runtime_config;
pub mod schema;
pub mod server;
pub mod typed;
pub mod validate;

pub use contract::{load_contract, Contract, HttpMethod, OperationOverrides, RequestOverrides, RouteConfig, ValidationErrorPolicy};
pub use contract_router::{ContractBearing, ContractRouter, RouterTree};
pub use error::{ContractError, Section, ValidationError, ValidationIssue};
pub use openapi::{DocumentConfig, OpenApiFactory, OpenApiRegistry, RegisterOptions};
pub use path::{openapi_path, params_schema};
pub use schema::Schema;
pub use validate::ValidationMiddleware;
