//! # OpenAPI Module
//!
//! Turns contracts into an OpenAPI 3.1 document.
//!
//! Generation runs in two stages:
//!
//! 1. **Compile** ([`register`]): each declared route is resolved against its
//!    contract and mount prefix into a [`PathEntry`] and added to an
//!    [`OpenApiRegistry`]
//! 2. **Render** ([`OpenApiGenerator`]): the registry is written out as a
//!    typed [`Document`], with named schemas moved into `components.schemas`
//!
//! [`OpenApiFactory`] wraps a populated registry so callers can add
//! components before rendering.

mod compiler;
mod document;
mod model;
mod registry;

pub use compiler::{register, register_route, RegisterOptions};
pub use document::{DocumentConfig, Info, OpenApiFactory, OpenApiGenerator, Server};
pub use model::{
    Content, Document, MediaType, Operation, Parameter, ParameterLocation, RequestBody, Response,
};
pub use registry::{BodyEntry, MediaEntry, OpenApiRegistry, PathEntry, RequestEntry, ResponseEntry};
