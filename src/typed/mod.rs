//! # Typed Module
//!
//! Handlers that work on Rust types instead of raw JSON maps.
//!
//! Contracts are checked at runtime, so the shapes a handler can rely on
//! are only known once validation has run. [`typed_handler`] deserializes
//! the validated `params`, `query` and `body` into caller-declared serde
//! types and serializes the handler's return value as the JSON response.
//!
//! ```text
//! ValidationMiddleware ──► TypedRequest::try_from ──► fn(TypedRequest) -> T ──► res.json(T)
//!                               │ mismatch
//!                               ▼
//!                        Next::Error (error handlers)
//! ```

mod core;

pub use core::{typed_handler, TypedRequest};
