//! # Contract Router Module
//!
//! The coordinator tying contracts, validation and documentation together.
//!
//! A [`ContractRouter`] wraps a base router. Its per-method operations chain
//! a validation handler ahead of the caller's handlers, and its mount
//! operations remember every contract-bearing sub-router in a
//! [`RouterTree`], which [`ContractRouter::openapi`] walks to produce one
//! flat document.
//!
//! ```text
//! app (ContractRouter)
//!  ├── mount "/api/v1" ── v1 (ContractRouter)
//!  │                       └── mount "/users" ── users (ContractRouter)
//!  └── get "/health"
//! ```
//!
//! Documenting `app` yields `/health` plus every `users` route under
//! `/api/v1/users`.

mod core;
mod tree;

pub use core::{ContractBearing, ContractRouter};
pub use tree::RouterTree;
