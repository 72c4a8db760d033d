//! # Router Module
//!
//! An in-process router with Express semantics. The contract layer does not
//! match paths itself; it registers layers on a [`BaseRouter`] and lets the
//! router decide which handlers run.
//!
//! ## Path Templates
//!
//! | Template            | Matches                        | Params            |
//! |---------------------|--------------------------------|-------------------|
//! | `/items/:id`        | `/items/42`                    | `id = "42"`       |
//! | `/items/:id?`       | `/items`, `/items/42`          | `id` if present   |
//! | `/orders{/:id}`     | `/orders`, `/orders/7`         | `id` if present   |
//!
//! Route templates match the whole path (a trailing slash is tolerated).
//! Mount templates match a prefix at a segment boundary; while the mounted
//! handlers run, `req.path` is the remainder, so a mounted router sees
//! paths relative to its mount point.
//!
//! ## Dispatch
//!
//! 1. Layers run in registration order; non-matching ones are skipped.
//! 2. A handler returning [`Next::Continue`](crate::server::Next) hands over
//!    to the next handler of the layer, then to the next matching layer.
//! 3. [`Next::Error`](crate::server::Next) skips the remaining layers and is
//!    offered to the router's error handlers; unhandled errors propagate to
//!    the parent router.

mod core;
mod matcher;

pub use core::{BaseRouter, Router};
pub use matcher::{PathMatch, PathMatcher};
