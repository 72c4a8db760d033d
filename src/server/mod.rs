//! Request, response and handler types shared by the router and the
//! validation layer.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{error_handler_fn, handler_fn, ErrorHandler, Handler, Next};
pub use request::Request;
pub use response::{status_reason, Response};
