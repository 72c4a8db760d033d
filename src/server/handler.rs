use super::{Request, Response};
use crate::contract_router::ContractBearing;
use std::sync::Arc;

/// What a handler tells the router to do after it returns.
#[derive(Debug)]
pub enum Next {
    /// Run the next matching handler
    Continue,
    /// The request is handled; stop dispatching
    Done,
    /// Skip remaining handlers and hand the error to the error handlers
    Error(anyhow::Error),
}

impl Next {
    /// Shorthand for `Next::Error(error.into())`.
    pub fn error(error: impl Into<anyhow::Error>) -> Self {
        Next::Error(error.into())
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Next::Error(_))
    }
}

/// A request handler or middleware.
///
/// Handlers run in registration order. A handler that finishes the response
/// should return [`Next::Done`]; middleware returns [`Next::Continue`].
pub trait Handler: Send + Sync {
    fn handle(&self, req: &mut Request, res: &mut Response) -> Next;

    /// The contract carried by this handler, if it is a validated sub-router.
    ///
    /// Mounting records every handler answering `Some` so its routes are
    /// included in generated documents.
    fn contract_bearing(&self) -> Option<Arc<dyn ContractBearing>> {
        None
    }
}

/// Receives errors raised by handlers of the router it is attached to.
pub trait ErrorHandler: Send + Sync {
    /// Handle `error`.
    ///
    /// # Errors
    ///
    /// Return the error (or a replacement) to pass it to the next error
    /// handler, or to the parent router when none is left.
    fn handle_error(
        &self,
        error: anyhow::Error,
        req: &mut Request,
        res: &mut Response,
    ) -> Result<(), anyhow::Error>;
}

struct FnHandler<F>(F);

impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut Request, &mut Response) -> Next + Send + Sync,
{
    fn handle(&self, req: &mut Request, res: &mut Response) -> Next {
        (self.0)(req, res)
    }
}

struct FnErrorHandler<F>(F);

impl<F> ErrorHandler for FnErrorHandler<F>
where
    F: Fn(anyhow::Error, &mut Request, &mut Response) -> Result<(), anyhow::Error> + Send + Sync,
{
    fn handle_error(
        &self,
        error: anyhow::Error,
        req: &mut Request,
        res: &mut Response,
    ) -> Result<(), anyhow::Error> {
        (self.0)(error, req, res)
    }
}

/// Wrap a closure as a shareable [`Handler`].
///
/// ```rust
/// use contract_router::server::{handler_fn, Next};
///
/// let hello = handler_fn(|_req, res| {
///     res.send("hello");
///     Next::Done
/// });
/// # let _ = hello;
/// ```
pub fn handler_fn<F>(f: F) -> Arc<dyn Handler>
where
    F: Fn(&mut Request, &mut Response) -> Next + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

/// Wrap a closure as a shareable [`ErrorHandler`].
pub fn error_handler_fn<F>(f: F) -> Arc<dyn ErrorHandler>
where
    F: Fn(anyhow::Error, &mut Request, &mut Response) -> Result<(), anyhow::Error>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnErrorHandler(f))
}
