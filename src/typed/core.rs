use crate::server::{Handler, Next, Request, Response};
use anyhow::Context;
use http::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::convert::TryFrom;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::warn;

/// A request whose validated sections have been deserialized into handler
/// types.
///
/// Use [`Value`] for a section the handler does not care about.
#[derive(Debug, Clone)]
pub struct TypedRequest<P = Value, Q = Value, B = Value> {
    pub method: Method,
    pub path: String,
    /// Validated headers, lowercase keys
    pub headers: Map<String, Value>,
    pub params: P,
    pub query: Q,
    pub body: B,
}

impl<P, Q, B> TryFrom<&Request> for TypedRequest<P, Q, B>
where
    P: DeserializeOwned,
    Q: DeserializeOwned,
    B: DeserializeOwned,
{
    type Error = anyhow::Error;

    fn try_from(req: &Request) -> Result<Self, Self::Error> {
        Ok(Self {
            method: req.method.clone(),
            path: req.path.clone(),
            headers: req.headers.clone(),
            params: req.params_as().context("path parameters do not match handler type")?,
            query: req.query_as().context("query does not match handler type")?,
            body: req.body_as().context("body does not match handler type")?,
        })
    }
}

struct TypedHandler<P, Q, B, T, F> {
    f: F,
    _types: PhantomData<fn(P, Q, B) -> T>,
}

impl<P, Q, B, T, F> Handler for TypedHandler<P, Q, B, T, F>
where
    P: DeserializeOwned,
    Q: DeserializeOwned,
    B: DeserializeOwned,
    T: Serialize,
    F: Fn(TypedRequest<P, Q, B>) -> T + Send + Sync,
{
    fn handle(&self, req: &mut Request, res: &mut Response) -> Next {
        let typed = match TypedRequest::<P, Q, B>::try_from(&*req) {
            Ok(typed) => typed,
            Err(err) => {
                warn!(
                    method = %req.method,
                    path = %req.original_path,
                    error = %format!("{err:#}"),
                    "Validated request does not fit handler types"
                );
                return Next::Error(err);
            }
        };
        let output = (self.f)(typed);
        if !res.is_finished() {
            res.json(&output);
        }
        Next::Done
    }
}

/// Wrap a function over typed request data as a [`Handler`].
///
/// The sections are deserialized after validation has run, so the types
/// should mirror the route's schemas. A mismatch means the contract and the
/// handler disagree; it is forwarded as an error rather than answered with
/// 400. The function's return value is sent as a JSON 200 response.
///
/// ```rust
/// use contract_router::typed::{typed_handler, TypedRequest};
/// use serde::Deserialize;
/// use serde_json::{json, Value};
///
/// #[derive(Deserialize)]
/// struct ItemParams {
///     id: u64,
/// }
///
/// let get_item = typed_handler(|req: TypedRequest<ItemParams, Value, Value>| {
///     json!({ "id": req.params.id })
/// });
/// # let _ = get_item;
/// ```
pub fn typed_handler<P, Q, B, T, F>(f: F) -> Arc<dyn Handler>
where
    P: DeserializeOwned + 'static,
    Q: DeserializeOwned + 'static,
    B: DeserializeOwned + 'static,
    T: Serialize + 'static,
    F: Fn(TypedRequest<P, Q, B>) -> T + Send + Sync + 'static,
{
    Arc::new(TypedHandler {
        f,
        _types: PhantomData,
    })
}
