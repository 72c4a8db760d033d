#![allow(dead_code)]

use contract_router::runtime_config::RuntimeConfig;
use contract_router::server::{handler_fn, Handler, Next, Request, Response};
use contract_router::{Contract, ContractRouter};
use http::Method;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Defaults regardless of the `CONTRACT_*` variables of the test process.
pub fn router(contract: Contract) -> ContractRouter {
    ContractRouter::with_config(contract, RuntimeConfig::default())
}

/// Handler answering `{"ok": true, "params": .., "query": .., "body": ..}`.
pub fn echo() -> Arc<dyn Handler> {
    handler_fn(|req, res| {
        res.json(&json!({
            "ok": true,
            "headers": req.headers,
            "params": req.params,
            "query": req.query,
            "body": req.body,
        }));
        Next::Done
    })
}

/// Handler that counts its invocations and answers 200.
pub fn counting(counter: &Arc<AtomicUsize>) -> Arc<dyn Handler> {
    let counter = Arc::clone(counter);
    handler_fn(move |_req, res| {
        counter.fetch_add(1, Ordering::SeqCst);
        res.json(&json!({ "ok": true }));
        Next::Done
    })
}

pub fn get(app: &ContractRouter, uri: &str) -> Response {
    app.handle_request(Request::new(Method::GET, uri))
}

pub fn post_json(app: &ContractRouter, uri: &str, body: serde_json::Value) -> Response {
    app.handle_request(Request::new(Method::POST, uri).with_json(body))
}
