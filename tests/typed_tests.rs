#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{get, router};
use contract_router::server::{error_handler_fn, Request};
use contract_router::typed::{typed_handler, TypedRequest};
use contract_router::{Contract, HttpMethod, RouteConfig, Schema};
use http::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::TryFrom;

#[derive(Debug, Deserialize)]
struct ItemParams {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct ItemQuery {
    active: bool,
    #[serde(default)]
    tags: Vec<String>,
}

fn item_contract() -> Contract {
    Contract::new().route(
        HttpMethod::Get,
        "/items/:id",
        RouteConfig::new()
            .params(Schema::object([("id", Schema::integer())]))
            .query(Schema::object([
                ("active", Schema::boolean()),
                ("tags", Schema::array(Schema::string()).optional()),
            ])),
    )
}

#[test]
fn test_typed_request_from_validated_sections() {
    let mut req = Request::new(Method::GET, "/items/42?active=true");
    req.params.insert("id".to_string(), json!(42));
    req.query.insert("active".to_string(), json!(true));

    let typed = TypedRequest::<ItemParams, ItemQuery, Value>::try_from(&req).unwrap();
    assert_eq!(typed.params.id, 42);
    assert!(typed.query.active);
    assert!(typed.query.tags.is_empty());
    assert_eq!(typed.body, Value::Null);
}

#[test]
fn test_raw_strings_do_not_fit_numeric_types() {
    let mut req = Request::new(Method::GET, "/items/42");
    req.params.insert("id".to_string(), json!("42"));
    let err = TypedRequest::<ItemParams, Value, Value>::try_from(&req).unwrap_err();
    assert!(format!("{err:#}").contains("path parameters do not match handler type"));
}

#[test]
fn test_typed_handler_sees_coerced_values() {
    let app = router(item_contract());
    app.get(
        "/items/:id",
        vec![typed_handler(|req: TypedRequest<ItemParams, ItemQuery, Value>| {
            json!({ "id": req.params.id, "active": req.query.active, "tags": req.query.tags })
        })],
    )
    .unwrap();

    let res = get(&app, "/items/7?active=false&tags=a&tags=b");
    assert_eq!(res.status_code(), 200);
    assert_eq!(
        res.body().unwrap(),
        &json!({ "id": 7, "active": false, "tags": ["a", "b"] })
    );
}

#[test]
fn test_type_mismatch_is_forwarded_as_error() {
    #[derive(Debug, Deserialize)]
    struct WrongParams {
        #[allow(dead_code)]
        slug: String,
    }

    let app = router(item_contract());
    app.get(
        "/items/:id",
        vec![typed_handler(|_req: TypedRequest<WrongParams, Value, Value>| json!({}))],
    )
    .unwrap();
    assert_eq!(get(&app, "/items/7?active=true").status_code(), 500);

    app.on_error(error_handler_fn(|err, _req, res| {
        res.status(502).json(&json!({ "error": format!("{err:#}") }));
        Ok(())
    }));
    let res = get(&app, "/items/7?active=true");
    assert_eq!(res.status_code(), 502);
    assert!(res.body().unwrap()["error"]
        .as_str()
        .unwrap()
        .contains("path parameters"));
}
