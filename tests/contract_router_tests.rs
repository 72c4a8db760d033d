#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{echo, get, router};
use contract_router::router::{BaseRouter, Router};
use contract_router::runtime_config::RuntimeConfig;
use contract_router::server::{handler_fn, Handler, Next, Request, Response};
use contract_router::{
    Contract, ContractError, ContractRouter, DocumentConfig, HttpMethod, RouteConfig, Schema,
};
use serde_json::json;
use std::sync::Arc;

fn users_contract() -> Contract {
    Contract::new()
        .tag("users")
        .route(
            HttpMethod::Get,
            "/",
            RouteConfig::new().response(200, Schema::array(Schema::string())),
        )
        .route(
            HttpMethod::Get,
            "/:userId",
            RouteConfig::new()
                .params(Schema::object([("userId", Schema::string().min_length(2))]))
                .response(200, Schema::object([("id", Schema::string())])),
        )
}

fn users_router() -> ContractRouter {
    let users = router(users_contract());
    users.get("/", vec![echo()]).unwrap();
    users.get("/:userId", vec![echo()]).unwrap();
    users
}

fn document<R: BaseRouter>(app: &ContractRouter<R>) -> serde_json::Value {
    app.openapi().unwrap().generate(&DocumentConfig::new("Test", "1.0.0"))
}

fn path_keys(doc: &serde_json::Value) -> Vec<String> {
    doc["paths"].as_object().unwrap().keys().cloned().collect()
}

#[test]
fn test_contract_is_exposed() {
    let app = router(users_contract());
    assert_eq!(app.contract().tags, vec!["users".to_string()]);
    assert_eq!(app.contract().iter_routes().count(), 2);
}

#[test]
fn test_nested_paths_are_prefixed_at_every_depth() {
    let users = users_router();
    let v1 = router(Contract::new());
    v1.mount("/users", vec![users.handler()]).unwrap();
    let app = router(Contract::new());
    app.mount("/api/v1", vec![v1.handler()]).unwrap();

    let doc = document(&app);
    assert_eq!(path_keys(&doc), vec!["/api/v1/users", "/api/v1/users/{userId}"]);
    assert_eq!(
        doc["paths"]["/api/v1/users/{userId}"]["get"]["tags"],
        json!(["users"])
    );
}

#[test]
fn test_nested_dispatch_validates_in_sub_router() {
    let v1 = router(Contract::new());
    v1.mount("/users", vec![users_router().handler()]).unwrap();
    let app = router(Contract::new());
    app.mount("/api/v1", vec![v1.handler()]).unwrap();

    let ok = get(&app, "/api/v1/users/ab");
    assert_eq!(ok.status_code(), 200);
    assert_eq!(ok.body().unwrap()["params"], json!({ "userId": "ab" }));

    let rejected = get(&app, "/api/v1/users/a");
    assert_eq!(rejected.status_code(), 400);
    assert!(rejected.body().unwrap()["paramsErrors"].is_array());
}

#[test]
fn test_mount_params_are_documented_from_prefix() {
    let posts = router(Contract::new().route(HttpMethod::Get, "/:postId", RouteConfig::new()));
    posts.get("/:postId", vec![echo()]).unwrap();
    let app = router(Contract::new());
    app.mount("/users/:userId/posts", vec![posts.handler()]).unwrap();

    let doc = document(&app);
    let op = &doc["paths"]["/users/{userId}/posts/{postId}"]["get"];
    let names: Vec<&str> = op["parameters"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["userId", "postId"]);
}

#[test]
fn test_root_mount_is_recorded_under_root() {
    let app = router(Contract::new());
    app.use_root(vec![users_router().handler()]).unwrap();

    assert_eq!(app.tree().children("/").len(), 1);
    let doc = document(&app);
    assert_eq!(path_keys(&doc), vec!["/", "/{userId}"]);
}

#[test]
fn test_plain_handlers_are_not_recorded() {
    let plain = Router::new();
    let app = router(Contract::new());
    app.mount("/plain", vec![plain.handler(), echo()]).unwrap();
    assert!(app.tree().is_empty());
    assert!(plain.handler().contract_bearing().is_none());
}

#[test]
fn test_same_router_mounted_twice_is_recorded_once() {
    let users = users_router();
    let app = router(Contract::new());
    app.mount("/users", vec![users.handler()]).unwrap();
    app.mount("/users", vec![users.handler()]).unwrap();
    app.mount("/people", vec![users.handler()]).unwrap();

    let tree = app.tree();
    assert_eq!(tree.children("/users").len(), 1);
    assert_eq!(tree.len(), 2);
    assert_eq!(tree.mount_paths().collect::<Vec<_>>(), vec!["/users", "/people"]);
}

#[test]
fn test_contract_bearing_route_handler_is_recorded() {
    let contract = Contract::new().route(HttpMethod::Get, "/admin", RouteConfig::new());
    let app = router(contract);
    let admin = router(Contract::new().route(HttpMethod::Get, "/", RouteConfig::new()));
    admin
        .get(
            "/",
            vec![handler_fn(|_req, res| {
                res.send("admin");
                Next::Done
            })],
        )
        .unwrap();

    app.get("/admin", vec![admin.handler()]).unwrap();
    assert_eq!(app.tree().children("/admin").len(), 1);

    // Both the route and the sub-router's "/" resolve to /admin; one entry remains
    let doc = document(&app);
    assert_eq!(path_keys(&doc), vec!["/admin"]);
    assert!(doc["paths"]["/admin"]["get"].is_object());
}

#[test]
fn test_openapi_reflects_later_mounts() {
    let app = router(Contract::new().route(HttpMethod::Get, "/health", RouteConfig::new()));
    app.get("/health", vec![echo()]).unwrap();
    assert_eq!(path_keys(&document(&app)), vec!["/health"]);

    app.mount("/users", vec![users_router().handler()]).unwrap();
    assert_eq!(
        path_keys(&document(&app)),
        vec!["/health", "/users", "/users/{userId}"]
    );
}

#[test]
fn test_generation_is_deterministic() {
    let app = router(users_contract());
    app.mount("/nested", vec![users_router().handler()]).unwrap();
    let config = DocumentConfig::new("Test", "1.0.0").server("http://localhost");
    let factory = app.openapi().unwrap();
    let first = factory.generate(&config);
    let second = app.openapi().unwrap().generate(&config);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_self_mount_hits_depth_limit() {
    let config = RuntimeConfig {
        max_nesting_depth: 3,
        ..RuntimeConfig::default()
    };
    let app = ContractRouter::with_config(
        Contract::new().route(HttpMethod::Get, "/", RouteConfig::new()),
        config,
    );
    // Recorded for documentation only; never dispatched in this test
    app.mount("/loop", vec![app.handler()]).unwrap();

    let err = app.openapi().unwrap_err();
    assert!(matches!(err, ContractError::NestingTooDeep { limit: 3, .. }));
}

#[test]
fn test_wrapping_a_custom_base_router() {
    let base = Router::new();
    let app = ContractRouter::with_base(base.clone(), users_contract(), RuntimeConfig::default());
    app.get("/:userId", vec![echo()]).unwrap();

    let res = base.handle_request(contract_router::server::Request::new(http::Method::GET, "/xy"));
    assert_eq!(res.status_code(), 200);
    let res = base.handle_request(contract_router::server::Request::new(http::Method::GET, "/x"));
    assert_eq!(res.status_code(), 400);
}

#[test]
fn test_failed_mount_records_nothing() {
    let app = router(Contract::new());
    let err = app.mount("/bad{", vec![users_router().handler()]).unwrap_err();
    assert!(matches!(err, ContractError::InvalidPath { .. }));

    assert!(app.tree().is_empty());
    assert!(path_keys(&document(&app)).is_empty());
}

/// Accepts every registration and keeps none of the handlers.
struct DiscardingBase;

impl BaseRouter for DiscardingBase {
    fn mount(&self, _path: &str, _handlers: Vec<Arc<dyn Handler>>) -> Result<(), ContractError> {
        Ok(())
    }

    fn route(
        &self,
        _method: HttpMethod,
        _path: &str,
        _handlers: Vec<Arc<dyn Handler>>,
    ) -> Result<(), ContractError> {
        Ok(())
    }

    fn dispatch(&self, _req: &mut Request, _res: &mut Response) -> Next {
        Next::Continue
    }
}

#[test]
fn test_tree_does_not_keep_children_alive() {
    let app = ContractRouter::with_base(DiscardingBase, Contract::new(), RuntimeConfig::default());
    {
        let users = users_router();
        app.mount("/users", vec![users.handler()]).unwrap();
        assert_eq!(app.tree().len(), 1);
        assert_eq!(path_keys(&document(&app)), vec!["/users", "/users/{userId}"]);
    }

    // Only the tree referred to the dropped router
    assert!(app.tree().is_empty());
    assert_eq!(app.tree().mount_paths().count(), 0);
    assert!(path_keys(&document(&app)).is_empty());
}
