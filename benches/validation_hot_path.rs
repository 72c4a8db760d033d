use contract_router::runtime_config::RuntimeConfig;
use contract_router::server::{handler_fn, Next, Request};
use contract_router::{
    Contract, ContractRouter, DocumentConfig, HttpMethod, RouteConfig, Schema, ValidationMiddleware,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use http::Method;
use serde_json::json;
use std::hint::black_box;

fn order_contract() -> Contract {
    Contract::new().tag("orders").route(
        HttpMethod::Post,
        "/orders/:id",
        RouteConfig::new()
            .headers(Schema::object([("x-tenant", Schema::string().min_length(1))]))
            .params(Schema::object([("id", Schema::integer().minimum(1))]))
            .query(Schema::object([
                ("dry", Schema::boolean().optional()),
                ("tags", Schema::array(Schema::string()).optional()),
            ]))
            .body(Schema::object([
                ("qty", Schema::integer().minimum(1)),
                ("note", Schema::string().default_value("none").optional()),
            ]))
            .response(201, Schema::object([("id", Schema::integer())])),
    )
}

fn order_request(qty: i64) -> Request {
    let mut req = Request::new(Method::POST, "/orders/42?dry=true&tags=a&tags=b")
        .with_header("x-tenant", "acme")
        .with_json(json!({ "qty": qty }));
    req.params.insert("id".to_string(), json!("42"));
    req
}

/// Validate a request against pre-compiled schemas
fn bench_validate(c: &mut Criterion) {
    let middleware = ValidationMiddleware::build(
        &order_contract(),
        HttpMethod::Post,
        "/orders/:id",
        &RuntimeConfig::default(),
    )
    .expect("route is declared");

    let mut group = c.benchmark_group("validate");
    for (label, qty) in [("valid", 3), ("invalid", 0)] {
        group.bench_with_input(BenchmarkId::new("order", label), &qty, |b, &qty| {
            b.iter(|| {
                let mut req = order_request(qty);
                black_box(middleware.validate(black_box(&mut req)))
            });
        });
    }
    group.finish();
}

/// Full dispatch through the contract router
fn bench_dispatch(c: &mut Criterion) {
    let app = ContractRouter::with_config(order_contract(), RuntimeConfig::default());
    app.post(
        "/orders/:id",
        vec![handler_fn(|_req, res| {
            res.status(201).json(&json!({ "id": 42 }));
            Next::Done
        })],
    )
    .expect("route is declared");

    c.bench_function("dispatch_valid_order", |b| {
        b.iter(|| {
            let req = Request::new(Method::POST, "/orders/42?dry=true")
                .with_header("x-tenant", "acme")
                .with_json(json!({ "qty": 3 }));
            black_box(app.handle_request(black_box(req)))
        });
    });
}

/// Document generation for a router with nested mounts
fn bench_document(c: &mut Criterion) {
    let app = ContractRouter::with_config(Contract::new(), RuntimeConfig::default());
    for prefix in ["/v1", "/v2", "/v3"] {
        let orders = ContractRouter::with_config(order_contract(), RuntimeConfig::default());
        app.mount(prefix, vec![orders.handler()]).expect("mount");
    }
    let config = DocumentConfig::new("Orders", "1.0.0");

    c.bench_function("generate_document", |b| {
        b.iter(|| {
            let factory = app.openapi().expect("within nesting limit");
            black_box(factory.generate(&config))
        });
    });
}

criterion_group!(benches, bench_validate, bench_dispatch, bench_document);
criterion_main!(benches);
