//! # Request Validation
//!
//! [`ValidationMiddleware`] is the handler chained ahead of every contract
//! route. It validates each declared request section, writes the
//! validated values back onto the request, and applies the route's
//! [`ValidationErrorPolicy`] when anything failed.
//!
//! ## Section Rules
//!
//! | Section   | Input                         | On success                   |
//! |-----------|-------------------------------|------------------------------|
//! | headers   | declared header names only    | merged into `req.headers`    |
//! | params    | path parameters               | replaces `req.params`        |
//! | query     | query parameters              | replaces `req.query`         |
//! | body      | JSON bodies only              | replaces `req.body`          |
//!
//! Headers, params and query arrive as strings and are coerced to the
//! declared scalar types first. A route without a `params` schema is checked
//! against the parameters its own path template declares.
//!
//! Sections are validated independently: a failing section never prevents
//! the others from being checked or from committing their values.
//!
//! ## Policy Resolution
//!
//! Route-level policy, else contract-level policy, else
//! [`RuntimeConfig::default_policy`] (which is `send` unless configured).

use crate::contract::{Contract, HttpMethod, ValidationErrorPolicy};
use crate::error::{ContractError, Section, ValidationError, ValidationIssue};
use crate::path::route_params_schema;
use crate::runtime_config::RuntimeConfig;
use crate::schema::{ParseOptions, Schema, DEFAULT_CONTENT_TYPE};
use crate::server::{Handler, Next, Request, Response};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, warn};

/// Validation handler for one method+path of a contract.
pub struct ValidationMiddleware {
    method: HttpMethod,
    path: String,
    headers: Option<Schema>,
    params: Option<Schema>,
    query: Option<Schema>,
    body: Option<Schema>,
    policy: ValidationErrorPolicy,
    options: ParseOptions,
}

impl fmt::Debug for ValidationMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationMiddleware")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// True if `media_type` is `application/json`, ignoring parameters and case.
/// Other JSON flavours (`+json` suffixes) are passed through unvalidated.
fn is_json(media_type: &str) -> bool {
    media_type
        .split(';')
        .next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(DEFAULT_CONTENT_TYPE))
}

impl ValidationMiddleware {
    /// Build the validation handler for `method` + `path`.
    ///
    /// Every declared schema is compiled here so a broken contract fails at
    /// setup rather than on the first request.
    ///
    /// # Errors
    ///
    /// - [`ContractError::MissingRoute`] if the contract has no such route
    /// - [`ContractError::InvalidSchema`] if a declared schema does not compile
    pub fn build(
        contract: &Contract,
        method: HttpMethod,
        path: &str,
        config: &RuntimeConfig,
    ) -> Result<Self, ContractError> {
        let route = contract.route_config(method, path)?;

        let body = match (&route.body, route.body_media_type()) {
            (Some(schema), Some(media_type)) if is_json(media_type) => Some(schema.clone()),
            _ => None,
        };
        let params = route
            .params
            .clone()
            .or_else(|| route_params_schema(path));

        let policy = route
            .validation_error_policy
            .clone()
            .or_else(|| contract.validation_error_policy.clone())
            .unwrap_or_else(|| config.default_policy.clone());

        let middleware = Self {
            method,
            path: path.to_string(),
            headers: route.headers.clone(),
            params,
            query: route.query.clone(),
            body,
            policy,
            options: ParseOptions {
                strip_unknown: config.strip_unknown,
            },
        };

        for (section, schema) in middleware.schemas() {
            schema.compile().map_err(|e| match e {
                ContractError::InvalidSchema { reason, .. } => ContractError::InvalidSchema {
                    context: format!("<{method} {path}> {section}"),
                    reason,
                },
                other => other,
            })?;
        }

        debug!(
            method = %method,
            path = %path,
            policy = middleware.policy.name(),
            sections = ?middleware.schemas().map(|(s, _)| s.as_str()).collect::<Vec<_>>(),
            "Validation middleware built"
        );
        Ok(middleware)
    }

    fn schemas(&self) -> impl Iterator<Item = (Section, &Schema)> + '_ {
        [
            (Section::Headers, self.headers.as_ref()),
            (Section::Params, self.params.as_ref()),
            (Section::Query, self.query.as_ref()),
            (Section::Body, self.body.as_ref()),
        ]
        .into_iter()
        .filter_map(|(section, schema)| schema.map(|schema| (section, schema)))
    }

    /// The effective policy for this route.
    #[must_use]
    pub fn policy(&self) -> &ValidationErrorPolicy {
        &self.policy
    }

    /// Validate every declared section of `req`, committing each section
    /// that passes, and return the accumulated issues.
    pub fn validate(&self, req: &mut Request) -> ValidationError {
        let mut error = ValidationError::new();

        if let Some(schema) = &self.headers {
            if let Err(issues) = self.validate_headers(schema, req) {
                error.set(Section::Headers, issues);
            }
        }
        if let Some(schema) = &self.params {
            match self.parse_section(schema, &req.params) {
                Ok(params) => req.params = params,
                Err(issues) => error.set(Section::Params, issues),
            }
        }
        if let Some(schema) = &self.query {
            match self.parse_section(schema, &req.query) {
                Ok(query) => req.query = query,
                Err(issues) => error.set(Section::Query, issues),
            }
        }
        if let Some(schema) = &self.body {
            match schema.safe_parse_with(&req.body, &self.options) {
                Ok(body) => req.body = body,
                Err(issues) => error.set(Section::Body, issues),
            }
        }

        error
    }

    fn parse_section(
        &self,
        schema: &Schema,
        values: &Map<String, Value>,
    ) -> Result<Map<String, Value>, Vec<ValidationIssue>> {
        let input = schema.coerce(Value::Object(values.clone()));
        match schema.safe_parse_with(&input, &self.options)? {
            Value::Object(map) => Ok(map),
            _ => Ok(values.clone()),
        }
    }

    fn validate_headers(&self, schema: &Schema, req: &mut Request) -> Result<(), Vec<ValidationIssue>> {
        // Only the declared headers take part; the rest pass through untouched.
        let input: Map<String, Value> = match schema.property_names() {
            Some(names) => names
                .into_iter()
                .filter_map(|name| {
                    req.headers
                        .get(&name.to_ascii_lowercase())
                        .map(|value| (name.to_string(), value.clone()))
                })
                .collect(),
            None => req.headers.clone(),
        };

        let parsed = schema.safe_parse_with(
            &schema.coerce(Value::Object(input)),
            &ParseOptions { strip_unknown: true },
        )?;
        if let Value::Object(validated) = parsed {
            for (name, value) in validated {
                req.headers.insert(name.to_ascii_lowercase(), value);
            }
        }
        Ok(())
    }
}

impl Handler for ValidationMiddleware {
    fn handle(&self, req: &mut Request, res: &mut Response) -> Next {
        let error = self.validate(req);
        if error.is_empty() {
            return Next::Continue;
        }

        if matches!(self.policy, ValidationErrorPolicy::Ignore) {
            debug!(
                method = %self.method,
                route = %self.path,
                issue_count = error.issue_count(),
                "Validation failed; ignored by policy"
            );
            return Next::Continue;
        }

        warn!(
            method = %self.method,
            route = %self.path,
            path = %req.original_path,
            headers_issues = error.issues(Section::Headers).len(),
            params_issues = error.issues(Section::Params).len(),
            query_issues = error.issues(Section::Query).len(),
            body_issues = error.issues(Section::Body).len(),
            policy = self.policy.name(),
            "Request validation failed"
        );

        match &self.policy {
            ValidationErrorPolicy::Send => {
                res.status(400).json(&error);
                Next::Done
            }
            ValidationErrorPolicy::Forward => Next::error(error),
            ValidationErrorPolicy::Custom(policy) => policy(error, req, res),
            ValidationErrorPolicy::Ignore => Next::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::RouteConfig;
    use http::Method;
    use serde_json::json;

    fn build(contract: &Contract, method: HttpMethod, path: &str) -> ValidationMiddleware {
        ValidationMiddleware::build(contract, method, path, &RuntimeConfig::default()).unwrap()
    }

    #[test]
    fn test_json_detection() {
        assert!(is_json("application/json"));
        assert!(is_json("Application/JSON; charset=utf-8"));
        assert!(!is_json("application/problem+json"));
        assert!(!is_json("text/plain"));
    }

    #[test]
    fn test_suffixed_json_body_passes_through() {
        let contract = Contract::new().route(
            HttpMethod::Post,
            "/problems",
            RouteConfig::new().body(
                Schema::object([("n", Schema::integer())]).content_type("application/problem+json"),
            ),
        );
        let middleware = build(&contract, HttpMethod::Post, "/problems");
        let mut req = Request::new(Method::POST, "/problems").with_json(json!({ "n": "x" }));
        assert!(middleware.validate(&mut req).is_empty());
        assert_eq!(req.body, json!({ "n": "x" }));
    }

    #[test]
    fn test_missing_route_fails_at_build() {
        let err = ValidationMiddleware::build(
            &Contract::new(),
            HttpMethod::Get,
            "/nope",
            &RuntimeConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "No config found for <get /nope>");
    }

    #[test]
    fn test_invalid_schema_fails_at_build() {
        let contract = Contract::new().route(
            HttpMethod::Post,
            "/things",
            RouteConfig::new().body(Schema::new(json!({"type": 7}))),
        );
        let err = ValidationMiddleware::build(&contract, HttpMethod::Post, "/things", &RuntimeConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("<post /things> body"));
    }

    #[test]
    fn test_default_params_from_template() {
        let contract = Contract::new().route(HttpMethod::Get, "/users/:id/:tab?", RouteConfig::new());
        let middleware = build(&contract, HttpMethod::Get, "/users/:id/:tab?");

        let mut req = Request::new(Method::GET, "/users/1");
        req.params.insert("id".into(), json!("1"));
        assert!(middleware.validate(&mut req).is_empty());

        let mut req = Request::new(Method::GET, "/users");
        let error = middleware.validate(&mut req);
        assert_eq!(error.issues(Section::Params).len(), 1);
    }

    #[test]
    fn test_non_json_body_passes_through() {
        let contract = Contract::new().route(
            HttpMethod::Post,
            "/upload",
            RouteConfig::new().body(Schema::object([("n", Schema::integer())]).content_type("text/csv")),
        );
        let middleware = build(&contract, HttpMethod::Post, "/upload");
        let mut req = Request::new(Method::POST, "/upload").with_text("text/csv", "a,b\n1,2");
        assert!(middleware.validate(&mut req).is_empty());
        assert_eq!(req.body, json!("a,b\n1,2"));
    }

    #[test]
    fn test_explicit_json_content_type_validates_tagged_body() {
        let contract = Contract::new().route(
            HttpMethod::Post,
            "/in",
            RouteConfig::new()
                .body(Schema::integer().content_type("text/plain"))
                .content_type("application/json"),
        );
        let middleware = build(&contract, HttpMethod::Post, "/in");
        let mut req = Request::new(Method::POST, "/in").with_json(json!("x"));
        assert_eq!(middleware.validate(&mut req).issues(Section::Body).len(), 1);
    }

    #[test]
    fn test_sections_commit_independently() {
        let contract = Contract::new().route(
            HttpMethod::Get,
            "/search",
            RouteConfig::new()
                .query(Schema::object([("page", Schema::integer())]))
                .headers(Schema::object([("x-tenant", Schema::string().min_length(3))])),
        );
        let middleware = build(&contract, HttpMethod::Get, "/search");
        let mut req = Request::new(Method::GET, "/search?page=3&junk=1")
            .with_header("X-Tenant", "ab")
            .with_header("Accept", "*/*");

        let error = middleware.validate(&mut req);
        assert_eq!(error.issues(Section::Headers).len(), 1);
        assert!(error.query_errors.is_none());
        assert_eq!(Value::Object(req.query.clone()), json!({"page": 3}));
        assert_eq!(req.headers["accept"], json!("*/*"));
    }

    #[test]
    fn test_header_values_are_coerced_and_merged() {
        let contract = Contract::new().route(
            HttpMethod::Get,
            "/",
            RouteConfig::new().headers(Schema::object([("X-Retry", Schema::integer())])),
        );
        let middleware = build(&contract, HttpMethod::Get, "/");
        let mut req = Request::new(Method::GET, "/").with_header("x-retry", "2");
        assert!(middleware.validate(&mut req).is_empty());
        assert_eq!(req.headers["x-retry"], json!(2));
    }

    #[test]
    fn test_forward_policy_yields_error() {
        let contract = Contract::new()
            .validation_error_policy(ValidationErrorPolicy::Forward)
            .route(
                HttpMethod::Get,
                "/items/:id",
                RouteConfig::new().params(Schema::object([("id", Schema::integer())])),
            );
        let middleware = build(&contract, HttpMethod::Get, "/items/:id");

        let mut req = Request::new(Method::GET, "/items/x");
        req.params.insert("id".into(), json!("x"));
        let mut res = Response::new();
        let next = middleware.handle(&mut req, &mut res);
        assert!(next.is_error());
        assert!(!res.is_finished());

        let mut req = Request::new(Method::GET, "/items/3");
        req.params.insert("id".into(), json!("3"));
        assert!(!middleware.handle(&mut req, &mut Response::new()).is_error());
    }

    #[test]
    fn test_policy_resolution_order() {
        let contract = Contract::new()
            .validation_error_policy(ValidationErrorPolicy::Forward)
            .route(HttpMethod::Get, "/a", RouteConfig::new())
            .route(
                HttpMethod::Get,
                "/b",
                RouteConfig::new().validation_error_policy(ValidationErrorPolicy::Ignore),
            );
        assert_eq!(build(&contract, HttpMethod::Get, "/a").policy().name(), "forward");
        assert_eq!(build(&contract, HttpMethod::Get, "/b").policy().name(), "ignore");

        let bare = Contract::new().route(HttpMethod::Get, "/c", RouteConfig::new());
        assert_eq!(build(&bare, HttpMethod::Get, "/c").policy().name(), "send");
        let config = RuntimeConfig {
            default_policy: ValidationErrorPolicy::Ignore,
            ..RuntimeConfig::default()
        };
        let middleware = ValidationMiddleware::build(&bare, HttpMethod::Get, "/c", &config).unwrap();
        assert_eq!(middleware.policy().name(), "ignore");
    }
}
