//! # Contract Module
//!
//! A [`Contract`] is the declarative description of an API: for each HTTP
//! method, a map from route path to [`RouteConfig`]. The same value drives
//! request validation and OpenAPI generation.
//!
//! Contracts are built in code or loaded from YAML/JSON with the same nested
//! layout (method, then path, then field):
//!
//! ```yaml
//! tags: items
//! validationErrorPolicy: send
//! commonResponses:
//!   500:
//!     type: object
//!     description: Server error
//! get:
//!   /items/:id:
//!     summary: Fetch one item
//!     params:
//!       type: object
//!       properties:
//!         id: { type: string, minLength: 3 }
//!       required: [id]
//!     responses:
//!       200:
//!         type: object
//!         description: The item
//! ```
//!
//! Once handed to a router a contract is shared read-only behind an `Arc`.

use crate::error::{ContractError, ValidationError};
use crate::schema::Schema;
use crate::server::{Next, Request, Response};
use indexmap::IndexMap;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Methods a contract can declare routes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Declaration order used when walking a contract.
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
        }
    }

    #[must_use]
    pub fn as_http(&self) -> http::Method {
        match self {
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Post => http::Method::POST,
            HttpMethod::Put => http::Method::PUT,
            HttpMethod::Patch => http::Method::PATCH,
            HttpMethod::Delete => http::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&http::Method> for HttpMethod {
    type Error = anyhow::Error;

    fn try_from(method: &http::Method) -> Result<Self, Self::Error> {
        match *method {
            http::Method::GET => Ok(HttpMethod::Get),
            http::Method::POST => Ok(HttpMethod::Post),
            http::Method::PUT => Ok(HttpMethod::Put),
            http::Method::PATCH => Ok(HttpMethod::Patch),
            http::Method::DELETE => Ok(HttpMethod::Delete),
            ref other => Err(anyhow::anyhow!("unsupported method {other}")),
        }
    }
}

/// Signature of a custom validation-failure policy.
///
/// Receives the accumulated error and the live request/response; the return
/// value decides how dispatch continues.
pub type CustomPolicyFn = dyn Fn(ValidationError, &mut Request, &mut Response) -> Next + Send + Sync;

/// What to do when request validation fails.
#[derive(Clone, Default)]
pub enum ValidationErrorPolicy {
    /// Respond 400 with the [`ValidationError`] as JSON body
    #[default]
    Send,
    /// Pass the [`ValidationError`] to the router's error handlers
    Forward,
    /// Proceed to the route handlers anyway
    Ignore,
    /// Delegate to a caller-supplied function
    Custom(Arc<CustomPolicyFn>),
}

impl ValidationErrorPolicy {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(ValidationError, &mut Request, &mut Response) -> Next + Send + Sync + 'static,
    {
        ValidationErrorPolicy::Custom(Arc::new(f))
    }

    /// Parse `send`, `forward` or `ignore` (case-insensitive).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "send" => Some(ValidationErrorPolicy::Send),
            "forward" => Some(ValidationErrorPolicy::Forward),
            "ignore" => Some(ValidationErrorPolicy::Ignore),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ValidationErrorPolicy::Send => "send",
            ValidationErrorPolicy::Forward => "forward",
            ValidationErrorPolicy::Ignore => "ignore",
            ValidationErrorPolicy::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for ValidationErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl<'de> Deserialize<'de> for ValidationErrorPolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        ValidationErrorPolicy::parse(&name).ok_or_else(|| {
            serde::de::Error::unknown_variant(&name, &["send", "forward", "ignore"])
        })
    }
}

/// Accept either a single tag or a list of tags.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(tag)) => vec![tag],
        Some(OneOrMany::Many(tags)) => tags,
    })
}

/// Deserialize a map keyed by HTTP status code. Keys may be integers or
/// numeric strings (JSON objects only have string keys).
fn status_map<'de, D, V>(deserializer: D) -> Result<IndexMap<u16, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    #[derive(PartialEq, Eq, Hash)]
    struct StatusKey(u16);

    struct StatusKeyVisitor;

    impl<'de> Visitor<'de> for StatusKeyVisitor {
        type Value = StatusKey;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an HTTP status code")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<StatusKey, E> {
            u16::try_from(v)
                .map(StatusKey)
                .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<StatusKey, E> {
            u16::try_from(v)
                .map(StatusKey)
                .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<StatusKey, E> {
            v.trim()
                .parse::<u16>()
                .map(StatusKey)
                .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }

    impl<'de> Deserialize<'de> for StatusKey {
        fn deserialize<D2: Deserializer<'de>>(deserializer: D2) -> Result<Self, D2::Error> {
            deserializer.deserialize_any(StatusKeyVisitor)
        }
    }

    let raw = IndexMap::<StatusKey, V>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(StatusKey(code), v)| (code, v)).collect())
}

/// Root declarative API description.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    /// Tags applied to every route
    #[serde(default, deserialize_with = "one_or_many")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub deprecated: Option<bool>,
    /// Default policy for routes that do not set their own
    #[serde(default)]
    pub validation_error_policy: Option<ValidationErrorPolicy>,
    /// Responses merged into every route, before the route's own
    #[serde(default, deserialize_with = "status_map")]
    pub common_responses: IndexMap<u16, Schema>,
    #[serde(default)]
    pub get: IndexMap<String, RouteConfig>,
    #[serde(default)]
    pub post: IndexMap<String, RouteConfig>,
    #[serde(default)]
    pub put: IndexMap<String, RouteConfig>,
    #[serde(default)]
    pub patch: IndexMap<String, RouteConfig>,
    #[serde(default)]
    pub delete: IndexMap<String, RouteConfig>,
}

impl Contract {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a contract from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Yaml`] on malformed input.
    pub fn from_yaml_str(source: &str) -> Result<Self, ContractError> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// Parse a contract from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Json`] on malformed input.
    pub fn from_json_str(source: &str) -> Result<Self, ContractError> {
        Ok(serde_json::from_str(source)?)
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = Some(deprecated);
        self
    }

    #[must_use]
    pub fn validation_error_policy(mut self, policy: ValidationErrorPolicy) -> Self {
        self.validation_error_policy = Some(policy);
        self
    }

    #[must_use]
    pub fn common_response(mut self, status: u16, schema: Schema) -> Self {
        self.common_responses.insert(status, schema);
        self
    }

    /// Declare a route.
    #[must_use]
    pub fn route(mut self, method: HttpMethod, path: impl Into<String>, config: RouteConfig) -> Self {
        self.routes_mut(method).insert(path.into(), config);
        self
    }

    /// Routes declared for `method`, in declaration order.
    #[must_use]
    pub fn routes(&self, method: HttpMethod) -> &IndexMap<String, RouteConfig> {
        match method {
            HttpMethod::Get => &self.get,
            HttpMethod::Post => &self.post,
            HttpMethod::Put => &self.put,
            HttpMethod::Patch => &self.patch,
            HttpMethod::Delete => &self.delete,
        }
    }

    fn routes_mut(&mut self, method: HttpMethod) -> &mut IndexMap<String, RouteConfig> {
        match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Delete => &mut self.delete,
        }
    }

    /// Every declared `(method, path, config)`, methods in [`HttpMethod::ALL`] order.
    pub fn iter_routes(&self) -> impl Iterator<Item = (HttpMethod, &str, &RouteConfig)> + '_ {
        HttpMethod::ALL.into_iter().flat_map(move |method| {
            self.routes(method)
                .iter()
                .map(move |(path, config)| (method, path.as_str(), config))
        })
    }

    /// Look up the config for an exact method+path key.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::MissingRoute`] if the contract has no such route.
    pub fn route_config(&self, method: HttpMethod, path: &str) -> Result<&RouteConfig, ContractError> {
        self.routes(method)
            .get(path)
            .ok_or_else(|| ContractError::MissingRoute {
                method,
                path: path.to_string(),
            })
    }
}

/// One method+path entry of a [`Contract`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deprecated: Option<bool>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub tags: Vec<String>,
    /// Overrides the contract-level policy
    #[serde(default)]
    pub validation_error_policy: Option<ValidationErrorPolicy>,
    #[serde(default)]
    pub headers: Option<Schema>,
    #[serde(default)]
    pub params: Option<Schema>,
    #[serde(default)]
    pub query: Option<Schema>,
    #[serde(default)]
    pub body: Option<Schema>,
    /// Explicit request body media type, wins over the body schema's tag
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default, deserialize_with = "status_map")]
    pub responses: IndexMap<u16, Schema>,
    /// Raw OpenAPI fields merged over the generated operation
    #[serde(default)]
    pub openapi: Option<OperationOverrides>,
}

impl RouteConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = Some(deprecated);
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn validation_error_policy(mut self, policy: ValidationErrorPolicy) -> Self {
        self.validation_error_policy = Some(policy);
        self
    }

    #[must_use]
    pub fn headers(mut self, schema: Schema) -> Self {
        self.headers = Some(schema);
        self
    }

    #[must_use]
    pub fn params(mut self, schema: Schema) -> Self {
        self.params = Some(schema);
        self
    }

    #[must_use]
    pub fn query(mut self, schema: Schema) -> Self {
        self.query = Some(schema);
        self
    }

    #[must_use]
    pub fn body(mut self, schema: Schema) -> Self {
        self.body = Some(schema);
        self
    }

    #[must_use]
    pub fn content_type(mut self, media_type: impl Into<String>) -> Self {
        self.content_type = Some(media_type.into());
        self
    }

    #[must_use]
    pub fn response(mut self, status: u16, schema: Schema) -> Self {
        self.responses.insert(status, schema);
        self
    }

    #[must_use]
    pub fn openapi(mut self, overrides: OperationOverrides) -> Self {
        self.openapi = Some(overrides);
        self
    }

    /// Media type of the request body: the explicit `content_type`, else the
    /// body schema's tag. `None` when the route declares neither.
    #[must_use]
    pub fn body_media_type(&self) -> Option<&str> {
        self.content_type
            .as_deref()
            .or_else(|| self.body.as_ref().map(Schema::media_type))
    }
}

/// Per-location replacements for the generated request description.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestOverrides {
    #[serde(default)]
    pub headers: Option<Schema>,
    #[serde(default)]
    pub params: Option<Schema>,
    #[serde(default)]
    pub query: Option<Schema>,
    #[serde(default)]
    pub cookies: Option<Schema>,
    /// A complete OpenAPI `requestBody` object
    #[serde(default)]
    pub body: Option<Value>,
}

/// Escape hatch for fields the contract cannot express.
///
/// Scalars replace the generated value, `tags` are appended, `responses`
/// and `request` replace per status code / per location, and any other key
/// (`security`, `x-*` extensions, ...) is copied onto the operation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOverrides {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deprecated: Option<bool>,
    #[serde(default)]
    pub operation_id: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub request: RequestOverrides,
    /// Complete OpenAPI response objects by status code
    #[serde(default, deserialize_with = "status_map")]
    pub responses: IndexMap<u16, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OperationOverrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = Some(deprecated);
        self
    }

    #[must_use]
    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn request(mut self, request: RequestOverrides) -> Self {
        self.request = request;
        self
    }

    #[must_use]
    pub fn response(mut self, status: u16, response: Value) -> Self {
        self.responses.insert(status, response);
        self
    }

    /// Copy an arbitrary field onto the generated operation.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Load a contract from a `.yaml`/`.yml` or `.json` file.
///
/// # Errors
///
/// Fails if the file cannot be read or parsed.
pub fn load_contract(file_path: impl AsRef<Path>) -> anyhow::Result<Contract> {
    use anyhow::Context;

    let file_path = file_path.as_ref();
    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("failed to read contract {}", file_path.display()))?;
    let is_yaml = matches!(
        file_path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    );
    let contract = if is_yaml {
        Contract::from_yaml_str(&content)
    } else {
        Contract::from_json_str(&content)
    }
    .with_context(|| format!("failed to parse contract {}", file_path.display()))?;
    Ok(contract)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_policy_names() {
        assert!(matches!(ValidationErrorPolicy::parse("Forward"), Some(ValidationErrorPolicy::Forward)));
        assert!(ValidationErrorPolicy::parse("explode").is_none());
        assert_eq!(ValidationErrorPolicy::custom(|_, _, _| Next::Done).name(), "custom");
    }

    #[test]
    fn test_route_lookup() {
        let contract = Contract::new().route(HttpMethod::Get, "/items/:id", RouteConfig::new());
        assert!(contract.route_config(HttpMethod::Get, "/items/:id").is_ok());
        assert!(matches!(
            contract.route_config(HttpMethod::Post, "/items/:id"),
            Err(ContractError::MissingRoute { method: HttpMethod::Post, .. })
        ));
    }

    #[test]
    fn test_body_media_type_resolution() {
        let config = RouteConfig::new();
        assert_eq!(config.body_media_type(), None);
        let config = config.body(Schema::string().content_type("text/plain"));
        assert_eq!(config.body_media_type(), Some("text/plain"));
        let config = config.content_type("text/csv");
        assert_eq!(config.body_media_type(), Some("text/csv"));
    }

    #[test]
    fn test_tags_accept_string_or_list() {
        let contract: Contract = serde_json::from_value(json!({
            "tags": "items",
            "get": { "/a": { "tags": ["x", "y"] } }
        }))
        .unwrap();
        assert_eq!(contract.tags, vec!["items"]);
        assert_eq!(contract.get["/a"].tags, vec!["x", "y"]);
    }

    #[test]
    fn test_overrides_keep_unknown_fields() {
        let overrides: OperationOverrides = serde_json::from_value(json!({
            "operationId": "getThing",
            "security": [{"apiKey": []}],
            "x-internal": true
        }))
        .unwrap();
        assert_eq!(overrides.operation_id.as_deref(), Some("getThing"));
        assert_eq!(overrides.extra["security"], json!([{"apiKey": []}]));
        assert_eq!(overrides.extra["x-internal"], json!(true));
    }

    #[test]
    fn test_status_keys_from_json_strings() {
        let overrides: OperationOverrides = serde_json::from_value(json!({
            "responses": { "418": { "description": "teapot" } },
            "x-extra": 1
        }))
        .unwrap();
        assert_eq!(overrides.responses[&418], json!({"description": "teapot"}));

        let config: RouteConfig = serde_json::from_value(json!({
            "responses": { "204": { "x-void": true } }
        }))
        .unwrap();
        assert!(config.responses[&204].is_void());
    }
}
