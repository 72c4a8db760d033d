//! Registry of resolved operations and reusable components.

use crate::contract::HttpMethod;
use crate::schema::Schema;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

/// A request or response payload description.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaEntry {
    pub media_type: String,
    /// `None` when only a media type was declared
    pub schema: Option<Schema>,
}

/// Request body of an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyEntry {
    /// Derived from the contract
    Derived {
        description: Option<String>,
        media: MediaEntry,
    },
    /// A complete OpenAPI `requestBody` object supplied as an override
    Raw(Value),
}

/// One response of an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEntry {
    /// Derived from the contract; `content` is `None` for void responses
    Derived {
        description: String,
        content: Option<MediaEntry>,
    },
    /// A complete OpenAPI response object supplied as an override
    Raw(Value),
}

impl ResponseEntry {
    /// Derive the documented response for `schema`.
    #[must_use]
    pub fn from_schema(schema: &Schema) -> Self {
        let content = (!schema.is_void()).then(|| MediaEntry {
            media_type: schema.media_type().to_string(),
            schema: Some(schema.clone()),
        });
        ResponseEntry::Derived {
            description: schema.description().unwrap_or_default().to_string(),
            content,
        }
    }
}

/// Request parameters and body of an operation, by location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestEntry {
    pub headers: Option<Schema>,
    pub params: Option<Schema>,
    pub query: Option<Schema>,
    pub cookies: Option<Schema>,
    pub body: Option<BodyEntry>,
}

/// A fully resolved method+path operation.
#[derive(Debug, Clone, PartialEq)]
pub struct PathEntry {
    pub method: HttpMethod,
    /// Canonical `{name}` path, including every mount prefix
    pub path: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub deprecated: Option<bool>,
    pub operation_id: Option<String>,
    pub tags: Vec<String>,
    pub request: RequestEntry,
    /// Ordered by status code
    pub responses: IndexMap<u16, ResponseEntry>,
    /// Extra operation fields copied verbatim
    pub extra: Map<String, Value>,
}

impl PathEntry {
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            summary: None,
            description: None,
            deprecated: None,
            operation_id: None,
            tags: Vec::new(),
            request: RequestEntry::default(),
            responses: IndexMap::new(),
            extra: Map::new(),
        }
    }
}

/// Collected operations and components for one document.
///
/// A fresh registry is built for every generation request so it always
/// reflects the contracts as they are at that moment.
#[derive(Debug, Clone, Default)]
pub struct OpenApiRegistry {
    paths: IndexMap<(String, HttpMethod), PathEntry>,
    schemas: IndexMap<String, Schema>,
    components: IndexMap<String, IndexMap<String, Value>>,
}

impl OpenApiRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation. A later entry for the same method+path replaces
    /// the earlier one in place.
    pub fn register_path(&mut self, entry: PathEntry) {
        debug!(
            method = %entry.method,
            path = %entry.path,
            tags = ?entry.tags,
            response_count = entry.responses.len(),
            "OpenAPI path registered"
        );
        self.paths
            .insert((entry.path.clone(), entry.method), entry);
    }

    /// Add a reusable schema under `components.schemas.{name}`.
    pub fn register_schema(&mut self, name: impl Into<String>, schema: Schema) {
        self.schemas.insert(name.into(), schema);
    }

    /// Add an arbitrary component, e.g. a security scheme:
    ///
    /// ```rust
    /// use contract_router::openapi::OpenApiRegistry;
    /// use serde_json::json;
    ///
    /// let mut registry = OpenApiRegistry::new();
    /// registry.register_component(
    ///     "securitySchemes",
    ///     "apiKey",
    ///     json!({ "type": "apiKey", "in": "header", "name": "x-api-key" }),
    /// );
    /// assert!(registry.component("securitySchemes", "apiKey").is_some());
    /// ```
    pub fn register_component(&mut self, kind: impl Into<String>, name: impl Into<String>, value: Value) {
        self.components
            .entry(kind.into())
            .or_default()
            .insert(name.into(), value);
    }

    /// Registered operations, in registration order.
    pub fn paths(&self) -> impl Iterator<Item = &PathEntry> {
        self.paths.values()
    }

    #[must_use]
    pub fn path(&self, method: HttpMethod, path: &str) -> Option<&PathEntry> {
        self.paths.get(&(path.to_string(), method))
    }

    #[must_use]
    pub fn schemas(&self) -> &IndexMap<String, Schema> {
        &self.schemas
    }

    #[must_use]
    pub fn components(&self) -> &IndexMap<String, IndexMap<String, Value>> {
        &self.components
    }

    #[must_use]
    pub fn component(&self, kind: &str, name: &str) -> Option<&Value> {
        self.components.get(kind).and_then(|entries| entries.get(name))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
