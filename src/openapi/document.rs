//! OpenAPI 3.1 document assembly.

use super::model::{
    Content, Document, MediaType, Operation, Parameter, ParameterLocation, RequestBody, Response,
};
use super::registry::{BodyEntry, MediaEntry, OpenApiRegistry, PathEntry, ResponseEntry};
use crate::error::ContractError;
use crate::schema::{Schema, REF_NAME_KEY};
use indexmap::IndexMap;
use oas3::OpenApiV3Spec;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

/// Document metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A server the API is reachable at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Top-level fields of a generated document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentConfig {
    pub openapi: String,
    pub info: Info,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
}

impl DocumentConfig {
    #[must_use]
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            openapi: "3.1.0".to_string(),
            info: Info {
                title: title.into(),
                version: version.into(),
                description: None,
            },
            servers: Vec::new(),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.info.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn server(mut self, url: impl Into<String>) -> Self {
        self.servers.push(Server {
            url: url.into(),
            description: None,
        });
        self
    }

    #[must_use]
    pub fn openapi_version(mut self, version: impl Into<String>) -> Self {
        self.openapi = version.into();
        self
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self::new("API", "1.0.0")
    }
}

/// Renders an [`OpenApiRegistry`] into an OpenAPI document.
///
/// Schemas carrying an `x-ref-name` are emitted once under
/// `components.schemas` and referenced with `$ref` everywhere else. When
/// two different schemas share a name, the first one rendered wins.
pub struct OpenApiGenerator<'a> {
    registry: &'a OpenApiRegistry,
    named: IndexMap<String, Value>,
}

impl<'a> OpenApiGenerator<'a> {
    #[must_use]
    pub fn new(registry: &'a OpenApiRegistry) -> Self {
        Self {
            registry,
            named: IndexMap::new(),
        }
    }

    /// Build the document as a JSON value.
    #[must_use]
    pub fn generate(self, config: &DocumentConfig) -> Value {
        json!(self.document(config))
    }

    /// Build the typed document.
    #[must_use]
    pub fn document(mut self, config: &DocumentConfig) -> Document {
        let registry = self.registry;
        for (name, schema) in registry.schemas() {
            let rendered = self.render_named_root(schema.definition());
            self.named.entry(name.clone()).or_insert(rendered);
        }

        let mut paths: IndexMap<String, IndexMap<String, Operation>> = IndexMap::new();
        for entry in registry.paths() {
            let operation = self.operation(entry);
            paths
                .entry(entry.path.clone())
                .or_default()
                .insert(entry.method.as_str().to_string(), operation);
        }

        Document {
            openapi: config.openapi.clone(),
            info: config.info.clone(),
            servers: config.servers.clone(),
            paths,
            components: self.components(),
        }
    }

    fn components(&mut self) -> Option<Map<String, Value>> {
        let mut components = Map::new();
        let mut schemas: Map<String, Value> = std::mem::take(&mut self.named).into_iter().collect();

        let registry = self.registry;
        for (kind, entries) in registry.components() {
            if kind == "schemas" {
                for (name, value) in entries {
                    schemas.entry(name.clone()).or_insert_with(|| value.clone());
                }
                continue;
            }
            let section = components
                .entry(kind.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(section) = section {
                for (name, value) in entries {
                    section.insert(name.clone(), value.clone());
                }
            }
        }
        if !schemas.is_empty() {
            components.insert("schemas".to_string(), Value::Object(schemas));
        }
        (!components.is_empty()).then_some(components)
    }

    fn operation(&mut self, entry: &PathEntry) -> Operation {
        let request = &entry.request;
        let mut parameters = Vec::new();
        for (location, schema) in [
            (ParameterLocation::Path, &request.params),
            (ParameterLocation::Query, &request.query),
            (ParameterLocation::Header, &request.headers),
            (ParameterLocation::Cookie, &request.cookies),
        ] {
            if let Some(schema) = schema {
                self.parameters(location, schema, &mut parameters);
            }
        }

        let request_body = request.body.as_ref().map(|body| match body {
            BodyEntry::Raw(value) => RequestBody::Raw(value.clone()),
            BodyEntry::Derived { description, media } => RequestBody::Derived {
                description: description.clone(),
                content: self.content(media),
            },
        });

        let responses = entry
            .responses
            .iter()
            .map(|(status, response)| (status.to_string(), self.response(response)))
            .collect();

        Operation {
            tags: entry.tags.clone(),
            summary: entry.summary.clone(),
            description: entry.description.clone(),
            operation_id: entry.operation_id.clone(),
            deprecated: entry.deprecated,
            parameters,
            request_body,
            responses,
            extra: entry.extra.clone(),
        }
    }

    fn parameters(
        &mut self,
        location: ParameterLocation,
        schema: &Schema,
        out: &mut Vec<Parameter>,
    ) {
        let definition = schema.definition();
        let Some(properties) = definition.get("properties").and_then(Value::as_object) else {
            debug!(location = location.as_str(), "Skipping non-object parameter schema");
            return;
        };
        let required: Vec<&str> = definition
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        for (name, property) in properties {
            out.push(Parameter {
                name: name.clone(),
                location,
                required: location == ParameterLocation::Path
                    || required.contains(&name.as_str()),
                description: property
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                schema: self.render(property),
            });
        }
    }

    fn content(&mut self, media: &MediaEntry) -> Content {
        let schema = media
            .schema
            .as_ref()
            .map(|schema| self.render(schema.definition()));
        let mut content = Content::new();
        content.insert(media.media_type.clone(), MediaType { schema });
        content
    }

    fn response(&mut self, response: &ResponseEntry) -> Response {
        match response {
            ResponseEntry::Raw(value) => Response::Raw(value.clone()),
            ResponseEntry::Derived {
                description,
                content,
            } => Response::Derived {
                description: description.clone(),
                content: content.as_ref().map(|media| self.content(media)),
            },
        }
    }

    /// Render a schema definition, replacing named sub-schemas with `$ref`.
    fn render(&mut self, definition: &Value) -> Value {
        match definition {
            Value::Object(map) => {
                if let Some(name) = map.get(REF_NAME_KEY).and_then(Value::as_str) {
                    let name = name.to_string();
                    if !self.named.contains_key(&name) {
                        let rendered = self.render_named_root(definition);
                        self.named.entry(name.clone()).or_insert(rendered);
                    }
                    return json!({ "$ref": format!("#/components/schemas/{name}") });
                }
                Value::Object(
                    map.iter()
                        .map(|(key, value)| (key.clone(), self.render(value)))
                        .collect(),
                )
            }
            Value::Array(items) => Value::Array(items.iter().map(|v| self.render(v)).collect()),
            other => other.clone(),
        }
    }

    /// Render a named schema's own body: the name key is dropped and only
    /// its children are subject to `$ref` replacement.
    fn render_named_root(&mut self, definition: &Value) -> Value {
        match definition {
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(key, _)| key.as_str() != REF_NAME_KEY)
                    .map(|(key, value)| (key.clone(), self.render(value)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

/// A populated registry ready to be rendered.
///
/// Returned by `ContractRouter::openapi`; use [`OpenApiFactory::with`] to
/// add components before generating.
#[derive(Debug, Clone, Default)]
pub struct OpenApiFactory {
    registry: OpenApiRegistry,
}

impl OpenApiFactory {
    #[must_use]
    pub fn new(registry: OpenApiRegistry) -> Self {
        Self { registry }
    }

    /// Modify the registry before generation.
    #[must_use]
    pub fn with<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut OpenApiRegistry),
    {
        f(&mut self.registry);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &OpenApiRegistry {
        &self.registry
    }

    /// Render the document as JSON.
    #[must_use]
    pub fn generate(&self, config: &DocumentConfig) -> Value {
        let doc = OpenApiGenerator::new(&self.registry).generate(config);
        info!(
            title = %config.info.title,
            version = %config.info.version,
            operation_count = self.registry.len(),
            "OpenAPI document generated"
        );
        doc
    }

    /// Render the typed document.
    #[must_use]
    pub fn document(&self, config: &DocumentConfig) -> Document {
        OpenApiGenerator::new(&self.registry).document(config)
    }

    /// Render the document as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Yaml`] if serialization fails.
    pub fn generate_yaml(&self, config: &DocumentConfig) -> Result<String, ContractError> {
        Ok(serde_yaml::to_string(&self.generate(config))?)
    }

    /// Render the document and parse it into the `oas3` model.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Json`] if the document does not satisfy the
    /// `oas3` object model.
    pub fn generate_spec(&self, config: &DocumentConfig) -> Result<OpenApiV3Spec, ContractError> {
        let value = serde_json::to_value(self.document(config))?;
        let spec: OpenApiV3Spec = serde_json::from_value(value)?;
        Ok(spec)
    }
}
