//! # Schema Module
//!
//! A [`Schema`] is a JSON Schema document plus two pieces of metadata the
//! rest of the crate cares about:
//!
//! - a **content type** tag, attached with [`Schema::content_type`] and read
//!   back with [`Schema::media_type`] (default `application/json`);
//! - a **void** marker for "no content" responses ([`Schema::void`]).
//!
//! The tag lives on the handle, not in the definition, so tagging returns a
//! new value that shares the original definition and its compiled validator.
//! The original is never modified and both validate identically.
//!
//! ## Validation
//!
//! [`Schema::safe_parse`] runs the same pipeline for every request section:
//!
//! 1. fill declared `default` values for missing properties
//! 2. validate with the compiled [`jsonschema::JSONSchema`]
//! 3. on success, drop properties the schema does not declare (unless the
//!    schema opts into `additionalProperties`)
//!
//! Issues are reported as [`ValidationIssue`]s whose `code` is the failing
//! JSON Schema keyword and whose `path` points into the input.
//!
//! ## Serialized Form
//!
//! When a contract is loaded from YAML or JSON, a schema is a plain JSON
//! Schema object. Two extension keys are lifted out of the definition:
//!
//! ```yaml
//! body:
//!   type: string
//!   x-content-type: text/plain
//! responses:
//!   204:
//!     x-void: true
//!     description: Deleted
//! ```

use crate::error::{ContractError, PathSegment, ValidationIssue};
use jsonschema::error::ValidationErrorKind;
use jsonschema::paths::PathChunk;
use jsonschema::JSONSchema;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;

/// Media type assumed for schemas without a content-type tag.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Definition key marking a schema for extraction into `components.schemas`.
pub const REF_NAME_KEY: &str = "x-ref-name";

const CONTENT_TYPE_KEY: &str = "x-content-type";
const VOID_KEY: &str = "x-void";

struct SchemaInner {
    definition: Value,
    void: bool,
    compiled: OnceCell<Result<Arc<JSONSchema>, String>>,
}

impl SchemaInner {
    fn new(definition: Value, void: bool) -> Arc<Self> {
        Arc::new(Self {
            definition,
            void,
            compiled: OnceCell::new(),
        })
    }
}

/// Options for [`Schema::safe_parse_with`].
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Remove object properties the schema does not declare
    pub strip_unknown: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strip_unknown: true,
        }
    }
}

/// A JSON Schema with an optional content-type tag.
///
/// Cloning is cheap; the definition and compiled validator are shared.
#[derive(Clone)]
pub struct Schema {
    inner: Arc<SchemaInner>,
    content_type: Option<Arc<str>>,
    optional: bool,
}

impl Schema {
    /// Wrap a raw JSON Schema definition.
    #[must_use]
    pub fn new(definition: Value) -> Self {
        Self {
            inner: SchemaInner::new(definition, false),
            content_type: None,
            optional: false,
        }
    }

    /// Build a schema from its serialized form, honouring `x-content-type`
    /// and `x-void`.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::InvalidSchema`] if the value is neither an
    /// object nor a boolean, or if an extension key has the wrong type.
    pub fn from_value(value: Value) -> Result<Self, ContractError> {
        let mut map = match value {
            Value::Object(map) => map,
            Value::Bool(_) => return Ok(Self::new(value)),
            other => {
                return Err(ContractError::InvalidSchema {
                    context: "schema".to_string(),
                    reason: format!("expected an object or boolean, found {other}"),
                })
            }
        };

        let content_type = match map.remove(CONTENT_TYPE_KEY) {
            None => None,
            Some(Value::String(ct)) => Some(ct),
            Some(other) => {
                return Err(ContractError::InvalidSchema {
                    context: CONTENT_TYPE_KEY.to_string(),
                    reason: format!("expected a string, found {other}"),
                })
            }
        };
        let void = match map.remove(VOID_KEY) {
            None => false,
            Some(Value::Bool(flag)) => flag,
            Some(other) => {
                return Err(ContractError::InvalidSchema {
                    context: VOID_KEY.to_string(),
                    reason: format!("expected a boolean, found {other}"),
                })
            }
        };
        if void {
            map.entry("type").or_insert_with(|| json!("null"));
        }

        let schema = Self {
            inner: SchemaInner::new(Value::Object(map), void),
            content_type: None,
            optional: false,
        };
        Ok(match content_type {
            Some(ct) => schema.content_type(ct),
            None => schema,
        })
    }

    /// The "no content" schema. Documented responses using it have no
    /// `content` entry; as a request schema it only accepts an absent body.
    #[must_use]
    pub fn void() -> Self {
        Self {
            inner: SchemaInner::new(json!({ "type": "null" }), true),
            content_type: None,
            optional: false,
        }
    }

    /// Accepts any value.
    #[must_use]
    pub fn any() -> Self {
        Self::new(json!({}))
    }

    #[must_use]
    pub fn string() -> Self {
        Self::new(json!({ "type": "string" }))
    }

    #[must_use]
    pub fn number() -> Self {
        Self::new(json!({ "type": "number" }))
    }

    #[must_use]
    pub fn integer() -> Self {
        Self::new(json!({ "type": "integer" }))
    }

    #[must_use]
    pub fn boolean() -> Self {
        Self::new(json!({ "type": "boolean" }))
    }

    /// Matches exactly `value`.
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::new(json!({ "const": value.into() }))
    }

    #[must_use]
    pub fn array(items: Schema) -> Self {
        Self::new(json!({ "type": "array", "items": items.inner.definition }))
    }

    /// Object schema from `(name, schema)` pairs.
    ///
    /// Properties are required unless their schema was marked with
    /// [`Schema::optional`].
    ///
    /// ```rust
    /// use contract_router::schema::Schema;
    /// use serde_json::json;
    ///
    /// let schema = Schema::object([
    ///     ("id", Schema::string()),
    ///     ("note", Schema::string().optional()),
    /// ]);
    /// assert_eq!(schema.definition()["required"], json!(["id"]));
    /// ```
    #[must_use]
    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Schema)>,
        K: Into<String>,
    {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for (name, schema) in fields {
            let name = name.into();
            if !schema.optional {
                required.push(Value::String(name.clone()));
            }
            properties.insert(name, schema.inner.definition.clone());
        }

        let mut definition = Map::new();
        definition.insert("type".to_string(), json!("object"));
        definition.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            definition.insert("required".to_string(), Value::Array(required));
        }
        Self::new(Value::Object(definition))
    }

    /// Set a JSON Schema keyword, returning a new schema.
    ///
    /// The content-type tag and optional flag carry over.
    #[must_use]
    pub fn with(&self, keyword: &str, value: impl Into<Value>) -> Self {
        let mut definition = match &self.inner.definition {
            Value::Object(map) => map.clone(),
            Value::Bool(true) => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("allOf".to_string(), json!([other]));
                map
            }
        };
        definition.insert(keyword.to_string(), value.into());
        Self {
            inner: SchemaInner::new(Value::Object(definition), self.inner.void),
            content_type: self.content_type.clone(),
            optional: self.optional,
        }
    }

    #[must_use]
    pub fn describe(&self, description: impl Into<String>) -> Self {
        self.with("description", description.into())
    }

    #[must_use]
    pub fn min_length(&self, min: u64) -> Self {
        self.with("minLength", min)
    }

    #[must_use]
    pub fn max_length(&self, max: u64) -> Self {
        self.with("maxLength", max)
    }

    #[must_use]
    pub fn minimum(&self, min: impl Into<Value>) -> Self {
        self.with("minimum", min)
    }

    #[must_use]
    pub fn maximum(&self, max: impl Into<Value>) -> Self {
        self.with("maximum", max)
    }

    #[must_use]
    pub fn pattern(&self, pattern: &str) -> Self {
        self.with("pattern", pattern)
    }

    /// Value filled in when the property is missing.
    #[must_use]
    pub fn default_value(&self, value: impl Into<Value>) -> Self {
        self.with("default", value)
    }

    /// Register this schema as a reusable component named `name`.
    ///
    /// Generated documents replace it with a `$ref` to
    /// `#/components/schemas/{name}`.
    #[must_use]
    pub fn named(&self, name: impl Into<String>) -> Self {
        self.with(REF_NAME_KEY, name.into())
    }

    /// Mark as not required when used as an [`Schema::object`] property.
    #[must_use]
    pub fn optional(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            content_type: self.content_type.clone(),
            optional: true,
        }
    }

    /// Attach a media type. Returns a new schema sharing this one's
    /// definition; `self` is unchanged.
    #[must_use]
    pub fn content_type(&self, media_type: impl Into<String>) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            content_type: Some(Arc::from(media_type.into())),
            optional: self.optional,
        }
    }

    /// The attached media type, or [`DEFAULT_CONTENT_TYPE`].
    #[must_use]
    pub fn media_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    /// The attached media type, if any.
    #[must_use]
    pub fn tagged_content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.inner.definition.get("description").and_then(Value::as_str)
    }

    #[must_use]
    pub fn ref_name(&self) -> Option<&str> {
        self.inner.definition.get(REF_NAME_KEY).and_then(Value::as_str)
    }

    #[must_use]
    pub fn is_void(&self) -> bool {
        self.inner.void
    }

    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// The raw JSON Schema definition.
    #[must_use]
    pub fn definition(&self) -> &Value {
        &self.inner.definition
    }

    /// Compile the definition, caching the result for every handle sharing it.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::InvalidSchema`] if the definition is not a
    /// valid JSON Schema.
    pub fn compile(&self) -> Result<Arc<JSONSchema>, ContractError> {
        let compiled = self.inner.compiled.get_or_init(|| {
            JSONSchema::compile(&self.inner.definition)
                .map(Arc::new)
                .map_err(|e| e.to_string())
        });
        match compiled {
            Ok(schema) => Ok(Arc::clone(schema)),
            Err(reason) => Err(ContractError::InvalidSchema {
                context: self
                    .ref_name()
                    .map_or_else(|| "schema".to_string(), str::to_string),
                reason: reason.clone(),
            }),
        }
    }

    /// Validate `input` with default [`ParseOptions`].
    ///
    /// # Errors
    ///
    /// Returns every issue found; the list is never empty.
    pub fn safe_parse(&self, input: &Value) -> Result<Value, Vec<ValidationIssue>> {
        self.safe_parse_with(input, &ParseOptions::default())
    }

    /// Validate `input`, returning the normalised value on success.
    ///
    /// # Errors
    ///
    /// Returns every issue found; the list is never empty. A definition that
    /// fails to compile yields a single `invalid_schema` issue.
    pub fn safe_parse_with(
        &self,
        input: &Value,
        options: &ParseOptions,
    ) -> Result<Value, Vec<ValidationIssue>> {
        let compiled = self.compile().map_err(|e| {
            vec![ValidationIssue::new("invalid_schema", Vec::new(), e.to_string())]
        })?;

        let definition = &self.inner.definition;
        let mut value = input.clone();
        apply_defaults(definition, &mut value);

        if let Err(errors) = compiled.validate(&value) {
            let issues: Vec<ValidationIssue> = errors.map(|error| to_issue(&error)).collect();
            if !issues.is_empty() {
                return Err(issues);
            }
        }

        if options.strip_unknown {
            strip_unknown(definition, &mut value);
        }
        Ok(value)
    }

    /// Convert string inputs to the scalar types the schema declares.
    ///
    /// Headers, path parameters and query values arrive as text. For every
    /// property declared as `integer`, `number`, `boolean` or `array`, string
    /// values are parsed accordingly; a comma-separated string or a repeated
    /// key fills an array. Values that fail to parse are left untouched so
    /// validation reports them.
    #[must_use]
    pub fn coerce(&self, value: Value) -> Value {
        coerce_value(&self.inner.definition, value)
    }

    /// Names of the declared object properties, if this is an object schema.
    #[must_use]
    pub fn property_names(&self) -> Option<Vec<&str>> {
        self.inner
            .definition
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().map(String::as_str).collect())
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("definition", &self.inner.definition)
            .field("content_type", &self.content_type)
            .field("void", &self.inner.void)
            .field("optional", &self.optional)
            .finish()
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.inner.definition == other.inner.definition
            && self.inner.void == other.inner.void
            && self.content_type == other.content_type
            && self.optional == other.optional
    }
}

impl From<Value> for Schema {
    fn from(definition: Value) -> Self {
        Self::new(definition)
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Schema::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Schema {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut definition = self.inner.definition.clone();
        if let Value::Object(map) = &mut definition {
            if let Some(ct) = &self.content_type {
                map.insert(CONTENT_TYPE_KEY.to_string(), json!(ct.as_ref()));
            }
            if self.inner.void {
                map.insert(VOID_KEY.to_string(), json!(true));
            }
        }
        definition.serialize(serializer)
    }
}

fn to_issue(error: &jsonschema::ValidationError<'_>) -> ValidationIssue {
    let schema_path = error.schema_path.to_string();
    let code = schema_path
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("invalid")
        .to_string();

    let mut path: Vec<PathSegment> = error
        .instance_path
        .clone()
        .into_iter()
        .map(|chunk| match chunk {
            PathChunk::Index(index) => PathSegment::Index(index),
            PathChunk::Property(name) => PathSegment::Key(name.into_string()),
            PathChunk::Keyword(keyword) => PathSegment::Key(keyword.to_string()),
        })
        .collect();
    if let ValidationErrorKind::Required { property } = &error.kind {
        if let Some(name) = property.as_str() {
            path.push(PathSegment::Key(name.to_string()));
        }
    }

    ValidationIssue::new(code, path, error.to_string())
}

fn apply_defaults(definition: &Value, value: &mut Value) {
    if value.is_null() {
        if let Some(default) = definition.get("default") {
            *value = default.clone();
        }
    }
    match value {
        Value::Object(map) => {
            let Some(properties) = definition.get("properties").and_then(Value::as_object) else {
                return;
            };
            for (key, property) in properties {
                match map.get_mut(key) {
                    Some(child) => apply_defaults(property, child),
                    None => {
                        if let Some(default) = property.get("default") {
                            map.insert(key.clone(), default.clone());
                        }
                    }
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_definition) = definition.get("items") {
                for item in items {
                    apply_defaults(item_definition, item);
                }
            }
        }
        _ => {}
    }
}

fn strip_unknown(definition: &Value, value: &mut Value) {
    match value {
        Value::Object(map) => {
            let Some(properties) = definition.get("properties").and_then(Value::as_object) else {
                return;
            };
            let open = definition.get("additionalProperties").is_some_and(|v| v != &json!(false))
                || definition.get("patternProperties").is_some();
            if !open {
                map.retain(|key, _| properties.contains_key(key));
            }
            for (key, child) in map.iter_mut() {
                if let Some(property) = properties.get(key) {
                    strip_unknown(property, child);
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_definition) = definition.get("items") {
                for item in items {
                    strip_unknown(item_definition, item);
                }
            }
        }
        _ => {}
    }
}

/// The declared `type`, skipping `"null"` in a type list.
fn declared_type(definition: &Value) -> Option<&str> {
    match definition.get("type")? {
        Value::String(ty) => Some(ty.as_str()),
        Value::Array(types) => types.iter().filter_map(Value::as_str).find(|ty| *ty != "null"),
        _ => None,
    }
}

fn convert_primitive(raw: &str, definition: &Value) -> Value {
    let raw_value = || Value::String(raw.to_string());
    match declared_type(definition) {
        Some("integer") => raw.trim().parse::<i64>().map(Value::from).unwrap_or_else(|_| raw_value()),
        Some("number") => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|n| serde_json::Number::from_f64(n).map(Value::Number))
            .unwrap_or_else(raw_value),
        Some("boolean") => raw.trim().parse::<bool>().map(Value::from).unwrap_or_else(|_| raw_value()),
        _ => raw_value(),
    }
}

fn coerce_value(definition: &Value, value: Value) -> Value {
    let empty = Value::Object(Map::new());
    let items = definition.get("items").unwrap_or(&empty);
    match (declared_type(definition), value) {
        (Some("array"), Value::String(raw)) => Value::Array(
            raw.split(',')
                .filter(|part| !part.is_empty())
                .map(|part| convert_primitive(part.trim(), items))
                .collect(),
        ),
        (Some("array"), Value::Array(values)) => Value::Array(
            values
                .into_iter()
                .map(|v| match v {
                    Value::String(raw) => convert_primitive(&raw, items),
                    other => other,
                })
                .collect(),
        ),
        (Some("object"), Value::Object(map)) => {
            let properties = definition.get("properties").and_then(Value::as_object);
            Value::Object(
                map.into_iter()
                    .map(|(key, v)| match properties.and_then(|p| p.get(&key)) {
                        Some(property) => {
                            let coerced = coerce_value(property, v);
                            (key, coerced)
                        }
                        None => (key, v),
                    })
                    .collect(),
            )
        }
        (Some(_), Value::String(raw)) => convert_primitive(&raw, definition),
        (_, other) => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_content_type() {
        assert_eq!(Schema::string().media_type(), DEFAULT_CONTENT_TYPE);
        assert_eq!(Schema::string().tagged_content_type(), None);
    }

    #[test]
    fn test_tagging_shares_compiled_validator() {
        let base = Schema::integer();
        let tagged = base.content_type("text/plain");
        let a = base.compile().unwrap();
        let b = tagged.compile().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_with_preserves_tag_and_resets_cache() {
        let tagged = Schema::string().content_type("text/csv");
        let longer = tagged.min_length(2);
        assert_eq!(longer.media_type(), "text/csv");
        assert!(tagged.safe_parse(&json!("a")).is_ok());
        assert!(longer.safe_parse(&json!("a")).is_err());
    }

    #[test]
    fn test_coerce_scalars_and_lists() {
        let schema = Schema::object([
            ("page", Schema::integer()),
            ("ratio", Schema::number()),
            ("flag", Schema::boolean()),
            ("ids", Schema::array(Schema::integer())),
            ("name", Schema::string()),
        ]);
        let coerced = schema.coerce(json!({
            "page": "2",
            "ratio": "0.5",
            "flag": "true",
            "ids": "1,2,3",
            "name": "42",
            "extra": "x"
        }));
        assert_eq!(
            coerced,
            json!({"page": 2, "ratio": 0.5, "flag": true, "ids": [1, 2, 3], "name": "42", "extra": "x"})
        );
    }

    #[test]
    fn test_unparseable_value_left_for_validation() {
        let schema = Schema::object([("page", Schema::integer())]);
        let coerced = schema.coerce(json!({"page": "two"}));
        assert_eq!(coerced, json!({"page": "two"}));
        let issues = schema.safe_parse(&coerced).unwrap_err();
        assert_eq!(issues[0].code, "type");
        assert_eq!(issues[0].path, vec![PathSegment::Key("page".into())]);
    }

    #[test]
    fn test_required_issue_points_at_property() {
        let schema = Schema::object([("id", Schema::string())]);
        let issues = schema.safe_parse(&json!({})).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "required");
        assert_eq!(issues[0].path, vec![PathSegment::Key("id".into())]);
    }

    #[test]
    fn test_defaults_and_stripping() {
        let schema = Schema::object([
            ("limit", Schema::integer().default_value(20).optional()),
            ("q", Schema::string()),
        ]);
        let parsed = schema.safe_parse(&json!({"q": "rust", "junk": 1})).unwrap();
        assert_eq!(parsed, json!({"q": "rust", "limit": 20}));

        let kept = schema
            .safe_parse_with(&json!({"q": "rust", "junk": 1}), &ParseOptions { strip_unknown: false })
            .unwrap();
        assert_eq!(kept["junk"], json!(1));
    }

    #[test]
    fn test_from_value_extension_keys() {
        let schema = Schema::from_value(json!({
            "type": "string",
            "x-content-type": "text/plain"
        }))
        .unwrap();
        assert_eq!(schema.media_type(), "text/plain");
        assert!(schema.definition().get("x-content-type").is_none());

        let void = Schema::from_value(json!({"x-void": true, "description": "gone"})).unwrap();
        assert!(void.is_void());
        assert_eq!(void.description(), Some("gone"));

        assert!(Schema::from_value(json!(5)).is_err());
        assert!(Schema::from_value(json!({"x-void": "yes"})).is_err());
    }

    #[test]
    fn test_invalid_definition_is_reported() {
        let schema = Schema::new(json!({"type": 12}));
        assert!(matches!(schema.compile(), Err(ContractError::InvalidSchema { .. })));
        let issues = schema.safe_parse(&json!("x")).unwrap_err();
        assert_eq!(issues[0].code, "invalid_schema");
    }
}
