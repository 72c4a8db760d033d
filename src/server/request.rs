use http::Method;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

/// An in-flight request as seen by handlers.
///
/// `headers`, `params` and `query` are JSON objects so validated values
/// (numbers, booleans, arrays) can replace the raw strings they were parsed
/// from. Header names are stored lowercase.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Path relative to the router currently dispatching (mount prefixes stripped)
    pub path: String,
    /// Path as originally received, without the query string
    pub original_path: String,
    /// Request headers (lowercase keys)
    pub headers: Map<String, Value>,
    /// Path parameters captured by the matching route
    pub params: Map<String, Value>,
    /// Query string parameters; repeated keys collect into arrays
    pub query: Map<String, Value>,
    /// Request body, `Value::Null` when absent
    pub body: Value,
}

impl Request {
    /// Build a request from a method and a URI path with optional query string.
    ///
    /// # Example
    ///
    /// ```rust
    /// use contract_router::server::Request;
    /// use http::Method;
    ///
    /// let req = Request::new(Method::GET, "/items?tag=a&tag=b&limit=5");
    /// assert_eq!(req.path, "/items");
    /// assert_eq!(req.query["tag"], serde_json::json!(["a", "b"]));
    /// assert_eq!(req.query["limit"], serde_json::json!("5"));
    /// ```
    #[must_use]
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query_str) = match uri.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (uri, None),
        };
        let path = if path.is_empty() { "/" } else { path };
        let query = query_str.map(parse_query).unwrap_or_default();

        debug!(
            method = %method,
            path = %path,
            query_count = query.len(),
            "Request constructed"
        );

        Self {
            method,
            path: path.to_string(),
            original_path: path.to_string(),
            headers: Map::new(),
            params: Map::new(),
            query,
            body: Value::Null,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), Value::String(value.into()));
        self
    }

    /// Set a JSON body and `content-type: application/json`.
    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = body;
        self.with_header("content-type", "application/json")
    }

    /// Set a text body with the given content type.
    #[must_use]
    pub fn with_text(mut self, content_type: &str, body: impl Into<String>) -> Self {
        self.body = Value::String(body.into());
        self.with_header("content-type", content_type)
    }

    /// Header value as text. Non-string values (after validation coerced
    /// them) are rendered as JSON.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(value_as_text)
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&Value> {
        self.query.get(name)
    }

    /// Deserialize the headers into `T`.
    ///
    /// # Errors
    ///
    /// Fails if the headers do not match `T`.
    pub fn headers_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.headers.clone()))
    }

    /// Deserialize the path parameters into `T`.
    ///
    /// # Errors
    ///
    /// Fails if the parameters do not match `T`.
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.params.clone()))
    }

    /// Deserialize the query into `T`.
    ///
    /// # Errors
    ///
    /// Fails if the query does not match `T`.
    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.query.clone()))
    }

    /// Deserialize the body into `T`.
    ///
    /// # Errors
    ///
    /// Fails if the body does not match `T`.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.body.clone())
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse a query string; a key seen more than once becomes an array.
fn parse_query(query: &str) -> Map<String, Value> {
    let mut params = Map::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = Value::String(value.into_owned());
        match params.get_mut(key.as_ref()) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                params.insert(key.into_owned(), value);
            }
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_decoding() {
        let req = Request::new(Method::GET, "/search?q=hello%20world&x=1&x=2&x=3");
        assert_eq!(req.query["q"], json!("hello world"));
        assert_eq!(req.query["x"], json!(["1", "2", "3"]));
    }

    #[test]
    fn test_header_names_are_lowercased() {
        let req = Request::new(Method::GET, "/").with_header("X-Api-Key", "k");
        assert_eq!(req.header("x-api-key").as_deref(), Some("k"));
        assert_eq!(req.header("X-API-KEY").as_deref(), Some("k"));
    }

    #[test]
    fn test_param_lookups() {
        let mut req = Request::new(Method::GET, "/items/7?limit=5");
        req.params.insert("id".to_string(), json!(7));
        assert_eq!(req.param("id"), Some(&json!(7)));
        assert_eq!(req.param("missing"), None);
        assert_eq!(req.query_param("limit"), Some(&json!("5")));
        assert_eq!(req.query_param("page"), None);
    }

    #[test]
    fn test_empty_path_defaults_to_root() {
        let req = Request::new(Method::GET, "?a=1");
        assert_eq!(req.path, "/");
    }
}
