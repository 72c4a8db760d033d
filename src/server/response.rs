use http::StatusCode;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

/// Reason phrase for a status code, `"Unknown"` for unregistered codes.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown")
}

/// Response under construction.
///
/// A response is *finished* once a body has been sent or [`Response::end`]
/// was called; routers stop running handlers after that.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: u16,
    headers: IndexMap<String, String>,
    body: Option<Value>,
    finished: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: IndexMap::new(),
            body: None,
            finished: false,
        }
    }

    pub fn status(&mut self, status: u16) -> &mut Self {
        self.status = status;
        self
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Send `body` as JSON and finish the response.
    ///
    /// A body that cannot be serialized turns into a 500 error body.
    pub fn json<T: Serialize + ?Sized>(&mut self, body: &T) {
        match serde_json::to_value(body) {
            Ok(value) => {
                self.set_header("content-type", "application/json");
                self.body = Some(value);
            }
            Err(e) => {
                error!(error = %e, "Failed to serialize response body");
                self.write_json_error(500, json!({ "error": "Response serialization failed" }));
            }
        }
        self.finished = true;
    }

    /// Send a text body and finish the response.
    pub fn send(&mut self, body: impl Into<String>) {
        if !self.headers.contains_key("content-type") {
            self.set_header("content-type", "text/plain");
        }
        self.body = Some(Value::String(body.into()));
        self.finished = true;
    }

    /// Set the status and send its reason phrase as the body.
    pub fn send_status(&mut self, status: u16) {
        self.status(status);
        self.send(status_reason(status));
    }

    /// Finish without a body.
    pub fn end(&mut self) {
        self.finished = true;
    }

    /// Write a JSON error body with `status` and finish the response.
    pub fn write_json_error(&mut self, status: u16, body: Value) {
        self.status = status;
        self.set_header("content-type", "application/json");
        self.body = Some(body);
        self.finished = true;
    }

    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    #[must_use]
    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(404), "Not Found");
        assert_eq!(status_reason(599), "Unknown");
    }

    #[test]
    fn test_json_sets_content_type_and_finishes() {
        let mut res = Response::new();
        res.status(201).json(&json!({"id": 1}));
        assert_eq!(res.status_code(), 201);
        assert_eq!(res.header("Content-Type"), Some("application/json"));
        assert_eq!(res.body(), Some(&json!({"id": 1})));
        assert!(res.is_finished());
    }

    #[test]
    fn test_send_keeps_explicit_content_type() {
        let mut res = Response::new();
        res.set_header("content-type", "text/csv").send("a,b");
        assert_eq!(res.header("content-type"), Some("text/csv"));
        assert_eq!(res.body(), Some(&json!("a,b")));
    }

    #[test]
    fn test_end_finishes_without_body() {
        let mut res = Response::new();
        res.status(204).end();
        assert!(res.is_finished());
        assert_eq!(res.status_code(), 204);
        assert_eq!(res.body(), None);
    }

    #[test]
    fn test_send_status() {
        let mut res = Response::new();
        res.send_status(204);
        assert_eq!(res.status_code(), 204);
        assert_eq!(res.body(), Some(&json!("No Content")));
    }
}
