use crate::error::ContractError;
use regex::Regex;
use serde_json::{Map, Value};

const REST_GROUP: &str = "__rest";

/// Result of matching a request path against a [`PathMatcher`].
#[derive(Debug, Clone, PartialEq)]
pub struct PathMatch {
    /// Captured parameters, URL-decoded
    pub params: Map<String, Value>,
    /// For prefix matchers, the remainder of the path (always starts with `/`)
    pub rest: Option<String>,
}

/// Compiled Express-style path template.
///
/// Supports `:name`, `:name?` and `{...}` optional groups. Route matchers
/// match the whole path (tolerating a trailing slash); prefix matchers
/// match at a segment boundary and keep the remainder for the mounted
/// handlers.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    template: String,
    regex: Regex,
    param_names: Vec<String>,
    prefix: bool,
}

impl PathMatcher {
    /// Matcher for a route: the template must cover the whole path.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::InvalidPath`] if the template has unbalanced
    /// braces or does not compile.
    pub fn route(template: &str) -> Result<Self, ContractError> {
        Self::compile(template, false)
    }

    /// Matcher for a mount point: the template must cover a path prefix.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::InvalidPath`] if the template has unbalanced
    /// braces or does not compile.
    pub fn prefix(template: &str) -> Result<Self, ContractError> {
        Self::compile(template, true)
    }

    fn compile(template: &str, prefix: bool) -> Result<Self, ContractError> {
        let invalid = |reason: String| ContractError::InvalidPath {
            path: template.to_string(),
            reason,
        };

        let trimmed = template.trim().trim_end_matches('/');
        let mut pattern = String::with_capacity(trimmed.len() + 16);
        pattern.push('^');
        let mut param_names = Vec::new();
        let mut depth = 0usize;
        let mut chars = trimmed.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '{' => {
                    depth += 1;
                    pattern.push_str("(?:");
                }
                '}' => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| invalid("unbalanced '}'".to_string()))?;
                    pattern.push_str(")?");
                }
                ':' => {
                    let mut name = String::new();
                    while let Some(&next) = chars.peek() {
                        if next.is_alphanumeric() || next == '_' {
                            name.push(next);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    if name.is_empty() {
                        pattern.push(':');
                        continue;
                    }
                    let optional = chars.peek() == Some(&'?');
                    if optional {
                        chars.next();
                        if pattern.ends_with('/') {
                            pattern.pop();
                            pattern.push_str("(?:/([^/]+?))?");
                        } else {
                            pattern.push_str("([^/]+?)?");
                        }
                    } else {
                        pattern.push_str("([^/]+?)");
                    }
                    param_names.push(name);
                }
                other => {
                    let mut buf = [0u8; 4];
                    pattern.push_str(&regex::escape(other.encode_utf8(&mut buf)));
                }
            }
        }
        if depth != 0 {
            return Err(invalid("unbalanced '{'".to_string()));
        }

        if prefix {
            pattern.push_str("(?P<");
            pattern.push_str(REST_GROUP);
            pattern.push_str(">/.*)?$");
        } else {
            pattern.push_str("/?$");
        }

        let regex = Regex::new(&pattern).map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            template: template.to_string(),
            regex,
            param_names,
            prefix,
        })
    }

    /// Match `path`, returning captured parameters (and the remainder for
    /// prefix matchers).
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<PathMatch> {
        let captures = self.regex.captures(path)?;

        let mut params = Map::new();
        for (index, name) in self.param_names.iter().enumerate() {
            if let Some(raw) = captures.get(index + 1) {
                let decoded = urlencoding::decode(raw.as_str())
                    .map(|value| value.into_owned())
                    .unwrap_or_else(|_| raw.as_str().to_string());
                params.insert(name.clone(), Value::String(decoded));
            }
        }

        let rest = self.prefix.then(|| {
            captures
                .name(REST_GROUP)
                .map_or_else(|| "/".to_string(), |rest| rest.as_str().to_string())
        });

        Some(PathMatch { params, rest })
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    #[must_use]
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }
}
