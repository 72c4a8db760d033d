//! Error types.
//!
//! Two families of failure exist and they never mix:
//!
//! - [`ContractError`] is a setup-time failure: a dispatch or registration
//!   refers to a method+path the contract does not declare, or a schema
//!   cannot be compiled. These are returned from setup calls so an
//!   application fails before it serves traffic.
//! - [`ValidationError`] is a per-request value accumulating the issues of
//!   each request section. It is handed to the configured policy, never
//!   raised from dispatch.

use crate::contract::HttpMethod;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One step in the path from the validated value's root to the offending
/// field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(index) => write!(f, "{index}"),
            PathSegment::Key(key) => f.write_str(key),
        }
    }
}

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Failing JSON Schema keyword (`required`, `type`, `minLength`, ...)
    pub code: String,
    pub path: Vec<PathSegment>,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(code: impl Into<String>, path: Vec<PathSegment>, message: impl Into<String>) -> Self {
        ValidationIssue {
            code: code.into(),
            path,
            message: message.into(),
        }
    }

    /// Dotted rendering of `path`, e.g. `items.0.name`.
    #[must_use]
    pub fn dotted_path(&self) -> String {
        self.path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Request section a [`ValidationIssue`] list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Headers,
    Params,
    Query,
    Body,
}

impl Section {
    pub const ALL: [Section; 4] = [Section::Headers, Section::Params, Section::Query, Section::Body];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Headers => "headers",
            Section::Params => "params",
            Section::Query => "query",
            Section::Body => "body",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issues collected while validating one request.
///
/// Serializes as the 400 response body of the `send` policy:
///
/// ```json
/// { "paramsErrors": [{ "code": "minLength", "path": ["id"], "message": "..." }] }
/// ```
///
/// Sections that passed (or were not declared) are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers_errors: Option<Vec<ValidationIssue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params_errors: Option<Vec<ValidationIssue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_errors: Option<Vec<ValidationIssue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_errors: Option<Vec<ValidationIssue>>,
}

impl ValidationError {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff no section holds any issue.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        Section::ALL.iter().all(|section| self.issues(*section).is_empty())
    }

    /// Issues recorded for `section` (empty if none).
    #[must_use]
    pub fn issues(&self, section: Section) -> &[ValidationIssue] {
        let slot = match section {
            Section::Headers => &self.headers_errors,
            Section::Params => &self.params_errors,
            Section::Query => &self.query_errors,
            Section::Body => &self.body_errors,
        };
        slot.as_deref().unwrap_or(&[])
    }

    /// Record the issues of one section, replacing earlier ones.
    pub fn set(&mut self, section: Section, issues: Vec<ValidationIssue>) {
        let slot = match section {
            Section::Headers => &mut self.headers_errors,
            Section::Params => &mut self.params_errors,
            Section::Query => &mut self.query_errors,
            Section::Body => &mut self.body_errors,
        };
        *slot = Some(issues);
    }

    #[must_use]
    pub fn issue_count(&self) -> usize {
        Section::ALL.iter().map(|section| self.issues(*section).len()).sum()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request validation failed with {} issue(s)", self.issue_count())?;
        for section in Section::ALL {
            for issue in self.issues(section) {
                write!(f, "; {section}.{}: {}", issue.dotted_path(), issue.message)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Setup-time failures.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// A dispatch or registration named a method+path the contract lacks
    #[error("No config found for <{method} {path}>")]
    MissingRoute { method: HttpMethod, path: String },

    #[error("invalid route path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid schema for {context}: {reason}")]
    InvalidSchema { context: String, reason: String },

    #[error("nested routers deeper than {limit} levels below {path}")]
    NestingTooDeep { limit: usize, path: String },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
