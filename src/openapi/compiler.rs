//! Contract → registry compilation.
//!
//! For each declared route the compiler derives a [`PathEntry`]:
//!
//! - `path`: the mount prefix and route path joined canonically
//! - `tags`: contract tags, then route tags, then override tags
//! - `deprecated`: route, else contract
//! - `params`: the route's schema, else one string field per `{name}`
//! - `body`: present if the route declares a body schema or a content type
//! - `responses`: `commonResponses` first, then route responses (same status
//!   replaces), sorted by status code
//!
//! The route's `openapi` overrides are applied last: scalar fields replace,
//! tags append, request locations and response statuses replace one by
//! one, and unknown fields are copied onto the operation.

use super::registry::{BodyEntry, MediaEntry, OpenApiRegistry, PathEntry, ResponseEntry};
use crate::contract::{Contract, HttpMethod, OperationOverrides, RouteConfig};
use crate::error::ContractError;
use crate::path::{openapi_path, params_schema};
use crate::schema::DEFAULT_CONTENT_TYPE;

/// Options for [`register`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterOptions {
    /// Raw (not yet canonical) prefix of the router's mount point
    pub path_prefix: Option<String>,
    /// Number of contract-bearing routers above this one
    pub depth: usize,
}

impl RegisterOptions {
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            path_prefix: Some(prefix.into()),
            depth: 0,
        }
    }

    /// Options for a router mounted at `mount_path` below this prefix.
    #[must_use]
    pub fn nested(&self, mount_path: &str) -> Self {
        let parent = self.path_prefix.as_deref().unwrap_or("");
        Self {
            path_prefix: Some(format!("{parent}/{mount_path}")),
            depth: self.depth + 1,
        }
    }
}

/// Register every route declared directly in `contract`.
///
/// # Errors
///
/// Propagates [`register_route`] errors.
pub fn register(
    contract: &Contract,
    registry: &mut OpenApiRegistry,
    options: &RegisterOptions,
) -> Result<(), ContractError> {
    for (method, path, _) in contract.iter_routes() {
        register_route(contract, method, path, registry, options)?;
    }
    Ok(())
}

/// Resolve one route and add it to `registry`.
///
/// # Errors
///
/// Returns [`ContractError::MissingRoute`] if the contract has no such route.
pub fn register_route(
    contract: &Contract,
    method: HttpMethod,
    path: &str,
    registry: &mut OpenApiRegistry,
    options: &RegisterOptions,
) -> Result<(), ContractError> {
    let config = contract.route_config(method, path)?;
    let entry = resolve_entry(contract, config, method, path, options);
    registry.register_path(entry);
    Ok(())
}

fn resolve_entry(
    contract: &Contract,
    config: &RouteConfig,
    method: HttpMethod,
    path: &str,
    options: &RegisterOptions,
) -> PathEntry {
    let full_path = openapi_path([options.path_prefix.as_deref(), Some(path)]);

    let mut entry = PathEntry::new(method, full_path);
    entry.summary = config.summary.clone();
    entry.description = config.description.clone();
    entry.deprecated = config.deprecated.or(contract.deprecated);
    entry.tags = contract.tags.iter().chain(&config.tags).cloned().collect();

    entry.request.headers = config.headers.clone();
    entry.request.params = config.params.clone().or_else(|| params_schema(&entry.path));
    entry.request.query = config.query.clone();
    entry.request.body = body_entry(config);

    entry.responses = contract
        .common_responses
        .iter()
        .chain(&config.responses)
        .map(|(status, schema)| (*status, ResponseEntry::from_schema(schema)))
        .collect();

    if let Some(overrides) = &config.openapi {
        apply_overrides(&mut entry, overrides);
    }
    entry.responses.sort_keys();
    entry
}

fn body_entry(config: &RouteConfig) -> Option<BodyEntry> {
    if config.body.is_none() && config.content_type.is_none() {
        return None;
    }
    let media_type = config
        .body_media_type()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();
    Some(BodyEntry::Derived {
        description: config
            .body
            .as_ref()
            .and_then(|schema| schema.description())
            .map(str::to_string),
        media: MediaEntry {
            media_type,
            schema: config.body.clone(),
        },
    })
}

fn apply_overrides(entry: &mut PathEntry, overrides: &OperationOverrides) {
    if let Some(summary) = &overrides.summary {
        entry.summary = Some(summary.clone());
    }
    if let Some(description) = &overrides.description {
        entry.description = Some(description.clone());
    }
    if let Some(deprecated) = overrides.deprecated {
        entry.deprecated = Some(deprecated);
    }
    if let Some(operation_id) = &overrides.operation_id {
        entry.operation_id = Some(operation_id.clone());
    }
    entry.tags.extend(overrides.tags.iter().cloned());

    let request = &overrides.request;
    if let Some(headers) = &request.headers {
        entry.request.headers = Some(headers.clone());
    }
    if let Some(params) = &request.params {
        entry.request.params = Some(params.clone());
    }
    if let Some(query) = &request.query {
        entry.request.query = Some(query.clone());
    }
    if let Some(cookies) = &request.cookies {
        entry.request.cookies = Some(cookies.clone());
    }
    if let Some(body) = &request.body {
        entry.request.body = Some(BodyEntry::Raw(body.clone()));
    }

    for (status, response) in &overrides.responses {
        entry
            .responses
            .insert(*status, ResponseEntry::Raw(response.clone()));
    }
    for (key, value) in &overrides.extra {
        entry.extra.insert(key.clone(), value.clone());
    }
}
