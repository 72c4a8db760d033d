//! Path template normalisation.
//!
//! Routes are declared with Express-style templates (`/users/:id`,
//! `/users/:id?`, `/orders{/:orderId}`) while OpenAPI documents use the
//! `{name}` form. [`openapi_path`] joins any number of fragments and rewrites
//! them into the canonical OpenAPI form:
//!
//! ```rust
//! use contract_router::path::openapi_path;
//!
//! assert_eq!(openapi_path(["users", "posts/:id"]), "/users/posts/{id}");
//! assert_eq!(openapi_path(["/orders{/:orderId}/items"]), "/orders/{orderId}/items");
//! assert_eq!(openapi_path([""]), "/");
//! ```

use crate::schema::Schema;
use once_cell::sync::Lazy;
use regex::Regex;

static BRACE_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^}]+)\}").expect("brace group regex should be valid"));
static EXPRESS_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":(\w+)").expect("express param regex should be valid"));
static CANONICAL_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\w+)\}").expect("canonical param regex should be valid"));
static SLASH_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/+").expect("slash run regex should be valid"));

/// Join path fragments and normalise them into a canonical OpenAPI template.
///
/// Fragments are trimmed, empty or absent ones are skipped, and the rest are
/// joined with `/` behind a leading `/`. Brace groups are flattened, `?`
/// optionality markers are dropped, `:name` becomes `{name}`, slash runs
/// collapse and a trailing slash is removed unless the result is `/`.
///
/// # Arguments
///
/// * `fragments` - Path fragments, each either `&str` or `Option<&str>`
///
/// # Returns
///
/// The canonical template, always starting with `/`
pub fn openapi_path<'a, I, S>(fragments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: Into<Option<&'a str>>,
{
    let joined = std::iter::once("/")
        .chain(fragments.into_iter().filter_map(Into::into))
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    let flattened = BRACE_GROUP.replace_all(&joined, "$1");
    let required = strip_optional_markers(&flattened);
    let templated = EXPRESS_PARAM.replace_all(&required, "{$1}");
    let mut path = SLASH_RUN.replace_all(&templated, "/").into_owned();

    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    path
}

/// Remove every `?` that is not escaped with a backslash.
fn strip_optional_markers(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut previous = None;
    for ch in path.chars() {
        if ch != '?' || previous == Some('\\') {
            out.push(ch);
        }
        previous = Some(ch);
    }
    out
}

/// Parameter names of a canonical `{name}` template, in order of first appearance.
#[must_use]
pub fn path_param_names(path: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for captures in CANONICAL_PARAM.captures_iter(path) {
        let name = &captures[1];
        if !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Default path-parameter schema for a canonical template.
///
/// Every `{name}` becomes a required string property. Returns `None` when the
/// template has no parameters.
#[must_use]
pub fn params_schema(path: &str) -> Option<Schema> {
    let names = path_param_names(path);
    if names.is_empty() {
        return None;
    }
    Some(Schema::object(
        names.into_iter().map(|name| (name, Schema::string())),
    ))
}

/// A parameter found in an Express-style route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteParam {
    pub name: String,
    /// `:name?` or a parameter inside a `{...}` group
    pub optional: bool,
}

/// Parameters of a raw Express-style template, preserving optionality.
///
/// ```rust
/// use contract_router::path::route_params;
///
/// let params = route_params("/files{/:dir}/:name/:rev?");
/// let optional: Vec<_> = params.iter().map(|p| (p.name.as_str(), p.optional)).collect();
/// assert_eq!(optional, vec![("dir", true), ("name", false), ("rev", true)]);
/// ```
#[must_use]
pub fn route_params(template: &str) -> Vec<RouteParam> {
    let mut params: Vec<RouteParam> = Vec::new();
    let mut depth = 0usize;
    let mut chars = template.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ':' => {
                let mut name = String::new();
                while let Some(&(_, next)) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' {
                        name.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    continue;
                }
                let marked = matches!(chars.peek(), Some(&(_, '?')));
                if marked {
                    chars.next();
                }
                let optional = marked || depth > 0;
                match params.iter_mut().find(|p| p.name == name) {
                    Some(existing) => existing.optional &= optional,
                    None => params.push(RouteParam { name, optional }),
                }
            }
            _ => {}
        }
    }
    params
}

/// Validation-time default params schema for a raw route template.
///
/// Like [`params_schema`], but parameters the template marks optional are
/// not required.
#[must_use]
pub fn route_params_schema(template: &str) -> Option<Schema> {
    let params = route_params(template);
    if params.is_empty() {
        return None;
    }
    Some(Schema::object(params.into_iter().map(|param| {
        let schema = if param.optional {
            Schema::string().optional()
        } else {
            Schema::string()
        };
        (param.name, schema)
    })))
}
