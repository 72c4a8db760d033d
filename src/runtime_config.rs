//! # Runtime Configuration Module
//!
//! Environment-driven knobs for the validation and documentation layers.
//!
//! ## Environment Variables
//!
//! ### `CONTRACT_VALIDATION_POLICY`
//!
//! Fallback validation-failure policy for routes where neither the route
//! nor the contract sets one: `send`, `forward` or `ignore`.
//!
//! Default: `send` (unrecognised values also fall back to `send`)
//!
//! ### `CONTRACT_STRIP_UNKNOWN`
//!
//! Whether validated params, query and body objects lose the properties
//! their schema does not declare. Headers are always projected onto the
//! declared names before validation and merged back, so undeclared headers
//! are never touched.
//!
//! Default: `true`
//!
//! ### `CONTRACT_MAX_NESTING_DEPTH`
//!
//! Maximum depth of contract-bearing routers walked when generating a
//! document. Guards against a router mounted inside itself.
//!
//! Default: `32`
//!
//! ## Usage
//!
//! ```rust
//! use contract_router::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("fallback policy: {:?}", config.default_policy);
//! ```

use crate::contract::ValidationErrorPolicy;
use std::env;

const DEFAULT_MAX_NESTING_DEPTH: usize = 32;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Policy used when neither route nor contract declares one
    pub default_policy: ValidationErrorPolicy,
    /// Drop undeclared properties from validated params/query/body
    pub strip_unknown: bool,
    /// Depth limit for nested contract-bearing routers
    pub max_nesting_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_policy: ValidationErrorPolicy::Send,
            strip_unknown: true,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let default_policy = lookup("CONTRACT_VALIDATION_POLICY")
            .and_then(|value| ValidationErrorPolicy::parse(&value))
            .unwrap_or(defaults.default_policy);

        let strip_unknown = lookup("CONTRACT_STRIP_UNKNOWN")
            .map(|value| parse_bool(&value, defaults.strip_unknown))
            .unwrap_or(defaults.strip_unknown);

        let max_nesting_depth = lookup("CONTRACT_MAX_NESTING_DEPTH")
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|depth| *depth > 0)
            .unwrap_or(defaults.max_nesting_depth);

        RuntimeConfig {
            default_policy,
            strip_unknown,
            max_nesting_depth,
        }
    }
}

fn parse_bool(value: &str, fallback: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> RuntimeConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RuntimeConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.default_policy.name(), "send");
        assert!(config.strip_unknown);
        assert_eq!(config.max_nesting_depth, 32);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("CONTRACT_VALIDATION_POLICY", "forward"),
            ("CONTRACT_STRIP_UNKNOWN", "off"),
            ("CONTRACT_MAX_NESTING_DEPTH", "4"),
        ]);
        assert_eq!(config.default_policy.name(), "forward");
        assert!(!config.strip_unknown);
        assert_eq!(config.max_nesting_depth, 4);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("CONTRACT_VALIDATION_POLICY", "shout"),
            ("CONTRACT_STRIP_UNKNOWN", "maybe"),
            ("CONTRACT_MAX_NESTING_DEPTH", "0"),
        ]);
        assert_eq!(config.default_policy.name(), "send");
        assert!(config.strip_unknown);
        assert_eq!(config.max_nesting_depth, 32);
    }
}
