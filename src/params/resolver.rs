//! Single-parameter resolution
//!
//! Resolves one configuration value through a fallback chain (explicit value,
//! registered default), validates it against a caller-supplied predicate and
//! degrades to the fallback with a warning on failure. Invalid user input
//! never aborts a build: scalars fall back to their default, lists are
//! filtered element by element.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::campaign::RawConfig;

/// Options controlling diagnostics for a resolution pass
///
/// Passed alongside the configuration rather than stored inside it, so the
/// data being validated is never mutated by the validation itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Suppress warnings for parameters that fail validation
    pub silent: bool,
}

/// Resolves raw configuration values against predicates and defaults
pub struct Resolver<'a> {
    config: &'a RawConfig,
    options: ResolveOptions,
}

impl<'a> Resolver<'a> {
    pub fn new(config: &'a RawConfig, options: ResolveOptions) -> Self {
        Self { config, options }
    }

    /// Raw lookup; absent and explicitly-empty values are both unset since
    /// the configuration format does not distinguish them.
    fn raw(&self, section: &str, key: &str) -> Option<&'a Value> {
        let value = self.config.get(section)?.get(key)?;
        if is_falsy(value) {
            None
        } else {
            Some(value)
        }
    }

    /// Resolve a scalar parameter.
    ///
    /// Returns the configured value when it deserializes as `T` and satisfies
    /// `predicate`; otherwise emits one warning naming the section, key and
    /// `reason`, and returns `fallback`. An unset value falls back without a
    /// diagnostic.
    pub fn scalar<T, P>(
        &self,
        section: &str,
        key: &str,
        reason: &str,
        fallback: T,
        predicate: P,
    ) -> T
    where
        T: DeserializeOwned + Debug,
        P: Fn(&T) -> bool,
    {
        let raw = match self.raw(section, key) {
            Some(value) => value,
            None => return fallback,
        };
        match serde_json::from_value::<T>(raw.clone()) {
            Ok(value) if predicate(&value) => value,
            _ => {
                if !self.options.silent {
                    warn!(
                        "parameter [{section} -> {key}] {reason} (set to default: {fallback:?})"
                    );
                }
                fallback
            }
        }
    }

    /// Resolve a list parameter by filtering its elements.
    ///
    /// Order is preserved and each rejected element is dropped with its own
    /// warning. No default is substituted: the filtered, possibly empty,
    /// list is returned.
    pub fn list<T, P>(&self, section: &str, key: &str, predicate: P) -> Vec<T>
    where
        T: DeserializeOwned,
        P: Fn(&T) -> bool,
    {
        let items = match self.raw(section, key) {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        };
        let mut kept = Vec::new();
        for item in items {
            match serde_json::from_value::<T>(item.clone()) {
                Ok(value) if predicate(&value) => kept.push(value),
                _ => {
                    if !self.options.silent {
                        warn!("parameter [{section} -> {key}] {item} rejected (removed)");
                    }
                }
            }
        }
        kept
    }
}

/// Values treated as unset.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
