//! Immutable default chains.
//!
//! A [`DefaultChain`] is a shared, read-only snapshot of fallback option
//! values. Deriving a child never touches the parent: [`merge_or_delete`]
//! builds a fresh mapping every time.

use crate::options::{OptionMap, OptionValue, RequestOptions, keys};
use serde_json::Value;
use std::sync::Arc;

/// Redirect ceiling used when neither the caller nor the chain sets one
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;

/// Immutable, derivable set of fallback option values
///
/// ## Example
///
/// ```rust,ignore
/// use request_lite::{DefaultChain, RequestOptions};
///
/// let base = DefaultChain::base();
/// let api = base.derive(RequestOptions::new().header("accept", "application/json"));
/// let no_redirects = api.derive(RequestOptions::new().unset("follow_redirect"));
/// ```
#[derive(Debug, Clone)]
pub struct DefaultChain {
    values: Arc<OptionMap>,
}

impl DefaultChain {
    /// A chain with no values at all
    #[must_use]
    pub fn empty() -> Self {
        Self::from_map(OptionMap::new())
    }

    /// The stock defaults every client starts from
    #[must_use]
    pub fn base() -> Self {
        let mut values = OptionMap::new();
        values.insert(keys::SEND_IMMEDIATELY, true);
        values.insert(keys::METHOD, "GET");
        values.insert(keys::HEADERS, OptionMap::new());
        values.insert(keys::USE_QUERYSTRING, false);
        values.insert(keys::FOLLOW_REDIRECT, true);
        values.insert(keys::FOLLOW_ALL_REDIRECTS, false);
        values.insert(keys::FOLLOW_ORIGINAL_HTTP_METHOD, false);
        values.insert(keys::MAX_REDIRECTS, Value::from(DEFAULT_MAX_REDIRECTS));
        values.insert(keys::REMOVE_REFERER_HEADER, false);
        values.insert(keys::GZIP, false);
        Self::from_map(values)
    }

    /// Wrap an existing mapping; tombstones in it are dropped
    #[must_use]
    pub fn from_map(values: OptionMap) -> Self {
        Self {
            values: Arc::new(merge_or_delete(&OptionMap::new(), values)),
        }
    }

    /// Derive a child chain from `overrides`
    ///
    /// Keys the overrides omit are inherited, [`OptionValue::Unset`] deletes
    /// an inherited key, nested mappings merge key by key and anything else
    /// replaces the inherited value.
    #[must_use]
    pub fn derive(&self, overrides: impl Into<RequestOptions>) -> Self {
        let merged = merge_or_delete(&self.values, overrides.into().into_map());
        tracing::debug!(keys = merged.len(), "derived default chain");
        Self {
            values: Arc::new(merged),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    #[must_use]
    pub fn as_map(&self) -> &OptionMap {
        &self.values
    }
}

impl Default for DefaultChain {
    fn default() -> Self {
        Self::base()
    }
}

/// Merge `updates` over `defaults` into a new mapping
///
/// Keys present only in `updates` pass through; a tombstone for a key the
/// defaults never had leaves nothing behind.
#[must_use]
pub fn merge_or_delete(defaults: &OptionMap, mut updates: OptionMap) -> OptionMap {
    let mut merged = OptionMap::new();

    for (key, inherited) in defaults.iter() {
        match (inherited, updates.remove(key)) {
            (_, None) => merged.insert(key, inherited.clone()),
            (_, Some(OptionValue::Unset)) => {}
            (OptionValue::Map(parent), Some(OptionValue::Map(child))) => {
                merged.insert(key, merge_or_delete(parent, child));
            }
            (OptionValue::Value(Value::Object(parent)), Some(OptionValue::Value(Value::Object(child)))) => {
                merged.insert(key, Value::Object(merge_json(parent, child)));
            }
            (_, Some(value)) => merged.insert(key, value),
        }
    }

    for (key, value) in updates {
        match value {
            OptionValue::Unset => {}
            OptionValue::Map(nested) => merged.insert(key, merge_or_delete(&OptionMap::new(), nested)),
            other => merged.insert(key, other),
        }
    }

    merged
}

fn merge_json(
    defaults: &serde_json::Map<String, Value>,
    mut updates: serde_json::Map<String, Value>,
) -> serde_json::Map<String, Value> {
    let mut merged = serde_json::Map::new();
    for (key, inherited) in defaults {
        let value = match (inherited, updates.remove(key)) {
            (_, None) => inherited.clone(),
            (Value::Object(parent), Some(Value::Object(child))) => {
                Value::Object(merge_json(parent, child))
            }
            (_, Some(value)) => value,
        };
        merged.insert(key.clone(), value);
    }
    merged.extend(updates);
    merged
}
