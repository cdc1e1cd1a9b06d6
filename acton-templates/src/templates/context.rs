//! Key-value context handed to templates.
//!
//! [`Context`] is the structured mapping every render works with. Handlers,
//! processors, and the renderer all exchange it, so the "is this a mapping"
//! question only comes up where a dynamic value enters the crate: converting
//! a [`serde_json::Value`] or an arbitrary `Serialize` type.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Key-value mapping used as template context.
///
/// Keys are substitution variables referenced inside a template.
///
/// # Example
///
/// ```rust
/// use acton_templates::templates::Context;
///
/// let ctx = Context::new().with("head", "Hello").with("count", 3);
/// assert_eq!(ctx.get("head").and_then(|v| v.as_str()), Some("Hello"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Context(Map<String, Value>);

impl Context {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContext`] when `value` does not serialize to a
    /// mapping with string keys. The message names the Rust type.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        match serde_json::to_value(value) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            _ => Err(Error::InvalidContext {
                type_name: std::any::type_name::<T>().to_string(),
            }),
        }
    }

    /// Add a key-value pair.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a key-value pair, returning the previous value for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Look up a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Check whether `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Merge `other` into this context; keys from `other` overwrite existing ones.
    pub fn merge(&mut self, other: Context) {
        self.0.extend(other.0);
    }

    /// Return a new context with `overrides` layered on top of `self`.
    #[must_use]
    pub fn merged_with(&self, overrides: &Context) -> Context {
        let mut merged = self.clone();
        merged
            .0
            .extend(overrides.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the context has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Borrow the underlying JSON map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Take the underlying JSON map.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Context {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Context {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::InvalidContext {
                type_name: json_kind(&other).to_string(),
            }),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Context
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<'a> IntoIterator for &'a Context {
    type Item = (&'a String, &'a Value);
    type IntoIter = serde_json::map::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Name of the JSON kind of a value, used in context errors.
fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Conversion of a handler's return value into a [`Context`].
///
/// Implemented for the structured [`Context`], raw JSON maps, JSON values
/// (which must be objects), and `Result`s of any of those.
pub trait IntoContext {
    /// Perform the conversion.
    fn into_context(self) -> Result<Context>;
}

impl IntoContext for Context {
    fn into_context(self) -> Result<Context> {
        Ok(self)
    }
}

impl IntoContext for Map<String, Value> {
    fn into_context(self) -> Result<Context> {
        Ok(Context(self))
    }
}

impl IntoContext for Value {
    fn into_context(self) -> Result<Context> {
        Context::try_from(self)
    }
}

impl<T, E> IntoContext for std::result::Result<T, E>
where
    T: IntoContext,
    E: Into<Error>,
{
    fn into_context(self) -> Result<Context> {
        self.map_err(Into::into)?.into_context()
    }
}

/// Request-scoped context accumulated by context processors.
///
/// Stored in the request extensions for the lifetime of one request and
/// merged underneath the handler's own context at render time.
#[derive(Debug, Clone, Default)]
pub struct RequestContext(pub Context);

impl RequestContext {
    /// Borrow the accumulated context.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.0
    }
}
