use std::fmt;
use std::sync::Arc;

use serde_json::{Number, Value};

/// The logical key of a cached computation.
///
/// A key is the compact JSON serialization of its components after every scalar has been coerced
/// into a string. Coercion is type-blind on purpose: the number `2` and the string `"2"` yield the
/// same component, and keys written by earlier deployments stay addressable.
///
/// The logical key is combined with the current [`CacheBuster`](super::CacheBuster) to form the
/// fully-qualified key under which the result is memoized and persisted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    key: Arc<str>,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.key
    }
}

impl CacheKey {
    /// Creates a [`CacheKey`] from an arbitrarily nested structure.
    pub fn from_items(items: &Value) -> Self {
        Self {
            key: coerce(items).to_string().into(),
        }
    }

    /// Creates a [`CacheKey`] for a field computation.
    ///
    /// The `(parent_type, field_name)` pair comes first so that two fields keyed by the same
    /// arguments never collide.
    pub fn for_field(parent_type: &str, field_name: &str, items: &Value) -> Self {
        CacheKeyBuilder::namespace(parent_type, field_name)
            .push(items.clone())
            .build()
    }

    /// Wraps a key string that was already built, for example one read back from a store.
    pub fn from_raw(key: impl Into<Arc<str>>) -> Self {
        Self { key: key.into() }
    }

    /// Returns the serialized key.
    pub fn as_str(&self) -> &str {
        &self.key
    }
}

/// A builder for [`CacheKey`]s.
///
/// Components are collected in order and the finished key is the same one
/// [`CacheKey::from_items`] produces for the array of all components.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyBuilder {
    components: Vec<Value>,
}

impl CacheKeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a key namespaced by the owning type and field name.
    pub fn namespace(parent_type: &str, field_name: &str) -> Self {
        Self {
            components: vec![Value::Array(vec![
                Value::from(parent_type),
                Value::from(field_name),
            ])],
        }
    }

    /// Appends a component to the key.
    pub fn push(mut self, item: impl Into<Value>) -> Self {
        self.components.push(item.into());
        self
    }

    /// Finalize the [`CacheKey`].
    pub fn build(self) -> CacheKey {
        CacheKey::from_items(&Value::Array(self.components))
    }
}

/// Mirrors the shape of `value` with every leaf turned into a string.
fn coerce(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(coerce).collect()),
        Value::String(s) => Value::String(s.clone()),
        Value::Null => Value::from("null"),
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Number(n) => Value::String(number_to_string(n)),
        // `Map` keeps its keys sorted, so equal objects print identically.
        Value::Object(_) => Value::String(value.to_string()),
    }
}

fn number_to_string(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) => float_to_string(f),
        None => n.to_string(),
    }
}

/// Formats a float the way `Number.prototype.toString` does.
///
/// Takes the shortest round-trip digits and places the decimal point like JavaScript: plain
/// notation for decimal exponents from -6 to 20, `d.ddde±x` otherwise.
fn float_to_string(f: f64) -> String {
    if f == 0.0 {
        return "0".to_owned();
    }
    if f < 0.0 {
        return format!("-{}", float_to_string(-f));
    }

    // `{:e}` yields the shortest digits, e.g. `1.2345e-7`
    let scientific = format!("{f:e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific;
    };
    let digits = mantissa.replace('.', "");
    let len = digits.len() as i32;
    let point = exponent + 1;

    if len <= point && point <= 21 {
        format!("{digits}{}", "0".repeat((point - len) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{int}.{frac}")
    } else if -6 < point && point <= 0 {
        format!("0.{}{digits}", "0".repeat(-point as usize))
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        let (first, rest) = digits.split_at(1);
        let abs = exponent.unsigned_abs();
        if rest.is_empty() {
            format!("{first}e{sign}{abs}")
        } else {
            format!("{first}.{rest}e{sign}{abs}")
        }
    }
}
