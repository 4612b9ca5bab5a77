use super::types::Value;
use indexmap::IndexMap;
use std::fmt;
use std::ops::Deref;

/// Ordered mapping from field name to [`Value`].
///
/// Insertion order is significant: it is the serialization order, and
/// overwriting an existing key keeps that key's position.
#[derive(Debug, Clone, Default)]
pub struct Document {
    fields: IndexMap<String, Value>,
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields.get_mut(key)
    }

    /// Sets `key` to `value`, returning the previous value.
    /// Existing keys keep their position; new keys are appended.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Removes `key`, shifting later fields down so their relative order is kept.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    /// Inserts `key` at the front of the document, replacing any existing entry.
    pub fn set_first(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        self.fields.shift_remove(&key);
        self.fields.shift_insert(0, key, value.into());
    }

    /// Name of the first field; for a command document this is the command name.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        self.fields.keys().next().map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.fields.iter().zip(other.fields.iter()).all(|(a, b)| a.0 == b.0 && a.1 == b.1)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut d = Self::new();
        for (k, v) in iter {
            d.set(k, v);
        }
        d
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("{}");
        }
        f.write_str("{ ")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        f.write_str(" }")
    }
}

/// Ordered, 0-indexed sequence of values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Array(Vec<Value>);

impl Array {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.0.get_mut(index)
    }

    pub fn append(&mut self, value: impl Into<Value>) {
        self.0.push(value.into());
    }

    /// Replaces the element at `index`. Returns `false` when out of range.
    pub fn set(&mut self, index: usize, value: impl Into<Value>) -> bool {
        match self.0.get_mut(index) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    /// Pads with nulls until `len` elements exist.
    pub fn pad_to(&mut self, len: usize) {
        while self.0.len() < len {
            self.0.push(Value::Null);
        }
    }

    pub fn pop_front(&mut self) -> Option<Value> {
        if self.0.is_empty() { None } else { Some(self.0.remove(0)) }
    }

    pub fn pop_back(&mut self) -> Option<Value> {
        self.0.pop()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }
}

impl Deref for Array {
    type Target = [Value];

    fn deref(&self) -> &[Value] {
        &self.0
    }
}

impl From<Vec<Value>> for Array {
    fn from(v: Vec<Value>) -> Self {
        Self(v)
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Array {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Array {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
