use compact_str::CompactString;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::borrow::Borrow;

type Map = litemap::LiteMap<CompactString, CompactString>;

/// Key-value labels attached to every record shipped to Loki.
///
/// Labels are kept sorted by key, so encoding the same set always yields the same output.
/// A label set handed to the shipper is never modified afterwards: per-record labels are
/// added to a clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Map,
}

impl LabelSet {
    /// Create an empty label set.
    pub fn new() -> Self {
        LabelSet {
            labels: Map::new_vec(),
        }
    }

    /// Add a label, replacing any previous value for the same key.
    pub fn with(mut self, key: impl Into<CompactString>, value: impl Into<CompactString>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a label, returning the previous value if the key was present.
    pub fn insert(
        &mut self,
        key: impl Into<CompactString>,
        value: impl Into<CompactString>,
    ) -> Option<CompactString> {
        self.labels.insert(key.into(), value.into())
    }

    /// Get the value of a label.
    pub fn get<Q>(&self, key: &Q) -> Option<&str>
    where
        CompactString: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.labels.get(key).map(CompactString::as_str)
    }

    /// Remove a label.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<CompactString>
    where
        CompactString: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.labels.remove(key)
    }

    /// Number of labels in the set.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the set has no labels.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterate over the labels in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render the set as a stream selector, e.g. `{app="api", env="prod"}`.
    pub fn to_selector(&self) -> CompactString {
        let mut out = CompactString::const_new("{");
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(key);
            out.push_str("=\"");
            push_escaped(&mut out, value);
            out.push('"');
        }
        out.push('}');
        out
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        LabelSet::new()
    }
}

impl<K, V> FromIterator<(K, V)> for LabelSet
where
    K: Into<CompactString>,
    V: Into<CompactString>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut labels = LabelSet::new();
        labels.extend(iter);
        labels
    }
}

impl<K, V> Extend<(K, V)> for LabelSet
where
    K: Into<CompactString>,
    V: Into<CompactString>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl Serialize for LabelSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

fn push_escaped(out: &mut CompactString, value: &str) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
}
