//! Request header collection with add/set semantics.

/// Insertion-ordered header collection.
///
/// `add` appends: a second add under the same name turns the value into a
/// list. `set` replaces outright, discarding every earlier value for the
/// name. List values materialize as a single `"; "`-joined string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderBag {
    entries: Vec<(String, Vec<String>)>,
}

impl HeaderBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` under `name`, preserving any earlier values.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// Replaces every value under `name` with `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => *values = vec![value],
            None => self.entries.push((name, vec![value])),
        }
    }

    /// Replaces the whole collection.
    pub fn replace_all<I, K, V>(&mut self, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.entries = headers
            .into_iter()
            .map(|(name, value)| (name.into(), vec![value.into()]))
            .collect();
    }

    /// Snapshot with list values flattened into `"; "`-joined strings.
    pub fn flattened(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(name, values)| (name.clone(), values.join("; ")))
            .collect()
    }

    /// Raw `Name: value` lines ready for the engine header list.
    pub fn to_header_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(name, values)| format!("{}: {}", name, values.join("; ")))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
