// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;

/// Ordered multimap of call metadata.
///
/// Names are case-insensitive and are stored lowercased. Entries keep their
/// insertion order and the same name can appear more than once.
///
/// # Examples
///
/// ```
/// use stashwire_types::Metadata;
///
/// let mut metadata = Metadata::new();
/// metadata.append("Cache", "default-cache");
/// metadata.append("x-trace", "a");
/// metadata.append("x-trace", "b");
///
/// assert_eq!(metadata.get("cache"), Some("default-cache"));
/// assert_eq!(metadata.get_all("x-trace").collect::<Vec<_>>(), ["a", "b"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(Cow<'static, str>, String)>,
}

impl Metadata {
    /// Creates an empty metadata map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, keeping any existing entries with the same name.
    pub fn append(&mut self, name: impl Into<Cow<'static, str>>, value: impl Into<String>) {
        self.entries.push((normalize(name.into()), value.into()));
    }

    /// Replaces all entries with the given name by a single entry.
    ///
    /// The new entry takes the position of the first replaced entry, or is
    /// appended when the name was not present.
    pub fn set(&mut self, name: impl Into<Cow<'static, str>>, value: impl Into<String>) {
        let name = normalize(name.into());
        let value = value.into();

        match self.entries.iter().position(|(n, _)| *n == name) {
            Some(index) => {
                self.entries[index].1 = value;
                let mut seen = 0_usize;
                self.entries.retain(|(n, _)| {
                    if *n != name {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Returns the first value stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).next()
    }

    /// Returns all values stored under `name` in insertion order.
    pub fn get_all<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a str> + use<'a, 'n> {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` when at least one entry is stored under `name`.
    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Removes all entries stored under `name` and returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        before - self.entries.len()
    }

    /// Iterates over all entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_ref(), v.as_str()))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N, V> FromIterator<(N, V)> for Metadata
where
    N: Into<Cow<'static, str>>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut metadata = Self::new();
        for (name, value) in iter {
            metadata.append(name, value);
        }
        metadata
    }
}

fn normalize(name: Cow<'static, str>) -> Cow<'static, str> {
    if name.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(name.to_ascii_lowercase())
    } else {
        name
    }
}
