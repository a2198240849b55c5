//! Ordered, case-insensitive key/value store.
//!
//! [`Headers`] keeps `(key, value)` pairs in insertion order and answers lookups by linear
//! scan. Requests carry a handful to a few dozen headers, so scanning a small vector beats
//! hashing and keeps allocation close to zero once the store has been reused a few times.
//!
//! The same store backs query parameters and route wildcards through the [`Params`] alias.

use std::fmt;

/// An ordered multi-map of case-insensitive string keys to string values.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

/// Query parameters and route wildcard bindings share the header store.
pub type Params = Headers;

impl Headers {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity) }
    }

    /// Appends a value, keeping any earlier values of the same key.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Replaces every value of `key` with `value`.
    ///
    /// The new pair takes the position of the first replaced pair, or goes last when the key
    /// was absent.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(index) => {
                self.entries[index].1 = value;
                let mut seen = 0usize;
                self.entries.retain(|(k, _)| {
                    if k.eq_ignore_ascii_case(&key) {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            None => self.entries.push((key, value)),
        }
    }

    /// Returns the first value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key).map(|index| self.entries[index].1.as_str())
    }

    /// Returns every value of `key` in insertion order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries.iter().filter(move |(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Removes every value of `key`, returning how many pairs were dropped.
    pub fn remove(&mut self, key: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops all pairs but keeps the allocated capacity.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops pairs added after the store held `len` pairs.
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k.eq_ignore_ascii_case(key))
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self { entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");

        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
        assert!(headers.contains("Content-type"));
        assert!(!headers.contains("content-length"));
    }

    #[test]
    fn keeps_insertion_order_and_all_values() {
        let mut headers = Headers::new();
        headers.add("accept", "text/html");
        headers.add("host", "example.com");
        headers.add("Accept", "application/json");

        assert_eq!(headers.get("accept"), Some("text/html"));
        assert_eq!(headers.get_all("accept").collect::<Vec<_>>(), vec!["text/html", "application/json"]);

        let keys = headers.iter().map(|(k, _)| k).collect::<Vec<_>>();
        assert_eq!(keys, vec!["accept", "host", "Accept"]);
    }

    #[test]
    fn set_replaces_every_value_in_place() {
        let mut headers = Headers::new();
        headers.add("a", "1");
        headers.add("b", "2");
        headers.add("A", "3");

        headers.set("a", "4");

        assert_eq!(headers.iter().collect::<Vec<_>>(), vec![("a", "4"), ("b", "2")]);

        headers.set("c", "5");
        assert_eq!(headers.get("c"), Some("5"));
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn remove_and_clear() {
        let mut headers: Headers = [("x", "1"), ("y", "2"), ("X", "3")].into_iter().collect();

        assert_eq!(headers.remove("x"), 2);
        assert_eq!(headers.len(), 1);

        headers.clear();
        assert!(headers.is_empty());
    }
}
