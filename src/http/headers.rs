//! HTTP header map with case-insensitive name lookup.

/// A case-insensitive, order-preserving HTTP header list.
///
/// Credentials arrive here: the auth gate looks up `Authorization` and
/// `X-API-Key` regardless of how the client capitalized them.
///
/// # Examples
///
/// ```
/// use carprice::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("X-API-Key", "demo-key");
///
/// assert_eq!(headers.get("x-api-key"), Some("demo-key"));
/// assert_eq!(headers.first_of(&["api_key", "x-api-key"]), Some("demo-key"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header map with pre-allocated capacity for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// Appends a header entry. Multiple values for the same name are preserved.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Returns the first value for the given header name (case-insensitive), or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the value of the first name in `names` that is present.
    ///
    /// Used where a header has a canonical name and a legacy alias.
    pub fn first_of(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.get(name))
    }

    /// Returns `true` if the map contains at least one entry with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Returns the total number of header entries (not unique names).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no header entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_get() {
        let mut h = Headers::new();
        h.insert("Authorization", "Bearer abc");
        assert_eq!(h.get("authorization"), Some("Bearer abc"));
        assert_eq!(h.get("AUTHORIZATION"), Some("Bearer abc"));
    }

    #[test]
    fn first_of_prefers_earlier_names() {
        let mut h = Headers::new();
        h.insert("token", "legacy");
        h.insert("Authorization", "Bearer modern");
        assert_eq!(h.first_of(&["authorization", "token"]), Some("Bearer modern"));
        assert_eq!(h.first_of(&["x-missing", "token"]), Some("legacy"));
        assert_eq!(h.first_of(&["x-missing"]), None);
    }

    #[test]
    fn contains_and_len() {
        let mut h = Headers::new();
        assert!(h.is_empty());
        h.insert("Content-Type", "application/json");
        assert!(h.contains("content-type"));
        assert!(!h.contains("x-api-key"));
        assert_eq!(h.len(), 1);
    }
}
