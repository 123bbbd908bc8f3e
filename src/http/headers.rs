use std::collections::BTreeMap;

/// Header map for relayed messages.
///
/// Names keep the spelling they arrived with. Duplicate names collapse to the
/// last value seen. Iteration (and therefore serialization) follows key order,
/// which is deterministic but not the order the peer sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: BTreeMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a header, trying the exact name first and then a
    /// case-insensitive match.
    pub fn get(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.inner.get(name) {
            return Some(value.as_str());
        }
        self.inner
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Inserts as received off the wire: exact name, last write wins.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.insert(name.into(), value.into());
    }

    /// Replaces the value of an existing header (matched case-insensitively,
    /// stored spelling kept) or adds a new one.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.existing_key(name) {
            Some(key) => {
                self.inner.insert(key, value);
            }
            None => {
                self.inner.insert(name.to_string(), value);
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let key = self.existing_key(name)?;
        self.inner.remove(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn existing_key(&self, name: &str) -> Option<String> {
        if self.inner.contains_key(name) {
            return Some(name.to_string());
        }
        self.inner
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Writes `name: value\r\n` for every header.
    pub(crate) fn write_to(&self, buf: &mut Vec<u8>) {
        for (key, value) in &self.inner {
            buf.extend_from_slice(key.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_falls_back_to_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("content-length", "5");

        assert_eq!(headers.get("Content-Length"), Some("5"));
        assert_eq!(headers.get("content-length"), Some("5"));
    }

    #[test]
    fn set_keeps_stored_spelling() {
        let mut headers = Headers::new();
        headers.insert("host", "client.example");
        headers.set("Host", "api.internal");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.iter().next(), Some(("host", "api.internal")));
    }

    #[test]
    fn insert_is_last_write_wins() {
        let mut headers = Headers::new();
        headers.insert("Accept", "text/plain");
        headers.insert("Accept", "*/*");

        assert_eq!(headers.get("Accept"), Some("*/*"));
        assert_eq!(headers.len(), 1);
    }
}
