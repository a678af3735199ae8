//! Path prefix between catalog paths and playable file paths
//!
//! The catalog may store paths relative to a music root that only the server
//! knows about. The prefix is prepended before a path leaves the server and
//! stripped again before catalog lookups.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prefix(String);

impl Prefix {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join the prefix and a catalog path
    pub fn apply(&self, path: &str) -> String {
        if self.0.is_empty() {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.0.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Strip the prefix and the separator after it. Paths without the prefix
    /// are returned unchanged.
    pub fn remove(&self, path: &str) -> String {
        if self.0.is_empty() {
            return path.to_string();
        }
        match path.strip_prefix(self.0.as_str()) {
            Some(rest) if rest.len() > 1 && rest.starts_with('/') => rest[1..].to_string(),
            Some(rest) => rest.to_string(),
            None => path.to_string(),
        }
    }
}
