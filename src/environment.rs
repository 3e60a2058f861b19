use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

/// Immutable key/value snapshot every lookup of a binding call reads from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the live process environment.
    ///
    /// Entries whose key or value is not valid unicode are skipped.
    pub fn from_process() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    /// Build a snapshot from `KEY=value` entries, as produced by `env` or `std::env::vars`.
    ///
    /// Entries without `=` are dropped. A key may start with `=` (Windows keeps
    /// per-drive working directories that way); the split happens at the next `=`.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vars = HashMap::new();
        for entry in entries {
            let entry = entry.as_ref();
            let (leading, rest) = match entry.strip_prefix('=') {
                Some(rest) => ("=", rest),
                None => ("", entry),
            };
            if let Some((key, value)) = rest.split_once('=') {
                vars.insert(format!("{}{}", leading, key), value.to_string());
            }
        }
        Self { vars }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Keys starting with `prefix`, sorted so collection inference is deterministic
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .vars
            .keys()
            .filter(|k| k.starts_with(prefix))
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        keys
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<HashMap<String, String>> for Environment {
    fn from(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }
}

/// Mutates the live environment on behalf of the `unset` option
pub trait Unset {
    fn unset(&mut self, key: &str);
}

/// Removes variables from the current process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Unset for ProcessEnv {
    fn unset(&mut self, key: &str) {
        std::env::remove_var(key);
    }
}

/// Records requested removals instead of performing them.
///
/// Clones share the same record, so a handle kept by the caller sees every
/// removal made through the copy handed to [`crate::Options::unsetter`].
#[derive(Debug, Clone, Default)]
pub struct RecordingUnset {
    keys: Arc<Mutex<Vec<String>>>,
}

impl RecordingUnset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys removed so far, in request order
    pub fn keys(&self) -> Vec<String> {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Unset for RecordingUnset {
    fn unset(&mut self, key: &str) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key.to_string());
    }
}
