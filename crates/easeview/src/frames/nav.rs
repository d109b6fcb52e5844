//! Location-fragment navigation queries.
//!
//! The viewer encodes navigation state in the location fragment as
//! `key1=val1?key2=val2?key2=val3`: `?`-separated pairs, repeated keys
//! accumulating into a sequence, a bare key standing for a value-less flag.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Value(s) recorded for one navigation key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// Key present without `=`.
    Missing,
    One(String),
    Many(Vec<String>),
}

/// Query parsed from the location fragment. Ephemeral; recomputed on every
/// navigation event.
#[derive(Debug, Clone, Default)]
pub struct NavigationQuery {
    entries: HashMap<String, QueryValue>,
}

impl NavigationQuery {
    pub fn parse(fragment: &str) -> Self {
        let mut entries = HashMap::new();
        for pair in fragment.split('?') {
            if pair.is_empty() {
                continue;
            }
            let Some((key, raw)) = pair.split_once('=') else {
                entries
                    .entry(pair.to_string())
                    .or_insert(QueryValue::Missing);
                continue;
            };
            let value = match urlencoding::decode(raw) {
                Ok(decoded) => decoded.into_owned(),
                Err(_) => raw.to_string(),
            };
            match entries.entry(key.to_string()) {
                Entry::Vacant(entry) => {
                    entry.insert(QueryValue::One(value));
                }
                Entry::Occupied(mut entry) => {
                    let slot = entry.get_mut();
                    match slot {
                        QueryValue::Missing => *slot = QueryValue::One(value),
                        QueryValue::One(first) => {
                            let first = std::mem::take(first);
                            *slot = QueryValue::Many(vec![first, value]);
                        }
                        QueryValue::Many(values) => values.push(value),
                    }
                }
            }
        }
        Self { entries }
    }

    /// True if the key appears in the fragment, with or without a value.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.entries.get(key)
    }

    /// First value recorded for a key; `None` for absent or value-less keys.
    pub fn first(&self, key: &str) -> Option<&str> {
        match self.entries.get(key)? {
            QueryValue::Missing => None,
            QueryValue::One(value) => Some(value),
            QueryValue::Many(values) => values.first().map(String::as_str),
        }
    }

    /// All values recorded for a key, in fragment order.
    pub fn all(&self, key: &str) -> Vec<&str> {
        match self.entries.get(key) {
            None | Some(QueryValue::Missing) => Vec::new(),
            Some(QueryValue::One(value)) => vec![value.as_str()],
            Some(QueryValue::Many(values)) => values.iter().map(String::as_str).collect(),
        }
    }
}
