//! Growing lists and maps of structs from the keys present in the environment.
//!
//! A list field with prefix `JOBS_` is sized by probing `JOBS_0_`, `JOBS_1_`,
//! ... until an index has no variable. A map field with prefix `DB_` learns its
//! keys by stripping every leaf key known to the element type from the end of
//! each `DB_*` variable: `DB_primary_HOST` yields the map key `primary`.

use crate::{
    error::{AggregateError, Error},
    field::{map_part_decoder, Field, Shape},
    tag::{split_key, Site, TagNames},
    walk::Context,
};
use std::collections::{BTreeMap, BTreeSet};

/// Leaf keys reachable inside a struct type, relative to the struct's own prefix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownKeys {
    /// Suffix to whether it is a nested map (matched anywhere, not only at the end)
    suffixes: BTreeMap<String, bool>,
}

impl KnownKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, suffix: impl Into<String>, nested_map: bool) {
        self.suffixes.insert(suffix.into(), nested_map);
    }

    pub fn len(&self) -> usize {
        self.suffixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }

    pub fn contains(&self, suffix: &str) -> bool {
        self.suffixes.contains_key(suffix)
    }

    /// Exact suffixes first, then nested maps, each alphabetical
    fn ordered(&self) -> impl Iterator<Item = (&str, bool)> {
        let simple = self.suffixes.iter().filter(|(_, nested)| !**nested);
        let nested = self.suffixes.iter().filter(|(_, nested)| **nested);
        simple.chain(nested).map(|(k, v)| (k.as_str(), *v))
    }

    /// Map key carried by `rest` (an environment key with the map prefix removed).
    ///
    /// Of every suffix that matches, the one leaving the shortest non-empty key
    /// wins. `Err` holds `rest` when it is exactly a known leaf key. Keys keep
    /// their case: `URL_STR` yields `URL`, `url_STR` yields `url`.
    pub fn infer_map_key<'r>(&self, rest: &'r str) -> Result<Option<&'r str>, &'r str> {
        let mut best: Option<&'r str> = None;
        for (suffix, nested_map) in self.ordered() {
            let candidate = if nested_map {
                rest.rfind(&format!("_{}", suffix)).map(|at| &rest[..at])
            } else {
                if rest == suffix {
                    return Err(rest);
                }
                rest.strip_suffix(suffix)
                    .and_then(|head| head.strip_suffix('_'))
            };
            if let Some(key) = candidate.filter(|key| !key.is_empty()) {
                if best.map_or(true, |b| key.len() < b.len()) {
                    best = Some(key);
                }
            }
        }
        Ok(best)
    }
}

/// Record the leaf key of one struct field (and everything under it) into `keys`.
///
/// Called by the derived [`Field::known_keys`] for each field not marked `skip`.
pub fn collect_known_keys<F: Field>(site: &Site, prefix: &str, tags: &TagNames, keys: &mut KnownKeys) {
    let prefix = format!("{}{}", prefix, site.tag(&tags.prefix).unwrap_or_default());
    let (own_key, _) = split_key(site.tag(&tags.key).unwrap_or_default());
    if own_key == "-" {
        return;
    }

    let nested_map = matches!(F::SHAPE, Shape::StructMap);
    let key = format!("{}{}", prefix, own_key);
    if !own_key.is_empty() || (nested_map && !key.is_empty()) {
        keys.insert(key, nested_map);
    }

    F::known_keys(&prefix, tags, keys);
}

fn with_separator(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('_') {
        prefix.to_string()
    } else {
        format!("{}_", prefix)
    }
}

/// Grow and walk a list of structs from `<prefix><index>_*` variables.
///
/// Existing elements are kept and walked again; the list grows to the number
/// of consecutive indices present, starting at zero.
pub(crate) fn expand_list<T: Field>(
    list: &mut Vec<T>,
    cx: &mut Context<'_>,
) -> Result<(), AggregateError> {
    let prefix = with_separator(cx.prefix());
    let keys = cx.scope().environment.keys_with_prefix(&prefix);
    if keys.is_empty() {
        return Ok(());
    }

    let mut count = 0;
    loop {
        let index_prefix = format!("{}{}_", prefix, count);
        if !keys.iter().any(|k| k.starts_with(&index_prefix)) {
            break;
        }
        count += 1;
    }

    let len = count.max(list.len());
    tracing::debug!(prefix = %prefix, inferred = count, len, "expanding list");

    let mut errors = AggregateError::new();
    for index in 0..len {
        if index == list.len() {
            match T::zero() {
                Some(zero) => list.push(zero),
                None => break,
            }
        }
        if let Some(inner) = list[index].walker() {
            let mut element = cx.at_prefix(format!("{}{}_", prefix, index));
            if let Err(e) = inner.walk(&mut element) {
                errors.merge(e);
            }
        }
    }
    errors.into_result()
}

/// Discover map keys from `<prefix><key>_<leaf>` variables, then walk and
/// insert one element per key.
pub(crate) fn expand_map<K, V, I>(
    site: &Site,
    cx: &mut Context<'_>,
    mut insert: I,
) -> Result<(), AggregateError>
where
    K: Field,
    V: Field,
    I: FnMut(K, V),
{
    let prefix = with_separator(cx.prefix());
    let scope = cx.scope();
    let keys = scope.environment.keys_with_prefix(&prefix);
    if keys.is_empty() {
        return Ok(());
    }

    let mut known = KnownKeys::new();
    V::known_keys("", &scope.tags, &mut known);

    let mut map_keys = BTreeSet::new();
    for env_key in keys {
        let rest = &env_key[prefix.len()..];
        match known.infer_map_key(rest) {
            Ok(Some(map_key)) => {
                map_keys.insert(map_key.to_string());
            }
            Ok(None) => {}
            Err(malformed) => {
                return Err(Error::MalformedMapEntry {
                    field: site.name.to_string(),
                    key: malformed.to_string(),
                }
                .into())
            }
        }
    }

    let key_decoder =
        map_part_decoder::<K>(&scope.parsers).ok_or_else(|| Error::no_parser(site.name, site.ty))?;
    tracing::debug!(prefix = %prefix, keys = ?map_keys, "expanding map");

    let mut errors = AggregateError::new();
    for map_key in map_keys {
        let Some(mut value) = V::zero() else {
            errors.push(Error::no_parser(site.name, site.ty));
            break;
        };
        value.init();

        if let Some(inner) = value.walker() {
            let mut element = cx.at_prefix(format!("{}{}_", prefix, map_key));
            if let Err(e) = inner.walk(&mut element) {
                errors.merge(e);
            }
        }

        match key_decoder(&map_key) {
            Ok(key) => insert(key, value),
            Err(e) => errors.push(Error::parse(
                site.name,
                site.ty,
                format!("failed to parse map key {:?}: {}", map_key, e),
            )),
        }
    }
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(entries: &[(&str, bool)]) -> KnownKeys {
        let mut keys = KnownKeys::new();
        for (suffix, nested) in entries {
            keys.insert(*suffix, *nested);
        }
        keys
    }

    #[test]
    fn test_infer_simple_suffix() {
        let keys = known(&[("STR", false)]);
        assert_eq!(keys.infer_map_key("url_STR"), Ok(Some("url")));
        assert_eq!(keys.infer_map_key("A_B_STR"), Ok(Some("A_B")));
        assert_eq!(keys.infer_map_key("OTHER"), Ok(None));
        assert_eq!(keys.infer_map_key("XSTR"), Ok(None));
    }

    #[test]
    fn test_infer_exact_suffix_is_malformed() {
        let keys = known(&[("STR", false)]);
        assert_eq!(keys.infer_map_key("STR"), Err("STR"));
    }

    #[test]
    fn test_infer_picks_shortest_key() {
        let keys = known(&[("STR", false), ("NEW_STR", false)]);
        assert_eq!(keys.infer_map_key("KEY_NEW_STR"), Ok(Some("KEY")));
        assert_eq!(keys.infer_map_key("KEY_STR"), Ok(Some("KEY")));
    }

    #[test]
    fn test_infer_nested_map_uses_last_occurrence() {
        let keys = known(&[("NAME", false), ("SUB_", true)]);
        assert_eq!(keys.infer_map_key("outer_SUB_inner_NAME"), Ok(Some("outer")));
        assert_eq!(keys.infer_map_key("outer_NAME"), Ok(Some("outer")));
    }

    #[test]
    fn test_with_separator() {
        assert_eq!(with_separator(""), "");
        assert_eq!(with_separator("JOBS"), "JOBS_");
        assert_eq!(with_separator("JOBS_"), "JOBS_");
    }

    #[test]
    fn test_ordered_puts_simple_first() {
        let keys = known(&[("B", true), ("C", false), ("A", false)]);
        let order: Vec<_> = keys.ordered().collect();
        assert_eq!(order, vec![("A", false), ("C", false), ("B", true)]);
    }
}
