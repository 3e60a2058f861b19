//! Turning a field's binding parameters into its final string value.

use crate::{
    environment::Environment,
    error::Error,
    tag::FieldParams,
    walk::Context,
};
use std::{collections::HashMap, fs, sync::Arc};

/// Reference lookups allowed while expanding one template
const MAX_EXPANSIONS: usize = 1024;

struct Lookup<'v> {
    value: &'v str,
    present: bool,
    is_default: bool,
}

fn lookup<'v>(key: &str, default: Option<&'v str>, env: &'v Environment) -> Lookup<'v> {
    let found = env.get(key);
    match (found, default) {
        (found, Some(default)) if key.is_empty() || found.map_or(true, str::is_empty) => Lookup {
            value: default,
            present: true,
            is_default: true,
        },
        (Some(value), _) => Lookup {
            value,
            present: true,
            is_default: false,
        },
        (None, _) => Lookup {
            value: "",
            present: false,
            is_default: false,
        },
    }
}

/// Expand `$NAME` and `${NAME}` in `template`.
///
/// Names resolve to a value already bound in this call when it is non-empty,
/// otherwise to the environment snapshot. Substituted text is expanded again,
/// and unknown names become the empty string. A name referenced from inside
/// its own expansion also becomes the empty string.
pub(crate) fn expand(template: &str, resolved: &HashMap<String, String>, env: &Environment) -> String {
    Expander {
        resolved,
        env,
        chain: Vec::new(),
        budget: MAX_EXPANSIONS,
    }
    .expand(template)
}

struct Expander<'e> {
    resolved: &'e HashMap<String, String>,
    env: &'e Environment,
    /// Names whose values are being expanded, outermost first
    chain: Vec<String>,
    budget: usize,
}

impl<'e> Expander<'e> {
    fn expand(&mut self, template: &str) -> String {
        shellexpand::env_with_context_no_errors(template, |name: &str| Some(self.reference(name)))
            .into_owned()
    }

    fn reference(&mut self, name: &str) -> String {
        if self.budget == 0 || self.chain.iter().any(|n| n == name) {
            return String::new();
        }
        self.budget -= 1;

        let (resolved, env) = (self.resolved, self.env);
        let raw = resolved
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .or_else(|| env.get(name))
            .unwrap_or_default();

        self.chain.push(name.to_string());
        let value = self.expand(raw);
        self.chain.pop();
        value
    }
}

/// Resolve the value for one field.
///
/// Steps run in a fixed order: lookup with default, expansion, recording for
/// later expansions, queuing `unset`, the `required` and `notEmpty` checks,
/// file loading, then the `on_set` hook.
pub(crate) fn resolve(params: &FieldParams, cx: &mut Context<'_>) -> Result<String, Error> {
    let scope = cx.scope();
    let found = lookup(&params.key, params.default_value.as_deref(), &scope.environment);

    let mut value = if params.expand {
        expand(found.value, &cx.state.resolved, &scope.environment)
    } else {
        found.value.to_string()
    };

    cx.state
        .resolved
        .insert(params.own_key.clone(), value.clone());

    if params.unset {
        cx.state.pending_unset.push(params.key.clone());
    }

    if params.required && !found.present && !params.own_key.is_empty() {
        return Err(Error::VarNotSet {
            key: params.key.clone(),
        });
    }

    if params.not_empty && value.is_empty() {
        return Err(Error::EmptyVar {
            key: params.key.clone(),
        });
    }

    if params.load_file && !value.is_empty() {
        value = fs::read_to_string(&value).map_err(|e| Error::LoadFileContent {
            path: value.clone(),
            key: params.key.clone(),
            source: Arc::new(e),
        })?;
    }

    if !params.own_key.is_empty() {
        if let Some(on_set) = cx.state.on_set.as_mut() {
            on_set(&params.key, &value, found.is_default);
        }
    }

    tracing::trace!(key = %params.key, is_default = found.is_default, "resolved field");
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_lookup_precedence() {
        let env = env(&[("SET", "value"), ("EMPTY", "")]);

        let set = lookup("SET", Some("fallback"), &env);
        assert_eq!(set.value, "value");
        assert!(set.present && !set.is_default);

        let empty = lookup("EMPTY", Some("fallback"), &env);
        assert_eq!(empty.value, "fallback");
        assert!(empty.is_default);

        let empty_no_default = lookup("EMPTY", None, &env);
        assert_eq!(empty_no_default.value, "");
        assert!(empty_no_default.present);

        let missing = lookup("MISSING", None, &env);
        assert!(!missing.present && !missing.is_default);

        let missing_default = lookup("MISSING", Some("d"), &env);
        assert_eq!(missing_default.value, "d");
        assert!(missing_default.present && missing_default.is_default);

        let no_key = lookup("", Some("d"), &env);
        assert!(no_key.is_default);
    }

    #[test]
    fn test_expand_is_transitive() {
        let env = env(&[("A", "$B"), ("B", "${C}"), ("C", "ok")]);
        let resolved = HashMap::new();

        assert_eq!(expand("$A", &resolved, &env), "ok");
        assert_eq!(expand("x-${A}-y", &resolved, &env), "x-ok-y");
    }

    #[test]
    fn test_expand_prefers_resolved_values() {
        let env = env(&[("HOST", "env-host")]);
        let mut resolved = HashMap::new();
        resolved.insert("HOST".to_string(), "bound-host".to_string());
        resolved.insert("PORT".to_string(), String::new());

        assert_eq!(expand("$HOST:$PORT", &resolved, &env), "bound-host:");
    }

    #[test]
    fn test_expand_unknown_is_empty() {
        let resolved = HashMap::new();
        assert_eq!(expand("a${NOPE}b", &resolved, &Environment::new()), "ab");
    }

    #[test]
    fn test_expand_cycles_become_empty() {
        let env = env(&[
            ("LOOP", "$LOOP"),
            ("L", "$L$L"),
            ("A", "a$B"),
            ("B", "b$A"),
        ]);
        let resolved = HashMap::new();

        assert_eq!(expand("$LOOP", &resolved, &env), "");
        assert_eq!(expand("$L$L", &resolved, &env), "");
        assert_eq!(expand("$A", &resolved, &env), "ab");
    }

    #[test]
    fn test_expand_repeated_sibling_references() {
        let env = env(&[("B", "x"), ("A", "$B-$B")]);
        let resolved = HashMap::new();

        assert_eq!(expand("$A/$A", &resolved, &env), "x-x/x-x");
    }

    #[test]
    fn test_expand_fan_out_is_bounded() {
        let env: Environment = (0..40)
            .map(|i| (format!("V{}", i), format!("${{V{}}}${{V{}}}", i + 1, i + 1)))
            .collect();
        let resolved = HashMap::new();

        assert_eq!(expand("$V0", &resolved, &env), "");
    }
}
