//! Depth-first traversal of a bindable struct.

use crate::{
    environment::{Environment, Unset},
    error::{AggregateError, Error},
    field::{Field, Shape},
    parsers::Parsers,
    resolve,
    tag::{parse_field_params, FieldParams, ParseFlags, Site, TagNames},
};
use std::collections::HashMap;

/// Hook invoked once per resolved field with `(key, value, is_default)`
pub type OnSet = Box<dyn FnMut(&str, &str, bool)>;

/// Entry point the derive implements for every `#[derive(Env)]` struct
pub trait Walk {
    /// Visit every bindable field in declaration order, collecting failures
    fn walk(&mut self, cx: &mut Context<'_>) -> Result<(), AggregateError>;
}

/// Read-only inputs shared by every level of one binding call
pub(crate) struct Scope {
    pub environment: Environment,
    pub parsers: Parsers,
    pub tags: TagNames,
    pub flags: ParseFlags,
    /// Keep non-zero values already in the struct
    pub zero_values_only: bool,
}

/// Mutable, call-scoped state threaded through the recursion
pub(crate) struct State {
    /// Values resolved so far, keyed by own key, for `expand` lookups
    pub resolved: HashMap<String, String>,
    pub on_set: Option<OnSet>,
    pub unsetter: Box<dyn Unset>,
    pub pending_unset: Vec<String>,
    /// Set when only collecting field parameters; nothing is resolved
    pub collected: Option<Vec<FieldParams>>,
}

impl State {
    pub fn new(on_set: Option<OnSet>, unsetter: Box<dyn Unset>) -> Self {
        Self {
            resolved: HashMap::new(),
            on_set,
            unsetter,
            pending_unset: Vec::new(),
            collected: None,
        }
    }

    fn flush_unset(&mut self) {
        for key in self.pending_unset.drain(..) {
            self.unsetter.unset(&key);
        }
    }
}

/// Resolution context at one level of the walk
pub struct Context<'a> {
    scope: &'a Scope,
    pub(crate) state: &'a mut State,
    prefix: String,
}

impl<'a> Context<'a> {
    pub(crate) fn new(scope: &'a Scope, state: &'a mut State, prefix: String) -> Self {
        Self {
            scope,
            state,
            prefix,
        }
    }

    /// Key prefix applied to every field at this level
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub(crate) fn scope(&self) -> &'a Scope {
        self.scope
    }

    /// Child context with `extra` appended to the prefix
    pub(crate) fn nested(&mut self, extra: &str) -> Context<'_> {
        let prefix = format!("{}{}", self.prefix, extra);
        self.at_prefix(prefix)
    }

    /// Child context with an absolute prefix
    pub(crate) fn at_prefix(&mut self, prefix: String) -> Context<'_> {
        Context {
            scope: self.scope,
            state: &mut *self.state,
            prefix,
        }
    }
}

/// Bind one field. Called by the derived [`Walk`] impl for every field not
/// marked `skip`; failures are pushed to `errors` and never stop siblings.
pub fn visit<F: Field>(slot: &mut F, site: &Site, cx: &mut Context<'_>, errors: &mut AggregateError) {
    let scope = cx.scope();
    let nested_prefix = site.tag(&scope.tags.prefix).unwrap_or_default();

    if matches!(F::SHAPE, Shape::OptionalStruct) || site.flatten {
        if let Some(inner) = slot.walker() {
            if let Err(e) = inner.walk(&mut cx.nested(nested_prefix)) {
                errors.merge(e);
            }
            return;
        }
    }

    let params = match parse_field_params(site, &scope.tags, cx.prefix(), scope.flags) {
        Ok(params) => params,
        Err(e) => {
            errors.push(e);
            return;
        }
    };
    if params.ignored {
        return;
    }

    if let Err(e) = process(slot, site, &params, cx) {
        errors.push(e);
        return;
    }

    if params.init {
        slot.init();
    }

    if let Some(inner) = slot.walker() {
        if let Err(e) = inner.walk(&mut cx.nested(nested_prefix)) {
            errors.merge(e);
        }
        return;
    }

    if matches!(F::SHAPE, Shape::StructList | Shape::StructMap) {
        if let Err(e) = slot.expand(site, &mut cx.nested(nested_prefix)) {
            errors.merge(e);
        }
    }
}

fn process<F: Field>(
    slot: &mut F,
    site: &Site,
    params: &FieldParams,
    cx: &mut Context<'_>,
) -> Result<(), Error> {
    let result = match cx.state.collected.as_mut() {
        Some(collected) => {
            if !params.own_key.is_empty() {
                collected.push(params.clone());
            }
            Ok(())
        }
        None => resolve::resolve(params, cx).and_then(|value| {
            let keep = cx.scope().zero_values_only && !slot.is_zero();
            if !value.is_empty() && !keep {
                *slot = F::decode(&value, site, &cx.scope().parsers)?;
            }
            Ok(())
        }),
    };
    cx.state.flush_unset();
    result
}

/// Walk `value` from the top level
pub(crate) fn walk_root<T: Walk + ?Sized>(
    value: &mut T,
    scope: &Scope,
    state: &mut State,
    prefix: String,
) -> Result<(), AggregateError> {
    tracing::debug!(
        prefix = %prefix,
        vars = scope.environment.len(),
        collecting = state.collected.is_some(),
        "binding environment"
    );
    value.walk(&mut Context::new(scope, state, prefix))
}
