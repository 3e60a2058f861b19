use crate::{
    environment::{Environment, ProcessEnv, Unset},
    error::BoxError,
    parsers::Parsers,
    tag::{ParseFlags, TagNames},
    walk::{OnSet, Scope, State},
};

/// Settings for one binding call
///
/// # Example
/// ```rust
/// use envbind::{Environment, Options};
///
/// let options = Options::new()
///     .environment(Environment::from_entries(["APP_PORT=8080"]))
///     .prefix("APP_")
///     .required_if_no_default(true);
/// ```
#[derive(Default)]
pub struct Options {
    environment: Option<Environment>,
    tags: TagNames,
    required_if_no_default: bool,
    use_field_name: bool,
    zero_values_only: bool,
    on_set: Option<OnSet>,
    prefix: String,
    parsers: Parsers,
    unsetter: Option<Box<dyn Unset>>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read from this snapshot instead of the process environment
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Rename the binding key tag (default `key`)
    pub fn tag_name(mut self, name: impl Into<String>) -> Self {
        self.tags.key = name.into();
        self
    }

    /// Rename the nested prefix tag (default `prefix`)
    pub fn prefix_tag_name(mut self, name: impl Into<String>) -> Self {
        self.tags.prefix = name.into();
        self
    }

    /// Rename the default value tag (default `default`)
    pub fn default_value_tag_name(mut self, name: impl Into<String>) -> Self {
        self.tags.default_value = name.into();
        self
    }

    /// Treat every field without a default as `required`
    pub fn required_if_no_default(mut self, enabled: bool) -> Self {
        self.required_if_no_default = enabled;
        self
    }

    /// Called with `(key, value, is_default)` for each field that resolves
    pub fn on_set<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&str, &str, bool) + 'static,
    {
        self.on_set = Some(Box::new(hook));
        self
    }

    /// Prepend `prefix` to every key
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Derive missing keys from field names (`http_port` binds `HTTP_PORT`)
    pub fn use_field_name_by_default(mut self, enabled: bool) -> Self {
        self.use_field_name = enabled;
        self
    }

    /// Only write fields that still hold their zero value, keeping anything
    /// the caller filled in before binding
    pub fn set_defaults_for_zero_values_only(mut self, enabled: bool) -> Self {
        self.zero_values_only = enabled;
        self
    }

    /// Parse values of exactly type `T` with `parser`, overriding the built-ins
    pub fn parser<T, E, F>(mut self, parser: F) -> Self
    where
        T: 'static,
        E: Into<BoxError>,
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
    {
        self.parsers.insert(parser);
        self
    }

    /// Receiver of `unset` removals (default: the process environment)
    pub fn unsetter(mut self, unsetter: impl Unset + 'static) -> Self {
        self.unsetter = Some(Box::new(unsetter));
        self
    }

    pub(crate) fn into_parts(self) -> (Scope, State, String) {
        let mut parsers = Parsers::with_defaults();
        parsers.extend(self.parsers);

        let scope = Scope {
            environment: self.environment.unwrap_or_else(Environment::from_process),
            parsers,
            tags: self.tags,
            flags: ParseFlags {
                required_if_no_default: self.required_if_no_default,
                use_field_name: self.use_field_name,
            },
            zero_values_only: self.zero_values_only,
        };
        let unsetter = self
            .unsetter
            .unwrap_or_else(|| Box::new(ProcessEnv) as Box<dyn Unset>);
        (scope, State::new(self.on_set, unsetter), self.prefix)
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("environment", &self.environment.as_ref().map(Environment::len))
            .field("tags", &self.tags)
            .field("required_if_no_default", &self.required_if_no_default)
            .field("use_field_name", &self.use_field_name)
            .field("zero_values_only", &self.zero_values_only)
            .field("on_set", &self.on_set.is_some())
            .field("prefix", &self.prefix)
            .field("parsers", &self.parsers)
            .finish()
    }
}
