//! Reading a field's raw annotations into [`FieldParams`].

use crate::error::Error;

/// Compile-time description of one struct field, emitted by `#[derive(Env)]`
#[derive(Debug, Clone, Copy)]
pub struct Site {
    /// Rust field name
    pub name: &'static str,
    /// Declared type, as written in the struct
    pub ty: &'static str,
    /// Every `name = "text"` pair from the field's `#[env(...)]` attributes
    pub tags: &'static [(&'static str, &'static str)],
    /// `#[env(flatten)]`: walk the nested struct at the current level
    pub flatten: bool,
}

impl Site {
    /// Raw text of the tag called `name`, if the field declares it
    pub fn tag(&self, name: &str) -> Option<&'static str> {
        self.tags
            .iter()
            .find(|(tag, _)| *tag == name)
            .map(|(_, value)| *value)
    }
}

/// Names of the tags the annotation parser reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagNames {
    pub key: String,
    pub default_value: String,
    pub prefix: String,
}

impl Default for TagNames {
    fn default() -> Self {
        Self {
            key: "key".to_string(),
            default_value: "default".to_string(),
            prefix: "prefix".to_string(),
        }
    }
}

pub(crate) const SEPARATOR_TAG: &str = "separator";
pub(crate) const KV_SEPARATOR_TAG: &str = "kv_separator";

/// Binding parameters derived from one field's annotations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldParams {
    /// Key as written on the field (or derived from its name)
    pub own_key: String,
    /// Prefix + own key
    pub key: String,
    /// Declared default value
    pub default_value: Option<String>,
    pub required: bool,
    pub load_file: bool,
    pub unset: bool,
    pub not_empty: bool,
    pub expand: bool,
    pub init: bool,
    pub ignored: bool,
}

impl FieldParams {
    pub fn has_default(&self) -> bool {
        self.default_value.is_some()
    }

    /// Option tokens set on this field, in annotation spelling
    pub fn options(&self) -> Vec<&'static str> {
        [
            (self.required, "required"),
            (self.not_empty, "notEmpty"),
            (self.unset, "unset"),
            (self.expand, "expand"),
            (self.load_file, "file"),
            (self.init, "init"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }
}

/// Flags of the resolution context the annotation parser depends on
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ParseFlags {
    pub required_if_no_default: bool,
    pub use_field_name: bool,
}

/// Split `key[,opt1[,opt2...]]` into the key and its option tokens
pub fn split_key(annotation: &str) -> (&str, Vec<&str>) {
    let mut parts = annotation.split(',');
    let key = parts.next().unwrap_or_default();
    (key, parts.collect())
}

pub(crate) fn parse_field_params(
    site: &Site,
    tags: &TagNames,
    prefix: &str,
    flags: ParseFlags,
) -> Result<FieldParams, Error> {
    let (key, options) = split_key(site.tag(&tags.key).unwrap_or_default());
    let own_key = if key.is_empty() && flags.use_field_name {
        to_env_name(site.name)
    } else {
        key.to_string()
    };

    let default_value = site.tag(&tags.default_value).map(str::to_string);
    let mut params = FieldParams {
        key: format!("{}{}", prefix, own_key),
        required: flags.required_if_no_default && default_value.is_none(),
        ignored: own_key == "-",
        own_key,
        default_value,
        ..FieldParams::default()
    };

    for option in options {
        match option {
            "" => {}
            "file" => params.load_file = true,
            "required" => params.required = true,
            "unset" => params.unset = true,
            "notEmpty" => params.not_empty = true,
            "expand" => params.expand = true,
            "init" => params.init = true,
            "-" => params.ignored = true,
            other => {
                return Err(Error::UnsupportedOption {
                    option: other.to_string(),
                })
            }
        }
    }

    Ok(params)
}

/// Convert a field name into an environment variable name.
///
/// `FooBar` becomes `FOO_BAR`, `HTTPPort` becomes `HTTP_PORT`, `foo_bar` becomes
/// `FOO_BAR`. Existing underscores are collapsed.
pub fn to_env_name(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut output = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' {
            if !output.is_empty() && !output.ends_with('_') {
                output.push('_');
            }
            continue;
        }
        if !output.is_empty() && !output.ends_with('_') && c.is_uppercase() {
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let prev_lower = i > 0 && chars[i - 1].is_lowercase();
            if next_lower || prev_lower {
                output.push('_');
            }
        }
        output.extend(c.to_uppercase());
    }

    while output.ends_with('_') {
        output.pop();
    }
    output
}
