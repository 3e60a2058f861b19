use colored::Colorize;
use std::{fmt, io, sync::Arc};

/// Boxed error returned by parser functions
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared cause attached to parse and file errors, kept cloneable
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// A single field-level failure
#[derive(Debug, Clone)]
pub enum Error {
    /// The binding annotation carries an option token that is not recognized
    UnsupportedOption { option: String },
    /// A required variable is absent from the environment
    VarNotSet { key: String },
    /// A `notEmpty` variable resolved to the empty string
    EmptyVar { key: String },
    /// The resolved text could not be converted into the field's type
    Parse {
        field: String,
        ty: String,
        source: Cause,
    },
    /// No decoder exists for the field's type
    NoParser { field: String, ty: String },
    /// The `file` option pointed at a file that could not be read
    LoadFileContent {
        path: String,
        key: String,
        source: Arc<io::Error>,
    },
    /// A map-of-structs variable whose name carries no map key
    MalformedMapEntry { field: String, key: String },
}

/// Discriminant of [`Error`], used to query an [`AggregateError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedOption,
    VarNotSet,
    EmptyVar,
    Parse,
    NoParser,
    LoadFileContent,
    MalformedMapEntry,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedOption { .. } => ErrorKind::UnsupportedOption,
            Error::VarNotSet { .. } => ErrorKind::VarNotSet,
            Error::EmptyVar { .. } => ErrorKind::EmptyVar,
            Error::Parse { .. } => ErrorKind::Parse,
            Error::NoParser { .. } => ErrorKind::NoParser,
            Error::LoadFileContent { .. } => ErrorKind::LoadFileContent,
            Error::MalformedMapEntry { .. } => ErrorKind::MalformedMapEntry,
        }
    }

    pub(crate) fn parse(field: &str, ty: &str, source: impl Into<BoxError>) -> Self {
        Error::Parse {
            field: field.to_string(),
            ty: ty.to_string(),
            source: Arc::from(source.into()),
        }
    }

    pub(crate) fn no_parser(field: &str, ty: &str) -> Self {
        Error::NoParser {
            field: field.to_string(),
            ty: ty.to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedOption { option } => {
                write!(f, "tag option {} not supported", quoted(option).magenta())
            }
            Error::VarNotSet { key } => write!(
                f,
                "required environment variable {} is not set",
                quoted(key).magenta().bold()
            ),
            Error::EmptyVar { key } => write!(
                f,
                "environment variable {} should not be empty",
                quoted(key).magenta().bold()
            ),
            Error::Parse { field, ty, source } => write!(
                f,
                "parse error on field {} of type {}: {}",
                quoted(field).magenta().bold(),
                quoted(ty).cyan(),
                source
            ),
            Error::NoParser { field, ty } => write!(
                f,
                "no parser found for field {} of type {}",
                quoted(field).magenta().bold(),
                quoted(ty).cyan()
            ),
            Error::LoadFileContent { path, key, source } => write!(
                f,
                "could not load content of file {} from variable {}: {}",
                quoted(path).cyan(),
                key.magenta().bold(),
                source
            ),
            Error::MalformedMapEntry { field, key } => write!(
                f,
                "parse error on field {}: malformed complex map struct for {}",
                quoted(field).magenta().bold(),
                quoted(key).red()
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Parse { source, .. } => Some(source.as_ref()),
            Error::LoadFileContent { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

fn quoted(s: &str) -> String {
    format!("{:?}", s)
}

/// Raised by the default type parsers when the underlying conversion fails
#[derive(Debug)]
pub struct ParseValueError {
    pub message: String,
    pub source: BoxError,
}

impl ParseValueError {
    pub fn new(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: source.into(),
        }
    }
}

impl fmt::Display for ParseValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.message, self.source)
    }
}

impl std::error::Error for ParseValueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Every field-level error collected during one binding call
#[derive(Debug, Clone, Default)]
pub struct AggregateError {
    errors: Vec<Error>,
}

impl AggregateError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: Error) {
        self.errors.push(error);
    }

    /// Flatten another aggregate into this one, keeping order
    pub fn merge(&mut self, other: AggregateError) {
        self.errors.extend(other.errors);
    }

    /// Whether any member error is of the given kind
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind() == kind)
    }

    /// First member error of the given kind
    pub fn find(&self, kind: ErrorKind) -> Option<&Error> {
        self.errors.iter().find(|e| e.kind() == kind)
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.errors.iter()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> Result<(), AggregateError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<Error> for AggregateError {
    fn from(error: Error) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl IntoIterator for AggregateError {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a AggregateError {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "env:")?;
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, ";")?;
            }
            write!(f, " {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

/// Render an aggregate as the multi-line report used when loading panics
pub fn format_errors(errors: &AggregateError) -> String {
    let error_summary = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Configuration failed with {} error(s):\n{}",
        errors.len().to_string().yellow().bold(),
        error_summary
    )
}
