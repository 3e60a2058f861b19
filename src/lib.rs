//! Bind environment variables into typed structs.
//!
//! ```rust
//! use envbind::{Env, Environment, Load, Options};
//!
//! #[derive(Debug, Default, Env)]
//! struct Server {
//!     #[env(key = "HOST", default = "localhost")]
//!     host: String,
//!     #[env(key = "PORT,required")]
//!     port: u16,
//! }
//!
//! let env = Environment::from_entries(["PORT=8080"]);
//! let server = Server::parse_with(Options::new().environment(env)).unwrap();
//! assert_eq!(server.host, "localhost");
//! assert_eq!(server.port, 8080);
//! ```

extern crate self as envbind;

pub mod collection;
pub mod docs;
pub mod environment;
pub mod error;
pub mod field;
pub mod macros;
pub mod options;
pub mod parsers;
mod resolve;
pub mod tag;
pub mod walk;

// Re-export main types
pub use environment::{Environment, ProcessEnv, RecordingUnset, Unset};
pub use error::{format_errors, AggregateError, BoxError, Error, ErrorKind, ParseValueError};
pub use field::{Field, FromText, Shape};
pub use options::Options;
pub use parsers::Parsers;
pub use tag::{FieldParams, Site, TagNames};
pub use walk::{OnSet, Walk};

// Re-export macro
pub use envbind_macros::Env;

/// Typed entry points, implemented by `#[derive(Env)]`
pub trait Load: Walk + Field + Default {
    /// Build a value from `Default` and bind the process environment into it
    fn parse() -> Result<Self, AggregateError> {
        Self::parse_with(Options::new())
    }

    /// Build a value from `Default` and bind with custom options
    fn parse_with(options: Options) -> Result<Self, AggregateError> {
        let mut value = Self::default();
        parse_with_options(&mut value, options)?;
        Ok(value)
    }

    /// Load `.env` if present, then bind, panicking with every error found
    fn load() -> Self {
        match Self::load_or_error() {
            Ok(value) => value,
            Err(errors) => panic!("{}", format_errors(&errors)),
        }
    }

    /// Load `.env` if present, then bind, returning errors instead of panicking
    fn load_or_error() -> Result<Self, AggregateError> {
        let _ = dotenvy::dotenv();
        Self::parse()
    }

    /// Binding parameters of every keyed field, without resolving any value
    fn field_params() -> Result<Vec<FieldParams>, AggregateError> {
        field_params_with_options(&mut Self::default(), Options::new())
    }
}

/// Bind the process environment into an existing value
pub fn parse<T: Walk>(value: &mut T) -> Result<(), AggregateError> {
    parse_with_options(value, Options::new())
}

/// Bind into an existing value with custom options
pub fn parse_with_options<T: Walk>(value: &mut T, options: Options) -> Result<(), AggregateError> {
    let (scope, mut state, prefix) = options.into_parts();
    walk::walk_root(value, &scope, &mut state, prefix)
}

/// Binding parameters of every keyed field reachable from `value`
pub fn field_params<T: Walk>(value: &mut T) -> Result<Vec<FieldParams>, AggregateError> {
    field_params_with_options(value, Options::new())
}

/// Like [`field_params`], honoring tag names, prefix and flags from `options`
pub fn field_params_with_options<T: Walk>(
    value: &mut T,
    options: Options,
) -> Result<Vec<FieldParams>, AggregateError> {
    let (scope, mut state, prefix) = options.into_parts();
    state.collected = Some(Vec::new());
    walk::walk_root(value, &scope, &mut state, prefix)?;
    Ok(state.collected.take().unwrap_or_default())
}

/// Unwrap a binding result, panicking with the formatted error report
pub fn must<T>(result: Result<T, AggregateError>) -> T {
    match result {
        Ok(value) => value,
        Err(errors) => panic!("{}", format_errors(&errors)),
    }
}
