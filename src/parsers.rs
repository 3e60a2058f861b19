//! Parser registry: exact-type custom parsers plus the built-in kind table.

use crate::error::{BoxError, ParseValueError};
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

/// A decoder producing a value of `T` from resolved text
pub type Decoder<'p, T> = Box<dyn Fn(&str) -> Result<T, BoxError> + 'p>;

type ParserFn = Arc<dyn Fn(&str) -> Result<Box<dyn Any>, BoxError> + Send + Sync>;

/// Exact-type parser overrides, keyed by the target type
#[derive(Clone, Default)]
pub struct Parsers {
    by_type: HashMap<TypeId, ParserFn>,
}

impl Parsers {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with parsers for common non-primitive types
    pub fn with_defaults() -> Self {
        let mut parsers = Self::new();
        parsers.insert(parse_duration);
        parsers.insert(|text: &str| Ok::<_, BoxError>(PathBuf::from(text)));
        #[cfg(feature = "url")]
        parsers.insert(parse_url);
        parsers
    }

    /// Register `parser` for values of exactly type `T`, replacing any previous entry
    pub fn insert<T, E, F>(&mut self, parser: F)
    where
        T: 'static,
        E: Into<BoxError>,
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
    {
        let erased: ParserFn = Arc::new(move |text: &str| {
            parser(text)
                .map(|v| Box::new(v) as Box<dyn Any>)
                .map_err(Into::into)
        });
        self.by_type.insert(TypeId::of::<T>(), erased);
    }

    /// Merge `other` over `self`; entries of `other` win
    pub fn extend(&mut self, other: Parsers) {
        self.by_type.extend(other.by_type);
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// Decoder for exactly `T`, if one was registered
    pub fn decoder<T: 'static>(&self) -> Option<Decoder<'_, T>> {
        let parser = self.by_type.get(&TypeId::of::<T>())?;
        Some(Box::new(move |text: &str| {
            (**parser)(text)?
                .downcast::<T>()
                .map(|v| *v)
                .map_err(|_| BoxError::from("registered parser returned a value of another type"))
        }))
    }
}

impl fmt::Debug for Parsers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parsers")
            .field("types", &self.by_type.len())
            .finish()
    }
}

/// Fundamental kinds with a built-in parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    String,
    Int(u32),
    Uint(u32),
    Float(u32),
}

/// Output of a built-in kind parser, before narrowing to the declared type
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    String(String),
    Int(i64),
    Uint(u64),
    Float(f64),
}

impl Kind {
    /// Run the built-in parser for this kind
    pub fn parse(self, text: &str) -> Result<Scalar, BoxError> {
        match self {
            Kind::Bool => parse_bool(text).map(Scalar::Bool),
            Kind::String => Ok(Scalar::String(text.to_string())),
            Kind::Int(bits) => parse_int(text, bits).map(Scalar::Int),
            Kind::Uint(bits) => parse_uint(text, bits).map(Scalar::Uint),
            Kind::Float(bits) => parse_float(text, bits).map(Scalar::Float),
        }
    }
}

fn parse_bool(text: &str) -> Result<bool, BoxError> {
    match text {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(format!("invalid boolean {:?}", text).into()),
    }
}

fn parse_int(text: &str, bits: u32) -> Result<i64, BoxError> {
    let value: i64 = text.parse()?;
    if bits < 64 {
        let bound = 1i64 << (bits - 1);
        if value < -bound || value >= bound {
            return Err(format!("value {:?} out of range for {}-bit integer", text, bits).into());
        }
    }
    Ok(value)
}

fn parse_uint(text: &str, bits: u32) -> Result<u64, BoxError> {
    let value: u64 = text.parse()?;
    if bits < 64 && value >> bits != 0 {
        return Err(format!("value {:?} out of range for {}-bit unsigned integer", text, bits).into());
    }
    Ok(value)
}

fn parse_float(text: &str, bits: u32) -> Result<f64, BoxError> {
    let value = if bits == 32 {
        f64::from(text.parse::<f32>()?)
    } else {
        text.parse::<f64>()?
    };
    // str::parse saturates to infinity on overflow
    if value.is_infinite() && !spells_infinity(text) {
        return Err(format!("value {:?} out of range for {}-bit float", text, bits).into());
    }
    Ok(value)
}

fn spells_infinity(text: &str) -> bool {
    let unsigned = text
        .strip_prefix('+')
        .or_else(|| text.strip_prefix('-'))
        .unwrap_or(text);
    unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity")
}

/// Parse a duration such as `300ms`, `1.5h` or `2h45m`
pub fn parse_duration(text: &str) -> Result<Duration, ParseValueError> {
    parse_duration_nanos(text)
        .map(Duration::from_nanos)
        .map_err(|e| ParseValueError::new("unable to parse duration", e))
}

fn parse_duration_nanos(text: &str) -> Result<u64, BoxError> {
    let s = text.strip_prefix('+').unwrap_or(text);
    if s == "0" {
        return Ok(0);
    }
    if s.is_empty() {
        return Err(format!("invalid duration {:?}", text).into());
    }
    if s.starts_with('-') {
        return Err(format!("negative duration {:?}", text).into());
    }

    let mut total: f64 = 0.0;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(format!("invalid duration {:?}", text).into());
        }
        let (number, after) = rest.split_at(number_len);
        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid duration {:?}", text))?;

        let unit_len = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let (unit, next) = after.split_at(unit_len);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(format!("missing unit in duration {:?}", text).into()),
            other => return Err(format!("unknown unit {:?} in duration {:?}", other, text).into()),
        };
        total += value * scale;
        rest = next;
    }

    if total > u64::MAX as f64 {
        return Err(format!("invalid duration {:?}", text).into());
    }
    Ok(total.round() as u64)
}

#[cfg(feature = "url")]
pub fn parse_url(text: &str) -> Result<url::Url, ParseValueError> {
    url::Url::parse(text).map_err(|e| ParseValueError::new("unable to parse URL", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_spellings() {
        for text in ["1", "t", "T", "true", "TRUE", "True"] {
            assert_eq!(Kind::Bool.parse(text).unwrap(), Scalar::Bool(true));
        }
        for text in ["0", "f", "F", "false", "FALSE", "False"] {
            assert_eq!(Kind::Bool.parse(text).unwrap(), Scalar::Bool(false));
        }
        assert!(Kind::Bool.parse("yes").is_err());
    }

    #[test]
    fn test_int_width_is_enforced() {
        assert_eq!(Kind::Int(8).parse("127").unwrap(), Scalar::Int(127));
        assert_eq!(Kind::Int(8).parse("-128").unwrap(), Scalar::Int(-128));
        assert!(Kind::Int(8).parse("128").is_err());
        assert!(Kind::Int(16).parse("-32769").is_err());
        assert_eq!(
            Kind::Int(64).parse("-9223372036854775808").unwrap(),
            Scalar::Int(i64::MIN)
        );
        assert!(Kind::Int(32).parse("abc").is_err());
    }

    #[test]
    fn test_uint_width_is_enforced() {
        assert_eq!(Kind::Uint(8).parse("255").unwrap(), Scalar::Uint(255));
        assert!(Kind::Uint(8).parse("256").is_err());
        assert!(Kind::Uint(32).parse("-1").is_err());
        assert_eq!(
            Kind::Uint(64).parse("18446744073709551615").unwrap(),
            Scalar::Uint(u64::MAX)
        );
    }

    #[test]
    fn test_float() {
        assert_eq!(Kind::Float(64).parse("1.5").unwrap(), Scalar::Float(1.5));
        assert_eq!(Kind::Float(32).parse("0.25").unwrap(), Scalar::Float(0.25));
        assert!(Kind::Float(64).parse("one").is_err());
    }

    #[test]
    fn test_float_overflow_is_rejected() {
        assert!(Kind::Float(32).parse("1e40").is_err());
        assert!(Kind::Float(64).parse("1e400").is_err());
        assert!(Kind::Float(64).parse("-1e400").is_err());
        assert!(Kind::Float(64).parse("1e40").is_ok());

        assert_eq!(
            Kind::Float(32).parse("-inf").unwrap(),
            Scalar::Float(f64::NEG_INFINITY)
        );
        assert_eq!(
            Kind::Float(64).parse("Infinity").unwrap(),
            Scalar::Float(f64::INFINITY)
        );
    }

    #[test]
    fn test_duration_syntax() {
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("300ms").unwrap(), Duration::from_millis(300));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("2h45m").unwrap(), Duration::from_secs(2 * 3600 + 45 * 60));
        assert_eq!(parse_duration("10us").unwrap(), Duration::from_micros(10));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("5 days").is_err());
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn test_duration_error_is_wrapped() {
        let err = parse_duration("wat").unwrap_err();
        assert!(err.to_string().starts_with("unable to parse duration: "));
    }

    #[cfg(feature = "url")]
    #[test]
    fn test_url() {
        let url = parse_url("https://example.com/path").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
        let err = parse_url("not a url").unwrap_err();
        assert!(err.to_string().starts_with("unable to parse URL: "));
    }

    #[test]
    fn test_registry_decoder_and_override() {
        let mut parsers = Parsers::with_defaults();
        assert!(parsers.contains::<Duration>());
        assert!(!parsers.contains::<u8>());

        parsers.insert(|text: &str| -> Result<u8, BoxError> { Ok(text.len() as u8) });
        let decode = parsers.decoder::<u8>().unwrap();
        assert_eq!(decode("abcd").unwrap(), 4);
        drop(decode);

        parsers.insert(|_: &str| -> Result<u8, BoxError> { Ok(42) });
        let decode = parsers.decoder::<u8>().unwrap();
        assert_eq!(decode("abcd").unwrap(), 42);
    }

    #[test]
    fn test_registry_extend_prefers_other() {
        let mut base = Parsers::new();
        base.insert(|_: &str| -> Result<i32, BoxError> { Ok(1) });
        let mut other = Parsers::new();
        other.insert(|_: &str| -> Result<i32, BoxError> { Ok(2) });

        base.extend(other);
        assert_eq!(base.len(), 1);
        assert_eq!(base.decoder::<i32>().unwrap()("x").unwrap(), 2);
    }
}
