//! Field types the binder can fill, and the decoder chain they go through.

use crate::{
    collection::{self, KnownKeys},
    error::{AggregateError, BoxError, Error},
    parsers::{Decoder, Kind, Parsers, Scalar},
    tag::{Site, TagNames, KV_SEPARATOR_TAG, SEPARATOR_TAG},
    walk::{Context, Walk},
};
use std::{
    collections::{BTreeMap, HashMap},
    hash::Hash,
    path::PathBuf,
    time::Duration,
};

/// How the walker treats a field type beyond decoding text into it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Decoded from text only
    Scalar,
    /// A `#[derive(Env)]` struct, walked field by field
    Struct,
    /// `Option` of a derived struct; walked when set or allocated by `init`
    OptionalStruct,
    /// `Vec` of derived structs, sized from the indices present in the environment
    StructList,
    /// Map of derived structs, keyed by names inferred from the environment
    StructMap,
}

/// Types that know how to construct themselves from text.
///
/// Implementing this and registering the type with [`text_field!`](crate::text_field)
/// makes `from_text` the only way the type is decoded: exact-type parsers
/// registered in [`Options`](crate::Options) are never consulted for it.
pub trait FromText: Sized {
    fn from_text(text: &str) -> Result<Self, BoxError>;
}

/// A type that can appear as a field of a `#[derive(Env)]` struct.
///
/// Decoding tries, in order, the text capability, an exact-type parser from
/// the registry, and the built-in parser for the type's kind. The first probe
/// that exists is the only one used.
pub trait Field: Sized + 'static {
    const SHAPE: Shape = Shape::Scalar;

    /// Text capability probe
    fn text_decoder<'p>() -> Option<Decoder<'p, Self>> {
        None
    }

    /// Exact-type registry probe
    fn custom_decoder(parsers: &Parsers) -> Option<Decoder<'_, Self>> {
        parsers.decoder::<Self>()
    }

    /// Built-in kind probe
    fn kind_decoder<'p>() -> Option<Decoder<'p, Self>> {
        None
    }

    /// Convert resolved text into a value of this type
    fn decode(text: &str, site: &Site, parsers: &Parsers) -> Result<Self, Error> {
        let decoder =
            element_decoder::<Self>(parsers).ok_or_else(|| Error::no_parser(site.name, site.ty))?;
        decoder(text).map_err(|e| Error::parse(site.name, site.ty, e))
    }

    /// Zero value, used to grow collections of structs
    fn zero() -> Option<Self> {
        None
    }

    /// Allocate an absent optional value (`init` option)
    fn init(&mut self) {}

    /// Struct to descend into, if this value currently holds one
    fn walker(&mut self) -> Option<&mut dyn Walk> {
        None
    }

    /// Expand a collection of structs from the environment
    fn expand(&mut self, _site: &Site, _cx: &mut Context<'_>) -> Result<(), AggregateError> {
        Ok(())
    }

    /// Whether an expanded collection came out empty
    fn is_vacant(&self) -> bool {
        false
    }

    /// Whether the value is still its zero value. Types without one report
    /// `true`, so they are always overwritten.
    fn is_zero(&self) -> bool {
        true
    }

    /// Every leaf key reachable inside this type, relative to `prefix`
    fn known_keys(_prefix: &str, _tags: &TagNames, _keys: &mut KnownKeys) {}
}

/// Text capability, then exact type, then kind
pub fn element_decoder<T: Field>(parsers: &Parsers) -> Option<Decoder<'_, T>> {
    T::text_decoder()
        .or_else(|| T::custom_decoder(parsers))
        .or_else(|| T::kind_decoder())
}

/// Exact type, then kind; map keys and values have no text capability
pub fn map_part_decoder<T: Field>(parsers: &Parsers) -> Option<Decoder<'_, T>> {
    T::custom_decoder(parsers).or_else(|| T::kind_decoder())
}

fn mismatch(scalar: &Scalar, ty: &str) -> BoxError {
    format!("cannot store {:?} in {}", scalar, ty).into()
}

macro_rules! int_fields {
    ($($t:ty => $kind:expr),* $(,)?) => {$(
        impl Field for $t {
            fn kind_decoder<'p>() -> Option<Decoder<'p, Self>> {
                Some(Box::new(|text: &str| match $kind.parse(text)? {
                    Scalar::Int(v) => Ok(<$t>::try_from(v)?),
                    Scalar::Uint(v) => Ok(<$t>::try_from(v)?),
                    other => Err(mismatch(&other, stringify!($t))),
                }))
            }

            fn zero() -> Option<Self> {
                Some(0)
            }

            fn is_zero(&self) -> bool {
                *self == 0
            }
        }
    )*};
}

int_fields! {
    i8 => Kind::Int(8),
    i16 => Kind::Int(16),
    i32 => Kind::Int(32),
    i64 => Kind::Int(64),
    isize => Kind::Int(usize::BITS),
    u8 => Kind::Uint(8),
    u16 => Kind::Uint(16),
    u32 => Kind::Uint(32),
    u64 => Kind::Uint(64),
    usize => Kind::Uint(usize::BITS),
}

macro_rules! float_fields {
    ($($t:ty => $bits:expr),* $(,)?) => {$(
        impl Field for $t {
            fn kind_decoder<'p>() -> Option<Decoder<'p, Self>> {
                Some(Box::new(|text: &str| match Kind::Float($bits).parse(text)? {
                    Scalar::Float(v) => Ok(v as $t),
                    other => Err(mismatch(&other, stringify!($t))),
                }))
            }

            fn zero() -> Option<Self> {
                Some(0.0)
            }

            fn is_zero(&self) -> bool {
                *self == 0.0
            }
        }
    )*};
}

float_fields! {
    f32 => 32,
    f64 => 64,
}

impl Field for bool {
    fn kind_decoder<'p>() -> Option<Decoder<'p, Self>> {
        Some(Box::new(|text: &str| match Kind::Bool.parse(text)? {
            Scalar::Bool(v) => Ok(v),
            other => Err(mismatch(&other, "bool")),
        }))
    }

    fn zero() -> Option<Self> {
        Some(false)
    }

    fn is_zero(&self) -> bool {
        !*self
    }
}

impl Field for String {
    fn kind_decoder<'p>() -> Option<Decoder<'p, Self>> {
        Some(Box::new(|text: &str| match Kind::String.parse(text)? {
            Scalar::String(v) => Ok(v),
            other => Err(mismatch(&other, "String")),
        }))
    }

    fn zero() -> Option<Self> {
        Some(String::new())
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl Field for Duration {
    fn zero() -> Option<Self> {
        Some(Duration::ZERO)
    }

    fn is_zero(&self) -> bool {
        Duration::is_zero(self)
    }
}

impl Field for PathBuf {
    fn zero() -> Option<Self> {
        Some(PathBuf::new())
    }

    fn is_zero(&self) -> bool {
        self.as_os_str().is_empty()
    }
}

#[cfg(feature = "url")]
impl Field for url::Url {}

fn wrap_some<'p, T: 'p>(decoder: Decoder<'p, T>) -> Decoder<'p, Option<T>> {
    Box::new(move |text: &str| decoder(text).map(Some))
}

impl<T: Field> Field for Option<T> {
    const SHAPE: Shape = match T::SHAPE {
        Shape::Struct => Shape::OptionalStruct,
        Shape::StructList => Shape::StructList,
        Shape::StructMap => Shape::StructMap,
        Shape::Scalar | Shape::OptionalStruct => Shape::Scalar,
    };

    fn text_decoder<'p>() -> Option<Decoder<'p, Self>> {
        T::text_decoder().map(wrap_some)
    }

    fn custom_decoder(parsers: &Parsers) -> Option<Decoder<'_, Self>> {
        T::custom_decoder(parsers).map(wrap_some)
    }

    fn kind_decoder<'p>() -> Option<Decoder<'p, Self>> {
        T::kind_decoder().map(wrap_some)
    }

    fn zero() -> Option<Self> {
        Some(None)
    }

    fn init(&mut self) {
        if self.is_none() {
            *self = T::zero();
        }
    }

    fn walker(&mut self) -> Option<&mut dyn Walk> {
        self.as_mut().and_then(Field::walker)
    }

    fn expand(&mut self, site: &Site, cx: &mut Context<'_>) -> Result<(), AggregateError> {
        if !matches!(T::SHAPE, Shape::StructList | Shape::StructMap) {
            return Ok(());
        }
        let was_set = self.is_some();
        let Some(mut inner) = self.take().or_else(T::zero) else {
            return Ok(());
        };
        let result = inner.expand(site, cx);
        if was_set || !inner.is_vacant() {
            *self = Some(inner);
        }
        result
    }

    fn is_vacant(&self) -> bool {
        self.as_ref().map_or(true, Field::is_vacant)
    }

    fn is_zero(&self) -> bool {
        self.is_none()
    }

    fn known_keys(prefix: &str, tags: &TagNames, keys: &mut KnownKeys) {
        T::known_keys(prefix, tags, keys);
    }
}

fn separator<'s>(site: &'s Site, tag: &str, fallback: &'s str) -> &'s str {
    site.tag(tag).filter(|s| !s.is_empty()).unwrap_or(fallback)
}

impl<T: Field> Field for Vec<T> {
    const SHAPE: Shape = if matches!(T::SHAPE, Shape::Struct) {
        Shape::StructList
    } else {
        Shape::Scalar
    };

    fn decode(text: &str, site: &Site, parsers: &Parsers) -> Result<Self, Error> {
        if let Some(decoder) = Self::custom_decoder(parsers) {
            return decoder(text).map_err(|e| Error::parse(site.name, site.ty, e));
        }
        let element =
            element_decoder::<T>(parsers).ok_or_else(|| Error::no_parser(site.name, site.ty))?;
        text.split(separator(site, SEPARATOR_TAG, ","))
            .map(|part| element(part).map_err(|e| Error::parse(site.name, site.ty, e)))
            .collect()
    }

    fn zero() -> Option<Self> {
        Some(Vec::new())
    }

    fn expand(&mut self, _site: &Site, cx: &mut Context<'_>) -> Result<(), AggregateError> {
        if matches!(T::SHAPE, Shape::Struct) {
            collection::expand_list(self, cx)
        } else {
            Ok(())
        }
    }

    fn is_vacant(&self) -> bool {
        self.is_empty()
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

/// Split `k1:v1,k2:v2` into decoded pairs
fn decode_pairs<K, V, C>(text: &str, site: &Site, parsers: &Parsers) -> Result<C, Error>
where
    K: Field,
    V: Field,
    C: FromIterator<(K, V)>,
{
    let key = map_part_decoder::<K>(parsers).ok_or_else(|| Error::no_parser(site.name, site.ty))?;
    let value =
        map_part_decoder::<V>(parsers).ok_or_else(|| Error::no_parser(site.name, site.ty))?;
    let kv_separator = separator(site, KV_SEPARATOR_TAG, ":");

    text.split(separator(site, SEPARATOR_TAG, ","))
        .map(|part| {
            let (k, v) = part.split_once(kv_separator).ok_or_else(|| {
                Error::parse(
                    site.name,
                    site.ty,
                    format!("{:?} should be in \"key{}value\" format", part, kv_separator),
                )
            })?;
            let k = key(k).map_err(|e| Error::parse(site.name, site.ty, e))?;
            let v = value(v).map_err(|e| Error::parse(site.name, site.ty, e))?;
            Ok((k, v))
        })
        .collect()
}

const fn map_shape(value: Shape) -> Shape {
    match value {
        Shape::Struct | Shape::OptionalStruct => Shape::StructMap,
        _ => Shape::Scalar,
    }
}

impl<K: Field + Eq + Hash, V: Field> Field for HashMap<K, V> {
    const SHAPE: Shape = map_shape(V::SHAPE);

    fn decode(text: &str, site: &Site, parsers: &Parsers) -> Result<Self, Error> {
        if let Some(decoder) = Self::custom_decoder(parsers) {
            return decoder(text).map_err(|e| Error::parse(site.name, site.ty, e));
        }
        decode_pairs(text, site, parsers)
    }

    fn zero() -> Option<Self> {
        Some(HashMap::new())
    }

    fn expand(&mut self, site: &Site, cx: &mut Context<'_>) -> Result<(), AggregateError> {
        if !matches!(Self::SHAPE, Shape::StructMap) {
            return Ok(());
        }
        collection::expand_map(site, cx, |k: K, v: V| {
            self.insert(k, v);
        })
    }

    fn is_vacant(&self) -> bool {
        self.is_empty()
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<K: Field + Ord, V: Field> Field for BTreeMap<K, V> {
    const SHAPE: Shape = map_shape(V::SHAPE);

    fn decode(text: &str, site: &Site, parsers: &Parsers) -> Result<Self, Error> {
        if let Some(decoder) = Self::custom_decoder(parsers) {
            return decoder(text).map_err(|e| Error::parse(site.name, site.ty, e));
        }
        decode_pairs(text, site, parsers)
    }

    fn zero() -> Option<Self> {
        Some(BTreeMap::new())
    }

    fn expand(&mut self, site: &Site, cx: &mut Context<'_>) -> Result<(), AggregateError> {
        if !matches!(Self::SHAPE, Shape::StructMap) {
            return Ok(());
        }
        collection::expand_map(site, cx, |k: K, v: V| {
            self.insert(k, v);
        })
    }

    fn is_vacant(&self) -> bool {
        self.is_empty()
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}
