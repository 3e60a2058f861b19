/// Make a [`FromText`](crate::FromText) type usable as a field.
///
/// The generated [`Field`](crate::Field) impl decodes only through
/// `FromText::from_text`; exact-type parsers registered in
/// [`Options`](crate::Options) are never consulted for these types.
///
/// ```rust
/// use envbind::{text_field, BoxError, FromText};
///
/// struct Level(u8);
///
/// impl FromText for Level {
///     fn from_text(text: &str) -> Result<Self, BoxError> {
///         Ok(Level(text.len() as u8))
///     }
/// }
///
/// text_field!(Level);
/// ```
#[macro_export]
macro_rules! text_field {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::Field for $ty {
            fn text_decoder<'p>() -> ::std::option::Option<$crate::parsers::Decoder<'p, Self>> {
                ::std::option::Option::Some(::std::boxed::Box::new(|text: &str| {
                    <$ty as $crate::FromText>::from_text(text)
                }))
            }
        }
    )+};
}
