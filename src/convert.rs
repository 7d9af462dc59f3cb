//! Value resolution: turning declared values into objects.

use std::sync::Arc;

use crate::container::Container;
use crate::error::{DiError, DiResult};
use crate::key::{AnyArc, TypeKey};
use crate::value::{Value, ValueHolder};

/// Turns a declared constructor-argument or property value into an object of `target`.
///
/// The container calls it once per value during population. Implementations may
/// delegate to [`DefaultValueResolver`] for the cases they do not handle.
pub trait ValueResolver: Send + Sync {
    fn resolve(
        &self,
        container: &Container,
        owner: &str,
        holder: &ValueHolder,
        target: TypeKey,
    ) -> DiResult<AnyArc>;
}

/// Literal conversion for primitives and `String`, reference lookup by name,
/// anonymous creation of nested definitions.
///
/// Converted literals are cached on the holder; references are looked up on
/// every call so prototype targets stay fresh.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultValueResolver;

impl ValueResolver for DefaultValueResolver {
    fn resolve(
        &self,
        container: &Container,
        owner: &str,
        holder: &ValueHolder,
        target: TypeKey,
    ) -> DiResult<AnyArc> {
        match holder.value() {
            Value::Object(object) => {
                if (**object).type_id() == target.id() {
                    Ok(object.clone())
                } else {
                    Err(DiError::TypeMismatch(target.name()))
                }
            }
            Value::Text(text) => {
                if let Some(cached) = holder.converted() {
                    if (**cached).type_id() == target.id() {
                        return Ok(cached.clone());
                    }
                }
                let converted = convert_text(text, target)?;
                let cached = holder.cache_converted(converted.clone());
                if (*cached).type_id() == target.id() {
                    Ok(cached)
                } else {
                    Ok(converted)
                }
            }
            Value::Reference(name) => {
                if name == owner {
                    return Err(DiError::config(owner, "a component cannot reference itself"));
                }
                container.get_as(name, target)
            }
            Value::Nested(definition) => container.create_nested(definition, target),
        }
    }
}

macro_rules! parse_into {
    ($text:expr, $target:expr, $($ty:ty),+) => {
        $(
            if $target == TypeKey::of::<$ty>() {
                return $text
                    .trim()
                    .parse::<$ty>()
                    .map(|v| Arc::new(v) as AnyArc)
                    .map_err(|_| DiError::Conversion {
                        value: $text.to_string(),
                        target: $target.name(),
                    });
            }
        )+
    };
}

/// Whether [`convert_text`] supports `target`.
pub(crate) fn accepts_text(target: TypeKey) -> bool {
    macro_rules! any_of {
        ($($ty:ty),+) => { false $(|| target == TypeKey::of::<$ty>())+ };
    }
    any_of!(String, bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64)
}

/// Converts a literal to `target`; supports `String`, `bool`, `char` and the numeric primitives.
pub fn convert_text(text: &str, target: TypeKey) -> DiResult<AnyArc> {
    if target == TypeKey::of::<String>() {
        return Ok(Arc::new(text.to_string()));
    }
    parse_into!(text, target, bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);
    Err(DiError::Conversion {
        value: text.to_string(),
        target: target.name(),
    })
}
