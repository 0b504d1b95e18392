//! Conversions between leaf values and literal tokens.

use alloc::format;
use alloc::string::{String, ToString};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat};
use uuid::Uuid;

use crate::info::{EnumInfo, PrimitiveType, TypeKey, TypeKind};
use crate::registry::TypeRegistry;
use crate::token::Literal;
use crate::value::{EnumValue, Value};

/// Canonical text of a date: RFC 3339 with the shortest exact fraction.
#[inline]
pub(crate) fn date_text(date: &DateTime<chrono::FixedOffset>) -> String {
    date.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// The literal written for a leaf value, `None` for composites.
pub(crate) fn value_to_literal(value: &Value) -> Option<Literal> {
    Some(match value {
        Value::Null => Literal::Null,
        Value::Bool(v) => Literal::Boolean(*v),
        Value::Int(v) => Literal::Integer(*v),
        Value::Float(v) => Literal::Float(*v),
        Value::Char(c) => Literal::String(c.to_string()),
        Value::String(s) => Literal::String(s.clone()),
        Value::Date(d) => Literal::Date(*d),
        Value::Guid(g) => Literal::String(g.hyphenated().to_string()),
        Value::Bytes(b) => Literal::Bytes(b.clone()),
        Value::Enum(e) => Literal::Integer(e.value),
        Value::Object(_) | Value::Node(_) => return None,
    })
}

/// The value of a literal read where no type is expected.
pub(crate) fn natural_value(literal: Literal) -> Value {
    match literal {
        Literal::Null | Literal::Undefined => Value::Null,
        Literal::Boolean(v) => Value::Bool(v),
        Literal::Integer(v) => Value::Int(v),
        Literal::Float(v) => Value::Float(v),
        Literal::String(s) => Value::String(s),
        Literal::Date(d) => Value::Date(d),
        Literal::Bytes(b) => Value::Bytes(b),
    }
}

fn unexpected(literal: &Literal, target: &str) -> String {
    format!("Unexpected {literal} when converting to {target}.")
}

fn integer(literal: &Literal, target: PrimitiveType) -> Result<i64, String> {
    let value: i128 = match literal {
        Literal::Integer(v) => i128::from(*v),
        Literal::Float(f) if f.fract() == 0.0 && f.is_finite() => *f as i128,
        Literal::String(s) => s
            .trim()
            .parse::<i128>()
            .map_err(|_| format!("Input string '{s}' is not a valid integer."))?,
        other => return Err(unexpected(other, target.type_path())),
    };
    let (min, max) = target.integer_range().unwrap_or((i128::from(i64::MIN), i128::from(i64::MAX)));
    if value < min || value > max {
        return Err(format!(
            "Value was either too large or too small for {}.",
            target.type_path()
        ));
    }
    // In range of `target`, which fits an i64.
    Ok(value as i64)
}

/// Coerces a literal into a value of a primitive type or enumeration.
///
/// Null is accepted only when `nullable`; an empty string becomes null when
/// the target is nullable and not itself a string.
pub(crate) fn coerce_literal(
    literal: Literal,
    target: PrimitiveType,
    enumeration: Option<(TypeKey, &EnumInfo)>,
    nullable: bool,
) -> Result<Value, String> {
    if literal.is_null() {
        return if nullable {
            Ok(Value::Null)
        } else {
            Err(String::from("Value cannot be null."))
        };
    }
    if let Literal::String(s) = &literal
        && s.is_empty()
        && nullable
        && target != PrimitiveType::String
    {
        return Ok(Value::Null);
    }

    if let Some((ty, info)) = enumeration {
        let value = match &literal {
            Literal::Integer(v) => *v,
            Literal::String(s) => {
                let s = s.trim();
                info.value_of(s)
                    .or_else(|| s.parse::<i64>().ok())
                    .ok_or_else(|| format!("Requested value '{s}' was not found."))?
            }
            other => return Err(unexpected(other, "enum")),
        };
        return Ok(Value::Enum(EnumValue { ty, value }));
    }

    Ok(match target {
        PrimitiveType::Boolean => match &literal {
            Literal::Boolean(b) => Value::Bool(*b),
            Literal::Integer(v) => Value::Bool(*v != 0),
            Literal::String(s) if s.eq_ignore_ascii_case("true") => Value::Bool(true),
            Literal::String(s) if s.eq_ignore_ascii_case("false") => Value::Bool(false),
            other => return Err(unexpected(other, target.type_path())),
        },
        PrimitiveType::Char => match &literal {
            Literal::String(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::Char(c),
                    _ => return Err(format!("String '{s}' must be exactly one character long.")),
                }
            }
            other => return Err(unexpected(other, target.type_path())),
        },
        PrimitiveType::Float32 | PrimitiveType::Float64 => match &literal {
            Literal::Integer(v) => Value::Float(*v as f64),
            Literal::Float(f) => Value::Float(*f),
            Literal::String(s) => Value::Float(
                s.trim()
                    .parse::<f64>()
                    .map_err(|_| format!("Input string '{s}' is not a valid number."))?,
            ),
            other => return Err(unexpected(other, target.type_path())),
        },
        PrimitiveType::String => match literal {
            Literal::String(s) => Value::String(s),
            Literal::Integer(v) => Value::String(v.to_string()),
            Literal::Float(f) => Value::String(f.to_string()),
            Literal::Boolean(b) => Value::String(b.to_string()),
            Literal::Date(d) => Value::String(date_text(&d)),
            Literal::Bytes(b) => Value::String(STANDARD.encode(b)),
            Literal::Null | Literal::Undefined => Value::Null,
        },
        PrimitiveType::DateTime => match &literal {
            Literal::Date(d) => Value::Date(*d),
            Literal::String(s) => Value::Date(
                DateTime::parse_from_rfc3339(s.trim())
                    .map_err(|e| format!("String '{s}' is not a valid date: {e}."))?,
            ),
            other => return Err(unexpected(other, target.type_path())),
        },
        PrimitiveType::Guid => match &literal {
            Literal::String(s) => Value::Guid(
                Uuid::parse_str(s.trim()).map_err(|e| format!("String '{s}' is not a valid guid: {e}."))?,
            ),
            Literal::Bytes(b) => {
                Value::Guid(Uuid::from_slice(b).map_err(|e| format!("Bytes are not a valid guid: {e}."))?)
            }
            other => return Err(unexpected(other, target.type_path())),
        },
        PrimitiveType::Bytes => match &literal {
            Literal::Bytes(b) => Value::Bytes(b.clone()),
            Literal::String(s) => Value::Bytes(
                STANDARD
                    .decode(s)
                    .map_err(|e| format!("String '{s}' is not valid base64: {e}."))?,
            ),
            other => return Err(unexpected(other, target.type_path())),
        },
        _ => Value::Int(integer(&literal, target)?),
    })
}

/// Text of a dictionary key. Enumerations use their variant name.
pub(crate) fn key_to_string(registry: &TypeRegistry, key: &Value) -> Option<String> {
    Some(match key {
        Value::String(s) => s.clone(),
        Value::Int(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Char(c) => c.to_string(),
        Value::Date(d) => date_text(d),
        Value::Guid(g) => g.hyphenated().to_string(),
        Value::Enum(e) => match registry.get(e.ty).map(|info| info.kind()) {
            Some(TypeKind::Enum(info)) => info
                .name_of(e.value)
                .map_or_else(|| e.value.to_string(), String::from),
            _ => e.value.to_string(),
        },
        Value::Bytes(b) => STANDARD.encode(b),
        Value::Null | Value::Object(_) | Value::Node(_) => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::{coerce_literal, key_to_string, value_to_literal};
    use crate::info::{EnumInfo, PrimitiveType, TypeBuilder, TypeKey};
    use crate::registry::TypeRegistry;
    use crate::token::Literal;
    use crate::value::{EnumValue, Value};

    #[test]
    fn integer_ranges() {
        let ok = coerce_literal(Literal::Integer(255), PrimitiveType::UInt8, None, false);
        assert_eq!(ok, Ok(Value::Int(255)));
        assert!(coerce_literal(Literal::Integer(256), PrimitiveType::UInt8, None, false).is_err());
        assert!(coerce_literal(Literal::Integer(-1), PrimitiveType::UInt32, None, false).is_err());
        assert_eq!(
            coerce_literal(Literal::String(" 42 ".into()), PrimitiveType::Int32, None, false),
            Ok(Value::Int(42))
        );
        assert!(coerce_literal(Literal::Float(1.5), PrimitiveType::Int32, None, false).is_err());
        assert!(coerce_literal(Literal::Float(1.8e19), PrimitiveType::UInt64, None, false).is_err());
    }

    #[test]
    fn nulls() {
        assert!(coerce_literal(Literal::Null, PrimitiveType::Int32, None, false).is_err());
        assert_eq!(
            coerce_literal(Literal::Null, PrimitiveType::Int32, None, true),
            Ok(Value::Null)
        );
        assert_eq!(
            coerce_literal(Literal::String(String::new()), PrimitiveType::Int32, None, true),
            Ok(Value::Null)
        );
        assert_eq!(
            coerce_literal(Literal::String(String::new()), PrimitiveType::String, None, true),
            Ok(Value::String(String::new()))
        );
    }

    #[test]
    fn strings_into_leaves() {
        let guid = coerce_literal(
            Literal::String("67e55044-10b1-426f-9247-bb680e5fe0c8".into()),
            PrimitiveType::Guid,
            None,
            false,
        )
        .unwrap();
        assert!(matches!(guid, Value::Guid(_)));
        assert_eq!(
            value_to_literal(&guid),
            Some(Literal::String("67e55044-10b1-426f-9247-bb680e5fe0c8".into()))
        );

        let bytes = coerce_literal(Literal::String("AQID".into()), PrimitiveType::Bytes, None, false);
        assert_eq!(bytes, Ok(Value::Bytes(vec![1, 2, 3])));

        let date = coerce_literal(
            Literal::String("2024-05-01T10:00:00+02:00".into()),
            PrimitiveType::DateTime,
            None,
            false,
        );
        assert!(matches!(date, Ok(Value::Date(_))));
        assert!(coerce_literal(Literal::String("ab".into()), PrimitiveType::Char, None, false).is_err());
    }

    #[test]
    fn enums() {
        let info = EnumInfo {
            variants: vec![("Red".into(), 1), ("Green".into(), 2)],
        };
        let ty = TypeKey::ANY;
        assert_eq!(
            coerce_literal(Literal::String("green".into()), PrimitiveType::Int64, Some((ty, &info)), false),
            Ok(Value::Enum(EnumValue { ty, value: 2 }))
        );
        assert_eq!(
            coerce_literal(Literal::Integer(7), PrimitiveType::Int64, Some((ty, &info)), false),
            Ok(Value::Enum(EnumValue { ty, value: 7 }))
        );
        assert!(
            coerce_literal(Literal::String("Blue".into()), PrimitiveType::Int64, Some((ty, &info)), false)
                .is_err()
        );
    }

    #[test]
    fn dictionary_keys() {
        let mut registry = TypeRegistry::new();
        let color = registry
            .register("demo::Color", TypeBuilder::enumeration([("Red", 1), ("Green", 2)]))
            .unwrap();
        let key = Value::Enum(EnumValue { ty: color, value: 2 });
        assert_eq!(key_to_string(&registry, &key).as_deref(), Some("Green"));
        assert_eq!(key_to_string(&registry, &Value::Int(5)).as_deref(), Some("5"));
        assert_eq!(key_to_string(&registry, &Value::Null), None);
    }
}
