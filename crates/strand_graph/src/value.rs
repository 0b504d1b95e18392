use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use chrono::{DateTime, FixedOffset};
use uuid::Uuid;

use crate::info::TypeKey;
use crate::token::Node;

// -----------------------------------------------------------------------------
// ObjectId

slotmap::new_key_type! {
    /// Identity of an instance living in a [`Heap`](crate::heap::Heap).
    ///
    /// Two values refer to the same object exactly when their ids are equal,
    /// regardless of the instances' contents.
    pub struct ObjectId;
}

// -----------------------------------------------------------------------------
// EnumValue

/// A value of a registered enumeration type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub ty: TypeKey,
    pub value: i64,
}

// -----------------------------------------------------------------------------
// Value

/// A value stored in an instance slot, collection, or passed as a root.
///
/// Leaf values are held inline; composites are [`Value::Object`] handles into
/// the heap. [`Value::Node`] holds an untyped document fragment, produced
/// when data is read without a concrete target type.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    String(String),
    Date(DateTime<FixedOffset>),
    Guid(Uuid),
    Bytes(Vec<u8>),
    Enum(EnumValue),
    Object(ObjectId),
    Node(Node),
}

impl Value {
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    pub const fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Enum(e) => Some(e.value),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Short lowercase name of the variant, used in diagnostics.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Guid(_) => "guid",
            Value::Bytes(_) => "bytes",
            Value::Enum(_) => "enum",
            Value::Object(_) => "object",
            Value::Node(_) => "node",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "'{v}'"),
            Value::String(v) => write!(f, "\"{v}\""),
            Value::Date(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Guid(v) => write!(f, "{v}"),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Enum(v) => write!(f, "{}", v.value),
            Value::Object(id) => write!(f, "{id:?}"),
            Value::Node(_) => f.write_str("<node>"),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                #[inline]
                fn from(value: $ty) -> Self {
                    Value::$variant(value $(as $cast)?)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int,
    u8 => Int as i64,
    u16 => Int as i64,
    u32 => Int as i64,
    f32 => Float as f64,
    f64 => Float,
    char => Char,
    String => String,
    Uuid => Guid,
    Vec<u8> => Bytes,
    ObjectId => Object,
    Node => Node,
    DateTime<FixedOffset> => Date,
}

impl From<&str> for Value {
    #[inline]
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    #[inline]
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::Value;

    #[test]
    fn conversions() {
        assert_eq!(Value::from(3_u8), Value::Int(3));
        assert_eq!(Value::from("a"), Value::String("a".into()));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(1.5_f32)), Value::Float(1.5));
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::Int(4).as_f64(), Some(4.0));
        assert_eq!(Value::Float(4.5).as_i64(), None);
        assert!(Value::default().is_null());
        assert_eq!(Value::Bool(true).kind_name(), "bool");
    }
}
