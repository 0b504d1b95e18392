use core::fmt;

// -----------------------------------------------------------------------------
// PrimitiveType

/// Leaf value types understood natively by the engine.
///
/// Each primitive has a builtin registration at a fixed [`TypeKey`],
/// see [`PrimitiveType::key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveType {
    Boolean,
    Char,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    DateTime,
    Guid,
    Bytes,
}

impl PrimitiveType {
    /// All primitives in registration order.
    pub const ALL: [PrimitiveType; 16] = [
        Self::Boolean,
        Self::Char,
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::UInt8,
        Self::UInt16,
        Self::UInt32,
        Self::UInt64,
        Self::Float32,
        Self::Float64,
        Self::String,
        Self::DateTime,
        Self::Guid,
        Self::Bytes,
    ];

    /// The builtin type key of this primitive.
    #[inline]
    pub const fn key(self) -> TypeKey {
        TypeKey(1 + self as u32)
    }

    /// Inverse of [`PrimitiveType::key`].
    pub fn from_key(key: TypeKey) -> Option<Self> {
        match key.0 {
            1..=16 => Some(Self::ALL[(key.0 - 1) as usize]),
            _ => None,
        }
    }

    /// The registered type path, e.g. `"i32"`.
    pub const fn type_path(self) -> &'static str {
        match self {
            Self::Boolean => "bool",
            Self::Char => "char",
            Self::Int8 => "i8",
            Self::Int16 => "i16",
            Self::Int32 => "i32",
            Self::Int64 => "i64",
            Self::UInt8 => "u8",
            Self::UInt16 => "u16",
            Self::UInt32 => "u32",
            Self::UInt64 => "u64",
            Self::Float32 => "f32",
            Self::Float64 => "f64",
            Self::String => "String",
            Self::DateTime => "DateTime",
            Self::Guid => "Guid",
            Self::Bytes => "Bytes",
        }
    }

    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::UInt8
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
        )
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// `String` and `Bytes` accept null without a nullable wrapper.
    #[inline]
    pub const fn is_reference_like(self) -> bool {
        matches!(self, Self::String | Self::Bytes)
    }

    /// Inclusive integer range, for integer primitives.
    pub const fn integer_range(self) -> Option<(i128, i128)> {
        Some(match self {
            Self::Int8 => (i8::MIN as i128, i8::MAX as i128),
            Self::Int16 => (i16::MIN as i128, i16::MAX as i128),
            Self::Int32 => (i32::MIN as i128, i32::MAX as i128),
            Self::Int64 => (i64::MIN as i128, i64::MAX as i128),
            Self::UInt8 => (0, u8::MAX as i128),
            Self::UInt16 => (0, u16::MAX as i128),
            Self::UInt32 => (0, u32::MAX as i128),
            // Values are carried as i64.
            Self::UInt64 => (0, i64::MAX as i128),
            _ => return None,
        })
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_path())
    }
}

// -----------------------------------------------------------------------------
// TypeKey

/// Index of a type in a [`TypeRegistry`](crate::registry::TypeRegistry).
///
/// Builtin types live at fixed keys, exposed as associated constants.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(pub(crate) u32);

impl TypeKey {
    /// The root type every other type is assignable to.
    pub const ANY: TypeKey = TypeKey(0);

    pub const BOOL: TypeKey = PrimitiveType::Boolean.key();
    pub const CHAR: TypeKey = PrimitiveType::Char.key();
    pub const I8: TypeKey = PrimitiveType::Int8.key();
    pub const I16: TypeKey = PrimitiveType::Int16.key();
    pub const I32: TypeKey = PrimitiveType::Int32.key();
    pub const I64: TypeKey = PrimitiveType::Int64.key();
    pub const U8: TypeKey = PrimitiveType::UInt8.key();
    pub const U16: TypeKey = PrimitiveType::UInt16.key();
    pub const U32: TypeKey = PrimitiveType::UInt32.key();
    pub const U64: TypeKey = PrimitiveType::UInt64.key();
    pub const F32: TypeKey = PrimitiveType::Float32.key();
    pub const F64: TypeKey = PrimitiveType::Float64.key();
    pub const STRING: TypeKey = PrimitiveType::String.key();
    pub const DATE_TIME: TypeKey = PrimitiveType::DateTime.key();
    pub const GUID: TypeKey = PrimitiveType::Guid.key();
    pub const BYTES: TypeKey = PrimitiveType::Bytes.key();

    /// Any document tree value.
    pub const NODE: TypeKey = TypeKey(17);
    /// A document tree object.
    pub const NODE_OBJECT: TypeKey = TypeKey(18);
    /// A document tree array.
    pub const NODE_ARRAY: TypeKey = TypeKey(19);

    pub(crate) const BUILTIN_COUNT: u32 = 20;

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_builtin(self) -> bool {
        self.0 < Self::BUILTIN_COUNT
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{PrimitiveType, TypeKey};

    #[test]
    fn primitive_keys() {
        for p in PrimitiveType::ALL {
            assert_eq!(PrimitiveType::from_key(p.key()), Some(p));
        }
        assert_eq!(TypeKey::I32, PrimitiveType::Int32.key());
        assert_eq!(PrimitiveType::from_key(TypeKey::ANY), None);
        assert_eq!(PrimitiveType::from_key(TypeKey::NODE), None);
    }

    #[test]
    fn integer_range() {
        assert_eq!(PrimitiveType::UInt8.integer_range(), Some((0, 255)));
        assert_eq!(PrimitiveType::Float32.integer_range(), None);
    }
}
