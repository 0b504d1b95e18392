use crate::contract::ContractBase;
use crate::info::{DocumentKind, EnumInfo, PrimitiveConversion, PrimitiveType, StringConversion, TypeKey};

/// A leaf value written as a single literal.
#[derive(Clone)]
pub struct PrimitiveContract {
    pub(crate) base: ContractBase,
    /// Wire representation.
    pub(crate) primitive: PrimitiveType,
    pub(crate) enumeration: Option<(TypeKey, EnumInfo)>,
    pub(crate) conversion: Option<PrimitiveConversion>,
}

impl PrimitiveContract {
    #[inline]
    pub fn base(&self) -> &ContractBase {
        &self.base
    }

    #[inline]
    pub fn primitive(&self) -> PrimitiveType {
        self.primitive
    }

    /// The enumeration type and its variants, for enum contracts.
    #[inline]
    pub fn enumeration(&self) -> Option<(TypeKey, &EnumInfo)> {
        self.enumeration.as_ref().map(|(k, e)| (*k, e))
    }

    #[inline]
    pub fn conversion(&self) -> Option<&PrimitiveConversion> {
        self.conversion.as_ref()
    }
}

impl core::fmt::Debug for PrimitiveContract {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PrimitiveContract")
            .field("base", &self.base)
            .field("primitive", &self.primitive)
            .field("enumeration", &self.enumeration)
            .finish_non_exhaustive()
    }
}

/// A value written as its string form.
#[derive(Clone)]
pub struct StringContract {
    pub(crate) base: ContractBase,
    pub(crate) conversion: StringConversion,
}

impl StringContract {
    #[inline]
    pub fn base(&self) -> &ContractBase {
        &self.base
    }

    #[inline]
    pub fn conversion(&self) -> &StringConversion {
        &self.conversion
    }
}

impl core::fmt::Debug for StringContract {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StringContract")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

/// An untyped document tree, passed through unchanged.
#[derive(Clone, Debug)]
pub struct DocumentContract {
    pub(crate) base: ContractBase,
    pub(crate) kind: DocumentKind,
}

impl DocumentContract {
    #[inline]
    pub fn base(&self) -> &ContractBase {
        &self.base
    }

    #[inline]
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }
}
