use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;

use crate::heap::Heap;
use crate::info::{CustomAttributes, TypeKey, impl_custom_attributes_fn};
use crate::value::{ObjectId, Value};

/// Error type returned by user supplied closures.
pub type BoxError = Box<dyn core::error::Error + Send + Sync>;

/// Computed getter of a member.
pub type GetFn = Arc<dyn Fn(&Heap, ObjectId) -> Result<Value, BoxError> + Send + Sync>;

/// Computed setter of a member.
pub type SetFn = Arc<dyn Fn(&mut Heap, ObjectId, Value) -> Result<(), BoxError> + Send + Sync>;

// -----------------------------------------------------------------------------
// Visibility

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    #[default]
    Public,
    NonPublic,
}

impl Visibility {
    #[inline]
    pub const fn is_public(self) -> bool {
        matches!(self, Visibility::Public)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Field,
    Property,
}

// -----------------------------------------------------------------------------
// Getter / Setter

/// How a member value is read from an instance.
#[derive(Clone)]
pub enum Getter {
    Slot(usize),
    Computed(GetFn),
}

impl Getter {
    pub fn get(&self, heap: &Heap, target: ObjectId) -> Result<Value, BoxError> {
        match self {
            Getter::Slot(index) => heap
                .get(target)
                .and_then(|inst| inst.slot(*index))
                .cloned()
                .ok_or_else(|| BoxError::from(format!("slot {index} is not present on {target:?}"))),
            Getter::Computed(get) => get(heap, target),
        }
    }
}

/// How a member value is written to an instance.
#[derive(Clone)]
pub enum Setter {
    Slot(usize),
    Computed(SetFn),
}

impl Setter {
    pub fn set(&self, heap: &mut Heap, target: ObjectId, value: Value) -> Result<(), BoxError> {
        match self {
            Setter::Slot(index) => {
                let slot = heap
                    .get_mut(target)
                    .and_then(|inst| inst.slots.get_mut(*index))
                    .ok_or_else(|| {
                        BoxError::from(format!("slot {index} is not present on {target:?}"))
                    })?;
                *slot = value;
                Ok(())
            }
            Setter::Computed(set) => set(heap, target, value),
        }
    }
}

// -----------------------------------------------------------------------------
// MemberInfo

/// A field or property declared on a type.
///
/// The getter and setter carry their own visibility; a member without a
/// setter is read-only, one without a getter is write-only.
#[derive(Clone)]
pub struct MemberInfo {
    pub(crate) name: String,
    pub(crate) ty: TypeKey,
    pub(crate) kind: MemberKind,
    pub(crate) declaring_type: TypeKey,
    pub(crate) getter: Option<Getter>,
    pub(crate) setter: Option<Setter>,
    pub(crate) visibility: Visibility,
    pub(crate) setter_visibility: Visibility,
    pub(crate) attributes: Option<Arc<CustomAttributes>>,
}

impl MemberInfo {
    impl_custom_attributes_fn!(attributes);

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    #[inline]
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    #[inline]
    pub fn declaring_type(&self) -> TypeKey {
        self.declaring_type
    }

    #[inline]
    pub fn getter(&self) -> Option<&Getter> {
        self.getter.as_ref()
    }

    #[inline]
    pub fn setter(&self) -> Option<&Setter> {
        self.setter.as_ref()
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[inline]
    pub fn setter_visibility(&self) -> Visibility {
        self.setter_visibility
    }

    #[inline]
    pub fn is_public(&self) -> bool {
        self.visibility.is_public()
    }

    #[inline]
    pub fn is_readable(&self) -> bool {
        self.getter.is_some()
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }
}

impl core::fmt::Debug for MemberInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemberInfo")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("kind", &self.kind)
            .field("visibility", &self.visibility)
            .field("readable", &self.is_readable())
            .field("writable", &self.is_writable())
            .finish()
    }
}
