//! Policies controlling the graph walkers.

use alloc::sync::Arc;
use alloc::vec::Vec;

use bitflags::bitflags;

use crate::binder::{DefaultTypeBinder, TypeBinder};
use crate::convert::Converter;
use crate::error::ErrorContext;

// -----------------------------------------------------------------------------
// Policy enums

/// Which members of an object participate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemberSerialization {
    /// Public members unless ignored, plus annotated non-public ones.
    #[default]
    OptOut,
    /// Only annotated members.
    OptIn,
    /// Every field, public or not; properties are skipped.
    Fields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NullValueHandling {
    #[default]
    Include,
    Ignore,
}

bitflags! {
    /// Treatment of members holding their type's default value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DefaultValueHandling: u8 {
        /// Skip default values when writing and when assigning read values.
        const IGNORE = 1;
        /// Assign the default value to members absent from the input.
        const POPULATE = 2;
        const IGNORE_AND_POPULATE = Self::IGNORE.bits() | Self::POPULATE.bits();
    }
}

impl DefaultValueHandling {
    /// Write and read every value.
    pub const INCLUDE: Self = Self::empty();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReferenceLoopHandling {
    #[default]
    Error,
    Ignore,
    Serialize,
}

bitflags! {
    /// Which composites get identity metadata.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PreserveReferences: u8 {
        const OBJECTS = 1;
        const ARRAYS = 2;
        const ALL = Self::OBJECTS.bits() | Self::ARRAYS.bits();
    }
}

impl PreserveReferences {
    pub const NONE: Self = Self::empty();
}

bitflags! {
    /// When runtime type names are written and honored.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeNameHandling: u8 {
        const OBJECTS = 1;
        const ARRAYS = 2;
        const ALL = Self::OBJECTS.bits() | Self::ARRAYS.bits();
        /// Only when the runtime type differs from the declared type.
        const AUTO = 4;
    }
}

impl TypeNameHandling {
    pub const NONE: Self = Self::empty();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MetadataPropertyHandling {
    /// Metadata must come first in an object.
    #[default]
    Default,
    /// Buffer each object so metadata may appear anywhere in it.
    ReadAhead,
    /// Treat metadata names as ordinary properties.
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConstructorHandling {
    #[default]
    Default,
    AllowNonPublicDefaultConstructor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObjectCreationHandling {
    /// Reuse existing values, create new ones when absent.
    #[default]
    Auto,
    Reuse,
    /// Always create new values.
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MissingMemberHandling {
    #[default]
    Ignore,
    Error,
}

/// Whether a property must appear in the input and may be null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Required {
    #[default]
    Default,
    /// Must be present; may be null.
    AllowNull,
    /// Must be present and non-null.
    Always,
    /// May be absent; must not be null when present.
    DisallowNull,
}

impl Required {
    #[inline]
    pub const fn requires_presence(self) -> bool {
        matches!(self, Required::AllowNull | Required::Always)
    }

    #[inline]
    pub const fn forbids_null(self) -> bool {
        matches!(self, Required::Always | Required::DisallowNull)
    }
}

// -----------------------------------------------------------------------------
// SerializerSettings

/// Global handler offered every recoverable error after the object's own
/// `on_error` callbacks.
pub type ErrorHandler = Arc<dyn Fn(&mut ErrorContext<'_>) + Send + Sync>;

/// Configuration of a [`GraphSerializer`](crate::GraphSerializer).
///
/// # Example
///
/// ```
/// use strand_graph::settings::{PreserveReferences, SerializerSettings, TypeNameHandling};
///
/// let settings = SerializerSettings::default()
///     .with_preserve_references(PreserveReferences::OBJECTS)
///     .with_type_name_handling(TypeNameHandling::AUTO)
///     .with_max_depth(Some(32));
///
/// assert_eq!(settings.max_depth, Some(32));
/// ```
#[derive(Clone)]
pub struct SerializerSettings {
    pub null_value_handling: NullValueHandling,
    pub default_value_handling: DefaultValueHandling,
    pub reference_loop_handling: ReferenceLoopHandling,
    pub preserve_references: PreserveReferences,
    pub type_name_handling: TypeNameHandling,
    pub metadata_property_handling: MetadataPropertyHandling,
    pub constructor_handling: ConstructorHandling,
    pub object_creation_handling: ObjectCreationHandling,
    pub missing_member_handling: MissingMemberHandling,
    /// Maximum container nesting; `None` disables the check.
    pub max_depth: Option<usize>,
    pub binder: Arc<dyn TypeBinder>,
    pub converters: Vec<Arc<dyn Converter>>,
    pub error_handler: Option<ErrorHandler>,
}

impl Default for SerializerSettings {
    fn default() -> Self {
        Self {
            null_value_handling: NullValueHandling::default(),
            default_value_handling: DefaultValueHandling::INCLUDE,
            reference_loop_handling: ReferenceLoopHandling::default(),
            preserve_references: PreserveReferences::NONE,
            type_name_handling: TypeNameHandling::NONE,
            metadata_property_handling: MetadataPropertyHandling::default(),
            constructor_handling: ConstructorHandling::default(),
            object_creation_handling: ObjectCreationHandling::default(),
            missing_member_handling: MissingMemberHandling::default(),
            max_depth: Some(64),
            binder: Arc::new(DefaultTypeBinder),
            converters: Vec::new(),
            error_handler: None,
        }
    }
}

macro_rules! with_setters {
    ($($(#[$meta:meta])* $fn_name:ident => $field:ident: $ty:ty),* $(,)?) => {
        impl SerializerSettings {
            $(
                $(#[$meta])*
                #[inline]
                pub fn $fn_name(mut self, value: $ty) -> Self {
                    self.$field = value;
                    self
                }
            )*
        }
    };
}

with_setters! {
    with_null_value_handling => null_value_handling: NullValueHandling,
    with_default_value_handling => default_value_handling: DefaultValueHandling,
    with_reference_loop_handling => reference_loop_handling: ReferenceLoopHandling,
    with_preserve_references => preserve_references: PreserveReferences,
    with_type_name_handling => type_name_handling: TypeNameHandling,
    with_metadata_property_handling => metadata_property_handling: MetadataPropertyHandling,
    with_constructor_handling => constructor_handling: ConstructorHandling,
    with_object_creation_handling => object_creation_handling: ObjectCreationHandling,
    with_missing_member_handling => missing_member_handling: MissingMemberHandling,
    with_max_depth => max_depth: Option<usize>,
    with_binder => binder: Arc<dyn TypeBinder>,
}

impl SerializerSettings {
    #[inline]
    pub fn with_converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converters.push(converter);
        self
    }

    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut ErrorContext<'_>) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }
}
