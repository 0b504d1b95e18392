//! Builtin construction of each contract kind.
//!
//! These are the default bodies of the [`ContractFactory`] hooks, exposed
//! so a custom factory can start from them.
//!
//! [`ContractFactory`]: super::ContractFactory

use alloc::format;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::attrs::{AttributeTarget, ContainerOptions, UseConverter};
use crate::contract::{
    ArrayContract, ContractBase, DictionaryContract, DocumentContract, ItemSettings,
    PrimitiveContract, StringContract,
};
use crate::error::{ContractIssue, Error, Result};
use crate::info::{
    Callbacks, ConstructFn, ConstructorInfo, DocumentKind, PrimitiveType, TypeInfo, TypeKind,
    Visibility,
};
use crate::resolve::ResolveContext;

pub use super::discovery::{create_property, dynamic_contract, object_contract};

// -----------------------------------------------------------------------------
// Shared

/// The type whose shape governs the contract: the wrapped type of a
/// nullable, otherwise `info` itself.
pub(crate) fn shape_type<'a>(cx: &ResolveContext<'a>, info: &'a TypeInfo) -> Result<&'a TypeInfo> {
    match info.kind() {
        TypeKind::Nullable(inner) => cx.type_info(*inner),
        _ => Ok(info),
    }
}

/// Fills the fields every contract kind carries.
pub fn contract_base<'a>(cx: &ResolveContext<'a>, info: &'a TypeInfo) -> Result<ContractBase> {
    let shape = shape_type(cx, info)?;
    let created = cx.type_info(shape.created_type())?;
    let container = cx.container_options(shape);

    let is_class = matches!(created.kind(), TypeKind::Class);
    let is_instantiable = is_class && !created.is_abstract();

    let (default_creator, default_creator_non_public) = if is_class {
        default_constructor(created)
    } else {
        (None, false)
    };

    let mut callbacks = Callbacks::default();
    for level in cx.registry.base_chain(created.key()).iter().rev() {
        callbacks.extend(level.callbacks());
    }

    let converter = cx
        .attributes(AttributeTarget::Type(shape))
        .get::<UseConverter>()
        .map(|c| c.0.clone());

    Ok(ContractBase {
        underlying_type: info.key(),
        created_type: created.key(),
        type_path: info.path().into(),
        is_nullable: info.accepts_null(),
        is_instantiable,
        is_reference: container.and_then(|c| c.is_reference),
        converter,
        default_creator,
        default_creator_non_public,
        callbacks,
    })
}

/// The parameterless constructor, public preferred. A class declaring no
/// constructor at all gets an implicit public one.
fn default_constructor(info: &TypeInfo) -> (Option<ConstructorInfo>, bool) {
    if info.constructors().is_empty() {
        let body: ConstructFn = Arc::new(|_, _, _| Ok(()));
        let implicit = ConstructorInfo {
            parameters: Vec::new(),
            visibility: Visibility::Public,
            body,
            attributes: None,
        };
        return (Some(implicit), false);
    }
    let mut defaults = info.constructors().iter().filter(|c| c.is_default());
    let first = defaults.next();
    match first {
        Some(c) if c.is_public() => (Some(c.clone()), false),
        Some(c) => match defaults.find(|c| c.is_public()) {
            Some(public) => (Some(public.clone()), false),
            None => (Some(c.clone()), true),
        },
        None => (None, false),
    }
}

pub(crate) fn item_settings(container: Option<&ContainerOptions>) -> ItemSettings {
    match container {
        Some(c) => ItemSettings {
            is_reference: c.item_is_reference,
            reference_loop_handling: c.item_reference_loop_handling,
            type_name_handling: c.item_type_name_handling,
            converter: c.item_converter.clone(),
        },
        None => ItemSettings::default(),
    }
}

fn missing_shape(info: &TypeInfo, what: &str) -> Error {
    Error::contract(
        info.path(),
        ContractIssue::Custom(format!("type has no {what} shape")),
    )
}

// -----------------------------------------------------------------------------
// Kinds

pub fn array_contract<'a>(cx: &ResolveContext<'a>, info: &'a TypeInfo) -> Result<ArrayContract> {
    let base = contract_base(cx, info)?;
    let shape = shape_type(cx, info)?;
    let created = cx.type_info(base.created_type)?;
    let list = created
        .list()
        .or_else(|| shape.list())
        .ok_or_else(|| missing_shape(info, "list"))?;

    Ok(ArrayContract {
        items: item_settings(cx.container_options(shape)),
        element_type: list.element,
        fixed_size: list.fixed_size,
        read_only: list.read_only,
        rank: list.rank.max(1),
        creator: list.creator.clone(),
        base,
    })
}

pub fn dictionary_contract<'a>(
    cx: &ResolveContext<'a>,
    info: &'a TypeInfo,
) -> Result<DictionaryContract> {
    let base = contract_base(cx, info)?;
    let shape = shape_type(cx, info)?;
    let created = cx.type_info(base.created_type)?;
    let map = created
        .map()
        .or_else(|| shape.map())
        .ok_or_else(|| missing_shape(info, "map"))?;

    Ok(DictionaryContract {
        items: item_settings(cx.container_options(shape)),
        key_type: map.key,
        value_type: map.value,
        read_only: map.read_only,
        creator: map.creator.clone(),
        naming: cx.options.naming.clone(),
        base,
    })
}

pub fn primitive_contract<'a>(
    cx: &ResolveContext<'a>,
    info: &'a TypeInfo,
) -> Result<PrimitiveContract> {
    let base = contract_base(cx, info)?;
    let shape = shape_type(cx, info)?;

    let (primitive, enumeration, conversion) = match shape.kind() {
        TypeKind::Primitive(p) => (*p, None, None),
        TypeKind::Enum(e) => (PrimitiveType::Int64, Some((shape.key(), e.clone())), None),
        _ => match shape.primitive_conversion() {
            Some(conv) => (conv.primitive, None, Some(conv.clone())),
            None => {
                return Err(Error::contract(
                    info.path(),
                    ContractIssue::Custom("type has no primitive representation".into()),
                ));
            }
        },
    };

    Ok(PrimitiveContract {
        base,
        primitive,
        enumeration,
        conversion,
    })
}

pub fn string_contract<'a>(cx: &ResolveContext<'a>, info: &'a TypeInfo) -> Result<StringContract> {
    let base = contract_base(cx, info)?;
    let shape = shape_type(cx, info)?;
    let conversion = shape
        .string_conversion()
        .ok_or_else(|| missing_shape(info, "string conversion"))?
        .clone();
    Ok(StringContract { base, conversion })
}

pub fn document_contract<'a>(
    cx: &ResolveContext<'a>,
    info: &'a TypeInfo,
) -> Result<DocumentContract> {
    let base = contract_base(cx, info)?;
    let kind = match info.kind() {
        TypeKind::Document(kind) => *kind,
        _ => DocumentKind::Any,
    };
    Ok(DocumentContract { base, kind })
}
