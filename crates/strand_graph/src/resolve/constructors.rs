//! Selection of the constructor used to create objects when reading.

use alloc::string::String;
use log::debug;
use strand_utils::vec::FastVec;

use crate::attrs::{AttributeTarget, PropertyOptions, SerializationConstructor};
use crate::contract::{CreatorKind, ObjectCreator, Property, PropertyCollection};
use crate::error::{ContractIssue, Error, Result};
use crate::info::{ConstructorInfo, ParameterInfo, TypeInfo};
use crate::resolve::ResolveContext;

/// Picks the creator of an object type, in this order:
///
/// 1. the constructor marked [`SerializationConstructor`] (at most one);
/// 2. when every property is read-only, a constructor whose parameters
///    cover all of them by name and type;
/// 3. the only public constructor, if it takes parameters and there is no
///    public parameterless one.
///
/// Returns `None` when the default constructor should be used, along with
/// the properties bound to the creator's parameters.
pub(crate) fn select_creator<'a>(
    cx: &ResolveContext<'a>,
    info: &'a TypeInfo,
    properties: &PropertyCollection,
) -> Result<(Option<ObjectCreator>, PropertyCollection)> {
    let ctors = info.constructors();

    let mut annotated = ctors.iter().filter(|c| {
        cx.attributes(AttributeTarget::Constructor(info, c))
            .contains::<SerializationConstructor>()
    });
    let selected = match (annotated.next(), annotated.next()) {
        (Some(_), Some(_)) => {
            return Err(Error::contract(
                info.path(),
                ContractIssue::MultipleSerializationConstructors,
            ));
        }
        (Some(ctor), None) => Some((ctor, CreatorKind::Annotated)),
        (None, _) => immutable_constructor(info, properties)
            .map(|c| (c, CreatorKind::Immutable))
            .or_else(|| parameterized_constructor(info).map(|c| (c, CreatorKind::Parameterized))),
    };

    let Some((ctor, kind)) = selected else {
        return Ok((None, PropertyCollection::new()));
    };
    debug!("`{}`: using {kind:?} constructor with {} parameters", info.path(), ctor.parameters().len());

    let mut parameters = PropertyCollection::new();
    for param in ctor.parameters() {
        let property = parameter_property(cx, info, param, properties);
        parameters
            .push(property)
            .map_err(|issue| Error::contract(info.path(), issue))?;
    }
    let creator = ObjectCreator {
        constructor: ctor.clone(),
        kind,
    };
    Ok((Some(creator), parameters))
}

fn matches_name(property: &Property, name: &str) -> bool {
    property.name.eq_ignore_ascii_case(name) || property.underlying_name.eq_ignore_ascii_case(name)
}

fn immutable_constructor<'a>(
    info: &'a TypeInfo,
    properties: &PropertyCollection,
) -> Option<&'a ConstructorInfo> {
    let candidates = properties
        .iter()
        .filter(|p| !p.ignored)
        .collect::<FastVec<&Property, 8>>();
    let candidates = candidates.as_slice();
    if candidates.is_empty() || candidates.iter().any(|p| p.writable) {
        return None;
    }
    info.constructors().iter().find(|ctor| {
        ctor.parameters().len() == candidates.len()
            && candidates.iter().all(|p| {
                ctor.parameters()
                    .iter()
                    .any(|param| param.ty() == p.property_type && matches_name(p, param.name()))
            })
    })
}

fn parameterized_constructor(info: &TypeInfo) -> Option<&ConstructorInfo> {
    let mut public = info.constructors().iter().filter(|c| c.is_public());
    match (public.next(), public.next()) {
        (Some(only), None) if !only.is_default() => Some(only),
        _ => None,
    }
}

/// The property a constructor parameter binds to: the property with the
/// same name (exact, then case-insensitive) retyped to the parameter, or a
/// new property named after the parameter.
fn parameter_property<'a>(
    cx: &ResolveContext<'a>,
    info: &'a TypeInfo,
    param: &'a ParameterInfo,
    properties: &PropertyCollection,
) -> Property {
    let matched = properties
        .iter()
        .find(|p| p.name == param.name() || p.underlying_name == param.name())
        .or_else(|| properties.iter().find(|p| matches_name(p, param.name())));

    let options = cx
        .attributes(AttributeTarget::Parameter(info, param))
        .get::<PropertyOptions>();

    let mut property = match matched {
        Some(member) => {
            let mut property = member.clone();
            property.property_type = param.ty();
            property
        }
        None => {
            let name = match options.and_then(|o| o.name.as_deref()) {
                Some(explicit) => cx.options.naming.property_name(explicit, true),
                None => cx.options.naming.property_name(param.name(), false),
            };
            let mut property = Property::new(name, param.ty(), info.key());
            property.underlying_name = String::from(param.name());
            property
        }
    };
    property.writable = true;
    property.ignored = false;
    if let Some(o) = options {
        property.required = o.required.or(property.required);
    }
    property
}
