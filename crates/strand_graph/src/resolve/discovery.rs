//! Member discovery: which members of a type become properties, under
//! which names and in which order.

use alloc::string::String;
use alloc::vec::Vec;

use log::trace;

use crate::attrs::{
    AttributeTarget, DefaultValue, ExtensionData, Ignore, PropertyOptions, ShouldSerialize,
    UseConverter,
};
use crate::contract::{
    DynamicContract, ExtensionDataMember, ObjectContract, Property, PropertyCollection,
};
use crate::error::{ContractIssue, Error, Result};
use crate::info::{MemberInfo, MemberKind, TypeInfo, TypeKey};
use crate::resolve::build::{contract_base, item_settings, shape_type};
use crate::resolve::{ResolveContext, constructors};
use crate::settings::MemberSerialization;

// -----------------------------------------------------------------------------
// Contracts

/// Builtin object contract: discovered properties, the selected creator
/// and the extension data member.
pub fn object_contract<'a>(cx: &ResolveContext<'a>, info: &'a TypeInfo) -> Result<ObjectContract> {
    let base = contract_base(cx, info)?;
    let shape = shape_type(cx, info)?;
    let created = cx.type_info(base.created_type)?;
    let container = cx.container_options(shape);
    let mode = container
        .and_then(|c| c.member_serialization)
        .unwrap_or(cx.options.member_serialization);

    let properties = discover_properties(cx, created, mode)?;
    let (creator, creator_parameters) = constructors::select_creator(cx, created, &properties)?;
    let extension_data = extension_data_member(cx, created)?;

    Ok(ObjectContract {
        items: item_settings(container),
        member_serialization: mode,
        item_required: container.and_then(|c| c.item_required),
        missing_member_handling: container.and_then(|c| c.missing_member_handling),
        properties,
        creator,
        creator_parameters,
        extension_data,
        naming: cx.options.naming.clone(),
        base,
    })
}

pub fn dynamic_contract<'a>(cx: &ResolveContext<'a>, info: &'a TypeInfo) -> Result<DynamicContract> {
    let base = contract_base(cx, info)?;
    let shape = shape_type(cx, info)?;
    let created = cx.type_info(base.created_type)?;
    let container = cx.container_options(shape);
    let mode = container
        .and_then(|c| c.member_serialization)
        .unwrap_or(cx.options.member_serialization);

    Ok(DynamicContract {
        items: item_settings(container),
        properties: discover_properties(cx, created, mode)?,
        naming: cx.options.naming.clone(),
        base,
    })
}

// -----------------------------------------------------------------------------
// Members

/// Members of `info` and its bases, base members first. A member redeclared
/// by a derived type replaces the base member in place.
fn visible_members<'a>(cx: &ResolveContext<'a>, info: &'a TypeInfo) -> Vec<(&'a TypeInfo, &'a MemberInfo)> {
    let mut out: Vec<(&TypeInfo, &MemberInfo)> = Vec::new();
    for level in cx.registry.base_chain(info.key()).into_iter().rev() {
        for member in level.members() {
            match out.iter_mut().find(|(_, m)| m.name() == member.name()) {
                Some(slot) => *slot = (level, member),
                None => out.push((level, member)),
            }
        }
    }
    out
}

/// `PropertyOptions` of a member: its own, else the one declared on a
/// same-named member of an implemented interface.
fn property_options<'a>(
    cx: &ResolveContext<'a>,
    owner: &'a TypeInfo,
    member: &'a MemberInfo,
) -> Result<Option<&'a PropertyOptions>> {
    if let Some(options) = cx
        .attributes(AttributeTarget::Member(owner, member))
        .get::<PropertyOptions>()
    {
        return Ok(Some(options));
    }
    if owner.is_interface() {
        return Ok(None);
    }

    let mut found: Option<&PropertyOptions> = None;
    for key in cx.registry.all_interfaces(owner.key()) {
        let Some(interface) = cx.registry.get(key) else {
            continue;
        };
        let Some(declared) = interface.member(member.name()) else {
            continue;
        };
        let Some(options) = cx
            .attributes(AttributeTarget::Member(interface, declared))
            .get::<PropertyOptions>()
        else {
            continue;
        };
        match found {
            Some(previous) if previous.name != options.name => {
                return Err(Error::contract(
                    owner.path(),
                    ContractIssue::AmbiguousInterfaceMember(member.name().into()),
                ));
            }
            Some(_) => {}
            None => found = Some(options),
        }
    }
    Ok(found)
}

fn is_serializable(
    cx: &ResolveContext<'_>,
    owner: &TypeInfo,
    member: &MemberInfo,
    mode: MemberSerialization,
    has_options: bool,
) -> bool {
    let attrs = cx.attributes(AttributeTarget::Member(owner, member));
    if attrs.contains::<ExtensionData>() {
        return false;
    }
    match mode {
        MemberSerialization::OptOut => member.is_public() || has_options,
        MemberSerialization::OptIn => has_options,
        MemberSerialization::Fields => member.kind() == MemberKind::Field,
    }
}

/// Builtin property construction for one member.
pub fn create_property<'a>(
    cx: &ResolveContext<'a>,
    owner: &'a TypeInfo,
    member: &'a MemberInfo,
) -> Result<Property> {
    let attrs = cx.attributes(AttributeTarget::Member(owner, member));
    let options = property_options(cx, owner, member)?;
    let naming = &cx.options.naming;

    let name = match options.and_then(|o| o.name.as_deref()) {
        Some(explicit) => naming.property_name(explicit, true),
        None => naming.property_name(member.name(), false),
    };

    let mut property = Property::new(name, member.ty(), owner.key());
    property.underlying_name = member.name().into();
    property.getter = member.getter().cloned();
    property.setter = member.setter().cloned();

    let has_options = options.is_some();
    // Non-public fields only get here in `Fields` mode or when annotated.
    let private_field = member.kind() == MemberKind::Field && !member.is_public();
    property.has_member_attribute = has_options;
    property.readable = member.is_readable() && (member.is_public() || has_options || private_field);
    property.writable = member.is_writable()
        && (member.setter_visibility().is_public() || has_options || private_field);
    property.ignored = attrs.contains::<Ignore>();

    if let Some(o) = options {
        property.required = o.required;
        property.order = o.order;
        property.null_value_handling = o.null_value_handling;
        property.default_value_handling = o.default_value_handling;
        property.reference_loop_handling = o.reference_loop_handling;
        property.object_creation_handling = o.object_creation_handling;
        property.type_name_handling = o.type_name_handling;
        property.is_reference = o.is_reference;
        property.item_is_reference = o.item_is_reference;
        property.item_reference_loop_handling = o.item_reference_loop_handling;
        property.item_type_name_handling = o.item_type_name_handling;
        property.item_converter = o.item_converter.clone();
    }
    property.default_value = attrs.get::<DefaultValue>().map(|d| d.0.clone());
    property.converter = attrs.get::<UseConverter>().map(|c| c.0.clone());
    property.should_serialize = attrs.get::<ShouldSerialize>().cloned();
    Ok(property)
}

/// Whether `a` is declared on a type deriving from (or implementing) the
/// type declaring `b`.
fn more_derived(cx: &ResolveContext<'_>, a: TypeKey, b: TypeKey) -> bool {
    a != b && cx.registry.is_assignable(a, b)
}

/// Adds a property, resolving serialized-name collisions between levels of
/// the hierarchy in favor of the most derived declaration.
fn add_property(
    cx: &ResolveContext<'_>,
    info: &TypeInfo,
    list: &mut Vec<Property>,
    property: Property,
) -> Result<()> {
    let Some(index) = list.iter().position(|p| p.name == property.name) else {
        list.push(property);
        return Ok(());
    };
    if property.ignored {
        return Ok(());
    }
    let existing = &list[index];
    if existing.ignored || more_derived(cx, property.declaring_type, existing.declaring_type) {
        trace!(
            "`{}`: property '{}' of `{:?}` hides the one of `{:?}`",
            info.path(),
            property.name,
            property.declaring_type,
            existing.declaring_type
        );
        list[index] = property;
        return Ok(());
    }
    if more_derived(cx, existing.declaring_type, property.declaring_type) {
        return Ok(());
    }
    Err(Error::contract(
        info.path(),
        ContractIssue::DuplicateProperty(property.name),
    ))
}

pub(crate) fn discover_properties<'a>(
    cx: &ResolveContext<'a>,
    info: &'a TypeInfo,
    mode: MemberSerialization,
) -> Result<PropertyCollection> {
    let mut list: Vec<Property> = Vec::new();
    for (owner, member) in visible_members(cx, info) {
        let has_options = property_options(cx, owner, member)?.is_some();
        if !is_serializable(cx, owner, member, mode, has_options) {
            continue;
        }
        let property = cx.factory.create_property(cx, owner, member)?;
        add_property(cx, info, &mut list, property)?;
    }

    let mut properties = PropertyCollection::new();
    for property in list {
        properties
            .push(property)
            .map_err(|issue| Error::contract(info.path(), issue))?;
    }
    properties.sort_by_order();
    Ok(properties)
}

// -----------------------------------------------------------------------------
// Extension data

fn extension_data_member<'a>(
    cx: &ResolveContext<'a>,
    info: &'a TypeInfo,
) -> Result<Option<ExtensionDataMember>> {
    let mut found: Option<ExtensionDataMember> = None;
    for (owner, member) in visible_members(cx, info) {
        let attrs = cx.attributes(AttributeTarget::Member(owner, member));
        let Some(flags) = attrs.get::<ExtensionData>() else {
            continue;
        };
        if found.is_some() {
            return Err(Error::contract(info.path(), ContractIssue::MultipleExtensionData));
        }

        let invalid = |reason: &'static str| {
            Error::contract(
                info.path(),
                ContractIssue::InvalidExtensionData {
                    member: String::from(member.name()),
                    reason,
                },
            )
        };
        let map = cx
            .registry
            .get(member.ty())
            .and_then(TypeInfo::map)
            .ok_or_else(|| invalid("must be a dictionary"))?;
        if cx.registry.non_nullable(map.key) != TypeKey::STRING {
            return Err(invalid("must have string keys"));
        }
        if member.getter().is_none() {
            return Err(invalid("must have a getter"));
        }

        found = Some(ExtensionDataMember {
            member_name: member.name().into(),
            getter: member.getter().cloned(),
            setter: member.setter().cloned(),
            map_type: member.ty(),
            value_type: map.value,
            write: flags.write,
            read: flags.read,
        });
    }
    Ok(found)
}
