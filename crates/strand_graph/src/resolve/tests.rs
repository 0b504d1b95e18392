use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use super::{ContractFactory, ContractResolve, DefaultContractResolver, ResolveContext};
use crate::attrs::{
    ContainerOptions, ContainerShape, ExtensionData, Ignore, PropertyOptions,
    SerializationConstructor,
};
use crate::contract::{Contract, ContractKind, CreatorKind, ObjectContract};
use crate::error::{ContractIssue, Error, Result};
use crate::info::{
    ConstructorBuilder, ListShape, MemberBuilder, TypeBuilder, TypeInfo, TypeKey,
};
use crate::registry::TypeRegistry;

fn resolver(registry: TypeRegistry) -> DefaultContractResolver {
    DefaultContractResolver::new(Arc::new(registry))
}

fn names(object: &ObjectContract) -> Vec<&str> {
    object.properties().iter().map(|p| p.name()).collect()
}

fn issue(err: Error) -> ContractIssue {
    match err {
        Error::Contract { issue, .. } => issue,
        other => panic!("expected a contract error, got {other}"),
    }
}

#[test]
fn explicit_order_first() {
    let mut registry = TypeRegistry::new();
    let ty = registry
        .register(
            "demo::Ordered",
            TypeBuilder::class()
                .member(
                    MemberBuilder::field("A", TypeKey::I32)
                        .attribute(PropertyOptions::new().order(2)),
                )
                .field("B", TypeKey::I32)
                .member(
                    MemberBuilder::field("C", TypeKey::I32)
                        .attribute(PropertyOptions::new().order(1)),
                )
                .field("D", TypeKey::I32),
        )
        .unwrap();

    let contract = resolver(registry).resolve_contract(ty).unwrap();
    assert_eq!(names(contract.as_object().unwrap()), ["C", "A", "B", "D"]);
}

#[test]
fn resolution_order() {
    let mut registry = TypeRegistry::new();
    let list = registry.list_of(TypeKey::STRING).unwrap();
    let map = registry.map_of(TypeKey::STRING, TypeKey::I32).unwrap();
    let nullable = registry.nullable_of(TypeKey::I32).unwrap();
    let colour = registry
        .register("demo::Colour", TypeBuilder::enumeration([("Red", 0), ("Green", 1)]))
        .unwrap();
    let bag = registry
        .register("demo::Bag", TypeBuilder::class().dynamic().default_constructor())
        .unwrap();
    let forced = registry
        .register(
            "demo::Forced",
            TypeBuilder::class()
                .list(ListShape::new(TypeKey::I32))
                .attribute(ContainerOptions::shaped(ContainerShape::Object))
                .field("Count", TypeKey::I32),
        )
        .unwrap();
    let version = registry
        .register(
            "demo::Version",
            TypeBuilder::class().string_conversion(
                |_, value| Ok(value.as_str().map(String::from).unwrap_or_default()),
                |_, text| Ok(text.into()),
            ),
        )
        .unwrap();

    let resolver = resolver(registry);
    let kind = |ty| resolver.resolve_contract(ty).unwrap().kind();
    assert_eq!(kind(TypeKey::I32), ContractKind::Primitive);
    assert_eq!(kind(nullable), ContractKind::Primitive);
    assert_eq!(kind(colour), ContractKind::Primitive);
    assert_eq!(kind(TypeKey::NODE), ContractKind::Document);
    assert_eq!(kind(list), ContractKind::Array);
    assert_eq!(kind(map), ContractKind::Dictionary);
    assert_eq!(kind(bag), ContractKind::Dynamic);
    assert_eq!(kind(forced), ContractKind::Object);
    assert_eq!(kind(version), ContractKind::String);
    assert_eq!(kind(TypeKey::ANY), ContractKind::Object);
}

#[test]
fn contracts_are_cached() {
    let mut registry = TypeRegistry::new();
    let ty = registry
        .register("demo::Point", TypeBuilder::class().field("X", TypeKey::I32))
        .unwrap();
    let resolver = resolver(registry);

    let first = resolver.resolve_contract(ty).unwrap();
    let second = resolver.resolve_contract(ty).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(resolver.cached(), 1);

    assert!(matches!(
        resolver.resolve_contract(TypeKey(4096)).map_err(issue),
        Err(ContractIssue::UnknownType(_))
    ));
}

#[test]
fn derived_members_replace_base_members() {
    let mut registry = TypeRegistry::new();
    let base = registry
        .register(
            "demo::Base",
            TypeBuilder::class()
                .field("Id", TypeKey::I32)
                .field("Name", TypeKey::STRING),
        )
        .unwrap();
    let derived = registry
        .register(
            "demo::Derived",
            TypeBuilder::class()
                .base(base)
                .field("Extra", TypeKey::BOOL)
                .field("Name", TypeKey::STRING),
        )
        .unwrap();

    let contract = resolver(registry).resolve_contract(derived).unwrap();
    let object = contract.as_object().unwrap();
    assert_eq!(names(object), ["Id", "Name", "Extra"]);
    assert_eq!(object.properties().get("Name").unwrap().declaring_type(), derived);
}

#[test]
fn renamed_collisions() {
    let mut registry = TypeRegistry::new();
    let base = registry
        .register(
            "demo::Base",
            TypeBuilder::class().member(
                MemberBuilder::field("Title", TypeKey::STRING)
                    .attribute(PropertyOptions::named("label")),
            ),
        )
        .unwrap();
    let derived = registry
        .register(
            "demo::Derived",
            TypeBuilder::class().base(base).member(
                MemberBuilder::field("Caption", TypeKey::STRING)
                    .attribute(PropertyOptions::named("label")),
            ),
        )
        .unwrap();
    let flat = registry
        .register(
            "demo::Flat",
            TypeBuilder::class()
                .member(
                    MemberBuilder::field("Title", TypeKey::STRING)
                        .attribute(PropertyOptions::named("label")),
                )
                .member(
                    MemberBuilder::field("Caption", TypeKey::STRING)
                        .attribute(PropertyOptions::named("label")),
                ),
        )
        .unwrap();

    let resolver = resolver(registry);
    let contract = resolver.resolve_contract(derived).unwrap();
    let label = contract.as_object().unwrap().properties().get("label").unwrap();
    assert_eq!(label.underlying_name(), "Caption");

    assert_eq!(
        resolver.resolve_contract(flat).map_err(issue).unwrap_err(),
        ContractIssue::DuplicateProperty("label".into())
    );
}

#[test]
fn ignored_members_yield_their_name() {
    let mut registry = TypeRegistry::new();
    let ty = registry
        .register(
            "demo::Shadow",
            TypeBuilder::class()
                .member(
                    MemberBuilder::field("Secret", TypeKey::STRING)
                        .attribute(PropertyOptions::named("value"))
                        .attribute(Ignore),
                )
                .member(
                    MemberBuilder::field("Value", TypeKey::STRING)
                        .attribute(PropertyOptions::named("value")),
                ),
        )
        .unwrap();

    let contract = resolver(registry).resolve_contract(ty).unwrap();
    let value = contract.as_object().unwrap().properties().get("value").unwrap();
    assert_eq!(value.underlying_name(), "Value");
    assert!(!value.is_ignored());
}

#[test]
fn interface_options_are_inherited() {
    let mut registry = TypeRegistry::new();
    let named = registry
        .register(
            "demo::INamed",
            TypeBuilder::interface().member(
                MemberBuilder::property("Name", TypeKey::STRING)
                    .attribute(PropertyOptions::named("n")),
            ),
        )
        .unwrap();
    let titled = registry
        .register(
            "demo::ITitled",
            TypeBuilder::interface().member(
                MemberBuilder::property("Name", TypeKey::STRING)
                    .attribute(PropertyOptions::named("t")),
            ),
        )
        .unwrap();
    let person = registry
        .register(
            "demo::Person",
            TypeBuilder::class().implements(named).field("Name", TypeKey::STRING),
        )
        .unwrap();
    let both = registry
        .register(
            "demo::Both",
            TypeBuilder::class()
                .implements(named)
                .implements(titled)
                .field("Name", TypeKey::STRING),
        )
        .unwrap();

    let resolver = resolver(registry);
    let contract = resolver.resolve_contract(person).unwrap();
    assert_eq!(names(contract.as_object().unwrap()), ["n"]);
    assert_eq!(
        resolver.resolve_contract(both).map_err(issue).unwrap_err(),
        ContractIssue::AmbiguousInterfaceMember("Name".into())
    );
}

#[test]
fn member_serialization_modes() {
    use crate::settings::MemberSerialization;

    let mut registry = TypeRegistry::new();
    let members = || {
        TypeBuilder::class()
            .field("Open", TypeKey::I32)
            .member(MemberBuilder::field("hidden", TypeKey::I32).non_public())
            .member(
                MemberBuilder::property("Marked", TypeKey::I32)
                    .attribute(PropertyOptions::new()),
            )
    };
    let opt_out = registry.register("demo::OptOut", members()).unwrap();
    let opt_in = registry
        .register(
            "demo::OptIn",
            members().attribute(
                ContainerOptions::default().with_member_serialization(MemberSerialization::OptIn),
            ),
        )
        .unwrap();
    let fields = registry
        .register(
            "demo::Fields",
            members().attribute(
                ContainerOptions::default().with_member_serialization(MemberSerialization::Fields),
            ),
        )
        .unwrap();

    let resolver = resolver(registry);
    let names_of = |ty| {
        let contract = resolver.resolve_contract(ty).unwrap();
        names(contract.as_object().unwrap())
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
    };
    assert_eq!(names_of(opt_out), ["Open", "Marked"]);
    assert_eq!(names_of(opt_in), ["Marked"]);
    assert_eq!(names_of(fields), ["Open", "hidden"]);
}

// -----------------------------------------------------------------------------
// Constructors

#[test]
fn constructor_precedence() {
    let mut registry = TypeRegistry::new();
    let annotated = registry
        .register(
            "demo::Annotated",
            TypeBuilder::class()
                .field("A", TypeKey::I32)
                .default_constructor()
                .constructor(ConstructorBuilder::new().param("a", TypeKey::I32))
                .constructor(
                    ConstructorBuilder::new()
                        .param("a", TypeKey::I32)
                        .param("b", TypeKey::I32)
                        .attribute(SerializationConstructor),
                ),
        )
        .unwrap();
    let immutable = registry
        .register(
            "demo::Immutable",
            TypeBuilder::class()
                .member(MemberBuilder::field("X", TypeKey::I32).read_only())
                .member(MemberBuilder::field("Y", TypeKey::I32).read_only())
                .default_constructor()
                .constructor(
                    ConstructorBuilder::new()
                        .param("y", TypeKey::I32)
                        .param("x", TypeKey::I32),
                ),
        )
        .unwrap();
    let single = registry
        .register(
            "demo::Single",
            TypeBuilder::class()
                .field("A", TypeKey::I32)
                .constructor(ConstructorBuilder::new().param("a", TypeKey::I32)),
        )
        .unwrap();
    let plain = registry
        .register(
            "demo::Plain",
            TypeBuilder::class().field("A", TypeKey::I32).default_constructor(),
        )
        .unwrap();
    let implicit = registry
        .register("demo::Implicit", TypeBuilder::class().field("A", TypeKey::I32))
        .unwrap();

    let resolver = resolver(registry);
    let object = |ty| resolver.resolve_contract(ty).unwrap();

    let contract = object(annotated);
    let annotated = contract.as_object().unwrap();
    assert_eq!(annotated.creator().unwrap().kind(), CreatorKind::Annotated);
    let params: Vec<_> = annotated.creator_parameters().iter().map(|p| p.name()).collect();
    assert_eq!(params, ["A", "b"]);

    let contract = object(immutable);
    let immutable = contract.as_object().unwrap();
    assert_eq!(immutable.creator().unwrap().kind(), CreatorKind::Immutable);

    let contract = object(single);
    assert_eq!(
        contract.as_object().unwrap().creator().unwrap().kind(),
        CreatorKind::Parameterized
    );
    assert!(contract.base().default_creator().is_none());

    let contract = object(plain);
    assert!(contract.as_object().unwrap().creator().is_none());
    assert!(contract.base().default_creator().is_some());

    let contract = object(implicit);
    assert!(contract.base().default_creator().is_some());
    assert!(!contract.base().default_creator_non_public());
}

#[test]
fn two_annotated_constructors() {
    let mut registry = TypeRegistry::new();
    let ty = registry
        .register(
            "demo::Twice",
            TypeBuilder::class()
                .field("A", TypeKey::I32)
                .constructor(
                    ConstructorBuilder::new()
                        .param("a", TypeKey::I32)
                        .attribute(SerializationConstructor),
                )
                .constructor(ConstructorBuilder::new().attribute(SerializationConstructor)),
        )
        .unwrap();

    assert_eq!(
        resolver(registry).resolve_contract(ty).map_err(issue).unwrap_err(),
        ContractIssue::MultipleSerializationConstructors
    );
}

#[test]
fn non_public_default_constructor() {
    let mut registry = TypeRegistry::new();
    let ty = registry
        .register(
            "demo::Hidden",
            TypeBuilder::class()
                .field("A", TypeKey::I32)
                .constructor(ConstructorBuilder::new().non_public()),
        )
        .unwrap();
    let abstract_ty = registry
        .register(
            "demo::Shape",
            TypeBuilder::class().abstract_type().field("A", TypeKey::I32),
        )
        .unwrap();

    let resolver = resolver(registry);
    let contract = resolver.resolve_contract(ty).unwrap();
    assert!(contract.base().default_creator().is_some());
    assert!(contract.base().default_creator_non_public());
    assert!(!resolver.resolve_contract(abstract_ty).unwrap().base().is_instantiable());
}

// -----------------------------------------------------------------------------
// Extension data

#[test]
fn extension_data_member() {
    let mut registry = TypeRegistry::new();
    let bag = registry.map_of(TypeKey::STRING, TypeKey::ANY).unwrap();
    let numbers = registry.map_of(TypeKey::I32, TypeKey::ANY).unwrap();
    let ok = registry
        .register(
            "demo::Open",
            TypeBuilder::class()
                .field("Id", TypeKey::I32)
                .member(MemberBuilder::field("Rest", bag).attribute(ExtensionData::default())),
        )
        .unwrap();
    let bad_keys = registry
        .register(
            "demo::BadKeys",
            TypeBuilder::class()
                .member(MemberBuilder::field("Rest", numbers).attribute(ExtensionData::default())),
        )
        .unwrap();
    let twice = registry
        .register(
            "demo::Twice",
            TypeBuilder::class()
                .member(MemberBuilder::field("A", bag).attribute(ExtensionData::default()))
                .member(MemberBuilder::field("B", bag).attribute(ExtensionData::default())),
        )
        .unwrap();

    let resolver = resolver(registry);
    let contract = resolver.resolve_contract(ok).unwrap();
    let object = contract.as_object().unwrap();
    assert_eq!(names(object), ["Id"]);
    let ext = object.extension_data().unwrap();
    assert_eq!(ext.member_name(), "Rest");
    assert_eq!(ext.value_type(), TypeKey::ANY);

    assert!(matches!(
        resolver.resolve_contract(bad_keys).map_err(issue),
        Err(ContractIssue::InvalidExtensionData { .. })
    ));
    assert_eq!(
        resolver.resolve_contract(twice).map_err(issue).unwrap_err(),
        ContractIssue::MultipleExtensionData
    );
}

// -----------------------------------------------------------------------------
// Factory hooks

#[derive(Default)]
struct CountingFactory {
    objects: AtomicUsize,
}

impl ContractFactory for CountingFactory {
    fn create_object_contract<'a>(
        &self,
        cx: &ResolveContext<'a>,
        info: &'a TypeInfo,
    ) -> Result<ObjectContract> {
        self.objects.fetch_add(1, Ordering::Relaxed);
        let mut contract = super::build::object_contract(cx, info)?;
        contract
            .properties_mut()
            .rename("X", "x")
            .map_err(|issue| Error::contract(info.path(), issue))?;
        Ok(contract)
    }
}

#[test]
fn factory_overrides_one_kind() {
    let mut registry = TypeRegistry::new();
    let point = registry
        .register("demo::Point", TypeBuilder::class().field("X", TypeKey::I32))
        .unwrap();
    let list = registry.list_of(point).unwrap();

    let resolver = DefaultContractResolver::with_factory(
        Arc::new(registry),
        Default::default(),
        CountingFactory::default(),
    );
    let contract = resolver.resolve_contract(point).unwrap();
    assert_eq!(names(contract.as_object().unwrap()), ["x"]);
    resolver.resolve_contract(point).unwrap();
    assert!(matches!(&*resolver.resolve_contract(list).unwrap(), Contract::Array(_)));
    assert_eq!(resolver.factory().objects.load(Ordering::Relaxed), 1);
}
