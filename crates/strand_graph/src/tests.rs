//! Scenarios crossing the resolver, the writer and the reader.

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::GraphSerializer;
use crate::attrs::{DefaultValue, ExtensionData, PropertyOptions};
use crate::convert::Converter;
use crate::de::ReadContext;
use crate::error::{Error, RequiredViolation, Result};
use crate::heap::{Body, Heap, Instance};
use crate::info::{ConstructorBuilder, MemberBuilder, TypeBuilder, TypeKey};
use crate::registry::TypeRegistry;
use crate::ser::WriteContext;
use crate::settings::{
    DefaultValueHandling, MetadataPropertyHandling, MissingMemberHandling, NullValueHandling,
    ObjectCreationHandling, PreserveReferences, ReferenceLoopHandling, Required,
    SerializerSettings, TypeNameHandling,
};
use crate::token::{Literal, Node, Token, TokenBuffer};
use crate::value::{ObjectId, Value};

fn named(name: &str, ty: TypeKey) -> MemberBuilder {
    MemberBuilder::field(name, ty).attribute(PropertyOptions::named(name.to_lowercase()))
}

/// `demo::Item { id: i32, name: string, children: List<Item> }`
fn items() -> (TypeRegistry, TypeKey) {
    let mut registry = TypeRegistry::new();
    let item = registry.declare("demo::Item").unwrap();
    let children = registry.list_of(item).unwrap();
    registry
        .define(
            item,
            TypeBuilder::class()
                .member(named("Id", TypeKey::I32))
                .member(named("Name", TypeKey::STRING))
                .member(named("Children", children))
                .default_constructor(),
        )
        .unwrap();
    (registry, item)
}

/// `demo::Person { Name: string, Friend: Person }`
fn people() -> (TypeRegistry, TypeKey) {
    let mut registry = TypeRegistry::new();
    let person = registry.declare("demo::Person").unwrap();
    registry
        .define(
            person,
            TypeBuilder::class()
                .field("Name", TypeKey::STRING)
                .field("Friend", person)
                .default_constructor(),
        )
        .unwrap();
    (registry, person)
}

/// `demo::Animal`, `demo::Dog : Animal` and `demo::Zoo { Star: Animal }`.
fn zoo() -> (TypeRegistry, TypeKey, TypeKey, TypeKey) {
    let mut registry = TypeRegistry::new();
    let animal = registry
        .register(
            "demo::Animal",
            TypeBuilder::class().field("Name", TypeKey::STRING).default_constructor(),
        )
        .unwrap();
    let dog = registry
        .register(
            "demo::Dog",
            TypeBuilder::class()
                .base(animal)
                .field("Breed", TypeKey::STRING)
                .default_constructor(),
        )
        .unwrap();
    let zoo = registry
        .register(
            "demo::Zoo",
            TypeBuilder::class().field("Star", animal).default_constructor(),
        )
        .unwrap();
    (registry, animal, dog, zoo)
}

fn serializer(registry: TypeRegistry, settings: SerializerSettings) -> GraphSerializer {
    GraphSerializer::new(Arc::new(registry)).with_settings(settings)
}

fn object(value: &Value) -> ObjectId {
    value.as_object().expect("an object")
}

fn text(value: &str) -> Value {
    Value::String(value.into())
}

// -----------------------------------------------------------------------------
// Round trips

#[test]
fn concrete_item_round_trip() {
    let (registry, item) = items();
    let serializer = serializer(registry, SerializerSettings::default());
    let json = r#"{"id":7,"name":"x","children":[]}"#;

    let mut heap = Heap::new();
    let value = serializer.from_json(json, &mut heap, Some(item)).unwrap();
    let id = object(&value);
    assert_eq!(heap[id].slots[0], Value::Int(7));
    assert_eq!(heap[id].slots[1], text("x"));
    let children = object(&heap[id].slots[2]);
    assert_eq!(heap[children].items(), Some(&[][..]));

    assert_eq!(serializer.to_json(&heap, &value, Some(item)).unwrap(), json);
}

#[test]
fn nested_items_and_token_stream() {
    let (registry, item) = items();
    let serializer = serializer(registry, SerializerSettings::default());
    let json = r#"{"id":1,"name":"root","children":[{"id":2,"name":"leaf","children":null}]}"#;

    let mut heap = Heap::new();
    let value = serializer.from_json(json, &mut heap, Some(item)).unwrap();

    let mut buffer = TokenBuffer::new();
    serializer.serialize(&heap, &value, Some(item), &mut buffer).unwrap();
    let tokens = buffer.into_vec();
    assert_eq!(tokens.first(), Some(&Token::StartObject));
    assert_eq!(tokens[1], Token::PropertyName("id".into()));
    assert_eq!(tokens.last(), Some(&Token::EndObject));

    let mut replay = TokenBuffer::from(tokens);
    let mut again = Heap::new();
    let copy = serializer.deserialize(&mut replay, &mut again, Some(item)).unwrap();
    assert_eq!(serializer.to_json(&again, &copy, Some(item)).unwrap(), json);
}

#[test]
fn empty_input_reads_null() {
    let (registry, item) = items();
    let serializer = serializer(registry, SerializerSettings::default());
    let mut heap = Heap::new();
    let value = serializer
        .deserialize(&mut TokenBuffer::new(), &mut heap, Some(item))
        .unwrap();
    assert_eq!(value, Value::Null);
    assert!(heap.is_empty());
}

#[test]
fn untyped_values_stay_documents() {
    let serializer = serializer(TypeRegistry::new(), SerializerSettings::default());
    let mut heap = Heap::new();

    let value = serializer
        .from_json(r#"{"a":[1,true,null]}"#, &mut heap, None)
        .unwrap();
    let Value::Node(Node::Object(entries)) = &value else {
        panic!("expected a document, got {value:?}");
    };
    assert_eq!(entries[0].0, "a");
    assert!(heap.is_empty());

    assert_eq!(serializer.from_json("12", &mut heap, None).unwrap(), Value::Int(12));
    assert_eq!(
        serializer.to_json(&heap, &value, None).unwrap(),
        r#"{"a":[1,true,null]}"#
    );
}

// -----------------------------------------------------------------------------
// References

#[test]
fn cycles_with_preserved_references() {
    let (registry, person) = people();
    let settings =
        SerializerSettings::default().with_preserve_references(PreserveReferences::OBJECTS);
    let serializer = serializer(registry, settings);
    let json = r#"{"$id":"1","Name":"a","Friend":{"$id":"2","Name":"b","Friend":{"$ref":"1"}}}"#;

    let mut heap = Heap::new();
    let value = serializer.from_json(json, &mut heap, Some(person)).unwrap();
    let a = object(&value);
    let b = object(&heap[a].slots[1]);
    assert_eq!(heap[b].slots[0], text("b"));
    assert_eq!(heap[b].slots[1], Value::Object(a));

    assert_eq!(serializer.to_json(&heap, &value, Some(person)).unwrap(), json);
}

#[test]
fn reference_loops() {
    let (registry, person) = people();
    let json = r#"{"$id":"1","Name":"a","Friend":{"$ref":"1"}}"#;
    let reader = serializer(
        registry.clone(),
        SerializerSettings::default().with_preserve_references(PreserveReferences::OBJECTS),
    );
    let mut heap = Heap::new();
    let value = reader.from_json(json, &mut heap, Some(person)).unwrap();

    let strict = serializer(registry.clone(), SerializerSettings::default());
    let err = strict.to_json(&heap, &value, Some(person)).unwrap_err();
    assert!(matches!(err, Error::ReferenceLoop { .. }), "{err}");

    let lenient = serializer(
        registry,
        SerializerSettings::default().with_reference_loop_handling(ReferenceLoopHandling::Ignore),
    );
    assert_eq!(
        lenient.to_json(&heap, &value, Some(person)).unwrap(),
        r#"{"Name":"a"}"#
    );
}

#[test]
fn shared_arrays_are_wrapped() {
    let mut registry = TypeRegistry::new();
    let numbers = registry.list_of(TypeKey::I32).unwrap();
    let pair = registry
        .register(
            "demo::Pair",
            TypeBuilder::class()
                .field("Left", numbers)
                .field("Right", numbers)
                .default_constructor(),
        )
        .unwrap();
    let settings = SerializerSettings::default().with_preserve_references(PreserveReferences::ALL);
    let serializer = serializer(registry, settings);
    let json = r#"{"$id":"1","Left":{"$id":"2","$values":[1,2]},"Right":{"$ref":"2"}}"#;

    let mut heap = Heap::new();
    let value = serializer.from_json(json, &mut heap, Some(pair)).unwrap();
    let id = object(&value);
    assert_eq!(heap[id].slots[0], heap[id].slots[1]);
    let list = object(&heap[id].slots[0]);
    assert_eq!(heap[list].items(), Some(&[Value::Int(1), Value::Int(2)][..]));

    assert_eq!(serializer.to_json(&heap, &value, Some(pair)).unwrap(), json);
}

#[test]
fn unresolved_reference() {
    let (registry, person) = people();
    let settings =
        SerializerSettings::default().with_preserve_references(PreserveReferences::OBJECTS);
    let serializer = serializer(registry, settings);
    let mut heap = Heap::new();
    let err = serializer
        .from_json(r#"{"Friend":{"$ref":"9"}}"#, &mut heap, Some(person))
        .unwrap_err();
    assert!(err.to_string().starts_with("Could not resolve reference '9'."), "{err}");
    assert!(err.path().is_some_and(|path| path.starts_with("Friend")));
}

#[test]
fn references_keep_their_type() {
    let (mut registry, animal, _dog, _zoo) = zoo();
    let car = registry
        .register(
            "demo::Car",
            TypeBuilder::class().field("Model", TypeKey::STRING).default_constructor(),
        )
        .unwrap();
    let holder = registry
        .register(
            "demo::Holder",
            TypeBuilder::class()
                .field("Pet", animal)
                .field("Ride", car)
                .default_constructor(),
        )
        .unwrap();
    let settings =
        SerializerSettings::default().with_preserve_references(PreserveReferences::OBJECTS);
    let serializer = serializer(registry, settings);

    let mut heap = Heap::new();
    let err = serializer
        .from_json(r#"{"Pet":{"$id":"1","Name":"rex"},"Ride":{"$ref":"1"}}"#, &mut heap, Some(holder))
        .unwrap_err();
    assert!(matches!(err, Error::Structure { .. }), "{err}");
    assert!(
        err.to_string()
            .starts_with("Reference '1' resolves to 'demo::Animal', not compatible with 'demo::Car'."),
        "{err}"
    );

    let value = serializer
        .from_json(r#"{"Pet":{"$id":"1","Name":"rex"},"Ride":null}"#, &mut heap, Some(holder))
        .unwrap();
    assert_eq!(heap[object(&value)].slots[1], Value::Null);
}

// -----------------------------------------------------------------------------
// Type names

#[test]
fn auto_type_names_only_when_needed() {
    let (registry, animal, dog, zoo) = zoo();
    let settings = SerializerSettings::default().with_type_name_handling(TypeNameHandling::AUTO);
    let serializer = serializer(registry, settings);

    let with_dog = r#"{"Star":{"$type":"demo::Dog","Name":"rex","Breed":"pug"}}"#;
    let mut heap = Heap::new();
    let value = serializer.from_json(with_dog, &mut heap, Some(zoo)).unwrap();
    let star = object(&heap[object(&value)].slots[0]);
    assert_eq!(heap.type_of(star), Some(dog));
    assert_eq!(serializer.to_json(&heap, &value, Some(zoo)).unwrap(), with_dog);

    let with_animal = r#"{"Star":{"Name":"tom"}}"#;
    let value = serializer.from_json(with_animal, &mut heap, Some(zoo)).unwrap();
    let star = object(&heap[object(&value)].slots[0]);
    assert_eq!(heap.type_of(star), Some(animal));
    assert_eq!(serializer.to_json(&heap, &value, Some(zoo)).unwrap(), with_animal);
}

#[test]
fn auto_type_names_in_homogeneous_lists() {
    let (mut registry, animal, dog, _zoo) = zoo();
    let animals = registry.list_of(animal).unwrap();
    let settings = SerializerSettings::default().with_type_name_handling(TypeNameHandling::AUTO);
    let serializer = serializer(registry, settings);

    let mut heap = Heap::new();
    let mut pet = |ty: TypeKey, name: &str| {
        let mut instance = Instance::new(ty);
        instance.slots.push(text(name));
        if ty == dog {
            instance.slots.push(Value::Null);
        }
        Value::Object(heap.alloc(instance))
    };
    let (a, b, c) = (pet(animal, "a"), pet(animal, "b"), pet(dog, "c"));

    let plain = Value::Object(heap.alloc(Instance::list(animals, alloc::vec![a.clone(), b.clone()])));
    assert_eq!(
        serializer.to_json(&heap, &plain, Some(animals)).unwrap(),
        r#"[{"Name":"a"},{"Name":"b"}]"#
    );

    let mixed = Value::Object(heap.alloc(Instance::list(animals, alloc::vec![a, c, b])));
    assert_eq!(
        serializer.to_json(&heap, &mixed, Some(animals)).unwrap(),
        r#"[{"Name":"a"},{"$type":"demo::Dog","Name":"c","Breed":null},{"Name":"b"}]"#
    );
}

#[test]
fn type_names_ignored_when_disabled() {
    let (registry, animal, _dog, zoo) = zoo();
    let serializer = serializer(registry, SerializerSettings::default());
    let mut heap = Heap::new();
    let value = serializer
        .from_json(r#"{"Star":{"$type":"demo::Dog","Name":"rex"}}"#, &mut heap, Some(zoo))
        .unwrap();
    let star = object(&heap[object(&value)].slots[0]);
    assert_eq!(heap.type_of(star), Some(animal));
}

#[test]
fn incompatible_type_name() {
    let (registry, _animal, _dog, zoo) = zoo();
    let settings = SerializerSettings::default().with_type_name_handling(TypeNameHandling::AUTO);
    let serializer = serializer(registry, settings);
    let mut heap = Heap::new();
    let err = serializer
        .from_json(r#"{"Star":{"$type":"demo::Zoo"}}"#, &mut heap, Some(zoo))
        .unwrap_err();
    assert!(err.to_string().contains("is not compatible with"), "{err}");
}

#[test]
fn read_ahead_finds_late_metadata() {
    let (registry, animal, dog, zoo) = zoo();
    let late = r#"{"Star":{"Name":"rex","Breed":"pug","$type":"demo::Dog"}}"#;

    let settings = SerializerSettings::default()
        .with_type_name_handling(TypeNameHandling::AUTO)
        .with_metadata_property_handling(MetadataPropertyHandling::ReadAhead);
    let ahead = serializer(registry.clone(), settings.clone());
    let mut heap = Heap::new();
    let value = ahead.from_json(late, &mut heap, Some(zoo)).unwrap();
    let star = object(&heap[object(&value)].slots[0]);
    assert_eq!(heap.type_of(star), Some(dog));
    assert_eq!(heap[star].slots, [text("rex"), text("pug")]);

    let sequential = serializer(
        registry,
        settings.with_metadata_property_handling(MetadataPropertyHandling::Default),
    );
    let value = sequential.from_json(late, &mut heap, Some(zoo)).unwrap();
    let star = object(&heap[object(&value)].slots[0]);
    assert_eq!(heap.type_of(star), Some(animal));
}

// -----------------------------------------------------------------------------
// Construction

#[test]
fn immutable_type_uses_its_constructor() {
    let mut registry = TypeRegistry::new();
    let money = registry
        .register(
            "demo::Money",
            TypeBuilder::class()
                .member(MemberBuilder::field("Amount", TypeKey::I64).read_only())
                .member(MemberBuilder::field("Currency", TypeKey::STRING).read_only())
                .constructor(
                    ConstructorBuilder::new()
                        .param("amount", TypeKey::I64)
                        .param("currency", TypeKey::STRING),
                ),
        )
        .unwrap();
    let serializer = serializer(registry, SerializerSettings::default());

    let mut heap = Heap::new();
    let value = serializer
        .from_json(r#"{"Currency":"EUR","Amount":5}"#, &mut heap, Some(money))
        .unwrap();
    assert_eq!(heap[object(&value)].slots, [Value::Int(5), text("EUR")]);
    assert_eq!(
        serializer.to_json(&heap, &value, Some(money)).unwrap(),
        r#"{"Amount":5,"Currency":"EUR"}"#
    );
}

#[test]
fn creator_arguments_then_members() {
    let seen = Arc::new(AtomicUsize::new(0));
    let calls = seen.clone();

    let mut registry = TypeRegistry::new();
    let account = registry
        .register(
            "demo::Account",
            TypeBuilder::class()
                .member(MemberBuilder::field("Id", TypeKey::I32).read_only())
                .field("Owner", TypeKey::STRING)
                .field("Limit", TypeKey::I32)
                .constructor(ConstructorBuilder::new().param("id", TypeKey::I32).body(
                    move |heap, target, args| {
                        calls.fetch_add(1, Ordering::Relaxed);
                        heap[target].slots[0] = args[0].clone();
                        Ok(())
                    },
                )),
        )
        .unwrap();
    let serializer = serializer(registry, SerializerSettings::default());

    let mut heap = Heap::new();
    let value = serializer
        .from_json(r#"{"Owner":"z","Id":3,"Unknown":[1,2]}"#, &mut heap, Some(account))
        .unwrap();
    assert_eq!(seen.load(Ordering::Relaxed), 1);
    assert_eq!(heap[object(&value)].slots, [Value::Int(3), text("z"), Value::Int(0)]);
}

#[test]
fn annotated_constructor_wins() {
    use crate::attrs::SerializationConstructor;

    let mut registry = TypeRegistry::new();
    let tagged = registry
        .register(
            "demo::Tagged",
            TypeBuilder::class()
                .field("Tag", TypeKey::STRING)
                .default_constructor()
                .constructor(
                    ConstructorBuilder::new()
                        .param("tag", TypeKey::STRING)
                        .attribute(SerializationConstructor)
                        .body(|heap, target, args| {
                            let tag = args[0].as_str().unwrap_or_default().to_uppercase();
                            heap[target].slots[0] = Value::String(tag);
                            Ok(())
                        }),
                ),
        )
        .unwrap();
    let serializer = serializer(registry, SerializerSettings::default());

    let mut heap = Heap::new();
    let value = serializer
        .from_json(r#"{"Tag":"abc"}"#, &mut heap, Some(tagged))
        .unwrap();
    assert_eq!(heap[object(&value)].slots, [text("ABC")]);
}

#[test]
fn abstract_types_need_a_type_name() {
    let mut registry = TypeRegistry::new();
    let shape = registry
        .register(
            "demo::Shape",
            TypeBuilder::class().abstract_type().field("Sides", TypeKey::I32),
        )
        .unwrap();
    let serializer = serializer(registry, SerializerSettings::default());

    let mut heap = Heap::new();
    let err = serializer
        .from_json(r#"{"Sides":3}"#, &mut heap, Some(shape))
        .unwrap_err();
    assert!(err.to_string().starts_with("Could not create an instance of type 'demo::Shape'"));
}

#[test]
fn lifecycle_callbacks_run_in_order() {
    let log = Arc::new(std::sync::Mutex::new(Vec::<&'static str>::new()));
    let (before, after) = (log.clone(), log.clone());

    let mut registry = TypeRegistry::new();
    let ty = registry
        .register(
            "demo::Tracked",
            TypeBuilder::class()
                .field("Value", TypeKey::I32)
                .default_constructor()
                .on_deserializing(move |_, _| {
                    before.lock().unwrap().push("deserializing");
                    Ok(())
                })
                .on_deserialized(move |heap, id| {
                    after.lock().unwrap().push("deserialized");
                    let doubled = heap[id].slots[0].as_i64().unwrap_or(0) * 2;
                    heap[id].slots[0] = Value::Int(doubled);
                    Ok(())
                }),
        )
        .unwrap();
    let serializer = serializer(registry, SerializerSettings::default());

    let mut heap = Heap::new();
    let value = serializer
        .from_json(r#"{"Value":21}"#, &mut heap, Some(ty))
        .unwrap();
    assert_eq!(heap[object(&value)].slots[0], Value::Int(42));
    assert_eq!(*log.lock().unwrap(), ["deserializing", "deserialized"]);
}

// -----------------------------------------------------------------------------
// Required members and missing members

#[test]
fn required_members() {
    let mut registry = TypeRegistry::new();
    let ty = registry
        .register(
            "demo::Code",
            TypeBuilder::class()
                .member(
                    MemberBuilder::field("Code", TypeKey::STRING)
                        .attribute(PropertyOptions::new().required(Required::Always)),
                )
                .default_constructor(),
        )
        .unwrap();
    let serializer = serializer(registry, SerializerSettings::default());
    let mut heap = Heap::new();

    let missing = serializer.from_json("{}", &mut heap, Some(ty)).unwrap_err();
    assert!(matches!(
        missing,
        Error::Required { violation: RequiredViolation::Missing, ref member, .. } if member == "Code"
    ));

    let null = serializer
        .from_json(r#"{"Code":null}"#, &mut heap, Some(ty))
        .unwrap_err();
    assert!(matches!(null, Error::Required { violation: RequiredViolation::Null, .. }));

    assert!(serializer.from_json(r#"{"Code":"a"}"#, &mut heap, Some(ty)).is_ok());
}

#[test]
fn optional_presence_and_nullability() {
    let mut registry = TypeRegistry::new();
    let ty = registry
        .register(
            "demo::Contact",
            TypeBuilder::class()
                .member(
                    MemberBuilder::field("Phone", TypeKey::STRING)
                        .attribute(PropertyOptions::new().required(Required::AllowNull)),
                )
                .member(
                    MemberBuilder::field("Email", TypeKey::STRING)
                        .attribute(PropertyOptions::new().required(Required::DisallowNull)),
                )
                .default_constructor(),
        )
        .unwrap();
    let serializer = serializer(registry, SerializerSettings::default());
    let mut heap = Heap::new();

    let value = serializer
        .from_json(r#"{"Phone":null}"#, &mut heap, Some(ty))
        .unwrap();
    assert_eq!(heap[object(&value)].slots, [Value::Null, Value::Null]);

    let absent = serializer.from_json("{}", &mut heap, Some(ty)).unwrap_err();
    assert!(matches!(
        absent,
        Error::Required { violation: RequiredViolation::Missing, ref member, .. } if member == "Phone"
    ));

    let null = serializer
        .from_json(r#"{"Phone":"1","Email":null}"#, &mut heap, Some(ty))
        .unwrap_err();
    assert!(matches!(
        null,
        Error::Required { violation: RequiredViolation::Null, ref member, .. } if member == "Email"
    ));
}

#[test]
fn writing_a_forbidden_null() {
    let mut registry = TypeRegistry::new();
    let ty = registry
        .register(
            "demo::Label",
            TypeBuilder::class()
                .member(
                    MemberBuilder::field("Text", TypeKey::STRING)
                        .attribute(PropertyOptions::new().required(Required::DisallowNull)),
                )
                .default_constructor(),
        )
        .unwrap();
    let registry = Arc::new(registry);

    let mut heap = Heap::new();
    let mut label = Instance::new(ty);
    label.slots.push(Value::Null);
    let value = Value::Object(heap.alloc(label));

    let err = GraphSerializer::new(registry.clone())
        .to_json(&heap, &value, Some(ty))
        .unwrap_err();
    assert!(
        matches!(err, Error::NullNotAllowed { ref member, .. } if member == "Text"),
        "{err}"
    );
    assert_eq!(err.path(), Some("Text"));

    let skipping = GraphSerializer::new(registry).with_settings(
        SerializerSettings::default().with_null_value_handling(NullValueHandling::Ignore),
    );
    assert_eq!(skipping.to_json(&heap, &value, Some(ty)).unwrap(), "{}");
}

#[test]
fn default_values_are_skipped_and_populated() {
    let mut registry = TypeRegistry::new();
    let ty = registry
        .register(
            "demo::Setting",
            TypeBuilder::class()
                .member(
                    MemberBuilder::field("Level", TypeKey::I32)
                        .attribute(DefaultValue(Value::Int(5))),
                )
                .field("Name", TypeKey::STRING)
                .default_constructor(),
        )
        .unwrap();
    let registry = Arc::new(registry);
    let with = |handling: DefaultValueHandling| {
        GraphSerializer::new(registry.clone())
            .with_settings(SerializerSettings::default().with_default_value_handling(handling))
    };

    let mut heap = Heap::new();
    let mut setting = |level: i64, name: Value| {
        let mut instance = Instance::new(ty);
        instance.slots = alloc::vec![Value::Int(level), name];
        Value::Object(heap.alloc(instance))
    };
    let (defaulted, changed) = (setting(5, text("x")), setting(0, Value::Null));

    let ignore = with(DefaultValueHandling::IGNORE);
    assert_eq!(ignore.to_json(&heap, &defaulted, Some(ty)).unwrap(), r#"{"Name":"x"}"#);
    assert_eq!(ignore.to_json(&heap, &changed, Some(ty)).unwrap(), r#"{"Level":0}"#);
    assert_eq!(
        with(DefaultValueHandling::INCLUDE)
            .to_json(&heap, &defaulted, Some(ty))
            .unwrap(),
        r#"{"Level":5,"Name":"x"}"#
    );

    let value = with(DefaultValueHandling::POPULATE)
        .from_json(r#"{"Name":"y"}"#, &mut heap, Some(ty))
        .unwrap();
    assert_eq!(heap[object(&value)].slots, [Value::Int(5), text("y")]);

    let value = with(DefaultValueHandling::INCLUDE)
        .from_json(r#"{"Name":"y"}"#, &mut heap, Some(ty))
        .unwrap();
    assert_eq!(heap[object(&value)].slots, [Value::Int(0), text("y")]);
}

#[test]
fn missing_members() {
    let (registry, item) = items();
    let strict = serializer(
        registry,
        SerializerSettings::default().with_missing_member_handling(MissingMemberHandling::Error),
    );
    let mut heap = Heap::new();
    let err = strict
        .from_json(r#"{"id":1,"colour":"red"}"#, &mut heap, Some(item))
        .unwrap_err();
    assert!(
        matches!(err, Error::MissingMember { ref member, .. } if member == "colour"),
        "{err}"
    );
}

// -----------------------------------------------------------------------------
// Error recovery

#[test]
fn handled_errors_skip_the_value() {
    let (mut registry, item) = items();
    let numbers = registry.list_of(TypeKey::I32).unwrap();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let settings = SerializerSettings::default().with_error_handler(move |cx| {
        counter.fetch_add(1, Ordering::Relaxed);
        cx.handled = true;
    });
    let serializer = serializer(registry, settings);

    let mut heap = Heap::new();
    let value = serializer
        .from_json(r#"[1,"x",{"a":[2]},3]"#, &mut heap, Some(numbers))
        .unwrap();
    assert_eq!(heap[object(&value)].items(), Some(&[Value::Int(1), Value::Int(3)][..]));

    let value = serializer
        .from_json(r#"{"id":"bad","name":"ok","children":[]}"#, &mut heap, Some(item))
        .unwrap();
    let id = object(&value);
    assert_eq!(heap[id].slots[0], Value::Int(0));
    assert_eq!(heap[id].slots[1], text("ok"));
    assert_eq!(seen.load(Ordering::Relaxed), 3);
}

/// Fails on every write, optionally after opening an array.
struct BrokenConverter {
    point: TypeKey,
    partial: bool,
}

impl Converter for BrokenConverter {
    fn can_convert(&self, _registry: &TypeRegistry, ty: TypeKey) -> bool {
        ty == self.point
    }

    fn can_read(&self) -> bool {
        false
    }

    fn write(&self, cx: &mut WriteContext<'_>, _value: &Value) -> Result<()> {
        if self.partial {
            cx.write_token(Token::StartArray)?;
            cx.write_literal(Literal::Integer(1))?;
        }
        Err(cx.structure_error("point is broken"))
    }

    fn read(&self, cx: &mut ReadContext<'_>, _ty: TypeKey, _existing: Option<&Value>) -> Result<Value> {
        Err(cx.structure_error("point is write-only"))
    }
}

#[test]
fn handled_write_errors_leave_valid_output() {
    let mut registry = TypeRegistry::new();
    let point = registry
        .register(
            "demo::Point",
            TypeBuilder::class()
                .field("X", TypeKey::I32)
                .field("Y", TypeKey::I32)
                .default_constructor(),
        )
        .unwrap();
    let circle = registry
        .register(
            "demo::Circle",
            TypeBuilder::class()
                .field("Centre", point)
                .field("Radius", TypeKey::I32)
                .default_constructor(),
        )
        .unwrap();
    let registry = Arc::new(registry);

    let mut heap = Heap::new();
    let mut centre = Instance::new(point);
    centre.slots = alloc::vec![Value::Int(1), Value::Int(2)];
    let centre = heap.alloc(centre);
    let mut shape = Instance::new(circle);
    shape.slots = alloc::vec![Value::Object(centre), Value::Int(3)];
    let value = Value::Object(heap.alloc(shape));

    let seen = Arc::new(AtomicUsize::new(0));
    let writer = |partial: bool, handled: bool| {
        let counter = seen.clone();
        let settings = SerializerSettings::default()
            .with_converter(Arc::new(BrokenConverter { point, partial }))
            .with_error_handler(move |cx| {
                // Unhandled errors are offered again at the root, without a member.
                if cx.member == Some("Centre") {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
                cx.handled = handled;
            });
        GraphSerializer::new(registry.clone()).with_settings(settings)
    };

    assert_eq!(
        writer(false, true).to_json(&heap, &value, Some(circle)).unwrap(),
        r#"{"Centre":null,"Radius":3}"#
    );
    assert_eq!(
        writer(true, true).to_json(&heap, &value, Some(circle)).unwrap(),
        r#"{"Centre":[1],"Radius":3}"#
    );
    let err = writer(false, false)
        .to_json(&heap, &value, Some(circle))
        .unwrap_err();
    assert!(err.to_string().starts_with("point is broken"), "{err}");
    assert_eq!(seen.load(Ordering::Relaxed), 3);
}

#[test]
fn unhandled_errors_carry_the_path() {
    let (registry, item) = items();
    let serializer = serializer(registry, SerializerSettings::default());
    let mut heap = Heap::new();
    let err = serializer
        .from_json(r#"{"children":[{"id":"x"}]}"#, &mut heap, Some(item))
        .unwrap_err();
    assert!(matches!(err, Error::Conversion { .. }), "{err}");
    assert_eq!(err.path(), Some("children[0].id"));
}

#[test]
fn max_depth() {
    let settings = SerializerSettings::default().with_max_depth(Some(2));
    let serializer = serializer(TypeRegistry::new(), settings);
    let mut heap = Heap::new();

    assert!(serializer.from_json("[[1]]", &mut heap, None).is_ok());
    let err = serializer.from_json("[[[1]]]", &mut heap, None).unwrap_err();
    assert!(matches!(err, Error::MaxDepth { max: 2, .. }), "{err}");
}

// -----------------------------------------------------------------------------
// Collections

#[test]
fn dictionary_keys_are_converted() {
    let mut registry = TypeRegistry::new();
    let map = registry.map_of(TypeKey::I32, TypeKey::STRING).unwrap();
    let serializer = serializer(registry, SerializerSettings::default());
    let json = r#"{"1":"a","2":"b"}"#;

    let mut heap = Heap::new();
    let value = serializer.from_json(json, &mut heap, Some(map)).unwrap();
    let entries = heap[object(&value)].entries().unwrap();
    assert_eq!(entries, [(Value::Int(1), text("a")), (Value::Int(2), text("b"))]);
    assert_eq!(serializer.to_json(&heap, &value, Some(map)).unwrap(), json);

    let err = serializer
        .from_json(r#"{"x":"a"}"#, &mut heap, Some(map))
        .unwrap_err();
    assert!(
        err.to_string()
            .contains("Could not convert string 'x' to dictionary key type"),
        "{err}"
    );
}

#[test]
fn multidimensional_arrays() {
    let mut registry = TypeRegistry::new();
    let grid = registry.array_of(TypeKey::I32, 2).unwrap();
    let serializer = serializer(registry, SerializerSettings::default());
    let json = "[[1,2,3],[4,5,6]]";

    let mut heap = Heap::new();
    let value = serializer.from_json(json, &mut heap, Some(grid)).unwrap();
    let Body::Grid { dims, items } = &heap[object(&value)].body else {
        panic!("expected a grid");
    };
    assert_eq!(dims, &[2, 3]);
    assert_eq!(items.len(), 6);
    assert_eq!(serializer.to_json(&heap, &value, Some(grid)).unwrap(), json);

    let err = serializer
        .from_json("[[1],[2,3]]", &mut heap, Some(grid))
        .unwrap_err();
    assert!(err.to_string().contains("non-cubical"), "{err}");
}

#[test]
fn read_only_collections_use_their_creator() {
    let mut registry = TypeRegistry::new();
    let frozen = registry.read_only_list_of(TypeKey::STRING).unwrap();
    let serializer = serializer(registry, SerializerSettings::default());

    let mut heap = Heap::new();
    let value = serializer
        .from_json(r#"["a","b"]"#, &mut heap, Some(frozen))
        .unwrap();
    assert_eq!(heap[object(&value)].items(), Some(&[text("a"), text("b")][..]));
}

#[test]
fn read_only_members_merge_after_the_creator() {
    let mut registry = TypeRegistry::new();
    let tags = registry.list_of(TypeKey::STRING).unwrap();
    let basket = registry
        .register(
            "demo::Basket",
            TypeBuilder::class()
                .member(MemberBuilder::field("Id", TypeKey::I32).read_only())
                .member(MemberBuilder::field("Tags", tags).read_only())
                .constructor(ConstructorBuilder::new().param("id", TypeKey::I32).body(
                    move |heap, target, args| {
                        let list = heap.alloc(Instance::list(tags, alloc::vec![text("fixed")]));
                        heap[target].slots = alloc::vec![args[0].clone(), Value::Object(list)];
                        Ok(())
                    },
                )),
        )
        .unwrap();
    let serializer = serializer(registry, SerializerSettings::default());

    let mut heap = Heap::new();
    let value = serializer
        .from_json(r#"{"Tags":["a","b"],"Id":3}"#, &mut heap, Some(basket))
        .unwrap();
    let id = object(&value);
    assert_eq!(heap[id].slots[0], Value::Int(3));
    let list = object(&heap[id].slots[1]);
    assert_eq!(heap[list].items(), Some(&[text("fixed"), text("a"), text("b")][..]));
    assert_eq!(
        serializer.to_json(&heap, &value, Some(basket)).unwrap(),
        r#"{"Id":3,"Tags":["fixed","a","b"]}"#
    );
}

#[test]
fn members_are_reused_or_replaced() {
    let mut registry = TypeRegistry::new();
    let tags = registry.list_of(TypeKey::STRING).unwrap();
    let post = registry
        .register(
            "demo::Post",
            TypeBuilder::class().field("Tags", tags).default_constructor(),
        )
        .unwrap();
    let registry = Arc::new(registry);

    let mut heap = Heap::new();
    let list = heap.alloc(Instance::list(tags, alloc::vec![text("old")]));
    let target = heap.alloc(Instance {
        ty: post,
        slots: alloc::vec![Value::Object(list)],
        body: Body::Empty,
    });
    let input = || {
        TokenBuffer::from(alloc::vec![
            Token::StartObject,
            Token::PropertyName("Tags".into()),
            Token::StartArray,
            Token::Value(Literal::String("new".into())),
            Token::EndArray,
            Token::EndObject,
        ])
    };

    let reuse = GraphSerializer::new(registry.clone());
    reuse.populate(&mut input(), &mut heap, target).unwrap();
    assert_eq!(heap[target].slots[0], Value::Object(list));
    assert_eq!(heap[list].items(), Some(&[text("old"), text("new")][..]));

    let replace = GraphSerializer::new(registry).with_settings(
        SerializerSettings::default().with_object_creation_handling(ObjectCreationHandling::Replace),
    );
    replace.populate(&mut input(), &mut heap, target).unwrap();
    let fresh = object(&heap[target].slots[0]);
    assert_ne!(fresh, list);
    assert_eq!(heap[fresh].items(), Some(&[text("new")][..]));
    assert_eq!(heap[list].items().map(<[Value]>::len), Some(2));
}

#[test]
fn populate_existing_object() {
    let (registry, item) = items();
    let serializer = serializer(registry, SerializerSettings::default());
    let mut heap = Heap::new();
    let value = serializer
        .from_json(r#"{"id":1,"name":"a","children":[]}"#, &mut heap, Some(item))
        .unwrap();
    let id = object(&value);

    let node = crate::token::json::from_str(r#"{"name":"b"}"#).unwrap();
    let mut reader = crate::token::TreeReader::new(node);
    serializer.populate(&mut reader, &mut heap, id).unwrap();
    assert_eq!(heap[id].slots[0], Value::Int(1));
    assert_eq!(heap[id].slots[1], text("b"));

    let mut scalar = TokenBuffer::from(alloc::vec![Token::Value(Literal::Integer(1))]);
    assert!(serializer.populate(&mut scalar, &mut heap, id).is_err());
}

// -----------------------------------------------------------------------------
// Extension data and dynamic objects

#[test]
fn extension_data_round_trip() {
    let mut registry = TypeRegistry::new();
    let bag = registry.map_of(TypeKey::STRING, TypeKey::ANY).unwrap();
    let open = registry
        .register(
            "demo::Open",
            TypeBuilder::class()
                .field("Id", TypeKey::I32)
                .member(MemberBuilder::field("Rest", bag).attribute(ExtensionData::default()))
                .default_constructor(),
        )
        .unwrap();
    let serializer = serializer(registry, SerializerSettings::default());
    let json = r#"{"Id":1,"x":true,"y":[1,"two"]}"#;

    let mut heap = Heap::new();
    let value = serializer.from_json(json, &mut heap, Some(open)).unwrap();
    let rest = object(&heap[object(&value)].slots[1]);
    let entries = heap[rest].entries().unwrap();
    assert_eq!(entries[0], (text("x"), Value::Bool(true)));
    assert!(matches!(entries[1].1, Value::Node(Node::Array(_))));

    assert_eq!(serializer.to_json(&heap, &value, Some(open)).unwrap(), json);
}

#[test]
fn dynamic_members() {
    let mut registry = TypeRegistry::new();
    let bag = registry
        .register(
            "demo::Expando",
            TypeBuilder::class()
                .dynamic()
                .field("Kind", TypeKey::STRING)
                .default_constructor(),
        )
        .unwrap();
    let serializer = serializer(registry, SerializerSettings::default());
    let json = r#"{"Kind":"k","extra":5,"more":"m"}"#;

    let mut heap = Heap::new();
    let value = serializer.from_json(json, &mut heap, Some(bag)).unwrap();
    let id = object(&value);
    assert_eq!(heap[id].slots[0], text("k"));
    assert_eq!(
        heap[id].dynamic_members().unwrap(),
        [(String::from("extra"), Value::Int(5)), (String::from("more"), text("m"))]
    );
    assert_eq!(serializer.to_json(&heap, &value, Some(bag)).unwrap(), json);
}

// -----------------------------------------------------------------------------
// Converters

struct PointConverter {
    point: TypeKey,
}

impl Converter for PointConverter {
    fn can_convert(&self, _registry: &TypeRegistry, ty: TypeKey) -> bool {
        ty == self.point
    }

    fn write(&self, cx: &mut WriteContext<'_>, value: &Value) -> Result<()> {
        let id = value
            .as_object()
            .ok_or_else(|| cx.structure_error("expected a point"))?;
        let slots = &cx.heap()[id].slots;
        let text = alloc::format!(
            "{},{}",
            slots[0].as_i64().unwrap_or(0),
            slots[1].as_i64().unwrap_or(0)
        );
        cx.write_literal(Literal::String(text))
    }

    fn read(&self, cx: &mut ReadContext<'_>, ty: TypeKey, _existing: Option<&Value>) -> Result<Value> {
        let Some(Token::Value(Literal::String(text))) = cx.token() else {
            return Err(cx.structure_error("expected \"x,y\""));
        };
        let coords: Vec<i64> = text.split(',').filter_map(|c| c.trim().parse().ok()).collect();
        let [x, y] = coords[..] else {
            return Err(cx.structure_error("expected \"x,y\""));
        };
        let mut instance = Instance::new(ty);
        instance.slots = alloc::vec![Value::Int(x), Value::Int(y)];
        Ok(Value::Object(cx.heap_mut().alloc(instance)))
    }
}

#[test]
fn converters_take_over() {
    let mut registry = TypeRegistry::new();
    let point = registry
        .register(
            "demo::Point",
            TypeBuilder::class()
                .field("X", TypeKey::I32)
                .field("Y", TypeKey::I32)
                .default_constructor(),
        )
        .unwrap();
    let shape = registry
        .register(
            "demo::Circle",
            TypeBuilder::class()
                .field("Centre", point)
                .field("Radius", TypeKey::I32)
                .default_constructor(),
        )
        .unwrap();
    let settings = SerializerSettings::default().with_converter(Arc::new(PointConverter { point }));
    let serializer = serializer(registry, settings);
    let json = r#"{"Centre":"1,2","Radius":3}"#;

    let mut heap = Heap::new();
    let value = serializer.from_json(json, &mut heap, Some(shape)).unwrap();
    let centre = object(&heap[object(&value)].slots[0]);
    assert_eq!(heap[centre].slots, [Value::Int(1), Value::Int(2)]);
    assert_eq!(serializer.to_json(&heap, &value, Some(shape)).unwrap(), json);
}

// -----------------------------------------------------------------------------
// Properties

mod round_trip {
    use alloc::sync::Arc;

    use proptest::prelude::*;

    use crate::GraphSerializer;
    use crate::heap::{Heap, Instance};
    use crate::info::TypeKey;
    use crate::registry::TypeRegistry;
    use crate::value::Value;

    proptest! {
        #[test]
        fn lists_survive_json(
            numbers in proptest::collection::vec(any::<i64>(), 0..16),
            words in proptest::collection::vec("[a-z ]{0,12}", 0..8),
        ) {
            let mut registry = TypeRegistry::new();
            let ints = registry.list_of(TypeKey::I64).unwrap();
            let strings = registry.list_of(TypeKey::STRING).unwrap();
            let serializer = GraphSerializer::new(Arc::new(registry));

            let mut heap = Heap::new();
            let items: Vec<Value> = numbers.iter().copied().map(Value::Int).collect();
            let list = Value::Object(heap.alloc(Instance::list(ints, items.clone())));
            let json = serializer.to_json(&heap, &list, Some(ints)).unwrap();
            let back = serializer.from_json(&json, &mut heap, Some(ints)).unwrap();
            prop_assert_eq!(heap[back.as_object().unwrap()].items(), Some(&items[..]));

            let items: Vec<Value> = words.into_iter().map(Value::String).collect();
            let list = Value::Object(heap.alloc(Instance::list(strings, items.clone())));
            let json = serializer.to_json(&heap, &list, Some(strings)).unwrap();
            let back = serializer.from_json(&json, &mut heap, Some(strings)).unwrap();
            prop_assert_eq!(heap[back.as_object().unwrap()].items(), Some(&items[..]));
        }
    }
}
