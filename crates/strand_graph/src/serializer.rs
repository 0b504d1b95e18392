use alloc::string::String;
use alloc::sync::Arc;

use log::debug;

use crate::de::ReadContext;
use crate::error::{Error, Result};
use crate::heap::Heap;
use crate::info::TypeKey;
use crate::reference::{DefaultReferenceResolver, ReferenceResolver};
use crate::registry::TypeRegistry;
use crate::resolve::{ContractResolve, DefaultContractResolver};
use crate::ser::WriteContext;
use crate::settings::SerializerSettings;
use crate::token::{Node, TokenError, TokenReader, TokenWriter, TreeReader, TreeWriter, json};
use crate::value::{ObjectId, Value};

// -----------------------------------------------------------------------------
// GraphSerializer

/// Writes object graphs to token streams and reads them back.
///
/// A serializer is cheap to share: it holds the settings and a contract
/// resolver whose cache lives as long as the resolver. Each call creates its
/// own reference map unless one is passed explicitly.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use strand_graph::GraphSerializer;
/// use strand_graph::heap::Heap;
/// use strand_graph::info::{TypeBuilder, TypeKey};
/// use strand_graph::registry::TypeRegistry;
/// use strand_graph::value::Value;
///
/// let mut registry = TypeRegistry::new();
/// let point = registry
///     .register(
///         "geo::Point",
///         TypeBuilder::class()
///             .field("X", TypeKey::I32)
///             .field("Y", TypeKey::I32)
///             .default_constructor(),
///     )
///     .unwrap();
///
/// let serializer = GraphSerializer::new(Arc::new(registry));
///
/// let mut heap = Heap::new();
/// let value = serializer
///     .from_json(r#"{"X":3,"Y":4}"#, &mut heap, Some(point))
///     .unwrap();
/// let id = value.as_object().unwrap();
/// assert_eq!(heap[id].slots, [Value::Int(3), Value::Int(4)]);
///
/// let json = serializer.to_json(&heap, &value, Some(point)).unwrap();
/// assert_eq!(json, r#"{"X":3,"Y":4}"#);
/// ```
#[derive(Clone)]
pub struct GraphSerializer {
    settings: SerializerSettings,
    resolver: Arc<dyn ContractResolve>,
}

impl GraphSerializer {
    /// A serializer with default settings over a [`DefaultContractResolver`].
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::with_resolver(Arc::new(DefaultContractResolver::new(registry)))
    }

    pub fn with_resolver(resolver: Arc<dyn ContractResolve>) -> Self {
        Self {
            settings: SerializerSettings::default(),
            resolver,
        }
    }

    #[inline]
    pub fn with_settings(mut self, settings: SerializerSettings) -> Self {
        self.settings = settings;
        self
    }

    #[inline]
    pub fn settings(&self) -> &SerializerSettings {
        &self.settings
    }

    #[inline]
    pub fn settings_mut(&mut self) -> &mut SerializerSettings {
        &mut self.settings
    }

    #[inline]
    pub fn resolver(&self) -> &dyn ContractResolve {
        &*self.resolver
    }

    #[inline]
    pub fn registry(&self) -> &TypeRegistry {
        self.resolver.registry()
    }

    // -------------------------------------------------------------------------
    // Writing

    /// Writes `value` and everything reachable from it.
    ///
    /// `declared` is the type the reader will expect at the root; it decides
    /// whether `$type` is needed under [`TypeNameHandling::AUTO`].
    ///
    /// [`TypeNameHandling::AUTO`]: crate::settings::TypeNameHandling::AUTO
    pub fn serialize(
        &self,
        heap: &Heap,
        value: &Value,
        declared: Option<TypeKey>,
        out: &mut dyn TokenWriter,
    ) -> Result<()> {
        let mut references = DefaultReferenceResolver::new();
        self.serialize_with_references(heap, value, declared, out, &mut references)
    }

    /// Like [`serialize`](Self::serialize) with ids taken from and recorded
    /// in `references`.
    pub fn serialize_with_references(
        &self,
        heap: &Heap,
        value: &Value,
        declared: Option<TypeKey>,
        out: &mut dyn TokenWriter,
        references: &mut dyn ReferenceResolver,
    ) -> Result<()> {
        let mut cx = WriteContext::new(&self.settings, &*self.resolver, references, heap, out);
        cx.write_root(value, declared)
    }

    /// Writes `value` into a document tree.
    pub fn to_node(&self, heap: &Heap, value: &Value, declared: Option<TypeKey>) -> Result<Node> {
        let mut writer = TreeWriter::new();
        self.serialize(heap, value, declared, &mut writer)?;
        writer.finish().map_err(token_error)
    }

    /// Writes `value` as compact JSON text.
    pub fn to_json(&self, heap: &Heap, value: &Value, declared: Option<TypeKey>) -> Result<String> {
        let node = self.to_node(heap, value, declared)?;
        json::to_string(&node).map_err(token_error)
    }

    pub fn to_json_pretty(&self, heap: &Heap, value: &Value, declared: Option<TypeKey>) -> Result<String> {
        let node = self.to_node(heap, value, declared)?;
        json::to_string_pretty(&node).map_err(token_error)
    }

    // -------------------------------------------------------------------------
    // Reading

    /// Reads one value of type `ty`, allocating its instances in `heap`.
    ///
    /// `None` reads the value as untyped: objects and arrays become
    /// [`Value::Node`] unless they carry `$type`. Empty input reads as
    /// [`Value::Null`].
    pub fn deserialize(
        &self,
        source: &mut dyn TokenReader,
        heap: &mut Heap,
        ty: Option<TypeKey>,
    ) -> Result<Value> {
        let mut references = DefaultReferenceResolver::new();
        self.deserialize_with_references(source, heap, ty, &mut references)
    }

    /// Like [`deserialize`](Self::deserialize) with `$id`s registered in and
    /// `$ref`s resolved through `references`.
    pub fn deserialize_with_references(
        &self,
        source: &mut dyn TokenReader,
        heap: &mut Heap,
        ty: Option<TypeKey>,
        references: &mut dyn ReferenceResolver,
    ) -> Result<Value> {
        let mut cx = ReadContext::new(&self.settings, &*self.resolver, references, heap, source);
        let value = cx.read_root(ty)?;
        debug!("read {} value", value.kind_name());
        Ok(value)
    }

    /// Reads an object, array or dictionary into the existing `target`.
    ///
    /// # Errors
    ///
    /// Fails if the input does not start with an object or an array, or if
    /// `target` cannot be filled in place.
    pub fn populate(
        &self,
        source: &mut dyn TokenReader,
        heap: &mut Heap,
        target: ObjectId,
    ) -> Result<()> {
        let mut references = DefaultReferenceResolver::new();
        let mut cx = ReadContext::new(&self.settings, &*self.resolver, &mut references, heap, source);
        cx.populate_root(target)
    }

    pub fn from_node(&self, node: Node, heap: &mut Heap, ty: Option<TypeKey>) -> Result<Value> {
        let mut reader = TreeReader::new(node);
        self.deserialize(&mut reader, heap, ty)
    }

    pub fn from_json(&self, text: &str, heap: &mut Heap, ty: Option<TypeKey>) -> Result<Value> {
        let node = json::from_str(text).map_err(token_error)?;
        self.from_node(node, heap, ty)
    }
}

impl core::fmt::Debug for GraphSerializer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GraphSerializer")
            .field("max_depth", &self.settings.max_depth)
            .finish_non_exhaustive()
    }
}

#[inline]
fn token_error(source: TokenError) -> Error {
    Error::Token {
        path: String::new(),
        source,
    }
}
