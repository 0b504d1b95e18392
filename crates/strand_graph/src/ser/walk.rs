use alloc::format;
use alloc::string::{String, ToString};
use alloc::sync::Arc;

use log::{trace, warn};

use super::context::WriteContext;
use crate::coerce::{key_to_string, value_to_literal};
use crate::contract::{
    ArrayContract, Contract, DictionaryContract, DynamicContract, ExtensionDataMember, ObjectContract,
    PrimitiveContract, Property, StringContract,
};
use crate::convert::Converter;
use crate::error::{Error, Result};
use crate::heap::{Body, Instance};
use crate::info::{PrimitiveType, TypeKey};
use crate::settings::{
    DefaultValueHandling, NullValueHandling, PreserveReferences, ReferenceLoopHandling, Required,
    TypeNameHandling,
};
use crate::site::Site;
use crate::token::{Literal, Token, TokenReader, TreeReader};
use crate::value::{ObjectId, Value};

impl<'a> WriteContext<'a> {
    // -------------------------------------------------------------------------
    // Runtime types

    /// The type a value is written as.
    ///
    /// Objects use their heap type. Numbers keep the declared width when the
    /// declaration is numeric, so a `u8` member still resolves the `u8`
    /// contract and its converters.
    fn runtime_type(&self, value: &Value, declared: Option<TypeKey>) -> Result<Option<TypeKey>> {
        let registry = self.registry();
        let declared = declared
            .map(|ty| registry.non_nullable(ty))
            .and_then(PrimitiveType::from_key);
        let ty = match value {
            Value::Null => return Ok(None),
            Value::Bool(_) => TypeKey::BOOL,
            Value::Int(_) => match declared {
                Some(p) if p.is_integer() => p.key(),
                _ => TypeKey::I64,
            },
            Value::Float(_) => match declared {
                Some(PrimitiveType::Float32) => TypeKey::F32,
                _ => TypeKey::F64,
            },
            Value::Char(_) => TypeKey::CHAR,
            Value::String(_) => TypeKey::STRING,
            Value::Date(_) => TypeKey::DATE_TIME,
            Value::Guid(_) => TypeKey::GUID,
            Value::Bytes(_) => TypeKey::BYTES,
            Value::Enum(e) => e.ty,
            Value::Object(id) => self
                .heap
                .type_of(*id)
                .ok_or_else(|| self.missing_object(*id))?,
            Value::Node(_) => TypeKey::NODE,
        };
        Ok(Some(ty))
    }

    pub(super) fn runtime_contract(
        &self,
        value: &Value,
        declared: Option<TypeKey>,
    ) -> Result<Option<Arc<Contract>>> {
        match self.runtime_type(value, declared)? {
            Some(ty) => self.resolver.resolve_contract(ty).map(Some),
            None => Ok(None),
        }
    }

    // -------------------------------------------------------------------------
    // Policies

    fn find_converter(&self, contract: &Contract, site: Site<'_>) -> Option<Arc<dyn Converter>> {
        let converter = site
            .converter()
            .or_else(|| contract.converter())
            .cloned()
            .or_else(|| {
                let registry = self.registry();
                let ty = contract.underlying_type();
                self.settings
                    .converters
                    .iter()
                    .find(|c| c.can_convert(registry, ty))
                    .cloned()
            })?;
        converter.can_write().then_some(converter)
    }

    fn is_reference(&self, contract: &Contract, site: Site<'_>) -> bool {
        site.is_reference()
            .or(contract.base().is_reference)
            .unwrap_or_else(|| {
                let preserve = self.settings.preserve_references;
                match contract {
                    Contract::Array(_) => preserve.contains(PreserveReferences::ARRAYS),
                    Contract::Object(_) | Contract::Dictionary(_) | Contract::Dynamic(_) => {
                        preserve.contains(PreserveReferences::OBJECTS)
                    }
                    _ => false,
                }
            })
    }

    fn should_write_reference(&self, id: ObjectId, contract: &Contract, site: Site<'_>) -> bool {
        self.is_reference(contract, site) && self.references.is_referenced(id)
    }

    /// `false` when the value closes a loop that must be skipped.
    fn check_loop(&self, id: ObjectId, contract: &Contract, site: Site<'_>) -> Result<bool> {
        if !self.stack.contains(&id) {
            return Ok(true);
        }
        let handling = site
            .reference_loop_handling()
            .unwrap_or(self.settings.reference_loop_handling);
        match handling {
            ReferenceLoopHandling::Error => Err(Error::ReferenceLoop {
                path: self.path(),
                member: site.member.map(|p| p.name.clone()),
                type_path: contract.type_path().into(),
            }),
            ReferenceLoopHandling::Ignore => {
                warn!(
                    "skipping self referencing loop with type '{}' at '{}'",
                    contract.type_path(),
                    self.path()
                );
                Ok(false)
            }
            ReferenceLoopHandling::Serialize => Ok(true),
        }
    }

    /// The type a value at `site` is declared as, for type name economy.
    fn declared_type(&self, site: Site<'_>) -> Option<TypeKey> {
        if let Some(member) = site.member {
            return Some(member.property_type);
        }
        if let Some(container) = site.container {
            return Some(match container {
                Contract::Array(c) => c.element_type,
                Contract::Dictionary(c) => c.value_type,
                Contract::Object(c) => c
                    .extension_data
                    .as_ref()
                    .map_or(TypeKey::ANY, |ext| ext.value_type),
                _ => TypeKey::ANY,
            });
        }
        if self.stack.len() == 1 {
            return self.root_type;
        }
        None
    }

    fn should_write_type(
        &self,
        kind: TypeNameHandling,
        contract: &Contract,
        site: Site<'_>,
    ) -> Result<bool> {
        let handling = site
            .type_name_handling()
            .unwrap_or(self.settings.type_name_handling);
        if handling.contains(kind) {
            return Ok(true);
        }
        if !handling.contains(TypeNameHandling::AUTO) {
            return Ok(false);
        }
        match self.declared_type(site) {
            Some(declared) => {
                let declared = self.resolver.resolve_contract(declared)?;
                Ok(declared.created_type() != contract.underlying_type())
            }
            None => Ok(false),
        }
    }

    // -------------------------------------------------------------------------
    // Metadata

    fn write_id_property(&mut self, id: ObjectId) -> Result<()> {
        let reference = self.references.reference_id(id);
        self.write_property_name("$id")?;
        self.write_literal(Literal::String(reference))
    }

    fn write_type_property(&mut self, ty: TypeKey) -> Result<()> {
        let registry = self.registry();
        let Some(name) = self.settings.binder.bind_to_name(registry, ty) else {
            return Err(self.structure_error(format!(
                "Type '{}' cannot be named in type metadata.",
                registry.path_of(ty).unwrap_or("?")
            )));
        };
        self.write_property_name("$type")?;
        self.write_literal(Literal::String(name))
    }

    fn write_reference(&mut self, id: ObjectId) -> Result<()> {
        let reference = self.references.reference_id(id);
        trace!("writing reference {reference} at '{}'", self.path());
        self.write_token(Token::StartObject)?;
        self.write_property_name("$ref")?;
        self.write_literal(Literal::String(reference))?;
        self.write_token(Token::EndObject)
    }

    fn write_object_start(&mut self, id: ObjectId, contract: &Contract, site: Site<'_>) -> Result<()> {
        self.write_token(Token::StartObject)?;
        if self.is_reference(contract, site) {
            self.write_id_property(id)?;
        }
        if self.should_write_type(TypeNameHandling::OBJECTS, contract, site)? {
            self.write_type_property(contract.underlying_type())?;
        }
        Ok(())
    }

    /// Opens an array, wrapped in a metadata object when it needs an id or
    /// a type name. Returns whether it was wrapped.
    fn write_array_start(&mut self, id: ObjectId, contract: &Contract, site: Site<'_>) -> Result<bool> {
        let is_reference = self.is_reference(contract, site);
        let with_type = self.should_write_type(TypeNameHandling::ARRAYS, contract, site)?;
        let wrapped = is_reference || with_type;
        if wrapped {
            self.write_token(Token::StartObject)?;
            if is_reference {
                self.write_id_property(id)?;
            }
            if with_type {
                self.write_type_property(contract.underlying_type())?;
            }
            self.write_property_name("$values")?;
        }
        self.write_token(Token::StartArray)?;
        Ok(wrapped)
    }

    // -------------------------------------------------------------------------
    // Values

    /// Writes a non-root value, optionally preceded by its property name.
    ///
    /// Loops are checked before the name so a skipped value leaves no trace.
    fn write_entry(
        &mut self,
        name: Option<&str>,
        value: &Value,
        declared: Option<TypeKey>,
        site: Site<'_>,
    ) -> Result<()> {
        let contract = self.runtime_contract(value, declared)?;
        if let Some(contract) = &contract
            && contract.is_container()
            && let Some(id) = value.as_object()
            && !self.should_write_reference(id, contract, site)
            && !self.check_loop(id, contract, site)?
        {
            return Ok(());
        }
        if let Some(name) = name {
            self.write_property_name(name)?;
        }
        match &contract {
            Some(contract) => self.write_value(value, contract, site),
            None => self.write_null(),
        }
    }

    pub(super) fn write_value(&mut self, value: &Value, contract: &Contract, site: Site<'_>) -> Result<()> {
        if value.is_null() {
            return self.write_null();
        }
        if let Some(converter) = self.find_converter(contract, site) {
            return converter.write(self, value);
        }
        match contract {
            Contract::Primitive(c) => self.write_primitive(value, c),
            Contract::String(c) => self.write_string(value, c),
            Contract::Document(_) => self.write_document(value),
            Contract::Object(c) => match self.enter(value, contract, site)? {
                Some(id) => self.with_callbacks(id, contract, |cx| cx.write_object(id, c, contract, site)),
                None => Ok(()),
            },
            Contract::Array(c) => match self.enter(value, contract, site)? {
                Some(id) => self.with_callbacks(id, contract, |cx| cx.write_array(id, c, contract, site)),
                None => Ok(()),
            },
            Contract::Dictionary(c) => match self.enter(value, contract, site)? {
                Some(id) => {
                    self.with_callbacks(id, contract, |cx| cx.write_dictionary(id, c, contract, site))
                }
                None => Ok(()),
            },
            Contract::Dynamic(c) => match self.enter(value, contract, site)? {
                Some(id) => self.with_callbacks(id, contract, |cx| cx.write_dynamic(id, c, contract, site)),
                None => Ok(()),
            },
        }
    }

    /// The object to write in full, or `None` once a `$ref` was written.
    fn enter(&mut self, value: &Value, contract: &Contract, site: Site<'_>) -> Result<Option<ObjectId>> {
        let Some(id) = value.as_object() else {
            return Err(self.structure_error(format!(
                "Cannot write {} value with the {} contract of '{}'.",
                value.kind_name(),
                contract.kind(),
                contract.type_path()
            )));
        };
        if self.should_write_reference(id, contract, site) {
            self.write_reference(id)?;
            return Ok(None);
        }
        Ok(Some(id))
    }

    fn with_callbacks(
        &mut self,
        id: ObjectId,
        contract: &Contract,
        body: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let callbacks = contract.callbacks();
        self.run_callbacks(&callbacks.on_serializing, id, "on_serializing callback")?;
        self.stack.push(id);
        let result = body(self);
        self.stack.pop();
        result?;
        self.run_callbacks(&callbacks.on_serialized, id, "on_serialized callback")
    }

    fn write_primitive(&mut self, value: &Value, contract: &PrimitiveContract) -> Result<()> {
        let converted;
        let leaf = match contract.conversion() {
            Some(conversion) => {
                converted = (conversion.to_primitive)(self.heap, value)
                    .map_err(|source| self.callback_error("converting to primitive", source))?;
                &converted
            }
            None => value,
        };
        match value_to_literal(leaf) {
            Some(literal) => self.write_literal(literal),
            None => Err(Error::Conversion {
                path: self.path(),
                value: leaf.kind_name().into(),
                target: contract.base().type_path().into(),
                reason: String::from("The value is not a primitive."),
            }),
        }
    }

    fn write_string(&mut self, value: &Value, contract: &StringContract) -> Result<()> {
        let text = (contract.conversion().to_string)(self.heap, value)
            .map_err(|source| self.callback_error("converting to string", source))?;
        self.write_literal(Literal::String(text))
    }

    fn write_document(&mut self, value: &Value) -> Result<()> {
        let Value::Node(node) = value else {
            return match value_to_literal(value) {
                Some(literal) => self.write_literal(literal),
                None => Err(self.structure_error("Only document values can be written as a document.")),
            };
        };
        let mut reader = TreeReader::new(node.clone());
        loop {
            let token = reader.read_token().map_err(|source| Error::Token {
                path: self.path(),
                source,
            })?;
            match token {
                Some(token) => self.write_token(token)?,
                None => return Ok(()),
            }
        }
    }

    // -------------------------------------------------------------------------
    // Objects

    fn write_object(
        &mut self,
        id: ObjectId,
        object: &ObjectContract,
        contract: &Contract,
        site: Site<'_>,
    ) -> Result<()> {
        self.write_object_start(id, contract, site)?;
        let mark = self.depth();
        for property in object.properties.iter() {
            if let Err(err) = self.write_member(id, property, object.item_required, contract, site.member) {
                self.handle(err, id, contract, Some(property.name.as_str()), mark)?;
            }
        }
        if let Some(ext) = &object.extension_data
            && ext.write
        {
            self.write_extension_data(id, object, ext, contract, site.member, mark)?;
        }
        self.write_token(Token::EndObject)
    }

    fn write_member(
        &mut self,
        id: ObjectId,
        property: &Property,
        item_required: Option<Required>,
        contract: &Contract,
        container_property: Option<&Property>,
    ) -> Result<()> {
        if property.ignored || !property.readable || !property.should_serialize(self.heap, id) {
            return Ok(());
        }
        self.path_mut().set_property(&property.name);
        let value = property
            .get_value(self.heap, id)
            .map_err(|source| self.callback_error("reading member value", source))?;

        if value.is_null() {
            let handling = property
                .null_value_handling
                .unwrap_or(self.settings.null_value_handling);
            if handling == NullValueHandling::Ignore {
                return Ok(());
            }
            if property.resolved_required(item_required).forbids_null() {
                return Err(Error::NullNotAllowed {
                    path: self.path(),
                    member: property.name.clone(),
                });
            }
        }

        let handling = property
            .default_value_handling
            .unwrap_or(self.settings.default_value_handling);
        if handling.contains(DefaultValueHandling::IGNORE) {
            let is_default = match &property.default_value {
                Some(default) => &value == default,
                None => value == self.registry().default_value(property.property_type),
            };
            if is_default {
                trace!("skipping default value of '{}'", property.name);
                return Ok(());
            }
        }

        let site = Site {
            member: Some(property),
            container: Some(contract),
            container_property,
        };
        self.write_entry(Some(property.name.as_str()), &value, Some(property.property_type), site)
    }

    fn write_extension_data(
        &mut self,
        id: ObjectId,
        object: &ObjectContract,
        ext: &ExtensionDataMember,
        contract: &Contract,
        container_property: Option<&Property>,
        mark: usize,
    ) -> Result<()> {
        let Some(getter) = &ext.getter else {
            return Ok(());
        };
        let bag = match getter.get(self.heap, id) {
            Ok(bag) => bag,
            Err(source) => {
                let err = self.callback_error("reading extension data", source);
                return self.handle(err, id, contract, Some(ext.member_name.as_str()), mark);
            }
        };
        let heap = self.heap;
        let Some(entries) = bag.as_object().and_then(|bag| heap.get(bag)).and_then(Instance::entries)
        else {
            return Ok(());
        };
        let site = Site::item_of(contract, container_property);
        for (key, value) in entries {
            let result = match key_to_string(self.registry(), key) {
                Some(key) => {
                    let name = object.extension_data_name(&key);
                    self.path_mut().set_property(&name);
                    self.write_entry(Some(name.as_str()), value, Some(ext.value_type), site)
                }
                None => Err(self.structure_error("Extension data keys must be text.")),
            };
            if let Err(err) = result {
                self.handle(err, id, contract, Some(ext.member_name.as_str()), mark)?;
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Collections

    fn write_array(
        &mut self,
        id: ObjectId,
        array: &ArrayContract,
        contract: &Contract,
        site: Site<'_>,
    ) -> Result<()> {
        let wrapped = self.write_array_start(id, contract, site)?;
        let heap = self.heap;
        let instance = heap.get(id).ok_or_else(|| self.missing_object(id))?;
        let item_site = Site::item_of(contract, site.member);
        match &instance.body {
            Body::List(items) => {
                let mark = self.depth();
                for (index, item) in items.iter().enumerate() {
                    self.write_item(id, index, item, array.element_type, contract, item_site, mark)?;
                }
            }
            Body::Grid { dims, items } => {
                self.write_dimensions(id, dims, items, 0, array.element_type, contract, item_site)?;
            }
            _ => {
                return Err(self.structure_error(format!(
                    "Instance of '{}' holds no sequence.",
                    contract.type_path()
                )));
            }
        }
        self.write_token(Token::EndArray)?;
        if wrapped {
            self.write_token(Token::EndObject)?;
        }
        Ok(())
    }

    fn write_item(
        &mut self,
        id: ObjectId,
        index: usize,
        item: &Value,
        element_type: TypeKey,
        contract: &Contract,
        site: Site<'_>,
        mark: usize,
    ) -> Result<()> {
        match self.write_entry(None, item, Some(element_type), site) {
            Ok(()) => Ok(()),
            Err(err) => {
                let index = index.to_string();
                self.handle(err, id, contract, Some(index.as_str()), mark)
            }
        }
    }

    /// Writes a row-major grid as nested arrays; the outermost array is
    /// already open.
    fn write_dimensions(
        &mut self,
        id: ObjectId,
        dims: &[usize],
        items: &[Value],
        offset: usize,
        element_type: TypeKey,
        contract: &Contract,
        site: Site<'_>,
    ) -> Result<()> {
        let Some((&len, rest)) = dims.split_first() else {
            return Ok(());
        };
        let stride: usize = rest.iter().product();
        let mark = self.depth();
        for i in 0..len {
            let Some(chunk) = items.get(i * stride..(i + 1) * stride) else {
                return Err(self.structure_error("Array dimensions do not match its length."));
            };
            if rest.is_empty() {
                if let Some(item) = chunk.first() {
                    self.write_item(id, offset + i, item, element_type, contract, site, mark)?;
                }
            } else {
                self.write_token(Token::StartArray)?;
                let start = offset + i * stride;
                self.write_dimensions(id, rest, chunk, start, element_type, contract, site)?;
                self.write_token(Token::EndArray)?;
            }
        }
        Ok(())
    }

    fn write_dictionary(
        &mut self,
        id: ObjectId,
        dictionary: &DictionaryContract,
        contract: &Contract,
        site: Site<'_>,
    ) -> Result<()> {
        self.write_object_start(id, contract, site)?;
        let heap = self.heap;
        let entries = heap
            .get(id)
            .and_then(Instance::entries)
            .ok_or_else(|| self.structure_error("Dictionary instance holds no entries."))?;
        let entry_site = Site::item_of(contract, site.member);
        let mark = self.depth();
        for (key, value) in entries {
            let (name, result) = match self.key_text(key, dictionary.key_type) {
                Ok(key) => {
                    let name = dictionary.key_name(&key);
                    self.path_mut().set_property(&name);
                    let result = self.write_entry(Some(name.as_str()), value, Some(dictionary.value_type), entry_site);
                    (Some(name), result)
                }
                Err(err) => (None, Err(err)),
            };
            if let Err(err) = result {
                self.handle(err, id, contract, name.as_deref(), mark)?;
            }
        }
        self.write_token(Token::EndObject)
    }

    fn key_text(&self, key: &Value, key_type: TypeKey) -> Result<String> {
        if let Some(text) = key_to_string(self.registry(), key) {
            return Ok(text);
        }
        if key.as_object().is_some()
            && let Some(contract) = self.runtime_contract(key, Some(key_type))?
            && let Contract::String(string) = &*contract
        {
            return (string.conversion().to_string)(self.heap, key)
                .map_err(|source| self.callback_error("converting dictionary key", source));
        }
        Err(Error::Conversion {
            path: self.path(),
            value: key.kind_name().into(),
            target: String::from("string"),
            reason: String::from("Dictionary keys must convert to text."),
        })
    }

    fn write_dynamic(
        &mut self,
        id: ObjectId,
        dynamic: &DynamicContract,
        contract: &Contract,
        site: Site<'_>,
    ) -> Result<()> {
        self.write_object_start(id, contract, site)?;
        let mark = self.depth();
        for property in dynamic.properties.iter() {
            if let Err(err) = self.write_member(id, property, None, contract, site.member) {
                self.handle(err, id, contract, Some(property.name.as_str()), mark)?;
            }
        }
        let heap = self.heap;
        if let Some(members) = heap.get(id).and_then(Instance::dynamic_members) {
            let member_site = Site::item_of(contract, site.member);
            for (name, value) in members {
                if value.is_null() && self.settings.null_value_handling == NullValueHandling::Ignore {
                    continue;
                }
                let name = dynamic.member_name(name);
                self.path_mut().set_property(&name);
                if let Err(err) = self.write_entry(Some(name.as_str()), value, None, member_site) {
                    self.handle(err, id, contract, Some(name.as_str()), mark)?;
                }
            }
        }
        self.write_token(Token::EndObject)
    }
}
