use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use log::trace;

use super::context::ReadContext;
use crate::contract::{Contract, CreatorKind, ObjectContract, ObjectCreator, Property};
use crate::error::{Error, RequiredViolation, Result};
use crate::heap::Body;
use crate::settings::{
    ConstructorHandling, DefaultValueHandling, MissingMemberHandling, NullValueHandling,
    ObjectCreationHandling,
};
use crate::site::Site;
use crate::token::Token;
use crate::value::{ObjectId, Value};

/// Whether a property was seen in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    Absent,
    Null,
    Value,
}

/// Where a buffered creator property goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Parameter(usize),
    Property(usize),
    Extension,
}

/// A property read before its object could be created.
struct Pending {
    name: String,
    slot: Slot,
    value: Value,
}

impl<'a> ReadContext<'a> {
    // -------------------------------------------------------------------------
    // Creation

    /// Reads an object body; the cursor is on its first property or its end.
    pub(super) fn read_object(
        &mut self,
        object: &ObjectContract,
        contract: &Contract,
        existing: Option<ObjectId>,
        id: Option<&str>,
        site: Site<'_>,
    ) -> Result<Value> {
        if let Some(target) = existing {
            self.register(id, target)?;
            self.populate_object(target, object, contract, site)?;
            return Ok(Value::Object(target));
        }

        let base = object.base();
        if !base.is_instantiable() {
            return Err(self.structure_error(format!(
                "Could not create an instance of type '{}'. Type is an interface or abstract class and cannot be instantiated.",
                contract.type_path()
            )));
        }
        let allow_non_public =
            self.settings.constructor_handling == ConstructorHandling::AllowNonPublicDefaultConstructor;
        let default = base.default_creator();
        let use_creator = object.creator().is_some_and(|creator| {
            creator.kind() != CreatorKind::Parameterized
                || default.is_none()
                || (base.default_creator_non_public() && !allow_non_public)
        });

        match (object.creator(), default) {
            (Some(creator), _) if use_creator => self.create_with_creator(object, creator, contract, id, site),
            (_, Some(ctor)) => {
                let target = self.construct(base.created_type(), Some(ctor), &[])?;
                self.register(id, target)?;
                self.populate_object(target, object, contract, site)?;
                Ok(Value::Object(target))
            }
            _ => Err(self.structure_error(format!(
                "Unable to find a constructor to use for type '{}'. A class should either have a default constructor, one constructor with arguments or a constructor marked with the serialization constructor attribute.",
                contract.type_path()
            ))),
        }
    }

    // -------------------------------------------------------------------------
    // Default constructor path

    fn populate_object(
        &mut self,
        target: ObjectId,
        object: &ObjectContract,
        contract: &Contract,
        site: Site<'_>,
    ) -> Result<()> {
        let callbacks = contract.callbacks();
        self.run_callbacks(&callbacks.on_deserializing, target, "on_deserializing callback")?;

        let mut presence = alloc::vec![Presence::Absent; object.properties().len()];
        let mark = self.depth();
        loop {
            let name = match self.cursor.token() {
                Some(Token::PropertyName(name)) => name.clone(),
                Some(Token::EndObject) => break,
                _ => return Err(self.unexpected("reading an object")),
            };
            if let Err(err) = self.read_member(target, &name, object, contract, site, &mut presence) {
                self.handle(err, Some(target), contract, Some(&name), mark)?;
            }
            self.cursor.expect_next()?;
        }

        for (property, presence) in object.properties().iter().zip(presence) {
            self.check_presence(property, presence, object)?;
            if presence == Presence::Absent {
                self.populate_default(target, property)?;
            }
        }
        self.run_callbacks(&callbacks.on_deserialized, target, "on_deserialized callback")
    }

    /// Reads one property; the cursor is on its name and ends on the last
    /// token of its value.
    fn read_member(
        &mut self,
        target: ObjectId,
        name: &str,
        object: &ObjectContract,
        contract: &Contract,
        site: Site<'_>,
        presence: &mut [Presence],
    ) -> Result<()> {
        let Some(index) = object.properties().position_closest(name) else {
            return self.read_unknown(target, name, object, contract, site);
        };
        let property = &object.properties().as_slice()[index];
        self.cursor.expect_next()?;
        if property.ignored {
            return self.read_extension_entry(target, name, object, contract, site);
        }
        let is_null = matches!(self.cursor.token(), Some(Token::Value(literal)) if literal.is_null());
        presence[index] = if is_null { Presence::Null } else { Presence::Value };

        let member_site = Site {
            member: Some(property),
            container: Some(contract),
            container_property: site.member,
        };
        let existing = self.reusable_member(target, property, member_site)?;
        if existing.is_none() && !property.writable {
            return self.read_extension_entry(target, name, object, contract, site);
        }
        if is_null && self.null_handling(property) == NullValueHandling::Ignore {
            return Ok(());
        }

        let value = self.read_value(Some(property.property_type), existing, member_site)?;
        if existing.is_some() && value.as_object() == existing {
            return Ok(());
        }
        self.assign(target, property, value)
    }

    fn read_unknown(
        &mut self,
        target: ObjectId,
        name: &str,
        object: &ObjectContract,
        contract: &Contract,
        site: Site<'_>,
    ) -> Result<()> {
        let handling = object
            .missing_member_handling()
            .unwrap_or(self.settings.missing_member_handling);
        if handling == MissingMemberHandling::Error {
            return Err(Error::MissingMember {
                path: self.path(),
                member: name.into(),
                type_path: contract.type_path().into(),
            });
        }
        self.cursor.expect_next()?;
        self.read_extension_entry(target, name, object, contract, site)
    }

    #[inline]
    fn null_handling(&self, property: &Property) -> NullValueHandling {
        property
            .null_value_handling
            .unwrap_or(self.settings.null_value_handling)
    }

    /// The current value of `property` if the input should be read into it
    /// rather than replace it.
    fn reusable_member(
        &self,
        target: ObjectId,
        property: &Property,
        site: Site<'_>,
    ) -> Result<Option<ObjectId>> {
        let handling = property
            .object_creation_handling
            .unwrap_or(self.settings.object_creation_handling);
        if handling == ObjectCreationHandling::Replace || !property.readable {
            return Ok(None);
        }
        let opens_container = matches!(self.cursor.token(), Some(Token::StartObject | Token::StartArray));
        if !opens_container && site.converter().is_none() {
            return Ok(None);
        }
        let current = property
            .get_value(self.heap(), target)
            .map_err(|source| self.callback_error("reading member value", source))?;
        let Some(id) = current.as_object() else {
            return Ok(None);
        };
        let Some(ty) = self.heap.type_of(id) else {
            return Ok(None);
        };
        let mutable = match &*self.resolver.resolve_contract(ty)? {
            Contract::Array(array) => array.can_reuse() && !array.is_multidimensional(),
            Contract::Dictionary(dictionary) => dictionary.can_reuse(),
            Contract::Object(_) | Contract::Dynamic(_) => true,
            _ => false,
        };
        Ok(mutable.then_some(id))
    }

    /// Stores a value read for `property`, honoring the default value policy.
    fn assign(&mut self, target: ObjectId, property: &Property, value: Value) -> Result<()> {
        if !property.writable {
            return Ok(());
        }
        let handling = property
            .default_value_handling
            .unwrap_or(self.settings.default_value_handling);
        if handling.contains(DefaultValueHandling::IGNORE) && value == self.default_of(property) {
            trace!("not assigning default value of '{}'", property.name);
            return Ok(());
        }
        property
            .set_value(&mut *self.heap, target, value)
            .map_err(|source| self.callback_error("setting member value", source))
    }

    fn default_of(&self, property: &Property) -> Value {
        property
            .default_value
            .clone()
            .unwrap_or_else(|| self.registry().default_value(property.property_type))
    }

    fn check_presence(
        &self,
        property: &Property,
        presence: Presence,
        object: &ObjectContract,
    ) -> Result<()> {
        if property.ignored {
            return Ok(());
        }
        let required = property.resolved_required(object.item_required());
        let violation = match presence {
            Presence::Absent if required.requires_presence() => RequiredViolation::Missing,
            Presence::Null if required.forbids_null() => RequiredViolation::Null,
            _ => return Ok(()),
        };
        Err(Error::Required {
            path: self.path(),
            member: property.name.clone(),
            type_path: object.base().type_path().into(),
            violation,
        })
    }

    fn populate_default(&mut self, target: ObjectId, property: &Property) -> Result<()> {
        let handling = property
            .default_value_handling
            .unwrap_or(self.settings.default_value_handling);
        if property.ignored
            || !property.writable
            || !handling.contains(DefaultValueHandling::POPULATE)
        {
            return Ok(());
        }
        let value = self.default_of(property);
        property
            .set_value(&mut *self.heap, target, value)
            .map_err(|source| self.callback_error("setting default value", source))
    }

    // -------------------------------------------------------------------------
    // Extension data

    /// Reads the value at the cursor into the extension data of `target`,
    /// or skips it when the type keeps none.
    fn read_extension_entry(
        &mut self,
        target: ObjectId,
        name: &str,
        object: &ObjectContract,
        contract: &Contract,
        site: Site<'_>,
    ) -> Result<()> {
        let Some(ext) = object.extension_data().filter(|ext| ext.read) else {
            trace!("skipping unmapped property '{name}'");
            return self.cursor.skip();
        };
        let value = self.read_value(Some(ext.value_type), None, Site::item_of(contract, site.member))?;
        self.store_extension(target, name, value, object)
    }

    fn store_extension(
        &mut self,
        target: ObjectId,
        name: &str,
        value: Value,
        object: &ObjectContract,
    ) -> Result<()> {
        let Some(ext) = object.extension_data() else {
            return Ok(());
        };
        let current = match &ext.getter {
            Some(getter) => getter
                .get(self.heap(), target)
                .map_err(|source| self.callback_error("reading extension data", source))?,
            None => Value::Null,
        };
        let bag = match current.as_object() {
            Some(bag) => bag,
            None => {
                let Some(setter) = &ext.setter else {
                    return Err(self.structure_error(format!(
                        "Extension data member '{}' is empty and cannot be set.",
                        ext.member_name
                    )));
                };
                let bag = self.construct(ext.map_type, None, &[])?;
                setter
                    .set(&mut *self.heap, target, Value::Object(bag))
                    .map_err(|source| self.callback_error("setting extension data", source))?;
                bag
            }
        };
        let stored = self
            .heap
            .get_mut(bag)
            .is_some_and(|bag| bag.insert_entry(Value::String(name.into()), value));
        if stored {
            Ok(())
        } else {
            Err(self.structure_error(format!(
                "Extension data member '{}' does not hold a dictionary.",
                ext.member_name
            )))
        }
    }

    // -------------------------------------------------------------------------
    // Creator path

    fn create_with_creator(
        &mut self,
        object: &ObjectContract,
        creator: &ObjectCreator,
        contract: &Contract,
        id: Option<&str>,
        site: Site<'_>,
    ) -> Result<Value> {
        let mut pending = Vec::new();
        let mark = self.depth();
        loop {
            let name = match self.cursor.token() {
                Some(Token::PropertyName(name)) => name.clone(),
                Some(Token::EndObject) => break,
                _ => return Err(self.unexpected("reading an object")),
            };
            match self.read_pending(&name, object, contract, site) {
                Ok(Some(entry)) => pending.push(entry),
                Ok(None) => {}
                Err(err) => self.handle(err, None, contract, Some(&name), mark)?,
            }
            self.cursor.expect_next()?;
        }

        let parameters = object.creator_parameters();
        let mut args: Vec<Option<Value>> = alloc::vec![None; parameters.len()];
        let mut seen: Vec<(String, bool)> = Vec::with_capacity(pending.len());
        let mut leftovers = Vec::new();
        for entry in pending {
            seen.push((entry.name.clone(), entry.value.is_null()));
            match entry.slot {
                Slot::Parameter(index) => args[index] = Some(entry.value),
                _ => leftovers.push(entry),
            }
        }
        let args: Vec<Value> = args
            .into_iter()
            .zip(parameters.iter())
            .map(|(arg, parameter)| arg.unwrap_or_else(|| self.parameter_default(parameter)))
            .collect();

        let target = self.construct(contract.created_type(), Some(creator.constructor()), &args)?;
        self.register(id, target)?;
        let callbacks = contract.callbacks();
        self.run_callbacks(&callbacks.on_deserializing, target, "on_deserializing callback")?;

        for entry in leftovers {
            let result = match entry.slot {
                Slot::Property(index) => {
                    let property = &object.properties().as_slice()[index];
                    self.apply_leftover(target, property, entry.value)
                }
                _ => self.store_extension(target, &entry.name, entry.value, object),
            };
            if let Err(err) = result {
                self.handle(err, Some(target), contract, Some(&entry.name), mark)?;
            }
        }

        let presence_of = |name: &str| {
            seen.iter()
                .find(|(seen, _)| seen.eq_ignore_ascii_case(name))
                .map_or(Presence::Absent, |(_, null)| if *null { Presence::Null } else { Presence::Value })
        };
        for property in object.properties().iter() {
            let presence = presence_of(&property.name);
            self.check_presence(property, presence, object)?;
            if presence == Presence::Absent && parameters.get_closest(&property.name).is_none() {
                self.populate_default(target, property)?;
            }
        }
        for parameter in parameters.iter() {
            if object.properties().get_closest(&parameter.name).is_none() {
                self.check_presence(parameter, presence_of(&parameter.name), object)?;
            }
        }

        self.run_callbacks(&callbacks.on_deserialized, target, "on_deserialized callback")?;
        Ok(Value::Object(target))
    }

    /// Reads one property of an object that does not exist yet.
    fn read_pending(
        &mut self,
        name: &str,
        object: &ObjectContract,
        contract: &Contract,
        site: Site<'_>,
    ) -> Result<Option<Pending>> {
        let parameter = object.creator_parameters().position_closest(name);
        let member = object.properties().position_closest(name);
        let (slot, property) = match (parameter, member) {
            (Some(index), _) => (Slot::Parameter(index), &object.creator_parameters().as_slice()[index]),
            (None, Some(index)) => (Slot::Property(index), &object.properties().as_slice()[index]),
            (None, None) => {
                let handling = object
                    .missing_member_handling()
                    .unwrap_or(self.settings.missing_member_handling);
                if handling == MissingMemberHandling::Error {
                    return Err(Error::MissingMember {
                        path: self.path(),
                        member: name.into(),
                        type_path: contract.type_path().into(),
                    });
                }
                return self.read_pending_extension(name, object, contract, site);
            }
        };
        if property.ignored {
            return self.read_pending_extension(name, object, contract, site);
        }
        self.cursor.expect_next()?;
        let member_site = Site {
            member: Some(property),
            container: Some(contract),
            container_property: site.member,
        };
        let value = self.read_value(Some(property.property_type), None, member_site)?;
        Ok(Some(Pending {
            name: name.into(),
            slot,
            value,
        }))
    }

    fn read_pending_extension(
        &mut self,
        name: &str,
        object: &ObjectContract,
        contract: &Contract,
        site: Site<'_>,
    ) -> Result<Option<Pending>> {
        self.cursor.expect_next()?;
        let Some(ext) = object.extension_data().filter(|ext| ext.read) else {
            trace!("skipping unmapped property '{name}'");
            self.cursor.skip()?;
            return Ok(None);
        };
        let value = self.read_value(Some(ext.value_type), None, Site::item_of(contract, site.member))?;
        Ok(Some(Pending {
            name: name.into(),
            slot: Slot::Extension,
            value,
        }))
    }

    fn parameter_default(&self, parameter: &Property) -> Value {
        let handling = parameter
            .default_value_handling
            .unwrap_or(self.settings.default_value_handling);
        match &parameter.default_value {
            Some(value) if handling.contains(DefaultValueHandling::POPULATE) => value.clone(),
            _ => self.registry().default_value(parameter.property_type),
        }
    }

    /// Applies a property read before construction. A read-only collection
    /// member receives the elements that were read.
    fn apply_leftover(&mut self, target: ObjectId, property: &Property, value: Value) -> Result<()> {
        if property.writable {
            if value.is_null() && self.null_handling(property) == NullValueHandling::Ignore {
                return Ok(());
            }
            return self.assign(target, property, value);
        }
        let Some(source) = value.as_object() else {
            return Ok(());
        };
        if !property.readable {
            return Ok(());
        }
        let current = property
            .get_value(self.heap(), target)
            .map_err(|source| self.callback_error("reading member value", source))?;
        match current.as_object() {
            Some(dest) if dest != source => self.merge_collection(source, dest),
            _ => Ok(()),
        }
    }

    fn merge_collection(&mut self, source: ObjectId, dest: ObjectId) -> Result<()> {
        let body = if self.references.is_referenced(source) {
            self.heap.get(source).map(|instance| instance.body.clone())
        } else {
            self.heap.remove(source).map(|instance| instance.body)
        };
        let Some(instance) = self.heap.get_mut(dest) else {
            return Ok(());
        };
        match body {
            Some(Body::List(items)) => {
                if let Some(existing) = instance.items_mut() {
                    existing.extend(items);
                }
            }
            Some(Body::Map(entries)) => {
                for (key, value) in entries.into_vec() {
                    instance.insert_entry(key, value);
                }
            }
            _ => {}
        }
        Ok(())
    }
}
