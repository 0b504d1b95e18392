use alloc::format;
use alloc::string::ToString;
use alloc::vec::Vec;

use super::context::ReadContext;
use crate::coerce::coerce_literal;
use crate::contract::{ArrayContract, Contract, DictionaryContract, DynamicContract};
use crate::error::{Error, Result};
use crate::heap::{Body, Entries};
use crate::info::TypeKey;
use crate::site::Site;
use crate::token::{Literal, Token};
use crate::value::{ObjectId, Value};

impl<'a> ReadContext<'a> {
    // -------------------------------------------------------------------------
    // Lists

    /// Reads a one-dimensional array; the cursor is on its `StartArray`.
    pub(super) fn read_list(
        &mut self,
        array: &ArrayContract,
        contract: &Contract,
        existing: Option<ObjectId>,
        id: Option<&str>,
        site: Site<'_>,
    ) -> Result<Value> {
        let reusable = existing.filter(|&target| {
            array.can_reuse()
                && matches!(self.heap.get(target).map(|i| &i.body), Some(Body::List(_)))
        });
        let target = match reusable {
            Some(target) => Some(target),
            None if array.needs_temporary() => None,
            None => Some(self.create_default(contract)?),
        };
        let callbacks = contract.callbacks();
        if let Some(target) = target {
            self.register(id, target)?;
            self.run_callbacks(&callbacks.on_deserializing, target, "on_deserializing callback")?;
        }

        let mut buffer = Vec::new();
        let mark = self.depth();
        let mut index = 0usize;
        loop {
            self.cursor.expect_next()?;
            if matches!(self.cursor.token(), Some(Token::EndArray)) {
                break;
            }
            let item = self.read_value(
                Some(array.element_type()),
                None,
                Site::item_of(contract, site.member),
            );
            let result = item.and_then(|value| match target {
                Some(target) => self.push_item(target, value),
                None => {
                    buffer.push(value);
                    Ok(())
                }
            });
            if let Err(err) = result {
                let member = index.to_string();
                self.handle(err, target, contract, Some(&member), mark)?;
            }
            index += 1;
        }

        let target = match (target, &array.creator) {
            (Some(target), _) => target,
            (None, Some(creator)) => {
                let target = creator(&mut *self.heap, contract.created_type(), buffer)
                    .map_err(|source| self.callback_error("creating collection", source))?;
                self.register(id, target)?;
                self.run_callbacks(&callbacks.on_deserializing, target, "on_deserializing callback")?;
                target
            }
            (None, None) => return Err(self.structure_error("Collection has no creator.")),
        };
        self.run_callbacks(&callbacks.on_deserialized, target, "on_deserialized callback")?;
        Ok(Value::Object(target))
    }

    fn push_item(&mut self, target: ObjectId, value: Value) -> Result<()> {
        match self.heap.get_mut(target).and_then(|i| i.items_mut()) {
            Some(items) => {
                items.push(value);
                Ok(())
            }
            None => Err(self.structure_error("Instance does not hold a list.")),
        }
    }

    // -------------------------------------------------------------------------
    // Multidimensional arrays

    /// Reads nested arrays into a rectangular grid; the cursor is on the
    /// outermost `StartArray`.
    pub(super) fn read_grid(
        &mut self,
        array: &ArrayContract,
        contract: &Contract,
        id: Option<&str>,
        site: Site<'_>,
    ) -> Result<Value> {
        let mut dims = alloc::vec![None; array.rank()];
        let mut items = Vec::new();
        self.read_dimension(array, contract, site, 0, &mut dims, &mut items)?;

        let target = self.create_default(contract)?;
        let dims = dims.into_iter().map(|dim| dim.unwrap_or(0)).collect();
        match self.heap.get_mut(target) {
            Some(instance) => instance.body = Body::Grid { dims, items },
            None => return Err(self.missing_object(target)),
        }
        self.register(id, target)?;
        let callbacks = contract.callbacks();
        self.run_callbacks(&callbacks.on_deserializing, target, "on_deserializing callback")?;
        self.run_callbacks(&callbacks.on_deserialized, target, "on_deserialized callback")?;
        Ok(Value::Object(target))
    }

    fn read_dimension(
        &mut self,
        array: &ArrayContract,
        contract: &Contract,
        site: Site<'_>,
        level: usize,
        dims: &mut [Option<usize>],
        items: &mut Vec<Value>,
    ) -> Result<()> {
        let innermost = level + 1 == dims.len();
        let mut count = 0usize;
        loop {
            self.cursor.expect_next()?;
            match self.cursor.token() {
                Some(Token::EndArray) => break,
                Some(Token::StartArray) if !innermost => {
                    self.read_dimension(array, contract, site, level + 1, dims, items)?;
                }
                _ if innermost => {
                    let value = self.read_value(
                        Some(array.element_type()),
                        None,
                        Site::item_of(contract, site.member),
                    )?;
                    items.push(value);
                }
                _ => return Err(self.unexpected("reading a multidimensional array")),
            }
            count += 1;
        }
        match dims[level] {
            None => dims[level] = Some(count),
            Some(expected) if expected != count => {
                return Err(self.structure_error(
                    "Cannot deserialize non-cubical array as multidimensional array.",
                ));
            }
            Some(_) => {}
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Dictionaries

    /// Reads the entries of an open object; the cursor is on the first
    /// entry name or the end of the object.
    pub(super) fn read_dictionary(
        &mut self,
        dictionary: &DictionaryContract,
        contract: &Contract,
        existing: Option<ObjectId>,
        id: Option<&str>,
        site: Site<'_>,
    ) -> Result<Value> {
        let reusable = existing.filter(|&target| {
            dictionary.can_reuse()
                && matches!(self.heap.get(target).map(|i| &i.body), Some(Body::Map(_)))
        });
        let target = match reusable {
            Some(target) => Some(target),
            None if dictionary.needs_temporary() => None,
            None => Some(self.create_default(contract)?),
        };
        let callbacks = contract.callbacks();
        if let Some(target) = target {
            self.register(id, target)?;
            self.run_callbacks(&callbacks.on_deserializing, target, "on_deserializing callback")?;
        }

        let mut buffer = Entries::<Value>::new();
        let mark = self.depth();
        loop {
            let name = match self.cursor.token() {
                Some(Token::PropertyName(name)) => name.clone(),
                Some(Token::EndObject) => break,
                _ => return Err(self.unexpected("reading a dictionary")),
            };
            let result = self
                .read_entry(dictionary, contract, &name, site)
                .and_then(|(key, value)| match target {
                    Some(target) => self.insert_entry(target, key, value),
                    None => {
                        buffer.insert(key, value);
                        Ok(())
                    }
                });
            if let Err(err) = result {
                self.handle(err, target, contract, Some(&name), mark)?;
            }
            self.cursor.expect_next()?;
        }

        let target = match (target, &dictionary.creator) {
            (Some(target), _) => target,
            (None, Some(creator)) => {
                let target = creator(&mut *self.heap, contract.created_type(), buffer.into_vec())
                    .map_err(|source| self.callback_error("creating dictionary", source))?;
                self.register(id, target)?;
                self.run_callbacks(&callbacks.on_deserializing, target, "on_deserializing callback")?;
                target
            }
            (None, None) => return Err(self.structure_error("Dictionary has no creator.")),
        };
        self.run_callbacks(&callbacks.on_deserialized, target, "on_deserialized callback")?;
        Ok(Value::Object(target))
    }

    fn read_entry(
        &mut self,
        dictionary: &DictionaryContract,
        contract: &Contract,
        name: &str,
        site: Site<'_>,
    ) -> Result<(Value, Value)> {
        let key = self.dictionary_key(name, dictionary.key_type())?;
        self.cursor.expect_next()?;
        let value = self.read_value(
            Some(dictionary.value_type()),
            None,
            Site::item_of(contract, site.member),
        )?;
        Ok((key, value))
    }

    fn insert_entry(&mut self, target: ObjectId, key: Value, value: Value) -> Result<()> {
        let inserted = self
            .heap
            .get_mut(target)
            .is_some_and(|instance| instance.insert_entry(key, value));
        if inserted {
            Ok(())
        } else {
            Err(self.structure_error("Instance does not hold a dictionary."))
        }
    }

    /// Converts a property name to a key of `key_type`.
    fn dictionary_key(&mut self, name: &str, key_type: TypeKey) -> Result<Value> {
        let contract = self.resolver.resolve_contract(key_type)?;
        let converted = match &*contract {
            Contract::Primitive(primitive) => {
                coerce_literal(
                    Literal::String(name.into()),
                    primitive.primitive(),
                    primitive.enumeration(),
                    false,
                )
                .and_then(|value| match primitive.conversion() {
                    Some(conversion) => (conversion.from_primitive)(&mut *self.heap, value)
                        .map_err(|err| err.to_string()),
                    None => Ok(value),
                })
            }
            Contract::String(string) => {
                (string.conversion().from_string)(&mut *self.heap, name).map_err(|err| err.to_string())
            }
            _ => Ok(Value::String(name.into())),
        };
        converted.map_err(|_| Error::Conversion {
            path: self.path(),
            value: name.into(),
            target: contract.type_path().into(),
            reason: format!(
                "Could not convert string '{name}' to dictionary key type '{}'.",
                contract.type_path()
            ),
        })
    }

    // -------------------------------------------------------------------------
    // Dynamic objects

    /// Reads an object with runtime members; the cursor is on the first
    /// property name or the end of the object.
    pub(super) fn read_dynamic(
        &mut self,
        dynamic: &DynamicContract,
        contract: &Contract,
        existing: Option<ObjectId>,
        id: Option<&str>,
        site: Site<'_>,
    ) -> Result<Value> {
        let target = match existing {
            Some(target) => target,
            None => self.create_default(contract)?,
        };
        self.register(id, target)?;
        let callbacks = contract.callbacks();
        self.run_callbacks(&callbacks.on_deserializing, target, "on_deserializing callback")?;

        let mark = self.depth();
        loop {
            let name = match self.cursor.token() {
                Some(Token::PropertyName(name)) => name.clone(),
                Some(Token::EndObject) => break,
                _ => return Err(self.unexpected("reading a dynamic object")),
            };
            if let Err(err) = self.read_dynamic_member(target, dynamic, contract, &name, site) {
                self.handle(err, Some(target), contract, Some(&name), mark)?;
            }
            self.cursor.expect_next()?;
        }

        self.run_callbacks(&callbacks.on_deserialized, target, "on_deserialized callback")?;
        Ok(Value::Object(target))
    }

    fn read_dynamic_member(
        &mut self,
        target: ObjectId,
        dynamic: &DynamicContract,
        contract: &Contract,
        name: &str,
        site: Site<'_>,
    ) -> Result<()> {
        let declared = dynamic
            .properties()
            .get_closest(name)
            .filter(|property| property.writable && !property.ignored);
        self.cursor.expect_next()?;
        if let Some(property) = declared {
            let member_site = Site {
                member: Some(property),
                container: Some(contract),
                container_property: site.member,
            };
            let value = self.read_value(Some(property.property_type), None, member_site)?;
            return property
                .set_value(&mut *self.heap, target, value)
                .map_err(|source| self.callback_error("setting member value", source));
        }

        let value = self.read_value(None, None, Site::item_of(contract, site.member))?;
        let stored = self
            .heap
            .get_mut(target)
            .is_some_and(|instance| instance.set_dynamic_member(name, value));
        if stored {
            Ok(())
        } else {
            Err(self.structure_error(format!(
                "Could not set member '{name}' on dynamic object."
            )))
        }
    }
}

