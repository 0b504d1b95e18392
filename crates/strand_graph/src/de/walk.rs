use alloc::format;
use alloc::string::{String, ToString};
use alloc::sync::Arc;

use super::context::ReadContext;
use super::metadata::Scan;
use crate::coerce::{coerce_literal, natural_value};
use crate::contract::{Contract, PrimitiveContract, StringContract};
use crate::convert::Converter;
use crate::error::{Error, Result};
use crate::info::TypeKey;
use crate::settings::MetadataPropertyHandling;
use crate::site::Site;
use crate::token::{Literal, Token};
use crate::value::{ObjectId, Value};

impl<'a> ReadContext<'a> {
    // -------------------------------------------------------------------------
    // Dispatch

    /// Reads the value starting at the current token as `declared`.
    ///
    /// `existing` is the current value of the member being read, filled in
    /// place when the input and the creation policy allow it.
    pub(super) fn read_value(
        &mut self,
        declared: Option<TypeKey>,
        existing: Option<ObjectId>,
        site: Site<'_>,
    ) -> Result<Value> {
        let contract = self
            .resolver
            .resolve_contract(declared.unwrap_or(TypeKey::ANY))?;
        self.read_contract(&contract, existing, site)
    }

    pub(super) fn read_contract(
        &mut self,
        contract: &Arc<Contract>,
        existing: Option<ObjectId>,
        site: Site<'_>,
    ) -> Result<Value> {
        if let Some(converter) = self.find_converter(contract, site) {
            let existing = existing.map(Value::Object);
            return converter.read(self, contract.underlying_type(), existing.as_ref());
        }
        match self.cursor.token() {
            Some(Token::StartObject) => self.read_object_value(contract, existing, site),
            Some(Token::StartArray) => self.read_array_value(contract, existing, None, site),
            Some(Token::Value(literal)) => {
                let literal = literal.clone();
                self.read_literal(literal, contract)
            }
            _ => Err(self.unexpected(&format!("reading '{}'", contract.type_path()))),
        }
    }

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
        converter.can_read().then_some(converter)
    }

    // -------------------------------------------------------------------------
    // Literals

    fn read_literal(&mut self, literal: Literal, contract: &Contract) -> Result<Value> {
        match contract {
            Contract::Primitive(primitive) => self.read_primitive(literal, primitive),
            Contract::String(string) => self.read_string(literal, string),
            Contract::Document(_) => Ok(Value::Node(self.cursor.read_node()?)),
            Contract::Object(_) if contract.underlying_type() == TypeKey::ANY => {
                Ok(natural_value(literal))
            }
            _ if literal.is_null() => Ok(Value::Null),
            _ => Err(self.conversion_error(
                &literal,
                contract,
                String::from("Expected an object or an array."),
            )),
        }
    }

    fn conversion_error(&self, literal: &Literal, contract: &Contract, reason: String) -> Error {
        Error::Conversion {
            path: self.path(),
            value: literal.to_string(),
            target: contract.type_path().into(),
            reason,
        }
    }

    fn read_primitive(&mut self, literal: Literal, contract: &PrimitiveContract) -> Result<Value> {
        let conversion = contract.conversion();
        let nullable = contract.base().is_nullable()
            || contract.primitive().is_reference_like()
            || conversion.is_some();
        let text = literal.to_string();
        let value = coerce_literal(literal, contract.primitive(), contract.enumeration(), nullable)
            .map_err(|reason| Error::Conversion {
                path: self.path(),
                value: text,
                target: contract.base().type_path().into(),
                reason,
            })?;
        match conversion {
            Some(conversion) if !value.is_null() => (conversion.from_primitive)(&mut *self.heap, value)
                .map_err(|source| self.callback_error("converting from primitive", source)),
            _ => Ok(value),
        }
    }

    fn read_string(&mut self, literal: Literal, contract: &StringContract) -> Result<Value> {
        match literal {
            Literal::String(text) => (contract.conversion().from_string)(&mut *self.heap, &text)
                .map_err(|source| self.callback_error("converting from string", source)),
            literal if literal.is_null() => Ok(Value::Null),
            literal => Err(Error::Conversion {
                path: self.path(),
                value: literal.to_string(),
                target: contract.base().type_path().into(),
                reason: String::from("Expected a string."),
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Composites

    fn read_object_value(
        &mut self,
        contract: &Arc<Contract>,
        existing: Option<ObjectId>,
        site: Site<'_>,
    ) -> Result<Value> {
        if let Contract::Document(_) = &**contract {
            return Ok(Value::Node(self.cursor.read_node()?));
        }
        if self.settings.metadata_property_handling == MetadataPropertyHandling::ReadAhead {
            self.read_ahead()?;
        }
        let metadata = match self.read_metadata(contract, site)? {
            Scan::Reference(target) => return Ok(Value::Object(target)),
            Scan::Object(metadata) => metadata,
        };

        let resolved;
        let contract = match metadata.ty {
            Some(ty) if ty != contract.underlying_type() => {
                resolved = self.resolver.resolve_contract(ty)?;
                &resolved
            }
            _ => contract,
        };
        let existing = existing.filter(|&id| self.accepts_existing(id, contract));

        if metadata.values {
            let value = self.read_array_value(contract, existing, metadata.id, site)?;
            self.cursor.expect_next()?;
            if !matches!(self.cursor.token(), Some(Token::EndObject)) {
                return Err(self.unexpected("reading wrapped $values"));
            }
            return Ok(value);
        }

        let id = metadata.id.as_deref();
        match &**contract {
            Contract::Object(_) if contract.underlying_type() == TypeKey::ANY => {
                self.read_remaining_node()
            }
            Contract::Object(object) => self.read_object(object, contract, existing, id, site),
            Contract::Dictionary(dictionary) => {
                self.read_dictionary(dictionary, contract, existing, id, site)
            }
            Contract::Dynamic(dynamic) => self.read_dynamic(dynamic, contract, existing, id, site),
            Contract::Document(_) => self.read_remaining_node(),
            Contract::Array(_) | Contract::Primitive(_) | Contract::String(_) => {
                Err(self.structure_error(format!(
                    "Cannot deserialize the current object into type '{}' because the type requires an array or a single value.",
                    contract.type_path()
                )))
            }
        }
    }

    /// Reads the array at the cursor. `id` is a `$id` read from a wrapping
    /// metadata object.
    fn read_array_value(
        &mut self,
        contract: &Arc<Contract>,
        existing: Option<ObjectId>,
        id: Option<String>,
        site: Site<'_>,
    ) -> Result<Value> {
        if !matches!(self.cursor.token(), Some(Token::StartArray)) {
            return Err(self.unexpected("reading an array"));
        }
        match &**contract {
            Contract::Array(array) if array.is_multidimensional() => {
                self.read_grid(array, contract, id.as_deref(), site)
            }
            Contract::Array(array) => self.read_list(array, contract, existing, id.as_deref(), site),
            Contract::Document(_) => Ok(Value::Node(self.cursor.read_node()?)),
            Contract::Object(_) if contract.underlying_type() == TypeKey::ANY => {
                Ok(Value::Node(self.cursor.read_node()?))
            }
            _ => Err(self.structure_error(format!(
                "Cannot deserialize the current array into type '{}' because the type requires an object or a single value.",
                contract.type_path()
            ))),
        }
    }
}
