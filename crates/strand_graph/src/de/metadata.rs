use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use log::trace;

use super::context::ReadContext;
use crate::contract::Contract;
use crate::error::Result;
use crate::info::TypeKey;
use crate::settings::MetadataPropertyHandling;
use crate::site::Site;
use crate::token::{Literal, Token};
use crate::value::{ObjectId, Value};

pub(super) const REF: &str = "$ref";
pub(super) const ID: &str = "$id";
pub(super) const TYPE: &str = "$type";
pub(super) const VALUES: &str = "$values";

/// Metadata read from the head of an object.
#[derive(Debug, Default)]
pub(super) struct Metadata {
    pub id: Option<String>,
    pub ty: Option<TypeKey>,
    /// The object wraps an array; the cursor is on its first token.
    pub values: bool,
}

/// Outcome of a metadata scan.
pub(super) enum Scan {
    /// The object was a `{"$ref": ...}` pointer to an existing instance.
    Reference(ObjectId),
    Object(Metadata),
}

/// Moves metadata properties to the front of a buffered object, in the
/// order they are interpreted. Other properties keep their order.
pub(super) fn hoist_metadata(tokens: Vec<Token>) -> Vec<Token> {
    fn rank(name: &str) -> u8 {
        match name {
            REF => 0,
            TYPE => 1,
            ID => 2,
            VALUES => 3,
            _ => 4,
        }
    }

    let mut tokens = tokens.into_iter();
    let open = tokens.next();
    let mut close = None;
    let mut groups: Vec<(u8, Vec<Token>)> = Vec::new();
    let mut depth = 0usize;
    for token in tokens {
        match &token {
            Token::PropertyName(name) if depth == 0 => {
                groups.push((rank(name), alloc::vec![token]));
                continue;
            }
            Token::StartObject | Token::StartArray => depth += 1,
            Token::EndObject | Token::EndArray => {
                if depth == 0 {
                    close = Some(token);
                    break;
                }
                depth -= 1;
            }
            _ => {}
        }
        if let Some((_, group)) = groups.last_mut() {
            group.push(token);
        }
    }
    groups.sort_by_key(|(rank, _)| *rank);
    open.into_iter()
        .chain(groups.into_iter().flat_map(|(_, group)| group))
        .chain(close)
        .collect()
}

impl<'a> ReadContext<'a> {
    /// Reorders the object at the cursor so its metadata comes first.
    pub(super) fn read_ahead(&mut self) -> Result<()> {
        let snapshot = self.cursor.snapshot();
        let tokens = self.cursor.buffer_value()?;
        self.cursor.rewind(snapshot, hoist_metadata(tokens));
        Ok(())
    }

    /// Interprets the leading metadata properties of the object at the
    /// cursor. Returns positioned on the first other property, the end of
    /// the object, or the first token of wrapped `$values`.
    pub(super) fn read_metadata(&mut self, declared: &Contract, site: Site<'_>) -> Result<Scan> {
        let mut metadata = Metadata::default();
        self.cursor.expect_next()?;
        if self.settings.metadata_property_handling == MetadataPropertyHandling::Ignore {
            return Ok(Scan::Object(metadata));
        }
        loop {
            let name = match self.cursor.token() {
                Some(Token::PropertyName(name)) if name.starts_with('$') => name.clone(),
                _ => return Ok(Scan::Object(metadata)),
            };
            match name.as_str() {
                REF => {
                    self.cursor.expect_next()?;
                    match self.cursor.token() {
                        Some(Token::Value(Literal::String(id))) => {
                            let id = id.clone();
                            return self.read_reference(&id, declared).map(Scan::Reference);
                        }
                        Some(Token::Value(literal)) if literal.is_null() => {}
                        _ => {
                            return Err(self.structure_error(
                                "JSON reference $ref property must have a string or null value.",
                            ));
                        }
                    }
                }
                TYPE => {
                    self.cursor.expect_next()?;
                    let Some(Token::Value(Literal::String(type_name))) = self.cursor.token() else {
                        return Err(self.unexpected("reading a $type property"));
                    };
                    let type_name = type_name.clone();
                    metadata.ty = self.bind_type(&type_name, declared, site)?;
                }
                ID => {
                    self.cursor.expect_next()?;
                    metadata.id = match self.cursor.token() {
                        Some(Token::Value(Literal::String(id))) => Some(id.clone()),
                        Some(Token::Value(Literal::Integer(id))) => Some(format!("{id}")),
                        Some(Token::Value(literal)) if literal.is_null() => None,
                        _ => return Err(self.unexpected("reading a $id property")),
                    };
                }
                VALUES => {
                    self.cursor.expect_next()?;
                    metadata.values = true;
                    return Ok(Scan::Object(metadata));
                }
                _ => return Ok(Scan::Object(metadata)),
            }
            self.cursor.expect_next()?;
        }
    }

    /// Resolves a `$ref` pointer to an instance assignable to `declared`;
    /// the cursor is on the id and ends on the end of the reference object.
    fn read_reference(&mut self, id: &str, declared: &Contract) -> Result<ObjectId> {
        self.cursor.expect_next()?;
        if !matches!(self.cursor.token(), Some(Token::EndObject)) {
            return Err(self.structure_error(
                "Additional content found in JSON reference object. A JSON reference object should only have a $ref property.",
            ));
        }
        let target = self.references.resolve_reference(id).ok_or_else(|| {
            self.structure_error(format!("Could not resolve reference '{id}'."))
        })?;
        let registry = self.registry();
        let ty = self.heap.type_of(target).ok_or_else(|| self.missing_object(target))?;
        if !registry.is_assignable(ty, declared.underlying_type())
            && !registry.is_assignable(ty, declared.created_type())
        {
            return Err(self.structure_error(format!(
                "Reference '{id}' resolves to '{}', not compatible with '{}'.",
                registry.path_of(ty).unwrap_or("?"),
                declared.type_path()
            )));
        }
        trace!("resolved reference {id} to {target:?}");
        Ok(target)
    }

    /// The type named by `$type`, or `None` when type names are not read at
    /// this position.
    fn bind_type(&self, name: &str, declared: &Contract, site: Site<'_>) -> Result<Option<TypeKey>> {
        let handling = site
            .type_name_handling()
            .unwrap_or(self.settings.type_name_handling);
        if handling.is_empty() {
            return Ok(None);
        }
        let registry = self.registry();
        let Some(ty) = self.settings.binder.bind_to_type(registry, name) else {
            return Err(self.structure_error(format!(
                "Type specified in JSON '{name}' was not resolved."
            )));
        };
        if !registry.is_assignable(ty, declared.underlying_type()) {
            return Err(self.structure_error(format!(
                "Type specified in JSON '{}' is not compatible with '{}'.",
                registry.path_of(ty).unwrap_or(name),
                declared.type_path()
            )));
        }
        Ok(Some(ty))
    }

    /// Reads the remaining properties of an open object into a tree.
    pub(super) fn read_remaining_node(&mut self) -> Result<Value> {
        let mut entries = Vec::new();
        loop {
            let name = match self.cursor.token() {
                Some(Token::PropertyName(name)) => name.clone(),
                Some(Token::EndObject) => break,
                _ => return Err(self.unexpected("reading an untyped object")),
            };
            self.cursor.expect_next()?;
            entries.push((name, self.cursor.read_node()?));
            self.cursor.expect_next()?;
        }
        Ok(Value::Node(crate::token::Node::Object(entries)))
    }
}

#[cfg(test)]
mod tests {
    use super::hoist_metadata;
    use crate::token::{Literal, Token};

    fn name(s: &str) -> Token {
        Token::PropertyName(s.into())
    }

    fn text(s: &str) -> Token {
        Token::Value(Literal::String(s.into()))
    }

    #[test]
    fn metadata_moves_first() {
        let tokens = vec![
            Token::StartObject,
            name("Name"),
            text("x"),
            name("Tags"),
            Token::StartArray,
            Token::StartObject,
            name("$id"),
            text("9"),
            Token::EndObject,
            Token::EndArray,
            name("$id"),
            text("1"),
            name("$type"),
            text("demo::Item"),
            Token::EndObject,
        ];
        let hoisted = hoist_metadata(tokens);
        assert_eq!(
            hoisted,
            vec![
                Token::StartObject,
                name("$type"),
                text("demo::Item"),
                name("$id"),
                text("1"),
                name("Name"),
                text("x"),
                name("Tags"),
                Token::StartArray,
                Token::StartObject,
                name("$id"),
                text("9"),
                Token::EndObject,
                Token::EndArray,
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn plain_object_unchanged() {
        let tokens = vec![Token::StartObject, name("a"), Token::Value(Literal::Integer(1)), Token::EndObject];
        assert_eq!(hoist_metadata(tokens.clone()), tokens);
        assert_eq!(hoist_metadata(vec![Token::StartObject, Token::EndObject]).len(), 2);
    }
}
