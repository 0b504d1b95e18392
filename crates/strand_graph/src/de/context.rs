use alloc::format;
use alloc::string::String;

use log::{debug, trace};

use super::cursor::Cursor;
use crate::contract::Contract;
use crate::error::{ContractIssue, Error, ErrorContext, Result};
use crate::heap::Heap;
use crate::info::{BoxError, ConstructorInfo, DeserializeCallback, TypeKey};
use crate::reference::ReferenceResolver;
use crate::registry::TypeRegistry;
use crate::resolve::ContractResolve;
use crate::settings::SerializerSettings;
use crate::site::Site;
use crate::token::{Node, Token, TokenError, TokenReader};
use crate::value::{ObjectId, Value};

// -----------------------------------------------------------------------------
// ReadContext

/// State of one read operation.
///
/// Created by [`GraphSerializer`](crate::GraphSerializer) and handed to
/// [`Converter::read`](crate::convert::Converter::read). The context is
/// always positioned on a token: a converter starts on the first token of
/// its value and must return positioned on the value's last token.
pub struct ReadContext<'a> {
    pub(super) settings: &'a SerializerSettings,
    pub(super) resolver: &'a dyn ContractResolve,
    pub(super) references: &'a mut dyn ReferenceResolver,
    pub(super) heap: &'a mut Heap,
    pub(super) cursor: Cursor<'a>,
    /// Object that raised the error currently travelling up the stack.
    error_origin: Option<Option<ObjectId>>,
}

impl<'a> ReadContext<'a> {
    pub(crate) fn new(
        settings: &'a SerializerSettings,
        resolver: &'a dyn ContractResolve,
        references: &'a mut dyn ReferenceResolver,
        heap: &'a mut Heap,
        source: &'a mut dyn TokenReader,
    ) -> Self {
        Self {
            settings,
            resolver,
            references,
            heap,
            cursor: Cursor::new(source, settings.max_depth),
            error_origin: None,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors

    #[inline]
    pub fn heap(&self) -> &Heap {
        &*self.heap
    }

    #[inline]
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut *self.heap
    }

    #[inline]
    pub fn registry(&self) -> &'a TypeRegistry {
        self.resolver.registry()
    }

    #[inline]
    pub fn settings(&self) -> &'a SerializerSettings {
        self.settings
    }

    #[inline]
    pub fn resolver(&self) -> &'a dyn ContractResolve {
        self.resolver
    }

    /// Path of the current token, e.g. `orders[2].lines[0]`.
    #[inline]
    pub fn path(&self) -> String {
        self.cursor.path()
    }

    /// Number of open objects and arrays.
    #[inline]
    pub fn depth(&self) -> usize {
        self.cursor.depth()
    }

    // -------------------------------------------------------------------------
    // Input

    /// The current token, `None` before the first and after the last one.
    #[inline]
    pub fn token(&self) -> Option<&Token> {
        self.cursor.token()
    }

    /// Moves to the next token. Returns `false` at the end of input.
    ///
    /// # Errors
    ///
    /// [`Error::MaxDepth`] when a container exceeds the configured depth,
    /// [`Error::Token`] when the source fails.
    #[inline]
    pub fn advance(&mut self) -> Result<bool> {
        self.cursor.advance()
    }

    /// Moves to the next token, failing at the end of input.
    #[inline]
    pub fn expect_next(&mut self) -> Result<()> {
        self.cursor.expect_next()
    }

    /// Skips the value starting at the current token.
    #[inline]
    pub fn skip(&mut self) -> Result<()> {
        self.cursor.skip()
    }

    /// Reads the value starting at the current token as a document tree.
    #[inline]
    pub fn read_node(&mut self) -> Result<Node> {
        self.cursor.read_node()
    }

    /// Reads the value starting at the current token through the contract
    /// of `ty`, as the walker would for a member declared as `ty`.
    pub fn deserialize(&mut self, ty: Option<TypeKey>) -> Result<Value> {
        self.read_value(ty, None, Site::default())
    }

    /// A structural error at the current path.
    #[inline]
    pub fn structure_error(&self, message: impl Into<String>) -> Error {
        Error::structure(self.path(), message)
    }

    // -------------------------------------------------------------------------
    // Root

    pub(crate) fn read_root(&mut self, ty: Option<TypeKey>) -> Result<Value> {
        if !self.cursor.advance()? {
            return Ok(Value::Null);
        }
        match self.read_value(ty, None, Site::default()) {
            Ok(value) => Ok(value),
            Err(err) if self.is_error_handled(&err, None, None, None) => {
                self.cursor.recover_to(0)?;
                Ok(Value::Null)
            }
            Err(err) => Err(err),
        }
    }

    pub(crate) fn populate_root(&mut self, target: ObjectId) -> Result<()> {
        if !self.cursor.advance()? {
            return Ok(());
        }
        if !matches!(self.cursor.token(), Some(Token::StartObject | Token::StartArray)) {
            return Err(self.structure_error(
                "Unexpected initial token when populating object. Expected object or array.",
            ));
        }
        let ty = self.heap.type_of(target).ok_or_else(|| self.missing_object(target))?;
        let contract = self.resolver.resolve_contract(ty)?;
        let result = self
            .read_contract(&contract, Some(target), Site::default())
            .and_then(|value| {
                if value.as_object() == Some(target) {
                    Ok(())
                } else {
                    Err(self.structure_error(format!(
                        "Cannot populate '{}' in place.",
                        contract.type_path()
                    )))
                }
            });
        match result {
            Err(err) if self.is_error_handled(&err, Some(target), Some(&contract), None) => {
                self.cursor.recover_to(0)
            }
            other => other,
        }
    }

    // -------------------------------------------------------------------------
    // Instances

    pub(super) fn missing_object(&self, id: ObjectId) -> Error {
        self.structure_error(format!("Object {id:?} is not in the heap."))
    }

    #[inline]
    pub(super) fn callback_error(&self, context: &'static str, source: BoxError) -> Error {
        Error::Callback {
            path: self.path(),
            context,
            source,
        }
    }

    /// Allocates an instance of `ty` and runs `constructor` on it.
    pub(super) fn construct(
        &mut self,
        ty: TypeKey,
        constructor: Option<&ConstructorInfo>,
        args: &[Value],
    ) -> Result<ObjectId> {
        let registry = self.registry();
        let info = registry
            .get(ty)
            .ok_or_else(|| Error::contract(format!("{ty:?}"), ContractIssue::UnknownType(ty)))?;
        let id = self.heap.alloc(info.instantiate());
        if let Some(constructor) = constructor {
            constructor
                .invoke(&mut *self.heap, id, args)
                .map_err(|source| self.callback_error("invoking constructor", source))?;
        }
        Ok(id)
    }

    /// Creates an instance through the contract's parameterless constructor.
    pub(super) fn create_default(&mut self, contract: &Contract) -> Result<ObjectId> {
        let base = contract.base();
        if !base.is_instantiable() {
            return Err(self.structure_error(format!(
                "Could not create an instance of type '{}'. Type is an interface or abstract class and cannot be instantiated.",
                contract.type_path()
            )));
        }
        self.construct(base.created_type(), base.default_creator(), &[])
    }

    /// Whether `existing` can be filled in place as a `contract` value.
    pub(super) fn accepts_existing(&self, existing: ObjectId, contract: &Contract) -> bool {
        self.heap.type_of(existing).is_some_and(|ty| {
            self.registry()
                .is_assignable(ty, contract.underlying_type())
        })
    }

    /// Registers the `$id` read for `target`.
    pub(super) fn register(&mut self, id: Option<&str>, target: ObjectId) -> Result<()> {
        let Some(id) = id else {
            return Ok(());
        };
        trace!("registering reference id {id} for {target:?}");
        self.references
            .add_reference(id, target)
            .map_err(|err| Error::Reference {
                path: self.cursor.path(),
                message: err.0,
            })
    }

    pub(super) fn run_callbacks(
        &mut self,
        callbacks: &[DeserializeCallback],
        id: ObjectId,
        context: &'static str,
    ) -> Result<()> {
        for callback in callbacks {
            callback(&mut *self.heap, id).map_err(|source| self.callback_error(context, source))?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Errors

    #[inline]
    pub(super) fn unexpected(&self, context: &str) -> Error {
        match self.cursor.token() {
            Some(token) => self.structure_error(format!(
                "Unexpected token {} when {context}.",
                token.describe()
            )),
            None => Error::Token {
                path: self.path(),
                source: TokenError::UnexpectedEnd,
            },
        }
    }

    /// Offers `error` to the contract's error callbacks, then to the global
    /// handler. Returns whether one of them marked it handled.
    pub(super) fn is_error_handled(
        &mut self,
        error: &Error,
        current: Option<ObjectId>,
        contract: Option<&Contract>,
        member: Option<&str>,
    ) -> bool {
        if !error.is_recoverable() {
            return false;
        }
        let path = self.cursor.path();
        let original_object = *self.error_origin.get_or_insert(current);
        let mut cx = ErrorContext {
            error,
            original_object,
            member,
            path: &path,
            handled: false,
        };
        if let (Some(contract), Some(current)) = (contract, current) {
            for callback in &contract.callbacks().on_error {
                callback(current, &mut cx);
            }
        }
        if !cx.handled
            && let Some(handler) = &self.settings.error_handler
        {
            handler(&mut cx);
        }
        let handled = cx.handled;
        if handled {
            debug!("recovered from error at '{path}': {error}");
            self.error_origin = None;
        }
        handled
    }

    /// Handles a failure inside a container whose content sits at depth
    /// `mark`, skipping the rest of the failed value, or propagates it.
    pub(super) fn handle(
        &mut self,
        error: Error,
        current: Option<ObjectId>,
        contract: &Contract,
        member: Option<&str>,
        mark: usize,
    ) -> Result<()> {
        if self.is_error_handled(&error, current, Some(contract), member) {
            self.cursor.recover_to(mark)
        } else {
            Err(error)
        }
    }
}
