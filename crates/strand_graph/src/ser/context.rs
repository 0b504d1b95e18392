use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use log::debug;

use crate::contract::Contract;
use crate::error::{Error, ErrorContext, Result};
use crate::heap::Heap;
use crate::info::{BoxError, SerializeCallback, TypeKey};
use crate::path::PathStack;
use crate::reference::ReferenceResolver;
use crate::registry::TypeRegistry;
use crate::resolve::ContractResolve;
use crate::settings::SerializerSettings;
use crate::site::Site;
use crate::token::{Literal, Token, TokenWriter};
use crate::value::{ObjectId, Value};

// -----------------------------------------------------------------------------
// WriteContext

/// State of one write operation.
///
/// Created by [`GraphSerializer`](crate::GraphSerializer) and handed to
/// [`Converter::write`]. Every token goes through
/// [`write_token`](Self::write_token), which keeps the current path and the
/// depth limit in step with the output.
pub struct WriteContext<'a> {
    pub(super) settings: &'a SerializerSettings,
    pub(super) resolver: &'a dyn ContractResolve,
    pub(super) references: &'a mut dyn ReferenceResolver,
    pub(super) heap: &'a Heap,
    out: &'a mut dyn TokenWriter,
    path: PathStack,
    /// A property name was written and its value was not yet.
    pending_property: bool,
    started: bool,
    /// Composites currently being written, outermost first.
    pub(super) stack: Vec<ObjectId>,
    pub(super) root_type: Option<TypeKey>,
    /// Object that raised the error currently travelling up the stack.
    error_origin: Option<Option<ObjectId>>,
}

impl<'a> WriteContext<'a> {
    pub(crate) fn new(
        settings: &'a SerializerSettings,
        resolver: &'a dyn ContractResolve,
        references: &'a mut dyn ReferenceResolver,
        heap: &'a Heap,
        out: &'a mut dyn TokenWriter,
    ) -> Self {
        Self {
            settings,
            resolver,
            references,
            heap,
            out,
            path: PathStack::new(),
            pending_property: false,
            started: false,
            stack: Vec::new(),
            root_type: None,
            error_origin: None,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors

    #[inline]
    pub fn heap(&self) -> &'a Heap {
        self.heap
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

    /// Path of the value being written, e.g. `orders[2].lines[0]`.
    #[inline]
    pub fn path(&self) -> String {
        self.path.render()
    }

    #[inline]
    pub(super) fn path_mut(&mut self) -> &mut PathStack {
        &mut self.path
    }

    /// Number of open objects and arrays.
    #[inline]
    pub fn depth(&self) -> usize {
        self.path.depth()
    }

    // -------------------------------------------------------------------------
    // Output

    /// Writes one token.
    ///
    /// # Errors
    ///
    /// [`Error::MaxDepth`] when a container would exceed the configured
    /// depth, [`Error::Token`] when the sink rejects the token.
    pub fn write_token(&mut self, token: Token) -> Result<()> {
        match &token {
            Token::StartObject | Token::StartArray => {
                if let Some(max) = self.settings.max_depth
                    && self.path.depth() >= max
                {
                    return Err(Error::MaxDepth {
                        path: self.path(),
                        max,
                    });
                }
                if matches!(token, Token::StartObject) {
                    self.path.push_object();
                } else {
                    self.path.push_array();
                }
                self.pending_property = false;
            }
            Token::EndObject | Token::EndArray => self.path.pop(),
            Token::PropertyName(name) => {
                self.path.set_property(name);
                self.pending_property = true;
            }
            Token::Value(_) | Token::Raw(_) => {
                self.path.begin_value();
                self.pending_property = false;
            }
            Token::Comment(_) => {}
        }
        self.started = true;
        self.out.write_token(token).map_err(|source| Error::Token {
            path: self.path.render(),
            source,
        })
    }

    #[inline]
    pub fn write_literal(&mut self, literal: Literal) -> Result<()> {
        self.write_token(Token::Value(literal))
    }

    #[inline]
    pub fn write_null(&mut self) -> Result<()> {
        self.write_token(Token::Value(Literal::Null))
    }

    #[inline]
    pub fn write_property_name(&mut self, name: &str) -> Result<()> {
        self.write_token(Token::PropertyName(name.into()))
    }

    /// Writes `value` through its contract, as the walker would for a
    /// member declared as `declared`.
    pub fn serialize(&mut self, value: &Value, declared: Option<TypeKey>) -> Result<()> {
        match self.runtime_contract(value, declared)? {
            Some(contract) => self.write_value(value, &contract, Site::default()),
            None => self.write_null(),
        }
    }

    /// A structural error at the current path.
    #[inline]
    pub fn structure_error(&self, message: impl Into<String>) -> Error {
        Error::structure(self.path(), message)
    }

    // -------------------------------------------------------------------------
    // Root

    pub(crate) fn write_root(&mut self, value: &Value, declared: Option<TypeKey>) -> Result<()> {
        self.root_type = declared;
        let Err(err) = self.serialize(value, declared) else {
            return Ok(());
        };
        if !self.is_error_handled(&err, None, None, None) {
            return Err(err);
        }
        self.recover(0)?;
        if !self.started {
            self.write_null()?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Errors

    #[inline]
    pub(super) fn callback_error(&self, context: &'static str, source: BoxError) -> Error {
        Error::Callback {
            path: self.path(),
            context,
            source,
        }
    }

    pub(super) fn missing_object(&self, id: ObjectId) -> Error {
        self.structure_error(format!("Object {id:?} is not in the heap."))
    }

    pub(super) fn run_callbacks(
        &self,
        callbacks: &[SerializeCallback],
        id: ObjectId,
        context: &'static str,
    ) -> Result<()> {
        for callback in callbacks {
            callback(self.heap, id).map_err(|source| self.callback_error(context, source))?;
        }
        Ok(())
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
        let path = self.path.render();
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

    /// Handles a failure inside a container whose content starts at depth
    /// `mark`, or propagates it.
    pub(super) fn handle(
        &mut self,
        error: Error,
        current: ObjectId,
        contract: &Contract,
        member: Option<&str>,
        mark: usize,
    ) -> Result<()> {
        if self.is_error_handled(&error, Some(current), Some(contract), member) {
            self.recover(mark)
        } else {
            Err(error)
        }
    }

    /// Leaves the output well formed after a handled failure: a dangling
    /// property gets a null value and containers opened below `mark` are
    /// closed.
    pub(super) fn recover(&mut self, mark: usize) -> Result<()> {
        if self.pending_property {
            self.write_null()?;
        }
        while self.path.depth() > mark {
            let token = if self.path.in_array() {
                Token::EndArray
            } else {
                Token::EndObject
            };
            self.write_token(token)?;
        }
        Ok(())
    }
}
