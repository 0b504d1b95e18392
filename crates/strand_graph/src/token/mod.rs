//! The abstract token stream the graph walkers read from and write to.
//!
//! The engine never sees text: a [`TokenWriter`] receives tokens and a
//! [`TokenReader`] produces them. Two in-memory implementations ship here,
//! [`TokenBuffer`] and the document tree ([`Node`], [`TreeWriter`],
//! [`TreeReader`]); [`json`] bridges the tree to JSON text via `serde_json`.

// -----------------------------------------------------------------------------
// Modules

mod buffer;
mod node;
mod serde_impls;
mod tree;

pub mod json;

// -----------------------------------------------------------------------------
// Exports

pub use buffer::TokenBuffer;
pub use node::Node;
pub use tree::{TreeReader, TreeWriter, read_node};

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use chrono::{DateTime, FixedOffset};
use thiserror::Error;

// -----------------------------------------------------------------------------
// Literal

/// A scalar carried by a [`Token::Value`].
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Undefined,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Date(DateTime<FixedOffset>),
    Bytes(Vec<u8>),
}

impl Literal {
    /// `true` for [`Literal::Null`] and [`Literal::Undefined`].
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Literal::Null | Literal::Undefined)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Undefined => f.write_str("undefined"),
            Literal::Boolean(v) => write!(f, "{v}"),
            Literal::Integer(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::String(v) => write!(f, "\"{v}\""),
            Literal::Date(v) => write!(f, "{}", v.to_rfc3339()),
            Literal::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

// -----------------------------------------------------------------------------
// Token

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    PropertyName(String),
    Value(Literal),
    Comment(String),
    /// Pre-encoded content passed through verbatim; writers may reject it.
    Raw(String),
}

impl Token {
    /// Short name used in diagnostics.
    pub const fn describe(&self) -> &'static str {
        match self {
            Token::StartObject => "StartObject",
            Token::EndObject => "EndObject",
            Token::StartArray => "StartArray",
            Token::EndArray => "EndArray",
            Token::PropertyName(_) => "PropertyName",
            Token::Value(Literal::Null) => "Null",
            Token::Value(Literal::Undefined) => "Undefined",
            Token::Value(Literal::String(_)) => "String",
            Token::Value(Literal::Integer(_)) => "Integer",
            Token::Value(Literal::Float(_)) => "Float",
            Token::Value(Literal::Boolean(_)) => "Boolean",
            Token::Value(Literal::Date(_)) => "Date",
            Token::Value(Literal::Bytes(_)) => "Bytes",
            Token::Comment(_) => "Comment",
            Token::Raw(_) => "Raw",
        }
    }
}

impl From<Literal> for Token {
    #[inline]
    fn from(value: Literal) -> Self {
        Token::Value(value)
    }
}

// -----------------------------------------------------------------------------
// TokenError

/// Failure reported by a token source or sink.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum TokenError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unexpected token {found} ({context})")]
    Unexpected {
        found: &'static str,
        context: &'static str,
    },
    #[error("malformed input: {0}")]
    Malformed(String),
    #[error("{0}")]
    Custom(String),
}

// -----------------------------------------------------------------------------
// TokenReader / TokenWriter

/// A pull source of tokens.
pub trait TokenReader {
    /// Returns the next token, or `None` at the end of input.
    fn read_token(&mut self) -> Result<Option<Token>, TokenError>;
}

/// A sink of tokens.
///
/// Only [`write_token`](Self::write_token) is required; the other methods
/// are shorthands.
pub trait TokenWriter {
    fn write_token(&mut self, token: Token) -> Result<(), TokenError>;

    #[inline]
    fn write_start_object(&mut self) -> Result<(), TokenError> {
        self.write_token(Token::StartObject)
    }

    #[inline]
    fn write_end_object(&mut self) -> Result<(), TokenError> {
        self.write_token(Token::EndObject)
    }

    #[inline]
    fn write_start_array(&mut self) -> Result<(), TokenError> {
        self.write_token(Token::StartArray)
    }

    #[inline]
    fn write_end_array(&mut self) -> Result<(), TokenError> {
        self.write_token(Token::EndArray)
    }

    #[inline]
    fn write_property_name(&mut self, name: &str) -> Result<(), TokenError> {
        self.write_token(Token::PropertyName(name.into()))
    }

    #[inline]
    fn write_literal(&mut self, literal: Literal) -> Result<(), TokenError> {
        self.write_token(Token::Value(literal))
    }

    #[inline]
    fn write_null(&mut self) -> Result<(), TokenError> {
        self.write_token(Token::Value(Literal::Null))
    }
}

impl<R: TokenReader + ?Sized> TokenReader for &mut R {
    #[inline]
    fn read_token(&mut self) -> Result<Option<Token>, TokenError> {
        (**self).read_token()
    }
}

impl<W: TokenWriter + ?Sized> TokenWriter for &mut W {
    #[inline]
    fn write_token(&mut self, token: Token) -> Result<(), TokenError> {
        (**self).write_token(token)
    }
}
