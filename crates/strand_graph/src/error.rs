use alloc::string::String;

use thiserror::Error;

use crate::info::{BoxError, TypeKey};
use crate::token::TokenError;
use crate::value::ObjectId;

// -----------------------------------------------------------------------------
// ContractIssue

/// Why a type's metadata cannot be turned into a contract.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContractIssue {
    #[error("{0:?} is not a defined type")]
    UnknownType(TypeKey),
    #[error("more than one constructor is marked as the serialization constructor")]
    MultipleSerializationConstructors,
    #[error("a member with the name '{0}' already exists")]
    DuplicateProperty(String),
    #[error("interfaces disagree on the serialized name of member '{0}'")]
    AmbiguousInterfaceMember(String),
    #[error("extension data member '{member}' {reason}")]
    InvalidExtensionData { member: String, reason: &'static str },
    #[error("only one member may hold extension data")]
    MultipleExtensionData,
    #[error("{0}")]
    Custom(String),
}

// -----------------------------------------------------------------------------
// Error

/// Which requirement of a property was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredViolation {
    /// The property did not appear in the input.
    Missing,
    /// The property appeared with a null value.
    Null,
}

/// Errors raised while resolving contracts or walking a graph.
///
/// Runtime variants carry the token path where the failure happened.
/// Everything except [`Error::Contract`] and [`Error::Reference`] may be
/// recovered by an error handler, see [`Error::is_recoverable`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid contract for `{type_path}`: {issue}")]
    Contract { type_path: String, issue: ContractIssue },

    #[error("{message} Path '{path}'.")]
    Structure { path: String, message: String },

    #[error("{}", required_message(*violation, member, type_path, path))]
    Required {
        path: String,
        member: String,
        type_path: String,
        violation: RequiredViolation,
    },

    #[error("Self referencing loop detected{} with type '{type_path}'. Path '{path}'.", member_clause(member))]
    ReferenceLoop {
        path: String,
        member: Option<String>,
        type_path: String,
    },

    #[error("Cannot write a null value for property '{member}'. Property requires a value. Path '{path}'.")]
    NullNotAllowed { path: String, member: String },

    #[error("Could not find member '{member}' on object of type '{type_path}'. Path '{path}'.")]
    MissingMember {
        path: String,
        member: String,
        type_path: String,
    },

    #[error("Error converting value {value} to type '{target}': {reason} Path '{path}'.")]
    Conversion {
        path: String,
        value: String,
        target: String,
        reason: String,
    },

    #[error("{message} Path '{path}'.")]
    Reference { path: String, message: String },

    #[error("The reader's MaxDepth of {max} has been exceeded. Path '{path}'.")]
    MaxDepth { path: String, max: usize },

    #[error("{source} Path '{path}'.")]
    Token {
        path: String,
        #[source]
        source: TokenError,
    },

    #[error("{context} failed: {source} Path '{path}'.")]
    Callback {
        path: String,
        context: &'static str,
        #[source]
        source: BoxError,
    },
}

fn required_message(
    violation: RequiredViolation,
    member: &str,
    type_path: &str,
    path: &str,
) -> String {
    match violation {
        RequiredViolation::Missing => alloc::format!(
            "Required property '{member}' not found in input for type '{type_path}'. Path '{path}'."
        ),
        RequiredViolation::Null => alloc::format!(
            "Required property '{member}' expects a non-null value. Path '{path}'."
        ),
    }
}

fn member_clause(member: &Option<String>) -> String {
    match member {
        Some(name) => alloc::format!(" for property '{name}'"),
        None => String::new(),
    }
}

impl Error {
    /// `false` for failures that indicate corrupt metadata or input and
    /// are never offered to error handlers.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Contract { .. } | Error::Reference { .. })
    }

    /// Token path at which the error happened, if it has one.
    pub fn path(&self) -> Option<&str> {
        match self {
            Error::Contract { .. } => None,
            Error::Structure { path, .. }
            | Error::Required { path, .. }
            | Error::ReferenceLoop { path, .. }
            | Error::NullNotAllowed { path, .. }
            | Error::MissingMember { path, .. }
            | Error::Conversion { path, .. }
            | Error::Reference { path, .. }
            | Error::MaxDepth { path, .. }
            | Error::Token { path, .. }
            | Error::Callback { path, .. } => Some(path),
        }
    }

    pub(crate) fn contract(type_path: impl Into<String>, issue: ContractIssue) -> Self {
        Error::Contract {
            type_path: type_path.into(),
            issue,
        }
    }

    pub(crate) fn structure(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Structure {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type of graph operations.
pub type Result<T, E = Error> = core::result::Result<T, E>;

// -----------------------------------------------------------------------------
// ErrorContext

/// An error offered to callbacks and the global handler.
///
/// Setting `handled` marks the error as recovered: the walker skips the
/// failing value and continues with the next sibling.
pub struct ErrorContext<'a> {
    pub error: &'a Error,
    /// The object being processed when the error was raised.
    pub original_object: Option<ObjectId>,
    /// Member name or array index of the failing value, if known.
    pub member: Option<&'a str>,
    pub path: &'a str,
    pub handled: bool,
}
