//! User supplied conversions that take over reading or writing a value.

use crate::de::ReadContext;
use crate::error::Result;
use crate::info::TypeKey;
use crate::registry::TypeRegistry;
use crate::ser::WriteContext;
use crate::value::Value;

/// Takes over the token representation of the types it accepts.
///
/// A converter is looked up in this order: the property's own converter,
/// the item converter of the enclosing container, the converter attached
/// to the type, then the converters in the serializer settings.
///
/// `write` is handed the value and must emit exactly one complete value
/// (a literal, or a balanced object or array). `read` is called with the
/// reader positioned on the first token of the value and must leave it on
/// the value's last token.
///
/// # Example
///
/// ```
/// use strand_graph::convert::Converter;
/// use strand_graph::de::ReadContext;
/// use strand_graph::error::Result;
/// use strand_graph::info::TypeKey;
/// use strand_graph::registry::TypeRegistry;
/// use strand_graph::ser::WriteContext;
/// use strand_graph::token::{Literal, Token};
/// use strand_graph::value::Value;
///
/// /// Writes booleans as `"yes"` / `"no"`.
/// struct YesNo;
///
/// impl Converter for YesNo {
///     fn can_convert(&self, _registry: &TypeRegistry, ty: TypeKey) -> bool {
///         ty == TypeKey::BOOL
///     }
///
///     fn write(&self, cx: &mut WriteContext<'_>, value: &Value) -> Result<()> {
///         let text = if value.as_bool() == Some(true) { "yes" } else { "no" };
///         cx.write_literal(Literal::String(text.into()))
///     }
///
///     fn read(&self, cx: &mut ReadContext<'_>, _ty: TypeKey, _existing: Option<&Value>) -> Result<Value> {
///         match cx.token() {
///             Some(Token::Value(Literal::String(s))) => Ok(Value::Bool(s == "yes")),
///             _ => Err(cx.structure_error("expected yes or no")),
///         }
///     }
/// }
/// ```
pub trait Converter: Send + Sync {
    /// Whether this converter handles values declared or created as `ty`.
    fn can_convert(&self, registry: &TypeRegistry, ty: TypeKey) -> bool;

    #[inline]
    fn can_read(&self) -> bool {
        true
    }

    #[inline]
    fn can_write(&self) -> bool {
        true
    }

    fn write(&self, cx: &mut WriteContext<'_>, value: &Value) -> Result<()>;

    /// `existing` is the current member value when an object is populated
    /// in place.
    fn read(&self, cx: &mut ReadContext<'_>, ty: TypeKey, existing: Option<&Value>)
    -> Result<Value>;
}
