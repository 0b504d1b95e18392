//! JSON text through `serde_json`.
//!
//! Strings holding dates or base64 bytes come back as plain strings; the
//! reader converts them when the target type asks for a date or bytes.

use alloc::string::{String, ToString};

use crate::token::{Node, TokenError};

pub fn to_string(node: &Node) -> Result<String, TokenError> {
    serde_json::to_string(node).map_err(|e| TokenError::Custom(e.to_string()))
}

pub fn to_string_pretty(node: &Node) -> Result<String, TokenError> {
    serde_json::to_string_pretty(node).map_err(|e| TokenError::Custom(e.to_string()))
}

pub fn from_str(text: &str) -> Result<Node, TokenError> {
    serde_json::from_str(text).map_err(|e| TokenError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{from_str, to_string};
    use crate::token::Node;

    #[test]
    fn malformed() {
        assert!(from_str("{\"a\":").is_err());
    }

    #[test]
    fn large_unsigned_becomes_float() {
        let node = from_str("18446744073709551615").unwrap();
        assert!(matches!(node, Node::Float(_)));
        assert_eq!(to_string(&Node::Integer(-3)).unwrap(), "-3");
    }
}
