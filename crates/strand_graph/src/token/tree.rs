use alloc::string::String;
use alloc::vec::{self, Vec};

use crate::token::{Node, Token, TokenError, TokenReader, TokenWriter, json};

// -----------------------------------------------------------------------------
// TreeWriter

enum Frame {
    Object {
        entries: Vec<(String, Node)>,
        pending: Option<String>,
    },
    Array(Vec<Node>),
}

/// Builds a [`Node`] from written tokens.
///
/// Comments are dropped; raw tokens are parsed as JSON text.
///
/// ```
/// use strand_graph::token::{Literal, Node, TokenWriter, TreeWriter};
///
/// let mut writer = TreeWriter::new();
/// writer.write_start_object().unwrap();
/// writer.write_property_name("id").unwrap();
/// writer.write_literal(Literal::Integer(7)).unwrap();
/// writer.write_end_object().unwrap();
///
/// assert_eq!(writer.finish().unwrap(), Node::object([("id", Node::Integer(7))]));
/// ```
#[derive(Default)]
pub struct TreeWriter {
    stack: Vec<Frame>,
    root: Option<Node>,
}

impl TreeWriter {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the completed tree.
    pub fn finish(self) -> Result<Node, TokenError> {
        if !self.stack.is_empty() {
            return Err(TokenError::UnexpectedEnd);
        }
        self.root.ok_or(TokenError::UnexpectedEnd)
    }

    fn push_value(&mut self, node: Node, found: &'static str) -> Result<(), TokenError> {
        match self.stack.last_mut() {
            None if self.root.is_some() => Err(TokenError::Unexpected {
                found,
                context: "a document has a single root value",
            }),
            None => {
                self.root = Some(node);
                Ok(())
            }
            Some(Frame::Array(items)) => {
                items.push(node);
                Ok(())
            }
            Some(Frame::Object { entries, pending }) => match pending.take() {
                Some(name) => {
                    entries.push((name, node));
                    Ok(())
                }
                None => Err(TokenError::Unexpected {
                    found,
                    context: "expected a property name",
                }),
            },
        }
    }
}

impl TokenWriter for TreeWriter {
    fn write_token(&mut self, token: Token) -> Result<(), TokenError> {
        let found = token.describe();
        match token {
            Token::StartObject => {
                self.stack.push(Frame::Object {
                    entries: Vec::new(),
                    pending: None,
                });
                Ok(())
            }
            Token::StartArray => {
                self.stack.push(Frame::Array(Vec::new()));
                Ok(())
            }
            Token::EndObject => match self.stack.pop() {
                Some(Frame::Object {
                    entries,
                    pending: None,
                }) => self.push_value(Node::Object(entries), found),
                _ => Err(TokenError::Unexpected {
                    found,
                    context: "no object is open",
                }),
            },
            Token::EndArray => match self.stack.pop() {
                Some(Frame::Array(items)) => self.push_value(Node::Array(items), found),
                _ => Err(TokenError::Unexpected {
                    found,
                    context: "no array is open",
                }),
            },
            Token::PropertyName(name) => match self.stack.last_mut() {
                Some(Frame::Object { pending, .. }) if pending.is_none() => {
                    *pending = Some(name);
                    Ok(())
                }
                _ => Err(TokenError::Unexpected {
                    found,
                    context: "property names are only valid inside an object",
                }),
            },
            Token::Value(literal) => self.push_value(literal.into(), found),
            Token::Comment(_) => Ok(()),
            Token::Raw(text) => {
                let node = json::from_str(&text)?;
                self.push_value(node, found)
            }
        }
    }
}

// -----------------------------------------------------------------------------
// TreeReader

enum Cursor {
    Object(vec::IntoIter<(String, Node)>),
    Array(vec::IntoIter<Node>),
}

/// Produces the tokens of a [`Node`], lazily.
///
/// ```
/// use strand_graph::token::{Literal, Node, Token, TokenReader, TreeReader};
///
/// let mut reader = TreeReader::new(Node::Array(vec![Node::Integer(1)]));
/// assert_eq!(reader.read_token().unwrap(), Some(Token::StartArray));
/// assert_eq!(reader.read_token().unwrap(), Some(Token::Value(Literal::Integer(1))));
/// assert_eq!(reader.read_token().unwrap(), Some(Token::EndArray));
/// assert_eq!(reader.read_token().unwrap(), None);
/// ```
pub struct TreeReader {
    stack: Vec<Cursor>,
    next: Option<Node>,
}

impl TreeReader {
    #[inline]
    pub fn new(root: Node) -> Self {
        Self {
            stack: Vec::new(),
            next: Some(root),
        }
    }

    fn open(&mut self, node: Node) -> Token {
        match node {
            Node::Object(entries) => {
                self.stack.push(Cursor::Object(entries.into_iter()));
                Token::StartObject
            }
            Node::Array(items) => {
                self.stack.push(Cursor::Array(items.into_iter()));
                Token::StartArray
            }
            // Containers are handled above.
            scalar => Token::Value(scalar.to_literal().unwrap_or(crate::token::Literal::Null)),
        }
    }
}

impl TokenReader for TreeReader {
    fn read_token(&mut self) -> Result<Option<Token>, TokenError> {
        if let Some(node) = self.next.take() {
            return Ok(Some(self.open(node)));
        }
        let token = match self.stack.last_mut() {
            None => return Ok(None),
            Some(Cursor::Object(entries)) => match entries.next() {
                Some((name, value)) => {
                    self.next = Some(value);
                    Token::PropertyName(name)
                }
                None => {
                    self.stack.pop();
                    Token::EndObject
                }
            },
            Some(Cursor::Array(items)) => match items.next() {
                Some(item) => return Ok(Some(self.open(item))),
                None => {
                    self.stack.pop();
                    Token::EndArray
                }
            },
        };
        Ok(Some(token))
    }
}

/// Reads exactly one value from `reader` into a tree.
pub fn read_node(reader: &mut dyn TokenReader) -> Result<Node, TokenError> {
    let mut writer = TreeWriter::new();
    let mut depth = 0usize;
    loop {
        let token = reader.read_token()?.ok_or(TokenError::UnexpectedEnd)?;
        match token {
            Token::StartObject | Token::StartArray => depth += 1,
            Token::EndObject | Token::EndArray => depth = depth.saturating_sub(1),
            Token::Comment(_) => continue,
            _ => {}
        }
        let is_name = matches!(token, Token::PropertyName(_));
        writer.write_token(token)?;
        if depth == 0 && !is_name {
            return writer.finish();
        }
    }
}
