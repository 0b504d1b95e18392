use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::token::{Token, TokenError, TokenReader, TokenWriter};

/// An in-memory token queue: written tokens are read back in order.
///
/// ```
/// use strand_graph::token::{Literal, Token, TokenBuffer, TokenReader, TokenWriter};
///
/// let mut buffer = TokenBuffer::new();
/// buffer.write_start_array().unwrap();
/// buffer.write_literal(Literal::Integer(1)).unwrap();
/// buffer.write_end_array().unwrap();
///
/// assert_eq!(buffer.read_token().unwrap(), Some(Token::StartArray));
/// assert_eq!(buffer.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenBuffer {
    tokens: VecDeque<Token>,
}

impl TokenBuffer {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[inline]
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }

    #[inline]
    pub fn into_vec(self) -> Vec<Token> {
        self.tokens.into()
    }
}

impl From<Vec<Token>> for TokenBuffer {
    fn from(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into(),
        }
    }
}

impl FromIterator<Token> for TokenBuffer {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        Self {
            tokens: iter.into_iter().collect(),
        }
    }
}

impl TokenReader for TokenBuffer {
    #[inline]
    fn read_token(&mut self) -> Result<Option<Token>, TokenError> {
        Ok(self.tokens.pop_front())
    }
}

impl TokenWriter for TokenBuffer {
    #[inline]
    fn write_token(&mut self, token: Token) -> Result<(), TokenError> {
        self.tokens.push_back(token);
        Ok(())
    }
}
