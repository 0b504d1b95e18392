use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::path::PathStack;
use crate::token::{Node, Token, TokenError, TokenReader, TokenWriter, TreeWriter};

/// Position of a [`Cursor`], restorable after tokens were buffered.
#[derive(Clone)]
pub(super) struct Snapshot {
    path: PathStack,
}

enum Shape {
    Name,
    Container,
    Leaf,
}

/// Pull cursor over a token source.
///
/// Comments are skipped. Buffered tokens can be pushed back and are read
/// again before the source. The path and the depth limit follow every
/// token read.
pub(super) struct Cursor<'r> {
    source: &'r mut dyn TokenReader,
    replay: VecDeque<Token>,
    current: Option<Token>,
    path: PathStack,
    max_depth: Option<usize>,
    /// Tokens read so far, replayed ones included.
    consumed: u64,
}

impl<'r> Cursor<'r> {
    pub fn new(source: &'r mut dyn TokenReader, max_depth: Option<usize>) -> Self {
        Self {
            source,
            replay: VecDeque::new(),
            current: None,
            path: PathStack::new(),
            max_depth,
            consumed: 0,
        }
    }

    #[inline]
    pub fn token(&self) -> Option<&Token> {
        self.current.as_ref()
    }

    #[inline]
    pub fn path(&self) -> String {
        self.path.render()
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.path.depth()
    }

    #[inline]
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    #[inline]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            path: self.path.clone(),
        }
    }

    fn token_error(&self, source: TokenError) -> Error {
        Error::Token {
            path: self.path(),
            source,
        }
    }

    fn pull(&mut self) -> Result<Option<Token>> {
        if let Some(token) = self.replay.pop_front() {
            return Ok(Some(token));
        }
        loop {
            match self.source.read_token() {
                Ok(Some(Token::Comment(_))) => continue,
                Ok(token) => return Ok(token),
                Err(source) => return Err(self.token_error(source)),
            }
        }
    }

    /// Moves to the next token. Returns `false` at the end of input.
    pub fn advance(&mut self) -> Result<bool> {
        let Some(token) = self.pull()? else {
            self.current = None;
            return Ok(false);
        };
        self.consumed += 1;
        match &token {
            Token::StartObject | Token::StartArray => {
                if matches!(token, Token::StartObject) {
                    self.path.push_object();
                } else {
                    self.path.push_array();
                }
                if let Some(max) = self.max_depth
                    && self.path.depth() > max
                {
                    return Err(Error::MaxDepth {
                        path: self.path(),
                        max,
                    });
                }
            }
            Token::EndObject | Token::EndArray => self.path.pop(),
            Token::PropertyName(name) => self.path.set_property(name),
            Token::Value(_) => self.path.begin_value(),
            Token::Raw(_) => {
                return Err(Error::structure(
                    self.path(),
                    "Raw tokens cannot be read into a graph.",
                ));
            }
            Token::Comment(_) => {}
        }
        self.current = Some(token);
        Ok(true)
    }

    /// Moves to the next token, failing at the end of input.
    pub fn expect_next(&mut self) -> Result<()> {
        if self.advance()? {
            Ok(())
        } else {
            Err(self.token_error(TokenError::UnexpectedEnd))
        }
    }

    /// Feeds every token of the value starting at the current token to
    /// `visit`, leaving the cursor on the value's last token. A property
    /// name is visited together with its value.
    pub fn walk_value(&mut self, mut visit: impl FnMut(&Token) -> Result<()>) -> Result<()> {
        let shape = {
            let Some(first) = &self.current else {
                return Err(self.token_error(TokenError::UnexpectedEnd));
            };
            visit(first)?;
            match first {
                Token::PropertyName(_) => Shape::Name,
                Token::StartObject | Token::StartArray => Shape::Container,
                _ => Shape::Leaf,
            }
        };
        match shape {
            Shape::Name => {
                self.expect_next()?;
                self.walk_value(visit)
            }
            Shape::Container => {
                let outer = self.depth() - 1;
                loop {
                    self.expect_next()?;
                    let Some(token) = &self.current else {
                        return Err(self.token_error(TokenError::UnexpectedEnd));
                    };
                    visit(token)?;
                    if matches!(token, Token::EndObject | Token::EndArray) && self.depth() == outer {
                        return Ok(());
                    }
                }
            }
            Shape::Leaf => Ok(()),
        }
    }

    #[inline]
    pub fn skip(&mut self) -> Result<()> {
        self.walk_value(|_| Ok(()))
    }

    /// Copies the tokens of the current value.
    pub fn buffer_value(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        self.walk_value(|token| {
            tokens.push(token.clone());
            Ok(())
        })?;
        Ok(tokens)
    }

    /// Reads the current value as a document tree.
    pub fn read_node(&mut self) -> Result<Node> {
        let mut writer = TreeWriter::new();
        let mut failure = None;
        self.walk_value(|token| {
            if let Err(err) = writer.write_token(token.clone()) {
                failure = Some(err);
            }
            Ok(())
        })?;
        if let Some(err) = failure {
            return Err(self.token_error(err));
        }
        writer.finish().map_err(|err| self.token_error(err))
    }

    /// Makes `tokens[0]` current again, positioned as in `snapshot`, with
    /// the remaining tokens read next.
    pub fn rewind(&mut self, snapshot: Snapshot, tokens: Vec<Token>) {
        let mut tokens = tokens.into_iter();
        self.current = tokens.next();
        for token in tokens.rev() {
            self.replay.push_front(token);
        }
        self.path = snapshot.path;
    }

    /// Skips tokens until the cursor is back at `depth`, on the end of the
    /// value that failed.
    pub fn recover_to(&mut self, depth: usize) -> Result<()> {
        if matches!(self.current, Some(Token::PropertyName(_))) && self.depth() == depth {
            self.expect_next()?;
            return self.skip();
        }
        while self.depth() > depth {
            if !self.advance()? {
                return Ok(());
            }
        }
        Ok(())
    }
}
