//! Location of the current token, shared by both graph walkers.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{self, Write};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Frame {
    /// The current property name, once one was seen.
    Object(Option<String>),
    /// Index of the current element, once one was started.
    Array(Option<usize>),
}

/// Stack of open containers, rendered as `a.b[0]['odd name']`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PathStack {
    frames: Vec<Frame>,
}

impl PathStack {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open containers.
    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// A value starts in the current container.
    pub fn begin_value(&mut self) {
        if let Some(Frame::Array(index)) = self.frames.last_mut() {
            *index = Some(index.map_or(0, |i| i + 1));
        }
    }

    pub fn push_object(&mut self) {
        self.begin_value();
        self.frames.push(Frame::Object(None));
    }

    pub fn push_array(&mut self) {
        self.begin_value();
        self.frames.push(Frame::Array(None));
    }

    #[inline]
    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn set_property(&mut self, name: &str) {
        if let Some(Frame::Object(current)) = self.frames.last_mut() {
            match current {
                Some(s) => {
                    s.clear();
                    s.push_str(name);
                }
                None => *current = Some(name.into()),
            }
        }
    }

    /// The innermost open container is an array.
    #[inline]
    pub fn in_array(&self) -> bool {
        matches!(self.frames.last(), Some(Frame::Array(_)))
    }

    #[inline]
    pub fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = write!(out, "{self}");
        out
    }
}

fn needs_quotes(name: &str) -> bool {
    name.is_empty()
        || name
            .chars()
            .any(|c| matches!(c, '.' | ' ' | '[' | ']' | '(' | ')' | '\'' | '"' | '\t' | '\n' | '\r'))
}

impl fmt::Display for PathStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for frame in &self.frames {
            match frame {
                Frame::Object(Some(name)) => {
                    if needs_quotes(name) {
                        write!(f, "['{}']", name.replace('\'', "\\'"))?;
                    } else {
                        if !first {
                            f.write_char('.')?;
                        }
                        f.write_str(name)?;
                    }
                }
                Frame::Array(Some(index)) => write!(f, "[{index}]")?,
                Frame::Object(None) | Frame::Array(None) => continue,
            }
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::PathStack;

    #[test]
    fn render() {
        let mut path = PathStack::new();
        assert_eq!(path.render(), "");

        path.push_object();
        path.set_property("children");
        path.push_array();
        path.push_object();
        path.set_property("name");
        assert_eq!(path.render(), "children[0].name");

        path.pop();
        path.push_object();
        path.set_property("odd name");
        assert_eq!(path.render(), "children[1]['odd name']");

        path.truncate(1);
        assert_eq!(path.render(), "children");
        assert_eq!(path.depth(), 1);
    }

    #[test]
    fn root_array() {
        let mut path = PathStack::new();
        path.push_array();
        path.begin_value();
        path.begin_value();
        assert_eq!(path.render(), "[1]");
    }
}
