use std::any::Any;
use std::rc::Rc;

use crate::error::{LensError, Result};
use crate::rollback::Rollbackable;

/// A position-tracked, rollbackable cursor over an immutable source string.
///
/// Clones are cheap: the source is shared by reference (`Rc<str>`), and the
/// only per-clone state is the byte position. Two readers are *aligned* iff
/// they share both the source and the position (§3 invariant).
#[derive(Clone, Debug)]
pub struct ConcreteInputReader {
    source: Rc<str>,
    pos: usize,
}

impl ConcreteInputReader {
    pub fn new(source: impl Into<Rc<str>>) -> Self {
        ConcreteInputReader {
            source: source.into(),
            pos: 0,
        }
    }

    pub fn source(&self) -> &Rc<str> {
        &self.source
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        debug_assert!(pos <= self.source.len());
        self.pos = pos;
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.source.len()
    }

    pub fn remaining(&self) -> &str {
        &self.source[self.pos..]
    }

    /// Consumes a single character, advancing by its UTF-8 length.
    pub fn consume_char(&mut self) -> Result<char> {
        let c = self.remaining().chars().next().ok_or(LensError::EndOfInput)?;
        self.pos += c.len_utf8();
        Ok(c)
    }

    /// Consumes exactly `n` characters (not bytes) and returns them as a string.
    pub fn consume_exact(&mut self, n: usize) -> Result<String> {
        let rest = self.remaining();
        let mut seen = 0usize;
        let mut end = 0usize;
        for (i, c) in rest.char_indices() {
            if seen == n {
                end = i;
                break;
            }
            seen += 1;
            end = i + c.len_utf8();
        }
        if seen < n {
            return Err(LensError::EndOfInput);
        }
        let s = rest[..end].to_string();
        self.pos += end;
        Ok(s)
    }

    /// The slice consumed since `start` (a position previously returned by
    /// [`ConcreteInputReader::pos`]).
    pub fn consumed_since(&self, start: usize) -> &str {
        &self.source[start..self.pos]
    }

    pub fn aligned_with(&self, other: &ConcreteInputReader) -> bool {
        self.same_source(other) && self.pos == other.pos
    }

    /// Readers.py's `is_aligned_with` compares `self.string == other.string`
    /// — Python string equality, i.e. by content, not identity. A `put`
    /// call normalises its `original` argument into a brand-new reader
    /// sharing none of a GOT item's original allocation, so matching by
    /// pointer would make every item "misaligned" even when nothing about
    /// it changed; content equality is what lets an unmodified item reuse
    /// the outer reader directly instead of a separate discard-and-switch.
    pub fn same_source(&self, other: &ConcreteInputReader) -> bool {
        Rc::ptr_eq(&self.source, &other.source) || self.source == other.source
    }
}

impl Rollbackable for ConcreteInputReader {
    fn snapshot(&self) -> Box<dyn Any> {
        Box::new(self.pos)
    }

    fn restore(&mut self, state: Box<dyn Any>) {
        if let Ok(pos) = state.downcast::<usize>() {
            self.pos = *pos;
        }
    }

    fn state_eq(&self, a: &dyn Any, b: &dyn Any) -> bool {
        match (a.downcast_ref::<usize>(), b.downcast_ref::<usize>()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}
