//! Token sequence with per-token consumed state.
//!
//! A `TokenSequence` wraps the raw argument vector and remembers which
//! tokens have been claimed by a matcher. The cursor always sits on the
//! first unconsumed token at or after the last consumption point, unless
//! it was explicitly rewound with [`TokenSequence::unconsume`] or
//! [`TokenSequence::reset_index`].

use std::ops::ControlFlow;

use crate::error::{Error, Result};

/// One step of [`TokenSequence::iterate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visit<'a> {
    pub value: &'a str,
    pub index: usize,
    pub consumed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSequence {
    tokens: Vec<String>,
    consumed: Vec<bool>,
    cursor: usize,
}

impl TokenSequence {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let consumed = vec![false; tokens.len()];
        TokenSequence {
            tokens,
            consumed,
            cursor: 0,
        }
    }

    /// Build a sequence with explicit consumed flags; both vectors must
    /// have the same length.
    pub fn with_consumed(tokens: Vec<String>, consumed: Vec<bool>) -> Result<Self> {
        if tokens.len() != consumed.len() {
            return Err(Error::ConsumedLength {
                tokens: tokens.len(),
                flags: consumed.len(),
            });
        }
        Ok(TokenSequence {
            tokens,
            consumed,
            cursor: 0,
        })
    }

    /// Build a sequence from a shell-like command line string.
    pub fn from_command_line(line: &str) -> Result<Self> {
        Ok(Self::new(split_command_line(line)?))
    }

    /// Every token, consumed or not.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_consumed(&self, index: usize) -> bool {
        self.consumed.get(index).copied().unwrap_or(false)
    }

    /// Peek at a token without consuming it. `None` reads the token under
    /// the cursor. Consumed tokens are still returned.
    pub fn get(&self, index: Option<usize>) -> Option<&str> {
        let index = index.unwrap_or(self.cursor);
        self.tokens.get(index).map(String::as_str)
    }

    /// Mark a token consumed and return it.
    ///
    /// Out-of-range or already consumed tokens yield `None` and change
    /// nothing. The cursor only moves when no index was given or the index
    /// is the cursor itself.
    pub fn consume(&mut self, index: Option<usize>) -> Option<String> {
        let at = index.unwrap_or(self.cursor);
        if at >= self.tokens.len() || self.consumed[at] {
            return None;
        }

        self.consumed[at] = true;

        if index.is_none() || at == self.cursor {
            self.cursor = self.consumed[self.cursor..]
                .iter()
                .position(|consumed| !consumed)
                .map_or(self.tokens.len(), |offset| self.cursor + offset);
        }

        Some(self.tokens[at].clone())
    }

    /// Clear the consumed flag of a token and return it. The cursor is
    /// rewound to `index` when it sits past it, and never advanced.
    pub fn unconsume(&mut self, index: usize) -> Option<String> {
        if index >= self.tokens.len() {
            return None;
        }

        self.consumed[index] = false;
        if index < self.cursor {
            self.cursor = index;
        }

        Some(self.tokens[index].clone())
    }

    /// Copy a sub-range of tokens and their consumed flags into a new,
    /// independent sequence. Bounds follow array-slice rules: negative
    /// values count from the end and missing bounds cover the full range.
    /// The new cursor starts at zero.
    pub fn slice(&self, start: Option<isize>, end: Option<isize>) -> TokenSequence {
        let len = self.tokens.len();
        let from = resolve_bound(start, 0, len);
        let to = resolve_bound(end, len, len);
        let (from, to) = if from < to { (from, to) } else { (from, from) };

        TokenSequence {
            tokens: self.tokens[from..to].to_vec(),
            consumed: self.consumed[from..to].to_vec(),
            cursor: 0,
        }
    }

    pub fn reset_consumed(&mut self) -> &mut Self {
        self.consumed.iter_mut().for_each(|flag| *flag = false);
        self
    }

    pub fn reset_index(&mut self) -> &mut Self {
        self.cursor = 0;
        self
    }

    pub fn reset(&mut self) -> &mut Self {
        self.reset_consumed().reset_index()
    }

    /// Visit tokens in ascending order, skipping consumed ones unless
    /// `include_consumed` is set. Returning `ControlFlow::Break` stops the
    /// walk immediately.
    pub fn iterate<F>(&self, include_consumed: bool, mut visit: F)
    where
        F: FnMut(Visit<'_>) -> ControlFlow<()>,
    {
        for (index, value) in self.tokens.iter().enumerate() {
            let consumed = self.consumed[index];
            if consumed && !include_consumed {
                continue;
            }

            let step = Visit {
                value,
                index,
                consumed,
            };
            if visit(step).is_break() {
                break;
            }
        }
    }

    pub fn consumed_indexes(&self) -> Vec<usize> {
        self.indexes_where(true)
    }

    pub fn consumed(&self) -> Vec<String> {
        self.values_at(self.indexes_where(true))
    }

    pub fn unconsumed_indexes(&self) -> Vec<usize> {
        self.indexes_where(false)
    }

    pub fn unconsumed(&self) -> Vec<String> {
        self.values_at(self.indexes_where(false))
    }

    fn indexes_where(&self, state: bool) -> Vec<usize> {
        self.consumed
            .iter()
            .enumerate()
            .filter(|(_, consumed)| **consumed == state)
            .map(|(index, _)| index)
            .collect()
    }

    fn values_at(&self, indexes: Vec<usize>) -> Vec<String> {
        indexes
            .into_iter()
            .map(|index| self.tokens[index].clone())
            .collect()
    }
}

fn resolve_bound(bound: Option<isize>, default: usize, len: usize) -> usize {
    match bound {
        None => default,
        Some(b) if b < 0 => len.saturating_sub(b.unsigned_abs()),
        Some(b) => (b as usize).min(len),
    }
}

/// Split a command line string into tokens.
///
/// Handles single and double quoting and backslash escapes. Inside quotes a
/// backslash only escapes the active quote character.
pub fn split_command_line(line: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut pending = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            } else if c == '\\' {
                match chars.next() {
                    None => return Err(Error::BadQuote("unterminated backslash".to_string())),
                    Some(next) => {
                        if next != q {
                            current.push('\\');
                        }
                        current.push(next);
                    }
                }
            } else {
                current.push(c);
            }
        } else if c.is_whitespace() {
            if pending {
                tokens.push(std::mem::take(&mut current));
                pending = false;
            }
        } else {
            pending = true;
            match c {
                '"' | '\'' => quote = Some(c),
                '\\' => match chars.next() {
                    None => return Err(Error::BadQuote("unterminated backslash".to_string())),
                    Some(next) => current.push(next),
                },
                _ => current.push(c),
            }
        }
    }

    if let Some(q) = quote {
        return Err(Error::BadQuote(format!("unterminated {} quote", q)));
    }
    if pending {
        tokens.push(current);
    }

    Ok(tokens)
}
