// SPDX-License-Identifier: Apache-2.0

use crate::{DevConfError, ErrorKind};

const SET_KEYWORD: &str = "set";
const DELETE_KEYWORD: &str = "delete";

// Any of these forces the token to be quoted
const CHARS_REQUIRE_QUOTE: [char; 6] = ['"', '\\', ';', '{', '}', '#'];

/// One flat configuration statement: a path of keywords optionally
/// followed by a value. Tokens are stored unescaped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[non_exhaustive]
pub struct Statement {
    tokens: Vec<String>,
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for token in self.tokens.as_slice() {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}", escape_token(token))?;
            first = false;
        }
        Ok(())
    }
}

impl From<&[&str]> for Statement {
    fn from(tokens: &[&str]) -> Self {
        Self::new(tokens.iter().map(|t| t.to_string()).collect())
    }
}

impl Statement {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    /// Split one statement line into tokens. Tokens are separated by
    /// whitespace, double quoted tokens may contain whitespace and escaped
    /// characters.
    pub fn parse(line: &str) -> Result<Self, DevConfError> {
        let mut tokens = Vec::new();
        let mut cur = String::new();
        let mut has_token = false;
        let mut line_iter = line.char_indices();

        while let Some((pos, c)) = line_iter.next() {
            match c {
                '"' => {
                    has_token = true;
                    let mut closed = false;
                    while let Some((_, c)) = line_iter.next() {
                        match c {
                            '"' => {
                                closed = true;
                                break;
                            }
                            '\\' => match line_iter.next() {
                                Some((_, 'n')) => cur.push('\n'),
                                Some((_, 't')) => cur.push('\t'),
                                Some((_, e)) if e == '"' || e == '\\' => {
                                    cur.push(e)
                                }
                                // Unknown escape sequence is kept as it is
                                Some((_, e)) => {
                                    cur.push('\\');
                                    cur.push(e);
                                }
                                None => break,
                            },
                            _ => cur.push(c),
                        }
                    }
                    if !closed {
                        return Err(DevConfError::new_statement_error(
                            ErrorKind::ConversionError,
                            format!(
                                "No ending double quote for the one at \
                                position {pos}"
                            ),
                            line,
                        ));
                    }
                }
                _ if c.is_whitespace() => {
                    if has_token {
                        tokens.push(std::mem::take(&mut cur));
                        has_token = false;
                    }
                }
                _ => {
                    has_token = true;
                    cur.push(c);
                }
            }
        }
        if has_token {
            tokens.push(cur);
        }
        Ok(Self { tokens })
    }

    pub fn tokens(&self) -> &[String] {
        self.tokens.as_slice()
    }

    pub fn into_tokens(self) -> Vec<String> {
        self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn starts_with(&self, prefix: &[String]) -> bool {
        self.tokens.starts_with(prefix)
    }

    pub fn push(&mut self, token: &str) {
        self.tokens.push(token.to_string());
    }

    /// New statement of `self` followed by `other`.
    pub fn join(&self, other: &Statement) -> Statement {
        let mut tokens = self.tokens.clone();
        tokens.extend_from_slice(other.tokens.as_slice());
        Statement { tokens }
    }
}

/// Render one token, quoting and escaping it when needed.
pub fn escape_token(token: &str) -> String {
    if !token.is_empty()
        && !token
            .chars()
            .any(|c| c.is_whitespace() || CHARS_REQUIRE_QUOTE.contains(&c))
    {
        return token.to_string();
    }
    let mut ret = String::with_capacity(token.len() + 2);
    ret.push('"');
    for c in token.chars() {
        match c {
            '"' => ret.push_str("\\\""),
            '\\' => ret.push_str("\\\\"),
            '\n' => ret.push_str("\\n"),
            '\t' => ret.push_str("\\t"),
            _ => ret.push(c),
        }
    }
    ret.push('"');
    ret
}

/// Reverse of [escape_token()].
pub fn unescape_token(text: &str) -> Result<String, DevConfError> {
    let mut tokens = Statement::parse(text)?.into_tokens();
    if tokens.len() == 1 {
        Ok(tokens.remove(0))
    } else {
        Err(DevConfError::new_statement_error(
            ErrorKind::ConversionError,
            format!("Expecting exactly one token, but got {}", tokens.len()),
            text,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BatchEntry {
    Delete(Statement),
    Set(Statement),
}

impl std::fmt::Display for BatchEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delete(s) => write!(f, "{DELETE_KEYWORD} {s}"),
            Self::Set(s) => write!(f, "{SET_KEYWORD} {s}"),
        }
    }
}

impl BatchEntry {
    pub fn statement(&self) -> &Statement {
        match self {
            Self::Delete(s) | Self::Set(s) => s,
        }
    }
}

/// Ordered statements forming one atomic configuration change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub struct StatementBatch {
    entries: Vec<BatchEntry>,
}

impl std::fmt::Display for StatementBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for entry in self.entries.as_slice() {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}

impl StatementBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_delete(&mut self, statement: Statement) {
        self.entries.push(BatchEntry::Delete(statement));
    }

    pub fn push_set(&mut self, statement: Statement) {
        self.entries.push(BatchEntry::Set(statement));
    }

    pub fn extend(&mut self, other: StatementBatch) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[BatchEntry] {
        self.entries.as_slice()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rendered lines, `set ...` or `delete ...`.
    pub fn to_lines(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.to_string()).collect()
    }
}
