//! Line tokenizer for the block configuration grammar.
//!
//! Turns raw lines into [`Statement`]s: a keyword plus its unquoted
//! arguments, tagged with the 1-based line number the statement starts on.
//! A quoted token that does not close on its line continues onto the next
//! one, keeping the line break in the value.

use crate::error::{Error, Result};

/// Grammar keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyword {
    /// `config <name...>`
    Config,
    /// `edit <key>`
    Edit,
    /// `set <attr> [value...]`
    Set,
    /// `unset <attr>`
    Unset,
    /// `next`
    Next,
    /// `end`
    End,
    /// Anything else.
    Other(String),
}

impl Keyword {
    fn from_token(token: &str) -> Self {
        match token {
            "config" => Keyword::Config,
            "edit" => Keyword::Edit,
            "set" => Keyword::Set,
            "unset" => Keyword::Unset,
            "next" => Keyword::Next,
            "end" => Keyword::End,
            other => Keyword::Other(other.to_string()),
        }
    }
}

/// One tokenized statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Line the statement starts on.
    pub line: usize,
    /// Leading keyword.
    pub keyword: Keyword,
    /// Remaining tokens, unquoted.
    pub args: Vec<String>,
}

/// Iterator of statements over an iterator of lines.
pub struct Lexer<I> {
    lines: std::iter::Enumerate<I>,
}

impl<I, L> Lexer<I>
where
    I: Iterator<Item = L>,
    L: AsRef<str>,
{
    /// Tokenize `lines`.
    pub fn new(lines: I) -> Self {
        Self {
            lines: lines.enumerate(),
        }
    }
}

impl<I, L> Iterator for Lexer<I>
where
    I: Iterator<Item = L>,
    L: AsRef<str>,
{
    type Item = Result<Statement>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (index, line) = self.lines.next()?;
            let line_no = index + 1;
            let trimmed = line.as_ref().trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut tokens = Tokens::default();
            let mut pending = tokens.feed(trimmed);
            while pending {
                match self.lines.next() {
                    Some((_, continuation)) => {
                        tokens.current.push('\n');
                        pending = tokens.feed(continuation.as_ref());
                    }
                    None => {
                        return Some(Err(Error::syntax(line_no, "unterminated quoted value")));
                    }
                }
            }
            let mut words = tokens.finish().into_iter();
            let keyword = match words.next() {
                Some(first) => Keyword::from_token(&first),
                None => continue,
            };
            return Some(Ok(Statement {
                line: line_no,
                keyword,
                args: words.collect(),
            }));
        }
    }
}

#[derive(Default)]
struct Tokens {
    words: Vec<String>,
    current: String,
    started: bool,
    quote: Option<char>,
    escaped: bool,
}

impl Tokens {
    /// Consume one physical line; returns true while a quote is still open.
    fn feed(&mut self, text: &str) -> bool {
        for c in text.chars() {
            if self.escaped {
                self.current.push(c);
                self.escaped = false;
                continue;
            }
            match (self.quote, c) {
                (_, '\\') => self.escaped = true,
                (Some(q), c) if c == q => self.quote = None,
                (Some(_), c) => self.current.push(c),
                (None, '"') | (None, '\'') => {
                    self.quote = Some(c);
                    self.started = true;
                }
                (None, c) if c.is_whitespace() => self.flush(),
                (None, c) => {
                    self.current.push(c);
                    self.started = true;
                }
            }
        }
        self.escaped = false;
        self.quote.is_some()
    }

    fn flush(&mut self) {
        if self.started {
            self.words.push(std::mem::take(&mut self.current));
            self.started = false;
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.words
    }
}
