//! Recursive-descent parser for the command notation.
//!
//! The parser never builds a full tree. Each statement is handed to a
//! [`Visitor`] bottom-up as soon as it is complete, and the visitor returns
//! its own representation of it. The visitor is also told about every
//! command word *before* the body is parsed, and the scope it returns for
//! it is kept on a parser-owned stack so that nested command words can be
//! resolved relative to their container.

use crate::error::Problem;
use crate::lexer::{Token, TokenKind, TokenValue};
use std::fmt;

mod arguments;
mod block;

/// Consecutive failed consumes tolerated before parsing is abandoned.
pub const MAX_STALLED_CONSUMES: usize = 100;

const VALUE_KINDS: [Expect; 7] = [
    Expect::Kind(TokenKind::Identifier),
    Expect::Kind(TokenKind::Integer),
    Expect::Kind(TokenKind::Float),
    Expect::Kind(TokenKind::String),
    Expect::Kind(TokenKind::Boolean),
    Expect::Kind(TokenKind::Reference),
    Expect::Kind(TokenKind::Generic),
];

// ──────────────────────────────────────────────
// Parse tree handed to the visitor
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    /// Comment lines directly above a command.
    Above,
    /// Comment at the end of a command or block header line.
    Eol,
    /// Comment lines followed by no command.
    Unassociated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,
    pub kind: CommentKind,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Single(Token),
    List(Vec<Token>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub label: Option<Token>,
    pub value: ArgValue,
}

#[derive(Debug)]
pub enum BlockElement<T> {
    Child(T),
    Labeled {
        role: Token,
        children: Vec<T>,
        /// Children were given as a `[ ... ]` element list.
        list: bool,
    },
}

#[derive(Debug)]
pub struct Statement<T> {
    pub command: Token,
    pub arguments: Vec<Argument>,
    pub elements: Vec<BlockElement<T>>,
    pub comments: Vec<Comment>,
    pub annotation: Option<String>,
    pub is_root: bool,
}

/// Receives statements from the parser.
pub trait Visitor {
    /// Per-command context pushed on descent and returned on ascent.
    type Scope;
    type Output;

    fn descend(&mut self, command: &Token, enclosing: Option<&Self::Scope>) -> Self::Scope;

    fn ascend(&mut self, statement: Statement<Self::Output>, scope: Self::Scope)
        -> Option<Self::Output>;

    fn unassociated_comment(&mut self, _comment: Comment) {}
}

/// Parse `tokens`, driving `visitor`. Returns syntax problems in the order
/// they were found.
pub fn parse<V: Visitor>(tokens: &[Token], visitor: &mut V) -> Vec<Problem> {
    let mut parser = Parser::new(tokens, visitor);
    // Aborted already left its problem behind
    let _ = parser.parse_program();
    parser.problems
}

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

/// Marker for a parse abandoned by the stall guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aborted;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Expect {
    Kind(TokenKind),
    Punct(char),
}

impl Expect {
    fn matches(self, token: &Token) -> bool {
        match self {
            Expect::Kind(k) => token.kind == k,
            Expect::Punct(c) => token.is_punct(c),
        }
    }
}

impl fmt::Display for Expect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expect::Kind(k) => f.write_str(k.as_str()),
            Expect::Punct(c) => write!(f, "{}", c),
        }
    }
}

fn expected_list(expect: &[Expect]) -> String {
    expect
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

struct Parser<'a, V: Visitor> {
    tokens: &'a [Token],
    pos: usize,
    visitor: &'a mut V,
    scopes: Vec<V::Scope>,
    problems: Vec<Problem>,
    /// A problem was already reported for the current stuck position.
    reported: bool,
    stalled: usize,
    last_line: u32,
}

impl<'a, V: Visitor> Parser<'a, V> {
    fn new(tokens: &'a [Token], visitor: &'a mut V) -> Self {
        Parser {
            tokens,
            pos: 0,
            visitor,
            scopes: Vec::new(),
            problems: Vec::new(),
            reported: false,
            stalled: 0,
            last_line: 1,
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next_is(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    fn next_is_punct(&self, c: char) -> bool {
        self.peek().is_some_and(|t| t.is_punct(c))
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let t = self.tokens.get(self.pos)?;
        self.pos += 1;
        self.last_line = t.line;
        Some(t)
    }

    /// Consume the next token if it matches one of `expect`.
    ///
    /// A mismatch reports at most one problem per stuck position. Error
    /// tokens are always consumed so that the parser keeps moving.
    fn consume(&mut self, expect: &[Expect]) -> Result<Option<&'a Token>, Aborted> {
        let Some(token) = self.peek() else {
            let msg = format!("Unexpected end of file, expected {}", expected_list(expect));
            self.report(msg, self.last_line);
            return Ok(None);
        };

        if expect.iter().any(|e| e.matches(token)) {
            self.advance();
            self.stalled = 0;
            self.reported = false;
            tracing::trace!(kind = %token.kind, line = token.line, "consumed");
            return Ok(Some(token));
        }

        if token.kind == TokenKind::Error {
            self.advance();
            self.stalled = 0;
            self.reported = false;
            self.report(format!("Parse error on token '{}'", token.text()), token.line);
            return Ok(None);
        }

        let value = match &token.value {
            TokenValue::None => String::new(),
            _ => format!(" '{}'", token.text()),
        };
        let msg = format!(
            "Unexpected {}{}, expected {}",
            token.kind,
            value,
            expected_list(expect)
        );
        self.report(msg, token.line);
        self.stalled += 1;
        if self.stalled > MAX_STALLED_CONSUMES {
            self.problems.push(Problem::new("Internal error", token.line));
            return Err(Aborted);
        }
        Ok(None)
    }

    fn report(&mut self, message: String, line: u32) {
        if !self.reported {
            self.reported = true;
            self.problems.push(Problem::new(message, line));
        }
    }

    /// Skip tokens up to and including the next newline.
    fn discard_until_newline(&mut self) {
        let mut skipped = 0;
        while let Some(t) = self.advance() {
            if t.kind == TokenKind::Newline {
                break;
            }
            skipped += 1;
        }
        tracing::trace!(skipped, line = self.last_line, "discarded");
    }

    /// Resynchronize after a missing newline, leaving a closing bracket
    /// for the enclosing block or list.
    fn resync(&mut self) {
        if !(self.next_is_punct('}') || self.next_is_punct(']')) {
            self.discard_until_newline();
        }
    }

    /// Expect the end of a line, resynchronizing when it is missing.
    fn end_of_line(&mut self) -> Result<(), Aborted> {
        if self.consume(&[Expect::Kind(TokenKind::Newline)])?.is_none() {
            self.resync();
        }
        Ok(())
    }

    fn parse_program(&mut self) -> Result<(), Aborted> {
        while self.peek().is_some() {
            self.parse_statement(true, true)?;
        }
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
