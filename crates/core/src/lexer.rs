//! Line-oriented tokenizer for the command notation.
//!
//! Columns are 1-based character positions; `end_col` is inclusive.
//! Newline tokens carry no columns.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::fmt;

/// Floats whose literal is longer than this are kept as exact decimals.
pub const MAX_FLOAT_LITERAL_LEN: usize = 16;

static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([#@])(.*)$").unwrap());
static FLOAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+]?[0-9]+\.[0-9]+(?:e[+-][0-9]+)?\b").unwrap());
static HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0[xX][0-9a-fA-F]+\b").unwrap());
static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?[0-9]+\b").unwrap());
static STRING: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^"(?:[^"\\]|\\.)*""#).unwrap());
static BOOLEAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:true|false)\b").unwrap());
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([a-zA-Z_]\w*)(:)?").unwrap());
static GENERIC_PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<%(.*?)%>").unwrap());
static GENERIC_ANGLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<([^>]*)>").unwrap());
static EOL_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#(.*)$").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s+").unwrap());
static CONTINUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\\\s*$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Integer,
    Float,
    String,
    Boolean,
    Reference,
    Label,
    Comment,
    Annotation,
    Generic,
    Newline,
    Error,
    Punctuation,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Integer => "integer",
            TokenKind::Float => "float",
            TokenKind::String => "string",
            TokenKind::Boolean => "boolean",
            TokenKind::Reference => "reference",
            TokenKind::Label => "label",
            TokenKind::Comment => "comment",
            TokenKind::Annotation => "annotation",
            TokenKind::Generic => "generic",
            TokenKind::Newline => "newline",
            TokenKind::Error => "error",
            TokenKind::Punctuation => "punctuation",
        }
    }

    /// Kinds that may appear as an argument value.
    pub fn is_value(self) -> bool {
        matches!(
            self,
            TokenKind::Identifier
                | TokenKind::Integer
                | TokenKind::Float
                | TokenKind::String
                | TokenKind::Boolean
                | TokenKind::Reference
                | TokenKind::Generic
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    None,
    /// Identifier, label, reference, comment, annotation, generic and error
    /// text; unescaped content for strings.
    Text(String),
    Integer(i64),
    Float(f64),
    /// Float literal too long to survive a round trip through `f64`.
    Decimal(ExactDecimal),
    Boolean(bool),
    Punct(char),
}

/// Exact value of a float literal longer than [`MAX_FLOAT_LITERAL_LEN`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExactDecimal {
    Decimal(Decimal),
    /// More than 28 significant digits, or an exponent out of range for
    /// [`Decimal`]. Kept as written, without a leading `+`.
    Literal(String),
}

impl fmt::Display for ExactDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExactDecimal::Decimal(d) => fmt::Display::fmt(d, f),
            ExactDecimal::Literal(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: TokenValue,
    pub line: u32,
    pub start_col: Option<u32>,
    pub end_col: Option<u32>,
}

impl Token {
    pub fn is_punct(&self, c: char) -> bool {
        self.value == TokenValue::Punct(c)
    }

    /// The token value rendered as plain text (strings without quotes).
    pub fn text(&self) -> String {
        match &self.value {
            TokenValue::None => String::new(),
            TokenValue::Text(s) => s.clone(),
            TokenValue::Integer(n) => n.to_string(),
            TokenValue::Float(x) => x.to_string(),
            TokenValue::Decimal(d) => d.to_string(),
            TokenValue::Boolean(b) => b.to_string(),
            TokenValue::Punct(c) => c.to_string(),
        }
    }

    /// Whether the token covers the given 1-based column.
    pub fn covers(&self, column: u32) -> bool {
        match (self.start_col, self.end_col) {
            (Some(s), Some(e)) => s <= column && column <= e,
            _ => false,
        }
    }
}

/// Compile a caller-supplied reference pattern so that it only matches at
/// the scan position.
pub fn reference_regex(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})", pattern))
}

pub fn tokenize(text: &str, reference: &Regex) -> Vec<Token> {
    tokenize_with(text, reference, None)
}

/// Tokenize `text`, invoking `on_command` once for every logical line whose
/// first token is an identifier.
pub fn tokenize_with(
    text: &str,
    reference: &Regex,
    mut on_command: Option<&mut dyn FnMut()>,
) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut continued = false;

    for (idx, raw) in text.split('\n').enumerate() {
        let line_no = idx as u32 + 1;
        let mut line = raw.strip_suffix('\r').unwrap_or(raw);
        if idx == 0 {
            line = line.strip_prefix('\u{feff}').unwrap_or(line);
        }

        if !continued {
            if let Some(caps) = LINE_COMMENT.captures(line) {
                let kind = if &caps[1] == "#" {
                    TokenKind::Comment
                } else {
                    TokenKind::Annotation
                };
                let start = line[..caps.get(1).map_or(0, |m| m.start())].chars().count() as u32 + 1;
                tokens.push(Token {
                    kind,
                    value: TokenValue::Text(caps[2].to_owned()),
                    line: line_no,
                    start_col: Some(start),
                    end_col: Some(line.chars().count() as u32),
                });
                push_newline(&mut tokens, line_no);
                continue;
            }
        }

        let mut first_in_line = !continued;
        continued = false;
        let mut rest = line;
        let mut col: u32 = 1;

        while !rest.is_empty() {
            let scanned = scan(rest, reference);
            let (len, token) = match scanned {
                Scan::Whitespace(len) => (len, None),
                Scan::Continuation => {
                    continued = true;
                    break;
                }
                Scan::Token(kind, value, len) => (len, Some((kind, value))),
            };
            let width = rest[..len].chars().count() as u32;
            if let Some((kind, value)) = token {
                if kind == TokenKind::Identifier && first_in_line {
                    if let Some(cb) = on_command.as_mut() {
                        cb();
                    }
                }
                first_in_line = false;
                tokens.push(Token {
                    kind,
                    value,
                    line: line_no,
                    start_col: Some(col),
                    end_col: Some(col + width - 1),
                });
            }
            col += width;
            rest = &rest[len..];
        }

        if !continued {
            push_newline(&mut tokens, line_no);
        }
    }
    tokens
}

fn push_newline(tokens: &mut Vec<Token>, line: u32) {
    if tokens.last().is_some_and(|t| t.kind != TokenKind::Newline) {
        tokens.push(Token {
            kind: TokenKind::Newline,
            value: TokenValue::None,
            line,
            start_col: None,
            end_col: None,
        });
    }
}

enum Scan {
    Token(TokenKind, TokenValue, usize),
    Whitespace(usize),
    Continuation,
}

fn scan(rest: &str, reference: &Regex) -> Scan {
    if let Some(m) = reference.find(rest).filter(|m| !m.is_empty()) {
        return Scan::Token(
            TokenKind::Reference,
            TokenValue::Text(m.as_str().to_owned()),
            m.end(),
        );
    }
    if let Some(m) = FLOAT.find(rest) {
        return Scan::Token(TokenKind::Float, parse_float(m.as_str()), m.end());
    }
    if let Some(m) = HEX.find(rest) {
        return number_token(i64::from_str_radix(&m.as_str()[2..], 16).ok(), m.as_str());
    }
    if let Some(m) = INTEGER.find(rest) {
        let digits = m.as_str().strip_prefix('+').unwrap_or(m.as_str());
        return number_token(digits.parse::<i64>().ok(), m.as_str());
    }
    if let Some(m) = STRING.find(rest) {
        let s = m.as_str();
        return Scan::Token(
            TokenKind::String,
            TokenValue::Text(unescape(&s[1..s.len() - 1])),
            m.end(),
        );
    }
    if let Some(m) = BOOLEAN.find(rest) {
        return Scan::Token(
            TokenKind::Boolean,
            TokenValue::Boolean(m.as_str() == "true"),
            m.end(),
        );
    }
    if let Some(caps) = WORD.captures(rest) {
        let word = caps[1].to_owned();
        let end = caps.get(0).map_or(word.len(), |m| m.end());
        let kind = if caps.get(2).is_some() {
            TokenKind::Label
        } else {
            TokenKind::Identifier
        };
        return Scan::Token(kind, TokenValue::Text(word), end);
    }
    let first = rest.chars().next().unwrap_or(' ');
    if matches!(first, '{' | '}' | '[' | ']' | ':' | ',') {
        return Scan::Token(TokenKind::Punctuation, TokenValue::Punct(first), 1);
    }
    if let Some(caps) = EOL_COMMENT.captures(rest) {
        return Scan::Token(
            TokenKind::Comment,
            TokenValue::Text(caps[1].to_owned()),
            rest.len(),
        );
    }
    if let Some(m) = WHITESPACE.find(rest) {
        return Scan::Whitespace(m.end());
    }
    if let Some(caps) = GENERIC_PERCENT
        .captures(rest)
        .or_else(|| GENERIC_ANGLE.captures(rest))
    {
        let end = caps.get(0).map_or(rest.len(), |m| m.end());
        return Scan::Token(
            TokenKind::Generic,
            TokenValue::Text(caps[1].to_owned()),
            end,
        );
    }
    if CONTINUATION.is_match(rest) {
        return Scan::Continuation;
    }
    Scan::Token(
        TokenKind::Error,
        TokenValue::Text(first.to_string()),
        first.len_utf8(),
    )
}

fn number_token(value: Option<i64>, literal: &str) -> Scan {
    match value {
        Some(n) => Scan::Token(TokenKind::Integer, TokenValue::Integer(n), literal.len()),
        // out of i64 range
        None => Scan::Token(
            TokenKind::Error,
            TokenValue::Text(literal.to_owned()),
            literal.len(),
        ),
    }
}

fn parse_float(literal: &str) -> TokenValue {
    if literal.len() <= MAX_FLOAT_LITERAL_LEN {
        return TokenValue::Float(literal.parse::<f64>().unwrap_or(f64::NAN));
    }
    let digits = literal.strip_prefix('+').unwrap_or(literal);
    let exact = if digits.contains('e') {
        Decimal::from_scientific(digits)
    } else {
        // from_str would round away digits past the 28th
        Decimal::from_str_exact(digits)
    };
    TokenValue::Decimal(match exact {
        Ok(d) => ExactDecimal::Decimal(d),
        Err(_) => ExactDecimal::Literal(digits.to_owned()),
    })
}

/// Escape string content so that [`unescape`] restores it.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0c}' => out.push_str("\\f"),
            '\u{08}' => out.push_str("\\b"),
            other => out.push(other),
        }
    }
    out
}

/// Resolve backslash escapes; unknown escapes are kept verbatim.
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('f') => out.push('\u{0c}'),
            Some('b') => out.push('\u{08}'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
