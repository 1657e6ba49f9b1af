//! Reconstruction of the element under the cursor from a partial document.
//!
//! The input is the chain of lines leading to the cursor: every ancestor
//! command header from the top of the document down to the line holding
//! the cursor (see [`crate::extract::extract_context_lines`]). The last line
//! is cut at the cursor, the value being typed is removed, every bracket
//! that is still open is closed, and the result is instantiated. The
//! innermost element of the rebuilt chain is the context element.
//!
//! Precondition for the descent: the rebuilt document holds at most one
//! child per element, so the first contained child is always the next
//! element on the path to the cursor.

use once_cell::sync::Lazy;
use regex::Regex;
use textmodel_core::lexer::{tokenize, Token, TokenKind};
use textmodel_core::{ElementId, FeatureId, InstantiateOptions, Instantiator, Model, Schema};

/// Indentation unit used when the context lines don't reveal one.
pub const DEFAULT_INDENT: &str = "  ";

static BEFORE_BRACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\{").unwrap());
static BEFORE_BRACKET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\[").unwrap());
static AFTER_CURLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\s*$").unwrap());
static LABEL_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([a-zA-Z_]\w*):\s*$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextProblem {
    /// A value was completed but no comma follows it yet.
    MissingComma,
    /// The cursor sits right after an opening `{`.
    AfterCurly,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CursorPosition {
    pub in_array: bool,
    pub in_block: bool,
    pub after_label: bool,
    pub after_comma: bool,
    pub before_brace: bool,
    pub before_bracket: bool,
}

#[derive(Debug)]
pub struct Context {
    /// Throwaway model holding the rebuilt element chain.
    pub model: Model,
    pub element: Option<ElementId>,
    pub feature: Option<FeatureId>,
    pub prefix: String,
    pub problem: Option<ContextProblem>,
    pub position: CursorPosition,
    /// Leading whitespace of the cursor line.
    pub line_indent: String,
    /// One level of indentation, as used by the document.
    pub indent: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Role {
    Label(String),
    /// Position among the unlabeled arguments.
    Index(usize),
}

/// Closeable document plus everything learned about the cursor line.
#[derive(Debug)]
struct Fixed {
    lines: Vec<String>,
    num_elements: usize,
    role: Option<Role>,
    prefix: String,
    problem: Option<ContextProblem>,
    position: CursorPosition,
}

/// Build the completion context for a cursor in the last of `lines`.
///
/// `column` is the 1-based character column of the cursor; `None` puts it
/// after the end of the line. Returns `None` when the cursor line is no
/// place for a model element (inside a comment, on a closing bracket).
pub fn build_context<S: AsRef<str>>(
    schema: &Schema,
    lines: &[S],
    column: Option<usize>,
) -> Option<Context> {
    let lines: Vec<String> = lines.iter().map(|l| l.as_ref().to_owned()).collect();
    let fixed = fix_context(schema, &lines, column)?;

    let mut model = Model::new();
    let mut element = None;
    if fixed.num_elements > 0 {
        let text = fixed.lines.join("\n");
        let out = Instantiator::new(schema).instantiate(&text, &mut model, InstantiateOptions::default());
        element = out.roots.first().copied();
        for _ in 1..fixed.num_elements {
            element = element.and_then(|e| model.first_child(schema, e));
        }
    }

    let mut position = fixed.position;
    let feature = match &fixed.role {
        Some(Role::Index(i)) => element
            .and_then(|e| schema.unlabeled_arguments(model.class_of(e)).get(*i).copied()),
        Some(Role::Label(name)) => {
            position.after_label = true;
            element.and_then(|e| schema.feature_by_name(model.class_of(e), name))
        }
        None => None,
    };
    let (line_indent, indent) = indentation(&lines);

    tracing::debug!(
        num_elements = fixed.num_elements,
        found = element.is_some(),
        role = ?fixed.role,
        prefix = %fixed.prefix,
        problem = ?fixed.problem,
        "context built"
    );

    Some(Context {
        model,
        element,
        feature,
        prefix: fixed.prefix,
        problem: fixed.problem,
        position,
        line_indent,
        indent,
    })
}

fn tokens_of(schema: &Schema, line: &str) -> Vec<Token> {
    tokenize(line, schema.reference_regex())
        .into_iter()
        .filter(|t| t.kind != TokenKind::Newline)
        .collect()
}

fn label_only(line: &str) -> Option<String> {
    LABEL_ONLY.captures(line).map(|c| c[1].to_owned())
}

fn fix_context(schema: &Schema, lines: &[String], column: Option<usize>) -> Option<Fixed> {
    let (last, above) = lines.split_last()?;

    let chars: Vec<char> = last.chars().collect();
    let cut = match column {
        Some(c) if c <= 1 => 0,
        Some(c) => (c - 1).min(chars.len()),
        None => chars.len(),
    };
    let mut line: String = chars[..cut].iter().collect();
    let tail: String = chars[cut..].iter().collect();

    let mut position = CursorPosition {
        before_brace: BEFORE_BRACE.is_match(&tail),
        before_bracket: BEFORE_BRACKET.is_match(&tail),
        ..Default::default()
    };
    let mut problem = None;
    if let Some(m) = AFTER_CURLY.find(&line) {
        line.truncate(m.start());
        problem = Some(ContextProblem::AfterCurly);
    }

    let tokens = tokens_of(schema, &line);
    let trailing_ws = line.chars().last().is_some_and(char::is_whitespace);

    if tokens
        .iter()
        .skip(1)
        .any(|t| matches!(t.kind, TokenKind::Comment | TokenKind::Annotation))
    {
        return None;
    }

    match tokens.first().map(|t| t.kind) {
        None => {
            // blank line right below a role label
            if let Some((label_line, rest)) = above.split_last() {
                if let Some(name) = label_only(label_line) {
                    position.in_block = false;
                    return label_context(schema, rest, name, String::new(), problem, position);
                }
            }
            statement_position(schema, above, line, String::new(), problem, position)
        }
        Some(TokenKind::Identifier) if tokens.len() == 1 && !trailing_ws => {
            let prefix = tokens[0].text();
            let keep = line.chars().count() - prefix.chars().count();
            let line: String = line.chars().take(keep).collect();
            statement_position(schema, above, line, prefix, problem, position)
        }
        Some(TokenKind::Identifier) => {
            command_line(schema, above, line, &tokens, trailing_ws, problem, position)
        }
        Some(TokenKind::Label) => {
            let name = tokens[0].text();
            match &tokens[1..] {
                [] => label_context(schema, above, name, String::new(), problem, position),
                [t] if t.is_punct('[') => {
                    position.in_array = true;
                    label_context(schema, above, name, String::new(), problem, position)
                }
                [t] if t.kind == TokenKind::Identifier && !trailing_ws => {
                    // command word typed right after a role label
                    position.in_block = true;
                    label_context(schema, above, name, t.text(), problem, position)
                }
                // labeled child on the role label's line
                [t, ..] if t.kind == TokenKind::Identifier => {
                    command_line(schema, above, line, &tokens[1..], trailing_ws, problem, position)
                }
                _ => non_element(above),
            }
        }
        Some(_) => non_element(above),
    }
}

/// A line that cannot hold an element. Only at the very top of a document
/// does it still offer root level completion.
fn non_element(above: &[String]) -> Option<Fixed> {
    if !above.is_empty() {
        return None;
    }
    Some(Fixed {
        lines: Vec::new(),
        num_elements: 0,
        role: None,
        prefix: String::new(),
        problem: None,
        position: CursorPosition {
            in_block: true,
            ..Default::default()
        },
    })
}

/// Cursor right after a role label: rebuild the context without the label
/// and put the label on top as the role.
fn label_context(
    schema: &Schema,
    above: &[String],
    name: String,
    prefix: String,
    problem: Option<ContextProblem>,
    position: CursorPosition,
) -> Option<Fixed> {
    let mut lines = above.to_vec();
    lines.push(String::new());
    let mut fixed = fix_context(schema, &lines, None)?;
    fixed.role = Some(Role::Label(name));
    fixed.prefix = prefix;
    fixed.position = position;
    if problem.is_some() {
        fixed.problem = problem;
    }
    Some(fixed)
}

/// Cursor where a new statement would start, possibly with part of the
/// command word already typed.
fn statement_position(
    schema: &Schema,
    above: &[String],
    line: String,
    prefix: String,
    problem: Option<ContextProblem>,
    mut position: CursorPosition,
) -> Option<Fixed> {
    let role = find_role(schema, above).map(Role::Label);
    let mut lines = above.to_vec();
    if lines.last().is_some_and(|l| label_only(l).is_some()) {
        lines.pop();
    }
    lines.push(line);
    position.in_block = true;
    Some(close_lines(schema, lines, 0, role, prefix, problem, position))
}

/// Cursor somewhere in the argument list of a command.
fn command_line(
    schema: &Schema,
    above: &[String],
    line: String,
    tokens: &[Token],
    trailing_ws: bool,
    mut problem: Option<ContextProblem>,
    mut position: CursorPosition,
) -> Option<Fixed> {
    let args = &tokens[1..];

    // the value being typed, including error tokens glued to it
    let mut split = args.len();
    let mut prefix = String::new();
    let in_progress = |t: &Token| t.kind.is_value() || t.kind == TokenKind::Error;
    if !trailing_ws && args.last().is_some_and(in_progress) {
        split -= 1;
        while split > 0 {
            let (prev, cur) = (&args[split - 1], &args[split]);
            let adjacent = prev
                .end_col
                .zip(cur.start_col)
                .is_some_and(|(e, s)| e + 1 == s);
            let glued = prev.kind == TokenKind::Error || cur.kind == TokenKind::Error;
            if adjacent && glued && in_progress(prev) {
                split -= 1;
            } else {
                break;
            }
        }
        let start = args[split].start_col.map_or(0, |c| c as usize - 1);
        prefix = line.chars().skip(start).collect();
    }
    let body = &args[..split];

    let mut depth = 0usize;
    let mut label: Option<String> = None;
    let mut label_used = false;
    let mut commas = 0usize;
    for t in body {
        if t.kind == TokenKind::Label {
            label = Some(t.text());
            label_used = true;
        } else if t.is_punct(',') {
            if depth == 0 {
                label = None;
                commas += 1;
            }
        } else if t.is_punct('[') {
            depth += 1;
        } else if t.is_punct(']') {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                label = None;
            }
        }
    }

    let last = body.last();
    let missing_comma = match last {
        Some(t) if in_progress(t) => true,
        Some(t) if t.is_punct(']') => trailing_ws || !prefix.is_empty(),
        _ => false,
    };
    let role = if missing_comma {
        None
    } else if let Some(l) = label {
        Some(Role::Label(l))
    } else if !label_used && last.map_or(true, |t| t.is_punct(',') || t.is_punct('[')) {
        Some(Role::Index(commas))
    } else {
        None
    };
    if missing_comma && problem.is_none() {
        problem = Some(ContextProblem::MissingComma);
    }
    position.in_array = depth > 0;
    position.after_comma = last.is_some_and(|t| t.is_punct(','));

    let keep = line.chars().count() - prefix.chars().count();
    let mut line: String = line.chars().take(keep).collect();
    for _ in 0..depth {
        line.push(']');
    }

    let mut lines = above.to_vec();
    lines.push(line);
    Some(close_lines(schema, lines, 1, role, prefix, problem, position))
}

/// Append closers for every bracket left open above the cursor line.
fn close_lines(
    schema: &Schema,
    mut lines: Vec<String>,
    own: usize,
    role: Option<Role>,
    prefix: String,
    problem: Option<ContextProblem>,
    position: CursorPosition,
) -> Fixed {
    let mut closers = Vec::new();
    let mut blocks = 0;
    let above = lines.len().saturating_sub(1);
    for line in lines[..above].iter().rev() {
        for opener in unmatched_openers(schema, line).into_iter().rev() {
            if opener == '{' {
                blocks += 1;
                closers.push("}".to_owned());
            } else {
                closers.push("]".to_owned());
            }
        }
    }
    lines.extend(closers);
    Fixed {
        lines,
        num_elements: blocks + own,
        role,
        prefix,
        problem,
        position,
    }
}

fn unmatched_openers(schema: &Schema, line: &str) -> Vec<char> {
    let mut stack = Vec::new();
    for t in tokens_of(schema, line) {
        if t.is_punct('{') || t.is_punct('[') {
            stack.push(if t.is_punct('{') { '{' } else { '[' });
        } else if (t.is_punct('}') && stack.last() == Some(&'{'))
            || (t.is_punct(']') && stack.last() == Some(&'['))
        {
            stack.pop();
        }
    }
    stack
}

/// Role label governing a statement that starts below `lines`: either a
/// label alone on the line directly above, or the label of the innermost
/// open element list.
fn find_role(schema: &Schema, lines: &[String]) -> Option<String> {
    if let Some(name) = lines.last().and_then(|l| label_only(l)) {
        return Some(name);
    }
    let mut level: i32 = 0;
    for line in lines.iter().rev() {
        let tokens = tokens_of(schema, line);
        for (i, t) in tokens.iter().enumerate().rev() {
            if t.is_punct('}') || t.is_punct(']') {
                level += 1;
            } else if t.is_punct('{') || t.is_punct('[') {
                level -= 1;
                if level < 0 {
                    if t.is_punct('[') && i > 0 && tokens[i - 1].kind == TokenKind::Label {
                        return Some(tokens[i - 1].text());
                    }
                    return None;
                }
            }
        }
    }
    None
}

fn leading_ws(line: &str) -> String {
    line.chars().take_while(|c| c.is_whitespace()).collect()
}

fn indentation(lines: &[String]) -> (String, String) {
    let line_indent = lines.last().map(|l| leading_ws(l)).unwrap_or_default();
    let non_blank: Vec<&String> = lines.iter().filter(|l| !l.trim().is_empty()).collect();
    let indent = match non_blank.as_slice() {
        [.., a, b] => {
            let (a, b) = (leading_ws(a), leading_ws(b));
            match b.strip_prefix(a.as_str()) {
                Some(unit) if !unit.is_empty() => unit.to_owned(),
                _ => DEFAULT_INDENT.to_owned(),
            }
        }
        _ => DEFAULT_INDENT.to_owned(),
    };
    (line_indent, indent)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
