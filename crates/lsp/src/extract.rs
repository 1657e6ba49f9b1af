//! Selection of the context lines for a cursor in a whole document.
//!
//! Walking upward from the cursor line, only the headers of still open
//! blocks and element lists are kept. Closed sibling blocks, plain sibling
//! statements, comments and blank lines are dropped. A role label alone on
//! its line is kept when it sits directly above the cursor line or above a
//! kept header.

use once_cell::sync::Lazy;
use regex::Regex;
use textmodel_core::lexer::{reference_regex, tokenize};
use textmodel_core::schema::DEFAULT_REFERENCE_PATTERN;
use textmodel_core::{Token, TokenKind, TokenValue};

// only bracket tokens are inspected, so the stock pattern will do
static REFERENCE: Lazy<Regex> =
    Lazy::new(|| reference_regex(DEFAULT_REFERENCE_PATTERN).unwrap());

/// Brackets of one line that are not balanced within it.
#[derive(Default)]
struct Unbalanced {
    blocks_closed: usize,
    lists_closed: usize,
    /// Innermost last.
    open: Vec<char>,
}

fn unbalanced(tokens: &[Token]) -> Unbalanced {
    let mut u = Unbalanced::default();
    for t in tokens {
        match t.value {
            TokenValue::Punct(c @ ('{' | '[')) => u.open.push(c),
            TokenValue::Punct('}') if u.open.last() == Some(&'{') => {
                u.open.pop();
            }
            TokenValue::Punct(']') if u.open.last() == Some(&'[') => {
                u.open.pop();
            }
            TokenValue::Punct('}') => u.blocks_closed += 1,
            TokenValue::Punct(']') => u.lists_closed += 1,
            _ => {}
        }
    }
    u
}

/// Tokens of a line without comments, annotations and the newline.
fn code_tokens(line: &str) -> Vec<Token> {
    tokenize(line, &REFERENCE)
        .into_iter()
        .filter(|t| {
            !matches!(
                t.kind,
                TokenKind::Newline | TokenKind::Comment | TokenKind::Annotation
            )
        })
        .collect()
}

/// Lines from the top of the document down to `cursor_line` (0-based) that
/// make up the path to the cursor. Empty if the line doesn't exist.
pub fn extract_context_lines<S: AsRef<str>>(lines: &[S], cursor_line: usize) -> Vec<String> {
    let Some(current) = lines.get(cursor_line) else {
        return Vec::new();
    };
    let mut kept = vec![current.as_ref().to_owned()];
    let mut blocks = 0usize;
    let mut lists = 0usize;
    // whether the last kept line is the nearest relevant line below
    let mut adjacent = true;

    for line in lines[..cursor_line].iter().rev().map(|l| l.as_ref()) {
        let tokens = code_tokens(line);
        if tokens.is_empty() {
            continue;
        }
        let u = unbalanced(&tokens);
        blocks += u.blocks_closed;
        lists += u.lists_closed;

        let mut opens = false;
        for c in u.open.iter().rev() {
            let pending = if *c == '{' { &mut blocks } else { &mut lists };
            if *pending > 0 {
                *pending -= 1;
            } else {
                opens = true;
            }
        }

        let label_only = tokens.len() == 1 && tokens[0].kind == TokenKind::Label;
        if opens {
            kept.push(line.to_owned());
            adjacent = true;
        } else if label_only && adjacent && blocks == 0 && lists == 0 {
            kept.push(line.to_owned());
            adjacent = false;
        } else {
            adjacent = false;
        }
    }

    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_closed_siblings() {
        let doc = [
            "TestNode {",
            "  TestNode text: a {",
            "    TestNode",
            "  }",
            "  # remark",
            "  TestNode nums: 1",
            "",
            "  TestNode ",
            "}",
        ];
        assert_eq!(extract_context_lines(&doc, 7), vec!["TestNode {", "  TestNode "]);
    }

    #[test]
    fn keeps_open_lists_and_labels() {
        let doc = [
            "Holder {",
            "  one:",
            "    TestNode {",
            "      childs: [",
            "        TestNode",
            "        ",
        ];
        assert_eq!(
            extract_context_lines(&doc, 5),
            vec!["Holder {", "  one:", "    TestNode {", "      childs: [", "        "]
        );
    }

    #[test]
    fn label_above_cursor() {
        let doc = ["Holder {", "  one:", "    "];
        assert_eq!(extract_context_lines(&doc, 2), vec!["Holder {", "  one:", "    "]);

        let doc = ["Holder {", "  one:", "    TestNode", "  "];
        assert_eq!(extract_context_lines(&doc, 3), vec!["Holder {", "  "]);
    }

    #[test]
    fn trailing_comments_after_openers() {
        let doc = ["TestNode { # parent", "  TestNode text: a { # child", "    "];
        assert_eq!(extract_context_lines(&doc, 2), doc.to_vec());

        let doc = ["TestNode {", "  TestNode text: \"{\" {", "  } # done", "  "];
        assert_eq!(extract_context_lines(&doc, 3), vec!["TestNode {", "  "]);
    }

    #[test]
    fn missing_line() {
        assert!(extract_context_lines(&["A"], 3).is_empty());
    }
}
