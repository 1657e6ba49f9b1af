//! Detection of the linkable value under the cursor.

use once_cell::sync::Lazy;
use regex::Regex;
use textmodel_core::lexer::{tokenize, TokenKind};
use textmodel_core::{ElementId, FeatureId, Model, Schema};

use crate::context::build_context;

/// Text left of a token that is still the command word.
static COMMAND_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\w*$").unwrap());
/// Text left of a token that is the first word after the command.
static FIRST_ARGUMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\w*\s*$").unwrap());

#[derive(Debug)]
pub struct LinkDescriptor {
    /// Model holding the rebuilt element chain.
    pub model: Model,
    pub element: ElementId,
    pub feature: Option<FeatureId>,
    /// Position of the value inside its enclosing array, 0 outside arrays.
    pub index: usize,
    /// The value names the element itself; links lead to its referrers.
    pub backward: bool,
    pub value: String,
    pub start_col: u32,
    pub end_col: u32,
}

/// Find the link under the 1-based `column` of the last of `lines`.
pub fn detect_link<S: AsRef<str>>(
    schema: &Schema,
    lines: &[S],
    column: usize,
) -> Option<LinkDescriptor> {
    let mut lines: Vec<String> = lines.iter().map(|l| l.as_ref().to_owned()).collect();
    let last = lines.last_mut()?;
    last.push(' ');
    let line = last.clone();

    let outer = build_context(schema, &lines, None)?;
    let element = outer.element?;

    let tokens = tokenize(&line, schema.reference_regex());
    let at = tokens.iter().position(|t| t.covers(column as u32))?;
    let token = &tokens[at];
    if !matches!(
        token.kind,
        TokenKind::Reference | TokenKind::Integer | TokenKind::String | TokenKind::Identifier
    ) {
        return None;
    }
    let (start_col, end_col) = token.start_col.zip(token.end_col)?;

    let before: String = line.chars().take(start_col as usize - 1).collect();
    let feature = if COMMAND_WORD.is_match(&before) {
        None
    } else {
        build_context(schema, &lines, Some(start_col as usize)).and_then(|c| c.feature)
    };

    let class = outer.model.class_of(element);
    let backward = match schema.backward_reference_attribute(class) {
        Some(attr) => feature.is_some_and(|f| schema.feature(f).name == attr),
        None => token.kind == TokenKind::Identifier && FIRST_ARGUMENT.is_match(&before),
    };

    // values counted per open array
    let mut arrays: Vec<usize> = Vec::new();
    for t in &tokens[..at] {
        if t.is_punct('[') {
            arrays.push(0);
        } else if t.is_punct(']') {
            arrays.pop();
        } else if t.kind.is_value() {
            if let Some(n) = arrays.last_mut() {
                *n += 1;
            }
        }
    }
    let index = arrays.last().copied().unwrap_or(0);

    tracing::debug!(
        value = %token.text(),
        backward,
        index,
        has_feature = feature.is_some(),
        "link detected"
    );

    Some(LinkDescriptor {
        model: outer.model,
        element,
        feature,
        index,
        backward,
        value: token.text(),
        start_col,
        end_col,
    })
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_schema;

    fn feature_name(schema: &Schema, link: &LinkDescriptor) -> Option<String> {
        link.feature.map(|f| schema.feature(f).name.clone())
    }

    #[test]
    fn labeled_reference_is_forward() {
        let schema = test_schema();
        let link = detect_link(&schema, &["TestNode related: /a/b"], 20).unwrap();
        assert!(!link.backward);
        assert_eq!(link.value, "/a/b");
        assert_eq!((link.start_col, link.end_col), (19, 22));
        assert_eq!(feature_name(&schema, &link).as_deref(), Some("related"));
    }

    #[test]
    fn identifying_name_is_backward_without_attribute() {
        let schema = test_schema();
        let link = detect_link(&schema, &["TestNode {", "  TestNode foo"], 13).unwrap();
        assert!(link.backward);
        assert_eq!(link.value, "foo");
    }

    #[test]
    fn declared_backward_attribute_decides() {
        let schema = test_schema();
        let link = detect_link(&schema, &["Named \"n\", target: /x"], 8).unwrap();
        assert!(link.backward);
        assert_eq!(feature_name(&schema, &link).as_deref(), Some("name"));

        let link = detect_link(&schema, &["Named \"n\", target: /x"], 21).unwrap();
        assert!(!link.backward);
        assert_eq!(feature_name(&schema, &link).as_deref(), Some("target"));
    }

    #[test]
    fn index_inside_array() {
        let schema = test_schema();
        let link = detect_link(&schema, &["TestNode others: [/a, /b, /c]"], 27).unwrap();
        assert_eq!(link.value, "/c");
        assert_eq!(link.index, 2);
        assert_eq!(feature_name(&schema, &link).as_deref(), Some("others"));
    }

    #[test]
    fn non_linkable_tokens() {
        let schema = test_schema();
        assert!(detect_link(&schema, &["TestNode boolean: true"], 20).is_none());
        assert!(detect_link(&schema, &["TestNode text: a"], 12).is_none());
        assert!(detect_link(&schema, &["TestNode text: a"], 40).is_none());
    }

    #[test]
    fn command_word_has_no_feature() {
        let schema = test_schema();
        let link = detect_link(&schema, &["TestNode text: a"], 3).unwrap();
        assert_eq!(link.feature, None);
        assert_eq!(link.value, "TestNode");
    }
}
