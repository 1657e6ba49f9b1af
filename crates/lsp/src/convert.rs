//! Conversions into `lsp-types` values.

use lsp_types::{
    CompletionItem, CompletionItemKind, Diagnostic, DiagnosticSeverity, Position, Range,
};
use textmodel_core::Problem;

use crate::completer::{CompletionOption, OptionKind};
use crate::link::LinkDescriptor;

pub fn completion_item(option: &CompletionOption) -> CompletionItem {
    let kind = match option.kind {
        OptionKind::Command => CompletionItemKind::CLASS,
        OptionKind::Label => CompletionItemKind::PROPERTY,
        OptionKind::Value => CompletionItemKind::VALUE,
        OptionKind::Reference => CompletionItemKind::REFERENCE,
        OptionKind::Block => CompletionItemKind::SNIPPET,
    };
    CompletionItem {
        label: option.display.clone(),
        kind: Some(kind),
        detail: option.extra.clone(),
        insert_text: Some(option.insert.clone()),
        ..Default::default()
    }
}

/// A problem covers its whole line.
pub fn problem_diagnostic(problem: &Problem) -> Diagnostic {
    // Problem lines are 1-indexed; LSP positions are 0-indexed.
    let line = problem.line.saturating_sub(1);
    Diagnostic {
        range: Range::new(Position::new(line, 0), Position::new(line, u32::MAX)),
        severity: Some(DiagnosticSeverity::ERROR),
        source: Some("textmodel".to_string()),
        message: problem.message.clone(),
        ..Default::default()
    }
}

/// Range of a link's token on the 0-based `line`, whose text is `text`.
pub fn link_range(link: &LinkDescriptor, line: u32, text: &str) -> Range {
    Range::new(
        Position::new(line, utf16_offset(text, link.start_col.saturating_sub(1))),
        Position::new(line, utf16_offset(text, link.end_col)),
    )
}

// -- Columns ---------------------------------------------------
//
// LSP positions count UTF-16 code units; tokens count characters from 1.

/// 1-based character column of the LSP `character` offset into `text`.
pub fn char_column(text: &str, character: u32) -> usize {
    let target = character as usize;
    let mut units = 0;
    let mut column = 1;
    for c in text.chars() {
        if units >= target {
            return column;
        }
        units += c.len_utf16();
        column += 1;
    }
    column + target.saturating_sub(units)
}

/// UTF-16 length of the first `chars` characters of `text`.
pub fn utf16_offset(text: &str, chars: u32) -> u32 {
    let units: usize = text.chars().take(chars as usize).map(char::len_utf16).sum();
    units as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_on_zero_based_line() {
        let d = problem_diagnostic(&Problem::new("Unknown command 'X'", 3));
        assert_eq!(d.range.start, Position::new(2, 0));
        assert_eq!(d.severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(d.source.as_deref(), Some("textmodel"));

        let d = problem_diagnostic(&Problem::new("Unexpected end of file", 0));
        assert_eq!(d.range.start.line, 0);
    }

    #[test]
    fn columns_count_utf16_units() {
        let text = "a\u{1F600}b";
        assert_eq!(char_column(text, 0), 1);
        assert_eq!(char_column(text, 1), 2);
        assert_eq!(char_column(text, 3), 3);
        assert_eq!(char_column(text, 4), 4);
        assert_eq!(char_column(text, 6), 6);

        assert_eq!(utf16_offset(text, 2), 3);
        assert_eq!(utf16_offset("é", 5), 1);
    }

    #[test]
    fn completion_kinds() {
        let option = CompletionOption {
            insert: "text: ".into(),
            display: "text:".into(),
            extra: Some("String".into()),
            kind: OptionKind::Label,
        };
        let item = completion_item(&option);
        assert_eq!(item.label, "text:");
        assert_eq!(item.kind, Some(CompletionItemKind::PROPERTY));
        assert_eq!(item.insert_text.as_deref(), Some("text: "));
        assert_eq!(item.detail.as_deref(), Some("String"));
    }
}
