//! Whole-document scenarios for completion, links and diagnostics.
//!
//! Positions are 0-based LSP positions, as an editor would send them.

use lsp_types::{CompletionItemKind, DiagnosticSeverity};
use rstest::rstest;
use serde_json::json;
use textmodel_core::{Schema, Value};
use textmodel_lsp::{build_context, complete_at, diagnostics, link_at, CompleterOptions};

fn schema() -> Schema {
    Schema::from_value(json!({
        "classes": [
            { "name": "TestNode", "features": [
                { "name": "text", "kind": "string" },
                { "name": "nums", "kind": "integer", "many": true },
                { "name": "others", "kind": "reference", "target": "TestNode", "many": true },
                { "name": "childs", "kind": "containment", "target": "TestNode", "many": true }
            ] },
            { "name": "Other", "root": false, "supertypes": ["TestNode"] }
        ]
    }))
    .unwrap()
}

const DOCUMENT: &str = "\
TestNode text: a {
  TestNode nums: 3 {
    Other text: closed {
    }
    TestNode others: /dummy
  }
  TestNode text: \"b\", nums: [1, 2]
}
";

// ──────────────────────────────────────────────
// Context reconstruction
// ──────────────────────────────────────────────

#[test]
fn context_parent_chain_carries_completed_values() {
    let schema = schema();
    let lines = ["TestNode text: a {", "  TestNode nums: 3 {", "  TestNode others: /dummy {"];
    let context = build_context(&schema, &lines, Some(12)).unwrap();

    assert_eq!(context.prefix, "");
    assert_eq!(context.feature, None);
    assert!(!context.position.in_block);

    let element = context.element.unwrap();
    let parent = context.model.parent(element).unwrap();
    let grandparent = context.model.parent(parent).unwrap();
    assert_eq!(
        context.model.values_named(&schema, parent, "nums"),
        &[Value::Integer(3)]
    );
    assert_eq!(
        context.model.values_named(&schema, grandparent, "text"),
        &[Value::String("a".into())]
    );
}

#[test]
fn context_is_deterministic() {
    let schema = schema();
    let lines = ["TestNode {", "  TestNode text: \"x\", nu"];
    let a = build_context(&schema, &lines, None).unwrap();
    let b = build_context(&schema, &lines, None).unwrap();
    assert_eq!(a.prefix, b.prefix);
    assert_eq!(a.position, b.position);
    assert_eq!(a.feature, b.feature);
    assert_eq!(a.model.len(), b.model.len());
}

// ──────────────────────────────────────────────
// Completion on a whole document
// ──────────────────────────────────────────────

#[test]
fn completion_in_nested_block_ignores_siblings() {
    let schema = schema();
    // below "TestNode others: /dummy", inside the nums: 3 block
    let text = DOCUMENT.replace("    TestNode others: /dummy\n", "    TestNode others: /dummy\n    \n");
    let items = complete_at(&schema, &text, 5, 4, &CompleterOptions::default());
    let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(labels, vec!["Other", "TestNode"]);
    assert!(items.iter().all(|i| i.kind == Some(CompletionItemKind::CLASS)));
}

#[test]
fn completion_of_labels_uses_prefix() {
    let schema = schema();
    let text = "TestNode text: \"b\", n\n";
    let items = complete_at(&schema, text, 0, 21, &CompleterOptions::default());
    let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(labels, vec!["nums:"]);
}

#[rstest]
#[case("", 0, vec!["TestNode"])]
#[case("Te", 2, vec!["TestNode"])]
#[case("X", 1, vec![])]
fn root_completion(#[case] text: &str, #[case] character: u32, #[case] expected: Vec<&str>) {
    let schema = schema();
    let items = complete_at(&schema, text, 0, character, &CompleterOptions::default());
    let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(labels, expected);
}

#[test]
fn completion_outside_document_is_empty() {
    let schema = schema();
    assert!(complete_at(&schema, "TestNode\n", 7, 0, &CompleterOptions::default()).is_empty());
}

// ──────────────────────────────────────────────
// Links
// ──────────────────────────────────────────────

#[test]
fn reference_value_is_a_forward_link() {
    let schema = schema();
    let link = link_at(&schema, DOCUMENT, 4, 22).unwrap();
    assert_eq!(link.value, "/dummy");
    assert!(!link.backward);
    let feature = link.feature.map(|f| schema.feature(f).name.clone());
    assert_eq!(feature.as_deref(), Some("others"));

    let line = DOCUMENT.lines().nth(4).unwrap();
    let range = textmodel_lsp::convert::link_range(&link, 4, line);
    assert_eq!((range.start.character, range.end.character), (21, 27));
}

#[test]
fn identifying_name_is_a_backward_link() {
    let schema = schema();
    let link = link_at(&schema, "TestNode {\n  TestNode target\n}\n", 1, 12).unwrap();
    assert!(link.backward);
    assert_eq!(link.value, "target");
}

#[test]
fn positions_after_non_ascii_text() {
    let schema = schema();
    // the emoji takes two UTF-16 code units
    let text = "TestNode text: \"\u{1F600}\", others: /a/b\n";
    let link = link_at(&schema, text, 0, 32).unwrap();
    assert_eq!(link.value, "/a/b");

    let range = textmodel_lsp::convert::link_range(&link, 0, text.trim_end());
    assert_eq!((range.start.character, range.end.character), (29, 33));

    let text = "TestNode text: \"\u{1F600}\", n, nums: 1\n";
    let items = complete_at(&schema, text, 0, 22, &CompleterOptions::default());
    let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(labels, vec!["nums:"]);
}

#[test]
fn array_index_of_link() {
    let schema = schema();
    let link = link_at(&schema, DOCUMENT, 6, 32).unwrap();
    assert_eq!(link.value, "2");
    assert_eq!(link.index, 1);
}

// ──────────────────────────────────────────────
// Diagnostics
// ──────────────────────────────────────────────

#[test]
fn problems_become_diagnostics() {
    let schema = schema();
    assert!(diagnostics(&schema, DOCUMENT, None).is_empty());

    let found = diagnostics(&schema, "TestNode\nUnknown\n", Some("a.tm"));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].range.start.line, 1);
    assert_eq!(found[0].severity, Some(DiagnosticSeverity::ERROR));
    assert_eq!(found[0].message, "Unknown command 'Unknown'");
}
