//! Editor support for the textual command notation.
//!
//! Everything here works on a partial, possibly broken document:
//!
//! - [`extract`] picks the lines on the path from the document top to the
//!   cursor
//! - [`context`] rebuilds the element under the cursor from those lines
//! - [`completer`] turns a context into completion options
//! - [`link`] finds the linkable value under the cursor
//! - [`convert`] maps the results onto `lsp-types` values
//!
//! The functions at the crate root run the whole chain on a document text
//! with 0-based LSP positions, whose `character` counts UTF-16 code units.

pub mod completer;
pub mod context;
pub mod convert;
pub mod extract;
pub mod link;

#[cfg(test)]
pub(crate) mod testing;

use lsp_types::{CompletionItem, Diagnostic};
use textmodel_core::{InstantiateOptions, Instantiator, Model, Schema};

pub use completer::{
    complete, CompleterOptions, CompletionOption, OptionKind, ReferenceOption, ReferenceProvider,
};
pub use context::{build_context, Context, ContextProblem, CursorPosition};
pub use extract::extract_context_lines;
pub use link::{detect_link, LinkDescriptor};

fn document_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect()
}

/// Completion items for the cursor at `line`/`character` of `text`.
pub fn complete_at(
    schema: &Schema,
    text: &str,
    line: u32,
    character: u32,
    options: &CompleterOptions<'_>,
) -> Vec<CompletionItem> {
    let lines = extract_context_lines(&document_lines(text), line as usize);
    if lines.is_empty() {
        return Vec::new();
    }
    let cursor_line = lines.last().map_or("", String::as_str);
    let column = convert::char_column(cursor_line, character);
    let context = build_context(schema, &lines, Some(column));
    complete(schema, context.as_ref(), options)
        .iter()
        .map(convert::completion_item)
        .collect()
}

/// The link under the cursor at `line`/`character` of `text`.
pub fn link_at(schema: &Schema, text: &str, line: u32, character: u32) -> Option<LinkDescriptor> {
    let lines = extract_context_lines(&document_lines(text), line as usize);
    if lines.is_empty() {
        return None;
    }
    let cursor_line = lines.last().map_or("", String::as_str);
    detect_link(schema, &lines, convert::char_column(cursor_line, character))
}

/// Instantiate `text` and report its problems as diagnostics.
pub fn diagnostics(schema: &Schema, text: &str, file_name: Option<&str>) -> Vec<Diagnostic> {
    let mut model = Model::new();
    let options = InstantiateOptions {
        file_name: file_name.map(str::to_owned),
        ..Default::default()
    };
    let out = Instantiator::new(schema).instantiate(text, &mut model, options);
    out.problems.iter().map(convert::problem_diagnostic).collect()
}
