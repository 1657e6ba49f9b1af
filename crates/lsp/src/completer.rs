//! Completion options for a reconstructed [`Context`].
//!
//! Four situations are distinguished: no element (root commands), inside a
//! block (child commands or role labels), a pending structural problem
//! (only a block opener) and a value position (values for the active
//! feature plus the labeled arguments not set yet).

use once_cell::sync::Lazy;
use regex::Regex;
use textmodel_core::{escape, ClassId, DataType, FeatureId, FeatureKind, Schema};

use crate::context::Context;

static BARE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z_]\w*$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Command,
    Label,
    Value,
    Reference,
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOption {
    /// Text inserted into the document.
    pub insert: String,
    /// Text shown in the completion list.
    pub display: String,
    pub extra: Option<String>,
    pub kind: OptionKind,
}

impl CompletionOption {
    fn new(insert: impl Into<String>, display: impl Into<String>, kind: OptionKind) -> Self {
        CompletionOption {
            insert: insert.into(),
            display: display.into(),
            extra: None,
            kind,
        }
    }

    fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }
}

/// A reference target offered for a reference feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceOption {
    pub identifier: String,
    pub type_name: String,
}

/// Source of reference targets, typically an index over the workspace.
pub trait ReferenceProvider {
    fn reference_options(&self, schema: &Schema, context: &Context) -> Vec<ReferenceOption>;
}

pub struct CompleterOptions<'a> {
    /// Block suggestions are only offered from version 1 on.
    pub protocol_version: u32,
    pub references: Option<&'a dyn ReferenceProvider>,
}

impl Default for CompleterOptions<'_> {
    fn default() -> Self {
        CompleterOptions {
            protocol_version: 1,
            references: None,
        }
    }
}

/// Compute the completion options for `context`.
pub fn complete(
    schema: &Schema,
    context: Option<&Context>,
    options: &CompleterOptions<'_>,
) -> Vec<CompletionOption> {
    let Some(context) = context else {
        return Vec::new();
    };
    let result = match context.element {
        None => root_options(schema, &context.prefix),
        Some(element) => {
            let class = context.model.class_of(element);
            if context.problem.is_some() {
                block_option(schema, class, context, options)
            } else if context.position.in_block {
                block_options(schema, class, context)
            } else {
                value_options(schema, class, context, options)
            }
        }
    };
    tracing::debug!(count = result.len(), prefix = %context.prefix, "completion options");
    result
}

fn root_options(schema: &Schema, prefix: &str) -> Vec<CompletionOption> {
    let mut classes: Vec<ClassId> = schema
        .root_classes()
        .filter(|c| schema.command_name(*c).starts_with(prefix))
        .collect();
    classes.sort_by(|a, b| schema.command_name(*a).cmp(schema.command_name(*b)));
    classes.dedup_by(|a, b| schema.command_name(*a) == schema.command_name(*b));
    classes.into_iter().map(|c| command_option(schema, c)).collect()
}

/// A command with its unlabeled argument placeholders.
fn command_option(schema: &Schema, class: ClassId) -> CompletionOption {
    let command = schema.command_name(class);
    let args: Vec<&str> = schema
        .unlabeled_arguments(class)
        .iter()
        .map(|f| schema.feature(*f).name.as_str())
        .collect();
    let display = if args.is_empty() {
        command.to_owned()
    } else {
        format!("{} {}", command, args.join(", "))
    };
    CompletionOption::new(command, display, OptionKind::Command)
        .with_extra(schema.class(class).name.clone())
}

fn label_option(schema: &Schema, feature: FeatureId) -> CompletionOption {
    let name = &schema.feature(feature).name;
    CompletionOption::new(format!("{}: ", name), format!("{}:", name), OptionKind::Label)
        .with_extra(schema.type_name(feature).to_owned())
}

/// Concrete classes accepted by a containment, sorted by command name.
fn child_commands(schema: &Schema, feature: FeatureId, prefix: &str) -> Vec<CompletionOption> {
    let Some(target) = schema.feature(feature).target() else {
        return Vec::new();
    };
    let mut classes: Vec<ClassId> = schema
        .concrete_subtypes(target)
        .iter()
        .copied()
        .filter(|c| schema.command_name(*c).starts_with(prefix))
        .collect();
    classes.sort_by(|a, b| schema.command_name(*a).cmp(schema.command_name(*b)));
    classes.into_iter().map(|c| command_option(schema, c)).collect()
}

// ── Block position ────────────────────────────────────────────────────

fn block_options(schema: &Schema, class: ClassId, context: &Context) -> Vec<CompletionOption> {
    let prefix = context.prefix.as_str();
    if let Some(feature) = context.feature.filter(|f| schema.feature(*f).is_containment()) {
        return child_commands(schema, feature, prefix);
    }

    let mut types: Vec<ClassId> = Vec::new();
    let mut labels: Vec<FeatureId> = Vec::new();
    for &feature in schema.containments(class) {
        let Some(target) = schema.feature(feature).target() else {
            continue;
        };
        let reachable = schema.concrete_subtypes(target);
        let needs_label = schema.feature(feature).labeled
            || reachable
                .iter()
                .any(|t| schema.containments_accepting(class, *t).len() > 1);
        if needs_label {
            if !labels.contains(&feature) {
                labels.push(feature);
            }
        } else {
            types.extend(reachable.iter().copied());
        }
    }

    types.retain(|c| schema.command_name(*c).starts_with(prefix));
    types.sort_by(|a, b| schema.command_name(*a).cmp(schema.command_name(*b)));
    types.dedup();
    labels.retain(|f| schema.feature(*f).name.starts_with(prefix));

    types
        .into_iter()
        .map(|c| command_option(schema, c))
        .chain(labels.into_iter().map(|f| label_option(schema, f)))
        .collect()
}

fn block_option(
    schema: &Schema,
    class: ClassId,
    context: &Context,
    options: &CompleterOptions<'_>,
) -> Vec<CompletionOption> {
    if options.protocol_version < 1
        || schema.containments(class).is_empty()
        || context.position.before_brace
    {
        return Vec::new();
    }
    let insert = format!(
        "{{\n{}{}\n{}}}",
        context.line_indent, context.indent, context.line_indent
    );
    vec![CompletionOption::new(insert, "{ }", OptionKind::Block).with_extra("new block")]
}

// ── Value position ────────────────────────────────────────────────────

fn value_options(
    schema: &Schema,
    class: ClassId,
    context: &Context,
    options: &CompleterOptions<'_>,
) -> Vec<CompletionOption> {
    let mut result = Vec::new();

    if let Some(feature) = context.feature {
        let f = schema.feature(feature);
        let type_name = schema.type_name(feature).to_owned();
        match f.kind {
            FeatureKind::Reference(_) => {
                if let Some(provider) = options.references {
                    for r in provider.reference_options(schema, context) {
                        result.push(
                            CompletionOption::new(
                                r.identifier.clone(),
                                r.identifier,
                                OptionKind::Reference,
                            )
                            .with_extra(r.type_name),
                        );
                    }
                }
            }
            FeatureKind::Containment(_) => {
                result.extend(child_commands(schema, feature, &context.prefix));
            }
            FeatureKind::Attribute(DataType::Enum(e)) => {
                for literal in &schema.enum_type(e).literals {
                    let insert = if BARE_WORD.is_match(literal) && literal != "true" && literal != "false" {
                        literal.clone()
                    } else {
                        format!("\"{}\"", escape(literal))
                    };
                    result.push(
                        CompletionOption::new(insert.clone(), insert, OptionKind::Value)
                            .with_extra(type_name.clone()),
                    );
                }
            }
            FeatureKind::Attribute(DataType::String) => {
                let option = if schema.is_unquoted_string(feature) {
                    CompletionOption::new(f.name.clone(), f.name.clone(), OptionKind::Value)
                } else {
                    CompletionOption::new("\"\"", "\"\"", OptionKind::Value)
                };
                result.push(option.with_extra(type_name));
            }
            FeatureKind::Attribute(data @ (DataType::Integer | DataType::Float)) => {
                let samples: Vec<String> = match &f.default {
                    Some(default) => vec![default.to_string()],
                    None if data == DataType::Integer => (0..=4).map(|n| n.to_string()).collect(),
                    None => (0..=4).map(|n| format!("{}.0", n)).collect(),
                };
                for s in samples {
                    result.push(
                        CompletionOption::new(s.clone(), s, OptionKind::Value)
                            .with_extra(type_name.clone()),
                    );
                }
            }
            FeatureKind::Attribute(DataType::Boolean) => {
                for b in ["true", "false"] {
                    result.push(
                        CompletionOption::new(b, b, OptionKind::Value).with_extra(type_name.clone()),
                    );
                }
            }
            FeatureKind::Attribute(DataType::Any) => {}
        }
    }

    if !context.position.after_label && !context.position.in_array {
        let element = context.element;
        for &feature in schema.labeled_arguments(class) {
            let set = element.is_some_and(|e| context.model.is_set(e, feature));
            if !set && schema.feature(feature).name.starts_with(context.prefix.as_str()) {
                result.push(label_option(schema, feature));
            }
        }
    }
    result
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
