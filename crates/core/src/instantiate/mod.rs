//! Turns command text into model elements.
//!
//! The [`Instantiator`] drives the parser with a visitor that resolves each
//! command word against the class of its container, and on ascent builds
//! the element: arguments are bound to features, children are placed into
//! containments, and references are left as proxies for a later resolution
//! step.

use crate::comment::CommentHandler;
use crate::error::Problem;
use crate::lexer::{self, Token};
use crate::model::{ElementId, Model, UnresolvedRef, Value};
use crate::parser::{self, Comment, Statement, Visitor};
use crate::schema::{ClassId, DataType, Schema};

mod arguments;
mod children;

/// Per-call settings for [`Instantiator::instantiate`].
#[derive(Default)]
pub struct InstantiateOptions<'o> {
    pub file_name: Option<String>,
    pub fragment_ref: Option<String>,
    /// Called once for every command line, for progress reporting.
    pub on_progress: Option<&'o mut dyn FnMut()>,
    pub comment_handler: Option<&'o mut dyn CommentHandler>,
}

/// Result of one instantiation call.
#[derive(Debug, Default, Clone)]
pub struct Instantiation {
    pub roots: Vec<ElementId>,
    /// Every element created, in creation order.
    pub elements: Vec<ElementId>,
    /// Syntax and semantic problems, ordered by line.
    pub problems: Vec<Problem>,
    pub unresolved: Vec<UnresolvedRef>,
}

pub struct Instantiator<'s> {
    schema: &'s Schema,
}

impl<'s> Instantiator<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Instantiator { schema }
    }

    pub fn instantiate(
        &self,
        text: &str,
        model: &mut Model,
        options: InstantiateOptions<'_>,
    ) -> Instantiation {
        let tokens = lexer::tokenize_with(text, self.schema.reference_regex(), options.on_progress);

        let mut builder = Builder {
            schema: self.schema,
            model,
            handler: options.comment_handler,
            file_name: options.file_name,
            fragment_ref: options.fragment_ref,
            out: Instantiation::default(),
        };
        let syntax = parser::parse(&tokens, &mut builder);

        let Builder { mut out, file_name, .. } = builder;
        out.problems.extend(syntax);
        // stable, so problems on one line keep their discovery order
        out.problems.sort_by_key(|p| p.line);
        out.problems = out
            .problems
            .into_iter()
            .map(|p| p.in_file(file_name.as_deref()))
            .collect();

        tracing::debug!(
            file = file_name.as_deref().unwrap_or("<none>"),
            roots = out.roots.len(),
            elements = out.elements.len(),
            problems = out.problems.len(),
            unresolved = out.unresolved.len(),
            "instantiated"
        );
        out
    }
}

/// Parser visitor building elements into the model.
struct Builder<'a, 'h> {
    schema: &'a Schema,
    model: &'a mut Model,
    handler: Option<&'h mut dyn CommentHandler>,
    file_name: Option<String>,
    fragment_ref: Option<String>,
    out: Instantiation,
}

impl Builder<'_, '_> {
    fn problem(&mut self, message: impl Into<String>, line: u32) {
        self.out.problems.push(Problem::new(message, line));
    }

    fn class_name(&self, class: ClassId) -> &str {
        &self.schema.class(class).name
    }

    /// Names of the concrete classes a feature target accepts.
    fn expected_classes(&self, target: ClassId) -> String {
        self.schema
            .concrete_subtypes(target)
            .iter()
            .map(|c| self.class_name(*c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn set_location(&mut self, element: ElementId, line: u32) {
        let class = self.model.class_of(element);
        let slots = [
            (self.schema.line_number_attribute(), Some(Value::Integer(i64::from(line)))),
            (
                self.schema.file_name_attribute(),
                self.file_name.clone().map(Value::String),
            ),
            (
                self.schema.fragment_ref_attribute(),
                self.fragment_ref.clone().map(Value::String),
            ),
        ];
        for (attribute, value) in slots {
            let (Some(name), Some(value)) = (attribute, value) else {
                continue;
            };
            let Some(feature) = self.schema.feature_by_name(class, name) else {
                continue;
            };
            let fits = match (self.schema.feature(feature).data_type(), &value) {
                (Some(DataType::Any), _) => true,
                (Some(DataType::Integer), Value::Integer(_)) => true,
                (Some(DataType::String), Value::String(_)) => true,
                _ => false,
            };
            if fits {
                self.model.set_value(element, feature, value);
            }
        }
    }

    fn dispatch_comments(
        &mut self,
        element: ElementId,
        comments: &[Comment],
        annotation: Option<&str>,
        line: u32,
    ) {
        for comment in comments {
            let accepted = match self.handler.as_deref_mut() {
                Some(h) => h.comment(self.schema, self.model, Some(element), comment),
                None => true,
            };
            if !accepted {
                self.problem("Element can not take this comment", comment.line);
            }
        }
        if let Some(text) = annotation {
            let accepted = match self.handler.as_deref_mut() {
                Some(h) => h.annotation(self.schema, self.model, element, text),
                None => false,
            };
            if !accepted {
                self.problem("Annotation not allowed", line);
            }
        }
    }
}

impl Visitor for Builder<'_, '_> {
    type Scope = Option<ClassId>;
    type Output = ElementId;

    fn descend(&mut self, command: &Token, enclosing: Option<&Option<ClassId>>) -> Option<ClassId> {
        // an unresolvable container falls back to root level lookup
        self.schema
            .class_for_command(&command.text(), enclosing.copied().flatten())
    }

    fn ascend(&mut self, statement: Statement<ElementId>, scope: Option<ClassId>) -> Option<ElementId> {
        let name = statement.command.text();
        let line = statement.command.line;

        let Some(class) = scope else {
            let message = if !self.schema.has_command(&name) {
                format!("Unknown command '{}'", name)
            } else if statement.is_root {
                format!("Command '{}' cannot be used on root level", name)
            } else {
                format!("Command '{}' cannot be used in this context", name)
            };
            self.problem(message, line);
            return None;
        };
        if self.schema.class(class).is_abstract {
            let message = format!(
                "Command '{}' names abstract class '{}'",
                name,
                self.class_name(class)
            );
            self.problem(message, line);
            return None;
        }

        let element = self.model.create(class, Some(line));
        self.out.elements.push(element);
        if statement.is_root {
            self.out.roots.push(element);
        }

        self.bind_arguments(element, &statement.arguments, line);
        self.bind_children(element, statement.elements);
        self.set_location(element, line);
        self.dispatch_comments(
            element,
            &statement.comments,
            statement.annotation.as_deref(),
            line,
        );
        tracing::trace!(command = %name, line, "element built");
        Some(element)
    }

    fn unassociated_comment(&mut self, comment: Comment) {
        if let Some(h) = self.handler.as_deref_mut() {
            if !h.comment(self.schema, self.model, None, &comment) {
                self.problem("Unassociated comment not allowed", comment.line);
            }
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::AttributeCommentHandler;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::from_value(json!({
            "enable_generics": true,
            "line_number_attribute": "line",
            "file_name_attribute": "file",
            "enums": [{ "name": "Color", "literals": ["red", "green", "dark blue"] }],
            "classes": [
                { "name": "Node", "unlabeled": ["name"], "features": [
                    { "name": "name", "kind": "string" },
                    { "name": "count", "kind": "integer" },
                    { "name": "ratio", "kind": "float" },
                    { "name": "flag", "kind": "boolean" },
                    { "name": "color", "kind": "enum", "target": "Color" },
                    { "name": "anything", "kind": "any" },
                    { "name": "target", "kind": "reference", "target": "Node" },
                    { "name": "line", "kind": "integer" },
                    { "name": "file", "kind": "string" },
                    { "name": "comment", "kind": "string" },
                    { "name": "children", "kind": "containment", "target": "Node", "many": true },
                    { "name": "single", "kind": "containment", "target": "Other" }
                ] },
                { "name": "Other", "root": false }
            ]
        }))
        .unwrap()
    }

    fn run(schema: &Schema, text: &str) -> (Model, Instantiation) {
        let mut model = Model::new();
        let out = Instantiator::new(schema).instantiate(
            text,
            &mut model,
            InstantiateOptions {
                file_name: Some("doc.txt".to_owned()),
                ..Default::default()
            },
        );
        (model, out)
    }

    fn messages(out: &Instantiation) -> Vec<&str> {
        out.problems.iter().map(|p| p.message.as_str()).collect()
    }

    #[test]
    fn binds_typed_arguments() {
        let s = schema();
        let (m, out) = run(
            &s,
            "Node n1, count: 3, ratio: 2, flag: true, color: \"dark blue\", anything: <x>, target: /a/b\n",
        );
        assert!(out.problems.is_empty(), "{:?}", out.problems);
        let e = out.roots[0];
        assert_eq!(m.values_named(&s, e, "name"), &[Value::String("n1".into())]);
        assert_eq!(m.values_named(&s, e, "ratio"), &[Value::Float(2.0)]);
        assert_eq!(m.values_named(&s, e, "color"), &[Value::Enum("dark blue".into())]);
        assert_eq!(m.values_named(&s, e, "anything"), &[Value::Generic("x".into())]);
        assert_eq!(m.values_named(&s, e, "target"), &[Value::Proxy("/a/b".into())]);
        assert_eq!(m.values_named(&s, e, "line"), &[Value::Integer(1)]);
        assert_eq!(m.values_named(&s, e, "file"), &[Value::String("doc.txt".into())]);
        assert_eq!(
            out.unresolved,
            vec![UnresolvedRef {
                element: e,
                feature: "target".into(),
                target: "/a/b".into()
            }]
        );
    }

    #[test]
    fn argument_problems() {
        let s = schema();
        let (_, out) = run(
            &s,
            "Node a, b\nNode count: 1.5\nNode color: blue\nNode bogus: 1\nNode count: 1, count: 2\nNode children: 1\nNode count: [1, 2]\n",
        );
        assert_eq!(
            messages(&out),
            vec![
                "Unexpected unlabeled argument, 1 unlabeled arguments expected",
                "Argument 'count' can not take a float, expected integer",
                "Argument 'color' can not take value blue, expected red, green, dark blue",
                "Unknown argument 'bogus'",
                "Argument 'count' already defined",
                "Argument 'children' can only take child elements",
                "Argument 'count' can take only one value",
            ]
        );
        assert!(out.problems.iter().all(|p| p.file.as_deref() == Some("doc.txt")));
        assert_eq!(out.roots.len(), 7);
    }

    #[test]
    fn command_problems() {
        let s = schema();
        let (_, out) = run(&s, "Other\nMissing\nNode {\n  Bogus\n}\n");
        assert_eq!(
            messages(&out),
            vec![
                "Command 'Other' cannot be used on root level",
                "Unknown command 'Missing'",
                "Unknown command 'Bogus'",
            ]
        );
    }

    #[test]
    fn single_containment_keeps_first_child() {
        let s = schema();
        let (m, out) = run(&s, "Node {\n  Other\n  Other\n}\n");
        assert_eq!(out.problems.len(), 1);
        assert_eq!(out.problems[0].message, "Only one child allowed in role 'single'");
        assert_eq!(out.problems[0].line, 3);
        let single = s.feature_by_name(s.class_by_name("Node").unwrap(), "single").unwrap();
        let kept: Vec<_> = m.children(out.roots[0], single).collect();
        assert_eq!(kept, vec![out.elements[0]]);
    }

    #[test]
    fn comments_go_to_handler() {
        let s = schema();
        let mut model = Model::new();
        let mut handler = AttributeCommentHandler::default();
        let out = Instantiator::new(&s).instantiate(
            "# first\n# second\nNode # eol\n@anno\nNode\n# dangling\n",
            &mut model,
            InstantiateOptions {
                comment_handler: Some(&mut handler),
                ..Default::default()
            },
        );
        assert_eq!(
            messages(&out),
            vec!["Annotation not allowed", "Unassociated comment not allowed"]
        );
        assert_eq!(
            model.values_named(&s, out.roots[0], "comment"),
            &[Value::String(" first\n second\n eol".into())]
        );
    }

    #[test]
    fn generics_need_language_option() {
        let s = Schema::from_value(json!({
            "classes": [{ "name": "A", "features": [{ "name": "v", "kind": "any" }] }]
        }))
        .unwrap();
        let (_, out) = run(&s, "A v: <%x%>\n");
        assert_eq!(messages(&out), vec!["Generic value not allowed"]);
    }

    #[test]
    fn role_problems() {
        let s = schema();
        let (_, out) = run(&s, "Node {\n  single:\n    Node\n  count:\n    Other\n}\n");
        assert_eq!(
            messages(&out),
            vec![
                "Role 'single' can not take a Node, expected Other",
                "Role 'count' can not take child elements",
            ]
        );
        assert_eq!(out.problems[0].line, 3);
        assert_eq!(out.problems[1].line, 4);
    }

    #[test]
    fn elements_in_creation_order() {
        let s = schema();
        let (m, out) = run(&s, "Node a {\n  Node b\n  Node c {\n    Other\n  }\n}\nNode d\n");
        assert!(out.problems.is_empty(), "{:?}", out.problems);
        let names: Vec<String> = out
            .elements
            .iter()
            .map(|e| match m.values_named(&s, *e, "name").first() {
                Some(Value::String(n)) => n.clone(),
                _ => s.class(m.class_of(*e)).name.clone(),
            })
            .collect();
        assert_eq!(names, vec!["b", "Other", "c", "a", "d"]);
        assert_eq!(out.roots, vec![out.elements[3], out.elements[4]]);
    }

    #[test]
    fn handler_may_be_dropped_before_model() {
        let s = schema();
        let mut model = Model::new();
        for text in ["# one\nNode\n", "# two\nNode\n"] {
            let mut handler = AttributeCommentHandler::default();
            let out = Instantiator::new(&s).instantiate(
                text,
                &mut model,
                InstantiateOptions {
                    comment_handler: Some(&mut handler),
                    ..Default::default()
                },
            );
            assert!(out.problems.is_empty(), "{:?}", out.problems);
        }
        assert_eq!(model.len(), 2);
    }
}
