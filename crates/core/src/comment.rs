//! Hooks deciding what happens to comments and annotations found in a
//! document.

use crate::model::{ElementId, Model, Value};
use crate::parser::{Comment, CommentKind};
use crate::schema::{DataType, Schema};

pub trait CommentHandler {
    /// Take a comment. `element` is `None` for unassociated comments.
    /// Returning `false` turns the comment into a problem.
    fn comment(
        &mut self,
        schema: &Schema,
        model: &mut Model,
        element: Option<ElementId>,
        comment: &Comment,
    ) -> bool;

    fn annotation(
        &mut self,
        schema: &Schema,
        model: &mut Model,
        element: ElementId,
        text: &str,
    ) -> bool;
}

/// Stores comments and annotations in string attributes of the element.
#[derive(Debug, Clone)]
pub struct AttributeCommentHandler {
    pub comment_attribute: String,
    pub annotation_attribute: String,
}

impl Default for AttributeCommentHandler {
    fn default() -> Self {
        AttributeCommentHandler {
            comment_attribute: "comment".to_owned(),
            annotation_attribute: "annotation".to_owned(),
        }
    }
}

fn append_text(schema: &Schema, model: &mut Model, element: ElementId, name: &str, text: &str) -> bool {
    let Some(feature) = schema.feature_by_name(model.class_of(element), name) else {
        return false;
    };
    if schema.feature(feature).data_type() != Some(DataType::String) {
        return false;
    }
    let joined = match model.values(element, feature).first().and_then(Value::as_str) {
        Some(existing) => format!("{}\n{}", existing, text),
        None => text.to_owned(),
    };
    model.set_value(element, feature, Value::String(joined));
    true
}

impl CommentHandler for AttributeCommentHandler {
    fn comment(
        &mut self,
        schema: &Schema,
        model: &mut Model,
        element: Option<ElementId>,
        comment: &Comment,
    ) -> bool {
        match (element, comment.kind) {
            (Some(e), CommentKind::Above | CommentKind::Eol) => {
                append_text(schema, model, e, &self.comment_attribute, &comment.text)
            }
            _ => false,
        }
    }

    fn annotation(
        &mut self,
        schema: &Schema,
        model: &mut Model,
        element: ElementId,
        text: &str,
    ) -> bool {
        append_text(schema, model, element, &self.annotation_attribute, text)
    }
}
