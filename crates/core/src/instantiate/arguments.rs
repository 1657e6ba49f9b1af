use super::Builder;
use crate::lexer::{Token, TokenKind, TokenValue};
use crate::model::{ElementId, UnresolvedRef, Value};
use crate::parser::{ArgValue, Argument};
use crate::schema::{DataType, FeatureId, FeatureKind};
use std::collections::HashSet;

/// Token kinds a feature accepts, generics aside.
fn expected_kinds(kind: FeatureKind) -> &'static [TokenKind] {
    use TokenKind::*;
    match kind {
        FeatureKind::Reference(_) => &[Reference, Identifier],
        FeatureKind::Attribute(DataType::Enum(_)) => &[Identifier, String],
        FeatureKind::Attribute(DataType::String) => &[String, Identifier, Integer, Float],
        FeatureKind::Attribute(DataType::Integer) => &[Integer],
        FeatureKind::Attribute(DataType::Float) => &[Float, Integer],
        FeatureKind::Attribute(DataType::Boolean) => &[Boolean],
        FeatureKind::Attribute(DataType::Any) => &[String, Identifier, Integer, Float, Boolean],
        FeatureKind::Containment(_) => &[],
    }
}

fn literal_value(token: &Token) -> Option<Value> {
    Some(match &token.value {
        TokenValue::Text(s) => Value::String(s.clone()),
        TokenValue::Integer(n) => Value::Integer(*n),
        TokenValue::Float(x) => Value::Float(*x),
        TokenValue::Decimal(d) => Value::Decimal(d.clone()),
        TokenValue::Boolean(b) => Value::Boolean(*b),
        TokenValue::None | TokenValue::Punct(_) => return None,
    })
}

impl Builder<'_, '_> {
    pub(super) fn bind_arguments(&mut self, element: ElementId, arguments: &[Argument], line: u32) {
        let class = self.model.class_of(element);
        let unlabeled = self.schema.unlabeled_arguments(class);
        let mut defined: HashSet<FeatureId> = HashSet::new();
        let mut position = 0;

        for arg in arguments {
            let values: &[Token] = match &arg.value {
                ArgValue::Single(t) => std::slice::from_ref(t),
                ArgValue::List(ts) => ts,
            };
            let arg_line = arg
                .label
                .as_ref()
                .or(values.first())
                .map_or(line, |t| t.line);

            let feature = match &arg.label {
                None => {
                    let Some(f) = unlabeled.get(position).copied() else {
                        let message = format!(
                            "Unexpected unlabeled argument, {} unlabeled arguments expected",
                            unlabeled.len()
                        );
                        self.problem(message, arg_line);
                        continue;
                    };
                    position += 1;
                    f
                }
                Some(label) => {
                    let name = label.text();
                    match self.schema.feature_by_name(class, &name) {
                        None => {
                            self.problem(format!("Unknown argument '{}'", name), arg_line);
                            continue;
                        }
                        Some(f) if self.schema.feature(f).is_containment() => {
                            let message =
                                format!("Argument '{}' can only take child elements", name);
                            self.problem(message, arg_line);
                            continue;
                        }
                        Some(f) => f,
                    }
                }
            };

            let name = &self.schema.feature(feature).name;
            if !defined.insert(feature) {
                self.problem(format!("Argument '{}' already defined", name), arg_line);
                continue;
            }
            if values.len() > 1 && !self.schema.feature(feature).many {
                self.problem(format!("Argument '{}' can take only one value", name), arg_line);
                continue;
            }
            for token in values {
                self.bind_value(element, feature, token);
            }
        }
    }

    fn bind_value(&mut self, element: ElementId, feature: FeatureId, token: &Token) {
        let f = self.schema.feature(feature);

        if token.kind == TokenKind::Generic {
            if self.schema.generics_enabled() {
                self.model
                    .add_value(element, feature, Value::Generic(token.text()));
            } else {
                self.problem("Generic value not allowed", token.line);
            }
            return;
        }

        let expected = expected_kinds(f.kind);
        if !expected.contains(&token.kind) {
            let list = expected
                .iter()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let message = format!(
                "Argument '{}' can not take a {}, expected {}",
                f.name, token.kind, list
            );
            self.problem(message, token.line);
            return;
        }

        let value = match f.kind {
            FeatureKind::Reference(_) => {
                let target = token.text();
                self.out.unresolved.push(UnresolvedRef {
                    element,
                    feature: f.name.clone(),
                    target: target.clone(),
                });
                Value::Proxy(target)
            }
            FeatureKind::Attribute(DataType::Enum(e)) => {
                let literal = token.text();
                let literals = &self.schema.enum_type(e).literals;
                if !literals.contains(&literal) {
                    let message = format!(
                        "Argument '{}' can not take value {}, expected {}",
                        f.name,
                        literal,
                        literals.join(", ")
                    );
                    self.problem(message, token.line);
                    return;
                }
                Value::Enum(literal)
            }
            FeatureKind::Attribute(DataType::String) => Value::String(token.text()),
            FeatureKind::Attribute(DataType::Float) => match token.value {
                TokenValue::Integer(n) => Value::Float(n as f64),
                _ => match literal_value(token) {
                    Some(v) => v,
                    None => return,
                },
            },
            FeatureKind::Attribute(_) => match literal_value(token) {
                Some(v) => v,
                None => return,
            },
            FeatureKind::Containment(_) => return,
        };
        self.model.add_value(element, feature, value);
    }
}
