use super::Builder;
use crate::model::ElementId;
use crate::parser::BlockElement;
use crate::schema::FeatureId;

impl Builder<'_, '_> {
    pub(super) fn bind_children(&mut self, element: ElementId, blocks: Vec<BlockElement<ElementId>>) {
        let class = self.model.class_of(element);
        for block in blocks {
            match block {
                BlockElement::Child(child) => self.attach_unlabeled(element, child),
                BlockElement::Labeled { role, children, .. } => {
                    let name = role.text();
                    let feature = match self.schema.feature_by_name(class, &name) {
                        None => {
                            self.problem(format!("Unknown child role '{}'", name), role.line);
                            continue;
                        }
                        Some(f) if !self.schema.feature(f).is_containment() => {
                            let message = format!("Role '{}' can not take child elements", name);
                            self.problem(message, role.line);
                            continue;
                        }
                        Some(f) => f,
                    };
                    for child in children {
                        self.attach_in_role(element, feature, child);
                    }
                }
            }
        }
    }

    /// Place a child given without a role into the one containment of the
    /// parent that accepts its class.
    fn attach_unlabeled(&mut self, element: ElementId, child: ElementId) {
        let class = self.model.class_of(element);
        let child_class = self.model.class_of(child);
        let line = self.child_line(child);
        match self.schema.containments_accepting(class, child_class).as_slice() {
            [] => {
                let message = format!(
                    "Command '{}' can not be contained here",
                    self.schema.command_name(child_class)
                );
                self.problem(message, line);
            }
            [feature] if !self.schema.feature(*feature).labeled => {
                self.attach_in_role(element, *feature, child);
            }
            _ => self.problem("Role of element is ambiguous, use a role label", line),
        }
    }

    fn attach_in_role(&mut self, element: ElementId, feature: FeatureId, child: ElementId) {
        let f = self.schema.feature(feature);
        let child_class = self.model.class_of(child);
        let line = self.child_line(child);

        let Some(target) = f.target() else { return };
        if !self.schema.conforms(child_class, target) {
            let message = format!(
                "Role '{}' can not take a {}, expected {}",
                f.name,
                self.class_name(child_class),
                self.expected_classes(target)
            );
            self.problem(message, line);
            return;
        }
        if !f.many && self.model.is_set(element, feature) {
            self.problem(format!("Only one child allowed in role '{}'", f.name), line);
            return;
        }
        if !self.model.attach(element, feature, child) {
            self.problem("Element is already contained elsewhere", line);
        }
    }

    fn child_line(&self, child: ElementId) -> u32 {
        self.model.element(child).line.unwrap_or(0)
    }
}
