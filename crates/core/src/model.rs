//! Arena-backed element graph produced by instantiation.

use crate::lexer::ExactDecimal;
use crate::schema::{ClassId, FeatureId, Schema};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

impl ElementId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Decimal(ExactDecimal),
    Boolean(bool),
    /// Enum literal name.
    Enum(String),
    /// Opaque content of a `<...>` or `<%...%>` literal.
    Generic(String),
    /// Unresolved reference, holding the target identifier.
    Proxy(String),
    Element(ElementId),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Enum(s) | Value::Generic(s) | Value::Proxy(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<ElementId> {
        match self {
            Value::Element(e) => Some(*e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    pub class: ClassId,
    values: BTreeMap<FeatureId, Vec<Value>>,
    container: Option<(ElementId, FeatureId)>,
    /// Source line of the command that created the element.
    pub line: Option<u32>,
}

/// A reference that could not be resolved during instantiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedRef {
    pub element: ElementId,
    pub feature: String,
    pub target: String,
}

#[derive(Debug, Default, Clone)]
pub struct Model {
    elements: Vec<Element>,
}

impl Model {
    pub fn new() -> Self {
        Model::default()
    }

    pub fn create(&mut self, class: ClassId, line: Option<u32>) -> ElementId {
        self.elements.push(Element {
            class,
            values: BTreeMap::new(),
            container: None,
            line,
        });
        ElementId(self.elements.len() - 1)
    }

    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.0]
    }

    pub fn class_of(&self, id: ElementId) -> ClassId {
        self.elements[id.0].class
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ElementId> + '_ {
        (0..self.elements.len()).map(ElementId)
    }

    pub fn values(&self, id: ElementId, feature: FeatureId) -> &[Value] {
        self.elements[id.0]
            .values
            .get(&feature)
            .map_or(&[], Vec::as_slice)
    }

    /// Values of the feature called `name`, empty when the class has none.
    pub fn values_named(&self, schema: &Schema, id: ElementId, name: &str) -> &[Value] {
        match schema.feature_by_name(self.class_of(id), name) {
            Some(f) => self.values(id, f),
            None => &[],
        }
    }

    pub fn is_set(&self, id: ElementId, feature: FeatureId) -> bool {
        !self.values(id, feature).is_empty()
    }

    pub fn add_value(&mut self, id: ElementId, feature: FeatureId, value: Value) {
        self.elements[id.0]
            .values
            .entry(feature)
            .or_default()
            .push(value);
    }

    pub fn set_value(&mut self, id: ElementId, feature: FeatureId, value: Value) {
        self.elements[id.0].values.insert(feature, vec![value]);
    }

    /// Place `child` in `feature` of `parent`. Returns `false` and leaves the
    /// model untouched when the child already has a container.
    pub fn attach(&mut self, parent: ElementId, feature: FeatureId, child: ElementId) -> bool {
        if self.elements[child.0].container.is_some() || parent == child {
            return false;
        }
        self.elements[child.0].container = Some((parent, feature));
        self.add_value(parent, feature, Value::Element(child));
        true
    }

    pub fn container(&self, id: ElementId) -> Option<(ElementId, FeatureId)> {
        self.elements[id.0].container
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.container(id).map(|(p, _)| p)
    }

    pub fn children(&self, id: ElementId, feature: FeatureId) -> impl Iterator<Item = ElementId> + '_ {
        self.values(id, feature).iter().filter_map(Value::as_element)
    }

    /// First contained child, scanning containments in schema order.
    pub fn first_child(&self, schema: &Schema, id: ElementId) -> Option<ElementId> {
        schema
            .containments(self.class_of(id))
            .iter()
            .find_map(|f| self.children(id, *f).next())
    }
}
