//! Metamodel view used by the parser, the instantiator and the editor layer.
//!
//! A [`Schema`] is built once from a [`SchemaDef`] and never changes
//! afterwards. Every derived table (inherited features, argument order,
//! concrete subtypes, command maps per containing class) is computed during
//! construction, so lookups are plain reads and the schema can be shared
//! freely between threads.

mod def;

pub use def::{
    ClassDef, EnumDef, FeatureDef, FeatureKindDef, SchemaDef, DEFAULT_REFERENCE_PATTERN,
};

use crate::error::SchemaError;
use crate::lexer;
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    String,
    Integer,
    Float,
    Boolean,
    /// Untyped attribute accepting any literal.
    Any,
    Enum(EnumId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Attribute(DataType),
    Reference(ClassId),
    Containment(ClassId),
}

#[derive(Debug, Clone)]
pub struct Feature {
    pub name: String,
    pub owner: ClassId,
    pub kind: FeatureKind,
    pub many: bool,
    pub default: Option<serde_json::Value>,
    pub unquoted: bool,
    pub labeled: bool,
}

impl Feature {
    pub fn is_containment(&self) -> bool {
        matches!(self.kind, FeatureKind::Containment(_))
    }

    /// Target class of a reference or containment.
    pub fn target(&self) -> Option<ClassId> {
        match self.kind {
            FeatureKind::Reference(c) | FeatureKind::Containment(c) => Some(c),
            FeatureKind::Attribute(_) => None,
        }
    }

    pub fn data_type(&self) -> Option<DataType> {
        match self.kind {
            FeatureKind::Attribute(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnumType {
    pub name: String,
    pub literals: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Class {
    pub name: String,
    pub command: String,
    pub is_abstract: bool,
    pub root: bool,
    supertypes: Vec<ClassId>,
    /// Self plus every transitive supertype.
    ancestors: BTreeSet<ClassId>,
    features: Vec<FeatureId>,
    containments: Vec<FeatureId>,
    non_containments: Vec<FeatureId>,
    unlabeled: Vec<FeatureId>,
    labeled: Vec<FeatureId>,
    /// Self plus every transitive subtype, abstract ones included.
    subtypes: Vec<ClassId>,
    concrete: Vec<ClassId>,
    backward_reference: Option<String>,
    commands: HashMap<String, ClassId>,
}

impl Class {
    pub fn supertypes(&self) -> &[ClassId] {
        &self.supertypes
    }
}

#[derive(Debug)]
pub struct Schema {
    classes: Vec<Class>,
    features: Vec<Feature>,
    enums: Vec<EnumType>,
    class_index: HashMap<String, ClassId>,
    root_commands: HashMap<String, ClassId>,
    all_commands: HashSet<String>,
    reference: Regex,
    reference_pattern: String,
    generics: bool,
    line_number_attribute: Option<String>,
    file_name_attribute: Option<String>,
    fragment_ref_attribute: Option<String>,
}

impl Schema {
    pub fn from_json(json: &str) -> Result<Schema, SchemaError> {
        let def: SchemaDef = serde_json::from_str(json)?;
        Schema::from_def(def)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Schema, SchemaError> {
        let def: SchemaDef = serde_json::from_value(value)?;
        Schema::from_def(def)
    }

    pub fn from_def(def: SchemaDef) -> Result<Schema, SchemaError> {
        let reference_pattern = def
            .reference_pattern
            .clone()
            .unwrap_or_else(|| DEFAULT_REFERENCE_PATTERN.to_owned());
        let reference = lexer::reference_regex(&reference_pattern)?;

        let mut enums = Vec::new();
        let mut enum_index = HashMap::new();
        for e in &def.enums {
            if enum_index
                .insert(e.name.clone(), EnumId(enums.len()))
                .is_some()
            {
                return Err(SchemaError::DuplicateEnum(e.name.clone()));
            }
            enums.push(EnumType {
                name: e.name.clone(),
                literals: e.literals.clone(),
            });
        }

        let mut class_index = HashMap::new();
        for (i, c) in def.classes.iter().enumerate() {
            if class_index.insert(c.name.clone(), ClassId(i)).is_some() {
                return Err(SchemaError::DuplicateClass(c.name.clone()));
            }
        }
        let lookup_class = |name: &str, referenced_by: &str| {
            class_index
                .get(name)
                .copied()
                .ok_or_else(|| SchemaError::UnknownClass {
                    name: name.to_owned(),
                    referenced_by: referenced_by.to_owned(),
                })
        };

        let supertypes = def
            .classes
            .iter()
            .map(|c| {
                c.supertypes
                    .iter()
                    .map(|s| lookup_class(s, &c.name))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        let order = inheritance_order(&def.classes, &supertypes)?;

        // Own features, in definition order.
        let mut features: Vec<Feature> = Vec::new();
        let mut own: Vec<Vec<FeatureId>> = vec![Vec::new(); def.classes.len()];
        for (i, c) in def.classes.iter().enumerate() {
            for f in &c.features {
                let kind = feature_kind(c, f, &lookup_class, &enum_index)?;
                own[i].push(FeatureId(features.len()));
                features.push(Feature {
                    name: f.name.clone(),
                    owner: ClassId(i),
                    kind,
                    many: f.many,
                    default: f.default.clone(),
                    unquoted: f.unquoted,
                    labeled: f.labeled,
                });
            }
        }

        let n = def.classes.len();
        let mut ancestors: Vec<BTreeSet<ClassId>> = vec![BTreeSet::new(); n];
        let mut all_features: Vec<Vec<FeatureId>> = vec![Vec::new(); n];
        let mut unlabeled: Vec<Vec<FeatureId>> = vec![Vec::new(); n];
        let mut backward: Vec<Option<String>> = vec![None; n];

        for &i in &order {
            let c = &def.classes[i];
            let mut anc = BTreeSet::from([ClassId(i)]);
            let mut feats: Vec<FeatureId> = Vec::new();
            for s in &supertypes[i] {
                anc.extend(ancestors[s.0].iter().copied());
                for f in &all_features[s.0] {
                    if !feats.contains(f) {
                        feats.push(*f);
                    }
                }
            }
            feats.extend(own[i].iter().copied());

            let mut names = HashSet::new();
            for f in &feats {
                if !names.insert(features[f.0].name.as_str()) {
                    return Err(SchemaError::DuplicateFeature {
                        class: c.name.clone(),
                        feature: features[f.0].name.clone(),
                    });
                }
            }

            let find = |name: &str| feats.iter().copied().find(|f| features[f.0].name == name);
            unlabeled[i] = match &c.unlabeled {
                Some(list) => list
                    .iter()
                    .map(|name| {
                        find(name)
                            .filter(|f| !features[f.0].is_containment())
                            .ok_or_else(|| SchemaError::UnknownArgument {
                                class: c.name.clone(),
                                feature: name.clone(),
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                None => supertypes[i]
                    .iter()
                    .map(|s| &unlabeled[s.0])
                    .find(|u| !u.is_empty())
                    .cloned()
                    .unwrap_or_default(),
            };
            backward[i] = match &c.backward_reference {
                Some(name) => {
                    if find(name).is_none() {
                        return Err(SchemaError::UnknownBackwardReference {
                            class: c.name.clone(),
                            feature: name.clone(),
                        });
                    }
                    Some(name.clone())
                }
                None => supertypes[i].iter().find_map(|s| backward[s.0].clone()),
            };

            ancestors[i] = anc;
            all_features[i] = feats;
        }

        let mut classes: Vec<Class> = Vec::with_capacity(n);
        for (i, c) in def.classes.iter().enumerate() {
            let feats = std::mem::take(&mut all_features[i]);
            let (containments, non_containments): (Vec<FeatureId>, Vec<FeatureId>) = feats
                .iter()
                .copied()
                .partition(|f| features[f.0].is_containment());
            let labeled = non_containments
                .iter()
                .copied()
                .filter(|f| !unlabeled[i].contains(f))
                .collect();
            let subtypes: Vec<ClassId> = (0..n)
                .filter(|d| ancestors[*d].contains(&ClassId(i)))
                .map(ClassId)
                .collect();
            let concrete = subtypes
                .iter()
                .copied()
                .filter(|d| !def.classes[d.0].is_abstract)
                .collect();
            classes.push(Class {
                name: c.name.clone(),
                command: c
                    .command
                    .clone()
                    .unwrap_or_else(|| short_name(&c.name).to_owned()),
                is_abstract: c.is_abstract,
                root: c.root,
                supertypes: supertypes[i].clone(),
                ancestors: ancestors[i].clone(),
                features: feats,
                containments,
                non_containments,
                unlabeled: std::mem::take(&mut unlabeled[i]),
                labeled,
                subtypes,
                concrete,
                backward_reference: backward[i].take(),
                commands: HashMap::new(),
            });
        }

        let mut root_commands = HashMap::new();
        for (i, c) in classes.iter().enumerate() {
            if c.root {
                insert_command(&mut root_commands, &c.command, ClassId(i), "<root>")?;
            }
        }
        for i in 0..n {
            let mut commands = HashMap::new();
            for f in &classes[i].containments {
                if let Some(target) = features[f.0].target() {
                    for s in &classes[target.0].subtypes {
                        insert_command(&mut commands, &classes[s.0].command, *s, &classes[i].name)?;
                    }
                }
            }
            classes[i].commands = commands;
        }
        let all_commands = classes.iter().map(|c| c.command.clone()).collect();

        tracing::debug!(
            classes = classes.len(),
            features = features.len(),
            enums = enums.len(),
            "schema built"
        );

        Ok(Schema {
            classes,
            features,
            enums,
            class_index,
            root_commands,
            all_commands,
            reference,
            reference_pattern,
            generics: def.enable_generics,
            line_number_attribute: def.line_number_attribute,
            file_name_attribute: def.file_name_attribute,
            fragment_ref_attribute: def.fragment_ref_attribute,
        })
    }

    // -- Class and feature access ------------------------------------

    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.0]
    }

    pub fn feature(&self, id: FeatureId) -> &Feature {
        &self.features[id.0]
    }

    pub fn enum_type(&self, id: EnumId) -> &EnumType {
        &self.enums[id.0]
    }

    pub fn class_by_name(&self, name: &str) -> Option<ClassId> {
        self.class_index.get(name).copied()
    }

    pub fn classes(&self) -> impl Iterator<Item = ClassId> + '_ {
        (0..self.classes.len()).map(ClassId)
    }

    // -- Command resolution ------------------------------------------

    /// Resolve a command keyword. Without a context class only root-eligible
    /// classes are considered; with one, only classes that some containment
    /// of the context class can hold.
    pub fn class_for_command(&self, command: &str, context: Option<ClassId>) -> Option<ClassId> {
        match context {
            None => self.root_commands.get(command).copied(),
            Some(c) => self.classes[c.0].commands.get(command).copied(),
        }
    }

    pub fn has_command(&self, command: &str) -> bool {
        self.all_commands.contains(command)
    }

    pub fn command_name(&self, class: ClassId) -> &str {
        &self.classes[class.0].command
    }

    /// Concrete root-eligible classes, in definition order.
    pub fn root_classes(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.classes()
            .filter(|c| self.classes[c.0].root && !self.classes[c.0].is_abstract)
    }

    // -- Feature tables ----------------------------------------------

    pub fn features(&self, class: ClassId) -> &[FeatureId] {
        &self.classes[class.0].features
    }

    pub fn containments(&self, class: ClassId) -> &[FeatureId] {
        &self.classes[class.0].containments
    }

    pub fn non_containments(&self, class: ClassId) -> &[FeatureId] {
        &self.classes[class.0].non_containments
    }

    pub fn unlabeled_arguments(&self, class: ClassId) -> &[FeatureId] {
        &self.classes[class.0].unlabeled
    }

    pub fn labeled_arguments(&self, class: ClassId) -> &[FeatureId] {
        &self.classes[class.0].labeled
    }

    pub fn feature_by_name(&self, class: ClassId, name: &str) -> Option<FeatureId> {
        self.classes[class.0]
            .features
            .iter()
            .copied()
            .find(|f| self.features[f.0].name == name)
    }

    // -- Type relations ----------------------------------------------

    pub fn concrete_subtypes(&self, class: ClassId) -> &[ClassId] {
        &self.classes[class.0].concrete
    }

    /// Whether `class` is `to` or one of its subtypes.
    pub fn conforms(&self, class: ClassId, to: ClassId) -> bool {
        self.classes[class.0].ancestors.contains(&to)
    }

    /// Containments of `class` whose target type accepts `child`.
    pub fn containments_accepting(&self, class: ClassId, child: ClassId) -> Vec<FeatureId> {
        self.containments(class)
            .iter()
            .copied()
            .filter(|f| {
                self.features[f.0]
                    .target()
                    .is_some_and(|t| self.conforms(child, t))
            })
            .collect()
    }

    /// Human readable type of a feature, as used in problem messages.
    pub fn type_name(&self, feature: FeatureId) -> &str {
        match self.features[feature.0].kind {
            FeatureKind::Attribute(DataType::String) => "String",
            FeatureKind::Attribute(DataType::Integer) => "Integer",
            FeatureKind::Attribute(DataType::Float) => "Float",
            FeatureKind::Attribute(DataType::Boolean) => "Boolean",
            FeatureKind::Attribute(DataType::Any) => "Object",
            FeatureKind::Attribute(DataType::Enum(e)) => &self.enums[e.0].name,
            FeatureKind::Reference(c) | FeatureKind::Containment(c) => &self.classes[c.0].name,
        }
    }

    // -- Language options --------------------------------------------

    pub fn reference_regex(&self) -> &Regex {
        &self.reference
    }

    pub fn reference_pattern(&self) -> &str {
        &self.reference_pattern
    }

    pub fn generics_enabled(&self) -> bool {
        self.generics
    }

    pub fn is_unquoted_string(&self, feature: FeatureId) -> bool {
        let f = &self.features[feature.0];
        f.unquoted && f.kind == FeatureKind::Attribute(DataType::String)
    }

    pub fn backward_reference_attribute(&self, class: ClassId) -> Option<&str> {
        self.classes[class.0].backward_reference.as_deref()
    }

    pub fn line_number_attribute(&self) -> Option<&str> {
        self.line_number_attribute.as_deref()
    }

    pub fn file_name_attribute(&self) -> Option<&str> {
        self.file_name_attribute.as_deref()
    }

    pub fn fragment_ref_attribute(&self) -> Option<&str> {
        self.fragment_ref_attribute.as_deref()
    }
}

fn short_name(name: &str) -> &str {
    let after_colons = name.rsplit("::").next().unwrap_or(name);
    after_colons.rsplit('.').next().unwrap_or(after_colons)
}

fn insert_command(
    map: &mut HashMap<String, ClassId>,
    command: &str,
    class: ClassId,
    context: &str,
) -> Result<(), SchemaError> {
    match map.get(command) {
        Some(existing) if *existing != class => Err(SchemaError::AmbiguousCommand {
            command: command.to_owned(),
            context: context.to_owned(),
        }),
        _ => {
            map.insert(command.to_owned(), class);
            Ok(())
        }
    }
}

fn feature_kind(
    class: &ClassDef,
    f: &FeatureDef,
    lookup_class: &impl Fn(&str, &str) -> Result<ClassId, SchemaError>,
    enum_index: &HashMap<String, EnumId>,
) -> Result<FeatureKind, SchemaError> {
    let target = || {
        f.target.as_deref().ok_or_else(|| SchemaError::MissingTarget {
            class: class.name.clone(),
            feature: f.name.clone(),
        })
    };
    let owner = format!("{}.{}", class.name, f.name);
    Ok(match f.kind {
        FeatureKindDef::String => FeatureKind::Attribute(DataType::String),
        FeatureKindDef::Integer => FeatureKind::Attribute(DataType::Integer),
        FeatureKindDef::Float => FeatureKind::Attribute(DataType::Float),
        FeatureKindDef::Boolean => FeatureKind::Attribute(DataType::Boolean),
        FeatureKindDef::Any => FeatureKind::Attribute(DataType::Any),
        FeatureKindDef::Enum => {
            let name = target()?;
            let id = enum_index
                .get(name)
                .copied()
                .ok_or_else(|| SchemaError::UnknownEnum {
                    name: name.to_owned(),
                    referenced_by: owner.clone(),
                })?;
            FeatureKind::Attribute(DataType::Enum(id))
        }
        FeatureKindDef::Reference => FeatureKind::Reference(lookup_class(target()?, &owner)?),
        FeatureKindDef::Containment => FeatureKind::Containment(lookup_class(target()?, &owner)?),
    })
}

/// Order classes so that every class comes after all of its supertypes.
fn inheritance_order(
    classes: &[ClassDef],
    supertypes: &[Vec<ClassId>],
) -> Result<Vec<usize>, SchemaError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    fn visit(
        i: usize,
        classes: &[ClassDef],
        supertypes: &[Vec<ClassId>],
        marks: &mut [Mark],
        order: &mut Vec<usize>,
    ) -> Result<(), SchemaError> {
        match marks[i] {
            Mark::Done => return Ok(()),
            Mark::Active => return Err(SchemaError::CyclicInheritance(classes[i].name.clone())),
            Mark::New => {}
        }
        marks[i] = Mark::Active;
        for s in &supertypes[i] {
            visit(s.0, classes, supertypes, marks, order)?;
        }
        marks[i] = Mark::Done;
        order.push(i);
        Ok(())
    }

    let mut marks = vec![Mark::New; classes.len()];
    let mut order = Vec::with_capacity(classes.len());
    for i in 0..classes.len() {
        visit(i, classes, supertypes, &mut marks, &mut order)?;
    }
    Ok(order)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
