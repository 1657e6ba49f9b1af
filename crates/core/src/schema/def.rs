//! Serializable schema definition, as loaded from JSON.

use serde::{Deserialize, Serialize};

/// Reference pattern used when a definition does not declare one.
pub const DEFAULT_REFERENCE_PATTERN: &str = r"\w*(/\w*)+";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaDef {
    pub reference_pattern: Option<String>,
    pub enable_generics: bool,
    pub line_number_attribute: Option<String>,
    pub file_name_attribute: Option<String>,
    pub fragment_ref_attribute: Option<String>,
    pub enums: Vec<EnumDef>,
    pub classes: Vec<ClassDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub literals: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    /// Command keyword; defaults to the last `::` or `.` segment of `name`.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default = "default_true")]
    pub root: bool,
    #[serde(default)]
    pub supertypes: Vec<String>,
    /// Positional argument order. Inherited from the first supertype that
    /// declares one when absent.
    #[serde(default)]
    pub unlabeled: Option<Vec<String>>,
    #[serde(default)]
    pub backward_reference: Option<String>,
    #[serde(default)]
    pub features: Vec<FeatureDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureDef {
    pub name: String,
    pub kind: FeatureKindDef,
    /// Enum name for `enum`, class name for `reference` and `containment`.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub many: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub unquoted: bool,
    /// Children in this containment must always be given a role label.
    #[serde(default)]
    pub labeled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKindDef {
    String,
    Integer,
    Float,
    Boolean,
    Any,
    Enum,
    Reference,
    Containment,
}

fn default_true() -> bool {
    true
}
