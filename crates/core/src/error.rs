use serde::{Deserialize, Serialize};

/// A problem found while parsing or instantiating a document.
///
/// Problems are collected, never raised: every entry point returns the
/// partial result it managed to build together with its problem list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Problem {
    pub message: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Problem {
    pub fn new(message: impl Into<String>, line: u32) -> Self {
        Problem {
            message: message.into(),
            line,
            file: None,
        }
    }

    pub fn in_file(mut self, file: Option<&str>) -> Self {
        self.file = file.map(str::to_owned);
        self
    }
}

/// Errors raised while building a [`crate::Schema`] from its definition.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid schema definition: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid reference pattern: {0}")]
    ReferencePattern(#[from] regex::Error),

    #[error("duplicate class '{0}'")]
    DuplicateClass(String),

    #[error("duplicate enum '{0}'")]
    DuplicateEnum(String),

    #[error("class '{class}' declares feature '{feature}' more than once (including inherited features)")]
    DuplicateFeature { class: String, feature: String },

    #[error("unknown class '{name}' referenced by '{referenced_by}'")]
    UnknownClass { name: String, referenced_by: String },

    #[error("unknown enum '{name}' referenced by '{referenced_by}'")]
    UnknownEnum { name: String, referenced_by: String },

    #[error("feature '{class}.{feature}' needs a target")]
    MissingTarget { class: String, feature: String },

    #[error("class '{class}' lists unknown unlabeled argument '{feature}'")]
    UnknownArgument { class: String, feature: String },

    #[error("class '{class}' names unknown backward reference attribute '{feature}'")]
    UnknownBackwardReference { class: String, feature: String },

    #[error("cyclic inheritance involving class '{0}'")]
    CyclicInheritance(String),

    #[error("command '{command}' is ambiguous in context '{context}'")]
    AmbiguousCommand { command: String, context: String },
}
