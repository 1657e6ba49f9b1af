//! textmodel-core: tokenizer, parser and instantiator for the textual
//! command notation.
//!
//! Text flows through three stages:
//!
//! - [`lexer::tokenize`] -- line-oriented token stream
//! - [`parser::parse`] -- recursive descent with error recovery, feeding a
//!   [`parser::Visitor`]
//! - [`Instantiator`] -- a visitor that builds [`Model`] elements typed by a
//!   [`Schema`]
//!
//! Problems are collected and returned, never raised. The only fallible
//! constructor is [`Schema::from_def`].

pub mod comment;
pub mod error;
pub mod instantiate;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod schema;

// ── Convenience re-exports ───────────────────────────────────────────

pub use comment::{AttributeCommentHandler, CommentHandler};
pub use error::{Problem, SchemaError};
pub use instantiate::{InstantiateOptions, Instantiation, Instantiator};
pub use lexer::{escape, tokenize, unescape, ExactDecimal, Token, TokenKind, TokenValue};
pub use model::{Element, ElementId, Model, UnresolvedRef, Value};
pub use schema::{ClassId, DataType, FeatureId, FeatureKind, Schema, SchemaDef};
