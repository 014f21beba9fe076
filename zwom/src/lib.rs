//! The `.zwom` workout language: lexer, grammar, tree builder and data model.

pub mod block;
pub mod document;
pub mod parser;
pub mod value;

pub use crate::block::message::Message;
pub use crate::block::{Block, BlockKind, Keyword, Param};
pub use crate::document::WorkoutDocument;
pub use crate::value::{Duration, Scalar, ScalarKind, ValueExpr, Zone};
