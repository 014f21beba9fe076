use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};

use zwom::parser::ParseError;
use zwom::{BlockKind, Keyword, Zone};

/// What kind of rule a ValidationError reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// The document does not start with a META block.
    MissingMeta,
    /// A META block somewhere other than first.
    MisplacedMeta,
    /// No body blocks.
    EmptyWorkout,
    /// Unbalanced, nested or empty START_REPEAT/END_REPEAT groups.
    RepeatStructure,
    MissingParameter,
    ForbiddenParameter,
    DuplicateParameter,
    InvalidValue,
    /// Absolute power used without an FTP in META.
    MissingFtp,
    TagsTooLong,
    MessageOutOfRange,
    UnexpectedMessage,
}

/// A semantic error. The validator collects all of them in one pass.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub message: String,
    pub span: Option<Range<usize>>,
    pub file_id: usize,
    pub notes: Vec<String>,
}

impl ValidationError {
    pub fn new(
        kind: ValidationErrorKind,
        message: impl Into<String>,
        span: Option<Range<usize>>,
        file_id: usize,
    ) -> Self {
        ValidationError {
            kind,
            message: message.into(),
            span,
            file_id,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        let labels = match &self.span {
            Some(span) => vec![Label::primary(self.file_id, span.clone())],
            None => Vec::new(),
        };
        Diagnostic::error()
            .with_message(&self.message)
            .with_labels(labels)
            .with_notes(self.notes.clone())
    }
}

/// Raised by the serializer when it meets a document the validator should
/// have rejected. Never caused by user input on a validated document.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SerializeError {
    #[error("document has no leading META block")]
    MissingMeta,
    #[error("{0} block cannot appear in a normalized workout body")]
    UnexpectedBlock(BlockKind),
    #[error("{kind} block has no {keyword}")]
    MissingParameter { kind: BlockKind, keyword: Keyword },
    #[error("{kind} block has an unusable {keyword} value `{value}`")]
    UnexpectedValue {
        kind: BlockKind,
        keyword: Keyword,
        value: String,
    },
    #[error("absolute power needs an FTP")]
    MissingFtp,
    #[error("zone {0} has no entry in the zone table")]
    UnknownZone(Zone),
    #[error("XML writer failed: {0}")]
    Xml(String),
}

/// Everything that can stop a source file from becoming XML.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("syntax error: {0}")]
    Syntax(#[from] ParseError),
    #[error("{} validation error(s)", .0.len())]
    Validation(Vec<ValidationError>),
    #[error("internal error: {0}")]
    Internal(#[from] SerializeError),
}

impl CompileError {
    /// Diagnostics in report order.
    pub fn to_diagnostics(&self) -> Vec<Diagnostic<usize>> {
        match self {
            CompileError::Syntax(err) => vec![err.to_diagnostic()],
            CompileError::Validation(errors) => errors.iter().map(|e| e.to_diagnostic()).collect(),
            CompileError::Internal(err) => vec![
                Diagnostic::bug()
                    .with_message(format!("internal error: {}", err))
                    .with_notes(vec!["the validator accepted a document it should have rejected".to_string()]),
            ],
        }
    }

    /// Plain messages, one per underlying error.
    pub fn messages(&self) -> Vec<String> {
        match self {
            CompileError::Syntax(err) => vec![err.message.clone()],
            CompileError::Validation(errors) => errors.iter().map(|e| e.message.clone()).collect(),
            CompileError::Internal(err) => vec![err.to_string()],
        }
    }
}
