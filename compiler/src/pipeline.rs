use tracing::{debug, info};

use zwom::WorkoutDocument;
use zwom::parser::Parser;

use crate::error::{CompileError, SerializeError};
use crate::normalizer::normalize;
use crate::serializer;
use crate::validator::validate;

/// Parse a source file and run every semantic check on it.
///
/// Syntax errors stop at the first one. Validation errors are all returned
/// together.
pub fn parse_and_validate(source: &str, file_id: usize) -> Result<WorkoutDocument, CompileError> {
    let document = Parser::new(source.to_string(), file_id).parse()?;
    let errors = validate(&document);
    if !errors.is_empty() {
        debug!(file_id, errors = errors.len(), "workout rejected");
        return Err(CompileError::Validation(errors));
    }
    Ok(document)
}

/// Normalize a validated document and write it as XML.
pub fn serialize(document: &WorkoutDocument) -> Result<String, SerializeError> {
    let normalized = normalize(document);
    serializer::to_xml(&normalized)
}

/// Source text to `.zwo` XML.
pub fn compile(source: &str, file_id: usize) -> Result<String, CompileError> {
    let document = parse_and_validate(source, file_id)?;
    let xml = serialize(&document)?;
    info!(file_id, bytes = xml.len(), "compiled workout");
    Ok(xml)
}
