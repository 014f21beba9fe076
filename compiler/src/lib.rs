pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod rules;
pub mod serializer;
pub mod validator;
pub mod zones;

pub use error::{CompileError, SerializeError, ValidationError, ValidationErrorKind};
pub use normalizer::normalize;
pub use pipeline::{compile, parse_and_validate, serialize};
pub use validator::validate;
pub use zones::{ZONE_TABLE_VERSION, zone_percent};
