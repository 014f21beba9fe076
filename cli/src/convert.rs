use std::path::{Path, PathBuf};

use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::{debug, info};

use compiler::{CompileError, normalize, serializer};
use zwom::WorkoutDocument;

/// Source extension handled by `convert` and `batch`.
pub const SOURCE_EXTENSION: &str = "zwom";

/// Suffix of fixture files, which `batch` skips.
pub const FIXTURE_SUFFIX: &str = ".test.zwom";

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("cannot read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: {error}", .path.display())]
    Compile { path: PathBuf, error: CompileError },
}

/// Owns the codespan file database so diagnostics can point into any file
/// compiled during one invocation.
pub struct Session {
    files: SimpleFiles<String, String>,
    color: ColorChoice,
}

impl Session {
    pub fn new(no_color: bool) -> Self {
        Session {
            files: SimpleFiles::new(),
            color: if no_color {
                ColorChoice::Never
            } else {
                ColorChoice::Auto
            },
        }
    }

    fn load(&mut self, path: &Path) -> Result<(usize, String), ConvertError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConvertError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file_id = self
            .files
            .add(path.display().to_string(), source.clone());
        Ok((file_id, source))
    }

    /// Parse and validate without writing anything.
    pub fn check(&mut self, path: &Path) -> Result<WorkoutDocument, ConvertError> {
        let (file_id, source) = self.load(path)?;
        compiler::parse_and_validate(&source, file_id).map_err(|error| ConvertError::Compile {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Compile `input` and write the XML to `output` (or next to the input).
    /// Returns the path written.
    pub fn convert(&mut self, input: &Path, output: Option<&Path>) -> Result<PathBuf, ConvertError> {
        let (file_id, source) = self.load(input)?;
        let xml = compiler::compile(&source, file_id).map_err(|error| ConvertError::Compile {
            path: input.to_path_buf(),
            error,
        })?;

        let target = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| output_path(input));
        std::fs::write(&target, xml).map_err(|source| ConvertError::Write {
            path: target.clone(),
            source,
        })?;
        info!(input = %input.display(), output = %target.display(), "wrote workout");
        Ok(target)
    }

    /// Print an error: rich diagnostics for compile errors, one line otherwise.
    pub fn report(&self, error: &ConvertError) {
        match error {
            ConvertError::Compile { error, .. } => {
                let writer = StandardStream::stderr(self.color);
                let config = term::Config::default();
                for diagnostic in error.to_diagnostics() {
                    let _ = term::emit_to_write_style(&mut writer.lock(), &config, &self.files, &diagnostic);
                }
            }
            other => eprintln!("error: {}", other),
        }
    }
}

/// `workout.zwom` becomes `workout.zwo`.
pub fn output_path(input: &Path) -> PathBuf {
    input.with_extension("zwo")
}

/// Every `.zwom` file under `dir`, recursively, sorted. Fixture files are skipped.
pub fn discover(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    collect_sources(dir, &mut found);
    found.sort();
    debug!(dir = %dir.display(), files = found.len(), "discovered sources");
    found
}

fn collect_sources(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_sources(&path, out);
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let is_source = path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION);
        if is_source && !name.ends_with(FIXTURE_SUFFIX) {
            out.push(path);
        }
    }
}

/// One line per block of the normalized workout: source tag and target element.
pub fn block_listing(document: &WorkoutDocument) -> Vec<String> {
    let normalized = normalize(document);
    normalized
        .body()
        .iter()
        .enumerate()
        .map(|(i, block)| {
            let element = serializer::element_name(block.kind).unwrap_or("-");
            let messages = if block.messages.is_empty() {
                String::new()
            } else {
                format!("  ({} messages)", block.messages.len())
            };
            format!("{:>3}  {:<10} {}{}", i + 1, block.kind.tag(), element, messages)
        })
        .collect()
}

/// Outcome of a batch run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Compile (or just check) every source under `dir`, reporting as it goes.
pub fn run_batch(session: &mut Session, dir: &Path, check_only: bool) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for path in discover(dir) {
        let result = if check_only {
            session.check(&path).map(|_| None)
        } else {
            session.convert(&path, None).map(Some)
        };
        match result {
            Ok(Some(target)) => {
                summary.succeeded += 1;
                eprintln!("ok: {} -> {}", path.display(), target.display());
            }
            Ok(None) => {
                summary.succeeded += 1;
                eprintln!("ok: {}", path.display());
            }
            Err(err) => {
                summary.failed += 1;
                eprintln!("failed: {}", path.display());
                session.report(&err);
            }
        }
    }
    summary
}
