use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use compiler::{CompileError, ValidationError, normalize, serializer};
use zwom::WorkoutDocument;

use crate::convert::FIXTURE_SUFFIX;

#[derive(Debug, Deserialize)]
pub struct ExpectedError {
    /// Substring that must appear in the error message.
    pub contains: String,

    /// If set, the error's span must start on this 1-based source line.
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// If true, the test expects a syntax error.
    #[serde(default)]
    pub expect_parse_error: bool,

    /// Expected validation errors, in report order. If present (even empty),
    /// count and content are checked.
    #[serde(default)]
    pub expect_errors: Option<Vec<ExpectedError>>,

    /// Target element names of the workout body, in order.
    #[serde(default)]
    pub expect_elements: Option<Vec<String>>,

    /// Substrings that must appear in the XML.
    #[serde(default)]
    pub expect_contains: Vec<String>,

    /// Exact XML (trimmed comparison).
    #[serde(default)]
    pub expect_xml: Option<String>,
}

/// Parse a `.test.zwom` file into its TOML config and workout source.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}'); // strip BOM

    if !content.starts_with("---") {
        return Err("missing opening --- frontmatter delimiter".into());
    }

    let after_open = &content[3..];
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = if after_open.starts_with("---") {
        // empty frontmatter
        0
    } else {
        after_open
            .find("\n---")
            .map(|pos| pos + 1)
            .ok_or("missing closing --- frontmatter delimiter")?
    };

    let toml_str = after_open[..close_pos].trim_end_matches(['\r', '\n']);
    let rest = &after_open[close_pos + 3..];
    let source = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

fn run_single_test(path: &Path) -> TestResult {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("cannot read file: {}", e)),
            };
        }
    };

    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("frontmatter error: {}", e)),
            };
        }
    };

    let outcome = match check_source(&config, source) {
        None => TestOutcome::Pass,
        Some(reason) => TestOutcome::Fail(reason),
    };
    TestResult {
        path: path.to_path_buf(),
        description: config.description,
        outcome,
    }
}

/// Run one fixture's source against its expectations. Returns `Some(reason)` on mismatch.
fn check_source(config: &TestConfig, source: &str) -> Option<String> {
    let result = compiler::parse_and_validate(source, 0);

    if config.expect_parse_error {
        return match result {
            Err(CompileError::Syntax(_)) => None,
            Err(other) => Some(format!("expected a syntax error, got: {}", other)),
            Ok(_) => Some("expected a syntax error, but parsing succeeded".into()),
        };
    }

    let document = match result {
        Ok(document) => document,
        Err(CompileError::Validation(errors)) => {
            return match &config.expect_errors {
                Some(expected) => check_errors(source, &errors, expected),
                None => Some(format!(
                    "unexpected validation errors:\n{}",
                    errors
                        .iter()
                        .map(|e| format!("  - {}", e))
                        .collect::<Vec<_>>()
                        .join("\n")
                )),
            };
        }
        Err(other) => return Some(format!("unexpected error: {}", other)),
    };

    if let Some(expected) = config.expect_errors.as_ref().filter(|e| !e.is_empty()) {
        return Some(format!(
            "expected {} validation error(s), but the workout is valid",
            expected.len()
        ));
    }

    check_output(config, &document)
}

fn check_output(config: &TestConfig, document: &WorkoutDocument) -> Option<String> {
    if let Some(expected) = &config.expect_elements {
        let normalized = normalize(document);
        let actual: Vec<&str> = normalized
            .body()
            .iter()
            .map(|b| serializer::element_name(b.kind).unwrap_or("?"))
            .collect();
        if actual != *expected {
            return Some(format!(
                "element mismatch\n  expected: {}\n  actual:   {}",
                expected.join(", "),
                actual.join(", ")
            ));
        }
    }

    if config.expect_contains.is_empty() && config.expect_xml.is_none() {
        return None;
    }

    let xml = match compiler::serialize(document) {
        Ok(xml) => xml,
        Err(e) => return Some(format!("serialization failed: {}", e)),
    };

    for needle in &config.expect_contains {
        if !xml.contains(needle.as_str()) {
            return Some(format!("output does not contain: {}\n  actual:\n{}", needle, xml));
        }
    }

    if let Some(expected) = &config.expect_xml {
        if xml.trim() != expected.trim() {
            return Some(format!(
                "output mismatch\n  expected:\n{}\n  actual:\n{}",
                expected.trim(),
                xml.trim()
            ));
        }
    }

    None
}

/// Convert a byte offset in `source` to a 1-based line number.
fn byte_offset_to_line(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count()
        + 1
}

/// Check that actual errors match expectations. Returns `Some(reason)` on mismatch.
fn check_errors(
    source: &str,
    actual: &[ValidationError],
    expected: &[ExpectedError],
) -> Option<String> {
    if actual.len() != expected.len() {
        let actual_msgs: Vec<String> = actual.iter().map(|e| format!("  - {}", e)).collect();
        return Some(format!(
            "expected {} error(s), got {}\n  actual errors:\n{}",
            expected.len(),
            actual.len(),
            actual_msgs.join("\n")
        ));
    }

    for (i, (actual, expected)) in actual.iter().zip(expected.iter()).enumerate() {
        let msg = actual.to_string();

        if !msg.contains(&expected.contains) {
            return Some(format!(
                "error[{}]: expected message containing \"{}\", got: {}",
                i, expected.contains, msg
            ));
        }

        if let Some(expected_line) = expected.line {
            let Some(span) = &actual.span else {
                return Some(format!(
                    "error[{}]: expected on line {}, but error has no span",
                    i, expected_line
                ));
            };
            let actual_line = byte_offset_to_line(source, span.start);
            if actual_line != expected_line {
                return Some(format!(
                    "error[{}]: expected on line {}, but span is on line {}",
                    i, expected_line, actual_line
                ));
            }
        }
    }

    None
}

/// Discover `.test.zwom` files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.ends_with(FIXTURE_SUFFIX) {
                let category = path
                    .parent()
                    .and_then(|p| p.strip_prefix(root).ok())
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_default();
                out.entry(category).or_default().push(path);
            }
        }
    }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        let label = if cat.is_empty() { "(root)" } else { cat.as_str() };
        eprintln!("  {} ({} tests)", label, files.len());
    }
}

fn pass_label(no_color: bool) -> &'static str {
    if no_color { "PASS" } else { "\x1b[32mPASS\x1b[0m" }
}

fn fail_label(no_color: bool) -> &'static str {
    if no_color { "FAIL" } else { "\x1b[31mFAIL\x1b[0m" }
}

fn bold(s: &str, no_color: bool) -> String {
    if no_color {
        s.to_string()
    } else {
        format!("\x1b[1m{}\x1b[0m", s)
    }
}

fn print_result(result: &TestResult, no_color: bool) {
    let label = result.description.as_deref().unwrap_or_else(|| {
        result
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("?")
    });
    match result.outcome {
        TestOutcome::Pass => eprintln!("  {}  {}", pass_label(no_color), label),
        TestOutcome::Fail(_) => eprintln!("  {}  {}", fail_label(no_color), label),
    }
}

/// Print failure details and the summary line. Returns the exit code.
fn print_summary(passed: usize, failures: &[TestResult], no_color: bool) -> i32 {
    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    let failed = failures.len();
    if failed == 0 {
        let ok = if no_color { "ok" } else { "\x1b[32mok\x1b[0m" };
        eprintln!("test result: {}. {} passed, 0 failed", ok, passed);
        0
    } else {
        let label = if no_color { "FAILED" } else { "\x1b[31mFAILED\x1b[0m" };
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            label,
            passed,
            failed,
            passed + failed
        );
        1
    }
}

/// Run all `.test.zwom` files under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    // Single file mode ignores categories
    if path.is_file() {
        let result = run_single_test(path);
        print_result(&result, no_color);
        return match result.outcome {
            TestOutcome::Pass => print_summary(1, &[], no_color),
            TestOutcome::Fail(_) => print_summary(0, &[result], no_color),
        };
    }

    let all_categories = discover_categorized(path);

    if all_categories.is_empty() {
        eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
        return 1;
    }

    let run_categories: BTreeMap<&str, &Vec<PathBuf>> = if categories.is_empty() {
        all_categories.iter().map(|(k, v)| (k.as_str(), v)).collect()
    } else {
        let mut filtered = BTreeMap::new();
        for requested in categories {
            let req = requested.trim_matches('/');
            let mut found = false;
            for (cat, files) in &all_categories {
                if cat == req || cat.starts_with(&format!("{}/", req)) {
                    filtered.insert(cat.as_str(), files);
                    found = true;
                }
            }
            if !found {
                eprintln!(
                    "warning: category '{}' not found (available: {})",
                    req,
                    all_categories
                        .keys()
                        .map(|k| if k.is_empty() { "(root)" } else { k.as_str() })
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }
        filtered
    };

    if run_categories.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &run_categories {
        let header = if cat.is_empty() {
            "(root)".to_string()
        } else {
            cat.to_string()
        };
        eprintln!();
        eprintln!("{}", bold(&header, no_color));

        for file in *files {
            let result = run_single_test(file);
            print_result(&result, no_color);
            match result.outcome {
                TestOutcome::Pass => passed += 1,
                TestOutcome::Fail(_) => failures.push(result),
            }
        }
    }

    print_summary(passed, &failures, no_color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixtures_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../fixtures")
    }

    fn outcome_of(content: &str) -> Option<String> {
        let (config, source) = parse_test_file(content).unwrap();
        check_source(&config, source)
    }

    #[test]
    fn shipped_fixtures_pass() {
        assert_eq!(run_tests(&fixtures_dir(), true, &[]), 0);
    }

    #[test]
    fn frontmatter_split() {
        let (config, source) =
            parse_test_file("---\ndescription = \"x\"\nexpect_parse_error = true\n---\nFREE {\n").unwrap();
        assert_eq!(config.description.as_deref(), Some("x"));
        assert!(config.expect_parse_error);
        assert_eq!(source, "FREE {\n");

        let (config, source) = parse_test_file("---\n---\nMETA {}\n").unwrap();
        assert!(config.description.is_none());
        assert_eq!(source, "META {}\n");

        assert!(parse_test_file("META {}").is_err());
        assert!(parse_test_file("---\ndescription = \"x\"\n").is_err());
    }

    #[test]
    fn error_line_is_checked() {
        let content = "---\nexpect_errors = [{ contains = \"missing required DURATION\", line = 3 }]\n---\nMETA {NAME \"a\", AUTHOR \"b\", DESCRIPTION \"c\"}\nFREE {DURATION 01:00}\nSEGMENT {POWER 50%}\n";
        assert_eq!(outcome_of(content), None);

        let wrong_line = content.replace("line = 3", "line = 2");
        assert_eq!(
            outcome_of(&wrong_line),
            Some("error[0]: expected on line 2, but span is on line 3".to_string())
        );
    }

    #[test]
    fn unexpected_success_fails() {
        let content = "---\nexpect_errors = [{ contains = \"anything\" }]\n---\nMETA {NAME \"a\", AUTHOR \"b\", DESCRIPTION \"c\"}\nFREE {DURATION 01:00}\n";
        assert_eq!(
            outcome_of(content),
            Some("expected 1 validation error(s), but the workout is valid".to_string())
        );
    }

    #[test]
    fn element_mismatch_fails() {
        let content = "---\nexpect_elements = [\"SteadyState\"]\n---\nMETA {NAME \"a\", AUTHOR \"b\", DESCRIPTION \"c\"}\nFREE {DURATION 01:00}\n";
        let reason = outcome_of(content).unwrap();
        assert!(reason.starts_with("element mismatch"));
    }

    #[test]
    fn failing_file_sets_exit_code() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        fs::create_dir(dir.path().join("broken")).unwrap();
        fs::write(
            dir.path().join("broken/bad.test.zwom"),
            "---\nexpect_parse_error = true\n---\nMETA {NAME \"a\", AUTHOR \"b\", DESCRIPTION \"c\"}\nFREE {DURATION 01:00}\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("good.test.zwom"),
            "---\nexpect_parse_error = true\n---\nFREE {\n",
        )
        .unwrap();

        assert_eq!(run_tests(dir.path(), true, &[]), 1);
        assert_eq!(run_tests(dir.path(), true, &["broken".to_string()]), 1);
        assert_eq!(run_tests(&dir.path().join("good.test.zwom"), true, &[]), 0);
        assert_eq!(run_tests(dir.path(), true, &["missing".to_string()]), 1);
    }
}
