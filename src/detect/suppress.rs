//! Inline suppression of diagnostics via comments.
//!
//! Supports suppression comments like:
//! - `// qualcheck:ignore <rule> - <reason>`
//! - `// qualcheck:ignore-next-line <rule> - <reason>`
//! - `// qualcheck:ignore-file <rule> - <reason>`
//!
//! `<rule>` is a rule id such as `missing_encrypted`, or `*` for all rules.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::Diagnostic;
use crate::analysis::Program;

/// File-level suppressions must appear within this many lines of the top
/// unless only comments precede them.
const FILE_HEADER_LINES: usize = 10;

/// How a suppression applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuppressionType {
    /// Applies to the same line
    Line,
    /// Applies to the next line
    NextLine,
    /// Applies to the entire file
    File,
}

/// An inline suppression directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suppression {
    /// Rule id to suppress, or "*" for all
    pub rule: String,
    pub reason: String,
    pub file: String,
    /// Line number (0 for file-level)
    pub line: usize,
    pub suppression_type: SuppressionType,
}

/// A diagnostic that was suppressed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressedDiagnostic {
    pub diagnostic: Diagnostic,
    pub suppression: Suppression,
}

lazy_static::lazy_static! {
    /// Patterns for matching suppression comments.
    static ref SUPPRESSION_PATTERNS: Vec<Regex> = vec![
        // Line comment: // qualcheck:...
        Regex::new(r"//\s*qualcheck:(ignore(?:-file|-next-line)?)\s+(\S+)\s*(?:-\s*(.*))?").unwrap(),
        // Block comment: /* qualcheck:... */
        Regex::new(r"/\*\s*qualcheck:(ignore(?:-file|-next-line)?)\s+(\S+)\s*(?:-\s*(.*?))?\s*\*/").unwrap(),
    ];

    /// Comment prefixes by file extension.
    static ref COMMENT_PREFIXES: HashMap<&'static str, Vec<&'static str>> = {
        let mut m = HashMap::new();
        m.insert("java", vec!["//", "/*", "*", "@"]);
        m
    };
}

/// Parse suppression directives from file content.
pub fn parse_suppressions(file_path: &str, content: &str) -> Vec<Suppression> {
    let mut suppressions = Vec::new();
    let mut in_header = true;

    for (line_num, line) in content.lines().enumerate() {
        let line_number = line_num + 1;
        let trimmed = line.trim();

        if in_header && !is_header_line(trimmed, file_path) {
            in_header = false;
        }

        for pattern in SUPPRESSION_PATTERNS.iter() {
            let Some(caps) = pattern.captures(line) else {
                continue;
            };
            let directive = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let rule = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            let reason = caps
                .get(3)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();

            let suppression_type = match directive {
                "ignore-file" => {
                    if !in_header && line_number > FILE_HEADER_LINES {
                        continue;
                    }
                    SuppressionType::File
                }
                "ignore-next-line" => SuppressionType::NextLine,
                "ignore" => {
                    // Alone on its line it covers the next line; after code
                    // it covers its own.
                    let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
                    if line[..start].trim().is_empty() {
                        SuppressionType::NextLine
                    } else {
                        SuppressionType::Line
                    }
                }
                _ => continue,
            };

            suppressions.push(Suppression {
                rule: rule.to_string(),
                reason,
                file: file_path.to_string(),
                line: if suppression_type == SuppressionType::File {
                    0
                } else {
                    line_number
                },
                suppression_type,
            });
            break; // Only one suppression per line
        }
    }

    suppressions
}

/// Comments, blank lines, and annotations may precede a file-level directive.
fn is_header_line(line: &str, file_path: &str) -> bool {
    if line.is_empty() {
        return true;
    }

    let ext = Path::new(file_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let default_prefixes: &[&str] = &["//", "/*", "*"];
    let prefixes = COMMENT_PREFIXES
        .get(ext)
        .map(|v| v.as_slice())
        .unwrap_or(default_prefixes);

    prefixes.iter().any(|prefix| line.starts_with(prefix))
}

/// Check if a diagnostic matches a suppression.
pub fn matches_suppression(diagnostic: &Diagnostic, suppression: &Suppression) -> bool {
    if diagnostic.file != suppression.file {
        return false;
    }

    if suppression.rule != "*" && suppression.rule != diagnostic.rule_id {
        return false;
    }

    match suppression.suppression_type {
        SuppressionType::File => true,
        SuppressionType::Line => diagnostic.line == suppression.line,
        SuppressionType::NextLine => diagnostic.line == suppression.line + 1,
    }
}

/// Separate diagnostics into active and suppressed.
pub fn filter_suppressed(
    diagnostics: Vec<Diagnostic>,
    suppressions: &[Suppression],
) -> (Vec<Diagnostic>, Vec<SuppressedDiagnostic>) {
    let mut active = Vec::new();
    let mut suppressed = Vec::new();

    for diagnostic in diagnostics {
        match suppressions
            .iter()
            .find(|s| matches_suppression(&diagnostic, s))
        {
            Some(suppression) => suppressed.push(SuppressedDiagnostic {
                diagnostic,
                suppression: suppression.clone(),
            }),
            None => active.push(diagnostic),
        }
    }

    (active, suppressed)
}

/// Collect suppressions from every file of a program.
pub fn collect_suppressions(program: &Program) -> Vec<Suppression> {
    program
        .files()
        .iter()
        .flat_map(|file| parse_suppressions(&file.path, &file.source))
        .collect()
}
