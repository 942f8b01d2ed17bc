//! Output formatting for qualcheck results.
//!
//! Supports three output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption
//! - SARIF: Static Analysis Results Interchange Format for IDE/CI integration

use colored::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::detect::{CheckResult, Diagnostic, Severity, SuppressedDiagnostic, SuppressionType};

// =============================================================================
// JSON Format
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    pub passed: bool,
    pub files_scanned: usize,
    pub checkers: Vec<String>,
    pub summary: JsonSummary,
    pub diagnostics: Vec<JsonDiagnostic>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suppressed: Vec<JsonSuppressedDiagnostic>,
    pub suppressed_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parse_errors: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonSummary {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonDiagnostic {
    pub rule: String,
    pub severity: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub qualifier: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonSuppressedDiagnostic {
    pub diagnostic: JsonDiagnostic,
    pub suppression: JsonSuppression,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonSuppression {
    pub rule: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    pub line: usize,
    #[serde(rename = "type")]
    pub suppression_type: SuppressionType,
}

/// Build the JSON report for a result.
pub fn json_report(path: &str, config_path: Option<&str>, result: &CheckResult) -> JsonReport {
    JsonReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        path: path.to_string(),
        config: config_path.map(String::from),
        passed: !result.has_errors(),
        files_scanned: result.scanned,
        checkers: result.checkers.clone(),
        summary: JsonSummary {
            errors: result.count_by_severity(Severity::Error),
            warnings: result.count_by_severity(Severity::Warning),
            infos: result.count_by_severity(Severity::Info),
        },
        diagnostics: result.diagnostics.iter().map(diagnostic_to_json).collect(),
        suppressed: result
            .suppressed
            .iter()
            .map(|sd| JsonSuppressedDiagnostic {
                diagnostic: diagnostic_to_json(&sd.diagnostic),
                suppression: JsonSuppression {
                    rule: sd.suppression.rule.clone(),
                    reason: sd.suppression.reason.clone(),
                    line: sd.suppression.line,
                    suppression_type: sd.suppression.suppression_type,
                },
            })
            .collect(),
        suppressed_count: result.suppressed_count(),
        config_warnings: result.config_warnings.clone(),
        parse_errors: result.parse_errors.clone(),
    }
}

/// Write results in JSON format.
pub fn write_json(path: &str, config_path: Option<&str>, result: &CheckResult) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&json_report(path, config_path, result))?;
    println!("{}", json);
    Ok(())
}

fn diagnostic_to_json(d: &Diagnostic) -> JsonDiagnostic {
    JsonDiagnostic {
        rule: d.rule_id.clone(),
        severity: d.severity.to_string(),
        file: d.file.clone(),
        line: d.line,
        column: d.column,
        qualifier: d.qualifier.clone(),
        message: d.message.clone(),
        context: d.context.clone(),
    }
}

// =============================================================================
// SARIF Format
// =============================================================================

const SARIF_VERSION: &str = "2.1.0";
const SARIF_SCHEMA: &str = "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";
const TOOL_NAME: &str = "qualcheck";

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifReport {
    pub version: String,
    #[serde(rename = "$schema")]
    pub schema: String,
    pub runs: Vec<SarifRun>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifRun {
    pub tool: SarifTool,
    pub results: Vec<SarifResult>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifTool {
    pub driver: SarifDriver,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifDriver {
    pub name: String,
    pub version: String,
    pub rules: Vec<SarifRule>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifRule {
    pub id: String,
    #[serde(rename = "shortDescription")]
    pub short_description: SarifMessage,
    #[serde(rename = "defaultConfiguration")]
    pub default_config: SarifRuleConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifRuleConfig {
    pub level: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifResult {
    #[serde(rename = "ruleId")]
    pub rule_id: String,
    pub level: String,
    pub message: SarifMessage,
    pub locations: Vec<SarifLocation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifMessage {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifLocation {
    #[serde(rename = "physicalLocation")]
    pub physical_location: SarifPhysicalLocation,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifPhysicalLocation {
    #[serde(rename = "artifactLocation")]
    pub artifact_location: SarifArtifact,
    pub region: SarifRegion,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifArtifact {
    pub uri: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifRegion {
    #[serde(rename = "startLine")]
    pub start_line: usize,
    #[serde(rename = "startColumn")]
    pub start_column: usize,
}

fn rule_description(rule_id: &str) -> String {
    match rule_id {
        crate::detect::UNIMPLEMENTED_CASE => {
            "Expression shape the checker cannot classify against an expected qualifier".to_string()
        }
        "null_dereference" => "Receiver may be null where it is dereferenced".to_string(),
        id => match id.strip_prefix("missing_") {
            Some(qualifier) => format!("Value lacks a required {} qualifier", qualifier),
            None => format!("Qualifier rule {}", id),
        },
    }
}

fn map_severity_to_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "note",
    }
}

/// Build the SARIF log for a result.
pub fn sarif_report(result: &CheckResult) -> SarifReport {
    // One rule entry per id, at the most severe level seen.
    let mut levels: BTreeMap<&str, Severity> = BTreeMap::new();
    for d in &result.diagnostics {
        levels
            .entry(d.rule_id.as_str())
            .and_modify(|s| *s = (*s).min(d.severity))
            .or_insert(d.severity);
    }

    let rules = levels
        .into_iter()
        .map(|(id, severity)| SarifRule {
            id: id.to_string(),
            short_description: SarifMessage {
                text: rule_description(id),
            },
            default_config: SarifRuleConfig {
                level: map_severity_to_level(severity).to_string(),
            },
        })
        .collect();

    let results = result
        .diagnostics
        .iter()
        .map(|d| SarifResult {
            rule_id: d.rule_id.clone(),
            level: map_severity_to_level(d.severity).to_string(),
            message: SarifMessage {
                text: d.message.clone(),
            },
            locations: vec![SarifLocation {
                physical_location: SarifPhysicalLocation {
                    artifact_location: SarifArtifact {
                        uri: d.file.replace('\\', "/"),
                    },
                    region: SarifRegion {
                        start_line: d.line.max(1),
                        start_column: d.column.max(1),
                    },
                },
            }],
        })
        .collect();

    SarifReport {
        version: SARIF_VERSION.to_string(),
        schema: SARIF_SCHEMA.to_string(),
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: TOOL_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    rules,
                },
            },
            results,
        }],
    }
}

/// Write results in SARIF format.
pub fn write_sarif(result: &CheckResult) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&sarif_report(result))?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write results in pretty (human-readable) format.
pub fn write_pretty(path: &str, config_path: Option<&str>, result: &CheckResult, show_suppressed: bool) {
    println!();
    print!("  ");
    print!("{}", "qualcheck".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Checking: ".dimmed());
    println!("{}", path);
    if let Some(config_path) = config_path {
        print!("  {}", "Config:   ".dimmed());
        println!("{}", config_path);
    }
    print!("  {}", "Checkers: ".dimmed());
    println!("{}", result.checkers.join(", "));
    println!();

    if !result.config_warnings.is_empty() {
        for warning in &result.config_warnings {
            println!("  {} {}", "warning:".yellow(), warning);
        }
        println!();
    }

    if !result.parse_errors.is_empty() {
        for file in &result.parse_errors {
            println!(
                "  {} {} has syntax errors; results may be incomplete",
                "warning:".yellow(),
                file
            );
        }
        println!();
    }

    if !result.diagnostics.is_empty() {
        write_diagnostics(&result.diagnostics);
        println!();
    }

    if !result.suppressed.is_empty() {
        write_suppressed_summary(&result.suppressed, show_suppressed);
        println!();
    }

    write_final_status(result);
    println!();
}

fn write_diagnostics(diagnostics: &[Diagnostic]) {
    println!("  {} ({}):", "Diagnostics".bold(), diagnostics.len());
    println!();

    for d in diagnostics {
        write_severity_tag(d.severity);
        print!("   ");
        print!("{:<20}", d.rule_id.dimmed());
        print!("{}", d.file.blue());
        print!("{}", format!(":{}:{}", d.line, d.column).dimmed());
        println!();

        println!("            {}", d.message);
        if let Some(context) = &d.context {
            println!("            {}", context.dimmed());
        }
        println!();
    }
}

fn write_severity_tag(severity: Severity) {
    match severity {
        Severity::Error => print!("    {} ", "ERROR".red()),
        Severity::Warning => print!("    {} ", "WARN ".yellow()),
        Severity::Info => print!("    {} ", "INFO ".blue()),
    }
}

fn write_final_status(result: &CheckResult) {
    let errors = result.count_by_severity(Severity::Error);
    let warnings = result.count_by_severity(Severity::Warning);
    print!(
        "  {}",
        format!("{} files, {} errors, {} warnings", result.scanned, errors, warnings).dimmed()
    );
    if result.suppressed_count() > 0 {
        print!(
            "{}",
            format!(" ({} suppressed)", result.suppressed_count()).dimmed()
        );
    }
    print!("  ");

    if result.has_errors() {
        print!("{}", "✗ FAILED".red());
    } else {
        print!("{}", "✓ PASSED".green());
    }
    println!();
}

fn write_suppressed_summary(suppressed: &[SuppressedDiagnostic], show_details: bool) {
    println!("  {} ({}):", "Suppressed".dimmed(), suppressed.len());

    if !show_details {
        println!("    {}", "(use --show-suppressed to see details)".dimmed());
        return;
    }

    println!();
    for sd in suppressed {
        let d = &sd.diagnostic;
        let s = &sd.suppression;

        print!("    {:<20}", d.rule_id.dimmed());
        print!("{}", d.file.blue());
        if s.suppression_type == SuppressionType::File {
            print!("{}", ":* (file)".dimmed());
        } else {
            print!("{}", format!(":{}", d.line).dimmed());
        }
        println!();

        if !s.reason.is_empty() {
            println!("            {}", format!("reason: {:?}", s.reason).dimmed());
        }
    }
}
