//! Tests for the JSON and SARIF output formats.

use std::path::PathBuf;

use qualcheck::cli;
use qualcheck::config::Config;
use qualcheck::detect::{CheckResult, Runner};
use qualcheck::report::{json_report, sarif_report, JsonReport, SarifReport};

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

fn run_fixtures() -> CheckResult {
    qualcheck::init();
    let config = Config::parse_file(testdata_path().join("qualcheck.yaml")).unwrap();
    let excluded = config.excluded_matcher().unwrap();
    let src = testdata_path().join("src");
    let files = cli::collect_files(&src, &excluded, true).unwrap();
    Runner::new(&src).run(&files, &config).unwrap()
}

#[test]
fn test_json_report_structure() {
    let result = run_fixtures();
    let report = json_report("testdata/src", Some("testdata/qualcheck.yaml"), &result);

    assert_eq!(report.version, env!("CARGO_PKG_VERSION"));
    assert!(!report.passed);
    assert_eq!(report.files_scanned, 7);
    assert_eq!(report.summary.errors, 9);
    assert_eq!(report.summary.warnings, 2);
    assert_eq!(report.summary.infos, 0);
    assert_eq!(report.suppressed_count, 2);

    let json = serde_json::to_string_pretty(&report).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["config"], "testdata/qualcheck.yaml");
    assert!(parsed.get("config_warnings").is_none());
    assert!(parsed.get("parse_errors").is_none());

    let first = &parsed["diagnostics"][0];
    for field in ["rule", "severity", "file", "line", "column", "qualifier", "message"] {
        assert!(first.get(field).is_some(), "missing field {}", field);
    }
    assert_eq!(parsed["suppressed"][0]["suppression"]["type"], "file");

    // Round-trips through the public report type.
    let back: JsonReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back.diagnostics.len(), 11);
}

#[test]
fn test_json_override_context() {
    let result = run_fixtures();
    let report = json_report("testdata/src", None, &result);

    let override_diag = report
        .diagnostics
        .iter()
        .find(|d| d.file == "Overrides.java" && d.line == 10)
        .unwrap();
    assert_eq!(override_diag.context.as_deref(), Some("overrides Store.load"));
    assert_eq!(override_diag.severity, "error");
}

#[test]
fn test_sarif_report_structure() {
    let result = run_fixtures();
    let sarif = sarif_report(&result);

    let json = serde_json::to_value(&sarif).unwrap();
    assert_eq!(json["version"], "2.1.0");
    assert_eq!(json["runs"][0]["tool"]["driver"]["name"], "qualcheck");

    let run = &sarif.runs[0];
    let rule_ids: Vec<_> = run.tool.driver.rules.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(
        rule_ids,
        vec![
            "missing_encrypted",
            "missing_length",
            "missing_non_null",
            "missing_untainted",
            "null_dereference",
            "unimplemented_case",
        ]
    );
    assert_eq!(run.results.len(), 11);

    let deref = run
        .results
        .iter()
        .find(|r| r.rule_id == "null_dereference")
        .unwrap();
    assert_eq!(deref.level, "warning");
    let location = &deref.locations[0].physical_location;
    assert_eq!(location.artifact_location.uri, "Nulls.java");
    assert_eq!(location.region.start_line, 10);

    let text = serde_json::to_string(&sarif).unwrap();
    let back: SarifReport = serde_json::from_str(&text).unwrap();
    assert_eq!(back.runs[0].results.len(), 11);
}
