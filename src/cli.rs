//! Command-line interface for qualcheck.

use clap::{Parser, Subcommand, ValueEnum};
use globset::GlobSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::analysis::{register_frontends, registered_extensions};
use crate::config::{self, Config, DEFAULT_CONFIG_FILE};
use crate::detect::Runner;
use crate::logging::{self, LogFormat, LogLevel};
use crate::report;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Config file names searched for when `--config` is not given.
const CONFIG_NAMES: &[&str] = &[DEFAULT_CONFIG_FILE, ".qualcheck.yaml"];

/// Directories never descended into.
const SKIPPED_DIRS: &[&str] = &["target", "build", "out", "node_modules", "vendor"];

/// Pluggable qualifier type checker.
///
/// Qualcheck checks that values flowing into annotated parameters, fields,
/// and returns carry the qualifiers those positions require (for example
/// @Encrypted, @NonNull, or @Untainted).
#[derive(Parser)]
#[command(name = "qualcheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check sources against the active qualifier checkers
    #[command(visible_alias = "lint")]
    Check(CheckArgs),
    /// Create a starter qualcheck.yaml
    Init(InitArgs),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Pretty,
    Json,
    Sarif,
}

/// Arguments for the check command.
#[derive(Parser)]
pub struct CheckArgs {
    /// Path to check (file or directory)
    pub path: PathBuf,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,

    /// Built-in checkers to run, overriding the config (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub checkers: Option<Vec<String>>,

    /// Show suppressed diagnostics in output
    #[arg(long)]
    pub show_suppressed: bool,

    /// Log verbosity (QUALCHECK_LOG overrides)
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Log event format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Starter config written by `init`.
const DEFAULT_TEMPLATE: &str = include_str!("templates/default.yaml");

/// Find a config file next to the checked path, then in the working
/// directory.
fn discover_config(root: &Path) -> Option<PathBuf> {
    [root, Path::new(".")]
        .into_iter()
        .flat_map(|dir| CONFIG_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

fn is_test_path(path: &Path) -> bool {
    let in_test_dir = path.components().any(|c| {
        let name = c.as_os_str().to_string_lossy();
        name == "test" || name == "tests"
    });
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    in_test_dir || stem.ends_with("Test") || stem.ends_with("Tests")
}

/// Collect source files under `root` that a registered front end handles.
pub fn collect_files(
    root: &Path,
    excluded: &GlobSet,
    include_tests: bool,
) -> anyhow::Result<Vec<PathBuf>> {
    let extensions = registered_extensions();
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !name.starts_with('.') && !SKIPPED_DIRS.iter().any(|d| *d == name)
        })
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !extensions.iter().any(|e| *e == ext) {
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        if excluded.is_match(relative) {
            debug!(path = %relative.display(), "excluded by config");
            continue;
        }
        if !include_tests && is_test_path(relative) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

/// Run the check command.
pub fn run_check(args: &CheckArgs) -> anyhow::Result<i32> {
    logging::init(args.log_level, args.log_format);
    register_frontends();

    let abs_path = match args.path.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };
    let root = if abs_path.is_dir() {
        abs_path.clone()
    } else {
        abs_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| abs_path.clone())
    };

    let config_path = args.config.clone().or_else(|| discover_config(&root));
    let config = match &config_path {
        Some(path) => match Config::parse_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {}", e);
                return Ok(EXIT_ERROR);
            }
        },
        None => {
            debug!("no config file found, using defaults");
            Config::default()
        }
    };

    if let Err(e) = config::validate(&config) {
        eprintln!("Error: invalid config: {}", e);
        return Ok(EXIT_ERROR);
    }
    let excluded = config.excluded_matcher()?;

    let files = if abs_path.is_dir() {
        collect_files(&abs_path, &excluded, config.should_include_tests())?
    } else {
        vec![abs_path.clone()]
    };

    if files.is_empty() {
        eprintln!("Warning: no files to check");
        return Ok(EXIT_SUCCESS);
    }
    info!(files = files.len(), root = %root.display(), "checking");

    let mut runner = Runner::new(&root);
    if let Some(checkers) = &args.checkers {
        runner = runner.checkers(checkers.clone());
    }
    let result = runner.run(&files, &config)?;

    let path_str = args.path.to_string_lossy().to_string();
    let config_str = config_path.map(|p| p.to_string_lossy().to_string());

    match args.format {
        OutputFormat::Json => report::write_json(&path_str, config_str.as_deref(), &result)?,
        OutputFormat::Sarif => report::write_sarif(&result)?,
        OutputFormat::Pretty => {
            report::write_pretty(&path_str, config_str.as_deref(), &result, args.show_suppressed)
        }
    }

    if result.has_errors() {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.output.exists() && !args.force {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Use --force to overwrite or --output to choose another path");
        return Ok(EXIT_ERROR);
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = std::fs::write(&args.output, DEFAULT_TEMPLATE) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to choose checkers for your project", args.output.display());
    println!("  2. Run: qualcheck check . --config {}", args.output.display());

    Ok(EXIT_SUCCESS)
}
