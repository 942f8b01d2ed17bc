//! Core traits for language front ends.

use std::path::Path;

use super::Program;

/// Holds a parsed tree-sitter tree and associated metadata.
///
/// Every file of a compilation is parsed, possibly in parallel, before
/// lowering collects declarations across all of them.
pub struct ParsedFile {
    /// The tree-sitter parse tree.
    pub tree: tree_sitter::Tree,
    /// The original source code (kept for node text extraction).
    pub source: Vec<u8>,
    /// The file path (for diagnostics).
    pub path: String,
}

impl ParsedFile {
    /// Get the source code as a string slice.
    pub fn source_str(&self) -> &str {
        std::str::from_utf8(&self.source).unwrap_or("")
    }

    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: tree_sitter::Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }
}

/// Language-specific front end.
///
/// A front end plays the host role for the checking engine: it turns
/// source files into a `Program` carrying the syntax tree, symbol
/// resolution, and declared qualifier attributes.
///
/// # Thread Safety
///
/// tree_sitter::Parser is not Sync, so implementations create parsers
/// per call.
pub trait LanguageFrontend: Send + Sync {
    /// Returns the language identifier (e.g., "java").
    fn language_id(&self) -> &'static str;

    /// Returns file extensions this front end handles (without dot).
    fn file_extensions(&self) -> &'static [&'static str];

    /// Parse a source file into a tree-sitter tree.
    ///
    /// Partial parse errors are still returned as a valid tree with ERROR
    /// nodes; only a complete failure is an error.
    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile>;

    /// Lower a set of parsed files into one resolved program.
    fn lower(&self, files: &[ParsedFile]) -> anyhow::Result<Program>;

    /// Check if this front end handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        self.file_extensions().iter().any(|e| *e == ext)
    }
}
