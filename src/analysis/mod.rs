//! Source front ends and the program model they produce.
//!
//! The checking engine never looks at tree-sitter trees. A front end parses
//! source files and lowers them into a `Program`: an arena of syntax nodes
//! with symbol resolution and declared qualifier attributes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ Source Files    │────▶│ Front ends   │────▶│ Program       │
//! └─────────────────┘     │ (Java)       │     │ (nodes,       │
//!                         └──────────────┘     │  symbols)     │
//!                                              └───────────────┘
//!                                                      │
//!                                                      ▼
//!                                              ┌───────────────┐
//!                                              │ engine        │
//!                                              └───────────────┘
//! ```
//!
//! # Adding a New Language
//!
//! 1. Create a new module in `src/analysis/languages/`
//! 2. Implement `LanguageFrontend`
//! 3. Register the front end in `languages/mod.rs`

mod context;
mod languages;
mod program;
mod traits;

pub use context::{AnalysisContext, LoadedProgram};
pub use languages::{
    get_frontend, get_frontend_by_id, register_frontends, registered_extensions, JavaFrontend,
};
pub use program::{
    Constant, FileId, LiteralKind, Node, NodeId, NodeKind, Program, ProgramBuilder, SourceFile,
    Span, Symbol, SymbolId, SymbolKind,
};
pub use traits::{LanguageFrontend, ParsedFile};
