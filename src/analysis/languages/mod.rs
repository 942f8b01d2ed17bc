//! Language front end implementations.

mod java;

pub use java::JavaFrontend;

use super::LanguageFrontend;
use once_cell::sync::OnceCell;

/// Static storage for the Java front end.
static JAVA_FRONTEND: OnceCell<JavaFrontend> = OnceCell::new();

fn java() -> &'static JavaFrontend {
    JAVA_FRONTEND.get_or_init(JavaFrontend::new)
}

/// Register all available front ends.
///
/// Idempotent; the lookups below register on demand.
pub fn register_frontends() {
    java();
}

/// Get a front end for the given file extension.
pub fn get_frontend(ext: &str) -> Option<&'static dyn LanguageFrontend> {
    match ext {
        "java" => Some(java() as &'static dyn LanguageFrontend),
        _ => None,
    }
}

/// Get a front end by language ID.
pub fn get_frontend_by_id(lang_id: &str) -> Option<&'static dyn LanguageFrontend> {
    match lang_id {
        "java" => Some(java() as &'static dyn LanguageFrontend),
        _ => None,
    }
}

/// All registered file extensions.
pub fn registered_extensions() -> Vec<&'static str> {
    java().file_extensions().to_vec()
}
