//! Template errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while discovering or rendering templates
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Reading a template file or directory failed
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// File or directory being read
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// A template path from a resource points outside the template base directory
    #[error("Template path {0} is outside the template directory")]
    PathOutsideBase(String),

    /// Template syntax error, undefined parameter or failing function
    #[error("Failed to render template {name}: {source}")]
    Render {
        /// Template name (file name or inline name)
        name: String,
        /// Engine error
        #[source]
        source: minijinja::Error,
    },
}
