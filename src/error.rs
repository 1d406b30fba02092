//! Error types for the route export transform.

use thiserror::Error;

/// Failures that abort a whole-module transform.
///
/// None of these ever reach the build pipeline: the pass drivers catch them and
/// hand back the original source.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The source is not valid for the grammar picked from the file id.
    #[error("failed to parse {file}: {message}")]
    Parse { file: String, message: String },

    /// Code generation failed while writing the output buffer.
    #[error("failed to print module: {0}")]
    Print(#[from] std::io::Error),

    #[error("failed to build source map: {0}")]
    SourceMap(String),

    /// The rewrite plan did not match the tree it was computed from.
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    #[error("transform panicked: {0}")]
    Panicked(String),
}

impl TransformError {
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }
}

/// A target export written in a form the engine does not rewrite.
///
/// Recovered per export: the offending export is left untouched and the
/// remaining exports of the module are still wrapped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{name}` is exported in a form that cannot be wrapped: {reason}")]
pub struct UnsupportedShape {
    pub name: String,
    pub reason: &'static str,
}

impl UnsupportedShape {
    pub fn new(name: impl Into<String>, reason: &'static str) -> Self {
        Self {
            name: name.into(),
            reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransformError>;
