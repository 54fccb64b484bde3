//! Error types for extension builds.

use std::io;
use std::path::PathBuf;

/// Errors that can occur while planning or building an extension module.
///
/// Each variant names the stage that failed. A missing optional transpiler is
/// never an error; see [`crate::probe`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The extension descriptor failed validation.
    #[error("Invalid extension descriptor: {0}")]
    InvalidDescriptor(String),

    /// The transpiler was resolvable but failed to transform a source.
    #[error("Transpilation of {} failed: {reason}", .source_path.display())]
    Transpile {
        /// The high-level source that was being transpiled.
        source_path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A source file handed to the compiler does not exist.
    #[error("Source file not found: {}", .path.display())]
    MissingSource {
        /// The missing path.
        path: PathBuf,
    },

    /// The native compiler could not be run or exited with an error.
    #[error("Compilation of extension '{module}' failed: {reason}")]
    Compile {
        /// Logical module name of the extension.
        module: String,
        /// Compiler diagnostics or spawn error.
        reason: String,
    },

    /// I/O error while preparing output directories or writing metadata.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Packaging metadata could not be serialized.
    #[error("Failed to serialize metadata: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Short name of the build stage that produced this error.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::InvalidDescriptor(_) => "descriptor",
            Self::Transpile { .. } => "transpile",
            Self::MissingSource { .. } => "missing-source",
            Self::Compile { .. } => "compile",
            Self::Io(_) | Self::Serialization(_) => "io",
        }
    }
}
