//! The transpilation step.
//!
//! The transpiler itself is an external tool. This module defines the
//! [`Transpiler`] seam, a [`CommandTranspiler`] that drives a command-line
//! tool such as `cython`, and [`run`], which transpiles every source of a
//! `Generated` descriptor and substitutes the outputs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::descriptor::ExtensionDescriptor;
use crate::error::Error;

/// Program used by [`CommandTranspiler::default`].
pub const DEFAULT_TRANSPILER: &str = "cython";

/// Extension of the compiler-ready files the transpiler writes.
pub const DEFAULT_OUTPUT_EXTENSION: &str = "c";

/// Error reported by a [`Transpiler`].
#[derive(Debug, thiserror::Error)]
pub enum TranspileError {
    /// The transpiler could not be resolved.
    #[error("transpiler could not be resolved: {0}")]
    Unresolved(String),

    /// The transpiler process could not be started.
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        /// Program that was run.
        program: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The transpiler ran and reported an error.
    #[error("`{program}` exited with {status}: {stderr}")]
    Failed {
        /// Program that was run.
        program: String,
        /// Exit status description.
        status: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The transpiler claimed success but wrote no output.
    #[error("expected output {} was not written", .0.display())]
    MissingOutput(PathBuf),
}

/// An optional source-to-source transpiler.
pub trait Transpiler: fmt::Debug {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Check that the transpiler can be used in this environment.
    ///
    /// # Errors
    ///
    /// Returns the reason the transpiler is unusable. The prober absorbs
    /// this error.
    fn resolve(&self) -> Result<(), TranspileError>;

    /// Transpile `source`, writing the compiler-ready result into `out_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transform fails.
    fn transpile(&self, source: &Path, out_dir: &Path) -> Result<PathBuf, TranspileError>;

    /// Path [`Transpiler::transpile`] writes for `source`.
    fn output_path(&self, source: &Path, out_dir: &Path) -> PathBuf {
        let stem = source.file_stem().unwrap_or(source.as_os_str());
        out_dir.join(stem).with_extension(DEFAULT_OUTPUT_EXTENSION)
    }
}

/// A transpiler driven through its command-line interface.
///
/// Resolution runs `<program> --version`. Transpilation runs
/// `<program> [args...] <source> -o <out_dir>/<stem>.<output_extension>`.
#[derive(Debug, Clone)]
pub struct CommandTranspiler {
    program: PathBuf,
    args: Vec<String>,
    output_extension: String,
}

impl Default for CommandTranspiler {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSPILER)
    }
}

impl CommandTranspiler {
    /// Create a transpiler that runs `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            output_extension: DEFAULT_OUTPUT_EXTENSION.to_string(),
        }
    }

    /// Add an argument passed before the source path.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the extension of the files the transpiler writes.
    #[must_use]
    pub fn with_output_extension(mut self, extension: impl Into<String>) -> Self {
        self.output_extension = extension.into();
        self
    }

    /// The program this transpiler runs.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn spawn_error(&self, source: std::io::Error) -> TranspileError {
        TranspileError::Spawn {
            program: self.program.display().to_string(),
            source,
        }
    }

    fn check_status(&self, output: &Output) -> Result<(), TranspileError> {
        if output.status.success() {
            return Ok(());
        }
        Err(TranspileError::Failed {
            program: self.program.display().to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl Transpiler for CommandTranspiler {
    fn name(&self) -> &str {
        self.program
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_TRANSPILER)
    }

    fn resolve(&self) -> Result<(), TranspileError> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .map_err(|e| TranspileError::Unresolved(self.spawn_error(e).to_string()))?;
        self.check_status(&output)
            .map_err(|e| TranspileError::Unresolved(e.to_string()))
    }

    fn transpile(&self, source: &Path, out_dir: &Path) -> Result<PathBuf, TranspileError> {
        let out_path = self.output_path(source, out_dir);
        tracing::debug!(
            program = %self.program.display(),
            source = %source.display(),
            output = %out_path.display(),
            "Running transpiler"
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(source)
            .arg("-o")
            .arg(&out_path)
            .output()
            .map_err(|e| self.spawn_error(e))?;
        self.check_status(&output)?;

        if !out_path.exists() {
            return Err(TranspileError::MissingOutput(out_path));
        }
        Ok(out_path)
    }

    fn output_path(&self, source: &Path, out_dir: &Path) -> PathBuf {
        let stem = source.file_stem().unwrap_or(source.as_os_str());
        out_dir
            .join(stem)
            .with_extension(&self.output_extension)
    }
}

/// Transpile every source of `descriptor` and substitute the outputs.
///
/// Any failure is a hard error: the transpiler resolved during probing, so
/// a failing transform means the environment is inconsistent.
///
/// # Errors
///
/// Returns [`Error::Transpile`] naming the source that failed or whose
/// output would land on one of the `protected` files, or [`Error::Io`] if
/// `out_dir` cannot be created.
pub fn run(
    descriptor: ExtensionDescriptor,
    transpiler: &dyn Transpiler,
    out_dir: &Path,
    protected: &[PathBuf],
) -> Result<ExtensionDescriptor, Error> {
    // Checked up front: a transpiler may truncate its output before failing.
    for source in descriptor.sources() {
        let output = transpiler.output_path(source, out_dir);
        if let Some(hit) = protected.iter().find(|p| same_location(p, &output)) {
            return Err(Error::Transpile {
                source_path: source.clone(),
                reason: format!(
                    "output {} would overwrite the pregenerated {}",
                    output.display(),
                    hit.display()
                ),
            });
        }
    }

    std::fs::create_dir_all(out_dir)?;

    let mut outputs = Vec::with_capacity(descriptor.sources().len());
    for source in descriptor.sources() {
        let output = transpiler
            .transpile(source, out_dir)
            .map_err(|e| Error::Transpile {
                source_path: source.clone(),
                reason: e.to_string(),
            })?;
        tracing::info!(
            transpiler = transpiler.name(),
            source = %source.display(),
            output = %output.display(),
            "Transpiled source"
        );
        outputs.push(output);
    }

    descriptor.with_transpiled_sources(outputs)
}

/// Whether `a` and `b` name the same file, resolving their parent
/// directories when both exist. The files themselves need not exist.
fn same_location(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    let resolve = |path: &Path| {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        Some(parent.canonicalize().ok()?.join(path.file_name()?))
    };
    matches!((resolve(a), resolve(b)), (Some(a), Some(b)) if a == b)
}
