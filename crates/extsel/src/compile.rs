//! The external compiler surface.
//!
//! The core hands a finished [`ExtensionDescriptor`] to a [`Compiler`] and
//! does nothing else with it. [`CcCompiler`] is the provided implementation:
//! it discovers the platform C compiler through the `cc` crate and links the
//! sources into a loadable module.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

use crate::descriptor::ExtensionDescriptor;
use crate::error::Error;

/// Target triple this crate was built for.
const BUILD_TARGET: &str = env!("EXTSEL_BUILD_TARGET");

/// A compiled extension module on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Logical module name.
    pub module: String,
    /// Path to the loadable module.
    pub path: PathBuf,
}

/// Compiles an extension descriptor into a native artifact.
pub trait Compiler {
    /// Compile `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSource`] if a source does not exist, or
    /// [`Error::Compile`] if the toolchain fails.
    fn compile(&self, descriptor: &ExtensionDescriptor) -> Result<Artifact, Error>;
}

/// Compiles extension modules with the platform C compiler.
#[derive(Debug, Clone)]
pub struct CcCompiler {
    out_dir: PathBuf,
    target: String,
    host: String,
    opt_level: u32,
}

impl CcCompiler {
    /// Create a compiler writing artifacts into `out_dir`, targeting the
    /// platform this crate was built for.
    #[must_use]
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            target: BUILD_TARGET.to_string(),
            host: BUILD_TARGET.to_string(),
            opt_level: 2,
        }
    }

    /// Cross-compile for another target triple.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Set the optimization level (0-3).
    #[must_use]
    pub const fn with_opt_level(mut self, level: u32) -> Self {
        self.opt_level = level;
        self
    }

    /// Directory artifacts are written to.
    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Path of the artifact for `descriptor`.
    #[must_use]
    pub fn artifact_path(&self, descriptor: &ExtensionDescriptor) -> PathBuf {
        let suffix = if self.target.contains("windows") {
            "pyd"
        } else {
            "so"
        };
        self.out_dir.join(format!("{}.{suffix}", descriptor.basename()))
    }

    fn build_config(&self, descriptor: &ExtensionDescriptor) -> cc::Build {
        let settings = descriptor.settings();
        let mut build = cc::Build::new();
        build
            .target(&self.target)
            .host(&self.host)
            .opt_level(self.opt_level)
            .debug(false)
            .out_dir(&self.out_dir)
            .cargo_metadata(false)
            .pic(true);
        for dir in &settings.include_dirs {
            build.include(dir);
        }
        for (name, value) in &settings.defines {
            build.define(name, value.as_deref());
        }
        for arg in &settings.extra_compile_args {
            build.flag(arg);
        }
        build
    }

    fn link_command(
        &self,
        descriptor: &ExtensionDescriptor,
        artifact: &Path,
    ) -> Result<Command, Error> {
        let tool = self
            .build_config(descriptor)
            .try_get_compiler()
            .map_err(|e| Error::Compile {
                module: descriptor.name().to_string(),
                reason: e.to_string(),
            })?;

        let mut cmd = tool.to_command();
        if tool.is_like_msvc() {
            cmd.arg("/LD").args(descriptor.sources());
            cmd.arg(format!("/Fe{}", artifact.display()));
        } else {
            if self.target.contains("apple") {
                cmd.args(["-bundle", "-undefined", "dynamic_lookup"]);
            } else {
                cmd.arg("-shared");
            }
            cmd.args(descriptor.sources()).arg("-o").arg(artifact);
        }
        Ok(cmd)
    }
}

impl Compiler for CcCompiler {
    fn compile(&self, descriptor: &ExtensionDescriptor) -> Result<Artifact, Error> {
        if let Some(missing) = descriptor.sources().iter().find(|p| !p.exists()) {
            return Err(Error::MissingSource {
                path: missing.clone(),
            });
        }
        std::fs::create_dir_all(&self.out_dir)?;

        let artifact = self.artifact_path(descriptor);
        let mut cmd = self.link_command(descriptor, &artifact)?;
        tracing::debug!(command = ?cmd, "Invoking native compiler");

        let output = cmd.output().map_err(|e| Error::Compile {
            module: descriptor.name().to_string(),
            reason: format!("failed to run compiler: {e}"),
        })?;
        if !output.status.success() {
            return Err(Error::Compile {
                module: descriptor.name().to_string(),
                reason: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        tracing::info!(
            module = descriptor.name(),
            artifact = %artifact.display(),
            "Compiled extension module"
        );
        Ok(Artifact {
            module: descriptor.name().to_string(),
            path: artifact,
        })
    }
}
