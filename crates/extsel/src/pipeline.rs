//! The build pipeline: probe, select, transpile, describe, compile.
//!
//! Each invocation is one-shot and stateless:
//!
//! 1. [`Prober`] observes transpiler availability and the build toggle
//! 2. [`select`] picks the source variant
//! 3. the descriptor is resolved for that variant
//! 4. for `Generated`, the transpiler runs and its output is substituted
//! 5. the descriptor is handed to a [`Compiler`]
//!
//! # Example
//!
//! ```rust,no_run
//! use extsel::{BuildConfig, CcCompiler, CommandTranspiler, ProcessEnv, Pipeline};
//!
//! # fn main() -> Result<(), extsel::Error> {
//! let config = BuildConfig::new("fibonacci")
//!     .with_source_dir("demos/fibonacci")
//!     .with_out_dir("target/extsel");
//! let transpiler = CommandTranspiler::default();
//!
//! let plan = Pipeline::new(&config, &transpiler).plan(&ProcessEnv)?;
//! let artifact = plan.compile(&CcCompiler::new(config.out_dir()))?;
//! println!("built {}", artifact.path.display());
//! # Ok(())
//! # }
//! ```

use serde::Serialize;

use crate::compile::{Artifact, Compiler};
use crate::config::{BuildConfig, EnvSource};
use crate::descriptor::ExtensionDescriptor;
use crate::error::Error;
use crate::probe::{Capabilities, Prober};
use crate::select::{SourceVariant, select};
use crate::transpile::{self, Transpiler};

/// The outcome of planning a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    capabilities: Capabilities,
    variant: SourceVariant,
    descriptor: ExtensionDescriptor,
}

impl BuildPlan {
    /// What the prober observed.
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// The selected source variant.
    #[must_use]
    pub const fn variant(&self) -> SourceVariant {
        self.variant
    }

    /// The descriptor to hand to the compiler.
    #[must_use]
    pub const fn descriptor(&self) -> &ExtensionDescriptor {
        &self.descriptor
    }

    /// Sources chosen by the selector, before any transpilation.
    #[must_use]
    pub fn selected_sources(&self) -> &[std::path::PathBuf] {
        if self.descriptor.is_transpiled() {
            self.descriptor.generated_from()
        } else {
            self.descriptor.sources()
        }
    }

    /// Take ownership of the descriptor.
    #[must_use]
    pub fn into_descriptor(self) -> ExtensionDescriptor {
        self.descriptor
    }

    /// Hand the descriptor to `compiler`.
    ///
    /// # Errors
    ///
    /// Returns the compiler's error, e.g. [`Error::MissingSource`].
    pub fn compile(&self, compiler: &dyn Compiler) -> Result<Artifact, Error> {
        compiler.compile(&self.descriptor)
    }
}

/// Runs the build stages for one configuration.
#[derive(Debug)]
pub struct Pipeline<'a> {
    config: &'a BuildConfig,
    transpiler: &'a dyn Transpiler,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline for `config` using `transpiler` when selected.
    #[must_use]
    pub fn new(config: &'a BuildConfig, transpiler: &'a dyn Transpiler) -> Self {
        Self { config, transpiler }
    }

    /// Probe, select, resolve the descriptor and transpile if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] for a bad module name, or
    /// [`Error::Transpile`] if the transpiler resolved but then failed or
    /// would write over the pregenerated fallback. A missing transpiler is
    /// not an error.
    pub fn plan(&self, env: &impl EnvSource) -> Result<BuildPlan, Error> {
        let capabilities = Prober::new(self.config, self.transpiler, env).probe();
        let variant = select(capabilities.availability, capabilities.toggle);

        tracing::info!(
            module = self.config.module_name(),
            %variant,
            available = capabilities.availability.is_available(),
            toggle = capabilities.toggle.is_enabled(),
            "Selected source variant"
        );

        let descriptor = ExtensionDescriptor::from_config(self.config, variant)?;
        let descriptor = if variant.needs_transpile() {
            let fallback = ExtensionDescriptor::from_config(self.config, SourceVariant::Static)?;
            transpile::run(
                descriptor,
                self.transpiler,
                self.config.out_dir(),
                fallback.sources(),
            )?
        } else {
            descriptor
        };

        Ok(BuildPlan {
            capabilities,
            variant,
            descriptor,
        })
    }

    /// Plan the build and compile it with `compiler`.
    ///
    /// # Errors
    ///
    /// Returns the first error from planning or compiling.
    pub fn build(&self, env: &impl EnvSource, compiler: &dyn Compiler) -> Result<Artifact, Error> {
        self.plan(env)?.compile(compiler)
    }
}
