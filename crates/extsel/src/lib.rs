//! # extsel
//!
//! Build-time source selection for a single compiled extension module.
//!
//! An extension module ships two equivalent sources side by side: a
//! high-level one (`fibonacci.pyx`) that needs an optional transpiler, and a
//! pregenerated fallback (`fibonacci.c`) the C compiler accepts directly.
//! extsel decides which one to compile:
//!
//! - **Generated** when the transpiler resolves *and* the build toggle
//!   (`USE_CYTHON` by default) is set to a truthy value
//! - **Static** in every other case
//!
//! A missing transpiler is never an error. A transpiler that resolves but
//! then fails to transform the source is, since the build already committed
//! to the generated path.
//!
//! ## Quick Start
//!
//! ```rust
//! use extsel::{BuildConfig, CommandTranspiler, Pipeline, SourceVariant};
//! use std::collections::HashMap;
//!
//! # fn main() -> Result<(), extsel::Error> {
//! let config = BuildConfig::new("fibonacci").with_source_dir("demos/fibonacci");
//! let transpiler = CommandTranspiler::new("extsel-missing-transpiler");
//!
//! // The toggle is on, but the transpiler is absent: fall back.
//! let env = HashMap::from([("USE_CYTHON".to_string(), "1".to_string())]);
//! let plan = Pipeline::new(&config, &transpiler).plan(&env)?;
//!
//! assert_eq!(plan.variant(), SourceVariant::Static);
//! assert!(plan.descriptor().sources()[0].ends_with("fibonacci.c"));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod compile;
mod config;
pub mod descriptor;
mod error;
pub mod package;
mod pipeline;
pub mod probe;
mod select;
pub mod transpile;

pub use compile::{Artifact, CcCompiler, Compiler};
pub use config::{
    BuildConfig, DEFAULT_GENERATED_EXTENSION, DEFAULT_OUT_DIR, DEFAULT_STATIC_EXTENSION,
    DEFAULT_TOGGLE_VAR, EnvSource, ProcessEnv,
};
pub use descriptor::{BuildSettings, ExtensionDescriptor, ExtensionDescriptorBuilder};
pub use error::Error;
pub use package::PackageMetadata;
pub use pipeline::{BuildPlan, Pipeline};
pub use probe::{BuildToggle, Capabilities, Prober, TranspilerAvailability};
pub use select::{SourceVariant, select};
pub use transpile::{CommandTranspiler, TranspileError, Transpiler};
