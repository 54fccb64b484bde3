//! Extension descriptors.
//!
//! An [`ExtensionDescriptor`] is the fully resolved description of the one
//! compiled unit: its logical module name, the sources handed to the
//! compiler, and the extension-level build settings. Descriptors are
//! validated when built and never mutated afterwards. The transpilation step
//! produces a new descriptor instead of editing an existing one.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{BuildConfig, DEFAULT_GENERATED_EXTENSION, DEFAULT_STATIC_EXTENSION};
use crate::error::Error;
use crate::select::SourceVariant;

/// Extension-level settings passed through to the compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildSettings {
    /// Extra header search directories.
    pub include_dirs: Vec<PathBuf>,
    /// Preprocessor definitions, with optional values.
    pub defines: Vec<(String, Option<String>)>,
    /// Extra compiler flags.
    pub extra_compile_args: Vec<String>,
}

impl BuildSettings {
    /// Create empty settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header search directory.
    #[must_use]
    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    /// Add a preprocessor definition.
    #[must_use]
    pub fn with_define(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.defines.push((name.into(), value.map(str::to_string)));
        self
    }

    /// Add a raw compiler flag.
    #[must_use]
    pub fn with_compile_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_compile_args.push(arg.into());
        self
    }
}

/// The resolved description of the compiled extension unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionDescriptor {
    name: String,
    variant: SourceVariant,
    sources: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    generated_from: Vec<PathBuf>,
    settings: BuildSettings,
}

impl ExtensionDescriptor {
    /// Start building a descriptor for the given logical module name.
    #[must_use]
    pub fn builder(module_name: impl Into<String>) -> ExtensionDescriptorBuilder {
        ExtensionDescriptorBuilder::new(module_name)
    }

    /// Resolve the descriptor for `variant` from a build configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] if the module name or resolved
    /// source path is empty.
    pub fn from_config(config: &BuildConfig, variant: SourceVariant) -> Result<Self, Error> {
        Self::builder(config.module_name())
            .source_dir(config.source_dir())
            .source_stem(config.source_stem())
            .extensions(config.generated_extension(), config.static_extension())
            .settings(config.settings().clone())
            .build(variant)
    }

    /// Logical module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variant this descriptor was resolved for.
    #[must_use]
    pub const fn variant(&self) -> SourceVariant {
        self.variant
    }

    /// Sources handed to the compiler.
    #[must_use]
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// High-level sources the current sources were transpiled from.
    ///
    /// Empty unless the transpilation step ran.
    #[must_use]
    pub fn generated_from(&self) -> &[PathBuf] {
        &self.generated_from
    }

    /// Whether the sources are transpiler output.
    #[must_use]
    pub fn is_transpiled(&self) -> bool {
        !self.generated_from.is_empty()
    }

    /// Extension-level build settings.
    #[must_use]
    pub const fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Last dotted segment of the module name, used for artifact file names.
    #[must_use]
    pub fn basename(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Replace the sources with transpiler output, keeping the originals.
    pub(crate) fn with_transpiled_sources(self, outputs: Vec<PathBuf>) -> Result<Self, Error> {
        if outputs.len() != self.sources.len() {
            return Err(Error::InvalidDescriptor(format!(
                "transpiler produced {} outputs for {} sources",
                outputs.len(),
                self.sources.len()
            )));
        }
        validate_sources(&outputs)?;
        Ok(Self {
            generated_from: self.sources,
            sources: outputs,
            ..self
        })
    }
}

/// Builder for [`ExtensionDescriptor`].
#[derive(Debug, Clone)]
pub struct ExtensionDescriptorBuilder {
    name: String,
    source_dir: PathBuf,
    source_stem: Option<String>,
    generated_extension: String,
    static_extension: String,
    settings: BuildSettings,
}

impl ExtensionDescriptorBuilder {
    fn new(module_name: impl Into<String>) -> Self {
        Self {
            name: module_name.into(),
            source_dir: PathBuf::new(),
            source_stem: None,
            generated_extension: DEFAULT_GENERATED_EXTENSION.to_string(),
            static_extension: DEFAULT_STATIC_EXTENSION.to_string(),
            settings: BuildSettings::default(),
        }
    }

    /// Directory holding the sources. Defaults to a relative path.
    #[must_use]
    pub fn source_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.source_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Source file stem. Defaults to the last dotted segment of the name.
    #[must_use]
    pub fn source_stem(mut self, stem: impl Into<String>) -> Self {
        self.source_stem = Some(stem.into());
        self
    }

    /// File extensions for the generated and fallback variants.
    #[must_use]
    pub fn extensions(mut self, generated: impl Into<String>, fallback: impl Into<String>) -> Self {
        self.generated_extension = generated.into();
        self.static_extension = fallback.into();
        self
    }

    /// Extension-level build settings.
    #[must_use]
    pub fn settings(mut self, settings: BuildSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Resolve the source path for `variant` and build the descriptor.
    ///
    /// Filesystem existence is not checked here; the compiler reports
    /// missing sources.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] if the module name is empty or has
    /// an empty dotted segment, or if the source stem or extension is empty.
    pub fn build(self, variant: SourceVariant) -> Result<ExtensionDescriptor, Error> {
        if self.name.is_empty() {
            return Err(Error::InvalidDescriptor(
                "module name must not be empty".to_string(),
            ));
        }
        if self.name.split('.').any(str::is_empty) {
            return Err(Error::InvalidDescriptor(format!(
                "module name '{}' has an empty segment",
                self.name
            )));
        }

        let stem = self
            .source_stem
            .unwrap_or_else(|| self.name.rsplit('.').next().unwrap_or_default().to_string());
        let extension = match variant {
            SourceVariant::Generated => self.generated_extension,
            SourceVariant::Static => self.static_extension,
        };
        if stem.is_empty() || extension.is_empty() {
            return Err(Error::InvalidDescriptor(format!(
                "cannot resolve a {variant} source for '{}': empty file stem or extension",
                self.name
            )));
        }

        let sources = vec![self.source_dir.join(format!("{stem}.{extension}"))];
        validate_sources(&sources)?;

        Ok(ExtensionDescriptor {
            name: self.name,
            variant,
            sources,
            generated_from: Vec::new(),
            settings: self.settings,
        })
    }
}

/// Build a descriptor for `module_name` with sources in the current directory.
///
/// # Errors
///
/// Returns [`Error::InvalidDescriptor`] if the module name is invalid.
pub fn build(variant: SourceVariant, module_name: &str) -> Result<ExtensionDescriptor, Error> {
    ExtensionDescriptor::builder(module_name).build(variant)
}

fn validate_sources(sources: &[PathBuf]) -> Result<(), Error> {
    if sources.is_empty() {
        return Err(Error::InvalidDescriptor(
            "descriptor has no sources".to_string(),
        ));
    }
    if sources.iter().any(|p| p.as_os_str().is_empty()) {
        return Err(Error::InvalidDescriptor(
            "descriptor has an empty source path".to_string(),
        ));
    }
    Ok(())
}
