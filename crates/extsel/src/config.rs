//! Build configuration, resolved once per build invocation.
//!
//! [`BuildConfig`] collects everything the pipeline needs to know about the
//! module being built: its logical name, where its sources live, where output
//! goes, and which environment variable opts in to the transpiled source.
//! Environment access goes through [`EnvSource`] so that the rest of the
//! crate never reads process state directly.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::descriptor::BuildSettings;

/// Environment variable consulted for the build toggle by default.
pub const DEFAULT_TOGGLE_VAR: &str = "USE_CYTHON";

/// File extension of the high-level, transpiler-only source.
pub const DEFAULT_GENERATED_EXTENSION: &str = "pyx";

/// File extension of the pregenerated, directly compilable fallback.
pub const DEFAULT_STATIC_EXTENSION: &str = "c";

/// Output directory used until [`BuildConfig::with_out_dir`] overrides it.
pub const DEFAULT_OUT_DIR: &str = "build";

/// A read-only view of environment variables.
pub trait EnvSource {
    /// Look up a variable, returning `None` if it is not set.
    fn var_os(&self, key: &str) -> Option<OsString>;
}

/// The environment of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var_os(&self, key: &str) -> Option<OsString> {
        std::env::var_os(key)
    }
}

impl EnvSource for HashMap<String, String> {
    fn var_os(&self, key: &str) -> Option<OsString> {
        self.get(key).map(OsString::from)
    }
}

impl EnvSource for HashMap<String, OsString> {
    fn var_os(&self, key: &str) -> Option<OsString> {
        self.get(key).cloned()
    }
}

/// Configuration for building one extension module.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    module_name: String,
    source_stem: Option<String>,
    source_dir: PathBuf,
    out_dir: PathBuf,
    toggle_var: String,
    generated_extension: String,
    static_extension: String,
    settings: BuildSettings,
}

impl BuildConfig {
    /// Create a configuration for the given logical module name.
    ///
    /// Sources are looked up in the current directory and output written to
    /// [`DEFAULT_OUT_DIR`] until overridden.
    #[must_use]
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            source_stem: None,
            source_dir: PathBuf::from("."),
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            toggle_var: DEFAULT_TOGGLE_VAR.to_string(),
            generated_extension: DEFAULT_GENERATED_EXTENSION.to_string(),
            static_extension: DEFAULT_STATIC_EXTENSION.to_string(),
            settings: BuildSettings::default(),
        }
    }

    /// Set the directory holding both candidate sources.
    #[must_use]
    pub fn with_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = dir.into();
        self
    }

    /// Set the directory for transpiler output and compiled artifacts.
    #[must_use]
    pub fn with_out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = dir.into();
        self
    }

    /// Use a source file stem other than the module's last dotted segment.
    #[must_use]
    pub fn with_source_stem(mut self, stem: impl Into<String>) -> Self {
        self.source_stem = Some(stem.into());
        self
    }

    /// Read the build toggle from a different environment variable.
    #[must_use]
    pub fn with_toggle_var(mut self, name: impl Into<String>) -> Self {
        self.toggle_var = name.into();
        self
    }

    /// Override the file extensions used for each source variant.
    #[must_use]
    pub fn with_extensions(
        mut self,
        generated: impl Into<String>,
        fallback: impl Into<String>,
    ) -> Self {
        self.generated_extension = generated.into();
        self.static_extension = fallback.into();
        self
    }

    /// Set the extension-level build settings attached to the descriptor.
    #[must_use]
    pub fn with_settings(mut self, settings: BuildSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Logical module name.
    #[must_use]
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Source file stem: the explicit override, or the last dotted segment
    /// of the module name.
    #[must_use]
    pub fn source_stem(&self) -> &str {
        self.source_stem
            .as_deref()
            .unwrap_or_else(|| self.module_name.rsplit('.').next().unwrap_or_default())
    }

    /// Directory holding the candidate sources.
    #[must_use]
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Directory for generated sources and artifacts.
    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Name of the environment variable holding the build toggle.
    #[must_use]
    pub fn toggle_var(&self) -> &str {
        &self.toggle_var
    }

    /// Extension of the high-level source.
    #[must_use]
    pub fn generated_extension(&self) -> &str {
        &self.generated_extension
    }

    /// Extension of the fallback source.
    #[must_use]
    pub fn static_extension(&self) -> &str {
        &self.static_extension
    }

    /// Extension-level build settings.
    #[must_use]
    pub const fn settings(&self) -> &BuildSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cython_layout() {
        let config = BuildConfig::new("fibonacci");
        assert_eq!(config.toggle_var(), "USE_CYTHON");
        assert_eq!(config.generated_extension(), "pyx");
        assert_eq!(config.static_extension(), "c");
        assert_eq!(config.source_dir(), Path::new("."));
        assert_eq!(config.out_dir(), Path::new("build"));
        assert_ne!(config.source_dir(), config.out_dir());
    }

    #[test]
    fn source_stem_defaults_to_last_module_segment() {
        assert_eq!(BuildConfig::new("fibonacci").source_stem(), "fibonacci");
        assert_eq!(BuildConfig::new("pkg.native.fib").source_stem(), "fib");
        assert_eq!(
            BuildConfig::new("pkg.fib")
                .with_source_stem("fibonacci")
                .source_stem(),
            "fibonacci"
        );
    }

    #[test]
    fn map_env_source_reports_missing_keys() {
        let mut env = HashMap::new();
        env.insert("USE_CYTHON".to_string(), "1".to_string());
        assert_eq!(env.var_os("USE_CYTHON"), Some(OsString::from("1")));
        assert_eq!(env.var_os("OTHER"), None);
    }
}
