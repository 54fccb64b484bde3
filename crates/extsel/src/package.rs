//! Packaging metadata emitted alongside the extension descriptor.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::descriptor::ExtensionDescriptor;
use crate::error::Error;

/// File name used by [`PackageMetadata::write_to_dir`].
pub const METADATA_FILE: &str = "extsel-metadata.json";

/// Extra that installs the transpiler, as declared by default.
pub const TRANSPILER_EXTRA: &str = "with-cython";

/// Requirement listed under [`TRANSPILER_EXTRA`] by default.
pub const TRANSPILER_REQUIREMENT: &str = "cython==0.23.4";

/// Package-level metadata handed to the packaging layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageMetadata {
    /// Distribution name.
    pub name: String,
    /// Distribution version.
    pub version: String,
    /// The extension module, once resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext_module: Option<ExtensionDescriptor>,
    /// Optional capabilities and the requirements they install.
    pub extras_require: BTreeMap<String, Vec<String>>,
}

impl PackageMetadata {
    /// Create metadata with no extension and no extras.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ext_module: None,
            extras_require: BTreeMap::new(),
        }
    }

    /// Attach the resolved extension descriptor.
    #[must_use]
    pub fn with_extension(mut self, descriptor: ExtensionDescriptor) -> Self {
        self.ext_module = Some(descriptor);
        self
    }

    /// Declare an optional extra and its requirements.
    #[must_use]
    pub fn with_extra<I, S>(mut self, extra: impl Into<String>, requirements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extras_require
            .entry(extra.into())
            .or_default()
            .extend(requirements.into_iter().map(Into::into));
        self
    }

    /// Declare the default transpiler extra.
    #[must_use]
    pub fn with_transpiler_extra(self) -> Self {
        self.with_extra(TRANSPILER_EXTRA, [TRANSPILER_REQUIREMENT])
    }

    /// Serialize as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the metadata as JSON into `dir`, returning the written path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn write_to_dir(&self, dir: &Path) -> Result<std::path::PathBuf, Error> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(METADATA_FILE);

        // Write to a temp file first, then rename for atomicity
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, self.to_json()?)?;
        std::fs::rename(&temp_path, &path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor;
    use crate::select::SourceVariant;

    #[test]
    fn json_shape() {
        let desc = descriptor::build(SourceVariant::Static, "fibonacci").unwrap();
        let meta = PackageMetadata::new("fibonacci", "0.1.0")
            .with_extension(desc)
            .with_transpiler_extra();

        let value: serde_json::Value = serde_json::from_str(&meta.to_json().unwrap()).unwrap();
        assert_eq!(value["name"], "fibonacci");
        assert_eq!(value["ext_module"]["name"], "fibonacci");
        assert_eq!(value["ext_module"]["variant"], "static");
        assert_eq!(value["ext_module"]["sources"][0], "fibonacci.c");
        assert!(value["ext_module"].get("generated_from").is_none());
        assert_eq!(
            value["extras_require"]["with-cython"],
            serde_json::json!(["cython==0.23.4"])
        );
    }

    #[test]
    fn extras_accumulate() {
        let meta = PackageMetadata::new("fibonacci", "0.1.0")
            .with_extra("with-cython", ["cython==0.23.4"])
            .with_extra("with-cython", ["setuptools"]);
        assert_eq!(
            meta.extras_require["with-cython"],
            ["cython==0.23.4", "setuptools"]
        );
    }

    #[test]
    fn writes_metadata_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = PackageMetadata::new("fibonacci", "0.1.0")
            .write_to_dir(&dir.path().join("out"))
            .unwrap();
        assert_eq!(path, dir.path().join("out").join(METADATA_FILE));
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"fibonacci\""));
        assert!(!path.with_extension("json.tmp").exists());
    }
}
