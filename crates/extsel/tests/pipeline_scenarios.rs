//! End-to-end tests for the build pipeline.
//!
//! These tests drive probe, select, transpile and describe together with
//! in-process transpilers and compilers, so no external toolchain is needed.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use extsel::{
    Artifact, BuildConfig, Compiler, Error, ExtensionDescriptor, Pipeline, SourceVariant,
    TranspileError, Transpiler,
};

/// A transpiler whose availability and behavior are fixed by the test.
#[derive(Debug, Default)]
struct FakeTranspiler {
    installed: bool,
    broken: bool,
    calls: RefCell<Vec<PathBuf>>,
}

impl FakeTranspiler {
    fn absent() -> Self {
        Self::default()
    }

    fn working() -> Self {
        Self {
            installed: true,
            ..Self::default()
        }
    }

    fn broken() -> Self {
        Self {
            installed: true,
            broken: true,
            ..Self::default()
        }
    }
}

impl Transpiler for FakeTranspiler {
    fn name(&self) -> &str {
        "fake"
    }

    fn resolve(&self) -> Result<(), TranspileError> {
        if self.installed {
            Ok(())
        } else {
            Err(TranspileError::Unresolved("No module named 'Cython'".to_string()))
        }
    }

    fn transpile(&self, source: &Path, out_dir: &Path) -> Result<PathBuf, TranspileError> {
        self.calls.borrow_mut().push(source.to_path_buf());
        if self.broken {
            return Err(TranspileError::Failed {
                program: "fake".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "fibonacci.pyx:3:4: Syntax error".to_string(),
            });
        }
        let stem = source.file_stem().unwrap();
        let out = out_dir.join(stem).with_extension("c");
        std::fs::write(&out, "/* generated */\n").unwrap();
        Ok(out)
    }
}

/// A compiler that records the descriptor it was handed.
#[derive(Debug, Default)]
struct RecordingCompiler {
    seen: RefCell<Option<ExtensionDescriptor>>,
}

impl Compiler for RecordingCompiler {
    fn compile(&self, descriptor: &ExtensionDescriptor) -> Result<Artifact, Error> {
        *self.seen.borrow_mut() = Some(descriptor.clone());
        Ok(Artifact {
            module: descriptor.name().to_string(),
            path: PathBuf::from(format!("{}.so", descriptor.basename())),
        })
    }
}

fn env(toggle: Option<&str>) -> HashMap<String, String> {
    toggle
        .map(|v| HashMap::from([("USE_CYTHON".to_string(), v.to_string())]))
        .unwrap_or_default()
}

fn config(out_dir: &Path) -> BuildConfig {
    BuildConfig::new("fibonacci")
        .with_source_dir("src")
        .with_out_dir(out_dir)
}

#[test]
fn toggle_unset_and_transpiler_absent_uses_fallback() {
    let out = tempfile::tempdir().unwrap();
    let config = config(out.path());
    let transpiler = FakeTranspiler::absent();

    let plan = Pipeline::new(&config, &transpiler).plan(&env(None)).unwrap();

    assert_eq!(plan.variant(), SourceVariant::Static);
    assert_eq!(plan.descriptor().sources(), [PathBuf::from("src/fibonacci.c")]);
    assert!(!plan.descriptor().is_transpiled());
    assert!(transpiler.calls.borrow().is_empty());
}

#[test]
fn toggle_set_and_transpiler_working_substitutes_output() {
    let out = tempfile::tempdir().unwrap();
    let config = config(out.path());
    let transpiler = FakeTranspiler::working();

    let plan = Pipeline::new(&config, &transpiler)
        .plan(&env(Some("1")))
        .unwrap();

    assert_eq!(plan.variant(), SourceVariant::Generated);
    assert_eq!(plan.selected_sources(), [PathBuf::from("src/fibonacci.pyx")]);
    assert_eq!(
        plan.descriptor().sources(),
        [out.path().join("fibonacci.c")]
    );
    assert!(plan.descriptor().sources()[0].exists());
    assert_eq!(
        *transpiler.calls.borrow(),
        [PathBuf::from("src/fibonacci.pyx")]
    );
}

#[test]
fn toggle_set_and_transpiler_failing_is_a_transpile_error() {
    let out = tempfile::tempdir().unwrap();
    let config = config(out.path());
    let transpiler = FakeTranspiler::broken();

    let err = Pipeline::new(&config, &transpiler)
        .plan(&env(Some("yes")))
        .unwrap_err();

    assert_eq!(err.stage(), "transpile");
    match err {
        Error::Transpile {
            source_path,
            reason,
        } => {
            assert_eq!(source_path, PathBuf::from("src/fibonacci.pyx"));
            assert!(reason.contains("Syntax error"), "{reason}");
        }
        other => panic!("expected a transpile error, got {other}"),
    }
}

#[test]
fn toggle_set_and_transpiler_absent_falls_back_without_error() {
    let out = tempfile::tempdir().unwrap();
    let config = config(out.path());
    let transpiler = FakeTranspiler::absent();

    let plan = Pipeline::new(&config, &transpiler)
        .plan(&env(Some("1")))
        .unwrap();

    assert_eq!(plan.variant(), SourceVariant::Static);
    assert!(plan.capabilities().toggle.is_enabled());
    assert!(!plan.capabilities().availability.is_available());
    assert_eq!(plan.descriptor().sources(), [PathBuf::from("src/fibonacci.c")]);
}

#[test]
fn falsy_toggle_with_working_transpiler_uses_fallback() {
    let out = tempfile::tempdir().unwrap();
    let config = config(out.path());
    let transpiler = FakeTranspiler::working();

    for value in ["", "0", "false", "off"] {
        let plan = Pipeline::new(&config, &transpiler)
            .plan(&env(Some(value)))
            .unwrap();
        assert_eq!(plan.variant(), SourceVariant::Static, "toggle {value:?}");
    }
    assert!(transpiler.calls.borrow().is_empty());
}

#[test]
fn build_hands_final_descriptor_to_compiler() {
    let out = tempfile::tempdir().unwrap();
    let config = config(out.path());
    let transpiler = FakeTranspiler::working();
    let compiler = RecordingCompiler::default();

    let artifact = Pipeline::new(&config, &transpiler)
        .build(&env(Some("true")), &compiler)
        .unwrap();

    assert_eq!(artifact.module, "fibonacci");
    let seen = compiler.seen.borrow().clone().unwrap();
    assert!(seen.is_transpiled());
    assert_eq!(seen.sources(), [out.path().join("fibonacci.c")]);
}

#[test]
fn invalid_module_name_is_reported_before_transpiling() {
    let out = tempfile::tempdir().unwrap();
    let config = BuildConfig::new("").with_out_dir(out.path());
    let transpiler = FakeTranspiler::working();

    let err = Pipeline::new(&config, &transpiler)
        .plan(&env(Some("1")))
        .unwrap_err();

    assert!(matches!(err, Error::InvalidDescriptor(_)), "{err}");
    assert!(transpiler.calls.borrow().is_empty());
}

#[test]
fn transpiling_into_source_dir_keeps_shipped_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let fallback = dir.path().join("fibonacci.c");
    std::fs::write(&fallback, "/* shipped */\n").unwrap();
    let config = BuildConfig::new("fibonacci")
        .with_source_dir(dir.path())
        .with_out_dir(dir.path());
    let transpiler = FakeTranspiler::working();

    let err = Pipeline::new(&config, &transpiler)
        .plan(&env(Some("1")))
        .unwrap_err();

    assert_eq!(err.stage(), "transpile");
    assert!(err.to_string().contains("would overwrite"), "{err}");
    assert!(transpiler.calls.borrow().is_empty());
    assert_eq!(std::fs::read_to_string(&fallback).unwrap(), "/* shipped */\n");

    // The fallback still builds once the toggle is off.
    let plan = Pipeline::new(&config, &transpiler).plan(&env(None)).unwrap();
    assert_eq!(plan.descriptor().sources(), [fallback]);
}
