//! Capability probing for the optional transpiler.
//!
//! The prober answers two questions once per build: is the transpiler
//! resolvable here, and does the environment ask for it. Neither question
//! can fail. A transpiler that cannot be resolved for any reason is reported
//! as unavailable, and a toggle value that cannot be interpreted is off.

use std::ffi::OsStr;

use serde::Serialize;

use crate::config::{BuildConfig, EnvSource};
use crate::transpile::Transpiler;

/// Tokens that switch the toggle off even though the variable is set.
const FALSY_TOKENS: &[&str] = &["0", "false", "no", "off", "n", "f"];

/// Whether the build environment asks for the transpiled source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct BuildToggle(bool);

impl BuildToggle {
    /// The toggle is on.
    pub const ON: Self = Self(true);
    /// The toggle is off.
    pub const OFF: Self = Self(false);

    /// Interpret a raw environment value.
    ///
    /// Unset, empty, whitespace-only, non-UTF-8 and falsy values
    /// (`0`, `false`, `no`, `off`, `n`, `f`, in any case) are off.
    #[must_use]
    pub fn from_value(value: Option<&OsStr>) -> Self {
        let Some(value) = value else {
            return Self::OFF;
        };
        let Some(value) = value.to_str() else {
            tracing::debug!(?value, "Ignoring non-UTF-8 build toggle");
            return Self::OFF;
        };
        let value = value.trim();
        if value.is_empty() {
            return Self::OFF;
        }
        let falsy = FALSY_TOKENS
            .iter()
            .any(|token| value.eq_ignore_ascii_case(token));
        Self(!falsy)
    }

    /// Read the toggle from the named variable of `env`.
    #[must_use]
    pub fn from_env(env: &impl EnvSource, var: &str) -> Self {
        Self::from_value(env.var_os(var).as_deref())
    }

    /// Whether the toggle is on.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        self.0
    }
}

impl From<bool> for BuildToggle {
    fn from(value: bool) -> Self {
        Self(value)
    }
}

/// Whether the optional transpiler can be resolved in this environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct TranspilerAvailability(bool);

impl TranspilerAvailability {
    /// The transpiler resolved.
    pub const AVAILABLE: Self = Self(true);
    /// The transpiler did not resolve.
    pub const UNAVAILABLE: Self = Self(false);

    /// Whether the transpiler resolved.
    #[must_use]
    pub const fn is_available(self) -> bool {
        self.0
    }
}

impl From<bool> for TranspilerAvailability {
    fn from(value: bool) -> Self {
        Self(value)
    }
}

/// Result of probing the build environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Capabilities {
    /// Whether the transpiler resolved.
    pub availability: TranspilerAvailability,
    /// Whether the environment asked for the transpiled source.
    pub toggle: BuildToggle,
}

/// Probes the transpiler and the build toggle.
pub struct Prober<'a, E: EnvSource> {
    transpiler: &'a dyn Transpiler,
    env: &'a E,
    toggle_var: &'a str,
}

impl<E: EnvSource> std::fmt::Debug for Prober<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prober")
            .field("transpiler", &self.transpiler.name())
            .field("toggle_var", &self.toggle_var)
            .finish_non_exhaustive()
    }
}

impl<'a, E: EnvSource> Prober<'a, E> {
    /// Create a prober reading the toggle named in `config` from `env`.
    #[must_use]
    pub fn new(config: &'a BuildConfig, transpiler: &'a dyn Transpiler, env: &'a E) -> Self {
        Self {
            transpiler,
            env,
            toggle_var: config.toggle_var(),
        }
    }

    /// Probe the environment.
    ///
    /// Never fails: resolution errors degrade to
    /// [`TranspilerAvailability::UNAVAILABLE`].
    #[must_use]
    pub fn probe(&self) -> Capabilities {
        let availability = match self.transpiler.resolve() {
            Ok(()) => TranspilerAvailability::AVAILABLE,
            Err(reason) => {
                tracing::debug!(
                    transpiler = self.transpiler.name(),
                    %reason,
                    "Transpiler not available, using fallback sources"
                );
                TranspilerAvailability::UNAVAILABLE
            }
        };
        let toggle = BuildToggle::from_env(self.env, self.toggle_var);

        tracing::debug!(
            transpiler = self.transpiler.name(),
            available = availability.is_available(),
            toggle_var = self.toggle_var,
            toggle = toggle.is_enabled(),
            "Probed build capabilities"
        );

        Capabilities {
            availability,
            toggle,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::transpile::TranspileError;

    #[derive(Debug)]
    struct FixedTranspiler(bool);

    impl Transpiler for FixedTranspiler {
        fn name(&self) -> &str {
            "fixed"
        }

        fn resolve(&self) -> Result<(), TranspileError> {
            if self.0 {
                Ok(())
            } else {
                Err(TranspileError::Unresolved("not installed".to_string()))
            }
        }

        fn transpile(&self, source: &Path, _out_dir: &Path) -> Result<PathBuf, TranspileError> {
            Ok(source.to_path_buf())
        }
    }

    fn env(value: Option<&str>) -> HashMap<String, String> {
        value
            .map(|v| HashMap::from([("USE_CYTHON".to_string(), v.to_string())]))
            .unwrap_or_default()
    }

    #[test]
    fn toggle_values() {
        let cases = [
            (None, false),
            (Some(""), false),
            (Some("   "), false),
            (Some("0"), false),
            (Some("false"), false),
            (Some("FALSE"), false),
            (Some("No"), false),
            (Some("off"), false),
            (Some("1"), true),
            (Some("true"), true),
            (Some("yes"), true),
            (Some("on"), true),
            (Some("anything"), true),
        ];
        for (value, expected) in cases {
            let toggle = BuildToggle::from_env(&env(value), "USE_CYTHON");
            assert_eq!(toggle.is_enabled(), expected, "value {value:?}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_toggle_is_off() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let value = OsString::from_vec(vec![0x66, 0x6f, 0xff]);
        assert_eq!(BuildToggle::from_value(Some(value.as_os_str())), BuildToggle::OFF);
    }

    #[test]
    fn absent_transpiler_never_fails_probe() {
        let config = BuildConfig::new("fibonacci");
        let transpiler = FixedTranspiler(false);
        for value in [None, Some(""), Some("0"), Some("1"), Some("yes")] {
            let env = env(value);
            let caps = Prober::new(&config, &transpiler, &env).probe();
            assert_eq!(caps.availability, TranspilerAvailability::UNAVAILABLE);
            assert_eq!(caps.toggle, BuildToggle::from_env(&env, "USE_CYTHON"));
        }
    }

    #[test]
    fn probe_is_idempotent() {
        let config = BuildConfig::new("fibonacci");
        let transpiler = FixedTranspiler(true);
        let env = env(Some("1"));
        let prober = Prober::new(&config, &transpiler, &env);
        let first = prober.probe();
        let second = prober.probe();
        assert_eq!(first, second);
        assert!(first.availability.is_available());
        assert!(first.toggle.is_enabled());
    }

    #[test]
    fn probe_reads_configured_variable() {
        let config = BuildConfig::new("fibonacci").with_toggle_var("FIB_TRANSPILE");
        let transpiler = FixedTranspiler(true);
        let env = HashMap::from([
            ("USE_CYTHON".to_string(), "1".to_string()),
            ("FIB_TRANSPILE".to_string(), "off".to_string()),
        ]);
        let caps = Prober::new(&config, &transpiler, &env).probe();
        assert_eq!(caps.toggle, BuildToggle::OFF);
    }
}
