//! Source variant selection.

use std::fmt;

use serde::Serialize;

use crate::probe::{BuildToggle, Capabilities, TranspilerAvailability};

/// Which of the two equivalent sources feeds the native compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceVariant {
    /// High-level source that must be transpiled first.
    Generated,
    /// Pregenerated source the compiler accepts directly.
    Static,
}

impl SourceVariant {
    /// Whether this variant needs the transpilation step.
    #[must_use]
    pub const fn needs_transpile(self) -> bool {
        matches!(self, Self::Generated)
    }
}

impl fmt::Display for SourceVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generated => f.write_str("generated"),
            Self::Static => f.write_str("static"),
        }
    }
}

/// Pick the source variant.
///
/// Returns [`SourceVariant::Generated`] only when the transpiler is available
/// and the toggle is on.
#[must_use]
pub const fn select(avail: TranspilerAvailability, toggle: BuildToggle) -> SourceVariant {
    if avail.is_available() && toggle.is_enabled() {
        SourceVariant::Generated
    } else {
        SourceVariant::Static
    }
}

impl From<Capabilities> for SourceVariant {
    fn from(caps: Capabilities) -> Self {
        select(caps.availability, caps.toggle)
    }
}
