//! Generation diagnostics
//!
//! Diagnostics never stop generation. The offending declaration is left out
//! of every generated table and the message goes to the build log.

use std::fmt;

/// What kind of naming problem a diagnostic reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Known slot-category prefix but a slot name outside its layout
    UnknownSlot,
    /// Type-scoped declaration whose kind prefix is not recognized
    UnknownPrefix,
    /// `<Type>_<rest>` where `<rest>` has no `<kind>_<name>` split
    MalformedScopedName,
    /// `<prefix>_<rest>` where `<prefix>` is neither `meth` nor a known type
    UnknownType,
    /// Callable with more parameters than any calling convention accepts
    TooManyParameters,
    /// A later declaration replaced an earlier one for the same key
    DuplicateDeclaration,
}

impl DiagnosticKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownSlot => "unknown-slot",
            Self::UnknownPrefix => "unknown-prefix",
            Self::MalformedScopedName => "malformed-name",
            Self::UnknownType => "unknown-type",
            Self::TooManyParameters => "too-many-parameters",
            Self::DuplicateDeclaration => "duplicate-declaration",
        }
    }
}

/// A warning about one function declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// 1-based line of the declaration header
    pub line: usize,
    /// Full function name as written (e.g. `Foo_zz_bar`)
    pub function: String,
    pub message: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(
        kind: DiagnosticKind,
        line: usize,
        function: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            line,
            function: function.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: warning[{}]: {}",
            self.line,
            self.kind.as_str(),
            self.message
        )
    }
}
