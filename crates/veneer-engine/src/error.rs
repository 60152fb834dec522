//! Error taxonomy.
//!
//! Errors are values, produced at classification, compilation, and the
//! entry to invocation. Once a trampoline has jumped to native code the
//! only outcomes are "returned normally" or "process died" — nothing here
//! is recoverable by the engine itself.

use std::fmt;

use thiserror::Error;
use veneer_types::{CallingConvention, TypeError, TypeKind};

/// Which dynamic-library operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryOp {
    /// Opening a shared library.
    Load,
    /// Resolving a symbol.
    Symbol,
    /// Closing a library handle.
    Free,
}

impl fmt::Display for LibraryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LibraryOp::Load => "load",
            LibraryOp::Symbol => "symbol",
            LibraryOp::Free => "free",
        })
    }
}

/// Everything that can go wrong before native code runs.
///
/// Each variant carries enough structured context (field names, indexes,
/// platform labels) for programmatic dispatch.
#[derive(Debug, Error)]
pub enum FfiError {
    /// A required input was null or malformed.
    #[error("invalid call interface: {field}: {reason}")]
    InvalidCallInterface {
        /// Which input failed; indexed inputs read like `arg_types[2]`.
        field: String,
        /// Why it was rejected.
        reason: &'static str,
        /// Argument index for per-argument failures.
        index: Option<usize>,
    },

    /// A type descriptor failed the closed-set check or had missing
    /// members.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// The convention cannot execute on this host.
    #[error("unsupported calling convention {convention:?} on {platform}: {reason}")]
    CallingConvention {
        /// The offending convention.
        convention: CallingConvention,
        /// Host label, `os/arch`.
        platform: String,
        /// Why it cannot run here.
        reason: &'static str,
    },

    /// No invocation engine exists for this OS × architecture pair.
    #[error("unsupported platform: {os}/{arch} (no invocation engine for this target)")]
    UnsupportedPlatform {
        /// Operating system name.
        os: &'static str,
        /// Architecture name.
        arch: &'static str,
    },

    /// A dynamic-library operation failed.
    #[error("library {operation} failed for {name:?}: {detail}")]
    Library {
        /// Which loader operation failed.
        operation: LibraryOp,
        /// Library path or symbol name.
        name: String,
        /// Underlying loader diagnostic.
        detail: String,
    },

    /// Classification succeeded but the runtime shape cannot be
    /// demarshalled on this target.
    #[error("unsupported return type: kind {kind:?}, size {size}")]
    UnsupportedReturnType {
        /// Return descriptor kind.
        kind: TypeKind,
        /// Return descriptor size in bytes.
        size: usize,
    },

    /// The caller's cancellation token was already tripped at entry.
    #[error("call cancelled: {reason}")]
    Cancelled {
        /// Reason recorded when the token was cancelled.
        reason: String,
    },
}

impl FfiError {
    pub(crate) fn invalid(field: &'static str, reason: &'static str) -> FfiError {
        FfiError::InvalidCallInterface {
            field: field.to_string(),
            reason,
            index: None,
        }
    }

    pub(crate) fn invalid_at(field: &'static str, index: usize, reason: &'static str) -> FfiError {
        FfiError::InvalidCallInterface {
            field: format!("{field}[{index}]"),
            reason,
            index: Some(index),
        }
    }

    pub(crate) fn host_platform() -> FfiError {
        FfiError::UnsupportedPlatform {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
        }
    }

    #[cfg_attr(not(target_arch = "x86_64"), allow(dead_code))]
    pub(crate) fn convention_mismatch(
        convention: CallingConvention,
        reason: &'static str,
    ) -> FfiError {
        FfiError::CallingConvention {
            convention,
            platform: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_fields_render_with_their_index() {
        let err = FfiError::invalid_at("arg_types", 2, "must not be null");
        assert_eq!(
            err.to_string(),
            "invalid call interface: arg_types[2]: must not be null"
        );
        match err {
            FfiError::InvalidCallInterface { index, .. } => assert_eq!(index, Some(2)),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn type_errors_pass_through_transparently() {
        let inner = TypeError::MissingMembers { context: "type" };
        let err: FfiError = inner.clone().into();
        assert_eq!(err.to_string(), inner.to_string());
    }

    #[test]
    fn library_errors_name_the_operation() {
        let err = FfiError::Library {
            operation: LibraryOp::Symbol,
            name: "sqrt".into(),
            detail: "not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "library symbol failed for \"sqrt\": not found"
        );
    }
}
