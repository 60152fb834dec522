//! Validation errors for type descriptors.

use thiserror::Error;

/// Errors produced while validating or laying out a `TypeDescriptor`.
///
/// Each variant carries the raw kind value and enough context for
/// programmatic dispatch (which input failed, and at which member index
/// where applicable).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// A descriptor's kind is outside the closed `TypeKind` set, or a
    /// scalar descriptor carried struct members.
    #[error("type validation failed for {context}: unsupported kind {kind}")]
    UnsupportedKind {
        /// Which input the descriptor arrived through.
        context: &'static str,
        /// Raw kind value of the offending descriptor.
        kind: u32,
    },

    /// A member descriptor at `index` failed validation.
    #[error("type validation failed for {context}[{index}]: unsupported kind {kind}")]
    UnsupportedMember {
        /// Which input the composite arrived through.
        context: &'static str,
        /// Raw kind value of the offending member.
        kind: u32,
        /// Position of the member in its parent.
        index: usize,
    },

    /// A struct descriptor has no members. Empty structs are not
    /// representable.
    #[error("type validation failed for {context}: struct has no members")]
    MissingMembers {
        /// Which input the struct arrived through.
        context: &'static str,
    },
}

impl TypeError {
    /// The member index the error refers to, if any.
    pub fn index(&self) -> Option<usize> {
        match self {
            TypeError::UnsupportedMember { index, .. } => Some(*index),
            _ => None,
        }
    }
}
