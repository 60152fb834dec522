//! Microsoft x64 classification.

use crate::ArgumentClassification;
use veneer_types::{ReturnFlags, TypeDescriptor, TypeKind};

/// True when a composite of this size passes by value in a register slot.
/// Everything else passes by reference.
pub fn fits_register_slot(size: usize) -> bool {
    matches!(size, 1 | 2 | 4 | 8)
}

/// Classifies an argument under the Win64 rules.
///
/// Register assignment is positional: the k-th argument occupies slot k of
/// whichever register class matches its type, so every argument claims
/// exactly one register of one class. Composites whose size is not 1, 2, 4,
/// or 8 bytes pass by reference and still claim a single GPR slot for the
/// pointer.
pub fn classify_argument(desc: &TypeDescriptor) -> ArgumentClassification {
    match desc.kind {
        TypeKind::Float | TypeKind::Double => ArgumentClassification { gprs: 0, fprs: 1 },
        _ => ArgumentClassification { gprs: 1, fprs: 0 },
    }
}

/// Classifies a return type. Win64 shares the x86_64 return table with
/// System V.
pub fn classify_return(desc: &TypeDescriptor) -> ReturnFlags {
    crate::sysv::classify_return(desc)
}
