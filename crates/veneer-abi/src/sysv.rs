//! System V AMD64 classification.

use crate::chunk::contains_float;
use crate::ArgumentClassification;
use veneer_types::{ReturnFlags, TypeDescriptor, TypeKind};

/// Classifies an argument under the System V AMD64 rules.
///
/// Integer and pointer scalars claim `ceil(size / 8)` general-purpose
/// registers; `float` and `double` claim one SSE register each. Structs up
/// to 16 bytes flatten into GPR chunks, except that a struct containing a
/// floating-point field trades one GPR for one SSE register. Larger structs
/// keep the `ceil(size / 8)` GPR accounting and spill at invocation time.
pub fn classify_argument(desc: &TypeDescriptor) -> ArgumentClassification {
    match desc.kind {
        TypeKind::Float | TypeKind::Double => ArgumentClassification { gprs: 0, fprs: 1 },
        TypeKind::Struct => {
            let mut gprs = desc.size.div_ceil(8);
            let mut fprs = 0;
            if desc.size <= 16 && contains_float(desc) {
                gprs = gprs.saturating_sub(1);
                fprs = 1;
            }
            ArgumentClassification { gprs, fprs }
        }
        _ => ArgumentClassification {
            gprs: desc.size.div_ceil(8),
            fprs: 0,
        },
    }
}

/// Classifies a return type under the x86_64 rules (shared by the System V
/// and Windows conventions).
///
/// Scalars that fit a register come back as `INT64` (integers, pointers) or
/// `IN_XMM32`/`IN_XMM64` (floats); structs up to 8 bytes pack into `INT64`;
/// everything larger is flagged `VIA_POINTER`.
pub fn classify_return(desc: &TypeDescriptor) -> ReturnFlags {
    match desc.kind {
        TypeKind::Void => ReturnFlags::VOID,
        TypeKind::Float => ReturnFlags::IN_XMM32,
        TypeKind::Double => ReturnFlags::IN_XMM64,
        _ => {
            if desc.size <= 8 {
                ReturnFlags::INT64
            } else {
                ReturnFlags::VOID | ReturnFlags::VIA_POINTER
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veneer_types::TypeDescriptor as T;

    #[test]
    fn scalars_claim_one_gpr() {
        for desc in [T::UINT8, T::SINT32, T::UINT64, T::POINTER, T::INT] {
            assert_eq!(
                classify_argument(&desc),
                ArgumentClassification { gprs: 1, fprs: 0 },
                "{desc:?}"
            );
        }
    }

    #[test]
    fn floats_claim_one_sse_register() {
        assert_eq!(
            classify_argument(&T::FLOAT),
            ArgumentClassification { gprs: 0, fprs: 1 }
        );
        assert_eq!(
            classify_argument(&T::DOUBLE),
            ArgumentClassification { gprs: 0, fprs: 1 }
        );
    }

    #[test]
    fn integer_structs_flatten_into_gprs() {
        let eight = T::structure(vec![T::UINT32, T::UINT32]).unwrap();
        assert_eq!(
            classify_argument(&eight),
            ArgumentClassification { gprs: 1, fprs: 0 }
        );

        let nine = T::structure(vec![T::UINT64, T::UINT8]).unwrap();
        assert_eq!(nine.size, 16);
        assert_eq!(
            classify_argument(&nine),
            ArgumentClassification { gprs: 2, fprs: 0 }
        );
    }

    #[test]
    fn float_bearing_struct_trades_a_gpr_for_an_sse_register() {
        let desc = T::structure(vec![T::UINT64, T::DOUBLE]).unwrap();
        assert_eq!(
            classify_argument(&desc),
            ArgumentClassification { gprs: 1, fprs: 1 }
        );
    }

    #[test]
    fn large_structs_keep_gpr_accounting() {
        let seventeen = T::structure(vec![T::UINT64, T::UINT64, T::UINT8]).unwrap();
        assert_eq!(seventeen.size, 24);
        assert_eq!(
            classify_argument(&seventeen),
            ArgumentClassification { gprs: 3, fprs: 0 }
        );
    }

    #[test]
    fn return_classification_table() {
        assert_eq!(classify_return(&T::VOID), ReturnFlags::VOID);
        assert_eq!(classify_return(&T::FLOAT), ReturnFlags::IN_XMM32);
        assert_eq!(classify_return(&T::DOUBLE), ReturnFlags::IN_XMM64);
        assert_eq!(classify_return(&T::SINT32), ReturnFlags::INT64);
        assert_eq!(classify_return(&T::POINTER), ReturnFlags::INT64);

        let small = T::structure(vec![T::UINT32, T::UINT32]).unwrap();
        assert_eq!(classify_return(&small), ReturnFlags::INT64);

        let large = T::structure(vec![T::UINT64, T::UINT64]).unwrap();
        assert_eq!(
            classify_return(&large),
            ReturnFlags::VOID | ReturnFlags::VIA_POINTER
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let desc = T::structure(vec![T::FLOAT, T::UINT32, T::UINT64]).unwrap();
        assert_eq!(classify_argument(&desc), classify_argument(&desc));
        assert_eq!(classify_return(&desc), classify_return(&desc));
    }
}
