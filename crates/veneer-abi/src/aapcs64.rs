//! AAPCS64 (ARM 64-bit Procedure Call Standard) classification.

use crate::chunk::chunk_classes;
use crate::ArgumentClassification;
use veneer_types::{ReturnFlags, TypeDescriptor, TypeKind};

/// A recognised homogeneous floating-point aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hfa {
    /// Number of terminal floating elements (1 to 4).
    pub count: usize,
    /// Element kind: `Float` or `Double`.
    pub kind: TypeKind,
}

/// Tests a descriptor for the HFA property.
///
/// Walks the struct tree, descending into nested structs: the aggregate is
/// an HFA when every terminal member is a floating-point element of the
/// same width and the terminal count is 1 to 4. Byte size is irrelevant —
/// a 32-byte struct of four doubles is an HFA.
pub fn homogeneous_float_aggregate(desc: &TypeDescriptor) -> Option<Hfa> {
    if desc.kind != TypeKind::Struct {
        return None;
    }
    let mut kind = None;
    let mut count = 0usize;
    if !walk(desc, &mut kind, &mut count) {
        return None;
    }
    match (kind, count) {
        (Some(kind), 1..=4) => Some(Hfa { count, kind }),
        _ => None,
    }
}

fn walk(desc: &TypeDescriptor, kind: &mut Option<TypeKind>, count: &mut usize) -> bool {
    for member in &desc.members {
        match member.kind {
            TypeKind::Struct => {
                if !walk(member, kind, count) {
                    return false;
                }
            }
            TypeKind::Float | TypeKind::Double => {
                match kind {
                    None => *kind = Some(member.kind),
                    Some(k) if *k == member.kind => {}
                    _ => return false,
                }
                *count += 1;
                if *count > 4 {
                    return false;
                }
            }
            _ => return false,
        }
    }
    true
}

/// Classifies an argument under AAPCS64.
///
/// Composites are tested for the HFA property first; an HFA consumes one
/// FPR per element regardless of byte size. Non-HFA structs up to 16 bytes
/// pack into 8-byte chunks, each chunk classified all-float (FPR), all-int
/// or mixed (GPR). Non-HFA structs over 16 bytes pass by reference in a
/// single GPR.
pub fn classify_argument(desc: &TypeDescriptor) -> ArgumentClassification {
    match desc.kind {
        TypeKind::Float | TypeKind::Double => ArgumentClassification { gprs: 0, fprs: 1 },
        TypeKind::Struct => {
            if let Some(hfa) = homogeneous_float_aggregate(desc) {
                return ArgumentClassification {
                    gprs: 0,
                    fprs: hfa.count,
                };
            }
            if desc.size <= 16 {
                let mut cls = ArgumentClassification::default();
                for chunk in chunk_classes(desc) {
                    if chunk.uses_fpr() {
                        cls.fprs += 1;
                    } else {
                        cls.gprs += 1;
                    }
                }
                cls
            } else {
                ArgumentClassification { gprs: 1, fprs: 0 }
            }
        }
        _ => ArgumentClassification {
            gprs: desc.size.div_ceil(8),
            fprs: 0,
        },
    }
}

/// Classifies a return type under AAPCS64.
///
/// HFA returns come back in `d0`-`d3`, recorded as `HFA{2,3,4}` paired with
/// the element width (a single-element HFA is just the width flag).
/// Non-HFA structs up to 16 bytes return in `x0`/`x1` as `INT64`; larger
/// structs return through the implicit result register `x8`, flagged
/// `VIA_POINTER`.
pub fn classify_return(desc: &TypeDescriptor) -> ReturnFlags {
    match desc.kind {
        TypeKind::Void => ReturnFlags::VOID,
        TypeKind::Float => ReturnFlags::IN_XMM32,
        TypeKind::Double => ReturnFlags::IN_XMM64,
        TypeKind::Struct => {
            if let Some(hfa) = homogeneous_float_aggregate(desc) {
                let width = if hfa.kind == TypeKind::Float {
                    ReturnFlags::IN_XMM32
                } else {
                    ReturnFlags::IN_XMM64
                };
                return match hfa.count {
                    2 => ReturnFlags::HFA2 | width,
                    3 => ReturnFlags::HFA3 | width,
                    4 => ReturnFlags::HFA4 | width,
                    _ => width,
                };
            }
            if desc.size <= 16 {
                ReturnFlags::INT64
            } else {
                ReturnFlags::VOID | ReturnFlags::VIA_POINTER
            }
        }
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

    fn hfa_of_doubles(n: usize) -> T {
        T::structure(vec![T::DOUBLE; n]).unwrap()
    }

    fn hfa_of_floats(n: usize) -> T {
        T::structure(vec![T::FLOAT; n]).unwrap()
    }

    #[test]
    fn hfa_detection_counts_terminals() {
        for n in 1..=4 {
            let hfa = homogeneous_float_aggregate(&hfa_of_doubles(n)).unwrap();
            assert_eq!(hfa.count, n);
            assert_eq!(hfa.kind, TypeKind::Double);

            let hfa = homogeneous_float_aggregate(&hfa_of_floats(n)).unwrap();
            assert_eq!(hfa.count, n);
            assert_eq!(hfa.kind, TypeKind::Float);
        }
    }

    #[test]
    fn five_elements_is_not_an_hfa() {
        assert_eq!(homogeneous_float_aggregate(&hfa_of_doubles(5)), None);
    }

    #[test]
    fn mixed_widths_are_not_an_hfa() {
        let desc = T::structure(vec![T::FLOAT, T::DOUBLE]).unwrap();
        assert_eq!(homogeneous_float_aggregate(&desc), None);
    }

    #[test]
    fn integer_members_break_the_hfa_property() {
        let desc = T::structure(vec![T::DOUBLE, T::UINT64]).unwrap();
        assert_eq!(homogeneous_float_aggregate(&desc), None);
    }

    #[test]
    fn nested_hfa_emerges_after_recursion() {
        // Rectangle: {origin: {x, y: f64}, size: {w, h: f64}}
        let point = T::structure(vec![T::DOUBLE, T::DOUBLE]).unwrap();
        let rect = T::structure(vec![point.clone(), point]).unwrap();
        assert_eq!(rect.size, 32);
        let hfa = homogeneous_float_aggregate(&rect).unwrap();
        assert_eq!(hfa.count, 4);
        assert_eq!(hfa.kind, TypeKind::Double);
    }

    #[test]
    fn large_hfa_still_takes_fprs() {
        // 32 bytes of doubles: HFA, not "too large".
        let desc = hfa_of_doubles(4);
        assert_eq!(desc.size, 32);
        assert_eq!(
            classify_argument(&desc),
            ArgumentClassification { gprs: 0, fprs: 4 }
        );
    }

    #[test]
    fn non_hfa_small_structs_pack_by_chunk() {
        let ints = T::structure(vec![T::UINT64, T::UINT64]).unwrap();
        assert_eq!(
            classify_argument(&ints),
            ArgumentClassification { gprs: 2, fprs: 0 }
        );

        let int_then_double = T::structure(vec![T::UINT64, T::DOUBLE]).unwrap();
        assert_eq!(
            classify_argument(&int_then_double),
            ArgumentClassification { gprs: 1, fprs: 1 }
        );

        // u32 + f32 share a mixed chunk, which goes to a GPR.
        let mixed = T::structure(vec![T::UINT32, T::FLOAT]).unwrap();
        assert_eq!(
            classify_argument(&mixed),
            ArgumentClassification { gprs: 1, fprs: 0 }
        );
    }

    #[test]
    fn large_non_hfa_structs_pass_by_reference() {
        let desc = T::structure(vec![T::UINT64, T::UINT64, T::UINT8]).unwrap();
        assert_eq!(desc.size, 24);
        assert_eq!(
            classify_argument(&desc),
            ArgumentClassification { gprs: 1, fprs: 0 }
        );
    }

    #[test]
    fn hfa_return_flags_pair_count_with_width() {
        assert_eq!(
            classify_return(&hfa_of_doubles(2)),
            ReturnFlags::HFA2 | ReturnFlags::IN_XMM64
        );
        assert_eq!(
            classify_return(&hfa_of_doubles(3)),
            ReturnFlags::HFA3 | ReturnFlags::IN_XMM64
        );
        assert_eq!(
            classify_return(&hfa_of_doubles(4)),
            ReturnFlags::HFA4 | ReturnFlags::IN_XMM64
        );
        assert_eq!(
            classify_return(&hfa_of_floats(4)),
            ReturnFlags::HFA4 | ReturnFlags::IN_XMM32
        );
        assert_eq!(classify_return(&hfa_of_doubles(1)), ReturnFlags::IN_XMM64);
    }

    #[test]
    fn nested_hfa_return_matches_flat_hfa() {
        let point = T::structure(vec![T::DOUBLE, T::DOUBLE]).unwrap();
        let rect = T::structure(vec![point.clone(), point]).unwrap();
        assert_eq!(
            classify_return(&rect),
            ReturnFlags::HFA4 | ReturnFlags::IN_XMM64
        );
    }

    #[test]
    fn struct_return_size_boundaries() {
        let eight = T::structure(vec![T::UINT64]).unwrap();
        assert_eq!(classify_return(&eight), ReturnFlags::INT64);

        let nine = T::structure(vec![T::UINT64, T::UINT8]).unwrap();
        assert_eq!(nine.size, 16);
        assert_eq!(classify_return(&nine), ReturnFlags::INT64);

        let seventeen = T::structure(vec![T::UINT64, T::UINT64, T::UINT8]).unwrap();
        assert_eq!(
            classify_return(&seventeen),
            ReturnFlags::VOID | ReturnFlags::VIA_POINTER
        );
    }

    #[test]
    fn scalar_arguments() {
        assert_eq!(
            classify_argument(&T::UINT64),
            ArgumentClassification { gprs: 1, fprs: 0 }
        );
        assert_eq!(
            classify_argument(&T::FLOAT),
            ArgumentClassification { gprs: 0, fprs: 1 }
        );
        assert_eq!(
            classify_argument(&T::POINTER),
            ArgumentClassification { gprs: 1, fprs: 0 }
        );
    }
}
