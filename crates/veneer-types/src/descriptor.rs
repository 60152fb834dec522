//! Type descriptors and struct layout.

use crate::{align_up, TypeError};

/// Closed set of value categories the engine can marshal.
///
/// `Int` is the platform's generic C `int` (4 bytes); `Pointer` is the host
/// pointer width. Everything else is fixed-width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TypeKind {
    /// No value. Only meaningful as a return type.
    Void = 0,
    /// Generic C `int` (4 bytes, signed).
    Int,
    /// IEEE-754 single precision.
    Float,
    /// IEEE-754 double precision.
    Double,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Signed 8-bit integer.
    SInt8,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 16-bit integer.
    SInt16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 32-bit integer.
    SInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// Signed 64-bit integer.
    SInt64,
    /// Composite type; layout computed from `members`.
    Struct,
    /// Untyped data or code pointer.
    Pointer,
}

impl TypeKind {
    /// Raw discriminant, for error reporting.
    pub const fn raw(self) -> u32 {
        self as u32
    }

    /// True for `Float` and `Double`.
    pub const fn is_float(self) -> bool {
        matches!(self, TypeKind::Float | TypeKind::Double)
    }

    /// True for the signed integer kinds (including generic `Int`).
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            TypeKind::Int
                | TypeKind::SInt8
                | TypeKind::SInt16
                | TypeKind::SInt32
                | TypeKind::SInt64
        )
    }
}

/// Describes one value's machine representation.
///
/// Scalars have their size and alignment fixed by kind; the canonical
/// descriptors below should be used for them. A struct descriptor owns its
/// member descriptors in declaration order, and its size and alignment are
/// computed by [`layout_of`] — [`TypeDescriptor::structure`] does this at
/// construction time. A struct assembled by hand with zeroed size and
/// alignment is laid out (idempotently) when a call interface is compiled
/// from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Value category.
    pub kind: TypeKind,
    /// Size in bytes. Zero on a struct means "layout not yet computed".
    pub size: usize,
    /// Alignment requirement in bytes.
    pub alignment: usize,
    /// Member descriptors, in declaration order. Empty unless `kind` is
    /// `Struct`.
    pub members: Vec<TypeDescriptor>,
}

impl TypeDescriptor {
    const fn scalar(kind: TypeKind, size: usize, alignment: usize) -> Self {
        TypeDescriptor {
            kind,
            size,
            alignment,
            members: Vec::new(),
        }
    }

    /// The void return type.
    pub const VOID: Self = Self::scalar(TypeKind::Void, 1, 1);
    /// Generic C `int`.
    pub const INT: Self = Self::scalar(TypeKind::Int, 4, 4);
    /// `float`.
    pub const FLOAT: Self = Self::scalar(TypeKind::Float, 4, 4);
    /// `double`.
    pub const DOUBLE: Self = Self::scalar(TypeKind::Double, 8, 8);
    /// `uint8_t`.
    pub const UINT8: Self = Self::scalar(TypeKind::UInt8, 1, 1);
    /// `int8_t`.
    pub const SINT8: Self = Self::scalar(TypeKind::SInt8, 1, 1);
    /// `uint16_t`.
    pub const UINT16: Self = Self::scalar(TypeKind::UInt16, 2, 2);
    /// `int16_t`.
    pub const SINT16: Self = Self::scalar(TypeKind::SInt16, 2, 2);
    /// `uint32_t`.
    pub const UINT32: Self = Self::scalar(TypeKind::UInt32, 4, 4);
    /// `int32_t`.
    pub const SINT32: Self = Self::scalar(TypeKind::SInt32, 4, 4);
    /// `uint64_t`.
    pub const UINT64: Self = Self::scalar(TypeKind::UInt64, 8, 8);
    /// `int64_t`.
    pub const SINT64: Self = Self::scalar(TypeKind::SInt64, 8, 8);
    /// Data or code pointer, host width.
    pub const POINTER: Self = Self::scalar(
        TypeKind::Pointer,
        core::mem::size_of::<*const ()>(),
        core::mem::align_of::<*const ()>(),
    );

    /// Builds a struct descriptor and computes its layout immediately.
    ///
    /// Members are laid out in declaration order; nested structs are
    /// resolved first.
    pub fn structure(members: Vec<TypeDescriptor>) -> Result<Self, TypeError> {
        let mut desc = TypeDescriptor {
            kind: TypeKind::Struct,
            size: 0,
            alignment: 0,
            members,
        };
        layout_of(&mut desc)?;
        Ok(desc)
    }
}

/// Checks a descriptor against the closed kind set.
///
/// Structs additionally require at least one member (all of them valid);
/// scalars must not carry members.
pub fn is_valid(desc: &TypeDescriptor) -> bool {
    match desc.kind {
        TypeKind::Struct => !desc.members.is_empty() && desc.members.iter().all(is_valid),
        _ => desc.members.is_empty(),
    }
}

/// Computes (or recomputes) a struct descriptor's size and alignment.
///
/// Idempotent: running it again on a resolved descriptor produces the same
/// layout. Scalars pass through unchanged. Fails if a struct has no members
/// or contains an invalid member.
pub fn layout_of(desc: &mut TypeDescriptor) -> Result<(), TypeError> {
    layout(desc, "type")
}

fn layout(desc: &mut TypeDescriptor, context: &'static str) -> Result<(), TypeError> {
    if desc.kind != TypeKind::Struct {
        if is_valid(desc) {
            return Ok(());
        }
        return Err(TypeError::UnsupportedKind {
            context,
            kind: desc.kind.raw(),
        });
    }
    if desc.members.is_empty() {
        return Err(TypeError::MissingMembers { context });
    }

    let mut size = 0usize;
    let mut alignment = 0usize;
    for (index, member) in desc.members.iter_mut().enumerate() {
        if member.kind == TypeKind::Struct {
            layout(member, "struct member")?;
        } else if !is_valid(member) {
            return Err(TypeError::UnsupportedMember {
                context,
                kind: member.kind.raw(),
                index,
            });
        }
        size = align_up(size, member.alignment);
        size += member.size;
        if member.alignment > alignment {
            alignment = member.alignment;
        }
    }

    desc.alignment = alignment;
    desc.size = align_up(size, alignment);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_descriptors_have_fixed_layout() {
        assert_eq!(TypeDescriptor::UINT8.size, 1);
        assert_eq!(TypeDescriptor::SINT16.alignment, 2);
        assert_eq!(TypeDescriptor::INT.size, 4);
        assert_eq!(TypeDescriptor::DOUBLE.size, 8);
        assert_eq!(
            TypeDescriptor::POINTER.size,
            core::mem::size_of::<*const ()>()
        );
    }

    #[test]
    fn layout_inserts_padding_between_members() {
        let desc = TypeDescriptor::structure(vec![
            TypeDescriptor::UINT8,
            TypeDescriptor::UINT32,
        ])
        .unwrap();
        assert_eq!(desc.size, 8);
        assert_eq!(desc.alignment, 4);
    }

    #[test]
    fn layout_pads_tail_to_alignment() {
        let desc = TypeDescriptor::structure(vec![
            TypeDescriptor::UINT32,
            TypeDescriptor::UINT8,
        ])
        .unwrap();
        assert_eq!(desc.size, 8);
        assert_eq!(desc.alignment, 4);
    }

    #[test]
    fn layout_recurses_into_nested_structs() {
        let inner = TypeDescriptor {
            kind: TypeKind::Struct,
            size: 0,
            alignment: 0,
            members: vec![TypeDescriptor::DOUBLE, TypeDescriptor::DOUBLE],
        };
        let desc = TypeDescriptor::structure(vec![inner.clone(), inner]).unwrap();
        assert_eq!(desc.size, 32);
        assert_eq!(desc.alignment, 8);
        assert_eq!(desc.members[0].size, 16);
    }

    #[test]
    fn layout_is_idempotent() {
        let mut desc = TypeDescriptor::structure(vec![
            TypeDescriptor::UINT8,
            TypeDescriptor::DOUBLE,
            TypeDescriptor::UINT16,
        ])
        .unwrap();
        let first = desc.clone();
        layout_of(&mut desc).unwrap();
        assert_eq!(desc, first);
        assert_eq!(desc.size % desc.alignment, 0);
    }

    #[test]
    fn size_is_multiple_of_alignment() {
        let samples = [
            vec![TypeDescriptor::UINT8],
            vec![TypeDescriptor::UINT8, TypeDescriptor::UINT64],
            vec![TypeDescriptor::FLOAT, TypeDescriptor::UINT8],
            vec![
                TypeDescriptor::SINT16,
                TypeDescriptor::SINT16,
                TypeDescriptor::UINT8,
            ],
        ];
        for members in samples {
            let desc = TypeDescriptor::structure(members).unwrap();
            assert_eq!(desc.size % desc.alignment, 0, "{desc:?}");
            let max_align = desc.members.iter().map(|m| m.alignment).max().unwrap();
            assert_eq!(desc.alignment, max_align);
        }
    }

    #[test]
    fn empty_struct_is_rejected() {
        let err = TypeDescriptor::structure(Vec::new()).unwrap_err();
        assert_eq!(err, TypeError::MissingMembers { context: "type" });
    }

    #[test]
    fn nested_empty_struct_is_rejected() {
        let inner = TypeDescriptor {
            kind: TypeKind::Struct,
            size: 0,
            alignment: 0,
            members: Vec::new(),
        };
        let err = TypeDescriptor::structure(vec![TypeDescriptor::UINT32, inner]).unwrap_err();
        assert!(matches!(err, TypeError::MissingMembers { .. }));
    }

    #[test]
    fn scalar_with_members_is_invalid() {
        let bogus = TypeDescriptor {
            kind: TypeKind::UInt32,
            size: 4,
            alignment: 4,
            members: vec![TypeDescriptor::UINT8],
        };
        assert!(!is_valid(&bogus));
    }
}
