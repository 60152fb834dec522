//! Type vocabulary for the veneer FFI engine.
//!
//! This crate defines everything callers use to describe native function
//! signatures:
//! - **`TypeKind` / `TypeDescriptor`**: primitive, pointer, and composite
//!   value descriptions with size, alignment, and struct layout
//! - **`CallingConvention`**: the closed set of supported conventions plus a
//!   `Default` sentinel resolved at interface-compile time
//! - **`ReturnFlags`**: the compiled return-passing decision
//! - **`CallInterface`**: the immutable, reusable description of one native
//!   function signature
//!
//! Struct layout uses the shared declaration-order rule on every platform:
//! offsets are rounded up to member alignment, the final size is rounded up
//! to the struct alignment, and the struct alignment is the maximum member
//! alignment. Platform packing pragmas are not honoured.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod convention;
mod descriptor;
mod error;
mod flags;
mod interface;

pub use convention::CallingConvention;
pub use descriptor::{is_valid, layout_of, TypeDescriptor, TypeKind};
pub use error::TypeError;
pub use flags::ReturnFlags;
pub use interface::CallInterface;

/// Rounds `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two.
pub const fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::align_up;

    #[test]
    fn align_up_powers_of_two() {
        assert_eq!(align_up(0, 8), 0);
        assert_eq!(align_up(1, 8), 8);
        assert_eq!(align_up(8, 8), 8);
        assert_eq!(align_up(9, 8), 16);
        assert_eq!(align_up(5, 4), 8);
        assert_eq!(align_up(17, 16), 32);
    }
}
