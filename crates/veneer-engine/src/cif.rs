//! The call interface compiler.

use veneer_abi::Abi;
use veneer_types::{
    align_up, is_valid, layout_of, CallInterface, CallingConvention, TypeDescriptor, TypeError,
    TypeKind,
};

use crate::error::FfiError;

/// Compiles a `(convention, return type, argument types)` triple into a
/// reusable [`CallInterface`].
///
/// The `Default` convention resolves to the host's native convention.
/// Struct descriptors whose layout has not been computed are laid out here
/// (idempotently). The produced interface is immutable and safe to share
/// across threads; concurrent invocations must only supply distinct
/// argument buffers.
///
/// `stack_bytes` on the result is a conservative upper bound of the
/// outgoing stack area — each argument contributes its size rounded up to
/// 8 bytes after alignment — raised to the 32-byte shadow-space floor under
/// the Windows conventions. Actual placement is decided at invocation time.
pub fn compile_call_interface(
    convention: CallingConvention,
    return_type: &TypeDescriptor,
    arg_types: &[TypeDescriptor],
) -> Result<CallInterface, FfiError> {
    let convention = convention.resolve();

    let mut return_type = return_type.clone();
    if return_type.kind == TypeKind::Struct && return_type.size == 0 {
        layout_of(&mut return_type)?;
    }
    if !is_valid(&return_type) {
        return Err(TypeError::UnsupportedKind {
            context: "return_type",
            kind: return_type.kind.raw(),
        }
        .into());
    }

    let mut resolved_args = Vec::with_capacity(arg_types.len());
    let mut stack_bytes = 0usize;
    for (index, ty) in arg_types.iter().enumerate() {
        let mut ty = ty.clone();
        if ty.kind == TypeKind::Struct && ty.size == 0 {
            layout_of(&mut ty)?;
        }
        if !is_valid(&ty) {
            return Err(TypeError::UnsupportedMember {
                context: "arg_types",
                kind: ty.kind.raw(),
                index,
            }
            .into());
        }
        stack_bytes = align_up(stack_bytes, ty.alignment);
        stack_bytes += align_up(ty.size, 8);
        resolved_args.push(ty);
    }

    let abi = Abi::for_host(convention).ok_or_else(FfiError::host_platform)?;
    let flags = abi.classify_return(&return_type);

    if convention.is_windows() && stack_bytes < 32 {
        stack_bytes = 32;
    }

    log::debug!(
        "compiled call interface: {convention:?}, {} args, return {:?}, flags {:#x}, {} stack bytes",
        resolved_args.len(),
        return_type.kind,
        flags.bits(),
        stack_bytes
    );

    Ok(CallInterface::new(
        convention,
        resolved_args,
        return_type,
        flags,
        stack_bytes,
    ))
}
