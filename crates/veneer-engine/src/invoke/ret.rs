//! Return-value demarshalling.

use std::ffi::c_void;

use veneer_types::{CallInterface, ReturnFlags, TypeKind};

use crate::error::FfiError;

/// Writes the low `size` bytes of a register value into `dest`.
#[cfg_attr(
    not(any(target_arch = "x86_64", target_arch = "aarch64")),
    allow(dead_code)
)]
unsafe fn write_truncated(dest: *mut u8, value: u64, size: usize) {
    let bytes = value.to_le_bytes();
    std::ptr::copy_nonoverlapping(bytes.as_ptr(), dest, size.min(8));
}

/// Demarshals an x86_64 return (shared by the System V and Windows
/// conventions).
///
/// `ret_int` is the first integer return register, `ret_sse` the first
/// float return register. A null result buffer skips the write. For a
/// `VIA_POINTER` return, the value delivered in the integer register is
/// stored into the buffer as a pointer-sized value.
///
/// # Safety
///
/// `result`, when non-null, must be writable and at least as large as the
/// return type.
#[cfg_attr(not(target_arch = "x86_64"), allow(dead_code))]
pub(crate) unsafe fn write_amd64_return(
    cif: &CallInterface,
    result: *mut c_void,
    ret_int: u64,
    ret_sse: u64,
) -> Result<(), FfiError> {
    let return_type = cif.return_type();
    if result.is_null() || return_type.kind == TypeKind::Void {
        return Ok(());
    }

    if cif.flags().contains(ReturnFlags::VIA_POINTER) {
        (result as *mut usize).write_unaligned(ret_int as usize);
        return Ok(());
    }

    match return_type.kind {
        TypeKind::Float => (result as *mut u32).write_unaligned(ret_sse as u32),
        TypeKind::Double => (result as *mut u64).write_unaligned(ret_sse),
        TypeKind::UInt8 | TypeKind::SInt8 => (result as *mut u8).write_unaligned(ret_int as u8),
        TypeKind::UInt16 | TypeKind::SInt16 => {
            (result as *mut u16).write_unaligned(ret_int as u16)
        }
        TypeKind::UInt32 | TypeKind::SInt32 | TypeKind::Int => {
            (result as *mut u32).write_unaligned(ret_int as u32)
        }
        TypeKind::UInt64 | TypeKind::SInt64 => (result as *mut u64).write_unaligned(ret_int),
        TypeKind::Pointer => (result as *mut usize).write_unaligned(ret_int as usize),
        TypeKind::Struct if return_type.size <= 8 => {
            write_truncated(result as *mut u8, ret_int, return_type.size)
        }
        _ => {
            return Err(FfiError::UnsupportedReturnType {
                kind: return_type.kind,
                size: return_type.size,
            })
        }
    }
    Ok(())
}

/// Demarshals an AAPCS64 return.
///
/// `ret_int` holds `x0`/`x1`, `ret_fpr` holds the raw `d0`-`d3` bit
/// patterns. A `VIA_POINTER` return needs no work here: the callee wrote
/// through the buffer address staged in `x8`. HFA returns copy one element
/// per float register, at the width recorded in the flags, into the buffer
/// as a contiguous array.
///
/// # Safety
///
/// `result`, when non-null, must be writable and at least as large as the
/// return type.
#[cfg_attr(not(target_arch = "aarch64"), allow(dead_code))]
pub(crate) unsafe fn write_aapcs64_return(
    cif: &CallInterface,
    result: *mut c_void,
    ret_int: [u64; 2],
    ret_fpr: [u64; 4],
) -> Result<(), FfiError> {
    let return_type = cif.return_type();
    if result.is_null() || return_type.kind == TypeKind::Void {
        return Ok(());
    }

    let flags = cif.flags();
    if flags.contains(ReturnFlags::VIA_POINTER) {
        return Ok(());
    }

    if flags.in_float_register() {
        let count = flags.hfa_count().unwrap_or(1);
        if flags.base() == ReturnFlags::IN_XMM32 {
            for (index, pattern) in ret_fpr.iter().take(count).enumerate() {
                (result as *mut u32).add(index).write_unaligned(*pattern as u32);
            }
        } else {
            for (index, pattern) in ret_fpr.iter().take(count).enumerate() {
                (result as *mut u64).add(index).write_unaligned(*pattern);
            }
        }
        return Ok(());
    }

    match return_type.kind {
        TypeKind::UInt8 | TypeKind::SInt8 => (result as *mut u8).write_unaligned(ret_int[0] as u8),
        TypeKind::UInt16 | TypeKind::SInt16 => {
            (result as *mut u16).write_unaligned(ret_int[0] as u16)
        }
        TypeKind::UInt32 | TypeKind::SInt32 | TypeKind::Int => {
            (result as *mut u32).write_unaligned(ret_int[0] as u32)
        }
        TypeKind::UInt64 | TypeKind::SInt64 => (result as *mut u64).write_unaligned(ret_int[0]),
        TypeKind::Pointer => (result as *mut usize).write_unaligned(ret_int[0] as usize),
        TypeKind::Struct if return_type.size <= 8 => {
            write_truncated(result as *mut u8, ret_int[0], return_type.size)
        }
        TypeKind::Struct if return_type.size <= 16 => {
            // x0 carries bytes 0-7, x1 the remainder.
            write_truncated(result as *mut u8, ret_int[0], 8);
            write_truncated(
                (result as *mut u8).add(8),
                ret_int[1],
                return_type.size - 8,
            );
        }
        _ => {
            return Err(FfiError::UnsupportedReturnType {
                kind: return_type.kind,
                size: return_type.size,
            })
        }
    }
    Ok(())
}
