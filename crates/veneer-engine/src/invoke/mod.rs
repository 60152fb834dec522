//! The invocation engine.
//!
//! Performs one native call described by a compiled [`CallInterface`]
//! against a caller-supplied function address: stages argument values into
//! the ABI's registers and outgoing stack area, transfers control through a
//! per-convention assembly trampoline, and writes the demarshalled result
//! into the caller's buffer.
//!
//! Argument staging and return demarshalling are pure data transforms and
//! compile on every host (they are unit-tested off-target); only the
//! trampolines themselves are gated on the target triple.

mod bridge;
mod pack;
mod ret;

pub(crate) mod aapcs64;
pub(crate) mod sysv;
pub(crate) mod win64;

use std::ffi::c_void;

use veneer_types::CallInterface;

use crate::cancel::CancelToken;
use crate::error::FfiError;
use crate::library::SymbolAddress;

/// Calls the native function at `func` as described by `cif`.
///
/// `result` receives the demarshalled return value and may be null for a
/// `void` return (it is left untouched when null). `args` must hold exactly
/// `cif.arg_count()` non-null pointers, where **`args[i]` points to the
/// i-th argument value** — for a pointer-typed argument, `args[i]` is the
/// address of the pointer variable.
///
/// # Safety
///
/// The caller must guarantee that `func` addresses a function with exactly
/// the signature described by `cif`, that every `args[i]` addresses live
/// storage of the declared type, and that `result` (when non-null) is
/// writable and at least as large as the return type. A mismatch is
/// undefined behaviour; a fault inside the callee is fatal to the process.
pub unsafe fn call(
    cif: &CallInterface,
    func: SymbolAddress,
    result: *mut c_void,
    args: &[*const c_void],
) -> Result<(), FfiError> {
    if func.is_null() {
        return Err(FfiError::invalid("fn", "function pointer must not be null"));
    }
    if args.len() != cif.arg_count() {
        return Err(FfiError::invalid(
            "argv",
            "argument pointer count does not match the call interface",
        ));
    }
    for (index, arg) in args.iter().enumerate() {
        if arg.is_null() {
            return Err(FfiError::invalid_at(
                "argv",
                index,
                "argument pointer must not be null",
            ));
        }
    }
    dispatch(cif, func, result, args)
}

/// [`call`] with a cancellation gate.
///
/// The token is checked once, before any marshalling; a tripped token
/// returns its error unchanged. Once the trampoline has jumped to native
/// code no cancellation is possible.
///
/// # Safety
///
/// Same contract as [`call`].
pub unsafe fn call_with_cancellation(
    token: &CancelToken,
    cif: &CallInterface,
    func: SymbolAddress,
    result: *mut c_void,
    args: &[*const c_void],
) -> Result<(), FfiError> {
    if let Some(err) = token.error() {
        return Err(err);
    }
    call(cif, func, result, args)
}

#[cfg(all(target_arch = "x86_64", unix))]
unsafe fn dispatch(
    cif: &CallInterface,
    func: SymbolAddress,
    result: *mut c_void,
    args: &[*const c_void],
) -> Result<(), FfiError> {
    use veneer_types::CallingConvention;

    match cif.convention() {
        CallingConvention::SysV => sysv::invoke(cif, func, result, args),
        other => Err(FfiError::convention_mismatch(
            other,
            "Windows conventions require a Windows host",
        )),
    }
}

#[cfg(all(target_arch = "x86_64", windows))]
unsafe fn dispatch(
    cif: &CallInterface,
    func: SymbolAddress,
    result: *mut c_void,
    args: &[*const c_void],
) -> Result<(), FfiError> {
    use veneer_types::CallingConvention;

    match cif.convention() {
        CallingConvention::Win64 | CallingConvention::GnuWin64 => {
            win64::invoke(cif, func, result, args)
        }
        other => Err(FfiError::convention_mismatch(
            other,
            "the System V convention requires a Unix host",
        )),
    }
}

#[cfg(target_arch = "aarch64")]
unsafe fn dispatch(
    cif: &CallInterface,
    func: SymbolAddress,
    result: *mut c_void,
    args: &[*const c_void],
) -> Result<(), FfiError> {
    // Every convention maps onto AAPCS64 on this architecture (Windows on
    // ARM64 is experimental but uses the same register discipline here).
    aapcs64::invoke(cif, func, result, args)
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
unsafe fn dispatch(
    _cif: &CallInterface,
    _func: SymbolAddress,
    _result: *mut c_void,
    _args: &[*const c_void],
) -> Result<(), FfiError> {
    Err(FfiError::host_platform())
}
