//! Calls into the platform C library through the dynamic loader.
//!
//! These exercise the documented loader contract end to end: open the
//! system library, resolve real symbols, and call them through compiled
//! interfaces.

#![cfg(all(
    any(target_os = "linux", target_os = "macos", target_os = "freebsd"),
    any(target_arch = "x86_64", target_arch = "aarch64")
))]

use std::ffi::c_void;

use veneer_engine::{
    call, compile_call_interface, free_library, get_symbol, load_library, CallingConvention,
    TypeDescriptor as T,
};

#[cfg(target_os = "linux")]
const LIBC: &str = "libc.so.6";
#[cfg(target_os = "linux")]
const LIBM: &str = "libm.so.6";

#[cfg(target_os = "macos")]
const LIBC: &str = "libSystem.B.dylib";
#[cfg(target_os = "macos")]
const LIBM: &str = "libSystem.B.dylib";

#[cfg(target_os = "freebsd")]
const LIBC: &str = "libc.so.7";
#[cfg(target_os = "freebsd")]
const LIBM: &str = "libm.so.5";

#[test]
fn strlen_of_a_static_string() {
    let lib = load_library(LIBC).unwrap();
    let strlen = unsafe { get_symbol(lib, "strlen") }.unwrap();

    let cif =
        compile_call_interface(CallingConvention::Default, &T::UINT64, &[T::POINTER]).unwrap();

    let text = b"Hello, WebGPU!\0";
    let p = text.as_ptr();
    let mut len = 0u64;
    unsafe {
        call(
            &cif,
            strlen,
            &mut len as *mut u64 as *mut c_void,
            &[&p as *const *const u8 as *const c_void],
        )
        .unwrap();
    }
    assert_eq!(len, 14);
}

#[test]
fn abs_from_libc() {
    let lib = load_library(LIBC).unwrap();
    let abs = unsafe { get_symbol(lib, "abs") }.unwrap();

    let cif =
        compile_call_interface(CallingConvention::Default, &T::SINT32, &[T::SINT32]).unwrap();

    for (input, want) in [(-42i32, 42i32), (0, 0), (42, 42)] {
        let mut result = 0i32;
        unsafe {
            call(
                &cif,
                abs,
                &mut result as *mut i32 as *mut c_void,
                &[&input as *const i32 as *const c_void],
            )
            .unwrap();
        }
        assert_eq!(result, want);
    }
}

#[test]
fn pow_from_libm() {
    let lib = load_library(LIBM).unwrap();
    let pow = unsafe { get_symbol(lib, "pow") }.unwrap();

    let cif = compile_call_interface(
        CallingConvention::Default,
        &T::DOUBLE,
        &[T::DOUBLE, T::DOUBLE],
    )
    .unwrap();

    let base = 2.0f64;
    let exp = 10.0f64;
    let mut result = 0f64;
    unsafe {
        call(
            &cif,
            pow,
            &mut result as *mut f64 as *mut c_void,
            &[
                &base as *const f64 as *const c_void,
                &exp as *const f64 as *const c_void,
            ],
        )
        .unwrap();
    }
    assert_eq!(result, 1024.0);
}

#[test]
fn sqrt_from_libm() {
    let lib = load_library(LIBM).unwrap();
    let sqrt = unsafe { get_symbol(lib, "sqrt") }.unwrap();

    let cif =
        compile_call_interface(CallingConvention::Default, &T::DOUBLE, &[T::DOUBLE]).unwrap();

    let arg = 16.0f64;
    let mut result = 0f64;
    unsafe {
        call(
            &cif,
            sqrt,
            &mut result as *mut f64 as *mut c_void,
            &[&arg as *const f64 as *const c_void],
        )
        .unwrap();
    }
    assert_eq!(result, 4.0);
}

#[test]
fn load_use_free_lifecycle() {
    let lib = load_library(LIBC).unwrap();
    let isalpha = unsafe { get_symbol(lib, "isalpha") }.unwrap();

    let cif = compile_call_interface(CallingConvention::Default, &T::SINT32, &[T::INT]).unwrap();

    let ch = i32::from(b'a');
    let mut result = 0i32;
    unsafe {
        call(
            &cif,
            isalpha,
            &mut result as *mut i32 as *mut c_void,
            &[&ch as *const i32 as *const c_void],
        )
        .unwrap();
    }
    assert_ne!(result, 0);

    unsafe { free_library(lib) }.unwrap();
}
