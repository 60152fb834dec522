//! Minimal end-to-end call: print a line through the C library's `puts`
//! (`printf` on Windows via msvcrt).
//!
//! ```bash
//! cargo run --example puts
//! ```

use std::ffi::c_void;

use veneer_engine as ffi;
use veneer_engine::TypeDescriptor;

fn main() -> Result<(), ffi::FfiError> {
    let (lib_name, func_name) = if cfg!(target_os = "windows") {
        ("msvcrt.dll", "printf")
    } else if cfg!(target_os = "macos") {
        ("libSystem.B.dylib", "puts")
    } else {
        ("libc.so.6", "puts")
    };

    let lib = ffi::load_library(lib_name)?;
    let func = unsafe { ffi::get_symbol(lib, func_name)? };

    let cif = ffi::compile_call_interface(
        ffi::CallingConvention::Default,
        &TypeDescriptor::SINT32,
        &[TypeDescriptor::POINTER],
    )?;

    // argv[0] points to the pointer variable, not to the string bytes.
    let text = b"Hello, WebGPU!\0";
    let text_ptr = text.as_ptr();
    let mut written = 0i32;
    unsafe {
        ffi::call(
            &cif,
            func,
            &mut written as *mut i32 as *mut c_void,
            &[&text_ptr as *const *const u8 as *const c_void],
        )?;
    }

    println!("{func_name} returned {written}");
    unsafe { ffi::free_library(lib) }
}
