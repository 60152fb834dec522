//! Mint a native function pointer from a Rust closure and let "foreign"
//! code call it.
//!
//! ```bash
//! cargo run --example callback
//! ```

use std::ffi::c_void;

type BinaryFn = extern "C" fn(u64, u64) -> u64;

// Stands in for a C library that accepts a callback.
extern "C" fn native_combine(f: BinaryFn, a: u64, b: u64) -> u64 {
    f(a, b) + f(b, a)
}

fn main() {
    let entry = veneer_engine::register_callback(|a: u64, b: u64| a * 10 + b);

    let callback: BinaryFn =
        unsafe { std::mem::transmute::<*const c_void, BinaryFn>(entry.as_ptr()) };

    // f(3, 4) + f(4, 3) = 34 + 43
    let result = native_combine(callback, 3, 4);
    println!("native_combine reported {result}");
    assert_eq!(result, 77);
}
