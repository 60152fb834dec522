//! End-to-end callback tests: native code calling minted entry points.
//!
//! The registered entry address is invoked as a real C function pointer,
//! driving the per-entry stub, the shared assembly dispatcher, and the
//! typed decoder.

#![cfg(any(
    all(target_arch = "x86_64", any(unix, windows)),
    target_arch = "aarch64"
))]

use std::ffi::c_void;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use veneer_engine::{
    call, compile_call_interface, register_callback, CallingConvention, SymbolAddress,
    TypeDescriptor as T,
};

type BinaryFn = extern "C" fn(u64, u64) -> u64;

fn as_binary_fn(address: SymbolAddress) -> BinaryFn {
    unsafe { std::mem::transmute::<*const c_void, BinaryFn>(address.as_ptr()) }
}

#[test]
fn registered_closure_is_callable_from_native_code() {
    let entry = register_callback(|a: u64, b: u64| a + b);
    let f = as_binary_fn(entry);
    assert_eq!(f(3, 4), 7);
    assert_eq!(f(0, 0), 0);
    assert_eq!(f(u64::MAX, 1), u64::MAX.wrapping_add(1));
}

#[test]
fn each_entry_routes_to_its_own_closure() {
    let add = as_binary_fn(register_callback(|a: u64, b: u64| a + b));
    let mul = as_binary_fn(register_callback(|a: u64, b: u64| a * b));
    assert_eq!(add(6, 7), 13);
    assert_eq!(mul(6, 7), 42);
}

#[test]
fn captured_state_survives_native_invocations() {
    let hits = Arc::new(AtomicU64::new(0));
    let captured = Arc::clone(&hits);
    let entry = register_callback(move |value: u64, _unused: u64| {
        captured.fetch_add(value, Ordering::Relaxed)
    });
    let f = as_binary_fn(entry);
    f(5, 0);
    f(7, 0);
    assert_eq!(hits.load(Ordering::Relaxed), 12);
}

#[test]
fn pointer_arguments_cross_the_boundary() {
    let entry = register_callback(|p: *mut u64, value: u64| {
        unsafe { *p = value };
        0u64
    });
    let f = unsafe {
        std::mem::transmute::<*const c_void, extern "C" fn(*mut u64, u64) -> u64>(
            entry.as_ptr(),
        )
    };
    let mut target = 0u64;
    f(&mut target, 99);
    assert_eq!(target, 99);
}

#[cfg(not(all(target_arch = "x86_64", windows)))]
#[test]
fn float_callbacks_return_through_the_float_register() {
    let entry = register_callback(|a: f64, b: f64| a * b + 0.5);
    let f = unsafe {
        std::mem::transmute::<*const c_void, extern "C" fn(f64, f64) -> f64>(entry.as_ptr())
    };
    assert_eq!(f(6.0, 7.0), 42.5);
}

#[cfg(not(all(target_arch = "x86_64", windows)))]
#[test]
fn f32_callbacks_use_the_low_register_half() {
    let entry = register_callback(|a: f32, b: f32| a + b);
    let f = unsafe {
        std::mem::transmute::<*const c_void, extern "C" fn(f32, f32) -> f32>(entry.as_ptr())
    };
    assert_eq!(f(1.25, 2.25), 3.5);
}

#[test]
fn arguments_beyond_the_registers_arrive_via_the_stack() {
    let entry = register_callback(
        |a: u64, b: u64, c: u64, d: u64, e: u64, f: u64, g: u64, h: u64, i: u64| {
            a + 2 * b + 3 * c + 4 * d + 5 * e + 6 * f + 7 * g + 8 * h + 9 * i
        },
    );
    type NineFn = extern "C" fn(u64, u64, u64, u64, u64, u64, u64, u64, u64) -> u64;
    let f = unsafe { std::mem::transmute::<*const c_void, NineFn>(entry.as_ptr()) };
    let want: u64 = (1..=9u64).map(|k| k * k).sum();
    assert_eq!(f(1, 2, 3, 4, 5, 6, 7, 8, 9), want);
}

// The full loop: the engine calls a native function whose only argument
// is a callback entry address; the native side invokes the callback and
// returns its result.
extern "C" fn invoke_with_3_and_4(f: BinaryFn) -> u64 {
    f(3, 4)
}

#[test]
fn callback_address_travels_through_a_forward_call() {
    let entry = register_callback(|a: u64, b: u64| a + b);

    let cif =
        compile_call_interface(CallingConvention::Default, &T::UINT64, &[T::POINTER]).unwrap();
    let callback_ptr = entry.as_ptr();
    let mut result = 0u64;
    unsafe {
        call(
            &cif,
            SymbolAddress::from_raw(invoke_with_3_and_4 as usize as *const c_void),
            &mut result as *mut u64 as *mut c_void,
            &[&callback_ptr as *const *const c_void as *const c_void],
        )
        .unwrap();
    }
    assert_eq!(result, 7);
}

#[test]
fn sixty_four_threads_each_observe_their_own_callback() {
    let mut handles = Vec::new();
    for thread_id in 0..64u64 {
        handles.push(std::thread::spawn(move || {
            let entry = register_callback(move |a: u64, b: u64| a + b + thread_id * 1000);
            let f = as_binary_fn(entry);
            for round in 0..10u64 {
                assert_eq!(f(3, round), 3 + round + thread_id * 1000);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn one_callback_invoked_from_many_threads() {
    let entry = register_callback(|a: u64, b: u64| a.wrapping_mul(b));
    let f = as_binary_fn(entry);

    let mut handles = Vec::new();
    for k in 1..=16u64 {
        handles.push(std::thread::spawn(move || {
            for round in 1..=100u64 {
                assert_eq!(f(k, round), k * round);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}
