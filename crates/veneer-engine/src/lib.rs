//! Pure-Rust foreign function interface engine.
//!
//! veneer lets a program call arbitrary C-ABI functions in dynamically
//! loaded shared libraries, and lets C code call back into Rust closures,
//! without a C compiler anywhere in the build. Three subsystems cooperate:
//!
//! - the **call interface compiler** ([`compile_call_interface`]) classifies
//!   a `(convention, return, args)` triple against the target ABI and
//!   produces a reusable [`CallInterface`]
//! - the **invocation engine** ([`call`], [`call_with_cancellation`])
//!   marshals argument values into registers and stack slots, transfers
//!   control through a hand-written assembly trampoline, and demarshals the
//!   return value
//! - the **callback dispatcher** ([`register_callback`]) hands out native
//!   function pointers from a fixed pool of pre-minted trampoline entries,
//!   each routing the foreign ABI back into a registered closure
//!
//! Dynamic linking ([`load_library`], [`get_symbol`], [`free_library`]) is a
//! thin façade over the platform loader that feeds raw function addresses
//! into the invocation path.
//!
//! # Example
//!
//! ```rust,ignore
//! use veneer_engine as ffi;
//! use veneer_engine::TypeDescriptor;
//!
//! let lib = ffi::load_library("libm.so.6")?;
//! let sqrt = unsafe { ffi::get_symbol(lib, "sqrt")? };
//!
//! let cif = ffi::compile_call_interface(
//!     ffi::CallingConvention::Default,
//!     &TypeDescriptor::DOUBLE,
//!     &[TypeDescriptor::DOUBLE],
//! )?;
//!
//! let arg = 16.0f64;
//! let mut result = 0.0f64;
//! unsafe {
//!     ffi::call(
//!         &cif,
//!         sqrt,
//!         &mut result as *mut f64 as *mut _,
//!         &[&arg as *const f64 as *const _],
//!     )?;
//! }
//! assert_eq!(result, 4.0);
//! ```
//!
//! # Safety
//!
//! The engine validates everything it can see — descriptors, conventions,
//! argument counts — but it cannot know whether a function address really
//! has the described signature or whether argument storage is live. Those
//! contracts are the caller's, which is why [`call`] and [`get_symbol`] are
//! `unsafe`. A fault inside native code (segmentation violation, stack
//! overflow, foreign unwind) is fatal to the process; that is the accepted
//! price of arbitrary FFI.
//!
//! # The argument-indirection contract
//!
//! `argv[i]` never *contains* the i-th argument — it **points to** it. For
//! a pointer-typed argument, `argv[i]` is the address of the pointer
//! variable, and the engine loads the pointer value through it. Passing the
//! pointer value itself where its address is expected is the classic
//! misuse; the `strlen` regression test in this crate pins the correct
//! behaviour.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "compiler-bridge")]
compile_error!(
    "veneer binds the platform loader with direct `extern` declarations and never \
     routes through a C toolchain; the `compiler-bridge` feature must stay disabled \
     (build with `--no-default-features` or drop the feature from your dependency)"
);

pub mod callback;
pub mod cancel;
pub mod cif;
pub mod error;
pub mod invoke;
pub mod library;

pub use callback::{register_callback, CbParam, CbReturn, IntoCallback, MAX_CALLBACKS};
pub use cancel::CancelToken;
pub use cif::compile_call_interface;
pub use error::{FfiError, LibraryOp};
pub use invoke::{call, call_with_cancellation};
pub use library::{free_library, get_symbol, load_library, LibraryHandle, SymbolAddress};

pub use veneer_abi::{Abi, ArgumentClassification};
pub use veneer_types::{
    is_valid, layout_of, CallInterface, CallingConvention, ReturnFlags, TypeDescriptor,
    TypeError, TypeKind,
};
