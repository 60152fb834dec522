//! The callback dispatcher.
//!
//! A fixed pool of [`MAX_CALLBACKS`] native entry points is minted into
//! the binary at build time. Registering a closure claims the next slot
//! and yields that entry's address: a plain C function pointer any native
//! code can call. When it is called, the entry's stub routes through a
//! shared assembly dispatcher that snapshots the ABI argument registers,
//! re-enters Rust, decodes the arguments against the closure's signature,
//! runs the closure, and carries its encoded return value back into the
//! ABI's return registers.
//!
//! Slots are append-only for the life of the process: recycling one would
//! race against unknown native callers still holding the entry address.
//! Registration is serialised by a mutex; dispatch takes the same mutex
//! only for the one slot load and then runs lock-free.
//!
//! Callbacks are supported from any thread the host has created. A
//! callback arriving on a thread created by foreign code has no host
//! context to stand on; behaviour is undefined there.

mod dispatch;
mod signature;

use parking_lot::Mutex;

pub use signature::{CbParam, CbReturn, IntoCallback};

use signature::Handler;

use crate::library::SymbolAddress;

/// Capacity of the trampoline table. Exactly this many registrations can
/// succeed during a process's lifetime; slots are never reused.
pub const MAX_CALLBACKS: usize = 2000;

/// Registered handlers. The vector only ever grows; its length is the
/// high-water mark of claimed entries.
static REGISTRY: Mutex<Vec<Handler>> = Mutex::new(Vec::new());

pub(crate) fn register_handler(handler: Handler) -> usize {
    let mut slots = REGISTRY.lock();
    if slots.len() >= MAX_CALLBACKS {
        panic!("ffi: callback limit reached (2000 callbacks maximum)");
    }
    let index = slots.len();
    slots.push(handler);
    index
}

/// Registers a closure as a native callback and returns the address of
/// its minted entry point.
///
/// The closure may take up to twelve parameters of the primitive kinds in
/// [`CbParam`] and return at most one [`CbReturn`] value. The returned
/// address is valid C-ABI code for the life of the process; it may be
/// handed to native code on any host-created thread, and may be invoked
/// from several native threads at once — the closure itself must then
/// tolerate concurrent calls, the dispatcher adds no serialisation.
///
/// # Panics
///
/// Panics when the table is exhausted (the capacity is a process-lifetime
/// budget, so this is a caller bug) and, under the Win64 specialisation,
/// when the signature violates the platform restrictions (every parameter
/// and the return must be pointer-sized; floats cannot be direct
/// parameters).
pub fn register_callback<Args, C>(callback: C) -> SymbolAddress
where
    C: IntoCallback<Args>,
{
    let handler = callback.into_handler();
    let index = register_handler(handler);
    let address = table::entry_address(index);
    log::trace!("registered callback {index} at {address:p}");
    SymbolAddress::from_raw(address)
}

#[cfg(all(target_arch = "x86_64", unix))]
#[path = "table_x86_64_unix.rs"]
mod table;

#[cfg(all(target_arch = "x86_64", windows))]
#[path = "table_x86_64_windows.rs"]
mod table;

#[cfg(target_arch = "aarch64")]
#[path = "table_aarch64.rs"]
mod table;

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
mod table {
    use std::ffi::c_void;

    #[allow(dead_code)]
    pub(crate) const ENTRY_STRIDE: usize = 0;

    pub(crate) fn entry_address(_index: usize) -> *const c_void {
        panic!(
            "no callback trampoline table for {}/{}",
            std::env::consts::OS,
            std::env::consts::ARCH
        );
    }
}
