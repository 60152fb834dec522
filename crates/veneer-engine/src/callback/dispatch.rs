//! The host-side half of callback dispatch.

use std::panic::{catch_unwind, AssertUnwindSafe};

use super::signature::CallbackFrame;
use super::REGISTRY;

/// Record handed from the assembly dispatcher: the entry's index, the
/// register/stack snapshot, and the result slot the dispatcher loads back
/// into the return registers.
#[cfg_attr(
    not(any(target_arch = "x86_64", target_arch = "aarch64")),
    allow(dead_code)
)]
#[repr(C)]
pub(crate) struct CallbackRecord {
    pub index: usize,
    pub frame: *const u64,
    pub result: usize,
}

/// Entry point the assembly dispatcher calls.
///
/// Fetches the registered handler for the entry index (one mutex-guarded
/// `Arc` clone, then lock-free), reconstructs typed arguments from the
/// frame, runs the closure, and encodes its return value into the result
/// slot. A panicking closure must not unwind into the native caller, so
/// panics are caught and reported as a zero result.
///
/// # Safety
///
/// `record` must point to a live record whose frame holds the dispatcher's
/// snapshot.
#[cfg_attr(
    not(any(target_arch = "x86_64", target_arch = "aarch64")),
    allow(dead_code)
)]
pub(crate) unsafe extern "C" fn callback_wrap(record: *mut CallbackRecord) {
    let record = &mut *record;

    let handler = { REGISTRY.lock().get(record.index).cloned() };
    let Some(handler) = handler else {
        // An index with no registration means the native side fabricated
        // an entry address.
        record.result = 0;
        return;
    };

    let frame = CallbackFrame::new(record.frame);
    record.result = match catch_unwind(AssertUnwindSafe(|| handler(&frame))) {
        Ok(result) => result,
        Err(_) => {
            log::error!("callback {} panicked; returning 0 to the native caller", record.index);
            0
        }
    };
}
