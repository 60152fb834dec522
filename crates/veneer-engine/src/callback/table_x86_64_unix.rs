//! Trampoline entry table and shared dispatcher, x86_64 System V.
//!
//! Each of the 2000 entries loads its index into `r10` (scratch under the
//! System V convention) and jumps — never calls — to the shared
//! dispatcher, so the native caller's return address stays untouched on
//! top of the stack. Entry stride is 16 bytes, enforced by the alignment
//! directive rather than by instruction-size accounting.
//!
//! The dispatcher builds a contiguous frame on the C stack — the eight
//! SSE argument registers, the six integer argument registers, then a
//! 16-word window of the caller's stack arguments — and calls the Rust
//! `wrap` entry with `{index, frame, result}`. On return the encoded
//! result is loaded into both `rax` and `xmm0`, so integer- and
//! float-returning callbacks are both served by one tail.

use std::ffi::c_void;

use super::dispatch;
use super::signature::{FLOAT_REG_SLOTS, FRAME_SLOTS, INT_REG_SLOTS, STACK_SLOTS};

pub(crate) const ENTRY_STRIDE: usize = 16;

// The decoder geometry must match the frame the dispatcher below carves
// out at [rsp + 0x20].
const _: () = {
    assert!(FLOAT_REG_SLOTS == 8 && INT_REG_SLOTS == 6 && STACK_SLOTS == 16);
    assert!(0x20 + FRAME_SLOTS * 8 == 0x110);
};

// Dispatcher stack layout, relative to rsp after the prologue:
//   0x00  record: index, frame pointer, result   (32 bytes incl. pad)
//   0x20  frame:  xmm0-xmm7                      (64 bytes)
//   0x60          rdi, rsi, rdx, rcx, r8, r9     (48 bytes)
//   0x90          caller stack words             (128 bytes)
//   0x110 total, 16-byte aligned
core::arch::global_asm!(
    ".text",
    ".balign 16",
    ".globl veneer_callback_entries",
    ".globl _veneer_callback_entries",
    "veneer_callback_entries:",
    "_veneer_callback_entries:",
    ".set veneer_cb_index, 0",
    ".rept 2000",
    "mov r10d, offset veneer_cb_index",
    "jmp veneer_callback_dispatch",
    ".balign 16",
    ".set veneer_cb_index, veneer_cb_index + 1",
    ".endr",
    ".balign 16",
    "veneer_callback_dispatch:",
    "push rbp",
    "mov rbp, rsp",
    "sub rsp, 0x110",
    "movq qword ptr [rsp + 0x20], xmm0",
    "movq qword ptr [rsp + 0x28], xmm1",
    "movq qword ptr [rsp + 0x30], xmm2",
    "movq qword ptr [rsp + 0x38], xmm3",
    "movq qword ptr [rsp + 0x40], xmm4",
    "movq qword ptr [rsp + 0x48], xmm5",
    "movq qword ptr [rsp + 0x50], xmm6",
    "movq qword ptr [rsp + 0x58], xmm7",
    "mov qword ptr [rsp + 0x60], rdi",
    "mov qword ptr [rsp + 0x68], rsi",
    "mov qword ptr [rsp + 0x70], rdx",
    "mov qword ptr [rsp + 0x78], rcx",
    "mov qword ptr [rsp + 0x80], r8",
    "mov qword ptr [rsp + 0x88], r9",
    "lea rsi, [rbp + 16]",
    "lea rdi, [rsp + 0x90]",
    "mov ecx, 16",
    "rep movsq",
    "mov qword ptr [rsp + 0x00], r10",
    "lea rax, [rsp + 0x20]",
    "mov qword ptr [rsp + 0x08], rax",
    "mov qword ptr [rsp + 0x10], 0",
    "mov rdi, rsp",
    "call {wrap}",
    "mov rax, qword ptr [rsp + 0x10]",
    "movq xmm0, rax",
    "mov rsp, rbp",
    "pop rbp",
    "ret",
    wrap = sym dispatch::callback_wrap,
);

extern "C" {
    fn veneer_callback_entries();
}

/// Address of entry `index`: `base + index * stride`.
pub(crate) fn entry_address(index: usize) -> *const c_void {
    (veneer_callback_entries as usize + index * ENTRY_STRIDE) as *const c_void
}
