//! Trampoline entry table and shared dispatcher, x86_64 Win64.
//!
//! Entries mirror the System V table (index into `r10`, plain jump, 16-byte
//! stride). The dispatcher frame holds the four XMM argument registers,
//! the four integer argument registers, and a 16-word window of the
//! caller's stack arguments, which live above the 32-byte shadow space the
//! caller reserved. The copy loop avoids `rep movs` because `rsi`/`rdi`
//! are callee-saved under this convention.

use std::ffi::c_void;

use super::dispatch;
use super::signature::{FLOAT_REG_SLOTS, FRAME_SLOTS, INT_REG_SLOTS, STACK_SLOTS};

pub(crate) const ENTRY_STRIDE: usize = 16;

// The decoder geometry must match the frame the dispatcher below carves
// out at [rsp + 0x20].
const _: () = {
    assert!(FLOAT_REG_SLOTS == 4 && INT_REG_SLOTS == 4 && STACK_SLOTS == 16);
    assert!(0x20 + FRAME_SLOTS * 8 == 0xe0);
};

// Dispatcher stack layout, relative to rsp after the prologue:
//   0x00  record: index, frame pointer, result   (32 bytes incl. pad)
//   0x20  frame:  xmm0-xmm3                      (32 bytes)
//   0x40          rcx, rdx, r8, r9               (32 bytes)
//   0x60          caller stack words             (128 bytes)
//   0xe0  total, 16-byte aligned
core::arch::global_asm!(
    ".text",
    ".balign 16",
    ".globl veneer_callback_entries",
    "veneer_callback_entries:",
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
    "sub rsp, 0xe0",
    "movq qword ptr [rsp + 0x20], xmm0",
    "movq qword ptr [rsp + 0x28], xmm1",
    "movq qword ptr [rsp + 0x30], xmm2",
    "movq qword ptr [rsp + 0x38], xmm3",
    "mov qword ptr [rsp + 0x40], rcx",
    "mov qword ptr [rsp + 0x48], rdx",
    "mov qword ptr [rsp + 0x50], r8",
    "mov qword ptr [rsp + 0x58], r9",
    // Caller stack args sit above the return address and shadow space.
    "lea rax, [rbp + 0x30]",
    "lea r11, [rsp + 0x60]",
    "mov ecx, 16",
    "2:",
    "mov rdx, qword ptr [rax]",
    "mov qword ptr [r11], rdx",
    "add rax, 8",
    "add r11, 8",
    "dec ecx",
    "jnz 2b",
    "mov qword ptr [rsp + 0x00], r10",
    "lea rax, [rsp + 0x20]",
    "mov qword ptr [rsp + 0x08], rax",
    "mov qword ptr [rsp + 0x10], 0",
    "lea rcx, [rsp]",
    "sub rsp, 32",
    "call {wrap}",
    "add rsp, 32",
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
