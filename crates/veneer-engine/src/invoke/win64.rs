//! Win64 invocation.

use std::ffi::c_void;

use veneer_types::{CallInterface, TypeKind};

use super::pack::load_int_widened;

const MAX_SLOTS: usize = 4; // rcx/xmm0, rdx/xmm1, r8/xmm2, r9/xmm3

/// Register and stack state staged for one Win64 call.
#[cfg_attr(not(all(target_arch = "x86_64", windows)), allow(dead_code))]
#[derive(Debug, Default)]
pub(crate) struct Staged {
    pub gpr: [u64; MAX_SLOTS],
    pub sse: [u64; MAX_SLOTS],
    pub stack: Vec<u64>,
}

/// Stages argument values per the Win64 rules.
///
/// Assignment is positional: the k-th argument lands in slot k of the
/// register class matching its type, arguments five onward spill to the
/// stack as 8-byte slots. Float values are mirrored into the integer slot
/// as well (callees read whichever class the parameter declares; variadic
/// callees read both). Composites whose size is not 1, 2, 4, or 8 bytes
/// pass by reference — the slot carries the address of the caller's
/// storage.
///
/// # Safety
///
/// Every `args[i]` must address live storage of the declared type.
#[cfg_attr(not(all(target_arch = "x86_64", windows)), allow(dead_code))]
pub(crate) unsafe fn stage_arguments(cif: &CallInterface, args: &[*const c_void]) -> Staged {
    let mut staged = Staged::default();

    for (index, ty) in cif.arg_types().iter().enumerate() {
        let arg = args[index];
        let mut is_float = false;
        let value: u64 = match ty.kind {
            TypeKind::Float => {
                is_float = true;
                (arg as *const u32).read_unaligned() as u64
            }
            TypeKind::Double => {
                is_float = true;
                (arg as *const u64).read_unaligned()
            }
            TypeKind::Struct => {
                if veneer_abi::win64::fits_register_slot(ty.size) {
                    read_small_composite(arg as *const u8, ty.size)
                } else {
                    arg as usize as u64
                }
            }
            _ => load_int_widened(arg, ty.kind),
        };

        if index < MAX_SLOTS {
            staged.gpr[index] = value;
            if is_float {
                staged.sse[index] = value;
            }
        } else {
            staged.stack.push(value);
        }
    }

    staged
}

#[cfg_attr(not(all(target_arch = "x86_64", windows)), allow(dead_code))]
unsafe fn read_small_composite(p: *const u8, size: usize) -> u64 {
    match size {
        1 => p.read_unaligned() as u64,
        2 => (p as *const u16).read_unaligned() as u64,
        4 => (p as *const u32).read_unaligned() as u64,
        _ => (p as *const u64).read_unaligned(),
    }
}

#[cfg(all(target_arch = "x86_64", windows))]
pub(crate) use native::invoke;

#[cfg(all(target_arch = "x86_64", windows))]
mod native {
    use super::*;
    use crate::error::FfiError;
    use crate::invoke::{bridge, ret};
    use crate::library::SymbolAddress;

    /// Argument block handed to the trampoline. Field offsets are baked
    /// into the assembly below and pinned by the assertions underneath.
    #[repr(C)]
    struct CallFrame {
        fn_addr: usize,   // 0x00
        gpr: [u64; 4],    // 0x08  rcx, rdx, r8, r9
        sse: [u64; 4],    // 0x28  xmm0-xmm3 bit patterns
        ret_int: u64,     // 0x48  rax
        ret_sse: u64,     // 0x50  xmm0 bit pattern
        stack: *const u8, // 0x58  outgoing stack image (above the shadow)
        stack_len: usize, // 0x60  bytes, multiple of 16
    }

    const _: () = {
        assert!(std::mem::offset_of!(CallFrame, gpr) == 0x08);
        assert!(std::mem::offset_of!(CallFrame, sse) == 0x28);
        assert!(std::mem::offset_of!(CallFrame, ret_int) == 0x48);
        assert!(std::mem::offset_of!(CallFrame, ret_sse) == 0x50);
        assert!(std::mem::offset_of!(CallFrame, stack) == 0x58);
        assert!(std::mem::offset_of!(CallFrame, stack_len) == 0x60);
    };

    // The trampoline copies the outgoing stack image, reserves the
    // mandatory 32 bytes of shadow space beneath it, loads the positional
    // registers, and transfers to the callee. rbx/rsi/rdi are callee-saved
    // here; the extra push keeps rsp 16-byte aligned at the call.
    core::arch::global_asm!(
        ".text",
        ".balign 16",
        ".globl veneer_win64_call",
        "veneer_win64_call:",
        "push rbp",
        "mov rbp, rsp",
        "push rbx",
        "push rsi",
        "push rdi",
        "push rax",
        "mov rbx, rcx",
        "mov rcx, qword ptr [rbx + 0x60]",
        "test rcx, rcx",
        "jz 2f",
        "sub rsp, rcx",
        "mov rsi, qword ptr [rbx + 0x58]",
        "mov rdi, rsp",
        "rep movsb",
        "2:",
        "sub rsp, 32",
        "movq xmm0, qword ptr [rbx + 0x28]",
        "movq xmm1, qword ptr [rbx + 0x30]",
        "movq xmm2, qword ptr [rbx + 0x38]",
        "movq xmm3, qword ptr [rbx + 0x40]",
        "mov rcx, qword ptr [rbx + 0x08]",
        "mov rdx, qword ptr [rbx + 0x10]",
        "mov r8,  qword ptr [rbx + 0x18]",
        "mov r9,  qword ptr [rbx + 0x20]",
        "call qword ptr [rbx]",
        "mov qword ptr [rbx + 0x48], rax",
        "movq qword ptr [rbx + 0x50], xmm0",
        "lea rsp, [rbp - 32]",
        "pop rax",
        "pop rdi",
        "pop rsi",
        "pop rbx",
        "pop rbp",
        "ret",
    );

    extern "C" {
        fn veneer_win64_call(frame: *mut CallFrame);
    }

    /// Executes one Win64 call.
    ///
    /// # Safety
    ///
    /// Contract of [`crate::call`].
    pub(crate) unsafe fn invoke(
        cif: &CallInterface,
        func: SymbolAddress,
        result: *mut c_void,
        args: &[*const c_void],
    ) -> Result<(), FfiError> {
        let staged = stage_arguments(cif, args);
        let mut stack = staged.stack;
        if stack.len() % 2 != 0 {
            stack.push(0);
        }

        let mut frame = CallFrame {
            fn_addr: func.as_ptr() as usize,
            gpr: staged.gpr,
            sse: staged.sse,
            ret_int: 0,
            ret_sse: 0,
            stack: stack.as_ptr() as *const u8,
            stack_len: stack.len() * 8,
        };

        bridge::enter(|| unsafe { veneer_win64_call(&mut frame) });

        ret::write_amd64_return(cif, result, frame.ret_int, frame.ret_sse)
    }
}
