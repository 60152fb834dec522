//! System V AMD64 invocation.

use std::ffi::c_void;

use veneer_types::{CallInterface, TypeKind};

use super::pack::{chunk_values, flatten_fields, load_int_widened, push_stack_value};

const MAX_GPRS: usize = 6; // rdi, rsi, rdx, rcx, r8, r9
const MAX_SSE: usize = 8; // xmm0-xmm7

/// Register and stack state staged for one System V call.
#[cfg_attr(not(all(target_arch = "x86_64", unix)), allow(dead_code))]
#[derive(Debug, Default)]
pub(crate) struct Staged {
    pub gpr: [u64; MAX_GPRS],
    pub sse: [u64; MAX_SSE],
    pub stack: Vec<u64>,
}

/// Stages argument values per the System V AMD64 rules.
///
/// Floats fill SSE registers (`f32` patterns in the low half of a slot),
/// integers and pointers fill GPRs sign-/zero-extended, structs up to 16
/// bytes flatten chunk-wise — the first float-bearing chunk takes an SSE
/// register, every other chunk a GPR — and everything that does not fit
/// its register class spills to the outgoing stack area as 8-byte slots.
///
/// # Safety
///
/// Every `args[i]` must address live storage of the declared type.
#[cfg_attr(not(all(target_arch = "x86_64", unix)), allow(dead_code))]
pub(crate) unsafe fn stage_arguments(cif: &CallInterface, args: &[*const c_void]) -> Staged {
    let mut staged = Staged::default();
    let mut gprs = 0usize;
    let mut sses = 0usize;

    for (index, ty) in cif.arg_types().iter().enumerate() {
        let arg = args[index];
        match ty.kind {
            TypeKind::Float => {
                let bits = (arg as *const u32).read_unaligned() as u64;
                if sses < MAX_SSE {
                    staged.sse[sses] = bits;
                    sses += 1;
                } else {
                    staged.stack.push(bits);
                }
            }
            TypeKind::Double => {
                let bits = (arg as *const u64).read_unaligned();
                if sses < MAX_SSE {
                    staged.sse[sses] = bits;
                    sses += 1;
                } else {
                    staged.stack.push(bits);
                }
            }
            TypeKind::Struct => {
                if ty.size <= 16 {
                    let mut fields = Vec::new();
                    flatten_fields(arg as *const u8, ty, &mut fields);
                    let chunks = chunk_values(&fields, ty.size);
                    let float_chunk = chunks.iter().position(|c| c.has_float);
                    let need_sse = usize::from(float_chunk.is_some());
                    let need_gpr = chunks.len() - need_sse;
                    if gprs + need_gpr <= MAX_GPRS && sses + need_sse <= MAX_SSE {
                        for (chunk_index, chunk) in chunks.iter().enumerate() {
                            if Some(chunk_index) == float_chunk {
                                staged.sse[sses] = chunk.value;
                                sses += 1;
                            } else {
                                staged.gpr[gprs] = chunk.value;
                                gprs += 1;
                            }
                        }
                    } else {
                        push_stack_value(&mut staged.stack, arg as *const u8, ty.size, ty.alignment);
                    }
                } else {
                    push_stack_value(&mut staged.stack, arg as *const u8, ty.size, ty.alignment);
                }
            }
            _ => {
                let value = load_int_widened(arg, ty.kind);
                if gprs < MAX_GPRS {
                    staged.gpr[gprs] = value;
                    gprs += 1;
                } else {
                    staged.stack.push(value);
                }
            }
        }
    }

    staged
}

#[cfg(all(target_arch = "x86_64", unix))]
pub(crate) use native::invoke;

#[cfg(all(target_arch = "x86_64", unix))]
mod native {
    use super::*;
    use crate::error::FfiError;
    use crate::invoke::{bridge, ret};
    use crate::library::SymbolAddress;

    /// Argument block handed to the trampoline. Field offsets are baked
    /// into the assembly below and pinned by the assertions underneath.
    #[repr(C)]
    struct CallFrame {
        fn_addr: usize,     // 0x00
        gpr: [u64; 6],      // 0x08  rdi, rsi, rdx, rcx, r8, r9
        sse: [u64; 8],      // 0x38  xmm0-xmm7 bit patterns
        ret_int: [u64; 2],  // 0x78  rax, rdx
        ret_sse: [u64; 2],  // 0x88  xmm0, xmm1 bit patterns
        stack: *const u8,   // 0x98  outgoing stack image
        stack_len: usize,   // 0xa0  bytes, multiple of 16
    }

    const _: () = {
        assert!(std::mem::offset_of!(CallFrame, gpr) == 0x08);
        assert!(std::mem::offset_of!(CallFrame, sse) == 0x38);
        assert!(std::mem::offset_of!(CallFrame, ret_int) == 0x78);
        assert!(std::mem::offset_of!(CallFrame, ret_sse) == 0x88);
        assert!(std::mem::offset_of!(CallFrame, stack) == 0x98);
        assert!(std::mem::offset_of!(CallFrame, stack_len) == 0xa0);
    };

    // The trampoline copies the outgoing stack image below its own frame,
    // loads the staged registers, and transfers to the callee. `al` is set
    // to the SSE budget, a valid upper bound of the vector registers in
    // use. rbx/r12 are callee-saved scratch; the extra push keeps rsp
    // 16-byte aligned at the call.
    core::arch::global_asm!(
        ".text",
        ".balign 16",
        ".globl veneer_sysv_call",
        ".globl _veneer_sysv_call",
        "veneer_sysv_call:",
        "_veneer_sysv_call:",
        "push rbp",
        "mov rbp, rsp",
        "push rbx",
        "push r12",
        "mov rbx, rdi",
        "mov rcx, qword ptr [rbx + 0xa0]",
        "test rcx, rcx",
        "jz 2f",
        "sub rsp, rcx",
        "mov rsi, qword ptr [rbx + 0x98]",
        "mov rdi, rsp",
        "rep movsb",
        "2:",
        "movq xmm0, qword ptr [rbx + 0x38]",
        "movq xmm1, qword ptr [rbx + 0x40]",
        "movq xmm2, qword ptr [rbx + 0x48]",
        "movq xmm3, qword ptr [rbx + 0x50]",
        "movq xmm4, qword ptr [rbx + 0x58]",
        "movq xmm5, qword ptr [rbx + 0x60]",
        "movq xmm6, qword ptr [rbx + 0x68]",
        "movq xmm7, qword ptr [rbx + 0x70]",
        "mov rdi, qword ptr [rbx + 0x08]",
        "mov rsi, qword ptr [rbx + 0x10]",
        "mov rdx, qword ptr [rbx + 0x18]",
        "mov rcx, qword ptr [rbx + 0x20]",
        "mov r8,  qword ptr [rbx + 0x28]",
        "mov r9,  qword ptr [rbx + 0x30]",
        "mov eax, 8",
        "call qword ptr [rbx]",
        "mov qword ptr [rbx + 0x78], rax",
        "mov qword ptr [rbx + 0x80], rdx",
        "movq qword ptr [rbx + 0x88], xmm0",
        "movq qword ptr [rbx + 0x90], xmm1",
        "lea rsp, [rbp - 16]",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
    );

    extern "C" {
        fn veneer_sysv_call(frame: *mut CallFrame);
    }

    /// Executes one System V call.
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
            stack.push(0); // keep the copied image a 16-byte multiple
        }

        let mut frame = CallFrame {
            fn_addr: func.as_ptr() as usize,
            gpr: staged.gpr,
            sse: staged.sse,
            ret_int: [0; 2],
            ret_sse: [0; 2],
            stack: stack.as_ptr() as *const u8,
            stack_len: stack.len() * 8,
        };

        bridge::enter(|| unsafe { veneer_sysv_call(&mut frame) });

        ret::write_amd64_return(cif, result, frame.ret_int[0], frame.ret_sse[0])
    }
}
