//! AAPCS64 invocation.

use std::ffi::c_void;

use veneer_abi::aapcs64::homogeneous_float_aggregate;
use veneer_types::{CallInterface, ReturnFlags, TypeKind};

use super::pack::{chunk_values, flatten_fields, load_int_widened, push_stack_value};

const MAX_GPRS: usize = 8; // x0-x7
const MAX_FPRS: usize = 8; // d0-d7

/// Register and stack state staged for one AAPCS64 call.
#[cfg_attr(not(target_arch = "aarch64"), allow(dead_code))]
#[derive(Debug, Default)]
pub(crate) struct Staged {
    pub gpr: [u64; MAX_GPRS],
    pub fpr: [u64; MAX_FPRS],
    /// Buffer address for a `VIA_POINTER` return, staged in `x8`.
    pub indirect: u64,
    pub stack: Vec<u64>,
}

/// Stages argument values per the AAPCS64 rules.
///
/// HFAs take one FPR per element when they all fit, otherwise the whole
/// aggregate goes to the stack. Non-HFA structs up to 16 bytes pack
/// chunk-wise (all-float chunks to FPRs, all-int and mixed chunks to
/// GPRs); larger structs pass by reference in one GPR. Scalar rules match
/// the other ABIs: floats to FPRs as raw patterns, integers widened into
/// GPRs, spill to 8-byte stack slots when the class is exhausted.
///
/// When `cif` returns through the implicit result register, `result` is
/// staged into the `x8` slot.
///
/// # Safety
///
/// Every `args[i]` must address live storage of the declared type;
/// `result` must be valid for the return type when the return is
/// `VIA_POINTER`.
#[cfg_attr(not(target_arch = "aarch64"), allow(dead_code))]
pub(crate) unsafe fn stage_arguments(
    cif: &CallInterface,
    result: *mut c_void,
    args: &[*const c_void],
) -> Staged {
    let mut staged = Staged::default();
    let mut gprs = 0usize;
    let mut fprs = 0usize;

    if cif.flags().contains(ReturnFlags::VIA_POINTER) && !result.is_null() {
        staged.indirect = result as usize as u64;
    }

    for (index, ty) in cif.arg_types().iter().enumerate() {
        let arg = args[index];
        match ty.kind {
            TypeKind::Float => {
                let bits = (arg as *const u32).read_unaligned() as u64;
                if fprs < MAX_FPRS {
                    staged.fpr[fprs] = bits;
                    fprs += 1;
                } else {
                    staged.stack.push(bits);
                }
            }
            TypeKind::Double => {
                let bits = (arg as *const u64).read_unaligned();
                if fprs < MAX_FPRS {
                    staged.fpr[fprs] = bits;
                    fprs += 1;
                } else {
                    staged.stack.push(bits);
                }
            }
            TypeKind::Struct => {
                if let Some(hfa) = homogeneous_float_aggregate(ty) {
                    if fprs + hfa.count <= MAX_FPRS {
                        let mut fields = Vec::new();
                        flatten_fields(arg as *const u8, ty, &mut fields);
                        for field in fields {
                            staged.fpr[fprs] = field.bits;
                            fprs += 1;
                        }
                    } else {
                        push_stack_value(&mut staged.stack, arg as *const u8, ty.size, ty.alignment);
                    }
                } else if ty.size <= 16 {
                    let mut fields = Vec::new();
                    flatten_fields(arg as *const u8, ty, &mut fields);
                    let chunks = chunk_values(&fields, ty.size);
                    let need_fpr = chunks.iter().filter(|c| c.has_float && !c.has_int).count();
                    let need_gpr = chunks.len() - need_fpr;
                    if gprs + need_gpr <= MAX_GPRS && fprs + need_fpr <= MAX_FPRS {
                        for chunk in &chunks {
                            if chunk.has_float && !chunk.has_int {
                                staged.fpr[fprs] = chunk.value;
                                fprs += 1;
                            } else {
                                staged.gpr[gprs] = chunk.value;
                                gprs += 1;
                            }
                        }
                    } else {
                        push_stack_value(&mut staged.stack, arg as *const u8, ty.size, ty.alignment);
                    }
                } else {
                    // By reference in a single GPR.
                    let address = arg as usize as u64;
                    if gprs < MAX_GPRS {
                        staged.gpr[gprs] = address;
                        gprs += 1;
                    } else {
                        staged.stack.push(address);
                    }
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

#[cfg(target_arch = "aarch64")]
pub(crate) use native::invoke;

#[cfg(target_arch = "aarch64")]
mod native {
    use super::*;
    use crate::error::FfiError;
    use crate::invoke::{bridge, ret};
    use crate::library::SymbolAddress;

    /// Argument block handed to the trampoline. Field offsets are baked
    /// into the assembly below and pinned by the assertions underneath.
    #[repr(C)]
    struct CallFrame {
        fn_addr: usize,    // 0
        gpr: [u64; 8],     // 8    x0-x7
        fpr: [u64; 8],     // 72   d0-d7 bit patterns
        indirect: u64,     // 136  x8 result-location register
        ret_int: [u64; 2], // 144  x0, x1
        ret_fpr: [u64; 4], // 160  d0-d3 bit patterns
        stack: *const u8,  // 192  outgoing stack image
        stack_len: usize,  // 200  bytes, multiple of 16
    }

    const _: () = {
        assert!(std::mem::offset_of!(CallFrame, gpr) == 8);
        assert!(std::mem::offset_of!(CallFrame, fpr) == 72);
        assert!(std::mem::offset_of!(CallFrame, indirect) == 136);
        assert!(std::mem::offset_of!(CallFrame, ret_int) == 144);
        assert!(std::mem::offset_of!(CallFrame, ret_fpr) == 160);
        assert!(std::mem::offset_of!(CallFrame, stack) == 192);
        assert!(std::mem::offset_of!(CallFrame, stack_len) == 200);
    };

    // The trampoline copies the outgoing stack image below its frame,
    // loads d0-d7, x8, and x0-x7 from the block, and branch-links to the
    // callee. x19 keeps the block address across the call.
    core::arch::global_asm!(
        ".text",
        ".balign 16",
        ".globl veneer_aapcs64_call",
        ".globl _veneer_aapcs64_call",
        "veneer_aapcs64_call:",
        "_veneer_aapcs64_call:",
        "stp x29, x30, [sp, #-32]!",
        "mov x29, sp",
        "str x19, [sp, #16]",
        "mov x19, x0",
        "ldr x9, [x19, #200]",
        "cbz x9, 2f",
        "sub sp, sp, x9",
        "mov x10, sp",
        "ldr x11, [x19, #192]",
        "1:",
        "ldr x12, [x11], #8",
        "str x12, [x10], #8",
        "subs x9, x9, #8",
        "b.ne 1b",
        "2:",
        "ldr d0, [x19, #72]",
        "ldr d1, [x19, #80]",
        "ldr d2, [x19, #88]",
        "ldr d3, [x19, #96]",
        "ldr d4, [x19, #104]",
        "ldr d5, [x19, #112]",
        "ldr d6, [x19, #120]",
        "ldr d7, [x19, #128]",
        "ldr x8, [x19, #136]",
        "ldr x0, [x19, #8]",
        "ldr x1, [x19, #16]",
        "ldr x2, [x19, #24]",
        "ldr x3, [x19, #32]",
        "ldr x4, [x19, #40]",
        "ldr x5, [x19, #48]",
        "ldr x6, [x19, #56]",
        "ldr x7, [x19, #64]",
        "ldr x9, [x19]",
        "blr x9",
        "str x0, [x19, #144]",
        "str x1, [x19, #152]",
        "str d0, [x19, #160]",
        "str d1, [x19, #168]",
        "str d2, [x19, #176]",
        "str d3, [x19, #184]",
        "mov sp, x29",
        "ldr x19, [sp, #16]",
        "ldp x29, x30, [sp], #32",
        "ret",
    );

    extern "C" {
        fn veneer_aapcs64_call(frame: *mut CallFrame);
    }

    /// Executes one AAPCS64 call.
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
        let staged = stage_arguments(cif, result, args);
        let mut stack = staged.stack;
        if stack.len() % 2 != 0 {
            stack.push(0);
        }

        let mut frame = CallFrame {
            fn_addr: func.as_ptr() as usize,
            gpr: staged.gpr,
            fpr: staged.fpr,
            indirect: staged.indirect,
            ret_int: [0; 2],
            ret_fpr: [0; 4],
            stack: stack.as_ptr() as *const u8,
            stack_len: stack.len() * 8,
        };

        bridge::enter(|| unsafe { veneer_aapcs64_call(&mut frame) });

        ret::write_aapcs64_return(cif, result, frame.ret_int, frame.ret_fpr)
    }
}
