//! ABI classification for the veneer FFI engine.
//!
//! For each supported machine ABI this crate answers two questions about a
//! type descriptor:
//! - as an argument, how many general-purpose and floating-point registers
//!   does a value of this type claim (anything beyond the budget spills to
//!   the stack)?
//! - as a return type, which [`ReturnFlags`] describe how the value comes
//!   back?
//!
//! Classification is pure arithmetic over descriptors: every ABI's rules
//! can be evaluated on every host, which is what allows the AAPCS64 tables
//! to be tested on an x86_64 box. Selecting which ABI actually *executes* a
//! call on the current host is [`Abi::for_host`].

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod aapcs64;
pub mod chunk;
pub mod sysv;
pub mod win64;

use veneer_types::{CallingConvention, ReturnFlags, TypeDescriptor};

/// How many registers of each class an argument claims.
///
/// Whatever does not fit in the remaining register budget spills to the
/// outgoing stack area; that rule is implicit and not recorded here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArgumentClassification {
    /// General-purpose registers claimed.
    pub gprs: usize,
    /// Floating-point registers claimed.
    pub fprs: usize,
}

/// One of the three machine ABIs the engine implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Abi {
    /// System V AMD64 (Unix on x86_64).
    SystemV,
    /// Microsoft x64.
    Win64,
    /// ARM 64-bit Procedure Call Standard.
    Aapcs64,
}

impl Abi {
    /// Selects the ABI that executes `convention` on the current host.
    ///
    /// On x86_64 the convention decides between System V and Win64 rules
    /// (`GnuWin64` uses the Win64 tables). On AArch64 every convention maps
    /// onto AAPCS64. Returns `None` on architectures the engine has no
    /// rules for.
    pub fn for_host(convention: CallingConvention) -> Option<Abi> {
        let convention = convention.resolve();
        if cfg!(target_arch = "x86_64") {
            if convention.is_windows() {
                Some(Abi::Win64)
            } else {
                Some(Abi::SystemV)
            }
        } else if cfg!(target_arch = "aarch64") {
            Some(Abi::Aapcs64)
        } else {
            None
        }
    }

    /// General-purpose argument register budget.
    pub const fn max_gprs(self) -> usize {
        match self {
            Abi::SystemV => 6,  // rdi, rsi, rdx, rcx, r8, r9
            Abi::Win64 => 4,    // rcx, rdx, r8, r9
            Abi::Aapcs64 => 8,  // x0-x7
        }
    }

    /// Floating-point argument register budget.
    pub const fn max_fprs(self) -> usize {
        match self {
            Abi::SystemV => 8,  // xmm0-xmm7
            Abi::Win64 => 4,    // xmm0-xmm3
            Abi::Aapcs64 => 8,  // d0-d7
        }
    }

    /// Classifies an argument under this ABI's rules.
    ///
    /// Total and deterministic for every descriptor in the closed kind set.
    pub fn classify_argument(self, desc: &TypeDescriptor) -> ArgumentClassification {
        match self {
            Abi::SystemV => sysv::classify_argument(desc),
            Abi::Win64 => win64::classify_argument(desc),
            Abi::Aapcs64 => aapcs64::classify_argument(desc),
        }
    }

    /// Classifies a return type under this ABI's rules.
    pub fn classify_return(self, desc: &TypeDescriptor) -> ReturnFlags {
        match self {
            Abi::SystemV => sysv::classify_return(desc),
            Abi::Win64 => win64::classify_return(desc),
            Abi::Aapcs64 => aapcs64::classify_return(desc),
        }
    }
}
