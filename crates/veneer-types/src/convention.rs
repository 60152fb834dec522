//! Calling conventions.

/// Function calling conventions understood by the engine.
///
/// `Default` is a sentinel resolved when a call interface is compiled: it
/// becomes `Win64` on Windows hosts and `SysV` everywhere else. On AArch64
/// hosts every convention maps onto AAPCS64 at invocation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallingConvention {
    /// Resolve to the host's native convention at interface-compile time.
    #[default]
    Default,
    /// System V AMD64 (Linux, macOS, FreeBSD).
    SysV,
    /// Microsoft x64.
    Win64,
    /// GNU toolchains on Windows. Register rules are identical to `Win64`.
    GnuWin64,
}

impl CallingConvention {
    /// Resolves the `Default` sentinel to the host's native convention.
    /// Concrete conventions pass through unchanged.
    pub fn resolve(self) -> CallingConvention {
        match self {
            CallingConvention::Default => {
                if cfg!(windows) {
                    CallingConvention::Win64
                } else {
                    CallingConvention::SysV
                }
            }
            other => other,
        }
    }

    /// True for the Windows conventions (`Win64`, `GnuWin64`).
    pub fn is_windows(self) -> bool {
        matches!(
            self,
            CallingConvention::Win64 | CallingConvention::GnuWin64
        )
    }

    /// Maps a raw wire value onto the closed set, for embedders that
    /// receive conventions as integers. `0` is `Default`.
    pub fn from_raw(value: u32) -> Option<CallingConvention> {
        match value {
            0 => Some(CallingConvention::Default),
            1 => Some(CallingConvention::SysV),
            2 => Some(CallingConvention::Win64),
            3 => Some(CallingConvention::GnuWin64),
            _ => None,
        }
    }
}
