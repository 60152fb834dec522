//! Typed callback signatures.
//!
//! Closures become native-callable through the [`IntoCallback`] trait,
//! implemented for `Fn` types of up to twelve parameters over the
//! [`CbParam`] / [`CbReturn`] vocabulary. Each implementation produces a
//! monomorphised decoder that walks the dispatcher's register snapshot
//! with the live ABI's geometry — there is no runtime reflection.

use std::sync::Arc;

// Register-block geometry of the live ABI: the dispatcher snapshots the
// float block first, then the integer block, then a window of caller
// stack words.
#[cfg(all(target_arch = "x86_64", unix))]
mod geometry {
    pub(crate) const FLOAT_REG_SLOTS: usize = 8; // xmm0-xmm7
    pub(crate) const INT_REG_SLOTS: usize = 6; // rdi, rsi, rdx, rcx, r8, r9
    pub(crate) const POSITIONAL: bool = false;
}

#[cfg(all(target_arch = "x86_64", windows))]
mod geometry {
    pub(crate) const FLOAT_REG_SLOTS: usize = 4; // xmm0-xmm3
    pub(crate) const INT_REG_SLOTS: usize = 4; // rcx, rdx, r8, r9
    pub(crate) const POSITIONAL: bool = true;
}

#[cfg(target_arch = "aarch64")]
mod geometry {
    pub(crate) const FLOAT_REG_SLOTS: usize = 8; // d0-d7
    pub(crate) const INT_REG_SLOTS: usize = 8; // x0-x7
    pub(crate) const POSITIONAL: bool = false;
}

// Placeholder so the decoders compile on targets without a trampoline
// table; registration fails before any of this runs.
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
mod geometry {
    pub(crate) const FLOAT_REG_SLOTS: usize = 8;
    pub(crate) const INT_REG_SLOTS: usize = 6;
    pub(crate) const POSITIONAL: bool = false;
}

pub(crate) use geometry::{FLOAT_REG_SLOTS, INT_REG_SLOTS, POSITIONAL};

/// Caller stack words the dispatcher copies into the frame.
#[cfg_attr(
    not(any(target_arch = "x86_64", target_arch = "aarch64")),
    allow(dead_code)
)]
pub(crate) const STACK_SLOTS: usize = 16;

/// Total frame slots the dispatcher snapshots.
#[cfg_attr(
    not(any(target_arch = "x86_64", target_arch = "aarch64")),
    allow(dead_code)
)]
pub(crate) const FRAME_SLOTS: usize = FLOAT_REG_SLOTS + INT_REG_SLOTS + STACK_SLOTS;

/// The decoder stored in a registry slot.
#[doc(hidden)]
pub type Handler = Arc<dyn Fn(&CallbackFrame) -> usize + Send + Sync>;

/// Snapshot of the ABI argument state captured by the shared dispatcher:
/// float registers, then integer registers, then copied stack words.
#[doc(hidden)]
pub struct CallbackFrame {
    slots: *const u64,
}

impl CallbackFrame {
    /// # Safety
    ///
    /// `slots` must address at least [`FRAME_SLOTS`] readable words laid
    /// out as described above.
    pub(crate) unsafe fn new(slots: *const u64) -> Self {
        CallbackFrame { slots }
    }

    fn float_slot(&self, index: usize) -> u64 {
        unsafe { *self.slots.add(index) }
    }

    fn int_slot(&self, index: usize) -> u64 {
        unsafe { *self.slots.add(FLOAT_REG_SLOTS + index) }
    }

    fn stack_slot(&self, index: usize) -> u64 {
        unsafe { *self.slots.add(FLOAT_REG_SLOTS + INT_REG_SLOTS + index) }
    }
}

/// Walks a frame's argument slots in declaration order.
///
/// Sequential ABIs consume the integer and float blocks independently and
/// fall through to the stack window; the positional Win64 rule reads slot
/// k for the k-th parameter.
#[doc(hidden)]
pub struct ArgCursor<'f> {
    frame: &'f CallbackFrame,
    ints: usize,
    floats: usize,
    stack: usize,
    position: usize,
}

impl<'f> ArgCursor<'f> {
    pub(crate) fn new(frame: &'f CallbackFrame) -> Self {
        ArgCursor {
            frame,
            ints: 0,
            floats: 0,
            stack: 0,
            position: 0,
        }
    }

    /// Next integer-class argument slot.
    pub fn next_int(&mut self) -> u64 {
        let value = if POSITIONAL {
            if self.position < INT_REG_SLOTS {
                self.frame.int_slot(self.position)
            } else {
                self.frame.stack_slot(self.position - INT_REG_SLOTS)
            }
        } else if self.ints < INT_REG_SLOTS {
            let slot = self.frame.int_slot(self.ints);
            self.ints += 1;
            slot
        } else {
            let slot = self.frame.stack_slot(self.stack);
            self.stack += 1;
            slot
        };
        self.position += 1;
        value
    }

    /// Next float-class argument slot.
    pub fn next_float(&mut self) -> u64 {
        let value = if POSITIONAL {
            if self.position < FLOAT_REG_SLOTS {
                self.frame.float_slot(self.position)
            } else {
                self.frame.stack_slot(self.position - FLOAT_REG_SLOTS)
            }
        } else if self.floats < FLOAT_REG_SLOTS {
            let slot = self.frame.float_slot(self.floats);
            self.floats += 1;
            slot
        } else {
            let slot = self.frame.stack_slot(self.stack);
            self.stack += 1;
            slot
        };
        self.position += 1;
        value
    }
}

/// A type a native caller can hand to a registered callback.
///
/// Covers the standard-width integers, `usize`/`isize`, `bool`, `f32`,
/// `f64`, and raw pointers.
pub trait CbParam: Sized + 'static {
    /// True when the value travels in the float register class.
    #[doc(hidden)]
    const IS_FLOAT: bool;
    /// Size of the Rust type in bytes.
    #[doc(hidden)]
    const SIZE: usize;
    /// Reconstructs the value from the next matching frame slot.
    #[doc(hidden)]
    fn decode(cursor: &mut ArgCursor<'_>) -> Self;
}

macro_rules! int_param {
    ($($ty:ty),*) => {
        $(
            impl CbParam for $ty {
                const IS_FLOAT: bool = false;
                const SIZE: usize = std::mem::size_of::<$ty>();
                fn decode(cursor: &mut ArgCursor<'_>) -> Self {
                    cursor.next_int() as $ty
                }
            }
        )*
    };
}

int_param!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl CbParam for bool {
    const IS_FLOAT: bool = false;
    const SIZE: usize = 1;
    fn decode(cursor: &mut ArgCursor<'_>) -> Self {
        cursor.next_int() != 0
    }
}

impl CbParam for f32 {
    const IS_FLOAT: bool = true;
    const SIZE: usize = 4;
    fn decode(cursor: &mut ArgCursor<'_>) -> Self {
        // The pattern occupies the low half of its slot.
        f32::from_bits(cursor.next_float() as u32)
    }
}

impl CbParam for f64 {
    const IS_FLOAT: bool = true;
    const SIZE: usize = 8;
    fn decode(cursor: &mut ArgCursor<'_>) -> Self {
        f64::from_bits(cursor.next_float())
    }
}

impl<T: 'static> CbParam for *const T {
    const IS_FLOAT: bool = false;
    const SIZE: usize = std::mem::size_of::<*const T>();
    fn decode(cursor: &mut ArgCursor<'_>) -> Self {
        cursor.next_int() as usize as *const T
    }
}

impl<T: 'static> CbParam for *mut T {
    const IS_FLOAT: bool = false;
    const SIZE: usize = std::mem::size_of::<*mut T>();
    fn decode(cursor: &mut ArgCursor<'_>) -> Self {
        cursor.next_int() as usize as *mut T
    }
}

/// A type a registered callback can return to its native caller.
///
/// At most one value: integers and pointers as their bit pattern, `bool`
/// as 0/1, floats as their IEEE bit pattern (`f32` in the low 32 bits),
/// and `()` for a void return.
pub trait CbReturn: 'static {
    /// True when the value returns in the float register class.
    #[doc(hidden)]
    const IS_FLOAT: bool;
    /// Size of the Rust type in bytes (0 for `()`).
    #[doc(hidden)]
    const SIZE: usize;
    /// Encodes the value into the pointer-sized result slot.
    #[doc(hidden)]
    fn encode(self) -> usize;
}

impl CbReturn for () {
    const IS_FLOAT: bool = false;
    const SIZE: usize = 0;
    fn encode(self) -> usize {
        0
    }
}

macro_rules! unsigned_return {
    ($($ty:ty),*) => {
        $(
            impl CbReturn for $ty {
                const IS_FLOAT: bool = false;
                const SIZE: usize = std::mem::size_of::<$ty>();
                fn encode(self) -> usize {
                    self as usize
                }
            }
        )*
    };
}

macro_rules! signed_return {
    ($($ty:ty),*) => {
        $(
            impl CbReturn for $ty {
                const IS_FLOAT: bool = false;
                const SIZE: usize = std::mem::size_of::<$ty>();
                fn encode(self) -> usize {
                    self as i64 as usize
                }
            }
        )*
    };
}

unsigned_return!(u8, u16, u32, u64, usize);
signed_return!(i8, i16, i32, i64, isize);

impl CbReturn for bool {
    const IS_FLOAT: bool = false;
    const SIZE: usize = 1;
    fn encode(self) -> usize {
        usize::from(self)
    }
}

impl CbReturn for f32 {
    const IS_FLOAT: bool = true;
    const SIZE: usize = 4;
    fn encode(self) -> usize {
        self.to_bits() as usize
    }
}

impl CbReturn for f64 {
    const IS_FLOAT: bool = true;
    const SIZE: usize = 8;
    fn encode(self) -> usize {
        self.to_bits() as usize
    }
}

impl<T: 'static> CbReturn for *const T {
    const IS_FLOAT: bool = false;
    const SIZE: usize = std::mem::size_of::<*const T>();
    fn encode(self) -> usize {
        self as usize
    }
}

impl<T: 'static> CbReturn for *mut T {
    const IS_FLOAT: bool = false;
    const SIZE: usize = std::mem::size_of::<*mut T>();
    fn encode(self) -> usize {
        self as usize
    }
}

/// Closures that can be registered as native callbacks.
///
/// Implemented for `Fn` types of zero to twelve [`CbParam`] parameters
/// returning a [`CbReturn`] value. The `Args` parameter only drives
/// inference; callers never name it.
pub trait IntoCallback<Args> {
    /// Builds the registry handler: the monomorphised frame decoder plus
    /// the platform registration guard.
    #[doc(hidden)]
    fn into_handler(self) -> Handler;
}

// Win64 delegates nothing: the engine owns its wrapper, but the
// registration surface keeps the platform's restrictions — every
// parameter and the return must be pointer-sized, and floats cannot be
// direct parameters.
#[cfg(all(target_arch = "x86_64", windows))]
pub(crate) fn win64_parameter_guard(is_float: bool, size: usize) {
    if is_float {
        panic!("ffi: float arguments are not supported in Win64 callbacks (pass the bit pattern as usize)");
    }
    if size != 8 {
        panic!("ffi: Win64 callbacks require pointer-sized arguments");
    }
}

#[cfg(all(target_arch = "x86_64", windows))]
pub(crate) fn win64_return_guard(is_float: bool, size: usize) {
    if is_float {
        panic!("ffi: float return values are not supported in Win64 callbacks");
    }
    if size != 8 {
        panic!("ffi: Win64 callbacks require exactly one pointer-sized return value");
    }
}

macro_rules! impl_into_callback {
    ($($param:ident),*) => {
        impl<Func, Ret, $($param,)*> IntoCallback<($($param,)*)> for Func
        where
            Func: Fn($($param),*) -> Ret + Send + Sync + 'static,
            Ret: CbReturn,
            $($param: CbParam,)*
        {
            fn into_handler(self) -> Handler {
                #[cfg(all(target_arch = "x86_64", windows))]
                {
                    $(win64_parameter_guard($param::IS_FLOAT, $param::SIZE);)*
                    win64_return_guard(Ret::IS_FLOAT, Ret::SIZE);
                }
                Arc::new(move |frame| {
                    let mut cursor = ArgCursor::new(frame);
                    let _ = &mut cursor;
                    $(let $param = <$param as CbParam>::decode(&mut cursor);)*
                    (self)($($param),*).encode()
                })
            }
        }
    };
}

impl_into_callback!();
impl_into_callback!(A);
impl_into_callback!(A, B);
impl_into_callback!(A, B, C);
impl_into_callback!(A, B, C, D);
impl_into_callback!(A, B, C, D, E);
impl_into_callback!(A, B, C, D, E, F);
impl_into_callback!(A, B, C, D, E, F, G);
impl_into_callback!(A, B, C, D, E, F, G, H);
impl_into_callback!(A, B, C, D, E, F, G, H, I);
impl_into_callback!(A, B, C, D, E, F, G, H, I, J);
impl_into_callback!(A, B, C, D, E, F, G, H, I, J, K);
impl_into_callback!(A, B, C, D, E, F, G, H, I, J, K, L);
