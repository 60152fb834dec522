//! Dynamic library loading.
//!
//! A thin façade over the platform loader: `dlopen`/`dlsym`/`dlclose` on
//! Unix-family systems, `LoadLibraryW`/`GetProcAddress`/`FreeLibrary` on
//! Windows. Names are passed to the loader as-is; resolved addresses are
//! returned with no additional transformation.
//!
//! Handles and symbol addresses are caller-owned: a [`LibraryHandle`] must
//! outlive every [`SymbolAddress`] obtained from it and every outstanding
//! call using one of those addresses.

use std::ffi::c_void;

use crate::error::{FfiError, LibraryOp};

/// Opaque handle to a loaded shared library.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryHandle(*mut c_void);

// The handle is an address the platform loader hands out; it carries no
// thread affinity.
unsafe impl Send for LibraryHandle {}
unsafe impl Sync for LibraryHandle {}

impl LibraryHandle {
    /// Wraps a raw loader handle.
    pub fn from_raw(raw: *mut c_void) -> Self {
        LibraryHandle(raw)
    }

    /// The raw loader handle.
    pub fn as_ptr(self) -> *mut c_void {
        self.0
    }

    /// True for the null handle.
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

/// Opaque pointer to native code or data resolved from a library.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolAddress(*const c_void);

unsafe impl Send for SymbolAddress {}
unsafe impl Sync for SymbolAddress {}

impl SymbolAddress {
    /// Wraps a raw code or data address.
    pub fn from_raw(raw: *const c_void) -> Self {
        SymbolAddress(raw)
    }

    /// The raw address.
    pub fn as_ptr(self) -> *const c_void {
        self.0
    }

    /// True for the null address.
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

/// Loads a shared library by name or path.
///
/// On Unix this is `dlopen` with immediate resolution and global symbol
/// publication (`RTLD_NOW | RTLD_GLOBAL`); on Windows, `LoadLibraryW`.
pub fn load_library(name: &str) -> Result<LibraryHandle, FfiError> {
    let handle = platform::open(name)?;
    log::trace!("loaded library {name:?} at {:p}", handle.as_ptr());
    Ok(handle)
}

/// Resolves a symbol from a loaded library.
///
/// # Safety
///
/// `handle` must be a live handle from [`load_library`] that has not been
/// passed to [`free_library`].
pub unsafe fn get_symbol(handle: LibraryHandle, name: &str) -> Result<SymbolAddress, FfiError> {
    let address = platform::symbol(handle, name)?;
    log::trace!("resolved symbol {name:?} to {:p}", address.as_ptr());
    Ok(address)
}

/// Unloads a library. A null handle is a silent no-op.
///
/// # Safety
///
/// After this returns, every symbol address obtained from `handle` is
/// dangling; the caller must ensure no other thread is inside a call that
/// uses one.
pub unsafe fn free_library(handle: LibraryHandle) -> Result<(), FfiError> {
    if handle.is_null() {
        return Ok(());
    }
    platform::close(handle)?;
    log::trace!("freed library handle {:p}", handle.as_ptr());
    Ok(())
}

fn library_error(operation: LibraryOp, name: &str, detail: String) -> FfiError {
    FfiError::Library {
        operation,
        name: name.to_string(),
        detail,
    }
}

// ============================================================================
// Unix (Linux, macOS, FreeBSD)
// ============================================================================

#[cfg(unix)]
mod platform {
    use std::ffi::{CStr, CString};

    use super::{library_error, FfiError, LibraryHandle, LibraryOp, SymbolAddress};

    fn last_dl_error() -> String {
        unsafe {
            let message = libc::dlerror();
            if message.is_null() {
                "unknown loader error".to_string()
            } else {
                CStr::from_ptr(message).to_string_lossy().into_owned()
            }
        }
    }

    pub(super) fn open(name: &str) -> Result<LibraryHandle, FfiError> {
        let c_name = CString::new(name).map_err(|_| {
            library_error(LibraryOp::Load, name, "embedded NUL in library name".into())
        })?;

        unsafe {
            libc::dlerror(); // clear any stale diagnostic
            let handle = libc::dlopen(c_name.as_ptr(), libc::RTLD_NOW | libc::RTLD_GLOBAL);
            if handle.is_null() {
                return Err(library_error(LibraryOp::Load, name, last_dl_error()));
            }
            Ok(LibraryHandle::from_raw(handle))
        }
    }

    pub(super) fn symbol(handle: LibraryHandle, name: &str) -> Result<SymbolAddress, FfiError> {
        let c_name = CString::new(name).map_err(|_| {
            library_error(LibraryOp::Symbol, name, "embedded NUL in symbol name".into())
        })?;

        unsafe {
            libc::dlerror();
            let address = libc::dlsym(handle.as_ptr(), c_name.as_ptr());
            // dlsym may legitimately return null for a symbol whose value is
            // null; dlerror distinguishes that from a lookup failure.
            let message = libc::dlerror();
            if !message.is_null() {
                let detail = CStr::from_ptr(message).to_string_lossy().into_owned();
                return Err(library_error(LibraryOp::Symbol, name, detail));
            }
            Ok(SymbolAddress::from_raw(address))
        }
    }

    pub(super) fn close(handle: LibraryHandle) -> Result<(), FfiError> {
        unsafe {
            if libc::dlclose(handle.as_ptr()) != 0 {
                return Err(library_error(
                    LibraryOp::Free,
                    "<library handle>",
                    last_dl_error(),
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Windows
// ============================================================================

#[cfg(windows)]
mod platform {
    use std::ffi::{c_void, CString};
    use std::os::windows::ffi::OsStrExt;

    use super::{library_error, FfiError, LibraryHandle, LibraryOp, SymbolAddress};

    extern "system" {
        fn LoadLibraryW(filename: *const u16) -> *mut c_void;
        fn GetProcAddress(module: *mut c_void, name: *const i8) -> *mut c_void;
        fn FreeLibrary(module: *mut c_void) -> i32;
        fn GetLastError() -> u32;
    }

    pub(super) fn open(name: &str) -> Result<LibraryHandle, FfiError> {
        let wide: Vec<u16> = std::ffi::OsStr::new(name)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        let handle = unsafe { LoadLibraryW(wide.as_ptr()) };
        if handle.is_null() {
            let code = unsafe { GetLastError() };
            return Err(library_error(
                LibraryOp::Load,
                name,
                format!("error code {code}"),
            ));
        }
        Ok(LibraryHandle::from_raw(handle))
    }

    pub(super) fn symbol(handle: LibraryHandle, name: &str) -> Result<SymbolAddress, FfiError> {
        let c_name = CString::new(name).map_err(|_| {
            library_error(LibraryOp::Symbol, name, "embedded NUL in symbol name".into())
        })?;

        let address = unsafe { GetProcAddress(handle.as_ptr(), c_name.as_ptr()) };
        if address.is_null() {
            let code = unsafe { GetLastError() };
            return Err(library_error(
                LibraryOp::Symbol,
                name,
                format!("error code {code}"),
            ));
        }
        Ok(SymbolAddress::from_raw(address))
    }

    pub(super) fn close(handle: LibraryHandle) -> Result<(), FfiError> {
        let ok = unsafe { FreeLibrary(handle.as_ptr()) };
        if ok == 0 {
            let code = unsafe { GetLastError() };
            return Err(library_error(
                LibraryOp::Free,
                "<library handle>",
                format!("error code {code}"),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Other platforms
// ============================================================================

#[cfg(not(any(unix, windows)))]
mod platform {
    use super::{FfiError, LibraryHandle, SymbolAddress};

    pub(super) fn open(_name: &str) -> Result<LibraryHandle, FfiError> {
        Err(FfiError::host_platform())
    }

    pub(super) fn symbol(
        _handle: LibraryHandle,
        _name: &str,
    ) -> Result<SymbolAddress, FfiError> {
        Err(FfiError::host_platform())
    }

    pub(super) fn close(_handle: LibraryHandle) -> Result<(), FfiError> {
        Err(FfiError::host_platform())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(any(unix, windows))]
    #[test]
    fn missing_library_reports_a_load_error() {
        let err = load_library("/nonexistent/veneer-missing-library.so").unwrap_err();
        match err {
            FfiError::Library { operation, .. } => assert_eq!(operation, LibraryOp::Load),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn freeing_a_null_handle_is_a_no_op() {
        let handle = LibraryHandle::from_raw(std::ptr::null_mut());
        unsafe { free_library(handle) }.unwrap();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn libc_symbols_resolve() {
        let lib = load_library("libc.so.6").unwrap();
        let strlen = unsafe { get_symbol(lib, "strlen") }.unwrap();
        assert!(!strlen.is_null());

        let missing = unsafe { get_symbol(lib, "veneer_no_such_symbol") };
        match missing {
            Err(FfiError::Library { operation, name, .. }) => {
                assert_eq!(operation, LibraryOp::Symbol);
                assert_eq!(name, "veneer_no_such_symbol");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }
}
