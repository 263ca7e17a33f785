//! Binding to the vendor card library
//!
//! The reader ships with a small C library (`libcard.so`) exposing a block
//! string API on top of PC/SC. It is loaded at runtime so the crate builds
//! and tests without it.

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use log::{debug, info};

use super::{CardTransport, Status, TransportError, STATUS_ERROR};
use crate::card::{AuthenticationKey, BlockAddress};

type ListReadersFn = unsafe extern "C" fn() -> *const c_char;
type GetLastErrorFn = unsafe extern "C" fn() -> *const c_char;
type ConnectReaderFn = unsafe extern "C" fn(*const c_char) -> c_int;
type ReadBlockStringFn = unsafe extern "C" fn(*const c_char, c_int) -> *const c_char;
type WriteBlockStringFn = unsafe extern "C" fn(*const c_char, c_int, *const c_char) -> c_int;
type CleanupFn = unsafe extern "C" fn();

/// Card library loaded with `dlopen`
pub struct LibCard {
    handle: *mut c_void,
    list_readers: ListReadersFn,
    get_last_error: GetLastErrorFn,
    connect_reader: ConnectReaderFn,
    read_block_string: ReadBlockStringFn,
    write_block_string: WriteBlockStringFn,
    cleanup: CleanupFn,
}

// SAFETY: the library keeps a single global reader handle and LibCard is
// never shared between threads, only moved.
unsafe impl Send for LibCard {}

impl LibCard {
    /// Load the library and resolve its entry points
    pub fn open(path: &Path) -> Result<Self, TransportError> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| TransportError(format!("Invalid library path: {}", path.display())))?;

        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        if handle.is_null() {
            return Err(TransportError(format!(
                "Cannot load {}: {}",
                path.display(),
                dl_error()
            )));
        }

        let resolved = unsafe { Self::resolve(handle) };
        match &resolved {
            Ok(_) => info!("Loaded card library {}", path.display()),
            Err(_) => unsafe {
                libc::dlclose(handle);
            },
        }
        resolved
    }

    unsafe fn resolve(handle: *mut c_void) -> Result<Self, TransportError> {
        Ok(Self {
            handle,
            list_readers: symbol(handle, "list_readers")?,
            get_last_error: symbol(handle, "get_last_error")?,
            connect_reader: symbol(handle, "connect_reader")?,
            read_block_string: symbol(handle, "read_block_string")?,
            write_block_string: symbol(handle, "write_block_string")?,
            cleanup: symbol(handle, "cleanup")?,
        })
    }
}

impl Drop for LibCard {
    fn drop(&mut self) {
        unsafe { libc::dlclose(self.handle) };
    }
}

/// Resolve a function symbol
///
/// # Safety
/// `F` must be the `extern "C"` function pointer type matching the symbol.
unsafe fn symbol<F: Copy>(handle: *mut c_void, name: &str) -> Result<F, TransportError> {
    let c_name = CString::new(name).map_err(|_| TransportError(format!("Bad symbol {}", name)))?;
    let ptr = libc::dlsym(handle, c_name.as_ptr());
    if ptr.is_null() {
        return Err(TransportError(format!("Missing symbol {}: {}", name, dl_error())));
    }
    Ok(std::mem::transmute_copy::<*mut c_void, F>(&ptr))
}

fn dl_error() -> String {
    let msg = unsafe { libc::dlerror() };
    if msg.is_null() {
        "unknown error".to_string()
    } else {
        unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
    }
}

/// Copy a library-owned C string
fn take_bytes(ptr: *const c_char) -> Option<Vec<u8>> {
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(ptr) }.to_bytes().to_vec())
    }
}

fn to_c_int(block: BlockAddress) -> Option<c_int> {
    c_int::try_from(block).ok()
}

/// Split the library's enumeration text into entries
///
/// The separator is not fixed, so entries are lines and a line may hold
/// several names. Sessions match a reader by containment.
fn parse_reader_list(text: &str) -> Result<Vec<String>, TransportError> {
    if text.contains("ERROR") {
        return Err(TransportError(text.to_string()));
    }
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

impl CardTransport for LibCard {
    fn list_readers(&mut self) -> Result<Vec<String>, TransportError> {
        let raw = take_bytes(unsafe { (self.list_readers)() }).unwrap_or_default();
        let text = String::from_utf8_lossy(&raw).into_owned();
        debug!("Available readers: {}", text);
        parse_reader_list(&text)
    }

    fn connect_reader(&mut self, reader: &str) -> Status {
        match CString::new(reader) {
            Ok(name) => unsafe { (self.connect_reader)(name.as_ptr()) },
            Err(_) => STATUS_ERROR,
        }
    }

    fn read_block_string(
        &mut self,
        key: &AuthenticationKey,
        block: BlockAddress,
    ) -> Option<Vec<u8>> {
        let block = to_c_int(block)?;
        let key = CString::new(key.to_hex()).ok()?;
        take_bytes(unsafe { (self.read_block_string)(key.as_ptr(), block) })
    }

    fn write_block_string(
        &mut self,
        key: &AuthenticationKey,
        block: BlockAddress,
        payload: &[u8],
    ) -> Status {
        let Some(block) = to_c_int(block) else {
            return STATUS_ERROR;
        };
        // The library takes a C string, so the payload ends at the first NUL
        let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
        let (Ok(key), Ok(data)) = (CString::new(key.to_hex()), CString::new(&payload[..end])) else {
            return STATUS_ERROR;
        };
        unsafe { (self.write_block_string)(key.as_ptr(), block, data.as_ptr()) }
    }

    fn last_error(&mut self) -> String {
        take_bytes(unsafe { (self.get_last_error)() })
            .map(|raw| String::from_utf8_lossy(&raw).into_owned())
            .unwrap_or_default()
    }

    fn cleanup(&mut self) {
        unsafe { (self.cleanup)() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::reader_listed;

    #[test]
    fn test_missing_library() {
        let err = LibCard::open(Path::new("/nonexistent/libcard.so")).err().unwrap();
        assert!(err.0.starts_with("Cannot load /nonexistent/libcard.so"));
    }

    #[test]
    fn test_joined_reader_list_matches() {
        let reader = "HID Global OMNIKEY 5422CL 00 00";
        let readers = parse_reader_list(&format!("ReaderA; {}", reader)).unwrap();
        assert_eq!(readers.len(), 1);
        assert!(reader_listed(&readers, reader));

        let readers = parse_reader_list(&format!("ReaderA\n{}\n", reader)).unwrap();
        assert_eq!(readers.len(), 2);
        assert!(reader_listed(&readers, reader));
    }

    #[test]
    fn test_reader_list_error() {
        let err = parse_reader_list("ERROR: No readers found").unwrap_err();
        assert_eq!(err.0, "ERROR: No readers found");
    }

    #[test]
    fn test_take_bytes_null() {
        assert!(take_bytes(std::ptr::null()).is_none());
        let s = CString::new("Alice").unwrap();
        assert_eq!(take_bytes(s.as_ptr()).unwrap(), b"Alice".to_vec());
    }
}
