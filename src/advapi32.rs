//! Native registry primitives from `advapi32.dll`.
//!
//! The ANSI entry points are resolved once when [`Advapi32::load`] runs and the
//! library stays loaded for the lifetime of the value. On hosts without
//! `advapi32.dll` loading fails, and with it every attempt to build the
//! system registry.

use crate::api::{AccessMask, KeyInfo, RawKey, RegistryApi};
use crate::error::{RegistryError, Result};
use crate::hive::Hive;
use crate::status::{NativeResult, ERROR_MORE_DATA, ERROR_SUCCESS};
use libloading::Library;
use std::ptr;
use tracing::{debug, info, instrument};

type Hkey = isize;
type Lstatus = i32;

type RegOpenKeyExA = unsafe extern "system" fn(Hkey, *const u8, u32, u32, *mut Hkey) -> Lstatus;
type RegCloseKey = unsafe extern "system" fn(Hkey) -> Lstatus;
type RegQueryInfoKeyA = unsafe extern "system" fn(
    Hkey,
    *mut u8,
    *mut u32,
    *mut u32,
    *mut u32,
    *mut u32,
    *mut u32,
    *mut u32,
    *mut u32,
    *mut u32,
    *mut u32,
    *mut u64,
) -> Lstatus;
type RegEnumKeyExA = unsafe extern "system" fn(
    Hkey,
    u32,
    *mut u8,
    *mut u32,
    *mut u32,
    *mut u8,
    *mut u32,
    *mut u64,
) -> Lstatus;
type RegEnumValueA = unsafe extern "system" fn(
    Hkey,
    u32,
    *mut u8,
    *mut u32,
    *mut u32,
    *mut u32,
    *mut u8,
    *mut u32,
) -> Lstatus;
type RegQueryValueExA =
    unsafe extern "system" fn(Hkey, *const u8, *mut u32, *mut u32, *mut u8, *mut u32) -> Lstatus;
type RegSetValueExA =
    unsafe extern "system" fn(Hkey, *const u8, u32, u32, *const u8, u32) -> Lstatus;
type RegCreateKeyExA = unsafe extern "system" fn(
    Hkey,
    *const u8,
    u32,
    *mut u8,
    u32,
    u32,
    *const core::ffi::c_void,
    *mut Hkey,
    *mut u32,
) -> Lstatus;
type RegDeleteKeyA = unsafe extern "system" fn(Hkey, *const u8) -> Lstatus;
type RegDeleteValueA = unsafe extern "system" fn(Hkey, *const u8) -> Lstatus;

const LIBRARY: &str = "advapi32.dll";

const REG_SZ: u32 = 1;
const REG_EXPAND_SZ: u32 = 2;
const REG_OPTION_NON_VOLATILE: u32 = 0;

fn status(code: Lstatus) -> NativeResult<()> {
    match code as u32 {
        ERROR_SUCCESS => Ok(()),
        code => Err(code),
    }
}

/// Predefined key handle of a hive. The identifier is sign-extended, as the
/// `HKEY_*` constants are on 64-bit targets.
fn predefined(hive: Hive) -> Hkey {
    hive.id() as i32 as Hkey
}

fn hkey(key: RawKey) -> Hkey {
    key.0 as Hkey
}

/// Resolved registry entry points.
pub struct Advapi32 {
    open_key: RegOpenKeyExA,
    close_key: RegCloseKey,
    query_info: RegQueryInfoKeyA,
    enum_key: RegEnumKeyExA,
    enum_value: RegEnumValueA,
    query_value: RegQueryValueExA,
    set_value: RegSetValueExA,
    create_key: RegCreateKeyExA,
    delete_key: RegDeleteKeyA,
    delete_value: RegDeleteValueA,
    // Keeps the function pointers above valid.
    _library: Library,
}

impl std::fmt::Debug for Advapi32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Advapi32").finish_non_exhaustive()
    }
}

/// Copies an entry point out of `library`.
///
/// # Safety
///
/// `T` must be the exact function pointer type of the exported symbol.
unsafe fn resolve<T: Copy>(library: &Library, name: &str) -> Result<T> {
    let symbol = format!("{}\0", name);
    library
        .get::<T>(symbol.as_bytes())
        .map(|sym| *sym)
        .map_err(|e| RegistryError::Unavailable(format!("{} in {}: {}", name, LIBRARY, e)))
}

impl Advapi32 {
    /// Loads the library and resolves every entry point.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unavailable`] if the library or any symbol is
    /// missing.
    #[instrument]
    pub fn load() -> Result<Self> {
        // SAFETY: advapi32.dll is a system library whose initialization
        // routines have no preconditions.
        let library = unsafe { Library::new(LIBRARY) }
            .map_err(|e| RegistryError::Unavailable(format!("{}: {}", LIBRARY, e)))?;

        // SAFETY: each type alias matches the documented signature of the
        // export it is resolved against.
        let api = unsafe {
            Self {
                open_key: resolve(&library, "RegOpenKeyExA")?,
                close_key: resolve(&library, "RegCloseKey")?,
                query_info: resolve(&library, "RegQueryInfoKeyA")?,
                enum_key: resolve(&library, "RegEnumKeyExA")?,
                enum_value: resolve(&library, "RegEnumValueA")?,
                query_value: resolve(&library, "RegQueryValueExA")?,
                set_value: resolve(&library, "RegSetValueExA")?,
                create_key: resolve(&library, "RegCreateKeyExA")?,
                delete_key: resolve(&library, "RegDeleteKeyA")?,
                delete_value: resolve(&library, "RegDeleteValueA")?,
                _library: library,
            }
        };

        info!("Resolved native registry entry points");
        Ok(api)
    }
}

/// Sizes a value, then reads it. Both steps repeat while the value keeps
/// growing in between.
fn read_string_value<F>(mut query: F) -> NativeResult<Option<Vec<u8>>>
where
    F: FnMut(&mut u32, *mut u8, &mut u32) -> Lstatus,
{
    loop {
        let mut kind = 0u32;
        let mut size = 0u32;
        status(query(&mut kind, ptr::null_mut(), &mut size))?;
        if kind != REG_SZ && kind != REG_EXPAND_SZ {
            debug!(kind, "Value is not a string");
            return Ok(None);
        }

        let mut data = vec![0u8; size as usize];
        match status(query(&mut kind, data.as_mut_ptr(), &mut size)) {
            Err(ERROR_MORE_DATA) => debug!(size, "Value grew between sizing and read"),
            result => {
                result?;
                data.truncate(size as usize);
                return Ok(Some(data));
            }
        }
    }
}

impl RegistryApi for Advapi32 {
    fn open_key(&self, hive: Hive, path: &[u8], access: AccessMask) -> NativeResult<RawKey> {
        debug_assert_eq!(path.last(), Some(&0));
        let mut result: Hkey = 0;
        // SAFETY: `path` is NUL-terminated and `result` outlives the call.
        let code = unsafe {
            (self.open_key)(predefined(hive), path.as_ptr(), 0, access.bits(), &mut result)
        };
        status(code)?;
        Ok(RawKey(result as usize))
    }

    fn close_key(&self, key: RawKey) -> NativeResult<()> {
        // SAFETY: the handle came from open_key/create_key and is closed once.
        status(unsafe { (self.close_key)(hkey(key)) })
    }

    fn query_info(&self, key: RawKey) -> NativeResult<KeyInfo> {
        let mut info = KeyInfo::default();
        // SAFETY: every non-null pointer refers to a live local or field.
        let code = unsafe {
            (self.query_info)(
                hkey(key),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                &mut info.subkey_count,
                &mut info.max_subkey_name_len,
                ptr::null_mut(),
                &mut info.value_count,
                &mut info.max_value_name_len,
                ptr::null_mut(),
                ptr::null_mut(),
                &mut info.last_written,
            )
        };
        status(code)?;
        Ok(info)
    }

    fn enum_key(&self, key: RawKey, index: u32, buffer_len: u32) -> NativeResult<Vec<u8>> {
        let mut buffer = vec![0u8; buffer_len as usize];
        let mut len = buffer_len;
        // SAFETY: `buffer` holds `len` bytes.
        let code = unsafe {
            (self.enum_key)(
                hkey(key),
                index,
                buffer.as_mut_ptr(),
                &mut len,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        status(code)?;
        buffer.truncate(len as usize);
        Ok(buffer)
    }

    fn enum_value(&self, key: RawKey, index: u32, buffer_len: u32) -> NativeResult<Vec<u8>> {
        let mut buffer = vec![0u8; buffer_len as usize];
        let mut len = buffer_len;
        // SAFETY: `buffer` holds `len` bytes; data is not requested.
        let code = unsafe {
            (self.enum_value)(
                hkey(key),
                index,
                buffer.as_mut_ptr(),
                &mut len,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        status(code)?;
        buffer.truncate(len as usize);
        Ok(buffer)
    }

    fn query_value(&self, key: RawKey, name: &[u8]) -> NativeResult<Option<Vec<u8>>> {
        read_string_value(|kind, data, size| {
            // SAFETY: `name` is NUL-terminated; `data` is null or holds `*size` bytes.
            unsafe {
                (self.query_value)(hkey(key), name.as_ptr(), ptr::null_mut(), kind, data, size)
            }
        })
    }

    fn set_value(&self, key: RawKey, name: &[u8], data: &[u8]) -> NativeResult<()> {
        // SAFETY: `name` is NUL-terminated and `data` is read for its length.
        let code = unsafe {
            (self.set_value)(hkey(key), name.as_ptr(), 0, REG_SZ, data.as_ptr(), data.len() as u32)
        };
        status(code)
    }

    fn create_key(&self, key: RawKey, name: &[u8], access: AccessMask) -> NativeResult<RawKey> {
        let mut result: Hkey = 0;
        let mut disposition = 0u32;
        // SAFETY: `name` is NUL-terminated; out pointers refer to locals.
        let code = unsafe {
            (self.create_key)(
                hkey(key),
                name.as_ptr(),
                0,
                ptr::null_mut(),
                REG_OPTION_NON_VOLATILE,
                access.bits(),
                ptr::null(),
                &mut result,
                &mut disposition,
            )
        };
        status(code)?;
        debug!(disposition, "Created key");
        Ok(RawKey(result as usize))
    }

    fn delete_key(&self, key: RawKey, name: &[u8]) -> NativeResult<()> {
        // SAFETY: `name` is NUL-terminated.
        status(unsafe { (self.delete_key)(hkey(key), name.as_ptr()) })
    }

    fn delete_value(&self, key: RawKey, name: &[u8]) -> NativeResult<()> {
        // SAFETY: `name` is NUL-terminated.
        status(unsafe { (self.delete_value)(hkey(key), name.as_ptr()) })
    }
}
