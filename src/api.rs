//! Native primitive seam.
//!
//! [`RegistryApi`] is the set of registry primitives the facade is built on.
//! Implementations return raw native status codes; classification happens at
//! the call site through [`crate::status::CheckStatus`].

use crate::hive::Hive;
use crate::status::NativeResult;
use chrono::{DateTime, Utc};
use std::ops::BitOr;

/// Opaque native key handle. Zero is the "no handle" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawKey(pub usize);

impl RawKey {
    /// The sentinel handle.
    pub const NULL: RawKey = RawKey(0);

    /// Returns true for the sentinel handle.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Access rights requested when opening a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessMask(pub u32);

impl AccessMask {
    /// `KEY_QUERY_VALUE`.
    pub const QUERY_VALUE: AccessMask = AccessMask(0x0001);

    /// `KEY_SET_VALUE`.
    pub const SET_VALUE: AccessMask = AccessMask(0x0002);

    /// `KEY_CREATE_SUB_KEY`.
    pub const CREATE_SUB_KEY: AccessMask = AccessMask(0x0004);

    /// `KEY_ENUMERATE_SUB_KEYS`.
    pub const ENUMERATE_SUB_KEYS: AccessMask = AccessMask(0x0008);

    /// `KEY_WOW64_64KEY`.
    pub const WOW64_64KEY: AccessMask = AccessMask(0x0100);

    /// `KEY_WOW64_32KEY`.
    pub const WOW64_32KEY: AccessMask = AccessMask(0x0200);

    /// `DELETE`.
    pub const DELETE: AccessMask = AccessMask(0x0001_0000);

    /// Rights that modify the key or its values.
    pub const WRITE_RIGHTS: AccessMask = AccessMask(0x0001_0006);

    /// Returns true if every bit of `other` is set.
    pub fn contains(&self, other: AccessMask) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Returns true if any bit of `other` is set.
    pub fn intersects(&self, other: AccessMask) -> bool {
        (self.0 & other.0) != 0
    }

    /// Raw `REGSAM` bits.
    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl BitOr for AccessMask {
    type Output = AccessMask;

    fn bitor(self, rhs: AccessMask) -> AccessMask {
        AccessMask(self.0 | rhs.0)
    }
}

/// Result of the "query key info" primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyInfo {
    /// Number of subkeys.
    pub subkey_count: u32,

    /// Length of the longest subkey name, without terminator.
    pub max_subkey_name_len: u32,

    /// Number of values.
    pub value_count: u32,

    /// Length of the longest value name, without terminator.
    pub max_value_name_len: u32,

    /// Last written timestamp (Windows FILETIME).
    pub last_written: u64,
}

impl KeyInfo {
    /// Converts the last written timestamp to a [`DateTime`].
    pub fn last_written_datetime(&self) -> Option<DateTime<Utc>> {
        // Windows FILETIME is 100-nanosecond intervals since 1601-01-01
        const FILETIME_UNIX_DIFF: i64 = 11644473600;

        let seconds = (self.last_written / 10_000_000) as i64 - FILETIME_UNIX_DIFF;
        let nanos = ((self.last_written % 10_000_000) * 100) as u32;

        DateTime::from_timestamp(seconds, nanos)
    }
}

/// Native registry primitives.
///
/// Names and paths are NUL-terminated native byte strings produced by
/// [`crate::codec`]. Enumeration calls return the element name without its
/// terminator. Every handle returned by [`open_key`](Self::open_key) or
/// [`create_key`](Self::create_key) must be passed to
/// [`close_key`](Self::close_key) exactly once.
pub trait RegistryApi: Send + Sync {
    /// Opens `path` under the predefined key of `hive`.
    fn open_key(&self, hive: Hive, path: &[u8], access: AccessMask) -> NativeResult<RawKey>;

    /// Releases a handle.
    fn close_key(&self, key: RawKey) -> NativeResult<()>;

    /// Reads counts and maximum name lengths of a key.
    fn query_info(&self, key: RawKey) -> NativeResult<KeyInfo>;

    /// Name of the subkey at `index`, using a buffer of `buffer_len` bytes.
    fn enum_key(&self, key: RawKey, index: u32, buffer_len: u32) -> NativeResult<Vec<u8>>;

    /// Name of the value at `index`, using a buffer of `buffer_len` bytes.
    fn enum_value(&self, key: RawKey, index: u32, buffer_len: u32) -> NativeResult<Vec<u8>>;

    /// Data of a string value. `Ok(None)` when the value is not string-typed.
    fn query_value(&self, key: RawKey, name: &[u8]) -> NativeResult<Option<Vec<u8>>>;

    /// Writes a string value.
    fn set_value(&self, key: RawKey, name: &[u8], data: &[u8]) -> NativeResult<()>;

    /// Creates (or opens) the direct subkey `name` and returns its handle.
    fn create_key(&self, key: RawKey, name: &[u8], access: AccessMask) -> NativeResult<RawKey>;

    /// Deletes the direct subkey `name`.
    fn delete_key(&self, key: RawKey, name: &[u8]) -> NativeResult<()>;

    /// Deletes the value `name`.
    fn delete_value(&self, key: RawKey, name: &[u8]) -> NativeResult<()>;
}

impl<A: RegistryApi + ?Sized> RegistryApi for &A {
    fn open_key(&self, hive: Hive, path: &[u8], access: AccessMask) -> NativeResult<RawKey> {
        (**self).open_key(hive, path, access)
    }

    fn close_key(&self, key: RawKey) -> NativeResult<()> {
        (**self).close_key(key)
    }

    fn query_info(&self, key: RawKey) -> NativeResult<KeyInfo> {
        (**self).query_info(key)
    }

    fn enum_key(&self, key: RawKey, index: u32, buffer_len: u32) -> NativeResult<Vec<u8>> {
        (**self).enum_key(key, index, buffer_len)
    }

    fn enum_value(&self, key: RawKey, index: u32, buffer_len: u32) -> NativeResult<Vec<u8>> {
        (**self).enum_value(key, index, buffer_len)
    }

    fn query_value(&self, key: RawKey, name: &[u8]) -> NativeResult<Option<Vec<u8>>> {
        (**self).query_value(key, name)
    }

    fn set_value(&self, key: RawKey, name: &[u8], data: &[u8]) -> NativeResult<()> {
        (**self).set_value(key, name, data)
    }

    fn create_key(&self, key: RawKey, name: &[u8], access: AccessMask) -> NativeResult<RawKey> {
        (**self).create_key(key, name, access)
    }

    fn delete_key(&self, key: RawKey, name: &[u8]) -> NativeResult<()> {
        (**self).delete_key(key, name)
    }

    fn delete_value(&self, key: RawKey, name: &[u8]) -> NativeResult<()> {
        (**self).delete_value(key, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_mask() {
        let mask = AccessMask::ENUMERATE_SUB_KEYS | AccessMask::QUERY_VALUE;
        assert_eq!(mask.bits(), 9);
        assert!(mask.contains(AccessMask::QUERY_VALUE));
        assert!(!mask.contains(AccessMask::SET_VALUE));
        assert!(!mask.intersects(AccessMask::WRITE_RIGHTS));
        assert!(AccessMask::DELETE.intersects(AccessMask::WRITE_RIGHTS));
        assert!(AccessMask::CREATE_SUB_KEY.intersects(AccessMask::WRITE_RIGHTS));
    }

    #[test]
    fn test_last_written_datetime() {
        // 2021-01-01T00:00:00Z
        let info = KeyInfo {
            last_written: 132_539_328_000_000_000,
            ..KeyInfo::default()
        };
        let datetime = info.last_written_datetime().unwrap();
        assert_eq!(datetime.timestamp(), 1_609_459_200);
    }

    #[test]
    fn test_null_key() {
        assert!(RawKey::NULL.is_null());
        assert!(!RawKey(0x10).is_null());
    }
}
