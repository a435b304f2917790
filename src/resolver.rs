//! Path handling and key opening.

use crate::api::{AccessMask, RegistryApi};
use crate::codec;
use crate::error::Result;
use crate::handle::KeyHandle;
use crate::hive::Hive;
use crate::status::CheckStatus;
use tracing::debug;

/// Strips one trailing separator.
pub fn normalize(path: &str) -> &str {
    path.strip_suffix('\\').unwrap_or(path)
}

/// Splits a path into `(parent, leaf)`.
///
/// Without a separator the parent is the hive root (empty path) and the leaf
/// is the whole input.
pub fn split(path: &str) -> (&str, &str) {
    let path = normalize(path);
    match path.rfind('\\') {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => ("", path),
    }
}

/// `HIVE\path` form used in error messages.
pub(crate) fn display_path(hive: Hive, path: &str) -> String {
    if path.is_empty() {
        hive.name().to_string()
    } else {
        format!("{}\\{}", hive, path)
    }
}

/// Opens `path` under `hive` with the requested rights.
pub fn open_node<'a, A: RegistryApi + ?Sized>(
    api: &'a A,
    hive: Hive,
    path: &str,
    access: AccessMask,
) -> Result<KeyHandle<'a, A>> {
    let path = normalize(path);
    let native = codec::to_native_path(path);
    let raw = api
        .open_key(hive, &native, access)
        .check(|| format!("Cannot open key {}", display_path(hive, path)))?;
    debug!(hive = %hive, path, access = access.bits(), handle = raw.0, "Opened key");
    Ok(KeyHandle::new(api, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRegistry;

    #[test]
    fn test_split() {
        assert_eq!(split("Software\\MyTest"), ("Software", "MyTest"));
        assert_eq!(split("a\\b\\c"), ("a\\b", "c"));
        assert_eq!(split("MyTest"), ("", "MyTest"));
        assert_eq!(split(""), ("", ""));
    }

    #[test]
    fn test_split_strips_trailing_separator() {
        assert_eq!(split("Software\\MyTest\\"), ("Software", "MyTest"));
        assert_eq!(split("MyTest\\"), ("", "MyTest"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Software\\"), "Software");
        assert_eq!(normalize("Software"), "Software");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_display_path() {
        assert_eq!(display_path(Hive::LocalMachine, ""), "HKEY_LOCAL_MACHINE");
        assert_eq!(
            display_path(Hive::CurrentUser, "Software\\MyTest"),
            "HKEY_CURRENT_USER\\Software\\MyTest"
        );
    }

    #[test]
    fn test_open_missing_node() {
        let registry = MemoryRegistry::new();
        let err = open_node(&registry, Hive::LocalMachine, "DoesNotExist", AccessMask::QUERY_VALUE)
            .err()
            .unwrap();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("HKEY_LOCAL_MACHINE\\DoesNotExist"));
        assert_eq!(registry.open_handles(), 0);
    }

    #[test]
    fn test_open_with_trailing_separator() {
        let registry = MemoryRegistry::new();
        registry.insert_key(Hive::CurrentUser, "Software\\MyTest");
        let handle =
            open_node(&registry, Hive::CurrentUser, "Software\\MyTest\\", AccessMask::QUERY_VALUE)
                .unwrap();
        assert!(!handle.is_null());
        assert_eq!(registry.open_handles(), 1);
        drop(handle);
        assert_eq!(registry.open_handles(), 0);
    }
}
