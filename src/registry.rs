//! Registry facade: the public operations over a [`RegistryApi`] backend.

use crate::advapi32::Advapi32;
use crate::api::{AccessMask, KeyInfo, RegistryApi};
use crate::codec;
use crate::enumerate::{enumerate, Listing};
use crate::error::{RegistryError, Result};
use crate::handle::KeyHandle;
use crate::hive::Hive;
use crate::resolver::{display_path, normalize, open_node, split};
use crate::status::{raise_if_error, CheckStatus, ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND};
use std::sync::OnceLock;
use tracing::{debug, instrument};

/// Which registry view 32/64-bit redirected keys resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegistryView {
    /// The view native to the calling process.
    #[default]
    Default,
    /// The 32-bit view (`KEY_WOW64_32KEY`).
    Registry32,
    /// The 64-bit view (`KEY_WOW64_64KEY`).
    Registry64,
}

impl RegistryView {
    /// Bits OR-ed into every requested access mask.
    pub fn mask(&self) -> AccessMask {
        match self {
            RegistryView::Default => AccessMask(0),
            RegistryView::Registry32 => AccessMask::WOW64_32KEY,
            RegistryView::Registry64 => AccessMask::WOW64_64KEY,
        }
    }
}

/// String-valued registry access.
///
/// All operations are synchronous. Every handle an operation opens is closed
/// before it returns, on success and on failure. No operation is atomic with
/// respect to another: `create_key` followed by `put` is two round trips.
///
/// # Examples
///
/// ```no_run
/// use reg_access::{Hive, Registry};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = Registry::system()?;
/// let dir = registry.get(
///     Hive::LocalMachine,
///     r"Software\Microsoft\Windows\CurrentVersion",
///     "ProgramFilesDir",
/// )?;
/// println!("{:?}", dir);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Registry<A: RegistryApi = Advapi32> {
    api: A,
    view: RegistryView,
}

impl Registry<Advapi32> {
    /// The process-wide registry over the native entry points.
    ///
    /// The entry points are resolved on first use, at most once. When that
    /// fails, this and every later call return [`RegistryError::Unavailable`].
    pub fn system() -> Result<&'static Registry<Advapi32>> {
        static SYSTEM: OnceLock<std::result::Result<Registry<Advapi32>, String>> = OnceLock::new();

        let registry = SYSTEM.get_or_init(|| {
            Advapi32::load().map(Registry::new).map_err(|err| match err {
                RegistryError::Unavailable(reason) => reason,
                other => other.to_string(),
            })
        });
        registry
            .as_ref()
            .map_err(|reason| RegistryError::Unavailable(reason.clone()))
    }
}

impl<A: RegistryApi> Registry<A> {
    /// Creates a registry over `api` using the default view.
    pub fn new(api: A) -> Self {
        Self::with_view(api, RegistryView::Default)
    }

    /// Creates a registry over `api` using `view`.
    pub fn with_view(api: A, view: RegistryView) -> Self {
        Self { api, view }
    }

    /// The backend.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// The configured view.
    pub fn view(&self) -> RegistryView {
        self.view
    }

    fn access(&self, rights: AccessMask) -> AccessMask {
        rights | self.view.mask()
    }

    /// Names of the subkeys of `path`, in native order.
    ///
    /// # Errors
    ///
    /// `NotFound` when `path` does not exist, `Unsupported` or
    /// `InvalidTarget` when the hive is not available on this system.
    #[instrument(skip(self))]
    pub fn keys(&self, hive: Hive, path: &str) -> Result<Vec<String>> {
        enumerate(&self.api, hive, path, Listing::Keys, self.view.mask())
    }

    /// Names of the values of `path`, in native order.
    #[instrument(skip(self))]
    pub fn values(&self, hive: Hive, path: &str) -> Result<Vec<String>> {
        enumerate(&self.api, hive, path, Listing::Values, self.view.mask())
    }

    /// Reads the string value `name` of `path`.
    ///
    /// Returns `None` when the key exists but has no such value, or when the
    /// value is not string-typed.
    ///
    /// # Errors
    ///
    /// `NotFound` when `path` itself does not exist.
    #[instrument(skip(self))]
    pub fn get(&self, hive: Hive, path: &str, name: &str) -> Result<Option<String>> {
        let path = normalize(path);
        let handle = open_node(&self.api, hive, path, self.access(AccessMask::QUERY_VALUE))?;

        let data = match self.api.query_value(handle.raw(), &codec::to_native(name)) {
            Err(ERROR_FILE_NOT_FOUND) => {
                debug!("Value absent");
                return Ok(None);
            }
            other => other.check(|| {
                format!("Could not read value {} of {}", name, display_path(hive, path))
            })?,
        };
        Ok(data.map(|data| codec::from_native(&data)))
    }

    /// Creates the key `path`. Its parent must exist.
    ///
    /// Creating a key that already exists succeeds.
    #[instrument(skip(self))]
    pub fn create_key(&self, hive: Hive, path: &str) -> Result<()> {
        let (parent, leaf) = split(path);
        let access = self.access(AccessMask::CREATE_SUB_KEY);
        let parent_handle = open_node(&self.api, hive, parent, access)?;

        let created = self
            .api
            .create_key(
                parent_handle.raw(),
                &codec::to_native_path(leaf),
                self.access(AccessMask::QUERY_VALUE),
            )
            .check(|| format!("Cannot create key {}", display_path(hive, normalize(path))))?;
        KeyHandle::new(&self.api, created).close();
        Ok(())
    }

    /// Writes the string value `name` of `path`.
    #[instrument(skip(self, value))]
    pub fn put(&self, hive: Hive, path: &str, name: &str, value: &str) -> Result<()> {
        let path = normalize(path);
        let handle = open_node(&self.api, hive, path, self.access(AccessMask::SET_VALUE))?;

        self.api
            .set_value(handle.raw(), &codec::to_native(name), &codec::to_native_value(value))
            .check(|| {
                format!("Could not assign value {} to key {}", name, display_path(hive, path))
            })
    }

    /// Deletes the key `path`, which must have no subkeys.
    ///
    /// Deleting a key that does not exist, or whose parent does not exist,
    /// succeeds without doing anything.
    #[instrument(skip(self))]
    pub fn remove_key(&self, hive: Hive, path: &str) -> Result<()> {
        let (parent, leaf) = split(path);
        if leaf.is_empty() {
            return raise_if_error(
                ERROR_ACCESS_DENIED,
                &format!("Cannot delete the root of {}", hive),
            );
        }

        let Some(handle) = self.open_for_removal(hive, parent, AccessMask::DELETE)? else {
            return Ok(());
        };
        match self.api.delete_key(handle.raw(), &codec::to_native_path(leaf)) {
            Err(ERROR_FILE_NOT_FOUND) => {
                debug!("Key already absent");
                Ok(())
            }
            other => other.check(|| {
                format!(
                    "Could not delete key from registry {}",
                    display_path(hive, normalize(path))
                )
            }),
        }
    }

    /// Deletes the value `name` of `path`.
    ///
    /// Deleting a value that does not exist, or whose key does not exist,
    /// succeeds without doing anything.
    #[instrument(skip(self))]
    pub fn remove_value(&self, hive: Hive, path: &str, name: &str) -> Result<()> {
        let path = normalize(path);
        let Some(handle) = self.open_for_removal(hive, path, AccessMask::SET_VALUE)? else {
            return Ok(());
        };
        match self.api.delete_value(handle.raw(), &codec::to_native(name)) {
            Err(ERROR_FILE_NOT_FOUND) => {
                debug!("Value already absent");
                Ok(())
            }
            other => other.check(|| {
                format!(
                    "Could not delete value {} from registry {}",
                    name,
                    display_path(hive, path)
                )
            }),
        }
    }

    /// Opens the node a deletion works on. An absent node yields `None`.
    fn open_for_removal(
        &self,
        hive: Hive,
        path: &str,
        rights: AccessMask,
    ) -> Result<Option<KeyHandle<'_, A>>> {
        match open_node(&self.api, hive, path, self.access(rights)) {
            Ok(handle) if handle.is_null() => Ok(None),
            Ok(handle) => Ok(Some(handle)),
            Err(err) if err.is_not_found() => {
                debug!("Node absent, nothing to delete");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Counts, maximum name lengths and last write time of `path`.
    #[instrument(skip(self))]
    pub fn info(&self, hive: Hive, path: &str) -> Result<KeyInfo> {
        let path = normalize(path);
        let handle = open_node(&self.api, hive, path, self.access(AccessMask::QUERY_VALUE))?;
        self.api
            .query_info(handle.raw())
            .check(|| format!("Could not query registry node {}", display_path(hive, path)))
    }

    /// Returns true if `path` exists.
    #[instrument(skip(self))]
    pub fn key_exists(&self, hive: Hive, path: &str) -> Result<bool> {
        match open_node(&self.api, hive, path, self.access(AccessMask::QUERY_VALUE)) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRegistry;

    #[test]
    fn test_view_masks() {
        assert_eq!(RegistryView::Default.mask().bits(), 0);
        assert_eq!(RegistryView::Registry32.mask().bits(), 0x200);
        assert_eq!(RegistryView::Registry64.mask().bits(), 0x100);
    }

    #[test]
    fn test_remove_hive_root_is_denied() {
        let registry = Registry::new(MemoryRegistry::new());
        let err = registry.remove_key(Hive::CurrentUser, "").unwrap_err();
        assert!(matches!(err, RegistryError::PermissionDenied { .. }));
    }

    #[test]
    fn test_view_is_passed_to_backend() {
        // The memory backend ignores view bits, so every operation still works.
        let registry = Registry::with_view(MemoryRegistry::new(), RegistryView::Registry64);
        registry.api().insert_key(Hive::LocalMachine, "SOFTWARE");
        assert_eq!(registry.keys(Hive::LocalMachine, "").unwrap(), vec!["SOFTWARE"]);
        assert_eq!(registry.view(), RegistryView::Registry64);
    }
}
