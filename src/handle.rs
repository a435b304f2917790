//! Scoped ownership of native key handles.

use crate::api::{RawKey, RegistryApi};
use tracing::{debug, warn};

/// An open key handle that is closed when the guard goes out of scope.
///
/// Closing the sentinel handle, or closing twice, does nothing.
pub struct KeyHandle<'a, A: RegistryApi + ?Sized> {
    api: &'a A,
    raw: RawKey,
}

impl<'a, A: RegistryApi + ?Sized> KeyHandle<'a, A> {
    /// Takes ownership of `raw`.
    pub fn new(api: &'a A, raw: RawKey) -> Self {
        Self { api, raw }
    }

    /// The underlying handle. Valid while the guard is alive and not closed.
    pub fn raw(&self) -> RawKey {
        self.raw
    }

    /// Returns true when no live handle is held.
    pub fn is_null(&self) -> bool {
        self.raw.is_null()
    }

    /// Closes the handle now.
    ///
    /// A non-zero close status is logged and otherwise ignored: the
    /// operation that owned the handle has already produced its result.
    pub fn close(&mut self) {
        if self.raw.is_null() {
            return;
        }
        let raw = std::mem::replace(&mut self.raw, RawKey::NULL);
        match self.api.close_key(raw) {
            Ok(()) => debug!(handle = raw.0, "Closed key handle"),
            Err(code) => warn!(handle = raw.0, code, "Closing key handle failed"),
        }
    }
}

impl<A: RegistryApi + ?Sized> Drop for KeyHandle<'_, A> {
    fn drop(&mut self) {
        self.close();
    }
}
