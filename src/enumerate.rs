//! Two-phase listing of subkeys and value names.
//!
//! Both listings open the node, size the walk with one "query info" call and
//! then fetch every element by index. They differ only in the members of
//! [`Listing`].

use crate::api::{AccessMask, KeyInfo, RawKey, RegistryApi};
use crate::codec;
use crate::error::{RegistryError, Result};
use crate::hive::Hive;
use crate::resolver::{display_path, normalize, open_node};
use crate::status::NativeResult;
use tracing::debug;

/// What to enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    /// Child keys.
    Keys,
    /// Value names.
    Values,
}

impl Listing {
    /// Rights needed on the enumerated node.
    pub fn access(&self) -> AccessMask {
        match self {
            Listing::Keys => AccessMask::ENUMERATE_SUB_KEYS | AccessMask::QUERY_VALUE,
            Listing::Values => AccessMask::QUERY_VALUE,
        }
    }

    fn count(&self, info: &KeyInfo) -> u32 {
        match self {
            Listing::Keys => info.subkey_count,
            Listing::Values => info.value_count,
        }
    }

    fn max_name_len(&self, info: &KeyInfo) -> u32 {
        match self {
            Listing::Keys => info.max_subkey_name_len,
            Listing::Values => info.max_value_name_len,
        }
    }

    fn fetch<A: RegistryApi + ?Sized>(
        &self,
        api: &A,
        key: RawKey,
        index: u32,
        buffer_len: u32,
    ) -> NativeResult<Vec<u8>> {
        match self {
            Listing::Keys => api.enum_key(key, index, buffer_len),
            Listing::Values => api.enum_value(key, index, buffer_len),
        }
    }

    fn decode(&self, native: &[u8]) -> String {
        match self {
            Listing::Keys => codec::from_native_key(native),
            Listing::Values => codec::from_native_name(native),
        }
    }

    fn element(&self) -> &'static str {
        match self {
            Listing::Keys => "key",
            Listing::Values => "value",
        }
    }
}

/// Lists the elements of `path` in native order.
///
/// The result is all-or-nothing: a failure at any index, including the
/// "no more items" status of a node that shrank after sizing, discards what
/// was collected.
pub fn enumerate<A: RegistryApi + ?Sized>(
    api: &A,
    hive: Hive,
    path: &str,
    listing: Listing,
    view: AccessMask,
) -> Result<Vec<String>> {
    let path = normalize(path);
    let handle = open_node(api, hive, path, listing.access() | view)?;

    let info = api.query_info(handle.raw()).map_err(|code| {
        RegistryError::native_failure(
            format!(
                "Could not query registry node {} ({}, {:#x})",
                display_path(hive, path),
                code,
                code
            ),
            code,
        )
    })?;

    let count = listing.count(&info);
    let buffer_len = listing.max_name_len(&info) + 1;
    debug!(hive = %hive, path, count, buffer_len, element = listing.element(), "Enumerating");

    let mut names = Vec::with_capacity(count as usize);
    for index in 0..count {
        match listing.fetch(api, handle.raw(), index, buffer_len) {
            Ok(native) => names.push(listing.decode(&native)),
            Err(code) => {
                return Err(RegistryError::native_failure(
                    format!(
                        "Could not enumerate {} #{} of registry node {} ({}, {:#x})",
                        listing.element(),
                        index,
                        display_path(hive, path),
                        code,
                        code
                    ),
                    code,
                ));
            }
        }
    }

    Ok(names)
}
