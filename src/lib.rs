//! # Windows Registry Access
//!
//! Synchronous, string-valued read/write access to the Windows registry
//! through the native `advapi32` entry points.
//!
//! ## Features
//!
//! - **Seven operations**: list subkeys, list value names, read, create key,
//!   write, delete key, delete value
//! - **Scoped handles**: every native handle is closed on every exit path
//! - **Typed errors**: native status codes classified into a closed set of kinds
//! - **Backend seam**: the same facade runs over the real registry or an
//!   in-process one
//!
//! ## Architecture
//!
//! ```text
//! Registry (facade)
//!   -> resolver   open hive + path with an access mask, split paths
//!   -> enumerate  query info, then fetch by index
//!   -> RegistryApi primitive (Advapi32 or MemoryRegistry)
//!   -> status     classify the native code
//!   -> handle     close the key
//! ```
//!
//! ## Examples
//!
//! ### System registry
//!
//! ```no_run
//! use reg_access::{Hive, Registry};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::system()?;
//!
//! for key in registry.keys(Hive::LocalMachine, "")? {
//!     println!("{}", key);
//! }
//!
//! registry.create_key(Hive::CurrentUser, r"Software\MyApp")?;
//! registry.put(Hive::CurrentUser, r"Software\MyApp", "Greeting", "hello")?;
//! assert_eq!(
//!     registry.get(Hive::CurrentUser, r"Software\MyApp", "Greeting")?,
//!     Some("hello".to_string())
//! );
//! registry.remove_key(Hive::CurrentUser, r"Software\MyApp")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### In-process registry
//!
//! ```
//! use reg_access::{Hive, MemoryRegistry, Registry};
//!
//! let registry = Registry::new(MemoryRegistry::new());
//! registry.api().insert_key(Hive::CurrentUser, "Software");
//! registry.create_key(Hive::CurrentUser, r"Software\MyTest").unwrap();
//! assert_eq!(registry.keys(Hive::CurrentUser, "Software").unwrap(), vec!["MyTest"]);
//! ```
//!
//! ## Limitations
//!
//! - Only string values (`REG_SZ`, `REG_EXPAND_SZ` on read) are supported
//! - No change notification and no multi-key transactions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod advapi32;
pub mod api;
pub mod codec;
pub mod enumerate;
pub mod error;
pub mod handle;
pub mod hive;
pub mod memory;
pub mod registry;
pub mod resolver;
pub mod status;

// Re-export main types for convenience
pub use advapi32::Advapi32;
pub use api::{AccessMask, KeyInfo, RawKey, RegistryApi};
pub use error::{RegistryError, Result};
pub use handle::KeyHandle;
pub use hive::{Hive, ParseHiveError};
pub use memory::{Call, MemoryRegistry};
pub use registry::{Registry, RegistryView};
pub use status::Status;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
