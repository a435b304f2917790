//! Root registry namespaces.

use std::fmt;
use std::str::FromStr;

/// A predefined root key of the registry.
///
/// Each hive carries a fixed native identifier. Hives that a platform version
/// does not offer are still constructible; operations on them fail with the
/// classified native status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Hive {
    /// `HKEY_CLASSES_ROOT`.
    ClassesRoot,
    /// `HKEY_CURRENT_USER`.
    CurrentUser,
    /// `HKEY_LOCAL_MACHINE`.
    LocalMachine,
    /// `HKEY_USERS`.
    Users,
    /// `HKEY_PERFORMANCE_DATA`.
    PerformanceData,
    /// `HKEY_CURRENT_CONFIG`.
    CurrentConfig,
    /// `HKEY_DYN_DATA`, only present on legacy systems.
    DynData,
    /// `HKEY_PERFORMANCE_TEXT`.
    PerformanceText,
    /// `HKEY_PERFORMANCE_NLSTEXT`.
    PerformanceNlsText,
}

impl Hive {
    /// Every hive, in native identifier order.
    pub const ALL: [Hive; 9] = [
        Hive::ClassesRoot,
        Hive::CurrentUser,
        Hive::LocalMachine,
        Hive::Users,
        Hive::PerformanceData,
        Hive::CurrentConfig,
        Hive::DynData,
        Hive::PerformanceText,
        Hive::PerformanceNlsText,
    ];

    /// Native identifier of the predefined key.
    pub fn id(&self) -> u32 {
        match self {
            Hive::ClassesRoot => 0x8000_0000,
            Hive::CurrentUser => 0x8000_0001,
            Hive::LocalMachine => 0x8000_0002,
            Hive::Users => 0x8000_0003,
            Hive::PerformanceData => 0x8000_0004,
            Hive::CurrentConfig => 0x8000_0005,
            Hive::DynData => 0x8000_0006,
            Hive::PerformanceText => 0x8000_0050,
            Hive::PerformanceNlsText => 0x8000_0060,
        }
    }

    /// Looks a hive up by its native identifier.
    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|hive| hive.id() == id)
    }

    /// Canonical `HKEY_*` name.
    pub fn name(&self) -> &'static str {
        match self {
            Hive::ClassesRoot => "HKEY_CLASSES_ROOT",
            Hive::CurrentUser => "HKEY_CURRENT_USER",
            Hive::LocalMachine => "HKEY_LOCAL_MACHINE",
            Hive::Users => "HKEY_USERS",
            Hive::PerformanceData => "HKEY_PERFORMANCE_DATA",
            Hive::CurrentConfig => "HKEY_CURRENT_CONFIG",
            Hive::DynData => "HKEY_DYN_DATA",
            Hive::PerformanceText => "HKEY_PERFORMANCE_TEXT",
            Hive::PerformanceNlsText => "HKEY_PERFORMANCE_NLSTEXT",
        }
    }

    fn abbreviation(&self) -> Option<&'static str> {
        match self {
            Hive::ClassesRoot => Some("HKCR"),
            Hive::CurrentUser => Some("HKCU"),
            Hive::LocalMachine => Some("HKLM"),
            Hive::Users => Some("HKU"),
            Hive::CurrentConfig => Some("HKCC"),
            _ => None,
        }
    }
}

impl fmt::Display for Hive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a string names no hive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown hive: {0}")]
pub struct ParseHiveError(pub String);

impl FromStr for Hive {
    type Err = ParseHiveError;

    /// Accepts `HKEY_*` names and the common abbreviations, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|hive| {
                hive.name().eq_ignore_ascii_case(s)
                    || hive.abbreviation().is_some_and(|abbr| abbr.eq_ignore_ascii_case(s))
            })
            .ok_or_else(|| ParseHiveError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids() {
        assert_eq!(Hive::LocalMachine.id(), 0x80000002);
        assert_eq!(Hive::PerformanceNlsText.id(), 0x80000060);
        for hive in Hive::ALL {
            assert_eq!(Hive::from_id(hive.id()), Some(hive));
        }
        assert_eq!(Hive::from_id(0x80000007), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("HKEY_LOCAL_MACHINE".parse::<Hive>().unwrap(), Hive::LocalMachine);
        assert_eq!("hkcu".parse::<Hive>().unwrap(), Hive::CurrentUser);
        assert_eq!("HKEY_dyn_data".parse::<Hive>().unwrap(), Hive::DynData);
        assert!("HKEY_NOWHERE".parse::<Hive>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Hive::Users.to_string(), "HKEY_USERS");
    }
}
