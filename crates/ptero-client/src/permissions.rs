//! The permission flag catalog and permission set algebra

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Sub};

use crate::error::{Error, Result};

/// Every permission key recognized by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    WebsocketConnect,

    ControlConsole,
    ControlStart,
    ControlStop,
    ControlRestart,

    UserCreate,
    UserRead,
    UserUpdate,
    UserDelete,

    FileCreate,
    FileRead,
    FileReadContent,
    FileUpdate,
    FileDelete,
    FileArchive,
    FileSftp,

    BackupCreate,
    BackupRead,
    BackupUpdate,
    BackupDelete,

    AllocationRead,
    AllocationCreate,
    AllocationUpdate,
    AllocationDelete,

    StartupRead,
    StartupUpdate,

    DatabaseCreate,
    DatabaseRead,
    DatabaseUpdate,
    DatabaseDelete,
    DatabaseViewPassword,

    ScheduleCreate,
    ScheduleRead,
    ScheduleUpdate,
    ScheduleDelete,

    SettingsRename,
    SettingsReinstall,

    AdminWebsocketErrors,
    AdminWebsocketInstall,
    AdminWebsocketTransfer,
}

impl Flag {
    /// The closed catalog, in wire order.
    pub const CATALOG: [Flag; 40] = [
        Flag::WebsocketConnect,
        Flag::ControlConsole,
        Flag::ControlStart,
        Flag::ControlStop,
        Flag::ControlRestart,
        Flag::UserCreate,
        Flag::UserRead,
        Flag::UserUpdate,
        Flag::UserDelete,
        Flag::FileCreate,
        Flag::FileRead,
        Flag::FileReadContent,
        Flag::FileUpdate,
        Flag::FileDelete,
        Flag::FileArchive,
        Flag::FileSftp,
        Flag::BackupCreate,
        Flag::BackupRead,
        Flag::BackupUpdate,
        Flag::BackupDelete,
        Flag::AllocationRead,
        Flag::AllocationCreate,
        Flag::AllocationUpdate,
        Flag::AllocationDelete,
        Flag::StartupRead,
        Flag::StartupUpdate,
        Flag::DatabaseCreate,
        Flag::DatabaseRead,
        Flag::DatabaseUpdate,
        Flag::DatabaseDelete,
        Flag::DatabaseViewPassword,
        Flag::ScheduleCreate,
        Flag::ScheduleRead,
        Flag::ScheduleUpdate,
        Flag::ScheduleDelete,
        Flag::SettingsRename,
        Flag::SettingsReinstall,
        Flag::AdminWebsocketErrors,
        Flag::AdminWebsocketInstall,
        Flag::AdminWebsocketTransfer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WebsocketConnect => "websocket.connect",
            Self::ControlConsole => "control.console",
            Self::ControlStart => "control.start",
            Self::ControlStop => "control.stop",
            Self::ControlRestart => "control.restart",
            Self::UserCreate => "user.create",
            Self::UserRead => "user.read",
            Self::UserUpdate => "user.update",
            Self::UserDelete => "user.delete",
            Self::FileCreate => "file.create",
            Self::FileRead => "file.read",
            Self::FileReadContent => "file.read-content",
            Self::FileUpdate => "file.update",
            Self::FileDelete => "file.delete",
            Self::FileArchive => "file.archive",
            Self::FileSftp => "file.sftp",
            Self::BackupCreate => "backup.create",
            Self::BackupRead => "backup.read",
            Self::BackupUpdate => "backup.update",
            Self::BackupDelete => "backup.delete",
            Self::AllocationRead => "allocation.read",
            Self::AllocationCreate => "allocation.create",
            Self::AllocationUpdate => "allocation.update",
            Self::AllocationDelete => "allocation.delete",
            Self::StartupRead => "startup.read",
            Self::StartupUpdate => "startup.update",
            Self::DatabaseCreate => "database.create",
            Self::DatabaseRead => "database.read",
            Self::DatabaseUpdate => "database.update",
            Self::DatabaseDelete => "database.delete",
            Self::DatabaseViewPassword => "database.view_password",
            Self::ScheduleCreate => "schedule.create",
            Self::ScheduleRead => "schedule.read",
            Self::ScheduleUpdate => "schedule.update",
            Self::ScheduleDelete => "schedule.delete",
            Self::SettingsRename => "settings.rename",
            Self::SettingsReinstall => "settings.reinstall",
            Self::AdminWebsocketErrors => "admin.websocket.errors",
            Self::AdminWebsocketInstall => "admin.websocket.install",
            Self::AdminWebsocketTransfer => "admin.websocket.transfer",
        }
    }

    /// Looks a flag up by its wire key.
    pub fn from_key(key: &str) -> Option<Flag> {
        Self::CATALOG.into_iter().find(|f| f.as_str() == key)
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered set of validated permission keys.
///
/// Construction validates every element against the [`Flag`] catalog and
/// fails on the first unknown key; there are no partial sets. Duplicates
/// are preserved as given, but the set operations are defined over
/// membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions {
    value: Vec<String>,
}

impl Permissions {
    pub const ALL_CONTROL: [Flag; 4] = [
        Flag::ControlConsole,
        Flag::ControlStart,
        Flag::ControlStop,
        Flag::ControlRestart,
    ];

    pub const ALL_USER: [Flag; 4] = [
        Flag::UserCreate,
        Flag::UserRead,
        Flag::UserUpdate,
        Flag::UserDelete,
    ];

    pub const ALL_FILE: [Flag; 7] = [
        Flag::FileCreate,
        Flag::FileRead,
        Flag::FileReadContent,
        Flag::FileUpdate,
        Flag::FileDelete,
        Flag::FileArchive,
        Flag::FileSftp,
    ];

    pub const ALL_BACKUP: [Flag; 4] = [
        Flag::BackupCreate,
        Flag::BackupRead,
        Flag::BackupUpdate,
        Flag::BackupDelete,
    ];

    pub const ALL_ALLOCATION: [Flag; 4] = [
        Flag::AllocationRead,
        Flag::AllocationCreate,
        Flag::AllocationUpdate,
        Flag::AllocationDelete,
    ];

    pub const ALL_STARTUP: [Flag; 2] = [Flag::StartupRead, Flag::StartupUpdate];

    pub const ALL_DATABASE: [Flag; 5] = [
        Flag::DatabaseCreate,
        Flag::DatabaseRead,
        Flag::DatabaseUpdate,
        Flag::DatabaseDelete,
        Flag::DatabaseViewPassword,
    ];

    pub const ALL_SCHEDULE: [Flag; 4] = [
        Flag::ScheduleCreate,
        Flag::ScheduleRead,
        Flag::ScheduleUpdate,
        Flag::ScheduleDelete,
    ];

    pub const ALL_SETTINGS: [Flag; 2] = [Flag::SettingsRename, Flag::SettingsReinstall];

    pub const ALL_ADMIN: [Flag; 3] = [
        Flag::AdminWebsocketErrors,
        Flag::AdminWebsocketInstall,
        Flag::AdminWebsocketTransfer,
    ];

    /// Builds a set from raw permission keys.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] on the first key not in the catalog.
    pub fn new<I>(keys: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Ok(Self {
            value: resolve(keys)?,
        })
    }

    /// Builds a set from catalog flags; cannot fail.
    pub fn from_flags(flags: impl IntoIterator<Item = Flag>) -> Self {
        Self {
            value: flags.into_iter().map(|f| f.as_str().to_string()).collect(),
        }
    }

    /// The ordered raw keys, as sent on the wire.
    pub fn value(&self) -> &[String] {
        &self.value
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn contains(&self, flag: Flag) -> bool {
        self.value.iter().any(|v| v == flag.as_str())
    }

    /// `true` if the set intersects the given permissions.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if any given key is not in the
    /// catalog.
    pub fn any<I>(&self, keys: I) -> Result<bool>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let resolved = resolve(keys)?;
        Ok(resolved.iter().any(|k| self.value.contains(k)))
    }

    /// `true` if the set is a superset of the given permissions.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if any given key is not in the
    /// catalog.
    pub fn all<I>(&self, keys: I) -> Result<bool>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let resolved = resolve(keys)?;
        Ok(resolved.iter().all(|k| self.value.contains(k)))
    }

    /// `true` if any contained permission belongs to the `admin`
    /// namespace.
    pub fn is_admin(&self) -> bool {
        self.value.iter().any(|v| v.starts_with("admin."))
    }

    /// A total mapping from every catalog key to membership, as required
    /// by the update-subuser-permissions wire format.
    pub fn serialize(&self) -> BTreeMap<&'static str, bool> {
        Flag::CATALOG
            .into_iter()
            .map(|flag| (flag.as_str(), self.contains(flag)))
            .collect()
    }
}

impl Add for &Permissions {
    type Output = Permissions;

    fn add(self, other: &Permissions) -> Permissions {
        let mut value = self.value.clone();
        value.extend(other.value.iter().cloned());
        Permissions { value }
    }
}

impl Sub for &Permissions {
    type Output = Permissions;

    fn sub(self, other: &Permissions) -> Permissions {
        let value = self
            .value
            .iter()
            .filter(|v| !other.value.contains(v))
            .cloned()
            .collect();
        Permissions { value }
    }
}

fn resolve<I>(keys: I) -> Result<Vec<String>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    keys.into_iter()
        .map(|key| {
            let key = key.as_ref();
            match Flag::from_key(key) {
                Some(flag) => Ok(flag.as_str().to_string()),
                None => Err(Error::Validation(format!(
                    "invalid permission or flag '{key}'"
                ))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_key_fails_construction() {
        let err = Permissions::new(["control.console", "not.a.perm"]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("not.a.perm"));
    }

    #[test]
    fn test_serialize_is_total_over_catalog() {
        let perms = Permissions::new(["control.console"]).unwrap();
        let map = perms.serialize();

        assert_eq!(map.len(), Flag::CATALOG.len());
        assert!(map["control.console"]);
        assert!(
            map.iter()
                .filter(|(key, _)| **key != "control.console")
                .all(|(_, present)| !present)
        );
    }

    #[test]
    fn test_any_and_all() {
        let perms = Permissions::from_flags([Flag::FileRead, Flag::FileUpdate]);

        assert!(perms.any(["file.read", "backup.create"]).unwrap());
        assert!(!perms.any(["backup.create"]).unwrap());
        assert!(perms.all(["file.read", "file.update"]).unwrap());
        assert!(!perms.all(["file.read", "file.delete"]).unwrap());
        assert!(perms.any(["bogus.key"]).is_err());
    }

    #[test]
    fn test_is_admin_checks_namespace() {
        assert!(Permissions::from_flags([Flag::AdminWebsocketTransfer]).is_admin());
        // a non-admin key containing "admin" elsewhere must not count
        assert!(!Permissions::from_flags(Permissions::ALL_CONTROL).is_admin());
    }

    #[test]
    fn test_union_and_difference_do_not_mutate() {
        let console = Permissions::from_flags([Flag::ControlConsole]);
        let power = Permissions::from_flags([Flag::ControlStart, Flag::ControlStop]);

        let both = &console + &power;
        assert_eq!(both.len(), 3);
        assert!(both.contains(Flag::ControlStart));

        let without = &both - &power;
        assert_eq!(without.value(), ["control.console"]);

        assert_eq!(console.len(), 1);
        assert_eq!(power.len(), 2);
    }

    #[test]
    fn test_duplicates_are_preserved() {
        let perms = Permissions::new(["file.read", "file.read"]).unwrap();
        assert_eq!(perms.len(), 2);
    }

    #[test]
    fn test_catalog_round_trip() {
        for flag in Flag::CATALOG {
            assert_eq!(Flag::from_key(flag.as_str()), Some(flag));
        }
        assert!(Flag::from_key("admin.websocket").is_none());
    }
}
