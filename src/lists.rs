//! Named user list persistence.
//!
//! Each list is a JSON array file: account names for the verified, blacklist,
//! auto-vote and trail lists; `{account, operator_id}` objects for the staff
//! list, where the operator id ties a Hive account to the chat operator who
//! controls it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The named lists the bot maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListName {
    /// Manually verified community members
    Verified,
    /// Authors excluded from curation
    Blacklist,
    /// Authors voted automatically when they score high enough
    Auto,
    /// Members of the community curation trail
    Trail,
}

impl ListName {
    fn file_name(&self) -> &'static str {
        match self {
            ListName::Verified => "users.json",
            ListName::Blacklist => "blacklist.json",
            ListName::Auto => "auto.json",
            ListName::Trail => "trail.json",
        }
    }
}

impl std::str::FromStr for ListName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verified" => Ok(ListName::Verified),
            "blacklist" => Ok(ListName::Blacklist),
            "auto" => Ok(ListName::Auto),
            "trail" => Ok(ListName::Trail),
            other => anyhow::bail!("Unknown list name: {}", other),
        }
    }
}

/// A staff list entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StaffEntry {
    /// Hive account name
    pub account: String,
    /// Chat-platform id of the controlling operator
    pub operator_id: String,
}

/// File-backed store for the named user lists.
#[derive(Debug, Clone)]
pub struct UserListStore {
    dir: PathBuf,
}

impl UserListStore {
    /// Create a store rooted at the given directory.
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn list_path(&self, list: ListName) -> PathBuf {
        self.dir.join(list.file_name())
    }

    fn staff_path(&self) -> PathBuf {
        self.dir.join("staff.json")
    }

    /// Read a list. Missing or corrupt files yield an empty list (logged).
    pub fn members(&self, list: ListName) -> Vec<String> {
        read_json_or_default(&self.list_path(list))
    }

    /// Case-sensitive exact membership check.
    pub fn contains(&self, list: ListName, account: &str) -> bool {
        self.members(list).iter().any(|a| a == account)
    }

    /// Add an account to a list. No-op if already present.
    ///
    /// Returns true if the account was added. Write failures propagate so
    /// interactive mutations fail loudly rather than silently losing state.
    pub fn add(&self, list: ListName, account: &str) -> anyhow::Result<bool> {
        let mut members = self.members(list);
        if members.iter().any(|a| a == account) {
            return Ok(false);
        }
        members.push(account.to_string());
        save_json(&self.list_path(list), &members)?;
        Ok(true)
    }

    /// Remove an account from a list.
    ///
    /// Returns true if the account was present.
    pub fn remove(&self, list: ListName, account: &str) -> anyhow::Result<bool> {
        let mut members = self.members(list);
        let before = members.len();
        members.retain(|a| a != account);
        if members.len() == before {
            return Ok(false);
        }
        save_json(&self.list_path(list), &members)?;
        Ok(true)
    }

    /// Read the staff list.
    pub fn staff(&self) -> Vec<StaffEntry> {
        read_json_or_default(&self.staff_path())
    }

    /// Check whether an account is on the staff list.
    pub fn is_staff(&self, account: &str) -> bool {
        self.staff().iter().any(|e| e.account == account)
    }

    /// Check whether a chat operator controls any staff account.
    pub fn is_staff_operator(&self, operator_id: &str) -> bool {
        self.staff().iter().any(|e| e.operator_id == operator_id)
    }

    /// Add a staff entry. No-op if the account is already listed.
    pub fn add_staff(&self, account: &str, operator_id: &str) -> anyhow::Result<bool> {
        let mut staff = self.staff();
        if staff.iter().any(|e| e.account == account) {
            return Ok(false);
        }
        staff.push(StaffEntry {
            account: account.to_string(),
            operator_id: operator_id.to_string(),
        });
        save_json(&self.staff_path(), &staff)?;
        Ok(true)
    }

    /// Remove a staff entry by account.
    pub fn remove_staff(&self, account: &str) -> anyhow::Result<bool> {
        let mut staff = self.staff();
        let before = staff.len();
        staff.retain(|e| e.account != account);
        if staff.len() == before {
            return Ok(false);
        }
        save_json(&self.staff_path(), &staff)?;
        Ok(true)
    }
}

fn read_json_or_default<T: serde::de::DeserializeOwned + Default>(path: &Path) -> T {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Could not parse {:?} ({}), treating as empty", path, e);
                T::default()
            }
        },
        Err(e) => {
            tracing::debug!("Could not read {:?} ({}), treating as empty", path, e);
            T::default()
        }
    }
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(value)?;

    // Write to temp file first, then atomic rename
    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, &content)?;
    std::fs::rename(&temp_path, path)?;

    Ok(())
}
