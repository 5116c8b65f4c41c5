//! Local identity
//!
//! Identifies the machine and the interactive user so session pods can be
//! scoped to "my sessions".

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Failed to persist machine id: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config directory not found")]
    ConfigDirNotFound,
}

/// Who is creating session pods, and from where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    /// Opaque identifier, stable for this machine
    pub machine_id: String,
    pub username: String,
    pub display_name: String,
}

impl LocalIdentity {
    pub fn new(
        machine_id: impl Into<String>,
        username: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            machine_id: machine_id.into(),
            username: username.into(),
            display_name: display_name.into(),
        }
    }

    /// Resolve the identity of the current machine and user
    pub fn resolve() -> Result<Self, IdentityError> {
        let machine_id = match system_machine_id() {
            Some(id) => id,
            None => {
                let dir = dirs::config_dir()
                    .ok_or(IdentityError::ConfigDirNotFound)?
                    .join("podsession");
                fallback_machine_id(&dir)?
            }
        };

        let username = current_username();
        let display_name = passwd_display_name(&username).unwrap_or_else(|| username.clone());

        Ok(Self {
            machine_id,
            username,
            display_name,
        })
    }
}

fn system_machine_id() -> Option<String> {
    MACHINE_ID_PATHS.iter().find_map(|path| {
        fs::read_to_string(path)
            .ok()
            .map(|content| content.trim().to_string())
            .filter(|id| !id.is_empty())
    })
}

/// Read or create a generated machine id under `dir`
pub fn fallback_machine_id(dir: &Path) -> Result<String, IdentityError> {
    let path: PathBuf = dir.join("machine-id");
    if let Ok(existing) = fs::read_to_string(&path) {
        let existing = existing.trim();
        if !existing.is_empty() {
            return Ok(existing.to_string());
        }
    }

    fs::create_dir_all(dir)?;
    let id = uuid::Uuid::new_v4().simple().to_string();
    fs::write(&path, &id)?;
    tracing::info!("Generated machine id at {:?}", path);
    Ok(id)
}

fn current_username() -> String {
    ["USER", "LOGNAME", "USERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn passwd_display_name(username: &str) -> Option<String> {
    let passwd = fs::read_to_string("/etc/passwd").ok()?;
    gecos_name(&passwd, username)
}

/// Full name from the GECOS field of a passwd entry
pub fn gecos_name(passwd: &str, username: &str) -> Option<String> {
    passwd
        .lines()
        .filter(|line| !line.starts_with('#'))
        .map(|line| line.split(':').collect::<Vec<_>>())
        .find(|fields| fields.first() == Some(&username))
        .and_then(|fields| fields.get(4).map(|gecos| gecos.to_string()))
        .and_then(|gecos| gecos.split(',').next().map(|name| name.trim().to_string()))
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSWD: &str = "\
root:x:0:0:root:/root:/bin/bash
# comment line
alice:x:1000:1000:Alice Liddell,Room 1,555-0100,,:/home/alice:/bin/zsh
bob:x:1001:1001::/home/bob:/bin/sh
";

    #[test]
    fn test_gecos_name() {
        assert_eq!(gecos_name(PASSWD, "alice"), Some("Alice Liddell".to_string()));
        assert_eq!(gecos_name(PASSWD, "root"), Some("root".to_string()));
        assert_eq!(gecos_name(PASSWD, "bob"), None);
        assert_eq!(gecos_name(PASSWD, "carol"), None);
    }

    #[test]
    fn test_fallback_machine_id_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let first = fallback_machine_id(dir.path()).unwrap();
        let second = fallback_machine_id(dir.path()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 32);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
