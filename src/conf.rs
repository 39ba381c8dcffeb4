/*
 * satchel - configuration module.
 *
 * Copyright 2021 The satchel developers
 *
 * This file is part of satchel.
 *
 * satchel is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * satchel is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with satchel. If not, see <http://www.gnu.org/licenses/>.
 */

//! Account configuration for remote mailbox access.

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{Error, ErrorKind, Result};
use crate::store::{ConnectionFlag, MailService};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccountSettings {
    pub name: String,
    pub server_hostname: String,
    #[serde(default = "default_port")]
    pub server_port: u16,
    #[serde(default)]
    pub service: String,
    pub server_username: String,
    #[serde(default = "none")]
    pub server_password: Option<String>,
    #[serde(default = "none")]
    pub server_password_command: Option<String>,
    #[serde(default = "default_mailbox")]
    pub root_mailbox: String,
    #[serde(default = "false_val")]
    pub read_only: bool,
    /// Connection flag tokens, e.g. `["ssl", "novalidate-cert"]`.
    #[serde(default)]
    pub flags: Vec<String>,
    /// Connection timeout in seconds. `0` disables the timeout.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

impl AccountSettings {
    /// Get the server password, either directly from the `server_password`
    /// settings value, or by running the `server_password_command` and
    /// reading its standard output.
    pub fn server_password(&self) -> Result<String> {
        if let Some(cmd) = self.server_password_command.as_ref() {
            let output = std::process::Command::new("sh")
                .args(["-c", cmd])
                .stdin(std::process::Stdio::piped())
                .stdout(std::process::Stdio::piped())
                .stderr(std::process::Stdio::piped())
                .output()?;

            if output.status.success() {
                Ok(std::str::from_utf8(&output.stdout)?.trim_end().to_string())
            } else {
                Err(Error::new(format!(
                    "({}) server_password_command `{}` returned {}: {}",
                    self.name,
                    cmd,
                    output.status,
                    String::from_utf8_lossy(&output.stderr)
                ))
                .set_kind(ErrorKind::Configuration))
            }
        } else if let Some(pass) = self.server_password.as_ref() {
            Ok(pass.to_owned())
        } else {
            Err(Error::new(format!(
                "Configuration error ({}): connection requires either server_password or \
                 server_password_command",
                self.name
            ))
            .set_kind(ErrorKind::Configuration))
        }
    }

    pub fn service(&self) -> Result<MailService> {
        if self.service.is_empty() {
            return Ok(MailService::default());
        }
        MailService::from_str(&self.service)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::new("Account name cannot be empty")
                .set_kind(ErrorKind::Configuration));
        }
        if self.server_hostname.trim().is_empty() {
            return Err(Error::new(format!(
                "Configuration error ({}): `server_hostname` cannot be empty",
                self.name
            ))
            .set_kind(ErrorKind::Configuration));
        }
        self.service().map_err(|err| {
            err.set_summary(format!("Configuration error ({})", self.name))
                .set_kind(ErrorKind::Configuration)
        })?;
        for token in &self.flags {
            ConnectionFlag::from_str(token).map_err(|err| {
                err.set_summary(format!(
                    "Configuration error ({}): invalid connection flag `{}`",
                    self.name, token
                ))
                .set_kind(ErrorKind::Configuration)
            })?;
        }
        if self.server_password.is_some() && self.server_password_command.is_some() {
            return Err(Error::new(format!(
                "Configuration error ({}): both server_password and server_password_command \
                 are set",
                self.name
            ))
            .set_kind(ErrorKind::Configuration));
        }
        Ok(())
    }
}

pub fn true_val() -> bool {
    true
}

pub fn false_val() -> bool {
    false
}

pub fn none<T>() -> Option<T> {
    None
}

fn default_port() -> u16 {
    143
}

fn default_mailbox() -> String {
    "INBOX".to_string()
}

fn default_timeout() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML_MINIMAL: &str = r#"
name = "personal"
server_hostname = "mail.example.com"
server_username = "jan"
server_password = "hunter2"
"#;

    #[test]
    fn test_conf_defaults() {
        let s: AccountSettings = toml::from_str(TOML_MINIMAL).unwrap();
        assert_eq!(s.server_port, 143);
        assert_eq!(s.root_mailbox, "INBOX");
        assert_eq!(s.timeout, 60);
        assert!(!s.read_only);
        assert!(s.flags.is_empty());
        s.validate().unwrap();
        assert_eq!(s.server_password().unwrap(), "hunter2");
    }

    #[test]
    fn test_conf_rejects_bad_flag() {
        let s: AccountSettings = toml::from_str(
            r#"
name = "personal"
server_hostname = "mail.example.com"
server_username = "jan"
server_password = "hunter2"
flags = [""]
"#,
        )
        .unwrap();
        let err = s.validate().unwrap_err();
        assert!(err.kind.is_configuration());
    }

    #[test]
    fn test_conf_rejects_unknown_service() {
        let s: AccountSettings = toml::from_str(
            r#"
name = "personal"
server_hostname = "mail.example.com"
server_username = "jan"
server_password = "hunter2"
service = "gopher"
"#,
        )
        .unwrap();
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_conf_password_sources_are_exclusive() {
        let s: AccountSettings = toml::from_str(
            r#"
name = "personal"
server_hostname = "mail.example.com"
server_username = "jan"
server_password = "hunter2"
server_password_command = "echo hunter2"
"#,
        )
        .unwrap();
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_conf_password_command() {
        let s: AccountSettings = toml::from_str(
            r#"
name = "personal"
server_hostname = "mail.example.com"
server_username = "jan"
server_password_command = "printf '%s' sekrit"
"#,
        )
        .unwrap();
        assert_eq!(s.server_password().unwrap(), "sekrit");
    }
}
