/*
 * satchel - store module.
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

/*!
 * Remote mailbox access.
 *
 * A [`MailStore`] holds the parameters of one server connection: hostname,
 * port, service, connection flags, credentials and the selected mailbox.
 * The connection itself is opened lazily and all mailbox primitives are
 * forwarded to the backing `imap` crate; nothing in here speaks the wire
 * protocol.
 */

use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bitflags::bitflags;

use crate::conf::AccountSettings;
use crate::error::{Error, ErrorKind, Result};

mod connection;
mod message;

pub use connection::{MailSession, MailStore};
pub use message::Message;

/// Unique identifier the server assigned to a message, stable across
/// sessions (unlike sequence numbers).
pub type UID = u32;

/// The protocol family a connection string names. Only IMAP can actually
/// be opened; see `MailStore::session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailService {
    Imap,
    Pop3,
    Nntp,
}

impl Default for MailService {
    fn default() -> Self {
        Self::Imap
    }
}

impl MailService {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imap => "imap",
            Self::Pop3 => "pop3",
            Self::Nntp => "nntp",
        }
    }
}

impl fmt::Display for MailService {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MailService {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "imap" | "imap4" => Ok(Self::Imap),
            "pop3" | "pop" => Ok(Self::Pop3),
            "nntp" => Ok(Self::Nntp),
            other => Err(Error::new(format!("unknown mail service `{}`", other))
                .set_kind(ErrorKind::ValueError)),
        }
    }
}

/// One token of the connection string, modifying transport or session
/// behavior. Unknown tokens (and `key=value` pairs) pass through as
/// [`ConnectionFlag::Other`], like the underlying connection-string syntax
/// allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionFlag {
    /// Wrap the connection in TLS from the first byte.
    Ssl,
    /// Upgrade a plaintext connection with STARTTLS.
    Tls,
    /// Never negotiate TLS.
    NoTls,
    ValidateCert,
    NoValidateCert,
    /// Refuse to transmit the password over an unencrypted link.
    Secure,
    NoRsh,
    ReadOnly,
    Anonymous,
    /// Mirror the protocol exchange to the log.
    Debug,
    User(String),
    Other(String),
}

impl ConnectionFlag {
    /// Flags that only make sense when TLS support is available.
    pub fn requires_tls_support(&self) -> bool {
        matches!(
            self,
            Self::Ssl | Self::Tls | Self::NoTls | Self::ValidateCert | Self::NoValidateCert
        )
    }

    /// The flag this one displaces, and vice versa.
    fn exclusive_partner(&self) -> Option<Self> {
        match self {
            Self::ValidateCert => Some(Self::NoValidateCert),
            Self::NoValidateCert => Some(Self::ValidateCert),
            Self::Tls => Some(Self::NoTls),
            Self::NoTls => Some(Self::Tls),
            _ => None,
        }
    }

    /// The identity under which a flag is stored: repeated `set`s of the
    /// same key replace rather than accumulate.
    fn key(&self) -> &str {
        match self {
            Self::Ssl => "ssl",
            Self::Tls => "tls",
            Self::NoTls => "notls",
            Self::ValidateCert => "validate-cert",
            Self::NoValidateCert => "novalidate-cert",
            Self::Secure => "secure",
            Self::NoRsh => "norsh",
            Self::ReadOnly => "readonly",
            Self::Anonymous => "anonymous",
            Self::Debug => "debug",
            Self::User(_) => "user",
            Self::Other(token) => token.split('=').next().unwrap_or(token.as_str()),
        }
    }
}

impl fmt::Display for ConnectionFlag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::User(name) => write!(f, "user={}", name),
            Self::Other(token) => write!(f, "{}", token),
            other => write!(f, "{}", other.key()),
        }
    }
}

impl FromStr for ConnectionFlag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim();
        if token.is_empty() {
            return Err(
                Error::new("connection flag cannot be empty").set_kind(ErrorKind::ValueError)
            );
        }
        if token.contains(&['/', '{', '}'][..]) {
            return Err(Error::new(format!(
                "connection flag `{}` contains a reserved character",
                token
            ))
            .set_kind(ErrorKind::ValueError));
        }
        let lowered = token.to_ascii_lowercase();
        Ok(match lowered.as_str() {
            "ssl" => Self::Ssl,
            "tls" => Self::Tls,
            "notls" => Self::NoTls,
            "validate-cert" => Self::ValidateCert,
            "novalidate-cert" => Self::NoValidateCert,
            "secure" => Self::Secure,
            "norsh" => Self::NoRsh,
            "readonly" => Self::ReadOnly,
            "anonymous" => Self::Anonymous,
            "debug" => Self::Debug,
            // "user=" is all-ASCII, so the prefix check licenses the slice
            _ if lowered.starts_with("user=") && token.len() > 5 => {
                Self::User(token[5..].to_string())
            }
            _ => Self::Other(token.to_string()),
        })
    }
}

/// An insertion-ordered set of connection flags with the exclusivity rules
/// of the connection-string syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSet {
    flags: Vec<ConnectionFlag>,
    /// When TLS support is unavailable on the host, flags that depend on
    /// it are silently ignored instead of producing an unusable string.
    ssl_enabled: bool,
}

impl Default for FlagSet {
    fn default() -> Self {
        Self {
            flags: Vec::new(),
            ssl_enabled: true,
        }
    }
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ssl_enabled(&mut self, new_val: bool) -> &mut Self {
        self.ssl_enabled = new_val;
        self
    }

    /// Insert a flag, displacing its exclusive partner and any previous
    /// flag of the same key. TLS-dependent flags are dropped while
    /// `ssl_enabled` is off.
    pub fn set(&mut self, flag: ConnectionFlag) {
        if !self.ssl_enabled && flag.requires_tls_support() {
            log::debug!("ignoring flag `{}`: TLS support is disabled", flag);
            return;
        }
        if let Some(partner) = flag.exclusive_partner() {
            self.flags.retain(|f| *f != partner);
        }
        let key = flag.key().to_string();
        self.flags.retain(|f| f.key() != key);
        self.flags.push(flag);
    }

    /// Remove a flag by its key.
    pub fn clear(&mut self, flag: &ConnectionFlag) {
        let key = flag.key();
        self.flags.retain(|f| f.key() != key);
    }

    pub fn contains(&self, flag: &ConnectionFlag) -> bool {
        self.flags.contains(flag)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConnectionFlag> {
        self.flags.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }
}

bitflags! {
    /// The options bitmask passed when opening a connection.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct OpenOptions: u8 {
        /// Select the mailbox with `EXAMINE` instead of `SELECT`.
        const READONLY  = 0b0000_0001;
        /// Log in anonymously. Not supported by the backing library.
        const ANONYMOUS = 0b0000_0010;
        /// Authenticate but do not select a mailbox.
        const HALFOPEN  = 0b0000_0100;
        /// Expunge deleted messages when the connection is closed.
        const EXPUNGE   = 0b0000_1000;
    }
}

/// Connection parameters of a mail store.
#[derive(Clone)]
pub struct MailServerConf {
    pub server_hostname: String,
    pub server_port: u16,
    pub service: MailService,
    pub flags: FlagSet,
    pub server_username: String,
    pub server_password: String,
    pub options: OpenOptions,
    pub timeout: Option<Duration>,
}

impl fmt::Debug for MailServerConf {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MailServerConf")
            .field("server_hostname", &self.server_hostname)
            .field("server_port", &self.server_port)
            .field("service", &self.service)
            .field("flags", &self.flags)
            .field("server_username", &self.server_username)
            .field("server_password", &"*redacted*")
            .field("options", &self.options)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MailServerConf {
    /// Well-known ports seed their customary flags: `143` starts out with
    /// `novalidate-cert`, `993` with `ssl`. Anything else seeds nothing.
    pub fn new<H: Into<String>>(server_hostname: H, server_port: u16, service: MailService) -> Self {
        let mut flags = FlagSet::new();
        match server_port {
            143 => flags.set(ConnectionFlag::NoValidateCert),
            993 => flags.set(ConnectionFlag::Ssl),
            _ => {}
        }
        Self {
            server_hostname: server_hostname.into(),
            server_port,
            service,
            flags,
            server_username: String::new(),
            server_password: String::new(),
            options: OpenOptions::default(),
            timeout: Some(Duration::from_secs(60)),
        }
    }

    pub fn set_authentication<U: Into<String>, P: Into<String>>(
        &mut self,
        username: U,
        password: P,
    ) -> &mut Self {
        self.server_username = username.into();
        self.server_password = password.into();
        self
    }

    pub fn set_flag(&mut self, flag: ConnectionFlag) -> &mut Self {
        self.flags.set(flag);
        self
    }

    pub fn clear_flag(&mut self, flag: &ConnectionFlag) -> &mut Self {
        self.flags.clear(flag);
        self
    }

    pub fn set_options(&mut self, options: OpenOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Render the canonical connection string,
    /// `{hostname:port/service/flags}mailbox`. The service segment is
    /// omitted for IMAP, the default.
    pub fn server_string(&self, mailbox: &str) -> String {
        use std::fmt::Write;

        let mut ret = String::with_capacity(64);
        let _ = write!(ret, "{{{}:{}", self.server_hostname, self.server_port);
        if self.service != MailService::Imap {
            let _ = write!(ret, "/{}", self.service);
        }
        for flag in self.flags.iter() {
            let _ = write!(ret, "/{}", flag);
        }
        ret.push('}');
        ret.push_str(mailbox);
        ret
    }
}

impl TryFrom<&AccountSettings> for MailServerConf {
    type Error = Error;

    fn try_from(settings: &AccountSettings) -> Result<Self> {
        settings.validate()?;
        let mut conf = Self::new(
            settings.server_hostname.clone(),
            settings.server_port,
            settings.service()?,
        );
        for token in &settings.flags {
            conf.flags.set(ConnectionFlag::from_str(token)?);
        }
        if settings.read_only {
            conf.options |= OpenOptions::READONLY;
        }
        conf.server_username = settings.server_username.clone();
        conf.server_password = settings.server_password()?;
        conf.timeout = if settings.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(settings.timeout))
        };
        Ok(conf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_exclusivity_both_directions() {
        let mut flags = FlagSet::new();
        flags.set(ConnectionFlag::ValidateCert);
        flags.set(ConnectionFlag::NoValidateCert);
        assert!(!flags.contains(&ConnectionFlag::ValidateCert));
        assert!(flags.contains(&ConnectionFlag::NoValidateCert));

        flags.set(ConnectionFlag::ValidateCert);
        assert!(flags.contains(&ConnectionFlag::ValidateCert));
        assert!(!flags.contains(&ConnectionFlag::NoValidateCert));

        flags.set(ConnectionFlag::NoTls);
        flags.set(ConnectionFlag::Tls);
        assert!(flags.contains(&ConnectionFlag::Tls));
        assert!(!flags.contains(&ConnectionFlag::NoTls));
    }

    #[test]
    fn test_flag_set_is_idempotent_and_ordered() {
        let mut flags = FlagSet::new();
        flags.set(ConnectionFlag::Ssl);
        flags.set(ConnectionFlag::NoValidateCert);
        flags.set(ConnectionFlag::Ssl);
        // a re-set flag moves to the back, mirroring "last one wins"
        let rendered: Vec<String> = flags.iter().map(|f| f.to_string()).collect();
        assert_eq!(rendered, vec!["novalidate-cert", "ssl"]);
        assert_eq!(flags.len(), 2);
    }

    #[test]
    fn test_ssl_gate_drops_tls_flags() {
        let mut flags = FlagSet::new();
        flags.set_ssl_enabled(false);
        flags.set(ConnectionFlag::Ssl);
        flags.set(ConnectionFlag::NoValidateCert);
        flags.set(ConnectionFlag::Secure);
        assert!(!flags.contains(&ConnectionFlag::Ssl));
        assert!(!flags.contains(&ConnectionFlag::NoValidateCert));
        assert!(flags.contains(&ConnectionFlag::Secure));
    }

    #[test]
    fn test_keyed_flags_replace() {
        let mut flags = FlagSet::new();
        flags.set(ConnectionFlag::User("jan".into()));
        flags.set(ConnectionFlag::User("root".into()));
        assert_eq!(flags.len(), 1);
        assert_eq!(flags.iter().next().unwrap().to_string(), "user=root");
    }

    #[test]
    fn test_flag_parsing() {
        assert_eq!(
            ConnectionFlag::from_str("NOVALIDATE-CERT").unwrap(),
            ConnectionFlag::NoValidateCert
        );
        assert_eq!(
            ConnectionFlag::from_str("user=jan").unwrap(),
            ConnectionFlag::User("jan".into())
        );
        assert_eq!(
            ConnectionFlag::from_str("authuser=admin").unwrap(),
            ConnectionFlag::Other("authuser=admin".into())
        );
        assert!(ConnectionFlag::from_str("").is_err());
        assert!(ConnectionFlag::from_str("bad/flag").is_err());
    }

    #[test]
    fn test_server_string_default_port() {
        let conf = MailServerConf::new("mail.example.com", 143, MailService::Imap);
        assert_eq!(
            conf.server_string("INBOX"),
            "{mail.example.com:143/novalidate-cert}INBOX"
        );
    }

    #[test]
    fn test_server_string_ssl_port() {
        let conf = MailServerConf::new("mail.example.com", 993, MailService::Imap);
        assert_eq!(conf.server_string(""), "{mail.example.com:993/ssl}");
    }

    #[test]
    fn test_server_string_non_imap_service() {
        let mut conf = MailServerConf::new("news.example.com", 119, MailService::Nntp);
        conf.set_flag(ConnectionFlag::Secure);
        assert_eq!(
            conf.server_string("comp.lang.misc"),
            "{news.example.com:119/nntp/secure}comp.lang.misc"
        );
    }

    #[test]
    fn test_conf_from_account_settings() {
        let settings: AccountSettings = toml::from_str(
            r#"
name = "work"
server_hostname = "imap.example.com"
server_port = 993
server_username = "jan"
server_password = "hunter2"
read_only = true
flags = ["validate-cert"]
"#,
        )
        .unwrap();
        let conf = MailServerConf::try_from(&settings).unwrap();
        assert!(conf.options.contains(OpenOptions::READONLY));
        assert!(conf.flags.contains(&ConnectionFlag::Ssl));
        assert!(conf.flags.contains(&ConnectionFlag::ValidateCert));
        assert_eq!(
            conf.server_string("INBOX"),
            "{imap.example.com:993/ssl/validate-cert}INBOX"
        );
    }
}
