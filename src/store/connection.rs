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

//! Connection lifecycle: lazy open, login, mailbox selection, teardown.

use std::convert::TryFrom;
use std::fmt;

use imap::ConnectionMode;

use crate::conf::AccountSettings;
use crate::email::Flag;
use crate::error::{Error, ErrorKind, IntoError, Result, ResultIntoError};
use crate::store::message::Message;
use crate::store::{
    ConnectionFlag, FlagSet, MailServerConf, MailService, OpenOptions, UID,
};

/// A live, logged-in session. Thin shim over `imap::Session` that keeps the
/// last `SELECT`/`EXAMINE` response around.
pub struct MailSession {
    inner: imap::Session<imap::Connection>,
    selected: Option<imap::types::Mailbox>,
}

impl fmt::Debug for MailSession {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MailSession")
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl MailSession {
    /// `EXAMINE` when `examine` is set, `SELECT` otherwise. The response
    /// (message counts, uidvalidity) is retained for the accessors below.
    pub fn select_mailbox(&mut self, mailbox: &str, examine: bool) -> Result<()> {
        let status = if examine {
            self.inner.examine(mailbox)
        } else {
            self.inner.select(mailbox)
        }
        .map_err(Error::from)
        .chain_err_summary(|| format!("Could not select mailbox `{}`", mailbox))?;
        log::debug!(
            "selected `{}`: {} messages, {} recent",
            mailbox,
            status.exists,
            status.recent
        );
        self.selected = Some(status);
        Ok(())
    }

    pub fn message_count(&self) -> Option<u32> {
        self.selected.as_ref().map(|m| m.exists)
    }

    pub fn recent_count(&self) -> Option<u32> {
        self.selected.as_ref().map(|m| m.recent)
    }

    pub fn uid_validity(&self) -> Option<u32> {
        self.selected.as_ref().and_then(|m| m.uid_validity)
    }

    pub fn uid_search(&mut self, criteria: &str) -> Result<Vec<UID>> {
        let mut uids: Vec<UID> = self
            .inner
            .uid_search(criteria)
            .map_err(Error::from)
            .chain_err_summary(|| format!("UID SEARCH `{}` failed", criteria))?
            .into_iter()
            .collect();
        uids.sort_unstable();
        Ok(uids)
    }

    pub fn uid_fetch(&mut self, uid_set: &str, query: &str) -> Result<imap::types::Fetches> {
        log::trace!("UID FETCH {} {}", uid_set, query);
        self.inner
            .uid_fetch(uid_set, query)
            .map_err(Error::from)
            .chain_err_summary(|| format!("UID FETCH `{}` failed", uid_set))
    }

    pub fn uid_store(&mut self, uid_set: &str, query: &str) -> Result<()> {
        log::trace!("UID STORE {} {}", uid_set, query);
        self.inner
            .uid_store(uid_set, query)
            .map(|_| ())
            .map_err(Error::from)
            .chain_err_summary(|| format!("UID STORE `{}` failed", uid_set))
    }

    pub fn uid_mv(&mut self, uid_set: &str, mailbox: &str) -> Result<()> {
        self.inner
            .uid_mv(uid_set, mailbox)
            .map_err(Error::from)
            .chain_err_summary(|| format!("Could not move `{}` to `{}`", uid_set, mailbox))
    }

    pub fn uid_copy(&mut self, uid_set: &str, mailbox: &str) -> Result<()> {
        self.inner
            .uid_copy(uid_set, mailbox)
            .map_err(Error::from)
            .chain_err_summary(|| format!("Could not copy `{}` to `{}`", uid_set, mailbox))
    }

    /// Remove every message marked `\Deleted` from the selected mailbox.
    pub fn expunge(&mut self) -> Result<()> {
        self.inner
            .expunge()
            .map(|_| ())
            .map_err(|err| Error::from(err).set_summary("EXPUNGE failed"))
    }

    /// `CLOSE`: deselect the mailbox, expunging deleted messages.
    pub fn close(&mut self) -> Result<()> {
        self.inner.close().map_err(Error::from)
    }

    pub fn logout(&mut self) -> Result<()> {
        self.inner.logout().map_err(Error::from)
    }
}

/// Decide the transport mode from the connection flags.
fn connection_mode(flags: &FlagSet) -> Result<ConnectionMode> {
    let mode = if flags.contains(&ConnectionFlag::Ssl) {
        ConnectionMode::Tls
    } else if flags.contains(&ConnectionFlag::Tls) {
        ConnectionMode::StartTls
    } else if flags.contains(&ConnectionFlag::NoTls) {
        ConnectionMode::Plaintext
    } else {
        ConnectionMode::AutoTls
    };
    if flags.contains(&ConnectionFlag::Secure) && matches!(mode, ConnectionMode::Plaintext) {
        return Err(Error::new(
            "`secure` forbids the plaintext connection that `notls` requests",
        )
        .set_kind(ErrorKind::Configuration));
    }
    Ok(mode)
}

/// Handle to one remote mailbox. Holds the connection parameters and the
/// current mailbox name; the session is opened on first use and reused
/// afterwards.
pub struct MailStore {
    conf: MailServerConf,
    mailbox: String,
    session: Option<MailSession>,
}

impl fmt::Debug for MailStore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MailStore")
            .field("conf", &self.conf)
            .field("mailbox", &self.mailbox)
            .field("connected", &self.session.is_some())
            .finish()
    }
}

impl MailStore {
    pub fn new(conf: MailServerConf) -> Self {
        Self {
            conf,
            mailbox: "INBOX".to_string(),
            session: None,
        }
    }

    pub fn from_settings(settings: &AccountSettings) -> Result<Self> {
        let conf = MailServerConf::try_from(settings)?;
        Ok(Self {
            conf,
            mailbox: settings.root_mailbox.clone(),
            session: None,
        })
    }

    pub fn conf(&self) -> &MailServerConf {
        &self.conf
    }

    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    /// The canonical connection string of this store, mailbox included.
    pub fn server_string(&self) -> String {
        self.conf.server_string(&self.mailbox)
    }

    /// Credentials used by the next open.
    pub fn set_authentication<U: Into<String>, P: Into<String>>(
        &mut self,
        username: U,
        password: P,
    ) {
        self.conf.set_authentication(username, password);
    }

    pub fn set_flag(&mut self, flag: ConnectionFlag) {
        self.conf.set_flag(flag);
    }

    pub fn clear_flag(&mut self, flag: &ConnectionFlag) {
        self.conf.clear_flag(flag);
    }

    pub fn set_options(&mut self, options: OpenOptions) {
        self.conf.set_options(options);
    }

    /// Switch mailboxes. A live session re-selects immediately; otherwise
    /// the name is used when the connection is opened.
    pub fn set_mailbox<M: Into<String>>(&mut self, mailbox: M) -> Result<()> {
        self.mailbox = mailbox.into();
        if self.session.is_some() {
            let mailbox = self.mailbox.clone();
            let examine = self.read_only();
            self.session()?.select_mailbox(&mailbox, examine)?;
        }
        Ok(())
    }

    fn read_only(&self) -> bool {
        self.conf.options.contains(OpenOptions::READONLY)
            || self.conf.flags.contains(&ConnectionFlag::ReadOnly)
    }

    /// The live session, opening one if needed.
    pub fn session(&mut self) -> Result<&mut MailSession> {
        if self.session.is_none() {
            let new = self.open_session()?;
            self.session = Some(new);
        }
        match self.session.as_mut() {
            Some(session) => Ok(session),
            None => Err(Error::new("session disappeared mid-call").set_kind(ErrorKind::Bug)),
        }
    }

    fn open_session(&self) -> Result<MailSession> {
        if self.conf.service != MailService::Imap {
            return Err(Error::new(format!(
                "cannot open `{}`: the backing mailbox library only provides IMAP \
                 primitives, not {}",
                self.server_string(),
                self.conf.service
            ))
            .set_kind(ErrorKind::NotSupported));
        }
        if self.conf.options.contains(OpenOptions::ANONYMOUS)
            || self.conf.flags.contains(&ConnectionFlag::Anonymous)
        {
            return Err(Error::new(format!(
                "cannot open `{}`: anonymous login is not supported by the backing \
                 mailbox library",
                self.server_string()
            ))
            .set_kind(ErrorKind::NotSupported));
        }

        let mode = connection_mode(&self.conf.flags)?;
        log::debug!("opening {}", self.server_string());

        let mut builder = imap::ClientBuilder::new(
            self.conf.server_hostname.as_str(),
            self.conf.server_port,
        );
        builder = builder.mode(mode).tls_kind(imap::TlsKind::Native);
        if self.conf.flags.contains(&ConnectionFlag::NoValidateCert) {
            builder = builder.danger_skip_tls_verify(true);
        }

        let client = builder
            .connect()
            .map_err(Error::from)
            .chain_err_summary(|| format!("Could not connect to `{}`", self.server_string()))?;

        let mut session = client
            .login(&self.conf.server_username, &self.conf.server_password)
            .map_err(|(err, _)| {
                err.set_err_summary(format!(
                    "Login to `{}` as `{}` failed",
                    self.server_string(),
                    self.conf.server_username
                ))
                .set_kind(ErrorKind::Authentication)
            })?;
        session.debug = self.conf.flags.contains(&ConnectionFlag::Debug)
            || log::log_enabled!(log::Level::Trace);

        let mut session = MailSession {
            inner: session,
            selected: None,
        };
        if !self.conf.options.contains(OpenOptions::HALFOPEN) {
            session.select_mailbox(&self.mailbox, self.read_only())?;
        }
        Ok(session)
    }

    /// Number of messages in the current mailbox. Re-selects so the count
    /// is current rather than the one cached at open.
    pub fn message_count(&mut self) -> Result<u32> {
        let mailbox = self.mailbox.clone();
        let examine = self.read_only();
        let session = self.session()?;
        session.select_mailbox(&mailbox, examine)?;
        session
            .message_count()
            .ok_or_else(|| Error::new("no mailbox selected").set_kind(ErrorKind::Bug))
    }

    pub fn recent_count(&mut self) -> Result<u32> {
        let mailbox = self.mailbox.clone();
        let examine = self.read_only();
        let session = self.session()?;
        session.select_mailbox(&mailbox, examine)?;
        session
            .recent_count()
            .ok_or_else(|| Error::new("no mailbox selected").set_kind(ErrorKind::Bug))
    }

    /// `UID SEARCH` with an RFC 3501 criteria string, e.g. `"UNSEEN"` or
    /// `"FROM jan SINCE 1-Feb-2021"`. Results come back as full messages,
    /// sorted by UID ascending and truncated to `limit`.
    pub fn search(&mut self, criteria: &str, limit: Option<usize>) -> Result<Vec<Message>> {
        if limit == Some(0) {
            return Ok(Vec::new());
        }
        let mut uids = self.session()?.uid_search(criteria)?;
        if let Some(limit) = limit {
            uids.truncate(limit);
        }
        self.fetch_messages(&uids)
    }

    /// Messages the server flagged as recently arrived.
    pub fn recent_messages(&mut self, limit: Option<usize>) -> Result<Vec<Message>> {
        self.search("RECENT", limit)
    }

    /// Every message in the current mailbox.
    pub fn messages(&mut self, limit: Option<usize>) -> Result<Vec<Message>> {
        self.search("ALL", limit)
    }

    pub fn message(&mut self, uid: UID) -> Result<Message> {
        self.fetch_messages(&[uid])?.pop().ok_or_else(|| {
            Error::new(format!("no message with UID {}", uid)).set_kind(ErrorKind::External)
        })
    }

    fn fetch_messages(&mut self, uids: &[UID]) -> Result<Vec<Message>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let uid_set = uids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<String>>()
            .join(",");
        let fetches = self.session()?.uid_fetch(
            &uid_set,
            "(UID FLAGS INTERNALDATE RFC822.SIZE BODY.PEEK[])",
        )?;
        let mut ret = Vec::with_capacity(uids.len());
        for fetch in fetches.iter() {
            // responses without a UID item cannot be attributed; skip them
            if let Some(msg) = Message::from_fetch(fetch) {
                ret.push(msg);
            }
        }
        Ok(ret)
    }

    /// Mark a message `\Deleted`. It stays around until [`Self::expunge`].
    pub fn delete(&mut self, uid: UID) -> Result<()> {
        self.add_flags(uid, Flag::DELETED)
    }

    pub fn add_flags(&mut self, uid: UID, flags: Flag) -> Result<()> {
        let query = format!("+FLAGS ({})", flags.imap_query());
        self.session()?.uid_store(&uid.to_string(), &query)
    }

    pub fn remove_flags(&mut self, uid: UID, flags: Flag) -> Result<()> {
        let query = format!("-FLAGS ({})", flags.imap_query());
        self.session()?.uid_store(&uid.to_string(), &query)
    }

    pub fn move_message(&mut self, uid: UID, mailbox: &str) -> Result<()> {
        self.session()?.uid_mv(&uid.to_string(), mailbox)
    }

    pub fn copy_message(&mut self, uid: UID, mailbox: &str) -> Result<()> {
        self.session()?.uid_copy(&uid.to_string(), mailbox)
    }

    /// Remove all messages marked for deletion from the mailbox.
    pub fn expunge(&mut self) -> Result<()> {
        self.session()?.expunge()
    }

    /// End the session. With `OpenOptions::EXPUNGE` a `CLOSE` runs first so
    /// deletions are expunged on the way out.
    pub fn logout(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            if self.conf.options.contains(OpenOptions::EXPUNGE) {
                if let Err(err) = session.close() {
                    log::debug!("CLOSE before logout failed: {}", err);
                }
            }
            session.logout()?;
        }
        Ok(())
    }
}

impl Drop for MailStore {
    fn drop(&mut self) {
        if self.session.is_some() {
            if let Err(err) = self.logout() {
                log::debug!("logout on drop failed: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conf(service: MailService) -> MailServerConf {
        let mut conf = MailServerConf::new("mail.example.com", 143, service);
        conf.set_authentication("jan", "hunter2");
        conf
    }

    #[test]
    fn test_non_imap_service_is_not_supported() {
        let mut store = MailStore::new(test_conf(MailService::Pop3));
        let err = store.session().unwrap_err();
        assert!(err.kind.is_not_supported());
        // a failed open leaves the store usable
        assert!(format!("{:?}", store).contains("connected: false"));
    }

    #[test]
    fn test_anonymous_is_not_supported() {
        let mut store = MailStore::new(test_conf(MailService::Imap));
        store.set_options(OpenOptions::ANONYMOUS);
        let err = store.session().unwrap_err();
        assert!(err.kind.is_not_supported());
    }

    #[test]
    fn test_secure_rejects_notls() {
        let mut flags = FlagSet::new();
        flags.set(ConnectionFlag::NoTls);
        flags.set(ConnectionFlag::Secure);
        let err = connection_mode(&flags).unwrap_err();
        assert!(err.kind.is_configuration());
    }

    #[test]
    fn test_connection_mode_from_flags() {
        let mut flags = FlagSet::new();
        assert!(matches!(
            connection_mode(&flags).unwrap(),
            ConnectionMode::AutoTls
        ));
        flags.set(ConnectionFlag::Ssl);
        assert!(matches!(connection_mode(&flags).unwrap(), ConnectionMode::Tls));
        flags.clear(&ConnectionFlag::Ssl);
        flags.set(ConnectionFlag::Tls);
        assert!(matches!(
            connection_mode(&flags).unwrap(),
            ConnectionMode::StartTls
        ));
    }

    #[test]
    fn test_set_mailbox_without_session_only_records() {
        let mut store = MailStore::new(test_conf(MailService::Imap));
        store.set_mailbox("Archive").unwrap();
        assert_eq!(store.mailbox(), "Archive");
        assert_eq!(
            store.server_string(),
            "{mail.example.com:143/novalidate-cert}Archive"
        );
    }

    #[test]
    fn test_search_limit_zero_shortcuts() {
        // limit 0 must not touch the network at all
        let mut store = MailStore::new(test_conf(MailService::Imap));
        assert!(store.search("ALL", Some(0)).unwrap().is_empty());
    }
}
