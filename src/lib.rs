/*
 * satchel - lib.rs
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

#![deny(
    unsafe_code,
    rustdoc::broken_intra_doc_links,
    clippy::correctness,
    clippy::suspicious,
    clippy::dbg_macro
)]

//! Retrieve e-mail from remote mailboxes.
//!
//! satchel manages the parameters of a mailbox connection (server, port,
//! service, connection flags, credentials, mailbox) and forwards mailbox
//! primitives such as open, search, fetch, store and expunge to the `imap`
//! crate. It speaks no wire protocol of its own.
//!
//! - Configure an account with [`AccountSettings`] (see module [`conf`]) or
//!   build a [`MailServerConf`] directly. Connection flags such as `ssl`,
//!   `tls` and `novalidate-cert` follow the classic
//!   `{host:port/service/flags}mailbox` connection-string syntax, with the
//!   usual mutual-exclusion rules (see module [`store`]).
//! - A [`MailStore`] opens its session lazily, re-selects when the mailbox
//!   changes, and hands back [`Message`] values with decoded envelope
//!   fields and the MIME part tree.
//! - Part bodies stay transfer-encoded until asked for; decoding and
//!   charset normalization live in [`email::attachments`].
//!
//! ```no_run
//! use satchel::{MailServerConf, MailService, MailStore};
//!
//! # fn main() -> satchel::Result<()> {
//! let mut conf = MailServerConf::new("mail.example.com", 993, MailService::Imap);
//! conf.set_authentication("jan", "hunter2");
//! let mut store = MailStore::new(conf);
//! store.set_mailbox("INBOX")?;
//! for msg in store.search("UNSEEN", Some(50))? {
//!     println!("{}: {}", msg.uid, msg.subject);
//!     for att in msg.attachments() {
//!         att.save_to_directory(std::path::Path::new("/tmp"))?;
//!     }
//! }
//! store.expunge()?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate serde_derive;

pub mod conf;
pub mod email;
pub mod error;
pub mod store;

pub use crate::conf::AccountSettings;
pub use crate::email::{Address, AddressList, Attachment, AttachmentBuilder, Flag};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::store::{
    ConnectionFlag, FlagSet, MailServerConf, MailService, MailSession, MailStore, Message,
    OpenOptions, UID,
};
