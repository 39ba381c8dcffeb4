/*
 * satchel - email module.
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
 * Email types: addresses, message flags and the attachment tree.
 */

use std::fmt;

use bitflags::bitflags;
use smallvec::SmallVec;

pub mod attachment_types;
pub mod attachments;

pub use attachment_types::*;
pub use attachments::{decode, Attachment, AttachmentBuilder};

/// A single mailbox address, with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub display_name: Option<String>,
    pub address: String,
}

impl Address {
    pub fn new(display_name: Option<String>, address: String) -> Self {
        Self {
            display_name: display_name.filter(|n| !n.trim().is_empty()),
            address,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.display_name.as_ref() {
            Some(name) => write!(f, "{} <{}>", name, self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

pub type AddressList = SmallVec<[Address; 1]>;

/// Parse a header value into an address list. Group syntax is flattened to
/// the member addresses. An unparsable value degrades to a single
/// display-less address holding the raw text, so callers always have
/// something to show.
pub fn parse_address_list(raw: &str) -> AddressList {
    let mut ret = AddressList::new();
    if raw.trim().is_empty() {
        return ret;
    }
    match mailparse::addrparse(raw) {
        Ok(list) => {
            for addr in list.iter() {
                match addr {
                    mailparse::MailAddr::Single(info) => {
                        ret.push(Address::new(info.display_name.clone(), info.addr.clone()));
                    }
                    mailparse::MailAddr::Group(group) => {
                        for info in &group.addrs {
                            ret.push(Address::new(
                                info.display_name.clone(),
                                info.addr.clone(),
                            ));
                        }
                    }
                }
            }
        }
        Err(err) => {
            log::debug!("could not parse address list {:?}: {}", raw, err);
            ret.push(Address::new(None, raw.trim().to_string()));
        }
    }
    ret
}

bitflags! {
    /// System flags of a stored message.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Flag: u8 {
        const SEEN     = 0b0000_0001;
        const ANSWERED = 0b0000_0010;
        const FLAGGED  = 0b0000_0100;
        const DELETED  = 0b0000_1000;
        const DRAFT    = 0b0001_0000;
        const RECENT   = 0b0010_0000;
    }
}

impl Flag {
    pub fn is_seen(&self) -> bool {
        self.contains(Self::SEEN)
    }

    pub fn is_deleted(&self) -> bool {
        self.contains(Self::DELETED)
    }

    /// Render as the flag list of a `STORE` command, e.g. `\Seen \Deleted`.
    pub fn imap_query(&self) -> String {
        let mut tokens = Vec::with_capacity(6);
        if self.contains(Self::SEEN) {
            tokens.push("\\Seen");
        }
        if self.contains(Self::ANSWERED) {
            tokens.push("\\Answered");
        }
        if self.contains(Self::FLAGGED) {
            tokens.push("\\Flagged");
        }
        if self.contains(Self::DELETED) {
            tokens.push("\\Deleted");
        }
        if self.contains(Self::DRAFT) {
            tokens.push("\\Draft");
        }
        if self.contains(Self::RECENT) {
            tokens.push("\\Recent");
        }
        tokens.join(" ")
    }
}

impl From<&imap::types::Flag<'_>> for Flag {
    fn from(val: &imap::types::Flag<'_>) -> Self {
        match val {
            imap::types::Flag::Seen => Self::SEEN,
            imap::types::Flag::Answered => Self::ANSWERED,
            imap::types::Flag::Flagged => Self::FLAGGED,
            imap::types::Flag::Deleted => Self::DELETED,
            imap::types::Flag::Draft => Self::DRAFT,
            imap::types::Flag::Recent => Self::RECENT,
            _ => Self::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_list() {
        let list = parse_address_list(r#""Jan Novak" <jan@example.com>, root@localhost"#);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].display_name.as_deref(), Some("Jan Novak"));
        assert_eq!(list[0].address, "jan@example.com");
        assert_eq!(list[1].display_name, None);
        assert_eq!(list[1].address, "root@localhost");
    }

    #[test]
    fn test_parse_address_list_degrades_to_raw() {
        let list = parse_address_list("not really an address");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].address, "not really an address");
    }

    #[test]
    fn test_flag_imap_query() {
        let flags = Flag::SEEN | Flag::DELETED;
        assert_eq!(flags.imap_query(), "\\Seen \\Deleted");
        assert!(flags.is_seen());
        assert!(flags.is_deleted());
        assert!(!flags.contains(Flag::DRAFT));
    }

    #[test]
    fn test_flag_from_imap() {
        let f = Flag::from(&imap::types::Flag::Seen) | Flag::from(&imap::types::Flag::Recent);
        assert_eq!(f, Flag::SEEN | Flag::RECENT);
    }
}
