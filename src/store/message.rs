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

//! A retrieved message: envelope metadata plus the MIME part tree.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use mailparse::MailHeaderMap;

use crate::email::{
    parse_address_list, Address, AddressList, Attachment, AttachmentBuilder, Flag,
};
use crate::store::UID;

/// One message out of a mailbox, built from a single `UID FETCH` response.
/// Header values are RFC 2047-decoded; body parts stay transfer-encoded
/// until asked for (see [`crate::email::attachments`]).
#[derive(Clone)]
pub struct Message {
    pub uid: UID,
    pub flags: Flag,
    /// `RFC822.SIZE` when the server reported it, else the fetched length.
    pub size: usize,
    /// `INTERNALDATE`: when the server received the message.
    pub internal_date: Option<DateTime<FixedOffset>>,
    pub subject: String,
    pub message_id: Option<String>,
    /// The raw `Date` header value.
    pub date: String,
    /// The `Date` header as a unix timestamp, `0` when missing/unparsable.
    pub timestamp: i64,
    pub from: AddressList,
    pub to: AddressList,
    pub cc: AddressList,
    pub bcc: AddressList,
    pub reply_to: AddressList,
    root: Attachment,
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Message")
            .field("uid", &self.uid)
            .field("flags", &self.flags)
            .field("subject", &self.subject)
            .field("from", &self.from)
            .field("date", &self.date)
            .field("size", &self.size)
            .finish()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} - {} - {}",
            self.date,
            self.field_from_to_string(),
            self.subject
        )
    }
}

impl Message {
    /// Build a message from raw RFC 822 text. This is what the fetch path
    /// goes through, minus the network.
    pub fn from_bytes(uid: UID, flags: Flag, bytes: &[u8]) -> Self {
        let mut subject = String::new();
        let mut message_id = None;
        let mut date = String::new();
        let mut from = AddressList::new();
        let mut to = AddressList::new();
        let mut cc = AddressList::new();
        let mut bcc = AddressList::new();
        let mut reply_to = AddressList::new();

        match mailparse::parse_mail(bytes) {
            Ok(parsed) => {
                subject = parsed.headers.get_first_value("Subject").unwrap_or_default();
                message_id = parsed.headers.get_first_value("Message-ID");
                date = parsed.headers.get_first_value("Date").unwrap_or_default();
                for (header, list) in [
                    ("From", &mut from),
                    ("To", &mut to),
                    ("Cc", &mut cc),
                    ("Bcc", &mut bcc),
                    ("Reply-To", &mut reply_to),
                ] {
                    if let Some(value) = parsed.headers.get_first_value(header) {
                        *list = parse_address_list(&value);
                    }
                }
            }
            Err(err) => {
                log::debug!("could not parse message headers of UID {}: {}", uid, err);
            }
        }

        let timestamp = if date.is_empty() {
            0
        } else {
            mailparse::dateparse(&date).unwrap_or(0)
        };

        Self {
            uid,
            flags,
            size: bytes.len(),
            internal_date: None,
            subject,
            message_id,
            date,
            timestamp,
            from,
            to,
            cc,
            bcc,
            reply_to,
            root: AttachmentBuilder::new(bytes).build(),
        }
    }

    pub(crate) fn from_fetch(fetch: &imap::types::Fetch) -> Option<Self> {
        let uid = fetch.uid?;
        let mut flags = Flag::default();
        for flag in fetch.flags().iter() {
            flags |= Flag::from(flag);
        }
        let body = fetch.body().unwrap_or_default();
        let mut msg = Self::from_bytes(uid, flags, body);
        if let Some(size) = fetch.size {
            msg.size = size as usize;
        }
        msg.internal_date = fetch.internal_date();
        Some(msg)
    }

    /// The root of the MIME part tree.
    pub fn root(&self) -> &Attachment {
        &self.root
    }

    /// The plain-text rendition of the body.
    pub fn text_body(&self) -> String {
        self.root.text()
    }

    /// The HTML rendition of the body, empty when the message has none.
    pub fn html_body(&self) -> String {
        self.root.html()
    }

    /// Leaf parts a reader would call attachments.
    pub fn attachments(&self) -> Vec<Attachment> {
        self.root.attachments()
    }

    pub fn is_seen(&self) -> bool {
        self.flags.is_seen()
    }

    pub fn is_deleted(&self) -> bool {
        self.flags.is_deleted()
    }

    fn field_from_to_string(&self) -> String {
        self.from
            .iter()
            .map(Address::to_string)
            .collect::<Vec<String>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::ContentType;

    const RAW: &[u8] = b"From: \"Jan Novak\" <jan@example.com>\r\n\
To: root@localhost, \"B\" <b@example.com>\r\n\
Subject: =?utf-8?q?caf=C3=A9_report?=\r\n\
Date: Mon, 15 Feb 2021 10:12:05 +0100\r\n\
Message-ID: <abc123@example.com>\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"alt\"\r\n\
\r\n\
--alt\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
plain rendition\r\n\
--alt\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>html rendition</p>\r\n\
--alt--\r\n";

    #[test]
    fn test_envelope_fields() {
        let msg = Message::from_bytes(42, Flag::SEEN, RAW);
        assert_eq!(msg.uid, 42);
        assert!(msg.is_seen());
        assert_eq!(msg.subject, "café report");
        assert_eq!(msg.message_id.as_deref(), Some("<abc123@example.com>"));
        assert_eq!(msg.from.len(), 1);
        assert_eq!(msg.from[0].display_name.as_deref(), Some("Jan Novak"));
        assert_eq!(msg.to.len(), 2);
        assert_eq!(msg.timestamp, 1613380325);
    }

    #[test]
    fn test_alternative_body_selection() {
        let msg = Message::from_bytes(1, Flag::default(), RAW);
        assert_eq!(msg.text_body().trim_end(), "plain rendition");
        assert_eq!(msg.html_body().trim_end(), "<p>html rendition</p>");
        assert!(msg.attachments().is_empty());
    }

    #[test]
    fn test_missing_date_leaves_zero_timestamp() {
        let msg = Message::from_bytes(1, Flag::default(), b"Subject: bare\r\n\r\nbody\r\n");
        assert_eq!(msg.timestamp, 0);
        assert!(msg.date.is_empty());
        assert_eq!(msg.subject, "bare");
        assert!(matches!(
            msg.root().content_type(),
            ContentType::Text { .. }
        ));
    }

    #[test]
    fn test_display_line() {
        let msg = Message::from_bytes(7, Flag::default(), RAW);
        let line = msg.to_string();
        assert!(line.contains("Jan Novak <jan@example.com>"));
        assert!(line.contains("café report"));
    }
}
