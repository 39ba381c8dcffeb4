/*
 * satchel - tests
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

use satchel::{
    AccountSettings, ConnectionFlag, Flag, MailServerConf, MailService, MailStore, Message,
};

const NEWSLETTER: &[u8] = b"From: =?utf-8?q?Ren=C3=A9?= <rene@example.com>\r\n\
To: list@example.com\r\n\
Reply-To: noreply@example.com\r\n\
Subject: weekly digest\r\n\
Date: Tue, 02 Mar 2021 08:30:00 +0000\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
\r\n\
--outer\r\n\
Content-Type: multipart/alternative; boundary=\"inner\"\r\n\
\r\n\
--inner\r\n\
Content-Type: text/plain; charset=iso-8859-15\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
the caf=E9 on the corner reopened\r\n\
--inner\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>the caf\xc3\xa9 on the corner reopened</p>\r\n\
--inner--\r\n\
--outer\r\n\
Content-Type: application/pdf; name=\"menu.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
Content-Disposition: attachment; filename=\"menu.pdf\"\r\n\
\r\n\
JVBERi0xLjQK\r\n\
--outer--\r\n";

#[test]
fn test_message_walk_decode_save() {
    let msg = Message::from_bytes(99, Flag::default(), NEWSLETTER);

    assert_eq!(msg.subject, "weekly digest");
    assert_eq!(msg.from[0].display_name.as_deref(), Some("René"));
    assert_eq!(msg.from[0].address, "rene@example.com");
    assert_eq!(msg.reply_to[0].address, "noreply@example.com");
    assert_eq!(msg.timestamp, 1614673800);

    // the alternative picks its matching leaf, charset-normalized
    assert_eq!(
        msg.text_body().trim_end(),
        "the café on the corner reopened"
    );
    assert_eq!(
        msg.html_body().trim_end(),
        "<p>the café on the corner reopened</p>"
    );

    let attachments = msg.attachments();
    assert_eq!(attachments.len(), 1);
    let pdf = &attachments[0];
    assert_eq!(pdf.filename().as_deref(), Some("menu.pdf"));
    assert_eq!(pdf.mime_type(), "application/pdf");
    // transfer decoding happens only now
    assert_eq!(pdf.data(), b"%PDF-1.4\n".to_vec());

    let dir = tempfile::tempdir().unwrap();
    let path = pdf.save_to_directory(dir.path()).unwrap();
    assert_eq!(std::fs::read(path).unwrap(), b"%PDF-1.4\n".to_vec());
}

#[test]
fn test_account_settings_to_store() {
    let settings: AccountSettings = toml::from_str(
        r#"
name = "lists"
server_hostname = "imap.example.com"
server_port = 993
server_username = "jan"
server_password = "hunter2"
root_mailbox = "Lists/weekly"
flags = ["novalidate-cert"]
"#,
    )
    .unwrap();

    let store = MailStore::from_settings(&settings).unwrap();
    assert_eq!(
        store.server_string(),
        "{imap.example.com:993/ssl/novalidate-cert}Lists/weekly"
    );
}

#[test]
fn test_flag_juggling_end_to_end() {
    let mut conf = MailServerConf::new("mail.example.com", 143, MailService::Imap);
    conf.set_authentication("jan", "hunter2");
    // the seeded novalidate-cert gives way to its exclusive partner
    conf.set_flag(ConnectionFlag::ValidateCert);
    conf.set_flag(ConnectionFlag::Tls);

    let mut store = MailStore::new(conf);
    store.set_mailbox("Drafts").unwrap();
    assert_eq!(
        store.server_string(),
        "{mail.example.com:143/validate-cert/tls}Drafts"
    );
}
