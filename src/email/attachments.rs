/*
 * satchel - attachments module.
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

//! The MIME part tree of a fetched message.
//!
//! Entity splitting (headers, boundaries, nesting) is delegated to
//! [`mailparse`]; each leaf keeps its body bytes exactly as they came off
//! the wire, still transfer-encoded. Decoding happens in [`decode`] when a
//! caller asks for part data, not before.

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use data_encoding::BASE64_MIME;
use mailparse::MailHeaderMap;

use crate::email::attachment_types::*;
use crate::error::{Error, ErrorKind, Result};

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentBuilder {
    pub content_type: ContentType,
    pub content_transfer_encoding: ContentTransferEncoding,
    pub content_disposition: ContentDisposition,
    pub raw: Vec<u8>,
}

impl AttachmentBuilder {
    /// Parse a complete MIME entity (headers and body). A parse failure
    /// degrades to a `text/plain` leaf holding the input verbatim, so a
    /// broken message is still displayable.
    pub fn new(content: &[u8]) -> Self {
        match mailparse::parse_mail(content) {
            Ok(parsed) => Self::from_parsed(&parsed).into(),
            Err(err) => {
                log::debug!("error in parsing entity: {}", err);
                Self {
                    content_type: ContentType::default(),
                    content_transfer_encoding: ContentTransferEncoding::_7Bit,
                    content_disposition: ContentDisposition::default(),
                    raw: content.to_vec(),
                }
            }
        }
    }

    pub fn set_content_type(&mut self, val: ContentType) -> &mut Self {
        self.content_type = val;
        self
    }

    pub fn set_content_transfer_encoding(&mut self, val: ContentTransferEncoding) -> &mut Self {
        self.content_transfer_encoding = val;
        self
    }

    pub fn set_content_disposition(&mut self, val: ContentDisposition) -> &mut Self {
        self.content_disposition = val;
        self
    }

    pub fn set_raw(&mut self, raw: Vec<u8>) -> &mut Self {
        self.raw = raw;
        self
    }

    pub fn build(self) -> Attachment {
        Attachment {
            content_type: self.content_type,
            content_transfer_encoding: self.content_transfer_encoding,
            content_disposition: self.content_disposition,
            raw: self.raw,
        }
    }

    fn from_parsed(part: &mailparse::ParsedMail) -> Attachment {
        let mimetype = part.ctype.mimetype.to_ascii_lowercase();
        let (main, sub) = match mimetype.split_once('/') {
            Some((m, s)) => (m, s),
            None => (mimetype.as_str(), ""),
        };

        let content_transfer_encoding = part
            .headers
            .get_first_value("Content-Transfer-Encoding")
            .map(|v| ContentTransferEncoding::from(v.as_str()))
            .unwrap_or_default();

        let content_disposition = part
            .headers
            .get_first_value("Content-Disposition")
            .map(|v| {
                let parsed = mailparse::parse_content_disposition(&v);
                ContentDisposition {
                    kind: match parsed.disposition {
                        mailparse::DispositionType::Attachment => {
                            ContentDispositionKind::Attachment
                        }
                        _ => ContentDispositionKind::Inline,
                    },
                    filename: parsed.params.get("filename").cloned(),
                }
            })
            .unwrap_or_default();

        let name = part
            .ctype
            .params
            .get("name")
            .or_else(|| part.ctype.params.get("filename"))
            .cloned();

        let content_type = if main == "multipart" {
            match part.ctype.params.get("boundary") {
                Some(boundary) => ContentType::Multipart {
                    boundary: boundary.clone(),
                    kind: MultipartType::from(sub),
                    parts: part.subparts.iter().map(Self::from_parsed).collect(),
                },
                // A multipart without a boundary cannot be split; keep it
                // as an opaque leaf.
                None => ContentType::Other {
                    tag: mimetype.clone(),
                    name,
                },
            }
        } else if main == "text" {
            let kind = if sub.eq_ignore_ascii_case("html") {
                Text::Html
            } else if sub.eq_ignore_ascii_case("plain") || sub.is_empty() {
                Text::Plain
            } else {
                Text::Other {
                    tag: sub.to_string(),
                }
            };
            ContentType::Text {
                kind,
                charset: Charset::from(part.ctype.charset.as_str()),
                parameters: part
                    .ctype
                    .params
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            }
        } else if main == "message" && sub.eq_ignore_ascii_case("rfc822") {
            ContentType::MessageRfc822
        } else if main == "application" && sub.eq_ignore_ascii_case("octet-stream") {
            ContentType::OctetStream { name }
        } else {
            ContentType::Other {
                tag: mimetype.clone(),
                name,
            }
        };

        Attachment {
            content_type,
            content_transfer_encoding,
            content_disposition,
            raw: raw_body(part),
        }
    }
}

impl From<Attachment> for AttachmentBuilder {
    fn from(val: Attachment) -> Self {
        let Attachment {
            content_type,
            content_transfer_encoding,
            content_disposition,
            raw,
        } = val;
        Self {
            content_type,
            content_transfer_encoding,
            content_disposition,
            raw,
        }
    }
}

impl From<AttachmentBuilder> for Attachment {
    fn from(val: AttachmentBuilder) -> Self {
        val.build()
    }
}

/// The raw, still transfer-encoded body bytes of a part.
fn raw_body(part: &mailparse::ParsedMail) -> Vec<u8> {
    use mailparse::body::Body;

    match part.get_body_encoded() {
        Body::Base64(body) | Body::QuotedPrintable(body) => body.get_raw().to_vec(),
        Body::SevenBit(body) | Body::EightBit(body) => body.get_raw().to_vec(),
        Body::Binary(body) => body.get_raw().to_vec(),
    }
}

/// A node of a message's MIME tree. Leaf bodies stay transfer-encoded
/// until [`decode`] is called on them.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub content_type: ContentType,
    pub content_transfer_encoding: ContentTransferEncoding,
    pub content_disposition: ContentDisposition,
    raw: Vec<u8>,
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("content_type", &self.content_type)
            .field(
                "content_transfer_encoding",
                &self.content_transfer_encoding,
            )
            .field("content_disposition", &self.content_disposition)
            .field("raw", &format_args!("{} bytes", self.raw.len()))
            .finish()
    }
}

impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.content_type {
            ContentType::Multipart { parts, .. } => {
                write!(f, "{} with {} parts", self.mime_type(), parts.len())
            }
            _ => match self.filename() {
                Some(name) => write!(f, "\"{}\", [{}]", name, self.mime_type()),
                None => write!(f, "{} attachment", self.mime_type()),
            },
        }
    }
}

impl Attachment {
    pub fn new(
        content_type: ContentType,
        content_transfer_encoding: ContentTransferEncoding,
        raw: Vec<u8>,
    ) -> Self {
        Self {
            content_type,
            content_transfer_encoding,
            content_disposition: ContentDisposition::default(),
            raw,
        }
    }

    /// Raw body bytes, exactly as fetched: no transfer decoding applied.
    pub fn body(&self) -> &[u8] {
        &self.raw
    }

    /// Decoded part data. Computed on demand; see [`decode`].
    pub fn data(&self) -> Vec<u8> {
        decode(self)
    }

    /// Size of the stored (encoded) body in bytes.
    pub fn size(&self) -> usize {
        self.raw.len()
    }

    pub fn mime_type(&self) -> String {
        self.content_type.to_string()
    }

    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    pub fn content_transfer_encoding(&self) -> &ContentTransferEncoding {
        &self.content_transfer_encoding
    }

    pub fn is_text(&self) -> bool {
        self.content_type.is_text()
    }

    pub fn is_html(&self) -> bool {
        match &self.content_type {
            ContentType::Text { kind, .. } => kind.is_html(),
            ContentType::Multipart {
                kind: MultipartType::Alternative,
                parts,
                ..
            } => parts.iter().all(Self::is_html),
            ContentType::Multipart { parts, .. } => parts.iter().any(Self::is_html),
            _ => false,
        }
    }

    /// The filename the sender gave this part, if any: the
    /// `Content-Disposition` filename wins over the content-type `name`
    /// parameter. Path separators and control characters are replaced so
    /// the value is safe to join onto a directory.
    pub fn filename(&self) -> Option<String> {
        self.content_disposition
            .filename
            .clone()
            .or_else(|| self.content_type.name().map(str::to_string))
            .map(|n| n.replace(|c| std::path::is_separator(c) || c.is_ascii_control(), "_"))
    }

    /// Leaf parts a reader would call attachments: marked with an
    /// attachment disposition or carrying a filename.
    pub fn attachments(&self) -> Vec<Attachment> {
        fn walk(att: &Attachment, ret: &mut Vec<Attachment>) {
            match &att.content_type {
                ContentType::Multipart { parts, .. } => {
                    for part in parts {
                        walk(part, ret);
                    }
                }
                _ => {
                    if att.content_disposition.kind.is_attachment() || att.filename().is_some() {
                        ret.push(att.clone());
                    }
                }
            }
        }

        let mut ret = Vec::new();
        walk(self, &mut ret);
        ret
    }

    pub fn count_attachments(&self) -> usize {
        self.attachments().len()
    }

    /// Collect the inline text of the wanted kind. `multipart/alternative`
    /// picks the matching alternative (falling back to the first inline
    /// part); other multiparts concatenate their inline children.
    fn get_text_recursive(&self, text: &mut Vec<u8>, want_html: bool) {
        match &self.content_type {
            ContentType::Text { kind, .. } => {
                if self.content_disposition.kind.is_inline() && want_html == kind.is_html() {
                    text.extend(decode(self));
                }
            }
            ContentType::Multipart {
                kind: MultipartType::Alternative,
                parts,
                ..
            } => {
                let chosen = parts
                    .iter()
                    .find(|a| {
                        a.content_disposition.kind.is_inline() && a.has_text_kind(want_html)
                    })
                    .or_else(|| {
                        parts
                            .iter()
                            .find(|a| a.content_disposition.kind.is_inline())
                    });
                if let Some(a) = chosen {
                    a.get_text_recursive(text, want_html);
                }
            }
            ContentType::Multipart { parts, .. } => {
                for a in parts {
                    if a.content_disposition.kind.is_inline() {
                        a.get_text_recursive(text, want_html);
                    }
                }
            }
            _ => {}
        }
    }

    fn has_text_kind(&self, want_html: bool) -> bool {
        match &self.content_type {
            ContentType::Text { kind, .. } => want_html == kind.is_html(),
            ContentType::Multipart { parts, .. } => {
                parts.iter().any(|a| a.has_text_kind(want_html))
            }
            _ => false,
        }
    }

    pub fn text(&self) -> String {
        let mut text = Vec::with_capacity(self.raw.len());
        self.get_text_recursive(&mut text, false);
        String::from_utf8_lossy(&text).into_owned()
    }

    pub fn html(&self) -> String {
        let mut text = Vec::with_capacity(self.raw.len());
        self.get_text_recursive(&mut text, true);
        String::from_utf8_lossy(&text).into_owned()
    }

    /// Write the decoded part to `path`.
    pub fn save_as(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(&self.data())?;
        file.flush()?;
        Ok(())
    }

    /// Save under the part's own filename inside `dir`.
    pub fn save_to_directory(&self, dir: &Path) -> Result<PathBuf> {
        let filename = self.filename().ok_or_else(|| {
            Error::new("Attachment carries no filename").set_kind(ErrorKind::ValueError)
        })?;
        if !dir.is_dir() {
            return Err(Error::new(format!(
                "{} is not a directory",
                dir.display()
            ))
            .set_kind(ErrorKind::ValueError));
        }
        let path = dir.join(filename);
        self.save_as(&path)?;
        Ok(path)
    }
}

/// Transfer-decode a part, then normalize text to UTF-8.
///
/// Malformed input never fails: base64 that does not decode is retried
/// with whitespace stripped and then given up on, quoted-printable falls
/// back likewise, and the undecoded bytes are returned as they are.
pub fn decode(a: &Attachment) -> Vec<u8> {
    let bytes = match &a.content_transfer_encoding {
        ContentTransferEncoding::Base64 => match BASE64_MIME.decode(a.body()) {
            Ok(v) => v,
            Err(_) => {
                let filtered = a
                    .body()
                    .iter()
                    .copied()
                    .filter(|b| !b.is_ascii_whitespace())
                    .collect::<Vec<u8>>();
                data_encoding::BASE64
                    .decode(&filtered)
                    .unwrap_or_else(|_| a.body().to_vec())
            }
        },
        ContentTransferEncoding::QuotedPrintable => {
            quoted_printable::decode(a.body(), quoted_printable::ParseMode::Robust)
                .unwrap_or_else(|_| a.body().to_vec())
        }
        ContentTransferEncoding::_7Bit
        | ContentTransferEncoding::_8Bit
        | ContentTransferEncoding::Other { .. } => a.body().to_vec(),
    };

    if let ContentType::Text { charset, .. } = &a.content_type {
        decode_charset(&bytes, *charset).into_bytes()
    } else {
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_QP: &[u8] = b"Content-Type: text/plain; charset=iso-8859-1\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
na=EFve caf=E9\r\n";

    const MULTIPART: &[u8] = b"Content-Type: multipart/mixed; boundary=\"sep\"\r\n\
\r\n\
--sep\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
hello body\r\n\
--sep\r\n\
Content-Type: application/octet-stream; name=\"data.bin\"\r\n\
Content-Transfer-Encoding: base64\r\n\
Content-Disposition: attachment; filename=\"data.bin\"\r\n\
\r\n\
AAECAwQF\r\n\
--sep--\r\n";

    #[test]
    fn test_quoted_printable_with_charset() {
        let att = AttachmentBuilder::new(SIMPLE_QP).build();
        assert_eq!(
            att.content_transfer_encoding,
            ContentTransferEncoding::QuotedPrintable
        );
        let text = String::from_utf8(att.data()).unwrap();
        assert_eq!(text.trim_end(), "naïve café");
    }

    #[test]
    fn test_multipart_tree() {
        let att = AttachmentBuilder::new(MULTIPART).build();
        match &att.content_type {
            ContentType::Multipart {
                kind, parts, ..
            } => {
                assert_eq!(*kind, MultipartType::Mixed);
                assert_eq!(parts.len(), 2);
            }
            other => panic!("expected multipart, got {:?}", other),
        }
        assert_eq!(att.text().trim_end(), "hello body");
        assert_eq!(att.count_attachments(), 1);
    }

    #[test]
    fn test_base64_attachment_data() {
        let att = AttachmentBuilder::new(MULTIPART).build();
        let bin = &att.attachments()[0];
        assert_eq!(bin.filename().as_deref(), Some("data.bin"));
        assert_eq!(bin.mime_type(), "application/octet-stream");
        assert_eq!(bin.data(), vec![0u8, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_malformed_base64_degrades_to_raw() {
        let att = Attachment::new(
            ContentType::OctetStream { name: None },
            ContentTransferEncoding::Base64,
            b"!!! not base64 !!!".to_vec(),
        );
        assert_eq!(att.data(), b"!!! not base64 !!!".to_vec());
    }

    #[test]
    fn test_filename_is_sanitized() {
        let att = Attachment {
            content_type: ContentType::OctetStream { name: None },
            content_transfer_encoding: ContentTransferEncoding::Base64,
            content_disposition: ContentDisposition {
                kind: ContentDispositionKind::Attachment,
                filename: Some("../../etc/passwd".to_string()),
            },
            raw: Vec::new(),
        };
        assert_eq!(att.filename().as_deref(), Some(".._.._etc_passwd"));
    }

    #[test]
    fn test_unparsable_entity_degrades() {
        let att = AttachmentBuilder::new(b"\xff\xfe not a mime entity").build();
        assert!(att.is_text());
    }

    #[test]
    fn test_save_to_directory() {
        let att = AttachmentBuilder::new(MULTIPART).build();
        let bin = &att.attachments()[0];
        let dir = tempfile::tempdir().unwrap();
        let path = bin.save_to_directory(dir.path()).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![0u8, 1, 2, 3, 4, 5]);
        assert!(path.ends_with("data.bin"));
    }

    #[test]
    fn test_save_to_directory_requires_filename() {
        let att = Attachment::new(
            ContentType::OctetStream { name: None },
            ContentTransferEncoding::_8Bit,
            b"data".to_vec(),
        );
        let dir = tempfile::tempdir().unwrap();
        assert!(att.save_to_directory(dir.path()).is_err());
    }
}
