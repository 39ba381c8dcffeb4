/*
 * satchel - attachment types module.
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

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::email::attachments::Attachment;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Charset {
    Ascii,
    UTF8,
    UTF16,
    ISO8859_1,
    ISO8859_2,
    ISO8859_7,
    ISO8859_15,
    Windows1251,
    Windows1252,
    Windows1253,
    KOI8R,
    GBK,
    BIG5,
    ISO2022JP,
    Other,
}

impl Default for Charset {
    fn default() -> Self {
        Self::UTF8
    }
}

impl From<&str> for Charset {
    fn from(tag: &str) -> Self {
        let tag = tag.trim();
        if tag.eq_ignore_ascii_case("us-ascii") || tag.eq_ignore_ascii_case("ascii") {
            Self::Ascii
        } else if tag.eq_ignore_ascii_case("utf-8") || tag.eq_ignore_ascii_case("utf8") {
            Self::UTF8
        } else if tag.eq_ignore_ascii_case("utf-16") {
            Self::UTF16
        } else if tag.eq_ignore_ascii_case("iso-8859-1") || tag.eq_ignore_ascii_case("latin1") {
            Self::ISO8859_1
        } else if tag.eq_ignore_ascii_case("iso-8859-2") {
            Self::ISO8859_2
        } else if tag.eq_ignore_ascii_case("iso-8859-7") || tag.eq_ignore_ascii_case("iso8859-7")
        {
            Self::ISO8859_7
        } else if tag.eq_ignore_ascii_case("iso-8859-15") {
            Self::ISO8859_15
        } else if tag.eq_ignore_ascii_case("windows-1251") {
            Self::Windows1251
        } else if tag.eq_ignore_ascii_case("windows-1252") || tag.eq_ignore_ascii_case("cp1252")
        {
            Self::Windows1252
        } else if tag.eq_ignore_ascii_case("windows-1253") {
            Self::Windows1253
        } else if tag.eq_ignore_ascii_case("koi8-r") {
            Self::KOI8R
        } else if tag.eq_ignore_ascii_case("gbk") || tag.eq_ignore_ascii_case("gb2312") {
            Self::GBK
        } else if tag.eq_ignore_ascii_case("big5") {
            Self::BIG5
        } else if tag.eq_ignore_ascii_case("iso-2022-jp") {
            Self::ISO2022JP
        } else {
            log::debug!("unknown charset tag {:?}", tag);
            Self::Other
        }
    }
}

impl Charset {
    /// The corresponding `encoding_rs` decoder, if there is one. `None`
    /// means "treat as UTF-8" (possibly lossily).
    pub fn encoding(self) -> Option<&'static encoding_rs::Encoding> {
        match self {
            Self::Ascii | Self::UTF8 | Self::Other => None,
            Self::UTF16 => Some(encoding_rs::UTF_16LE),
            // encoding_rs maps latin1 onto its windows-1252 superset
            Self::ISO8859_1 | Self::Windows1252 => Some(encoding_rs::WINDOWS_1252),
            Self::ISO8859_2 => Some(encoding_rs::ISO_8859_2),
            Self::ISO8859_7 => Some(encoding_rs::ISO_8859_7),
            Self::ISO8859_15 => Some(encoding_rs::ISO_8859_15),
            Self::Windows1251 => Some(encoding_rs::WINDOWS_1251),
            Self::Windows1253 => Some(encoding_rs::WINDOWS_1253),
            Self::KOI8R => Some(encoding_rs::KOI8_R),
            Self::GBK => Some(encoding_rs::GBK),
            Self::BIG5 => Some(encoding_rs::BIG5),
            Self::ISO2022JP => Some(encoding_rs::ISO_2022_JP),
        }
    }
}

/// Decode `bytes` into UTF-8 text according to `charset`. Unknown charsets
/// and invalid sequences degrade lossily instead of failing.
pub fn decode_charset(bytes: &[u8], charset: Charset) -> String {
    match charset.encoding() {
        Some(enc) => enc.decode(bytes).0.into_owned(),
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MultipartType {
    Mixed,
    Alternative,
    Digest,
    Signed,
    Related,
}

impl Default for MultipartType {
    fn default() -> Self {
        Self::Mixed
    }
}

impl Display for MultipartType {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Mixed => write!(f, "multipart/mixed"),
            Self::Alternative => write!(f, "multipart/alternative"),
            Self::Digest => write!(f, "multipart/digest"),
            Self::Signed => write!(f, "multipart/signed"),
            Self::Related => write!(f, "multipart/related"),
        }
    }
}

impl From<&str> for MultipartType {
    fn from(val: &str) -> Self {
        if val.eq_ignore_ascii_case("mixed") {
            Self::Mixed
        } else if val.eq_ignore_ascii_case("alternative") {
            Self::Alternative
        } else if val.eq_ignore_ascii_case("digest") {
            Self::Digest
        } else if val.eq_ignore_ascii_case("signed") {
            Self::Signed
        } else if val.eq_ignore_ascii_case("related") {
            Self::Related
        } else {
            Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Text {
    Plain,
    Html,
    Other { tag: String },
}

impl Text {
    pub fn is_html(&self) -> bool {
        matches!(self, Self::Html)
    }
}

impl Display for Text {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Plain => write!(f, "text/plain"),
            Self::Html => write!(f, "text/html"),
            Self::Other { tag } => write!(f, "text/{}", tag),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    Text {
        kind: Text,
        charset: Charset,
        parameters: Vec<(String, String)>,
    },
    Multipart {
        boundary: String,
        kind: MultipartType,
        parts: Vec<Attachment>,
    },
    MessageRfc822,
    OctetStream {
        name: Option<String>,
    },
    Other {
        tag: String,
        name: Option<String>,
    },
}

impl Default for ContentType {
    fn default() -> Self {
        Self::Text {
            kind: Text::Plain,
            charset: Charset::UTF8,
            parameters: Vec::new(),
        }
    }
}

impl Display for ContentType {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Text { kind, .. } => kind.fmt(f),
            Self::Multipart { kind, .. } => kind.fmt(f),
            Self::MessageRfc822 => write!(f, "message/rfc822"),
            Self::OctetStream { .. } => write!(f, "application/octet-stream"),
            Self::Other { tag, .. } => write!(f, "{}", tag),
        }
    }
}

impl ContentType {
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }

    pub fn is_text_html(&self) -> bool {
        matches!(
            self,
            Self::Text {
                kind: Text::Html,
                ..
            }
        )
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::OctetStream { name } | Self::Other { name, .. } => name.as_deref(),
            Self::Text { parameters, .. } => parameters
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("name"))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentDispositionKind {
    Inline,
    Attachment,
}

impl ContentDispositionKind {
    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline)
    }

    pub fn is_attachment(&self) -> bool {
        matches!(self, Self::Attachment)
    }
}

impl Default for ContentDispositionKind {
    fn default() -> Self {
        Self::Inline
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDisposition {
    pub kind: ContentDispositionKind,
    pub filename: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentTransferEncoding {
    _7Bit,
    _8Bit,
    Base64,
    QuotedPrintable,
    Other { tag: String },
}

impl Default for ContentTransferEncoding {
    fn default() -> Self {
        Self::_7Bit
    }
}

impl Display for ContentTransferEncoding {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::_7Bit => write!(f, "7bit"),
            Self::_8Bit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Other { tag } => write!(f, "{}", tag),
        }
    }
}

impl From<&str> for ContentTransferEncoding {
    fn from(val: &str) -> Self {
        let val = val.trim();
        if val.eq_ignore_ascii_case("base64") {
            Self::Base64
        } else if val.eq_ignore_ascii_case("7bit") {
            Self::_7Bit
        } else if val.eq_ignore_ascii_case("8bit") {
            Self::_8Bit
        } else if val.eq_ignore_ascii_case("quoted-printable") {
            Self::QuotedPrintable
        } else {
            Self::Other {
                tag: val.to_ascii_lowercase(),
            }
        }
    }
}
