/*
 * satchel - error module.
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
 * An error object for the entire crate.
 */

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::result;
use std::str;
use std::string;
use std::sync::Arc;

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    None,
    Authentication,
    Network,
    Timeout,
    Configuration,
    NotSupported,
    ValueError,
    Bug,
    External,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::None => "",
                Self::Authentication => "authentication error",
                Self::Network => "network error",
                Self::Timeout => "timeout",
                Self::Configuration => "configuration error",
                Self::NotSupported => "not supported",
                Self::ValueError => "invalid value",
                Self::Bug => "bug, please report it",
                Self::External => "error in external resource",
            }
        )
    }
}

impl Default for ErrorKind {
    fn default() -> Self {
        Self::None
    }
}

impl ErrorKind {
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network | Self::Timeout)
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration)
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported)
    }
}

#[derive(Debug, Clone)]
pub struct Error {
    pub summary: Cow<'static, str>,
    pub details: Option<Cow<'static, str>>,
    pub source: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
    pub kind: ErrorKind,
}

pub trait IntoError {
    fn set_err_summary<M>(self, msg: M) -> Error
    where
        M: Into<Cow<'static, str>>;

    fn set_err_kind(self, kind: ErrorKind) -> Error;
}

pub trait ResultIntoError<T> {
    fn chain_err_summary<M, F>(self, msg_fn: F) -> Result<T>
    where
        F: Fn() -> M,
        M: Into<Cow<'static, str>>;

    fn chain_err_kind(self, kind: ErrorKind) -> Result<T>;
}

impl<I: Into<Error>> IntoError for I {
    #[inline]
    fn set_err_summary<M>(self, msg: M) -> Error
    where
        M: Into<Cow<'static, str>>,
    {
        let err: Error = self.into();
        err.set_summary(msg)
    }

    #[inline]
    fn set_err_kind(self, kind: ErrorKind) -> Error {
        let err: Error = self.into();
        err.set_kind(kind)
    }
}

impl<T, I: Into<Error>> ResultIntoError<T> for result::Result<T, I> {
    #[inline]
    fn chain_err_summary<M, F>(self, msg_fn: F) -> Result<T>
    where
        F: Fn() -> M,
        M: Into<Cow<'static, str>>,
    {
        self.map_err(|err| err.set_err_summary(msg_fn()))
    }

    #[inline]
    fn chain_err_kind(self, kind: ErrorKind) -> Result<T> {
        self.map_err(|err| err.set_err_kind(kind))
    }
}

impl Error {
    pub fn new<M>(msg: M) -> Self
    where
        M: Into<Cow<'static, str>>,
    {
        Self {
            summary: msg.into(),
            details: None,
            source: None,
            kind: ErrorKind::default(),
        }
    }

    pub fn set_summary<M>(mut self, summary: M) -> Self
    where
        M: Into<Cow<'static, str>>,
    {
        if self.summary.is_empty() {
            self.summary = summary.into();
        } else {
            self.summary = format!("{}. {}", summary.into(), self.summary).into();
        }
        self
    }

    pub fn set_details<M>(mut self, details: M) -> Self
    where
        M: Into<Cow<'static, str>>,
    {
        self.details = Some(details.into());
        self
    }

    pub fn set_source(
        mut self,
        new_val: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        self.source = new_val;
        self
    }

    pub fn set_kind(mut self, new_val: ErrorKind) -> Self {
        self.kind = new_val;
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.summary)?;
        if let Some(details) = self.details.as_ref() {
            write!(f, "\n{}", details)?;
        }
        if let Some(source) = self.source.as_ref() {
            write!(f, "\nCaused by: {}", source)?;
        }
        if self.kind != ErrorKind::None {
            write!(f, "\nKind: {}", self.kind)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|s| &(*(*s)) as _)
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(kind: io::Error) -> Self {
        Self::new(kind.to_string())
            .set_source(Some(Arc::new(kind)))
            .set_kind(ErrorKind::External)
    }
}

impl From<str::Utf8Error> for Error {
    #[inline]
    fn from(kind: str::Utf8Error) -> Self {
        Self::new(kind.to_string())
            .set_source(Some(Arc::new(kind)))
            .set_kind(ErrorKind::ValueError)
    }
}

impl From<string::FromUtf8Error> for Error {
    #[inline]
    fn from(kind: string::FromUtf8Error) -> Self {
        Self::new(kind.to_string())
            .set_source(Some(Arc::new(kind)))
            .set_kind(ErrorKind::ValueError)
    }
}

impl From<imap::Error> for Error {
    #[inline]
    fn from(kind: imap::Error) -> Self {
        let err_kind = match &kind {
            imap::Error::Io(_) | imap::Error::ConnectionLost => ErrorKind::Network,
            imap::Error::No(_) | imap::Error::Bad(_) => ErrorKind::External,
            imap::Error::Validate(_) => ErrorKind::ValueError,
            _ => ErrorKind::External,
        };
        Self::new(kind.to_string())
            .set_source(Some(Arc::new(kind)))
            .set_kind(err_kind)
    }
}

impl From<mailparse::MailParseError> for Error {
    #[inline]
    fn from(kind: mailparse::MailParseError) -> Self {
        Self::new(kind.to_string())
            .set_source(Some(Arc::new(kind)))
            .set_kind(ErrorKind::ValueError)
    }
}

impl From<native_tls::Error> for Error {
    #[inline]
    fn from(kind: native_tls::Error) -> Self {
        Self::new(kind.to_string())
            .set_source(Some(Arc::new(kind)))
            .set_kind(ErrorKind::Network)
    }
}

impl From<&str> for Error {
    #[inline]
    fn from(kind: &str) -> Self {
        Self::new(kind.to_string())
    }
}

impl From<String> for Error {
    #[inline]
    fn from(kind: String) -> Self {
        Self::new(kind)
    }
}

impl From<Cow<'_, str>> for Error {
    #[inline]
    fn from(kind: Cow<'_, str>) -> Self {
        Self::new(kind.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_keeps_source() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err: Error = io_err.into();
        let err = err.set_summary("could not reach mail.example.com");
        assert!(err.summary.starts_with("could not reach"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_chain_err_kind() {
        fn fails() -> result::Result<(), io::Error> {
            Err(io::Error::new(io::ErrorKind::TimedOut, "slow server"))
        }
        let res: Result<()> = fails().chain_err_kind(ErrorKind::Timeout);
        assert_eq!(res.unwrap_err().kind, ErrorKind::Timeout);
    }
}
