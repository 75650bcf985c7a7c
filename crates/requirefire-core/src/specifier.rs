// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module specifiers

use crate::error::{LoadError, Result};
use std::fmt;
use std::path::Path;

/// The shape of a specifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// `./x`, `../x`, `.` or `..`
    Relative,
    /// An absolute file system path
    Absolute,
    /// A bare package name, optionally followed by a subpath
    Package,
    /// A `#`-prefixed package-internal import
    Internal,
}

/// A validated module specifier.
///
/// Borrowed from the caller and never rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Specifier<'a> {
    raw: &'a str,
    kind: SpecifierKind,
}

impl<'a> Specifier<'a> {
    /// Validate and classify a request string
    pub fn parse(raw: &'a str) -> Result<Self> {
        if raw.is_empty() || raw.contains('\0') {
            return Err(LoadError::InvalidSpecifier(raw.to_string()));
        }

        let kind = if is_relative(raw) {
            SpecifierKind::Relative
        } else if Path::new(raw).is_absolute() {
            SpecifierKind::Absolute
        } else if raw.starts_with('#') {
            SpecifierKind::Internal
        } else {
            SpecifierKind::Package
        };

        Ok(Self { raw, kind })
    }

    /// The specifier text
    pub fn as_str(&self) -> &'a str {
        self.raw
    }

    /// The specifier shape
    pub fn kind(&self) -> SpecifierKind {
        self.kind
    }

    /// Split a package specifier into its name and optional subpath
    pub fn package_parts(&self) -> Option<(&'a str, Option<&'a str>)> {
        match self.kind {
            SpecifierKind::Package => Some(split_package_specifier(self.raw)),
            _ => None,
        }
    }
}

impl fmt::Display for Specifier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw)
    }
}

/// `.`/`..` alone, or followed by a separator
pub(crate) fn is_relative(request: &str) -> bool {
    let bytes = request.as_bytes();
    if bytes.first() != Some(&b'.') {
        return false;
    }
    match bytes.get(1) {
        None => true,
        Some(b'/') => true,
        Some(b'\\') if cfg!(windows) => true,
        Some(b'.') => matches!(bytes.get(2), None | Some(b'/'))
            || (cfg!(windows) && bytes.get(2) == Some(&b'\\')),
        _ => false,
    }
}

fn split_package_specifier(specifier: &str) -> (&str, Option<&str>) {
    if let Some(rest) = specifier.strip_prefix('@') {
        // Scoped package: @scope/name or @scope/name/subpath
        if let Some(scope_end) = rest.find('/') {
            let after_scope = &rest[scope_end + 1..];
            if let Some(subpath_pos) = after_scope.find('/') {
                let name_end = 1 + scope_end + 1 + subpath_pos;
                return (&specifier[..name_end], Some(&specifier[name_end + 1..]));
            }
        }
        (specifier, None)
    } else if let Some(slash_pos) = specifier.find('/') {
        (&specifier[..slash_pos], Some(&specifier[slash_pos + 1..]))
    } else {
        (specifier, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(Specifier::parse("./a").unwrap().kind(), SpecifierKind::Relative);
        assert_eq!(Specifier::parse("..").unwrap().kind(), SpecifierKind::Relative);
        assert_eq!(Specifier::parse("../x/y").unwrap().kind(), SpecifierKind::Relative);
        assert_eq!(Specifier::parse("/tmp/x.js").unwrap().kind(), SpecifierKind::Absolute);
        assert_eq!(Specifier::parse("#internal").unwrap().kind(), SpecifierKind::Internal);
        assert_eq!(Specifier::parse("lodash").unwrap().kind(), SpecifierKind::Package);
        // Dot-prefixed names are package lookups, not relative paths
        assert_eq!(Specifier::parse(".bin").unwrap().kind(), SpecifierKind::Package);
        assert_eq!(Specifier::parse("...").unwrap().kind(), SpecifierKind::Package);
    }

    #[test]
    fn test_invalid() {
        let err = Specifier::parse("").unwrap_err();
        assert_eq!(err.code(), Some("ERR_INVALID_ARG_VALUE"));
        assert!(Specifier::parse("a\0b").is_err());
    }

    #[test]
    fn test_package_parts() {
        let parts = |s| Specifier::parse(s).unwrap().package_parts();
        assert_eq!(parts("lodash"), Some(("lodash", None)));
        assert_eq!(parts("lodash/get"), Some(("lodash", Some("get"))));
        assert_eq!(parts("@types/node"), Some(("@types/node", None)));
        assert_eq!(
            parts("@babel/core/lib/index"),
            Some(("@babel/core", Some("lib/index")))
        );
        assert_eq!(parts("./local"), None);
    }
}
