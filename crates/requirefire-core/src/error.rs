// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for module resolution and isolated loading

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for resolution and loading operations
pub type Result<T> = std::result::Result<T, LoadError>;

/// Errors that can occur while resolving or loading a module
#[derive(Debug, Error)]
pub enum LoadError {
    /// The request is not a usable specifier (empty or containing NUL)
    #[error("The argument 'id' must be a non-empty string without null bytes. Received {0:?}")]
    InvalidSpecifier(String),

    /// No candidate path matched
    #[error("{}", not_found_message(.request, .require_stack))]
    ModuleNotFound {
        /// The specifier as the caller wrote it
        request: String,
        /// Requester chain, innermost first
        require_stack: Vec<PathBuf>,
    },

    /// A package `main` points nowhere and there is no index to fall back to
    #[error(
        "Cannot find module '{}'. Please verify that the package.json has a valid \"main\" entry",
        .main.display()
    )]
    InvalidPackageMain {
        /// The resolved `main` path
        main: PathBuf,
        /// The manifest that declared it
        package_json: PathBuf,
        /// The specifier that led to the package
        request: String,
    },

    /// A subpath is not exposed by the package's `exports`
    #[error(
        "Package subpath '{subpath}' is not defined by \"exports\" in {}",
        .package_json.display()
    )]
    PackagePathNotExported {
        /// The subpath, `.`-prefixed
        subpath: String,
        /// The manifest declaring `exports`
        package_json: PathBuf,
    },

    /// An `exports` target is structurally invalid
    #[error(
        "Invalid \"exports\" target {target:?} defined for '{subpath}' in the package config {}",
        .package_json.display()
    )]
    InvalidPackageTarget {
        /// The offending target string
        target: String,
        /// The subpath being resolved
        subpath: String,
        /// The manifest declaring `exports`
        package_json: PathBuf,
    },

    /// The `exports` field mixes subpath keys with condition keys
    #[error("Invalid package config {}: {reason}", .package_json.display())]
    InvalidPackageConfig {
        /// The manifest with the invalid configuration
        package_json: PathBuf,
        /// What is wrong with it
        reason: String,
    },

    /// A package.json exists but is not well-formed
    #[error("Error parsing {}: {source}", .path.display())]
    ManifestParse {
        /// Path of the manifest
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },

    /// File system error while reading a module or manifest
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A loading capability outlived the loader that issued it
    #[error("The loader that created '{0}' has been dropped")]
    LoaderReleased(String),

    /// Error raised by the host while evaluating module source
    #[error(transparent)]
    Evaluation(anyhow::Error),
}

impl LoadError {
    /// Create a module not found error
    pub fn module_not_found(request: impl Into<String>, require_stack: Vec<PathBuf>) -> Self {
        Self::ModuleNotFound {
            request: request.into(),
            require_stack,
        }
    }

    /// Create an I/O error annotated with the path being accessed
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convert an error returned by the host.
    ///
    /// Errors that originated in this crate (a failed nested require) are
    /// passed through unchanged so that their code survives the round trip.
    pub fn from_host(err: anyhow::Error) -> Self {
        match err.downcast::<LoadError>() {
            Ok(err) => err,
            Err(err) => Self::Evaluation(err),
        }
    }

    /// Node-compatible error code
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::InvalidSpecifier(_) => Some("ERR_INVALID_ARG_VALUE"),
            Self::ModuleNotFound { .. } | Self::InvalidPackageMain { .. } => {
                Some("MODULE_NOT_FOUND")
            }
            Self::PackagePathNotExported { .. } => Some("ERR_PACKAGE_PATH_NOT_EXPORTED"),
            Self::InvalidPackageTarget { .. } => Some("ERR_INVALID_PACKAGE_TARGET"),
            Self::InvalidPackageConfig { .. } | Self::ManifestParse { .. } => {
                Some("ERR_INVALID_PACKAGE_CONFIG")
            }
            Self::Io { .. } | Self::LoaderReleased(_) | Self::Evaluation(_) => None,
        }
    }

    /// Requester chain for not-found errors, innermost first
    pub fn require_stack(&self) -> &[PathBuf] {
        match self {
            Self::ModuleNotFound { require_stack, .. } => require_stack,
            _ => &[],
        }
    }

    /// Whether this is a `MODULE_NOT_FOUND` error
    pub fn is_not_found(&self) -> bool {
        self.code() == Some("MODULE_NOT_FOUND")
    }
}

fn not_found_message(request: &str, require_stack: &[PathBuf]) -> String {
    let mut message = format!("Cannot find module '{}'", request);
    if !require_stack.is_empty() {
        message.push_str("\nRequire stack:");
        for path in require_stack {
            message.push_str("\n- ");
            message.push_str(&path.display().to_string());
        }
    }
    message
}
